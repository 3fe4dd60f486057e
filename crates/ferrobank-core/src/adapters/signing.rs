use sha2::{Digest, Sha256};

use crate::http_client::HttpRequest;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Canonical signing input: `METHOD\nURL\nTIMESTAMP`, then `\nname: value`
/// for every header in name order except the signature itself, then
/// `\nbody` when a body is present.
pub fn canonical_string(request: &HttpRequest, timestamp: i64) -> String {
    let mut canonical = format!("{}\n{}\n{}", request.method, request.url, timestamp);
    // Header names are stored lowercase in a BTreeMap, so iteration is sorted.
    for (name, value) in &request.headers {
        if name == SIGNATURE_HEADER {
            continue;
        }
        canonical.push('\n');
        canonical.push_str(name);
        canonical.push_str(": ");
        canonical.push_str(value);
    }
    if let Some(body) = &request.body {
        canonical.push('\n');
        canonical.push_str(body);
    }
    canonical
}

pub fn signature(request: &HttpRequest, timestamp: i64) -> String {
    hex::encode(Sha256::digest(canonical_string(request, timestamp).as_bytes()))
}

/// Attaches `X-Signature` and `X-Timestamp`.
pub fn sign_request(request: HttpRequest, timestamp: i64) -> HttpRequest {
    let signature = signature(&request, timestamp);
    request
        .with_header(SIGNATURE_HEADER, signature)
        .with_header(TIMESTAMP_HEADER, timestamp.to_string())
}
