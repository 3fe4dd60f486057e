//! Redaction helpers for diagnostic logging.

use std::collections::BTreeMap;

const SENSITIVE_HEADER_MARKERS: [&str; 5] = ["authorization", "secret", "token", "signature", "cookie"];
const SECRET_PREVIEW_CHARS: usize = 20;
pub const BODY_PREVIEW_CHARS: usize = 500;

/// Truncates secrets to a short prefix followed by `...`.
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() <= SECRET_PREVIEW_CHARS {
        return String::from("...");
    }
    let prefix: String = value.chars().take(SECRET_PREVIEW_CHARS).collect();
    format!("{prefix}...")
}

pub fn is_sensitive_header(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_HEADER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                mask_secret(value)
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Strips `client_secret`, `refresh_token` and `code_verifier` values from a
/// URL query string or form body.
pub fn sanitize_params(input: &str) -> String {
    const SECRET_PARAMS: [&str; 5] = [
        "client_secret",
        "refresh_token",
        "code_verifier",
        "code",
        "access_token",
    ];
    let (prefix, query) = match input.split_once('?') {
        Some((prefix, query)) => (Some(prefix), query),
        None => (None, input),
    };
    if !query.contains('=') {
        return input.to_owned();
    }
    let redacted = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if SECRET_PARAMS.contains(&name) => format!("{name}=***"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&");
    match prefix {
        Some(prefix) => format!("{prefix}?{redacted}"),
        None => redacted,
    }
}

pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_owned();
    }
    let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{preview}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_and_secret_headers_are_truncated() {
        let mut headers = BTreeMap::new();
        headers.insert(
            String::from("authorization"),
            String::from("Bearer eyJhbGciOiJIUzI1NiJ9.payload.signature"),
        );
        headers.insert(String::from("x-client-secret"), String::from("short"));
        headers.insert(String::from("x-requesting-bank"), String::from("team042"));

        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["authorization"], "Bearer eyJhbGciOiJIU...");
        assert_eq!(sanitized["x-client-secret"], "...");
        assert_eq!(sanitized["x-requesting-bank"], "team042");
    }

    #[test]
    fn secret_query_parameters_are_redacted() {
        let url = "https://bank.test/auth/bank-token?client_id=team&client_secret=s3cr3t";
        assert_eq!(
            sanitize_params(url),
            "https://bank.test/auth/bank-token?client_id=team&client_secret=***"
        );
        assert_eq!(
            sanitize_params("grant_type=refresh_token&refresh_token=abc"),
            "grant_type=refresh_token&refresh_token=***"
        );
    }

    #[test]
    fn long_bodies_are_cut_at_preview_length() {
        let body = "x".repeat(BODY_PREVIEW_CHARS + 10);
        let preview = truncate_body(&body);
        assert_eq!(preview.len(), BODY_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }
}
