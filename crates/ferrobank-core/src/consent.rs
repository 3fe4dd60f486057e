//! Data-sharing consent negotiation.
//!
//! Providers disagree on the consent-creation route, so creation walks an
//! ordered candidate list; status and revocation use one fixed route.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api_client::{probe_paths, ApiClient};
use crate::http_client::{HttpAuth, HttpRequest};
use crate::{ApiError, Consent, ConsentDetails, ConsentStatus, UtcDateTime, CONSENT_PERMISSIONS};

pub const CONSENT_CANDIDATE_PATHS: [&str; 4] = [
    "/account-consents/request",
    "/api/v1/account-consents/request",
    "/api/v1/consents",
    "/consents",
];

const CONSENT_REASON: &str = "Account aggregation";

/// Who is asking for access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct ConsentRequestBody<'a> {
    client_id: &'a str,
    permissions: [&'static str; 3],
    reason: &'static str,
    requesting_bank: &'a str,
    requesting_bank_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConsentResponseBody {
    #[serde(default)]
    request_id: Option<String>,
    consent_id: String,
    status: ConsentStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    auto_approved: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ConsentStatusBody {
    consent_id: String,
    status: ConsentStatus,
    #[serde(default)]
    creation_date_time: Option<String>,
    #[serde(default)]
    status_update_date_time: Option<String>,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(default)]
    expiration_date_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConsentGateway {
    api: ApiClient,
    candidate_paths: Vec<String>,
}

impl ConsentGateway {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            candidate_paths: CONSENT_CANDIDATE_PATHS
                .iter()
                .map(|path| (*path).to_owned())
                .collect(),
        }
    }

    pub fn with_candidate_paths(mut self, paths: Vec<String>) -> Self {
        self.candidate_paths = paths;
        self
    }

    /// Posts the consent request to each candidate path in order. A 404
    /// moves on; any other failure is returned as is; all-404 yields
    /// `ConsentExhausted`.
    pub async fn create_account_consent(
        &self,
        token: &str,
        client_id: &str,
        party: &RequestingParty,
        base_url: &str,
    ) -> Result<Consent, ApiError> {
        let body = ConsentRequestBody {
            client_id,
            permissions: CONSENT_PERMISSIONS,
            reason: CONSENT_REASON,
            requesting_bank: &party.id,
            requesting_bank_name: &party.name,
        };
        let template = HttpRequest::post(base_url)
            .with_auth(&HttpAuth::BearerToken(token.to_owned()))
            .with_header("x-requesting-bank", &party.id)
            .with_header("accept", "application/json")
            .with_json(&body)?;
        let base_url = base_url.trim_end_matches('/');

        let response: ConsentResponseBody = probe_paths(
            &self.candidate_paths,
            |path| {
                let mut request = template.clone();
                request.url = format!("{base_url}{path}");
                debug!(url = %request.url, "requesting account consent");
                self.api.execute_json(request)
            },
            |tried, _| ApiError::consent_exhausted(tried),
        )
        .await?;

        info!(
            consent_id = %response.consent_id,
            status = %response.status,
            "account consent created"
        );
        Ok(Consent {
            consent_id: response.consent_id,
            status: response.status,
            message: response.message,
            request_id: response.request_id,
            auto_approved: response.auto_approved.unwrap_or(false),
        })
    }

    pub async fn get_consent_status(
        &self,
        token: Option<&str>,
        consent_id: &str,
        base_url: &str,
    ) -> Result<ConsentDetails, ApiError> {
        let request = consent_request(HttpRequest::get(consent_url(base_url, consent_id)), token);
        let body: ConsentStatusBody = self.api.execute_json(request).await?;

        Ok(ConsentDetails {
            consent_id: body.consent_id,
            status: body.status,
            created_at: parse_optional_timestamp(body.creation_date_time)?,
            status_updated_at: parse_optional_timestamp(body.status_update_date_time)?,
            permissions: body.permissions.unwrap_or_default(),
            expires_at: parse_optional_timestamp(body.expiration_date_time)?,
        })
    }

    pub async fn revoke_consent(
        &self,
        token: Option<&str>,
        consent_id: &str,
        base_url: &str,
    ) -> Result<(), ApiError> {
        let request =
            consent_request(HttpRequest::delete(consent_url(base_url, consent_id)), token);
        self.api.execute(request).await?;
        info!(consent_id, "account consent revoked");
        Ok(())
    }
}

fn consent_url(base_url: &str, consent_id: &str) -> String {
    format!(
        "{}/api/v1/account-consents/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(consent_id)
    )
}

fn consent_request(request: HttpRequest, token: Option<&str>) -> HttpRequest {
    let request = request.with_header("accept", "application/json");
    match token {
        Some(token) => request.with_auth(&HttpAuth::BearerToken(token.to_owned())),
        None => request,
    }
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<UtcDateTime>, ApiError> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(|value| {
            UtcDateTime::parse(&value).map_err(|error| ApiError::decoding(error.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http_client::{HttpMethod, HttpResponse};
    use crate::retry::RetryConfig;
    use crate::testing::ScriptedHttpClient;
    use crate::ApiErrorKind;

    const BASE: &str = "https://bank.test";

    fn party() -> RequestingParty {
        RequestingParty {
            id: String::from("team042"),
            name: String::from("ferrobank"),
        }
    }

    fn gateway(transport: Arc<ScriptedHttpClient>) -> ConsentGateway {
        ConsentGateway::new(ApiClient::new(transport).with_retry(RetryConfig::no_retry()))
    }

    #[tokio::test]
    async fn probing_stops_at_first_success() {
        let transport = Arc::new(ScriptedHttpClient::new().on(
            HttpMethod::Post,
            "https://bank.test/api/v1/consents",
            HttpResponse::ok_json(
                r#"{"consent_id":"c-1","status":"approved","auto_approved":true}"#,
            ),
        ));

        let consent = gateway(transport.clone())
            .create_account_consent("tok", "team042-1", &party(), BASE)
            .await
            .expect("third path answers");

        assert_eq!(consent.consent_id, "c-1");
        assert!(consent.auto_approved);
        assert_eq!(
            transport.urls(),
            vec![
                "https://bank.test/account-consents/request",
                "https://bank.test/api/v1/account-consents/request",
                "https://bank.test/api/v1/consents",
            ]
        );
        let first = &transport.requests()[0];
        assert_eq!(first.headers["x-requesting-bank"], "team042");
        assert!(first
            .body
            .as_deref()
            .is_some_and(|body| body.contains("ReadBalances")));
    }

    #[tokio::test]
    async fn all_not_found_is_exhaustion() {
        let transport = Arc::new(ScriptedHttpClient::new());

        let error = gateway(transport.clone())
            .create_account_consent("tok", "client", &party(), BASE)
            .await
            .expect_err("no route exists");

        assert_eq!(error.kind(), ApiErrorKind::ConsentExhausted);
        assert_eq!(transport.requests().len(), CONSENT_CANDIDATE_PATHS.len());
    }

    #[tokio::test]
    async fn non_404_failure_stops_probing() {
        let transport = Arc::new(ScriptedHttpClient::new().on(
            HttpMethod::Post,
            "https://bank.test/account-consents/request",
            HttpResponse::new(401, r#"{"message":"bad token"}"#),
        ));

        let error = gateway(transport.clone())
            .create_account_consent("tok", "client", &party(), BASE)
            .await
            .expect_err("unauthorized is terminal");

        assert_eq!(error.kind(), ApiErrorKind::Unauthorized);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn status_uses_fixed_route() {
        let transport = Arc::new(ScriptedHttpClient::new().on(
            HttpMethod::Get,
            "https://bank.test/api/v1/account-consents/c-1",
            HttpResponse::ok_json(
                r#"{"consent_id":"c-1","status":"revoked","creation_date_time":"2024-01-05T10:00:00Z","permissions":["ReadBalances"]}"#,
            ),
        ));

        let details = gateway(transport)
            .get_consent_status(None, "c-1", BASE)
            .await
            .expect("status");

        assert_eq!(details.status, ConsentStatus::Revoked);
        assert_eq!(details.permissions, vec![String::from("ReadBalances")]);
        assert!(details.created_at.is_some());
        assert!(details.expires_at.is_none());
    }
}
