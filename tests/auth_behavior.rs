//! Behavior-driven tests for provider authentication
//!
//! These tests verify token liveness, the refresh exchange and the
//! single-shot interactive authorization flow.

mod support;

use std::sync::Arc;
use std::time::Duration;

use ferrobank_core::{
    ApiClient, ApiErrorKind, AuthorizationOutcome, ConnectOutcome, HttpMethod, HttpResponse,
    InMemoryRepository, InMemorySecretStore, OAuthGateway, Repository, RetryConfig,
    SecretStore, SyncOrchestrator, TokenRecord, TokenResponse, TokenStore,
};
use support::{
    at, standard_provider, AbandoningUserAgent, CancellingUserAgent, RedirectingUserAgent,
    ScriptedTransport,
};

const TOKEN_URL: &str = "https://vbank.test/oauth/token";

fn gateway(transport: Arc<ScriptedTransport>) -> OAuthGateway {
    let secrets: Arc<dyn SecretStore> = Arc::new(InMemorySecretStore::new());
    OAuthGateway::new(
        ApiClient::new(transport).with_retry(RetryConfig::no_retry()),
        TokenStore::new(secrets.clone()),
        secrets,
    )
}

fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenResponse {
    TokenResponse {
        access_token: access.to_owned(),
        refresh_token: refresh.map(str::to_owned),
        id_token: None,
        token_type: String::from("Bearer"),
        expires_in: Some(expires_in),
        scope: None,
    }
}

// =============================================================================
// Token liveness
// =============================================================================

#[test]
fn token_is_due_for_refresh_five_minutes_before_expiry() {
    // Given: A one-hour token issued at noon
    let issued = at("2024-05-01T12:00:00Z");
    let record = TokenRecord::from_response(&token("a", None, 3600), issued);

    // Then: It is live until 12:55 and due for refresh afterwards
    assert!(!record.needs_refresh_at(issued + Duration::from_secs(3299)));
    assert!(record.needs_refresh_at(issued + Duration::from_secs(3300)));
    assert!(!record.is_expired_at(issued + Duration::from_secs(3599)));
    assert!(record.is_expired_at(issued + Duration::from_secs(3600)));
}

#[test]
fn token_without_expiry_never_needs_refresh() {
    // Given: A token envelope without expires_in
    let mut response = token("a", None, 0);
    response.expires_in = None;
    let record = TokenRecord::from_response(&response, at("2024-05-01T12:00:00Z"));

    // Then: It stays live indefinitely
    assert!(!record.needs_refresh_at(at("2030-01-01T00:00:00Z")));
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn when_token_is_near_expiry_it_is_refreshed_exactly_once() {
    // Given: A stored token that expired an hour ago with a refresh token
    let transport = Arc::new(ScriptedTransport::new().on(
        HttpMethod::Post,
        TOKEN_URL,
        HttpResponse::ok_json(r#"{"access_token":"fresh","token_type":"Bearer","expires_in":3600}"#),
    ));
    let oauth = gateway(transport.clone());
    let provider = standard_provider("vbank");
    oauth
        .tokens()
        .save_at(
            "vbank",
            &token("stale", Some("r-1"), 60),
            at("2024-01-01T00:00:00Z"),
        )
        .await;

    // When: The access token is requested twice
    let first = oauth.get_valid_access_token(&provider).await.expect("first");
    let second = oauth.get_valid_access_token(&provider).await.expect("second");

    // Then: One refresh happened and the old refresh token was kept
    assert_eq!(first, "fresh");
    assert_eq!(second, "fresh");
    assert_eq!(transport.count(HttpMethod::Post, TOKEN_URL), 1);
    assert_eq!(oauth.tokens().refresh_token("vbank").await.as_deref(), Some("r-1"));

    let form = transport.requests()[0].body.clone().expect("form body");
    assert!(form.contains("grant_type=refresh_token"));
    assert!(form.contains("refresh_token=r-1"));
    assert!(form.contains("client_secret=s3cret"));
}

#[tokio::test]
async fn when_refresh_reports_an_out_of_range_lifetime_the_token_never_expires() {
    // Given: A token endpoint answering with the largest possible expires_in
    let transport = Arc::new(ScriptedTransport::new().on(
        HttpMethod::Post,
        TOKEN_URL,
        HttpResponse::ok_json(
            r#"{"access_token":"forever","token_type":"Bearer","expires_in":18446744073709551615}"#,
        ),
    ));
    let oauth = gateway(transport.clone());
    let provider = standard_provider("vbank");
    oauth
        .tokens()
        .save_at(
            "vbank",
            &token("stale", Some("r-1"), 60),
            at("2024-01-01T00:00:00Z"),
        )
        .await;

    // When: The access token is requested
    let access = oauth.get_valid_access_token(&provider).await.expect("refreshed");

    // Then: The new token is stored without an expiry and is not refreshed again
    assert_eq!(access, "forever");
    let stored = oauth.tokens().get("vbank").await.expect("stored");
    assert_eq!(stored.expires_at, None);
    oauth.get_valid_access_token(&provider).await.expect("cached");
    assert_eq!(transport.count(HttpMethod::Post, TOKEN_URL), 1);
}

#[tokio::test]
async fn when_no_refresh_token_is_stored_refresh_fails_without_a_request() {
    // Given: No stored credentials
    let transport = Arc::new(ScriptedTransport::new());
    let oauth = gateway(transport.clone());

    // When: A valid token is requested
    let error = oauth
        .get_valid_access_token(&standard_provider("vbank"))
        .await
        .expect_err("no refresh token");

    // Then: The failure is reported without network traffic
    assert_eq!(error.kind(), ApiErrorKind::NoRefreshToken);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn when_refresh_is_rejected_the_unauthorized_error_propagates() {
    // Given: A provider that rejects the refresh token
    let transport = Arc::new(ScriptedTransport::new().on(
        HttpMethod::Post,
        TOKEN_URL,
        HttpResponse::new(401, r#"{"message":"refresh token revoked"}"#),
    ));
    let oauth = gateway(transport);
    oauth
        .tokens()
        .save_at("vbank", &token("stale", Some("r-1"), 60), at("2024-01-01T00:00:00Z"))
        .await;

    // When: A valid token is requested
    let error = oauth
        .get_valid_access_token(&standard_provider("vbank"))
        .await
        .expect_err("rejected");

    // Then: The caller sees an unauthorized error asking to reconnect
    assert_eq!(error.kind(), ApiErrorKind::Unauthorized);
    assert!(error.user_message().contains("reconnect"));
}

// =============================================================================
// Interactive authorization
// =============================================================================

#[tokio::test]
async fn when_user_approves_the_code_is_exchanged_with_the_pkce_verifier() {
    // Given: A provider token endpoint
    let transport = Arc::new(ScriptedTransport::new().on(
        HttpMethod::Post,
        TOKEN_URL,
        HttpResponse::ok_json(
            r#"{"access_token":"user-tok","refresh_token":"r-2","token_type":"Bearer","expires_in":900}"#,
        ),
    ));
    let oauth = gateway(transport.clone());
    let agent = RedirectingUserAgent {
        code: String::from("auth-code-1"),
    };

    // When: The user completes the flow
    let outcome = oauth
        .authenticate(&standard_provider("vbank"), &agent)
        .await
        .expect("authorized");

    // Then: Tokens are stored and the exchange carried code and verifier
    assert!(matches!(outcome, AuthorizationOutcome::Authorized(ref record) if record.access_token == "user-tok"));
    assert_eq!(oauth.tokens().refresh_token("vbank").await.as_deref(), Some("r-2"));
    let form = transport.requests()[0].body.clone().expect("form body");
    assert!(form.contains("grant_type=authorization_code"));
    assert!(form.contains("code=auth-code-1"));
    assert!(form.contains("code_verifier="));
}

#[tokio::test]
async fn when_user_cancels_nothing_is_exchanged_or_stored() {
    // Given: A gateway with no stored tokens
    let transport = Arc::new(ScriptedTransport::new());
    let oauth = gateway(transport.clone());
    let provider = standard_provider("vbank");

    // When: The user cancels, and separately closes the window
    let cancelled = oauth
        .authenticate(&provider, &CancellingUserAgent)
        .await
        .expect("cancel is not an error");
    let abandoned = oauth
        .authenticate(&provider, &AbandoningUserAgent)
        .await
        .expect("abandon is not an error");

    // Then: Both resolve as cancelled with no token traffic
    assert_eq!(cancelled, AuthorizationOutcome::Cancelled);
    assert_eq!(abandoned, AuthorizationOutcome::Cancelled);
    assert!(transport.requests().is_empty());
    assert_eq!(oauth.tokens().access_token("vbank").await, None);
}

#[tokio::test]
async fn when_connect_is_cancelled_the_provider_is_not_recorded() {
    // Given: An orchestrator over an empty repository
    let transport = Arc::new(ScriptedTransport::new());
    let repository = Arc::new(InMemoryRepository::new());
    let orchestrator = SyncOrchestrator::new(
        ApiClient::new(transport).with_retry(RetryConfig::no_retry()),
        repository.clone(),
        Arc::new(InMemorySecretStore::new()),
    )
    .with_providers([standard_provider("vbank")]);

    // When: The interactive connection is cancelled
    let outcome = orchestrator
        .connect_provider("vbank", Some(&CancellingUserAgent))
        .await
        .expect("cancel is not an error");

    // Then: No provider was persisted
    assert_eq!(outcome, ConnectOutcome::Cancelled);
    assert!(repository.get_provider("vbank").expect("read").is_none());
}
