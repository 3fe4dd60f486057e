//! Token acquisition and refresh against provider token endpoints.
//!
//! | Flow | Used by | Request |
//! |------|---------|---------|
//! | Client credentials | gateway providers | form `POST` to the shared gateway token URL |
//! | Client credentials | standard providers | `POST {base}/auth/bank-token?client_id&client_secret` |
//! | Authorization code + PKCE | standard providers, interactive | form `POST` to the provider token endpoint |
//! | Refresh | any provider holding a refresh token | form `POST` to the provider token endpoint |
//!
//! The interactive flow is single-shot: [`AuthorizationHandle`] resolves it
//! exactly once, whichever of redirect, failure or cancellation comes first.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::api_client::ApiClient;
use crate::http_client::HttpRequest;
use crate::pkce::{generate_pkce_pair, generate_state, PkcePair};
use crate::secret_store::{client_secret_key, SecretStore};
use crate::token_store::TokenStore;
use crate::{ApiError, ProviderDescriptor, ProviderVariant, TokenRecord, TokenResponse};

pub const DEFAULT_GATEWAY_TOKEN_URL: &str =
    "https://auth.bankingapi.ru/auth/realms/kubernetes/protocol/openid-connect/token";

/// Everything needed to drive one interactive authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub pkce: PkcePair,
}

/// Terminal result of an interactive authorization. Errors travel in the
/// surrounding `Result`; cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Authorized(TokenRecord),
    Cancelled,
}

#[derive(Debug)]
enum AuthorizationSignal {
    Redirect(String),
    Failed(ApiError),
    Cancelled,
}

/// Cloneable resolver handed to the [`UserAgent`]. The first call to
/// `complete`, `fail` or `cancel` wins; later calls return `false`.
#[derive(Debug, Clone)]
pub struct AuthorizationHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<AuthorizationSignal>>>>,
}

impl AuthorizationHandle {
    fn pair() -> (Self, oneshot::Receiver<AuthorizationSignal>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            receiver,
        )
    }

    /// Resolves with the redirect URL the provider sent the user agent to.
    pub fn complete(&self, redirect_url: impl Into<String>) -> bool {
        self.resolve(AuthorizationSignal::Redirect(redirect_url.into()))
    }

    pub fn fail(&self, error: ApiError) -> bool {
        self.resolve(AuthorizationSignal::Failed(error))
    }

    pub fn cancel(&self) -> bool {
        self.resolve(AuthorizationSignal::Cancelled)
    }

    pub fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn resolve(&self, signal: AuthorizationSignal) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => sender.send(signal).is_ok(),
            None => false,
        }
    }
}

/// Presents the authorization URL to the user (browser, console, test
/// double) and resolves `handle` when the flow ends. Dropping every clone of
/// the handle without resolving it counts as cancellation.
pub trait UserAgent: Send + Sync {
    fn launch<'a>(
        &'a self,
        authorization_url: &'a str,
        handle: AuthorizationHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct OAuthGateway {
    api: ApiClient,
    tokens: TokenStore,
    secrets: Arc<dyn SecretStore>,
    gateway_token_url: String,
}

impl OAuthGateway {
    pub fn new(api: ApiClient, tokens: TokenStore, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            api,
            tokens,
            secrets,
            gateway_token_url: String::from(DEFAULT_GATEWAY_TOKEN_URL),
        }
    }

    pub fn with_gateway_token_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_token_url = url.into();
        self
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// The descriptor's secret, or the one saved at connection time.
    pub fn client_secret(&self, descriptor: &ProviderDescriptor) -> Option<String> {
        if let Some(secret) = descriptor
            .oauth
            .client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
        {
            return Some(secret.to_owned());
        }
        match self.secrets.get(&client_secret_key(&descriptor.id)) {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok(),
            Ok(None) => None,
            Err(error) => {
                warn!(provider = %descriptor.id, %error, "failed to read client secret");
                None
            }
        }
    }

    pub fn store_client_secret(&self, provider_id: &str, secret: &str) {
        if let Err(error) = self
            .secrets
            .save(&client_secret_key(provider_id), secret.as_bytes())
        {
            warn!(provider = provider_id, %error, "failed to persist client secret");
        }
    }

    /// Client-credentials exchange. Gateway providers post a form to the
    /// shared gateway token URL; standard providers pass the credentials as
    /// query parameters to their bank-token endpoint.
    pub async fn client_credentials(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<TokenRecord, ApiError> {
        let client_id = descriptor.oauth.client_id.as_str();
        let secret = self.client_secret(descriptor).ok_or_else(|| {
            ApiError::invalid_provider_configuration(format!(
                "provider '{}' has no client secret for the client-credentials exchange",
                descriptor.id
            ))
        })?;

        let request = match descriptor.variant {
            ProviderVariant::Gateway => HttpRequest::post(&self.gateway_token_url)
                .with_header("accept", "application/json")
                .with_form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id),
                    ("client_secret", &secret),
                ]),
            ProviderVariant::Standard => {
                HttpRequest::post(format!("{}/auth/bank-token", descriptor.base_url))
                    .with_header("accept", "application/json")
                    .with_query("client_id", client_id)
                    .with_query("client_secret", &secret)
            }
        };

        let response: TokenResponse = self.api.execute_json(request).await?;
        let record = self.tokens.save(&descriptor.id, &response).await;
        info!(
            provider = %descriptor.id,
            variant = %descriptor.variant,
            expires_in = ?response.expires_in,
            "obtained client-credentials token"
        );
        Ok(record)
    }

    pub fn authorization_request(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<AuthorizationRequest, ApiError> {
        let oauth = &descriptor.oauth;
        let pkce = generate_pkce_pair();
        let state = generate_state();
        let scope = oauth.scopes.join(" ");

        let url = reqwest::Url::parse_with_params(
            &oauth.authorization_endpoint,
            &[
                ("client_id", oauth.client_id.as_str()),
                ("redirect_uri", oauth.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", pkce.code_challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|error| {
            ApiError::invalid_url(format!(
                "invalid authorization endpoint '{}': {error}",
                oauth.authorization_endpoint
            ))
        })?;

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            pkce,
        })
    }

    /// Runs the interactive authorization-code flow through `user_agent`.
    /// Tokens are stored only after a successful code exchange.
    pub async fn authenticate(
        &self,
        descriptor: &ProviderDescriptor,
        user_agent: &dyn UserAgent,
    ) -> Result<AuthorizationOutcome, ApiError> {
        let request = self.authorization_request(descriptor)?;
        let (handle, receiver) = AuthorizationHandle::pair();

        user_agent.launch(&request.url, handle).await;

        let redirect_url = match receiver.await {
            Ok(AuthorizationSignal::Redirect(url)) => url,
            Ok(AuthorizationSignal::Failed(error)) => return Err(error),
            Ok(AuthorizationSignal::Cancelled) | Err(_) => {
                info!(provider = %descriptor.id, "authorization cancelled by user");
                return Ok(AuthorizationOutcome::Cancelled);
            }
        };

        let code = authorization_code_from_redirect(&redirect_url, &request.state)?;
        let record = self
            .exchange_code(descriptor, &code, &request.pkce.code_verifier)
            .await?;
        Ok(AuthorizationOutcome::Authorized(record))
    }

    pub async fn exchange_code(
        &self,
        descriptor: &ProviderDescriptor,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenRecord, ApiError> {
        let oauth = &descriptor.oauth;
        let secret = self.client_secret(descriptor);
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("client_id", oauth.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let request = HttpRequest::post(&oauth.token_endpoint)
            .with_header("accept", "application/json")
            .with_form(&form);
        let response: TokenResponse = self.api.execute_json(request).await?;
        info!(provider = %descriptor.id, "authorization code exchanged");
        Ok(self.tokens.save(&descriptor.id, &response).await)
    }

    /// Exchanges the stored refresh token. Fails with `NoRefreshToken` when
    /// none is stored; on success the stored record is replaced.
    pub async fn refresh_token(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<TokenRecord, ApiError> {
        let refresh_token = self
            .tokens
            .refresh_token(&descriptor.id)
            .await
            .ok_or_else(|| ApiError::no_refresh_token(&descriptor.id))?;

        let oauth = &descriptor.oauth;
        let secret = self.client_secret(descriptor);
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
        ];
        if let Some(secret) = secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let request = HttpRequest::post(&oauth.token_endpoint)
            .with_header("accept", "application/json")
            .with_form(&form);
        let mut response: TokenResponse = self.api.execute_json(request).await?;
        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh_token);
        }
        debug!(provider = %descriptor.id, "access token refreshed");
        Ok(self.tokens.save(&descriptor.id, &response).await)
    }

    /// Refreshes first when the stored token is missing, expired or near
    /// expiry; otherwise returns the cached access token.
    pub async fn get_valid_access_token(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<String, ApiError> {
        if self.tokens.needs_refresh(&descriptor.id).await {
            self.refresh_token(descriptor).await?;
        }
        self.tokens
            .access_token(&descriptor.id)
            .await
            .ok_or_else(|| ApiError::no_access_token(&descriptor.id))
    }

    /// Variant-aware token acquisition used by sync. Gateway providers
    /// always re-run client credentials; standard providers refresh, or fall
    /// back to the bank-token exchange when no refresh token is held and a
    /// client secret is available.
    pub async fn access_token_for(
        &self,
        descriptor: &ProviderDescriptor,
    ) -> Result<String, ApiError> {
        if !self.tokens.needs_refresh(&descriptor.id).await {
            return self
                .tokens
                .access_token(&descriptor.id)
                .await
                .ok_or_else(|| ApiError::no_access_token(&descriptor.id));
        }

        let use_client_credentials = match descriptor.variant {
            ProviderVariant::Gateway => true,
            ProviderVariant::Standard => {
                self.tokens.refresh_token(&descriptor.id).await.is_none()
                    && self.client_secret(descriptor).is_some()
            }
        };

        if use_client_credentials {
            Ok(self.client_credentials(descriptor).await?.access_token)
        } else {
            self.get_valid_access_token(descriptor).await
        }
    }

    /// Drops stored tokens and the stored client secret.
    pub async fn disconnect(&self, provider_id: &str) {
        self.tokens.delete(provider_id).await;
        if let Err(error) = self.secrets.delete(&client_secret_key(provider_id)) {
            warn!(provider = provider_id, %error, "failed to delete client secret");
        }
    }
}

/// Pulls `code` out of the redirect URL after checking `state`.
pub fn authorization_code_from_redirect(
    redirect_url: &str,
    expected_state: &str,
) -> Result<String, ApiError> {
    let url = reqwest::Url::parse(redirect_url)
        .map_err(|error| ApiError::invalid_url(format!("invalid redirect url: {error}")))?;

    let mut code = None;
    let mut state = None;
    let mut denial = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denial = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(denial) = denial {
        return Err(ApiError::unauthorized(format!(
            "provider denied authorization: {denial}"
        )));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(ApiError::invalid_response(
            "authorization redirect carried an unexpected state",
        ));
    }
    code.filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::invalid_response("authorization redirect carried no code"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiErrorKind;

    #[test]
    fn redirect_code_requires_matching_state() {
        let code = authorization_code_from_redirect(
            "ferrobank://oauth/callback?code=abc&state=s1",
            "s1",
        )
        .expect("code");
        assert_eq!(code, "abc");

        let error = authorization_code_from_redirect(
            "ferrobank://oauth/callback?code=abc&state=other",
            "s1",
        )
        .expect_err("state mismatch");
        assert_eq!(error.kind(), ApiErrorKind::InvalidResponse);
    }

    #[test]
    fn provider_denial_is_unauthorized() {
        let error = authorization_code_from_redirect(
            "ferrobank://oauth/callback?error=access_denied&state=s1",
            "s1",
        )
        .expect_err("denied");
        assert_eq!(error.kind(), ApiErrorKind::Unauthorized);
    }

    #[test]
    fn handle_resolves_exactly_once() {
        let (handle, mut receiver) = AuthorizationHandle::pair();
        let racer = handle.clone();

        assert!(handle.cancel());
        assert!(!racer.complete("ferrobank://oauth/callback?code=late"));
        assert!(racer.is_resolved());
        assert!(matches!(
            receiver.try_recv(),
            Ok(AuthorizationSignal::Cancelled)
        ));
    }
}
