//! Shared fixtures for the behaviour tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use ferrobank_core::{
    AuthorizationHandle, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    OAuthConfig, ProviderDescriptor, ProviderVariant, UserAgent, UtcDateTime,
};

pub const TOKEN: &str = r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#;

/// Transport answering by `(method, url without query)`. Queued responses
/// are served in order and the last one repeats; unknown routes answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(HttpMethod, String, VecDeque<Result<HttpResponse, HttpError>>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: HttpMethod, url: &str, response: HttpResponse) -> Self {
        self.push(method, url, Ok(response))
    }

    pub fn fail(self, method: HttpMethod, url: &str, error: HttpError) -> Self {
        self.push(method, url, Err(error))
    }

    fn push(
        self,
        method: HttpMethod,
        url: &str,
        outcome: Result<HttpResponse, HttpError>,
    ) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes
                .iter_mut()
                .find(|(route_method, route_url, _)| *route_method == method && route_url == url)
            {
                Some((_, _, queue)) => queue.push_back(outcome),
                None => routes.push((method, url.to_owned(), VecDeque::from([outcome]))),
            }
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| strip_query(&request.url).to_owned())
            .collect()
    }

    pub fn count(&self, method: HttpMethod, url: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && strip_query(&request.url) == url)
            .count()
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

impl HttpClient for ScriptedTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let path = strip_query(&request.url).to_owned();
        let method = request.method;
        self.requests.lock().expect("requests lock").push(request);

        let mut routes = self.routes.lock().expect("routes lock");
        let outcome = routes
            .iter_mut()
            .find(|(route_method, route_url, _)| *route_method == method && *route_url == path)
            .and_then(|(_, _, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
            .unwrap_or_else(|| Ok(HttpResponse::new(404, r#"{"message":"not found"}"#)));
        Box::pin(async move { outcome })
    }
}

/// Completes the authorization with `code`, echoing the state it was given.
pub struct RedirectingUserAgent {
    pub code: String,
}

impl UserAgent for RedirectingUserAgent {
    fn launch<'a>(
        &'a self,
        authorization_url: &'a str,
        handle: AuthorizationHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let url = reqwest::Url::parse(authorization_url).expect("authorization url");
            let state = url
                .query_pairs()
                .find(|(name, _)| name == "state")
                .map(|(_, value)| value.into_owned())
                .expect("state parameter");
            handle.complete(format!(
                "ferrobank://oauth/callback?code={}&state={state}",
                self.code
            ));
        })
    }
}

/// Closes the flow without a redirect.
pub struct CancellingUserAgent;

impl UserAgent for CancellingUserAgent {
    fn launch<'a>(
        &'a self,
        _authorization_url: &'a str,
        handle: AuthorizationHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            handle.cancel();
        })
    }
}

/// Returns without touching the handle, as a closed browser window would.
pub struct AbandoningUserAgent;

impl UserAgent for AbandoningUserAgent {
    fn launch<'a>(
        &'a self,
        _authorization_url: &'a str,
        handle: AuthorizationHandle,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            drop(handle);
        })
    }
}

pub fn at(value: &str) -> UtcDateTime {
    UtcDateTime::parse(value).expect("timestamp")
}

pub fn standard_provider(id: &str) -> ProviderDescriptor {
    let base_url = format!("https://{id}.test");
    ProviderDescriptor::new(
        id,
        id.to_uppercase(),
        base_url.clone(),
        OAuthConfig::for_base_url(&base_url, "team042").with_client_secret("s3cret"),
        ProviderVariant::Standard,
    )
    .expect("descriptor")
}
