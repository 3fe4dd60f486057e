//! Scripted transport shared by unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};

/// Answers requests by `(method, url without query)`. The last scripted
/// response of a route repeats; unscripted routes answer 404.
#[derive(Default)]
pub(crate) struct ScriptedHttpClient {
    routes: Mutex<Vec<(HttpMethod, String, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, method: HttpMethod, url: &str, response: HttpResponse) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes should not be poisoned");
            match routes
                .iter_mut()
                .find(|(route_method, route_url, _)| *route_method == method && route_url == url)
            {
                Some((_, _, queue)) => queue.push_back(response),
                None => routes.push((method, url.to_owned(), VecDeque::from([response]))),
            }
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("requests should not be poisoned")
            .clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.url).collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let path = request
            .url
            .split_once('?')
            .map_or(request.url.as_str(), |(path, _)| path)
            .to_owned();
        let method = request.method;
        self.requests
            .lock()
            .expect("requests should not be poisoned")
            .push(request);

        let mut routes = self.routes.lock().expect("routes should not be poisoned");
        let response = routes
            .iter_mut()
            .find(|(route_method, route_url, _)| *route_method == method && *route_url == path)
            .and_then(|(_, _, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
            .unwrap_or_else(|| HttpResponse::new(404, r#"{"message":"not found"}"#));
        Box::pin(async move { Ok(response) })
    }
}
