//! Shared test utilities: a scripted in-memory transport.

use std::collections::{HashMap, VecDeque};
use std::future::{Future, ready};
use std::sync::Mutex;

use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;

use crate::github::{ApiRequest, ApiResponse, GitHubTransport, TransportError};

pub const TEST_API_URL: &str = "https://api.github.com";

/// Rate-limit headers as GitHub sends them.
pub fn rate_limit_headers(remaining: u64, limit: u64, reset: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let used = limit.saturating_sub(remaining);
    for (name, value) in [
        ("x-ratelimit-remaining", remaining.to_string()),
        ("x-ratelimit-limit", limit.to_string()),
        ("x-ratelimit-reset", reset.to_string()),
        ("x-ratelimit-used", used.to_string()),
    ] {
        headers.insert(name, HeaderValue::from_str(&value).unwrap());
    }
    headers
}

/// One canned reply.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Json(Value, HeaderMap),
    Status {
        status: u16,
        message: Option<String>,
        headers: HeaderMap,
    },
    Network(String),
}

impl ScriptedResponse {
    pub fn json(body: Value) -> Self {
        ScriptedResponse::Json(body, HeaderMap::new())
    }

    pub fn status(status: u16) -> Self {
        ScriptedResponse::Status {
            status,
            message: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn status_with_message(status: u16, message: &str) -> Self {
        ScriptedResponse::Status {
            status,
            message: Some(message.to_string()),
            headers: HeaderMap::new(),
        }
    }

    pub fn network(message: &str) -> Self {
        ScriptedResponse::Network(message.to_string())
    }
}

/// A transport that replays scripted responses per `(method, path)`.
///
/// Paths are matched without their query string. Each route replays its
/// responses in order and then keeps repeating the last one. Unscripted routes
/// answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        self,
        method: Method,
        path: &str,
        responses: impl IntoIterator<Item = ScriptedResponse>,
    ) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), responses.into_iter().collect());
        self
    }

    /// Every request sent so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests sent to `(method, path)`, ignoring query strings.
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && strip_query(&r.path) == path)
            .count()
    }

    /// Bodies of every request sent to `(method, path)`.
    pub fn bodies(&self, method: &Method, path: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && strip_query(&r.path) == path)
            .filter_map(|r| r.body.clone())
            .collect()
    }

    fn reply(&self, request: &ApiRequest) -> Result<ApiResponse<Value>, TransportError> {
        let key = (request.method.clone(), strip_query(&request.path).to_string());
        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        let descriptor = Some(request.descriptor(TEST_API_URL));
        match scripted {
            Some(ScriptedResponse::Json(body, headers)) => Ok(ApiResponse::new(body, headers)),
            Some(ScriptedResponse::Status {
                status,
                message,
                headers,
            }) => Err(TransportError::http(status, headers, descriptor, message)),
            Some(ScriptedResponse::Network(message)) => {
                Err(TransportError::without_response(message, descriptor))
            }
            None => Err(TransportError::http(
                404,
                HeaderMap::new(),
                descriptor,
                Some("Not Found".to_string()),
            )),
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

impl GitHubTransport for ScriptedTransport {
    fn base_url(&self) -> &str {
        TEST_API_URL
    }

    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse<Value>, TransportError>> + Send {
        self.calls.lock().unwrap().push(request.clone());
        ready(self.reply(&request))
    }
}
