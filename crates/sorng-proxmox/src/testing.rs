//! Scripted transport for unit tests.

use crate::api_client::{ProxmoxApiClient, API_PREFIX};
use crate::auth::AUTH_PATH;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::ProxmoxConfig;

use reqwest::Method;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<HttpResponse>,
}

/// Answers the login endpoint with a configurable response and every other
/// path from registered routes (404 when none matches). Queued responses
/// for one route are served in order; the last one repeats.
#[derive(Default)]
pub(crate) struct MockTransport {
    login: Mutex<Option<HttpResponse>>,
    login_delay: Mutex<Duration>,
    routes: Mutex<Vec<Route>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<HttpRequest>>,
    logins: AtomicUsize,
}

pub(crate) fn login_ok(ticket: &str) -> HttpResponse {
    envelope(json!({
        "ticket": ticket,
        "CSRFPreventionToken": format!("{ticket}-csrf"),
        "username": "root@pam",
        "cap": {"vms": {"VM.Audit": 1}},
    }))
}

pub(crate) fn envelope(data: serde_json::Value) -> HttpResponse {
    HttpResponse::new(200, json!({ "data": data }).to_string())
}

/// Client over a fresh mock that issues ticket `T1`.
pub(crate) fn test_client() -> (Arc<ProxmoxApiClient>, Arc<MockTransport>) {
    let mock = MockTransport::with_login(login_ok("T1"));
    let config = ProxmoxConfig {
        host: "pve".into(),
        username: "root".into(),
        password: "secret".into(),
        ..Default::default()
    };
    let client = ProxmoxApiClient::with_transport(config, mock.clone())
        .expect("test client");
    (client, mock)
}

fn api_path(url: &str) -> &str {
    url.split_once(API_PREFIX).map(|(_, p)| p).unwrap_or(url)
}

impl MockTransport {
    pub fn with_login(resp: HttpResponse) -> Arc<Self> {
        let mock = Self::default();
        *mock.login.lock().unwrap() = Some(resp);
        Arc::new(mock)
    }

    pub fn set_login(&self, resp: HttpResponse) {
        *self.login.lock().unwrap() = Some(resp);
    }

    pub fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = delay;
    }

    /// Queue a response for `method path`.
    pub fn on(&self, method: Method, path: &str, resp: HttpResponse) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.path == path) {
            Some(route) => route.responses.push_back(resp),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([resp]),
            }),
        }
    }

    /// Make `path` fail at the transport level.
    pub fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Non-login requests to `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| api_path(&r.url) == path)
            .collect()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> ProxmoxResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let path = api_path(&request.url).to_string();

        if path == AUTH_PATH {
            self.logins.fetch_add(1, Ordering::SeqCst);
            let delay = *self.login_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let login = self.login.lock().unwrap().clone();
            return Ok(login.unwrap_or_else(|| HttpResponse::new(401, "no login scripted")));
        }

        if self.failing.lock().unwrap().contains(&path) {
            return Err(ProxmoxError::transport(format!("Connection refused: {path}")));
        }

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == path);
        Ok(match route {
            Some(route) if route.responses.len() > 1 => {
                route.responses.pop_front().unwrap_or_else(|| HttpResponse::new(500, ""))
            }
            Some(route) => route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| HttpResponse::new(500, "")),
            None => HttpResponse::new(404, r#"{"data":null}"#),
        })
    }
}
