//! HTTP transport seam.
//!
//! The session manager and dispatcher never touch `reqwest` directly; they
//! hand a fully-built [`HttpRequest`] to an injected [`HttpTransport`].
//! [`ReqwestTransport`] is the production implementation.

use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::ProxmoxConfig;

use chrono::{DateTime, Utc};
use reqwest::header::COOKIE;
use reqwest::{Client, Method};
use std::time::Duration;

/// Name of the ticket cookie.
pub const AUTH_COOKIE: &str = "PVEAuthCookie";
/// Name of the CSRF header.
pub const CSRF_HEADER: &str = "CSRFPreventionToken";

/// Session cookie with the expiry the ticket was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCookie {
    pub name: String,
    pub value: String,
    pub expires: DateTime<Utc>,
}

impl AuthCookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// `name=value` for a `Cookie` header.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub cookie: Option<AuthCookie>,
    /// Form-encoded body; empty means no body.
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            cookie: None,
            form: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status and body, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body as text, lossy, truncated for log / error messages.
    pub fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(500).collect()
    }
}

/// Sends one request and returns the raw response.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> ProxmoxResult<HttpResponse>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ProxmoxConfig) -> ProxmoxResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProxmoxError::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> ProxmoxResult<HttpResponse> {
        let mut builder = self.client.request(request.method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = &request.cookie {
            if cookie.is_expired(Utc::now()) {
                return Err(ProxmoxError::auth(format!(
                    "{} expired at {}",
                    cookie.name, cookie.expires
                )));
            }
            builder = builder.header(COOKIE, cookie.header_value());
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(HttpResponse { status, body: body.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn cookie_header_and_expiry() {
        let now = Utc::now();
        let cookie = AuthCookie {
            name: AUTH_COOKIE.into(),
            value: "PVE:root@pam:ABC".into(),
            expires: now + ChronoDuration::minutes(120),
        };
        assert_eq!(cookie.header_value(), "PVEAuthCookie=PVE:root@pam:ABC");
        assert!(!cookie.is_expired(now));
        assert!(cookie.is_expired(now + ChronoDuration::minutes(121)));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut req = HttpRequest::new(Method::GET, "https://pve:8006/api2/json/nodes");
        req.headers.push((CSRF_HEADER.into(), "tok".into()));
        assert_eq!(req.header("csrfpreventiontoken"), Some("tok"));
        assert_eq!(req.header("x-other"), None);
    }

    #[test]
    fn body_snippet_is_bounded() {
        let resp = HttpResponse::new(500, vec![b'x'; 2000]);
        assert_eq!(resp.body_snippet().len(), 500);
        assert!(!resp.is_ok());
    }

    #[tokio::test]
    async fn reqwest_transport_refuses_expired_cookie() {
        let cfg = ProxmoxConfig { host: "pve.invalid".into(), ..Default::default() };
        let transport = ReqwestTransport::new(&cfg).unwrap();
        let mut req = HttpRequest::new(Method::GET, "https://pve.invalid:8006/api2/json/nodes");
        req.cookie = Some(AuthCookie {
            name: AUTH_COOKIE.into(),
            value: "PVE:root@pam:OLD".into(),
            expires: Utc::now() - ChronoDuration::minutes(1),
        });

        let err = transport.send(req).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ProxmoxErrorKind::Auth);
        assert!(err.message.starts_with(AUTH_COOKIE));
    }

    #[test]
    fn reqwest_transport_builds() {
        let cfg = ProxmoxConfig { host: "pve".into(), insecure: true, ..Default::default() };
        assert!(ReqwestTransport::new(&cfg).is_ok());
    }
}
