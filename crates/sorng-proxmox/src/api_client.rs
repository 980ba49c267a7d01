//! Request dispatcher for the Proxmox VE REST API.
//!
//! Targets `https://{host}:{port}/api2/json/{path}`. Every call first asks
//! the [`SessionManager`] for a usable ticket (which may log in), then
//! attaches the ticket cookie and, for GET/POST/DELETE, the CSRF header.
//! [`ProxmoxApiClient::dispatch`] returns status and body uninterpreted;
//! [`ProxmoxApiClient::call`] layers status checking and envelope decoding
//! on top for the resource operations.

use crate::auth::{SessionManager, AUTH_PATH};
use crate::context::{Context, ContextRef};
use crate::decode::{decode, Attach};
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, CSRF_HEADER};
use crate::types::ProxmoxConfig;

use log::debug;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// API root below the host.
pub const API_PREFIX: &str = "/api2/json/";

/// Form values for a request body.
pub type FormValues = Vec<(String, String)>;

/// Proxmox VE API client.
pub struct ProxmoxApiClient {
    base_url: Url,
    session: SessionManager,
}

impl fmt::Debug for ProxmoxApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        f.debug_struct("ProxmoxApiClient")
            .field("host", &config.host)
            .field("port", &config.port)
            .field("user", &config.login_name())
            .finish()
    }
}

impl ProxmoxApiClient {
    /// Build a client over `reqwest` (does NOT log in yet).
    pub fn new(config: ProxmoxConfig) -> ProxmoxResult<Arc<Self>> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client over any transport.
    pub fn with_transport(
        config: ProxmoxConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ProxmoxResult<Arc<Self>> {
        config.validate()?;
        let base_url = Url::parse(&format!("https://{}:{}", config.host, config.port))
            .map_err(|e| ProxmoxError::validation("host", format!("not a valid host: {e}")))?;
        let auth_url = Self::join(&base_url, AUTH_PATH);
        Ok(Arc::new(Self {
            base_url,
            session: SessionManager::new(config, auth_url, transport),
        }))
    }

    fn join(base: &Url, path: &str) -> String {
        let mut url = base.clone();
        url.set_path(&format!("{API_PREFIX}{}", path.trim_start_matches('/')));
        url.to_string()
    }

    /// Absolute target for an API path such as `nodes/pve1/lxc`.
    pub fn api_url(&self, path: &str) -> String {
        Self::join(&self.base_url, path)
    }

    pub fn host(&self) -> &str {
        &self.session.config().host
    }

    pub fn config(&self) -> &ProxmoxConfig {
        self.session.config()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Root of the ownership chain for entities fetched by this client.
    pub fn root(self: &Arc<Self>) -> ContextRef {
        Context::session(self.clone())
    }

    /// Whether `method` carries the CSRF header.
    pub fn needs_csrf(method: &Method) -> bool {
        [Method::GET, Method::POST, Method::DELETE].contains(method)
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Send an authenticated request; status and body are returned as-is.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> ProxmoxResult<HttpResponse> {
        let ticket = self.session.ensure_valid().await?;

        let mut request = HttpRequest::new(method.clone(), self.api_url(path));
        request.cookie = Some(self.session.auth_cookie(&ticket));
        if Self::needs_csrf(&method) {
            request.headers.push((CSRF_HEADER.to_string(), ticket.csrf_token.clone()));
        }
        request.form = form.to_vec();

        let resp = self.session.transport().send(request).await?;
        debug!("Proxmox {method} {path} -> {}", resp.status);
        Ok(resp)
    }

    /// Dispatch, require HTTP 200, and decode the envelope into `T`.
    pub async fn call<T>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
        owner: Option<&ContextRef>,
    ) -> ProxmoxResult<T>
    where
        T: DeserializeOwned + Attach,
    {
        let resp = Self::check_status(self.dispatch(method, path, form).await?)?;
        decode(&resp.body, resp.status, owner)
    }

    /// GET without a body.
    pub async fn get<T>(&self, path: &str, owner: Option<&ContextRef>) -> ProxmoxResult<T>
    where
        T: DeserializeOwned + Attach,
    {
        self.call(Method::GET, path, &[], owner).await
    }

    /// Map any status other than 200 to an `HttpStatus` error.
    pub fn check_status(resp: HttpResponse) -> ProxmoxResult<HttpResponse> {
        if resp.is_ok() {
            return Ok(resp);
        }
        Err(ProxmoxError::http_status(
            resp.status,
            format!("HTTP Request return error: {}: {}", resp.status, resp.body_snippet()),
        ))
    }
}
