//! Aggregate service façade for the Proxmox crate.
//!
//! `ProxmoxService` owns the connected `ProxmoxApiClient` and exposes the
//! cluster-level operations. Embedders share it as
//! `ProxmoxServiceState = Arc<Mutex<ProxmoxService>>`.

use crate::api_client::ProxmoxApiClient;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::transport::HttpTransport;
use crate::types::*;

use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe handle for the embedding application.
pub type ProxmoxServiceState = Arc<Mutex<ProxmoxService>>;

#[derive(Default)]
pub struct ProxmoxService {
    client: Option<Arc<ProxmoxApiClient>>,
    config: Option<ProxmoxConfig>,
}

impl ProxmoxService {
    /// Create a new (disconnected) service.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_state() -> ProxmoxServiceState {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn require_client(&self) -> ProxmoxResult<&Arc<ProxmoxApiClient>> {
        self.client.as_ref().ok_or_else(|| {
            ProxmoxError::auth("Not connected to Proxmox VE. Call connect first.")
        })
    }

    /// Connected client, for node / container / task operations.
    pub fn client(&self) -> ProxmoxResult<Arc<ProxmoxApiClient>> {
        self.require_client().cloned()
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Validate `config` and log in. Returns the server version string.
    pub async fn connect(&mut self, config: ProxmoxConfig) -> ProxmoxResult<String> {
        let client = ProxmoxApiClient::new(config.clone())?;
        self.finish_connect(client, config).await
    }

    /// Same as [`connect`](Self::connect) over a caller-supplied transport.
    pub async fn connect_with_transport(
        &mut self,
        config: ProxmoxConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> ProxmoxResult<String> {
        let client = ProxmoxApiClient::with_transport(config.clone(), transport)?;
        self.finish_connect(client, config).await
    }

    async fn finish_connect(
        &mut self,
        client: Arc<ProxmoxApiClient>,
        config: ProxmoxConfig,
    ) -> ProxmoxResult<String> {
        client.session().ensure_valid().await?;
        let version = client.version().await?;
        info!("Connected to Proxmox VE {} at {}", version.version, config.host);
        self.client = Some(client);
        self.config = Some(config);
        Ok(version.version)
    }

    /// Drop the session. The ticket is forgotten locally; PVE has no
    /// logout endpoint.
    pub async fn disconnect(&mut self) -> ProxmoxResult<()> {
        if let Some(client) = self.client.take() {
            client.session().clear().await;
        }
        self.config = None;
        Ok(())
    }

    /// Get current config (without password).
    pub fn get_config(&self) -> Option<ProxmoxConfigSafe> {
        self.config.as_ref().map(|c| ProxmoxConfigSafe {
            host: c.host.clone(),
            port: c.port,
            username: c.username.clone(),
            realm: c.realm.clone(),
            insecure: c.insecure,
        })
    }

    // ── Cluster ─────────────────────────────────────────────────────

    pub async fn version(&self) -> ProxmoxResult<VersionInfo> {
        self.require_client()?.version().await
    }

    pub async fn list_nodes(&self) -> ProxmoxResult<Vec<Node>> {
        self.require_client()?.nodes().await
    }

    pub async fn get_node(&self, name: &str) -> ProxmoxResult<Node> {
        self.require_client()?.node(name).await
    }

    pub async fn list_storage(&self) -> ProxmoxResult<Vec<Storage>> {
        self.require_client()?.storage_list().await
    }

    pub async fn task_status(&self, upid: &TaskId) -> ProxmoxResult<TaskStatus> {
        self.require_client()?.task_status(upid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxmoxErrorKind;
    use crate::testing::{envelope, login_ok, MockTransport};
    use crate::transport::HttpResponse;
    use reqwest::Method;
    use serde_json::json;

    fn config() -> ProxmoxConfig {
        ProxmoxConfig {
            host: "pve".into(),
            username: "root".into(),
            password: "secret".into(),
            ..Default::default()
        }
    }

    fn mock() -> Arc<MockTransport> {
        let mock = MockTransport::with_login(login_ok("T1"));
        mock.on(Method::GET, "version", envelope(json!({"version": "8.1.4"})));
        mock.on(Method::GET, "nodes", envelope(json!([{"node": "pve1"}])));
        mock
    }

    #[tokio::test]
    async fn connect_logs_in_eagerly() {
        let mock = mock();
        let mut svc = ProxmoxService::new();
        assert!(!svc.is_connected());

        let version = svc.connect_with_transport(config(), mock.clone()).await.unwrap();
        assert_eq!(version, "8.1.4");
        assert!(svc.is_connected());
        assert_eq!(mock.login_count(), 1);

        let safe = svc.get_config().unwrap();
        assert_eq!(safe.host, "pve");
        assert_eq!(safe.realm, "pam");
        assert_eq!(svc.list_nodes().await.unwrap()[0].node, "pve1");
        assert_eq!(mock.login_count(), 1);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_network() {
        let mock = mock();
        let mut svc = ProxmoxService::new();
        let cfg = ProxmoxConfig { host: String::new(), ..config() };
        let err = svc.connect_with_transport(cfg, mock.clone()).await.unwrap_err();
        assert_eq!(err.validation_field(), Some("host"));
        assert!(mock.requests().is_empty());
        assert!(!svc.is_connected());
    }

    #[tokio::test]
    async fn failed_login_leaves_service_disconnected() {
        let mock = mock();
        mock.set_login(HttpResponse::new(401, "authentication failure"));
        let mut svc = ProxmoxService::new();
        let err = svc.connect_with_transport(config(), mock).await.unwrap_err();
        assert_eq!(err.kind, ProxmoxErrorKind::Auth);
        assert!(!svc.is_connected());
        assert!(svc.get_config().is_none());
    }

    #[tokio::test]
    async fn disconnect_and_require_client() {
        let state = ProxmoxService::new_state();
        let mut svc = state.lock().await;
        svc.connect_with_transport(config(), mock()).await.unwrap();
        svc.disconnect().await.unwrap();

        assert!(!svc.is_connected());
        assert!(svc.get_config().is_none());
        let err = svc.version().await.unwrap_err();
        assert_eq!(err.kind, ProxmoxErrorKind::Auth);
        assert!(svc.client().is_err());
    }
}
