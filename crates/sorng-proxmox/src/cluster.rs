//! Cluster-level queries. Entities returned here are owned by the session.

use crate::api_client::ProxmoxApiClient;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::*;

use std::sync::Arc;

impl ProxmoxApiClient {
    // ── Version ─────────────────────────────────────────────────────

    pub async fn version(&self) -> ProxmoxResult<VersionInfo> {
        self.get("version", None).await
    }

    // ── Nodes ───────────────────────────────────────────────────────

    /// Cluster members.
    pub async fn nodes(self: &Arc<Self>) -> ProxmoxResult<Vec<Node>> {
        self.get("nodes", Some(&self.root())).await
    }

    pub async fn node(self: &Arc<Self>, name: &str) -> ProxmoxResult<Node> {
        self.nodes()
            .await?
            .into_iter()
            .find(|n| n.node == name)
            .ok_or_else(|| ProxmoxError::not_found(format!("Node {name} not found")))
    }

    // ── Storage ─────────────────────────────────────────────────────

    /// Storage definitions of the whole cluster. These are not bound to a
    /// node, so their content cannot be listed.
    pub async fn storage_list(self: &Arc<Self>) -> ProxmoxResult<Vec<Storage>> {
        self.get("storage", Some(&self.root())).await
    }
}
