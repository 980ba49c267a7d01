//! Operations scoped to one cluster node.
//!
//! A [`Node`] must come from [`ProxmoxApiClient::nodes`] or
//! [`ProxmoxApiClient::node`] so it knows which session to call through.
//! Storage, containers and tasks listed here are owned by the node.

use crate::api_client::ProxmoxApiClient;
use crate::context::{Context, ContextRef};
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::lxc_config::LxcConfig;
use crate::types::*;

use log::info;
use reqwest::Method;
use std::sync::Arc;

impl Node {
    /// Context link for entities fetched through this node.
    pub fn context(&self) -> ProxmoxResult<ContextRef> {
        Ok(Context::node(&self.node, self.owner.require()?))
    }

    fn client(&self) -> ProxmoxResult<Arc<ProxmoxApiClient>> {
        self.owner.api_client()
    }

    fn path(&self, suffix: &str) -> String {
        format!("nodes/{}/{suffix}", self.node)
    }

    // ── Storage ─────────────────────────────────────────────────────

    pub async fn storage_list(&self) -> ProxmoxResult<Vec<Storage>> {
        let ctx = self.context()?;
        self.client()?.get(&self.path("storage"), Some(&ctx)).await
    }

    // ── Containers ──────────────────────────────────────────────────

    pub async fn containers(&self) -> ProxmoxResult<Vec<Container>> {
        let ctx = self.context()?;
        self.client()?.get(&self.path("lxc"), Some(&ctx)).await
    }

    pub async fn container(&self, vmid: u64) -> ProxmoxResult<Container> {
        self.containers()
            .await?
            .into_iter()
            .find(|c| c.vmid == vmid)
            .ok_or_else(|| {
                ProxmoxError::not_found(format!(
                    "Container {vmid} not found on node {}",
                    self.node
                ))
            })
    }

    /// Create a container; `config` is validated before anything is sent.
    /// A config with `restore` set gets the relaxed restore checks.
    pub async fn create_container(&self, config: &LxcConfig) -> ProxmoxResult<TaskId> {
        if config.restore {
            config.validate_restore()?;
        } else {
            config.validate()?;
        }
        let client = self.client()?;
        info!(
            "Creating container {} on {} (restore: {})",
            config.vmid, self.node, config.restore
        );
        client
            .call(Method::POST, &self.path("lxc"), &config.to_form(), None)
            .await
    }

    pub async fn remove_container(&self, vmid: u64) -> ProxmoxResult<TaskId> {
        let client = self.client()?;
        info!("Removing container {vmid} on {}", self.node);
        client
            .call(Method::DELETE, &self.path(&format!("lxc/{vmid}")), &[], None)
            .await
    }

    /// Recreate container `vmid` from a backup archive onto `storage`.
    pub async fn restore_container(
        &self,
        vmid: u64,
        archive: &StorageContent,
        storage: &str,
        force: bool,
        mut config: LxcConfig,
    ) -> ProxmoxResult<TaskId> {
        config.vmid = i64::try_from(vmid)
            .map_err(|_| ProxmoxError::validation("vmid", format!("{vmid} is out of range")))?;
        config.ostemplate = archive.volid.clone();
        config.storage = storage.to_string();
        config.force = force;
        config.restore = true;
        self.create_container(&config).await
    }

    // ── Backups ─────────────────────────────────────────────────────

    pub async fn vzdump(
        &self,
        vmid: u64,
        storage: &Storage,
        mode: BackupMode,
        compression: BackupCompression,
        remove: bool,
    ) -> ProxmoxResult<TaskId> {
        let client = self.client()?;
        let form = vec![
            ("vmid".to_string(), vmid.to_string()),
            ("storage".to_string(), storage.storage.clone()),
            ("mode".to_string(), mode.to_string()),
            ("compress".to_string(), compression.to_string()),
            ("remove".to_string(), if remove { "1" } else { "0" }.to_string()),
        ];
        info!(
            "Backing up container {vmid} on {} to {} ({mode}, {compression})",
            self.node, storage.storage
        );
        client.call(Method::POST, &self.path("vzdump"), &form, None).await
    }

    // ── Tasks / hardware scans ──────────────────────────────────────

    pub async fn tasks(&self) -> ProxmoxResult<Vec<Task>> {
        let ctx = self.context()?;
        self.client()?.get(&self.path("tasks"), Some(&ctx)).await
    }

    pub async fn scan_usb(&self) -> ProxmoxResult<Vec<UsbDevice>> {
        self.client()?.get(&self.path("scan/usb"), None).await
    }

    pub async fn scan_lvm(&self) -> ProxmoxResult<Vec<LvmVolumeGroup>> {
        self.client()?.get(&self.path("scan/lvm"), None).await
    }
}
