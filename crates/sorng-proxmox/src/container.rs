//! LXC container lifecycle. A [`Container`] must be listed from a node.

use crate::api_client::{FormValues, ProxmoxApiClient};
use crate::context::{Context, ContextRef};
use crate::error::ProxmoxResult;
use crate::lxc_config::LxcConfig;
use crate::types::*;

use log::info;
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

impl Container {
    pub fn context(&self) -> ProxmoxResult<ContextRef> {
        Ok(Context::container(self.vmid, self.owner.require()?))
    }

    /// Client plus `nodes/{node}/lxc/{vmid}/{suffix}`.
    fn target(&self, suffix: &str) -> ProxmoxResult<(Arc<ProxmoxApiClient>, String)> {
        let node = self.owner.node_name()?;
        let path = format!("nodes/{node}/lxc/{}/{suffix}", self.vmid);
        Ok((self.owner.api_client()?, path))
    }

    async fn power(&self, action: &str, form: FormValues) -> ProxmoxResult<TaskId> {
        let (client, path) = self.target(&format!("status/{action}"))?;
        info!("Container {} ({}): {action}", self.vmid, self.name);
        client.call(Method::POST, &path, &form, None).await
    }

    // ── Power ───────────────────────────────────────────────────────

    pub async fn start(&self, skip_lock: bool) -> ProxmoxResult<TaskId> {
        self.power("start", skip_lock_form(skip_lock)).await
    }

    pub async fn stop(&self, skip_lock: bool) -> ProxmoxResult<TaskId> {
        self.power("stop", skip_lock_form(skip_lock)).await
    }

    /// Clean shutdown; `force_stop` kills the container once
    /// `timeout_secs` (0 = server default) elapses.
    pub async fn shutdown(&self, force_stop: bool, timeout_secs: u64) -> ProxmoxResult<TaskId> {
        let mut form = FormValues::new();
        if force_stop {
            form.push(("forceStop".into(), "1".into()));
        }
        if timeout_secs > 0 {
            form.push(("timeout".into(), timeout_secs.to_string()));
        }
        self.power("shutdown", form).await
    }

    // ── Status / config ─────────────────────────────────────────────

    pub async fn current_status(&self) -> ProxmoxResult<ContainerStatus> {
        let (client, path) = self.target("status/current")?;
        client.get(&path, None).await
    }

    pub async fn config(&self) -> ProxmoxResult<LxcConfig> {
        let (client, path) = self.target("config")?;
        let map: Map<String, Value> = client.get(&path, None).await?;
        LxcConfig::from_wire(&map)
    }
}

fn skip_lock_form(skip_lock: bool) -> FormValues {
    if skip_lock {
        vec![("skiplock".into(), "1".into())]
    } else {
        FormValues::new()
    }
}
