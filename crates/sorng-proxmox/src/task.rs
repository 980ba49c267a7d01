//! Worker task status and waiting.

use crate::api_client::ProxmoxApiClient;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::*;
use crate::wait::{poll_until, PollOptions, WaitOutcome};

use log::debug;
use tokio_util::sync::CancellationToken;

impl ProxmoxApiClient {
    /// `GET nodes/{node}/tasks/{upid}/status`, the node taken from the UPID.
    pub async fn task_status(&self, upid: &TaskId) -> ProxmoxResult<TaskStatus> {
        let node = upid.node().ok_or_else(|| {
            ProxmoxError::validation("upid", format!("{:?} is not a task id", upid.as_str()))
        })?;
        self.get(&format!("nodes/{node}/tasks/{upid}/status"), None).await
    }

    /// Poll the task until its status equals `status` (e.g. `"stopped"`).
    pub async fn wait_for_task(
        &self,
        upid: &TaskId,
        status: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> ProxmoxResult<WaitOutcome<TaskStatus>> {
        debug!("Waiting up to {:?} for {upid} to reach {status}", options.timeout);
        poll_until(
            options,
            cancel,
            || self.task_status(upid),
            |s: &TaskStatus| s.info.status == status,
        )
        .await
    }
}

impl Task {
    pub async fn status(&self) -> ProxmoxResult<TaskStatus> {
        self.owner.api_client()?.task_status(&self.info.upid).await
    }

    pub async fn wait_for_status(
        &self,
        status: &str,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> ProxmoxResult<WaitOutcome<TaskStatus>> {
        self.owner
            .api_client()?
            .wait_for_task(&self.info.upid, status, options, cancel)
            .await
    }
}
