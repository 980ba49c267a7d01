//! Storage content listing.

use crate::context::{Context, ContextRef};
use crate::error::ProxmoxResult;
use crate::types::*;

impl Storage {
    pub fn context(&self) -> ProxmoxResult<ContextRef> {
        Ok(Context::storage(&self.storage, self.owner.require()?))
    }

    /// Volumes on this storage. Only storage listed from a node can be
    /// browsed; cluster-level definitions fail with `Unattached`.
    pub async fn contents(&self) -> ProxmoxResult<Vec<StorageContent>> {
        let node = self.owner.node_name()?;
        let path = format!("nodes/{node}/storage/{}/content", self.storage);
        let ctx = self.context()?;
        self.owner.api_client()?.get(&path, Some(&ctx)).await
    }
}
