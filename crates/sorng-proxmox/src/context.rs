//! Ownership chain from decoded entities back to the session.
//!
//! Every entity that can issue its own calls carries an [`OwnerSlot`]. The
//! decoder fills the slot once with a [`ContextRef`] naming whoever fetched
//! the entity: the session for cluster-wide listings, a node for node-scoped
//! listings, and so on. Resolving the session or the nearest node walks the
//! chain upward.

use crate::api_client::ProxmoxApiClient;
use crate::error::{ProxmoxError, ProxmoxResult};

use std::fmt;
use std::sync::{Arc, OnceLock};

pub type ContextRef = Arc<Context>;

/// One link in the ownership chain.
pub enum Context {
    /// Root of every chain.
    Session(Arc<ProxmoxApiClient>),
    Node { name: String, parent: ContextRef },
    Storage { name: String, parent: ContextRef },
    Container { vmid: u64, parent: ContextRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Session,
    Node,
    Storage,
    Container,
}

impl Context {
    pub fn session(client: Arc<ProxmoxApiClient>) -> ContextRef {
        Arc::new(Self::Session(client))
    }

    pub fn node(name: impl Into<String>, parent: &ContextRef) -> ContextRef {
        Arc::new(Self::Node { name: name.into(), parent: parent.clone() })
    }

    pub fn storage(name: impl Into<String>, parent: &ContextRef) -> ContextRef {
        Arc::new(Self::Storage { name: name.into(), parent: parent.clone() })
    }

    pub fn container(vmid: u64, parent: &ContextRef) -> ContextRef {
        Arc::new(Self::Container { vmid, parent: parent.clone() })
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            Self::Session(_) => ContextKind::Session,
            Self::Node { .. } => ContextKind::Node,
            Self::Storage { .. } => ContextKind::Storage,
            Self::Container { .. } => ContextKind::Container,
        }
    }

    pub fn parent(&self) -> Option<&ContextRef> {
        match self {
            Self::Session(_) => None,
            Self::Node { parent, .. }
            | Self::Storage { parent, .. }
            | Self::Container { parent, .. } => Some(parent),
        }
    }

    /// This link followed by each ancestor up to the session.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    /// Nearest link of `kind`, starting with this one.
    pub fn find(&self, kind: ContextKind) -> Option<&Context> {
        self.chain().find(|c| c.kind() == kind)
    }

    /// Client that performed the call producing this chain.
    pub fn api_client(&self) -> Option<&Arc<ProxmoxApiClient>> {
        self.chain().find_map(|c| match c {
            Self::Session(client) => Some(client),
            _ => None,
        })
    }

    /// Name of the nearest node.
    pub fn node_name(&self) -> Option<&str> {
        self.chain().find_map(|c| match c {
            Self::Node { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for link in self.chain() {
            if !first {
                f.write_str(" -> ")?;
            }
            first = false;
            match link {
                Self::Session(client) => write!(f, "Session({})", client.host())?,
                Self::Node { name, .. } => write!(f, "Node({name})")?,
                Self::Storage { name, .. } => write!(f, "Storage({name})")?,
                Self::Container { vmid, .. } => write!(f, "Container({vmid})")?,
            }
        }
        Ok(())
    }
}

/// Upward iterator over a context chain.
pub struct Chain<'a> {
    next: Option<&'a Context>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent().map(|p| p.as_ref());
        Some(current)
    }
}

/// Back-reference slot embedded in owned entities. Set at most once.
#[derive(Clone, Default)]
pub struct OwnerSlot(OnceLock<ContextRef>);

impl OwnerSlot {
    pub fn attached(owner: ContextRef) -> Self {
        let slot = Self::default();
        slot.attach(&owner);
        slot
    }

    /// Set the owner if the slot is empty. Returns false when it was
    /// already set; the existing owner is kept.
    pub fn attach(&self, owner: &ContextRef) -> bool {
        self.0.set(owner.clone()).is_ok()
    }

    pub fn get(&self) -> Option<&ContextRef> {
        self.0.get()
    }

    pub fn require(&self) -> ProxmoxResult<&ContextRef> {
        self.get()
            .ok_or_else(|| ProxmoxError::unattached("Entity was not decoded with an owner"))
    }

    /// Client that fetched this entity.
    pub fn api_client(&self) -> ProxmoxResult<Arc<ProxmoxApiClient>> {
        self.require()?
            .api_client()
            .cloned()
            .ok_or_else(|| ProxmoxError::unattached("Ownership chain has no session"))
    }

    /// Nearest owning node.
    pub fn node_name(&self) -> ProxmoxResult<&str> {
        self.require()?
            .node_name()
            .ok_or_else(|| ProxmoxError::unattached("Entity is not owned by a node"))
    }
}

impl fmt::Debug for OwnerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(ctx) => write!(f, "OwnerSlot({ctx:?})"),
            None => f.write_str("OwnerSlot(<none>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxmoxErrorKind;
    use crate::testing::test_client;

    #[test]
    fn walks_up_to_session_and_nearest_node() {
        let (client, _) = test_client();
        let root = client.root();
        let node = Context::node("pve1", &root);
        let storage = Context::storage("local", &node);

        assert_eq!(storage.kind(), ContextKind::Storage);
        assert_eq!(storage.node_name(), Some("pve1"));
        assert!(Arc::ptr_eq(storage.api_client().unwrap(), &client));
        assert_eq!(storage.chain().count(), 3);
        assert_eq!(
            storage.find(ContextKind::Node).map(Context::kind),
            Some(ContextKind::Node)
        );
        assert!(root.node_name().is_none());
        assert_eq!(format!("{storage:?}"), "Storage(local) -> Node(pve1) -> Session(pve)");
    }

    #[test]
    fn slot_is_set_once() {
        let (client, _) = test_client();
        let root = client.root();
        let first = Context::node("a", &root);
        let second = Context::node("b", &root);

        let slot = OwnerSlot::default();
        assert!(slot.get().is_none());
        assert!(slot.attach(&first));
        assert!(!slot.attach(&second));
        assert_eq!(slot.node_name().unwrap(), "a");
    }

    #[test]
    fn empty_slot_is_unattached() {
        let slot = OwnerSlot::default();
        assert_eq!(slot.require().unwrap_err().kind, ProxmoxErrorKind::Unattached);
        assert_eq!(slot.api_client().unwrap_err().kind, ProxmoxErrorKind::Unattached);
    }

    #[test]
    fn session_owned_slot_has_no_node() {
        let (client, _) = test_client();
        let slot = OwnerSlot::attached(client.root());
        assert!(slot.api_client().is_ok());
        assert_eq!(slot.node_name().unwrap_err().kind, ProxmoxErrorKind::Unattached);
    }
}
