//! Response envelope decoding.
//!
//! Every response is `{"data": <payload>}`. [`decode`] unwraps the envelope,
//! deserializes the payload into the caller's type and, when an owner is
//! given, walks the result through [`Attach`] so each owned entity receives
//! its back-reference. Sequences and options are visited element by
//! element; leaf types ignore the owner.

use crate::context::ContextRef;
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::*;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::any::type_name;
use std::collections::HashMap;

/// Wire envelope. Extra top-level fields are ignored.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    errors: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Receives the owner of a freshly decoded value.
pub trait Attach {
    fn attach(&mut self, _owner: &ContextRef) {}
}

impl<T: Attach> Attach for Vec<T> {
    fn attach(&mut self, owner: &ContextRef) {
        for item in self.iter_mut() {
            item.attach(owner);
        }
    }
}

impl<T: Attach> Attach for Option<T> {
    fn attach(&mut self, owner: &ContextRef) {
        if let Some(inner) = self {
            inner.attach(owner);
        }
    }
}

impl<T: Attach> Attach for Box<T> {
    fn attach(&mut self, owner: &ContextRef) {
        self.as_mut().attach(owner);
    }
}

impl<V: Attach> Attach for HashMap<String, V> {
    fn attach(&mut self, owner: &ContextRef) {
        for value in self.values_mut() {
            value.attach(owner);
        }
    }
}

macro_rules! owned {
    ($($ty:ty),* $(,)?) => {
        $(impl Attach for $ty {
            fn attach(&mut self, owner: &ContextRef) {
                self.owner.attach(owner);
            }
        })*
    };
}

macro_rules! leaf {
    ($($ty:ty),* $(,)?) => {
        $(impl Attach for $ty {})*
    };
}

owned!(Node, Container, Storage, StorageContent, Task);

leaf!(
    (),
    bool,
    i32,
    i64,
    u32,
    u64,
    f64,
    String,
    serde_json::Value,
    serde_json::Map<String, serde_json::Value>,
    VersionInfo,
    UsbDevice,
    LvmVolumeGroup,
    ContainerStatus,
    TaskId,
    TaskStatus,
);

/// Unwrap `{"data": ...}` from `body` into `T`, attaching `owner` to every
/// owned entity. `status` is only used for error context.
pub fn decode<T>(body: &[u8], status: u16, owner: Option<&ContextRef>) -> ProxmoxResult<T>
where
    T: DeserializeOwned + Attach,
{
    let target = type_name::<T>();

    let envelope: RawEnvelope = serde_json::from_slice(body).map_err(|e| {
        debug!("Envelope decode for {target} failed (HTTP {status}): {e}");
        ProxmoxError::decode(format!(
            "Malformed envelope for {target} (HTTP {status}): {e}"
        ))
    })?;

    if envelope.data.is_null() && (envelope.errors.is_some() || envelope.message.is_some()) {
        let detail = envelope
            .message
            .or_else(|| envelope.errors.map(|e| e.to_string()))
            .unwrap_or_default();
        return Err(ProxmoxError::decode(format!(
            "Server returned an error envelope for {target} (HTTP {status}): {}",
            detail.trim()
        )));
    }

    let mut value: T = serde_json::from_value(envelope.data).map_err(|e| {
        debug!("Payload decode for {target} failed (HTTP {status}): {e}");
        ProxmoxError::decode(format!(
            "Unexpected payload shape for {target} (HTTP {status}): {e}"
        ))
    })?;

    if let Some(owner) = owner {
        value.attach(owner);
    }
    Ok(value)
}
