//! # SortOfRemote NG – Proxmox VE Management
//!
//! Typed client for the Proxmox VE REST API: ticket-based sessions with
//! single-flight renewal, an authenticated dispatcher, envelope decoding
//! that links every entity back to the session and node that produced it,
//! and the compact `key=value` descriptors PVE uses for container settings.
//!
//! ## Modules
//!
//! - **types** — Shared data structures (config, nodes, containers, storage, tasks)
//! - **error** — Crate-specific error types
//! - **transport** — HTTP transport seam and the reqwest implementation
//! - **auth** — Ticket / CSRF session lifecycle
//! - **api_client** — Request dispatcher
//! - **decode** — `{"data": ...}` envelope decoding with owner attachment
//! - **context** — Ownership chain (session → node → storage / container)
//! - **descriptor** — `netN` / `mpN` / `startup` descriptor codec
//! - **lxc_config** — Aggregate container config, validation, form encoding
//! - **cluster** — Version, nodes, cluster storage
//! - **node** — Node-scoped storage, containers, backups, tasks, scans
//! - **container** — Container power operations, status, config
//! - **storage** — Storage content listing
//! - **task** — Task status and waiting
//! - **wait** — Cancellable interval / deadline polling
//! - **service** — Aggregate facade + shared state alias

pub mod types;
pub mod error;
pub mod transport;
pub mod auth;
pub mod api_client;
pub mod decode;
pub mod context;
pub mod descriptor;
pub mod lxc_config;
pub mod cluster;
pub mod node;
pub mod container;
pub mod storage;
pub mod task;
pub mod wait;
pub mod service;

#[cfg(test)]
mod testing;

pub use api_client::ProxmoxApiClient;
pub use error::{ProxmoxError, ProxmoxErrorKind, ProxmoxResult};
pub use lxc_config::LxcConfig;
pub use service::{ProxmoxService, ProxmoxServiceState};
pub use types::{ProxmoxConfig, ProxmoxConfigSafe};
