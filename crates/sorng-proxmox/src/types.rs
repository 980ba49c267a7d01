//! Shared types for Proxmox VE management.

use crate::context::OwnerSlot;
use crate::error::{ProxmoxError, ProxmoxResult};

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a Proxmox VE host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxmoxConfig {
    /// Hostname / IP of any cluster member (e.g. "pve1.lab.local")
    pub host: String,
    /// API port (default 8006)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username without realm (e.g. "root")
    pub username: String,
    /// Password
    pub password: String,
    /// Authentication realm (e.g. "pam", "pve")
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Transport timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Nominal ticket lifetime in minutes
    #[serde(default = "default_ticket_lifetime")]
    pub ticket_lifetime_mins: u64,
    /// Renew once remaining validity drops to this many minutes
    #[serde(default = "default_renewal_margin")]
    pub renewal_margin_mins: u64,
}

fn default_port() -> u16 { 8006 }
fn default_realm() -> String { "pam".into() }
fn default_timeout() -> u64 { 5 }
fn default_ticket_lifetime() -> u64 { 120 }
fn default_renewal_margin() -> u64 { 5 }

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            realm: default_realm(),
            insecure: false,
            timeout_secs: default_timeout(),
            ticket_lifetime_mins: default_ticket_lifetime(),
            renewal_margin_mins: default_renewal_margin(),
        }
    }
}

impl ProxmoxConfig {
    /// `user@realm` as sent in the login form.
    pub fn login_name(&self) -> String {
        format!("{}@{}", self.username, self.realm)
    }

    pub fn validate(&self) -> ProxmoxResult<()> {
        if self.host.trim().is_empty() {
            return Err(ProxmoxError::validation("host", "must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(ProxmoxError::validation("username", "must not be empty"));
        }
        if self.renewal_margin_mins >= self.ticket_lifetime_mins {
            return Err(ProxmoxError::validation(
                "renewalMarginMins",
                "must be smaller than ticketLifetimeMins",
            ));
        }
        Ok(())
    }
}

/// Config without the password, safe to hand back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxmoxConfigSafe {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub realm: String,
    pub insecure: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Lenient wire scalars
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// PVE encodes some numbers as strings depending on the endpoint and
/// version; these accept either form.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Float(f64),
        Str(String),
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(0),
            Some(Scalar::Int(n)) => Ok(n),
            Some(Scalar::Float(f)) => Ok(f as i64),
            Some(Scalar::Bool(b)) => Ok(i64::from(b)),
            Some(Scalar::Str(s)) if s.trim().is_empty() => Ok(0),
            Some(Scalar::Str(s)) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected integer, got {s:?}"))),
        }
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(0.0),
            Some(Scalar::Int(n)) => Ok(n as f64),
            Some(Scalar::Float(f)) => Ok(f),
            Some(Scalar::Bool(b)) => Ok(if b { 1.0 } else { 0.0 }),
            Some(Scalar::Str(s)) if s.trim().is_empty() => Ok(0.0),
            Some(Scalar::Str(s)) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected number, got {s:?}"))),
        }
    }

    pub fn uint<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let n = int(d)?;
        u64::try_from(n).map_err(|_| D::Error::custom(format!("expected unsigned integer, got {n}")))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Option::<Scalar>::deserialize(d)? {
            None => false,
            Some(Scalar::Bool(b)) => b,
            Some(Scalar::Int(n)) => n != 0,
            Some(Scalar::Float(f)) => f != 0.0,
            Some(Scalar::Str(s)) => matches!(s.trim(), "1" | "true" | "yes" | "on"),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Cluster / Nodes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// GET /version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub release: String,
    pub repoid: String,
    pub version: String,
}

/// Cluster member (from GET /nodes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub node: String,
    pub id: String,
    pub status: String,
    pub level: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub cpu: f64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxcpu: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub mem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxmem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub disk: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxdisk: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub uptime: i64,
    #[serde(skip)]
    pub owner: OwnerSlot,
}

/// GET /nodes/{node}/scan/usb
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbDevice {
    #[serde(deserialize_with = "lenient::int")]
    pub busnum: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub class: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub devnum: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub level: i64,
    pub manufacturer: String,
    #[serde(deserialize_with = "lenient::int")]
    pub port: i64,
    pub prodid: String,
    pub product: String,
    pub speed: String,
    pub usbpath: String,
    pub vendid: String,
}

/// GET /nodes/{node}/scan/lvm
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LvmVolumeGroup {
    pub vg: String,
    #[serde(deserialize_with = "lenient::int")]
    pub size: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub free: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Containers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// LXC container summary (from GET /nodes/{node}/lxc).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Container {
    #[serde(deserialize_with = "lenient::uint")]
    pub vmid: u64,
    pub name: String,
    pub status: String,
    pub template: String,
    #[serde(rename = "type")]
    pub container_type: String,
    pub cpu: f64,
    #[serde(deserialize_with = "lenient::int")]
    pub cpus: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub pid: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub mem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxmem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub swap: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxswap: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub disk: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxdisk: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub diskread: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub diskwrite: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub netin: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub netout: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub uptime: i64,
    #[serde(skip)]
    pub owner: OwnerSlot,
}

/// GET /nodes/{node}/lxc/{vmid}/status/current
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStatus {
    #[serde(deserialize_with = "lenient::uint")]
    pub vmid: u64,
    pub name: String,
    pub status: String,
    pub lock: Option<String>,
    pub cpu: f64,
    #[serde(deserialize_with = "lenient::int")]
    pub cpus: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub mem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub maxmem: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub uptime: i64,
    #[serde(deserialize_with = "lenient::flag")]
    pub ha_managed: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Storage definition (GET /storage or GET /nodes/{node}/storage).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub storage: String,
    #[serde(rename = "type")]
    pub storage_type: String,
    pub content: String,
    pub digest: String,
    pub path: String,
    #[serde(deserialize_with = "lenient::int")]
    pub maxfiles: i64,
    #[serde(deserialize_with = "lenient::flag")]
    pub shared: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub active: bool,
    #[serde(deserialize_with = "lenient::int")]
    pub avail: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub total: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub used: i64,
    #[serde(skip)]
    pub owner: OwnerSlot,
}

/// One volume on a storage (GET /nodes/{node}/storage/{storage}/content).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageContent {
    pub volid: String,
    pub content: String,
    pub format: String,
    #[serde(deserialize_with = "lenient::int")]
    pub size: i64,
    #[serde(deserialize_with = "lenient::uint")]
    pub vmid: u64,
    #[serde(deserialize_with = "lenient::int")]
    pub ctime: i64,
    #[serde(skip)]
    pub owner: OwnerSlot,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Unique process id of a worker task, e.g.
/// `UPID:pve1:0000530F:1DF56C3C:5A7DCCE8:vzdestroy:999:root@pam:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(upid: impl Into<String>) -> Self {
        Self(upid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field(&self, idx: usize) -> Option<&str> {
        let mut parts = self.0.split(':');
        if parts.next() != Some("UPID") {
            return None;
        }
        parts.nth(idx - 1).filter(|p| !p.is_empty())
    }

    /// Node that runs the task.
    pub fn node(&self) -> Option<&str> {
        self.field(1)
    }

    /// Worker type (e.g. `vzstart`, `vzdump`).
    pub fn task_type(&self) -> Option<&str> {
        self.field(5)
    }

    /// Worker id, usually the guest's VMID.
    pub fn worker_id(&self) -> Option<&str> {
        self.field(6)
    }

    pub fn user(&self) -> Option<&str> {
        self.field(7)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields common to task listings and task status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInfo {
    pub upid: TaskId,
    pub id: String,
    pub node: String,
    #[serde(deserialize_with = "lenient::int")]
    pub pid: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub pstart: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub starttime: i64,
    /// Listing: "OK" / error text. Status: "running" / "stopped".
    pub status: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub user: String,
}

/// Entry of GET /nodes/{node}/tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    #[serde(deserialize_with = "lenient::int")]
    pub endtime: i64,
    #[serde(flatten)]
    pub info: TaskInfo,
    #[serde(skip)]
    pub owner: OwnerSlot,
}

/// GET /nodes/{node}/tasks/{upid}/status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exitstatus: Option<String>,
    #[serde(flatten)]
    pub info: TaskInfo,
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        self.info.status == "running"
    }

    /// Finished with exit status `OK`.
    pub fn succeeded(&self) -> bool {
        self.info.status == "stopped" && self.exitstatus.as_deref() == Some("OK")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Backups
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    #[default]
    Snapshot,
    Suspend,
    Stop,
}

impl BackupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Suspend => "suspend",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupCompression {
    #[default]
    Lzo,
    Gzip,
}

impl BackupCompression {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lzo => "lzo",
            Self::Gzip => "gzip",
        }
    }
}

impl fmt::Display for BackupCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let cfg: ProxmoxConfig =
            serde_json::from_str(r#"{"host":"pve","username":"root","password":"x"}"#).unwrap();
        assert_eq!(cfg.port, 8006);
        assert_eq!(cfg.realm, "pam");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.ticket_lifetime_mins, 120);
        assert_eq!(cfg.renewal_margin_mins, 5);
        assert_eq!(cfg.login_name(), "root@pam");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_rejects_margin_not_below_lifetime() {
        let cfg = ProxmoxConfig {
            host: "pve".into(),
            username: "root".into(),
            ticket_lifetime_mins: 5,
            renewal_margin_mins: 5,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.validation_field(), Some("renewalMarginMins"));
    }

    #[test]
    fn container_accepts_string_encoded_numbers() {
        let c: Container = serde_json::from_str(
            r#"{"vmid":"999","cpus":"2","pid":"4711","diskread":"1024","name":"ct","status":"running"}"#,
        )
        .unwrap();
        assert_eq!(c.vmid, 999);
        assert_eq!(c.cpus, 2);
        assert_eq!(c.pid, 4711);
        assert_eq!(c.diskread, 1024);
        assert!(c.owner.get().is_none());
    }

    #[test]
    fn container_rejects_garbage_vmid() {
        let r = serde_json::from_str::<Container>(r#"{"vmid":"abc"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn task_id_parts() {
        let t = TaskId::new("UPID:utm-other:0000530F:1DF56C3C:5A7DCCE8:vzdestroy:999:root@pam:");
        assert_eq!(t.node(), Some("utm-other"));
        assert_eq!(t.task_type(), Some("vzdestroy"));
        assert_eq!(t.worker_id(), Some("999"));
        assert_eq!(t.user(), Some("root@pam"));
        assert_eq!(TaskId::new("garbage").node(), None);
    }

    #[test]
    fn task_status_flattens_info() {
        let s: TaskStatus = serde_json::from_str(
            r#"{"exitstatus":"OK","status":"stopped","node":"utm-other","type":"vzdestroy",
                "user":"root@pam","starttime":1518193896,"id":"999","pid":21263,"pstart":502623292,
                "upid":"UPID:utm-other:0000530F:1DF56C3C:5A7DCCE8:vzdestroy:999:root@pam:"}"#,
        )
        .unwrap();
        assert!(s.succeeded());
        assert_eq!(s.info.pid, 21263);
        assert_eq!(s.info.upid.node(), Some("utm-other"));
    }

    #[test]
    fn backup_enums_render_wire_names() {
        assert_eq!(BackupMode::Suspend.to_string(), "suspend");
        assert_eq!(BackupCompression::Gzip.to_string(), "gzip");
    }
}
