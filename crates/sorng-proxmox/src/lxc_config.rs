//! Aggregate LXC container configuration.
//!
//! Used both to create / restore containers (validated, then encoded as
//! form values) and to read back `GET /nodes/{node}/lxc/{vmid}/config`,
//! where network interfaces, mount points and the startup policy arrive as
//! `net0..net9`, `mp0..mp9` and `startup` descriptor strings.

use crate::descriptor::{MountPoint, NetworkInterface, Slots, StartupPolicy, SLOT_COUNT};
use crate::error::{ProxmoxError, ProxmoxResult};
use crate::types::lenient;

use serde::Deserialize;
use serde_json::{Map, Value};

pub const ARCHITECTURES: &[&str] = &["amd64", "i386"];
pub const CONSOLE_MODES: &[&str] = &["console", "shell", "tty"];
pub const LOCK_STATES: &[&str] = &["backup", "migrate", "rollback", "snapshot"];

pub const MIN_MEMORY_MIB: i64 = 16;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Container settings. Zero / empty / false means "not set".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LxcConfig {
    #[serde(deserialize_with = "lenient::int")]
    pub vmid: i64,
    pub hostname: String,
    pub description: String,
    pub arch: String,
    pub cmode: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub console: bool,
    #[serde(deserialize_with = "lenient::int")]
    pub cores: i64,
    /// Fractional CPU share, 0 = unlimited.
    #[serde(deserialize_with = "lenient::float")]
    pub cpulimit: f64,
    #[serde(deserialize_with = "lenient::int")]
    pub cpuunits: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub memory: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub swap: i64,
    pub lock: String,
    pub nameserver: String,
    pub searchdomain: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub onboot: bool,
    pub ostemplate: String,
    pub ostype: String,
    pub password: String,
    pub pool: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub protection: bool,
    pub rootfs: String,
    pub storage: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub template: bool,
    #[serde(deserialize_with = "lenient::int")]
    pub tty: i64,
    #[serde(deserialize_with = "lenient::flag")]
    pub unprivileged: bool,
    /// Create-time only: overwrite an existing container.
    #[serde(skip)]
    pub force: bool,
    /// Create-time only: `ostemplate` is a backup archive.
    #[serde(skip)]
    pub restore: bool,
    #[serde(skip)]
    pub networks: Slots<NetworkInterface>,
    #[serde(skip)]
    pub mount_points: Slots<MountPoint>,
    #[serde(skip)]
    pub startup: StartupPolicy,
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ProxmoxResult<()> {
    if value.is_empty() || allowed.contains(&value) {
        Ok(())
    } else {
        Err(ProxmoxError::validation(
            field,
            format!("{value:?} is not one of {}", allowed.join(", ")),
        ))
    }
}

fn in_range(field: &str, value: i64, min: i64, max: i64) -> ProxmoxResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ProxmoxError::validation(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ))
    }
}

impl LxcConfig {
    fn check_cpulimit(&self) -> ProxmoxResult<()> {
        if self.cpulimit.is_finite() && (0.0..=128.0).contains(&self.cpulimit) {
            Ok(())
        } else {
            Err(ProxmoxError::validation(
                "cpulimit",
                format!("{} is outside [0, 128]", self.cpulimit),
            ))
        }
    }

    /// Full check for container creation.
    pub fn validate(&self) -> ProxmoxResult<()> {
        self.validate_common()?;
        in_range("cores", self.cores, 1, 128)?;
        if self.memory < MIN_MEMORY_MIB {
            return Err(ProxmoxError::validation(
                "memory",
                format!("{} MiB is below the minimum of {MIN_MEMORY_MIB}", self.memory),
            ));
        }
        if self.ostemplate.trim().is_empty() {
            return Err(ProxmoxError::validation("ostemplate", "must not be empty"));
        }
        if self.rootfs.trim().is_empty() {
            return Err(ProxmoxError::validation("rootfs", "must not be empty"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProxmoxError::validation(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(())
    }

    /// Check for restoring from a backup archive: sizing comes from the
    /// archive, so unset cores / memory / rootfs / password are accepted.
    pub fn validate_restore(&self) -> ProxmoxResult<()> {
        self.validate_common()?;
        if self.cores != 0 {
            in_range("cores", self.cores, 1, 128)?;
        }
        if self.memory != 0 && self.memory < MIN_MEMORY_MIB {
            return Err(ProxmoxError::validation(
                "memory",
                format!("{} MiB is below the minimum of {MIN_MEMORY_MIB}", self.memory),
            ));
        }
        if !self.password.is_empty() && self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProxmoxError::validation(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if self.ostemplate.trim().is_empty() {
            return Err(ProxmoxError::validation("ostemplate", "backup archive must be set"));
        }
        Ok(())
    }

    fn validate_common(&self) -> ProxmoxResult<()> {
        if self.vmid < 0 {
            return Err(ProxmoxError::validation("vmid", "must not be negative"));
        }
        one_of("arch", &self.arch, ARCHITECTURES)?;
        one_of("cmode", &self.cmode, CONSOLE_MODES)?;
        one_of("lock", &self.lock, LOCK_STATES)?;
        self.check_cpulimit()?;
        in_range("cpuunits", self.cpuunits, 0, 500_000)?;
        Ok(())
    }

    /// Form values for `POST /nodes/{node}/lxc`.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::new();
        let mut text = |key: &str, value: &str| {
            if !value.is_empty() {
                form.push((key.to_string(), value.to_string()));
            }
        };
        text("ostemplate", &self.ostemplate);
        text("hostname", &self.hostname);
        text("description", &self.description);
        text("arch", &self.arch);
        text("cmode", &self.cmode);
        text("lock", &self.lock);
        text("nameserver", &self.nameserver);
        text("searchdomain", &self.searchdomain);
        text("ostype", &self.ostype);
        text("password", &self.password);
        text("pool", &self.pool);
        text("rootfs", &self.rootfs);
        text("storage", &self.storage);

        let numbers = [
            ("vmid", self.vmid),
            ("cores", self.cores),
            ("cpuunits", self.cpuunits),
            ("memory", self.memory),
            ("swap", self.swap),
            ("tty", self.tty),
        ];
        for (key, value) in numbers {
            if value > 0 {
                form.push((key.to_string(), value.to_string()));
            }
        }

        if self.cpulimit > 0.0 {
            form.push(("cpulimit".to_string(), self.cpulimit.to_string()));
        }

        let flags = [
            ("console", self.console),
            ("force", self.force),
            ("onboot", self.onboot),
            ("protection", self.protection),
            ("restore", self.restore),
            ("template", self.template),
            ("unprivileged", self.unprivileged),
        ];
        for (key, value) in flags {
            if value {
                form.push((key.to_string(), "1".to_string()));
            }
        }

        if !self.startup.is_empty() {
            form.push(("startup".to_string(), self.startup.serialize()));
        }
        form.extend(self.networks.to_wire());
        form.extend(self.mount_points.to_wire());
        form
    }

    /// Decode the flat config map returned by the API.
    pub fn from_wire(map: &Map<String, Value>) -> ProxmoxResult<Self> {
        let mut config: Self = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| ProxmoxError::decode(format!("Unexpected container config shape: {e}")))?;

        for index in 0..SLOT_COUNT {
            if let Some(text) = map.get(&format!("net{index}")).and_then(Value::as_str) {
                config.networks.parse_slot(index, text)?;
            }
            if let Some(text) = map.get(&format!("mp{index}")).and_then(Value::as_str) {
                config.mount_points.parse_slot(index, text)?;
            }
        }
        if let Some(text) = map.get("startup").and_then(Value::as_str) {
            config.startup = StartupPolicy::parse(text);
        }
        Ok(config)
    }
}
