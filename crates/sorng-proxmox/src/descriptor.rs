//! Compact `key=value,...` descriptors packed into single config fields.
//!
//! PVE stores structured container settings as one string per field:
//! `net0..net9` (network interfaces), `mp0..mp9` (mount points) and
//! `startup` (boot ordering). Parsing is tolerant: unknown keys are
//! skipped, unparsable numbers become zero. Serialization emits a fixed
//! canonical key order and omits zero / false / empty values, so
//! `parse(serialize(d)) == d` for every descriptor.

use crate::error::{ProxmoxError, ProxmoxResult};

use std::fmt;
use std::str::FromStr;

/// Number of numbered slots per descriptor kind (`net0..net9`, `mp0..mp9`).
pub const SLOT_COUNT: usize = 10;

/// One token of a descriptor string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// `key=value`, split on the first `=`
    Pair(&'a str, &'a str),
    /// Token without `=`
    Positional(&'a str),
}

fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| match t.split_once('=') {
            Some((k, v)) => Token::Pair(k.trim(), v.trim()),
            None => Token::Positional(t),
        })
}

fn int<T: FromStr + Default>(value: &str) -> T {
    value.parse().unwrap_or_default()
}

fn flag(value: &str) -> bool {
    value == "1"
}

/// `<n>G`; anything else is zero.
fn gibibytes(value: &str) -> u64 {
    value
        .strip_suffix('G')
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .map(int::<u64>)
        .unwrap_or(0)
}

/// Collects the non-empty parts and joins them with commas.
struct Fields(Vec<String>);

impl Fields {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn text(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.0.push(format!("{key}={value}"));
        }
        self
    }

    fn number<N: Into<u64>>(&mut self, key: &str, value: N) -> &mut Self {
        let value = value.into();
        if value > 0 {
            self.0.push(format!("{key}={value}"));
        }
        self
    }

    fn flag(&mut self, key: &str, value: bool) -> &mut Self {
        if value {
            self.0.push(format!("{key}=1"));
        }
        self
    }

    fn finish(&self) -> String {
        self.0.join(",")
    }
}

/// A descriptor that lives in one of the numbered `0..=9` slots.
pub trait SlotDescriptor: Sized {
    /// Wire field prefix (`net`, `mp`).
    const PREFIX: &'static str;

    fn parse(index: usize, text: &str) -> Self;

    fn index(&self) -> usize;

    /// Canonical wire string.
    fn serialize(&self) -> String;

    /// Wire field name for this slot, e.g. `net3`.
    fn field_name(&self) -> String {
        format!("{}{}", Self::PREFIX, self.index())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Network interface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `netN`: `name=eth0,bridge=vmbr0,firewall=1,ip=dhcp,tag=12,type=veth`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInterface {
    pub index: usize,
    pub name: String,
    pub bridge: String,
    pub firewall: bool,
    pub gateway: String,
    pub gateway_v6: String,
    pub hwaddr: String,
    pub ip: String,
    pub ip_v6: String,
    pub mtu: u32,
    pub rate: u32,
    pub tag: u32,
    pub trunks: String,
    pub link_type: String,
}

impl SlotDescriptor for NetworkInterface {
    const PREFIX: &'static str = "net";

    fn parse(index: usize, text: &str) -> Self {
        let mut nic = Self { index, ..Default::default() };
        for token in tokens(text) {
            let Token::Pair(key, value) = token else { continue };
            match key {
                "name" => nic.name = value.to_string(),
                "bridge" => nic.bridge = value.to_string(),
                "firewall" => nic.firewall = flag(value),
                "gw" => nic.gateway = value.to_string(),
                "gw6" => nic.gateway_v6 = value.to_string(),
                "hwaddr" => nic.hwaddr = value.to_string(),
                "ip" => nic.ip = value.to_string(),
                "ip6" => nic.ip_v6 = value.to_string(),
                "mtu" => nic.mtu = int(value),
                "rate" => nic.rate = int(value),
                "tag" => nic.tag = int(value),
                "trunks" => nic.trunks = value.to_string(),
                "type" => nic.link_type = value.to_string(),
                _ => {}
            }
        }
        nic
    }

    fn index(&self) -> usize {
        self.index
    }

    fn serialize(&self) -> String {
        Fields::new()
            .text("name", &self.name)
            .text("bridge", &self.bridge)
            .flag("firewall", self.firewall)
            .text("gw", &self.gateway)
            .text("gw6", &self.gateway_v6)
            .text("hwaddr", &self.hwaddr)
            .text("ip", &self.ip)
            .text("ip6", &self.ip_v6)
            .number("mtu", self.mtu)
            .number("rate", self.rate)
            .number("tag", self.tag)
            .text("trunks", &self.trunks)
            .text("type", &self.link_type)
            .finish()
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Mount point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `mpN`: `local:999/vm-999-disk-1.raw,mp=/data,backup=1,size=8G`
///
/// The leading unkeyed token is the volume. A descriptor without a volume
/// serializes to an empty string and must not be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPoint {
    pub index: usize,
    pub volume: String,
    pub mount_path: String,
    pub acl: bool,
    pub quota: bool,
    pub backup: bool,
    pub read_only: bool,
    pub size_gib: u64,
}

impl SlotDescriptor for MountPoint {
    const PREFIX: &'static str = "mp";

    fn parse(index: usize, text: &str) -> Self {
        let mut mp = Self { index, ..Default::default() };
        for token in tokens(text) {
            match token {
                Token::Positional(volume) => mp.volume = volume.to_string(),
                Token::Pair("volume", value) => mp.volume = value.to_string(),
                Token::Pair("mp", value) => mp.mount_path = value.to_string(),
                Token::Pair("acl", value) => mp.acl = flag(value),
                Token::Pair("quota", value) => mp.quota = flag(value),
                Token::Pair("backup", value) => mp.backup = flag(value),
                Token::Pair("ro", value) => mp.read_only = flag(value),
                Token::Pair("size", value) => mp.size_gib = gibibytes(value),
                Token::Pair(..) => {}
            }
        }
        mp
    }

    fn index(&self) -> usize {
        self.index
    }

    fn serialize(&self) -> String {
        if self.volume.is_empty() {
            return String::new();
        }
        let mut fields = Fields::new();
        fields.0.push(self.volume.clone());
        fields
            .text("mp", &self.mount_path)
            .flag("acl", self.acl)
            .flag("quota", self.quota)
            .flag("backup", self.backup)
            .flag("ro", self.read_only);
        if self.size_gib > 0 {
            fields.0.push(format!("size={}G", self.size_gib));
        }
        fields.finish()
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Startup policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `startup`: `order=1,up=120,down=120`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupPolicy {
    pub boot_order: u32,
    pub up_delay_secs: u32,
    pub down_delay_secs: u32,
}

impl StartupPolicy {
    pub fn parse(text: &str) -> Self {
        let mut policy = Self::default();
        for token in tokens(text) {
            let Token::Pair(key, value) = token else { continue };
            match key {
                "order" => policy.boot_order = int(value),
                "up" => policy.up_delay_secs = int(value),
                "down" => policy.down_delay_secs = int(value),
                _ => {}
            }
        }
        policy
    }

    pub fn serialize(&self) -> String {
        Fields::new()
            .number("order", self.boot_order)
            .number("up", self.up_delay_secs)
            .number("down", self.down_delay_secs)
            .finish()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FromStr for StartupPolicy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for StartupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Slots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ten numbered, optional positions for one descriptor kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slots<T> {
    slots: [Option<T>; SLOT_COUNT],
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self { slots: std::array::from_fn(|_| None) }
    }
}

impl<T: SlotDescriptor> Slots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `descriptor` in the slot named by its own index.
    pub fn insert(&mut self, descriptor: T) -> ProxmoxResult<Option<T>> {
        let index = descriptor.index();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            ProxmoxError::validation(
                format!("{}{index}", T::PREFIX),
                format!("slot index must be below {SLOT_COUNT}"),
            )
        })?;
        Ok(slot.replace(descriptor))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Fills slot `index` from a wire string; empty strings leave it vacant.
    pub fn parse_slot(&mut self, index: usize, text: &str) -> ProxmoxResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        self.insert(T::parse(index, text)).map(|_| ())
    }

    /// `(field, value)` pairs for every occupied slot with a non-empty
    /// serialization.
    pub fn to_wire(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|d| (d.field_name(), d.serialize()))
            .filter(|(_, v)| !v.is_empty())
            .collect()
    }
}
