//! Profile storage
//!
//! Maps Wi-Fi SSIDs to static network profiles and persists the mapping
//! as a single JSON document. Storage failures are best-effort: a
//! missing or corrupt file falls back to an empty mapping (then the
//! builtin defaults), and write errors are logged and swallowed so the
//! daemon keeps running.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolver used when a profile does not name its own DNS servers
pub const DEFAULT_DNS: &str = "202.96.104.15";

fn default_dns() -> Vec<String> {
    vec![DEFAULT_DNS.to_string()]
}

/// Static network parameters for one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Human-readable place name, e.g. "公司"
    pub location: String,
    pub ip: String,
    pub subnet: String,
    pub gateway: String,
    /// Resolvers in the order they should be configured
    #[serde(default = "default_dns")]
    pub dns: Vec<String>,
}

impl NetworkProfile {
    pub fn new(
        location: impl Into<String>,
        ip: impl Into<String>,
        subnet: impl Into<String>,
        gateway: impl Into<String>,
        dns: Vec<String>,
    ) -> Self {
        Self {
            location: location.into(),
            ip: ip.into(),
            subnet: subnet.into(),
            gateway: gateway.into(),
            dns,
        }
    }

    /// Check that every address field is a dotted-quad IPv4 address and
    /// the location label is non-empty. Runs before any persist or
    /// apply.
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            bail!("profile location must not be empty");
        }
        ensure_ipv4("ip", &self.ip)?;
        ensure_ipv4("subnet", &self.subnet)?;
        ensure_ipv4("gateway", &self.gateway)?;
        if self.dns.is_empty() {
            bail!("profile must name at least one DNS server");
        }
        for server in &self.dns {
            ensure_ipv4("dns server", server)?;
        }
        Ok(())
    }
}

fn ensure_ipv4(field: &str, value: &str) -> Result<()> {
    value
        .parse::<Ipv4Addr>()
        .with_context(|| format!("{} is not a valid IPv4 address: {:?}", field, value))?;
    Ok(())
}

/// Builtin profiles installed on first run
fn builtin_profiles() -> HashMap<String, NetworkProfile> {
    HashMap::from([
        (
            "hongzhi".to_string(),
            NetworkProfile::new(
                "公司",
                "192.168.3.112",
                "255.255.255.0",
                "192.168.3.1",
                vec!["202.96.104.15".into()],
            ),
        ),
        (
            "TP-LINK_5G_m".to_string(),
            NetworkProfile::new(
                "宿舍",
                "192.168.31.102",
                "255.255.255.0",
                "192.168.31.7",
                vec!["192.168.31.7".into()],
            ),
        ),
    ])
}

/// Persistent SSID -> profile mapping
pub struct ConfigStore {
    path: PathBuf,
    profiles: HashMap<String, NetworkProfile>,
}

impl ConfigStore {
    /// Open the store at `path`, creating the parent directory, loading
    /// whatever is on disk and seeding the builtin defaults when the
    /// mapping comes up empty.
    pub fn open(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("failed to create config directory {}: {}", parent.display(), e);
            }
        }

        let mut store = Self {
            profiles: load_profiles(&path),
            path,
        };

        if store.profiles.is_empty() {
            debug!("no stored profiles, installing builtin defaults");
            store.profiles = builtin_profiles();
            store.save();
        }

        store
    }

    /// Per-user default storage location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wifi-switchd")
            .join("configs.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, ssid: &str) -> Option<&NetworkProfile> {
        self.profiles.get(ssid)
    }

    pub fn profiles(&self) -> &HashMap<String, NetworkProfile> {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Insert or replace the profile for `ssid` and persist the full
    /// mapping. Rejects profiles that fail validation.
    pub fn upsert(&mut self, ssid: impl Into<String>, profile: NetworkProfile) -> Result<()> {
        profile.validate()?;
        self.profiles.insert(ssid.into(), profile);
        self.save();
        Ok(())
    }

    /// Remove the profile for `ssid` if present. Returns whether an
    /// entry was deleted.
    pub fn remove(&mut self, ssid: &str) -> bool {
        let removed = self.profiles.remove(ssid).is_some();
        if removed {
            self.save();
        }
        removed
    }

    /// Merge a JSON mapping file into the store, upserting every entry.
    /// The whole import is rejected if any profile fails validation.
    /// Returns the number of entries merged.
    pub fn import_from(&mut self, path: &Path) -> Result<usize> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let imported: HashMap<String, NetworkProfile> =
            serde_json::from_slice(&data).context("import file is not a valid profile mapping")?;

        for (ssid, profile) in &imported {
            profile
                .validate()
                .with_context(|| format!("invalid profile for SSID {:?}", ssid))?;
        }

        let count = imported.len();
        self.profiles.extend(imported);
        self.save();
        Ok(count)
    }

    /// Write the current mapping to `path` in the storage format.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.profiles)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Persist the full mapping. Best-effort: failures are logged, not
    /// propagated.
    fn save(&self) {
        let data = match serde_json::to_vec_pretty(&self.profiles) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to serialize profiles: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, data) {
            warn!("failed to write {}: {}", self.path.display(), e);
        }
    }
}

/// Read the mapping from disk; absent, unreadable or corrupt storage
/// falls back to an empty mapping. Entries that parse but fail
/// validation are dropped here — a hand-edited file must never put an
/// unvalidated address into an elevated command line.
fn load_profiles(path: &Path) -> HashMap<String, NetworkProfile> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("no readable config at {}: {}", path.display(), e);
            return HashMap::new();
        }
    };
    match serde_json::from_slice::<HashMap<String, NetworkProfile>>(&data) {
        Ok(profiles) => profiles
            .into_iter()
            .filter(|(ssid, profile)| match profile.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("dropping stored profile for SSID {:?}: {}", ssid, e);
                    false
                }
            })
            .collect(),
        Err(e) => {
            warn!("corrupt config at {}, starting empty: {}", path.display(), e);
            HashMap::new()
        }
    }
}
