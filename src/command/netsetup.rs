//! Invocations for the platform network tool (`networksetup`).
//!
//! Applying a profile needs two mutations: the DNS server list and the
//! manual IP/subnet/gateway. Both are folded into a single elevated
//! `do shell script` call so the user answers exactly one authorization
//! prompt per apply attempt. Verification and the SSID query are plain
//! unprivileged invocations.

use crate::config::NetworkProfile;

pub const NETWORKSETUP: &str = "/usr/sbin/networksetup";
const OSASCRIPT: &str = "/usr/bin/osascript";

/// Builds argv for the network service being managed
#[derive(Debug, Clone)]
pub struct NetworkTool {
    /// Network service name, e.g. "Wi-Fi"
    service: String,
    /// Hardware device backing the service, e.g. "en0"
    device: String,
}

impl NetworkTool {
    pub fn new(service: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            device: device.into(),
        }
    }

    /// One elevated invocation applying the full profile.
    pub fn apply_invocation(&self, profile: &NetworkProfile) -> (String, Vec<String>) {
        let set_dns = format!(
            "{} -setdnsservers {} {}",
            NETWORKSETUP,
            self.service,
            profile.dns.join(" ")
        );
        let set_manual = format!(
            "{} -setmanual {} {} {} {}",
            NETWORKSETUP, self.service, profile.ip, profile.subnet, profile.gateway
        );
        let script = format!(
            "do shell script \"{} && {}\" with administrator privileges",
            set_dns, set_manual
        );
        (OSASCRIPT.to_string(), vec!["-e".to_string(), script])
    }

    /// Read-only interface info dump used for verification.
    pub fn verify_invocation(&self) -> (String, Vec<String>) {
        (
            NETWORKSETUP.to_string(),
            vec!["-getinfo".to_string(), self.service.clone()],
        )
    }

    /// Read-only query for the currently associated SSID.
    pub fn ssid_invocation(&self) -> (String, Vec<String>) {
        (
            NETWORKSETUP.to_string(),
            vec!["-getairportnetwork".to_string(), self.device.clone()],
        )
    }
}

impl Default for NetworkTool {
    fn default() -> Self {
        Self::new("Wi-Fi", "en0")
    }
}

/// Parse `-getairportnetwork` output. Returns None when the interface
/// is not associated with any network.
pub fn parse_ssid_output(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim();
    if line.contains("not associated") {
        return None;
    }
    let ssid = line.strip_prefix("Current Wi-Fi Network: ")?.trim();
    if ssid.is_empty() {
        None
    } else {
        Some(ssid.to_string())
    }
}
