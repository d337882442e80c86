//! Machine fingerprint used as credential salt.
//!
//! The fingerprint is a reproducible string of stable host identifiers. It
//! is salt material only: never transmitted, never treated as a secret, and
//! not required to be unguessable — it just has to come out the same on
//! every restart of the agent on the same machine.
//!
//! The hardware UUID is a best-effort side channel that differs per
//! platform and is occasionally unavailable (stripped DMI, sandboxed
//! process). When it cannot be read, the fallback combines host name,
//! architecture and a host-provided environment identifier instead.

use sysinfo::System;

/// Build the fingerprint for this machine: `host-uuid-arch`, or the
/// fallback `host-arch-envid` when no hardware UUID can be obtained.
pub fn machine_fingerprint() -> String {
    let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
    let arch = std::env::consts::ARCH;
    match hardware_uuid() {
        Some(uuid) => format!("{host}-{uuid}-{arch}"),
        None => format!("{host}-{arch}-{}", environment_id()),
    }
}

/// Host-provided environment identifier for the fallback path.
fn environment_id() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Query a stable hardware identifier through the platform side channel.
#[cfg(target_os = "linux")]
fn hardware_uuid() -> Option<String> {
    // machine-id survives reboots; the DMI product UUID is the second
    // choice because reading it can require elevated privileges.
    for path in ["/etc/machine-id", "/sys/class/dmi/id/product_uuid"] {
        if let Ok(raw) = std::fs::read_to_string(path) {
            let id = raw.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

#[cfg(target_os = "macos")]
fn hardware_uuid() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .find(|l| l.contains("IOPlatformUUID"))
        .and_then(|l| l.split('"').nth(3))
        .map(str::to_string)
}

#[cfg(target_os = "windows")]
fn hardware_uuid() -> Option<String> {
    let output = std::process::Command::new("wmic")
        .args(["csproduct", "get", "uuid"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.eq_ignore_ascii_case("uuid"))
        .map(str::to_string)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn hardware_uuid() -> Option<String> {
    None
}
