//! Pending OS update count metric group.
//!
//! Queries the platform package machinery through a command side channel
//! with a hard timeout. Reported as `pending_updates`; the special value
//! `-1` means "no updates remain but a reboot is pending".

use std::io::Read;
use std::process::Stdio;
use std::time::{Duration, Instant};

use super::{FieldMap, FieldValue, MetricSource};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct UpdateSource;

/// Run a command, returning its stdout on success within the timeout.
fn run_command(cmd: &str, args: &[&str]) -> Option<String> {
    run_command_with(cmd, args, &[])
}

/// Like [`run_command`], additionally treating the listed exit codes as
/// success. Commands that signal through their exit code (dnf) opt in here;
/// everyone else gets the strict zero-only rule.
fn run_command_with(cmd: &str, args: &[&str], extra_success: &[i32]) -> Option<String> {
    let mut child = std::process::Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    // Drain stdout on its own thread: a command whose output exceeds the
    // pipe buffer would otherwise block writing and never exit.
    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut out = Vec::new();
        let _ = stdout.read_to_end(&mut out);
        out
    });

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let accepted = status.success()
                    || status.code().is_some_and(|c| extra_success.contains(&c));
                let out = reader.join().unwrap_or_default();
                if !accepted {
                    return None;
                }
                return Some(String::from_utf8_lossy(&out).into_owned());
            }
            Ok(None) => {
                if start.elapsed() > COMMAND_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return None;
            }
        }
    }
}

/// Count pending upgrades in `apt-get -s upgrade` output.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn count_apt_upgrades(output: &str) -> i64 {
    output
        .lines()
        .filter(|l| l.starts_with("Inst "))
        .count() as i64
}

/// Count pending updates in `dnf check-update -q` output: one non-blank,
/// non-continuation line per package.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn count_dnf_updates(output: &str) -> i64 {
    output
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with(' '))
        .count() as i64
}

/// Count pending updates in `softwareupdate -l` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn count_softwareupdate(output: &str) -> i64 {
    output
        .lines()
        .filter(|l| l.trim_start().starts_with('*'))
        .count() as i64
}

#[cfg(target_os = "linux")]
fn pending_updates() -> Option<i64> {
    if let Some(out) = run_command("apt-get", &["-s", "upgrade"]) {
        return Some(count_apt_upgrades(&out));
    }
    // dnf check-update exits 100 when updates exist.
    run_command_with("dnf", &["check-update", "-q"], &[100]).map(|out| count_dnf_updates(&out))
}

#[cfg(target_os = "linux")]
fn reboot_required() -> bool {
    std::path::Path::new("/var/run/reboot-required").exists()
}

#[cfg(target_os = "macos")]
fn pending_updates() -> Option<i64> {
    run_command("softwareupdate", &["-l"]).map(|out| count_softwareupdate(&out))
}

#[cfg(target_os = "macos")]
fn reboot_required() -> bool {
    false
}

#[cfg(target_os = "windows")]
fn pending_updates() -> Option<i64> {
    let script = "$Session = New-Object -ComObject Microsoft.Update.Session; \
                  $Searcher = $Session.CreateUpdateSearcher(); \
                  $Results = $Searcher.Search(\"IsInstalled=0 and Type='Software'\"); \
                  $Results.Updates.Count";
    let out = run_command("powershell", &["-Command", script])?;
    out.trim().parse().ok()
}

#[cfg(target_os = "windows")]
fn reboot_required() -> bool {
    run_command(
        "reg",
        &[
            "query",
            r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\WindowsUpdate\Auto Update\RebootRequired",
        ],
    )
    .is_some()
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn pending_updates() -> Option<i64> {
    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn reboot_required() -> bool {
    false
}

impl MetricSource for UpdateSource {
    fn name(&self) -> &'static str {
        "updates"
    }

    fn collect(&self) -> Result<FieldMap, String> {
        let count =
            pending_updates().ok_or_else(|| "update check unavailable on this host".to_string())?;
        let count = if count == 0 && reboot_required() {
            -1
        } else {
            count
        };

        let mut fields = FieldMap::new();
        fields.insert("pending_updates".to_string(), FieldValue::Integer(count));
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apt_output_counts_inst_lines() {
        let out = "NOTE: This is only a simulation!\n\
                   Inst libssl3 [3.0.2-0ubuntu1.14] (jammy-updates)\n\
                   Conf libssl3 (3.0.2-0ubuntu1.15)\n\
                   Inst curl [7.81.0-1ubuntu1.15]\n";
        assert_eq!(count_apt_upgrades(out), 2);
        assert_eq!(count_apt_upgrades(""), 0);
    }

    #[test]
    fn dnf_output_counts_package_lines() {
        let out = "kernel.x86_64   5.14.0-300   updates\n\
                   openssl.x86_64  3.0.7-20     updates\n\n";
        assert_eq!(count_dnf_updates(out), 2);
    }

    #[test]
    fn softwareupdate_output_counts_bullets() {
        let out = "Software Update Tool\n\
                   Finding available software\n\
                   * Label: macOS Sonoma 14.5\n\
                     Title: macOS Sonoma\n";
        assert_eq!(count_softwareupdate(out), 1);
    }

    #[test]
    fn missing_command_is_none_not_a_hang() {
        assert_eq!(run_command("definitely-not-a-command-9f3a", &[]), None);
    }

    #[cfg(unix)]
    #[test]
    fn exit_100_is_failure_unless_opted_in() {
        // apt-get uses 100 for real failures (held lock, broken sources).
        let args = &["-c", "echo 'E: Could not get lock'; exit 100"];
        assert_eq!(run_command("sh", args), None);
        // dnf opts in: 100 means "updates available".
        let args = &["-c", "echo kernel.x86_64; exit 100"];
        assert_eq!(
            run_command_with("sh", args, &[100]),
            Some("kernel.x86_64\n".to_string())
        );
    }

    #[cfg(unix)]
    #[test]
    fn output_larger_than_the_pipe_buffer_is_drained() {
        let out = run_command("sh", &["-c", "head -c 200000 /dev/zero"]).unwrap();
        assert_eq!(out.len(), 200_000);
    }
}
