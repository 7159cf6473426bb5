//! Init system detection
//!
//! Enumeration only makes sense when systemd is PID 1. Same rule as
//! sd_booted(): /run/systemd/system exists as a directory. If it doesn't,
//! fall back to the name of PID 1 in /proc/1/status.

use std::fs;
use std::path::Path;

pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";
pub const INIT_STATUS_FILE: &str = "/proc/1/status";

/// Check whether systemd is the running init
pub fn is_systemd_booted() -> bool {
    is_systemd_booted_at(Path::new(SYSTEMD_RUNTIME_DIR), Path::new(INIT_STATUS_FILE))
}

pub fn is_systemd_booted_at(runtime_dir: &Path, status_file: &Path) -> bool {
    // lstat, a symlink doesn't count
    if fs::symlink_metadata(runtime_dir).map_or(false, |m| m.is_dir()) {
        return true;
    }

    let status = match fs::read_to_string(status_file) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("{} not available: {}", status_file.display(), e);
            return false;
        }
    };

    match init_name(&status) {
        Some(name) if name.contains("systemd") => true,
        Some(name) => {
            log::warn!("Init process is {}, not systemd", name);
            false
        }
        None => {
            log::warn!("No Name: line in {}", status_file.display());
            false
        }
    }
}

/// Value of the `Name:` line of a /proc status file
fn init_name(status: &str) -> Option<&str> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Name:"))
        .map(str::trim)
}
