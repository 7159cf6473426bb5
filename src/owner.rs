//! Process owner resolution
//!
//! The owner uid comes from the process itself when procfs lets us look at
//! it. With a hardened procfs (hidepid) that fails for other users'
//! processes; those living in a user slice still reveal their owner through
//! the unit name, e.g. `user-1000.slice` or `user@1000.service`.
//!
//! The procfs uid is the owner of `/proc/<pid>`, i.e. the process's
//! effective uid. That is not the login-session owner sd_pid_get_owner_uid()
//! reports: a `sudo` shell inside `user-1000.slice` resolves to 0, and a
//! service worker that dropped privileges resolves to its own uid.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use nix::unistd::{Uid, User};
use serde::Serialize;

/// Resolved owner of a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    /// Uid reported for the process
    Process(u32),
    /// Uid parsed from the owning unit's name
    UnitName(u32),
    #[default]
    Unknown,
}

impl Owner {
    pub fn uid(&self) -> Option<u32> {
        match self {
            Owner::Process(uid) | Owner::UnitName(uid) => Some(*uid),
            Owner::Unknown => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.uid().is_some()
    }
}

/// Source of a process's owner uid
pub trait OwnerLookup {
    fn owner_uid(&self, pid: u32) -> io::Result<u32>;
}

/// Reads the owner of `/proc/<pid>`
pub struct ProcfsOwner {
    root: PathBuf,
}

impl ProcfsOwner {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use another procfs mount point
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcfsOwner {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnerLookup for ProcfsOwner {
    fn owner_uid(&self, pid: u32) -> io::Result<u32> {
        let meta = std::fs::metadata(self.root.join(pid.to_string()))?;
        Ok(meta.uid())
    }
}

/// Primary lookup with unit-name fallback
pub struct OwnerResolver<L> {
    lookup: L,
}

impl<L: OwnerLookup> OwnerResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn resolve(&self, pid: u32, unit: &str) -> Owner {
        match self.lookup.owner_uid(pid) {
            Ok(uid) => Owner::Process(uid),
            Err(e) => {
                log::debug!("Owner lookup for pid {} failed: {}", pid, e);
                match uid_from_unit_name(unit) {
                    Some(uid) => Owner::UnitName(uid),
                    None => Owner::Unknown,
                }
            }
        }
    }
}

/// Parse the uid out of a user unit name.
///
/// Matches `user`, one separator character, then decimal digits.
pub fn uid_from_unit_name(unit: &str) -> Option<u32> {
    unit.match_indices("user").find_map(|(idx, word)| {
        let mut rest = unit[idx + word.len()..].chars();
        rest.next()?;
        let digits = rest.as_str();
        let end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        digits[..end].parse().ok()
    })
}

/// Login name for a uid, if it has a passwd entry
pub fn user_name(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
}
