//! enumctl - list processes grouped by systemd unit
//!
//! Instead of scanning /proc, asks the running systemd manager over D-Bus:
//! - Lists active units matching a name glob
//! - Lists the processes in each unit's cgroup
//! - Resolves the owner uid of every process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   Enumerator                     │
//! ├─────────────────────────────────────────────────┤
//! │  Unit List  │  Unit Processes  │  Owner Resolver │
//! ├─────────────────────────────────────────────────┤
//! │        Bus Gateway (org.freedesktop.systemd1)    │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod bus;
pub mod enumerate;
pub mod init;
pub mod owner;
pub mod processes;
pub mod units;

pub use enumerate::{list_processes, EnumError, Enumeration, Enumerator, SkippedUnit};
pub use owner::Owner;
pub use processes::{ProcessRecord, UNKNOWN_CMDLINE};
pub use units::UnitRecord;
