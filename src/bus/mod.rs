//! D-Bus access to the systemd manager
//!
//! Requests go to org.freedesktop.systemd1 on the system bus:
//! - ListUnitsByPatterns: units filtered by state and name glob
//! - GetUnitProcesses: processes in a unit's cgroup
//!
//! The decoders only see the [`BusGateway`] trait; [`SystemBus`] is the
//! implementation over a real connection.

mod connection;
pub mod message;

pub use connection::SystemBus;
pub use message::{Container, ContainerKind, DecodeError, Field, Fields, Reply};

pub const SYSTEMD_DESTINATION: &str = "org.freedesktop.systemd1";
pub const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";

/// Argument of a manager method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    StrArray(Vec<String>),
}

/// A call to a method of the systemd Manager interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub member: &'static str,
    pub signature: &'static str,
    pub args: Vec<Arg>,
}

impl MethodCall {
    /// ListUnitsByPatterns(as states, as patterns)
    pub fn list_units_by_patterns(states: &[&str], patterns: &[&str]) -> Self {
        Self {
            member: "ListUnitsByPatterns",
            signature: "asas",
            args: vec![Arg::StrArray(to_strings(states)), Arg::StrArray(to_strings(patterns))],
        }
    }

    /// GetUnitProcesses(s unit)
    pub fn get_unit_processes(unit: &str) -> Self {
        Self {
            member: "GetUnitProcesses",
            signature: "s",
            args: vec![Arg::Str(unit.to_string())],
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Synchronous request/reply access to the service manager
pub trait BusGateway {
    /// Invoke a Manager method and wait for its reply
    fn call(&self, call: &MethodCall) -> Result<Reply, BusError>;
}

impl<B: BusGateway + ?Sized> BusGateway for &B {
    fn call(&self, call: &MethodCall) -> Result<Reply, BusError> {
        (**self).call(call)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Failed to connect to system bus: {0}")]
    Connect(String),

    #[error("{member} failed: {message}")]
    Call { member: String, message: String },

    #[error("Unsupported arguments for {member} ({signature})")]
    UnsupportedArgs {
        member: String,
        signature: String,
    },

    #[error("Unreadable reply body: {0}")]
    Body(String),
}
