//! Per-unit process decoding
//!
//! GetUnitProcesses answers with `a(sus)`: control group path, pid and
//! command line of every process in the unit's cgroup subtree.

use std::collections::HashSet;

use serde::Serialize;

use crate::buffer::{BufferError, RecordBuffer};
use crate::bus::{BusError, BusGateway, ContainerKind, DecodeError, Fields, MethodCall};
use crate::owner::{Owner, OwnerLookup, OwnerResolver};

/// Signature of one GetUnitProcesses reply element
pub const PROCESS_SIGNATURE: &str = "(sus)";

/// Command line recorded when the manager reports none
pub const UNKNOWN_CMDLINE: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub cmdline: String,
    pub owner: Owner,
    /// Name of the unit the process was listed under
    pub unit: String,
    /// Absolute control group path, e.g. `/system.slice/sshd.service`
    pub control_group: String,
}

/// Processes collected during one enumeration pass.
///
/// A pid is recorded once, under the first unit that lists it.
#[derive(Debug, Default)]
pub struct ProcessList {
    records: RecordBuffer<ProcessRecord>,
    seen: HashSet<u32>,
}

impl ProcessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_increment(increment: usize) -> Self {
        Self {
            records: RecordBuffer::with_increment(increment),
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a record; `Ok(false)` if its pid is already listed
    pub fn insert(&mut self, record: ProcessRecord) -> Result<bool, BufferError> {
        if self.seen.contains(&record.pid) {
            return Ok(false);
        }
        let pid = record.pid;
        self.records.push(record)?;
        self.seen.insert(pid);
        Ok(true)
    }

    pub fn as_slice(&self) -> &[ProcessRecord] {
        self.records.as_slice()
    }

    pub fn into_vec(self) -> Vec<ProcessRecord> {
        self.records.into_vec()
    }
}

/// Result of listing the processes of one unit
#[derive(Debug)]
pub enum UnitOutcome {
    /// Reply fully decoded, number of processes added
    Listed(usize),
    /// Nothing could be requested or read for this unit
    Skipped(UnitError),
    /// A malformed row stopped decoding; rows before it were added
    Truncated { listed: usize, error: DecodeError },
    /// The process list could not grow
    OutOfMemory { listed: usize, error: BufferError },
}

#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Failed to request processes: {0}")]
    Call(#[source] BusError),

    #[error("Failed to parse process list: {0}")]
    Container(#[source] DecodeError),
}

fn decode_row(mut fields: Fields) -> Result<(String, u32, String), DecodeError> {
    let control_group = fields.next_str()?;
    let pid = fields.next_u32()?;
    let cmdline = fields.next_str()?;
    fields.finish()?;
    Ok((control_group, pid, cmdline))
}

/// Append the processes of `unit` to `out`
pub fn list_unit_processes<B, L>(
    bus: &B,
    unit: &str,
    resolver: &OwnerResolver<L>,
    out: &mut ProcessList,
) -> UnitOutcome
where
    B: BusGateway + ?Sized,
    L: OwnerLookup,
{
    let mut reply = match bus.call(&MethodCall::get_unit_processes(unit)) {
        Ok(reply) => reply,
        Err(e) => return UnitOutcome::Skipped(UnitError::Call(e)),
    };
    let mut rows = match reply.enter(ContainerKind::Array, PROCESS_SIGNATURE) {
        Ok(rows) => rows,
        Err(e) => return UnitOutcome::Skipped(UnitError::Container(e)),
    };

    let mut listed = 0;
    loop {
        let row = match rows.read_struct(PROCESS_SIGNATURE) {
            Ok(Some(fields)) => decode_row(fields),
            Ok(None) => break,
            Err(e) => Err(e),
        };
        let (control_group, pid, cmdline) = match row {
            Ok(row) => row,
            Err(error) => return UnitOutcome::Truncated { listed, error },
        };

        // Not a live process
        if pid == 0 {
            continue;
        }

        let record = ProcessRecord {
            pid,
            cmdline: if cmdline.is_empty() {
                UNKNOWN_CMDLINE.to_string()
            } else {
                cmdline
            },
            owner: resolver.resolve(pid, unit),
            unit: unit.to_string(),
            control_group,
        };

        log::debug!("{}: {} {:?} {}", unit, record.pid, record.owner, record.cmdline);

        match out.insert(record) {
            Ok(true) => listed += 1,
            Ok(false) => log::debug!("pid {} already listed, skipping under {}", pid, unit),
            Err(error) => return UnitOutcome::OutOfMemory { listed, error },
        }
    }

    UnitOutcome::Listed(listed)
}
