//! Enumeration pass
//!
//! Lists matching units, then asks for the processes of each unit in turn.
//! Only a failed unit list aborts the pass; a unit whose processes cannot
//! be read contributes nothing and the pass moves on.

use serde::Serialize;

use crate::buffer::GROWTH_INCREMENT;
use crate::bus::{BusError, BusGateway, SystemBus};
use crate::owner::{OwnerLookup, OwnerResolver, ProcfsOwner};
use crate::processes::{list_unit_processes, ProcessList, ProcessRecord, UnitOutcome};
use crate::units::{list_units, ListError};

/// A unit that contributed no processes, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUnit {
    pub unit: String,
    pub reason: String,
}

/// Result of one pass
#[derive(Debug, Default, Serialize)]
pub struct Enumeration {
    /// Number of units matched by the pattern
    pub units: usize,
    pub processes: Vec<ProcessRecord>,
    pub skipped: Vec<SkippedUnit>,
}

pub struct Enumerator<B, L> {
    bus: B,
    resolver: OwnerResolver<L>,
    growth_increment: usize,
}

impl Enumerator<SystemBus, ProcfsOwner> {
    /// Enumerator over the system bus, resolving owners through /proc
    pub fn connect() -> Result<Self, EnumError> {
        let bus = SystemBus::open().map_err(EnumError::Connect)?;
        Ok(Self::new(bus, ProcfsOwner::new()))
    }
}

impl<B: BusGateway, L: OwnerLookup> Enumerator<B, L> {
    pub fn new(bus: B, lookup: L) -> Self {
        Self {
            bus,
            resolver: OwnerResolver::new(lookup),
            growth_increment: GROWTH_INCREMENT,
        }
    }

    /// Slots added to the process list each time it fills up
    pub fn with_growth_increment(mut self, increment: usize) -> Self {
        self.growth_increment = increment;
        self
    }

    /// Run one pass over the units matching `pattern`
    pub fn run(&self, pattern: &str) -> Result<Enumeration, EnumError> {
        let units = list_units(&self.bus, pattern)?;
        log::info!("{} active units match {}", units.len(), pattern);

        let mut processes = ProcessList::with_increment(self.growth_increment);
        let mut skipped = Vec::new();

        for unit in &units {
            match list_unit_processes(&self.bus, &unit.id, &self.resolver, &mut processes) {
                UnitOutcome::Listed(count) => {
                    log::debug!("{}: {} processes", unit.id, count);
                }
                UnitOutcome::Skipped(e) => {
                    log::warn!("Skipping unit {}: {}", unit.id, e);
                    skipped.push(SkippedUnit {
                        unit: unit.id.clone(),
                        reason: e.to_string(),
                    });
                }
                UnitOutcome::Truncated { listed, error } => {
                    log::warn!(
                        "Process list of {} cut short after {} entries: {}",
                        unit.id,
                        listed,
                        error
                    );
                }
                UnitOutcome::OutOfMemory { listed, error } => {
                    log::error!("Stopping at {} after {} entries: {}", unit.id, listed, error);
                    break;
                }
            }
        }

        Ok(Enumeration {
            units: units.len(),
            processes: processes.into_vec(),
            skipped,
        })
    }

    /// Processes of all units matching `pattern`
    pub fn list_processes(&self, pattern: &str) -> Result<Vec<ProcessRecord>, EnumError> {
        Ok(self.run(pattern)?.processes)
    }
}

/// Connect to the system bus and list the processes of every active unit
/// matching `pattern`
pub fn list_processes(pattern: &str) -> Result<Vec<ProcessRecord>, EnumError> {
    Enumerator::connect()?.list_processes(pattern)
}

#[derive(Debug, thiserror::Error)]
pub enum EnumError {
    #[error(transparent)]
    Connect(BusError),

    #[error(transparent)]
    ListUnits(#[from] ListError),
}
