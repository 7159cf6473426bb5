//! Unit list decoding
//!
//! Asks the manager for active units matching a name glob and decodes the
//! `a(ssssssouso)` reply into [`UnitRecord`]s.

use serde::Serialize;

use crate::buffer::RecordBuffer;
use crate::bus::{BusError, BusGateway, ContainerKind, DecodeError, Fields, MethodCall};

/// Only units in this active state are listed
pub const ACTIVE_STATE_FILTER: &str = "active";

/// Signature of one ListUnitsByPatterns reply element
pub const UNIT_SIGNATURE: &str = "(ssssssouso)";

/// One unit as reported by ListUnitsByPatterns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitRecord {
    /// Unit name, e.g. "sshd.service"
    pub id: String,
    pub description: String,
    /// "loaded", "not-found", ...
    pub load_state: String,
    /// "active", "inactive", ...
    pub active_state: String,
    /// "running", "exited", ...
    pub sub_state: String,
    /// Unit this one follows, empty if none
    pub following: String,
    pub unit_path: String,
    /// Pending job id, 0 if none
    pub job_id: u32,
    pub job_type: String,
    pub job_path: String,
}

impl UnitRecord {
    fn decode(mut fields: Fields) -> Result<Self, DecodeError> {
        let unit = Self {
            id: fields.next_str()?,
            description: fields.next_str()?,
            load_state: fields.next_str()?,
            active_state: fields.next_str()?,
            sub_state: fields.next_str()?,
            following: fields.next_str()?,
            unit_path: fields.next_object_path()?,
            job_id: fields.next_u32()?,
            job_type: fields.next_str()?,
            job_path: fields.next_object_path()?,
        };
        fields.finish()?;
        Ok(unit)
    }

    /// Whether a job is queued for this unit
    pub fn has_job(&self) -> bool {
        self.job_id != 0
    }
}

/// List active units whose name matches `pattern`.
///
/// A row that fails to decode ends the list; rows before it are kept.
pub fn list_units<B: BusGateway + ?Sized>(
    bus: &B,
    pattern: &str,
) -> Result<Vec<UnitRecord>, ListError> {
    let call = MethodCall::list_units_by_patterns(&[ACTIVE_STATE_FILTER], &[pattern]);
    let mut reply = bus.call(&call).map_err(ListError::Call)?;
    let mut rows = reply
        .enter(ContainerKind::Array, UNIT_SIGNATURE)
        .map_err(ListError::Container)?;

    let mut units = RecordBuffer::new();
    loop {
        let unit = match rows.read_struct(UNIT_SIGNATURE) {
            Ok(Some(fields)) => UnitRecord::decode(fields),
            Ok(None) => break,
            Err(e) => Err(e),
        };

        let unit = match unit {
            Ok(unit) => unit,
            Err(e) => {
                log::warn!("Malformed unit list entry after {} units: {}", units.len(), e);
                break;
            }
        };

        log::debug!("{} ({}/{}/{})", unit.id, unit.load_state, unit.active_state, unit.sub_state);

        if let Err(e) = units.push(unit) {
            log::error!("Unit list truncated at {} units: {}", units.len(), e);
            break;
        }
    }

    Ok(units.into_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("Failed to request unit list: {0}")]
    Call(#[source] BusError),

    #[error("Failed to parse unit list: {0}")]
    Container(#[source] DecodeError),
}
