//! Blocking system bus connection

use zbus::blocking::Connection;
use zbus::zvariant::{Structure, Value};

use super::{
    Arg, BusError, BusGateway, Field, MethodCall, Reply, MANAGER_INTERFACE, SYSTEMD_DESTINATION,
    SYSTEMD_PATH,
};

/// Gateway over a blocking connection to the system bus
pub struct SystemBus {
    connection: Connection,
}

impl SystemBus {
    /// Connect to the system bus
    pub fn open() -> Result<Self, BusError> {
        let connection = Connection::system().map_err(|e| BusError::Connect(e.to_string()))?;
        log::debug!("Connected to system bus as {:?}", connection.unique_name());
        Ok(Self { connection })
    }
}

impl BusGateway for SystemBus {
    fn call(&self, call: &MethodCall) -> Result<Reply, BusError> {
        log::debug!("D-Bus {}({:?})", call.member, call.args);

        let result = match call.args.as_slice() {
            [Arg::StrArray(first), Arg::StrArray(second)] => self.connection.call_method(
                Some(SYSTEMD_DESTINATION),
                SYSTEMD_PATH,
                Some(MANAGER_INTERFACE),
                call.member,
                &(first, second),
            ),
            [Arg::Str(arg)] => self.connection.call_method(
                Some(SYSTEMD_DESTINATION),
                SYSTEMD_PATH,
                Some(MANAGER_INTERFACE),
                call.member,
                &(arg.as_str(),),
            ),
            _ => {
                return Err(BusError::UnsupportedArgs {
                    member: call.member.to_string(),
                    signature: call.signature.to_string(),
                })
            }
        };

        let message = result.map_err(|e| BusError::Call {
            member: call.member.to_string(),
            message: e.to_string(),
        })?;

        let body = message.body();
        let values: Structure<'_> = body
            .deserialize()
            .map_err(|e| BusError::Body(e.to_string()))?;

        Ok(Reply::new(values.fields().iter().map(field_from_value).collect()))
    }
}

/// Copy a zvariant value into an owned field tree
fn field_from_value(value: &Value<'_>) -> Field {
    match value {
        Value::Str(s) => Field::Str(s.as_str().to_string()),
        Value::U32(n) => Field::U32(*n),
        Value::ObjectPath(p) => Field::ObjectPath(p.as_str().to_string()),
        Value::Array(array) => Field::Array {
            element: array.element_signature().to_string(),
            items: array.iter().map(field_from_value).collect(),
        },
        Value::Structure(s) => Field::Struct(s.fields().iter().map(field_from_value).collect()),
        other => Field::Other(other.value_signature().to_string()),
    }
}
