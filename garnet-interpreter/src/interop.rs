use garnet_core::Location;

use crate::error::Error;
use crate::instance::Payload;
use crate::universe::Universe;
use crate::value::Value;

/// A value on the host side of the interop boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<HostValue>),
}

/// The host type a Garnet value is projected into.
#[derive(Debug, Clone, PartialEq)]
pub enum HostType {
    Bool,
    Integer,
    Float,
    String,
    /// A list whose elements are all projected into the given type.
    List(Box<HostType>),
    /// Whatever type fits the value best.
    Any,
}

/// The conversions between Garnet values and host values.
///
/// Caching projections is the adapter's business.
pub trait HostAdapter: Send + Sync {
    /// Convert a host value into a Garnet value.
    fn to_instance(&self, universe: &Universe, value: HostValue) -> Result<Value, Error>;

    /// Convert a Garnet value into the requested host type.
    ///
    /// Returns `Ok(None)` when the value has no representation on the host side.
    fn to_host_value(&self, value: &Value, target: HostType) -> Result<Option<HostValue>, Error>;
}

/// The adapter covering booleans, integers, floats, strings and lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAdapter;

impl HostAdapter for DefaultAdapter {
    fn to_instance(&self, universe: &Universe, value: HostValue) -> Result<Value, Error> {
        Ok(match value {
            HostValue::Nil => Value::Nil,
            HostValue::Bool(value) => Value::Boolean(value),
            HostValue::Integer(value) => Value::Integer(value),
            HostValue::Float(value) => Value::Float(value),
            HostValue::String(value) => universe.string(value),
            HostValue::List(values) => {
                let values = values
                    .into_iter()
                    .map(|value| self.to_instance(universe, value))
                    .collect::<Result<Vec<_>, _>>()?;
                universe.array(values)
            }
        })
    }

    fn to_host_value(&self, value: &Value, target: HostType) -> Result<Option<HostValue>, Error> {
        let projected = match (value, &target) {
            (Value::Nil, _) => Some(HostValue::Nil),
            (Value::Boolean(value), HostType::Bool | HostType::Any) => Some(HostValue::Bool(*value)),
            (Value::Integer(value), HostType::Integer | HostType::Any) => {
                Some(HostValue::Integer(*value))
            }
            (Value::Integer(value), HostType::Float) => Some(HostValue::Float(*value as f64)),
            (Value::Float(value), HostType::Float | HostType::Any) => Some(HostValue::Float(*value)),
            (Value::Symbol(symbol), HostType::String | HostType::Any) => {
                Some(HostValue::String(symbol.to_string()))
            }
            (Value::Object(object), _) => {
                let payload = object.payload();
                match (&*payload, &target) {
                    (Payload::String(value), HostType::String | HostType::Any) => {
                        Some(HostValue::String(value.clone()))
                    }
                    (Payload::Array(values), HostType::List(_) | HostType::Any) => {
                        let values = values.clone();
                        drop(payload);
                        let element = match target {
                            HostType::List(element) => *element,
                            _ => HostType::Any,
                        };
                        let mut projected = Vec::with_capacity(values.len());
                        for value in values.iter() {
                            match self.to_host_value(value, element.clone())? {
                                Some(value) => projected.push(value),
                                None => return Ok(None),
                            }
                        }
                        Some(HostValue::List(projected))
                    }
                    (Payload::String(_), _) | (Payload::Array(_), _) => {
                        return Err(Error::Interop(format!(
                            "cannot convert an instance of {} into {:?}",
                            object.class.name(),
                            target
                        )))
                    }
                    _ => None,
                }
            }
            (Value::Module(_), _) => None,
            (value, target) => {
                return Err(Error::Interop(format!(
                    "cannot convert {:?} into {:?}",
                    value, target
                )))
            }
        };
        Ok(projected)
    }
}

/// Project a value through the universe's adapter, warning when it has no host representation.
pub fn project(universe: &Universe, value: &Value, target: HostType) -> Result<Option<HostValue>, Error> {
    if universe.config.compile_interop {
        log::debug!("projecting {:?} into {:?}", value, target);
    }
    let projected = universe.adapter.to_host_value(value, target.clone())?;
    if projected.is_none() {
        universe.warn(
            Location::default(),
            format!(
                "an instance of {} cannot be represented as {:?} on the host",
                value.class(universe).name(),
                target
            ),
        );
    }
    Ok(projected)
}
