use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::class::Module;
use crate::instance::{Object, Payload};
use crate::interner::Symbol;
use crate::universe::Universe;

/// Represents a Garnet value.
///
/// Immediates are unboxed, everything else lives behind an `Arc`.
#[derive(Clone)]
pub enum Value {
    /// The **nil** value.
    Nil,
    /// A boolean value (**true** or **false**).
    Boolean(bool),
    /// An integer value that fits in 64 bits.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// An interned symbol value.
    Symbol(Symbol),
    /// A heap object (plain instance or primitive payload).
    Object(Arc<Object>),
    /// A module or a class.
    Module(Arc<Module>),
}

impl Value {
    /// Get the class of the current value.
    pub fn class(&self, universe: &Universe) -> Arc<Module> {
        match self {
            Self::Nil => universe.core.nil_class.clone(),
            Self::Boolean(true) => universe.core.true_class.clone(),
            Self::Boolean(false) => universe.core.false_class.clone(),
            Self::Integer(_) => universe.core.integer_class.clone(),
            Self::Float(_) => universe.core.float_class.clone(),
            Self::Symbol(_) => universe.core.symbol_class.clone(),
            Self::Object(object) => object.class.clone(),
            Self::Module(module) if module.is_class() => universe.core.class_class.clone(),
            Self::Module(_) => universe.core.module_class.clone(),
        }
    }

    /// Everything but `nil` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Boolean(false))
    }

    /// Whether this value is `nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Identity comparison (`equal?`).
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The value's object id.
    pub fn object_id(&self) -> u64 {
        match self {
            Self::Nil => 8,
            Self::Boolean(true) => 20,
            Self::Boolean(false) => 0,
            Self::Integer(value) => (*value as u64).wrapping_mul(2).wrapping_add(1),
            Self::Float(value) => value.to_bits().wrapping_mul(4).wrapping_add(2),
            Self::Symbol(symbol) => {
                let mut hash = 0xcbf2_9ce4_8422_2325u64;
                for byte in symbol.as_str().bytes() {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(0x100_0000_01b3);
                }
                (hash << 3) | 4
            }
            Self::Object(object) => object.id,
            Self::Module(module) => module.id,
        }
    }

    /// Get the heap object behind this value, if any.
    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Get the module behind this value, if any.
    pub fn as_module(&self) -> Option<&Arc<Module>> {
        match self {
            Self::Module(module) => Some(module),
            _ => None,
        }
    }

    /// Get a copy of the string payload, if this value is a string.
    pub fn as_string(&self) -> Option<String> {
        self.as_object().and_then(|object| match &*object.payload() {
            Payload::String(value) => Some(value.clone()),
            _ => None,
        })
    }

    /// Get a copy of the array payload, if this value is an array.
    pub fn as_array(&self) -> Option<Vec<Value>> {
        self.as_object().and_then(|object| match &*object.payload() {
            Payload::Array(values) => Some(values.clone()),
            _ => None,
        })
    }

    /// Get a copy of the big integer payload, if this value is a big integer.
    pub fn as_big_integer(&self) -> Option<BigInt> {
        match self {
            Self::Integer(value) => Some(BigInt::from(*value)),
            Self::Object(object) => match &*object.payload() {
                Payload::BigInteger(value) => Some(value.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether this value is an array.
    pub fn is_array(&self) -> bool {
        self.as_object()
            .map_or(false, |object| matches!(&*object.payload(), Payload::Array(_)))
    }

    /// Whether this value is a hash.
    pub fn is_hash(&self) -> bool {
        self.as_object()
            .map_or(false, |object| matches!(&*object.payload(), Payload::Hash(_)))
    }

    /// Whether this value is a string.
    pub fn is_string(&self) -> bool {
        self.as_object()
            .map_or(false, |object| matches!(&*object.payload(), Payload::String(_)))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Boolean(value) => f.debug_tuple("Boolean").field(value).finish(),
            Self::Integer(value) => f.debug_tuple("Integer").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Symbol(value) => f.debug_tuple("Symbol").field(value).finish(),
            Self::Object(object) => f
                .debug_struct("Object")
                .field("id", &object.id)
                .field("class", &object.class.name)
                .finish(),
            Self::Module(module) => f.debug_tuple("Module").field(&module.name).finish(),
        }
    }
}

/// Format a float the way the language prints it (always with a fractional part).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_infinite() {
        String::from(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else if value.abs() >= 1e16 || (value != 0.0 && value.abs() < 1e-4) {
        let formatted = format!("{:e}", value);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let mantissa = if mantissa.contains('.') {
                    mantissa.to_string()
                } else {
                    format!("{}.0", mantissa)
                };
                match exponent.strip_prefix('-') {
                    Some(exponent) => format!("{}e-{:0>2}", mantissa, exponent),
                    None => format!("{}e+{:0>2}", mantissa, exponent),
                }
            }
            None => formatted,
        }
    } else {
        value.to_string()
    }
}

/// Quote and escape a string the way `inspect` shows it.
pub fn quote(value: &str) -> String {
    let mut output = String::with_capacity(value.len() + 2);
    output.push('"');
    for ch in value.chars() {
        match ch {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\t' => output.push_str("\\t"),
            '\r' => output.push_str("\\r"),
            '\0' => output.push_str("\\0"),
            '\u{1b}' => output.push_str("\\e"),
            ch => output.push(ch),
        }
    }
    output.push('"');
    output
}

/// Render a symbol the way `inspect` shows it (`:name`, `:"two words"`).
pub fn inspect_symbol(name: &str) -> String {
    let plain = !name.is_empty()
        && (name.chars().all(|ch| ch.is_alphanumeric() || "_?!=@$".contains(ch))
            && !name.starts_with(|ch: char| ch.is_ascii_digit())
            || crate::primitives::OPERATOR_NAMES.contains(&name));
    if plain {
        format!(":{}", name)
    } else {
        format!(":{}", quote(name))
    }
}
