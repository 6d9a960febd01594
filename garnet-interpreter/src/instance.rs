use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use indexmap::IndexMap;
use num_bigint::BigInt;

use garnet_core::Location;

use crate::block::Proc;
use crate::class::Module;
use crate::interner::Symbol;
use crate::thread::ThreadHandle;
use crate::value::Value;
use crate::{read, write};

/// Represents a heap object: a plain instance of a class, or a value with a primitive payload.
pub struct Object {
    /// The object's identity.
    pub id: u64,
    /// The class this object is an instance of.
    pub class: Arc<Module>,
    payload: Mutex<Payload>,
    fields: RwLock<IndexMap<String, Value>>,
}

/// The primitive data carried by an object.
///
/// In-place mutations (eg. `Array#push`, `String#<<`) replace the payload under the object's lock.
/// The lock must never be held while guest code runs.
pub enum Payload {
    /// A plain instance.
    Plain,
    /// A mutable string.
    String(String),
    /// An integer too big to fit in 64 bits.
    BigInteger(BigInt),
    /// An array of values.
    Array(Vec<Value>),
    /// An insertion-ordered hash.
    Hash(HashTable),
    /// A range of values.
    Range(Range),
    /// A closure.
    Proc(Arc<Proc>),
    /// A guest thread.
    Thread(Arc<ThreadHandle>),
    /// A weak reference to another value.
    WeakRef(WeakTarget),
    /// An exception, along with where it was raised (once it has been).
    Exception(Option<Location>),
}

impl Object {
    /// Construct a new object.
    pub fn new(id: u64, class: Arc<Module>, payload: Payload) -> Self {
        Self {
            id,
            class,
            payload: Mutex::new(payload),
            fields: RwLock::new(IndexMap::new()),
        }
    }

    /// Lock this object's payload.
    pub fn payload(&self) -> MutexGuard<'_, Payload> {
        match self.payload.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Search for an instance variable (by name, including its `@`).
    pub fn get_field(&self, name: &str) -> Option<Value> {
        read(&self.fields).get(name).cloned()
    }

    /// Assign a value to an instance variable.
    pub fn set_field(&self, name: &str, value: Value) {
        write(&self.fields).insert(name.to_string(), value);
    }

    /// The names of the object's instance variables, in assignment order.
    pub fn field_names(&self) -> Vec<String> {
        read(&self.fields).keys().cloned().collect()
    }

    /// Copy this object's fields into another object (used by `dup`).
    pub fn copy_fields_to(&self, other: &Object) {
        let fields = read(&self.fields).clone();
        *write(&other.fields) = fields;
    }
}

/// The key of a hash entry.
///
/// Structural values hash by content, everything else by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Symbol(Symbol),
    String(String),
    BigInteger(BigInt),
    Array(Vec<HashKey>),
    Identity(u64),
}

impl HashKey {
    /// Compute the key for a given value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Boolean(value) => Self::Boolean(*value),
            Value::Integer(value) => Self::Integer(*value),
            Value::Float(value) => Self::Float(value.to_bits()),
            Value::Symbol(symbol) => Self::Symbol(symbol.clone()),
            Value::Module(module) => Self::Identity(module.id),
            Value::Object(object) => match &*object.payload() {
                Payload::String(value) => Self::String(value.clone()),
                Payload::BigInteger(value) => Self::BigInteger(value.clone()),
                Payload::Array(values) => Self::Array(values.iter().map(Self::from_value).collect()),
                _ => Self::Identity(object.id),
            },
        }
    }
}

/// The storage behind a hash.
#[derive(Clone, Default)]
pub struct HashTable {
    /// The entries, keyed by their hash key, in insertion order.
    pub entries: IndexMap<HashKey, (Value, Value)>,
    /// The value returned for missing keys.
    pub default: Option<Value>,
    /// The block called for missing keys.
    pub default_proc: Option<Arc<Proc>>,
}

impl HashTable {
    /// Create an empty hash table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping the position of an existing key.
    pub fn insert(&mut self, key: Value, value: Value) {
        let hash_key = HashKey::from_value(&key);
        match self.entries.get_mut(&hash_key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(hash_key, (key, value));
            }
        }
    }

    /// Get the value for a key.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .get(&HashKey::from_value(key))
            .map(|(_, value)| value.clone())
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries
            .shift_remove(&HashKey::from_value(key))
            .map(|(_, value)| value)
    }

    /// The key/value pairs, in insertion order.
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.entries.values().cloned().collect()
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The bounds of a range.
#[derive(Clone)]
pub struct Range {
    pub from: Value,
    pub to: Value,
    pub exclusive: bool,
}

impl Range {
    /// The integer bounds of this range (inclusive), if both ends are integers.
    pub fn integer_bounds(&self) -> Option<(i64, i64)> {
        match (&self.from, &self.to) {
            (Value::Integer(from), Value::Integer(to)) => {
                let to = if self.exclusive { to.checked_sub(1)? } else { *to };
                Some((*from, to))
            }
            (Value::Integer(from), Value::Nil) => Some((*from, i64::MAX)),
            _ => None,
        }
    }
}

/// What a weak reference points to.
pub enum WeakTarget {
    /// Immediates are never collected.
    Immediate(Value),
    /// A heap object.
    Object(Weak<Object>),
    /// A module or class.
    Module(Weak<Module>),
}

impl WeakTarget {
    /// Create a weak reference to a value.
    pub fn new(value: &Value) -> Self {
        match value {
            Value::Object(object) => Self::Object(Arc::downgrade(object)),
            Value::Module(module) => Self::Module(Arc::downgrade(module)),
            value => Self::Immediate(value.clone()),
        }
    }

    /// Get the referenced value, if it is still alive.
    pub fn upgrade(&self) -> Option<Value> {
        match self {
            Self::Immediate(value) => Some(value.clone()),
            Self::Object(object) => object.upgrade().map(Value::Object),
            Self::Module(module) => module.upgrade().map(Value::Module),
        }
    }
}
