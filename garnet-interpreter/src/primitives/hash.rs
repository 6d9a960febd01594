use std::sync::Arc;

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::{HashTable, Payload};
use crate::invokable::{self, Return};
use crate::primitives::{inspect, require_block, values_equal, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::{inspect_symbol, Value};

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("initialize", self::initialize, false),
    ("[]", self::get, true),
    ("[]=", self::set, true),
    ("fetch", self::fetch, true),
    ("key?", self::has_key, true),
    ("include?", self::has_key, true),
    ("member?", self::has_key, true),
    ("keys", self::keys, true),
    ("values", self::values, true),
    ("each", self::each, true),
    ("length", self::length, true),
    ("size", self::length, true),
    ("empty?", self::is_empty, true),
    ("delete", self::delete, true),
    ("merge", self::merge, true),
    ("to_h", self::to_h, true),
    ("clear", self::clear, true),
    ("==", self::eq, true),
    ("eql?", self::eq, true),
    ("inspect", self::inspect_hash, true),
    ("to_s", self::inspect_hash, true),
];

/// Copy the table of a hash receiver.
fn table_of(universe: &Universe, signature: &str, value: &Value) -> Result<HashTable, Return> {
    value
        .as_object()
        .and_then(|object| match &*object.payload() {
            Payload::Hash(table) => Some(table.clone()),
            _ => None,
        })
        .ok_or_else(|| universe.wrong_type(signature, value))
}

/// Mutate a hash receiver in place (no guest code may run while the payload is locked).
fn with_table<R>(
    universe: &Universe,
    signature: &str,
    value: &Value,
    f: impl FnOnce(&mut HashTable) -> R,
) -> Result<R, Return> {
    if let Some(object) = value.as_object() {
        if let Payload::Hash(table) = &mut *object.payload() {
            return Ok(f(table));
        }
    }
    Err(universe.wrong_type(signature, value))
}

/// Look a key up, falling back to the hash's default value or default block.
pub(crate) fn lookup(universe: &Universe, context: &Context, hash: &Value, key: Value) -> Return {
    const SIGNATURE: &str = "Hash#[]";

    let (found, default, default_proc) = propagate!(with_table(universe, SIGNATURE, hash, |table| {
        (table.get(&key), table.default.clone(), table.default_proc.clone())
    }));
    match (found, default_proc) {
        (Some(value), _) => Return::Local(value),
        (None, Some(proc)) => invokable::call_block(universe, context, &proc, vec![hash.clone(), key]),
        (None, None) => Return::Local(default.unwrap_or(Value::Nil)),
    }
}

fn initialize(universe: &Universe, _: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#initialize";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    let default = args.next();
    propagate!(with_table(universe, SIGNATURE, &receiver, |table| {
        table.default = default;
        table.default_proc = block;
    }));
    Return::Local(Value::Nil)
}

fn get(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#[]";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        key => key,
    ]);

    lookup(universe, context, &receiver, key)
}

fn set(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#[]=";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        key => key,
        value => value,
    ]);

    // String keys are copied so that later mutations of the original do not affect the entry.
    let key = match key.as_string() {
        Some(text) => universe.string(text),
        None => key,
    };
    propagate!(with_table(universe, SIGNATURE, &receiver, |table| {
        table.insert(key, value.clone())
    }));
    Return::Local(value)
}

fn fetch(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#fetch";

    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let key = match args.next() {
        Some(key) => key,
        None => return universe.missing_argument(SIGNATURE),
    };
    let found = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.get(&key)));
    if let Some(value) = found {
        return Return::Local(value);
    }
    if let Some(block) = block {
        return invokable::call_block(universe, context, &block, vec![key]);
    }
    match args.next() {
        Some(default) => Return::Local(default),
        None => {
            let rendered = propagate!(inspect(universe, context, &key));
            let exception = universe.exception(
                &universe.core.key_error,
                format!("key not found: {}", rendered),
            );
            universe.set_instance_variable(&exception, "@key", key);
            universe.set_instance_variable(&exception, "@receiver", receiver);
            Return::Raise(exception)
        }
    }
}

fn has_key(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#key?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        key => key,
    ]);

    let found = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.get(&key).is_some()));
    Return::Local(Value::Boolean(found))
}

fn key(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#key";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        target => target,
    ]);

    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    for (key, value) in table.pairs().into_iter() {
        if propagate!(values_equal(universe, context, &value, &target)) {
            return Return::Local(key);
        }
    }
    Return::Local(Value::Nil)
}

fn keys(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#keys";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    Return::Local(universe.array(table.pairs().into_iter().map(|(key, _)| key).collect()))
}

fn values(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#values";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    Return::Local(universe.array(table.pairs().into_iter().map(|(_, value)| value).collect()))
}

fn each(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#each";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    for (key, value) in table.pairs().into_iter() {
        let pair = universe.array(vec![key, value]);
        propagate!(invokable::call_block(universe, context, &block, vec![pair]));
    }
    Return::Local(receiver)
}

fn length(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#length";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let len = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.len()));
    Return::Local(Value::Integer(len as i64))
}

fn is_empty(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#empty?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let empty = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.is_empty()));
    Return::Local(Value::Boolean(empty))
}

fn delete(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#delete";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        key => key,
    ]);

    let removed = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.remove(&key)));
    match (removed, block) {
        (Some(value), _) => Return::Local(value),
        (None, Some(block)) => invokable::call_block(universe, context, &block, vec![key]),
        (None, None) => Return::Local(Value::Nil),
    }
}

/// Merge other hashes into a table, resolving conflicts with the block when there is one.
fn merge_into(
    universe: &Universe,
    context: &Context,
    table: &mut HashTable,
    others: Vec<Value>,
    block: Option<&Arc<Proc>>,
    signature: &str,
) -> Result<(), Return> {
    for other in others.iter() {
        let other = table_of(universe, signature, other)?;
        for (key, value) in other.pairs().into_iter() {
            let value = match (table.get(&key), block) {
                (Some(existing), Some(block)) => invokable::call_block(
                    universe,
                    context,
                    block,
                    vec![key.clone(), existing, value],
                )
                .value()?,
                _ => value,
            };
            table.insert(key, value);
        }
    }
    Ok(())
}

fn merge(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#merge";

    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let mut table = propagate!(table_of(universe, SIGNATURE, &receiver));
    propagate!(merge_into(universe, context, &mut table, args.collect(), block.as_ref(), SIGNATURE));
    Return::Local(universe.hash(table))
}

fn to_h(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#to_h";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let block = match block {
        Some(block) => block,
        None => return Return::Local(receiver),
    };
    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    let mut mapped = HashTable::new();
    for (key, value) in table.pairs().into_iter() {
        let pair = propagate!(invokable::call_block(universe, context, &block, vec![key, value]));
        match pair.as_array().as_deref() {
            Some([key, value]) => mapped.insert(key.clone(), value.clone()),
            _ => {
                return universe.raise(
                    &universe.core.type_error,
                    format!("wrong element type {} (expected array)", pair.class(universe).name()),
                )
            }
        }
    }
    Return::Local(universe.hash(mapped))
}

fn clear(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#clear";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.entries.clear()));
    Return::Local(receiver)
}

fn default(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#default";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let default = propagate!(with_table(universe, SIGNATURE, &receiver, |table| table.default.clone()));
    Return::Local(default.unwrap_or(Value::Nil))
}

fn eq(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    if receiver.identical(&other) {
        return Return::Local(Value::Boolean(true));
    }
    if !other.is_hash() {
        return Return::Local(Value::Boolean(false));
    }
    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    let other = propagate!(table_of(universe, SIGNATURE, &other));
    if table.len() != other.len() {
        return Return::Local(Value::Boolean(false));
    }
    for (key, value) in table.pairs().iter() {
        let matched = match other.get(key) {
            Some(candidate) => propagate!(values_equal(universe, context, value, &candidate)),
            None => false,
        };
        if !matched {
            return Return::Local(Value::Boolean(false));
        }
    }
    Return::Local(Value::Boolean(true))
}

fn inspect_hash(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Hash#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let table = propagate!(table_of(universe, SIGNATURE, &receiver));
    if table.is_empty() {
        return Return::Local(universe.string("{}"));
    }
    let mut items = Vec::with_capacity(table.len());
    for (key, value) in table.pairs().iter() {
        let key = match key {
            Value::Symbol(symbol) => inspect_symbol(symbol.as_str()),
            key if key.identical(&receiver) => String::from("{...}"),
            key => propagate!(inspect(universe, context, key)),
        };
        let value = if value.identical(&receiver) {
            String::from("{...}")
        } else {
            propagate!(inspect(universe, context, value))
        };
        items.push(format!("{}=>{}", key, value));
    }
    Return::Local(universe.string(format!("{{{}}}", items.join(", "))))
}
