use std::cmp::Ordering;
use std::convert::TryFrom;
use std::sync::Arc;

use crate::block::Proc;
use crate::evaluate::stringify;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::Payload;
use crate::invokable::{self, Return};
use crate::primitives::{compare, expect_integer, expect_string, inspect, require_block, values_equal, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("initialize", self::initialize, false),
    ("each", self::each, true),
    ("[]", self::at, true),
    ("slice", self::at, true),
    ("at", self::at, true),
    ("[]=", self::set_at, true),
    ("fetch", self::fetch, true),
    ("<<", self::push, true),
    ("push", self::push, true),
    ("pop", self::pop, true),
    ("shift", self::shift, true),
    ("unshift", self::unshift, true),
    ("length", self::length, true),
    ("size", self::length, true),
    ("empty?", self::is_empty, true),
    ("last", self::last, true),
    ("concat", self::concat, true),
    ("+", self::plus, true),
    ("-", self::minus, true),
    ("*", self::times, true),
    ("==", self::eq, true),
    ("eql?", self::eq, true),
    ("index", self::index, true),
    ("join", self::join, true),
    ("reverse", self::reverse, true),
    ("compact", self::compact, true),
    ("flatten", self::flatten, true),
    ("delete", self::delete, true),
    ("clear", self::clear, true),
    ("replace", self::replace, true),
    ("to_a", self::to_a, true),
    ("inspect", self::inspect_array, true),
    ("to_s", self::inspect_array, true),
];

/// Copy the values of an array receiver.
fn values_of(universe: &Universe, signature: &str, value: &Value) -> Result<Vec<Value>, Return> {
    value
        .as_array()
        .ok_or_else(|| universe.wrong_type(signature, value))
}

/// Mutate an array receiver in place (no guest code may run while the payload is locked).
fn with_values<R>(
    universe: &Universe,
    signature: &str,
    value: &Value,
    f: impl FnOnce(&mut Vec<Value>) -> R,
) -> Result<R, Return> {
    if let Some(object) = value.as_object() {
        if let Payload::Array(values) = &mut *object.payload() {
            return Ok(f(values));
        }
    }
    Err(universe.wrong_type(signature, value))
}

/// Resolve a `start, length` pair against an array length.
pub(crate) fn resolve_slice(len: usize, start: i64, length: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { start + len } else { start };
    if start < 0 || start > len || length < 0 {
        return None;
    }
    let end = start.saturating_add(length).min(len);
    Some((start as usize, end as usize))
}

/// Resolve a range against an array length, as a `start, end` pair.
pub(crate) fn resolve_range(universe: &Universe, signature: &str, value: &Value, len: usize) -> Result<Option<(usize, usize)>, Return> {
    let range = value.as_object().and_then(|object| match &*object.payload() {
        Payload::Range(range) => Some(range.clone()),
        _ => None,
    });
    let range = match range {
        Some(range) => range,
        None => return Err(universe.wrong_type(signature, value)),
    };
    let start = match &range.from {
        Value::Nil => 0,
        from => expect_integer(universe, signature, from)?,
    };
    let end = match &range.to {
        Value::Nil => len as i64,
        to => {
            let to = expect_integer(universe, signature, to)?;
            let to = if to < 0 { to + len as i64 } else { to };
            if range.exclusive {
                to
            } else {
                to + 1
            }
        }
    };
    let start_resolved = if start < 0 { start + len as i64 } else { start };
    Ok(resolve_slice(len, start, (end - start_resolved).max(0)))
}

fn initialize(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#initialize";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    let size = match args.next() {
        None => 0,
        Some(size) => match size.as_array() {
            Some(values) => {
                propagate!(with_values(universe, SIGNATURE, &receiver, |target| *target = values));
                return Return::Local(Value::Nil);
            }
            None => propagate!(expect_integer(universe, SIGNATURE, &size)),
        },
    };
    if size < 0 {
        return universe.raise(&universe.core.argument_error, "negative array size");
    }
    let default = args.next().unwrap_or(Value::Nil);
    let mut values = Vec::with_capacity(size as usize);
    for index in 0..size {
        values.push(match &block {
            Some(block) => propagate!(invokable::call_block(universe, context, block, vec![Value::Integer(index)])),
            None => default.clone(),
        });
    }
    propagate!(with_values(universe, SIGNATURE, &receiver, |target| *target = values));
    Return::Local(Value::Nil)
}

fn each(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#each";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    // Re-read the length on every step: the block may grow or shrink the array.
    let mut index = 0;
    loop {
        let value = propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.get(index).cloned()));
        let value = match value {
            Some(value) => value,
            None => break,
        };
        propagate!(invokable::call_block(universe, context, &block, vec![value]));
        index += 1;
    }
    Return::Local(receiver)
}

fn at(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#[]";

    let mut args = args.into_iter();
    let values = match args.next() {
        Some(receiver) => propagate!(values_of(universe, SIGNATURE, &receiver)),
        None => return universe.missing_argument(SIGNATURE),
    };
    let (first, second) = (args.next(), args.next());
    let bounds = match (first, second) {
        (Some(Value::Integer(index)), None) => {
            let index = if index < 0 { index + values.len() as i64 } else { index };
            let value = usize::try_from(index).ok().and_then(|index| values.get(index).cloned());
            return Return::Local(value.unwrap_or(Value::Nil));
        }
        (Some(start), Some(length)) => {
            let start = propagate!(expect_integer(universe, SIGNATURE, &start));
            let length = propagate!(expect_integer(universe, SIGNATURE, &length));
            resolve_slice(values.len(), start, length)
        }
        (Some(Value::Float(index)), None) => {
            let index = index as i64;
            let index = if index < 0 { index + values.len() as i64 } else { index };
            let value = usize::try_from(index).ok().and_then(|index| values.get(index).cloned());
            return Return::Local(value.unwrap_or(Value::Nil));
        }
        (Some(range), None) => propagate!(resolve_range(universe, SIGNATURE, &range, values.len())),
        (None, _) => return universe.missing_argument(SIGNATURE),
    };
    match bounds {
        Some((start, end)) => Return::Local(universe.array(values[start..end].to_vec())),
        None => Return::Local(Value::Nil),
    }
}

fn set_at(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#[]=";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    let rest: Vec<Value> = args.collect();
    let len = propagate!(values_of(universe, SIGNATURE, &receiver)).len();

    let (start, end, value) = match rest.as_slice() {
        [Value::Integer(index), value] => {
            let index = if *index < 0 { index + len as i64 } else { *index };
            if index < 0 {
                return universe.raise(
                    &universe.core.index_error,
                    format!("index {} too small for array; minimum: -{}", index - len as i64, len),
                );
            }
            let index = index as usize;
            let value = value.clone();
            propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
                if index >= values.len() {
                    values.resize(index + 1, Value::Nil);
                }
                values[index] = value.clone();
            }));
            return Return::Local(value);
        }
        [start, length, value] => {
            let start = propagate!(expect_integer(universe, SIGNATURE, start));
            let length = propagate!(expect_integer(universe, SIGNATURE, length));
            let start_resolved = if start < 0 { start + len as i64 } else { start };
            if start_resolved < 0 || length < 0 {
                return universe.raise(
                    &universe.core.index_error,
                    format!("index {} too small for array", start),
                );
            }
            let start = start_resolved as usize;
            (start, start.saturating_add(length as usize), value.clone())
        }
        [range, value] => match propagate!(resolve_range(universe, SIGNATURE, range, len)) {
            Some((start, end)) => (start, end, value.clone()),
            None => return universe.raise(&universe.core.range_error, "range out of array bounds"),
        },
        _ => return universe.missing_argument(SIGNATURE),
    };

    let replacement = value.as_array().unwrap_or_else(|| vec![value.clone()]);
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
        if start > values.len() {
            values.resize(start, Value::Nil);
        }
        let end = end.min(values.len());
        values.splice(start..end, replacement);
    }));
    Return::Local(value)
}

fn fetch(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#fetch";

    let mut args = args.into_iter();
    let values = match args.next() {
        Some(receiver) => propagate!(values_of(universe, SIGNATURE, &receiver)),
        None => return universe.missing_argument(SIGNATURE),
    };
    let index = match args.next() {
        Some(index) => propagate!(expect_integer(universe, SIGNATURE, &index)),
        None => return universe.missing_argument(SIGNATURE),
    };
    let resolved = if index < 0 { index + values.len() as i64 } else { index };
    if let Some(value) = usize::try_from(resolved).ok().and_then(|index| values.get(index)) {
        return Return::Local(value.clone());
    }
    if let Some(block) = block {
        return invokable::call_block(universe, context, &block, vec![Value::Integer(index)]);
    }
    match args.next() {
        Some(default) => Return::Local(default),
        None => universe.raise(
            &universe.core.index_error,
            format!(
                "index {} outside of array bounds: {}...{}",
                index,
                -(values.len() as i64),
                values.len()
            ),
        ),
    }
}

fn push(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#push";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.extend(args)));
    Return::Local(receiver)
}

fn pop(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#pop";

    let receiver = args.first().cloned().unwrap_or(Value::Nil);
    match args.get(1) {
        None => {
            let value = propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.pop()));
            Return::Local(value.unwrap_or(Value::Nil))
        }
        Some(count) => {
            let count = propagate!(expect_integer(universe, SIGNATURE, count)).max(0) as usize;
            let popped = propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
                let start = values.len().saturating_sub(count);
                values.split_off(start)
            }));
            Return::Local(universe.array(popped))
        }
    }
}

fn shift(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#shift";

    let receiver = args.first().cloned().unwrap_or(Value::Nil);
    match args.get(1) {
        None => {
            let value = propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
                if values.is_empty() {
                    None
                } else {
                    Some(values.remove(0))
                }
            }));
            Return::Local(value.unwrap_or(Value::Nil))
        }
        Some(count) => {
            let count = propagate!(expect_integer(universe, SIGNATURE, count)).max(0) as usize;
            let shifted = propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
                let count = count.min(values.len());
                values.drain(..count).collect::<Vec<_>>()
            }));
            Return::Local(universe.array(shifted))
        }
    }
}

fn unshift(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#unshift";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    let prefix: Vec<Value> = args.collect();
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| {
        values.splice(0..0, prefix);
    }));
    Return::Local(receiver)
}

fn length(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#length";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let len = propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.len()));
    Return::Local(Value::Integer(len as i64))
}

fn is_empty(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#empty?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let empty = propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.is_empty()));
    Return::Local(Value::Boolean(empty))
}

fn last(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#last";

    let values = propagate!(values_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    match args.get(1) {
        None => Return::Local(values.last().cloned().unwrap_or(Value::Nil)),
        Some(count) => {
            let count = propagate!(expect_integer(universe, SIGNATURE, count));
            if count < 0 {
                return universe.raise(&universe.core.argument_error, "negative array size");
            }
            let start = values.len().saturating_sub(count as usize);
            Return::Local(universe.array(values[start..].to_vec()))
        }
    }
}

fn concat(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#concat";

    let mut args = args.into_iter();
    let receiver = match args.next() {
        Some(receiver) => receiver,
        None => return universe.missing_argument(SIGNATURE),
    };
    let mut appended = Vec::new();
    for other in args {
        appended.extend(propagate!(values_of(universe, SIGNATURE, &other)));
    }
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.extend(appended)));
    Return::Local(receiver)
}

fn plus(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#+";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let mut values = propagate!(values_of(universe, SIGNATURE, &receiver));
    match other.as_array() {
        Some(other) => values.extend(other),
        None => {
            return universe.raise(
                &universe.core.type_error,
                format!("no implicit conversion of {} into Array", other.class(universe).name()),
            )
        }
    }
    Return::Local(universe.array(values))
}

fn minus(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#-";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let removed = propagate!(values_of(universe, SIGNATURE, &other));
    let mut kept = Vec::with_capacity(values.len());
    'outer: for value in values.into_iter() {
        for candidate in removed.iter() {
            if propagate!(values_equal(universe, context, &value, candidate)) {
                continue 'outer;
            }
        }
        kept.push(value);
    }
    Return::Local(universe.array(kept))
}

fn times(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#*";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        factor => factor,
    ]);

    if factor.is_string() {
        return join(universe, context, vec![receiver, factor], None);
    }
    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let count = propagate!(expect_integer(universe, SIGNATURE, &factor));
    if count < 0 {
        return universe.raise(&universe.core.argument_error, "negative argument");
    }
    let mut repeated = Vec::with_capacity(values.len() * count as usize);
    for _ in 0..count {
        repeated.extend(values.iter().cloned());
    }
    Return::Local(universe.array(repeated))
}

fn eq(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    if receiver.identical(&other) {
        return Return::Local(Value::Boolean(true));
    }
    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let others = match other.as_array() {
        Some(others) if others.len() == values.len() => others,
        _ => return Return::Local(Value::Boolean(false)),
    };
    for (a, b) in values.iter().zip(others.iter()) {
        if !propagate!(values_equal(universe, context, a, b)) {
            return Return::Local(Value::Boolean(false));
        }
    }
    Return::Local(Value::Boolean(true))
}

fn cmp(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#<=>";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let others = match other.as_array() {
        Some(others) => others,
        None => return Return::Local(Value::Nil),
    };
    for (a, b) in values.iter().zip(others.iter()) {
        match propagate!(compare(universe, context, a, b)) {
            Ordering::Equal => {}
            ordering => return Return::Local(Value::Integer(ordering as i64)),
        }
    }
    Return::Local(Value::Integer(values.len().cmp(&others.len()) as i64))
}

fn search(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    signature: &str,
    from_end: bool,
) -> Return {
    let values = propagate!(values_of(universe, signature, args.first().unwrap_or(&Value::Nil)));
    let target = args.get(1).cloned();
    let mut indices: Vec<usize> = (0..values.len()).collect();
    if from_end {
        indices.reverse();
    }
    for index in indices {
        let found = match (&target, &block) {
            (Some(target), _) => propagate!(values_equal(universe, context, &values[index], target)),
            (None, Some(block)) => {
                propagate!(invokable::call_block(universe, context, block, vec![values[index].clone()])).is_truthy()
            }
            (None, None) => return universe.missing_argument(signature),
        };
        if found {
            return Return::Local(Value::Integer(index as i64));
        }
    }
    Return::Local(Value::Nil)
}

fn index(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    search(universe, context, args, block, "Array#index", false)
}

fn join_into(
    universe: &Universe,
    context: &Context,
    values: &[Value],
    separator: &str,
    output: &mut Vec<String>,
    depth: usize,
) -> Result<(), Return> {
    if depth > 64 {
        return Err(universe.raise(&universe.core.argument_error, "recursive array join"));
    }
    for value in values.iter() {
        match value.as_array() {
            Some(nested) => join_into(universe, context, &nested, separator, output, depth + 1)?,
            None => output.push(stringify(universe, context, value)?),
        }
    }
    Ok(())
}

fn join(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#join";

    let values = propagate!(values_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let separator = match args.get(1) {
        None | Some(Value::Nil) => String::new(),
        Some(separator) => propagate!(expect_string(universe, SIGNATURE, separator)),
    };
    let mut parts = Vec::with_capacity(values.len());
    propagate!(join_into(universe, context, &values, &separator, &mut parts, 0));
    Return::Local(universe.string(parts.join(&separator)))
}

fn reverse(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#reverse";

    let mut values = propagate!(values_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    values.reverse();
    Return::Local(universe.array(values))
}

fn compact(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#compact";

    let values = propagate!(values_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(universe.array(values.into_iter().filter(|value| !value.is_nil()).collect()))
}

fn flatten_into(universe: &Universe, values: Vec<Value>, depth: i64, output: &mut Vec<Value>, guard: usize) -> Result<(), Return> {
    if guard > 64 {
        return Err(universe.raise(&universe.core.argument_error, "tried to flatten recursive array"));
    }
    for value in values.into_iter() {
        match value.as_array() {
            Some(nested) if depth != 0 => flatten_into(universe, nested, depth - 1, output, guard + 1)?,
            _ => output.push(value),
        }
    }
    Ok(())
}

fn flatten(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#flatten";

    let values = propagate!(values_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let depth = match args.get(1) {
        None | Some(Value::Nil) => -1,
        Some(depth) => propagate!(expect_integer(universe, SIGNATURE, depth)),
    };
    let mut flattened = Vec::with_capacity(values.len());
    propagate!(flatten_into(universe, values, depth, &mut flattened, 0));
    Return::Local(universe.array(flattened))
}

fn delete(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#delete";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        target => target,
    ]);

    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let mut kept = Vec::with_capacity(values.len());
    let mut found = None;
    for value in values.into_iter() {
        if propagate!(values_equal(universe, context, &value, &target)) {
            found = Some(value);
        } else {
            kept.push(value);
        }
    }
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| *values = kept));
    Return::Local(found.unwrap_or(Value::Nil))
}

fn clear(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#clear";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    propagate!(with_values(universe, SIGNATURE, &receiver, |values| values.clear()));
    Return::Local(receiver)
}

fn replace(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#replace";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let replacement = propagate!(values_of(universe, SIGNATURE, &other));
    propagate!(with_values(universe, SIGNATURE, &receiver, |values| *values = replacement));
    Return::Local(receiver)
}

fn to_a(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#to_a";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    Return::Local(receiver)
}

fn inspect_array(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Array#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let values = propagate!(values_of(universe, SIGNATURE, &receiver));
    let mut items = Vec::with_capacity(values.len());
    for value in values.iter() {
        if value.identical(&receiver) {
            items.push(String::from("[...]"));
        } else {
            items.push(propagate!(inspect(universe, context, value)));
        }
    }
    Return::Local(universe.string(format!("[{}]", items.join(", "))))
}
