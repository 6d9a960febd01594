use std::cmp::Ordering;
use std::sync::Arc;

use crate::block::Proc;
use crate::error::Error;
use crate::evaluate::stringify;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::{Payload, Range};
use crate::invokable::{self, call, Return};
use crate::primitives::enumerable::{each_value, range_elements};
use crate::primitives::numeric::{compare_numbers, Number};
use crate::primitives::{expect_integer, inspect, require_block, values_equal, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("each", self::each, true),
    ("first", self::first, true),
    ("last", self::last, true),
    ("include?", self::include, true),
    ("member?", self::include, true),
    ("===", self::include, true),
    ("size", self::size, true),
    ("exclude_end?", self::exclude_end, true),
    ("==", self::eq, true),
    ("to_s", self::to_s, true),
    ("inspect", self::inspect_range, true),
];

fn expect_range(universe: &Universe, signature: &str, value: &Value) -> Result<Range, Return> {
    value
        .as_object()
        .and_then(|object| match &*object.payload() {
            Payload::Range(range) => Some(range.clone()),
            _ => None,
        })
        .ok_or_else(|| universe.wrong_type(signature, value))
}

/// Order two range bounds, `None` when they are not comparable.
fn order(universe: &Universe, context: &Context, a: &Value, b: &Value) -> Result<Option<Ordering>, Return> {
    if Number::from_value(a).is_some() || Number::from_value(b).is_some() {
        return Ok(compare_numbers(a, b));
    }
    if let (Some(a), Some(b)) = (a.as_string(), b.as_string()) {
        return Ok(Some(a.cmp(&b)));
    }
    match call(universe, context, a.clone(), "<=>", vec![b.clone()]).value()? {
        Value::Integer(value) => Ok(Some(value.cmp(&0))),
        _ => Ok(None),
    }
}

/// Whether a value lies between the bounds of a range.
pub(crate) fn covers(universe: &Universe, context: &Context, range: &Range, value: &Value) -> Result<bool, Return> {
    if !range.from.is_nil() {
        match order(universe, context, &range.from, value)? {
            Some(Ordering::Less) | Some(Ordering::Equal) => {}
            _ => return Ok(false),
        }
    }
    if range.to.is_nil() {
        return Ok(true);
    }
    Ok(match order(universe, context, value, &range.to)? {
        Some(Ordering::Less) => true,
        Some(Ordering::Equal) => !range.exclusive,
        _ => false,
    })
}

fn each(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#each";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let range = propagate!(expect_range(universe, SIGNATURE, &receiver));
    match (&range.from, &range.to) {
        (Value::Integer(from), Value::Nil) => {
            let mut current = *from;
            loop {
                if context.thread().is_cancelled() {
                    return Return::Fatal(Error::Cancelled);
                }
                propagate!(invokable::call_block(universe, context, &block, vec![Value::Integer(current)]));
                current = match current.checked_add(1) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
        _ => match range.integer_bounds() {
            Some((from, to)) => {
                for current in from..=to {
                    propagate!(invokable::call_block(universe, context, &block, vec![Value::Integer(current)]));
                }
            }
            None => {
                let values = propagate!(range_elements(universe, &range));
                propagate!(each_value(universe, context, values, &block));
            }
        },
    }
    Return::Local(receiver)
}

fn take_count(universe: &Universe, signature: &str, count: &Value) -> Result<usize, Return> {
    let count = expect_integer(universe, signature, count)?;
    if count < 0 {
        return Err(universe.raise(&universe.core.argument_error, "negative array size"));
    }
    Ok(count as usize)
}

fn first(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#first";

    let range = propagate!(expect_range(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let count = match args.get(1) {
        None if range.from.is_nil() => {
            return universe.raise(
                &universe.core.range_error,
                "cannot get the first element of beginless range",
            )
        }
        None => return Return::Local(range.from),
        Some(count) => propagate!(take_count(universe, SIGNATURE, count)),
    };
    match range.integer_bounds() {
        Some((from, to)) => {
            let values = (from..=to).take(count).map(Value::Integer).collect();
            Return::Local(universe.array(values))
        }
        None => {
            let values = propagate!(range_elements(universe, &range));
            Return::Local(universe.array(values.into_iter().take(count).collect()))
        }
    }
}

fn last(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#last";

    let range = propagate!(expect_range(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let count = match args.get(1) {
        None if range.to.is_nil() => {
            return universe.raise(
                &universe.core.range_error,
                "cannot get the last element of endless range",
            )
        }
        None => return Return::Local(range.to),
        Some(count) => propagate!(take_count(universe, SIGNATURE, count)),
    };
    let values = propagate!(range_elements(universe, &range));
    let skipped = values.len().saturating_sub(count);
    Return::Local(universe.array(values.into_iter().skip(skipped).collect()))
}

fn include(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#include?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        value => value,
    ]);

    let range = propagate!(expect_range(universe, SIGNATURE, &receiver));
    Return::Local(Value::Boolean(propagate!(covers(universe, context, &range, &value))))
}

fn size(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#size";

    let range = propagate!(expect_range(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    match (&range.from, &range.to) {
        (Value::Integer(_), Value::Nil) => Return::Local(Value::Float(f64::INFINITY)),
        _ => match range.integer_bounds() {
            Some((from, to)) if to >= from => Return::Local(universe.integer(
                num_bigint::BigInt::from(to) - num_bigint::BigInt::from(from) + 1,
            )),
            Some(_) => Return::Local(Value::Integer(0)),
            None => Return::Local(Value::Nil),
        },
    }
}

fn exclude_end(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#exclude_end?";

    let range = propagate!(expect_range(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(Value::Boolean(range.exclusive))
}

fn eq(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Range#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let range = propagate!(expect_range(universe, SIGNATURE, &receiver));
    let other = match other.as_object().and_then(|object| match &*object.payload() {
        Payload::Range(range) => Some(range.clone()),
        _ => None,
    }) {
        Some(other) => other,
        None => return Return::Local(Value::Boolean(false)),
    };
    let equal = range.exclusive == other.exclusive
        && propagate!(values_equal(universe, context, &range.from, &other.from))
        && propagate!(values_equal(universe, context, &range.to, &other.to));
    Return::Local(Value::Boolean(equal))
}

fn render(
    universe: &Universe,
    args: Vec<Value>,
    signature: &str,
    bound: impl Fn(&Value) -> Result<String, Return>,
) -> Return {
    let range = propagate!(expect_range(universe, signature, args.first().unwrap_or(&Value::Nil)));
    let from = if range.from.is_nil() {
        String::new()
    } else {
        propagate!(bound(&range.from))
    };
    let to = if range.to.is_nil() {
        String::new()
    } else {
        propagate!(bound(&range.to))
    };
    let dots = if range.exclusive { "..." } else { ".." };
    Return::Local(universe.string(format!("{}{}{}", from, dots, to)))
}

fn to_s(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    render(universe, args, "Range#to_s", |value| stringify(universe, context, value))
}

fn inspect_range(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    render(universe, args, "Range#inspect", |value| inspect(universe, context, value))
}
