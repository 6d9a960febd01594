//! The collection methods shared by **Array**, **Hash** and **Range**.
//!
//! Every primitive here works on the receiver's elements, as listed by [`elements`]: arrays list
//! their values, hashes list `[key, value]` pairs and ranges list the values they cover.

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::block::Proc;
use crate::frame::Context;
use crate::instance::{HashKey, Payload, Range};
use crate::invokable::{self, call, Return};
use crate::primitives::{self, compare, expect_integer, require_block, values_equal, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("map", self::map, true),
    ("collect", self::map, true),
    ("select", self::select, true),
    ("filter", self::select, true),
    ("reject", self::reject, true),
    ("find", self::find, true),
    ("detect", self::find, true),
    ("any?", self::any, true),
    ("all?", self::all, true),
    ("count", self::count, true),
    ("reduce", self::reduce, true),
    ("inject", self::reduce, true),
    ("sum", self::sum, true),
    ("min", self::min, true),
    ("max", self::max, true),
    ("sort", self::sort, true),
    ("each_with_index", self::each_with_index, true),
    ("include?", self::include, true),
    ("first", self::first, true),
    ("to_a", self::to_a, true),
    ("uniq", self::uniq, true),
];

/// List the elements of a collection (anything else is asked for its `to_a`).
pub fn elements(universe: &Universe, context: &Context, value: &Value) -> Result<Vec<Value>, Return> {
    enum Source {
        Values(Vec<Value>),
        Pairs(Vec<(Value, Value)>),
        Range(Range),
        Other,
    }

    let source = match value.as_object() {
        Some(object) => match &*object.payload() {
            Payload::Array(values) => Source::Values(values.clone()),
            Payload::Hash(table) => Source::Pairs(table.pairs()),
            Payload::Range(range) => Source::Range(range.clone()),
            _ => Source::Other,
        },
        None => Source::Other,
    };

    match source {
        Source::Values(values) => Ok(values),
        Source::Pairs(pairs) => Ok(pairs
            .into_iter()
            .map(|(key, value)| universe.array(vec![key, value]))
            .collect()),
        Source::Range(range) => range_elements(universe, &range),
        Source::Other => {
            let array = call(universe, context, value.clone(), "to_a", Vec::new()).value()?;
            array
                .as_array()
                .ok_or_else(|| universe.wrong_type("Enumerable#to_a", &array))
        }
    }
}

/// List the values covered by a range.
pub(crate) fn range_elements(universe: &Universe, range: &Range) -> Result<Vec<Value>, Return> {
    if range.to.is_nil() {
        return Err(universe.raise(
            &universe.core.range_error,
            "cannot convert endless range to an array",
        ));
    }
    if let Some((from, to)) = range.integer_bounds() {
        return Ok((from..=to).map(Value::Integer).collect());
    }
    let bounds = (range.from.as_string(), range.to.as_string());
    if let (Some(from), Some(to)) = bounds {
        let mut from_chars = from.chars();
        let mut to_chars = to.chars();
        if let (Some(first), None, Some(last), None) =
            (from_chars.next(), from_chars.next(), to_chars.next(), to_chars.next())
        {
            let values = if range.exclusive {
                (first..last).map(|ch| universe.string(ch.to_string())).collect()
            } else {
                (first..=last).map(|ch| universe.string(ch.to_string())).collect()
            };
            return Ok(values);
        }
    }
    Err(universe.raise(
        &universe.core.type_error,
        format!("can't iterate from {}", range.from.class(universe).name()),
    ))
}

/// Sort values with a fallible comparison (a stable merge sort, tolerant of inconsistent orders).
pub(crate) fn merge_sort<T, F>(mut items: Vec<T>, compare: &mut F) -> Result<Vec<T>, Return>
where
    F: FnMut(&T, &T) -> Result<Ordering, Return>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare(a, b)? != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_left { left.next() } else { right.next() });
    }
    Ok(merged)
}

/// Interpret the result of a comparison block.
pub(crate) fn block_ordering(
    universe: &Universe,
    result: &Value,
    a: &Value,
    b: &Value,
) -> Result<Ordering, Return> {
    match result {
        Value::Integer(value) => Ok(value.cmp(&0)),
        Value::Float(value) if !value.is_nan() => Ok(value.partial_cmp(&0.0).unwrap_or(Ordering::Equal)),
        _ => Err(universe.raise(
            &universe.core.argument_error,
            format!(
                "comparison of {} with {} failed",
                a.class(universe).name(),
                b.class(universe).name()
            ),
        )),
    }
}

/// Sort values, with their `<=>` or with a comparison block.
pub(crate) fn sort_values(
    universe: &Universe,
    context: &Context,
    values: Vec<Value>,
    block: Option<&Arc<Proc>>,
) -> Result<Vec<Value>, Return> {
    merge_sort(values, &mut |a: &Value, b: &Value| match block {
        Some(block) => {
            let result = invokable::call_block(universe, context, block, vec![a.clone(), b.clone()]).value()?;
            block_ordering(universe, &result, a, b)
        }
        None => compare(universe, context, a, b),
    })
}

fn split(universe: &Universe, context: &Context, args: Vec<Value>) -> Result<(Vec<Value>, Vec<Value>), Return> {
    let mut args = args.into_iter();
    match args.next() {
        Some(receiver) => Ok((elements(universe, context, &receiver)?, args.collect())),
        None => Err(universe.missing_argument("Enumerable")),
    }
}

fn yield_one(universe: &Universe, context: &Context, block: &Arc<Proc>, value: &Value) -> Result<Value, Return> {
    invokable::call_block(universe, context, block, vec![value.clone()]).value()
}

fn map(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#map";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let (values, _) = propagate!(split(universe, context, args));
    let mut mapped = Vec::with_capacity(values.len());
    for value in values.iter() {
        mapped.push(propagate!(yield_one(universe, context, &block, value)));
    }
    Return::Local(universe.array(mapped))
}

fn filter_values(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    signature: &str,
    keep: bool,
) -> Return {
    let block = propagate!(require_block(universe, block, signature));
    let (values, _) = propagate!(split(universe, context, args));
    let mut kept = Vec::new();
    for value in values.into_iter() {
        if propagate!(yield_one(universe, context, &block, &value)).is_truthy() == keep {
            kept.push(value);
        }
    }
    Return::Local(universe.array(kept))
}

fn select(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    filter_values(universe, context, args, block, "Enumerable#select", true)
}

fn reject(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    filter_values(universe, context, args, block, "Enumerable#reject", false)
}

fn find(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#find";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let (values, _) = propagate!(split(universe, context, args));
    for value in values.into_iter() {
        if propagate!(yield_one(universe, context, &block, &value)).is_truthy() {
            return Return::Local(value);
        }
    }
    Return::Local(Value::Nil)
}

/// Test an element against a pattern (with `===`), a block, or its own truthiness.
fn test_element(
    universe: &Universe,
    context: &Context,
    value: &Value,
    pattern: Option<&Value>,
    block: Option<&Arc<Proc>>,
) -> Result<bool, Return> {
    match (pattern, block) {
        (Some(pattern), _) => Ok(call(universe, context, pattern.clone(), "===", vec![value.clone()])
            .value()?
            .is_truthy()),
        (None, Some(block)) => Ok(yield_one(universe, context, block, value)?.is_truthy()),
        (None, None) => Ok(value.is_truthy()),
    }
}

fn count_matches(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    stop_after: Option<usize>,
) -> Result<(usize, usize), Return> {
    let (values, rest) = split(universe, context, args)?;
    let pattern = rest.into_iter().next();
    let mut matched = 0;
    for value in values.iter() {
        if test_element(universe, context, value, pattern.as_ref(), block.as_ref())? {
            matched += 1;
            if Some(matched) == stop_after {
                break;
            }
        }
    }
    Ok((matched, values.len()))
}

fn any(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (matched, _) = propagate!(count_matches(universe, context, args, block, Some(1)));
    Return::Local(Value::Boolean(matched > 0))
}

fn all(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (values, rest) = propagate!(split(universe, context, args));
    let pattern = rest.into_iter().next();
    for value in values.iter() {
        if !propagate!(test_element(universe, context, value, pattern.as_ref(), block.as_ref())) {
            return Return::Local(Value::Boolean(false));
        }
    }
    Return::Local(Value::Boolean(true))
}

fn count(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (values, rest) = propagate!(split(universe, context, args));
    let target = rest.into_iter().next();
    let mut counted = 0;
    for value in values.iter() {
        let matched = match (&target, &block) {
            (Some(target), _) => propagate!(values_equal(universe, context, value, target)),
            (None, Some(block)) => propagate!(yield_one(universe, context, block, value)).is_truthy(),
            (None, None) => true,
        };
        if matched {
            counted += 1;
        }
    }
    Return::Local(Value::Integer(counted))
}

fn reduce(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#reduce";

    let (values, rest) = propagate!(split(universe, context, args));
    let mut rest = rest.into_iter();
    let (initial, operator) = match (rest.next(), rest.next(), &block) {
        (Some(initial), Some(operator), _) => (Some(initial), Some(operator)),
        (Some(operator @ Value::Symbol(_)), None, None) => (None, Some(operator)),
        (Some(initial), None, _) => (Some(initial), None),
        (None, _, _) => (None, None),
    };
    let operator = match operator {
        Some(operator) => Some(propagate!(primitives::expect_string(universe, SIGNATURE, &operator))),
        None => None,
    };
    let block = match (&operator, block) {
        (None, block) => Some(propagate!(require_block(universe, block, SIGNATURE))),
        (Some(_), _) => None,
    };

    let mut values = values.into_iter();
    let mut accumulator = match initial.or_else(|| values.next()) {
        Some(value) => value,
        None => return Return::Local(Value::Nil),
    };
    for value in values {
        accumulator = match (&operator, &block) {
            (Some(operator), _) => propagate!(call(universe, context, accumulator, operator, vec![value])),
            (None, Some(block)) => {
                propagate!(invokable::call_block(universe, context, block, vec![accumulator, value]))
            }
            (None, None) => return universe.missing_argument(SIGNATURE),
        };
    }
    Return::Local(accumulator)
}

fn sum(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (values, rest) = propagate!(split(universe, context, args));
    let mut total = rest.into_iter().next().unwrap_or(Value::Integer(0));
    for value in values.iter() {
        let value = match &block {
            Some(block) => propagate!(yield_one(universe, context, block, value)),
            None => value.clone(),
        };
        total = propagate!(call(universe, context, total, "+", vec![value]));
    }
    Return::Local(total)
}

fn extreme(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    wanted: Ordering,
) -> Return {
    let (values, _) = propagate!(split(universe, context, args));
    let mut values = values.into_iter();
    let mut best = match values.next() {
        Some(value) => value,
        None => return Return::Local(Value::Nil),
    };
    for value in values {
        let ordering = match &block {
            Some(block) => {
                let result = propagate!(invokable::call_block(
                    universe,
                    context,
                    block,
                    vec![value.clone(), best.clone()]
                ));
                propagate!(block_ordering(universe, &result, &value, &best))
            }
            None => propagate!(compare(universe, context, &value, &best)),
        };
        if ordering == wanted {
            best = value;
        }
    }
    Return::Local(best)
}

fn min(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    extreme(universe, context, args, block, Ordering::Less)
}

fn max(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    extreme(universe, context, args, block, Ordering::Greater)
}

fn sort(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (values, _) = propagate!(split(universe, context, args));
    let sorted = propagate!(sort_values(universe, context, values, block.as_ref()));
    Return::Local(universe.array(sorted))
}

fn each_with_index(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#each_with_index";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let receiver = args.first().cloned().unwrap_or(Value::Nil);
    let (values, _) = propagate!(split(universe, context, args));
    for (index, value) in values.into_iter().enumerate() {
        propagate!(invokable::call_block(
            universe,
            context,
            &block,
            vec![value, Value::Integer(index as i64)]
        ));
    }
    Return::Local(receiver)
}

fn include(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#include?";

    let receiver = args.first().cloned().unwrap_or(Value::Nil);
    let target = match args.get(1) {
        Some(target) => target.clone(),
        None => return universe.missing_argument(SIGNATURE),
    };
    if let Some(range) = receiver.as_object().and_then(|object| match &*object.payload() {
        Payload::Range(range) => Some(range.clone()),
        _ => None,
    }) {
        return Return::Local(Value::Boolean(propagate!(crate::primitives::range::covers(
            universe, context, &range, &target
        ))));
    }
    let values = propagate!(elements(universe, context, &receiver));
    for value in values.iter() {
        if propagate!(values_equal(universe, context, value, &target)) {
            return Return::Local(Value::Boolean(true));
        }
    }
    Return::Local(Value::Boolean(false))
}

fn first(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Enumerable#first";

    let (values, rest) = propagate!(split(universe, context, args));
    match rest.first() {
        None => Return::Local(values.into_iter().next().unwrap_or(Value::Nil)),
        Some(count) => {
            let count = propagate!(expect_integer(universe, SIGNATURE, count));
            if count < 0 {
                return universe.raise(&universe.core.argument_error, "negative array size");
            }
            Return::Local(universe.array(values.into_iter().take(count as usize).collect()))
        }
    }
}

fn to_a(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let (values, _) = propagate!(split(universe, context, args));
    Return::Local(universe.array(values))
}

/// Remove duplicates (by hash key, or by the key a block computes), keeping first occurrences.
pub(crate) fn unique_values(
    universe: &Universe,
    context: &Context,
    values: Vec<Value>,
    block: Option<&Arc<Proc>>,
) -> Result<Vec<Value>, Return> {
    let mut seen = IndexMap::new();
    for value in values.into_iter() {
        let key = match block {
            Some(block) => yield_one(universe, context, block, &value)?,
            None => value.clone(),
        };
        seen.entry(HashKey::from_value(&key)).or_insert(value);
    }
    Ok(seen.into_iter().map(|(_, value)| value).collect())
}

fn uniq(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let (values, _) = propagate!(split(universe, context, args));
    let unique = propagate!(unique_values(universe, context, values, block.as_ref()));
    Return::Local(universe.array(unique))
}

/// Yield every value to a block, in order.
pub(crate) fn each_value(
    universe: &Universe,
    context: &Context,
    values: Vec<Value>,
    block: &Arc<Proc>,
) -> Result<(), Return> {
    for value in values.into_iter() {
        yield_one(universe, context, block, &value)?;
    }
    Ok(())
}

