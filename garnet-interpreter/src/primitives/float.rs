use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::{expect_integer, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::{format_float, Value};

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("to_s", self::to_s, true),
    ("inspect", self::to_s, true),
    ("to_i", self::to_i, true),
    ("truncate", self::to_i, true),
    ("to_f", self::to_f, true),
    ("round", self::round, true),
    ("floor", self::floor, true),
    ("ceil", self::ceil, true),
    ("nan?", self::is_nan, true),
    ("infinite?", self::is_infinite, true),
    ("finite?", self::is_finite, true),
];

/// Convert an (already rounded) float into an integer, raising `FloatDomainError` for NaN and infinities.
pub(crate) fn float_to_integer(universe: &Universe, value: f64) -> Return {
    if value.is_nan() {
        return universe.raise(&universe.core.float_domain_error, "NaN");
    }
    if value.is_infinite() {
        let message = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return universe.raise(&universe.core.float_domain_error, message);
    }
    let truncated = value.trunc();
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        return Return::Local(Value::Integer(truncated as i64));
    }
    match BigInt::from_f64(truncated) {
        Some(value) => Return::Local(universe.integer(value)),
        None => universe.raise(&universe.core.float_domain_error, format_float(value)),
    }
}

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#to_s";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    Return::Local(universe.string(format_float(value)))
}

fn to_i(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#to_i";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    float_to_integer(universe, value)
}

fn to_f(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#to_f";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    Return::Local(Value::Float(value))
}

fn round_with(universe: &Universe, args: Vec<Value>, signature: &str, rounding: fn(f64) -> f64) -> Return {
    let mut args = args.into_iter();
    let value = match args.next() {
        Some(Value::Float(value)) => value,
        Some(other) => return universe.wrong_type(signature, &other),
        None => return universe.missing_argument(signature),
    };
    let digits = match args.next() {
        None => 0,
        Some(digits) => propagate!(expect_integer(universe, signature, &digits)),
    };

    if digits > 0 {
        if !value.is_finite() {
            return Return::Local(Value::Float(value));
        }
        let factor = 10f64.powi(digits.min(308) as i32);
        return Return::Local(Value::Float(rounding(value * factor) / factor));
    }
    let factor = 10f64.powi((-digits).min(308) as i32);
    float_to_integer(universe, rounding(value / factor) * factor)
}

fn round(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_with(universe, args, "Float#round", f64::round)
}

fn floor(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_with(universe, args, "Float#floor", f64::floor)
}

fn ceil(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_with(universe, args, "Float#ceil", f64::ceil)
}

fn is_nan(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#nan?";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    Return::Local(Value::Boolean(value.is_nan()))
}

fn is_infinite(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#infinite?";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    match value {
        value if value == f64::INFINITY => Return::Local(Value::Integer(1)),
        value if value == f64::NEG_INFINITY => Return::Local(Value::Integer(-1)),
        _ => Return::Local(Value::Nil),
    }
}

fn is_finite(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Float#finite?";

    expect_args!(universe, SIGNATURE, args, [
        Value::Float(value) => value,
    ]);

    Return::Local(Value::Boolean(value.is_finite()))
}
