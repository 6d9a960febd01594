use std::sync::Arc;

use crate::block::Proc;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::numeric::Number;
use crate::primitives::Primitive;
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[
    ("sqrt", self::sqrt, true),
    ("cbrt", self::cbrt, true),
    ("sin", self::sin, true),
    ("cos", self::cos, true),
    ("tan", self::tan, true),
    ("asin", self::asin, true),
    ("acos", self::acos, true),
    ("atan", self::atan, true),
    ("atan2", self::atan2, true),
    ("exp", self::exp, true),
    ("log", self::log, true),
    ("log2", self::log2, true),
    ("log10", self::log10, true),
    ("hypot", self::hypot, true),
    ("pow", self::pow, true),
];

/// Get the float behind the argument at `index` (the receiver is at 0).
fn operand(universe: &Universe, signature: &str, args: &[Value], index: usize) -> Result<f64, Return> {
    match args.get(index) {
        Some(value) => Number::from_value(value)
            .map(|number| number.to_f64())
            .ok_or_else(|| {
                universe.raise(
                    &universe.core.type_error,
                    format!(
                        "can't convert {} into Float",
                        value.class(universe).name()
                    ),
                )
            }),
        None => Err(universe.missing_argument(signature)),
    }
}

fn unary(universe: &Universe, args: &[Value], signature: &str, f: fn(f64) -> f64) -> Return {
    let x = propagate!(operand(universe, signature, args, 1));
    Return::Local(Value::Float(f(x)))
}

fn binary(universe: &Universe, args: &[Value], signature: &str, f: fn(f64, f64) -> f64) -> Return {
    let x = propagate!(operand(universe, signature, args, 1));
    let y = propagate!(operand(universe, signature, args, 2));
    Return::Local(Value::Float(f(x, y)))
}

fn sqrt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.sqrt", f64::sqrt)
}

fn cbrt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.cbrt", f64::cbrt)
}

fn sin(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.sin", f64::sin)
}

fn cos(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.cos", f64::cos)
}

fn tan(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.tan", f64::tan)
}

fn asin(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.asin", f64::asin)
}

fn acos(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.acos", f64::acos)
}

fn atan(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.atan", f64::atan)
}

fn atan2(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    binary(universe, &args, "Math.atan2", f64::atan2)
}

fn exp(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.exp", f64::exp)
}

fn log(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    if args.len() > 2 {
        return binary(universe, &args, "Math.log", f64::log);
    }
    unary(universe, &args, "Math.log", f64::ln)
}

fn log2(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.log2", f64::log2)
}

fn log10(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    unary(universe, &args, "Math.log10", f64::log10)
}

fn hypot(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    binary(universe, &args, "Math.hypot", f64::hypot)
}

fn pow(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    binary(universe, &args, "Math.pow", f64::powf)
}

