use std::sync::Arc;

use crate::block::Proc;
use crate::evaluate::symbol_proc;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::Primitive;
use crate::universe::Universe;
use crate::value::{inspect_symbol, Value};

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("to_s", self::to_s, true),
    ("id2name", self::to_s, true),
    ("name", self::to_s, true),
    ("to_sym", self::to_sym, true),
    ("to_proc", self::to_proc, true),
    ("length", self::length, true),
    ("size", self::length, true),
    ("upcase", self::upcase, true),
    ("downcase", self::downcase, true),
    ("empty?", self::is_empty, true),
    ("<=>", self::cmp, true),
    ("==", self::eq, true),
    ("inspect", self::inspect, true),
];

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#to_s";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(universe.string(symbol.as_str()))
}

fn to_sym(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#to_sym";

    expect_args!(universe, SIGNATURE, args, [
        receiver @ Value::Symbol(_) => receiver,
    ]);

    Return::Local(receiver)
}

fn to_proc(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#to_proc";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(universe.proc_value(symbol_proc(universe, symbol.as_str())))
}

fn length(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#length";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(Value::Integer(symbol.as_str().chars().count() as i64))
}

fn upcase(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#upcase";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(universe.mortal_symbol(&symbol.as_str().to_uppercase()))
}

fn downcase(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#downcase";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(universe.mortal_symbol(&symbol.as_str().to_lowercase()))
}

fn is_empty(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#empty?";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(Value::Boolean(symbol.as_str().is_empty()))
}

fn cmp(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#<=>";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
        other => other,
    ]);

    match other {
        Value::Symbol(other) => Return::Local(Value::Integer(symbol.as_str().cmp(other.as_str()) as i64)),
        _ => Return::Local(Value::Nil),
    }
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    Return::Local(Value::Boolean(receiver.identical(&other)))
}

fn inspect(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Symbol#inspect";

    expect_args!(universe, SIGNATURE, args, [
        Value::Symbol(symbol) => symbol,
    ]);

    Return::Local(universe.string(inspect_symbol(symbol.as_str())))
}
