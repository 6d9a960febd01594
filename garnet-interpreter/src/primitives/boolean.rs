use std::sync::Arc;

use crate::block::Proc;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::Primitive;
use crate::universe::Universe;
use crate::value::Value;

pub static NIL_PRIMITIVES: &[Primitive] = &[
    ("to_s", self::nil_to_s, true),
    ("to_a", self::nil_to_a, true),
    ("to_h", self::nil_to_h, true),
    ("to_i", self::nil_to_i, true),
    ("to_f", self::nil_to_f, true),
    ("inspect", self::nil_inspect, true),
    ("&", self::and, true),
    ("|", self::or, true),
];

pub static TRUE_PRIMITIVES: &[Primitive] = &[
    ("to_s", self::to_s, true),
    ("inspect", self::to_s, true),
    ("&", self::and, true),
    ("|", self::or, true),
    ("^", self::xor, true),
];

pub static FALSE_PRIMITIVES: &[Primitive] = &[
    ("to_s", self::to_s, true),
    ("inspect", self::to_s, true),
    ("&", self::and, true),
    ("|", self::or, true),
    ("^", self::xor, true),
];

fn nil_to_s(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(universe.string(""))
}

fn nil_to_a(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(universe.array(Vec::new()))
}

fn nil_to_h(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(universe.hash(Default::default()))
}

fn nil_to_i(_: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(Value::Integer(0))
}

fn nil_to_f(_: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(Value::Float(0.0))
}

fn nil_inspect(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(universe.string("nil"))
}

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let receiver = args.first().map_or(false, Value::is_truthy);
    Return::Local(universe.string(receiver.to_string()))
}

/// The operand pair of a logical operator, both reduced to their truthiness.
fn operands(args: &[Value]) -> (bool, bool) {
    let truthy = |index: usize| args.get(index).map_or(false, Value::is_truthy);
    (truthy(0), truthy(1))
}

fn and(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let (a, b) = operands(&args);
    Return::Local(Value::Boolean(a && b))
}

fn or(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let (a, b) = operands(&args);
    Return::Local(Value::Boolean(a || b))
}

fn xor(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let (a, b) = operands(&args);
    Return::Local(Value::Boolean(a ^ b))
}
