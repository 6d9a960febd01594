use std::sync::Arc;

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::{self, as_proc, Return};
use crate::primitives::{require_block, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[("new", self::new, true)];

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("call", self::call, true),
    ("()", self::call, true),
    ("[]", self::call, true),
    ("yield", self::call, true),
    ("===", self::call, true),
    ("arity", self::arity, true),
    ("lambda?", self::is_lambda, true),
    ("to_proc", self::to_proc, true),
    ("inspect", self::inspect, true),
    ("to_s", self::inspect, true),
];

fn receiver_proc(universe: &Universe, signature: &str, value: &Value) -> Result<Arc<Proc>, Return> {
    as_proc(value).ok_or_else(|| universe.wrong_type(signature, value))
}

fn new(universe: &Universe, _: &Context, _: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Proc.new";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    Return::Local(universe.proc_value(block))
}

fn call(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Proc#call";

    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let proc = propagate!(receiver_proc(universe, SIGNATURE, &receiver));
    invokable::call_block_with_block(universe, context, &proc, args.collect(), block)
}

fn arity(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Proc#arity";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let proc = propagate!(receiver_proc(universe, SIGNATURE, &receiver));
    Return::Local(Value::Integer(proc.arity()))
}

fn is_lambda(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Proc#lambda?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let proc = propagate!(receiver_proc(universe, SIGNATURE, &receiver));
    Return::Local(Value::Boolean(proc.lambda))
}

fn to_proc(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(args.into_iter().next().unwrap_or(Value::Nil))
}

fn inspect(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Proc#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let proc = propagate!(receiver_proc(universe, SIGNATURE, &receiver));
    let suffix = if proc.lambda { " (lambda)" } else { "" };
    Return::Local(universe.string(format!("#<Proc:0x{:016x}{}>", receiver.object_id(), suffix)))
}
