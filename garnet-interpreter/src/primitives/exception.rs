use std::sync::Arc;

use crate::block::Proc;
use crate::evaluate::stringify;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::{call, call_with_block, Return};
use crate::primitives::{is_exception, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[("exception", self::exception, true)];

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("initialize", self::initialize, false),
    ("message", self::message, true),
    ("to_s", self::to_s, true),
    ("full_message", self::full_message, true),
    ("backtrace", self::backtrace, true),
    ("inspect", self::inspect, true),
    ("==", self::eq, true),
];

fn exception(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    let mut args = args.into_iter();
    let class = args.next().unwrap_or(Value::Nil);
    call_with_block(universe, context, class, "new", args.collect(), block)
}

fn initialize(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let message = args.next().unwrap_or(Value::Nil);
    universe.set_instance_variable(&receiver, "@message", message);
    Return::Local(Value::Nil)
}

fn message(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#message";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    call(universe, context, receiver, "to_s", Vec::new())
}

fn to_s(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#to_s";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    match universe.get_instance_variable(&receiver, "@message") {
        Value::Nil => Return::Local(universe.string(receiver.class(universe).name())),
        message if message.is_string() => Return::Local(message),
        message => {
            let text = propagate!(stringify(universe, context, &message));
            Return::Local(universe.string(text))
        }
    }
}

/// The message as the guest sees it (through a possibly overridden `message`).
fn guest_message(universe: &Universe, context: &Context, receiver: &Value) -> Result<String, Return> {
    let message = call(universe, context, receiver.clone(), "message", Vec::new()).value()?;
    stringify(universe, context, &message)
}

fn full_message(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#full_message";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let message = propagate!(guest_message(universe, context, &receiver));
    let class = receiver.class(universe);
    let rendered = match universe.exception_location(&receiver) {
        Some(location) => format!("{}: {} ({})", universe.render_location(location), message, class.name()),
        None => format!("{} ({})", message, class.name()),
    };
    Return::Local(universe.string(rendered))
}

fn backtrace(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#backtrace";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    match universe.exception_location(&receiver) {
        Some(location) => Return::Local(universe.array(vec![universe.string(universe.render_location(location))])),
        None => Return::Local(Value::Nil),
    }
}

fn inspect(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let class = receiver.class(universe);
    let message = propagate!(guest_message(universe, context, &receiver));
    if message.is_empty() {
        return Return::Local(universe.string(class.name()));
    }
    Return::Local(universe.string(format!("#<{}: {}>", class.name(), message)))
}

fn eq(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Exception#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    if receiver.identical(&other) {
        return Return::Local(Value::Boolean(true));
    }
    if !is_exception(&other) || !Arc::ptr_eq(&receiver.class(universe), &other.class(universe)) {
        return Return::Local(Value::Boolean(false));
    }
    let mine = propagate!(guest_message(universe, context, &receiver));
    let theirs = propagate!(guest_message(universe, context, &other));
    Return::Local(Value::Boolean(mine == theirs))
}
