use std::sync::Arc;

use crate::block::Proc;
use crate::error::Error;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::Payload;
use crate::invokable::Return;
use crate::primitives::{require_block, Primitive};
use crate::propagate;
use crate::thread::{spawn, ThreadHandle};
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[
    ("new", self::new, true),
    ("start", self::new, true),
    ("fork", self::new, true),
    ("current", self::current, true),
];

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("join", self::join, true),
    ("value", self::value, true),
    ("kill", self::stop, true),
    ("terminate", self::stop, true),
    ("exit", self::stop, true),
    ("stop", self::stop, true),
    ("alive?", self::is_alive, true),
    ("status", self::status, true),
    ("==", self::eq, true),
    ("inspect", self::inspect, true),
    ("to_s", self::inspect, true),
];

fn handle_of(value: &Value) -> Option<Arc<ThreadHandle>> {
    value.as_object().and_then(|object| match &*object.payload() {
        Payload::Thread(handle) => Some(handle.clone()),
        _ => None,
    })
}

fn expect_handle(universe: &Universe, signature: &str, value: &Value) -> Result<Arc<ThreadHandle>, Return> {
    handle_of(value).ok_or_else(|| universe.wrong_type(signature, value))
}

fn wrap(universe: &Universe, handle: Arc<ThreadHandle>) -> Value {
    universe.new_object(universe.core.thread_class.clone(), Payload::Thread(handle))
}

fn new(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread.new";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let arguments = args.into_iter().skip(1).collect();
    let handle = propagate!(spawn(universe, context, block, arguments));
    log::trace!("spawned thread #{}", handle.id);
    Return::Local(wrap(universe, handle))
}

fn current(universe: &Universe, context: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(wrap(universe, context.thread().clone()))
}

/// Wait for a thread and get its result, re-raising the exception that ended it.
fn outcome(handle: &ThreadHandle) -> Return {
    match handle.join() {
        Return::Fatal(Error::Cancelled) => Return::Local(Value::Nil),
        Return::Signal(_) => Return::Local(Value::Nil),
        other => other,
    }
}

fn join(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#join";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    propagate!(outcome(&handle));
    Return::Local(receiver)
}

fn value(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#value";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    outcome(&handle)
}

fn stop(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#stop";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    log::debug!("cancelling thread #{}", handle.id);
    handle.cancel();
    Return::Local(receiver)
}

fn is_alive(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#alive?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    Return::Local(Value::Boolean(handle.is_alive()))
}

fn status(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#status";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    if handle.is_alive() {
        Return::Local(universe.string("run"))
    } else {
        Return::Local(Value::Boolean(false))
    }
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    let same = handle_of(&other).map_or(false, |other| other.id == handle.id);
    Return::Local(Value::Boolean(same))
}

fn inspect(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Thread#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    let handle = propagate!(expect_handle(universe, SIGNATURE, &receiver));
    let state = if handle.is_alive() { "run" } else { "dead" };
    Return::Local(universe.string(format!("#<Thread:{} {}>", handle.id, state)))
}
