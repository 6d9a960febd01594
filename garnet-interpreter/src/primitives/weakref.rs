use std::sync::Arc;

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::{Payload, WeakTarget};
use crate::invokable::Return;
use crate::primitives::Primitive;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[("new", self::new, true)];

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("__getobj__", self::get, true),
    ("get", self::get, true),
    ("weakref_alive?", self::is_alive, true),
    ("inspect", self::inspect, true),
];

/// Get the referenced value, or `None` once it has been reclaimed.
fn target(universe: &Universe, signature: &str, value: &Value) -> Result<Option<Value>, Return> {
    value
        .as_object()
        .and_then(|object| match &*object.payload() {
            Payload::WeakRef(target) => Some(target.upgrade()),
            _ => None,
        })
        .ok_or_else(|| universe.wrong_type(signature, value))
}

fn new(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "WeakRef.new";

    expect_args!(universe, SIGNATURE, args, [
        _,
        value => value,
    ]);

    let target = WeakTarget::new(&value);
    Return::Local(universe.new_object(universe.core.weakref_class.clone(), Payload::WeakRef(target)))
}

fn get(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "WeakRef#get";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    match target(universe, SIGNATURE, &receiver) {
        Ok(value) => Return::Local(value.unwrap_or(Value::Nil)),
        Err(ret) => ret,
    }
}

fn is_alive(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "WeakRef#weakref_alive?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    match target(universe, SIGNATURE, &receiver) {
        Ok(value) => Return::Local(Value::Boolean(value.is_some())),
        Err(ret) => ret,
    }
}

fn inspect(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "WeakRef#inspect";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    match target(universe, SIGNATURE, &receiver) {
        Ok(Some(value)) => Return::Local(universe.string(format!(
            "#<WeakRef: {}>",
            crate::primitives::kernel::default_inspect(universe, &value)
        ))),
        Ok(None) => Return::Local(universe.string("#<WeakRef: (dead)>")),
        Err(ret) => ret,
    }
}
