use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::block::Proc;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::Primitive;
use crate::universe::Universe;
use crate::value::Value;

pub static CLASS_PRIMITIVES: &[Primitive] = &[("now", self::now, true)];

/// `Time.now` is the number of seconds since the Unix epoch, as a float.
fn now(_: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0);
    Return::Local(Value::Float(seconds))
}
