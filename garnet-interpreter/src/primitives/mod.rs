use std::cmp::Ordering;
use std::sync::Arc;

use crate::block::Proc;
use crate::frame::Context;
use crate::instance::Payload;
use crate::invokable::{call, Return};
use crate::universe::Universe;
use crate::value::Value;

/// Primitives for the **Array** class.
pub mod array;
/// Primitives for the **NilClass**, **TrueClass** and **FalseClass** classes.
pub mod boolean;
/// Primitives shared by every collection (arrays, hashes and ranges).
pub mod enumerable;
/// Primitives for the **Exception** class.
pub mod exception;
/// Primitives for the **File** class.
pub mod file;
/// Primitives for the **Float** class.
pub mod float;
/// Primitives for the **Hash** class.
pub mod hash;
/// Primitives for the **Integer** class.
pub mod integer;
/// Primitives for the **Object** class (the `Kernel` methods).
pub mod kernel;
/// Primitives for the **Math** module.
pub mod math;
/// Primitives for the **Module** and **Class** classes.
pub mod module;
/// Primitives for the **Numeric** class.
pub mod numeric;
/// Primitives for the **Proc** class.
pub mod proc;
/// Primitives for the **Range** class.
pub mod range;
/// Primitives for the **String** class.
pub mod string;
/// Primitives for the **Symbol** class.
pub mod symbol;
/// Primitives for the **Thread** class.
pub mod thread;
/// Primitives for the **Time** class.
pub mod time;
/// Primitives for the **WeakRef** class.
pub mod weakref;

/// A interpreter primitive (just a bare function pointer).
///
/// The receiver is always the first argument. The context is the caller's.
pub type PrimitiveFn = fn(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return;

/// A primitive table entry: name, function and whether the method is public.
pub type Primitive = (&'static str, PrimitiveFn, bool);

/// The method names that are operators (they inspect as bare symbols).
pub const OPERATOR_NAMES: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "==", "!=", "<", ">", "<=", ">=", "<=>", "===", "=~", "<<",
    ">>", "&", "|", "^", "~", "!", "[]", "[]=", "+@", "-@",
];

pub fn get_class_primitives(class_name: &str) -> Option<&'static [Primitive]> {
    match class_name {
        "Exception" => Some(self::exception::CLASS_PRIMITIVES),
        "File" => Some(self::file::CLASS_PRIMITIVES),
        "Math" => Some(self::math::CLASS_PRIMITIVES),
        "Proc" => Some(self::proc::CLASS_PRIMITIVES),
        "Thread" => Some(self::thread::CLASS_PRIMITIVES),
        "Time" => Some(self::time::CLASS_PRIMITIVES),
        "WeakRef" => Some(self::weakref::CLASS_PRIMITIVES),
        _ => None,
    }
}

pub fn get_instance_primitives(class_name: &str) -> Option<&'static [Primitive]> {
    match class_name {
        "Array" => Some(self::array::INSTANCE_PRIMITIVES),
        "Class" => Some(self::module::CLASS_INSTANCE_PRIMITIVES),
        "Exception" => Some(self::exception::INSTANCE_PRIMITIVES),
        "FalseClass" => Some(self::boolean::FALSE_PRIMITIVES),
        "Float" => Some(self::float::INSTANCE_PRIMITIVES),
        "Hash" => Some(self::hash::INSTANCE_PRIMITIVES),
        "Integer" => Some(self::integer::INSTANCE_PRIMITIVES),
        "Module" => Some(self::module::INSTANCE_PRIMITIVES),
        "NilClass" => Some(self::boolean::NIL_PRIMITIVES),
        "Numeric" => Some(self::numeric::INSTANCE_PRIMITIVES),
        "Object" => Some(self::kernel::INSTANCE_PRIMITIVES),
        "Proc" => Some(self::proc::INSTANCE_PRIMITIVES),
        "Range" => Some(self::range::INSTANCE_PRIMITIVES),
        "String" => Some(self::string::INSTANCE_PRIMITIVES),
        "Symbol" => Some(self::symbol::INSTANCE_PRIMITIVES),
        "Thread" => Some(self::thread::INSTANCE_PRIMITIVES),
        "TrueClass" => Some(self::boolean::TRUE_PRIMITIVES),
        "WeakRef" => Some(self::weakref::INSTANCE_PRIMITIVES),
        _ => None,
    }
}

/// The collection primitives a class gets before its own (which take precedence).
pub fn get_shared_primitives(class_name: &str) -> Option<&'static [Primitive]> {
    match class_name {
        "Array" | "Hash" | "Range" => Some(self::enumerable::INSTANCE_PRIMITIVES),
        _ => None,
    }
}

/// Get the block given to a primitive, or raise a `LocalJumpError`.
pub(crate) fn require_block(
    universe: &Universe,
    block: Option<Arc<Proc>>,
    signature: &str,
) -> Result<Arc<Proc>, Return> {
    block.ok_or_else(|| {
        universe.raise(
            &universe.core.local_jump_error,
            format!("'{}': no block given (yield)", signature),
        )
    })
}

/// Raise an `ArgumentError` about the number of arguments (the receiver excluded).
pub(crate) fn arity_error(universe: &Universe, given: usize, expected: &str) -> Return {
    universe.raise(
        &universe.core.argument_error,
        format!(
            "wrong number of arguments (given {}, expected {})",
            given, expected
        ),
    )
}

/// Render a value with its (possibly user-defined) `inspect` method.
pub(crate) fn inspect(universe: &Universe, context: &Context, value: &Value) -> Result<String, Return> {
    match value {
        Value::Nil | Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::Symbol(_) => {
            return Ok(kernel::default_inspect(universe, value))
        }
        _ => {}
    }
    let rendered = call(universe, context, value.clone(), "inspect", Vec::new()).value()?;
    Ok(rendered
        .as_string()
        .unwrap_or_else(|| kernel::default_inspect(universe, value)))
}

/// Compare two values for equality with their (possibly user-defined) `==` method.
pub(crate) fn values_equal(
    universe: &Universe,
    context: &Context,
    a: &Value,
    b: &Value,
) -> Result<bool, Return> {
    if a.identical(b) {
        return Ok(!matches!(a, Value::Float(value) if value.is_nan()));
    }
    match (a, b) {
        (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
            return Ok(*a as f64 == *b)
        }
        (Value::Float(a), Value::Float(b)) => return Ok(a == b),
        (Value::Object(_), _) | (Value::Module(_), _) => {}
        _ => return Ok(false),
    }
    if let (Some(a), Some(b)) = (a.as_string(), b.as_string()) {
        return Ok(a == b);
    }
    Ok(call(universe, context, a.clone(), "==", vec![b.clone()])
        .value()?
        .is_truthy())
}

/// Order two values with their (possibly user-defined) `<=>` method.
pub(crate) fn compare(
    universe: &Universe,
    context: &Context,
    a: &Value,
    b: &Value,
) -> Result<Ordering, Return> {
    if let Some(ordering) = numeric::compare_numbers(a, b) {
        return Ok(ordering);
    }
    if let (Some(a), Some(b)) = (a.as_string(), b.as_string()) {
        return Ok(a.cmp(&b));
    }
    let result = call(universe, context, a.clone(), "<=>", vec![b.clone()]).value()?;
    match result {
        Value::Integer(value) => Ok(value.cmp(&0)),
        _ => Err(universe.raise(
            &universe.core.argument_error,
            format!(
                "comparison of {} with {} failed",
                a.class(universe).name(),
                kernel::default_inspect(universe, b)
            ),
        )),
    }
}

/// Get the integer behind an argument, or raise a `TypeError`.
pub(crate) fn expect_integer(universe: &Universe, signature: &str, value: &Value) -> Result<i64, Return> {
    match value {
        Value::Integer(value) => Ok(*value),
        Value::Float(value) if value.is_finite() => Ok(*value as i64),
        other => Err(universe.wrong_type(signature, other)),
    }
}

/// Get the string behind an argument (symbols included), or raise a `TypeError`.
pub(crate) fn expect_string(universe: &Universe, signature: &str, value: &Value) -> Result<String, Return> {
    match value {
        Value::Symbol(symbol) => Ok(symbol.to_string()),
        other => other
            .as_string()
            .ok_or_else(|| universe.wrong_type(signature, other)),
    }
}

/// Whether a value is an exception.
pub(crate) fn is_exception(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |object| matches!(&*object.payload(), Payload::Exception(_)))
}
