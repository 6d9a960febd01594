use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigInt;
use rand::Rng;

use crate::block::Proc;
use crate::error::Error;
use crate::evaluate::stringify;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::{HashKey, Object, Payload, WeakTarget};
use crate::invokable::{self, call, call_method, Return};
use crate::method::Visibility;
use crate::primitives::{self, arity_error, module, require_block, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::{format_float, inspect_symbol, quote, Value};

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("initialize", self::initialize, false),
    ("puts", self::puts, false),
    ("print", self::print, false),
    ("p", self::p, false),
    ("gets", self::gets, false),
    ("getc", self::getc, false),
    ("warn", self::warn, false),
    ("raise", self::raise, false),
    ("fail", self::raise, false),
    ("loop", self::loop_, false),
    ("sleep", self::sleep, false),
    ("catch", self::catch, false),
    ("throw", self::throw, false),
    ("rand", self::rand, false),
    ("srand", self::srand, false),
    ("lambda", self::lambda, false),
    ("proc", self::proc, false),
    ("block_given?", self::block_given, false),
    ("Integer", self::to_integer, false),
    ("Float", self::to_float, false),
    ("private", module::private, false),
    ("public", module::public, false),
    ("protected", module::protected, false),
    ("method_missing", self::method_missing, false),
    ("class", self::class, true),
    ("object_id", self::object_id, true),
    ("hash", self::hash, true),
    ("inspect", self::inspect, true),
    ("to_s", self::to_s, true),
    ("==", self::eq, true),
    ("equal?", self::eq, true),
    ("eql?", self::eql, true),
    ("!=", self::ne, true),
    ("!", self::not, true),
    ("===", self::case_eq, true),
    ("<=>", self::cmp, true),
    ("nil?", self::is_nil, true),
    ("is_a?", self::is_a, true),
    ("kind_of?", self::is_a, true),
    ("instance_of?", self::instance_of, true),
    ("respond_to?", self::respond_to, true),
    ("send", self::send, true),
    ("__send__", self::send, true),
    ("instance_variable_get", self::instance_variable_get, true),
    ("instance_variable_set", self::instance_variable_set, true),
    ("dup", self::dup, true),
    ("tap", self::tap, true),
    ("then", self::then, true),
];

/// Render a value without calling into guest code.
pub fn default_inspect(universe: &Universe, value: &Value) -> String {
    render(universe, value, 0)
}

/// Render a value the way the built-in `to_s` does, without calling into guest code.
pub fn default_to_s(universe: &Universe, value: &Value) -> String {
    match value {
        Value::Nil => String::new(),
        Value::Symbol(symbol) => symbol.to_string(),
        Value::Module(module) => module.name().to_string(),
        Value::Object(object) => {
            if let Some(text) = value.as_string() {
                return text;
            }
            if primitives::is_exception(value) {
                return universe.exception_message(value);
            }
            let plain = matches!(&*object.payload(), Payload::Plain);
            if plain {
                describe_object(universe, value, object)
            } else {
                render(universe, value, 0)
            }
        }
        value => render(universe, value, 0),
    }
}

fn describe_object(universe: &Universe, value: &Value, object: &Object) -> String {
    if value.identical(&universe.main) {
        return String::from("main");
    }
    format!("#<{}>", object.class.name())
}

fn render(universe: &Universe, value: &Value, depth: usize) -> String {
    if depth > 16 {
        return String::from("...");
    }
    let object = match value {
        Value::Nil => return String::from("nil"),
        Value::Boolean(value) => return value.to_string(),
        Value::Integer(value) => return value.to_string(),
        Value::Float(value) => return format_float(*value),
        Value::Symbol(symbol) => return inspect_symbol(symbol.as_str()),
        Value::Module(module) => return module.name().to_string(),
        Value::Object(object) => object,
    };
    let payload = object.payload();
    match &*payload {
        Payload::String(value) => quote(value),
        Payload::BigInteger(value) => value.to_string(),
        Payload::Array(values) => {
            let values = values.clone();
            drop(payload);
            let items: Vec<String> = values
                .iter()
                .map(|value| render(universe, value, depth + 1))
                .collect();
            format!("[{}]", items.join(", "))
        }
        Payload::Hash(table) => {
            let pairs = table.pairs();
            drop(payload);
            if pairs.is_empty() {
                return String::from("{}");
            }
            let items: Vec<String> = pairs
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{}=>{}",
                        render(universe, key, depth + 1),
                        render(universe, value, depth + 1)
                    )
                })
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        Payload::Range(range) => {
            let range = range.clone();
            drop(payload);
            let end = if range.to.is_nil() {
                String::new()
            } else {
                render(universe, &range.to, depth + 1)
            };
            format!(
                "{}{}{}",
                render(universe, &range.from, depth + 1),
                if range.exclusive { "..." } else { ".." },
                end
            )
        }
        Payload::Proc(proc) => format!(
            "#<Proc:0x{:016x}{}>",
            proc.id,
            if proc.lambda { " (lambda)" } else { "" }
        ),
        Payload::Thread(handle) => format!(
            "#<Thread:0x{:016x} {}>",
            handle.id,
            if handle.is_alive() { "run" } else { "dead" }
        ),
        Payload::WeakRef(target) => {
            let target = target.upgrade();
            drop(payload);
            match target {
                Some(target) => format!("#<WeakRef {}>", render(universe, &target, depth + 1)),
                None => String::from("#<WeakRef (collected)>"),
            }
        }
        Payload::Exception(_) => {
            drop(payload);
            format!(
                "#<{}: {}>",
                object.class.name(),
                universe.exception_message(value)
            )
        }
        Payload::Plain => {
            drop(payload);
            if value.identical(&universe.main) {
                return String::from("main");
            }
            let fields = object.field_names();
            if fields.is_empty() {
                return format!("#<{}>", object.class.name());
            }
            let items: Vec<String> = fields
                .iter()
                .map(|name| {
                    let field = object.get_field(name).unwrap_or(Value::Nil);
                    format!("{}={}", name, render(universe, &field, depth + 1))
                })
                .collect();
            format!("#<{} {}>", object.class.name(), items.join(", "))
        }
    }
}

/// Copy a payload for `dup`.
pub(crate) fn duplicate_payload(payload: &Payload) -> Payload {
    match payload {
        Payload::Plain => Payload::Plain,
        Payload::String(value) => Payload::String(value.clone()),
        Payload::BigInteger(value) => Payload::BigInteger(value.clone()),
        Payload::Array(values) => Payload::Array(values.clone()),
        Payload::Hash(table) => Payload::Hash(table.clone()),
        Payload::Range(range) => Payload::Range(range.clone()),
        Payload::Proc(proc) => Payload::Proc(proc.clone()),
        Payload::Thread(handle) => Payload::Thread(handle.clone()),
        Payload::WeakRef(target) => match target.upgrade() {
            Some(value) => Payload::WeakRef(WeakTarget::new(&value)),
            None => Payload::WeakRef(WeakTarget::Object(Default::default())),
        },
        Payload::Exception(location) => Payload::Exception(*location),
    }
}

fn initialize(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    if args.len() > 1 {
        return arity_error(universe, args.len() - 1, "0");
    }
    Return::Local(Value::Nil)
}

fn write_lines(universe: &Universe, context: &Context, value: &Value, depth: usize) -> Result<(), Return> {
    if let Some(values) = value.as_array() {
        if values.is_empty() && depth == 0 {
            universe.console().write_line("");
        }
        for value in values.iter() {
            write_lines(universe, context, value, depth + 1)?;
        }
        return Ok(());
    }
    let text = stringify(universe, context, value)?;
    if text.ends_with('\n') {
        universe.console().write(&text);
    } else {
        universe.console().write_line(&text);
    }
    Ok(())
}

fn puts(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    if args.len() <= 1 {
        universe.console().write_line("");
    }
    for value in args.iter().skip(1) {
        propagate!(write_lines(universe, context, value, 0));
    }
    Return::Local(Value::Nil)
}

fn print(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    for value in args.iter().skip(1) {
        let text = propagate!(stringify(universe, context, value));
        universe.console().write(&text);
    }
    Return::Local(Value::Nil)
}

fn p(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let mut args = args;
    args.remove(0);
    for value in args.iter() {
        let text = propagate!(primitives::inspect(universe, context, value));
        universe.console().write_line(&text);
    }
    match args.len() {
        0 => Return::Local(Value::Nil),
        1 => Return::Local(args.remove(0)),
        _ => Return::Local(universe.array(args)),
    }
}

fn gets(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    match universe.console().read_line() {
        Some(line) => Return::Local(universe.string(line)),
        None => Return::Local(Value::Nil),
    }
}

fn getc(universe: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    match universe.console().read_key() {
        Some(key) => Return::Local(universe.string(key.to_string())),
        None => Return::Local(Value::Nil),
    }
}

fn warn(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    for value in args.iter().skip(1) {
        let text = propagate!(stringify(universe, context, value));
        log::warn!("{}", text);
        universe.console().write_line(&text);
    }
    Return::Local(Value::Nil)
}

fn raise(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let mut args = args.into_iter().skip(1);
    let first = args.next();
    let message = args.next();

    let exception = match (first, message) {
        (None, _) => match universe.get_global("$!") {
            Value::Nil => universe.exception(&universe.core.runtime_error, "unhandled exception"),
            current => current,
        },
        (Some(Value::Module(class)), message) => {
            let args = message.into_iter().collect();
            propagate!(call(universe, context, Value::Module(class), "new", args))
        }
        (Some(value), None) if value.is_string() => {
            let message = value.as_string().unwrap_or_default();
            universe.exception(&universe.core.runtime_error, message)
        }
        (Some(value), message) if primitives::is_exception(&value) => {
            if let Some(message) = message {
                universe.set_instance_variable(&value, "@message", message);
            }
            value
        }
        (Some(_), _) => {
            return universe.raise(
                &universe.core.type_error,
                "exception class/object expected",
            )
        }
    };

    if !primitives::is_exception(&exception) {
        return universe.raise(&universe.core.type_error, "exception object expected");
    }
    universe.stamp_exception(&exception, context.location());
    Return::Raise(exception)
}

fn loop_(universe: &Universe, context: &Context, _: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#loop";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    loop {
        if context.thread().is_cancelled() {
            return Return::Fatal(Error::Cancelled);
        }
        match invokable::call_block(universe, context, &block, Vec::new()) {
            Return::Local(_) => {}
            Return::Raise(exception)
                if exception
                    .class(universe)
                    .is_subclass_of(&universe.core.stop_iteration) =>
            {
                return Return::Local(universe.get_instance_variable(&exception, "@result"));
            }
            ret => return ret,
        }
    }
}

fn sleep(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#sleep";

    let seconds = match args.get(1) {
        None => None,
        Some(Value::Integer(value)) if *value >= 0 => Some(*value as f64),
        Some(Value::Float(value)) if *value >= 0.0 && value.is_finite() => Some(*value),
        Some(Value::Integer(_)) | Some(Value::Float(_)) => {
            return universe.raise(
                &universe.core.argument_error,
                "time interval must not be negative",
            )
        }
        Some(other) => return universe.wrong_type(SIGNATURE, other),
    };

    let started = std::time::Instant::now();
    let completed = match seconds {
        Some(seconds) => context.thread().sleep(Duration::from_secs_f64(seconds)),
        None => loop {
            if !context.thread().sleep(Duration::from_secs(3600)) {
                break false;
            }
        },
    };
    if !completed {
        return Return::Fatal(Error::Cancelled);
    }
    Return::Local(Value::Integer(started.elapsed().as_secs_f64().round() as i64))
}

fn catch(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#catch";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let tag = match args.get(1) {
        Some(tag) => tag.clone(),
        None => universe.new_object(universe.core.object_class.clone(), Payload::Plain),
    };
    match invokable::call_block(universe, context, &block, vec![tag.clone()]) {
        Return::Throw { tag: thrown, value } if thrown.identical(&tag) => Return::Local(value),
        ret => ret,
    }
}

fn throw(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#throw";

    let mut args = args.into_iter().skip(1);
    match args.next() {
        Some(tag) => Return::Throw {
            tag,
            value: args.next().unwrap_or(Value::Nil),
        },
        None => universe.missing_argument(SIGNATURE),
    }
}

fn rand(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#rand";

    match args.get(1) {
        None | Some(Value::Nil) => Return::Local(Value::Float(universe.with_rng(|rng| rng.gen::<f64>()))),
        Some(Value::Integer(0)) => Return::Local(Value::Float(universe.with_rng(|rng| rng.gen::<f64>()))),
        Some(Value::Integer(max)) => {
            let max = max.abs();
            Return::Local(Value::Integer(universe.with_rng(|rng| rng.gen_range(0..max))))
        }
        Some(Value::Float(max)) => {
            let max = *max;
            Return::Local(Value::Float(universe.with_rng(|rng| rng.gen::<f64>() * max)))
        }
        Some(range) => {
            let bounds = range.as_object().and_then(|object| match &*object.payload() {
                Payload::Range(range) => range.integer_bounds(),
                _ => None,
            });
            match bounds {
                Some((from, to)) if from <= to => {
                    Return::Local(Value::Integer(universe.with_rng(|rng| rng.gen_range(from..=to))))
                }
                Some(_) => Return::Local(Value::Nil),
                None => universe.wrong_type(SIGNATURE, range),
            }
        }
    }
}

fn srand(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#srand";

    let seed = match args.get(1) {
        None => universe.with_rng(|rng| rng.gen::<u64>()),
        Some(Value::Integer(seed)) => *seed as u64,
        Some(other) => return universe.wrong_type(SIGNATURE, other),
    };
    let previous = universe.reseed(seed);
    Return::Local(Value::Integer(previous as i64))
}

fn lambda(universe: &Universe, _: &Context, _: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#lambda";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    let lambda = Arc::new(block.as_lambda(universe.next_id()));
    Return::Local(universe.proc_value(lambda))
}

fn proc(universe: &Universe, _: &Context, _: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#proc";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    Return::Local(universe.proc_value(block))
}

fn block_given(_: &Universe, context: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(Value::Boolean(context.block.is_some()))
}

fn parse_integer(text: &str) -> Option<BigInt> {
    let cleaned: String = text.trim().chars().filter(|ch| *ch != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        _ => (10, digits),
    };
    if digits.is_empty() {
        return None;
    }
    let value = BigInt::parse_bytes(digits.as_bytes(), radix)?;
    Some(if negative { -value } else { value })
}

fn to_integer(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#Integer";

    expect_args!(universe, SIGNATURE, args, [
        _,
        value => value,
    ]);

    match &value {
        Value::Integer(_) => Return::Local(value),
        Value::Float(float) => primitives::float::float_to_integer(universe, *float),
        Value::Nil => universe.raise(
            &universe.core.type_error,
            "can't convert nil into Integer",
        ),
        other if other.as_big_integer().is_some() => Return::Local(value),
        other => match other.as_string() {
            Some(text) => match parse_integer(&text) {
                Some(parsed) => Return::Local(universe.integer(parsed)),
                None => universe.raise(
                    &universe.core.argument_error,
                    format!("invalid value for Integer(): {}", quote(&text)),
                ),
            },
            None => call(universe, context, value.clone(), "to_i", Vec::new()),
        },
    }
}

fn to_float(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Kernel#Float";

    expect_args!(universe, SIGNATURE, args, [
        _,
        value => value,
    ]);

    match &value {
        Value::Float(_) => Return::Local(value),
        Value::Integer(integer) => Return::Local(Value::Float(*integer as f64)),
        Value::Nil => universe.raise(&universe.core.type_error, "can't convert nil into Float"),
        other => match other.as_string() {
            Some(text) => {
                let cleaned: String = text.trim().chars().filter(|ch| *ch != '_').collect();
                match cleaned.parse::<f64>() {
                    Ok(parsed) if !cleaned.is_empty() => Return::Local(Value::Float(parsed)),
                    _ => universe.raise(
                        &universe.core.argument_error,
                        format!("invalid value for Float(): {}", quote(&text)),
                    ),
                }
            }
            None => call(universe, context, value.clone(), "to_f", Vec::new()),
        },
    }
}

fn method_missing(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let receiver = args.get(0).cloned().unwrap_or(Value::Nil);
    let name = match args.get(1) {
        Some(Value::Symbol(name)) => name.to_string(),
        _ => String::from("method_missing"),
    };
    universe.raise(
        &universe.core.no_method_error,
        format!(
            "undefined method '{}' for {}",
            name,
            universe.describe_receiver(&receiver)
        ),
    )
}

fn class(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#class";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    Return::Local(Value::Module(value.class(universe)))
}

fn object_id(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#object_id";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    Return::Local(Value::Integer(value.object_id() as i64))
}

fn hash(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#hash";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let mut hasher = DefaultHasher::new();
    HashKey::from_value(&value).hash(&mut hasher);
    Return::Local(Value::Integer(hasher.finish() as i64))
}

fn inspect(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#inspect";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let plain = value
        .as_object()
        .map_or(false, |object| matches!(&*object.payload(), Payload::Plain));
    let object = match &value {
        Value::Object(object) if plain => object.clone(),
        _ => return Return::Local(universe.string(default_inspect(universe, &value))),
    };
    if value.identical(&universe.main) {
        return Return::Local(universe.string("main"));
    }
    let mut items = Vec::new();
    for name in object.field_names() {
        let field = object.get_field(&name).unwrap_or(Value::Nil);
        let rendered = propagate!(primitives::inspect(universe, context, &field));
        items.push(format!("{}={}", name, rendered));
    }
    let rendered = if items.is_empty() {
        format!("#<{}>", object.class.name())
    } else {
        format!("#<{} {}>", object.class.name(), items.join(", "))
    };
    Return::Local(universe.string(rendered))
}

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#to_s";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    Return::Local(universe.string(default_to_s(universe, &value)))
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#==";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    Return::Local(Value::Boolean(a.identical(&b)))
}

fn eql(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#eql?";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    let same_class = a.class(universe).id == b.class(universe).id;
    Return::Local(Value::Boolean(
        same_class && HashKey::from_value(&a) == HashKey::from_value(&b),
    ))
}

fn ne(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#!=";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    let equal = propagate!(call(universe, context, a, "==", vec![b]));
    Return::Local(Value::Boolean(!equal.is_truthy()))
}

fn not(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#!";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    Return::Local(Value::Boolean(!value.is_truthy()))
}

fn case_eq(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#===";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    let equal = propagate!(primitives::values_equal(universe, context, &a, &b));
    Return::Local(Value::Boolean(equal))
}

fn cmp(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#<=>";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    if propagate!(primitives::values_equal(universe, context, &a, &b)) {
        Return::Local(Value::Integer(0))
    } else {
        Return::Local(Value::Nil)
    }
}

fn is_nil(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(Value::Boolean(args.get(0).map_or(true, Value::is_nil)))
}

fn is_a(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#is_a?";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        Value::Module(module) => module,
    ]);

    Return::Local(Value::Boolean(value.class(universe).is_subclass_of(&module)))
}

fn instance_of(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#instance_of?";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        Value::Module(module) => module,
    ]);

    Return::Local(Value::Boolean(value.class(universe).id == module.id))
}

fn respond_to(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#respond_to?";

    let include_private = args.get(2).map_or(false, Value::is_truthy);
    expect_args!(universe, SIGNATURE, args, [
        value => value,
        name => name,
    ]);

    let name = propagate!(primitives::expect_string(universe, SIGNATURE, &name));
    Return::Local(Value::Boolean(universe.responds_to(&value, &name, include_private)))
}

fn send(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    dispatch(universe, context, args, block, "Object#send", true)
}

fn dispatch(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    signature: &str,
    implicit: bool,
) -> Return {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let name = match args.next() {
        Some(name) => propagate!(primitives::expect_string(universe, signature, &name)),
        None => return universe.raise(&universe.core.argument_error, "no method name given"),
    };
    call_method(universe, context, receiver, &name, args.collect(), block, implicit)
}

fn expect_ivar_name(universe: &Universe, signature: &str, name: &Value) -> Result<String, Return> {
    let name = primitives::expect_string(universe, signature, name)?;
    if !name.starts_with('@') || name.starts_with("@@") || name.len() < 2 {
        return Err(universe.raise(
            &universe.core.name_error,
            format!("'{}' is not allowed as an instance variable name", name),
        ));
    }
    Ok(name)
}

fn instance_variable_get(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#instance_variable_get";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        name => name,
    ]);

    let name = propagate!(expect_ivar_name(universe, SIGNATURE, &name));
    Return::Local(universe.get_instance_variable(&value, &name))
}

fn instance_variable_set(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#instance_variable_set";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        name => name,
        field => field,
    ]);

    let name = propagate!(expect_ivar_name(universe, SIGNATURE, &name));
    universe.set_instance_variable(&value, &name, field.clone());
    Return::Local(field)
}

fn dup(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#dup";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let object = match &value {
        Value::Object(object) => object,
        _ => return Return::Local(value),
    };
    let payload = duplicate_payload(&object.payload());
    let copy = Object::new(universe.next_id(), object.class.clone(), payload);
    object.copy_fields_to(&copy);
    Return::Local(Value::Object(Arc::new(copy)))
}

fn tap(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#tap";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    propagate!(invokable::call_block(universe, context, &block, vec![value.clone()]));
    Return::Local(value)
}

fn then(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Object#then";

    let block = propagate!(require_block(universe, block, SIGNATURE));
    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    invokable::call_block(universe, context, &block, vec![value])
}

/// Change the default access level (or the access level of the named methods) of the lexical module.
pub(crate) fn change_visibility(
    universe: &Universe,
    context: &Context,
    args: Vec<Value>,
    visibility: Visibility,
    signature: &str,
) -> Return {
    let names: Vec<Value> = args.into_iter().skip(1).collect();
    if names.is_empty() {
        context.locals.set_visibility(visibility);
        return Return::Local(Value::Nil);
    }
    let names = match names.as_slice() {
        [single] if single.is_array() => single.as_array().unwrap_or_default(),
        _ => names,
    };
    let module = context.module.clone();
    for name in names.iter() {
        let name = propagate!(primitives::expect_string(universe, signature, name));
        let method = match module.lookup_method(&name) {
            Some(method) => method,
            None => {
                return universe.raise(
                    &universe.core.name_error,
                    format!(
                        "undefined method '{}' for class '{}'",
                        name,
                        module.name()
                    ),
                )
            }
        };
        module.define_method(
            method
                .as_ref()
                .clone()
                .with_visibility(visibility)
                .held_by(&module),
        );
    }
    match names.len() {
        1 => Return::Local(names[0].clone()),
        _ => Return::Local(universe.array(names)),
    }
}
