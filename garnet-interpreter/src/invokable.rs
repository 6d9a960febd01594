use std::cell::Cell;
use std::sync::Arc;

use garnet_core::ast::{Parameter, ParameterKind};

use crate::block::Proc;
use crate::error::Error;
use crate::evaluate::Evaluate;
use crate::frame::{Context, Locals, Scope};
use crate::instance::{HashTable, Payload};
use crate::method::{Arity, Method, MethodKind, Visibility};
use crate::primitives;
use crate::universe::Universe;
use crate::value::Value;

/// A control-flow signal travelling up the evaluation until something intercepts it.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A `break`. The tag is the identity of the block it escaped from, if it escaped one.
    Break { value: Value, tag: Option<u64> },
    /// A `next`.
    Next(Value),
    /// A `redo`.
    Redo,
    /// A `retry`.
    Retry,
    /// A `return`, targeting a method frame.
    Return { value: Value, frame: u64 },
}

/// Represents the kinds of possible returns from an evaluation or an invocation.
#[derive(Debug, Clone)]
pub enum Return {
    /// A local return, the value is for the immediate caller.
    Local(Value),
    /// A control-flow signal.
    Signal(Signal),
    /// A raised guest exception, catchable by `rescue`.
    Raise(Value),
    /// A `throw`, only caught by a matching `catch`.
    Throw { tag: Value, value: Value },
    /// A non-catchable failure, expected to bubble all the way up.
    Fatal(Error),
}

/// Conversion of evaluation results into a value or an early return.
pub trait Outcome {
    /// The type of the successful value.
    type Output;

    /// Split into the value or the return to propagate.
    fn into_outcome(self) -> Result<Self::Output, Return>;
}

impl Outcome for Return {
    type Output = Value;

    fn into_outcome(self) -> Result<Value, Return> {
        match self {
            Return::Local(value) => Ok(value),
            ret => Err(ret),
        }
    }
}

impl<T> Outcome for Result<T, Return> {
    type Output = T;

    fn into_outcome(self) -> Result<T, Return> {
        self
    }
}

impl Return {
    /// Get the local value, or the return to propagate.
    pub fn value(self) -> Result<Value, Return> {
        self.into_outcome()
    }
}

impl From<Result<Value, Return>> for Return {
    fn from(result: Result<Value, Return>) -> Self {
        match result {
            Ok(value) => Return::Local(value),
            Err(ret) => ret,
        }
    }
}

/// Call a method on a receiver, as if from the given context.
///
/// `implicit` is set for calls without an explicit receiver and for `self.` calls,
/// which are allowed to reach private methods.
pub fn call_method(
    universe: &Universe,
    context: &Context,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
    implicit: bool,
) -> Return {
    let method = match universe.lookup_method(&receiver, name) {
        Some(method) => method,
        None => return method_missing(universe, context, receiver, name, args, block),
    };

    if !implicit {
        match method.visibility {
            Visibility::Public => {}
            Visibility::Private => {
                let caller = context.self_value.class(universe);
                let callee = receiver.class(universe);
                if caller.id != callee.id {
                    return universe.raise(
                        &universe.core.no_method_error,
                        format!(
                            "private method '{}' called for {}",
                            name,
                            universe.describe_receiver(&receiver)
                        ),
                    );
                }
            }
            Visibility::Protected => {
                let caller = context.self_value.class(universe);
                let allowed = method
                    .holder()
                    .map_or(true, |holder| caller.is_subclass_of(&holder));
                if !allowed {
                    return universe.raise(
                        &universe.core.no_method_error,
                        format!(
                            "protected method '{}' called for {}",
                            name,
                            universe.describe_receiver(&receiver)
                        ),
                    );
                }
            }
        }
    }

    log::trace!("dispatching #{} on {:?}", name, receiver);
    invoke(universe, context, &method, receiver, args, block)
}

/// Call a method without access checks (used by built-ins calling back into guest code).
pub fn call(
    universe: &Universe,
    context: &Context,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
) -> Return {
    call_method(universe, context, receiver, name, args, None, true)
}

/// Call a method with a block, without access checks.
pub fn call_with_block(
    universe: &Universe,
    context: &Context,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    call_method(universe, context, receiver, name, args, block, true)
}

fn method_missing(
    universe: &Universe,
    context: &Context,
    receiver: Value,
    name: &str,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    match universe.lookup_method(&receiver, "method_missing") {
        Some(handler) => {
            let args = std::iter::once(universe.symbol(name))
                .chain(args)
                .collect();
            invoke(universe, context, &handler, receiver, args, block)
        }
        None => universe.raise(
            &universe.core.no_method_error,
            format!(
                "undefined method '{}' for {}",
                name,
                universe.describe_receiver(&receiver)
            ),
        ),
    }
}

/// Invoke a method that has already been looked up.
pub fn invoke(
    universe: &Universe,
    context: &Context,
    method: &Arc<Method>,
    receiver: Value,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    if context.depth >= universe.config.max_call_depth {
        return Return::Fatal(Error::StackOverflow {
            depth: universe.config.max_call_depth,
        });
    }

    match &method.kind {
        MethodKind::Native(function) => {
            let mut args = args;
            args.insert(0, receiver);
            function(universe, context, args, block)
        }
        MethodKind::Defined(definition) => {
            if !method.arity.accepts(args.len()) {
                return universe.raise(
                    &universe.core.argument_error,
                    format!(
                        "wrong number of arguments (given {}, expected {})",
                        args.len(),
                        method.arity
                    ),
                );
            }
            let holder = method.holder().unwrap_or_else(|| context.module.clone());
            let frame = universe.next_frame();
            let arguments = Arc::new(args);
            let callee = Context {
                location: Cell::new(definition.body.location),
                scope: Scope::new(),
                module: holder,
                self_value: receiver,
                block,
                method: Some(method.clone()),
                arguments: Some(arguments.clone()),
                frame,
                depth: context.depth + 1,
                locals: Locals::new(context.thread().clone()),
            };
            let args = arguments.as_ref().clone();
            if let Err(ret) = bind_parameters(universe, &callee, &definition.parameters, args, true)
            {
                return ret;
            }
            match definition.body.evaluate(universe, &callee) {
                Return::Signal(Signal::Return { value, frame: target }) if target == frame => {
                    Return::Local(value)
                }
                ret => ret,
            }
        }
        MethodKind::AttributeReader(field) => {
            Return::Local(universe.get_instance_variable(&receiver, field))
        }
        MethodKind::AttributeWriter(field) => {
            let value = match args.into_iter().next() {
                Some(value) => value,
                None => {
                    return universe.raise(
                        &universe.core.argument_error,
                        "wrong number of arguments (given 0, expected 1)",
                    )
                }
            };
            universe.set_instance_variable(&receiver, field, value.clone());
            Return::Local(value)
        }
        MethodKind::Proc(proc) => {
            let proc = Proc {
                self_value: receiver,
                lambda: true,
                ..proc.as_ref().clone()
            };
            invoke_proc(universe, context, &proc, args, block)
        }
        MethodKind::Send(name) => {
            let mut args = args;
            args.insert(0, receiver);
            send_first(universe, context, name, args, block)
        }
        MethodKind::Block(_) => Return::Fatal(Error::Internal(format!(
            "the body of a block was invoked as method '{}'",
            method.name
        ))),
    }
}

fn send_first(
    universe: &Universe,
    context: &Context,
    name: &str,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    let mut args = args.into_iter();
    match args.next() {
        Some(receiver) => {
            call_method(universe, context, receiver, name, args.collect(), block, false)
        }
        None => universe.raise(&universe.core.argument_error, "no receiver given"),
    }
}

/// Call a block (as `yield` does).
pub fn call_block(
    universe: &Universe,
    context: &Context,
    proc: &Arc<Proc>,
    args: Vec<Value>,
) -> Return {
    invoke_proc(universe, context, proc, args, None)
}

/// Call a block with a block of its own.
pub fn call_block_with_block(
    universe: &Universe,
    context: &Context,
    proc: &Arc<Proc>,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    invoke_proc(universe, context, proc, args, block)
}

fn invoke_proc(
    universe: &Universe,
    context: &Context,
    proc: &Proc,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    if context.depth >= universe.config.max_call_depth {
        return Return::Fatal(Error::StackOverflow {
            depth: universe.config.max_call_depth,
        });
    }

    let definition = match &proc.method.kind {
        MethodKind::Block(definition) => definition.clone(),
        MethodKind::Send(name) => return send_first(universe, context, name, args, block),
        _ => return invoke(universe, context, &proc.method, proc.self_value.clone(), args, block),
    };

    let mut args = args;
    if proc.lambda {
        if !proc.method.arity.accepts(args.len()) {
            return universe.raise(
                &universe.core.argument_error,
                format!(
                    "wrong number of arguments (given {}, expected {})",
                    args.len(),
                    proc.method.arity
                ),
            );
        }
    } else if args.len() == 1 && positional_count(&definition.parameters) > 1 {
        if let Some(values) = args[0].as_array() {
            args = values;
        }
    }

    let frame = if proc.lambda {
        universe.next_frame()
    } else {
        proc.frame
    };
    let callee = Context {
        location: Cell::new(definition.body.location),
        scope: proc.scope.child(),
        module: proc.module.clone(),
        self_value: proc.self_value.clone(),
        block: block.or_else(|| proc.outer_block.clone()),
        method: proc.outer_method.clone(),
        arguments: proc.outer_arguments.clone(),
        frame,
        depth: context.depth + 1,
        locals: Locals::new(context.thread().clone()),
    };
    if let Err(ret) = bind_parameters(universe, &callee, &definition.parameters, args, proc.lambda)
    {
        return ret;
    }

    loop {
        match definition.body.evaluate(universe, &callee) {
            Return::Signal(Signal::Next(value)) => break Return::Local(value),
            Return::Signal(Signal::Redo) => continue,
            Return::Signal(Signal::Break { value, tag: None }) => {
                if proc.lambda {
                    break Return::Local(value);
                }
                break Return::Signal(Signal::Break {
                    value,
                    tag: Some(proc.id),
                });
            }
            Return::Signal(Signal::Return { value, frame: target })
                if proc.lambda && target == frame =>
            {
                break Return::Local(value)
            }
            ret => break ret,
        }
    }
}

fn positional_count(parameters: &[Parameter]) -> usize {
    parameters
        .iter()
        .filter(|parameter| {
            matches!(
                parameter.kind,
                ParameterKind::Required | ParameterKind::Optional(_) | ParameterKind::Splat
            )
        })
        .count()
}

/// Bind arguments to parameters in the callee's innermost scope.
///
/// Normal parameters consume arguments greedily from left to right, falling back to their default
/// (or to `nil`, for blocks). A splat absorbs the surplus so that the normal parameters after it
/// fit exactly. A double splat merges the trailing hashes left over once the required
/// parameters are served, a block parameter receives the block.
pub fn bind_parameters(
    universe: &Universe,
    context: &Context,
    parameters: &[Parameter],
    args: Vec<Value>,
    strict: bool,
) -> Result<(), Return> {
    let mut args = args;
    let arity = Arity::from_parameters(parameters);
    let splat_position = parameters
        .iter()
        .position(|parameter| parameter.kind == ParameterKind::Splat);

    let mut options = None;
    if parameters
        .iter()
        .any(|parameter| parameter.kind == ParameterKind::DoubleSplat)
    {
        let mut first = args.len();
        while first > arity.min && args[first - 1].is_hash() {
            first -= 1;
        }
        let hashes = args.split_off(first);
        let mut merged = HashTable::new();
        for hash in hashes {
            if let Some(object) = hash.as_object() {
                if let Payload::Hash(table) = &*object.payload() {
                    merged
                        .entries
                        .extend(table.entries.iter().map(|(key, entry)| (key.clone(), entry.clone())));
                }
            }
        }
        options = Some(universe.hash(merged));

        let positional = Arity::positional(parameters);
        if strict && splat_position.is_none() && !positional.accepts(args.len()) {
            return Err(primitives::arity_error(universe, args.len(), &positional.to_string()));
        }
    }
    let is_normal = |parameter: &&Parameter| {
        matches!(
            parameter.kind,
            ParameterKind::Required | ParameterKind::Optional(_)
        )
    };
    let after_splat = match splat_position {
        Some(position) => parameters[position..].iter().filter(is_normal).count(),
        None => 0,
    };

    let mut trailing = if splat_position.is_some() {
        let keep = args.len().saturating_sub(after_splat);
        args.split_off(keep)
    } else {
        Vec::new()
    }
    .into_iter();
    let mut leading = args.into_iter();

    for (position, parameter) in parameters.iter().enumerate() {
        let in_trailing = splat_position.map_or(false, |splat| position > splat);
        match &parameter.kind {
            ParameterKind::Required | ParameterKind::Optional(_) => {
                let supplied = if in_trailing {
                    trailing.next()
                } else {
                    leading.next()
                };
                let value = match (supplied, &parameter.kind) {
                    (Some(value), _) => value,
                    (None, ParameterKind::Optional(default)) => default.evaluate(universe, context).value()?,
                    (None, _) if !strict => Value::Nil,
                    (None, _) => {
                        return Err(universe.raise(
                            &universe.core.argument_error,
                            format!("missing argument for parameter '{}'", parameter.name),
                        ))
                    }
                };
                context.scope.declare(&parameter.name, value);
            }
            ParameterKind::Splat => {
                let rest: Vec<Value> = leading.by_ref().collect();
                if !parameter.name.is_empty() {
                    context.scope.declare(&parameter.name, universe.array(rest));
                }
            }
            ParameterKind::DoubleSplat => {
                let value = options
                    .take()
                    .unwrap_or_else(|| universe.hash(HashTable::new()));
                if !parameter.name.is_empty() {
                    context.scope.declare(&parameter.name, value);
                }
            }
            ParameterKind::Block => {
                let value = match &context.block {
                    Some(block) => universe.proc_value(block.clone()),
                    None => Value::Nil,
                };
                context.scope.declare(&parameter.name, value);
            }
        }
    }

    Ok(())
}

/// Extract the proc behind a value, if it is one.
pub fn as_proc(value: &Value) -> Option<Arc<Proc>> {
    value.as_object().and_then(|object| match &*object.payload() {
        Payload::Proc(proc) => Some(proc.clone()),
        _ => None,
    })
}
