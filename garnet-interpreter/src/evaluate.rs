use std::cell::Cell;
use std::sync::Arc;

use num_bigint::BigInt;

use garnet_core::ast::{
    self, AssignTarget, BlockDef, ControlKind, Expression, ExpressionKind, LogicOperator,
    MethodCall, MethodDef, StringPart,
};
use garnet_core::Location;

use crate::block::Proc;
use crate::class::{Module, ModuleKind};
use crate::error::Error;
use crate::frame::{Context, Locals, Scope};
use crate::instance::{HashTable, Payload};
use crate::invokable::{self, as_proc, call, call_method, Return, Signal};
use crate::method::{Arity, Method, MethodKind, Visibility};
use crate::primitives;
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

/// The trait for evaluating AST nodes.
pub trait Evaluate {
    /// Evaluate the node within a given universe and context.
    fn evaluate(&self, universe: &Universe, context: &Context) -> Return;
}

impl Evaluate for ast::Program {
    fn evaluate(&self, universe: &Universe, context: &Context) -> Return {
        self.body.evaluate(universe, context)
    }
}

impl Evaluate for Expression {
    fn evaluate(&self, universe: &Universe, context: &Context) -> Return {
        let output = evaluate_kind(self, universe, context);
        if let Return::Raise(exception) = &output {
            universe.stamp_exception(exception, self.location);
        }
        output
    }
}

fn evaluate_kind(expr: &Expression, universe: &Universe, context: &Context) -> Return {
    match &expr.kind {
        ExpressionKind::Sequence(statements) => evaluate_sequence(statements, universe, context),

        ExpressionKind::Identifier(name) => {
            if let Some(value) = context.scope.lookup(name) {
                return Return::Local(value);
            }
            let receiver = context.self_value.clone();
            if universe.lookup_method(&receiver, name).is_none() && !has_custom_method_missing(universe, &receiver) {
                return universe.raise(
                    &universe.core.name_error,
                    format!(
                        "undefined local variable or method '{}' for {}",
                        name,
                        universe.describe_receiver(&receiver)
                    ),
                );
            }
            context.location.set(expr.location);
            call_method(universe, context, receiver, name, Vec::new(), None, true)
        }
        ExpressionKind::Constant(name) => match universe.resolve_constant(context, name) {
            Some(value) => Return::Local(value),
            None => universe.raise(
                &universe.core.name_error,
                format!("uninitialized constant {}", name),
            ),
        },
        ExpressionKind::Global(name) => Return::Local(universe.get_global(name)),
        ExpressionKind::ClassVariable(name) => {
            let module = class_variable_holder(universe, context);
            match module.lookup_class_variable(name) {
                Some(value) => Return::Local(value),
                None => universe.raise(
                    &universe.core.name_error,
                    format!(
                        "uninitialized class variable {} in {}",
                        name,
                        module.name()
                    ),
                ),
            }
        }
        ExpressionKind::InstanceVariable(name) => Return::Local(
            universe.get_instance_variable(&context.self_value, name),
        ),
        ExpressionKind::ConstantPath { scope, name } => {
            let module = propagate!(scope_module(scope.as_deref(), universe, context));
            match module.lookup_constant(name) {
                Some(value) => Return::Local(value),
                None => universe.raise(
                    &universe.core.name_error,
                    format!("uninitialized constant {}::{}", module.name(), name),
                ),
            }
        }
        ExpressionKind::MethodCall(call) => evaluate_call(call, expr.location, universe, context),

        ExpressionKind::Nil => Return::Local(Value::Nil),
        ExpressionKind::True => Return::Local(Value::Boolean(true)),
        ExpressionKind::False => Return::Local(Value::Boolean(false)),
        ExpressionKind::SelfRef => Return::Local(context.self_value.clone()),
        ExpressionKind::Integer(value) => Return::Local(Value::Integer(*value)),
        ExpressionKind::BigInteger(text) => match text.parse::<BigInt>() {
            Ok(value) => Return::Local(universe.integer(value)),
            Err(err) => Return::Fatal(Error::Internal(format!(
                "malformed integer literal '{}': {}",
                text, err
            ))),
        },
        ExpressionKind::Float(value) => Return::Local(Value::Float(*value)),
        ExpressionKind::String(value) => Return::Local(universe.string(value.as_str())),
        ExpressionKind::Symbol(name) => Return::Local(universe.symbol(name)),
        ExpressionKind::FormattedString(parts) => {
            let mut output = String::new();
            for part in parts {
                match part {
                    StringPart::Text(text) => output.push_str(text),
                    StringPart::Code(code) => {
                        let value = propagate!(code.evaluate(universe, context));
                        output.push_str(&propagate!(stringify(universe, context, &value)));
                    }
                }
            }
            Return::Local(universe.string(output))
        }

        ExpressionKind::Assignment { target, value } => {
            let value = propagate!(value.evaluate(universe, context));
            propagate!(assign(target, value.clone(), universe, context));
            Return::Local(value)
        }
        ExpressionKind::CompoundAssignment {
            target,
            operator,
            value,
        } => compound_assignment(target, operator, value, universe, context),
        ExpressionKind::MultiAssignment { targets, values } => {
            let splatted = values
                .iter()
                .any(|value| matches!(value.kind, ExpressionKind::Splat(_)));
            let evaluated = propagate!(evaluate_list(values, universe, context));
            let (result, items) = if values.len() == 1 && !splatted {
                let value = evaluated.into_iter().next().unwrap_or(Value::Nil);
                let items = value
                    .as_array()
                    .unwrap_or_else(|| vec![value.clone()]);
                (value, items)
            } else {
                (universe.array(evaluated.clone()), evaluated)
            };
            propagate!(destructure(targets, items, universe, context));
            Return::Local(result)
        }

        ExpressionKind::Not(operand) => {
            let value = propagate!(operand.evaluate(universe, context));
            Return::Local(Value::Boolean(!value.is_truthy()))
        }
        ExpressionKind::Ternary {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition = propagate!(condition.evaluate(universe, context));
            if condition.is_truthy() {
                then_branch.evaluate(universe, context)
            } else {
                else_branch.evaluate(universe, context)
            }
        }
        ExpressionKind::Logic { operator, lhs, rhs } => {
            let lhs = propagate!(lhs.evaluate(universe, context));
            match (operator, lhs.is_truthy()) {
                (LogicOperator::And, true) | (LogicOperator::Or, false) => {
                    rhs.evaluate(universe, context)
                }
                _ => Return::Local(lhs),
            }
        }

        ExpressionKind::Array(items) => {
            let values = propagate!(evaluate_list(items, universe, context));
            Return::Local(universe.array(values))
        }
        ExpressionKind::Hash(entries) => {
            let mut table = HashTable::new();
            for entry in entries {
                propagate!(hash_entry(entry, &mut table, universe, context));
            }
            Return::Local(universe.hash(table))
        }
        ExpressionKind::Range {
            from,
            to,
            exclusive,
        } => {
            let from = propagate!(from.evaluate(universe, context));
            let to = propagate!(to.evaluate(universe, context));
            Return::Local(universe.range(from, to, *exclusive))
        }
        ExpressionKind::KeyValue { .. } | ExpressionKind::DoubleSplat(_) => {
            let mut table = HashTable::new();
            propagate!(hash_entry(expr, &mut table, universe, context));
            Return::Local(universe.hash(table))
        }
        ExpressionKind::Splat(_) => {
            let values = propagate!(evaluate_list(std::slice::from_ref(expr), universe, context));
            Return::Local(universe.array(values))
        }
        ExpressionKind::BlockPass(_) => Return::Fatal(Error::Internal(String::from(
            "a block argument reached the interpreter outside of an argument list",
        ))),
        ExpressionKind::Lambda(definition) => {
            let proc = make_proc(universe, context, definition.clone(), true);
            Return::Local(universe.proc_value(proc))
        }

        ExpressionKind::Yield(arguments) => {
            let (args, block) = propagate!(evaluate_arguments(arguments, universe, context));
            match &context.block {
                Some(target) => {
                    context.location.set(expr.location);
                    invokable::call_block_with_block(universe, context, target, args, block)
                }
                None => universe.raise(
                    &universe.core.local_jump_error,
                    "no block given (yield)",
                ),
            }
        }
        ExpressionKind::Super { arguments, block } => {
            evaluate_super(arguments.as_deref(), block.as_ref(), expr.location, universe, context)
        }
        ExpressionKind::Defined(operand) => defined(operand, universe, context),
        ExpressionKind::Alias { new_name, old_name } => {
            let module = context.module.clone();
            match module.lookup_method(old_name) {
                Some(method) => {
                    module.define_method(method.as_ref().clone().renamed(new_name));
                    Return::Local(Value::Nil)
                }
                None => universe.raise(
                    &universe.core.name_error,
                    format!(
                        "undefined method '{}' for class '{}'",
                        old_name,
                        module.name()
                    ),
                ),
            }
        }

        ExpressionKind::Control { kind, value } => {
            let value = match value {
                Some(value) => propagate!(value.evaluate(universe, context)),
                None => Value::Nil,
            };
            Return::Signal(match kind {
                ControlKind::Break => Signal::Break { value, tag: None },
                ControlKind::Next => Signal::Next(value),
                ControlKind::Redo => Signal::Redo,
                ControlKind::Retry => Signal::Retry,
                ControlKind::Return => Signal::Return {
                    value,
                    frame: context.frame,
                },
            })
        }

        ExpressionKind::Begin(begin) => evaluate_begin(begin, universe, context),
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition = propagate!(condition.evaluate(universe, context));
            if condition.is_truthy() {
                then_branch.evaluate(universe, context)
            } else {
                match else_branch {
                    Some(branch) => branch.evaluate(universe, context),
                    None => Return::Local(Value::Nil),
                }
            }
        }
        ExpressionKind::While {
            condition,
            body,
            until,
            do_while,
        } => {
            let mut skip_condition = *do_while;
            loop {
                if !skip_condition {
                    let condition = propagate!(condition.evaluate(universe, context));
                    if condition.is_truthy() == *until {
                        return Return::Local(Value::Nil);
                    }
                }
                skip_condition = false;
                if let Some(ret) = run_iteration(body, universe, context) {
                    return ret;
                }
            }
        }
        ExpressionKind::MethodDefinition(definition) => {
            define_method(definition, universe, context)
        }
        ExpressionKind::For {
            variables,
            iterable,
            body,
        } => {
            let iterable = propagate!(iterable.evaluate(universe, context));
            let items = propagate!(primitives::enumerable::elements(
                universe, context, &iterable
            ));
            for item in items {
                if variables.len() == 1 {
                    context.scope.assign(&variables[0], item);
                } else {
                    let mut values = item.as_array().unwrap_or_else(|| vec![item]).into_iter();
                    for variable in variables {
                        context
                            .scope
                            .assign(variable, values.next().unwrap_or(Value::Nil));
                    }
                }
                if let Some(ret) = run_iteration(body, universe, context) {
                    return ret;
                }
            }
            Return::Local(iterable)
        }
        ExpressionKind::ModuleDefinition { scope, name, body } => {
            let parent = propagate!(definition_parent(scope.as_deref(), universe, context));
            let module = match parent.get_constant(name) {
                Some(Value::Module(module)) if !module.is_class() => {
                    log::debug!("reopening module {}", module.name());
                    module
                }
                Some(_) => {
                    return universe.raise(
                        &universe.core.type_error,
                        format!("{} is not a module", name),
                    )
                }
                None => universe.define_module(&parent, name, ModuleKind::Module, None),
            };
            evaluate_module_body(&module, body, universe, context)
        }
        ExpressionKind::ClassDefinition {
            scope,
            name,
            superclass,
            body,
        } => {
            let parent = propagate!(definition_parent(scope.as_deref(), universe, context));
            let superclass = match superclass {
                Some(superclass) => match propagate!(superclass.evaluate(universe, context)) {
                    Value::Module(class) if class.is_class() => Some(class),
                    other => {
                        return universe.raise(
                            &universe.core.type_error,
                            format!(
                                "superclass must be a Class ({} given)",
                                other.class(universe).name()
                            ),
                        )
                    }
                },
                None => None,
            };
            let class = match parent.get_constant(name) {
                Some(Value::Module(class)) if class.is_class() => {
                    if let Some(superclass) = &superclass {
                        let current = class.superclass.as_ref().map(|class| class.id);
                        if current != Some(superclass.id) {
                            return universe.raise(
                                &universe.core.type_error,
                                format!("superclass mismatch for class {}", name),
                            );
                        }
                    }
                    log::debug!("reopening class {}", class.name());
                    class
                }
                Some(_) => {
                    return universe.raise(
                        &universe.core.type_error,
                        format!("{} is not a class", name),
                    )
                }
                None => {
                    let superclass = superclass.unwrap_or_else(|| universe.core.object_class.clone());
                    universe.define_module(&parent, name, ModuleKind::Class, Some(superclass))
                }
            };
            evaluate_module_body(&class, body, universe, context)
        }
        ExpressionKind::Case {
            subject,
            clauses,
            else_branch,
        } => {
            if clauses.is_empty() {
                universe.warn(expr.location, "'case' without any 'when' clause");
            }
            let subject = match subject {
                Some(subject) => Some(propagate!(subject.evaluate(universe, context))),
                None => None,
            };
            for clause in clauses {
                let candidates = propagate!(evaluate_list(&clause.patterns, universe, context));
                for candidate in candidates {
                    let matched = match &subject {
                        Some(subject) => {
                            propagate!(call(universe, context, candidate, "===", vec![subject.clone()]))
                                .is_truthy()
                        }
                        None => candidate.is_truthy(),
                    };
                    if matched {
                        return clause.body.evaluate(universe, context);
                    }
                }
            }
            match else_branch {
                Some(branch) => branch.evaluate(universe, context),
                None => Return::Local(Value::Nil),
            }
        }
    }
}

/// Evaluate a statement sequence, checking for cancellation before each statement.
pub fn evaluate_sequence(statements: &[Expression], universe: &Universe, context: &Context) -> Return {
    let mut last = Value::Nil;
    for statement in statements {
        if context.thread().is_cancelled() {
            return Return::Fatal(Error::Cancelled);
        }
        last = propagate!(statement.evaluate(universe, context));
    }
    Return::Local(last)
}

/// Run one iteration of a loop body, returning `Some` when the loop must stop.
fn run_iteration(body: &Expression, universe: &Universe, context: &Context) -> Option<Return> {
    loop {
        match body.evaluate(universe, context) {
            Return::Local(_) | Return::Signal(Signal::Next(_)) => return None,
            Return::Signal(Signal::Redo) => continue,
            Return::Signal(Signal::Break { value, tag: None }) => return Some(Return::Local(value)),
            ret => return Some(ret),
        }
    }
}

fn has_custom_method_missing(universe: &Universe, receiver: &Value) -> bool {
    universe
        .lookup_method(receiver, "method_missing")
        .map_or(false, |method| !method.is_native())
}

fn class_variable_holder(universe: &Universe, context: &Context) -> Arc<Module> {
    match &context.self_value {
        Value::Module(module) if !Arc::ptr_eq(&context.module, &universe.core.object_class) => {
            module.clone()
        }
        _ => context.module.clone(),
    }
}

fn scope_module(
    scope: Option<&Expression>,
    universe: &Universe,
    context: &Context,
) -> Result<Arc<Module>, Return> {
    match scope {
        None => Ok(universe.core.object_class.clone()),
        Some(scope) => match scope.evaluate(universe, context).value()? {
            Value::Module(module) => Ok(module),
            other => Err(universe.raise(
                &universe.core.type_error,
                format!(
                    "{} is not a class/module",
                    primitives::kernel::default_inspect(universe, &other)
                ),
            )),
        },
    }
}

fn definition_parent(
    scope: Option<&Expression>,
    universe: &Universe,
    context: &Context,
) -> Result<Arc<Module>, Return> {
    match scope {
        Some(_) => scope_module(scope, universe, context),
        None => Ok(context.module.clone()),
    }
}

fn evaluate_module_body(
    module: &Arc<Module>,
    body: &Expression,
    universe: &Universe,
    context: &Context,
) -> Return {
    let body_context = Context {
        location: Cell::new(body.location),
        scope: Scope::new(),
        module: module.clone(),
        self_value: Value::Module(module.clone()),
        block: None,
        method: None,
        arguments: None,
        frame: context.frame,
        depth: context.depth,
        locals: Locals::new(context.thread().clone()),
    };
    body.evaluate(universe, &body_context)
}

fn define_method(definition: &Arc<MethodDef>, universe: &Universe, context: &Context) -> Return {
    if definition.singleton {
        return match &context.self_value {
            Value::Module(module) => {
                module.define_class_method(
                    Method::defined(definition.clone(), Visibility::Public).held_by(module),
                );
                Return::Local(universe.symbol(&definition.name))
            }
            other => universe.raise(
                &universe.core.type_error,
                format!(
                    "can't define singleton method '{}' for {}",
                    definition.name,
                    universe.describe_receiver(other)
                ),
            ),
        };
    }

    let module = context.module.clone();
    let visibility = if definition.name == "initialize" || context.self_value.identical(&universe.main) {
        Visibility::Private
    } else {
        context.locals.visibility()
    };
    module.define_method(Method::defined(definition.clone(), visibility).held_by(&module));
    Return::Local(universe.symbol(&definition.name))
}

fn evaluate_call(
    call: &MethodCall,
    location: Location,
    universe: &Universe,
    context: &Context,
) -> Return {
    let (receiver, implicit) = match &call.receiver {
        None => (context.self_value.clone(), true),
        Some(receiver) => {
            let implicit = matches!(receiver.kind, ExpressionKind::SelfRef);
            (propagate!(receiver.evaluate(universe, context)), implicit)
        }
    };
    if call.safe_navigation && receiver.is_nil() {
        return Return::Local(Value::Nil);
    }

    let (args, passed) = propagate!(evaluate_arguments(&call.arguments, universe, context));
    let literal = call
        .block
        .as_ref()
        .map(|definition| make_proc(universe, context, definition.clone(), false));
    if literal.is_some() && passed.is_some() {
        universe.warn(
            location,
            format!(
                "both a block argument and a literal block were given to '{}'; the literal block wins",
                call.name
            ),
        );
    }
    let block = literal.clone().or(passed);

    context.location.set(location);
    let output = call_method(universe, context, receiver, &call.name, args, block, implicit);
    catch_break(output, literal.as_ref())
}

/// Intercept a `break` that escaped the literal block attached to a call.
fn catch_break(output: Return, literal: Option<&Arc<Proc>>) -> Return {
    match (output, literal) {
        (Return::Signal(Signal::Break { value, tag: Some(tag) }), Some(literal)) if tag == literal.id => {
            Return::Local(value)
        }
        (output, _) => output,
    }
}

fn evaluate_super(
    arguments: Option<&[Expression]>,
    block: Option<&Arc<BlockDef>>,
    location: Location,
    universe: &Universe,
    context: &Context,
) -> Return {
    let method = match super_method(universe, context) {
        Ok(method) => method,
        Err(ret) => return ret,
    };

    let (args, passed) = match arguments {
        Some(arguments) => propagate!(evaluate_arguments(arguments, universe, context)),
        None => (
            context
                .arguments
                .as_ref()
                .map(|args| args.as_ref().clone())
                .unwrap_or_default(),
            None,
        ),
    };
    let literal = block.map(|definition| make_proc(universe, context, definition.clone(), false));
    let block = literal
        .clone()
        .or(passed)
        .or_else(|| context.block.clone());

    context.location.set(location);
    let output = invokable::invoke(
        universe,
        context,
        &method,
        context.self_value.clone(),
        args,
        block,
    );
    catch_break(output, literal.as_ref())
}

fn super_method(universe: &Universe, context: &Context) -> Result<Arc<Method>, Return> {
    let current = match &context.method {
        Some(method) => method.clone(),
        None => {
            return Err(universe.raise(
                &universe.core.runtime_error,
                "super called outside of method",
            ))
        }
    };
    let superclass = current
        .holder()
        .and_then(|holder| holder.superclass.clone());
    let found = match (&superclass, current.singleton) {
        (Some(superclass), true) => superclass
            .lookup_class_method(current.name())
            .or_else(|| universe.core.class_class.lookup_method(current.name())),
        (None, true) => universe.core.class_class.lookup_method(current.name()),
        (Some(superclass), false) => superclass.lookup_method(current.name()),
        (None, false) => None,
    };
    found.ok_or_else(|| {
        universe.raise(
            &universe.core.no_method_error,
            format!(
                "super: no superclass method '{}' for {}",
                current.name(),
                universe.describe_receiver(&context.self_value)
            ),
        )
    })
}

/// Create a closure capturing the given context.
pub fn make_proc(
    universe: &Universe,
    context: &Context,
    definition: Arc<BlockDef>,
    lambda: bool,
) -> Arc<Proc> {
    Arc::new(Proc {
        id: universe.next_id(),
        method: Arc::new(Method::block(definition)),
        scope: context.scope.clone(),
        self_value: context.self_value.clone(),
        module: context.module.clone(),
        lambda,
        frame: context.frame,
        outer_block: context.block.clone(),
        outer_method: context.method.clone(),
        outer_arguments: context.arguments.clone(),
    })
}

/// Create a closure calling the named method on its first argument (`Symbol#to_proc`).
pub fn symbol_proc(universe: &Universe, name: &str) -> Arc<Proc> {
    let method = Method {
        name: name.to_string(),
        visibility: Visibility::Public,
        arity: Arity { min: 1, max: None },
        kind: MethodKind::Send(name.to_string()),
        holder: Default::default(),
        singleton: false,
    };
    Arc::new(Proc {
        id: universe.next_id(),
        method: Arc::new(method),
        scope: Scope::new(),
        self_value: Value::Nil,
        module: universe.core.object_class.clone(),
        lambda: true,
        frame: 0,
        outer_block: None,
        outer_method: None,
        outer_arguments: None,
    })
}

/// Convert a value passed with `&` into a block.
pub fn to_block(universe: &Universe, context: &Context, value: Value) -> Result<Option<Arc<Proc>>, Return> {
    if value.is_nil() {
        return Ok(None);
    }
    if let Some(proc) = as_proc(&value) {
        return Ok(Some(proc));
    }
    if let Value::Symbol(symbol) = &value {
        return Ok(Some(symbol_proc(universe, symbol.as_str())));
    }
    let converted = call(universe, context, value.clone(), "to_proc", Vec::new()).value()?;
    match as_proc(&converted) {
        Some(proc) => Ok(Some(proc)),
        None => Err(universe.raise(
            &universe.core.type_error,
            format!(
                "wrong argument type {} (expected Proc)",
                value.class(universe).name()
            ),
        )),
    }
}

/// Evaluate a list of expressions, expanding splats.
pub fn evaluate_list(
    items: &[Expression],
    universe: &Universe,
    context: &Context,
) -> Result<Vec<Value>, Return> {
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match &item.kind {
            ExpressionKind::Splat(operand) => {
                let value = operand.evaluate(universe, context).value()?;
                values.extend(splat(universe, context, value)?);
            }
            _ => values.push(item.evaluate(universe, context).value()?),
        }
    }
    Ok(values)
}

fn splat(universe: &Universe, context: &Context, value: Value) -> Result<Vec<Value>, Return> {
    if let Some(values) = value.as_array() {
        return Ok(values);
    }
    match &value {
        Value::Nil => Ok(Vec::new()),
        Value::Object(object)
            if matches!(&*object.payload(), Payload::Hash(_) | Payload::Range(_)) =>
        {
            primitives::enumerable::elements(universe, context, &value)
        }
        _ => Ok(vec![value]),
    }
}

/// Evaluate call arguments: splats are expanded, key/value pairs gathered into a trailing hash,
/// and a `&block` argument is converted into a block.
pub fn evaluate_arguments(
    arguments: &[Expression],
    universe: &Universe,
    context: &Context,
) -> Result<(Vec<Value>, Option<Arc<Proc>>), Return> {
    let mut values = Vec::with_capacity(arguments.len());
    let mut options: Option<HashTable> = None;
    let mut block = None;
    for argument in arguments {
        match &argument.kind {
            ExpressionKind::Splat(operand) => {
                let value = operand.evaluate(universe, context).value()?;
                values.extend(splat(universe, context, value)?);
            }
            ExpressionKind::KeyValue { .. } | ExpressionKind::DoubleSplat(_) => {
                let table = options.get_or_insert_with(HashTable::new);
                hash_entry(argument, table, universe, context)?;
            }
            ExpressionKind::BlockPass(operand) => {
                let value = operand.evaluate(universe, context).value()?;
                block = to_block(universe, context, value)?;
            }
            _ => values.push(argument.evaluate(universe, context).value()?),
        }
    }
    if let Some(table) = options {
        values.push(universe.hash(table));
    }
    Ok((values, block))
}

fn hash_entry(
    entry: &Expression,
    table: &mut HashTable,
    universe: &Universe,
    context: &Context,
) -> Result<(), Return> {
    match &entry.kind {
        ExpressionKind::KeyValue { key, value } => {
            let key = key.evaluate(universe, context).value()?;
            let key = match key.as_string() {
                Some(text) => universe.string(text),
                None => key,
            };
            let value = value.evaluate(universe, context).value()?;
            table.insert(key, value);
        }
        ExpressionKind::DoubleSplat(operand) => {
            let value = operand.evaluate(universe, context).value()?;
            let pairs = match value.as_object().map(|object| match &*object.payload() {
                Payload::Hash(other) => Some(other.pairs()),
                _ => None,
            }) {
                Some(Some(pairs)) => pairs,
                _ if value.is_nil() => Vec::new(),
                _ => {
                    return Err(universe.raise(
                        &universe.core.type_error,
                        format!(
                            "no implicit conversion of {} into Hash",
                            value.class(universe).name()
                        ),
                    ))
                }
            };
            for (key, value) in pairs {
                table.insert(key, value);
            }
        }
        _ => {
            let value = entry.evaluate(universe, context).value()?;
            return Err(universe.raise(
                &universe.core.type_error,
                format!(
                    "expected a key/value pair in a hash literal, got {}",
                    value.class(universe).name()
                ),
            ));
        }
    }
    Ok(())
}

/// Convert a value into a string for interpolation (`to_s`).
pub fn stringify(universe: &Universe, context: &Context, value: &Value) -> Result<String, Return> {
    match value {
        Value::Nil => return Ok(String::new()),
        Value::Integer(value) => return Ok(value.to_string()),
        Value::Symbol(symbol) => return Ok(symbol.to_string()),
        Value::Object(_) => {
            if let Some(text) = value.as_string() {
                return Ok(text);
            }
        }
        _ => {}
    }
    let rendered = call(universe, context, value.clone(), "to_s", Vec::new()).value()?;
    Ok(rendered
        .as_string()
        .unwrap_or_else(|| primitives::kernel::default_to_s(universe, value)))
}

fn assign(target: &AssignTarget, value: Value, universe: &Universe, context: &Context) -> Result<(), Return> {
    match target {
        AssignTarget::Identifier(name) => context.scope.assign(name, value),
        AssignTarget::InstanceVariable(name) => {
            universe.set_instance_variable(&context.self_value, name, value)
        }
        AssignTarget::ClassVariable(name) => {
            class_variable_holder(universe, context).set_class_variable(name, value)
        }
        AssignTarget::Global(name) => universe.set_global(name, value),
        AssignTarget::Constant { scope, name } => {
            let module = definition_parent(scope.as_deref(), universe, context)?;
            if module.set_constant(name, value) {
                universe.warn(
                    context.location(),
                    format!("already initialized constant {}", name),
                );
            }
        }
        AssignTarget::Index {
            receiver,
            arguments,
        } => {
            let implicit = matches!(receiver.kind, ExpressionKind::SelfRef);
            let receiver = receiver.evaluate(universe, context).value()?;
            let mut args = evaluate_list(arguments, universe, context)?;
            args.push(value);
            call_method(universe, context, receiver, "[]=", args, None, implicit).value()?;
        }
        AssignTarget::Attribute {
            receiver,
            name,
            safe_navigation,
        } => {
            let implicit = matches!(receiver.kind, ExpressionKind::SelfRef);
            let receiver = receiver.evaluate(universe, context).value()?;
            if *safe_navigation && receiver.is_nil() {
                return Ok(());
            }
            let setter = format!("{}=", name);
            call_method(universe, context, receiver, &setter, vec![value], None, implicit).value()?;
        }
        AssignTarget::Splat(inner) => {
            let values = value.as_array().unwrap_or_else(|| vec![value]);
            assign(inner, universe.array(values), universe, context)?;
        }
        AssignTarget::Nested(targets) => {
            let items = value.as_array().unwrap_or_else(|| vec![value]);
            destructure(targets, items, universe, context)?;
        }
    }
    Ok(())
}

fn destructure(
    targets: &[AssignTarget],
    items: Vec<Value>,
    universe: &Universe,
    context: &Context,
) -> Result<(), Return> {
    let splat = targets
        .iter()
        .position(|target| matches!(target, AssignTarget::Splat(_)));
    match splat {
        None => {
            let mut items = items.into_iter();
            for target in targets {
                assign(target, items.next().unwrap_or(Value::Nil), universe, context)?;
            }
        }
        Some(position) => {
            let after = targets.len() - position - 1;
            let mut items = items;
            let tail_start = items.len().saturating_sub(after).max(position.min(items.len()));
            let tail = items.split_off(tail_start);
            let middle = if items.len() > position {
                items.split_off(position)
            } else {
                Vec::new()
            };
            let mut head = items.into_iter();
            for target in &targets[..position] {
                assign(target, head.next().unwrap_or(Value::Nil), universe, context)?;
            }
            if let AssignTarget::Splat(inner) = &targets[position] {
                assign(inner, universe.array(middle), universe, context)?;
            }
            let mut tail = tail.into_iter();
            for target in &targets[position + 1..] {
                assign(target, tail.next().unwrap_or(Value::Nil), universe, context)?;
            }
        }
    }
    Ok(())
}

fn compound_assignment(
    target: &AssignTarget,
    operator: &str,
    value: &Expression,
    universe: &Universe,
    context: &Context,
) -> Return {
    match target {
        AssignTarget::Index {
            receiver,
            arguments,
        } => {
            let receiver = propagate!(receiver.evaluate(universe, context));
            let args = propagate!(evaluate_list(arguments, universe, context));
            let current = propagate!(call(universe, context, receiver.clone(), "[]", args.clone()));
            let updated = match propagate!(combine(current, operator, value, universe, context)) {
                Combined::Unchanged(current) => return Return::Local(current),
                Combined::Updated(updated) => updated,
            };
            let mut args = args;
            args.push(updated.clone());
            propagate!(call(universe, context, receiver, "[]=", args));
            Return::Local(updated)
        }
        AssignTarget::Attribute {
            receiver,
            name,
            safe_navigation,
        } => {
            let receiver = propagate!(receiver.evaluate(universe, context));
            if *safe_navigation && receiver.is_nil() {
                return Return::Local(Value::Nil);
            }
            let current = propagate!(call(universe, context, receiver.clone(), name, Vec::new()));
            let updated = match propagate!(combine(current, operator, value, universe, context)) {
                Combined::Unchanged(current) => return Return::Local(current),
                Combined::Updated(updated) => updated,
            };
            let setter = format!("{}=", name);
            propagate!(call(universe, context, receiver, &setter, vec![updated.clone()]));
            Return::Local(updated)
        }
        target => {
            let current = match target {
                AssignTarget::Identifier(name) => context.scope.lookup(name).unwrap_or(Value::Nil),
                AssignTarget::InstanceVariable(name) => {
                    universe.get_instance_variable(&context.self_value, name)
                }
                AssignTarget::ClassVariable(name) => class_variable_holder(universe, context)
                    .lookup_class_variable(name)
                    .unwrap_or(Value::Nil),
                AssignTarget::Global(name) => universe.get_global(name),
                AssignTarget::Constant { scope: None, name } => {
                    universe.resolve_constant(context, name).unwrap_or(Value::Nil)
                }
                AssignTarget::Constant {
                    scope: Some(scope),
                    name,
                } => {
                    let module = propagate!(scope_module(Some(scope), universe, context));
                    module.lookup_constant(name).unwrap_or(Value::Nil)
                }
                _ => Value::Nil,
            };
            let updated = match propagate!(combine(current, operator, value, universe, context)) {
                Combined::Unchanged(current) => return Return::Local(current),
                Combined::Updated(updated) => updated,
            };
            propagate!(assign(target, updated.clone(), universe, context));
            Return::Local(updated)
        }
    }
}

enum Combined {
    Unchanged(Value),
    Updated(Value),
}

fn combine(
    current: Value,
    operator: &str,
    value: &Expression,
    universe: &Universe,
    context: &Context,
) -> Result<Combined, Return> {
    match operator {
        "||" if current.is_truthy() => Ok(Combined::Unchanged(current)),
        "&&" if !current.is_truthy() => Ok(Combined::Unchanged(current)),
        "||" | "&&" => Ok(Combined::Updated(value.evaluate(universe, context).value()?)),
        operator => {
            let value = value.evaluate(universe, context).value()?;
            let updated = call_method(universe, context, current, operator, vec![value], None, false).value()?;
            Ok(Combined::Updated(updated))
        }
    }
}

fn evaluate_begin(begin: &ast::Begin, universe: &Universe, context: &Context) -> Return {
    loop {
        let outcome = match begin.body.evaluate(universe, context) {
            Return::Raise(exception) if !begin.rescues.is_empty() => {
                match rescue(begin, exception, universe, context) {
                    Return::Signal(Signal::Retry) => continue,
                    outcome => outcome,
                }
            }
            Return::Local(value) => match &begin.else_branch {
                Some(branch) => branch.evaluate(universe, context),
                None => Return::Local(value),
            },
            outcome => outcome,
        };

        if let Some(ensure) = &begin.ensure_branch {
            match ensure.evaluate(universe, context) {
                Return::Local(_) => {}
                overriding => return overriding,
            }
        }
        return outcome;
    }
}

fn rescue(begin: &ast::Begin, exception: Value, universe: &Universe, context: &Context) -> Return {
    let class = exception.class(universe);
    for clause in &begin.rescues {
        let matched = if clause.classes.is_empty() {
            class.is_subclass_of(&universe.core.standard_error)
        } else {
            let candidates = match evaluate_list(&clause.classes, universe, context) {
                Ok(candidates) => candidates,
                Err(ret) => return ret,
            };
            let mut matched = false;
            for candidate in candidates {
                match candidate {
                    Value::Module(candidate) => {
                        if class.is_subclass_of(&candidate) {
                            matched = true;
                            break;
                        }
                    }
                    _ => {
                        return universe.raise(
                            &universe.core.type_error,
                            "class or module required for rescue clause",
                        )
                    }
                }
            }
            matched
        };
        if matched {
            if let Some(variable) = &clause.variable {
                context.scope.assign(variable, exception.clone());
            }
            universe.set_global("$!", exception);
            return clause.body.evaluate(universe, context);
        }
    }
    Return::Raise(exception)
}

fn defined(operand: &Expression, universe: &Universe, context: &Context) -> Return {
    let description = match &operand.kind {
        ExpressionKind::Identifier(name) => {
            if context.scope.contains(name) {
                Some("local-variable")
            } else if universe.responds_to(&context.self_value, name, true) {
                Some("method")
            } else {
                None
            }
        }
        ExpressionKind::Constant(name) => universe
            .resolve_constant(context, name)
            .map(|_| "constant"),
        ExpressionKind::ConstantPath { .. } => match operand.evaluate(universe, context) {
            Return::Local(_) => Some("constant"),
            _ => None,
        },
        ExpressionKind::InstanceVariable(name) => {
            if universe.has_instance_variable(&context.self_value, name) {
                Some("instance-variable")
            } else {
                None
            }
        }
        ExpressionKind::ClassVariable(name) => class_variable_holder(universe, context)
            .lookup_class_variable(name)
            .map(|_| "class variable"),
        ExpressionKind::Global(name) => {
            if crate::read(&universe.globals).contains_key(name) {
                Some("global-variable")
            } else {
                None
            }
        }
        ExpressionKind::MethodCall(call) => match &call.receiver {
            None => {
                if universe.responds_to(&context.self_value, &call.name, true) {
                    Some("method")
                } else {
                    None
                }
            }
            Some(receiver) => match receiver.evaluate(universe, context) {
                Return::Local(receiver) if universe.responds_to(&receiver, &call.name, false) => {
                    Some("method")
                }
                _ => None,
            },
        },
        ExpressionKind::Yield(_) => context.block.as_ref().map(|_| "yield"),
        ExpressionKind::Super { .. } => super_method(universe, context).ok().map(|_| "super"),
        ExpressionKind::SelfRef => Some("self"),
        ExpressionKind::Nil => Some("expression"),
        ExpressionKind::True | ExpressionKind::False => Some("expression"),
        ExpressionKind::Assignment { .. }
        | ExpressionKind::CompoundAssignment { .. }
        | ExpressionKind::MultiAssignment { .. } => Some("assignment"),
        _ => Some("expression"),
    };
    Return::Local(match description {
        Some(description) => universe.string(description),
        None => Value::Nil,
    })
}
