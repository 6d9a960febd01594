use std::sync::Arc;

use crate::block::Proc;
use crate::class::{Module, ModuleKind};
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::{self, as_proc, call_method, Return};
use crate::method::{Method, MethodKind, Visibility};
use crate::primitives::kernel::change_visibility;
use crate::primitives::{self, require_block, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("name", self::name, true),
    ("to_s", self::name, true),
    ("inspect", self::name, true),
    ("===", self::case_eq, true),
    ("==", self::eq, true),
    ("<", self::lt, true),
    ("<=", self::le, true),
    ("ancestors", self::ancestors, true),
    ("instance_methods", self::instance_methods, true),
    ("const_get", self::const_get, true),
    ("class_variable_get", self::class_variable_get, true),
    ("define_method", self::define_method, true),
    ("remove_method", self::remove_method, true),
    ("attr_reader", self::attr_reader, true),
    ("attr_writer", self::attr_writer, true),
    ("attr_accessor", self::attr_accessor, true),
    ("private", self::private, true),
    ("public", self::public, true),
    ("protected", self::protected, true),
];

pub static CLASS_INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("new", self::new, true),
    ("superclass", self::superclass, true),
];

fn name(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#name";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
    ]);

    Return::Local(universe.string(module.name()))
}

fn case_eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#===";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        value => value,
    ]);

    Return::Local(Value::Boolean(value.class(universe).is_subclass_of(&module)))
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#==";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        other => other,
    ]);

    let equal = matches!(other, Value::Module(other) if other.id == module.id);
    Return::Local(Value::Boolean(equal))
}

fn relation(universe: &Universe, args: Vec<Value>, signature: &str, strict: bool, forward: bool) -> Return {
    expect_args!(universe, signature, args, [
        Value::Module(module) => module,
        Value::Module(other) => other,
    ]);

    let (descendant, ancestor) = if forward {
        (&module, &other)
    } else {
        (&other, &module)
    };
    if descendant.is_subclass_of(ancestor) {
        return Return::Local(Value::Boolean(!(strict && descendant.id == ancestor.id)));
    }
    if ancestor.is_subclass_of(descendant) {
        return Return::Local(Value::Boolean(false));
    }
    Return::Local(Value::Nil)
}

fn lt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "Module#<", true, true)
}

fn le(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "Module#<=", false, true)
}

fn ancestors(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#ancestors";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
    ]);

    let ancestors = module.ancestors().into_iter().map(Value::Module).collect();
    Return::Local(universe.array(ancestors))
}

fn instance_methods(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#instance_methods";

    let inherited = args.get(1).map_or(true, Value::is_truthy);
    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
    ]);

    let modules = if inherited {
        module.ancestors()
    } else {
        vec![module]
    };
    let mut names: Vec<String> = Vec::new();
    for module in modules.iter() {
        for (name, method) in crate::read(&module.methods).iter() {
            if method.visibility != Visibility::Private && !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    let names = names.iter().map(|name| universe.symbol(name)).collect();
    Return::Local(universe.array(names))
}

fn const_get(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#const_get";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        name => name,
    ]);

    let name = propagate!(primitives::expect_string(universe, SIGNATURE, &name));
    let mut current = module;
    let mut value = None;
    for segment in name.split("::") {
        value = current
            .lookup_constant(segment)
            .or_else(|| universe.core.object_class.get_constant(segment));
        match &value {
            Some(Value::Module(module)) => current = module.clone(),
            Some(_) => {}
            None => {
                return universe.raise(
                    &universe.core.name_error,
                    format!("uninitialized constant {}", name),
                )
            }
        }
    }
    Return::Local(value.unwrap_or(Value::Nil))
}

fn expect_cvar_name(universe: &Universe, signature: &str, name: &Value) -> Result<String, Return> {
    let name = primitives::expect_string(universe, signature, name)?;
    if !name.starts_with("@@") || name.len() < 3 {
        return Err(universe.raise(
            &universe.core.name_error,
            format!("'{}' is not allowed as a class variable name", name),
        ));
    }
    Ok(name)
}

fn class_variable_get(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#class_variable_get";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        name => name,
    ]);

    let name = propagate!(expect_cvar_name(universe, SIGNATURE, &name));
    match module.lookup_class_variable(&name) {
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

fn evaluate_in(universe: &Universe, context: &Context, module: &Arc<Module>, block: &Proc) -> Return {
    let rebound = Arc::new(Proc {
        self_value: Value::Module(module.clone()),
        module: module.clone(),
        ..block.clone()
    });
    invokable::call_block(universe, context, &rebound, vec![Value::Module(module.clone())])
}

fn define_method(universe: &Universe, _: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#define_method";

    let body = match args.get(2).and_then(as_proc) {
        Some(body) => body,
        None => propagate!(require_block(universe, block, SIGNATURE)),
    };
    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        name => name,
    ]);

    let name = propagate!(primitives::expect_string(universe, SIGNATURE, &name));
    let method = Method {
        name: name.clone(),
        visibility: Visibility::Public,
        arity: body.method.arity,
        kind: MethodKind::Proc(body),
        holder: Arc::downgrade(&module),
        singleton: false,
    };
    module.define_method(method);
    Return::Local(universe.symbol(&name))
}

fn remove_method(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Module#remove_method";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(module) => module,
        name => name,
    ]);

    let name = propagate!(primitives::expect_string(universe, SIGNATURE, &name));
    let removed = crate::write(&module.methods).shift_remove(&name);
    match removed {
        Some(_) => Return::Local(Value::Module(module)),
        None => universe.raise(
            &universe.core.name_error,
            format!("method '{}' not defined in {}", name, module.name()),
        ),
    }
}

fn define_attributes(
    universe: &Universe,
    args: Vec<Value>,
    signature: &str,
    reader: bool,
    writer: bool,
) -> Return {
    let mut args = args.into_iter();
    let module = match args.next() {
        Some(Value::Module(module)) => module,
        Some(other) => return universe.wrong_type(signature, &other),
        None => return universe.missing_argument(signature),
    };
    let mut defined = Vec::new();
    for name in args {
        let name = propagate!(primitives::expect_string(universe, signature, &name));
        let field = format!("@{}", name);
        if reader {
            module.define_method(attribute(&module, &name, MethodKind::AttributeReader(field.clone()), 0));
            defined.push(universe.symbol(&name));
        }
        if writer {
            let setter = format!("{}=", name);
            module.define_method(attribute(&module, &setter, MethodKind::AttributeWriter(field), 1));
            defined.push(universe.symbol(&setter));
        }
    }
    Return::Local(universe.array(defined))
}

fn attribute(module: &Arc<Module>, name: &str, kind: MethodKind, arity: usize) -> Method {
    Method {
        name: name.to_string(),
        visibility: Visibility::Public,
        arity: crate::method::Arity::exact(arity),
        kind,
        holder: Arc::downgrade(module),
        singleton: false,
    }
}

fn attr_reader(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    define_attributes(universe, args, "Module#attr_reader", true, false)
}

fn attr_writer(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    define_attributes(universe, args, "Module#attr_writer", false, true)
}

fn attr_accessor(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    define_attributes(universe, args, "Module#attr_accessor", true, true)
}

pub(crate) fn private(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    change_visibility(universe, context, args, Visibility::Private, "Module#private")
}

pub(crate) fn public(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    change_visibility(universe, context, args, Visibility::Public, "Module#public")
}

pub(crate) fn protected(universe: &Universe, context: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    change_visibility(universe, context, args, Visibility::Protected, "Module#protected")
}

fn new(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Class#new";

    let mut args = args.into_iter();
    let class = match args.next() {
        Some(Value::Module(class)) => class,
        Some(other) => return universe.wrong_type(SIGNATURE, &other),
        None => return universe.missing_argument(SIGNATURE),
    };
    let args: Vec<Value> = args.collect();
    let core = &universe.core;

    if Arc::ptr_eq(&class, &core.class_class) || Arc::ptr_eq(&class, &core.module_class) {
        return anonymous_module(universe, context, &class, args, block);
    }
    if !class.is_class() {
        return universe.raise(
            &core.no_method_error,
            format!("undefined method 'new' for module {}", class.name()),
        );
    }
    let immediate = [
        &core.integer_class,
        &core.float_class,
        &core.symbol_class,
        &core.nil_class,
        &core.true_class,
        &core.false_class,
        &core.numeric_class,
    ];
    if immediate.iter().any(|other| other.id == class.id) {
        return universe.raise(
            &core.no_method_error,
            format!("undefined method 'new' for class {}", class.name()),
        );
    }

    let instance = universe.allocate(class);
    propagate!(call_method(
        universe,
        context,
        instance.clone(),
        "initialize",
        args,
        block,
        true
    ));
    Return::Local(instance)
}

fn anonymous_module(
    universe: &Universe,
    context: &Context,
    kind: &Arc<Module>,
    args: Vec<Value>,
    block: Option<Arc<Proc>>,
) -> Return {
    const SIGNATURE: &str = "Class#new";

    let is_class = Arc::ptr_eq(kind, &universe.core.class_class);
    let superclass = match args.into_iter().next() {
        Some(Value::Module(superclass)) if is_class && superclass.is_class() => Some(superclass),
        Some(other) => return universe.wrong_type(SIGNATURE, &other),
        None if is_class => Some(universe.core.object_class.clone()),
        None => None,
    };
    let id = universe.next_id();
    let (name, module_kind) = if is_class {
        (format!("#<Class:0x{:016x}>", id), ModuleKind::Class)
    } else {
        (format!("#<Module:0x{:016x}>", id), ModuleKind::Module)
    };
    let module = Module::new(id, name, module_kind, superclass, Some(&universe.core.object_class));
    log::debug!("created {:?}", module);
    if let Some(block) = block {
        propagate!(evaluate_in(universe, context, &module, &block));
    }
    Return::Local(Value::Module(module))
}

fn allocate(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Class#allocate";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(class) => class,
    ]);

    Return::Local(universe.allocate(class))
}

fn superclass(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Class#superclass";

    expect_args!(universe, SIGNATURE, args, [
        Value::Module(class) => class,
    ]);

    match &class.superclass {
        Some(superclass) => Return::Local(Value::Module(superclass.clone())),
        None => Return::Local(Value::Nil),
    }
}
