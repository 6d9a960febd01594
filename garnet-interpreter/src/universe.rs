use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand::SeedableRng;

use garnet_core::Location;

use crate::block::Proc;
use crate::class::{Module, ModuleKind};
use crate::config::{Config, Console};
use crate::frame::Context;
use crate::instance::{HashTable, Object, Payload, Range};
use crate::interner::SymbolTable;
use crate::interop::{DefaultAdapter, HostAdapter};
use crate::invokable::Return;
use crate::method::{Method, Visibility};
use crate::primitives;
use crate::value::Value;
use crate::{read, write};

/// The core classes of the Garnet interpreter.
///
/// This struct allows to always keep a reference to important classes,
/// even in case of modifications to global bindings by user-defined code.
#[derive(Debug)]
pub struct CoreClasses {
    /// The **Object** class.
    pub object_class: Arc<Module>,
    /// The **Module** class.
    pub module_class: Arc<Module>,
    /// The **Class** class.
    pub class_class: Arc<Module>,

    /// The **NilClass** class.
    pub nil_class: Arc<Module>,
    /// The **TrueClass** class.
    pub true_class: Arc<Module>,
    /// The **FalseClass** class.
    pub false_class: Arc<Module>,
    /// The **Numeric** class.
    pub numeric_class: Arc<Module>,
    /// The **Integer** class.
    pub integer_class: Arc<Module>,
    /// The **Float** class.
    pub float_class: Arc<Module>,
    /// The **Symbol** class.
    pub symbol_class: Arc<Module>,
    /// The **String** class.
    pub string_class: Arc<Module>,
    /// The **Array** class.
    pub array_class: Arc<Module>,
    /// The **Hash** class.
    pub hash_class: Arc<Module>,
    /// The **Range** class.
    pub range_class: Arc<Module>,
    /// The **Proc** class.
    pub proc_class: Arc<Module>,
    /// The **Thread** class.
    pub thread_class: Arc<Module>,
    /// The **WeakRef** class.
    pub weakref_class: Arc<Module>,
    /// The **Time** class.
    pub time_class: Arc<Module>,
    /// The **Math** module.
    pub math_module: Arc<Module>,
    /// The **File** class (not reachable by name in sandboxed universes).
    pub file_class: Arc<Module>,

    /// The **Exception** class.
    pub exception: Arc<Module>,
    /// The **StandardError** class.
    pub standard_error: Arc<Module>,
    /// The **RuntimeError** class.
    pub runtime_error: Arc<Module>,
    /// The **NameError** class.
    pub name_error: Arc<Module>,
    /// The **NoMethodError** class.
    pub no_method_error: Arc<Module>,
    /// The **ArgumentError** class.
    pub argument_error: Arc<Module>,
    /// The **TypeError** class.
    pub type_error: Arc<Module>,
    /// The **ZeroDivisionError** class.
    pub zero_division_error: Arc<Module>,
    /// The **IndexError** class.
    pub index_error: Arc<Module>,
    /// The **KeyError** class.
    pub key_error: Arc<Module>,
    /// The **StopIteration** class.
    pub stop_iteration: Arc<Module>,
    /// The **RangeError** class.
    pub range_error: Arc<Module>,
    /// The **FloatDomainError** class.
    pub float_domain_error: Arc<Module>,
    /// The **ThreadError** class.
    pub thread_error: Arc<Module>,
    /// The **UncaughtThrowError** class.
    pub uncaught_throw_error: Arc<Module>,
    /// The **LocalJumpError** class.
    pub local_jump_error: Arc<Module>,
    /// The **IOError** class.
    pub io_error: Arc<Module>,
}

/// The central data structure for the interpreter.
///
/// It holds everything shared by every worker: the class graph, the global tables and the configuration.
pub struct Universe {
    /// The interpreter's core classes.
    pub core: CoreClasses,
    /// The global variables.
    pub globals: RwLock<IndexMap<String, Value>>,
    /// The symbol table.
    pub symbols: SymbolTable,
    /// The top-level `self`.
    pub main: Value,
    /// The configuration this universe was created with.
    pub config: Config,
    /// The host interop adapter.
    pub adapter: Box<dyn HostAdapter>,
    ids: AtomicU64,
    frames: AtomicU64,
    rng: Mutex<(StdRng, u64)>,
    this: Weak<Universe>,
}

impl Universe {
    /// Initialize the universe with the given configuration and the default interop adapter.
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_adapter(config, Box::new(DefaultAdapter))
    }

    /// Initialize the universe with the given configuration and interop adapter.
    pub fn with_adapter(config: Config, adapter: Box<dyn HostAdapter>) -> Arc<Self> {
        let ids = AtomicU64::new(1);
        let next = || ids.fetch_add(1, Ordering::SeqCst) * 8 + 16;

        let object_class = Module::new(next(), "Object", ModuleKind::Class, None, None);
        let class = |name: &str, superclass: &Arc<Module>| {
            Module::new(
                next(),
                name,
                ModuleKind::Class,
                Some(superclass.clone()),
                Some(&object_class),
            )
        };

        let module_class = class("Module", &object_class);
        let class_class = class("Class", &module_class);
        let numeric_class = class("Numeric", &object_class);
        let exception = class("Exception", &object_class);
        let standard_error = class("StandardError", &exception);
        let name_error = class("NameError", &standard_error);
        let argument_error = class("ArgumentError", &standard_error);
        let index_error = class("IndexError", &standard_error);
        let range_error = class("RangeError", &standard_error);

        let core = CoreClasses {
            nil_class: class("NilClass", &object_class),
            true_class: class("TrueClass", &object_class),
            false_class: class("FalseClass", &object_class),
            integer_class: class("Integer", &numeric_class),
            float_class: class("Float", &numeric_class),
            symbol_class: class("Symbol", &object_class),
            string_class: class("String", &object_class),
            array_class: class("Array", &object_class),
            hash_class: class("Hash", &object_class),
            range_class: class("Range", &object_class),
            proc_class: class("Proc", &object_class),
            thread_class: class("Thread", &object_class),
            weakref_class: class("WeakRef", &object_class),
            time_class: class("Time", &object_class),
            math_module: Module::new(next(), "Math", ModuleKind::Module, None, Some(&object_class)),
            file_class: class("File", &object_class),

            runtime_error: class("RuntimeError", &standard_error),
            no_method_error: class("NoMethodError", &name_error),
            type_error: class("TypeError", &standard_error),
            zero_division_error: class("ZeroDivisionError", &standard_error),
            key_error: class("KeyError", &index_error),
            stop_iteration: class("StopIteration", &index_error),
            float_domain_error: class("FloatDomainError", &range_error),
            thread_error: class("ThreadError", &standard_error),
            uncaught_throw_error: class("UncaughtThrowError", &argument_error),
            local_jump_error: class("LocalJumpError", &standard_error),
            io_error: class("IOError", &standard_error),
            name_error,
            argument_error,
            index_error,
            range_error,
            standard_error,
            exception,
            numeric_class,
            class_class,
            module_class,
            object_class,
        };

        let main = Value::Object(Arc::new(Object::new(
            next(),
            core.object_class.clone(),
            Payload::Plain,
        )));
        let seed = rand::random::<u64>();
        let symbols = SymbolTable::new(config.mortal_symbol_capacity);
        let next_id = ids.load(Ordering::SeqCst);

        let universe = Arc::new_cyclic(|this| Self {
            core,
            globals: RwLock::new(IndexMap::new()),
            symbols,
            main,
            config,
            adapter,
            ids: AtomicU64::new(next_id),
            frames: AtomicU64::new(1),
            rng: Mutex::new((StdRng::seed_from_u64(seed), seed)),
            this: this.clone(),
        });
        universe.install_core();
        universe
    }

    fn install_core(&self) {
        let core = &self.core;
        let sandboxed = ["File"];
        let classes = [
            &core.object_class,
            &core.module_class,
            &core.class_class,
            &core.nil_class,
            &core.true_class,
            &core.false_class,
            &core.numeric_class,
            &core.integer_class,
            &core.float_class,
            &core.symbol_class,
            &core.string_class,
            &core.array_class,
            &core.hash_class,
            &core.range_class,
            &core.proc_class,
            &core.thread_class,
            &core.weakref_class,
            &core.time_class,
            &core.math_module,
            &core.file_class,
            &core.exception,
            &core.standard_error,
            &core.runtime_error,
            &core.name_error,
            &core.no_method_error,
            &core.argument_error,
            &core.type_error,
            &core.zero_division_error,
            &core.index_error,
            &core.key_error,
            &core.stop_iteration,
            &core.range_error,
            &core.float_domain_error,
            &core.thread_error,
            &core.uncaught_throw_error,
            &core.local_jump_error,
            &core.io_error,
        ];

        for class in classes.iter() {
            if self.config.sandbox && sandboxed.contains(&class.name()) {
                log::debug!("sandbox: leaving out {}", class.name());
                continue;
            }
            let tables = [
                primitives::get_shared_primitives(class.name()),
                primitives::get_instance_primitives(class.name()),
            ];
            for table in tables.iter().flatten() {
                for &(name, function, public) in table.iter() {
                    self.symbols.intern(name);
                    class.define_method(Method::native(name, function, public).held_by(class));
                }
            }
            if let Some(table) = primitives::get_class_primitives(class.name()) {
                for &(name, function, public) in table {
                    self.symbols.intern(name);
                    let mut method = Method::native(name, function, public).held_by(class);
                    method.singleton = true;
                    class.define_class_method(method);
                }
            }
            core.object_class
                .set_constant(class.name(), Value::Module((*class).clone()));
        }

        core.math_module
            .set_constant("PI", Value::Float(std::f64::consts::PI));
        core.math_module
            .set_constant("E", Value::Float(std::f64::consts::E));
        core.float_class
            .set_constant("INFINITY", Value::Float(f64::INFINITY));
        core.float_class.set_constant("NAN", Value::Float(f64::NAN));
        core.integer_class
            .set_constant("MAX", Value::Integer(i64::MAX));
        core.object_class.set_constant("ARGV", self.array(Vec::new()));
    }

    /// Get a strong handle to this universe (to share it with a new worker).
    pub fn handle(&self) -> Option<Arc<Universe>> {
        self.this.upgrade()
    }

    /// Get a fresh object identity.
    pub fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::SeqCst) * 8 + 16
    }

    /// Get a fresh method frame identity.
    pub fn next_frame(&self) -> u64 {
        self.frames.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the console sink.
    pub fn console(&self) -> &dyn Console {
        self.config.console.as_ref()
    }

    /// Render a location according to the configuration.
    pub fn render_location(&self, location: Location) -> String {
        location.describe(self.config.location_detail)
    }

    /// Report a warning through the console (and the log facade).
    pub fn warn(&self, location: Location, message: impl AsRef<str>) {
        let text = format!(
            "{}: warning: {}",
            self.render_location(location),
            message.as_ref()
        );
        log::warn!("{}", text);
        self.console().write_line(&text);
    }

    /// Run something with the random number generator, reseedable by `srand`.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut guard = self.lock_rng();
        f(&mut guard.0)
    }

    /// Reseed the random number generator, returning the previous seed.
    pub fn reseed(&self, seed: u64) -> u64 {
        let mut guard = self.lock_rng();
        let previous = guard.1;
        *guard = (StdRng::seed_from_u64(seed), seed);
        previous
    }

    fn lock_rng(&self) -> MutexGuard<'_, (StdRng, u64)> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Search for a method on a receiver.
    ///
    /// For modules and classes, their class-method chain is searched first, then the instance
    /// methods of **Class** (or **Module**).
    pub fn lookup_method(&self, receiver: &Value, name: &str) -> Option<Arc<Method>> {
        match receiver {
            Value::Module(module) => module
                .lookup_class_method(name)
                .or_else(|| receiver.class(self).lookup_method(name)),
            receiver => receiver.class(self).lookup_method(name),
        }
    }

    /// Whether a receiver responds to a method.
    pub fn responds_to(&self, receiver: &Value, name: &str, include_private: bool) -> bool {
        match self.lookup_method(receiver, name) {
            Some(method) => include_private || method.visibility != Visibility::Private,
            None => false,
        }
    }

    /// Describe a receiver for error messages (eg. `an instance of Counter`).
    pub fn describe_receiver(&self, receiver: &Value) -> String {
        match receiver {
            Value::Nil => String::from("nil"),
            Value::Boolean(value) => value.to_string(),
            Value::Module(module) if module.is_class() => format!("class {}", module.name()),
            Value::Module(module) => format!("module {}", module.name()),
            receiver if receiver.identical(&self.main) => String::from("main:Object"),
            receiver => format!("an instance of {}", receiver.class(self).name()),
        }
    }

    /// Resolve a constant from a context: lexically enclosing modules first, then ancestors.
    pub fn resolve_constant(&self, context: &Context, name: &str) -> Option<Value> {
        let mut current = Some(context.module.clone());
        while let Some(module) = current {
            if let Some(value) = module.get_constant(name) {
                return Some(value);
            }
            current = module.parent();
        }
        context
            .module
            .lookup_constant(name)
            .or_else(|| self.core.object_class.get_constant(name))
    }

    /// Create a new module or class, registered as a constant of its lexical parent.
    pub fn define_module(
        &self,
        parent: &Arc<Module>,
        name: &str,
        kind: ModuleKind,
        superclass: Option<Arc<Module>>,
    ) -> Arc<Module> {
        let qualified = if Arc::ptr_eq(parent, &self.core.object_class) {
            name.to_string()
        } else {
            format!("{}::{}", parent.name(), name)
        };
        let module = Module::new(self.next_id(), qualified, kind, superclass, Some(parent));
        parent.set_constant(name, Value::Module(module.clone()));
        log::debug!("created {:?}", module);
        module
    }

    /// Get a global variable (`nil` when unset).
    pub fn get_global(&self, name: &str) -> Value {
        read(&self.globals).get(name).cloned().unwrap_or(Value::Nil)
    }

    /// Set a global variable.
    pub fn set_global(&self, name: &str, value: Value) {
        write(&self.globals).insert(name.to_string(), value);
    }

    /// Get an instance variable of any value (`nil` when unset).
    pub fn get_instance_variable(&self, receiver: &Value, name: &str) -> Value {
        match receiver {
            Value::Object(object) => object.get_field(name),
            Value::Module(module) => module.get_instance_variable(name),
            _ => None,
        }
        .unwrap_or(Value::Nil)
    }

    /// Whether an instance variable of a value is set.
    pub fn has_instance_variable(&self, receiver: &Value, name: &str) -> bool {
        match receiver {
            Value::Object(object) => object.get_field(name).is_some(),
            Value::Module(module) => module.get_instance_variable(name).is_some(),
            _ => false,
        }
    }

    /// Set an instance variable of a value (immediates silently have none).
    pub fn set_instance_variable(&self, receiver: &Value, name: &str, value: Value) {
        match receiver {
            Value::Object(object) => object.set_field(name, value),
            Value::Module(module) => module.set_instance_variable(name, value),
            _ => {}
        }
    }

    /// Get an immortal symbol.
    pub fn symbol(&self, name: &str) -> Value {
        Value::Symbol(self.symbols.intern(name))
    }

    /// Get a symbol created at runtime.
    pub fn mortal_symbol(&self, name: &str) -> Value {
        Value::Symbol(self.symbols.intern_mortal(name))
    }

    /// Allocate a new object.
    pub fn new_object(&self, class: Arc<Module>, payload: Payload) -> Value {
        Value::Object(Arc::new(Object::new(self.next_id(), class, payload)))
    }

    /// Allocate the payload a fresh instance of a class starts with.
    pub fn allocate(&self, class: Arc<Module>) -> Value {
        let core = &self.core;
        let payload = if class.is_subclass_of(&core.exception) {
            Payload::Exception(None)
        } else if class.is_subclass_of(&core.string_class) {
            Payload::String(String::new())
        } else if class.is_subclass_of(&core.array_class) {
            Payload::Array(Vec::new())
        } else if class.is_subclass_of(&core.hash_class) {
            Payload::Hash(HashTable::new())
        } else {
            Payload::Plain
        };
        self.new_object(class, payload)
    }

    /// Create a new string.
    pub fn string(&self, value: impl Into<String>) -> Value {
        self.new_object(self.core.string_class.clone(), Payload::String(value.into()))
    }

    /// Create a new array.
    pub fn array(&self, values: Vec<Value>) -> Value {
        self.new_object(self.core.array_class.clone(), Payload::Array(values))
    }

    /// Create a new hash.
    pub fn hash(&self, table: HashTable) -> Value {
        self.new_object(self.core.hash_class.clone(), Payload::Hash(table))
    }

    /// Create a copy of a hash (its entries, not its default).
    pub fn dup_hash(&self, value: &Value) -> Value {
        let entries = value.as_object().and_then(|object| match &*object.payload() {
            Payload::Hash(table) => Some(table.entries.clone()),
            _ => None,
        });
        self.hash(HashTable {
            entries: entries.unwrap_or_default(),
            ..HashTable::default()
        })
    }

    /// Create a new range.
    pub fn range(&self, from: Value, to: Value, exclusive: bool) -> Value {
        self.new_object(
            self.core.range_class.clone(),
            Payload::Range(Range {
                from,
                to,
                exclusive,
            }),
        )
    }

    /// Wrap a closure into a value.
    pub fn proc_value(&self, proc: Arc<Proc>) -> Value {
        self.new_object(self.core.proc_class.clone(), Payload::Proc(proc))
    }

    /// Turn a big integer into a value, demoting it when it fits in 64 bits.
    pub fn integer(&self, value: BigInt) -> Value {
        match value.to_i64() {
            Some(value) => Value::Integer(value),
            None => self.new_object(
                self.core.integer_class.clone(),
                Payload::BigInteger(value),
            ),
        }
    }

    /// Create a new exception of the given class.
    pub fn exception(&self, class: &Arc<Module>, message: impl Into<String>) -> Value {
        let exception = self.new_object(class.clone(), Payload::Exception(None));
        self.set_instance_variable(&exception, "@message", self.string(message));
        exception
    }

    /// Raise a new exception of the given class.
    pub fn raise(&self, class: &Arc<Module>, message: impl Into<String>) -> Return {
        Return::Raise(self.exception(class, message))
    }

    /// Raise a `TypeError` for a primitive receiving a value of the wrong type.
    pub fn wrong_type(&self, signature: &str, value: &Value) -> Return {
        self.raise(
            &self.core.type_error,
            format!(
                "'{}': wrong argument type {}",
                signature,
                value.class(self).name()
            ),
        )
    }

    /// Raise an `ArgumentError` for a primitive missing an argument.
    pub fn missing_argument(&self, signature: &str) -> Return {
        self.raise(
            &self.core.argument_error,
            format!("'{}': missing argument", signature),
        )
    }

    /// Get the message of an exception.
    pub fn exception_message(&self, exception: &Value) -> String {
        match self.get_instance_variable(exception, "@message") {
            Value::Nil => exception.class(self).name().to_string(),
            message => message
                .as_string()
                .unwrap_or_else(|| exception.class(self).name().to_string()),
        }
    }

    /// Get where an exception was raised, if it has been.
    pub fn exception_location(&self, exception: &Value) -> Option<Location> {
        exception
            .as_object()
            .and_then(|object| match &*object.payload() {
                Payload::Exception(location) => *location,
                _ => None,
            })
    }

    /// Record where an exception was raised, unless it already has a location.
    pub fn stamp_exception(&self, exception: &Value, location: Location) {
        if let Some(object) = exception.as_object() {
            if let Payload::Exception(slot @ None) = &mut *object.payload() {
                *slot = Some(location);
            }
        }
    }
}
