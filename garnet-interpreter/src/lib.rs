//!
//! This is the interpreter for the Garnet language.
//!

use std::cell::Cell;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use garnet_core::ast::Program;
use garnet_core::Location;

/// Facilities for manipulating blocks (closures).
pub mod block;
/// Facilities for manipulating classes and modules.
pub mod class;
/// The interpreter's configuration and console sinks.
pub mod config;
/// Errors reported to the host.
pub mod error;
/// Facilities for evaluating nodes of the AST.
pub mod evaluate;
/// Facilities for manipulating call contexts and lexical scopes.
pub mod frame;
/// Facilities for manipulating class instances.
pub mod instance;
/// Facilities for symbol interning.
pub mod interner;
/// Conversions between Garnet values and host values.
pub mod interop;
/// Facilities for invoking methods and blocks.
pub mod invokable;
/// Facilities for manipulating class methods.
pub mod method;
/// Definitions for all supported primitives.
pub mod primitives;
/// Facilities for running guest threads.
pub mod thread;
/// The collection of all known Garnet objects during execution.
pub mod universe;
/// Facilities for manipulating values.
pub mod value;

pub use crate::config::{CapturedConsole, Config, Console, StdConsole};
pub use crate::error::Error;
pub use crate::frame::Scope;
pub use crate::interop::{DefaultAdapter, HostAdapter, HostType, HostValue};
pub use crate::value::Value;

use crate::evaluate::Evaluate;
use crate::frame::{Context, Locals};
use crate::invokable::{Return, Signal};
use crate::thread::ThreadHandle;
use crate::universe::Universe;

/// Extract the value out of a `Return` (or a `Result<_, Return>`), returning early on anything else.
#[macro_export]
macro_rules! propagate {
    ($expr:expr) => {
        match $crate::invokable::Outcome::into_outcome($expr) {
            Ok(value) => value,
            Err(ret) => return ret.into(),
        }
    };
}

/// Macro for checking and destructuring arguments passed to primitives.
#[macro_export]
macro_rules! expect_args {
    ($universe:expr, $signature:expr, $args:expr, [ $( $ptrn:pat $( => $name:ident )? ),* $(,)? ]) => {
        #[allow(unused_mut)]
        let ($($(mut $name,)?)*) = {
            #[allow(unused_variables, unused_mut)]
            let mut iter = $args.into_iter();
            $(#[allow(unreachable_patterns)]
            $(let $name =)? match iter.next() {
                Some($ptrn) => {$($name)?},
                Some(other) => return $universe.wrong_type($signature, &other).into(),
                None => return $universe.missing_argument($signature).into(),
            };)*
            ($($($name,)?)*)
        };
    };
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The embedding entry point: a universe plus the means to run code in it.
#[derive(Clone)]
pub struct Interpreter {
    universe: Arc<Universe>,
}

impl Interpreter {
    /// Create an interpreter with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            universe: Universe::new(config),
        }
    }

    /// Create an interpreter with the given configuration and host interop adapter.
    pub fn with_adapter(config: Config, adapter: Box<dyn HostAdapter>) -> Self {
        Self {
            universe: Universe::with_adapter(config, adapter),
        }
    }

    /// Get the underlying universe.
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Parse source code into a program.
    pub fn parse(&self, source: &str) -> Result<Program, Error> {
        Ok(garnet_parser::parse(source)?)
    }

    /// Expose a program name and its command-line arguments (`$0`, `$PROGRAM_NAME` and `ARGV`).
    pub fn set_arguments(&self, program: &str, args: &[String]) {
        let universe = &self.universe;
        let name = universe.string(program);
        universe.set_global("$0", name.clone());
        universe.set_global("$PROGRAM_NAME", name);
        let args = args.iter().map(|arg| universe.string(arg.as_str())).collect();
        universe
            .core
            .object_class
            .set_constant("ARGV", universe.array(args));
    }

    /// Run a program against a fresh top-level scope.
    pub fn interpret(&self, program: &Program) -> Result<Value, Error> {
        self.interpret_in(program, &Scope::new())
    }

    /// Run a program against the given top-level scope (eg. to keep variables across REPL entries).
    pub fn interpret_in(&self, program: &Program, scope: &Scope) -> Result<Value, Error> {
        let universe = self.universe.clone();
        let program = program.clone();
        let scope = scope.clone();
        let worker = std::thread::Builder::new()
            .name(String::from("garnet-main"))
            .stack_size(self.universe.config.stack_size)
            .spawn(move || run(&universe, &program, scope))
            .map_err(|err| Error::Internal(format!("could not start the main worker: {}", err)))?;
        worker
            .join()
            .unwrap_or_else(|_| Err(Error::Internal(String::from("the main worker panicked"))))
    }

    /// Parse and run source code against a fresh top-level scope.
    pub fn evaluate(&self, source: &str) -> Result<Value, Error> {
        let program = self.parse(source)?;
        self.interpret(&program)
    }

    /// Run a program on a worker thread.
    pub fn interpret_async(&self, program: Program) -> JoinHandle<Result<Value, Error>> {
        let universe = self.universe.clone();
        let builder = std::thread::Builder::new()
            .name(String::from("garnet-async"))
            .stack_size(self.universe.config.stack_size);
        match builder.spawn(move || run(&universe, &program, Scope::new())) {
            Ok(handle) => handle,
            Err(err) => {
                let message = format!("could not start a worker: {}", err);
                std::thread::spawn(move || Err(Error::Internal(message)))
            }
        }
    }

    /// Parse and run source code on a worker thread.
    pub fn evaluate_async(&self, source: String) -> JoinHandle<Result<Value, Error>> {
        match self.parse(&source) {
            Ok(program) => self.interpret_async(program),
            Err(err) => std::thread::spawn(move || Err(err)),
        }
    }

    /// Render a value the way `p` shows it.
    pub fn inspect(&self, value: &Value) -> Result<String, Error> {
        self.render(value, "inspect")
    }

    /// Render a value the way `puts` shows it.
    pub fn to_s(&self, value: &Value) -> Result<String, Error> {
        self.render(value, "to_s")
    }

    fn render(&self, value: &Value, method: &str) -> Result<String, Error> {
        let universe = &self.universe;
        let context = top_level_context(universe, Scope::new());
        let output = invokable::call(universe, &context, value.clone(), method, Vec::new());
        let rendered = into_result(universe, output)?;
        Ok(rendered
            .as_string()
            .unwrap_or_else(|| primitives::kernel::default_to_s(universe, value)))
    }

    /// Convert a host value into a Garnet value.
    pub fn to_value(&self, value: HostValue) -> Result<Value, Error> {
        self.universe.adapter.to_instance(&self.universe, value)
    }

    /// Convert a Garnet value into a host value of the requested type.
    pub fn to_host_value(&self, value: &Value, target: HostType) -> Result<Option<HostValue>, Error> {
        interop::project(&self.universe, value, target)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Create the context of the top-level of a program.
pub fn top_level_context(universe: &Universe, scope: Scope) -> Context {
    let thread = ThreadHandle::new(universe.next_id());
    Context {
        location: Cell::new(Location::new(1, 1)),
        scope,
        module: universe.core.object_class.clone(),
        self_value: universe.main.clone(),
        block: None,
        method: None,
        arguments: None,
        frame: universe.next_frame(),
        depth: 0,
        locals: Locals::new(thread),
    }
}

fn run(universe: &Universe, program: &Program, scope: Scope) -> Result<Value, Error> {
    let context = top_level_context(universe, scope);
    let output = match program.body.evaluate(universe, &context) {
        Return::Signal(Signal::Return { value, frame }) if frame == context.frame => {
            Return::Local(value)
        }
        output => output,
    };
    context.thread().finish(Return::Local(Value::Nil));
    into_result(universe, output)
}

/// Convert the outcome of a top-level evaluation into a host result.
pub fn into_result(universe: &Universe, output: Return) -> Result<Value, Error> {
    match output {
        Return::Local(value) => Ok(value),
        Return::Raise(exception) => Err(Error::Runtime {
            class: exception.class(universe).name().to_string(),
            message: universe.exception_message(&exception),
            location: universe
                .exception_location(&exception)
                .map(|location| universe.render_location(location)),
        }),
        Return::Signal(signal) => {
            let keyword = match signal {
                Signal::Break { .. } => "break",
                Signal::Next(_) => "next",
                Signal::Redo => "redo",
                Signal::Retry => "retry",
                Signal::Return { .. } => "return",
            };
            Err(Error::Runtime {
                class: universe.core.local_jump_error.name().to_string(),
                message: format!("unexpected {}", keyword),
                location: None,
            })
        }
        Return::Throw { tag, .. } => Err(Error::Runtime {
            class: universe.core.uncaught_throw_error.name().to_string(),
            message: format!("uncaught throw {}", primitives::kernel::default_inspect(universe, &tag)),
            location: None,
        }),
        Return::Fatal(err) => Err(err),
    }
}
