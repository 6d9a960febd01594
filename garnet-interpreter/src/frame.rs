use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;

use garnet_core::Location;

use crate::block::Proc;
use crate::class::Module;
use crate::method::{Method, Visibility};
use crate::thread::ThreadHandle;
use crate::value::Value;
use crate::{read, write};

struct ScopeFrame {
    bindings: RwLock<IndexMap<String, Value>>,
    parent: Option<Scope>,
}

/// A lexical scope: a chain of variable frames, innermost first.
///
/// Blocks extend the scope they were created in; method and class bodies start a fresh chain.
#[derive(Clone)]
pub struct Scope(Arc<ScopeFrame>);

impl Scope {
    /// Create a new, empty, root scope.
    pub fn new() -> Self {
        Self(Arc::new(ScopeFrame {
            bindings: RwLock::new(IndexMap::new()),
            parent: None,
        }))
    }

    /// Create a scope nested in this one.
    pub fn child(&self) -> Self {
        Self(Arc::new(ScopeFrame {
            bindings: RwLock::new(IndexMap::new()),
            parent: Some(self.clone()),
        }))
    }

    /// Search for a local variable, from the innermost frame outwards.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if let Some(value) = read(&scope.0.bindings).get(name) {
                return Some(value.clone());
            }
            current = scope.0.parent.as_ref();
        }
        None
    }

    /// Whether a local variable is bound anywhere in the chain.
    pub fn contains(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(scope) = current {
            if read(&scope.0.bindings).contains_key(name) {
                return true;
            }
            current = scope.0.parent.as_ref();
        }
        false
    }

    /// Assign a local variable to the closest frame that already binds it,
    /// or to the innermost frame if none does.
    pub fn assign(&self, name: &str, value: Value) {
        let mut current = Some(self);
        while let Some(scope) = current {
            let mut bindings = write(&scope.0.bindings);
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return;
            }
            drop(bindings);
            current = scope.0.parent.as_ref();
        }
        self.declare(name, value);
    }

    /// Bind a local variable in the innermost frame (used for parameters).
    pub fn declare(&self, name: &str, value: Value) {
        write(&self.0.bindings).insert(name.to_string(), value);
    }

    /// The names of every variable visible from this scope.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(scope) = current {
            for name in read(&scope.0.bindings).keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            current = scope.0.parent.as_ref();
        }
        names
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Scope").field(&self.names()).finish()
    }
}

/// The locals of one call stack frame that are not variables.
pub struct Locals {
    /// The default access level of methods defined from here (changed by a bare `private`).
    pub visibility: Mutex<Visibility>,
    /// The thread running this frame.
    pub thread: Arc<ThreadHandle>,
}

impl Locals {
    /// Create the locals of a new frame running on the given thread.
    pub fn new(thread: Arc<ThreadHandle>) -> Arc<Self> {
        Arc::new(Self {
            visibility: Mutex::new(Visibility::Public),
            thread,
        })
    }

    /// The current default access level.
    pub fn visibility(&self) -> Visibility {
        match self.visibility.lock() {
            Ok(visibility) => *visibility,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Change the default access level.
    pub fn set_visibility(&self, visibility: Visibility) {
        match self.visibility.lock() {
            Ok(mut current) => *current = visibility,
            Err(poisoned) => *poisoned.into_inner() = visibility,
        }
    }
}

/// The context an expression is evaluated in.
#[derive(Clone)]
pub struct Context {
    /// The location of the expression being evaluated.
    pub location: Cell<Location>,
    /// The local variables.
    pub scope: Scope,
    /// The lexical module (where `def` defines methods and constants are resolved from).
    pub module: Arc<Module>,
    /// The current `self`.
    pub self_value: Value,
    /// The block passed to the current method.
    pub block: Option<Arc<Proc>>,
    /// The method being run.
    pub method: Option<Arc<Method>>,
    /// The arguments the current method was called with.
    pub arguments: Option<Arc<Vec<Value>>>,
    /// The identity of the current method frame (the target of `return`).
    pub frame: u64,
    /// The number of nested invocations.
    pub depth: usize,
    /// The call stack locals.
    pub locals: Arc<Locals>,
}

impl Context {
    /// Get the location of the expression being evaluated.
    pub fn location(&self) -> Location {
        self.location.get()
    }

    /// Get the thread running this context.
    pub fn thread(&self) -> &Arc<ThreadHandle> {
        &self.locals.thread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_reuses_the_closest_binding() {
        let outer = Scope::new();
        outer.declare("x", Value::Integer(1));
        let inner = outer.child();
        inner.assign("x", Value::Integer(2));
        assert!(matches!(outer.lookup("x"), Some(Value::Integer(2))));
        assert!(matches!(inner.lookup("x"), Some(Value::Integer(2))));
    }

    #[test]
    fn new_bindings_stay_in_the_innermost_frame() {
        let outer = Scope::new();
        let inner = outer.child();
        inner.assign("y", Value::Integer(3));
        assert!(inner.contains("y"));
        assert!(!outer.contains("y"));
    }

    #[test]
    fn declarations_shadow_outer_bindings() {
        let outer = Scope::new();
        outer.declare("x", Value::Integer(1));
        let inner = outer.child();
        inner.declare("x", Value::Integer(5));
        assert!(matches!(outer.lookup("x"), Some(Value::Integer(1))));
        assert!(matches!(inner.lookup("x"), Some(Value::Integer(5))));
        assert_eq!(inner.names(), vec![String::from("x")]);
    }
}
