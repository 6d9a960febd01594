use std::fmt;
use std::sync::Arc;

use crate::class::Module;
use crate::frame::Scope;
use crate::method::Method;
use crate::value::Value;

/// Represents a closure: a block or lambda body along with what it captured where it was created.
#[derive(Clone)]
pub struct Proc {
    /// The proc's identity (`break` out of a block targets the call the block was attached to).
    pub id: u64,
    /// The method holding the body and the parameters.
    pub method: Arc<Method>,
    /// The captured scope.
    pub scope: Scope,
    /// The captured `self`.
    pub self_value: Value,
    /// The captured lexical module.
    pub module: Arc<Module>,
    /// Whether `return` and arity behave like in a method.
    pub lambda: bool,
    /// The method frame a `return` in this block returns from.
    pub frame: u64,
    /// The block of the method this proc was created in (what `yield` calls from within it).
    pub outer_block: Option<Arc<Proc>>,
    /// The method this proc was created in (what `super` resolves from within it).
    pub outer_method: Option<Arc<Method>>,
    /// The arguments of the method this proc was created in (what a bare `super` forwards).
    pub outer_arguments: Option<Arc<Vec<Value>>>,
}

impl Proc {
    /// Get the number of arguments this proc expects.
    pub fn arity(&self) -> i64 {
        let arity = self.method.arity;
        if self.lambda {
            return arity.as_number();
        }
        match arity.max {
            Some(max) if max > arity.min => -(arity.min as i64) - 1,
            _ => arity.as_number(),
        }
    }

    /// Get a copy of this proc that behaves like a lambda.
    pub fn as_lambda(&self, id: u64) -> Self {
        Self {
            id,
            lambda: true,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Proc")
            .field("id", &self.id)
            .field("lambda", &self.lambda)
            .field("arity", &self.method.arity)
            .finish()
    }
}
