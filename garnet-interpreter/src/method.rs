use std::fmt;
use std::sync::{Arc, Weak};

use garnet_core::ast::{BlockDef, MethodDef, Parameter, ParameterKind};

use crate::block::Proc;
use crate::class::Module;
use crate::primitives::PrimitiveFn;

/// The access level of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// The number of positional arguments a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// The minimum number of arguments.
    pub min: usize,
    /// The maximum number of arguments (`None` when a splat absorbs any surplus).
    pub max: Option<usize>,
}

impl Arity {
    /// An arity accepting anything.
    pub fn any() -> Self {
        Self { min: 0, max: None }
    }

    /// An arity accepting exactly `count` arguments.
    pub fn exact(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    /// Compute the arity of a parameter list.
    ///
    /// Binding is greedy from left to right, so the minimum counts every normal parameter up to
    /// and including the last required one. A splat or a double splat leaves the maximum open.
    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        let positional = Self::positional(parameters);
        let open = parameters.iter().any(|parameter| {
            matches!(
                parameter.kind,
                ParameterKind::Splat | ParameterKind::DoubleSplat
            )
        });
        Self {
            min: positional.min,
            max: if open { None } else { positional.max },
        }
    }

    /// The arity of the normal parameters alone, ignoring splats.
    pub fn positional(parameters: &[Parameter]) -> Self {
        let mut normal = 0;
        let mut min = 0;
        for parameter in parameters {
            match parameter.kind {
                ParameterKind::Required => {
                    normal += 1;
                    min = normal;
                }
                ParameterKind::Optional(_) => normal += 1,
                ParameterKind::Splat | ParameterKind::DoubleSplat | ParameterKind::Block => {}
            }
        }
        Self {
            min,
            max: Some(normal),
        }
    }

    /// Whether `count` arguments are acceptable.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// The value reported by `Proc#arity` (negative when optional arguments exist).
    pub fn as_number(&self) -> i64 {
        match self.max {
            Some(max) if max == self.min => self.min as i64,
            _ => -(self.min as i64) - 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

/// The kind of a class method.
#[derive(Clone)]
pub enum MethodKind {
    /// A built-in method.
    Native(PrimitiveFn),
    /// A user-defined method (`def`).
    Defined(Arc<MethodDef>),
    /// The body of a block or lambda.
    Block(Arc<BlockDef>),
    /// A method created by `attr_reader` (the name includes the `@`).
    AttributeReader(String),
    /// A method created by `attr_writer` (the name includes the `@`).
    AttributeWriter(String),
    /// A method created by `define_method`.
    Proc(Arc<Proc>),
    /// A method forwarding to another method of its first argument (`Symbol#to_proc`).
    Send(String),
}

/// Represents a method.
#[derive(Clone)]
pub struct Method {
    /// The method's name.
    pub name: String,
    /// The method's access level.
    pub visibility: Visibility,
    /// The number of arguments the method accepts.
    pub arity: Arity,
    /// The method's body.
    pub kind: MethodKind,
    /// The module this method is defined in.
    pub holder: Weak<Module>,
    /// Whether this is a class method.
    pub singleton: bool,
}

impl Method {
    /// Create a built-in method.
    pub fn native(name: &str, function: PrimitiveFn, public: bool) -> Self {
        Self {
            name: name.to_string(),
            visibility: if public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            arity: Arity::any(),
            kind: MethodKind::Native(function),
            holder: Weak::new(),
            singleton: false,
        }
    }

    /// Create a method from its definition.
    pub fn defined(definition: Arc<MethodDef>, visibility: Visibility) -> Self {
        Self {
            name: definition.name.clone(),
            visibility,
            arity: Arity::from_parameters(&definition.parameters),
            singleton: definition.singleton,
            kind: MethodKind::Defined(definition),
            holder: Weak::new(),
        }
    }

    /// Create the method backing a block literal.
    pub fn block(definition: Arc<BlockDef>) -> Self {
        Self {
            name: String::from("block"),
            visibility: Visibility::Public,
            arity: Arity::from_parameters(&definition.parameters),
            kind: MethodKind::Block(definition),
            holder: Weak::new(),
            singleton: false,
        }
    }

    /// Attach this method to its holder.
    pub fn held_by(mut self, holder: &Arc<Module>) -> Self {
        self.holder = Arc::downgrade(holder);
        self
    }

    /// Rename this method (used by `alias`).
    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Change the access level of this method.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Get the method's name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the module this method is defined in.
    pub fn holder(&self) -> Option<Arc<Module>> {
        self.holder.upgrade()
    }

    /// Whether this method is built-in.
    pub fn is_native(&self) -> bool {
        matches!(self.kind, MethodKind::Native(_))
    }

    /// The parameters of a user-defined method or block.
    pub fn parameters(&self) -> &[Parameter] {
        match &self.kind {
            MethodKind::Defined(definition) => &definition.parameters,
            MethodKind::Block(definition) => &definition.parameters,
            MethodKind::Proc(proc) => proc.method.parameters(),
            _ => &[],
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match &self.kind {
            MethodKind::Native(_) => "native",
            MethodKind::Defined(_) => "defined",
            MethodKind::Block(_) => "block",
            MethodKind::AttributeReader(_) => "reader",
            MethodKind::AttributeWriter(_) => "writer",
            MethodKind::Proc(_) => "proc",
            MethodKind::Send(_) => "send",
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("arity", &self.arity)
            .field("kind", &kind)
            .finish()
    }
}
