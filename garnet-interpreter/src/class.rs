use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;

use crate::method::Method;
use crate::value::Value;
use crate::{read, write};

/// Whether a module is a plain module or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A namespace that cannot be instantiated.
    Module,
    /// An instantiable class.
    Class,
}

/// Represents a module or a class.
///
/// Every table is individually locked so that concurrent workers can amend (reopen) a class
/// while others dispatch through it.
pub struct Module {
    /// The module's identity.
    pub id: u64,
    /// The module's fully-qualified name (eg. `Outer::Inner`).
    pub name: String,
    /// Whether this is a module or a class.
    pub kind: ModuleKind,
    /// The superclass of this class.
    pub superclass: Option<Arc<Module>>,
    /// The module this one was lexically defined in.
    pub parent: Weak<Module>,
    /// The instance methods.
    pub methods: RwLock<IndexMap<String, Arc<Method>>>,
    /// The class (singleton) methods.
    pub class_methods: RwLock<IndexMap<String, Arc<Method>>>,
    /// The class variables (`@@name`).
    pub class_variables: RwLock<IndexMap<String, Value>>,
    /// The constants.
    pub constants: RwLock<IndexMap<String, Value>>,
    /// The class-level instance variables.
    pub instance_variables: RwLock<IndexMap<String, Value>>,
}

impl Module {
    /// Create a new module or class.
    pub fn new(
        id: u64,
        name: impl Into<String>,
        kind: ModuleKind,
        superclass: Option<Arc<Module>>,
        parent: Option<&Arc<Module>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.into(),
            kind,
            superclass,
            parent: parent.map(Arc::downgrade).unwrap_or_default(),
            methods: RwLock::new(IndexMap::new()),
            class_methods: RwLock::new(IndexMap::new()),
            class_variables: RwLock::new(IndexMap::new()),
            constants: RwLock::new(IndexMap::new()),
            instance_variables: RwLock::new(IndexMap::new()),
        })
    }

    /// Get the module's name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Whether this module is a class.
    pub fn is_class(&self) -> bool {
        self.kind == ModuleKind::Class
    }

    /// The module this one was lexically defined in.
    pub fn parent(&self) -> Option<Arc<Module>> {
        self.parent.upgrade()
    }

    /// This class and all its superclasses, closest first.
    pub fn ancestors(self: &Arc<Self>) -> Vec<Arc<Module>> {
        let mut ancestors = vec![self.clone()];
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            current = class.superclass.clone();
            ancestors.push(class);
        }
        ancestors
    }

    /// Whether this class is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &Module) -> bool {
        if self.id == other.id {
            return true;
        }
        let mut current = self.superclass.as_ref();
        while let Some(class) = current {
            if class.id == other.id {
                return true;
            }
            current = class.superclass.as_ref();
        }
        false
    }

    /// Search for an instance method, walking up the superclass chain.
    pub fn lookup_method(&self, name: &str) -> Option<Arc<Method>> {
        if let Some(method) = read(&self.methods).get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref()?.lookup_method(name)
    }

    /// Search for a class method, walking up the superclass chain.
    pub fn lookup_class_method(&self, name: &str) -> Option<Arc<Method>> {
        if let Some(method) = read(&self.class_methods).get(name) {
            return Some(method.clone());
        }
        self.superclass.as_ref()?.lookup_class_method(name)
    }

    /// Define (or redefine) an instance method.
    pub fn define_method(&self, method: Method) {
        write(&self.methods).insert(method.name.clone(), Arc::new(method));
    }

    /// Define (or redefine) a class method.
    pub fn define_class_method(&self, method: Method) {
        write(&self.class_methods).insert(method.name.clone(), Arc::new(method));
    }

    /// Get one of this module's own constants.
    pub fn get_constant(&self, name: &str) -> Option<Value> {
        read(&self.constants).get(name).cloned()
    }

    /// Search for a constant in this module and its superclasses.
    pub fn lookup_constant(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.get_constant(name) {
            return Some(value);
        }
        self.superclass.as_ref()?.lookup_constant(name)
    }

    /// Set a constant, returning whether it was already defined.
    pub fn set_constant(&self, name: &str, value: Value) -> bool {
        write(&self.constants)
            .insert(name.to_string(), value)
            .is_some()
    }

    /// Search for a class variable in this class and its superclasses.
    pub fn lookup_class_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = read(&self.class_variables).get(name) {
            return Some(value.clone());
        }
        self.superclass.as_ref()?.lookup_class_variable(name)
    }

    /// Assign a class variable, in the closest class of the chain that already defines it (or this one).
    pub fn set_class_variable(&self, name: &str, value: Value) {
        let mut current = Some(self);
        while let Some(class) = current {
            let mut variables = write(&class.class_variables);
            if let Some(slot) = variables.get_mut(name) {
                *slot = value;
                return;
            }
            drop(variables);
            current = class.superclass.as_deref();
        }
        write(&self.class_variables).insert(name.to_string(), value);
    }

    /// Get a class-level instance variable.
    pub fn get_instance_variable(&self, name: &str) -> Option<Value> {
        read(&self.instance_variables).get(name).cloned()
    }

    /// Set a class-level instance variable.
    pub fn set_instance_variable(&self, name: &str, value: Value) {
        write(&self.instance_variables).insert(name.to_string(), value);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|class| class.name.clone()),
            )
            .finish()
    }
}
