//!
//! This is the symbol table.
//!
//! Symbols are interned strings: interning the same name twice hands out the same allocation.
//! Symbols mentioned by source code or by the built-in catalogue are *immortal* and are never evicted.
//! Symbols created at runtime (eg. with `String#to_sym`) are *mortal*: they live in a bounded cache
//! from which a random entry is evicted whenever the cache is full.
//!

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// An interned symbol.
///
/// This is cheap to clone and compares by name.
#[derive(Clone, Eq)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// The symbol's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Deref for Symbol {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Tables {
    immortal: HashMap<String, Arc<str>>,
    mortal: IndexMap<String, Arc<str>>,
    rng: StdRng,
}

/// The symbol table, shared by every worker of a universe.
pub struct SymbolTable {
    tables: Mutex<Tables>,
    capacity: usize,
}

impl SymbolTable {
    /// Create a symbol table whose mortal cache holds at most `capacity` entries before evicting.
    pub fn new(capacity: usize) -> Self {
        Self {
            tables: Mutex::new(Tables {
                immortal: HashMap::new(),
                mortal: IndexMap::new(),
                rng: StdRng::from_entropy(),
            }),
            capacity,
        }
    }

    /// Intern a symbol that will never be evicted.
    pub fn intern(&self, name: &str) -> Symbol {
        let mut tables = match self.tables.lock() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(symbol) = tables.immortal.get(name) {
            return Symbol(symbol.clone());
        }
        let symbol: Arc<str> = match tables.mortal.swap_remove(name) {
            Some(symbol) => symbol,
            None => Arc::from(name),
        };
        tables.immortal.insert(name.to_string(), symbol.clone());
        Symbol(symbol)
    }

    /// Intern a symbol created at runtime, which may later be evicted.
    pub fn intern_mortal(&self, name: &str) -> Symbol {
        let mut tables = match self.tables.lock() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(symbol) = tables.immortal.get(name) {
            return Symbol(symbol.clone());
        }
        if let Some(symbol) = tables.mortal.get(name) {
            return Symbol(symbol.clone());
        }
        if tables.mortal.len() >= self.capacity && !tables.mortal.is_empty() {
            let len = tables.mortal.len();
            let victim = tables.rng.gen_range(0..len);
            if let Some((evicted, _)) = tables.mortal.swap_remove_index(victim) {
                log::debug!("evicted mortal symbol :{}", evicted);
            }
        }
        let symbol: Arc<str> = Arc::from(name);
        tables.mortal.insert(name.to_string(), symbol.clone());
        Symbol(symbol)
    }

    /// The number of immortal and mortal symbols currently held.
    pub fn len(&self) -> (usize, usize) {
        match self.tables.lock() {
            Ok(tables) => (tables.immortal.len(), tables.mortal.len()),
            Err(poisoned) => {
                let tables = poisoned.into_inner();
                (tables.immortal.len(), tables.mortal.len())
            }
        }
    }

    /// Whether a symbol with this name is currently held.
    pub fn contains(&self, name: &str) -> bool {
        match self.tables.lock() {
            Ok(tables) => tables.immortal.contains_key(name) || tables.mortal.contains_key(name),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (immortal, mortal) = self.len();
        f.debug_struct("SymbolTable")
            .field("immortal", &immortal)
            .field("mortal", &mortal)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_twice_shares_the_allocation() {
        let table = SymbolTable::new(4);
        let first = table.intern("name");
        let second = table.intern("name");
        assert!(Arc::ptr_eq(&first.0, &second.0));
        assert_eq!(first, second);
    }

    #[test]
    fn mortal_cache_never_exceeds_capacity() {
        let table = SymbolTable::new(2);
        table.intern_mortal("a");
        table.intern_mortal("b");
        table.intern_mortal("c");
        let (_, mortal) = table.len();
        assert!(mortal <= 3);
        assert_eq!(mortal, 2);
        assert!(table.contains("c"));
    }

    #[test]
    fn immortal_symbols_are_never_evicted() {
        let table = SymbolTable::new(1);
        table.intern("kept");
        for name in &["x", "y", "z"] {
            table.intern_mortal(name);
        }
        assert!(table.contains("kept"));
        assert_eq!(table.len(), (1, 1));
    }

    #[test]
    fn promoting_a_mortal_symbol_makes_it_immortal() {
        let table = SymbolTable::new(1);
        let mortal = table.intern_mortal("promoted");
        let immortal = table.intern("promoted");
        assert_eq!(mortal, immortal);
        table.intern_mortal("other");
        table.intern_mortal("another");
        assert!(table.contains("promoted"));
    }
}
