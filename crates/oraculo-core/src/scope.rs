//! Lexical scope chain.
//!
//! Scopes live in an append-only arena and refer to their parent by
//! [`ScopeId`]. An event callback keeps the id of the scope it was defined
//! in, so later lookups see that scope's bindings as they are at trigger
//! time rather than a copy taken at registration.
//!
//! Scopes are never freed. Every branch taken and every loop iteration adds
//! one, including those run inside event callbacks, so the arena grows for
//! the lifetime of the evaluator and is dropped only by
//! [`Evaluator::set_program`](crate::evaluator::Evaluator::set_program).

use std::collections::HashMap;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

/// Index of a scope in its [`ScopeChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The global scope.
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<ScopeId>,
}

#[derive(Debug)]
pub struct ScopeChain {
    arena: Vec<Scope>,
    current: ScopeId,
}

impl ScopeChain {
    /// Creates a chain holding only the global scope.
    pub fn new() -> Self {
        Self {
            arena: vec![Scope::default()],
            current: ScopeId::ROOT,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Makes `id` the current scope. Used to run event callbacks in the
    /// scope they were defined in.
    pub fn set_current(&mut self, id: ScopeId) -> EvalResult<()> {
        if id.0 >= self.arena.len() {
            return Err(EvalError::Internal(format!("scope {} does not exist", id.0)));
        }
        self.current = id;
        Ok(())
    }

    /// Pushes a child of the current scope and makes it current.
    pub fn enter(&mut self) -> ScopeId {
        let id = ScopeId(self.arena.len());
        self.arena.push(Scope {
            bindings: HashMap::new(),
            parent: Some(self.current),
        });
        self.current = id;
        id
    }

    /// Returns to the parent of the current scope.
    pub fn exit(&mut self) -> EvalResult<()> {
        match self.arena[self.current.0].parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(EvalError::Internal("attempted to exit the global scope".to_string())),
        }
    }

    /// Binds `name` in the current scope, shadowing any outer binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.arena[self.current.0].bindings.insert(name.into(), value);
    }

    /// Looks `name` up from the current scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut id = Some(self.current);
        while let Some(ScopeId(index)) = id {
            let scope = &self.arena[index];
            if let Some(value) = scope.bindings.get(name) {
                return Some(value);
            }
            id = scope.parent;
        }
        None
    }

    /// Like [`lookup`](Self::lookup) but fails with a `NameError`.
    pub fn resolve(&self, name: &str) -> EvalResult<Value> {
        self.lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::Name(name.to_string()))
    }

    /// Number of scopes ever created in this chain.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

impl Default for ScopeChain {
    fn default() -> Self {
        Self::new()
    }
}
