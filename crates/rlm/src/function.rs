use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{expressions::FunctionDef, value::Value};

/// Local variables of one function activation, chained to the enclosing scope for closures.
#[derive(Debug, Default)]
pub struct Scope {
    pub vars: RefCell<IndexMap<String, Value>>,
    pub parent: Option<Rc<Scope>>,
}

impl Scope {
    #[must_use]
    pub fn child(parent: Option<Rc<Self>>) -> Self {
        Self {
            vars: RefCell::default(),
            parent,
        }
    }

    /// Looks `name` up in this scope and its ancestors.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }
}

/// A user-defined function or lambda: its definition, evaluated defaults and captured scope.
#[derive(Debug)]
pub struct Function {
    pub def: Rc<FunctionDef>,
    /// Default values aligned with `def.params`.
    pub defaults: Vec<Option<Value>>,
    /// Default values aligned with `def.kwonly`.
    pub kw_defaults: Vec<Option<Value>>,
    /// Scope the function was defined in; `None` at module level.
    pub closure: Option<Rc<Scope>>,
}
