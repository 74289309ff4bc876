//! Assembly of the namespace a snippet runs against.

use std::{cell::RefCell, rc::Rc};

use strum::IntoEnumIterator;

use crate::{
    helpers::{BoundHelper, HelperKind, TextHelpers},
    namespace::Namespace,
    snapshot::Snapshot,
    value::{DictRef, ListRef, Value},
};

pub const CONTEXT: &str = "context";
pub const CONTENT: &str = "content";
pub const BUFFERS: &str = "buffers";
pub const REPO_INDEX: &str = "repo_index";
pub const BUILTINS: &str = "__builtins__";

/// Names the environment binds itself; they are never persisted and always win over a stored
/// variable of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedNames {
    names: Vec<&'static str>,
}

impl InjectedNames {
    /// `context`, `content`, `buffers`, `repo_index`, `__builtins__` and every helper.
    #[must_use]
    pub fn standard() -> Self {
        let mut names = vec![CONTEXT, CONTENT, BUFFERS, REPO_INDEX, BUILTINS];
        names.extend(HelperKind::iter().map(HelperKind::name));
        Self { names }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names.iter().copied()
    }
}

impl Default for InjectedNames {
    fn default() -> Self {
        Self::standard()
    }
}

/// A namespace plus the shared context and buffers its helpers are bound to.
#[derive(Debug)]
pub struct Environment {
    pub namespace: Namespace,
    pub context: DictRef,
    pub buffers: ListRef,
}

/// Builds the namespace for one run of `snapshot`.
///
/// Stored variables form the base layer; the injected bindings are set on top of them.
/// `content` is a copy of `context['content']` taken now, not a live view.
#[must_use]
pub fn build(snapshot: &Snapshot, names: &InjectedNames) -> Environment {
    let mut namespace = Namespace::new();
    for (name, stored) in &snapshot.globals {
        if names.contains(name) {
            continue;
        }
        match stored.restore() {
            Ok(value) => namespace.set(name.as_str(), value),
            Err(err) => tracing::debug!(name = %name, error = %err, "cannot restore variable"),
        }
    }

    let context: DictRef = Rc::new(RefCell::new(snapshot.context.to_dict()));
    let buffers: ListRef = Rc::new(RefCell::new(
        snapshot.buffers.iter().map(|b| Value::from(b.as_str())).collect(),
    ));
    namespace.set(CONTEXT, Value::Dict(context.clone()));
    namespace.set(CONTENT, Value::from(snapshot.context.content.as_str()));
    namespace.set(BUFFERS, Value::List(buffers.clone()));
    if let Some(index) = &snapshot.repo_index {
        namespace.set(REPO_INDEX, index.to_value());
    }

    let helpers = Rc::new(TextHelpers::new(context.clone(), buffers.clone()));
    for kind in HelperKind::iter() {
        namespace.set(kind.name(), Value::Helper(BoundHelper::new(kind, helpers.clone())));
    }

    Environment {
        namespace,
        context,
        buffers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{persist::StoredValue, snapshot::Context};

    #[test]
    fn injected_bindings_shadow_stored_variables() {
        let mut snapshot = Snapshot::new(Context::new("doc.txt", "hello".to_owned()), None);
        snapshot.globals.insert("content".to_owned(), StoredValue::Str("stale".to_owned()));
        snapshot.globals.insert("n".to_owned(), StoredValue::Int(7));

        let env = build(&snapshot, &InjectedNames::standard());
        assert_eq!(env.namespace.get("content").map(Value::py_str).as_deref(), Some("hello"));
        assert_eq!(env.namespace.get("n").map(Value::py_repr).as_deref(), Some("7"));
        assert!(env.namespace.get("grep").is_some());
        assert!(env.namespace.get("repo_index").is_none());
    }
}
