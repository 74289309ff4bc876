//! Conversion of runtime values into their durable form and back.
//!
//! Only plain data survives between invocations: scalars, strings, bytes, ranges, slices,
//! exception instances, compiled patterns, references to builtins and classes, and the built-in
//! containers when every element is itself persistable. User functions, helpers, modules, open
//! files and match objects are rejected, as are reference cycles.

use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{
    builtins::Builtin,
    exception::{ExcType, ExceptionValue},
    modules::{self, re::Pattern},
    types::{Dict, Set},
    value::{Range, Slice, Value},
};

/// Deepest container nesting accepted by [`Persist::persist`].
pub const MAX_PERSIST_DEPTH: usize = 200;

/// Names `type(x)` can produce for kinds without a constructor binding.
const TYPE_NAMES: &[&str] = &[
    "NoneType",
    "ellipsis",
    "function",
    "builtin_function_or_method",
    "method",
    "module",
    "TextIOWrapper",
    "re.Pattern",
    "re.Match",
];

/// Durable form of a snippet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<StoredValue>),
    Tuple(Vec<StoredValue>),
    Set(Vec<StoredValue>),
    Dict(Vec<(StoredValue, StoredValue)>),
    Range { start: i64, stop: i64, step: i64 },
    Slice {
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
    },
    Exception(ExceptionValue),
    /// A compiled regex, recompiled on restore.
    Pattern { source: String, flags: i64 },
    /// A builtin function or constructor, by name.
    Builtin(String),
    /// A module function by dotted name, e.g. `re.findall`.
    ModuleFunction(String),
    ExcClass(ExcType),
    /// Result of `type(x)` for kinds listed in `TYPE_NAMES`.
    Type(String),
}

/// Why a value could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The value's type has no durable form.
    Unsupported(&'static str),
    /// A container contains itself.
    Cycle,
    /// Nesting exceeds [`MAX_PERSIST_DEPTH`].
    TooDeep,
    /// A restored dict key or set member is unhashable.
    Unhashable(&'static str),
    /// A stored reference no longer resolves, or a stored pattern no longer compiles.
    Invalid(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(type_name) => write!(f, "cannot persist '{type_name}' object"),
            Self::Cycle => f.write_str("cannot persist a self-referencing container"),
            Self::TooDeep => write!(f, "cannot persist containers nested deeper than {MAX_PERSIST_DEPTH}"),
            Self::Unhashable(type_name) => write!(f, "unhashable type: '{type_name}'"),
            Self::Invalid(reason) => write!(f, "cannot restore value: {reason}"),
        }
    }
}

impl std::error::Error for PersistError {}

/// Capability to be stored between invocations.
pub trait Persist {
    fn persist(&self) -> Result<StoredValue, PersistError>;
}

impl Persist for Value {
    fn persist(&self) -> Result<StoredValue, PersistError> {
        Storer::default().store(self, 0)
    }
}

/// Tracks the containers on the current path so cycles are detected.
#[derive(Default)]
struct Storer {
    active: Vec<usize>,
}

impl Storer {
    fn store(&mut self, value: &Value, depth: usize) -> Result<StoredValue, PersistError> {
        if depth > MAX_PERSIST_DEPTH {
            return Err(PersistError::TooDeep);
        }
        let stored = match value {
            Value::None => StoredValue::None,
            Value::Ellipsis => StoredValue::Ellipsis,
            Value::Bool(b) => StoredValue::Bool(*b),
            Value::Int(i) => StoredValue::Int(*i),
            Value::Float(f) => StoredValue::Float(*f),
            Value::Str(s) => StoredValue::Str(s.to_string()),
            Value::Bytes(b) => StoredValue::Bytes(b.to_vec()),
            Value::Range(r) => StoredValue::Range {
                start: r.start,
                stop: r.stop,
                step: r.step,
            },
            Value::Slice(slice) => StoredValue::Slice {
                lower: slice.lower,
                upper: slice.upper,
                step: slice.step,
            },
            Value::Exception(exc) => StoredValue::Exception((**exc).clone()),
            Value::Pattern(pattern) => StoredValue::Pattern {
                source: pattern.source.clone(),
                flags: pattern.flags,
            },
            Value::Builtin(builtin) => StoredValue::Builtin(builtin.name().to_owned()),
            Value::ModuleFunction(function) => StoredValue::ModuleFunction(function.qualified_name()),
            Value::ExcClass(exc_type) => StoredValue::ExcClass(*exc_type),
            Value::Type(name) => StoredValue::Type((*name).to_owned()),
            Value::Tuple(items) => StoredValue::Tuple(self.store_all(items.iter(), depth)?),
            Value::List(list) => {
                let id = Rc::as_ptr(list) as *const () as usize;
                self.enter(id)?;
                let items = self.store_all(list.borrow().iter(), depth)?;
                self.active.pop();
                StoredValue::List(items)
            }
            Value::Set(set) => {
                let id = Rc::as_ptr(set) as *const () as usize;
                self.enter(id)?;
                let items = self.store_all(set.borrow().values(), depth)?;
                self.active.pop();
                StoredValue::Set(items)
            }
            Value::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                self.enter(id)?;
                let mut pairs = Vec::new();
                for (key, item) in dict.borrow().items() {
                    pairs.push((self.store(key, depth + 1)?, self.store(item, depth + 1)?));
                }
                self.active.pop();
                StoredValue::Dict(pairs)
            }
            other => return Err(PersistError::Unsupported(other.type_name())),
        };
        Ok(stored)
    }

    fn store_all<'v>(
        &mut self,
        items: impl Iterator<Item = &'v Value>,
        depth: usize,
    ) -> Result<Vec<StoredValue>, PersistError> {
        items.map(|item| self.store(item, depth + 1)).collect()
    }

    fn enter(&mut self, id: usize) -> Result<(), PersistError> {
        if self.active.contains(&id) {
            return Err(PersistError::Cycle);
        }
        self.active.push(id);
        Ok(())
    }
}

impl StoredValue {
    /// Rebuilds a fresh runtime value.
    pub fn restore(&self) -> Result<Value, PersistError> {
        Ok(match self {
            Self::None => Value::None,
            Self::Ellipsis => Value::Ellipsis,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::Float(f) => Value::Float(*f),
            Self::Str(s) => Value::from(s.as_str()),
            Self::Bytes(b) => Value::Bytes(Rc::from(b.as_slice())),
            Self::Range { start, stop, step } => Value::Range(Range {
                start: *start,
                stop: *stop,
                step: *step,
            }),
            Self::Slice { lower, upper, step } => Value::Slice(Rc::new(Slice {
                lower: *lower,
                upper: *upper,
                step: *step,
            })),
            Self::Exception(exc) => Value::exception(exc.clone()),
            Self::Pattern { source, flags } => {
                let pattern = Pattern::compile(source, *flags).map_err(|err| PersistError::Invalid(err.exc.message))?;
                Value::Pattern(Rc::new(pattern))
            }
            Self::Builtin(name) => Value::Builtin(
                name.parse::<Builtin>()
                    .map_err(|_| PersistError::Invalid(format!("unknown builtin '{name}'")))?,
            ),
            Self::ModuleFunction(qualified) => restore_module_function(qualified)?,
            Self::ExcClass(exc_type) => Value::ExcClass(*exc_type),
            Self::Type(name) => TYPE_NAMES
                .iter()
                .copied()
                .find(|known| *known == name.as_str())
                .map(Value::Type)
                .ok_or_else(|| PersistError::Invalid(format!("unknown type '{name}'")))?,
            Self::List(items) => Value::list(restore_all(items)?),
            Self::Tuple(items) => Value::tuple(restore_all(items)?),
            Self::Set(items) => {
                let mut set = Set::new();
                for item in restore_all(items)? {
                    let type_name = item.type_name();
                    set.add(item).map_err(|_| PersistError::Unhashable(type_name))?;
                }
                Value::Set(Rc::new(RefCell::new(set)))
            }
            Self::Dict(pairs) => {
                let mut dict = Dict::new();
                for (key, item) in pairs {
                    let key = key.restore()?;
                    let type_name = key.type_name();
                    dict.insert(key, item.restore()?)
                        .map_err(|_| PersistError::Unhashable(type_name))?;
                }
                Value::dict(dict)
            }
        })
    }

    /// `str()` of the restored value; used when exporting.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.restore().map_or_else(|err| err.to_string(), |value| value.py_str()),
        }
    }
}

fn restore_all(items: &[StoredValue]) -> Result<Vec<Value>, PersistError> {
    items.iter().map(StoredValue::restore).collect()
}

fn restore_module_function(qualified: &str) -> Result<Value, PersistError> {
    let invalid = || PersistError::Invalid(format!("unknown function '{qualified}'"));
    let (module, name) = qualified.rsplit_once('.').ok_or_else(invalid)?;
    let module = modules::import(module).map_err(|_| invalid())?;
    match modules::get_attr(module, name) {
        Ok(function @ Value::ModuleFunction(_)) => Ok(function),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn containers_round_trip() {
        let mut dict = Dict::new();
        dict.set_str("n", Value::Int(3));
        dict.insert(Value::tuple(vec![Value::Int(1), Value::from("a")]), Value::list(vec![Value::Float(0.5)]))
            .unwrap();
        let value = Value::dict(dict);
        let stored = value.persist().unwrap();
        assert_eq!(stored.restore().unwrap().py_repr(), value.py_repr());
    }

    #[test]
    fn live_objects_are_rejected() {
        let value = Value::list(vec![Value::Module(crate::modules::Module::Re)]);
        assert_eq!(value.persist(), Err(PersistError::Unsupported("module")));
    }

    #[test]
    fn references_and_patterns_round_trip() {
        let pattern = Pattern::compile(r"a+\d", 2).unwrap();
        let values = vec![
            Value::Pattern(Rc::new(pattern)),
            Value::Builtin(Builtin::Len),
            Value::ExcClass(ExcType::ValueError),
            Value::Type("NoneType"),
            Value::Slice(Rc::new(Slice {
                lower: Some(1),
                upper: None,
                step: Some(-2),
            })),
            Value::Ellipsis,
        ];
        for value in values {
            let stored = value.persist().unwrap();
            let restored = stored.restore().unwrap();
            assert_eq!(restored.py_repr(), value.py_repr());
            assert!(restored.py_eq(&value).unwrap(), "{}", value.py_repr());
        }

        let findall = modules::get_attr(modules::Module::Re, "findall").unwrap();
        let stored = findall.persist().unwrap();
        assert_eq!(stored, StoredValue::ModuleFunction("re.findall".to_owned()));
        assert_eq!(stored.restore().unwrap().py_repr(), findall.py_repr());
    }

    #[test]
    fn stale_references_fail_to_restore() {
        for stored in [
            StoredValue::Builtin("no_such_builtin".to_owned()),
            StoredValue::Type("generator".to_owned()),
            StoredValue::ModuleFunction("re.nothing".to_owned()),
            StoredValue::Pattern {
                source: "(".to_owned(),
                flags: 0,
            },
        ] {
            assert!(matches!(stored.restore(), Err(PersistError::Invalid(_))), "{stored:?}");
        }
    }

    #[test]
    fn cycles_are_rejected_but_sharing_is_not() {
        let inner = Value::list(vec![Value::Int(1)]);
        let shared = Value::list(vec![inner.clone(), inner]);
        assert!(shared.persist().is_ok());

        let outer = Value::list(Vec::new());
        if let Value::List(list) = &outer {
            list.borrow_mut().push(outer.clone());
        }
        assert_eq!(outer.persist(), Err(PersistError::Cycle));
        if let Value::List(list) = &outer {
            list.borrow_mut().clear();
        }
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut value = Value::Int(0);
        for _ in 0..=MAX_PERSIST_DEPTH {
            value = Value::list(vec![value]);
        }
        assert_eq!(value.persist(), Err(PersistError::TooDeep));
    }
}
