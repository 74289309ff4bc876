use indexmap::IndexMap;

use super::dict::HashKey;
use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    value::{SetRef, Value},
};

/// Python set; iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct Set {
    items: IndexMap<HashKey, Value>,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iterable(iterable: &Value) -> RunResult<Self> {
        let mut set = Self::new();
        for item in iterable.py_iter()? {
            set.add(item)?;
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, value: Value) -> RunResult<()> {
        self.items.entry(HashKey::of(&value)?).or_insert(value);
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> RunResult<bool> {
        Ok(self.items.contains_key(&HashKey::of(value)?))
    }

    /// Removes `value`, returning whether it was present.
    pub fn remove(&mut self, value: &Value) -> RunResult<bool> {
        Ok(self.items.shift_remove(&HashKey::of(value)?).is_some())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items.keys().all(|k| other.items.contains_key(k))
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in &other.items {
            result.items.entry(key.clone()).or_insert_with(|| value.clone());
        }
        result
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|(k, _)| other.items.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|(k, _)| !other.items.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        self.difference(other).union(&other.difference(self))
    }

    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.items.keys().all(|k| other.items.contains_key(k))
    }
}

/// Set operand of a method: any iterable is accepted, as in CPython.
fn other_set(value: &Value) -> RunResult<Set> {
    match value {
        Value::Set(set) => Ok(set.borrow().clone()),
        other => Set::from_iterable(other),
    }
}

/// Calls a `set` method.
pub(crate) fn call_method(set: &SetRef, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "add" => {
            let item = args.get_one_arg("set.add")?;
            set.borrow_mut().add(item)?;
            Ok(Value::None)
        }
        "remove" => {
            let item = args.get_one_arg("set.remove")?;
            if set.borrow_mut().remove(&item)? {
                Ok(Value::None)
            } else {
                Err(ExcType::key_error(item.py_repr()))
            }
        }
        "discard" => {
            let item = args.get_one_arg("set.discard")?;
            set.borrow_mut().remove(&item)?;
            Ok(Value::None)
        }
        "pop" => {
            args.check_zero_args("set.pop")?;
            let popped = set.borrow_mut().items.pop();
            popped
                .map(|(_, v)| v)
                .ok_or_else(|| ExcType::key_error("'pop from an empty set'".to_owned()))
        }
        "update" => {
            let CallArgs { positional, .. } = args;
            for other in positional {
                let other = other_set(&other)?;
                let merged = set.borrow().union(&other);
                *set.borrow_mut() = merged;
            }
            Ok(Value::None)
        }
        "union" | "intersection" | "difference" | "symmetric_difference" => {
            let CallArgs { positional, .. } = args;
            let mut result = set.borrow().clone();
            for other in positional {
                let other = other_set(&other)?;
                result = match name {
                    "union" => result.union(&other),
                    "intersection" => result.intersection(&other),
                    "difference" => result.difference(&other),
                    _ => result.symmetric_difference(&other),
                };
            }
            Ok(Value::set(result))
        }
        "issubset" => {
            let other = other_set(&args.get_one_arg("set.issubset")?)?;
            Ok(Value::Bool(set.borrow().is_subset(&other)))
        }
        "issuperset" => {
            let other = other_set(&args.get_one_arg("set.issuperset")?)?;
            Ok(Value::Bool(other.is_subset(&set.borrow())))
        }
        "copy" => {
            args.check_zero_args("set.copy")?;
            Ok(Value::set(set.borrow().clone()))
        }
        "clear" => {
            args.check_zero_args("set.clear")?;
            set.borrow_mut().items.clear();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("set", name)),
    }
}
