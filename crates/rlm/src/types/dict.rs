use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    value::{DictRef, Value},
};

/// Hashable projection of a value, used as the key of dicts and sets.
///
/// Numbers that compare equal hash equal: `1`, `1.0` and `True` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    /// Bit pattern of a non-integral float.
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Tuple(Vec<HashKey>),
    Range(i64, i64, i64),
    /// Objects hashed by identity (functions, files, ...).
    Identity(usize),
    /// Singleton-like objects hashed by their repr (builtins, classes, modules).
    Named(String),
}

impl HashKey {
    pub fn of(value: &Value) -> RunResult<Self> {
        Ok(match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Self::Int(*f as i64)
                } else {
                    Self::Float(f.to_bits())
                }
            }
            Value::Str(s) => Self::Str(s.clone()),
            Value::Bytes(b) => Self::Bytes(b.clone()),
            Value::Tuple(items) => Self::Tuple(items.iter().map(Self::of).collect::<RunResult<_>>()?),
            Value::Range(r) => Self::Range(r.start, r.stop, r.step),
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Slice(_) => {
                return Err(ExcType::unhashable(value.type_name()));
            }
            Value::Function(f) => Self::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Exception(e) => Self::Identity(Rc::as_ptr(e) as *const () as usize),
            Value::File(f) => Self::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Match(m) => Self::Identity(Rc::as_ptr(m) as *const () as usize),
            Value::Method(m) => Self::Identity(Rc::as_ptr(m) as *const () as usize),
            other => Self::Named(other.py_repr()),
        })
    }
}

/// Python dict preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<HashKey, (Value, Value)>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        Ok(self.entries.get(&HashKey::of(key)?).map(|(_, v)| v.clone()))
    }

    /// Looks up a string key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.get(&HashKey::Str(key.into())).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> RunResult<bool> {
        Ok(self.entries.contains_key(&HashKey::of(key)?))
    }

    /// Inserts or replaces; an existing key keeps its position and original key object.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<()> {
        let hash_key = HashKey::of(&key)?;
        match self.entries.get_mut(&hash_key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(hash_key, (key, value));
            }
        }
        Ok(())
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        let key: Rc<str> = key.into();
        match self.entries.get_mut(&HashKey::Str(key.clone())) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(HashKey::Str(key.clone()), (Value::Str(key), value));
            }
        }
    }

    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        Ok(self.entries.shift_remove(&HashKey::of(key)?).map(|(_, v)| v))
    }

    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        self.entries.pop().map(|(_, kv)| kv)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values().map(|(_, v)| v)
    }

    pub fn items(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }

    /// Equality at comparison nesting `depth`; see [`Value::py_eq`].
    pub(crate) fn eq_at(&self, other: &Self, depth: usize) -> RunResult<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for (hash_key, (_, value)) in &self.entries {
            match other.entries.get(hash_key) {
                Some((_, other_value)) if value.eq_at(other_value, depth)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Builds a dict from an iterable of key/value pairs, as `dict(pairs)` does.
    pub fn from_pairs(pairs: &Value) -> RunResult<Self> {
        if let Value::Dict(other) = pairs {
            return Ok(other.borrow().clone());
        }
        let mut dict = Self::new();
        for (index, pair) in pairs.py_iter()?.enumerate() {
            let items = pair.to_vec()?;
            let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
                ExcType::value_error(format_args!(
                    "dictionary update sequence element #{index} has length {}; 2 is required",
                    items.len()
                ))
            })?;
            dict.insert(key, value)?;
        }
        Ok(dict)
    }
}

/// Calls a `dict` method.
pub(crate) fn call_method(dict: &DictRef, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "get" => {
            let [key, default] = args.bind("get", ["key", "default"], 1)?;
            let key = key.unwrap_or(Value::None);
            Ok(dict.borrow().get(&key)?.or(default).unwrap_or(Value::None))
        }
        "keys" => {
            args.check_zero_args("dict.keys")?;
            Ok(Value::list(dict.borrow().keys().cloned().collect()))
        }
        "values" => {
            args.check_zero_args("dict.values")?;
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }
        "items" => {
            args.check_zero_args("dict.items")?;
            let items = dict
                .borrow()
                .items()
                .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                .collect();
            Ok(Value::list(items))
        }
        "pop" => {
            let [key, default] = args.bind("pop", ["key", "default"], 1)?;
            let key = key.unwrap_or(Value::None);
            let removed = dict.borrow_mut().remove(&key)?;
            match (removed, default) {
                (Some(value), _) | (None, Some(value)) => Ok(value),
                (None, None) => Err(ExcType::key_error(key.py_repr())),
            }
        }
        "popitem" => {
            args.check_zero_args("dict.popitem")?;
            match dict.borrow_mut().pop_last() {
                Some((k, v)) => Ok(Value::tuple(vec![k, v])),
                None => Err(ExcType::key_error("'popitem(): dictionary is empty'".to_owned())),
            }
        }
        "setdefault" => {
            let [key, default] = args.bind("setdefault", ["key", "default"], 1)?;
            let key = key.unwrap_or(Value::None);
            let existing = dict.borrow().get(&key)?;
            if let Some(value) = existing {
                return Ok(value);
            }
            let value = default.unwrap_or(Value::None);
            dict.borrow_mut().insert(key, value.clone())?;
            Ok(value)
        }
        "update" => {
            let CallArgs { positional, keywords } = args;
            if positional.len() > 1 {
                return Err(ExcType::at_most("update", 1, positional.len()));
            }
            let mut updates = match positional.first() {
                Some(other) => Dict::from_pairs(other)?,
                None => Dict::new(),
            };
            for (key, value) in keywords {
                updates.set_str(&key, value);
            }
            let mut target = dict.borrow_mut();
            for (key, value) in updates.items() {
                target.insert(key.clone(), value.clone())?;
            }
            Ok(Value::None)
        }
        "copy" => {
            args.check_zero_args("dict.copy")?;
            Ok(Value::dict(dict.borrow().clone()))
        }
        "clear" => {
            args.check_zero_args("dict.clear")?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("dict", name)),
    }
}
