//! The persisted workspace: context, buffers, variables and an optional repository index.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    persist::{Persist, StoredValue},
    repo_index::RepoIndex,
    types::Dict,
    value::{DictRef, Value},
};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Seconds since the Unix epoch, with sub-second precision.
#[must_use]
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The material snippets inspect.
///
/// Snippets see it as a dict; keys other than `path`, `loaded_at` and `content` that they add
/// are kept in `extra` when persistable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub path: String,
    pub loaded_at: f64,
    /// Empty in repository mode.
    pub content: String,
    pub extra: IndexMap<String, StoredValue>,
}

impl Context {
    #[must_use]
    pub fn new(path: impl Into<String>, content: String) -> Self {
        Self {
            path: path.into(),
            loaded_at: unix_now(),
            content,
            extra: IndexMap::new(),
        }
    }

    /// Builds the `context` dict for a namespace.
    #[must_use]
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        dict.set_str("path", Value::from(self.path.as_str()));
        dict.set_str("loaded_at", Value::Float(self.loaded_at));
        dict.set_str("content", Value::from(self.content.as_str()));
        for (key, stored) in &self.extra {
            match stored.restore() {
                Ok(value) => dict.set_str(key, value),
                Err(err) => tracing::debug!(key = %key, error = %err, "dropping context entry"),
            }
        }
        dict
    }

    /// Reads a context back from a snippet's dict.
    ///
    /// Returns `None` unless the dict still has a string `content`. `path` and `loaded_at` keep
    /// their previous values when missing or retyped; unpersistable or non-string keys are dropped.
    #[must_use]
    pub fn from_dict(dict: &DictRef, previous: &Self) -> Option<Self> {
        let dict = dict.borrow();
        let content = dict.get_str("content")?.as_str()?.to_owned();
        let path = dict
            .get_str("path")
            .and_then(Value::as_str)
            .map_or_else(|| previous.path.clone(), str::to_owned);
        let loaded_at = match dict.get_str("loaded_at") {
            Some(Value::Float(f)) => *f,
            Some(Value::Int(i)) => *i as f64,
            _ => previous.loaded_at,
        };
        let mut extra = IndexMap::new();
        for (key, value) in dict.items() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if matches!(key, "path" | "loaded_at" | "content") {
                continue;
            }
            match value.persist() {
                Ok(stored) => {
                    extra.insert(key.to_owned(), stored);
                }
                Err(err) => tracing::debug!(key = %key, error = %err, "dropping context entry"),
            }
        }
        Some(Self {
            path,
            loaded_at,
            content,
            extra,
        })
    }
}

/// Everything that survives between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub context: Context,
    pub buffers: Vec<String>,
    /// Persisted variables in first-assignment order.
    pub globals: IndexMap<String, StoredValue>,
    pub repo_index: Option<RepoIndex>,
}

impl Snapshot {
    /// A fresh workspace over `context`.
    #[must_use]
    pub fn new(context: Context, repo_index: Option<RepoIndex>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            context,
            buffers: Vec::new(),
            globals: IndexMap::new(),
            repo_index,
        }
    }
}
