use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

use crate::paths::{join, segments};
use crate::subscriptions::{Subscribers, publish};
use crate::tree;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

/// Key-path JSON store with realtime-database semantics.
///
/// Paths are `/`-separated. Arrays are stored as numerically keyed children
/// and read back as arrays when the keys are exactly `0..n`. Writing `null`
/// (or an empty object) removes the node.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Read the subtree at `path`, or `None` if nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the subtree at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn set(&self, path: &str, value: Value) -> Result<(), StorageError>;

    /// Shallow merge: each key of `fields` (itself possibly a nested path such
    /// as `completedQuizzes/q1`) replaces that child. Applied atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StorageError>;

    /// Listen to `path`. The receiver holds the current value and observes
    /// every later change.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn subscribe(&self, path: &str) -> Result<watch::Receiver<Option<Value>>, StorageError>;

    /// Store `value` under a freshly generated, time-ordered child key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn push(&self, path: &str, value: Value) -> Result<String, StorageError> {
        let key = new_push_key();
        self.set(&join(path, &key), value).await?;
        Ok(key)
    }

    /// # Errors
    ///
    /// Returns `StorageError` for invalid paths or backend failures.
    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.set(path, Value::Null).await
    }
}

/// Generated keys sort in creation order.
#[must_use]
pub fn new_push_key() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// Resolves every `update` field to its absolute segments and stored value.
pub(crate) fn update_entries(
    path: &str,
    fields: Map<String, Value>,
) -> Result<Vec<(Vec<String>, Option<Value>)>, StorageError> {
    let base = segments(path)?;
    fields
        .into_iter()
        .map(|(key, value)| {
            let child = segments(&key)?;
            if child.is_empty() {
                return Err(StorageError::InvalidPath(key));
            }
            let mut segs = base.clone();
            segs.extend(child);
            Ok((segs, tree::normalize(value)))
        })
        .collect()
}

/// A scalar cannot replace the whole tree.
pub(crate) fn check_root_value(
    segs: &[String],
    value: Option<&Value>,
) -> Result<(), StorageError> {
    if segs.is_empty() && value.is_some_and(|v| !v.is_object()) {
        return Err(StorageError::InvalidPath(String::new()));
    }
    Ok(())
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// In-memory store for tests, demos and anonymous runs.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    root: Arc<Mutex<Map<String, Value>>>,
    subscribers: Arc<Subscribers>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(root: &Map<String, Value>, segs: &[String]) -> Option<Value> {
        if segs.is_empty() {
            return (!root.is_empty()).then(|| tree::to_wire(&Value::Object(root.clone())));
        }
        tree::get(root, segs).map(tree::to_wire)
    }

    fn write(&self, entries: Vec<(Vec<String>, Option<Value>)>) -> Result<(), StorageError> {
        let written: Vec<Vec<String>> = entries.iter().map(|(segs, _)| segs.clone()).collect();
        let notifications = {
            let mut guard = self
                .root
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            for (segs, value) in entries {
                if segs.is_empty() {
                    *guard = match value {
                        Some(Value::Object(map)) => map,
                        _ => Map::new(),
                    };
                } else {
                    tree::put(&mut guard, &segs, value);
                }
            }
            self.subscribers
                .affected(&written)?
                .into_iter()
                .map(|(segs, sender)| (sender, Self::read(&guard, &segs)))
                .collect::<Vec<_>>()
        };
        for (sender, value) in notifications {
            publish(&sender, value);
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeStore for InMemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let segs = segments(path)?;
        let guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::read(&guard, &segs))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StorageError> {
        let segs = segments(path)?;
        let value = tree::normalize(value);
        check_root_value(&segs, value.as_ref())?;
        self.write(vec![(segs, value)])
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StorageError> {
        let entries = update_entries(path, fields)?;
        if entries.is_empty() {
            return Ok(());
        }
        self.write(entries)
    }

    async fn subscribe(&self, path: &str) -> Result<watch::Receiver<Option<Value>>, StorageError> {
        let segs = segments(path)?;
        let guard = self
            .root
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let current = Self::read(&guard, &segs);
        self.subscribers.register(segs, current)
    }
}

/// Shared handle to whichever store backend the process uses.
#[derive(Clone)]
pub struct Storage {
    pub store: Arc<dyn RealtimeStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
        }
    }
}
