use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;

use crate::repository::StorageError;

type Sender = Arc<watch::Sender<Option<Value>>>;

struct Subscription {
    segs: Vec<String>,
    sender: Sender,
}

/// Live listeners keyed by path, shared by every backend.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Mutex<Vec<Subscription>>,
}

impl Subscribers {
    pub(crate) fn register(
        &self,
        segs: Vec<String>,
        initial: Option<Value>,
    ) -> Result<watch::Receiver<Option<Value>>, StorageError> {
        let (sender, receiver) = watch::channel(initial);
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(Subscription {
            segs,
            sender: Arc::new(sender),
        });
        Ok(receiver)
    }

    /// Listeners whose path overlaps any written path. Closed ones are dropped.
    pub(crate) fn affected(
        &self,
        written: &[Vec<String>],
    ) -> Result<Vec<(Vec<String>, Sender)>, StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|sub| !sub.sender.is_closed());
        Ok(guard
            .iter()
            .filter(|sub| written.iter().any(|w| overlaps(&sub.segs, w)))
            .map(|sub| (sub.segs.clone(), Arc::clone(&sub.sender)))
            .collect())
    }
}

/// Pushes `value` to a listener unless it already holds it.
pub(crate) fn publish(sender: &Sender, value: Option<Value>) {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

/// True when one path is an ancestor of (or equal to) the other.
fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}
