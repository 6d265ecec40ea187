#![forbid(unsafe_code)]

pub mod paths;
pub mod records;
pub mod repository;
pub mod sqlite;

mod subscriptions;
mod tree;

pub use repository::{InMemoryStore, RealtimeStore, Storage, StorageError};
