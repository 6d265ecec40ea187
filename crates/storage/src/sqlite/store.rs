use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::watch;

use crate::paths::segments;
use crate::repository::{RealtimeStore, StorageError, check_root_value, update_entries};
use crate::subscriptions::publish;
use crate::tree;

use super::SqliteStore;

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

impl SqliteStore {
    async fn read_at(&self, segs: &[String]) -> Result<Option<Value>, StorageError> {
        let rows = if segs.is_empty() {
            sqlx::query("SELECT path, value FROM nodes")
                .fetch_all(&self.pool)
                .await
                .map_err(conn)?
        } else {
            sqlx::query(
                r"
                SELECT path, value
                FROM nodes
                WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'
                ",
            )
            .bind(segs.join("/"))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?
        };

        let mut leaves = Vec::with_capacity(rows.len());
        for row in rows {
            let path: String = row.try_get("path").map_err(ser)?;
            let raw: String = row.try_get("value").map_err(ser)?;
            let leaf: Value = serde_json::from_str(&raw).map_err(ser)?;
            leaves.push((path.split('/').map(str::to_string).collect(), leaf));
        }
        Ok(tree::unflatten(segs, leaves).map(|v| tree::to_wire(&v)))
    }

    async fn replace_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        segs: &[String],
        value: Option<&Value>,
    ) -> Result<(), StorageError> {
        let path = segs.join("/");
        if segs.is_empty() {
            sqlx::query("DELETE FROM nodes")
                .execute(&mut **tx)
                .await
                .map_err(conn)?;
        } else {
            sqlx::query(
                r"
                DELETE FROM nodes
                WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'
                ",
            )
            .bind(&path)
            .execute(&mut **tx)
            .await
            .map_err(conn)?;

            // A leaf on the way down would shadow the new subtree.
            for depth in 1..segs.len() {
                sqlx::query("DELETE FROM nodes WHERE path = ?1")
                    .bind(segs[..depth].join("/"))
                    .execute(&mut **tx)
                    .await
                    .map_err(conn)?;
            }
        }

        let Some(value) = value else {
            return Ok(());
        };
        let mut rows = Vec::new();
        tree::flatten(&path, value, &mut rows);
        for (leaf_path, leaf) in rows {
            sqlx::query("INSERT INTO nodes (path, value) VALUES (?1, ?2)")
                .bind(leaf_path)
                .bind(leaf)
                .execute(&mut **tx)
                .await
                .map_err(conn)?;
        }
        Ok(())
    }

    async fn write(&self, entries: Vec<(Vec<String>, Option<Value>)>) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for (segs, value) in &entries {
            Self::replace_in_tx(&mut tx, segs, value.as_ref()).await?;
        }
        tx.commit().await.map_err(conn)?;

        let written: Vec<Vec<String>> = entries.into_iter().map(|(segs, _)| segs).collect();
        for (segs, sender) in self.subscribers.affected(&written)? {
            let value = self.read_at(&segs).await?;
            publish(&sender, value);
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let segs = segments(path)?;
        self.read_at(&segs).await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StorageError> {
        let segs = segments(path)?;
        let value = tree::normalize(value);
        check_root_value(&segs, value.as_ref())?;
        self.write(vec![(segs, value)]).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StorageError> {
        let entries = update_entries(path, fields)?;
        if entries.is_empty() {
            return Ok(());
        }
        self.write(entries).await
    }

    async fn subscribe(&self, path: &str) -> Result<watch::Receiver<Option<Value>>, StorageError> {
        let segs = segments(path)?;
        let current = self.read_at(&segs).await?;
        self.subscribers.register(segs, current)
    }
}
