//! The message store: append and full-scan read over a single table.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::debug;

/// A stored message.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    /// Assigned by the store, strictly increasing.
    pub id: i64,
    /// The message as received.
    pub text: String,
}

/// Storage faults.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The schema could not be brought up to date.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Append-only storage for [`Message`]s.
///
/// Implementations are shared by every worker, and must handle concurrent
/// calls on their own.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends `text`, returning the stored record with its new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    async fn insert(&self, text: &str) -> Result<Message, StoreError>;

    /// Returns every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    async fn list(&self) -> Result<Vec<Message>, StoreError>;
}

/// [`MessageStore`] over SQLite.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens a pool on `url`, creating the database file if needed.
    ///
    /// Connections are never recycled, so an in-memory database lives as long
    /// as the pool does. Use a single connection for `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database can't be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        debug!(url, max_connections, "Opened message store");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Closes every connection. Later calls fail with a database error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(&self, text: &str) -> Result<Message, StoreError> {
        let message =
            sqlx::query_as::<_, Message>("INSERT INTO messages (text) VALUES (?) RETURNING id, text")
                .bind(text)
                .fetch_one(&self.pool)
                .await?;
        Ok(message)
    }

    async fn list(&self) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>("SELECT id, text FROM messages ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:", 1)
            .await
            .expect("in-memory database to open");
        store.migrate().await.expect("migrations to apply");
        store
    }

    #[actix_web::test]
    async fn empty_store_lists_nothing() {
        let store = memory_store().await;
        assert!(store.list().await.expect("list to work").is_empty());
    }

    #[actix_web::test]
    async fn ids_increase_in_insertion_order() {
        let store = memory_store().await;
        let first = store.insert("first").await.expect("insert to work");
        let second = store.insert("second").await.expect("insert to work");
        let again = store.insert("first").await.expect("duplicates allowed");

        assert!(first.id < second.id && second.id < again.id);

        let texts: Vec<_> = store
            .list()
            .await
            .expect("list to work")
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["first", "second", "first"]);
    }

    #[actix_web::test]
    async fn migrations_are_idempotent() {
        let store = memory_store().await;
        store.insert("kept").await.expect("insert to work");
        store.migrate().await.expect("second run to be a no-op");
        assert_eq!(store.list().await.expect("list to work").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_get_distinct_ids() {
        let store = memory_store().await;
        let (a, b, c, d) = tokio::join!(
            store.insert("a"),
            store.insert("b"),
            store.insert("c"),
            store.insert("d"),
        );
        let mut ids: Vec<_> = [a, b, c, d]
            .into_iter()
            .map(|m| m.expect("insert to work").id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);

        let listed: Vec<_> = store
            .list()
            .await
            .expect("list to work")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[actix_web::test]
    async fn closed_store_fails() {
        let store = memory_store().await;
        store.close().await;
        assert!(matches!(
            store.insert("lost").await,
            Err(StoreError::Database(_))
        ));
        assert!(matches!(store.list().await, Err(StoreError::Database(_))));
    }
}
