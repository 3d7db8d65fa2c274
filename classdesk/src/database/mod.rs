//! Remote document store
//!
//! This module provides the shared-entity storage layer:
//! - The backend-neutral [`DocumentStore`] interface (collection + id addressing)
//! - Backends: hosted Firestore over REST, and a self-hosted SQLite store
//! - Entity definitions and the typed [`Repository`] on top of any backend
//!
//! Documents cross the backend boundary as untyped JSON maps. Conversion
//! into entities happens in one place, [`Document::decode`], so missing or
//! malformed fields fail loudly instead of producing half-filled records.

pub mod firestore;
pub mod models;
pub mod repository;
pub mod schema;
pub mod sqlite_store;

pub use firestore::FirestoreStore;
pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;
pub use sqlite_store::SqliteDocumentStore;

use crate::config::RemoteConfig;
use crate::error::{Result, StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinSet;

/// Field map of a stored document
pub type Fields = serde_json::Map<String, Value>;

/// A document as returned by a backend, before typed decoding
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode into an entity. The document id becomes the entity's `id`,
    /// replacing any stored field of that name.
    pub fn decode<T: DeserializeOwned>(self, collection: &str) -> StoreResult<T> {
        let Document { id, mut fields } = self;
        fields.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| StoreError::Decode {
            collection: collection.to_string(),
            id,
            source,
        })
    }
}

/// Encode an entity or patch as document fields. Any `id` field is dropped:
/// ids are addresses, not content.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(StoreError::Encode(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Conjunction of field filters with an optional single-field sort
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Equal, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }
}

/// Collection-addressed document storage.
///
/// Every call is a single attempt: failures come back as [`StoreError`]
/// without retries. Implementations are cheap to clone and shareable
/// across tasks.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Insert a new document; the store assigns and returns its id.
    fn add(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl Future<Output = StoreResult<String>> + Send;

    /// Fetch one document, `None` if it does not exist.
    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Fetch every document of a collection in store-defined order.
    fn list(&self, collection: &str) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Merge top-level fields into an existing document.
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete a document. Deleting a missing document succeeds.
    fn delete(&self, collection: &str, id: &str) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Backend chosen at startup
#[derive(Clone)]
pub enum RemoteStore {
    Firestore(FirestoreStore),
    Sqlite(SqliteDocumentStore),
}

impl RemoteStore {
    /// Connect to the backend named by the configuration
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        match config {
            RemoteConfig::Firestore(firebase) => {
                tracing::info!("Using Firestore project: {}", firebase.project_id);
                Ok(RemoteStore::Firestore(FirestoreStore::new(firebase.clone())?))
            }
            RemoteConfig::Sqlite { path } => {
                let pool = create_pool(path).await?;
                Ok(RemoteStore::Sqlite(SqliteDocumentStore::new(pool)))
            }
        }
    }
}

impl DocumentStore for RemoteStore {
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        match self {
            RemoteStore::Firestore(store) => store.add(collection, fields).await,
            RemoteStore::Sqlite(store) => store.add(collection, fields).await,
        }
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        match self {
            RemoteStore::Firestore(store) => store.get(collection, id).await,
            RemoteStore::Sqlite(store) => store.get(collection, id).await,
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        match self {
            RemoteStore::Firestore(store) => store.list(collection).await,
            RemoteStore::Sqlite(store) => store.list(collection).await,
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        match self {
            RemoteStore::Firestore(store) => store.query(collection, query).await,
            RemoteStore::Sqlite(store) => store.query(collection, query).await,
        }
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        match self {
            RemoteStore::Firestore(store) => store.update(collection, id, fields).await,
            RemoteStore::Sqlite(store) => store.update(collection, id, fields).await,
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        match self {
            RemoteStore::Firestore(store) => store.delete(collection, id).await,
            RemoteStore::Sqlite(store) => store.delete(collection, id).await,
        }
    }
}

/// Run independent store requests concurrently and wait for all of them.
///
/// Results arrive in completion order. The first failure is returned at
/// once; requests still in flight are detached rather than aborted, and
/// requests that already completed keep their effect.
pub async fn join_all<T, F>(tasks: impl IntoIterator<Item = F>) -> StoreResult<Vec<T>>
where
    T: Send + 'static,
    F: Future<Output = StoreResult<T>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task);
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(e)) => {
                set.detach_all();
                return Err(e);
            }
            Err(e) => {
                set.detach_all();
                return Err(StoreError::Task(e));
            }
        }
    }

    Ok(results)
}

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
        },
    )
}

/// Create and initialize a connection pool for the SQLite document store.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path).map_err(StoreError::from)?)
        .await
        .map_err(StoreError::from)?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path).map_err(StoreError::from)?)
        .await
        .map_err(StoreError::from)?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}
