//! Self-hosted document store on SQLite
//!
//! Stores each document as a JSON body in the `documents` table. Used when
//! no hosted project is configured, and as the store behind the tests.
//! Ids are random 20-character alphanumerics, the same shape the hosted
//! store hands out.

use super::{Direction, Document, DocumentStore, FieldFilter, Fields, FilterOp, Query};
use crate::config::DOCUMENT_ID_LENGTH;
use crate::database::schema::initialize_database;
use crate::error::{Result, StoreError, StoreResult};
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Document store backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Private in-memory store on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::from)?;

        initialize_database(&pool).await?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..DOCUMENT_ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn parse_fields(collection: &str, id: &str, data: &str) -> StoreResult<Fields> {
    serde_json::from_str(data).map_err(|source| StoreError::Decode {
        collection: collection.to_string(),
        id: id.to_string(),
        source,
    })
}

fn to_documents(collection: &str, rows: Vec<(String, String)>) -> StoreResult<Vec<Document>> {
    rows.into_iter()
        .map(|(id, data)| {
            let fields = parse_fields(collection, &id, &data)?;
            Ok(Document::new(id, fields))
        })
        .collect()
}

/// Comparison value as SQLite sees the result of `json_extract`
enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            // json_extract yields minified JSON text for containers
            other => SqlValue::Text(other.to_string()),
        }
    }
}

fn filter_clause(filter: &FieldFilter) -> StoreResult<&'static str> {
    if filter.value.is_null() {
        return match filter.op {
            FilterOp::Equal => Ok("json_type(data, ?) = 'null'"),
            _ => Err(StoreError::Encode(format!(
                "null only supports equality (field '{}')",
                filter.field
            ))),
        };
    }

    Ok(match filter.op {
        FilterOp::Equal => "json_extract(data, ?) = ?",
        FilterOp::LessThan => "json_extract(data, ?) < ?",
        FilterOp::LessThanOrEqual => "json_extract(data, ?) <= ?",
        FilterOp::GreaterThan => "json_extract(data, ?) > ?",
        FilterOp::GreaterThanOrEqual => "json_extract(data, ?) >= ?",
    })
}

impl DocumentStore for SqliteDocumentStore {
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = generate_id();
        let now = Utc::now();
        let data =
            serde_json::to_string(&fields).map_err(|e| StoreError::Encode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created document: {}/{}", collection, id);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        data.map(|data| Ok(Document::new(id, parse_fields(collection, id, &data)?)))
            .transpose()
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, data FROM documents WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        to_documents(collection, rows)
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        for filter in &query.filters {
            sql.push_str(" AND ");
            sql.push_str(filter_clause(filter)?);
        }
        match &query.order_by {
            Some(order) => {
                // Documents without the sort field are excluded, as on the hosted store
                sql.push_str(" AND json_type(data, ?) IS NOT NULL ORDER BY json_extract(data, ?)");
                sql.push_str(match order.direction {
                    Direction::Ascending => " ASC",
                    Direction::Descending => " DESC",
                });
                sql.push_str(", rowid");
            }
            None => sql.push_str(" ORDER BY rowid"),
        }

        let mut q = sqlx::query_as::<_, (String, String)>(&sql).bind(collection);
        for filter in &query.filters {
            q = q.bind(json_path(&filter.field));
            q = match SqlValue::from(&filter.value) {
                SqlValue::Null => q,
                SqlValue::Integer(i) => q.bind(i),
                SqlValue::Real(f) => q.bind(f),
                SqlValue::Text(s) => q.bind(s),
            };
        }
        if let Some(order) = &query.order_by {
            let path = json_path(&order.field);
            q = q.bind(path.clone()).bind(path);
        }

        let rows = q.fetch_all(&self.pool).await?;
        to_documents(collection, rows)
    }

    /// Replaces the given top-level fields in a single `json_set` statement.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        if fields.is_empty() {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM documents WHERE collection = ? AND id = ?")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            return match exists {
                Some(_) => Ok(()),
                None => Err(StoreError::not_found(collection, id)),
            };
        }

        let setters = vec!["?, json(?)"; fields.len()].join(", ");
        let sql = format!(
            "UPDATE documents SET data = json_set(data, {}), updated_at = ? WHERE collection = ? AND id = ?",
            setters
        );

        let mut query = sqlx::query(&sql);
        for (key, value) in &fields {
            let encoded =
                serde_json::to_string(value).map_err(|e| StoreError::Encode(e.to_string()))?;
            query = query.bind(json_path(key)).bind(encoded);
        }

        let result = query
            .bind(Utc::now())
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }

        tracing::debug!("Updated document: {}/{}", collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Deleted document: {}/{}", collection, id);
        Ok(())
    }
}
