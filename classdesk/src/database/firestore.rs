//! Hosted document store over the Firestore v1 REST API
//!
//! Documents travel as Firestore "typed values" (`{"stringValue": "..."}`,
//! `{"integerValue": "12"}`, ...). This module converts them to and from
//! plain JSON so the rest of the crate never sees the wire encoding.
//!
//! Endpoints used, relative to `.../databases/{db}/documents`:
//! - `POST /{collection}` create with an auto-id
//! - `GET /{collection}/{id}` read
//! - `GET /{collection}?pageSize=..&pageToken=..` list
//! - `POST :runQuery` filtered/sorted reads
//! - `PATCH /{collection}/{id}?updateMask.fieldPaths=..` merge
//! - `DELETE /{collection}/{id}`

use super::{Direction, Document, DocumentStore, FieldFilter, Fields, FilterOp, Query};
use crate::config::{FirebaseConfig, LIST_PAGE_SIZE};
use crate::error::{Result, StoreError, StoreResult};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

/// Firestore REST client for one project database
#[derive(Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    documents_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

impl WireDocument {
    fn into_document(self) -> StoreResult<Document> {
        let id = document_id(&self.name)?;
        Ok(Document::new(id, decode_fields(&self.fields)?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// One element of a `runQuery` response stream. Entries that only carry a
/// `readTime` have no document.
#[derive(Debug, Deserialize)]
struct RunQueryEntry {
    #[serde(default)]
    document: Option<WireDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl FirestoreStore {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("classdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::from)?;

        Ok(Self {
            client,
            documents_url: config.documents_url(),
            api_key: config.api_key,
        })
    }

    fn collection_url(&self, collection: &str) -> StoreResult<String> {
        Ok(format!("{}/{}", self.documents_url, path_segment(collection)?))
    }

    fn document_url(&self, collection: &str, id: &str) -> StoreResult<String> {
        Ok(format!(
            "{}/{}",
            self.collection_url(collection)?,
            path_segment(id)?
        ))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.api_key.as_str())])
        }
    }

    /// Send a request and turn non-success statuses into errors.
    /// A 404 on a document address becomes [`StoreError::NotFound`].
    async fn send(
        &self,
        request: RequestBuilder,
        target: Option<(&str, &str)>,
    ) -> StoreResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some((collection, id)) = target {
                return Err(StoreError::not_found(collection, id));
            }
        }

        let body = response.text().await.map_err(|e| {
            tracing::warn!("Failed to read error body for status {}: {}", status, e);
            StoreError::from(e)
        })?;
        Err(remote_error(status.as_u16(), &body))
    }
}

impl DocumentStore for FirestoreStore {
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let body = json!({ "fields": encode_fields(&fields)? });
        let request = self.client.post(self.collection_url(collection)?).json(&body);

        let created: WireDocument = self.send(request, None).await?.json().await?;
        let id = document_id(&created.name)?;

        tracing::debug!("Created document: {}/{}", collection, id);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let request = self.client.get(self.document_url(collection, id)?);

        match self.send(request, Some((collection, id))).await {
            Ok(response) => {
                let wire: WireDocument = response.json().await?;
                Ok(Some(wire.into_document()?))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let url = self.collection_url(collection)?;
        let page_size = LIST_PAGE_SIZE.to_string();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("pageSize", page_size.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListResponse = self.send(request, None).await?.json().await?;
            for wire in page.documents {
                documents.push(wire.into_document()?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let body = structured_query(collection, query)?;
        let request = self
            .client
            .post(format!("{}:runQuery", self.documents_url))
            .json(&body);

        let entries: Vec<RunQueryEntry> = self.send(request, None).await?.json().await?;
        entries
            .into_iter()
            .filter_map(|entry| entry.document)
            .map(WireDocument::into_document)
            .collect()
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        // An empty update mask would overwrite the whole document
        if fields.is_empty() {
            return match self.get(collection, id).await? {
                Some(_) => Ok(()),
                None => Err(StoreError::not_found(collection, id)),
            };
        }

        let mut request = self
            .client
            .patch(self.document_url(collection, id)?)
            .query(&[("currentDocument.exists", "true")]);
        for field in fields.keys() {
            request = request.query(&[("updateMask.fieldPaths", field_path(field))]);
        }
        let body = json!({ "fields": encode_fields(&fields)? });

        self.send(request.json(&body), Some((collection, id)))
            .await?;

        tracing::debug!("Updated document: {}/{}", collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let request = self.client.delete(self.document_url(collection, id)?);
        self.send(request, None).await?;

        tracing::debug!("Deleted document: {}/{}", collection, id);
        Ok(())
    }
}

fn path_segment(segment: &str) -> StoreResult<&str> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StoreError::Encode(format!(
            "invalid collection or document id: '{}'",
            segment
        )));
    }
    Ok(segment)
}

/// Last segment of `projects/{p}/databases/{d}/documents/{collection}/{id}`
fn document_id(name: &str) -> StoreResult<String> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Protocol(format!("document name without id: '{}'", name)))
}

/// Plain identifiers pass through; anything else is backtick-quoted.
fn field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn remote_error(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => StoreError::Remote {
            status,
            code: parsed.error.status,
            message: parsed.error.message,
        },
        Err(_) => StoreError::Remote {
            status,
            code: String::new(),
            message: body.trim().to_string(),
        },
    }
}

fn encode_fields(fields: &Fields) -> StoreResult<Value> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), encode_value(value)?)))
        .collect::<StoreResult<serde_json::Map<_, _>>>()
        .map(Value::Object)
}

fn decode_fields(fields: &serde_json::Map<String, Value>) -> StoreResult<Fields> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Plain JSON to a Firestore typed value
fn encode_value(value: &Value) -> StoreResult<Value> {
    Ok(match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if n.is_u64() {
                return Err(StoreError::Encode(format!(
                    "integer {} does not fit in 64 signed bits",
                    n
                )));
            } else {
                json!({ "doubleValue": n })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values = items
                .iter()
                .map(encode_value)
                .collect::<StoreResult<Vec<_>>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map)? } }),
    })
}

/// Firestore typed value to plain JSON. Timestamps, references and bytes
/// come back as their string forms.
fn decode_value(value: &Value) -> StoreResult<Value> {
    let unexpected = || StoreError::Protocol(format!("unsupported value: {}", value));

    let Value::Object(typed) = value else {
        return Err(unexpected());
    };
    let Some((kind, inner)) = typed.iter().next() else {
        return Err(unexpected());
    };

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(unexpected)?),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            Value::from(parsed.ok_or_else(unexpected)?)
        }
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            _ => return Err(unexpected()),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().ok_or_else(unexpected)?.to_string())
        }
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<StoreResult<Vec<_>>>()?,
                Some(_) => return Err(unexpected()),
                None => Vec::new(),
            };
            Value::Array(values)
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => Value::Object(decode_fields(fields)?),
            Some(_) => return Err(unexpected()),
            None => Value::Object(Fields::new()),
        },
        _ => return Err(unexpected()),
    })
}

fn op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Equal => "EQUAL",
        FilterOp::LessThan => "LESS_THAN",
        FilterOp::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        FilterOp::GreaterThan => "GREATER_THAN",
        FilterOp::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
    }
}

fn encode_filter(filter: &FieldFilter) -> StoreResult<Value> {
    let field = json!({ "fieldPath": field_path(&filter.field) });

    if filter.value.is_null() {
        return match filter.op {
            FilterOp::Equal => Ok(json!({ "unaryFilter": { "op": "IS_NULL", "field": field } })),
            _ => Err(StoreError::Encode(format!(
                "null only supports equality (field '{}')",
                filter.field
            ))),
        };
    }

    Ok(json!({
        "fieldFilter": {
            "field": field,
            "op": op_name(filter.op),
            "value": encode_value(&filter.value)?,
        }
    }))
}

/// Request body for `:runQuery`
fn structured_query(collection: &str, query: &Query) -> StoreResult<Value> {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    let mut filters = query
        .filters
        .iter()
        .map(encode_filter)
        .collect::<StoreResult<Vec<_>>>()?;
    if filters.len() == 1 {
        structured["where"] = filters.remove(0);
    } else if !filters.is_empty() {
        structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } });
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field_path(&order.field) },
            "direction": direction,
        }]);
    }

    Ok(json!({ "structuredQuery": structured }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_document_fields() {
        let fields = match json!({
            "name": "5-A",
            "totalStudents": 24,
            "ratio": 0.5,
            "active": true,
            "note": null,
            "tags": ["math"],
            "notifications": { "email": false }
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        assert_eq!(
            encode_fields(&fields).unwrap(),
            json!({
                "name": { "stringValue": "5-A" },
                "totalStudents": { "integerValue": "24" },
                "ratio": { "doubleValue": 0.5 },
                "active": { "booleanValue": true },
                "note": { "nullValue": null },
                "tags": { "arrayValue": { "values": [{ "stringValue": "math" }] } },
                "notifications": {
                    "mapValue": { "fields": { "email": { "booleanValue": false } } }
                }
            })
        );
    }

    #[test]
    fn test_decode_wire_document() {
        let wire: WireDocument = serde_json::from_value(json!({
            "name": "projects/demo/databases/(default)/documents/classes/Ab12Cd",
            "fields": {
                "name": { "stringValue": "5-A" },
                "totalStudents": { "integerValue": "24" },
                "createdAt": { "timestampValue": "2024-01-15T08:00:00Z" },
                "tags": { "arrayValue": {} },
                "meta": { "mapValue": {} }
            },
            "createTime": "2024-01-15T08:00:00.000000Z",
            "updateTime": "2024-01-15T08:00:00.000000Z"
        }))
        .unwrap();

        let doc = wire.into_document().unwrap();
        assert_eq!(doc.id, "Ab12Cd");
        assert_eq!(doc.fields["totalStudents"], json!(24));
        assert_eq!(doc.fields["createdAt"], json!("2024-01-15T08:00:00Z"));
        assert_eq!(doc.fields["tags"], json!([]));
        assert_eq!(doc.fields["meta"], json!({}));
    }

    #[test]
    fn test_decode_rejects_unknown_value_kind() {
        let err = decode_value(&json!({ "mysteryValue": 1 })).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));

        let err = decode_value(&json!({ "integerValue": "twelve" })).unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[test]
    fn test_encode_rejects_oversized_integer() {
        assert!(encode_value(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_structured_query_single_filter_with_order() {
        let query = Query::new()
            .where_eq("classId", "c1")
            .order_by("firstName", Direction::Ascending);

        assert_eq!(
            structured_query("students", &query).unwrap(),
            json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "students" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "classId" },
                            "op": "EQUAL",
                            "value": { "stringValue": "c1" }
                        }
                    },
                    "orderBy": [{
                        "field": { "fieldPath": "firstName" },
                        "direction": "ASCENDING"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_structured_query_composite_filter() {
        let query = Query::new()
            .where_eq("date", "2024-01-15")
            .where_eq("classId", "c1");

        let body = structured_query("attendance", &query).unwrap();
        let composite = &body["structuredQuery"]["where"]["compositeFilter"];
        assert_eq!(composite["op"], json!("AND"));
        assert_eq!(composite["filters"].as_array().unwrap().len(), 2);
        assert!(body["structuredQuery"].get("orderBy").is_none());
    }

    #[test]
    fn test_null_filter_uses_unary_filter() {
        let query = Query::new().where_eq("note", Value::Null);
        let body = structured_query("attendance", &query).unwrap();
        assert_eq!(
            body["structuredQuery"]["where"],
            json!({ "unaryFilter": { "op": "IS_NULL", "field": { "fieldPath": "note" } } })
        );

        let range = Query::new().filter("note", FilterOp::LessThan, Value::Null);
        assert!(structured_query("attendance", &range).is_err());
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("firstName"), "firstName");
        assert_eq!(field_path("_private2"), "_private2");
        assert_eq!(field_path("first name"), "`first name`");
        assert_eq!(field_path("2nd"), "`2nd`");
    }

    #[test]
    fn test_path_segments_reject_slashes() {
        assert!(path_segment("classes").is_ok());
        assert!(path_segment("a/b").is_err());
        assert!(path_segment("").is_err());
    }

    #[test]
    fn test_run_query_entries_without_documents() {
        let entries: Vec<RunQueryEntry> =
            serde_json::from_value(json!([{ "readTime": "2024-01-15T08:00:00Z" }])).unwrap();
        assert!(entries[0].document.is_none());
    }

    #[test]
    fn test_list_response_defaults() {
        let page: ListResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_remote_error_parsing() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        match remote_error(403, body) {
            StoreError::Remote {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "PERMISSION_DENIED");
                assert_eq!(message, "Missing or insufficient permissions.");
            }
            other => panic!("unexpected error: {other}"),
        }

        match remote_error(502, "Bad Gateway\n") {
            StoreError::Remote { code, message, .. } => {
                assert!(code.is_empty());
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn test_store(endpoint: &str) -> FirestoreStore {
        FirestoreStore::new(FirebaseConfig {
            api_key: "key".to_string(),
            auth_domain: String::new(),
            project_id: "demo".to_string(),
            storage_bucket: String::new(),
            messaging_sender_id: String::new(),
            app_id: String::new(),
            endpoint: Some(endpoint.to_string()),
            database_id: "(default)".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_document_urls() {
        let store = test_store("http://localhost:8080/v1");

        assert_eq!(
            store.document_url("classes", "abc").unwrap(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/classes/abc"
        );
    }

    #[tokio::test]
    async fn test_truncated_error_body_is_http_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // Promise more body than is sent, then hang up
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let store = test_store(&format!("http://{}/v1", addr));
        let result = store.get("classes", "abc").await;
        server.await.unwrap();

        match result {
            Err(StoreError::Http(_)) => {}
            other => panic!("expected an HTTP error, got {other:?}"),
        }
    }
}
