//! Remote ANN backend speaking a Pinecone-style REST protocol.
//!
//! Records are sent as `{id, values, metadata}` where `metadata` is a flat
//! JSON object holding the chunk text and its metadata. The service returns
//! numbers as floats, so reading metadata back goes through the lenient
//! helpers at the bottom of this file rather than serde.

use async_trait::async_trait;
use ragcite_core::{
    Chunk, ChunkMetadata, ChunkMethod, EmbeddingRecord, ScopeFilter, SearchResult, StoreError,
    StoreStats, VectorBackend,
};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, info};

/// Maximum records per upsert request.
pub const MAX_UPSERT_BATCH: usize = 100;

/// Keys written by [`chunk_to_metadata`] that are not part of [`ChunkMetadata`].
const RESERVED_KEYS: [&str; 5] = [
    "document_id",
    "content",
    "chunk_index",
    "start_offset",
    "end_offset",
];

/// Connection settings for a remote index.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Index host, e.g. `https://my-index-abc123.svc.us-east1.pinecone.io`
    pub url: String,
    pub api_key: String,
    /// Namespace inside the index; empty means the default namespace
    pub namespace: String,
    pub timeout: Duration,
}

impl RemoteSettings {
    fn client(&self) -> Result<Client, StoreError> {
        if self.api_key.trim().is_empty() {
            return Err(StoreError::Init("missing vector service API key".to_string()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|e| StoreError::Init(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Init(format!("failed to build HTTP client: {e}")))
    }
}

/// Vector backend backed by a hosted ANN index.
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    namespace: String,
    dimension: usize,
}

impl RemoteBackend {
    /// Build a client for the index at `settings.url` holding `dimension`-sized vectors.
    pub fn new(settings: &RemoteSettings, dimension: usize) -> Result<Self, StoreError> {
        let client = settings.client()?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            namespace: settings.namespace.clone(),
            dimension,
        })
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url)
    }

    async fn post<T: Serialize + ?Sized>(&self, route: &str, body: &T) -> Result<Value, String> {
        let response = self
            .client
            .post(self.endpoint(route))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(format!("{status}: {body}"));
        }

        response
            .json()
            .await
            .map_err(|e| format!("invalid response from {route}: {e}"))
    }

    async fn describe(&self) -> Result<IndexStats, String> {
        let value = self.post("describe_index_stats", &json!({})).await?;
        serde_json::from_value(value).map_err(|e| format!("invalid index stats: {e}"))
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<RemoteVector>,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
}

#[derive(Serialize)]
struct RemoteVector {
    id: String,
    values: Vec<f32>,
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: Map<String, Value>,
}

impl IndexStats {
    fn count_for(&self, namespace: &str) -> u64 {
        if namespace.is_empty() {
            return self.total_vector_count;
        }
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.get("vectorCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(MAX_UPSERT_BATCH)
    }

    async fn init(&self) -> Result<(), StoreError> {
        let stats = self.describe().await.map_err(StoreError::Init)?;
        if let Some(dimension) = stats.dimension {
            if dimension != self.dimension {
                return Err(StoreError::Init(format!(
                    "index dimension is {dimension}, embedder produces {}",
                    self.dimension
                )));
            }
        }
        info!(
            "Connected to remote index {} ({} vectors)",
            self.base_url,
            stats.count_for(&self.namespace)
        );
        Ok(())
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<(), StoreError> {
        for batch in records.chunks(MAX_UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|record| RemoteVector {
                        id: record.id.clone(),
                        values: record.vector.clone(),
                        metadata: chunk_to_metadata(&record.chunk),
                    })
                    .collect(),
                namespace: &self.namespace,
            };
            self.post("vectors/upsert", &request)
                .await
                .map_err(|e| StoreError::Upsert(format!("Failed to upsert vectors: {e}")))?;
            debug!("Upserted {} records", batch.len());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: Option<&ScopeFilter>,
        k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            namespace: &self.namespace,
            filter: filter.map(filter_to_json),
        };
        let value = self
            .post("query", &request)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to execute search: {e}")))?;
        let response: QueryResponse = serde_json::from_value(value)
            .map_err(|e| StoreError::Query(format!("Failed to parse search results: {e}")))?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| SearchResult {
                chunk: chunk_from_metadata(m.id, &m.metadata),
                score: m.score,
            })
            .collect())
    }

    async fn delete(&self, filter: &ScopeFilter) -> Result<Option<u64>, StoreError> {
        let mut body = json!({ "filter": filter_to_json(filter) });
        if !self.namespace.is_empty() {
            body["namespace"] = Value::String(self.namespace.clone());
        }
        self.post("vectors/delete", &body)
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to delete vectors: {e}")))?;

        // The service does not report how many vectors matched
        debug!("Deleted records matching {:?}", filter);
        Ok(None)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let stats = self.describe().await.map_err(StoreError::Query)?;
        Ok(StoreStats {
            backend: self.name().to_string(),
            total_records: stats.count_for(&self.namespace),
            dimension: stats.dimension.or(Some(self.dimension)),
        })
    }
}

/// Translate a scope filter into the service's metadata filter language.
#[must_use]
pub fn filter_to_json(filter: &ScopeFilter) -> Value {
    match filter {
        ScopeFilter::Document { document_id } => json!({ "document_id": { "$eq": document_id } }),
        ScopeFilter::KnowledgeBase { knowledge_base_id } => {
            json!({ "knowledge_base_id": { "$eq": knowledge_base_id } })
        }
        ScopeFilter::Metadata { key, value } => {
            let value = match key.as_str() {
                "section" | "page_number" | "chunk_index" => value
                    .parse::<u64>()
                    .map_or_else(|_| Value::String(value.clone()), Value::from),
                "merged" => value
                    .parse::<bool>()
                    .map_or_else(|_| Value::String(value.clone()), Value::Bool),
                _ => Value::String(value.clone()),
            };
            let mut object = Map::new();
            object.insert(key.clone(), json!({ "$eq": value }));
            Value::Object(object)
        }
    }
}

/// Flatten a chunk into the metadata object stored next to its vector.
#[must_use]
pub fn chunk_to_metadata(chunk: &Chunk) -> Map<String, Value> {
    let mut map = match serde_json::to_value(&chunk.metadata) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    // Scores belong to a single query, not to the stored record
    map.remove("similarity_score");

    map.insert("document_id".into(), Value::String(chunk.document_id.clone()));
    map.insert("content".into(), Value::String(chunk.content.clone()));
    map.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    if let Some(start) = chunk.start_offset {
        map.insert("start_offset".into(), Value::from(start));
    }
    if let Some(end) = chunk.end_offset {
        map.insert("end_offset".into(), Value::from(end));
    }
    map
}

/// Rebuild a chunk from a stored metadata object.
#[must_use]
pub fn chunk_from_metadata(id: String, map: &Map<String, Value>) -> Chunk {
    let metadata = ChunkMetadata {
        section: get_u64(map, "section").map(|v| v as u32),
        section_title: get_string(map, "section_title"),
        method: map
            .get("method")
            .and_then(|v| serde_json::from_value::<ChunkMethod>(v.clone()).ok()),
        page_number: get_u64(map, "page_number").map(|v| v as u32),
        document_name: get_string(map, "document_name"),
        knowledge_base_id: get_string(map, "knowledge_base_id"),
        merged: map.get("merged").and_then(Value::as_bool).unwrap_or(false),
        similarity_score: None,
        extra: map
            .iter()
            .filter(|(key, _)| !is_known_key(key))
            .filter_map(|(key, value)| value_to_string(value).map(|v| (key.clone(), v)))
            .collect(),
    };

    Chunk {
        id,
        document_id: get_string(map, "document_id").unwrap_or_default(),
        content: get_string(map, "content").unwrap_or_default(),
        chunk_index: get_u64(map, "chunk_index").map_or(0, |v| v as u32),
        start_offset: get_u64(map, "start_offset").map(|v| v as usize),
        end_offset: get_u64(map, "end_offset").map(|v| v as usize),
        metadata,
    }
}

fn is_known_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
        || matches!(
            key,
            "section"
                | "section_title"
                | "method"
                | "page_number"
                | "document_name"
                | "knowledge_base_id"
                | "merged"
                | "similarity_score"
        )
}

fn get_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_u64(map: &Map<String, Value>, key: &str) -> Option<u64> {
    let value = map.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
