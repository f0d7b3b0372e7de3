//! Qdrant-backed vector search
//!
//! Expects a cosine collection whose point payload holds the document text
//! under `content` and the metadata fields at the top level.

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, point_id::PointIdOptions, r#match::MatchValue, value::Kind,
        with_payload_selector::SelectorOptions, Condition, FieldCondition, Filter, Match, PointId,
        SearchPoints, Value as QdrantValue, WithPayloadSelector,
    },
};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use crate::config::VectorStoreConfig;
use crate::errors::{PipelineError, Result};
use crate::store::{normalize_similarity, SearchRequest, StoreStats, VectorSearch};
use crate::types::{Document, DocumentMetadata, SearchResult};

/// Payload key holding the document text
pub const CONTENT_KEY: &str = "content";

/// Read-only client for one Qdrant collection
pub struct QdrantVectorStore {
    client: QdrantClient,
    collection: String,
}

impl QdrantVectorStore {
    /// Connect and confirm the collection exists
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let client = QdrantClient::from_url(&config.qdrant_url)
            .build()
            .map_err(|e| {
                PipelineError::Retrieval(format!("Failed to create Qdrant client: {}", e))
            })?;

        let collections = client
            .list_collections()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Failed to list collections: {}", e)))?;

        if !collections
            .collections
            .iter()
            .any(|c| c.name == config.collection)
        {
            return Err(PipelineError::Retrieval(format!(
                "collection '{}' does not exist",
                config.collection
            )));
        }

        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }
}

#[async_trait]
impl VectorSearch for QdrantVectorStore {
    #[instrument(skip_all, fields(collection = %self.collection, k = request.k))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        // Qdrant scores raw cosine in [-1, 1]; the request threshold is normalized
        let score_threshold = request
            .similarity_threshold
            .map(|threshold| threshold * 2.0 - 1.0);

        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: request.embedding.clone(),
                limit: request.k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                score_threshold,
                filter: build_filter(&request.filters),
                ..Default::default()
            })
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Failed to search points: {}", e)))?;

        let results: Vec<SearchResult> = response
            .result
            .into_iter()
            .enumerate()
            .map(|(idx, point)| SearchResult {
                document: payload_to_document(point_id_to_string(&point.id), point.payload),
                similarity: normalize_similarity(point.score),
                rank: idx + 1,
            })
            .collect();

        debug!(results = results.len(), "Qdrant search complete");
        Ok(results)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| {
                PipelineError::Retrieval(format!("Failed to get collection info: {}", e))
            })?;

        Ok(StoreStats {
            total_documents: info.result.and_then(|r| r.points_count).unwrap_or(0),
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }
}

/// One keyword `must` condition per filter entry
fn build_filter(filters: &std::collections::BTreeMap<String, String>) -> Option<Filter> {
    if filters.is_empty() {
        return None;
    }

    let must = filters
        .iter()
        .map(|(key, value)| Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: key.clone(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(value.clone())),
                }),
                ..Default::default()
            })),
        })
        .collect();

    Some(Filter {
        must,
        ..Default::default()
    })
}

fn payload_to_document(id: String, payload: HashMap<String, QdrantValue>) -> Document {
    let mut content = String::new();
    let mut metadata = DocumentMetadata::default();

    for (key, value) in payload {
        let Some(json) = qdrant_to_json_value(&value) else {
            continue;
        };
        if key == CONTENT_KEY {
            match json {
                JsonValue::String(text) => content = text,
                _ => warn!(point = %id, "Payload content is not a string"),
            }
        } else if apply_metadata_field(&mut metadata, &key, json).is_none() {
            warn!(point = %id, key = %key, "Ignoring payload field with unexpected type");
        }
    }

    Document {
        id,
        content,
        metadata,
        embedding: Vec::new(),
    }
}

/// Set one metadata field from a payload value; `None` when the type is wrong
fn apply_metadata_field(
    metadata: &mut DocumentMetadata,
    key: &str,
    value: JsonValue,
) -> Option<()> {
    let text = |value: &JsonValue| value.as_str().map(str::to_string);
    let index = |value: &JsonValue| value.as_u64().and_then(|n| u32::try_from(n).ok());

    match key {
        "title" => metadata.title = Some(text(&value)?),
        "category" => metadata.category = Some(text(&value)?),
        "source" => metadata.source = Some(text(&value)?),
        "framework" => metadata.framework = Some(text(&value)?),
        "language" => metadata.language = text(&value)?,
        "tags" => {
            metadata.tags = value.as_array()?.iter().map(text).collect::<Option<Vec<_>>>()?;
        }
        "chunk_index" => metadata.chunk_index = Some(index(&value)?),
        "total_chunks" => metadata.total_chunks = Some(index(&value)?),
        _ => {
            metadata.extra.insert(key.to_string(), value);
        }
    }
    Some(())
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
        _ => None,
    })
}

fn point_id_to_string(point_id: &Option<PointId>) -> String {
    point_id
        .as_ref()
        .and_then(|id| match &id.point_id_options {
            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
            Some(PointIdOptions::Uuid(u)) => Some(u.clone()),
            None => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_payload_to_document() {
        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), QdrantValue::from("Apply online.".to_string()));
        payload.insert("title".to_string(), QdrantValue::from("Admissions".to_string()));
        payload.insert("category".to_string(), QdrantValue::from("Admissions".to_string()));
        payload.insert("chunk_index".to_string(), QdrantValue::from(2i64));

        let doc = payload_to_document("42".to_string(), payload);
        assert_eq!(doc.id, "42");
        assert_eq!(doc.content, "Apply online.");
        assert_eq!(doc.title(), "Admissions");
        assert_eq!(doc.metadata.chunk_index, Some(2));
        assert_eq!(doc.metadata.language, "en");
    }

    #[test]
    fn test_mistyped_field_keeps_other_metadata() {
        let mut payload = HashMap::new();
        payload.insert(CONTENT_KEY.to_string(), QdrantValue::from("Apply online.".to_string()));
        payload.insert("title".to_string(), QdrantValue::from("Admissions".to_string()));
        payload.insert("tags".to_string(), QdrantValue::from("admissions".to_string()));
        payload.insert("chunk_index".to_string(), QdrantValue::from("first".to_string()));
        payload.insert("campus".to_string(), QdrantValue::from("north".to_string()));

        let doc = payload_to_document("7".to_string(), payload);
        assert_eq!(doc.title(), "Admissions");
        assert!(doc.metadata.tags.is_empty());
        assert_eq!(doc.metadata.chunk_index, None);
        assert_eq!(doc.metadata.get("campus").as_deref(), Some("north"));
        assert_eq!(doc.metadata.language, "en");
    }

    #[test]
    fn test_build_filter() {
        assert!(build_filter(&BTreeMap::new()).is_none());

        let mut filters = BTreeMap::new();
        filters.insert("category".to_string(), "Library".to_string());
        filters.insert("language".to_string(), "en".to_string());
        let filter = build_filter(&filters).unwrap();
        assert_eq!(filter.must.len(), 2);
    }

    #[test]
    fn test_point_id_to_string() {
        let id = Some(PointId {
            point_id_options: Some(PointIdOptions::Num(7)),
        });
        assert_eq!(point_id_to_string(&id), "7");
        assert_eq!(point_id_to_string(&None), "unknown");
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_connect_missing_collection() {
        let config = VectorStoreConfig {
            collection: "does_not_exist".to_string(),
            ..Default::default()
        };
        assert!(QdrantVectorStore::connect(&config).await.is_err());
    }
}
