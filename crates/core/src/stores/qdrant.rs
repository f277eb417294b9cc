use crate::models::{EntryMetadata, IndexEntry};
use crate::parser::bookmark_id;
use crate::store::{StoreHit, StoreRecord};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

const SCROLL_PAGE: usize = 256;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.collection_url(suffix))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

/// Qdrant point ids must be unsigned integers or UUIDs. Bookmark ids are 16
/// hex characters, which is exactly a `u64`; anything else is hashed first.
pub fn point_id(id: &str) -> u64 {
    if id.len() == 16 {
        if let Ok(value) = u64::from_str_radix(id, 16) {
            return value;
        }
    }
    u64::from_str_radix(&bookmark_id(id), 16).unwrap_or_default()
}

fn payload_for(entry: &IndexEntry) -> Value {
    json!({
        "bookmark_id": entry.id,
        "document": entry.document,
        "title": entry.metadata.title,
        "url": entry.metadata.url,
        "folder_path": entry.metadata.folder_path,
        "add_date": entry.metadata.add_date,
        "tags": entry.metadata.tags,
    })
}

fn payload_str(point: &Value, key: &str) -> String {
    point
        .pointer(&format!("/payload/{key}"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn entry_from_point(point: &Value) -> IndexEntry {
    IndexEntry {
        id: payload_str(point, "bookmark_id"),
        document: payload_str(point, "document"),
        metadata: EntryMetadata {
            title: payload_str(point, "title"),
            url: payload_str(point, "url"),
            folder_path: payload_str(point, "folder_path"),
            add_date: payload_str(point, "add_date"),
            tags: payload_str(point, "tags"),
        },
    }
}

/// Qdrant reports cosine similarity as `score`; convert it back to distance.
fn hit_from_point(point: &Value) -> StoreHit {
    let similarity = point.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
    let entry = entry_from_point(point);
    StoreHit {
        id: entry.id,
        document: entry.document,
        metadata: entry.metadata,
        distance: 1.0 - similarity,
    }
}

// Unnamed single-vector collections only; named vectors report no size here.
fn configured_vector_size(info: &Value) -> Option<usize> {
    info.pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
}

fn folder_condition(folder_filter: Option<&str>) -> Option<Value> {
    folder_filter.map(|needle| {
        json!({
            "must": [
                {"key": "folder_path", "match": {"text": needle}}
            ]
        })
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url("")).send().await?;

        if response.status() == StatusCode::OK {
            let info: Value = response.json().await?;
            return match configured_vector_size(&info) {
                Some(existing) if existing != dimensions => Err(SearchError::Request(format!(
                    "configured vector size {existing} does not match requested {dimensions}"
                ))),
                _ => Ok(()),
            };
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": {"size": dimensions, "distance": "Cosine"}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::NotReady(format!(
                "qdrant collection {} setup failed with {}",
                self.collection,
                response.status()
            )));
        }

        info!(collection = %self.collection, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), SearchError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                json!({
                    "id": point_id(&record.entry.id),
                    "vector": record.vector,
                    "payload": payload_for(&record.entry),
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = folder_condition(folder_filter) {
            body["filter"] = filter;
        }

        let parsed = self.post("/points/search", body).await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits.iter().map(hit_from_point).collect())
    }

    async fn count(&self) -> Result<usize, SearchError> {
        let parsed = self.post("/points/count", json!({ "exact": true })).await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "count response had no result.count".to_string(),
            })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }

        let points = ids.iter().map(|id| point_id(id)).collect::<Vec<_>>();
        self.post("/points/delete?wait=true", json!({ "points": points }))
            .await?;
        Ok(())
    }

    async fn get(&self, limit: Option<usize>) -> Result<Vec<IndexEntry>, SearchError> {
        let mut entries = Vec::new();
        let mut offset = Value::Null;

        loop {
            let remaining = limit.map_or(SCROLL_PAGE, |limit| {
                limit.saturating_sub(entries.len()).min(SCROLL_PAGE)
            });
            if remaining == 0 {
                break;
            }

            let mut body = json!({
                "limit": remaining,
                "with_payload": true,
                "with_vector": false,
            });
            if !offset.is_null() {
                body["offset"] = offset.clone();
            }

            let parsed = self.post("/points/scroll", body).await?;
            let points = parsed
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            entries.extend(points.iter().map(entry_from_point));

            offset = parsed
                .pointer("/result/next_page_offset")
                .cloned()
                .unwrap_or(Value::Null);
            if offset.is_null() || points.is_empty() {
                break;
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bookmark_ids_map_directly_to_point_ids() {
        assert_eq!(point_id("00000000000000ff"), 255);
        assert_eq!(point_id("ffffffffffffffff"), u64::MAX);
    }

    #[test]
    fn other_ids_are_hashed_stably() {
        assert_eq!(point_id("custom-id"), point_id("custom-id"));
        assert_ne!(point_id("custom-id"), point_id("other-id"));
    }

    #[test]
    fn search_hits_report_cosine_distance() {
        let point = json!({
            "id": 1,
            "score": 0.75,
            "payload": {
                "bookmark_id": "0123456789abcdef",
                "document": "Inbox mail.example.com Work",
                "title": "Inbox",
                "url": "https://mail.example.com/",
                "folder_path": "/Work/",
                "add_date": "",
                "tags": "mail,inbox"
            }
        });

        let hit = hit_from_point(&point);
        assert_eq!(hit.id, "0123456789abcdef");
        assert_eq!(hit.metadata.folder_path, "/Work/");
        assert_eq!(hit.metadata.tags, "mail,inbox");
        assert!((hit.distance - 0.25).abs() < 1e-9);
    }

    #[test]
    fn collection_info_reports_vector_size() {
        let info = json!({
            "result": {
                "status": "green",
                "config": {"params": {"vectors": {"size": 128, "distance": "Cosine"}}}
            },
            "status": "ok"
        });
        assert_eq!(configured_vector_size(&info), Some(128));

        let named = json!({
            "result": {"config": {"params": {"vectors": {"dense": {"size": 64}}}}}
        });
        assert_eq!(configured_vector_size(&named), None);
    }

    #[test]
    fn folder_filter_becomes_text_match() {
        assert!(folder_condition(None).is_none());
        let condition = folder_condition(Some("/Work/")).expect("condition");
        assert_eq!(
            condition.pointer("/must/0/match/text").and_then(Value::as_str),
            Some("/Work/")
        );
    }
}
