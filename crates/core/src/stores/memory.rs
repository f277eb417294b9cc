use crate::models::IndexEntry;
use crate::store::{folder_matches, StoreHit, StoreRecord};
use crate::traits::VectorStore;
use crate::SearchError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    dimensions: Option<usize>,
    records: BTreeMap<String, StoreRecord>,
}

/// Brute-force cosine store kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine_distance(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let left_norm = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (left_norm * right_norm)).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        let mut inner = self.inner.write().await;
        match inner.dimensions {
            Some(existing) if existing != dimensions => Err(SearchError::Request(format!(
                "configured vector size {existing} does not match requested {dimensions}"
            ))),
            _ => {
                inner.dimensions = Some(dimensions);
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), SearchError> {
        let mut inner = self.inner.write().await;
        if let Some(dimensions) = inner.dimensions {
            if let Some(record) = records.iter().find(|record| record.vector.len() != dimensions) {
                return Err(SearchError::Request(format!(
                    "embedding dimension {} != {}",
                    record.vector.len(),
                    dimensions
                )));
            }
        }

        for record in records {
            inner.records.insert(record.entry.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let inner = self.inner.read().await;
        let mut hits: Vec<StoreHit> = inner
            .records
            .values()
            .filter(|record| folder_matches(&record.entry.metadata.folder_path, folder_filter))
            .map(|record| StoreHit {
                id: record.entry.id.clone(),
                document: record.entry.document.clone(),
                metadata: record.entry.metadata.clone(),
                distance: cosine_distance(vector, &record.vector),
            })
            .collect();

        hits.sort_by(|left, right| {
            left.distance
                .total_cmp(&right.distance)
                .then_with(|| left.id.cmp(&right.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, SearchError> {
        Ok(self.inner.read().await.records.len())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
        let mut inner = self.inner.write().await;
        for id in ids {
            inner.records.remove(id);
        }
        Ok(())
    }

    async fn get(&self, limit: Option<usize>) -> Result<Vec<IndexEntry>, SearchError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .take(limit.unwrap_or(usize::MAX))
            .map(|record| record.entry.clone())
            .collect())
    }
}
