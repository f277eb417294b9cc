use crate::models::{ChatMessage, IndexEntry};
use crate::store::{StoreHit, StoreRecord};
use crate::{GenerationError, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the backing collection if it does not exist yet.
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError>;

    /// Inserts or overwrites records keyed by `entry.id`.
    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), SearchError>;

    /// Nearest neighbours of `vector`, closest first. `folder_filter` keeps only
    /// entries whose folder path contains it as a substring.
    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<StoreHit>, SearchError>;

    async fn count(&self) -> Result<usize, SearchError>;

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError>;

    /// Stored entries without vectors, at most `limit` of them when given.
    async fn get(&self, limit: Option<usize>) -> Result<Vec<IndexEntry>, SearchError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for Box<T> {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        (**self).ensure_collection(dimensions).await
    }

    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), SearchError> {
        (**self).upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        limit: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<StoreHit>, SearchError> {
        (**self).query(vector, limit, folder_filter).await
    }

    async fn count(&self) -> Result<usize, SearchError> {
        (**self).count().await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
        (**self).delete(ids).await
    }

    async fn get(&self, limit: Option<usize>) -> Result<Vec<IndexEntry>, SearchError> {
        (**self).get(limit).await
    }
}
