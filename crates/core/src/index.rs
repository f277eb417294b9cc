use crate::embeddings::Embedder;
use crate::encoder::document_text;
use crate::models::{Bookmark, EntryMetadata, IndexEntry, IndexOptions, SearchHit, ROOT_FOLDER_PATH};
use crate::store::{folder_matches, StoreRecord};
use crate::traits::VectorStore;
use crate::SearchError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Embedding-backed bookmark index.
///
/// The backing collection is created on first use and the handle is reused
/// for the lifetime of the index. Concurrent upserts and queries are not
/// ordered against each other; a query racing a replace may see a partially
/// cleared index.
pub struct SemanticIndex<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    store: S,
    embedder: E,
    options: IndexOptions,
    ready: OnceCell<()>,
}

impl<S, E> SemanticIndex<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    pub fn new(store: S, embedder: E) -> Self {
        Self::with_options(store, embedder, IndexOptions::default())
    }

    pub fn with_options(store: S, embedder: E, options: IndexOptions) -> Self {
        Self {
            store,
            embedder,
            options,
            ready: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    async fn ensure_ready(&self) -> Result<(), SearchError> {
        self.ready
            .get_or_try_init(|| async {
                let dimensions = self.embedder.dimensions();
                self.store.ensure_collection(dimensions).await?;
                debug!(dimensions, "vector collection ready");
                Ok::<_, SearchError>(())
            })
            .await?;
        Ok(())
    }

    /// Encodes and writes bookmarks in batches, returning how many were stored.
    /// A failing batch is logged and skipped; only an unreachable store fails
    /// the whole call.
    pub async fn upsert(&self, bookmarks: &[Bookmark], replace: bool) -> Result<usize, SearchError> {
        self.ensure_ready().await?;

        if replace {
            if let Err(error) = self.clear().await {
                warn!(error = %error, "failed to clear index before replace");
            }
        }

        let entries = dedup_entries(bookmarks, &self.options);
        if entries.is_empty() {
            return Ok(0);
        }

        let batch_size = self.options.batch_size.max(1);
        let mut added = 0usize;

        for (batch, chunk) in entries.chunks(batch_size).enumerate() {
            match self.write_batch(chunk).await {
                Ok(()) => added += chunk.len(),
                Err(error) => error!(batch, size = chunk.len(), error = %error, "failed to write batch"),
            }
        }

        info!(added, total = entries.len(), "added/updated bookmarks in index");
        Ok(added)
    }

    async fn write_batch(&self, entries: &[IndexEntry]) -> Result<(), SearchError> {
        let documents = entries
            .iter()
            .map(|entry| entry.document.clone())
            .collect::<Vec<_>>();
        let vectors = self.embedder.embed_batch(&documents).await?;

        if vectors.len() != entries.len() {
            return Err(SearchError::Embedding(format!(
                "embedding count {} doesn't match entry count {}",
                vectors.len(),
                entries.len()
            )));
        }

        let records = entries
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(entry, vector)| StoreRecord { entry, vector })
            .collect::<Vec<_>>();

        self.store.upsert(&records).await
    }

    /// Top-`top_k` bookmarks for `text`, best first. Never fails: store or
    /// embedding errors are logged and produce an empty list.
    pub async fn query(&self, text: &str, top_k: usize, folder_filter: Option<&str>) -> Vec<SearchHit> {
        match self.try_query(text, top_k, folder_filter).await {
            Ok(hits) => hits,
            Err(error) => {
                error!(error = %error, "search failed");
                Vec::new()
            }
        }
    }

    async fn try_query(
        &self,
        text: &str,
        top_k: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_ready().await?;

        let folder_filter = folder_filter.filter(|needle| !needle.is_empty());
        let vector = self.embedder.embed(text).await?;
        let hits = self.store.query(&vector, top_k, folder_filter).await?;

        Ok(hits
            .into_iter()
            .filter(|hit| folder_matches(&hit.metadata.folder_path, folder_filter))
            .take(top_k)
            .map(|hit| SearchHit {
                bookmark: bookmark_from_metadata(&hit.id, &hit.metadata),
                score: distance_to_score(hit.distance),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<usize, SearchError> {
        self.ensure_ready().await?;
        self.store.count().await
    }

    /// Up to `limit` stored bookmarks, used as the input for bulk analysis.
    pub async fn snapshot(&self, limit: usize) -> Vec<Bookmark> {
        let entries = async {
            self.ensure_ready().await?;
            self.store.get(Some(limit)).await
        }
        .await;

        match entries {
            Ok(entries) => entries
                .iter()
                .map(|entry| bookmark_from_metadata(&entry.id, &entry.metadata))
                .collect(),
            Err(error) => {
                error!(error = %error, "failed to read index snapshot");
                Vec::new()
            }
        }
    }

    /// Deletes every stored entry and returns how many were removed.
    pub async fn clear(&self) -> Result<usize, SearchError> {
        self.ensure_ready().await?;
        let ids = self
            .store
            .get(None)
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();

        for chunk in ids.chunks(self.options.batch_size.max(1)) {
            self.store.delete(chunk).await?;
        }

        info!(removed = ids.len(), "cleared index");
        Ok(ids.len())
    }
}

/// Maps cosine distance (`[0, 2]`) to a similarity score in `[0, 1]`.
pub fn distance_to_score(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

pub fn entry_for(bookmark: &Bookmark, options: &IndexOptions) -> IndexEntry {
    let folder_path = if bookmark.folder_path.is_empty() {
        ROOT_FOLDER_PATH
    } else {
        bookmark.folder_path.as_str()
    };

    IndexEntry {
        id: bookmark.id.clone(),
        document: document_text(bookmark),
        metadata: EntryMetadata {
            title: truncate_chars(&bookmark.title, options.max_title_chars),
            url: truncate_chars(&bookmark.url, options.max_url_chars),
            folder_path: truncate_chars(folder_path, options.max_folder_chars),
            add_date: bookmark
                .add_date
                .map(|date| date.to_rfc3339())
                .unwrap_or_default(),
            tags: bookmark.tags.join(","),
        },
    }
}

// Last occurrence of an id wins, first occurrence keeps its position.
fn dedup_entries(bookmarks: &[Bookmark], options: &IndexOptions) -> Vec<IndexEntry> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(bookmarks.len());

    for bookmark in bookmarks.iter().filter(|bookmark| !bookmark.id.is_empty()) {
        let entry = entry_for(bookmark, options);
        match positions.get(bookmark.id.as_str()) {
            Some(&position) => entries[position] = entry,
            None => {
                positions.insert(bookmark.id.as_str(), entries.len());
                entries.push(entry);
            }
        }
    }

    entries
}

pub fn bookmark_from_metadata(id: &str, metadata: &EntryMetadata) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: metadata.title.clone(),
        url: metadata.url.clone(),
        folder_path: if metadata.folder_path.is_empty() {
            ROOT_FOLDER_PATH.to_string()
        } else {
            metadata.folder_path.clone()
        },
        add_date: DateTime::parse_from_rfc3339(&metadata.add_date)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        tags: metadata
            .tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        icon: None,
        description: None,
    }
}
