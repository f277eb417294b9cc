use crate::models::{EntryMetadata, IndexEntry};

/// An index entry together with the vector computed for its document text.
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub entry: IndexEntry,
    pub vector: Vec<f32>,
}

/// A nearest-neighbour match as reported by a vector store.
///
/// `distance` is cosine distance (`1 - cosine_similarity`), so it ranges over
/// `[0, 2]` with 2 meaning opposite vectors.
#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
    pub distance: f64,
}

pub fn folder_matches(folder_path: &str, folder_filter: Option<&str>) -> bool {
    folder_filter.map_or(true, |needle| folder_path.contains(needle))
}
