use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ROOT_FOLDER_PATH: &str = "/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub folder_path: String,
    pub add_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub name: String,
    pub path: String,
    pub add_date: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub bookmarks: Vec<Bookmark>,
    pub subfolders: Vec<Folder>,
}

impl Folder {
    pub fn root() -> Self {
        Self {
            name: "Bookmarks".to_string(),
            path: ROOT_FOLDER_PATH.to_string(),
            add_date: None,
            last_modified: None,
            bookmarks: Vec::new(),
            subfolders: Vec::new(),
        }
    }

    pub fn find(&self, path: &str) -> Option<&Folder> {
        if self.path == path {
            return Some(self);
        }
        self.subfolders.iter().find_map(|folder| folder.find(path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub root: Folder,
    pub total_bookmarks: usize,
    pub total_folders: usize,
    pub imported_at: DateTime<Utc>,
}

impl Collection {
    pub fn empty() -> Self {
        Self {
            root: Folder::root(),
            total_bookmarks: 0,
            total_folders: 0,
            imported_at: Utc::now(),
        }
    }

    pub fn all_bookmarks(&self) -> Vec<Bookmark> {
        fn collect(folder: &Folder, into: &mut Vec<Bookmark>) {
            into.extend(folder.bookmarks.iter().cloned());
            for subfolder in &folder.subfolders {
                collect(subfolder, into);
            }
        }

        let mut bookmarks = Vec::with_capacity(self.total_bookmarks);
        collect(&self.root, &mut bookmarks);
        bookmarks
    }
}

/// Flat metadata stored next to each embedding. Every value is a string so
/// that any backing store can keep it as a plain payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EntryMetadata {
    pub title: String,
    pub url: String,
    pub folder_path: String,
    pub add_date: String,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub document: String,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub bookmark: Bookmark,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityType {
    ExactUrl,
    SimilarTitle,
}

impl SimilarityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityType::ExactUrl => "exact_url",
            SimilarityType::SimilarTitle => "similar_title",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup {
    pub similarity_type: SimilarityType,
    pub title: String,
    pub url: String,
    pub bookmark_ids: Vec<String>,
    pub locations: Vec<String>,
    pub suggestion: String,
}

impl DuplicateGroup {
    pub fn count(&self) -> usize {
        self.bookmark_ids.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeAdvice {
    pub group_index: usize,
    pub is_duplicate: bool,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySuggestion {
    pub bookmark_id: String,
    pub bookmark_title: String,
    pub bookmark_url: String,
    pub current_folder: String,
    pub suggested_folder: String,
    pub reason: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Bookmark>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_bookmarks: usize,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub bookmarks_parsed: usize,
    pub folders: usize,
    pub indexed: usize,
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub batch_size: usize,
    pub snapshot_limit: usize,
    pub max_title_chars: usize,
    pub max_url_chars: usize,
    pub max_folder_chars: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            snapshot_limit: 500,
            max_title_chars: 500,
            max_url_chars: 1_000,
            max_folder_chars: 500,
        }
    }
}
