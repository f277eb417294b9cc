use crate::embeddings::Embedder;
use crate::index::SemanticIndex;
use crate::models::{Bookmark, CategorySuggestion, ChatMessage, ROOT_FOLDER_PATH};
use crate::traits::{TextGenerator, VectorStore};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

const SAMPLE_SIZE: usize = 200;
const PROMPT_BOOKMARKS: usize = 50;
const MAX_SUGGESTIONS: usize = 10;
const SUGGESTION_CONFIDENCE: f32 = 0.8;

const CATEGORIZE_PROMPT: &str = "You are an expert at organizing bookmarks. Review the bookmarks below and suggest better folders where needed.

Bookmarks:
{bookmarks}

Existing folders:
{folders}

For each bookmark that should move, give its exact title, its current folder, the suggested folder (existing or new) and the reason.
Reply with a JSON array only:
[
  {\"title\": \"bookmark title\", \"current_folder\": \"current folder\", \"suggested_folder\": \"suggested folder\", \"reason\": \"why\"}
]
Return [] when every bookmark is already well placed. Return at most 10 suggestions.";

/// Pulls the outermost `[...]` span out of free text and parses it as JSON.
pub fn extract_json_array(reply: &str) -> Option<Vec<Value>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&reply[start..=end]) {
        Ok(Value::Array(items)) => Some(items),
        Ok(_) => None,
        Err(error) => {
            warn!(error = %error, "reply did not contain a parsable json array");
            None
        }
    }
}

pub struct Categorizer<S, E, G>
where
    S: VectorStore,
    E: Embedder,
    G: TextGenerator + ?Sized,
{
    index: Arc<SemanticIndex<S, E>>,
    generator: Arc<G>,
}

impl<S, E, G> Categorizer<S, E, G>
where
    S: VectorStore,
    E: Embedder,
    G: TextGenerator + ?Sized,
{
    pub fn new(index: Arc<SemanticIndex<S, E>>, generator: Arc<G>) -> Self {
        Self { index, generator }
    }

    /// Best effort: any failure along the way yields no suggestions.
    pub async fn suggest(&self) -> Vec<CategorySuggestion> {
        let bookmarks = self.index.snapshot(SAMPLE_SIZE).await;
        if bookmarks.is_empty() {
            return Vec::new();
        }

        let prompt = build_prompt(&bookmarks);
        let reply = match self.generator.generate(&[ChatMessage::user(prompt)]).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(error = %error, "category analysis request failed");
                return Vec::new();
            }
        };

        let suggestions = parse_suggestions(&reply, &bookmarks);
        info!(
            sampled = bookmarks.len(),
            suggestions = suggestions.len(),
            "category analysis finished"
        );
        suggestions
    }
}

fn folder_of(bookmark: &Bookmark) -> &str {
    if bookmark.folder_path.is_empty() {
        ROOT_FOLDER_PATH
    } else {
        &bookmark.folder_path
    }
}

fn build_prompt(bookmarks: &[Bookmark]) -> String {
    let folders: BTreeSet<&str> = bookmarks.iter().map(folder_of).collect();

    let listing = bookmarks
        .iter()
        .take(PROMPT_BOOKMARKS)
        .map(|bookmark| {
            format!(
                "- [{}]({}) - folder: {}",
                bookmark.title,
                bookmark.url,
                folder_of(bookmark)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let folder_listing = folders
        .iter()
        .map(|folder| format!("- {folder}"))
        .collect::<Vec<_>>()
        .join("\n");

    CATEGORIZE_PROMPT
        .replace("{bookmarks}", &listing)
        .replace("{folders}", &folder_listing)
}

fn parse_suggestions(reply: &str, bookmarks: &[Bookmark]) -> Vec<CategorySuggestion> {
    let Some(items) = extract_json_array(reply) else {
        return Vec::new();
    };

    let by_title: HashMap<&str, &Bookmark> = bookmarks
        .iter()
        .map(|bookmark| (bookmark.title.as_str(), bookmark))
        .collect();

    let text = |item: &Value, key: &str| -> Option<String> {
        item.get(key).and_then(Value::as_str).map(str::to_string)
    };

    items
        .iter()
        .filter_map(|item| {
            let title = text(item, "title")?;
            let bookmark = by_title.get(title.as_str())?;
            Some(CategorySuggestion {
                bookmark_id: bookmark.id.clone(),
                bookmark_title: title,
                bookmark_url: bookmark.url.clone(),
                current_folder: text(item, "current_folder")
                    .unwrap_or_else(|| folder_of(bookmark).to_string()),
                suggested_folder: text(item, "suggested_folder").unwrap_or_default(),
                reason: text(item, "reason").unwrap_or_default(),
                confidence: SUGGESTION_CONFIDENCE,
            })
        })
        .take(MAX_SUGGESTIONS)
        .collect()
}
