use crate::categorize::extract_json_array;
use crate::embeddings::Embedder;
use crate::index::SemanticIndex;
use crate::models::{Bookmark, ChatMessage, DuplicateGroup, MergeAdvice, SimilarityType};
use crate::traits::{TextGenerator, VectorStore};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};
use url::Url;

const MAX_ADVICE_GROUPS: usize = 10;

const MERGE_ADVICE_PROMPT: &str = "Review the following groups of possibly duplicated bookmarks and advise how to consolidate them.

{groups}

For every group decide whether it really is a duplicate, which entry to keep and how to merge the rest.
Reply with a JSON array only, for example:
[
  {\"group_index\": 0, \"is_duplicate\": true, \"suggestion\": \"Keep the first entry and delete the others\"}
]";

#[derive(Debug, Clone, Default)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    /// Hosts shared by more than one bookmark. Informational only.
    pub domain_counts: HashMap<String, usize>,
}

/// Lower-cased `host[:port]/path` with a leading `www.` and trailing slashes removed.
pub fn normalize_url(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let lowered = url.trim().to_lowercase();
    match Url::parse(&lowered) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let host = host.strip_prefix("www.").unwrap_or(host);
            let authority = match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            format!("{}{}", authority, parsed.path().trim_end_matches('/'))
        }
        Err(_) => lowered,
    }
}

pub fn normalize_domain(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
        }
        Err(_) => url.to_string(),
    }
}

fn title_suffix() -> Option<&'static Regex> {
    static SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    SUFFIX
        .get_or_init(|| Regex::new(r"^(.*?\S)\s+[-|]\s+\S.*$").ok())
        .as_ref()
}

/// Cuts at the first spaced " - " / " | " separator, lower-cases and collapses
/// whitespace. Unspaced hyphens ("e-mail") are kept.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    let stripped = title_suffix()
        .and_then(|pattern| pattern.captures(trimmed))
        .and_then(|captures| captures.get(1))
        .map_or(trimmed, |head| head.as_str());

    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// Groups indices by key, keeping groups in order of first appearance.
fn group_by_key<F>(bookmarks: &[Bookmark], key: F) -> Vec<Vec<usize>>
where
    F: Fn(&Bookmark) -> String,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    for (position, bookmark) in bookmarks.iter().enumerate() {
        let value = key(bookmark);
        if value.is_empty() {
            continue;
        }
        groups
            .entry(value.clone())
            .or_insert_with(|| {
                order.push(value);
                Vec::new()
            })
            .push(position);
    }

    order
        .into_iter()
        .filter_map(|value| groups.remove(&value))
        .collect()
}

fn build_group(
    bookmarks: &[Bookmark],
    members: &[usize],
    similarity_type: SimilarityType,
) -> DuplicateGroup {
    let first = &bookmarks[members[0]];
    let count = members.len();
    let suggestion = match similarity_type {
        SimilarityType::ExactUrl => {
            format!("Found {count} bookmarks pointing at the same page; keep one and remove the rest")
        }
        SimilarityType::SimilarTitle => format!(
            "Found {count} bookmarks with the same title but different URLs; check whether they should be merged"
        ),
    };

    DuplicateGroup {
        similarity_type,
        title: first.title.clone(),
        url: first.url.clone(),
        bookmark_ids: members.iter().map(|&i| bookmarks[i].id.clone()).collect(),
        locations: members
            .iter()
            .map(|&i| bookmarks[i].folder_path.clone())
            .collect(),
        suggestion,
    }
}

/// Groups bookmarks first by normalized URL, then by normalized title among
/// those with different URLs. A bookmark lands in at most one group and
/// exact-URL groups win over title groups.
pub fn group_duplicates(bookmarks: &[Bookmark]) -> DuplicateReport {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for members in group_by_key(bookmarks, |bookmark| normalize_url(&bookmark.url)) {
        if members.len() < 2 {
            continue;
        }
        if members
            .iter()
            .any(|&i| seen.contains(bookmarks[i].id.as_str()))
        {
            continue;
        }
        seen.extend(members.iter().map(|&i| bookmarks[i].id.as_str()));
        groups.push(build_group(bookmarks, &members, SimilarityType::ExactUrl));
    }

    for members in group_by_key(bookmarks, |bookmark| normalize_title(&bookmark.title)) {
        let members: Vec<usize> = members
            .into_iter()
            .filter(|&i| !seen.contains(bookmarks[i].id.as_str()))
            .collect();
        if members.len() < 2 {
            continue;
        }

        let distinct_urls: HashSet<String> = members
            .iter()
            .map(|&i| normalize_url(&bookmarks[i].url))
            .collect();
        if distinct_urls.len() < 2 {
            continue;
        }

        seen.extend(members.iter().map(|&i| bookmarks[i].id.as_str()));
        groups.push(build_group(bookmarks, &members, SimilarityType::SimilarTitle));
    }

    let domain_counts: HashMap<String, usize> =
        group_by_key(bookmarks, |bookmark| normalize_domain(&bookmark.url))
            .into_iter()
            .filter(|members| members.len() > 1)
            .map(|members| (normalize_domain(&bookmarks[members[0]].url), members.len()))
            .collect();

    DuplicateReport {
        groups,
        domain_counts,
    }
}

pub struct DuplicateDetector<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    index: Arc<SemanticIndex<S, E>>,
}

impl<S, E> DuplicateDetector<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    pub fn new(index: Arc<SemanticIndex<S, E>>) -> Self {
        Self { index }
    }

    pub async fn report(&self) -> DuplicateReport {
        let limit = self.index.options().snapshot_limit;
        let bookmarks = self.index.snapshot(limit).await;
        let report = group_duplicates(&bookmarks);

        debug!(
            shared_domains = report.domain_counts.len(),
            "domain grouping computed"
        );
        info!(
            scanned = bookmarks.len(),
            groups = report.groups.len(),
            "duplicate detection finished"
        );
        report
    }

    /// Read-only: nothing is deleted or moved.
    pub async fn detect(&self) -> Vec<DuplicateGroup> {
        self.report().await.groups
    }

    /// Asks the generator for keep/merge advice on up to ten groups.
    pub async fn merge_advice<G>(&self, groups: &[DuplicateGroup], generator: &G) -> Vec<MergeAdvice>
    where
        G: TextGenerator + ?Sized,
    {
        if groups.is_empty() {
            return Vec::new();
        }

        let prompt = build_merge_prompt(groups);
        match generator.generate(&[ChatMessage::user(prompt)]).await {
            Ok(reply) => parse_merge_advice(&reply),
            Err(error) => {
                error!(error = %error, "merge advice request failed");
                Vec::new()
            }
        }
    }
}

fn build_merge_prompt(groups: &[DuplicateGroup]) -> String {
    let listing = groups
        .iter()
        .take(MAX_ADVICE_GROUPS)
        .enumerate()
        .map(|(position, group)| {
            format!(
                "Group {}:\n  Title: {}\n  URL: {}\n  Type: {}\n  Locations: {}",
                position,
                group.title,
                group.url,
                group.similarity_type.as_str(),
                group.locations.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    MERGE_ADVICE_PROMPT.replace("{groups}", &listing)
}

fn parse_merge_advice(reply: &str) -> Vec<MergeAdvice> {
    extract_json_array(reply)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            Some(MergeAdvice {
                group_index: item.get("group_index").and_then(Value::as_u64)? as usize,
                is_duplicate: item
                    .get("is_duplicate")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                suggestion: item
                    .get("suggestion")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::parser::bookmark_id;
    use crate::stores::MemoryStore;
    use crate::GenerationError;
    use async_trait::async_trait;

    fn bookmark(title: &str, url: &str, folder_path: &str) -> Bookmark {
        Bookmark {
            id: bookmark_id(url),
            title: title.to_string(),
            url: url.to_string(),
            folder_path: folder_path.to_string(),
            add_date: None,
            tags: Vec::new(),
            icon: None,
            description: None,
        }
    }

    #[test]
    fn url_normalization_strips_scheme_www_and_trailing_slash() {
        assert_eq!(normalize_url("http://www.example.com/page"), "example.com/page");
        assert_eq!(normalize_url("https://example.com/page/"), "example.com/page");
        assert_eq!(normalize_url("HTTPS://Example.com/"), "example.com");
        assert_eq!(normalize_url("https://example.com:8080/a?q=1"), "example.com:8080/a");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn title_normalization_strips_site_suffix() {
        assert_eq!(normalize_title("Rust Book - Official Site"), "rust book");
        assert_eq!(normalize_title("Rust  Book | Docs"), "rust book");
        assert_eq!(normalize_title("A - B - Site"), "a");
        assert_eq!(normalize_title("Rust Book - Docs - MDN"), "rust book");
        assert_eq!(normalize_title("e-mail settings"), "e-mail settings");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn www_and_trailing_slash_variants_form_one_exact_group() {
        let bookmarks = vec![
            bookmark("Page", "http://www.example.com/page", "/A/"),
            bookmark("Page copy", "https://example.com/page/", "/B/"),
        ];

        let report = group_duplicates(&bookmarks);
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.similarity_type, SimilarityType::ExactUrl);
        assert_eq!(group.count(), 2);
        assert_eq!(group.locations, vec!["/A/", "/B/"]);
        assert_eq!(group.title, "Page");
    }

    #[test]
    fn same_title_different_url_forms_one_title_group() {
        let bookmarks = vec![
            bookmark("Release Notes - Vendor", "https://vendor.example.com/notes", "/"),
            bookmark("release   notes | Mirror", "https://mirror.example.org/notes", "/Archive/"),
        ];

        let report = group_duplicates(&bookmarks);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].similarity_type, SimilarityType::SimilarTitle);
        assert_eq!(report.groups[0].count(), 2);
        assert!(report
            .groups
            .iter()
            .all(|group| group.similarity_type != SimilarityType::ExactUrl));
    }

    #[test]
    fn bookmark_appears_in_at_most_one_group() {
        let bookmarks = vec![
            bookmark("Docs", "https://example.com/docs", "/"),
            bookmark("Docs", "https://www.example.com/docs/", "/Old/"),
            bookmark("Docs", "https://other.example.com/docs", "/"),
        ];

        let report = group_duplicates(&bookmarks);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].similarity_type, SimilarityType::ExactUrl);
        assert_eq!(report.groups[0].count(), 2);

        let mut all_ids: Vec<&String> = report
            .groups
            .iter()
            .flat_map(|group| group.bookmark_ids.iter())
            .collect();
        let total = all_ids.len();
        all_ids.sort();
        all_ids.dedup();
        assert_eq!(all_ids.len(), total);
    }

    #[test]
    fn multi_part_suffixes_still_group_by_title() {
        let bookmarks = vec![
            bookmark("Rust Book - Docs - MDN", "https://mdn.example.com/rust", "/A/"),
            bookmark("Rust Book - MDN", "https://other.example.com/rust", "/B/"),
        ];

        let report = group_duplicates(&bookmarks);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].similarity_type, SimilarityType::SimilarTitle);
        assert_eq!(report.groups[0].count(), 2);
    }

    #[test]
    fn same_title_same_url_is_not_a_title_group() {
        let mut first = bookmark("Same", "https://same.example.com/", "/");
        let mut second = first.clone();
        first.id = "a".to_string();
        second.id = "b".to_string();
        second.title = "Same - Mirror".to_string();

        let report = group_duplicates(&[first, second]);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].similarity_type, SimilarityType::ExactUrl);
    }

    #[test]
    fn domain_grouping_is_instrumentation_only() {
        let bookmarks = vec![
            bookmark("One", "https://www.example.com/one", "/"),
            bookmark("Two", "https://example.com/two", "/"),
        ];

        let report = group_duplicates(&bookmarks);
        assert!(report.groups.is_empty());
        assert_eq!(report.domain_counts.get("example.com"), Some(&2));
    }

    #[tokio::test]
    async fn detector_reads_from_index_snapshot() -> Result<(), crate::SearchError> {
        let index = Arc::new(SemanticIndex::new(
            MemoryStore::new(),
            CharacterNgramEmbedder::default(),
        ));
        index
            .upsert(
                &[
                    bookmark("Page", "http://www.example.com/page", "/A/"),
                    bookmark("Page", "https://example.com/page/", "/B/"),
                    bookmark("Unrelated", "https://unrelated.example.net/", "/"),
                ],
                false,
            )
            .await?;

        let detector = DuplicateDetector::new(index.clone());
        let groups = detector.detect().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count(), 2);
        assert_eq!(index.count().await?, 3);
        Ok(())
    }

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn provider(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn merge_advice_is_parsed_best_effort() {
        let index = Arc::new(SemanticIndex::new(
            MemoryStore::new(),
            CharacterNgramEmbedder::default(),
        ));
        let detector = DuplicateDetector::new(index);
        let groups = group_duplicates(&[
            bookmark("Page", "http://www.example.com/page", "/A/"),
            bookmark("Page", "https://example.com/page/", "/B/"),
        ])
        .groups;

        let reply = CannedGenerator(
            "Sure:\n```json\n[{\"group_index\": 0, \"is_duplicate\": true, \"suggestion\": \"keep /A/\"}]\n```",
        );
        let advice = detector.merge_advice(&groups, &reply).await;
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].suggestion, "keep /A/");

        let garbage = CannedGenerator("I cannot help with that.");
        assert!(detector.merge_advice(&groups, &garbage).await.is_empty());
    }
}
