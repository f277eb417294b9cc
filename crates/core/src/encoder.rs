use crate::models::{Bookmark, ROOT_FOLDER_PATH};
use url::Url;

pub const MAX_PATH_SEGMENTS: usize = 3;

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Host part of `url`, or the raw string when it does not parse.
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_string(),
        Err(_) => url.to_string(),
    }
}

fn folder_segments(folder_path: &str) -> Option<&str> {
    if folder_path.is_empty() || folder_path == ROOT_FOLDER_PATH {
        return None;
    }
    let trimmed = folder_path.trim_matches('/');
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Text that gets embedded for a bookmark.
pub fn document_text(bookmark: &Bookmark) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !bookmark.title.is_empty() {
        parts.push(bookmark.title.clone());
    }

    if !bookmark.url.is_empty() {
        match Url::parse(&bookmark.url) {
            Ok(parsed) => {
                if let Some(host) = parsed.host_str() {
                    parts.push(host.to_string());
                }
                parts.extend(
                    parsed
                        .path()
                        .split('/')
                        .filter(|segment| !segment.is_empty())
                        .take(MAX_PATH_SEGMENTS)
                        .map(str::to_string),
                );
            }
            Err(_) => parts.push(bookmark.url.clone()),
        }
    }

    if let Some(folder) = folder_segments(&bookmark.folder_path) {
        parts.push(folder.replace('/', " "));
    }

    parts.extend(bookmark.tags.iter().cloned());
    parts.join(" ")
}

/// Labelled, human-facing description of a bookmark.
pub fn describe(bookmark: &Bookmark) -> String {
    let mut lines = Vec::new();

    if !bookmark.title.is_empty() {
        lines.push(format!("Title: {}", bookmark.title));
    }
    if !bookmark.url.is_empty() {
        lines.push(format!("URL: {}", bookmark.url));
        lines.push(format!("Domain: {}", extract_domain(&bookmark.url)));
    }
    if let Some(folder) = folder_segments(&bookmark.folder_path) {
        lines.push(format!("Category: {}", folder.replace('/', " > ")));
    }
    if !bookmark.tags.is_empty() {
        lines.push(format!("Tags: {}", bookmark.tags.join(", ")));
    }
    if let Some(description) = bookmark.description.as_deref() {
        let description = normalize_whitespace(description);
        if !description.is_empty() {
            lines.push(format!("Description: {description}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bookmark {
        Bookmark {
            id: "abc".to_string(),
            title: "Rust Book".to_string(),
            url: "https://doc.rust-lang.org/book/ch01/intro.html?x=1".to_string(),
            folder_path: "/Dev/Rust/".to_string(),
            add_date: None,
            tags: vec!["learning".to_string(), "lang".to_string()],
            icon: None,
            description: None,
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
        assert_eq!(normalize_whitespace("non\u{a0}breaking\u{a0} space"), "non breaking space");
    }

    #[test]
    fn document_text_combines_title_domain_path_folder_and_tags() {
        let text = document_text(&sample());
        assert_eq!(
            text,
            "Rust Book doc.rust-lang.org book ch01 intro.html Dev Rust learning lang"
        );
    }

    #[test]
    fn document_text_keeps_only_first_three_segments() {
        let mut bookmark = sample();
        bookmark.url = "https://example.com/a//b/c/d/e".to_string();
        bookmark.tags.clear();
        bookmark.folder_path = "/".to_string();
        assert_eq!(document_text(&bookmark), "Rust Book example.com a b c");
    }

    #[test]
    fn document_text_falls_back_to_raw_url() {
        let mut bookmark = sample();
        bookmark.title.clear();
        bookmark.url = "not a url".to_string();
        bookmark.tags.clear();
        bookmark.folder_path = "/".to_string();
        assert_eq!(document_text(&bookmark), "not a url");
    }

    #[test]
    fn describe_is_labelled_per_line() {
        let description = describe(&sample());
        let lines: Vec<_> = description.lines().collect();
        assert_eq!(lines[0], "Title: Rust Book");
        assert_eq!(lines[1], "URL: https://doc.rust-lang.org/book/ch01/intro.html?x=1");
        assert_eq!(lines[2], "Domain: doc.rust-lang.org");
        assert_eq!(lines[3], "Category: Dev > Rust");
        assert_eq!(lines[4], "Tags: learning, lang");
    }
}
