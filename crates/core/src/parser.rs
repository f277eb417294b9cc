use crate::encoder::normalize_whitespace;
use crate::error::ImportError;
use crate::models::{Bookmark, Collection, Folder, ROOT_FOLDER_PATH};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

const MILLISECOND_THRESHOLD: i64 = 9_999_999_999;
const UNTITLED_FOLDER: &str = "Untitled";

#[derive(Debug, Default)]
struct Counters {
    bookmarks: usize,
    folders: usize,
}

/// Parses a Netscape-format bookmark export into a folder tree.
///
/// Folders are `<DT><H3>` items whose list of children is the `<DL>` nested
/// directly inside the same `<DT>`. Bookmarks are `<DT><A HREF>` items.
/// Malformed records are skipped; a document without any `<DL>` yields an
/// empty collection.
pub fn parse(markup: &str) -> Collection {
    let document = Html::parse_document(markup);

    let Some(root_list) = find_root_list(&document) else {
        debug!("bookmark markup has no root list");
        return Collection::empty();
    };

    let mut counters = Counters::default();
    let mut root = Folder::root();
    parse_list(root_list, &mut root, &mut counters);

    info!(
        bookmarks = counters.bookmarks,
        folders = counters.folders,
        "parsed bookmark markup"
    );

    Collection {
        root,
        total_bookmarks: counters.bookmarks,
        total_folders: counters.folders,
        imported_at: Utc::now(),
    }
}

pub fn parse_file(path: &Path) -> Result<Collection, ImportError> {
    let markup = std::fs::read_to_string(path)?;
    Ok(parse(&markup))
}

/// Stable bookmark id: the first 16 hex characters of the MD5 of the URL.
pub fn bookmark_id(url: &str) -> String {
    let digest = format!("{:x}", Md5::digest(url.as_bytes()));
    digest[..16].to_string()
}

/// Unix epoch seconds or milliseconds. Anything unparsable is `None`.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let value: i64 = raw?.trim().parse().ok()?;
    let seconds = if value > MILLISECOND_THRESHOLD {
        value / 1_000
    } else {
        value
    };
    DateTime::<Utc>::from_timestamp(seconds, 0)
}

fn find_root_list(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| is_tag(element, "dl"))
}

fn is_tag(element: &ElementRef<'_>, name: &str) -> bool {
    element.value().name().eq_ignore_ascii_case(name)
}

fn child_element<'a>(parent: &ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| is_tag(element, name))
}

fn text_of(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn parse_list(list: ElementRef<'_>, folder: &mut Folder, counters: &mut Counters) {
    let items: Vec<ElementRef<'_>> = list.children().filter_map(ElementRef::wrap).collect();
    let mut used_names: HashSet<String> = HashSet::new();

    for (position, item) in items.iter().enumerate() {
        if !is_tag(item, "dt") {
            continue;
        }

        let trailing_dd = items.get(position + 1).filter(|next| is_tag(next, "dd"));

        if let Some(heading) = child_element(item, "h3") {
            // A folder description puts the child list inside the <DD>.
            let list = child_element(item, "dl")
                .or_else(|| trailing_dd.and_then(|dd| child_element(dd, "dl")));
            let subfolder = parse_folder(heading, list, &folder.path, &mut used_names, counters);
            folder.subfolders.push(subfolder);
        } else if let Some(link) = child_element(item, "a") {
            let description = trailing_dd.map(text_of).filter(|text| !text.is_empty());

            if let Some(bookmark) = parse_bookmark(link, &folder.path, description) {
                folder.bookmarks.push(bookmark);
                counters.bookmarks += 1;
            }
        }
    }
}

fn parse_folder(
    heading: ElementRef<'_>,
    list: Option<ElementRef<'_>>,
    parent_path: &str,
    used_names: &mut HashSet<String>,
    counters: &mut Counters,
) -> Folder {
    let name = text_of(&heading);
    let segment = unique_segment(&name, used_names);

    let mut folder = Folder {
        path: format!("{parent_path}{segment}/"),
        name,
        add_date: parse_timestamp(heading.value().attr("add_date")),
        last_modified: parse_timestamp(heading.value().attr("last_modified")),
        bookmarks: Vec::new(),
        subfolders: Vec::new(),
    };
    counters.folders += 1;

    if let Some(list) = list {
        parse_list(list, &mut folder, counters);
    }

    folder
}

// Sibling folders sharing a name get a numeric suffix so every path stays unique,
// including against siblings literally named "<name> (n)".
fn unique_segment(name: &str, used_names: &mut HashSet<String>) -> String {
    let base = if name.is_empty() {
        UNTITLED_FOLDER.to_string()
    } else {
        name.replace('/', "-")
    };

    let mut candidate = base.clone();
    let mut suffix = 1usize;
    while used_names.contains(&candidate) {
        suffix += 1;
        candidate = format!("{base} ({suffix})");
    }
    used_names.insert(candidate.clone());
    candidate
}

fn parse_bookmark(
    link: ElementRef<'_>,
    folder_path: &str,
    description: Option<String>,
) -> Option<Bookmark> {
    let attrs = link.value();
    let url = attrs.attr("href").map(str::trim).filter(|url| !url.is_empty())?;

    let icon = attrs
        .attr("icon")
        .or_else(|| attrs.attr("icon_uri"))
        .map(str::trim)
        .filter(|icon| !icon.is_empty())
        .map(str::to_string);

    Some(Bookmark {
        id: bookmark_id(url),
        title: text_of(&link),
        url: url.to_string(),
        folder_path: if folder_path.is_empty() {
            ROOT_FOLDER_PATH.to_string()
        } else {
            folder_path.to_string()
        },
        add_date: parse_timestamp(attrs.attr("add_date")),
        tags: extract_tags(&link),
        icon,
        description,
    })
}

fn extract_tags(link: &ElementRef<'_>) -> Vec<String> {
    let attrs = link.value();
    let mut tags: Vec<String> = Vec::new();

    let listed = attrs
        .attr("tags")
        .unwrap_or_default()
        .split(',')
        .map(str::trim);
    let shortcut = attrs.attr("shortcuturl").map(str::trim);

    for tag in listed.chain(shortcut) {
        if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }

    tags
}
