use crate::embeddings::Embedder;
use crate::index::SemanticIndex;
use crate::models::ImportReport;
use crate::parser;
use crate::traits::VectorStore;
use crate::ImportError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

/// Reads an exported bookmark file. Non UTF-8 bytes are replaced rather than
/// rejected, since some browsers export in legacy encodings.
pub async fn read_bookmark_file(path: &Path) -> Result<String, ImportError> {
    if !path.is_file() {
        return Err(ImportError::InvalidArgument(format!(
            "bookmark file not found: {}",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn digest_markup(markup: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(markup.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn import_markup<S, E>(
    index: &SemanticIndex<S, E>,
    markup: &str,
    replace: bool,
) -> Result<ImportReport, ImportError>
where
    S: VectorStore,
    E: Embedder,
{
    let collection = parser::parse(markup);
    let bookmarks = collection.all_bookmarks();

    if bookmarks.is_empty() {
        warn!("no bookmarks found in markup");
    }

    let indexed = index.upsert(&bookmarks, replace).await?;
    let report = ImportReport {
        bookmarks_parsed: collection.total_bookmarks,
        folders: collection.total_folders,
        indexed,
        checksum: digest_markup(markup),
    };

    info!(
        parsed = report.bookmarks_parsed,
        folders = report.folders,
        indexed = report.indexed,
        replace,
        "bookmark import finished"
    );
    Ok(report)
}

pub async fn import_file<S, E>(
    index: &SemanticIndex<S, E>,
    path: &Path,
    replace: bool,
) -> Result<ImportReport, ImportError>
where
    S: VectorStore,
    E: Embedder,
{
    let markup = read_bookmark_file(path).await?;
    import_markup(index, &markup, replace).await
}
