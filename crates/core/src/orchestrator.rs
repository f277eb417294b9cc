use crate::embeddings::Embedder;
use crate::encoder::describe;
use crate::index::SemanticIndex;
use crate::ingest;
use crate::models::{Answer, Bookmark, ChatMessage, ImportReport, IndexStats, SearchHit};
use crate::traits::{TextGenerator, VectorStore};
use crate::{GenerationError, ImportError};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const NO_RESULTS_MARKER: &str = "No related bookmarks found.";

const SYSTEM_PROMPT: &str = "You are a bookmark assistant. You help the user find information among the websites saved in their browser bookmarks.

The user asks questions about the sites they saved. Bookmarks related to the question are provided as reference.

Answer from the provided bookmarks. If they contain nothing relevant, say so honestly.

When answering:
1. Keep the answer short and direct.
2. List the title and URL of every relevant bookmark you rely on.
3. Where it helps, suggest next steps based on the bookmarks' folders and content.";

/// Retrieval front door: plain search plus context-augmented answers.
pub struct RetrievalOrchestrator<S, E, G>
where
    S: VectorStore,
    E: Embedder,
    G: TextGenerator + ?Sized,
{
    index: Arc<SemanticIndex<S, E>>,
    generator: Arc<G>,
}

impl<S, E, G> RetrievalOrchestrator<S, E, G>
where
    S: VectorStore,
    E: Embedder,
    G: TextGenerator + ?Sized,
{
    pub fn new(index: Arc<SemanticIndex<S, E>>, generator: Arc<G>) -> Self {
        Self { index, generator }
    }

    pub fn index(&self) -> &Arc<SemanticIndex<S, E>> {
        &self.index
    }

    pub async fn import_markup(&self, markup: &str, replace: bool) -> Result<ImportReport, ImportError> {
        ingest::import_markup(self.index.as_ref(), markup, replace).await
    }

    /// Library entry point; the CLI's generator-free `search` goes to
    /// `SemanticIndex::query` directly, which this wraps unchanged.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        folder_filter: Option<&str>,
    ) -> Vec<SearchHit> {
        self.index.query(query, top_k, folder_filter).await
    }

    pub async fn answer(&self, message: &str, top_k: usize) -> Result<Answer, GenerationError> {
        let sources = self
            .search(message, top_k, None)
            .await
            .into_iter()
            .map(|hit| hit.bookmark)
            .collect::<Vec<_>>();

        if sources.is_empty() {
            warn!("no bookmarks retrieved for question");
        }

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Reference bookmarks:\n{}\n\nQuestion: {message}",
                build_context(&sources)
            )),
        ];

        let text = self.generator.generate(&messages).await.map_err(|err| {
            error!(
                provider = self.generator.provider(),
                error = %err,
                "chat generation failed"
            );
            err
        })?;

        debug!(sources = sources.len(), "answer generated");
        Ok(Answer { text, sources })
    }

    /// Total is reported as zero when the store can't be counted.
    pub async fn stats(&self) -> IndexStats {
        let total_bookmarks = self.index.count().await.unwrap_or_else(|error| {
            warn!(error = %error, "failed to count indexed bookmarks");
            0
        });

        IndexStats {
            total_bookmarks,
            provider: self.generator.provider().to_string(),
            model: self.generator.model().to_string(),
        }
    }
}

/// Numbered context block, one described bookmark per entry.
pub fn build_context(bookmarks: &[Bookmark]) -> String {
    if bookmarks.is_empty() {
        return NO_RESULTS_MARKER.to_string();
    }

    bookmarks
        .iter()
        .enumerate()
        .map(|(position, bookmark)| {
            let body = describe(bookmark)
                .lines()
                .collect::<Vec<_>>()
                .join("\n   ");
            format!("{}. {body}", position + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::Role;
    use crate::parser::bookmark_id;
    use crate::stores::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const EXPORT: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<DL><p>
    <DT><H3>Work</H3>
    <DL><p>
        <DT><A HREF="https://mail.example.com/">Inbox</A>
        <DT><A HREF="https://calendar.example.com/">Calendar</A>
    </DL><p>
    <DT><H3>Home</H3>
    <DL><p>
        <DT><A HREF="https://food.example.com/pasta">Pasta recipes</A>
    </DL><p>
</DL><p>"#;

    #[derive(Default)]
    struct EchoGenerator {
        seen: Mutex<Vec<ChatMessage>>,
        offline: bool,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn provider(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
            if self.offline {
                return Err(GenerationError::NotConfigured("echo".to_string()));
            }
            if let Ok(mut seen) = self.seen.lock() {
                seen.extend_from_slice(messages);
            }
            Ok(messages
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default())
        }
    }

    type TestOrchestrator = RetrievalOrchestrator<MemoryStore, CharacterNgramEmbedder, EchoGenerator>;

    fn orchestrator(generator: EchoGenerator) -> TestOrchestrator {
        let index = Arc::new(SemanticIndex::new(
            MemoryStore::new(),
            CharacterNgramEmbedder::default(),
        ));
        RetrievalOrchestrator::new(index, Arc::new(generator))
    }

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
    fn context_is_numbered_and_described() {
        let context = build_context(&[
            bookmark("Inbox", "https://mail.example.com/", "/Work/"),
            bookmark("News", "https://news.example.com/", "/"),
        ]);

        assert!(context.starts_with("1. Title: Inbox\n   URL: https://mail.example.com/"));
        assert!(context.contains("   Category: Work"));
        assert!(context.contains("\n\n2. Title: News"));
        assert_eq!(build_context(&[]), NO_RESULTS_MARKER);
    }

    #[tokio::test]
    async fn single_work_bookmark_is_found_without_filter() -> Result<(), ImportError> {
        let orchestrator = orchestrator(EchoGenerator::default());
        let markup = r#"<DL><p>
            <DT><H3>Work</H3>
            <DL><p>
                <DT><A HREF="https://mail.example.com/">Inbox</A>
            </DL><p>
        </DL><p>"#;
        orchestrator.import_markup(markup, false).await?;

        let hits = orchestrator.search("mail", 1, None).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bookmark.title, "Inbox");
        assert_eq!(hits[0].bookmark.folder_path, "/Work/");
        Ok(())
    }

    #[tokio::test]
    async fn search_scoped_to_folder() -> Result<(), ImportError> {
        let orchestrator = orchestrator(EchoGenerator::default());
        orchestrator.import_markup(EXPORT, false).await?;

        let hits = orchestrator.search("mail", 5, Some("/Work/")).await;
        assert!(!hits.is_empty());
        assert_eq!(hits[0].bookmark.url, "https://mail.example.com/");
        assert!(hits
            .iter()
            .all(|hit| hit.bookmark.folder_path.contains("/Work/")));
        Ok(())
    }

    #[tokio::test]
    async fn answer_returns_sources_used_as_context() -> Result<(), Box<dyn std::error::Error>> {
        let orchestrator = orchestrator(EchoGenerator::default());
        orchestrator.import_markup(EXPORT, false).await?;

        let answer = orchestrator.answer("where is my mail inbox?", 2).await?;
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.text.contains("Question: where is my mail inbox?"));
        for source in &answer.sources {
            assert!(answer.text.contains(&source.url));
        }

        let seen = orchestrator
            .generator
            .seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default();
        assert_eq!(seen[0].role, Role::System);
        assert_eq!(seen[1].role, Role::User);
        Ok(())
    }

    #[tokio::test]
    async fn answer_on_empty_index_uses_marker() -> Result<(), GenerationError> {
        let orchestrator = orchestrator(EchoGenerator::default());

        let answer = orchestrator.answer("what did I save about mail?", 5).await?;
        assert!(answer.sources.is_empty());
        assert!(answer.text.contains(NO_RESULTS_MARKER));
        Ok(())
    }

    #[tokio::test]
    async fn answer_propagates_generation_failure() {
        let orchestrator = orchestrator(EchoGenerator {
            offline: true,
            ..EchoGenerator::default()
        });
        assert!(orchestrator.answer("anything", 3).await.is_err());
    }

    #[tokio::test]
    async fn stats_report_count_and_generator() -> Result<(), ImportError> {
        let orchestrator = orchestrator(EchoGenerator::default());
        orchestrator.import_markup(EXPORT, false).await?;

        let stats = orchestrator.stats().await;
        assert_eq!(stats.total_bookmarks, 3);
        assert_eq!(stats.provider, "echo");
        assert_eq!(stats.model, "echo-1");
        Ok(())
    }
}
