//! Retrieval-grounded answering.

use lexrag_core::{LexError, RetrievedDocument};
use lexrag_retrieval::embedding::Embedder;
use lexrag_retrieval::search::{join_context, HybridSearch};
use serde::Serialize;

use crate::llm::Generator;
use crate::prompt::{build_system_prompt, build_user_prompt, NOT_FOUND_MESSAGE};

/// Outcome of one question.
///
/// # Examples
///
/// ```
/// use lexrag_answer::answer::Answer;
///
/// let answer = Answer::not_found();
/// assert!(!answer.grounded);
/// assert!(answer.documents.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Text shown to the user.
    pub text: String,
    /// Whether the text came from the generation service.
    pub grounded: bool,
    /// Documents that formed the context, best first.
    pub documents: Vec<RetrievedDocument>,
}

impl Answer {
    /// The fixed fallback used when retrieval finds nothing.
    pub fn not_found() -> Self {
        Self {
            text: NOT_FOUND_MESSAGE.to_string(),
            grounded: false,
            documents: Vec::new(),
        }
    }
}

/// Answers questions from retrieved statute context.
///
/// Constructed once per process; owns the search engine and the generator.
pub struct Answerer<E, G> {
    search: HybridSearch<E>,
    generator: G,
}

impl<E: Embedder, G: Generator> Answerer<E, G> {
    /// Create an answerer.
    pub fn new(search: HybridSearch<E>, generator: G) -> Self {
        Self { search, generator }
    }

    /// Access the search engine.
    pub fn search(&self) -> &HybridSearch<E> {
        &self.search
    }

    /// Access the generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Answer `query`, returning the text and the documents behind it.
    ///
    /// When retrieval yields no context the generator is not called and
    /// [`Answer::not_found`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] if retrieval or generation fails. A non-success
    /// response from the generation service surfaces as
    /// [`LexError::Upstream`].
    pub async fn respond(&self, query: &str) -> Result<Answer, LexError> {
        let documents = self.search.retrieve(query, self.search.policy().k).await?;
        let Some(context) = join_context(&documents) else {
            tracing::info!("no relevant context; skipping generation");
            return Ok(Answer::not_found());
        };

        let prompt = build_user_prompt(&context, query);
        tracing::debug!(
            documents = documents.len(),
            prompt_chars = prompt.len(),
            "calling generation service"
        );
        let text = self
            .generator
            .complete(&build_system_prompt(), &prompt)
            .await?;

        Ok(Answer {
            text,
            grounded: true,
            documents,
        })
    }

    /// Answer `query` with text only.
    ///
    /// # Errors
    ///
    /// See [`Answerer::respond`].
    pub async fn answer(&self, query: &str) -> Result<String, LexError> {
        Ok(self.respond(query).await?.text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use lexrag_core::StatuteRecord;
    use lexrag_retrieval::indexer::build_index;
    use lexrag_retrieval::mock::MockEmbedder;
    use lexrag_retrieval::store::StatuteIndex;

    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Generator for RecordingGenerator {
        async fn complete(&self, system: &str, user: &str) -> Result<String, LexError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            if self.fail {
                return Err(LexError::Upstream {
                    service: "generation",
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok("generated answer".into())
        }
    }

    async fn answerer(
        records: &[StatuteRecord],
        generator: RecordingGenerator,
    ) -> Answerer<MockEmbedder, RecordingGenerator> {
        let embedder = MockEmbedder::default();
        let mut index = StatuteIndex::in_memory().unwrap();
        build_index(records, &embedder, &mut index, "BNS Section")
            .await
            .unwrap();
        Answerer::new(HybridSearch::new(index, embedder), generator)
    }

    fn long_record() -> StatuteRecord {
        StatuteRecord {
            section: "69".into(),
            subject: "X".into(),
            body: "long body text exceeding thirty chars, describing deceitful means".into(),
        }
    }

    #[tokio::test]
    async fn grounded_answer_embeds_context_in_prompt() {
        let answerer = answerer(&[long_record()], RecordingGenerator::default()).await;

        let answer = answerer.respond("What does section 69 say?").await.unwrap();
        assert!(answer.grounded);
        assert_eq!(answer.text, "generated answer");

        let prompts = answerer.generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let (system, user) = &prompts[0];
        assert!(system.contains("only"));
        assert!(user.starts_with("Context:\nBNS Section: 69\nSubject: X\n\nlong body text"));
        assert!(user.ends_with("\n\nQuestion: What does section 69 say?"));
    }

    #[tokio::test]
    async fn short_corpus_returns_fallback_without_generation() {
        let record = StatuteRecord {
            section: "1".into(),
            subject: "Y".into(),
            body: "ok".into(),
        };
        let answerer = answerer(&[record], RecordingGenerator::default()).await;

        let text = answerer.answer("tell me about section 1").await.unwrap();
        assert_eq!(text, NOT_FOUND_MESSAGE);
        assert!(answerer.generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let generator = RecordingGenerator {
            fail: true,
            ..RecordingGenerator::default()
        };
        let answerer = answerer(&[long_record()], generator).await;

        let err = answerer.answer("section 69").await.unwrap_err();
        assert!(matches!(err, LexError::Upstream { status: 500, .. }));
    }
}
