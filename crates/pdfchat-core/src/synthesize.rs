//! Grounded answer synthesis.
//!
//! Retrieved chunk texts are joined with blank lines, in retrieval order, and
//! rendered into the answer template together with the question. The model is
//! told to answer only from that context.

use std::sync::Arc;

use tracing::debug;

use crate::error::{RagError, Result};
use crate::generation::{GenerateRequest, Generator};
use crate::models::ScoredChunk;
use crate::prompt::PromptTemplate;

/// Separator placed between chunk texts in the rendered context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Produces an answer from a question and its retrieved context.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    max_context_chars: Option<usize>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>) -> Result<Self> {
        Ok(Self {
            generator,
            template: PromptTemplate::answer()?,
            max_context_chars: None,
        })
    }

    /// Cap the rendered context. Whole chunks are dropped from the tail until
    /// it fits; the first chunk is always kept.
    pub fn with_max_context_chars(mut self, max: Option<usize>) -> Self {
        self.max_context_chars = max;
        self
    }

    /// Render the prompt that would be sent for `question` and `context`.
    pub fn prompt(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        let context = build_context(context, self.max_context_chars);
        self.template
            .render(&[("context", context.as_str()), ("question", question)])
    }

    /// Generate the answer. Generator failures map to
    /// [`RagError::GenerationUnavailable`].
    pub async fn synthesize(&self, question: &str, context: &[ScoredChunk]) -> Result<String> {
        let prompt = self.prompt(question, context)?;
        debug!(chunks = context.len(), prompt_chars = prompt.len(), "synthesizing answer");
        let response = self
            .generator
            .generate(&GenerateRequest::new(prompt))
            .await
            .map_err(|e| RagError::GenerationUnavailable(format!("{:#}", e)))?;
        Ok(response.text.trim().to_string())
    }
}

/// Join chunk texts, honouring an optional character budget.
pub fn build_context(context: &[ScoredChunk], max_chars: Option<usize>) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for (i, hit) in context.iter().enumerate() {
        let sep = if i == 0 { 0 } else { CONTEXT_SEPARATOR.len() };
        let len = hit.chunk.text.chars().count();
        if let Some(max) = max_chars {
            if i > 0 && used + sep + len > max {
                break;
            }
        }
        if i > 0 {
            out.push_str(CONTEXT_SEPARATOR);
        }
        out.push_str(&hit.chunk.text);
        used += sep + len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::expand::tests::CannedGenerator;

    fn hits(texts: &[&str]) -> Vec<ScoredChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ScoredChunk {
                chunk: chunk_text(&format!("{}.pdf", i), t, 100, 0).remove(0),
                score: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_context_joined_in_order() {
        assert_eq!(build_context(&hits(&["one", "two"]), None), "one\n\ntwo");
    }

    #[test]
    fn test_context_budget_drops_tail_chunks() {
        let context = hits(&["aaaa", "bbbb", "cccc"]);
        assert_eq!(build_context(&context, Some(10)), "aaaa\n\nbbbb");
        assert_eq!(build_context(&context, Some(2)), "aaaa");
    }

    #[test]
    fn test_prompt_contains_question_and_context() {
        let synth = AnswerSynthesizer::new(Arc::new(CannedGenerator { reply: None })).unwrap();
        let prompt = synth
            .prompt("What is the capital?", &hits(&["Paris is the capital."]))
            .unwrap();
        assert!(prompt.contains("Paris is the capital."));
        assert!(prompt.contains("Question: What is the capital?"));
        assert!(prompt.contains("enough information"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_unavailable() {
        let synth = AnswerSynthesizer::new(Arc::new(CannedGenerator { reply: None })).unwrap();
        let err = synth.synthesize("q", &hits(&["c"])).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_answer_trimmed() {
        let synth = AnswerSynthesizer::new(Arc::new(CannedGenerator {
            reply: Some("  Paris.\n".into()),
        }))
        .unwrap();
        assert_eq!(synth.synthesize("q", &hits(&["c"])).await.unwrap(), "Paris.");
    }
}
