//! Multi-query expansion.
//!
//! Asks the generator for alternate phrasings of a question so retrieval can
//! reach passages that a single embedding would miss. Expansion never fails:
//! if the generator errors or returns nothing usable, the original question
//! is searched alone.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::generation::{GenerateRequest, Generator};
use crate::prompt::PromptTemplate;

/// Default number of rephrasings requested.
pub const DEFAULT_QUERY_VARIANTS: usize = 3;

/// Produces query variants for retrieval.
#[derive(Clone)]
pub struct QueryExpander {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    variant_count: usize,
}

impl QueryExpander {
    /// Create an expander using the built-in query expansion template.
    pub fn new(generator: Arc<dyn Generator>, variant_count: usize) -> Result<Self> {
        Ok(Self {
            generator,
            template: PromptTemplate::query_expansion()?,
            variant_count,
        })
    }

    pub fn variant_count(&self) -> usize {
        self.variant_count
    }

    /// Return the original question followed by up to `variant_count`
    /// distinct rephrasings.
    pub async fn expand(&self, question: &str) -> Vec<String> {
        let original = question.trim().to_string();
        if self.variant_count == 0 {
            return vec![original];
        }

        let count = self.variant_count.to_string();
        let prompt = match self
            .template
            .render(&[("question", original.as_str()), ("variant_count", count.as_str())])
        {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "query expansion prompt failed to render");
                return vec![original];
            }
        };

        let response = match self.generator.generate(&GenerateRequest::new(prompt)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "query expansion failed, using original question");
                return vec![original];
            }
        };

        let mut variants = vec![original.clone()];
        variants.extend(parse_variants(&response.text, &original, self.variant_count));
        if variants.len() == 1 {
            warn!("query expansion returned no usable variants");
        } else {
            debug!(variants = variants.len() - 1, "query expanded");
        }
        variants
    }
}

/// Parse a newline-separated generator response into at most `limit`
/// variants.
///
/// Lines are trimmed and list markers (`1.`, `2)`, `-`, `*`) stripped. Blank
/// lines and case-insensitive duplicates (including of `original`) are
/// dropped.
pub fn parse_variants(response: &str, original: &str, limit: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(original.trim().to_lowercase());

    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }
    line.trim()
}
