//! Prompt templates with declared placeholders.
//!
//! A [`PromptTemplate`] is built from template text and the list of
//! placeholder names it must contain. Construction fails if a declared
//! placeholder is missing from the text or the text references an undeclared
//! one, so a malformed template is caught when the pipeline is assembled
//! rather than at question time.
//!
//! Placeholders are written `{name}` where `name` is `[a-z_]+`.

use std::collections::BTreeSet;

use crate::error::{RagError, Result};

/// Asks the model for alternate phrasings of a question, one per line.
pub const QUERY_EXPANSION_TEMPLATE: &str = "\
You are an AI assistant specialised in analysing documents. Your task is to \
generate {variant_count} different versions of the user's question in order to \
retrieve relevant passages from a vector knowledge base. By producing several \
perspectives on the question you help the user overcome some of the limitations \
of distance-based similarity search.
Provide these alternative questions separated by newlines, without numbering \
or commentary.
Original question: {question}
";

/// Asks the model to answer strictly from the retrieved context.
pub const ANSWER_TEMPLATE: &str = "\
Answer the user's question based only on the context below.
Be an expert on the subject and give a clear, concise, and precise answer.
If the information is not in the context, say that you do not have enough \
information to answer.

Context:
{context}

Question: {question}
";

/// Placeholders of [`QUERY_EXPANSION_TEMPLATE`].
pub const QUERY_EXPANSION_PLACEHOLDERS: &[&str] = &["question", "variant_count"];

/// Placeholders of [`ANSWER_TEMPLATE`].
pub const ANSWER_PLACEHOLDERS: &[&str] = &["context", "question"];

/// A validated prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
    placeholders: BTreeSet<String>,
}

impl PromptTemplate {
    /// Build a template, checking declared placeholders against the text.
    pub fn new(text: impl Into<String>, placeholders: &[&str]) -> Result<Self> {
        let text = text.into();
        let declared: BTreeSet<String> = placeholders.iter().map(|p| p.to_string()).collect();
        let found = scan_placeholders(&text);

        if let Some(missing) = declared.difference(&found).next() {
            return Err(RagError::Template(format!(
                "declared placeholder {{{}}} does not appear in the template",
                missing
            )));
        }
        if let Some(extra) = found.difference(&declared).next() {
            return Err(RagError::Template(format!(
                "template uses undeclared placeholder {{{}}}",
                extra
            )));
        }

        Ok(Self {
            text,
            placeholders: declared,
        })
    }

    /// The built-in query expansion template.
    pub fn query_expansion() -> Result<Self> {
        Self::new(QUERY_EXPANSION_TEMPLATE, QUERY_EXPANSION_PLACEHOLDERS)
    }

    /// The built-in grounded answer template.
    pub fn answer() -> Result<Self> {
        Self::new(ANSWER_TEMPLATE, ANSWER_PLACEHOLDERS)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    /// Substitute every placeholder. Each declared placeholder must be given
    /// exactly once; values are inserted verbatim.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        for name in &self.placeholders {
            let count = values.iter().filter(|(k, _)| *k == name.as_str()).count();
            if count != 1 {
                return Err(RagError::Template(format!(
                    "placeholder {{{}}} supplied {} times",
                    name, count
                )));
            }
        }
        if let Some((k, _)) = values.iter().find(|(k, _)| !self.placeholders.contains(*k)) {
            return Err(RagError::Template(format!("unknown placeholder {{{}}}", k)));
        }

        // Single pass so substituted values are never re-scanned.
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match placeholder_at(after) {
                Some(name) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .unwrap_or_default();
                    out.push_str(value);
                    rest = &after[name.len() + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// If `s` starts with `name}`, return `name`.
fn placeholder_at(s: &str) -> Option<&str> {
    let close = s.find('}')?;
    let name = &s[..close];
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        Some(name)
    } else {
        None
    }
}

fn scan_placeholders(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if let Some(name) = placeholder_at(after) {
            found.insert(name.to_string());
            rest = &after[name.len() + 1..];
        } else {
            rest = after;
        }
    }
    found
}
