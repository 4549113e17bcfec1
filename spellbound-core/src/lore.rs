//! Lore retrieval for grounding narration in canon.
//!
//! The retriever is an injectable seam: anything that can rank passages
//! against a query string fits behind [`LoreRetriever`]. The bundled
//! [`KeywordLoreIndex`] ranks by whole-word query overlap, which keeps the
//! engine self-contained; a vector store plugs in behind the same trait.

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from lore retrieval.
#[derive(Debug, Error)]
pub enum LoreError {
    #[error("IO error reading lore: {0}")]
    Io(#[from] std::io::Error),

    #[error("lore index unavailable: {0}")]
    Unavailable(String),
}

/// Ranks lore passages by relevance to a query string.
#[async_trait::async_trait]
pub trait LoreRetriever: Send + Sync {
    /// Return the most relevant passages for a query, best first, at most
    /// the index's configured K. An empty result is valid: a cold index or
    /// a query nothing matches both return no passages, not an error.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, LoreError>;
}

/// An in-memory lore index scored by whole-word query overlap.
pub struct KeywordLoreIndex {
    passages: Vec<Passage>,
    top_k: usize,
}

struct Passage {
    text: String,
    words: BTreeSet<String>,
}

impl Passage {
    fn new(text: String) -> Self {
        let words = tokenize(&text);
        Self { text, words }
    }
}

/// Split text into lowercase alphanumeric words.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

impl KeywordLoreIndex {
    /// Build an index over the given passages.
    pub fn new(passages: Vec<String>, top_k: usize) -> Self {
        Self {
            passages: passages.into_iter().map(Passage::new).collect(),
            top_k,
        }
    }

    /// An index holding no documents. Every retrieval returns empty.
    pub fn empty(top_k: usize) -> Self {
        Self::new(Vec::new(), top_k)
    }

    /// Load passages from every `.txt` file in a directory. Files are split
    /// into passages on blank lines. A missing directory yields an empty
    /// index rather than an error.
    pub async fn from_dir(dir: impl AsRef<Path>, top_k: usize) -> Result<Self, LoreError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Self::empty(top_k));
        }

        let mut passages = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "txt").unwrap_or(false) {
                let content = fs::read_to_string(&path).await?;
                passages.extend(split_passages(&content));
            }
        }

        Ok(Self::new(passages, top_k))
    }

    /// Number of passages in the index.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Split file content into passages on blank lines.
fn split_passages(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait::async_trait]
impl LoreRetriever for KeywordLoreIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, LoreError> {
        if self.passages.is_empty() {
            return Ok(Vec::new());
        }

        let query_words = tokenize(query);
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        // Score each passage by how many query words it contains.
        // Zero-overlap passages are below the index's threshold.
        let mut scored: Vec<(usize, &Passage)> = self
            .passages
            .iter()
            .map(|p| (query_words.intersection(&p.words).count(), p))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, p)| p.text.clone())
            .collect())
    }
}
