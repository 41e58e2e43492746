//! Inverted-index capability consumed by the search algorithms.
//!
//! The algorithms only need a small surface: buffered writes with an explicit
//! commit, lookup by id or ordinal, ranked boolean term queries, and the most
//! frequent terms of a field (bucket discovery without a full scan). Any
//! backend providing [`InvertedIndex`] works; [`MemoryIndex`] is the bundled
//! in-process implementation.
//!
//! ## Field kinds
//!
//! - [`FieldValue::Exact`]: the whole value is a single term.
//! - [`FieldValue::Text`]: whitespace-tokenized, each token is a term.
//! - [`FieldValue::Blob`]: stored only, never matched.

mod memory;

pub use memory::MemoryIndex;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Field holding the caller-unique document id (exact match).
pub const ID_FIELD: &str = "id";

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Exact(String),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Terms this value contributes to the field's postings.
    pub fn terms(&self) -> Vec<&str> {
        match self {
            FieldValue::Exact(v) => vec![v.as_str()],
            FieldValue::Text(v) => v.split_whitespace().collect(),
            FieldValue::Blob(_) => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Exact(v) | FieldValue::Text(v) => Some(v),
            FieldValue::Blob(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// A stored document: field name to value.
pub type Fields = BTreeMap<String, FieldValue>;

/// Single term clause.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub term: String,
    pub boost: f32,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    #[must_use]
    pub fn boosted(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

/// Query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Documents containing the term; score = boost.
    Term(TermQuery),
    /// Documents matching any clause; score = sum of matched boosts.
    Or(Vec<TermQuery>),
    /// Documents matching every clause; score = sum of boosts.
    And(Vec<TermQuery>),
    /// Every document, score 1.
    MatchAll,
}

/// A ranked hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub ordinal: usize,
    pub score: f32,
}

/// Document frequency of one term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermStats {
    pub term: String,
    pub doc_freq: usize,
}

/// Storage/search backend used by the algorithms.
///
/// Writers may call [`InvertedIndex::add`] from several threads; the backend
/// serializes writes internally. Reads only observe committed documents.
pub trait InvertedIndex: Send + Sync {
    /// Buffer a document; visible after the next [`InvertedIndex::commit`].
    fn add(&self, fields: Fields) -> Result<()>;

    /// Make every buffered document visible to readers.
    fn commit(&self) -> Result<()>;

    /// Latest committed document whose [`ID_FIELD`] equals `id`.
    fn get_by_id(&self, id: &str) -> Result<Option<Fields>>;

    /// Committed document at `ordinal` (`0..size()`).
    fn get_by_ordinal(&self, ordinal: usize) -> Result<Fields>;

    /// Ranked hits, best first, at most `limit`.
    fn query(&self, query: &Query, limit: usize) -> Result<Vec<ScoredDoc>>;

    /// Terms of `field` by descending document frequency, at most `limit`.
    fn most_frequent_terms(&self, field: &str, limit: usize) -> Result<Vec<TermStats>>;

    /// Number of committed documents.
    fn size(&self) -> usize;
}
