//! Duplicate and similarity search over indexed documents.
//!
//! Two [`Explorer`]s share one document model and one index backend:
//!
//! - [`ApproximateIndex`]: writes hierarchical hash labels per document and
//!   only compares documents that share a bucket (duplicates) or match a
//!   boosted label query (similarity).
//! - [`ExactBaseline`]: compares everything with everything. Its comparison
//!   count is the denominator of [`efficiency`](crate::parallel::efficiency).
//!
//! # Example
//!
//! ```
//! use hierhash::algorithms::{ApproximateIndex, Document, Explorer};
//! use hierhash::{Counters, DistanceMetric, HasherKind, IndexConfig};
//!
//! let config = IndexConfig::default()
//!     .with_depth(2)
//!     .with_hasher(HasherKind::Threshold)
//!     .with_threads(2);
//! let index = ApproximateIndex::new(config).unwrap();
//! index.add(&Document::new("a", vec![0.9, 0.05, 0.05])).unwrap();
//! index.add(&Document::new("b", vec![0.9, 0.05, 0.05])).unwrap();
//! index.commit().unwrap();
//!
//! let pairs = index.find_duplicates(DistanceMetric::JensenShannon, &Counters::new());
//! assert_eq!(pairs.len(), 1);
//! assert!((pairs[0].score - 1.0).abs() < 1e-12);
//! ```

mod approximate;
mod exact;

pub use approximate::ApproximateIndex;
pub use exact::ExactBaseline;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::distance::DistanceMetric;
use crate::error::{HashError, Result};
use crate::index::{FieldValue, Fields, InvertedIndex, ID_FIELD};
use crate::parallel::Counters;

/// Stored raw vector (postcard-encoded `Vec<f64>`).
pub const VECTOR_FIELD: &str = "vector";

/// `hashcodeR_{level}`: exact field holding the reduced-label hash.
pub fn reduced_code_field(level: usize) -> String {
    format!("hashcodeR_{level}")
}

/// `hashexpR_{level}`: tokenized field holding the reduced label's groups.
pub fn reduced_text_field(level: usize) -> String {
    format!("hashexpR_{level}")
}

/// `hashcodeT_{level}`: exact field holding the top-label hash.
pub fn top_code_field(level: usize) -> String {
    format!("hashcodeT_{level}")
}

/// `hashexpT_{level}`: tokenized field holding the top label's groups.
pub fn top_text_field(level: usize) -> String {
    format!("hashexpT_{level}")
}

/// A document: caller-unique id plus its probability vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub vector: Vec<f64>,
}

impl Document {
    pub fn new(id: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }

    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef {
            id: self.id.clone(),
        }
    }

    /// Fields shared by every explorer: id and the encoded vector.
    pub(crate) fn base_fields(&self) -> Result<Fields> {
        let mut fields = Fields::new();
        fields.insert(ID_FIELD.to_string(), FieldValue::Exact(self.id.clone()));
        fields.insert(
            VECTOR_FIELD.to_string(),
            FieldValue::Blob(postcard::to_allocvec(&self.vector)?),
        );
        Ok(fields)
    }

    /// Rebuild a document from stored fields.
    pub(crate) fn from_fields(fields: &Fields) -> Result<Self> {
        let id = fields
            .get(ID_FIELD)
            .and_then(FieldValue::as_str)
            .ok_or_else(|| HashError::index("stored document has no id"))?;
        let blob = fields
            .get(VECTOR_FIELD)
            .and_then(FieldValue::as_bytes)
            .ok_or_else(|| HashError::index(format!("document {id} has no stored vector")))?;
        Ok(Self {
            id: id.to_string(),
            vector: postcard::from_bytes(blob)?,
        })
    }
}

/// Reference to a document in a result pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
}

/// A scored pair. For similarity queries `a` is the query document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub score: f64,
    pub a: DocumentRef,
    pub b: DocumentRef,
}

/// Common surface of the search algorithms.
pub trait Explorer: Send + Sync {
    /// Short stable identifier (`"density"`, `"brute-force"`, ...).
    fn id(&self) -> &'static str;

    /// Display name including configuration that changes results.
    fn name(&self) -> String {
        self.id().to_string()
    }

    /// Buffer a document for indexing; visible after [`Explorer::commit`].
    fn add(&self, doc: &Document) -> Result<()>;

    fn commit(&self) -> Result<()>;

    /// Near-duplicate pairs, best first. Never fails: index errors are logged
    /// and produce an empty result.
    fn find_duplicates(&self, metric: DistanceMetric, counters: &Counters) -> Vec<Similarity>;

    /// Up to `max_results` documents most similar to `query`, best first.
    fn find_similar_to(
        &self,
        query: &Document,
        metric: DistanceMetric,
        max_results: usize,
        counters: &Counters,
    ) -> Vec<Similarity>;
}

/// Load a committed document by ordinal.
pub(crate) fn load_document(index: &dyn InvertedIndex, ordinal: usize) -> Result<Document> {
    Document::from_fields(&index.get_by_ordinal(ordinal)?)
}

/// Score one pair, counting the comparison.
///
/// Mismatched dimensions and non-finite scores yield `None`.
pub(crate) fn score_pair(
    metric: DistanceMetric,
    a: &Document,
    b: &Document,
    counters: &Counters,
) -> Option<f64> {
    counters.add_comparisons(1);
    match metric.finite_similarity(&a.vector, &b.vector) {
        Ok(score) => Some(score),
        Err(HashError::NonFiniteScore(score)) => {
            debug!(a = %a.id, b = %b.id, score, %metric, "excluding non-finite score");
            None
        }
        Err(e) => {
            warn!(a = %a.id, b = %b.id, error = %e, "skipping comparison");
            None
        }
    }
}

pub(crate) fn pair(score: f64, a: &Document, b: &Document) -> Similarity {
    Similarity {
        score,
        a: a.to_ref(),
        b: b.to_ref(),
    }
}

/// Sort pairs by score, best first.
pub(crate) fn sort_descending(pairs: &mut [Similarity]) {
    pairs.sort_by(|x, y| y.score.total_cmp(&x.score));
}
