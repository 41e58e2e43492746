//! In-process inverted index.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{Fields, InvertedIndex, Query, ScoredDoc, TermQuery, TermStats, ID_FIELD};
use crate::error::{HashError, Result};

/// Committed state: stored documents plus per-field postings.
#[derive(Debug, Default)]
struct Segment {
    docs: Vec<Fields>,
    /// field -> term -> ascending ordinals
    postings: HashMap<String, HashMap<String, Vec<usize>>>,
    ids: HashMap<String, usize>,
}

impl Segment {
    fn from_docs(docs: Vec<Fields>) -> Self {
        let mut segment = Segment::default();
        for doc in docs {
            segment.append(doc);
        }
        segment
    }

    fn append(&mut self, doc: Fields) {
        let ordinal = self.docs.len();
        for (field, value) in &doc {
            let field_postings = self.postings.entry(field.clone()).or_default();
            for term in value.terms() {
                let list = field_postings.entry(term.to_string()).or_default();
                if list.last() != Some(&ordinal) {
                    list.push(ordinal);
                }
            }
        }
        if let Some(id) = doc.get(ID_FIELD).and_then(|v| v.as_str()) {
            self.ids.insert(id.to_string(), ordinal);
        }
        self.docs.push(doc);
    }

    fn postings(&self, clause: &TermQuery) -> &[usize] {
        self.postings
            .get(&clause.field)
            .and_then(|terms| terms.get(&clause.term))
            .map_or(&[][..], Vec::as_slice)
    }
}

/// Thread-safe in-memory [`InvertedIndex`].
///
/// Writes are buffered under a mutex and applied to the readable segment on
/// [`InvertedIndex::commit`].
#[derive(Debug, Default)]
pub struct MemoryIndex {
    pending: Mutex<Vec<Fields>>,
    segment: RwLock<Segment>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered, not yet committed documents.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Write committed documents to `path`.
    #[cfg(feature = "persistence")]
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let segment = self.segment.read();
        let bytes = postcard::to_allocvec(&segment.docs)?;
        std::fs::write(path.as_ref(), bytes)?;
        debug!(path = %path.as_ref().display(), docs = segment.docs.len(), "saved index snapshot");
        Ok(())
    }

    /// Load an index previously written with [`MemoryIndex::save`].
    #[cfg(feature = "persistence")]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let docs: Vec<Fields> = postcard::from_bytes(&bytes)?;
        debug!(path = %path.as_ref().display(), docs = docs.len(), "opened index snapshot");
        Ok(Self {
            pending: Mutex::new(Vec::new()),
            segment: RwLock::new(Segment::from_docs(docs)),
        })
    }
}

impl InvertedIndex for MemoryIndex {
    fn add(&self, fields: Fields) -> Result<()> {
        self.pending.lock().push(fields);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return Ok(());
        }
        let mut segment = self.segment.write();
        let n = batch.len();
        for doc in batch {
            segment.append(doc);
        }
        debug!(committed = n, total = segment.docs.len(), "index commit");
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Fields>> {
        let segment = self.segment.read();
        Ok(segment.ids.get(id).map(|&ord| segment.docs[ord].clone()))
    }

    fn get_by_ordinal(&self, ordinal: usize) -> Result<Fields> {
        self.segment
            .read()
            .docs
            .get(ordinal)
            .cloned()
            .ok_or_else(|| HashError::index(format!("no document at ordinal {ordinal}")))
    }

    fn query(&self, query: &Query, limit: usize) -> Result<Vec<ScoredDoc>> {
        let segment = self.segment.read();
        let mut scores: HashMap<usize, f32> = HashMap::new();

        match query {
            Query::Term(clause) => {
                for &ord in segment.postings(clause) {
                    scores.insert(ord, clause.boost);
                }
            }
            Query::Or(clauses) => {
                for clause in clauses {
                    for &ord in segment.postings(clause) {
                        *scores.entry(ord).or_insert(0.0) += clause.boost;
                    }
                }
            }
            Query::And(clauses) => {
                let mut hits: HashMap<usize, (usize, f32)> = HashMap::new();
                for clause in clauses {
                    for &ord in segment.postings(clause) {
                        let hit = hits.entry(ord).or_insert((0, 0.0));
                        hit.0 += 1;
                        hit.1 += clause.boost;
                    }
                }
                scores.extend(
                    hits.into_iter()
                        .filter(|(_, (matched, _))| *matched == clauses.len())
                        .map(|(ord, (_, score))| (ord, score)),
                );
            }
            Query::MatchAll => {
                scores.extend((0..segment.docs.len()).map(|ord| (ord, 1.0)));
            }
        }

        let mut hits: Vec<ScoredDoc> = scores
            .into_iter()
            .map(|(ordinal, score)| ScoredDoc { ordinal, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        hits.truncate(limit);
        Ok(hits)
    }

    fn most_frequent_terms(&self, field: &str, limit: usize) -> Result<Vec<TermStats>> {
        let segment = self.segment.read();
        let Some(terms) = segment.postings.get(field) else {
            return Ok(Vec::new());
        };
        let mut stats: Vec<TermStats> = terms
            .iter()
            .map(|(term, list)| TermStats {
                term: term.clone(),
                doc_freq: list.len(),
            })
            .collect();
        stats.sort_by(|a, b| b.doc_freq.cmp(&a.doc_freq).then_with(|| a.term.cmp(&b.term)));
        stats.truncate(limit);
        Ok(stats)
    }

    fn size(&self) -> usize {
        self.segment.read().docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FieldValue;

    fn doc(id: &str, bucket: &str, text: &str) -> Fields {
        let mut f = Fields::new();
        f.insert(ID_FIELD.into(), FieldValue::Exact(id.into()));
        f.insert("bucket".into(), FieldValue::Exact(bucket.into()));
        f.insert("text".into(), FieldValue::Text(text.into()));
        f
    }

    fn index() -> MemoryIndex {
        let index = MemoryIndex::new();
        index.add(doc("a", "x", "t0 t1")).unwrap();
        index.add(doc("b", "x", "t1 t2")).unwrap();
        index.add(doc("c", "y", "t2")).unwrap();
        index.commit().unwrap();
        index
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let index = MemoryIndex::new();
        index.add(doc("a", "x", "t0")).unwrap();
        assert_eq!(index.size(), 0);
        assert_eq!(index.pending(), 1);
        assert!(index.get_by_id("a").unwrap().is_none());
        index.commit().unwrap();
        assert_eq!(index.size(), 1);
        assert!(index.get_by_id("a").unwrap().is_some());
    }

    #[test]
    fn most_frequent_terms_are_sorted_by_doc_freq() {
        let stats = index().most_frequent_terms("bucket", 10).unwrap();
        assert_eq!(stats[0], TermStats { term: "x".into(), doc_freq: 2 });
        assert_eq!(stats[1], TermStats { term: "y".into(), doc_freq: 1 });
        assert!(index().most_frequent_terms("missing", 10).unwrap().is_empty());
    }

    #[test]
    fn or_query_sums_boosts() {
        let q = Query::Or(vec![
            TermQuery::new("text", "t1").boosted(4.0),
            TermQuery::new("text", "t2").boosted(1.0),
        ]);
        let hits = index().query(&q, 10).unwrap();
        let ranked: Vec<(usize, f32)> = hits.iter().map(|h| (h.ordinal, h.score)).collect();
        assert_eq!(ranked, vec![(1, 5.0), (0, 4.0), (2, 1.0)]);
    }

    #[test]
    fn and_query_requires_every_clause() {
        let q = Query::And(vec![
            TermQuery::new("bucket", "x"),
            TermQuery::new("text", "t2"),
        ]);
        let hits = index().query(&q, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn match_all_respects_limit() {
        assert_eq!(index().query(&Query::MatchAll, 2).unwrap().len(), 2);
    }

    #[test]
    fn out_of_range_ordinal_is_an_index_error() {
        assert!(matches!(
            index().get_by_ordinal(7),
            Err(HashError::IndexIo(_))
        ));
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn snapshot_round_trip_keeps_postings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        index().save(&path).unwrap();

        let reopened = MemoryIndex::open(&path).unwrap();
        assert_eq!(reopened.size(), 3);
        let hits = reopened
            .query(&Query::Term(TermQuery::new("bucket", "x")), 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(reopened.get_by_id("c").unwrap().is_some());
    }
}
