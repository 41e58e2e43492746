//! Exhaustive pairwise baseline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{error, info};

use super::{load_document, pair, score_pair, sort_descending, Document, Explorer, Similarity};
use crate::config::IndexConfig;
use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::index::{InvertedIndex, MemoryIndex};
use crate::parallel::{CancelToken, Counters, ParallelComparator};
use crate::topk::BoundedTopK;

/// Compares every document with every other one.
///
/// Stores raw vectors only. The outer document is the unit of parallel work:
/// task `i` compares document `i` with every `j < i`.
pub struct ExactBaseline {
    config: IndexConfig,
    index: Arc<dyn InvertedIndex>,
    pool: ParallelComparator,
    added: AtomicUsize,
}

impl ExactBaseline {
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::with_index(config, Arc::new(MemoryIndex::new()))
    }

    pub fn with_index(config: IndexConfig, index: Arc<dyn InvertedIndex>) -> Result<Self> {
        config.validate()?;
        let pool = ParallelComparator::new(config.threads, config.timeout())?;
        Ok(Self {
            config,
            index,
            pool,
            added: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn size(&self) -> usize {
        self.index.size()
    }

    fn load_all(&self) -> Result<Vec<Document>> {
        (0..self.index.size())
            .map(|ordinal| load_document(self.index.as_ref(), ordinal))
            .collect()
    }

    /// Every pair with similarity `>= threshold`, best first.
    ///
    /// Task `i` reads its documents from the index as it goes, so a slow
    /// backend is bounded by the deadline too. On timeout the pairs found so
    /// far are returned.
    pub fn find_duplicates_above(
        &self,
        metric: DistanceMetric,
        threshold: f64,
        counters: &Counters,
    ) -> Vec<Similarity> {
        let n = self.index.size();
        let start = Instant::now();
        info!(explorer = self.id(), %metric, documents = n, threshold, "baseline scan started");

        let results: Arc<Mutex<Vec<Similarity>>> = Arc::default();
        let done = Arc::new(AtomicUsize::new(0));
        let decile = (n / 10).max(1);
        let mut group = self.pool.group();
        for i in 1..n {
            let index = Arc::clone(&self.index);
            let results = Arc::clone(&results);
            let done = Arc::clone(&done);
            let counters = counters.clone();
            group.spawn(move |cancel| {
                match compare_earlier(index.as_ref(), i, metric, threshold, &counters, cancel) {
                    Ok(Some(local)) => results.lock().extend(local),
                    Ok(None) => return,
                    Err(e) => {
                        error!(ordinal = i, error = %e, "document skipped");
                        return;
                    }
                }
                counters.add_documents(1);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                if finished % decile == 0 {
                    info!(finished, total = n - 1, "baseline progress");
                }
            });
        }
        let completion = group.await_completion();

        let mut pairs = std::mem::take(&mut *results.lock());
        sort_descending(&mut pairs);
        info!(
            explorer = self.id(),
            pairs = pairs.len(),
            comparisons = counters.comparisons(),
            finished = completion.finished,
            timed_out = completion.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "baseline scan finished"
        );
        pairs
    }

    /// Every document with similarity strictly above `threshold`, best first.
    pub fn find_similar_above(
        &self,
        query: &Document,
        metric: DistanceMetric,
        threshold: f64,
        counters: &Counters,
    ) -> Vec<Similarity> {
        let mut similar: Vec<Similarity> = self
            .scan(query, metric, counters)
            .into_iter()
            .filter(|s| s.score > threshold)
            .collect();
        sort_descending(&mut similar);
        similar
    }

    /// Score `query` against every stored document except itself.
    fn scan(&self, query: &Document, metric: DistanceMetric, counters: &Counters) -> Vec<Similarity> {
        let docs = match self.load_all() {
            Ok(docs) => docs,
            Err(e) => {
                error!(explorer = self.id(), query = %query.id, error = %e, "baseline scan failed");
                return Vec::new();
            }
        };
        counters.add_documents(1);
        docs.iter()
            .filter(|doc| doc.id != query.id)
            .filter_map(|doc| score_pair(metric, query, doc, counters).map(|s| pair(s, query, doc)))
            .collect()
    }
}

/// Pairs of document `i` with every earlier ordinal scoring `>= threshold`.
///
/// `None` when the group was cancelled before the row finished.
fn compare_earlier(
    index: &dyn InvertedIndex,
    i: usize,
    metric: DistanceMetric,
    threshold: f64,
    counters: &Counters,
    cancel: &CancelToken,
) -> Result<Option<Vec<Similarity>>> {
    let a = load_document(index, i)?;
    let mut local = Vec::new();
    for j in 0..i {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let b = load_document(index, j)?;
        if a.id == b.id {
            continue;
        }
        match score_pair(metric, &a, &b, counters) {
            Some(score) if score >= threshold => local.push(pair(score, &a, &b)),
            _ => {}
        }
    }
    Ok(Some(local))
}

impl Explorer for ExactBaseline {
    fn id(&self) -> &'static str {
        "brute-force"
    }

    fn add(&self, doc: &Document) -> Result<()> {
        self.index.add(doc.base_fields()?)?;
        let added = self.added.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(every) = self.config.commit_every {
            if added % every == 0 {
                self.index.commit()?;
                info!(explorer = self.id(), added, "indexed documents");
            }
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.index.commit()
    }

    fn find_duplicates(&self, metric: DistanceMetric, counters: &Counters) -> Vec<Similarity> {
        self.find_duplicates_above(metric, self.config.threshold, counters)
    }

    fn find_similar_to(
        &self,
        query: &Document,
        metric: DistanceMetric,
        max_results: usize,
        counters: &Counters,
    ) -> Vec<Similarity> {
        let top = BoundedTopK::new(max_results);
        for similarity in self.scan(query, metric, counters) {
            top.push(similarity.score, similarity);
        }
        top.into_sorted_vec().into_iter().map(|(_, s)| s).collect()
    }
}

impl std::fmt::Debug for ExactBaseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactBaseline")
            .field("config", &self.config)
            .field("size", &self.index.size())
            .finish()
    }
}
