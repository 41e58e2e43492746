//! Hash-bucketed duplicate and similarity search.
//!
//! Each document is written with `depth` levels of labels derived from its
//! ranked groups (see [`GroupEncoder`]). Duplicate search only compares
//! documents that share a bucket at the chosen level; similarity search
//! retrieves candidates with a boosted OR over the query's own group tokens
//! and verifies them with the real metric.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::{
    load_document, pair, reduced_code_field, reduced_text_field, score_pair, sort_descending,
    top_code_field, top_text_field, Document, Explorer, Similarity,
};
use crate::config::{BucketField, IndexConfig};
use crate::distance::DistanceMetric;
use crate::error::{HashError, Result};
use crate::hash::{hash32, GroupEncoder, HierarchicalHasher, GROUP_SEPARATOR};
use crate::index::{FieldValue, Fields, InvertedIndex, MemoryIndex, Query, TermQuery, TermStats};
use crate::parallel::{CancelToken, Counters, ParallelComparator};
use crate::topk::BoundedTopK;

/// Approximate explorer backed by a [`HierarchicalHasher`].
pub struct ApproximateIndex {
    config: IndexConfig,
    hasher: Arc<dyn HierarchicalHasher>,
    index: Arc<dyn InvertedIndex>,
    pool: ParallelComparator,
    added: AtomicUsize,
}

impl ApproximateIndex {
    /// Build the configured hasher over a fresh [`MemoryIndex`].
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::with_index(config, Arc::new(MemoryIndex::new()))
    }

    /// Build the configured hasher over a caller-supplied backend.
    pub fn with_index(config: IndexConfig, index: Arc<dyn InvertedIndex>) -> Result<Self> {
        config.validate()?;
        let hasher = config.hasher.build(config.depth)?;
        Self::with_hasher(config, hasher, index)
    }

    /// Use an explicit hasher; its depth must match `config.depth`.
    pub fn with_hasher(
        config: IndexConfig,
        hasher: Arc<dyn HierarchicalHasher>,
        index: Arc<dyn InvertedIndex>,
    ) -> Result<Self> {
        config.validate()?;
        if hasher.depth() != config.depth {
            return Err(HashError::config(format!(
                "hasher depth {} does not match configured depth {}",
                hasher.depth(),
                config.depth
            )));
        }
        let pool = ParallelComparator::new(config.threads, config.timeout())?;
        Ok(Self {
            config,
            hasher,
            index,
            pool,
            added: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn hasher(&self) -> &dyn HierarchicalHasher {
        self.hasher.as_ref()
    }

    /// Committed documents.
    pub fn size(&self) -> usize {
        self.index.size()
    }

    fn depth(&self) -> usize {
        self.config.depth
    }

    fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.depth() {
            return Err(HashError::config(format!(
                "level {level} out of range for depth {}",
                self.depth()
            )));
        }
        Ok(())
    }

    fn code_field(&self, level: usize) -> String {
        match self.config.bucket_field {
            BucketField::Reduced => reduced_code_field(level),
            BucketField::Top => top_code_field(level),
        }
    }

    fn text_field(&self, level: usize) -> String {
        match self.config.bucket_field {
            BucketField::Reduced => reduced_text_field(level),
            BucketField::Top => top_text_field(level),
        }
    }

    /// Ranked groups of `vector` ready for label encoding.
    pub fn encoder(&self, vector: &[f64]) -> Result<GroupEncoder> {
        Ok(GroupEncoder::new(self.hasher.groups(vector)?))
    }

    /// Label fields of every level, in both encodings.
    ///
    /// Level `L` of the top encoding keeps the `depth - L` best groups, so
    /// both families coarsen towards the last level.
    fn label_fields(&self, vector: &[f64]) -> Result<Fields> {
        let encoder = self.encoder(vector)?;
        let depth = self.depth();
        let mut fields = Fields::new();
        for (level, reduced) in encoder.encode(depth).iter().enumerate() {
            fields.insert(
                reduced_code_field(level),
                FieldValue::Exact(reduced.hash.to_string()),
            );
            fields.insert(
                reduced_text_field(level),
                FieldValue::Text(token_text(&reduced.label)),
            );
            let top = encoder.top_label(depth - level);
            fields.insert(
                top_code_field(level),
                FieldValue::Exact(hash32(&top).to_string()),
            );
            fields.insert(top_text_field(level), FieldValue::Text(token_text(&top)));
        }
        Ok(fields)
    }

    /// Label fields of the query: the stored copy when `query.id` is indexed,
    /// otherwise freshly hashed.
    fn query_fields(&self, query: &Document) -> Result<Fields> {
        match self.index.get_by_id(&query.id)? {
            Some(stored) => Ok(stored),
            None => self.label_fields(&query.vector),
        }
    }

    /// Boosted OR over the query's group tokens at `level` and coarser.
    ///
    /// A token at level `L` is boosted by `(depth - L)^2`.
    fn similarity_query(&self, query: &Document, level: usize) -> Result<Query> {
        let fields = self.query_fields(query)?;
        let depth = self.depth();
        let mut clauses = Vec::new();
        'levels: for l in level..depth {
            let field = self.text_field(l);
            let Some(text) = fields.get(&field).and_then(FieldValue::as_str) else {
                continue;
            };
            let boost = ((depth - l) * (depth - l)) as f32;
            for token in text.split_whitespace() {
                if clauses.len() == self.config.max_clauses {
                    warn!(
                        query = %query.id,
                        max_clauses = self.config.max_clauses,
                        "similarity query truncated at clause limit"
                    );
                    break 'levels;
                }
                clauses.push(TermQuery::new(field.clone(), token).boosted(boost));
            }
        }
        Ok(Query::Or(clauses))
    }

    /// Duplicate search at an explicit level.
    pub fn find_duplicates_at(
        &self,
        metric: DistanceMetric,
        level: usize,
        counters: &Counters,
    ) -> Vec<Similarity> {
        match self.try_find_duplicates(metric, level, counters) {
            Ok(pairs) => pairs,
            Err(e) => {
                error!(explorer = %self.name(), level, error = %e, "duplicate search failed");
                Vec::new()
            }
        }
    }

    fn try_find_duplicates(
        &self,
        metric: DistanceMetric,
        level: usize,
        counters: &Counters,
    ) -> Result<Vec<Similarity>> {
        self.check_level(level)?;
        let start = Instant::now();
        let field = self.code_field(level);
        let buckets: Vec<TermStats> = self
            .index
            .most_frequent_terms(&field, self.config.max_buckets)?
            .into_iter()
            .take_while(|bucket| bucket.doc_freq >= 2)
            .collect();
        info!(
            explorer = %self.name(),
            %metric,
            buckets = buckets.len(),
            "duplicate search started"
        );

        let results: Arc<Mutex<Vec<Similarity>>> = Arc::default();
        let mut group = self.pool.group();
        for bucket in buckets {
            let index = Arc::clone(&self.index);
            let results = Arc::clone(&results);
            let counters = counters.clone();
            let field = field.clone();
            group.spawn(move |cancel| {
                match compare_bucket(index.as_ref(), &field, &bucket, metric, &counters, cancel) {
                    Ok(pairs) => results.lock().extend(pairs),
                    Err(e) => error!(bucket = %bucket.term, error = %e, "bucket skipped"),
                }
            });
        }
        let completion = group.await_completion();

        let mut pairs = std::mem::take(&mut *results.lock());
        sort_descending(&mut pairs);
        info!(
            explorer = %self.name(),
            pairs = pairs.len(),
            comparisons = counters.comparisons(),
            buckets_finished = completion.finished,
            timed_out = completion.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "duplicate search finished"
        );
        Ok(pairs)
    }

    /// Similarity search at an explicit level.
    pub fn find_similar_to_at(
        &self,
        query: &Document,
        metric: DistanceMetric,
        max_results: usize,
        level: usize,
        counters: &Counters,
    ) -> Vec<Similarity> {
        match self.try_find_similar(query, metric, max_results, level, counters) {
            Ok(similar) => similar,
            Err(e) => {
                error!(explorer = %self.name(), query = %query.id, error = %e, "similarity search failed");
                Vec::new()
            }
        }
    }

    fn try_find_similar(
        &self,
        query: &Document,
        metric: DistanceMetric,
        max_results: usize,
        level: usize,
        counters: &Counters,
    ) -> Result<Vec<Similarity>> {
        self.check_level(level)?;
        let expr = self.similarity_query(query, level)?;
        let hits = self.index.query(&expr, self.index.size())?;
        let top = BoundedTopK::new(max_results);
        for hit in hits {
            let candidate = match load_document(self.index.as_ref(), hit.ordinal) {
                Ok(doc) => doc,
                Err(e) => {
                    error!(ordinal = hit.ordinal, error = %e, "candidate skipped");
                    continue;
                }
            };
            if candidate.id == query.id {
                continue;
            }
            if let Some(score) = score_pair(metric, query, &candidate, counters) {
                top.push(score, pair(score, query, &candidate));
            }
        }
        counters.add_documents(1);
        Ok(top.into_sorted_vec().into_iter().map(|(_, s)| s).collect())
    }

    /// Percentage of the index matched by `query`'s boosted label query.
    ///
    /// Returns 100.0 when the index cannot answer.
    pub fn candidate_ratio(&self, query: &Document) -> f64 {
        match self.try_candidate_ratio(query) {
            Ok(ratio) => ratio,
            Err(e) => {
                error!(query = %query.id, error = %e, "candidate ratio unavailable");
                100.0
            }
        }
    }

    fn try_candidate_ratio(&self, query: &Document) -> Result<f64> {
        let size = self.index.size();
        if size == 0 {
            return Ok(0.0);
        }
        let expr = self.similarity_query(query, self.config.level)?;
        let hits = self.index.query(&expr, size)?;
        Ok(hits.len() as f64 * 100.0 / size as f64)
    }
}

impl Explorer for ApproximateIndex {
    fn id(&self) -> &'static str {
        self.hasher.id()
    }

    fn name(&self) -> String {
        format!("{}-L{}", self.id(), self.config.level)
    }

    fn add(&self, doc: &Document) -> Result<()> {
        let mut fields = doc.base_fields()?;
        fields.append(&mut self.label_fields(&doc.vector)?);
        self.index.add(fields)?;

        let added = self.added.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(every) = self.config.commit_every {
            if added % every == 0 {
                self.index.commit()?;
                info!(explorer = %self.name(), added, "indexed documents");
            }
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.index.commit()
    }

    fn find_duplicates(&self, metric: DistanceMetric, counters: &Counters) -> Vec<Similarity> {
        self.find_duplicates_at(metric, self.config.level, counters)
    }

    fn find_similar_to(
        &self,
        query: &Document,
        metric: DistanceMetric,
        max_results: usize,
        counters: &Counters,
    ) -> Vec<Similarity> {
        self.find_similar_to_at(query, metric, max_results, self.config.level, counters)
    }
}

impl std::fmt::Debug for ApproximateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApproximateIndex")
            .field("hasher", &self.hasher)
            .field("config", &self.config)
            .field("size", &self.index.size())
            .finish()
    }
}

/// Space-separated group tokens for a tokenized field.
fn token_text(label: &str) -> String {
    label.replace(GROUP_SEPARATOR, " ")
}

/// All pairwise comparisons inside one bucket.
fn compare_bucket(
    index: &dyn InvertedIndex,
    field: &str,
    bucket: &TermStats,
    metric: DistanceMetric,
    counters: &Counters,
    cancel: &CancelToken,
) -> Result<Vec<Similarity>> {
    let hits = index.query(
        &Query::Term(TermQuery::new(field, bucket.term.as_str())),
        index.size(),
    )?;
    let docs = hits
        .iter()
        .map(|hit| load_document(index, hit.ordinal))
        .collect::<Result<Vec<_>>>()?;

    let mut pairs = Vec::new();
    for (i, a) in docs.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        for b in &docs[..i] {
            if a.id == b.id {
                continue;
            }
            if let Some(score) = score_pair(metric, a, b, counters) {
                pairs.push(pair(score, a, b));
            }
        }
    }
    counters.add_documents(docs.len() as u64);
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HasherKind;

    fn config(hasher: HasherKind) -> IndexConfig {
        IndexConfig::default()
            .with_depth(3)
            .with_hasher(hasher)
            .with_threads(2)
    }

    fn corpus(index: &ApproximateIndex) {
        let docs = [
            ("a", vec![0.9, 0.05, 0.03, 0.02]),
            ("b", vec![0.9, 0.05, 0.03, 0.02]),
            ("c", vec![0.02, 0.03, 0.05, 0.9]),
            ("d", vec![0.25, 0.25, 0.25, 0.25]),
        ];
        for (id, v) in docs {
            index.add(&Document::new(id, v)).unwrap();
        }
        index.commit().unwrap();
    }

    #[test]
    fn writes_both_label_families_per_level() {
        let index = ApproximateIndex::new(config(HasherKind::Threshold)).unwrap();
        let fields = index.label_fields(&[0.9, 0.05, 0.03, 0.02]).unwrap();
        assert_eq!(fields.len(), 4 * 3);
        let last = fields[&reduced_text_field(2)].as_str().unwrap();
        assert_eq!(last, fields[&top_text_field(2)].as_str().unwrap());
        assert_eq!(last, "t0");
    }

    #[test]
    fn identical_vectors_are_duplicates_for_every_hasher() {
        for kind in [
            HasherKind::Threshold,
            HasherKind::Centroid {
                max_iterations: 20,
                seed: Some(7),
            },
            HasherKind::Density,
        ] {
            let index = ApproximateIndex::new(config(kind)).unwrap();
            corpus(&index);
            let counters = Counters::new();
            let pairs = index.find_duplicates(DistanceMetric::JensenShannon, &counters);
            let found = pairs.iter().any(|p| {
                let ids = [p.a.id.as_str(), p.b.id.as_str()];
                ids.contains(&"a") && ids.contains(&"b") && (p.score - 1.0).abs() < 1e-12
            });
            assert!(found, "{} missed the exact duplicate", index.id());
            assert!(counters.comparisons() <= 6);
        }
    }

    #[test]
    fn out_of_range_level_yields_empty_result() {
        let index = ApproximateIndex::new(config(HasherKind::Threshold)).unwrap();
        corpus(&index);
        let counters = Counters::new();
        assert!(index
            .find_duplicates_at(DistanceMetric::JensenShannon, 9, &counters)
            .is_empty());
        assert_eq!(counters.comparisons(), 0);
    }

    #[test]
    fn similar_to_skips_self_and_ranks_best_first() {
        let index = ApproximateIndex::new(config(HasherKind::Threshold)).unwrap();
        corpus(&index);
        let query = Document::new("a", vec![0.9, 0.05, 0.03, 0.02]);
        let similar = index.find_similar_to(
            &query,
            DistanceMetric::JensenShannon,
            2,
            &Counters::new(),
        );
        assert!(!similar.is_empty());
        assert!(similar.iter().all(|s| s.b.id != "a"));
        assert_eq!(similar[0].b.id, "b");
        assert!(similar.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn similarity_query_is_truncated_at_clause_limit() {
        let mut cfg = config(HasherKind::Threshold);
        let query = Document::new("a", vec![0.9, 0.05, 0.03, 0.02]);

        let index = ApproximateIndex::new(cfg.clone()).unwrap();
        corpus(&index);
        let Query::Or(clauses) = index.similarity_query(&query, 0).unwrap() else {
            panic!("expected a boosted OR");
        };
        assert_eq!(clauses.len(), 4);

        cfg.max_clauses = 1;
        let index = ApproximateIndex::new(cfg).unwrap();
        corpus(&index);
        let Query::Or(clauses) = index.similarity_query(&query, 0).unwrap() else {
            panic!("expected a boosted OR");
        };
        assert_eq!(
            clauses,
            vec![TermQuery::new(reduced_text_field(0), "t0").boosted(9.0)]
        );

        // The surviving clause still retrieves the duplicate.
        let similar =
            index.find_similar_to(&query, DistanceMetric::JensenShannon, 3, &Counters::new());
        assert_eq!(similar[0].b.id, "b");
        assert!((similar[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn candidate_ratio_is_a_percentage() {
        let index = ApproximateIndex::new(config(HasherKind::Threshold)).unwrap();
        let query = Document::new("q", vec![0.9, 0.05, 0.03, 0.02]);
        assert_eq!(index.candidate_ratio(&query), 0.0);
        corpus(&index);
        let ratio = index.candidate_ratio(&query);
        assert!(ratio > 0.0 && ratio <= 100.0);
    }

    #[test]
    fn auto_commit_makes_documents_visible() {
        let mut cfg = config(HasherKind::Density);
        cfg.commit_every = Some(2);
        let index = ApproximateIndex::new(cfg).unwrap();
        index.add(&Document::new("a", vec![0.5, 0.5])).unwrap();
        assert_eq!(index.size(), 0);
        index.add(&Document::new("b", vec![0.5, 0.5])).unwrap();
        assert_eq!(index.size(), 2);
    }

    #[test]
    fn empty_vector_is_rejected_on_add() {
        let index = ApproximateIndex::new(config(HasherKind::Density)).unwrap();
        assert!(matches!(
            index.add(&Document::new("e", Vec::new())),
            Err(HashError::InvalidInput(_))
        ));
    }

    #[test]
    fn mismatched_hasher_depth_is_rejected() {
        let hasher = HasherKind::Threshold.build(2).unwrap();
        assert!(matches!(
            ApproximateIndex::with_hasher(
                config(HasherKind::Threshold),
                hasher,
                Arc::new(MemoryIndex::new())
            ),
            Err(HashError::Configuration(_))
        ));
    }

    #[test]
    fn name_includes_level() {
        let index = ApproximateIndex::new(config(HasherKind::Centroid {
            max_iterations: 10,
            seed: None,
        }))
        .unwrap();
        assert_eq!(index.name(), "centroid-L0");
    }
}
