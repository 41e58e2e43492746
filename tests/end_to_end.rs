//! End-to-end: index a clustered corpus with every explorer and compare the
//! approximate results against the exhaustive baseline.

use std::collections::HashSet;

use hierhash::algorithms::{ApproximateIndex, Document, ExactBaseline, Explorer, Similarity};
use hierhash::{efficiency, Counters, DistanceMetric, HasherKind, IndexConfig};
use rand::prelude::*;

const THRESHOLD: f64 = 0.95;

fn noisy(base: &[f64], rng: &mut StdRng) -> Vec<f64> {
    let raw: Vec<f64> = base
        .iter()
        .map(|w| w + rng.random_range(-0.005..0.005))
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// 50 documents around each of two well-separated distributions.
fn two_clusters() -> Vec<Document> {
    let mut rng = StdRng::seed_from_u64(42);
    let a = [0.9, 0.05, 0.025, 0.025];
    let b = [0.025, 0.025, 0.05, 0.9];
    let mut docs = Vec::with_capacity(100);
    for i in 0..50 {
        docs.push(Document::new(format!("a{i}"), noisy(&a, &mut rng)));
        docs.push(Document::new(format!("b{i}"), noisy(&b, &mut rng)));
    }
    docs
}

fn config(hasher: HasherKind) -> IndexConfig {
    IndexConfig::default()
        .with_depth(3)
        .with_hasher(hasher)
        .with_threads(4)
        .with_threshold(THRESHOLD)
}

fn load(explorer: &dyn Explorer, docs: &[Document]) {
    for doc in docs {
        explorer.add(doc).unwrap();
    }
    explorer.commit().unwrap();
}

fn pair_set(pairs: &[Similarity], threshold: f64) -> HashSet<(String, String)> {
    pairs
        .iter()
        .filter(|p| p.score >= threshold)
        .map(|p| {
            let (x, y) = (p.a.id.clone(), p.b.id.clone());
            if x < y {
                (x, y)
            } else {
                (y, x)
            }
        })
        .collect()
}

#[test]
fn finest_level_recovers_within_cluster_pairs() {
    let docs = two_clusters();

    let exact = ExactBaseline::new(config(HasherKind::Threshold)).unwrap();
    load(&exact, &docs);
    let exact_counters = Counters::new();
    let truth = pair_set(
        &exact.find_duplicates(DistanceMetric::JensenShannon, &exact_counters),
        THRESHOLD,
    );
    assert_eq!(truth.len(), 2 * (50 * 49 / 2));
    assert_eq!(exact_counters.comparisons(), 100 * 99 / 2);

    // Centroid is checked at the coarsest level below: with k = depth + 1 = 4
    // on 4 dimensions every dimension is its own group, and the two tail
    // dimensions swap rank under noise, which splits the finest buckets.
    for kind in [HasherKind::Threshold, HasherKind::Density] {
        let approx = ApproximateIndex::new(config(kind)).unwrap();
        load(&approx, &docs);
        let counters = Counters::new();
        let found = pair_set(
            &approx.find_duplicates(DistanceMetric::JensenShannon, &counters),
            THRESHOLD,
        );

        let recall = truth.intersection(&found).count() as f64 / truth.len() as f64;
        assert!(recall >= 0.95, "{}: recall {recall}", approx.name());
        assert!(counters.comparisons() <= exact_counters.comparisons());
        assert!(efficiency(counters.comparisons(), exact_counters.comparisons()) > 0.0);
    }
}

#[test]
fn centroid_coarsest_level_recovers_within_cluster_pairs() {
    let docs = two_clusters();
    let exact = ExactBaseline::new(config(HasherKind::Threshold)).unwrap();
    load(&exact, &docs);
    let exact_counters = Counters::new();
    let truth = pair_set(
        &exact.find_duplicates(DistanceMetric::JensenShannon, &exact_counters),
        THRESHOLD,
    );

    let kind = HasherKind::Centroid {
        max_iterations: 50,
        seed: None,
    };
    let approx = ApproximateIndex::new(config(kind).with_level(2)).unwrap();
    load(&approx, &docs);
    let counters = Counters::new();
    let found = pair_set(
        &approx.find_duplicates(DistanceMetric::JensenShannon, &counters),
        THRESHOLD,
    );

    let recall = truth.intersection(&found).count() as f64 / truth.len() as f64;
    assert!(recall >= 0.95, "{}: recall {recall}", approx.name());
    assert!(counters.comparisons() < exact_counters.comparisons());
}

#[test]
fn exact_duplicates_are_found_by_every_explorer() {
    let mut docs = two_clusters();
    let dup = [0.6, 0.2, 0.15, 0.05];
    docs.push(Document::new("dup-1", dup.to_vec()));
    docs.push(Document::new("dup-2", dup.to_vec()));

    let mut explorers: Vec<Box<dyn Explorer>> = vec![
        Box::new(ApproximateIndex::new(config(HasherKind::Threshold)).unwrap()),
        Box::new(
            ApproximateIndex::new(config(HasherKind::Centroid {
                max_iterations: 50,
                seed: Some(3),
            }))
            .unwrap(),
        ),
        Box::new(ApproximateIndex::new(config(HasherKind::Density)).unwrap()),
    ];
    explorers.push(Box::new(
        ExactBaseline::new(config(HasherKind::Threshold)).unwrap(),
    ));

    let expected = ("dup-1".to_string(), "dup-2".to_string());
    for explorer in &explorers {
        load(explorer.as_ref(), &docs);
        for metric in [
            DistanceMetric::JensenShannon,
            DistanceMetric::S2JSD,
            DistanceMetric::Hellinger,
        ] {
            let pairs = explorer.find_duplicates(metric, &Counters::new());
            assert!(
                pair_set(&pairs, 1.0 - 1e-12).contains(&expected),
                "{} missed the duplicate under {metric}",
                explorer.name()
            );
        }
    }
}

#[test]
fn approximate_never_compares_more_than_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    let docs: Vec<Document> = (0..60)
        .map(|i| {
            let raw: Vec<f64> = (0..8).map(|_| rng.random::<f64>() + 0.01).collect();
            let sum: f64 = raw.iter().sum();
            Document::new(format!("r{i}"), raw.into_iter().map(|w| w / sum).collect())
        })
        .collect();

    let exact = ExactBaseline::new(config(HasherKind::Density)).unwrap();
    load(&exact, &docs);
    let exact_counters = Counters::new();
    exact.find_duplicates(DistanceMetric::Hellinger, &exact_counters);

    for level in 0..3 {
        let approx = ApproximateIndex::new(config(HasherKind::Density).with_level(level)).unwrap();
        load(&approx, &docs);
        let counters = Counters::new();
        approx.find_duplicates(DistanceMetric::Hellinger, &counters);
        assert!(
            counters.comparisons() <= exact_counters.comparisons(),
            "level {level}: {} > {}",
            counters.comparisons(),
            exact_counters.comparisons()
        );
    }
}

#[test]
fn similar_to_returns_same_cluster_neighbors() {
    let docs = two_clusters();
    let approx = ApproximateIndex::new(config(HasherKind::Threshold)).unwrap();
    let exact = ExactBaseline::new(config(HasherKind::Threshold)).unwrap();
    load(&approx, &docs);
    load(&exact, &docs);

    let query = Document::new("q", vec![0.89, 0.06, 0.025, 0.025]);
    let explorers: [&dyn Explorer; 2] = [&approx, &exact];
    for explorer in explorers {
        let similar =
            explorer.find_similar_to(&query, DistanceMetric::JensenShannon, 10, &Counters::new());
        assert_eq!(similar.len(), 10, "{}", explorer.name());
        assert!(similar.iter().all(|s| s.a.id == "q" && s.b.id.starts_with('a')));
        assert!(similar.windows(2).all(|w| w[0].score >= w[1].score));
    }

    let ratio = approx.candidate_ratio(&query);
    assert!((ratio - 50.0).abs() < 1e-9, "ratio {ratio}");
}

#[test]
fn top_encoding_buckets_also_find_duplicates() {
    let docs = two_clusters();
    let mut cfg = config(HasherKind::Density);
    cfg.bucket_field = hierhash::BucketField::Top;
    let approx = ApproximateIndex::new(cfg).unwrap();
    load(&approx, &docs);

    let pairs = approx.find_duplicates(DistanceMetric::JensenShannon, &Counters::new());
    let found = pair_set(&pairs, THRESHOLD);
    assert_eq!(found.len(), 2 * (50 * 49 / 2));
}
