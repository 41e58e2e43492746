//! Property-based tests for hierhash components.
//!
//! These tests verify invariants that should hold regardless of input:
//! - Every hasher produces exactly `depth` non-empty levels
//! - The coarsest encoded level is the single best group
//! - Identical inputs have similarity 1 under every metric
//! - JSD stays finite and bounded by ln 2
//! - BoundedTopK keeps exactly the best scores

use hierhash::distance::{jensen_shannon, DistanceMetric};
use hierhash::hash::{
    CentroidHasher, DensityHasher, GroupEncoder, HierarchicalHasher, ThresholdHasher,
};
use hierhash::BoundedTopK;
use proptest::prelude::*;

prop_compose! {
    /// Strictly positive weights normalized to sum 1.
    fn arb_distribution(max_dim: usize)(
        raw in prop::collection::vec(0.001f64..1.0, 1..=max_dim)
    ) -> Vec<f64> {
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }
}

fn hashers(depth: usize) -> Vec<Box<dyn HierarchicalHasher>> {
    vec![
        Box::new(ThresholdHasher::new(depth).unwrap()),
        Box::new(CentroidHasher::new(depth, 50).unwrap()),
        Box::new(DensityHasher::new(depth).unwrap()),
    ]
}

mod hash_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn hash_has_depth_non_empty_levels(v in arb_distribution(24), depth in 1usize..6) {
            for hasher in hashers(depth) {
                let code = hasher.hash(&v).unwrap();
                prop_assert_eq!(code.depth(), depth, "{}", hasher.id());
                for level in code.iter() {
                    prop_assert!(!level.label.is_empty(), "{} produced an empty label", hasher.id());
                }
            }
        }

        #[test]
        fn groups_are_sorted_and_cover_every_dimension(v in arb_distribution(24), depth in 1usize..6) {
            for hasher in hashers(depth) {
                let groups = hasher.groups(&v).unwrap();
                prop_assert!(groups.windows(2).all(|w| w[0].mean_weight >= w[1].mean_weight));
                let mut members: Vec<usize> =
                    groups.iter().flat_map(|g| g.members.iter().copied()).collect();
                members.sort_unstable();
                prop_assert_eq!(members, (0..v.len()).collect::<Vec<_>>());
            }
        }

        #[test]
        fn coarsest_level_is_the_top_group(v in arb_distribution(24), depth in 1usize..6) {
            for hasher in hashers(depth) {
                let groups = hasher.groups(&v).unwrap();
                let top = groups[0].label.clone();
                let code = GroupEncoder::new(groups).encode(depth);
                prop_assert_eq!(&code.level(depth - 1).unwrap().label, &top);
            }
        }

        #[test]
        fn hashing_is_deterministic(v in arb_distribution(16)) {
            for hasher in hashers(3) {
                prop_assert_eq!(hasher.hash(&v).unwrap(), hasher.hash(&v).unwrap());
            }
        }
    }
}

mod distance_props {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn identical_inputs_have_unit_similarity(v in arb_distribution(32)) {
            for metric in DistanceMetric::ALL {
                let s = metric.similarity(&v, &v).unwrap();
                prop_assert!((s - 1.0).abs() < 1e-12, "{} gave {}", metric, s);
            }
        }

        #[test]
        fn jsd_is_finite_and_bounded(v in arb_distribution(16), w in arb_distribution(16)) {
            let n = v.len().min(w.len());
            let d = jensen_shannon(&v[..n], &w[..n]).unwrap();
            prop_assert!(d.is_finite());
            prop_assert!(d >= -1e-12 && d <= std::f64::consts::LN_2 + 1e-12, "jsd = {}", d);
        }

        #[test]
        fn jsd_is_symmetric(v in arb_distribution(16), w in arb_distribution(16)) {
            let n = v.len().min(w.len());
            let ab = jensen_shannon(&v[..n], &w[..n]).unwrap();
            let ba = jensen_shannon(&w[..n], &v[..n]).unwrap();
            prop_assert!((ab - ba).abs() < 1e-12);
        }
    }
}

mod topk_props {
    use super::*;

    proptest! {
        #[test]
        fn keeps_the_best_scores(
            scores in prop::collection::vec(-100.0f64..100.0, 0..200),
            k in 0usize..20,
        ) {
            let top = BoundedTopK::new(k);
            for (i, &s) in scores.iter().enumerate() {
                top.push(s, i);
            }
            let kept: Vec<f64> = top.into_sorted_vec().into_iter().map(|(s, _)| s).collect();

            let mut expected = scores.clone();
            expected.sort_by(|a, b| b.total_cmp(a));
            expected.truncate(k);
            prop_assert_eq!(kept, expected);
        }
    }
}
