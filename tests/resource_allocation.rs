mod common;

use ascension_lib::model::allocator::ResourceAllocator;
use ascension_lib::model::EngineError;
use common::EngineBuilder;
use proptest::prelude::*;

prop_compose! {
    fn arb_weights()(
        weights in prop::collection::vec(prop_oneof![Just(0.0), 0.01f64..1.0], 2..8)
    ) -> Vec<(String, f64)> {
        let mut weights: Vec<(String, f64)> = weights
            .into_iter()
            .enumerate()
            .map(|(i, w)| (format!("share_{i}"), w))
            .collect();
        // At least one positive weight.
        weights[0].1 += 0.5;
        weights
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_weighted_pool_is_normalized(weights in arb_weights()) {
        let pool = ResourceAllocator::weighted("pool", weights).unwrap();
        prop_assert!((pool.total() - 1.0).abs() < 1e-9);
        for share in pool.shares() {
            prop_assert!((0.0..=1.0).contains(&share.fraction));
        }
    }

    #[test]
    fn test_set_share_keeps_pool_normalized(
        weights in arb_weights(),
        pick in any::<prop::sample::Index>(),
        value in 0.0f64..=1.0
    ) {
        let mut pool = ResourceAllocator::weighted("pool", weights).unwrap();
        let name = pool.shares()[pick.index(pool.shares().len())].name.clone();

        pool.set_share(&name, value).unwrap();

        prop_assert!((pool.total() - 1.0).abs() < 1e-9, "total {}", pool.total());
        prop_assert_eq!(pool.share(&name), Some(value));
        for share in pool.shares() {
            prop_assert!(share.fraction >= 0.0 && share.fraction <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_set_share_preserves_ratios_of_others(
        weights in arb_weights(),
        value in 0.0f64..0.99
    ) {
        let mut pool = ResourceAllocator::weighted("pool", weights).unwrap();
        let before: Vec<f64> = pool.shares().iter().map(|s| s.fraction).collect();

        pool.set_share("share_0", value).unwrap();

        let after: Vec<f64> = pool.shares().iter().map(|s| s.fraction).collect();
        let others_before: f64 = before[1..].iter().sum();
        if others_before > 0.0 {
            for i in 1..before.len() {
                let expected = before[i] / others_before * (1.0 - value);
                prop_assert!((after[i] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_out_of_range_share_leaves_pool_unchanged(
        weights in arb_weights(),
        value in prop_oneof![-10.0f64..-1e-6, 1.000_001f64..10.0]
    ) {
        let mut pool = ResourceAllocator::weighted("pool", weights).unwrap();
        let before = pool.snapshot();

        let result = pool.set_share("share_0", value);

        let rejected = matches!(result, Err(EngineError::InvalidShare { .. }));
        prop_assert!(rejected);
        prop_assert_eq!(pool.snapshot(), before);
    }
}

#[test]
fn test_zero_remainder_is_split_equally() {
    let mut pool = ResourceAllocator::weighted(
        "pool",
        vec![("a".into(), 1.0), ("b".into(), 0.0), ("c".into(), 0.0)],
    )
    .unwrap();

    pool.set_share("a", 0.4).unwrap();

    assert!((pool.share("b").unwrap() - 0.3).abs() < 1e-12);
    assert!((pool.share("c").unwrap() - 0.3).abs() < 1e-12);
    assert_normalized!(pool);
}

#[test]
fn test_full_share_zeroes_the_rest() {
    let mut pool = ResourceAllocator::weighted(
        "pool",
        vec![("a".into(), 0.5), ("b".into(), 0.5)],
    )
    .unwrap();

    pool.set_share("a", 1.0).unwrap();
    assert_eq!(pool.share("b"), Some(0.0));

    // Giving the share back redistributes equally over the zeroed rest.
    pool.set_share("a", 0.2).unwrap();
    assert!((pool.share("b").unwrap() - 0.8).abs() < 1e-12);
    assert_normalized!(pool);
}

#[test]
fn test_single_share_pool() {
    let mut pool = ResourceAllocator::weighted("solo", vec![("only".into(), 3.0)]).unwrap();
    assert_eq!(pool.share("only"), Some(1.0));

    assert!(pool.set_share("only", 1.0).is_ok());
    assert_engine_err!(pool.set_share("only", 0.5), EngineError::InvalidShare { .. });
    assert_eq!(pool.share("only"), Some(1.0));
}

#[test]
fn test_non_finite_share_rejected() {
    let mut pool = ResourceAllocator::weighted(
        "pool",
        vec![("a".into(), 0.5), ("b".into(), 0.5)],
    )
    .unwrap();

    assert_engine_err!(pool.set_share("a", f64::NAN), EngineError::InvalidShare { .. });
    assert_engine_err!(pool.set_share("a", f64::INFINITY), EngineError::InvalidShare { .. });
    assert_eq!(pool.share("a"), Some(0.5));
}

#[test]
fn test_engine_cognition_pool() {
    let (mut engine, _notifier) = EngineBuilder::new().build();

    engine.set_share("cognition", "memory", 0.5).unwrap();
    let pool = engine.pool("cognition").unwrap();
    assert_eq!(pool.share("memory"), Some(0.5));
    assert_normalized!(pool);

    // reasoning:perception stays 0.3:0.2
    let ratio = pool.share("reasoning").unwrap() / pool.share("perception").unwrap();
    assert!((ratio - 1.5).abs() < 1e-9);

    assert_engine_err!(
        engine.set_share("cognition", "intuition", 0.1),
        EngineError::UnknownEntity { .. }
    );
    assert_engine_err!(
        engine.set_share("attention", "memory", 0.1),
        EngineError::UnknownEntity { .. }
    );
    assert_engine_err!(
        engine.set_share("cognition", "memory", 1.5),
        EngineError::InvalidShare { .. }
    );
    assert_eq!(engine.pool("cognition").unwrap().share("memory"), Some(0.5));
}
