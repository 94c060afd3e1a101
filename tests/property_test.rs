//! Property tests: score bounds, threshold ordering, snapshot round trips,
//! and trait weight monotonicity over random feedback sequences.

use proptest::prelude::*;
use std::sync::Arc;
use survey_sentiment_core::audit::ThresholdAuditLog;
use survey_sentiment_core::config::{BackgroundConfig, TraitConfig};
use survey_sentiment_core::scoring::background::ScoreTable;
use survey_sentiment_core::scoring::income::{ThresholdVector, MIN_GAP, POVERTY_FLOOR};
use survey_sentiment_core::scoring::traits::TraitWeightTable;
use survey_sentiment_core::storage::{load_snapshot, save_snapshot, LoadSource};
use survey_sentiment_core::{
    BackgroundScorer, IncomeBand, IncomeThresholdClassifier, MemoryStore, TraitWeighter,
};

const LABELS: &[&str] = &["Tailor", "Actor", "Beggar", "Blogger", "Software Engineer", "Cook"];

fn band() -> impl Strategy<Value = IncomeBand> {
    (0usize..5).prop_map(|i| IncomeBand::ALL[i])
}

fn background_feedback() -> impl Strategy<Value = (usize, f64, f64)> {
    (0..LABELS.len(), -10.0f64..10.0, -10.0f64..10.0)
}

fn income_feedback() -> impl Strategy<Value = (f64, IncomeBand, IncomeBand)> {
    (-1000.0f64..200_000.0, band(), band())
}

fn background_scorer(learning_rate: f64) -> BackgroundScorer {
    let config = BackgroundConfig {
        learning_rate,
        exploration_rate: 0.5,
    };
    BackgroundScorer::load(Arc::new(MemoryStore::new()), &config, Some(3))
}

proptest! {
    #[test]
    fn prop_background_scores_stay_in_range(
        batches in prop::collection::vec(prop::collection::vec(background_feedback(), 0..10), 1..10),
        learning_rate in 0.01f64..2.0,
    ) {
        let scorer = background_scorer(learning_rate);
        for batch in batches {
            for (label, predicted, observed) in batch {
                scorer.record_feedback(LABELS[label], predicted, observed).unwrap();
            }
            scorer.update();

            for (_, score) in scorer.snapshot().iter() {
                prop_assert!((1.0..=5.0).contains(&score));
            }
            for label in LABELS {
                let result = scorer.score(label).unwrap();
                prop_assert!((1.0..=5.0).contains(&result.score));
            }
        }
    }

    #[test]
    fn prop_thresholds_stay_ordered(
        batches in prop::collection::vec(prop::collection::vec(income_feedback(), 0..8), 1..12),
    ) {
        let classifier = IncomeThresholdClassifier::load(
            Arc::new(MemoryStore::new()),
            ThresholdAuditLog::disabled(),
        );
        for batch in batches {
            for (income, predicted, observed) in batch {
                classifier.record_feedback(income, predicted, observed).unwrap();
            }
            classifier.update();

            let t = classifier.thresholds();
            prop_assert!(t.check().is_ok(), "invalid thresholds {:?}", t);
            prop_assert!(t.poverty_line >= POVERTY_FLOOR);
            let values = t.as_array();
            for pair in values.windows(2) {
                prop_assert!(pair[1] - pair[0] >= MIN_GAP);
            }
        }
    }

    #[test]
    fn prop_classification_is_monotonic(
        a in 0.0f64..100_000.0,
        b in 0.0f64..100_000.0,
    ) {
        let t = ThresholdVector::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(t.classify(lo) <= t.classify(hi));
    }

    #[test]
    fn prop_score_table_round_trip(
        entries in prop::collection::btree_map("[a-z]{1,12}( [a-z]{1,12})?", 1.0f64..=5.0, 0..40),
    ) {
        let mut table = ScoreTable::default();
        for (label, score) in &entries {
            table.insert(label, *score);
        }

        let store = MemoryStore::new();
        prop_assert!(save_snapshot(&store, &table));
        let loaded = load_snapshot(&store, ScoreTable::defaults);
        prop_assert_eq!(loaded.source, LoadSource::Snapshot);
        prop_assert_eq!(loaded.state, table);
    }

    #[test]
    fn prop_threshold_round_trip(
        feedback in prop::collection::vec(income_feedback(), 0..20),
    ) {
        let store = Arc::new(MemoryStore::new());
        let classifier = IncomeThresholdClassifier::load(store.clone(), ThresholdAuditLog::disabled());
        for (income, predicted, observed) in feedback {
            classifier.record_feedback(income, predicted, observed).unwrap();
        }
        classifier.update();

        let thresholds = classifier.thresholds();
        prop_assert!(save_snapshot(store.as_ref(), &thresholds));
        let loaded = load_snapshot(store.as_ref(), ThresholdVector::default);
        prop_assert_eq!(loaded.source, LoadSource::Snapshot);
        prop_assert_eq!(loaded.state, thresholds);
    }

    #[test]
    fn prop_trait_weight_round_trip(
        rewards in prop::collection::vec(("[A-Z][a-z]{2,10}", -5.0f64..5.0), 0..30),
    ) {
        let store = Arc::new(MemoryStore::new());
        let weighter = TraitWeighter::load(store.clone(), &TraitConfig::default(), Some(1));
        for (name, reward) in &rewards {
            weighter.reinforce(name, *reward).unwrap();
        }

        let loaded = load_snapshot(store.as_ref(), TraitWeightTable::default);
        prop_assert_eq!(&loaded.state, &*weighter.weights());
    }

    #[test]
    fn prop_positive_reward_strictly_increases(
        rewards in prop::collection::vec(0.001f64..10.0, 1..20),
    ) {
        let weighter = TraitWeighter::load(Arc::new(MemoryStore::new()), &TraitConfig::default(), Some(1));
        let mut previous = weighter.weight("Empathy");
        for reward in rewards {
            let (weight, _) = weighter.reinforce("Empathy", reward).unwrap();
            prop_assert!(weight > previous);
            previous = weight;
        }
    }
}
