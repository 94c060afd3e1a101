//! Role-model trait extraction and weighting
//!
//! A role-model answer is matched against a catalog of categories by keyword.
//! Every matched category contributes its whole trait list and its base
//! impact score. Trait weights start at 1.0 and are reinforced on every
//! observation:
//!
//! 1. For each extracted trait occurrence, the exploration policy selects one
//!    trait from the extracted set and reinforces it with the selection reward.
//! 2. If the averaged impact is positive, every extracted trait is reinforced
//!    with the impact reward; if negative, with its negation.
//!
//! Reinforcement persists the whole weight table immediately.

use super::{current, publish};
use crate::config::TraitConfig;
use crate::error::{EngineError, Result};
use crate::exploration::ExplorationPolicy;
use crate::storage::{load_snapshot, save_snapshot, LoadSource, ScoreStore, Snapshot};
use crate::types::{ensure_finite, ImpactCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Weight of a trait that has never been reinforced
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// One kind of role model and what it is taken to teach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModelCategory {
    pub name: String,
    /// Lower-case keywords, matched as substrings
    pub keywords: Vec<String>,
    pub traits: Vec<String>,
    /// Base impact score on the 1–5 scale
    pub score: f64,
}

impl RoleModelCategory {
    fn new(name: &str, keywords: &[&str], traits: &[&str], score: f64) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            traits: traits.iter().map(|t| t.to_string()).collect(),
            score,
        }
    }

    /// Number of this category's keywords present in lower-cased `text`
    pub fn keyword_hits(&self, text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count()
    }
}

/// Ordered set of role-model categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModelCatalog {
    pub categories: Vec<RoleModelCategory>,
}

impl Default for RoleModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RoleModelCatalog {
    pub fn builtin() -> Self {
        Self {
            categories: vec![
                RoleModelCategory::new(
                    "acting",
                    &["acting", "actor", "actress", "film", "movie", "cinema", "drama", "theatre"],
                    &[
                        "Creativity",
                        "Expression",
                        "Confidence",
                        "Public Speaking",
                        "Emotional Intelligence",
                        "Adaptability",
                        "Performance Skills",
                    ],
                    4.0,
                ),
                RoleModelCategory::new(
                    "advocate",
                    &["advocate", "lawyer", "legal", "court", "justice"],
                    &[
                        "Analytical Thinking",
                        "Public Speaking",
                        "Persuasion",
                        "Ethics",
                        "Research Skills",
                        "Problem Solving",
                        "Communication",
                    ],
                    5.0,
                ),
                RoleModelCategory::new(
                    "doctor",
                    &["doctor", "medical", "physician", "healthcare", "medicine"],
                    &[
                        "Analytical Thinking",
                        "Empathy",
                        "Problem Solving",
                        "Communication",
                        "Ethics",
                        "Decision Making",
                        "Continuous Learning",
                    ],
                    5.0,
                ),
                RoleModelCategory::new(
                    "engineer",
                    &["engineer", "engineering", "technical", "innovation"],
                    &[
                        "Analytical Thinking",
                        "Problem Solving",
                        "Technical Skills",
                        "Innovation",
                        "Attention to Detail",
                        "Logical Thinking",
                        "Creativity",
                    ],
                    5.0,
                ),
                RoleModelCategory::new(
                    "teacher",
                    &["teacher", "education", "teaching", "instructor", "professor"],
                    &[
                        "Communication",
                        "Patience",
                        "Leadership",
                        "Knowledge Sharing",
                        "Empathy",
                        "Organization",
                        "Mentoring",
                    ],
                    5.0,
                ),
            ],
        }
    }

    /// Match `text` against every category
    pub fn extract(&self, text: &str) -> TraitExtraction {
        let text = text.to_lowercase();
        let mut extraction = TraitExtraction::default();
        for category in &self.categories {
            if category.keyword_hits(&text) > 0 {
                extraction.traits.extend(category.traits.iter().cloned());
                extraction.matched_scores.push(category.score);
                extraction.matched_categories.push(category.name.clone());
            }
        }
        extraction
    }
}

/// Traits found in one answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitExtraction {
    /// Trait occurrences in category order; a trait shared by two matched
    /// categories appears twice
    pub traits: Vec<String>,
    /// Base score of each matched category
    pub matched_scores: Vec<f64>,
    pub matched_categories: Vec<String>,
}

impl TraitExtraction {
    pub fn is_empty(&self) -> bool {
        self.matched_categories.is_empty()
    }

    pub fn impact(&self) -> Option<ImpactCategory> {
        classify_impact(&self.matched_scores)
    }

    /// Distinct traits, first occurrence order
    pub fn distinct_traits(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for t in &self.traits {
            if !seen.contains(t) {
                seen.push(t.clone());
            }
        }
        seen
    }
}

/// Aggregate impact of the matched categories; `None` when nothing matched
pub fn classify_impact(scores: &[f64]) -> Option<ImpactCategory> {
    if scores.is_empty() {
        return None;
    }
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    Some(ImpactCategory::from_average(avg))
}

/// Trait → weight; unbounded
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitWeightTable(BTreeMap<String, f64>);

impl TraitWeightTable {
    /// Stored weight, [`DEFAULT_WEIGHT`] for unseen traits
    pub fn weight(&self, trait_name: &str) -> f64 {
        self.0.get(trait_name).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn get(&self, trait_name: &str) -> Option<f64> {
        self.0.get(trait_name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    fn set(&mut self, trait_name: &str, weight: f64) {
        self.0.insert(trait_name.to_string(), weight);
    }
}

impl Snapshot for TraitWeightTable {
    const KEY: &'static str = "trait_weights";

    fn sanitize(self) -> std::result::Result<Self, String> {
        match self.0.iter().find(|(_, w)| !w.is_finite()) {
            Some((name, _)) => Err(format!("weight for {:?} is not finite", name)),
            None => Ok(self),
        }
    }
}

/// Occurrence counts that remember first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitFrequency {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl TraitFrequency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trait_name: &str) {
        match self.index.get(trait_name) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(trait_name.to_string(), self.counts.len());
                self.counts.push((trait_name.to_string(), 1));
            }
        }
    }

    pub fn extend<'a>(&mut self, traits: impl IntoIterator<Item = &'a String>) {
        for t in traits {
            self.add(t);
        }
    }

    pub fn get(&self, trait_name: &str) -> u64 {
        self.index
            .get(trait_name)
            .map(|&i| self.counts[i].1)
            .unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Traits with counts in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

/// One row of [`TraitWeighter::ranked_traits`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedTrait {
    #[serde(rename = "trait")]
    pub trait_name: String,
    pub weighted_count: i64,
}

/// Outcome of running one answer through the trait pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitObservation {
    pub extraction: TraitExtraction,
    pub impact: Option<ImpactCategory>,
    /// Trait picked by the policy for each occurrence, in order
    pub selected: Vec<String>,
    /// Whether every reinforcement was persisted
    pub persisted: bool,
}

/// Role-model trait weighter
pub struct TraitWeighter {
    catalog: RoleModelCatalog,
    weights: RwLock<Arc<TraitWeightTable>>,
    write_lock: Mutex<()>,
    store: Arc<dyn ScoreStore>,
    policy: ExplorationPolicy,
    learning_rate: f64,
    selection_reward: f64,
    impact_reward: f64,
    load_source: LoadSource,
}

impl TraitWeighter {
    pub fn load(store: Arc<dyn ScoreStore>, config: &TraitConfig, seed: Option<u64>) -> Self {
        let policy = ExplorationPolicy::from_seed(config.exploration_rate, seed);
        Self::with_policy(store, RoleModelCatalog::builtin(), config, policy)
    }

    pub fn with_policy(
        store: Arc<dyn ScoreStore>,
        catalog: RoleModelCatalog,
        config: &TraitConfig,
        policy: ExplorationPolicy,
    ) -> Self {
        let loaded = load_snapshot(store.as_ref(), TraitWeightTable::default);
        info!(
            source = ?loaded.source,
            traits = loaded.state.len(),
            categories = catalog.categories.len(),
            "Trait weights ready"
        );

        Self {
            catalog,
            weights: RwLock::new(Arc::new(loaded.state)),
            write_lock: Mutex::new(()),
            store,
            policy,
            learning_rate: config.learning_rate,
            selection_reward: config.selection_reward,
            impact_reward: config.impact_reward,
            load_source: loaded.source,
        }
    }

    pub fn load_source(&self) -> LoadSource {
        self.load_source
    }

    pub fn catalog(&self) -> &RoleModelCatalog {
        &self.catalog
    }

    pub fn weights(&self) -> Arc<TraitWeightTable> {
        current(&self.weights)
    }

    pub fn weight(&self, trait_name: &str) -> f64 {
        self.weights().weight(trait_name)
    }

    pub fn extract_traits(&self, text: &str) -> TraitExtraction {
        self.catalog.extract(text)
    }

    /// `weight += learning_rate * reward`, persisted immediately
    ///
    /// Returns the new weight and whether the snapshot write succeeded. A
    /// reinforcement that would overflow the weight is rejected and leaves the
    /// table unchanged.
    pub fn reinforce(&self, trait_name: &str, reward: f64) -> Result<(f64, bool)> {
        if trait_name.trim().is_empty() {
            return Err(EngineError::InvalidLabel("trait name is blank".to_string()));
        }
        ensure_finite("reward", reward)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.weights();
        let weight = current.weight(trait_name) + self.learning_rate * reward;
        if !weight.is_finite() {
            return Err(EngineError::InvalidFeedback(format!(
                "reinforcing {:?} by {} overflows its weight",
                trait_name, reward
            )));
        }

        let mut next = (*current).clone();
        next.set(trait_name, weight);
        publish(&self.weights, next.clone());
        let persisted = save_snapshot(self.store.as_ref(), &next);

        debug!(trait_name, reward, weight, persisted, "Trait reinforced");
        Ok((weight, persisted))
    }

    /// Epsilon-greedy pick among `candidates` by current weight
    pub fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String> {
        let weights = self.weights();
        self.policy.select(candidates, |t| weights.weight(t))
    }

    /// Run one answer through extraction, selection, and impact reinforcement
    pub fn observe(&self, text: &str) -> TraitObservation {
        let extraction = self.extract_traits(text);
        let impact = extraction.impact();
        let candidates = extraction.distinct_traits();

        let mut selected = Vec::with_capacity(extraction.traits.len());
        let mut persisted = true;
        for _ in &extraction.traits {
            let Some(pick) = self.select(&candidates).cloned() else {
                break;
            };
            persisted &= self.apply(&pick, self.selection_reward);
            selected.push(pick);
        }

        let impact_reward = match impact {
            Some(ImpactCategory::Positive) => Some(self.impact_reward),
            Some(ImpactCategory::Negative) => Some(-self.impact_reward),
            _ => None,
        };
        if let Some(reward) = impact_reward {
            for t in &extraction.traits {
                persisted &= self.apply(t, reward);
            }
        }

        debug!(
            categories = ?extraction.matched_categories,
            traits = extraction.traits.len(),
            ?impact,
            "Role-model answer observed"
        );

        TraitObservation {
            extraction,
            impact,
            selected,
            persisted,
        }
    }

    // Trait names here come from the catalog and rewards from config, both validated
    fn apply(&self, trait_name: &str, reward: f64) -> bool {
        self.reinforce(trait_name, reward)
            .map(|(_, persisted)| persisted)
            .unwrap_or(false)
    }

    /// Traits by `round(frequency * weight)`, highest first, ties in first-seen order
    pub fn ranked_traits(&self, frequency: &TraitFrequency) -> Vec<RankedTrait> {
        rank(&self.weights(), frequency)
    }
}

fn rank(weights: &TraitWeightTable, frequency: &TraitFrequency) -> Vec<RankedTrait> {
    let mut ranked: Vec<RankedTrait> = frequency
        .iter()
        .map(|(name, count)| RankedTrait {
            trait_name: name.to_string(),
            weighted_count: (count as f64 * weights.weight(name)).round_ties_even() as i64,
        })
        .collect();
    ranked.sort_by(|a, b| b.weighted_count.cmp(&a.weighted_count));
    ranked
}

impl std::fmt::Debug for TraitWeighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraitWeighter")
            .field("traits", &self.weights().len())
            .field("learning_rate", &self.learning_rate)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::FlakyStore;
    use crate::storage::MemoryStore;

    fn weighter_with(store: Arc<dyn ScoreStore>, rate: f64) -> TraitWeighter {
        TraitWeighter::with_policy(
            store,
            RoleModelCatalog::builtin(),
            &TraitConfig::default(),
            ExplorationPolicy::seeded(rate, 5),
        )
    }

    fn weighter() -> TraitWeighter {
        weighter_with(Arc::new(MemoryStore::new()), 0.0)
    }

    #[test]
    fn test_extract_multiple_categories() {
        let w = weighter();
        let extraction = w.extract_traits("My mother is a Doctor and my uncle an engineer");
        assert_eq!(extraction.matched_categories, vec!["doctor", "engineer"]);
        assert_eq!(extraction.matched_scores, vec![5.0, 5.0]);
        assert_eq!(extraction.traits.len(), 14);
        assert_eq!(extraction.traits[0], "Analytical Thinking");
        // Shared traits collapse in the candidate set
        assert_eq!(extraction.distinct_traits().len(), 12);
    }

    #[test]
    fn test_extract_nothing() {
        let w = weighter();
        let extraction = w.extract_traits("my grandmother");
        assert!(extraction.is_empty());
        assert!(extraction.traits.is_empty());
        assert_eq!(extraction.impact(), None);
    }

    #[test]
    fn test_classify_impact() {
        assert_eq!(classify_impact(&[]), None);
        assert_eq!(classify_impact(&[4.0]), Some(ImpactCategory::Positive));
        assert_eq!(classify_impact(&[4.0, 2.0]), Some(ImpactCategory::Neutral));
        assert_eq!(classify_impact(&[2.0, 2.5]), Some(ImpactCategory::Negative));
    }

    #[test]
    fn test_reinforce_from_default_weight() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let w = weighter_with(store.clone(), 0.0);

        let (weight, persisted) = w.reinforce("Empathy", 0.5).unwrap();
        assert!((weight - 1.05).abs() < 1e-12);
        assert!(persisted);
        assert_eq!(store.write_count(), 1);

        let (weight, _) = w.reinforce("Empathy", -1.0).unwrap();
        assert!((weight - 0.95).abs() < 1e-12);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_reinforce_rejects_bad_input() {
        let w = weighter();
        assert!(w.reinforce(" ", 0.1).is_err());
        assert!(w.reinforce("Empathy", f64::INFINITY).is_err());
        assert!(w.weights().is_empty());
    }

    #[test]
    fn test_overflowing_reinforcement_rejected() {
        let store = Arc::new(MemoryStore::new());
        let w = weighter_with(store.clone(), 0.0);

        let mut rejected = 0;
        for _ in 0..20 {
            match w.reinforce("Empathy", f64::MAX) {
                Ok((weight, _)) => assert!(weight.is_finite()),
                Err(e) => {
                    assert!(matches!(e, EngineError::InvalidFeedback(_)));
                    rejected += 1;
                }
            }
        }
        assert!(rejected > 0);
        assert!(w.weight("Empathy").is_finite());

        // The stored table still loads, so no learned weight is lost
        let loaded = load_snapshot(store.as_ref(), TraitWeightTable::default);
        assert_eq!(loaded.source, LoadSource::Snapshot);
        assert_eq!(loaded.state, *w.weights());
    }

    #[test]
    fn test_observe_positive_impact() {
        let w = weighter();
        let observation = w.observe("She is an actress");
        assert_eq!(observation.impact, Some(ImpactCategory::Positive));
        assert_eq!(observation.selected.len(), 7);
        assert!(observation.persisted);

        // Exploit always picks the first max; ties start at "Creativity"
        assert!(observation.selected.iter().all(|t| t == "Creativity"));
        let creativity = w.weight("Creativity");
        assert!((creativity - (1.0 + 7.0 * 0.01 + 0.005)).abs() < 1e-9);
        let expression = w.weight("Expression");
        assert!((expression - 1.005).abs() < 1e-12);
    }

    #[test]
    fn test_observe_without_match_changes_nothing() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let w = weighter_with(store.clone(), 0.0);
        let observation = w.observe("nobody in particular");
        assert!(observation.selected.is_empty());
        assert_eq!(observation.impact, None);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_observe_reports_failed_persist() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let w = weighter_with(store.clone(), 0.0);
        store.fail_writes(true);

        let observation = w.observe("a famous lawyer");
        assert!(!observation.persisted);
        assert!(w.weight("Persuasion") > DEFAULT_WEIGHT);
    }

    #[test]
    fn test_frequency_keeps_first_seen_order() {
        let mut freq = TraitFrequency::new();
        for t in ["b", "a", "b", "c"] {
            freq.add(t);
        }
        let order: Vec<_> = freq.iter().collect();
        assert_eq!(order, vec![("b", 2), ("a", 1), ("c", 1)]);
        assert_eq!(freq.total(), 4);
        assert_eq!(freq.get("z"), 0);
    }

    #[test]
    fn test_ranked_traits_ties_and_rounding() {
        let w = weighter();
        w.reinforce("Patience", 15.0).unwrap(); // 2.5

        let mut freq = TraitFrequency::new();
        freq.add("Empathy");
        freq.add("Empathy");
        freq.add("Leadership");
        freq.add("Leadership");
        freq.add("Patience");

        let ranked = w.ranked_traits(&freq);
        let names: Vec<_> = ranked.iter().map(|r| r.trait_name.as_str()).collect();
        assert_eq!(names, vec!["Empathy", "Leadership", "Patience"]);
        // 2.5 rounds to even
        assert_eq!(ranked[2].weighted_count, 2);
        assert_eq!(ranked[0].weighted_count, 2);
    }

    #[test]
    fn test_select_prefers_heavier_trait() {
        let w = weighter();
        w.reinforce("Ethics", 1.0).unwrap();
        let candidates = vec!["Persuasion".to_string(), "Ethics".to_string()];
        assert_eq!(w.select(&candidates).map(String::as_str), Some("Ethics"));
    }
}
