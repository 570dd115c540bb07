use std::{fmt::Debug, sync::Arc};

use zhaa_core::{FeatureMatrix, FeatureTable, Regime, ZhaaError, ZhaaResult};
use zhaa_regimes::scorer_features;

/// An externally trained decision model.
///
/// Implementors report the ordered feature names they were trained on and turn a matrix of
/// events × features (columns in that same order) into one score per event.
pub trait Scorer: Send + Sync {
    /// The names of the input features, in the order the model expects them.
    fn feature_names(&self) -> Vec<String>;

    /// Score every row of `features`, returning one value per row in row order.
    ///
    /// # Errors
    ///
    /// Implementors should return [`ZhaaError::ScorerError`] if the model cannot be evaluated.
    fn score_batch(&self, features: &FeatureMatrix) -> ZhaaResult<Vec<f64>>;
}

/// A [`Scorer`] which gives every event the same score.
///
/// This is mostly useful for dry runs and tests of the surrounding pipeline.
#[derive(Debug, Clone)]
pub struct ConstantScorer {
    feature_names: Vec<String>,
    value: f64,
}

impl ConstantScorer {
    /// A constant scorer which accepts the standard features of `regime`.
    pub fn new(regime: Regime, value: f64) -> Self {
        Self {
            feature_names: scorer_features(regime)
                .iter()
                .map(|name| name.to_string())
                .collect(),
            value,
        }
    }
}

impl Scorer for ConstantScorer {
    fn feature_names(&self) -> Vec<String> {
        self.feature_names.clone()
    }

    fn score_batch(&self, features: &FeatureMatrix) -> ZhaaResult<Vec<f64>> {
        Ok(vec![self.value; features.n_rows()])
    }
}

/// Binds a [`Scorer`] to one regime after checking that it expects exactly the features assembled
/// for that regime.
#[derive(Clone)]
pub struct ScorerAdapter {
    regime: Regime,
    feature_names: Vec<String>,
    scorer: Arc<dyn Scorer>,
}

impl Debug for ScorerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScorerAdapter")
            .field("regime", &self.regime)
            .field("feature_names", &self.feature_names)
            .finish_non_exhaustive()
    }
}

impl ScorerAdapter {
    /// Validate `scorer` against the features of `regime`.
    ///
    /// The scorer may list the features in any order (the matrix it receives follows its own
    /// order), but it must name each assembled feature exactly once and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`ZhaaError::ScorerFeatureMismatch`] if the feature sets differ.
    pub fn new(regime: Regime, scorer: Arc<dyn Scorer>) -> ZhaaResult<Self> {
        let feature_names = scorer.feature_names();
        let expected = scorer_features(regime);
        let mut found_sorted: Vec<&str> = feature_names.iter().map(String::as_str).collect();
        found_sorted.sort_unstable();
        let mut expected_sorted = expected.to_vec();
        expected_sorted.sort_unstable();
        if found_sorted != expected_sorted {
            return Err(ZhaaError::ScorerFeatureMismatch {
                regime: regime.to_string(),
                expected: expected.iter().map(|name| name.to_string()).collect(),
                found: feature_names,
            });
        }
        Ok(Self {
            regime,
            feature_names,
            scorer,
        })
    }

    /// The regime this scorer is bound to.
    pub fn regime(&self) -> Regime {
        self.regime
    }

    /// The feature order handed to the scorer.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Score every row of `table`.
    ///
    /// # Errors
    ///
    /// Propagates scorer errors, and returns [`ZhaaError::ScorerError`] if the scorer returns a
    /// different number of scores than there are rows.
    pub fn score(&self, table: &FeatureTable) -> ZhaaResult<Vec<f64>> {
        let matrix = table.matrix(self.feature_names.as_slice())?;
        let scores = self.scorer.score_batch(&matrix)?;
        if scores.len() != matrix.n_rows() {
            return Err(ZhaaError::ScorerError(format!(
                "{} scorer returned {} scores for {} events",
                self.regime,
                scores.len(),
                matrix.n_rows()
            )));
        }
        let n_non_finite = scores.iter().filter(|score| !score.is_finite()).count();
        if n_non_finite > 0 {
            log::warn!(
                "{} scorer returned {n_non_finite} non-finite scores out of {}",
                self.regime,
                scores.len()
            );
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use indexmap::IndexMap;

    use super::*;

    struct ReversedSumScorer;

    impl Scorer for ReversedSumScorer {
        fn feature_names(&self) -> Vec<String> {
            scorer_features(Regime::Resolved)
                .iter()
                .rev()
                .map(|name| name.to_string())
                .collect()
        }

        fn score_batch(&self, features: &FeatureMatrix) -> ZhaaResult<Vec<f64>> {
            // weight each column by its position so that the column order is observable
            Ok(features
                .rows()
                .map(|row| row.iter().enumerate().map(|(i, v)| i as f64 * v).sum())
                .collect())
        }
    }

    struct ShortScorer;

    impl Scorer for ShortScorer {
        fn feature_names(&self) -> Vec<String> {
            ConstantScorer::new(Regime::Boosted, 0.0).feature_names()
        }

        fn score_batch(&self, _features: &FeatureMatrix) -> ZhaaResult<Vec<f64>> {
            Ok(vec![])
        }
    }

    fn resolved_table() -> FeatureTable {
        let columns: IndexMap<String, Vec<f64>> = scorer_features(Regime::Resolved)
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), vec![i as f64, 0.0]))
            .collect();
        FeatureTable::from_columns(columns).unwrap()
    }

    #[test]
    fn test_feature_sets_must_match() {
        let boosted = Arc::new(ConstantScorer::new(Regime::Boosted, 0.5));
        assert!(ScorerAdapter::new(Regime::Boosted, boosted.clone()).is_ok());
        assert!(matches!(
            ScorerAdapter::new(Regime::Resolved, boosted),
            Err(ZhaaError::ScorerFeatureMismatch { .. })
        ));
        assert!(ScorerAdapter::new(Regime::Resolved, Arc::new(ReversedSumScorer)).is_ok());
    }

    #[test]
    fn test_matrix_follows_scorer_order() {
        let adapter = ScorerAdapter::new(Regime::Resolved, Arc::new(ReversedSumScorer)).unwrap();
        let scores = adapter.score(&resolved_table()).unwrap();
        // column k of the table holds k and is handed over at position n - 1 - k
        let n = scorer_features(Regime::Resolved).len();
        let expected: f64 = (0..n).map(|k| ((n - 1 - k) * k) as f64).sum();
        assert_relative_eq!(scores[0], expected);
        assert_relative_eq!(scores[1], 0.0);
    }

    #[test]
    fn test_wrong_number_of_scores_is_an_error() {
        let adapter = ScorerAdapter::new(Regime::Boosted, Arc::new(ShortScorer)).unwrap();
        let columns: IndexMap<String, Vec<f64>> = scorer_features(Regime::Boosted)
            .iter()
            .map(|name| (name.to_string(), vec![1.0]))
            .collect();
        let table = FeatureTable::from_columns(columns).unwrap();
        assert!(matches!(adapter.score(&table), Err(ZhaaError::ScorerError(_))));
    }
}
