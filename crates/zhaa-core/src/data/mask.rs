//! Per-event boolean selections.

use std::ops::Index;

#[cfg(feature = "rayon")]
use accurate::{sum::Klein, traits::*};
use auto_ops::impl_op_ex;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::per_event;

/// A per-event boolean selection aligned with the events of one batch.
///
/// Masks only ever compose with other masks over the same events (via `&`); object-level
/// selections are expressed by filtering a [`Jagged`](super::Jagged) instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// Wrap a vector of per-event decisions.
    pub fn new(values: Vec<bool>) -> Self {
        Self(values)
    }

    /// A mask selecting all `n_events` events.
    pub fn all(n_events: usize) -> Self {
        Self(vec![true; n_events])
    }

    /// Evaluate `predicate` for every event index.
    pub fn from_fn<F>(n_events: usize, predicate: F) -> Self
    where
        F: Fn(usize) -> bool + Send + Sync,
    {
        Self(per_event(n_events, predicate))
    }

    /// Number of events covered by the mask.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mask covers no events.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The per-event decisions.
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Number of selected events.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&m| m).count()
    }

    /// Indices of the selected events, in increasing order.
    pub fn indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect()
    }

    /// Keep the entries of a per-event column that are selected by this mask.
    pub fn select<T: Clone>(&self, values: &[T]) -> Vec<T> {
        debug_assert_eq!(self.len(), values.len());
        values
            .iter()
            .zip(&self.0)
            .filter_map(|(v, &m)| m.then(|| v.clone()))
            .collect()
    }

    /// Sum of `weights` over the selected events.
    pub fn weighted_sum(&self, weights: &[f64]) -> f64 {
        debug_assert_eq!(self.len(), weights.len());
        #[cfg(feature = "rayon")]
        return self
            .0
            .par_iter()
            .zip(weights.par_iter())
            .filter_map(|(&m, &w)| m.then_some(w))
            .parallel_sum_with_accumulator::<Klein<f64>>();
        #[cfg(not(feature = "rayon"))]
        return self
            .0
            .iter()
            .zip(weights)
            .filter_map(|(&m, &w)| m.then_some(w))
            .sum();
    }

    fn and(&self, other: &Self) -> Self {
        debug_assert_eq!(self.len(), other.len());
        Self(self.0.iter().zip(&other.0).map(|(&a, &b)| a && b).collect())
    }
}

impl_op_ex!(&|a: &Mask, b: &Mask| -> Mask { a.and(b) });

impl Index<usize> for Mask {
    type Output = bool;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<bool>> for Mask {
    fn from(value: Vec<bool>) -> Self {
        Self(value)
    }
}

impl FromIterator<bool> for Mask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_mask_composition() {
        let a = Mask::new(vec![true, true, false, true]);
        let b = Mask::new(vec![true, false, false, true]);
        let c = &a & &b;
        assert_eq!(c.as_slice(), &[true, false, false, true]);
        assert_eq!(c.count(), 2);
        assert_eq!(c.indices(), vec![0, 3]);
        assert_eq!(a.clone() & Mask::all(4), a);
    }

    #[test]
    fn test_mask_select_and_sum() {
        let m: Mask = [false, true, true].into_iter().collect();
        assert_eq!(m.select(&[1.0, 2.0, 3.0]), vec![2.0, 3.0]);
        assert_relative_eq!(m.weighted_sum(&[0.5, 0.25, 0.125]), 0.375);
        assert_relative_eq!(Mask::new(vec![]).weighted_sum(&[]), 0.0);
        assert!(m[1] && !m[0]);
    }

    #[test]
    fn test_mask_from_fn() {
        let m = Mask::from_fn(5, |i| i % 2 == 0);
        assert_eq!(m.indices(), vec![0, 2, 4]);
    }
}
