//! Arena-plus-offsets storage for variable-length per-event collections.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{per_event, Mask};
use crate::{ZhaaError, ZhaaResult};

/// A sequence of per-event collections stored as one flat arena plus per-event offsets.
///
/// Event `i` owns `values[offsets[i]..offsets[i + 1]]`. All transformations produce a new
/// [`Jagged`]; the source is never modified, and the outer (event) index is always preserved unless
/// events are explicitly selected with [`Jagged::select_events`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jagged<T> {
    values: Vec<T>,
    offsets: Vec<usize>,
}

impl<T> Default for Jagged<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            offsets: vec![0],
        }
    }
}

impl<T> Jagged<T> {
    /// Build a [`Jagged`] from its raw parts, checking that the offsets describe the arena.
    pub fn new(values: Vec<T>, offsets: Vec<usize>) -> ZhaaResult<Self> {
        if offsets.first() != Some(&0) {
            return Err(ZhaaError::Custom(
                "jagged offsets must start at zero".to_string(),
            ));
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(ZhaaError::Custom(
                "jagged offsets must be non-decreasing".to_string(),
            ));
        }
        let last = offsets.last().copied().unwrap_or_default();
        if last != values.len() {
            return Err(ZhaaError::LengthMismatch {
                context: "jagged arena".to_string(),
                expected: last,
                actual: values.len(),
            });
        }
        Ok(Self { values, offsets })
    }

    /// Build a [`Jagged`] from one collection per event.
    pub fn from_nested<I, J>(events: I) -> Self
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = T>,
    {
        let mut values = Vec::new();
        let mut offsets = vec![0];
        for event in events {
            values.extend(event);
            offsets.push(values.len());
        }
        Self { values, offsets }
    }

    /// Number of events (outer length).
    pub fn n_events(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of objects across all events.
    pub fn n_objects(&self) -> usize {
        self.values.len()
    }

    /// The objects belonging to event `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn event(&self, index: usize) -> &[T] {
        &self.values[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Iterate over the per-event slices.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        (0..self.n_events()).map(move |i| self.event(i))
    }

    /// Number of objects in each event.
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The flat object arena.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Per-event offsets into [`Jagged::values`] (length is one greater than the event count).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

impl<T: Clone + Send + Sync> Jagged<T> {
    /// Apply `op` to every event's collection, producing a new collection per event.
    pub fn map_events<U, F>(&self, op: F) -> Jagged<U>
    where
        U: Send,
        F: Fn(usize, &[T]) -> Vec<U> + Send + Sync,
    {
        Jagged::from_nested(per_event(self.n_events(), |i| op(i, self.event(i))))
    }

    /// Keep only the objects for which `predicate` holds, preserving their order.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        self.map_events(|_, objects| objects.iter().filter(|o| predicate(o)).cloned().collect())
    }

    /// Split every event's collection into the objects passing `predicate` and the rest.
    pub fn partition<F>(&self, predicate: F) -> (Self, Self)
    where
        F: Fn(&T) -> bool + Send + Sync,
    {
        (self.filter(&predicate), self.filter(|o| !predicate(o)))
    }

    /// Stable-sort each event's collection with the given comparator.
    pub fn sorted_by<F>(&self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync,
    {
        self.map_events(|_, objects| {
            let mut sorted = objects.to_vec();
            sorted.sort_by(&compare);
            sorted
        })
    }

    /// Concatenate two jagged collections event by event.
    pub fn concat(&self, other: &Self) -> Self {
        debug_assert_eq!(self.n_events(), other.n_events());
        self.map_events(|i, objects| objects.iter().chain(other.event(i)).cloned().collect())
    }

    /// The first object of each event, if there is one.
    pub fn firsts(&self) -> Vec<Option<T>> {
        per_event(self.n_events(), |i| self.event(i).first().cloned())
    }

    /// Keep only the events selected by `mask`.
    pub fn select_events(&self, mask: &Mask) -> Self {
        debug_assert_eq!(self.n_events(), mask.len());
        Jagged::from_nested(
            mask.indices()
                .into_iter()
                .map(|i| self.event(i).to_vec())
                .collect::<Vec<_>>(),
        )
    }
}
