use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    utils::{get_bin_edges, get_bin_index},
    ZhaaError, ZhaaResult,
};

/// The binning of a one-dimensional [`Histogram`].
///
/// Every kind shares the same fill contract: a coordinate maps to at most one bin, and coordinates
/// outside the axis (including NaN and unknown labels) map to none and are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Axis {
    /// `bins` evenly spaced bins over the half-open interval `[low, high)`.
    Regular { bins: usize, low: f64, high: f64 },
    /// One bin per integer in `low..high`. Values are truncated toward $`-\infty`$.
    Integer { low: i64, high: i64 },
    /// One bin per label, in declaration order.
    Category(Vec<String>),
}

impl Axis {
    /// Construct a [`Axis::Regular`] axis.
    pub fn regular(bins: usize, low: f64, high: f64) -> Self {
        Self::Regular { bins, low, high }
    }

    /// Construct an [`Axis::Integer`] axis.
    pub fn integer(low: i64, high: i64) -> Self {
        Self::Integer { low, high }
    }

    /// Construct an [`Axis::Category`] axis.
    pub fn category<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Category(labels.into_iter().map(Into::into).collect())
    }

    /// The number of bins on this axis.
    pub fn n_bins(&self) -> usize {
        match self {
            Self::Regular { bins, .. } => *bins,
            Self::Integer { low, high } => (high - low).max(0) as usize,
            Self::Category(labels) => labels.len(),
        }
    }

    /// The bin edges of this axis. Category bins are given unit-width edges starting at zero.
    pub fn edges(&self) -> Vec<f64> {
        match self {
            Self::Regular { bins, low, high } => get_bin_edges(*bins, (*low, *high)),
            Self::Integer { low, high } => (*low..=*high).map(|i| i as f64).collect(),
            Self::Category(labels) => (0..=labels.len()).map(|i| i as f64).collect(),
        }
    }

    /// The bin holding a numeric coordinate, if any. Category axes only accept labels.
    pub fn index(&self, value: f64) -> Option<usize> {
        match self {
            Self::Regular { bins, low, high } => {
                if *bins == 0 {
                    return None;
                }
                get_bin_index(value, *bins, (*low, *high))
            }
            Self::Integer { low, high } => {
                if !value.is_finite() {
                    return None;
                }
                let bin = value.floor();
                (bin >= *low as f64 && bin < *high as f64).then(|| (bin as i64 - low) as usize)
            }
            Self::Category(_) => None,
        }
    }

    /// The bin holding a label, if any. Numeric axes only accept values.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        match self {
            Self::Category(labels) => labels.iter().position(|l| l == label),
            _ => None,
        }
    }
}

/// A one-dimensional histogram with weighted storage (sum of weights and sum of squared weights per
/// bin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    axis: Axis,
    sumw: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl Histogram {
    /// Create an empty histogram over the given axis.
    pub fn new(axis: Axis) -> Self {
        let n_bins = axis.n_bins();
        Self {
            axis,
            sumw: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            entries: 0,
        }
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Sum of weights in each bin.
    pub fn sumw(&self) -> &[f64] {
        &self.sumw
    }

    /// Sum of squared weights in each bin.
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    /// Number of fills which landed in a bin.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of weights over all bins.
    pub fn total(&self) -> f64 {
        self.sumw.iter().sum()
    }

    /// Bin edges of the underlying axis.
    pub fn bin_edges(&self) -> Vec<f64> {
        self.axis.edges()
    }

    fn add_to_bin(&mut self, bin: Option<usize>, weight: f64) -> bool {
        let Some(bin) = bin else {
            return false;
        };
        self.sumw[bin] += weight;
        self.sumw2[bin] += weight * weight;
        self.entries += 1;
        true
    }

    /// Add `weight` to the bin holding `value`. Returns whether the value landed in a bin.
    pub fn fill(&mut self, value: f64, weight: f64) -> bool {
        let bin = self.axis.index(value);
        self.add_to_bin(bin, weight)
    }

    /// Add `weight` to the bin labelled `label`. Returns whether the label exists.
    pub fn fill_label(&mut self, label: &str, weight: f64) -> bool {
        let bin = self.axis.label_index(label);
        self.add_to_bin(bin, weight)
    }

    /// Fill one value per weight.
    ///
    /// # Errors
    ///
    /// Returns [`ZhaaError::LengthMismatch`] if the columns have different lengths; nothing is
    /// filled in that case.
    pub fn fill_many(&mut self, values: &[f64], weights: &[f64]) -> ZhaaResult<()> {
        if values.len() != weights.len() {
            return Err(ZhaaError::LengthMismatch {
                context: "histogram fill".to_string(),
                expected: values.len(),
                actual: weights.len(),
            });
        }
        for (value, weight) in values.iter().zip(weights) {
            self.fill(*value, *weight);
        }
        Ok(())
    }

    /// Whether `other` can be added to this histogram bin by bin.
    pub fn is_compatible(&self, other: &Histogram) -> bool {
        self.axis == other.axis
    }

    /// Bin-wise addition. Both histograms must share an axis (see [`Histogram::is_compatible`]).
    fn add_assign(&mut self, other: &Histogram) {
        debug_assert!(self.is_compatible(other));
        self.sumw
            .iter_mut()
            .zip(&other.sumw)
            .for_each(|(a, b)| *a += b);
        self.sumw2
            .iter_mut()
            .zip(&other.sumw2)
            .for_each(|(a, b)| *a += b);
        self.entries += other.entries;
    }
}

/// An ordered ledger of named selection checkpoints, each holding a cumulative weighted event
/// count.
///
/// Labels keep the order in which they were declared (or first used); repeated checkpoints with
/// the same label add to the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cutflow {
    entries: IndexMap<String, f64>,
}

impl Cutflow {
    /// Create a ledger with the given labels declared (in order) at zero.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: labels.into_iter().map(|l| (l.into(), 0.0)).collect(),
        }
    }

    /// Add `weight` to the checkpoint `label`, appending the label if it is new.
    pub fn checkpoint(&mut self, label: &str, weight: f64) {
        *self.entries.entry(label.to_string()).or_insert(0.0) += weight;
    }

    /// The cumulative weight recorded under `label`.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries.get(label).copied()
    }

    /// The labels, in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(label, weight)` pairs, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add another ledger label by label. Labels unknown to this ledger are appended in the
    /// other ledger's order.
    pub fn merge(&mut self, other: &Cutflow) {
        for (label, weight) in other.iter() {
            self.checkpoint(label, weight);
        }
    }

    /// Export the ledger as a histogram over a categorical axis.
    pub fn to_histogram(&self) -> Histogram {
        let mut histogram = Histogram::new(Axis::category(self.labels()));
        for (label, weight) in self.iter() {
            histogram.fill_label(label, weight);
        }
        histogram
    }
}

/// A collection of named histograms plus a named cutflow ledger.
///
/// All histograms are declared up front; filling an undeclared name is an error. Accumulators from
/// independent batches combine with [`Accumulator::merge`], which is associative and commutative
/// up to floating-point summation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accumulator {
    histograms: IndexMap<String, Histogram>,
    cutflow_name: String,
    cutflow: Cutflow,
}

impl Accumulator {
    /// Create an accumulator with an empty histogram set and the given cutflow ledger.
    pub fn new(cutflow_name: &str, cutflow: Cutflow) -> Self {
        Self {
            histograms: IndexMap::new(),
            cutflow_name: cutflow_name.to_string(),
            cutflow,
        }
    }

    /// Declare (or reset) a histogram.
    pub fn declare(&mut self, name: &str, axis: Axis) {
        self.histograms
            .insert(name.to_string(), Histogram::new(axis));
    }

    /// Builder-style [`Accumulator::declare`].
    pub fn with_histogram(mut self, name: &str, axis: Axis) -> Self {
        self.declare(name, axis);
        self
    }

    fn histogram_mut(&mut self, name: &str) -> ZhaaResult<&mut Histogram> {
        self.histograms
            .get_mut(name)
            .ok_or_else(|| ZhaaError::UnknownHistogram {
                name: name.to_string(),
            })
    }

    /// Fill a single value into the named histogram. Out-of-range values are silently dropped.
    pub fn fill(&mut self, name: &str, value: f64, weight: f64) -> ZhaaResult<()> {
        self.histogram_mut(name)?.fill(value, weight);
        Ok(())
    }

    /// Fill a column of values with per-value weights into the named histogram.
    pub fn fill_many(&mut self, name: &str, values: &[f64], weights: &[f64]) -> ZhaaResult<()> {
        self.histogram_mut(name)?.fill_many(values, weights)
    }

    /// Add `weight` to the cutflow checkpoint `label`.
    pub fn checkpoint(&mut self, label: &str, weight: f64) {
        log::debug!("{}[{label}] += {weight}", self.cutflow_name);
        self.cutflow.checkpoint(label, weight);
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    /// All histograms, in declaration order.
    pub fn histograms(&self) -> &IndexMap<String, Histogram> {
        &self.histograms
    }

    pub fn cutflow(&self) -> &Cutflow {
        &self.cutflow
    }

    pub fn cutflow_name(&self) -> &str {
        &self.cutflow_name
    }

    /// All histograms followed by the cutflow ledger exported as a categorical histogram.
    pub fn to_histograms(&self) -> IndexMap<String, Histogram> {
        let mut all = self.histograms.clone();
        all.insert(self.cutflow_name.clone(), self.cutflow.to_histogram());
        all
    }

    /// Serialize the accumulator (histograms and ledger) to JSON.
    pub fn to_json(&self) -> ZhaaResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Add another accumulator into this one, bin by bin and label by label. Histograms only
    /// present in `other` are copied.
    ///
    /// # Errors
    ///
    /// Returns [`ZhaaError::IncompatibleHistograms`] if a histogram exists in both with different
    /// axes. The check runs before anything is added, so `self` is unchanged on error.
    pub fn merge(&mut self, other: &Accumulator) -> ZhaaResult<()> {
        if let Some(name) = other.histograms.iter().find_map(|(name, histogram)| {
            self.histograms
                .get(name)
                .filter(|mine| !mine.is_compatible(histogram))
                .map(|_| name)
        }) {
            return Err(ZhaaError::IncompatibleHistograms { name: name.clone() });
        }
        for (name, histogram) in &other.histograms {
            match self.histograms.get_mut(name) {
                Some(mine) => mine.add_assign(histogram),
                None => {
                    self.histograms.insert(name.clone(), histogram.clone());
                }
            }
        }
        if self.cutflow_name.is_empty() {
            self.cutflow_name = other.cutflow_name.clone();
        }
        self.cutflow.merge(&other.cutflow);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_regular_axis() {
        let axis = Axis::regular(50, 0.0, 5.0);
        assert_eq!(axis.n_bins(), 50);
        assert_eq!(axis.index(0.0), Some(0));
        assert_eq!(axis.index(4.99), Some(49));
        assert_eq!(axis.index(5.0), None);
        assert_eq!(axis.index(999.0), None);
        assert_eq!(axis.index(f64::NAN), None);
        assert_eq!(axis.label_index("0"), None);
        assert_eq!(axis.edges().len(), 51);
    }

    #[test]
    fn test_integer_axis() {
        let axis = Axis::integer(0, 6);
        assert_eq!(axis.n_bins(), 6);
        assert_eq!(axis.index(0.0), Some(0));
        assert_eq!(axis.index(2.7), Some(2));
        assert_eq!(axis.index(5.0), Some(5));
        assert_eq!(axis.index(6.0), None);
        assert_eq!(axis.index(-0.5), None);
        assert_eq!(axis.index(f64::INFINITY), None);
        assert_eq!(axis.edges(), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_category_axis() {
        let axis = Axis::category(["raw", "met"]);
        assert_eq!(axis.n_bins(), 2);
        assert_eq!(axis.label_index("met"), Some(1));
        assert_eq!(axis.label_index("boosted"), None);
        assert_eq!(axis.index(0.0), None);
    }

    #[test]
    fn test_weighted_fill() {
        let mut h = Histogram::new(Axis::regular(4, 0.0, 4.0));
        assert!(h.fill(1.5, 0.5));
        assert!(h.fill(1.2, 2.0));
        assert!(!h.fill(10.0, 1.0));
        assert!(!h.fill(-1.0, 1.0));
        assert_relative_eq!(h.sumw()[1], 2.5);
        assert_relative_eq!(h.sumw2()[1], 4.25);
        assert_eq!(h.entries(), 2);
        assert_relative_eq!(h.total(), 2.5);
        assert!(h.fill_many(&[0.5, 3.5], &[1.0]).is_err());
        assert_eq!(h.entries(), 2);
        h.fill_many(&[0.5, 3.5], &[1.0, 1.0]).unwrap();
        assert_relative_eq!(h.total(), 4.5);
    }

    #[test]
    fn test_cutflow_order_and_accumulation() {
        let mut cutflow = Cutflow::new(["raw", "met"]);
        cutflow.checkpoint("met", 1.0);
        cutflow.checkpoint("raw", 3.0);
        cutflow.checkpoint("extra", 0.5);
        cutflow.checkpoint("met", 1.0);
        assert_eq!(cutflow.labels().collect::<Vec<_>>(), vec!["raw", "met", "extra"]);
        assert_relative_eq!(cutflow.get("met").unwrap(), 2.0);
        assert!(cutflow.get("boosted").is_none());
        let h = cutflow.to_histogram();
        assert_eq!(h.axis(), &Axis::category(["raw", "met", "extra"]));
        assert_eq!(h.sumw(), &[3.0, 2.0, 0.5]);
    }

    fn accumulator() -> Accumulator {
        Accumulator::new("cutflow", Cutflow::new(["raw", "sel"]))
            .with_histogram("x", Axis::regular(10, 0.0, 1.0))
            .with_histogram("n", Axis::integer(0, 3))
    }

    #[test]
    fn test_accumulator_fill() {
        let mut acc = accumulator();
        acc.fill("x", 0.35, 2.0).unwrap();
        acc.fill("x", 7.0, 2.0).unwrap();
        assert!(matches!(
            acc.fill("y", 0.35, 2.0),
            Err(ZhaaError::UnknownHistogram { .. })
        ));
        acc.checkpoint("raw", 4.0);
        assert_relative_eq!(acc.histogram("x").unwrap().sumw()[3], 2.0);
        assert_relative_eq!(acc.cutflow().get("raw").unwrap(), 4.0);
        let all = acc.to_histograms();
        assert_eq!(all.keys().last().map(String::as_str), Some("cutflow"));
        assert!(acc.to_json().unwrap().contains("cutflow"));
    }

    fn random_accumulator(rng: &mut fastrand::Rng) -> Accumulator {
        let mut acc = accumulator();
        for _ in 0..100 {
            let w = rng.f64();
            acc.fill("x", rng.f64() * 1.2, w).unwrap();
            acc.fill("n", rng.f64() * 4.0, w).unwrap();
        }
        acc.checkpoint("raw", rng.f64() * 10.0);
        acc.checkpoint("sel", rng.f64());
        acc
    }

    fn assert_accumulators_close(a: &Accumulator, b: &Accumulator) {
        assert_eq!(a.histograms().len(), b.histograms().len());
        for (name, ha) in a.histograms() {
            let hb = b.histogram(name).unwrap();
            assert_eq!(ha.entries(), hb.entries());
            for (x, y) in ha.sumw().iter().zip(hb.sumw()) {
                assert_relative_eq!(*x, *y, epsilon = 1e-9);
            }
            for (x, y) in ha.sumw2().iter().zip(hb.sumw2()) {
                assert_relative_eq!(*x, *y, epsilon = 1e-9);
            }
        }
        assert_eq!(
            a.cutflow().labels().collect::<Vec<_>>(),
            b.cutflow().labels().collect::<Vec<_>>()
        );
        for ((_, x), (_, y)) in a.cutflow().iter().zip(b.cutflow().iter()) {
            assert_relative_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_merge_associative_and_commutative() {
        let mut rng = fastrand::Rng::with_seed(17);
        for _ in 0..20 {
            let a = random_accumulator(&mut rng);
            let b = random_accumulator(&mut rng);
            let c = random_accumulator(&mut rng);

            let mut ab_c = a.clone();
            ab_c.merge(&b).unwrap();
            ab_c.merge(&c).unwrap();

            let mut bc = b.clone();
            bc.merge(&c).unwrap();
            let mut a_bc = a.clone();
            a_bc.merge(&bc).unwrap();
            assert_accumulators_close(&ab_c, &a_bc);

            let mut ba = b.clone();
            ba.merge(&a).unwrap();
            let mut ab = a.clone();
            ab.merge(&b).unwrap();
            assert_accumulators_close(&ab, &ba);
        }
    }

    #[test]
    fn test_merge_into_empty() {
        let mut rng = fastrand::Rng::with_seed(2);
        let a = random_accumulator(&mut rng);
        let mut empty = Accumulator::default();
        empty.merge(&a).unwrap();
        assert_eq!(empty, a);
    }

    #[test]
    fn test_merge_rejects_incompatible_axes() {
        let mut a = accumulator();
        a.fill("x", 0.5, 1.0).unwrap();
        let before = a.clone();
        let b = Accumulator::new("cutflow", Cutflow::default())
            .with_histogram("n", Axis::integer(0, 3))
            .with_histogram("x", Axis::regular(20, 0.0, 1.0));
        assert!(matches!(
            a.merge(&b),
            Err(ZhaaError::IncompatibleHistograms { ref name }) if name == "x"
        ));
        assert_eq!(a, before);
    }
}
