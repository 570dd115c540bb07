use std::sync::Arc;

use indexmap::IndexMap;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use zhaa_core::{
    Accumulator, Axis, Cutflow, EventBatch, FeatureTable, Mask, ProcessorConfig, Regime,
    TtbarFlavor, ZhaaError, ZhaaResult,
};
use zhaa_regimes::{
    assemble, reconstruct_boosted, reconstruct_resolved, recorded_features, scorer_features,
    Candidate, Classification, ObjectSelection, WEIGHT_COLUMN,
};

use crate::scorer::{Scorer, ScorerAdapter};

/// Name of the cutflow ledger.
pub const CUTFLOW_NAME: &str = "cutflow_0l";

/// Cutflow checkpoints, in the order they are recorded.
pub const CUTFLOW_LABELS: [&str; 7] = [
    "raw",
    "0lep",
    "met",
    "bef_boosted",
    "boosted",
    "bef_resolved",
    "resolved",
];

/// Histograms filled from candidate features: `(histogram name, feature name)`. Each is declared
/// once per regime with the regime suffix.
const CANDIDATE_HISTOGRAMS: [(&str, &str); 13] = [
    ("mass_H", "H_mass"),
    ("pt_H", "H_pt"),
    ("dr_bb_ave", "dr_bb_ave"),
    ("pt_b_max", "pt_tag_max"),
    ("pt_untag_max", "pt_untag_max"),
    ("n_untag", "n_untag"),
    ("HT", "HT"),
    ("btag_min", "btag_min"),
    ("btag_max", "btag_max"),
    ("btag_prod", "btag_prod"),
    ("dphi_H_MET", "dphi_H_MET"),
    ("dphi_untag_MET", "dphi_untag_MET"),
    ("dm_bb_bb_min", "dm_bb_bb_min"),
];

/// The histogram catalogue of the analysis, without regime suffixes.
fn regime_axes() -> Vec<(&'static str, Axis)> {
    vec![
        ("bdt_score", Axis::regular(300, 0.0, 1.0)),
        ("mass_H", Axis::regular(80, 0.0, 400.0)),
        ("pt_H", Axis::regular(100, 0.0, 1000.0)),
        ("dr_bb_ave", Axis::regular(50, 0.0, 5.0)),
        ("pt_b_max", Axis::regular(100, 0.0, 1000.0)),
        ("pt_untag_max", Axis::regular(100, 0.0, 1000.0)),
        ("n_untag", Axis::integer(0, 6)),
        ("HT", Axis::regular(100, 0.0, 1000.0)),
        ("puppimet_pt", Axis::regular(100, 0.0, 1000.0)),
        ("btag_min", Axis::regular(50, 0.0, 1.0)),
        ("btag_max", Axis::regular(50, 0.0, 1.0)),
        ("btag_prod", Axis::regular(50, 0.0, 1.0)),
        ("dphi_H_MET", Axis::regular(50, 0.0, 5.0)),
        ("dphi_untag_MET", Axis::regular(50, 0.0, 5.0)),
        ("dphi_J_MET_bef", Axis::regular(50, 0.0, 5.0)),
        ("dphi_J_MET_after", Axis::regular(50, 0.0, 5.0)),
        ("dm_bb_bb_min", Axis::regular(100, 0.0, 200.0)),
    ]
}

/// An empty accumulator with every histogram of the analysis declared and the cutflow labels in
/// place.
pub fn declare_histograms() -> Accumulator {
    let mut accumulator = Accumulator::new(CUTFLOW_NAME, Cutflow::new(CUTFLOW_LABELS));
    for regime in Regime::ALL {
        for (name, axis) in regime_axes() {
            accumulator.declare(&format!("{name}{}", regime.suffix()), axis);
        }
    }
    // pair-of-pairs quantities only exist for resolved candidates
    accumulator.declare("dr_bb_bb_ave_resolved", Axis::regular(100, 0.0, 10.0));
    accumulator.declare("m_bbj", Axis::regular(100, 0.0, 600.0));
    accumulator.declare("dphi_J_MET_merged", Axis::regular(50, 0.0, 5.0));
    accumulator
}

/// Fill `values[i]` with `weights[i]` for every event `i` selected by `mask`.
fn fill_masked(
    accumulator: &mut Accumulator,
    name: &str,
    values: &[f64],
    mask: &Mask,
    weights: &[f64],
) -> ZhaaResult<()> {
    accumulator.fill_many(name, &mask.select(values), &mask.select(weights))
}

/// Everything one run (or one batch) produces: the histograms with their cutflow, and the
/// recorded feature tables of each regime when recording is enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorOutput {
    /// Histograms and the cutflow ledger.
    pub accumulator: Accumulator,
    /// Recorded feature tables (with a trailing weight column) by regime.
    pub recordings: IndexMap<Regime, FeatureTable>,
}

impl ProcessorOutput {
    /// The recorded table of a regime, if any.
    pub fn recording(&self, regime: Regime) -> Option<&FeatureTable> {
        self.recordings.get(&regime)
    }

    /// Add another output into this one: histograms and cutflow bin by bin, recordings by
    /// appending the rows of `other` after those of `self`.
    ///
    /// # Errors
    ///
    /// Fails without modifying `self` if histograms have incompatible axes or recordings have
    /// different columns.
    pub fn merge(&mut self, other: &ProcessorOutput) -> ZhaaResult<()> {
        for (regime, table) in &other.recordings {
            if let Some(mine) = self.recordings.get(regime) {
                let either_empty = mine.names().next().is_none() || table.names().next().is_none();
                if !either_empty && !mine.names().eq(table.names()) {
                    return Err(ZhaaError::Custom(format!(
                        "cannot merge {regime} recordings with different columns"
                    )));
                }
            }
        }
        self.accumulator.merge(&other.accumulator)?;
        for (regime, table) in &other.recordings {
            self.recordings.entry(*regime).or_default().append(table)?;
        }
        Ok(())
    }
}

/// Assembles a [`Processor`], validating its configuration and scorers.
pub struct ProcessorBuilder {
    config: ProcessorConfig,
    scorers: IndexMap<Regime, Arc<dyn Scorer>>,
}

impl ProcessorBuilder {
    /// Use `scorer` for the boosted regime.
    pub fn boosted_scorer(self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer(Regime::Boosted, scorer)
    }

    /// Use `scorer` for the resolved regime.
    pub fn resolved_scorer(self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer(Regime::Resolved, scorer)
    }

    /// Use `scorer` for `regime`.
    pub fn scorer(mut self, regime: Regime, scorer: Arc<dyn Scorer>) -> Self {
        self.scorers.insert(regime, scorer);
        self
    }

    /// Validate everything and build the processor.
    ///
    /// # Errors
    ///
    /// Fails with [`ZhaaError::InvalidNormalization`] or [`ZhaaError::ConflictingModes`] for an
    /// invalid [`ProcessorConfig`], [`ZhaaError::ScorerFeatureMismatch`] for any scorer whose
    /// features do not match its regime, and [`ZhaaError::MissingScorer`] if scoring is enabled
    /// and a regime has no scorer.
    pub fn build(self) -> ZhaaResult<Processor> {
        self.config.validate()?;
        let mut scorers = IndexMap::new();
        for (regime, scorer) in self.scorers {
            scorers.insert(regime, ScorerAdapter::new(regime, scorer)?);
        }
        if self.config.run_scoring {
            if let Some(regime) = Regime::ALL.iter().find(|r| !scorers.contains_key(*r)) {
                return Err(ZhaaError::MissingScorer {
                    regime: regime.to_string(),
                });
            }
        }
        if self.config.record_features {
            log::info!("recording features for dataset \"{}\"", self.config.dataset.name);
        }
        let weight = self.config.dataset.normalization_weight();
        let mut processor = Processor {
            weight,
            scorers,
            output: ProcessorOutput::default(),
            config: self.config,
        };
        processor.output = processor.empty_output();
        Ok(processor)
    }
}

/// The pipeline instance: selects, classifies and reconstructs the events of each batch and
/// accumulates the results.
///
/// [`Processor::process`] and [`Processor::process_batches`] take `&self` and return fresh
/// outputs, so batches can be processed independently and merged afterwards.
/// [`Processor::ingest`] merges into the totals owned by the instance.
#[derive(Debug)]
pub struct Processor {
    config: ProcessorConfig,
    weight: f64,
    scorers: IndexMap<Regime, ScorerAdapter>,
    output: ProcessorOutput,
}

impl Processor {
    /// Start building a processor for `config`.
    pub fn builder(config: ProcessorConfig) -> ProcessorBuilder {
        ProcessorBuilder {
            config,
            scorers: IndexMap::new(),
        }
    }

    /// The validated configuration.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The per-event weight given to every event of this dataset.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// A fresh output with every histogram declared (and, when recording, an empty table per
    /// regime).
    pub fn empty_output(&self) -> ProcessorOutput {
        let recordings = if self.config.record_features {
            Regime::ALL
                .iter()
                .map(|regime| (*regime, FeatureTable::default()))
                .collect()
        } else {
            IndexMap::new()
        };
        ProcessorOutput {
            accumulator: declare_histograms(),
            recordings,
        }
    }

    /// Process one batch into a new output.
    ///
    /// # Errors
    ///
    /// Fails if the scorer fails or returns the wrong number of scores. Nothing is accumulated by
    /// the instance either way.
    pub fn process(&self, batch: &EventBatch) -> ZhaaResult<ProcessorOutput> {
        let cuts = &self.config.cuts;
        let weights = vec![self.weight; batch.n_events()];
        let mut output = self.empty_output();
        let accumulator = &mut output.accumulator;

        accumulator.checkpoint("raw", Mask::all(batch.n_events()).weighted_sum(&weights));
        let selection = ObjectSelection::new(batch, cuts);
        let classification = Classification::new(batch, &selection, cuts);
        accumulator.checkpoint("0lep", classification.zero_lepton.weighted_sum(&weights));
        accumulator.checkpoint("met", classification.preselection.weighted_sum(&weights));
        fill_masked(
            accumulator,
            "dphi_J_MET_merged",
            &classification.min_delta_phi_merged,
            &classification.preselection,
            &weights,
        )?;

        for regime in Regime::ALL {
            let selected = classification.regime(regime);
            let suffix = regime.suffix();
            accumulator.checkpoint(&format!("bef{suffix}"), selected.before.weighted_sum(&weights));
            fill_masked(
                accumulator,
                &format!("dphi_J_MET_bef{suffix}"),
                &selected.min_delta_phi,
                &selected.before,
                &weights,
            )?;
            fill_masked(
                accumulator,
                &format!("dphi_J_MET_after{suffix}"),
                &selected.min_delta_phi,
                &selected.full,
                &weights,
            )?;
            accumulator.checkpoint(&regime.to_string(), selected.full.weighted_sum(&weights));
        }

        let boosted = reconstruct_boosted(batch, &selection, &classification.boosted);
        self.collect(&mut output, batch, &boosted, &weights)?;
        let resolved = reconstruct_resolved(batch, &selection, &classification.resolved);
        self.collect(&mut output, batch, &resolved, &weights)?;
        Ok(output)
    }

    /// Fill the candidate histograms of one regime, then either record its features or score
    /// them.
    fn collect<C: Candidate>(
        &self,
        output: &mut ProcessorOutput,
        batch: &EventBatch,
        candidates: &[C],
        weights: &[f64],
    ) -> ZhaaResult<()> {
        let regime = C::REGIME;
        let suffix = regime.suffix();
        let weights: Vec<f64> = candidates.iter().map(|c| weights[c.event()]).collect();
        let feature_column = |name: &str| -> Vec<f64> {
            candidates
                .iter()
                .map(|c| c.feature(name).unwrap_or(f64::NAN))
                .collect()
        };
        let accumulator = &mut output.accumulator;
        for (histogram, feature) in CANDIDATE_HISTOGRAMS {
            accumulator.fill_many(
                &format!("{histogram}{suffix}"),
                &feature_column(feature),
                &weights,
            )?;
        }
        let met: Vec<f64> = candidates.iter().map(|c| batch.met()[c.event()].pt).collect();
        accumulator.fill_many(&format!("puppimet_pt{suffix}"), &met, &weights)?;
        if regime == Regime::Resolved {
            accumulator.fill_many(
                "dr_bb_bb_ave_resolved",
                &feature_column("dr_bb_bb_ave"),
                &weights,
            )?;
            accumulator.fill_many("m_bbj", &feature_column("m_bbj"), &weights)?;
        }

        if self.config.record_features {
            let mut table = assemble(candidates, recorded_features(regime))?;
            table.push_column(WEIGHT_COLUMN, weights)?;
            output.recordings.entry(regime).or_default().append(&table)?;
        } else if self.config.run_scoring && !candidates.is_empty() {
            let adapter = self
                .scorers
                .get(&regime)
                .ok_or_else(|| ZhaaError::MissingScorer {
                    regime: regime.to_string(),
                })?;
            let table = assemble(candidates, scorer_features(regime))?;
            let scores = adapter.score(&table)?;
            output
                .accumulator
                .fill_many(&format!("bdt_score{suffix}"), &scores, &weights)?;
        }
        Ok(())
    }

    /// Process a batch and add its output to the totals held by this instance. On error nothing
    /// is added.
    pub fn ingest(&mut self, batch: &EventBatch) -> ZhaaResult<()> {
        let output = self.process(batch)?;
        self.output.merge(&output)
    }

    /// Process independent batches (in parallel with the `rayon` feature) and merge their
    /// outputs in batch order. Any failing batch fails the whole call.
    pub fn process_batches(&self, batches: &[EventBatch]) -> ZhaaResult<ProcessorOutput> {
        #[cfg(feature = "rayon")]
        return batches
            .par_iter()
            .map(|batch| self.process(batch))
            .try_reduce(
                || self.empty_output(),
                |mut a, b| {
                    a.merge(&b)?;
                    Ok(a)
                },
            );
        #[cfg(not(feature = "rayon"))]
        return batches
            .iter()
            .try_fold(self.empty_output(), |mut total, batch| {
                total.merge(&self.process(batch)?)?;
                Ok(total)
            });
    }

    /// Split a $`t\bar{t}`$ batch by generator-level heavy-flavour content and process each
    /// flavour on its own. Flavours without events are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the dataset is not a $`t\bar{t}`$ sample, if features are being recorded, or
    /// (with [`ZhaaError::MissingCollection`]) if the batch has no `genTtbarId` column.
    pub fn process_ttbar_split(
        &self,
        batch: &EventBatch,
    ) -> ZhaaResult<IndexMap<TtbarFlavor, ProcessorOutput>> {
        let dataset = &self.config.dataset;
        if !dataset.is_ttbar() || self.config.record_features {
            return Err(ZhaaError::Custom(format!(
                "dataset \"{}\" cannot be split by ttbar flavour (feature recording: {})",
                dataset.name, self.config.record_features
            )));
        }
        let ids = batch
            .gen_ttbar_id()
            .ok_or_else(|| ZhaaError::MissingCollection {
                collection: "genTtbarId".to_string(),
            })?;
        let mut outputs = IndexMap::new();
        for flavor in TtbarFlavor::ALL {
            let mask: Mask = ids
                .iter()
                .map(|&id| TtbarFlavor::from_gen_ttbar_id(id) == Some(flavor))
                .collect();
            if mask.count() == 0 {
                log::info!("no {flavor} events in batch of \"{}\", skipping", dataset.name);
                continue;
            }
            log::info!("processing {} {flavor} events", mask.count());
            outputs.insert(flavor, self.process(&batch.select_events(&mask)?)?);
        }
        Ok(outputs)
    }

    /// The totals accumulated by [`Processor::ingest`].
    pub fn output(&self) -> &ProcessorOutput {
        &self.output
    }

    /// Consume the processor, returning its accumulated totals.
    pub fn into_output(self) -> ProcessorOutput {
        self.output
    }
}
