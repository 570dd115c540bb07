//! `zhaa` is a library for the zero-lepton selection of $`ZH \to Z(\nu\nu)\,a a \to 4b`$ events,
//! where two light pseudoscalars $`a`$ each decay to a $`b\bar{b}`$ pair. It turns columnar batches
//! of reconstructed collision events into a cutflow, a catalogue of weighted histograms and
//! (optionally) per-event feature tables for training a classifier.
//!
//! <div class="warning">
//!
//! This crate is still in an early development phase, and the API is not stable. It can (and likely will) be subject to breaking changes before the 1.0.0 version release.
//!
//! </div>
//!
//! # Table of Contents
//! - [Key Features](#key-features)
//! - [Installation](#installation)
//! - [Quick Start](#quick-start)
//!   - [Filling Histograms](#filling-histograms)
//!   - [Recording Training Data](#recording-training-data)
//!   - [Scoring Candidates](#scoring-candidates)
//! - [Selection](#selection)
//! - [Output Format](#output-format)
//!
//! # Key Features
//! * A single [`Processor`] which runs the whole selection over an [`EventBatch`] and returns a
//!   mergeable [`ProcessorOutput`].
//! * Two reconstruction regimes: a boosted one, where each $`a \to b\bar{b}`$ decay ends up inside
//!   a single jet with two secondary vertices, and a resolved one, built from individual
//!   $`b`$-tagged jets.
//! * A small [`Scorer`] trait for plugging in externally trained decision models, validated
//!   against the features each regime assembles.
//! * Efficient parallelism using [`rayon`](https://github.com/rayon-rs/rayon), both within a batch
//!   and across batches.
//!
//! # Installation
//! `zhaa` can be added to a Rust project with `cargo`:
//! ```shell
//! cargo add zhaa
//! ```
//! The `rayon` feature is enabled by default and can be turned off with
//! `default-features = false`, in which case everything runs on the calling thread and produces
//! identical results.
//!
//! # Quick Start
//! ## Filling Histograms
//! A [`Processor`] is built from a [`ProcessorConfig`], which carries the dataset normalization
//! and the selection thresholds:
//! ```rust
//! use zhaa::{data::test_batch, DatasetConfig, Processor, ProcessorConfig};
//!
//! let dataset = DatasetConfig::new("ZH_ZToAll_HToAATo4B_M-30", 0.05, 100_000, true);
//! let processor = Processor::builder(ProcessorConfig::new(dataset)).build().unwrap();
//! let output = processor.process(&test_batch()).unwrap();
//! let cutflow = output.accumulator.cutflow();
//! assert!(cutflow.get("boosted").unwrap() > 0.0);
//! assert_eq!(cutflow.get("resolved"), Some(0.0));
//! ```
//! Outputs of independent batches can be merged with [`ProcessorOutput::merge`], or the whole
//! loop can be left to [`Processor::process_batches`].
//!
//! ## Recording Training Data
//! With [`ProcessorConfig::with_recording`], every candidate's features are stored in a
//! [`FeatureTable`] per regime, followed by a `weight` column:
//! ```rust
//! use zhaa::{data::test_batch, DatasetConfig, Processor, ProcessorConfig, Regime};
//!
//! let dataset = DatasetConfig::new("ZH_ZToAll_HToAATo4B_M-30", 0.05, 100_000, true);
//! let config = ProcessorConfig::new(dataset).with_recording(true);
//! let processor = Processor::builder(config).build().unwrap();
//! let output = processor.process(&test_batch()).unwrap();
//! let table = output.recording(Regime::Boosted).unwrap();
//! assert_eq!(table.n_rows(), 1);
//! assert!(table.column("weight").is_some());
//! ```
//! Tables convert to Arrow with [`FeatureTable::to_record_batch`].
//!
//! ## Scoring Candidates
//! A decision model only needs to implement [`Scorer`]. It reports the features it was trained
//! on (in any order) and returns one score per row:
//! ```rust
//! use std::sync::Arc;
//! use zhaa::{
//!     data::test_batch, DatasetConfig, FeatureMatrix, Processor, ProcessorConfig, Regime,
//!     Scorer, ZhaaResult,
//! };
//!
//! struct MassWindow;
//!
//! impl Scorer for MassWindow {
//!     fn feature_names(&self) -> Vec<String> {
//!         zhaa::regimes::scorer_features(Regime::Boosted)
//!             .iter()
//!             .map(|name| name.to_string())
//!             .collect()
//!     }
//!
//!     fn score_batch(&self, features: &FeatureMatrix) -> ZhaaResult<Vec<f64>> {
//!         // H_mass is the first feature
//!         Ok(features
//!             .rows()
//!             .map(|row| if (20.0..80.0).contains(&row[0]) { 0.9 } else { 0.1 })
//!             .collect())
//!     }
//! }
//!
//! let dataset = DatasetConfig::new("ZH_ZToAll_HToAATo4B_M-30", 0.05, 100_000, true);
//! let processor = Processor::builder(ProcessorConfig::new(dataset).with_scoring(true))
//!     .boosted_scorer(Arc::new(MassWindow))
//!     .resolved_scorer(Arc::new(zhaa::ConstantScorer::new(Regime::Resolved, 0.5)))
//!     .build()
//!     .unwrap();
//! let output = processor.process(&test_batch()).unwrap();
//! let scores = output.accumulator.histogram("bdt_score_boosted").unwrap();
//! assert_eq!(scores.entries(), 1);
//! ```
//!
//! # Selection
//! Events are first required to have no selected leptons and $`p_T^{miss}`$ above threshold.
//! Jets with two distinct secondary vertices are paired candidates. The remaining selected jets
//! farther than $`\Delta R = 0.4`$ from every paired candidate are single candidates, so no jet
//! is counted under both hypotheses. The boosted regime requires at least two paired candidates
//! above the double-$`b`$ working point, the resolved regime at least three single candidates
//! above the single-$`b`$ working point, and both require every sufficiently hard jet to be
//! well separated in azimuth from the missing momentum. The two regimes are evaluated
//! independently, so an event may enter both.
//!
//! The thresholds live in [`SelectionCuts`], whose [`Default`] gives the analysis values.
//!
//! # Output Format
//! Each [`ProcessorOutput`] holds an [`Accumulator`] with:
//! * the `cutflow_0l` ledger: weighted event counts at `raw`, `0lep`, `met`, `bef_boosted`,
//!   `boosted`, `bef_resolved` and `resolved`;
//! * regime-suffixed histograms of the candidate kinematics (`mass_H_boosted`, `HT_resolved`, and
//!   so on), filled with the per-event weight and storing both $`\sum w`$ and $`\sum w^2`$.
//!
//! [`Accumulator::to_json`] serializes the whole set.
#![warn(clippy::perf, clippy::style, missing_docs)]

/// The event selection pipeline and its outputs.
pub mod processor;
/// Adapters between external decision models and the assembled features.
pub mod scorer;

/// Physics objects and columnar [`EventBatch`]es.
pub mod data {
    pub use zhaa_core::data::{
        per_event, random_batch, test_batch, Electron, EventBatch, EventBatchBuilder, Jagged, Jet,
        Mask, Met, Muon,
    };
}
/// Dataset normalization, thresholds and the dataset catalog.
pub mod config {
    pub use zhaa_core::config::*;
}
/// Weighted histograms and the cutflow ledger.
pub mod histograms {
    pub use zhaa_core::histograms::*;
}
/// Object selection, regime classification, candidate reconstruction and feature assembly.
pub mod regimes {
    pub use zhaa_regimes::*;
}
/// Utility functions, enums, and traits
pub mod utils {
    pub use zhaa_core::utils::*;
}
/// Useful traits for all crate structs
pub mod traits {
    pub use crate::scorer::Scorer;
    pub use zhaa_core::traits::Momentum;
    pub use zhaa_regimes::Candidate;
}

pub use processor::{Processor, ProcessorBuilder, ProcessorOutput, CUTFLOW_LABELS, CUTFLOW_NAME};
pub use scorer::{ConstantScorer, Scorer, ScorerAdapter};
pub use zhaa_core::{
    Accumulator, Axis, Cutflow, DatasetCatalog, DatasetConfig, EventBatch, FeatureMatrix,
    FeatureTable, Histogram, Jet, Mask, Met, ProcessorConfig, Regime, SelectionCuts, TtbarFlavor,
    Vec4, ZhaaError, ZhaaResult,
};
pub use zhaa_regimes::{BoostedCandidate, Classification, ObjectSelection, ResolvedCandidate};
