//! # zhaa-regimes
//!
//! This is an internal crate used by `zhaa`. It turns an
//! [`EventBatch`](zhaa_core::EventBatch) into selected objects, regime masks, reconstructed
//! candidates and feature tables.
#![warn(clippy::perf, clippy::style)]

/// Boosted-regime candidates built from two double-$`b`$-tagged jets.
pub mod boosted;
/// The preselection chain and regime membership masks.
pub mod classifier;
/// Pairings, subsets and other small combinatorial helpers shared by the reconstructors.
pub mod combinatorics;
/// Named per-event features of reconstructed candidates.
pub mod features;
/// Resolved-regime candidates built from three or four single-$`b`$-tagged jets.
pub mod resolved;
/// Object selection, cross-cleaning and tag partitioning.
pub mod selection;

pub use boosted::{reconstruct_boosted, BoostedCandidate};
pub use classifier::{min_delta_phi, Classification, RegimeSelection, EMPTY_MIN_DELTA_PHI};
pub use features::{
    assemble, recorded_features, scorer_features, Candidate, BOOSTED_RECORDED_FEATURES,
    BOOSTED_SCORER_FEATURES, RESOLVED_RECORDED_FEATURES, RESOLVED_SCORER_FEATURES, WEIGHT_COLUMN,
};
pub use resolved::{reconstruct_resolved, ResolvedCandidate};
pub use selection::{Lepton, LeptonFlavor, ObjectSelection, TagPartition};
