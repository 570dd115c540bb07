//! # zhaa-core
//!
//! This is an internal crate used by `zhaa`.
#![warn(clippy::perf, clippy::style)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// Dataset normalization, selection thresholds and the dataset catalog.
pub mod config;
/// Physics objects and the columnar [`EventBatch`](crate::data::EventBatch).
pub mod data;
/// Named per-event feature columns and scorer input matrices.
pub mod features;
/// Weighted histograms, the cutflow ledger and the [`Accumulator`](crate::histograms::Accumulator)
/// which owns them.
pub mod histograms;
/// Utility functions, enums, and traits
pub mod utils;

/// Useful traits for all crate structs
pub mod traits {
    pub use crate::utils::vectors::Momentum;
}

pub use crate::config::{DatasetCatalog, DatasetConfig, ProcessorConfig, SelectionCuts};
pub use crate::data::{per_event, Electron, EventBatch, Jagged, Jet, Mask, Met, Muon};
pub use crate::features::{FeatureMatrix, FeatureTable};
pub use crate::histograms::{Accumulator, Axis, Cutflow, Histogram};
pub use crate::utils::enums::{Regime, TtbarFlavor};
pub use crate::utils::vectors::{delta_eta, delta_phi, delta_r, Vec4};

pub type ZhaaResult<T> = Result<T, ZhaaError>;

/// The error type used by all `zhaa` internal methods
#[derive(Error, Debug)]
pub enum ZhaaError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`serde_json::Error`].
    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// The dataset normalization cannot be computed because the cross-section or the number of
    /// generated events is not positive.
    #[error("Invalid normalization for dataset \"{name}\": cross-section = {cross_section}, events = {n_events}")]
    InvalidNormalization {
        /// Name of the dataset
        name: String,
        /// Configured cross-section
        cross_section: f64,
        /// Configured number of generated events
        n_events: u64,
    },
    /// Feature recording and scoring were both requested for the same run.
    #[error("Feature recording and scoring are mutually exclusive!")]
    ConflictingModes,
    /// A scorer expects different features from the ones assembled for its regime.
    #[error("Scorer for the {regime} regime expects features {found:?}, but {expected:?} are assembled")]
    ScorerFeatureMismatch {
        /// The regime the scorer was registered for
        regime: String,
        /// Feature names assembled for the regime
        expected: Vec<String>,
        /// Feature names reported by the scorer
        found: Vec<String>,
    },
    /// Scoring was requested, but no scorer was provided for a regime.
    #[error("Scoring is enabled but no scorer was provided for the {regime} regime")]
    MissingScorer {
        /// The regime which has no scorer
        regime: String,
    },
    /// A dataset key was not found in a [`DatasetCatalog`].
    #[error("No dataset with key \"{key}\" in the catalog!")]
    UnknownDataset {
        /// Key which failed lookup
        key: String,
    },
    /// An [`EventBatch`] was built without a required collection.
    #[error("Event batch is missing the \"{collection}\" collection")]
    MissingCollection {
        /// Name of the missing collection
        collection: String,
    },
    /// Two columns which must describe the same events (or objects) have different lengths.
    #[error("Length mismatch in {context}: expected {expected}, found {actual}")]
    LengthMismatch {
        /// Which column or collection was checked
        context: String,
        /// Required length
        expected: usize,
        /// Length found
        actual: usize,
    },
    /// An error raised by (or about the output of) an external scorer.
    #[error("Scorer error: {0}")]
    ScorerError(String),
    /// A fill or lookup referenced a histogram which was never declared.
    #[error("No histogram named \"{name}\"!")]
    UnknownHistogram {
        /// Name of the histogram
        name: String,
    },
    /// Two histograms with the same name could not be merged because their axes differ.
    #[error("Histograms named \"{name}\" have incompatible axes")]
    IncompatibleHistograms {
        /// Name of the histogram
        name: String,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}

impl Clone for ZhaaError {
    // Most wrapped error types are not cloneable, so clones collapse to their message
    fn clone(&self) -> Self {
        let err_string = self.to_string();
        ZhaaError::Custom(err_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_clone_keeps_message() {
        let err = ZhaaError::MissingCollection {
            collection: "Jet".to_string(),
        };
        let cloned = err.clone();
        assert!(matches!(cloned, ZhaaError::Custom(_)));
        assert_eq!(cloned.to_string(), err.to_string());
    }
}
