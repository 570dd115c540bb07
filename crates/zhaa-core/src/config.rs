use std::{fs, path::PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{ZhaaError, ZhaaResult};

fn expand_path(file_path: &str) -> ZhaaResult<String> {
    Ok(shellexpand::full(file_path)?.into_owned())
}

/// Normalization metadata for one input dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Sample name, for instance `TTto4Q` or `ZH_ZToAll_HToAATo4B_M-30`.
    pub name: String,
    /// Cross-section of the process.
    pub cross_section: f64,
    /// Effective number of generated events.
    pub n_events: u64,
    /// Whether the dataset is simulated.
    pub is_mc: bool,
}

impl DatasetConfig {
    pub fn new(name: &str, cross_section: f64, n_events: u64, is_mc: bool) -> Self {
        Self {
            name: name.to_string(),
            cross_section,
            n_events,
            is_mc,
        }
    }

    /// Check that the normalization is well defined.
    ///
    /// # Errors
    ///
    /// Returns [`ZhaaError::InvalidNormalization`] if the cross-section is not a positive finite
    /// number or the number of events is zero.
    pub fn validate(&self) -> ZhaaResult<()> {
        if !(self.cross_section.is_finite() && self.cross_section > 0.0) || self.n_events == 0 {
            return Err(ZhaaError::InvalidNormalization {
                name: self.name.clone(),
                cross_section: self.cross_section,
                n_events: self.n_events,
            });
        }
        Ok(())
    }

    /// The per-event weight: cross-section over the number of generated events for simulation,
    /// one for recorded data.
    pub fn normalization_weight(&self) -> f64 {
        if self.is_mc {
            self.cross_section / self.n_events as f64
        } else {
            1.0
        }
    }

    /// Whether this is a $`t\bar{t}`$ sample which can be split by heavy-flavour content.
    pub fn is_ttbar(&self) -> bool {
        self.name.starts_with("TT")
    }
}

/// The fixed thresholds of the object selection and the regime classification.
///
/// [`SelectionCuts::default`] gives the values used by the analysis. Missing fields in serialized
/// configurations fall back to those defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionCuts {
    pub muon_pt_min: f64,
    pub muon_abs_eta_max: f64,
    pub muon_iso_max: f64,
    pub electron_pt_min: f64,
    pub electron_abs_eta_max: f64,
    pub electron_cut_based_min: i32,
    pub electron_iso_max: f64,
    /// Applied to the regressed transverse momentum.
    pub jet_pt_min: f64,
    pub jet_abs_eta_max: f64,
    /// Jets closer than this to any selected lepton are removed.
    pub lepton_cleaning_dr: f64,
    /// Paired-candidate jets closer than this to another selected jet are removed.
    pub paired_cleaning_dr: f64,
    /// Single-candidate jets are tagged above this single-$`b`$ score.
    pub single_tag_threshold: f64,
    /// Paired-candidate jets are tagged above this double-$`b`$ score.
    pub paired_tag_threshold: f64,
    pub met_pt_min: f64,
    /// Jets entering the $`\min\Delta\phi(j, p_T^{miss})`$ requirement must exceed this momentum.
    pub dphi_jet_pt_min: f64,
    /// The minimum $`|\Delta\phi(j, p_T^{miss})|`$ must be strictly greater than this.
    pub min_dphi_jet_met: f64,
    pub boosted_min_tagged: usize,
    pub resolved_min_tagged: usize,
}

impl Default for SelectionCuts {
    fn default() -> Self {
        Self {
            muon_pt_min: 10.0,
            muon_abs_eta_max: 2.5,
            muon_iso_max: 0.15,
            electron_pt_min: 15.0,
            electron_abs_eta_max: 2.4,
            electron_cut_based_min: 4,
            electron_iso_max: 0.15,
            jet_pt_min: 20.0,
            jet_abs_eta_max: 2.5,
            lepton_cleaning_dr: 0.4,
            paired_cleaning_dr: 0.4,
            single_tag_threshold: 0.4648,
            paired_tag_threshold: 0.38,
            met_pt_min: 170.0,
            dphi_jet_pt_min: 30.0,
            min_dphi_jet_met: 0.5,
            boosted_min_tagged: 2,
            resolved_min_tagged: 3,
        }
    }
}

/// Everything a processor needs to know about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub dataset: DatasetConfig,
    /// Record per-event feature tables (training-data capture).
    #[serde(default)]
    pub record_features: bool,
    /// Evaluate the per-regime scorers and fill the score histograms.
    #[serde(default)]
    pub run_scoring: bool,
    #[serde(default)]
    pub cuts: SelectionCuts,
}

impl ProcessorConfig {
    /// A configuration with default cuts and neither recording nor scoring enabled.
    pub fn new(dataset: DatasetConfig) -> Self {
        Self {
            dataset,
            record_features: false,
            run_scoring: false,
            cuts: SelectionCuts::default(),
        }
    }

    pub fn with_recording(mut self, record_features: bool) -> Self {
        self.record_features = record_features;
        self
    }

    pub fn with_scoring(mut self, run_scoring: bool) -> Self {
        self.run_scoring = run_scoring;
        self
    }

    pub fn with_cuts(mut self, cuts: SelectionCuts) -> Self {
        self.cuts = cuts;
        self
    }

    /// Check the dataset normalization and that recording and scoring are not both requested.
    pub fn validate(&self) -> ZhaaResult<()> {
        self.dataset.validate()?;
        if self.record_features && self.run_scoring {
            return Err(ZhaaError::ConflictingModes);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatalogMetadata {
    sample: String,
    xsec: f64,
    nevents: u64,
    #[serde(rename = "isMC")]
    is_mc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CatalogEntry {
    metadata: CatalogMetadata,
    #[serde(default)]
    files: Vec<String>,
}

/// The JSON dataset catalog used to fan jobs out over input files.
///
/// The catalog maps a dataset key to its metadata and input files:
/// ```json
/// { "TTto4Q": { "metadata": { "sample": "TTto4Q", "xsec": 377.0, "nevents": 1000, "isMC": true },
///               "files": ["~/data/tt_1.root"] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetCatalog {
    entries: IndexMap<String, CatalogEntry>,
}

impl DatasetCatalog {
    /// Parse a catalog from a JSON string.
    pub fn from_json(json: &str) -> ZhaaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a catalog from a JSON file. `~` and environment variables in the path are expanded.
    pub fn open(file_path: &str) -> ZhaaResult<Self> {
        let path = PathBuf::from(expand_path(file_path)?);
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Dataset keys, in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn entry(&self, key: &str) -> ZhaaResult<&CatalogEntry> {
        self.entries.get(key).ok_or_else(|| ZhaaError::UnknownDataset {
            key: key.to_string(),
        })
    }

    /// The normalization metadata of a dataset.
    pub fn config(&self, key: &str) -> ZhaaResult<DatasetConfig> {
        let metadata = &self.entry(key)?.metadata;
        Ok(DatasetConfig::new(
            &metadata.sample,
            metadata.xsec,
            metadata.nevents,
            metadata.is_mc,
        ))
    }

    /// The input files of a dataset, with `~` and environment variables expanded.
    pub fn files(&self, key: &str) -> ZhaaResult<Vec<String>> {
        self.entry(key)?
            .files
            .iter()
            .map(|file| expand_path(file))
            .collect()
    }

    /// The input file handled by job `job_index` of a dataset.
    pub fn job_file(&self, key: &str, job_index: usize) -> ZhaaResult<String> {
        let files = &self.entry(key)?.files;
        let file = files.get(job_index).ok_or_else(|| {
            ZhaaError::Custom(format!(
                "job index {job_index} is out of range for dataset \"{key}\" with {} files",
                files.len()
            ))
        })?;
        expand_path(file)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const CATALOG: &str = r#"{
        "TTto4Q": {
            "metadata": { "sample": "TTto4Q", "xsec": 377.96, "nevents": 1000, "isMC": true },
            "files": ["root://eos/tt_1.root", "root://eos/tt_2.root"]
        },
        "JetMET": {
            "metadata": { "sample": "JetMET_2024C", "xsec": 1.0, "nevents": 1, "isMC": false },
            "files": []
        }
    }"#;

    #[test]
    fn test_normalization() {
        let mc = DatasetConfig::new("ZH", 0.89, 3000, true);
        assert!(mc.validate().is_ok());
        assert_relative_eq!(mc.normalization_weight(), 0.89 / 3000.0);
        let data = DatasetConfig::new("JetMET", 1.0, 10, false);
        assert_relative_eq!(data.normalization_weight(), 1.0);
        assert!(DatasetConfig::new("ZH", 0.0, 3000, true).validate().is_err());
        assert!(DatasetConfig::new("ZH", -1.0, 3000, true).validate().is_err());
        assert!(DatasetConfig::new("ZH", f64::NAN, 3000, true).validate().is_err());
        assert!(matches!(
            DatasetConfig::new("ZH", 1.0, 0, true).validate(),
            Err(ZhaaError::InvalidNormalization { .. })
        ));
    }

    #[test]
    fn test_conflicting_modes() {
        let config = ProcessorConfig::new(DatasetConfig::new("ZH", 0.89, 3000, true))
            .with_recording(true)
            .with_scoring(true);
        assert!(matches!(config.validate(), Err(ZhaaError::ConflictingModes)));
        assert!(config.with_scoring(false).validate().is_ok());
    }

    #[test]
    fn test_cuts_defaults_fill_missing_fields() {
        let cuts: SelectionCuts = serde_json::from_str(r#"{ "met_pt_min": 200.0 }"#).unwrap();
        assert_relative_eq!(cuts.met_pt_min, 200.0);
        assert_relative_eq!(cuts.single_tag_threshold, 0.4648);
        assert_eq!(cuts.resolved_min_tagged, 3);
    }

    #[test]
    fn test_catalog() {
        let catalog = DatasetCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["TTto4Q", "JetMET"]);
        let tt = catalog.config("TTto4Q").unwrap();
        assert!(tt.is_ttbar() && tt.is_mc);
        assert_eq!(tt.n_events, 1000);
        let data = catalog.config("JetMET").unwrap();
        assert_eq!(data.name, "JetMET_2024C");
        assert!(!data.is_ttbar());
        assert_eq!(catalog.files("TTto4Q").unwrap().len(), 2);
        assert_eq!(catalog.job_file("TTto4Q", 1).unwrap(), "root://eos/tt_2.root");
        assert!(catalog.job_file("TTto4Q", 2).is_err());
        assert!(matches!(
            catalog.config("WH"),
            Err(ZhaaError::UnknownDataset { .. })
        ));
        assert!(DatasetCatalog::from_json("{ not json").is_err());
    }
}
