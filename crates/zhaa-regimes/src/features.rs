use zhaa_core::{FeatureTable, Regime, ZhaaError, ZhaaResult};

use crate::{boosted::BoostedCandidate, resolved::ResolvedCandidate};

/// Inputs of the boosted-regime scorer, in order.
pub const BOOSTED_SCORER_FEATURES: [&str; 12] = [
    "H_mass",
    "H_pt",
    "HT",
    "btag_max",
    "btag_min",
    "btag_prod",
    "dr_bb_ave",
    "dm_bb_bb_min",
    "dphi_H_MET",
    "dphi_untag_MET",
    "pt_tag_max",
    "n_untag",
];

/// Inputs of the resolved-regime scorer, in order.
pub const RESOLVED_SCORER_FEATURES: [&str; 11] = [
    "H_mass",
    "H_pt",
    "HT",
    "dphi_H_MET",
    "dm_bb_bb_min",
    "m_bbj",
    "n_untag",
    "btag_min",
    "pt_untag_max",
    "dr_bb_ave",
    "dphi_untag_MET",
];

/// Columns of a recorded boosted training table, before the weight.
pub const BOOSTED_RECORDED_FEATURES: [&str; 14] = [
    "H_mass",
    "H_pt",
    "HT",
    "btag_max",
    "btag_min",
    "btag_prod",
    "dr_bb_ave",
    "dm_bb_bb_min",
    "dphi_H_MET",
    "dphi_untag_MET",
    "pt_tag_max",
    "n_untag",
    "pt_untag_max",
    "min_jmet",
];

/// Columns of a recorded resolved training table, before the weight.
pub const RESOLVED_RECORDED_FEATURES: [&str; 14] = [
    "H_mass",
    "H_pt",
    "HT",
    "dphi_H_MET",
    "dm_bb_bb_min",
    "m_bbj",
    "n_untag",
    "btag_min",
    "pt_untag_max",
    "dr_bb_ave",
    "dphi_untag_MET",
    "btag_max",
    "dr_bb_bb_ave",
    "min_jmet",
];

/// Name of the per-event weight column appended to recorded tables.
pub const WEIGHT_COLUMN: &str = "weight";

/// The scorer inputs of a regime.
pub fn scorer_features(regime: Regime) -> &'static [&'static str] {
    match regime {
        Regime::Boosted => &BOOSTED_SCORER_FEATURES,
        Regime::Resolved => &RESOLVED_SCORER_FEATURES,
    }
}

/// The recorded columns of a regime (without the weight).
pub fn recorded_features(regime: Regime) -> &'static [&'static str] {
    match regime {
        Regime::Boosted => &BOOSTED_RECORDED_FEATURES,
        Regime::Resolved => &RESOLVED_RECORDED_FEATURES,
    }
}

/// A reconstructed per-event candidate which exposes named scalar features.
pub trait Candidate {
    /// The regime this candidate was reconstructed under.
    const REGIME: Regime;
    /// Every feature name [`Candidate::feature`] defines.
    const FEATURES: &'static [&'static str];

    /// Index of the candidate's event within its batch.
    fn event(&self) -> usize;

    /// The value of a named feature, or [`None`] if this candidate does not define it. Defined
    /// features which cannot be computed for this event are NaN.
    fn feature(&self, name: &str) -> Option<f64>;
}

impl Candidate for BoostedCandidate {
    const REGIME: Regime = Regime::Boosted;
    const FEATURES: &'static [&'static str] = &BOOSTED_RECORDED_FEATURES;

    fn event(&self) -> usize {
        self.event
    }

    fn feature(&self, name: &str) -> Option<f64> {
        Some(match name {
            "H_mass" => self.mass(),
            "H_pt" => self.pt(),
            "HT" => self.ht,
            "btag_max" => self.btag_max,
            "btag_min" => self.btag_min,
            "btag_prod" => self.btag_prod(),
            "dr_bb_ave" => self.dr_bb_ave,
            "dm_bb_bb_min" => self.mass_difference,
            "dphi_H_MET" => self.dphi_higgs_met(),
            "dphi_untag_MET" => self.dphi_proxy_met(),
            "pt_tag_max" => self.pt_tag_max,
            "n_untag" => self.n_untagged as f64,
            "pt_untag_max" => self.pt_proxy(),
            "min_jmet" => self.min_delta_phi,
            _ => return None,
        })
    }
}

impl Candidate for ResolvedCandidate {
    const REGIME: Regime = Regime::Resolved;
    const FEATURES: &'static [&'static str] = &[
        "H_mass",
        "H_pt",
        "HT",
        "btag_max",
        "btag_min",
        "btag_prod",
        "dr_bb_ave",
        "dr_bb_bb_ave",
        "dm_bb_bb_min",
        "m_bbj",
        "dphi_H_MET",
        "dphi_untag_MET",
        "pt_tag_max",
        "n_untag",
        "pt_untag_max",
        "min_jmet",
    ];

    fn event(&self) -> usize {
        self.event
    }

    fn feature(&self, name: &str) -> Option<f64> {
        Some(match name {
            "H_mass" => self.mass(),
            "H_pt" => self.pt(),
            "HT" => self.ht,
            "btag_max" => self.btag_max,
            "btag_min" => self.btag_min,
            "btag_prod" => self.btag_prod(),
            "dr_bb_ave" => self.dr_bb_ave,
            "dr_bb_bb_ave" => self.dr_bb_bb_ave,
            "dm_bb_bb_min" => self.dm_bb_bb_min,
            "m_bbj" => self.m_bbj,
            "dphi_H_MET" => self.dphi_higgs_met(),
            "dphi_untag_MET" => self.dphi_proxy_met(),
            "pt_tag_max" => self.pt_tag_max,
            "n_untag" => self.n_untagged as f64,
            "pt_untag_max" => self.pt_proxy(),
            "min_jmet" => self.min_delta_phi,
            _ => return None,
        })
    }
}

/// Gather the named features of every candidate into a table with one row per candidate, in
/// candidate order.
///
/// # Errors
///
/// Returns [`ZhaaError::Custom`] if a name is not a feature of the candidate type.
pub fn assemble<C: Candidate>(candidates: &[C], names: &[&str]) -> ZhaaResult<FeatureTable> {
    if let Some(unknown) = names.iter().find(|name| !C::FEATURES.contains(*name)) {
        return Err(ZhaaError::Custom(format!(
            "\"{unknown}\" is not a {} regime feature",
            C::REGIME
        )));
    }
    let mut table = FeatureTable::default();
    for &name in names {
        let column = candidates
            .iter()
            .map(|candidate| candidate.feature(name).unwrap_or(f64::NAN))
            .collect();
        table.push_column(name, column)?;
    }
    Ok(table)
}
