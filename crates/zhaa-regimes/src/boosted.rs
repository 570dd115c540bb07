use serde::{Deserialize, Serialize};
use zhaa_core::{per_event, traits::Momentum, EventBatch, Jet, Met, Regime, Vec4};

use crate::{
    classifier::RegimeSelection,
    combinatorics::{mean_pairwise_delta_r, proxy_jet},
    selection::{tag_score, ObjectSelection},
};

/// The boosted-regime candidate of one event: the sum of the two leading double-$`b`$-tagged
/// paired-candidate jets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostedCandidate {
    /// Index of the event within its batch.
    pub event: usize,
    /// Sum of the regressed four-momenta of the two leading tagged jets.
    pub higgs: Vec4,
    /// Scalar sum of the regressed momenta of all tagged paired jets.
    pub ht: f64,
    pub btag_max: f64,
    pub btag_min: f64,
    /// $`|m_1 - m_2|`$ of the two leading tagged jets.
    pub mass_difference: f64,
    /// Mean $`\Delta R`$ over all pairs of tagged jets.
    pub dr_bb_ave: f64,
    pub n_untagged: usize,
    /// Regressed momentum of the leading tagged jet.
    pub pt_tag_max: f64,
    pub proxy: Option<Jet>,
    pub met: Met,
    pub min_delta_phi: f64,
}

impl BoostedCandidate {
    /// Build the candidate from an event's tagged jets (sorted by descending double-$`b`$ score)
    /// and untagged jets (sorted by descending regressed momentum). Returns [`None`] with fewer
    /// than two tagged jets.
    pub fn new(
        event: usize,
        tagged: &[Jet],
        untagged: &[Jet],
        met: Met,
        min_delta_phi: f64,
    ) -> Option<Self> {
        let [lead, sublead, ..] = tagged else {
            return None;
        };
        Some(Self {
            event,
            higgs: lead.p4_regressed() + sublead.p4_regressed(),
            ht: tagged.iter().map(|jet| jet.pt_regressed).sum(),
            btag_max: lead.btag_bb,
            btag_min: sublead.btag_bb,
            mass_difference: (lead.mass - sublead.mass).abs(),
            dr_bb_ave: mean_pairwise_delta_r(tagged),
            n_untagged: untagged.len(),
            pt_tag_max: lead.pt_regressed,
            proxy: proxy_jet(tagged, untagged, |jet| tag_score(Regime::Boosted, jet)),
            met,
            min_delta_phi,
        })
    }

    pub fn mass(&self) -> f64 {
        self.higgs.m()
    }

    pub fn pt(&self) -> f64 {
        self.higgs.pt()
    }

    pub fn btag_prod(&self) -> f64 {
        self.btag_max * self.btag_min
    }

    /// $`|\Delta\phi(H, p_T^{miss})|`$.
    pub fn dphi_higgs_met(&self) -> f64 {
        self.higgs.delta_phi_to(&self.met).abs()
    }

    /// $`|\Delta\phi(j_{proxy}, p_T^{miss})|`$, NaN without a proxy jet.
    pub fn dphi_proxy_met(&self) -> f64 {
        self.proxy
            .map_or(f64::NAN, |jet| jet.delta_phi_to(&self.met).abs())
    }

    /// Regressed momentum of the proxy jet, NaN without one.
    pub fn pt_proxy(&self) -> f64 {
        self.proxy.map_or(f64::NAN, |jet| jet.pt_regressed)
    }
}

/// Reconstruct the boosted candidate of every event passing the boosted regime, in event order.
pub fn reconstruct_boosted(
    batch: &EventBatch,
    selection: &ObjectSelection,
    regime: &RegimeSelection,
) -> Vec<BoostedCandidate> {
    let events = regime.full.indices();
    per_event(events.len(), |k| {
        let i = events[k];
        BoostedCandidate::new(
            i,
            selection.paired.tagged.event(i),
            selection.paired.untagged.event(i),
            batch.met()[i],
            regime.min_delta_phi[i],
        )
    })
    .into_iter()
    .flatten()
    .collect()
}
