use serde::{Deserialize, Serialize};
use zhaa_core::{
    per_event, traits::Momentum, EventBatch, Jagged, Jet, Mask, Met, Regime, SelectionCuts,
};

use crate::selection::ObjectSelection;

/// The value of [`min_delta_phi`] for an event without any qualifying jet. It is far above any
/// physical threshold, so such events pass the angular requirement.
pub const EMPTY_MIN_DELTA_PHI: f64 = 999.0;

/// The per-event minimum of $`|\Delta\phi(j, p_T^{miss})|`$ over the jets whose momentum (as given
/// by `pt`) is strictly above `pt_min`.
///
/// Events without such jets get [`EMPTY_MIN_DELTA_PHI`].
pub fn min_delta_phi<F>(jets: &Jagged<Jet>, met: &[Met], pt_min: f64, pt: F) -> Vec<f64>
where
    F: Fn(&Jet) -> f64 + Send + Sync,
{
    debug_assert_eq!(jets.n_events(), met.len());
    per_event(jets.n_events(), |i| {
        jets.event(i)
            .iter()
            .filter(|jet| pt(jet) > pt_min)
            .map(|jet| jet.delta_phi_to(&met[i]).abs())
            .fold(EMPTY_MIN_DELTA_PHI, f64::min)
    })
}

/// The masks which define membership in one regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSelection {
    pub regime: Regime,
    /// Minimum $`|\Delta\phi|`$ between the missing momentum and the regime's jets.
    pub min_delta_phi: Vec<f64>,
    /// Events whose minimum $`|\Delta\phi|`$ is strictly above the threshold.
    pub delta_phi: Mask,
    /// Events with enough tagged jets for the regime's reconstruction.
    pub multiplicity: Mask,
    /// Preselection and multiplicity, without the angular requirement.
    pub before: Mask,
    /// Preselection, angular requirement and multiplicity.
    pub full: Mask,
}

impl RegimeSelection {
    fn new(
        regime: Regime,
        preselection: &Mask,
        min_delta_phi: Vec<f64>,
        n_tagged: &[usize],
        min_tagged: usize,
        cuts: &SelectionCuts,
    ) -> Self {
        let delta_phi: Mask = min_delta_phi
            .iter()
            .map(|&dphi| dphi > cuts.min_dphi_jet_met)
            .collect();
        let multiplicity: Mask = n_tagged.iter().map(|&n| n >= min_tagged).collect();
        let before = preselection & &multiplicity;
        let full = &before & &delta_phi;
        log::debug!(
            "{regime}: {} events before the angular requirement, {} after",
            before.count(),
            full.count()
        );
        Self {
            regime,
            min_delta_phi,
            delta_phi,
            multiplicity,
            before,
            full,
        }
    }
}

/// Event-level classification of one batch: the shared preselection chain and the two regimes.
///
/// The regimes are evaluated independently, so an event may belong to neither, either or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Events without selected leptons.
    pub zero_lepton: Mask,
    /// Zero-lepton events with missing transverse momentum above threshold.
    pub preselection: Mask,
    /// Minimum $`|\Delta\phi|`$ to the union of the single and paired jet collections.
    pub min_delta_phi_merged: Vec<f64>,
    pub boosted: RegimeSelection,
    pub resolved: RegimeSelection,
}

impl Classification {
    /// Classify the events of `batch` from its object selection.
    ///
    /// The boosted reconstruction needs at least two tagged jets and the resolved one at least
    /// three, so configured multiplicities below those are raised to them.
    pub fn new(batch: &EventBatch, selection: &ObjectSelection, cuts: &SelectionCuts) -> Self {
        let n_events = batch.n_events();
        let zero_lepton = Mask::from_fn(n_events, |i| selection.leptons.event(i).is_empty());
        let met_mask = Mask::from_fn(n_events, |i| batch.met()[i].pt > cuts.met_pt_min);
        let preselection = &zero_lepton & &met_mask;

        let raw_pt = |jet: &Jet| jet.pt;
        let resolved_dphi = min_delta_phi(
            &selection.selected_jets,
            batch.met(),
            cuts.dphi_jet_pt_min,
            |jet| jet.pt_regressed,
        );
        let boosted_dphi = min_delta_phi(
            &selection.paired_jets,
            batch.met(),
            cuts.dphi_jet_pt_min,
            raw_pt,
        );
        let min_delta_phi_merged = min_delta_phi(
            &selection.single_jets.concat(&selection.paired_jets),
            batch.met(),
            cuts.dphi_jet_pt_min,
            raw_pt,
        );

        let boosted = RegimeSelection::new(
            Regime::Boosted,
            &preselection,
            boosted_dphi,
            &selection.paired.n_tagged(),
            cuts.boosted_min_tagged.max(2),
            cuts,
        );
        let resolved = RegimeSelection::new(
            Regime::Resolved,
            &preselection,
            resolved_dphi,
            &selection.single.n_tagged(),
            cuts.resolved_min_tagged.max(3),
            cuts,
        );
        Self {
            zero_lepton,
            preselection,
            min_delta_phi_merged,
            boosted,
            resolved,
        }
    }

    /// The selection of one regime.
    pub fn regime(&self, regime: Regime) -> &RegimeSelection {
        match regime {
            Regime::Boosted => &self.boosted,
            Regime::Resolved => &self.resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use zhaa_core::data::{random_batch, test_batch};

    use super::*;

    fn jet(index: usize, phi: f64, pt: f64, pt_regressed: f64) -> Jet {
        Jet {
            pt,
            eta: 0.0,
            phi,
            mass: 10.0,
            pt_regressed,
            btag_b: 0.9,
            btag_bb: 0.9,
            sv_idx1: 0,
            sv_idx2: 1,
            tight_id: true,
            tight_lep_veto: true,
            index,
        }
    }

    #[test]
    fn test_min_delta_phi() {
        let met = vec![Met { pt: 200.0, phi: 0.0 }; 3];
        let jets = Jagged::from_nested(vec![
            vec![jet(0, 2.0, 50.0, 50.0), jet(1, -0.7, 50.0, 50.0)],
            vec![jet(0, 0.1, 25.0, 35.0)],
            vec![],
        ]);
        let raw = min_delta_phi(&jets, &met, 30.0, |j| j.pt);
        assert_relative_eq!(raw[0], 0.7, epsilon = 1e-12);
        assert_relative_eq!(raw[1], EMPTY_MIN_DELTA_PHI);
        assert_relative_eq!(raw[2], EMPTY_MIN_DELTA_PHI);
        let regressed = min_delta_phi(&jets, &met, 30.0, |j| j.pt_regressed);
        assert_relative_eq!(regressed[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_boosted_scenario_classification() {
        let batch = test_batch();
        let cuts = SelectionCuts::default();
        let selection = ObjectSelection::new(&batch, &cuts);
        let classification = Classification::new(&batch, &selection, &cuts);
        assert!(classification.preselection[0]);
        assert!(classification.boosted.full[0]);
        assert_eq!(classification.resolved.before.count(), 0);
        assert!(!classification.resolved.full[0]);
        assert_relative_eq!(classification.boosted.min_delta_phi[0], 1.0, epsilon = 1e-12);
        // paired jets still enter the resolved angular requirement
        assert_relative_eq!(classification.resolved.min_delta_phi[0], 1.0, epsilon = 1e-12);
        assert_eq!(classification.regime(Regime::Boosted).regime, Regime::Boosted);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let cuts = SelectionCuts::default();
        // without a second vertex these are single jets only
        let jets: Vec<Jet> = [(0, 0.5), (1, 2.0), (2, -2.0)]
            .into_iter()
            .map(|(index, phi)| Jet {
                sv_idx2: -1,
                ..jet(index, phi, 100.0, 100.0)
            })
            .collect();
        let build = |jets: Vec<Jet>| {
            EventBatch::builder()
                .muons(Jagged::from_nested(vec![vec![]]))
                .electrons(Jagged::from_nested(vec![vec![]]))
                .jets(Jagged::from_nested(vec![jets]))
                .met(vec![Met { pt: 200.0, phi: 0.0 }])
                .build()
                .unwrap()
        };
        let batch = build(jets.clone());
        let selection = ObjectSelection::new(&batch, &cuts);
        let classification = Classification::new(&batch, &selection, &cuts);
        assert_relative_eq!(classification.resolved.min_delta_phi[0], 0.5);
        assert!(classification.resolved.before[0]);
        assert!(!classification.resolved.delta_phi[0]);
        assert!(!classification.resolved.full[0]);

        let mut shifted = jets;
        shifted[0].phi = 0.5 + 1e-9;
        let batch = build(shifted);
        let selection = ObjectSelection::new(&batch, &cuts);
        let classification = Classification::new(&batch, &selection, &cuts);
        assert!(classification.resolved.full[0]);
    }

    #[test]
    fn test_regimes_imply_preselection() {
        let cuts = SelectionCuts::default();
        for seed in 0..5 {
            let batch = random_batch(500, seed);
            let selection = ObjectSelection::new(&batch, &cuts);
            let classification = Classification::new(&batch, &selection, &cuts);
            for regime in Regime::ALL {
                let regime = classification.regime(regime);
                for i in 0..batch.n_events() {
                    if regime.full[i] {
                        assert!(regime.before[i]);
                        assert!(classification.preselection[i]);
                    }
                    if classification.preselection[i] {
                        assert!(classification.zero_lepton[i]);
                    }
                }
                assert!(regime.full.count() <= regime.before.count());
            }
        }
    }
}
