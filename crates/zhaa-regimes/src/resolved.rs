use serde::{Deserialize, Serialize};
use zhaa_core::{per_event, traits::Momentum, EventBatch, Jet, Met, Regime, Vec4};

use crate::{
    classifier::RegimeSelection,
    combinatorics::{best_pairing, best_quadruplet, m_bbj, mean_pairwise_delta_r, proxy_jet, Pairing},
    selection::{tag_score, ObjectSelection},
};

/// The four jets used for the pair-mass comparison of a resolved event, and their best pairing.
///
/// With at least four tagged jets these are the four whose best pairing is most balanced, and the
/// candidate is their sum. With exactly three tagged jets the candidate is the sum of the three,
/// and the untagged jet with the highest raw momentum completes the four (if there is one).
fn higgs_kinematics(tagged: &[Jet], untagged: &[Jet]) -> Option<(Vec4, Option<Pairing>)> {
    let p4s: Vec<Vec4> = tagged.iter().map(Jet::p4_regressed).collect();
    match p4s.len() {
        0..=2 => None,
        3 => {
            let higgs = p4s.iter().sum();
            let pairing = untagged
                .first()
                .map(|extra| best_pairing(&[p4s[0], p4s[1], p4s[2], extra.p4_regressed()]));
            Some((higgs, pairing))
        }
        _ => {
            let (indices, pairing) = best_quadruplet(&p4s)?;
            Some((indices.iter().map(|&i| p4s[i]).sum(), Some(pairing)))
        }
    }
}

/// The resolved-regime candidate of one event, built from single-$`b`$-tagged jets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCandidate {
    /// Index of the event within its batch.
    pub event: usize,
    pub higgs: Vec4,
    pub n_tagged: usize,
    /// Smallest pair-mass difference of the four jets used for pairing (NaN if fewer than four
    /// jets are available).
    pub dm_bb_bb_min: f64,
    /// Mean intra-pair $`\Delta R`$ of that pairing.
    pub dr_bb_bb_ave: f64,
    /// Mean $`\Delta R`$ over all pairs of tagged jets.
    pub dr_bb_ave: f64,
    pub m_bbj: f64,
    /// Scalar sum of the regressed momenta of all selected single jets.
    pub ht: f64,
    pub btag_max: f64,
    pub btag_min: f64,
    pub n_untagged: usize,
    /// Regressed momentum of the leading tagged jet.
    pub pt_tag_max: f64,
    pub proxy: Option<Jet>,
    pub met: Met,
    pub min_delta_phi: f64,
}

impl ResolvedCandidate {
    /// Build the candidate from an event's tagged jets (sorted by descending single-$`b`$ score),
    /// untagged jets (sorted by descending raw momentum) and all selected single jets.
    /// Returns [`None`] with fewer than three tagged jets.
    pub fn new(
        event: usize,
        tagged: &[Jet],
        untagged: &[Jet],
        jets: &[Jet],
        met: Met,
        min_delta_phi: f64,
    ) -> Option<Self> {
        let (higgs, pairing) = higgs_kinematics(tagged, untagged)?;
        let score = |jet: &Jet| tag_score(Regime::Resolved, jet);
        Some(Self {
            event,
            higgs,
            n_tagged: tagged.len(),
            dm_bb_bb_min: pairing.map_or(f64::NAN, |p| p.mass_difference),
            dr_bb_bb_ave: pairing.map_or(f64::NAN, |p| p.mean_delta_r),
            dr_bb_ave: mean_pairwise_delta_r(tagged),
            m_bbj: m_bbj(tagged, jets),
            ht: jets.iter().map(|jet| jet.pt_regressed).sum(),
            btag_max: tagged.iter().map(score).fold(f64::NEG_INFINITY, f64::max),
            btag_min: tagged.iter().map(score).fold(f64::INFINITY, f64::min),
            n_untagged: untagged.len(),
            pt_tag_max: tagged[0].pt_regressed,
            proxy: proxy_jet(tagged, untagged, score),
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

/// Reconstruct the resolved candidate of every event passing the resolved regime, in event order.
pub fn reconstruct_resolved(
    batch: &EventBatch,
    selection: &ObjectSelection,
    regime: &RegimeSelection,
) -> Vec<ResolvedCandidate> {
    let events = regime.full.indices();
    per_event(events.len(), |k| {
        let i = events[k];
        ResolvedCandidate::new(
            i,
            selection.single.tagged.event(i),
            selection.single.untagged.event(i),
            selection.single_jets.event(i),
            batch.met()[i],
            regime.min_delta_phi[i],
        )
    })
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use zhaa_core::{data::random_batch, Jagged, SelectionCuts};

    use super::*;
    use crate::classifier::Classification;

    fn jet(index: usize, pt_regressed: f64, eta: f64, phi: f64, btag_b: f64) -> Jet {
        Jet {
            pt: pt_regressed,
            eta,
            phi,
            mass: 5.0,
            pt_regressed,
            btag_b,
            btag_bb: 0.0,
            sv_idx1: -1,
            sv_idx2: -1,
            tight_id: true,
            tight_lep_veto: true,
            index,
        }
    }

    fn met() -> Met {
        Met { pt: 250.0, phi: 0.0 }
    }

    #[test]
    fn test_three_tagged_jets() {
        let tagged = [
            jet(0, 100.0, 0.0, 1.0, 0.9),
            jet(1, 80.0, 0.5, 2.0, 0.8),
            jet(2, 60.0, -0.5, -2.0, 0.7),
        ];
        let candidate = ResolvedCandidate::new(0, &tagged, &[], &tagged, met(), 1.0).unwrap();
        let expected: Vec4 = tagged.iter().map(Jet::p4_regressed).sum();
        assert_relative_eq!(candidate.mass(), expected.m(), epsilon = 1e-9);
        assert!(candidate.dm_bb_bb_min.is_nan());
        assert!(candidate.dr_bb_bb_ave.is_nan());
        assert!(candidate.m_bbj.is_finite());
        assert_relative_eq!(candidate.btag_max, 0.9);
        assert_relative_eq!(candidate.btag_min, 0.7);
        assert_relative_eq!(candidate.ht, 240.0);
        assert_eq!(candidate.n_untagged, 0);
        // no untagged jets: the proxy is the lowest-scoring tagged jet
        assert_eq!(candidate.proxy.unwrap().index, 2);
        assert_relative_eq!(candidate.dphi_proxy_met(), 2.0, epsilon = 1e-12);

        let untagged = [jet(3, 40.0, 1.0, PI, 0.1)];
        let jets = [tagged[0], tagged[1], tagged[2], untagged[0]];
        let candidate = ResolvedCandidate::new(0, &tagged, &untagged, &jets, met(), 1.0).unwrap();
        // the extra jet only enters the pairing, not the candidate
        assert_relative_eq!(candidate.mass(), expected.m(), epsilon = 1e-9);
        assert!(candidate.dm_bb_bb_min.is_finite());
        assert_eq!(candidate.proxy.unwrap().index, 3);
        assert_relative_eq!(candidate.pt_proxy(), 40.0);
        assert_relative_eq!(candidate.ht, 280.0);
    }

    #[test]
    fn test_leading_untagged_jet_uses_raw_momentum() {
        let tagged = [
            jet(0, 100.0, 0.0, 1.0, 0.9),
            jet(1, 80.0, 0.5, 2.0, 0.8),
            jet(2, 60.0, -0.5, -2.0, 0.7),
        ];
        // the regression ranks these two the other way round
        let soft = Jet {
            pt: 50.0,
            ..jet(3, 60.0, 1.0, PI, 0.1)
        };
        let hard = Jet {
            pt: 55.0,
            ..jet(4, 45.0, -1.5, 0.5, 0.2)
        };
        let jets = vec![tagged[0], tagged[1], tagged[2], soft, hard];
        let batch = EventBatch::builder()
            .muons(Jagged::from_nested(vec![vec![]]))
            .electrons(Jagged::from_nested(vec![vec![]]))
            .jets(Jagged::from_nested(vec![jets]))
            .met(vec![met()])
            .build()
            .unwrap();
        let selection = ObjectSelection::new(&batch, &SelectionCuts::default());
        let untagged = selection.single.untagged.event(0);
        assert_eq!(untagged[0].index, 4);
        let candidate = ResolvedCandidate::new(
            0,
            selection.single.tagged.event(0),
            untagged,
            selection.single_jets.event(0),
            met(),
            1.0,
        )
        .unwrap();
        assert_eq!(candidate.proxy.unwrap().index, 4);
        assert_relative_eq!(candidate.pt_proxy(), 45.0);
        assert_relative_eq!(candidate.dphi_proxy_met(), 0.5, epsilon = 1e-12);
        let pairing = best_pairing(&[
            tagged[0].p4_regressed(),
            tagged[1].p4_regressed(),
            tagged[2].p4_regressed(),
            hard.p4_regressed(),
        ]);
        assert_relative_eq!(candidate.dm_bb_bb_min, pairing.mass_difference, epsilon = 1e-9);
        assert_relative_eq!(candidate.dr_bb_bb_ave, pairing.mean_delta_r, epsilon = 1e-9);
    }

    #[test]
    fn test_four_tagged_jets_use_best_quadruplet() {
        let tagged = [
            jet(0, 100.0, 0.0, 0.0, 0.95),
            jet(1, 100.0, 0.0, PI, 0.9),
            jet(2, 50.0, 1.0, PI / 2.0, 0.8),
            jet(3, 50.0, 1.0, -PI / 2.0, 0.7),
        ];
        let candidate = ResolvedCandidate::new(0, &tagged, &[], &tagged, met(), 1.0).unwrap();
        let expected: Vec4 = tagged.iter().map(Jet::p4_regressed).sum();
        assert_relative_eq!(candidate.mass(), expected.m(), epsilon = 1e-9);
        assert!(candidate.dm_bb_bb_min >= 0.0);
        assert_relative_eq!(candidate.pt_tag_max, 100.0);
        assert!(ResolvedCandidate::new(0, &tagged[..2], &[], &tagged, met(), 1.0).is_none());
    }

    #[test]
    fn test_reconstruct_resolved_on_random_batches() {
        let cuts = SelectionCuts::default();
        for seed in 0..3 {
            let batch = random_batch(1000, seed);
            let selection = ObjectSelection::new(&batch, &cuts);
            let classification = Classification::new(&batch, &selection, &cuts);
            let candidates = reconstruct_resolved(&batch, &selection, &classification.resolved);
            assert_eq!(candidates.len(), classification.resolved.full.count());
            for candidate in &candidates {
                assert!(classification.resolved.full[candidate.event]);
                assert!(candidate.n_tagged >= 3);
                assert!(candidate.mass() >= 0.0);
                assert!(candidate.btag_min <= candidate.btag_max);
                assert!(candidate.proxy.is_some());
                if candidate.n_tagged >= 4 || candidate.n_untagged > 0 {
                    assert!(candidate.dm_bb_bb_min.is_finite());
                }
            }
            assert!(candidates.windows(2).all(|w| w[0].event < w[1].event));
        }
    }
}
