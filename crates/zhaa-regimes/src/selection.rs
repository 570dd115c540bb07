use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use zhaa_core::{
    traits::Momentum, utils::vectors::delta_r, Electron, EventBatch, Jagged, Jet, Muon, Regime,
    SelectionCuts,
};

/// The flavour of a selected [`Lepton`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeptonFlavor {
    Muon,
    Electron,
}

/// A selected muon or electron.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lepton {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub flavor: LeptonFlavor,
}

impl Momentum for Lepton {
    fn pt(&self) -> f64 {
        self.pt
    }
    fn eta(&self) -> f64 {
        self.eta
    }
    fn phi(&self) -> f64 {
        self.phi
    }
    fn mass(&self) -> f64 {
        self.mass
    }
}

impl From<&Muon> for Lepton {
    fn from(muon: &Muon) -> Self {
        Self {
            pt: muon.pt,
            eta: muon.eta,
            phi: muon.phi,
            mass: muon.mass,
            flavor: LeptonFlavor::Muon,
        }
    }
}

impl From<&Electron> for Lepton {
    fn from(electron: &Electron) -> Self {
        Self {
            pt: electron.pt,
            eta: electron.eta,
            phi: electron.phi,
            mass: electron.mass,
            flavor: LeptonFlavor::Electron,
        }
    }
}

/// The tag score a jet is ranked by under a regime's reconstruction hypothesis: the single-$`b`$
/// score for resolved jets and the double-$`b`$ score for boosted (paired) jets.
pub fn tag_score(regime: Regime, jet: &Jet) -> f64 {
    match regime {
        Regime::Boosted => jet.btag_bb,
        Regime::Resolved => jet.btag_b,
    }
}

/// Comparator sorting jets by descending tag score under `regime`.
pub fn by_tag_score_desc(regime: Regime) -> impl Fn(&Jet, &Jet) -> Ordering + Send + Sync {
    move |a, b| tag_score(regime, b).total_cmp(&tag_score(regime, a))
}

/// Comparator sorting jets by descending regressed transverse momentum.
pub fn by_regressed_pt_desc(a: &Jet, b: &Jet) -> Ordering {
    b.pt_regressed.total_cmp(&a.pt_regressed)
}

/// Comparator sorting jets by descending raw transverse momentum.
pub fn by_pt_desc(a: &Jet, b: &Jet) -> Ordering {
    b.pt.total_cmp(&a.pt)
}

/// The order of untagged jets in a regime: raw momentum for single jets, regressed momentum for
/// paired jets.
pub fn untagged_order(regime: Regime) -> fn(&Jet, &Jet) -> Ordering {
    match regime {
        Regime::Boosted => by_regressed_pt_desc,
        Regime::Resolved => by_pt_desc,
    }
}

/// Muons passing the momentum, acceptance, identification and isolation requirements.
pub fn select_muons(muons: &Jagged<Muon>, cuts: &SelectionCuts) -> Jagged<Muon> {
    muons.filter(|m| {
        m.pt > cuts.muon_pt_min
            && m.eta.abs() < cuts.muon_abs_eta_max
            && m.tight_id
            && m.pf_rel_iso < cuts.muon_iso_max
    })
}

/// Electrons passing the momentum, acceptance, identification and isolation requirements.
pub fn select_electrons(electrons: &Jagged<Electron>, cuts: &SelectionCuts) -> Jagged<Electron> {
    electrons.filter(|e| {
        e.pt > cuts.electron_pt_min
            && e.eta.abs() < cuts.electron_abs_eta_max
            && e.cut_based >= cuts.electron_cut_based_min
            && e.pf_rel_iso < cuts.electron_iso_max
    })
}

/// Selected muons and electrons merged per event and sorted by descending transverse momentum.
pub fn select_leptons(batch: &EventBatch, cuts: &SelectionCuts) -> Jagged<Lepton> {
    let muons = select_muons(batch.muons(), cuts);
    let electrons = select_electrons(batch.electrons(), cuts);
    muons
        .map_events(|i, event| {
            let mut leptons: Vec<Lepton> = event
                .iter()
                .map(Lepton::from)
                .chain(electrons.event(i).iter().map(Lepton::from))
                .collect();
            leptons.sort_by(|a, b| b.pt.total_cmp(&a.pt));
            leptons
        })
}

/// Jets passing the regressed-momentum, acceptance and identification requirements.
pub fn select_jets(jets: &Jagged<Jet>, cuts: &SelectionCuts) -> Jagged<Jet> {
    jets.filter(|j| {
        j.pt_regressed > cuts.jet_pt_min
            && j.eta.abs() < cuts.jet_abs_eta_max
            && j.tight_id
            && j.tight_lep_veto
    })
}

/// Remove every object lying within `min_dr` of any reference object in the same event, except
/// references for which `is_same` reports the same underlying object.
///
/// The distance is [`delta_r`], which is symmetric in its arguments. Cleaning is idempotent: the
/// survivors are already farther than `min_dr` from every reference.
pub fn clean_by_dr_excluding<T, R, F>(
    objects: &Jagged<T>,
    reference: &Jagged<R>,
    min_dr: f64,
    is_same: F,
) -> Jagged<T>
where
    T: Momentum + Clone + Send + Sync,
    R: Momentum + Sync,
    F: Fn(&T, &R) -> bool + Send + Sync,
{
    debug_assert_eq!(objects.n_events(), reference.n_events());
    objects.map_events(|i, event| {
        let refs = reference.event(i);
        event
            .iter()
            .filter(|object| {
                refs.iter()
                    .filter(|r| !is_same(object, r))
                    .all(|r| delta_r(*object, r) >= min_dr)
            })
            .cloned()
            .collect()
    })
}

/// Remove every object lying within `min_dr` of any reference object in the same event.
pub fn clean_by_dr<T, R>(objects: &Jagged<T>, reference: &Jagged<R>, min_dr: f64) -> Jagged<T>
where
    T: Momentum + Clone + Send + Sync,
    R: Momentum + Sync,
{
    clean_by_dr_excluding(objects, reference, min_dr, |_, _| false)
}

/// Remove every jet lying within `min_dr` of a *different* reference jet. A jet is never removed
/// relative to itself.
pub fn clean_jets_by_dr(jets: &Jagged<Jet>, reference: &Jagged<Jet>, min_dr: f64) -> Jagged<Jet> {
    clean_by_dr_excluding(jets, reference, min_dr, |a, b| a.index == b.index)
}

/// A jet collection split into tagged jets (sorted by descending tag score) and untagged jets
/// (sorted by [`untagged_order`]).
#[derive(Debug, Clone, Default)]
pub struct TagPartition {
    pub tagged: Jagged<Jet>,
    pub untagged: Jagged<Jet>,
}

impl TagPartition {
    /// Partition `jets` at `threshold` on the regime's tag score. A jet is tagged when its score is
    /// strictly above the threshold; every other jet is untagged, so the two parts always add up to
    /// the input.
    pub fn new(jets: &Jagged<Jet>, regime: Regime, threshold: f64) -> Self {
        let (tagged, untagged) = jets.partition(|j| tag_score(regime, j) > threshold);
        Self {
            tagged: tagged.sorted_by(by_tag_score_desc(regime)),
            untagged: untagged.sorted_by(untagged_order(regime)),
        }
    }

    /// Number of tagged jets in each event.
    pub fn n_tagged(&self) -> Vec<usize> {
        self.tagged.counts()
    }
}

/// All object subsets derived from one batch.
///
/// - `leptons`: selected muons and electrons, sorted by momentum.
/// - `selected_jets`: selected jets cleaned against leptons.
/// - `paired_jets`: selected jets with two distinct secondary vertices, cleaned against the other
///   selected jets, sorted by double-$`b`$ score.
/// - `single_jets`: selected jets farther than the paired cleaning distance from every paired jet,
///   sorted by single-$`b`$ score. No jet is both a single and a paired jet.
#[derive(Debug, Clone, Default)]
pub struct ObjectSelection {
    pub leptons: Jagged<Lepton>,
    pub selected_jets: Jagged<Jet>,
    pub single_jets: Jagged<Jet>,
    pub paired_jets: Jagged<Jet>,
    pub single: TagPartition,
    pub paired: TagPartition,
}

impl ObjectSelection {
    /// Run the full object selection over a batch.
    pub fn new(batch: &EventBatch, cuts: &SelectionCuts) -> Self {
        let leptons = select_leptons(batch, cuts);
        let jets = clean_by_dr(
            &select_jets(batch.jets(), cuts),
            &leptons,
            cuts.lepton_cleaning_dr,
        );
        let paired_jets = clean_jets_by_dr(
            &jets.filter(Jet::has_distinct_vertices),
            &jets,
            cuts.paired_cleaning_dr,
        )
        .sorted_by(by_tag_score_desc(Regime::Boosted));
        // a paired jet sits at zero distance from itself, so it never survives as a single jet
        let single_jets = clean_by_dr(&jets, &paired_jets, cuts.paired_cleaning_dr)
            .sorted_by(by_tag_score_desc(Regime::Resolved));
        let single = TagPartition::new(&single_jets, Regime::Resolved, cuts.single_tag_threshold);
        let paired = TagPartition::new(&paired_jets, Regime::Boosted, cuts.paired_tag_threshold);
        Self {
            leptons,
            selected_jets: jets,
            single_jets,
            paired_jets,
            single,
            paired,
        }
    }

    /// The tag partition used by a regime.
    pub fn partition(&self, regime: Regime) -> &TagPartition {
        match regime {
            Regime::Boosted => &self.paired,
            Regime::Resolved => &self.single,
        }
    }

    /// The full candidate jet collection used by a regime.
    pub fn jets(&self, regime: Regime) -> &Jagged<Jet> {
        match regime {
            Regime::Boosted => &self.paired_jets,
            Regime::Resolved => &self.single_jets,
        }
    }
}
