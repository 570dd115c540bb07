#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{
    utils::vectors::{Momentum, Vec4},
    ZhaaError, ZhaaResult,
};

/// Variable-length per-event storage.
pub mod jagged;
/// Per-event boolean selections.
pub mod mask;

pub use jagged::Jagged;
pub use mask::Mask;

/// Evaluate `op` once per event index and collect the results in event order.
///
/// With the `rayon` feature enabled the events are processed in parallel; the output order is the
/// same either way.
pub fn per_event<U, F>(n_events: usize, op: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Send + Sync,
{
    #[cfg(feature = "rayon")]
    return (0..n_events).into_par_iter().map(op).collect();
    #[cfg(not(feature = "rayon"))]
    return (0..n_events).map(op).collect();
}

macro_rules! impl_momentum {
    ($($ty:ty),*) => {
        $(
            impl Momentum for $ty {
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
        )*
    };
}

/// A reconstructed muon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Muon {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// Passes the tight identification working point.
    pub tight_id: bool,
    /// Relative particle-flow isolation in a cone of $`\Delta R = 0.3`$.
    pub pf_rel_iso: f64,
}

/// A reconstructed electron.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Electron {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// Cut-based identification level (0 = fail, 4 = tight).
    pub cut_based: i32,
    /// Relative particle-flow isolation in a cone of $`\Delta R = 0.3`$.
    pub pf_rel_iso: f64,
}

/// A reconstructed jet.
///
/// Every jet is a single-candidate jet; jets with two distinct associated secondary vertices are
/// additionally paired-candidate jets (one jet containing both $`b`$-quarks of a light
/// pseudoscalar decay).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// Transverse momentum after the $`b`$-jet energy regression.
    pub pt_regressed: f64,
    /// Tag score for the single-$`b`$ hypothesis.
    pub btag_b: f64,
    /// Tag score for the double-$`b`$ hypothesis.
    pub btag_bb: f64,
    /// Index of the first associated secondary vertex, negative if absent.
    pub sv_idx1: i32,
    /// Index of the second associated secondary vertex, negative if absent.
    pub sv_idx2: i32,
    /// Passes the tight jet identification.
    pub tight_id: bool,
    /// Passes the tight jet identification with lepton veto.
    pub tight_lep_veto: bool,
    /// Position of this jet in its event's jet collection, assigned by
    /// [`EventBatchBuilder::build`]. Derived jet subsets use it to recognise the same jet.
    pub index: usize,
}

impl Jet {
    /// The four-momentum built from the regressed transverse momentum.
    pub fn p4_regressed(&self) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt_regressed, self.eta, self.phi, self.mass)
    }

    /// Whether both secondary-vertex indices are present and distinct.
    pub fn has_distinct_vertices(&self) -> bool {
        self.sv_idx1 >= 0 && self.sv_idx2 >= 0 && self.sv_idx1 != self.sv_idx2
    }
}

/// The missing-transverse-momentum summary of an event. Treated as a massless object in the
/// transverse plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Met {
    pub pt: f64,
    pub phi: f64,
}

impl_momentum!(Muon, Electron, Jet);

impl Momentum for Met {
    fn pt(&self) -> f64 {
        self.pt
    }
    fn eta(&self) -> f64 {
        0.0
    }
    fn phi(&self) -> f64 {
        self.phi
    }
    fn mass(&self) -> f64 {
        0.0
    }
}

/// A batch of events in columnar form.
///
/// The batch is read-only once built. Every event owns exactly one [`Met`] and zero or more
/// muons, electrons and jets; the number of events is defined by the missing-energy column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBatch {
    muons: Jagged<Muon>,
    electrons: Jagged<Electron>,
    jets: Jagged<Jet>,
    met: Vec<Met>,
    gen_ttbar_id: Option<Vec<i32>>,
}

impl EventBatch {
    /// Start building a batch. All of muons, electrons, jets and missing energy are required.
    pub fn builder() -> EventBatchBuilder {
        EventBatchBuilder::default()
    }

    /// Number of events in the batch.
    pub fn n_events(&self) -> usize {
        self.met.len()
    }

    /// Whether the batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.met.is_empty()
    }

    pub fn muons(&self) -> &Jagged<Muon> {
        &self.muons
    }

    pub fn electrons(&self) -> &Jagged<Electron> {
        &self.electrons
    }

    pub fn jets(&self) -> &Jagged<Jet> {
        &self.jets
    }

    pub fn met(&self) -> &[Met] {
        &self.met
    }

    /// The generator-level $`t\bar{t}`$ categorisation, if the batch carries it.
    pub fn gen_ttbar_id(&self) -> Option<&[i32]> {
        self.gen_ttbar_id.as_deref()
    }

    /// A new batch holding only the events selected by `mask`.
    pub fn select_events(&self, mask: &Mask) -> ZhaaResult<EventBatch> {
        if mask.len() != self.n_events() {
            return Err(ZhaaError::LengthMismatch {
                context: "event selection mask".to_string(),
                expected: self.n_events(),
                actual: mask.len(),
            });
        }
        Ok(EventBatch {
            muons: self.muons.select_events(mask),
            electrons: self.electrons.select_events(mask),
            jets: self.jets.select_events(mask),
            met: mask.select(&self.met),
            gen_ttbar_id: self.gen_ttbar_id.as_ref().map(|ids| mask.select(ids)),
        })
    }
}

/// Assembles an [`EventBatch`] from its collections, validating their shapes.
#[derive(Debug, Clone, Default)]
pub struct EventBatchBuilder {
    muons: Option<Jagged<Muon>>,
    electrons: Option<Jagged<Electron>>,
    jets: Option<Jagged<Jet>>,
    met: Option<Vec<Met>>,
    gen_ttbar_id: Option<Vec<i32>>,
}

impl EventBatchBuilder {
    pub fn muons(mut self, muons: Jagged<Muon>) -> Self {
        self.muons = Some(muons);
        self
    }

    pub fn electrons(mut self, electrons: Jagged<Electron>) -> Self {
        self.electrons = Some(electrons);
        self
    }

    pub fn jets(mut self, jets: Jagged<Jet>) -> Self {
        self.jets = Some(jets);
        self
    }

    pub fn met(mut self, met: Vec<Met>) -> Self {
        self.met = Some(met);
        self
    }

    /// Attach the optional generator-level $`t\bar{t}`$ categorisation column.
    pub fn gen_ttbar_id(mut self, gen_ttbar_id: Vec<i32>) -> Self {
        self.gen_ttbar_id = Some(gen_ttbar_id);
        self
    }

    /// Validate the collections and build the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ZhaaError::MissingCollection`] if a required collection was never provided and
    /// [`ZhaaError::LengthMismatch`] if a collection does not cover exactly one entry per event.
    pub fn build(self) -> ZhaaResult<EventBatch> {
        let met = self.met.ok_or_else(|| missing("MET"))?;
        let muons = self.muons.ok_or_else(|| missing("Muon"))?;
        let electrons = self.electrons.ok_or_else(|| missing("Electron"))?;
        let jets = self.jets.ok_or_else(|| missing("Jet"))?;
        let n_events = met.len();
        check_len("Muon collection", n_events, muons.n_events())?;
        check_len("Electron collection", n_events, electrons.n_events())?;
        check_len("Jet collection", n_events, jets.n_events())?;
        if let Some(ids) = &self.gen_ttbar_id {
            check_len("genTtbarId column", n_events, ids.len())?;
        }
        let jets = jets.map_events(|_, event| {
            event
                .iter()
                .enumerate()
                .map(|(index, jet)| Jet { index, ..*jet })
                .collect()
        });
        Ok(EventBatch {
            muons,
            electrons,
            jets,
            met,
            gen_ttbar_id: self.gen_ttbar_id,
        })
    }
}

fn missing(collection: &str) -> ZhaaError {
    ZhaaError::MissingCollection {
        collection: collection.to_string(),
    }
}

fn check_len(context: &str, expected: usize, actual: usize) -> ZhaaResult<()> {
    if expected != actual {
        return Err(ZhaaError::LengthMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// A batch that can be used to test the boosted selection. It contains a single event with no
/// leptons, $`p_T^{miss} = 200`$, two double-$`b`$-tagged paired-candidate jets (tag scores 0.9 and
/// 0.6) at $`|\Delta\phi| = 1`$ from the missing momentum, and one single-$`b`$-tagged jet without
/// secondary vertices.
pub fn test_batch() -> EventBatch {
    let jets = vec![
        Jet {
            pt: 120.0,
            eta: 0.0,
            phi: 1.0,
            mass: 25.0,
            pt_regressed: 130.0,
            btag_b: 0.2,
            btag_bb: 0.9,
            sv_idx1: 0,
            sv_idx2: 1,
            tight_id: true,
            tight_lep_veto: true,
            index: 0,
        },
        Jet {
            pt: 90.0,
            eta: 0.8,
            phi: -1.0,
            mass: 20.0,
            pt_regressed: 95.0,
            btag_b: 0.3,
            btag_bb: 0.6,
            sv_idx1: 2,
            sv_idx2: 3,
            tight_id: true,
            tight_lep_veto: true,
            index: 0,
        },
        Jet {
            pt: 60.0,
            eta: -1.2,
            phi: 2.5,
            mass: 10.0,
            pt_regressed: 64.0,
            btag_b: 0.9,
            btag_bb: 0.1,
            sv_idx1: -1,
            sv_idx2: -1,
            tight_id: true,
            tight_lep_veto: true,
            index: 0,
        },
    ];
    EventBatch::builder()
        .muons(Jagged::from_nested(vec![Vec::<Muon>::new()]))
        .electrons(Jagged::from_nested(vec![Vec::<Electron>::new()]))
        .jets(Jagged::from_nested(vec![jets]))
        .met(vec![Met { pt: 200.0, phi: 0.0 }])
        .build()
        .expect("Test batch should be valid")
}

/// A reproducible batch of `n_events` pseudo-random events with a realistic mix of leptons,
/// single and paired jets, and generator-level $`t\bar{t}`$ categories.
pub fn random_batch(n_events: usize, seed: u64) -> EventBatch {
    const TTBAR_IDS: [i32; 6] = [0, 1100, 43, 1145, 53, 2055];
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut muons = Vec::with_capacity(n_events);
    let mut electrons = Vec::with_capacity(n_events);
    let mut jets = Vec::with_capacity(n_events);
    let mut met = Vec::with_capacity(n_events);
    let mut gen_ttbar_id = Vec::with_capacity(n_events);
    for _ in 0..n_events {
        let n_muons = if rng.f64() < 0.8 { 0 } else { rng.usize(1..3) };
        muons.push(
            (0..n_muons)
                .map(|_| Muon {
                    pt: 5.0 + rng.f64() * 60.0,
                    eta: (rng.f64() - 0.5) * 6.0,
                    phi: (rng.f64() - 0.5) * 2.0 * PI,
                    mass: 0.105,
                    tight_id: rng.bool(),
                    pf_rel_iso: rng.f64() * 0.3,
                })
                .collect::<Vec<_>>(),
        );
        let n_electrons = if rng.f64() < 0.8 { 0 } else { rng.usize(1..3) };
        electrons.push(
            (0..n_electrons)
                .map(|_| Electron {
                    pt: 5.0 + rng.f64() * 60.0,
                    eta: (rng.f64() - 0.5) * 6.0,
                    phi: (rng.f64() - 0.5) * 2.0 * PI,
                    mass: 0.000511,
                    cut_based: rng.i32(0..5),
                    pf_rel_iso: rng.f64() * 0.3,
                })
                .collect::<Vec<_>>(),
        );
        let n_jets = rng.usize(0..11);
        jets.push(
            (0..n_jets)
                .map(|_| {
                    let pt = 15.0 + rng.f64() * 300.0;
                    let paired = rng.f64() < 0.4;
                    Jet {
                        pt,
                        eta: (rng.f64() - 0.5) * 6.0,
                        phi: (rng.f64() - 0.5) * 2.0 * PI,
                        mass: rng.f64() * 40.0,
                        pt_regressed: pt * (0.9 + rng.f64() * 0.2),
                        btag_b: rng.f64(),
                        btag_bb: rng.f64(),
                        sv_idx1: if paired { rng.i32(0..4) } else { -1 },
                        sv_idx2: if paired { rng.i32(0..4) } else { -1 },
                        tight_id: rng.f64() < 0.95,
                        tight_lep_veto: rng.f64() < 0.95,
                        index: 0,
                    }
                })
                .collect::<Vec<_>>(),
        );
        met.push(Met {
            pt: 100.0 + rng.f64() * 300.0,
            phi: (rng.f64() - 0.5) * 2.0 * PI,
        });
        gen_ttbar_id.push(TTBAR_IDS[rng.usize(0..TTBAR_IDS.len())]);
    }
    EventBatch::builder()
        .muons(Jagged::from_nested(muons))
        .electrons(Jagged::from_nested(electrons))
        .jets(Jagged::from_nested(jets))
        .met(met)
        .gen_ttbar_id(gen_ttbar_id)
        .build()
        .expect("Random batch should be valid")
}
