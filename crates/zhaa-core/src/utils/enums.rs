use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ZhaaError;

/// The two reconstruction hypotheses an event can be classified into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    /// The candidate decays into two collimated $`b\bar{b}`$ pairs, each captured inside a single
    /// jet with two secondary vertices.
    Boosted,
    /// The candidate decays into well-separated $`b`$-jets which are reconstructed individually.
    Resolved,
}

impl Regime {
    /// Both regimes, in the order they are processed.
    pub const ALL: [Regime; 2] = [Regime::Boosted, Regime::Resolved];

    /// The suffix appended to histogram names belonging to this regime.
    pub fn suffix(&self) -> &'static str {
        match self {
            Regime::Boosted => "_boosted",
            Regime::Resolved => "_resolved",
        }
    }
}

impl Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Boosted => write!(f, "boosted"),
            Regime::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for Regime {
    type Err = ZhaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boosted" | "boost" | "merged" => Ok(Self::Boosted),
            "resolved" | "res" => Ok(Self::Resolved),
            _ => Err(ZhaaError::ParseError {
                name: s.to_string(),
                object: "Regime".to_string(),
            }),
        }
    }
}

/// Heavy-flavour content of a $`t\bar{t}`$ sample, derived from the generator-level
/// `genTtbarId` categorisation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TtbarFlavor {
    /// No additional heavy-flavour jets (`id % 100 == 0`).
    Light,
    /// Additional $`c`$-jets (`41 <= id % 100 <= 45`).
    Charm,
    /// Additional $`b`$-jets (`51 <= id % 100 <= 55`).
    Bottom,
}

impl TtbarFlavor {
    /// All flavours, in the order their outputs are produced.
    pub const ALL: [TtbarFlavor; 3] = [TtbarFlavor::Light, TtbarFlavor::Charm, TtbarFlavor::Bottom];

    /// Categorise an event by its generator-level `genTtbarId`. Events in none of the three
    /// categories (for instance, additional jets from hadron decays) yield [`None`].
    pub fn from_gen_ttbar_id(id: i32) -> Option<Self> {
        match id.rem_euclid(100) {
            0 => Some(Self::Light),
            41..=45 => Some(Self::Charm),
            51..=55 => Some(Self::Bottom),
            _ => None,
        }
    }
}

impl Display for TtbarFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtbarFlavor::Light => write!(f, "ttLF"),
            TtbarFlavor::Charm => write!(f, "ttCC"),
            TtbarFlavor::Bottom => write!(f, "ttBB"),
        }
    }
}

impl FromStr for TtbarFlavor {
    type Err = ZhaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ttlf" | "lf" | "light" => Ok(Self::Light),
            "ttcc" | "cc" | "charm" => Ok(Self::Charm),
            "ttbb" | "bb" | "bottom" => Ok(Self::Bottom),
            _ => Err(ZhaaError::ParseError {
                name: s.to_string(),
                object: "TtbarFlavor".to_string(),
            }),
        }
    }
}
