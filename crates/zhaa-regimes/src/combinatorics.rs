use zhaa_core::{
    traits::Momentum,
    utils::{index_combinations, index_pairs, vectors::delta_r},
    Jet, Vec4,
};

/// The three ways of splitting four objects into two pairs.
const PAIRINGS: [[(usize, usize); 2]; 3] = [[(0, 1), (2, 3)], [(0, 2), (1, 3)], [(0, 3), (1, 2)]];

/// A split of four objects into two pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pairing {
    /// Positions (within the four objects) of the members of each pair.
    pub pairs: [(usize, usize); 2],
    /// $`|m(\text{pair}_1) - m(\text{pair}_2)|`$.
    pub mass_difference: f64,
    /// Mean of the two intra-pair $`\Delta R`$ values.
    pub mean_delta_r: f64,
}

/// The pairing of four four-momenta whose pair masses are closest. Ties keep the first pairing in
/// the order `(01)(23)`, `(02)(13)`, `(03)(12)`.
pub fn best_pairing(p4s: &[Vec4; 4]) -> Pairing {
    let candidates = PAIRINGS.map(|pairs| {
        let [(a, b), (c, d)] = pairs;
        let m1 = (p4s[a] + p4s[b]).m();
        let m2 = (p4s[c] + p4s[d]).m();
        Pairing {
            pairs,
            mass_difference: (m1 - m2).abs(),
            mean_delta_r: 0.5 * (delta_r(&p4s[a], &p4s[b]) + delta_r(&p4s[c], &p4s[d])),
        }
    });
    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.mass_difference < best.mass_difference {
            best = *candidate;
        }
    }
    best
}

/// Among all four-element subsets of `p4s`, the one whose best pairing has the smallest mass
/// difference, with that pairing. Returns [`None`] with fewer than four inputs.
pub fn best_quadruplet(p4s: &[Vec4]) -> Option<([usize; 4], Pairing)> {
    index_combinations(p4s.len(), 4)
        .into_iter()
        .map(|combination| {
            let indices = [combination[0], combination[1], combination[2], combination[3]];
            let pairing = best_pairing(&indices.map(|i| p4s[i]));
            (indices, pairing)
        })
        .fold(None, |best: Option<([usize; 4], Pairing)>, current| match best {
            Some(b) if b.1.mass_difference <= current.1.mass_difference => Some(b),
            _ => Some(current),
        })
}

/// Mean $`\Delta R`$ over all pairs of objects, or NaN with fewer than two.
pub fn mean_pairwise_delta_r<M: Momentum>(objects: &[M]) -> f64 {
    let n_pairs = objects.len() * objects.len().saturating_sub(1) / 2;
    if n_pairs == 0 {
        return f64::NAN;
    }
    let total: f64 = index_pairs(objects.len())
        .map(|(i, j)| delta_r(&objects[i], &objects[j]))
        .sum();
    total / n_pairs as f64
}

/// The designated "extra" jet of an event: the leading untagged jet if there is one, otherwise the
/// tagged jet with the lowest tag score. Only [`None`] when both collections are empty.
///
/// `untagged` must already be sorted by descending momentum.
pub fn proxy_jet<F>(tagged: &[Jet], untagged: &[Jet], score: F) -> Option<Jet>
where
    F: Fn(&Jet) -> f64,
{
    untagged.first().copied().or_else(|| {
        tagged
            .iter()
            .copied()
            .reduce(|lowest, jet| if score(&jet) < score(&lowest) { jet } else { lowest })
    })
}

/// Invariant mass of the two leading tagged jets plus the highest-regressed-momentum jet of
/// `jets` which is neither of them. NaN when fewer than two tagged jets or no third jet exists.
pub fn m_bbj(tagged: &[Jet], jets: &[Jet]) -> f64 {
    let [first, second, ..] = tagged else {
        return f64::NAN;
    };
    let third = jets
        .iter()
        .filter(|j| j.index != first.index && j.index != second.index)
        .max_by(|a, b| a.pt_regressed.total_cmp(&b.pt_regressed));
    match third {
        Some(third) => (first.p4_regressed() + second.p4_regressed() + third.p4_regressed()).m(),
        None => f64::NAN,
    }
}
