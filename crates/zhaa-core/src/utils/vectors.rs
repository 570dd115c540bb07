use std::{
    f64::consts::{PI, TAU},
    fmt::Display,
    iter::Sum,
};

use auto_ops::impl_op_ex;
use serde::{Deserialize, Serialize};

/// Wrap an azimuthal difference `phi1 - phi2` into the interval $`(-\pi, \pi]`$.
///
/// This never fails: any finite input is mapped into range, and the result is antisymmetric under
/// exchange of the arguments everywhere except the $`\pm\pi`$ boundary itself.
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let wrapped = (phi1 - phi2).rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Signed pseudorapidity difference `eta1 - eta2`.
pub fn delta_eta(eta1: f64, eta2: f64) -> f64 {
    eta1 - eta2
}

/// Angular distance $`\Delta R = \sqrt{\Delta\eta^2 + \Delta\phi^2}`$ between two objects.
pub fn delta_r<A: Momentum + ?Sized, B: Momentum + ?Sized>(a: &A, b: &B) -> f64 {
    let deta = delta_eta(a.eta(), b.eta());
    let dphi = delta_phi(a.phi(), b.phi());
    (deta * deta + dphi * dphi).sqrt()
}

/// Anything that can be described by a transverse momentum, pseudorapidity, azimuth and mass.
///
/// Physics objects implement this so that the angular helpers in this module and the
/// reconstruction code can treat leptons, jets, missing energy and derived sums uniformly.
pub trait Momentum {
    /// Transverse momentum.
    fn pt(&self) -> f64;
    /// Pseudorapidity.
    fn eta(&self) -> f64;
    /// Azimuthal angle.
    fn phi(&self) -> f64;
    /// Invariant mass.
    fn mass(&self) -> f64;

    /// The Cartesian four-momentum of this object.
    fn p4(&self) -> Vec4 {
        Vec4::from_pt_eta_phi_m(self.pt(), self.eta(), self.phi(), self.mass())
    }

    /// Azimuthal separation to another object (see [`delta_phi`]).
    fn delta_phi_to<M: Momentum + ?Sized>(&self, other: &M) -> f64 {
        delta_phi(self.phi(), other.phi())
    }
}

/// A Cartesian four-momentum $`(p_x, p_y, p_z, E)`$.
///
/// Sums are taken component-wise and only converted back to $`(p_T, \eta, \phi, m)`$ on access,
/// which keeps the vector sum exact up to floating-point rounding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    /// The $`x`$-component of the momentum.
    pub px: f64,
    /// The $`y`$-component of the momentum.
    pub py: f64,
    /// The $`z`$-component of the momentum.
    pub pz: f64,
    /// The energy.
    pub e: f64,
}

impl Display for Vec4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[e = {:.5}; p = ({:.5}, {:.5}, {:.5}); m = {:.5}]",
            self.e,
            self.px,
            self.py,
            self.pz,
            self.m()
        )
    }
}

impl Vec4 {
    /// Create a new four-momentum from its Cartesian components.
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Create a four-momentum from collider coordinates.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let e = (px * px + py * py + pz * pz + mass * mass).sqrt();
        Self { px, py, pz, e }
    }

    /// Squared magnitude of the three-momentum.
    pub fn p2(&self) -> f64 {
        self.px * self.px + self.py * self.py + self.pz * self.pz
    }

    /// Squared invariant mass. This may come out slightly negative from floating-point
    /// cancellation; use [`Vec4::m`] for a value that is always physical.
    pub fn m2(&self) -> f64 {
        self.e * self.e - self.p2()
    }

    /// Invariant mass, with negative squared masses clamped to zero.
    pub fn m(&self) -> f64 {
        self.m2().max(0.0).sqrt()
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Pseudorapidity. A vector along the beam axis gives an infinite value with the sign of
    /// $`p_z`$, and the null vector gives zero.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 && self.pz == 0.0 {
            return 0.0;
        }
        (self.pz / pt).asinh()
    }

    /// Azimuthal angle in $`(-\pi, \pi]`$.
    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }

    fn add(&self, other: &Self) -> Self {
        Self {
            px: self.px + other.px,
            py: self.py + other.py,
            pz: self.pz + other.pz,
            e: self.e + other.e,
        }
    }

    fn sub(&self, other: &Self) -> Self {
        Self {
            px: self.px - other.px,
            py: self.py - other.py,
            pz: self.pz - other.pz,
            e: self.e - other.e,
        }
    }

    fn neg(&self) -> Self {
        Self {
            px: -self.px,
            py: -self.py,
            pz: -self.pz,
            e: -self.e,
        }
    }
}

impl Momentum for Vec4 {
    fn pt(&self) -> f64 {
        Vec4::pt(self)
    }
    fn eta(&self) -> f64 {
        Vec4::eta(self)
    }
    fn phi(&self) -> f64 {
        Vec4::phi(self)
    }
    fn mass(&self) -> f64 {
        self.m()
    }
    fn p4(&self) -> Vec4 {
        *self
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { a.add(b) });
impl_op_ex!(-|a: &Vec4, b: &Vec4| -> Vec4 { a.sub(b) });
impl_op_ex!(-|a: &Vec4| -> Vec4 { a.neg() });

impl Sum for Vec4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, p4| acc + p4)
    }
}

impl<'a> Sum<&'a Vec4> for Vec4 {
    fn sum<I: Iterator<Item = &'a Vec4>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, p4| acc + p4)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_delta_phi_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..10_000 {
            let a = (rng.f64() - 0.5) * 40.0;
            let b = (rng.f64() - 0.5) * 40.0;
            let d = delta_phi(a, b);
            assert!(d > -PI && d <= PI, "delta_phi({a}, {b}) = {d}");
        }
    }

    #[test]
    fn test_delta_phi_antisymmetric() {
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..10_000 {
            let a = (rng.f64() - 0.5) * 20.0;
            let b = (rng.f64() - 0.5) * 20.0;
            let d = delta_phi(a, b);
            if (d.abs() - PI).abs() < 1e-9 {
                continue;
            }
            assert_relative_eq!(d, -delta_phi(b, a), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_delta_phi_wraps() {
        assert_relative_eq!(delta_phi(3.0, -3.0), 6.0 - TAU, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(-3.0, 3.0), TAU - 6.0, epsilon = 1e-12);
        assert_relative_eq!(delta_phi(PI, 0.0), PI);
        assert_relative_eq!(delta_phi(-PI, 0.0), PI);
        assert_relative_eq!(delta_phi(0.25, 0.25), 0.0);
    }

    #[test]
    fn test_delta_r() {
        let a = Vec4::from_pt_eta_phi_m(50.0, 0.5, 0.1, 5.0);
        let b = Vec4::from_pt_eta_phi_m(30.0, -0.5, 0.1 + 2.0 * PI - 0.2, 0.0);
        assert_relative_eq!(delta_r(&a, &b), (1.0f64 + 0.04).sqrt(), epsilon = 1e-9);
        assert_relative_eq!(delta_r(&a, &b), delta_r(&b, &a), epsilon = 1e-12);
        assert_relative_eq!(delta_r(&a, &a), 0.0);
    }

    #[test]
    fn test_collider_coordinates_roundtrip() {
        let p4 = Vec4::from_pt_eta_phi_m(42.0, -1.3, 2.2, 12.5);
        assert_relative_eq!(p4.pt(), 42.0, epsilon = 1e-9);
        assert_relative_eq!(p4.eta(), -1.3, epsilon = 1e-9);
        assert_relative_eq!(p4.phi(), 2.2, epsilon = 1e-9);
        assert_relative_eq!(p4.m(), 12.5, epsilon = 1e-6);
    }

    #[test]
    fn test_vec_sums() {
        let a = Vec4::new(1.0, 2.0, 3.0, 10.0);
        let b = Vec4::new(4.0, 5.0, 6.0, 20.0);
        let c = a + b;
        assert_eq!(c, Vec4::new(5.0, 7.0, 9.0, 30.0));
        assert_eq!(c - b, a);
        assert_eq!(-a, Vec4::new(-1.0, -2.0, -3.0, -10.0));
        let total: Vec4 = [a, b, a].iter().sum();
        assert_eq!(total, Vec4::new(6.0, 9.0, 12.0, 40.0));
    }

    #[test]
    fn test_pair_mass() {
        let a = Vec4::from_pt_eta_phi_m(100.0, 0.0, 0.0, 0.0);
        let b = Vec4::from_pt_eta_phi_m(100.0, 0.0, PI, 0.0);
        assert_relative_eq!((a + b).m(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mass_is_clamped() {
        let p4 = Vec4::new(3.0, 4.0, 0.0, 5.0 - 1e-12);
        assert!(p4.m2() < 0.0);
        assert_eq!(p4.m(), 0.0);
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..1000 {
            let pt = 10.0 + rng.f64() * 500.0;
            let eta = (rng.f64() - 0.5) * 5.0;
            let phi = (rng.f64() - 0.5) * TAU;
            let a = Vec4::from_pt_eta_phi_m(pt, eta, phi, 0.0);
            let b = Vec4::from_pt_eta_phi_m(pt * (1.0 + 1e-15), eta, phi, 0.0);
            let m = (a + b).m();
            assert!(m >= 0.0 && m.is_finite());
        }
    }

    #[test]
    fn test_eta_on_beam_axis() {
        assert_eq!(Vec4::default().eta(), 0.0);
        assert!(Vec4::new(0.0, 0.0, 5.0, 5.0).eta().is_infinite());
    }
}
