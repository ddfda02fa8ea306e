//! This module implements some domain-specific 4-momentum handling logic.
//!
//! Only the handful of operations needed by the analysis are provided:
//! construction from collider coordinates, and the invariant mass, transverse
//! momentum and azimuth of (sums of) 4-momenta.

use crate::numeric::Float;
use nalgebra::SVector;
use prefix_num_ops::real::*;

/// 4-momentum dimension
pub const MOMENTUM_DIM: usize = 4;

/// Relativistic 4-momentum
pub type Momentum = SVector<Float, MOMENTUM_DIM>;

/// Convenience const for accessing the X coordinate of a 4-vector
pub const X: usize = 0;

/// Convenience const for accessing the Y coordinate of a 4-vector
pub const Y: usize = 1;

/// Convenience const for accessing the Z coordinate of a 4-vector
pub const Z: usize = 2;

/// Convenience const for accessing the E coordinate of a 4-vector
pub const E: usize = 3;

/// Build a 4-momentum from transverse momentum, pseudorapidity, azimuth and
/// mass, which is how detector objects are described.
pub fn from_pt_eta_phi_m(pt: Float, eta: Float, phi: Float, mass: Float) -> Momentum {
    let px = pt * cos(phi);
    let py = pt * sin(phi);
    let pz = pt * sinh(eta);
    let p2 = pt.powi(2) * cosh(eta).powi(2);
    let e = sqrt(p2 + mass.powi(2));
    Momentum::new(px, py, pz, e)
}

/// Transverse momentum of a 4-momentum
pub fn pt(p: &Momentum) -> Float {
    sqrt(p[X].powi(2) + p[Y].powi(2))
}

/// Azimuthal angle of a 4-momentum, in (-π, π]
pub fn phi(p: &Momentum) -> Float {
    p[Y].atan2(p[X])
}

/// Invariant mass of a 4-momentum
///
/// Rounding can make the squared mass of (nearly) massless systems slightly
/// negative. Those are reported as zero mass rather than NaN.
///
pub fn mass(p: &Momentum) -> Float {
    let m2 = p[E].powi(2) - p[X].powi(2) - p[Y].powi(2) - p[Z].powi(2);
    if m2 > 0. {
        sqrt(m2)
    } else {
        0.
    }
}
