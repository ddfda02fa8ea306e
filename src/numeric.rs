//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as reals;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as reals;

/// Mathematical functions
pub mod functions {
    use super::{reals::consts::PI, Float};

    /// Wrap an angle difference into the (-π, π] interval
    ///
    /// This is the usual `(Δ + π) mod 2π - π` construction, with an Euclidean
    /// modulo so that negative inputs behave like positive ones. The only
    /// point where it would land on -π is folded back onto +π, which keeps
    /// the result in a half-open interval of width exactly 2π.
    ///
    pub fn wrap_angle(delta: Float) -> Float {
        let wrapped = (delta + PI).rem_euclid(2. * PI) - PI;
        if wrapped <= -PI {
            PI
        } else {
            wrapped
        }
    }
}
