//! H → WW → eμνν: event selection and histogramming
//!
//!
//! # Introduction (for the physicist)
//!
//! This analysis looks for Higgs bosons decaying into a pair of W bosons,
//! each of which decays leptonically, in the final state with exactly one
//! electron and one muon of opposite charge.
//!
//! Events are first preselected on lepton identification, then on global
//! kinematic cuts (missing transverse energy, dilepton transverse momentum and
//! mass) and a b-jet veto. They are then split by jet multiplicity and
//! classified into a signal region and two control regions, which constrain
//! the top quark pair and Z → ττ backgrounds.
//!
//! Simulated events are normalized to the integrated luminosity of the data,
//! and corrected by trigger and lepton identification scale factors, whose
//! uncertainties are propagated as systematic weight variations.
//!
//!
//! # Introduction (for the computer guy)
//!
//! The analysis is organized as a pipeline:
//!
//! * read the configuration and build an immutable analysis context
//! * list the input files of each sample
//! * process each file independently, in batches of events
//!     * select leptons and jets, compute event kinematics
//!     * classify events into cutflow stages and regions
//!     * fill cutflow counters and histograms for each weight variation
//! * merge the per-file results into per-sample totals
//! * then display / store the result.
//!
//! File processing never panics: failures are retried when they look
//! transient, and reported alongside the results otherwise.

#![warn(missing_docs)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod evcut;
pub mod event;
pub mod histogram;
pub mod kinematics;
pub mod lumi;
pub mod momentum;
pub mod numeric;
pub mod output;
pub mod resacc;
pub mod resfin;
pub mod scheduling;
pub mod selection;
pub mod source;
pub mod stage;
pub mod weights;
pub mod worker;

pub use crate::error::{Error, Result};
