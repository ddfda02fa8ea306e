//! High-level kinematic variables of selected events

#![allow(missing_docs)]

use crate::{
    event::Jet,
    momentum::{self, Momentum},
    numeric::{functions::wrap_angle, Float},
    selection::LeptonPair,
};
use num_traits::Zero;
use prefix_num_ops::real::*;

/// Missing transverse energy of an event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MissingEt {
    pub pt: Float,
    pub phi: Float,
}

/// Kinematic discriminants derived from the e-μ pair and missing energy
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DileptonKinematics {
    /// Dilepton invariant mass
    pub mll: Float,

    /// Dilepton transverse momentum
    pub ptll: Float,

    /// Azimuthal separation of the two leptons, in (-π, π]
    pub dphi_ll: Float,

    /// Transverse mass of the dilepton + missing energy system
    pub mt_higgs: Float,

    /// Transverse mass of the subleading lepton + missing energy system
    pub mt_l2_met: Float,
}
//
impl DileptonKinematics {
    /// Compute the discriminants of one event
    pub fn new(pair: &LeptonPair, met: MissingEt) -> Self {
        let dilepton = pair.leading.momentum() + pair.subleading.momentum();
        let mll = momentum::mass(&dilepton);
        let ptll = momentum::pt(&dilepton);
        let dphi_ll = wrap_angle(pair.leading.phi - pair.subleading.phi);

        // Transverse energy of the dilepton system
        let et_ll = sqrt(ptll.powi(2) + mll.powi(2));
        let dphi_ll_met = wrap_angle(momentum::phi(&dilepton) - met.phi);
        let mt2_higgs = mll.powi(2) + 2. * (et_ll * met.pt - ptll * met.pt * cos(dphi_ll_met));
        let mt_higgs = sqrt(mt2_higgs.max(0.));

        let sub = &pair.subleading;
        let dphi_l2_met = wrap_angle(sub.phi - met.phi);
        let mt_l2_met = sqrt((2. * sub.pt * met.pt * (1. - cos(dphi_l2_met))).max(0.));

        Self {
            mll,
            ptll,
            dphi_ll,
            mt_higgs,
            mt_l2_met,
        }
    }
}

/// Invariant mass of the two leading jets
///
/// `sorted_jets` must be sorted by decreasing pT. Events with fewer than two
/// jets get a dijet mass of exactly zero.
pub fn dijet_mass(sorted_jets: &[Jet]) -> Float {
    match sorted_jets {
        [j1, j2, ..] => {
            let dijet = [j1, j2].iter().fold(Momentum::zero(), |acc, jet| {
                acc + momentum::from_pt_eta_phi_m(jet.pt, jet.eta, jet.phi, jet.mass)
            });
            momentum::mass(&dijet)
        }
        _ => 0.,
    }
}
