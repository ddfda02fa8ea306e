//! Mechanism to sort selected events into analysis regions

use crate::{
    kinematics::DileptonKinematics,
    numeric::Float,
    selection::BTagCategories,
    stage::{JetBin, Region, RegionKind},
};
use serde::Deserialize;


/// Cuts defining the global selection and the signal/control regions
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventCut {
    /// Cut on minimum missing transverse energy
    pub met_min: Float,

    /// Cut on minimum dilepton transverse momentum
    pub ptll_min: Float,

    /// Cut on minimum dilepton invariant mass
    pub mll_min: Float,

    /// Boundary in Higgs transverse mass between signal and ττ regions
    pub mt_higgs_split: Float,

    /// Cut on minimum (subleading lepton, MET) transverse mass
    pub mt_l2_met_min: Float,

    /// Cut on minimum dilepton mass in top control regions
    pub top_mll_min: Float,

    /// Lower end of the dilepton mass window of ττ control regions
    pub tau_mll_min: Float,
    /// Upper end of the dilepton mass window of ττ control regions
    pub tau_mll_max: Float,

    /// Dijet mass windows accepted in the 2-jet bin: below `mjj_low_max`, or
    /// strictly inside (`mjj_mid_min`, `mjj_mid_max`)
    pub mjj_low_max: Float,
    /// Lower bound of the intermediate dijet mass window
    pub mjj_mid_min: Float,
    /// Upper bound of the intermediate dijet mass window
    pub mjj_mid_max: Float,
}
//
impl Default for EventCut {
    fn default() -> Self {
        Self {
            met_min: 20.,
            ptll_min: 30.,
            mll_min: 12.,
            mt_higgs_split: 60.,
            mt_l2_met_min: 30.,
            top_mll_min: 50.,
            tau_mll_min: 40.,
            tau_mll_max: 80.,
            mjj_low_max: 65.,
            mjj_mid_min: 105.,
            mjj_mid_max: 120.,
        }
    }
}
//
impl EventCut {
    /// Truth that a dijet mass lies inside the accepted 2-jet windows
    pub fn passes_mjj_window(&self, mjj: Float) -> bool {
        mjj < self.mjj_low_max || (mjj > self.mjj_mid_min && mjj < self.mjj_mid_max)
    }

    /// Decide which selections a preselected event belongs to
    pub fn classify(&self, event: &EventSummary) -> Regions {
        let kin = &event.kinematics;
        let btag = &event.btag;

        // Common ground of every selection
        let base = event.met_pt > self.met_min && kin.ptll > self.ptll_min && kin.mll > self.mll_min;
        let global = base && btag.passes_veto();

        // Only the 2-jet bin cares about the dijet mass
        let mjj_ok = event.jet_bin != JetBin::Two || self.passes_mjj_window(event.mjj);

        let mut regions = [false; Region::COUNT];
        let in_bin = base && mjj_ok;
        if in_bin {
            let pass_mt_l2 = kin.mt_l2_met > self.mt_l2_met_min;
            for kind in RegionKind::ALL {
                let pass = match kind {
                    RegionKind::Signal => {
                        kin.mt_higgs > self.mt_higgs_split && pass_mt_l2 && btag.passes_veto()
                    }
                    RegionKind::TopControl => {
                        let pass_btag = match event.jet_bin {
                            JetBin::Zero => btag.has_soft_btag(),
                            JetBin::One | JetBin::Two => btag.has_hard_btag(),
                        };
                        kin.mll > self.top_mll_min && pass_mt_l2 && pass_btag
                    }
                    RegionKind::TauControl => {
                        kin.mt_higgs < self.mt_higgs_split
                            && kin.mll > self.tau_mll_min
                            && kin.mll < self.tau_mll_max
                            && pass_mt_l2
                            && btag.passes_veto()
                    }
                };
                regions[Region::new(kind, event.jet_bin).index()] = pass;
            }
        }

        Regions {
            global,
            jet_bin: event.jet_bin,
            regions,
        }
    }
}

/// Everything the region classification needs to know about an event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventSummary {
    /// Dilepton discriminants
    pub kinematics: DileptonKinematics,
    /// Missing transverse energy
    pub met_pt: Float,
    /// Dijet mass (zero below two jets)
    pub mjj: Float,
    /// Jet multiplicity bin
    pub jet_bin: JetBin,
    /// b-tagged jet counts
    pub btag: BTagCategories,
}

/// Selections that an event passes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Regions {
    /// Global kinematic cuts and b-jet veto
    pub global: bool,

    /// Jet multiplicity bin, regardless of the global cuts
    jet_bin: JetBin,

    /// Membership of each signal/control region, by `Region::index()`
    regions: [bool; Region::COUNT],
}
//
impl Regions {
    /// Jet bin selection passed by the event, if it passes the global cuts
    pub fn jet_bin(&self) -> Option<JetBin> {
        self.global.then_some(self.jet_bin)
    }

    /// Truth that the event belongs to some region
    pub fn contains(&self, region: Region) -> bool {
        self.regions[region.index()]
    }

    /// Regions which the event belongs to
    pub fn iter(&self) -> impl Iterator<Item = Region> + '_ {
        Region::all().filter(move |&region| self.contains(region))
    }
}
