//! Physics object selection
//!
//! Picks tight electrons and muons, builds the e-μ pair of each event,
//! cleans jets against selected leptons and derives the jet multiplicity and
//! b-tagging categories used by the region definitions.

#![allow(missing_docs)]

use crate::{
    event::{EventBatch, Jagged, Jet},
    momentum::{self, Momentum},
    numeric::{functions::wrap_angle, Float},
    stage::JetBin,
};
use prefix_num_ops::real::*;
use serde::Deserialize;

/// Thresholds of the physics object selection
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObjectCuts {
    /// Maximal relative isolation of tight muons
    pub muon_max_rel_iso: Float,

    /// Minimal transverse momentum of the leading lepton (GeV)
    pub leading_pt: Float,

    /// Minimal transverse momentum of the subleading lepton (GeV)
    pub subleading_pt: Float,

    /// Maximal |η| of selected electrons
    pub electron_max_eta: Float,

    /// Maximal |η| of selected muons
    pub muon_max_eta: Float,

    /// Minimal jet identification quality
    pub jet_min_id: i32,

    /// Maximal |η| of clean jets
    pub jet_max_eta: Float,

    /// Minimal pileup identification of low-pT jets
    pub jet_min_pu_id: i32,

    /// Transverse momentum above which pileup identification is not required
    pub jet_pu_id_max_pt: Float,

    /// Minimal ΔR between a clean jet and any tight lepton
    pub jet_lepton_min_dr: Float,

    /// Transverse momentum above which a jet counts towards multiplicity
    pub jet_pt_threshold: Float,

    /// Minimal b-tagging discriminant of b-jets
    pub btag_threshold: Float,

    /// Maximal |η| of b-jets
    pub btag_max_eta: Float,

    /// Lower transverse momentum edge of soft b-jets (GeV)
    pub btag_soft_pt: Float,

    /// Lower transverse momentum edge of hard b-jets (GeV)
    pub btag_hard_pt: Float,
}
//
impl Default for ObjectCuts {
    fn default() -> Self {
        Self {
            muon_max_rel_iso: 0.15,
            leading_pt: 25.,
            subleading_pt: 13.,
            electron_max_eta: 2.5,
            muon_max_eta: 2.4,
            jet_min_id: 2,
            jet_max_eta: 4.7,
            jet_min_pu_id: 4,
            jet_pu_id_max_pt: 50.,
            jet_lepton_min_dr: 0.4,
            jet_pt_threshold: 30.,
            btag_threshold: 0.2217,
            btag_max_eta: 2.5,
            btag_soft_pt: 20.,
            btag_hard_pt: 30.,
        }
    }
}

/// Lepton flavor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    Electron,
    Muon,
}

/// Tight lepton, with a flavor tag
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lepton {
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    pub mass: Float,
    pub charge: i32,
    pub flavor: Flavor,
}
//
impl Lepton {
    /// 4-momentum of this lepton
    pub fn momentum(&self) -> Momentum {
        momentum::from_pt_eta_phi_m(self.pt, self.eta, self.phi, self.mass)
    }

    /// Truth that the lepton lies within the tracker acceptance of its flavor
    fn in_acceptance(&self, cuts: &ObjectCuts) -> bool {
        let max_eta = match self.flavor {
            Flavor::Electron => cuts.electron_max_eta,
            Flavor::Muon => cuts.muon_max_eta,
        };
        abs(self.eta) < max_eta
    }
}

/// Select tight electrons and muons of every event
///
/// Electrons come first in each event's collection, then muons, without any
/// particular ordering in pT.
pub fn select_tight_leptons(batch: &EventBatch, cuts: &ObjectCuts) -> Jagged<Lepton> {
    Jagged::from_nested((0..batch.len()).map(|event| {
        let electrons = batch
            .electrons
            .get(event)
            .iter()
            .filter(|e| e.mva_wp90)
            .map(|e| Lepton {
                pt: e.pt,
                eta: e.eta,
                phi: e.phi,
                mass: e.mass,
                charge: e.charge,
                flavor: Flavor::Electron,
            });
        let muons = batch
            .muons
            .get(event)
            .iter()
            .filter(|m| m.tight_id && m.rel_iso < cuts.muon_max_rel_iso)
            .map(|m| Lepton {
                pt: m.pt,
                eta: m.eta,
                phi: m.phi,
                mass: m.mass,
                charge: m.charge,
                flavor: Flavor::Muon,
            });
        electrons.chain(muons).collect()
    }))
}

/// Leading and subleading lepton of a selected event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeptonPair {
    pub leading: Lepton,
    pub subleading: Lepton,
}
//
impl LeptonPair {
    /// The electron of the pair
    pub fn electron(&self) -> &Lepton {
        if self.leading.flavor == Flavor::Electron {
            &self.leading
        } else {
            &self.subleading
        }
    }

    /// The muon of the pair
    pub fn muon(&self) -> &Lepton {
        if self.leading.flavor == Flavor::Muon {
            &self.leading
        } else {
            &self.subleading
        }
    }
}

/// Event counts along the e-μ preselection, for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairCounts {
    /// Events with exactly two tight leptons
    pub two_leptons: usize,
    /// ...of which one electron and one muon
    pub one_e_one_mu: usize,
    /// ...of which with opposite charges
    pub opposite_charge: usize,
    /// ...of which passing the pT and η requirements
    pub selected: usize,
}

/// Outcome of the e-μ preselection of a batch
#[derive(Clone, Debug, PartialEq)]
pub struct EMuSelection {
    /// Index of every selected event within its batch
    pub events: Vec<usize>,
    /// Lepton pair of every selected event
    pub pairs: Vec<LeptonPair>,
    /// Preselection diagnostics
    pub counts: PairCounts,
}

/// Select events with exactly one electron and one muon of opposite charge
///
/// Events with any other tight lepton content are dropped outright. Returns
/// None when no event of the batch survives, which is not an error: the
/// caller should simply skip the rest of the processing for this batch.
pub fn select_e_mu_pairs(tight_leptons: &Jagged<Lepton>, cuts: &ObjectCuts) -> Option<EMuSelection> {
    let mut counts = PairCounts::default();
    let mut events = Vec::new();
    let mut pairs = Vec::new();
    for event in 0..tight_leptons.len() {
        let leptons = tight_leptons.get(event);
        if leptons.len() != 2 {
            continue;
        }
        counts.two_leptons += 1;

        let (leading, subleading) = if leptons[1].pt > leptons[0].pt {
            (leptons[1], leptons[0])
        } else {
            (leptons[0], leptons[1])
        };

        if leading.flavor == subleading.flavor {
            continue;
        }
        counts.one_e_one_mu += 1;

        if leading.charge * subleading.charge >= 0 {
            continue;
        }
        counts.opposite_charge += 1;

        let pass_pt = leading.pt > cuts.leading_pt && subleading.pt > cuts.subleading_pt;
        let pass_eta = leading.in_acceptance(cuts) && subleading.in_acceptance(cuts);
        if !(pass_pt && pass_eta) {
            continue;
        }
        counts.selected += 1;

        events.push(event);
        pairs.push(LeptonPair {
            leading,
            subleading,
        });
    }
    (!events.is_empty()).then_some(EMuSelection {
        events,
        pairs,
        counts,
    })
}

/// Angular distance between two objects in the (η, φ) plane
pub fn delta_r(eta1: Float, phi1: Float, eta2: Float, phi2: Float) -> Float {
    let d_eta = eta1 - eta2;
    let d_phi = wrap_angle(phi1 - phi2);
    sqrt(d_eta.powi(2) + d_phi.powi(2))
}

/// Select well-identified jets away from tight leptons, sorted by decreasing pT
pub fn clean_jets(jets: &[Jet], leptons: &[Lepton], cuts: &ObjectCuts) -> Vec<Jet> {
    let mut clean = jets
        .iter()
        .filter(|jet| {
            let pass_pu_id = jet.pt > cuts.jet_pu_id_max_pt || jet.pu_id >= cuts.jet_min_pu_id;
            jet.jet_id >= cuts.jet_min_id && abs(jet.eta) < cuts.jet_max_eta && pass_pu_id
        })
        .filter(|jet| {
            leptons
                .iter()
                .all(|lep| delta_r(jet.eta, jet.phi, lep.eta, lep.phi) > cuts.jet_lepton_min_dr)
        })
        .copied()
        .collect::<Vec<_>>();
    clean.sort_by(|a, b| b.pt.total_cmp(&a.pt));
    clean
}

/// Jet multiplicity bin of an event, given its pT-sorted clean jets
///
/// Missing jets count as having zero pT, so the three bins partition all
/// events.
pub fn jet_bin(sorted_jets: &[Jet], pt_threshold: Float) -> JetBin {
    let nth_pt = |n: usize| sorted_jets.get(n).map_or(0., |jet| jet.pt);
    if nth_pt(0) < pt_threshold {
        JetBin::Zero
    } else if nth_pt(1) < pt_threshold {
        JetBin::One
    } else {
        JetBin::Two
    }
}

/// Number of jets above the multiplicity threshold
pub fn count_jets(sorted_jets: &[Jet], pt_threshold: Float) -> usize {
    sorted_jets.iter().filter(|jet| jet.pt >= pt_threshold).count()
}

/// b-tagged jet counts of an event
///
/// These are computed from all jets of the event, without lepton cleaning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BTagCategories {
    /// b-jets above the soft threshold
    pub above_soft: usize,
    /// b-jets between the soft and hard thresholds
    pub soft: usize,
    /// b-jets above the hard threshold
    pub hard: usize,
}
//
impl BTagCategories {
    /// Count the b-tagged jets of an event
    pub fn of(jets: &[Jet], cuts: &ObjectCuts) -> Self {
        let mut result = Self::default();
        let bjets = jets.iter().filter(|jet| {
            jet.jet_id >= cuts.jet_min_id
                && abs(jet.eta) < cuts.btag_max_eta
                && jet.btag > cuts.btag_threshold
        });
        for jet in bjets {
            if jet.pt > cuts.btag_soft_pt {
                result.above_soft += 1;
                if jet.pt <= cuts.btag_hard_pt {
                    result.soft += 1;
                }
            }
            if jet.pt > cuts.btag_hard_pt {
                result.hard += 1;
            }
        }
        result
    }

    /// Truth that the event has no b-jet above the soft threshold
    pub fn passes_veto(&self) -> bool {
        self.above_soft == 0
    }

    /// Truth that the event has a soft b-jet (top control region, 0-jet)
    pub fn has_soft_btag(&self) -> bool {
        self.soft > 0
    }

    /// Truth that the event has a hard b-jet (top control regions, 1/2-jet)
    pub fn has_hard_btag(&self) -> bool {
        self.hard > 0
    }
}
