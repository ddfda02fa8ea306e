//! Event weights and their systematic variations
//!
//! Data events always weigh 1. Simulated events start from their generator
//! weight, normalized to the integrated luminosity, and are then corrected by
//! trigger and lepton identification scale factors. Each systematic
//! variation replaces exactly one of those scale factors by its ±1σ shifted
//! value, which is what `WeightVector` encodes.

#![allow(missing_docs)]

use crate::{
    numeric::Float,
    selection::LeptonPair,
};
use prefix_num_ops::real::*;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    ops::Index,
};

/// Systematic weight variation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variation {
    Nominal,
    TriggerUp,
    TriggerDown,
    EleIdUp,
    EleIdDown,
    MuIdUp,
    MuIdDown,
}
//
impl Variation {
    /// Number of weight variations
    pub const COUNT: usize = 7;

    /// All variations, in storage order
    pub const ALL: [Variation; Self::COUNT] = [
        Variation::Nominal,
        Variation::TriggerUp,
        Variation::TriggerDown,
        Variation::EleIdUp,
        Variation::EleIdDown,
        Variation::MuIdUp,
        Variation::MuIdDown,
    ];

    /// Dense index of this variation
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in histogram keys
    pub fn name(self) -> &'static str {
        match self {
            Variation::Nominal => "nominal",
            Variation::TriggerUp => "trigger_up",
            Variation::TriggerDown => "trigger_down",
            Variation::EleIdUp => "ele_id_up",
            Variation::EleIdDown => "ele_id_down",
            Variation::MuIdUp => "mu_id_up",
            Variation::MuIdDown => "mu_id_down",
        }
    }
}

impl Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weights of one event under every variation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightVector([Float; Variation::COUNT]);
//
impl WeightVector {
    /// Weights of a data event
    pub fn data() -> Self {
        Self([1.; Variation::COUNT])
    }

    /// Weights of a simulated event
    ///
    /// Every variation is the product of the base weight and of the trigger,
    /// electron and muon factors, where exactly one factor is replaced by its
    /// shifted value and the two others stay nominal.
    pub fn simulation(base: Float, trigger: Factor, electron: Factor, muon: Factor) -> Self {
        let product = |t: Float, e: Float, m: Float| base * t * e * m;
        let (t, e, m) = (trigger.nominal, electron.nominal, muon.nominal);
        Self([
            product(t, e, m),
            product(trigger.up, e, m),
            product(trigger.down, e, m),
            product(t, electron.up, m),
            product(t, electron.down, m),
            product(t, e, muon.up),
            product(t, e, muon.down),
        ])
    }

    /// Nominal weight
    pub fn nominal(&self) -> Float {
        self.0[Variation::Nominal.index()]
    }

    /// Iterate over (variation, weight) pairs
    pub fn iter(&self) -> impl Iterator<Item = (Variation, Float)> + '_ {
        Variation::ALL.into_iter().zip(self.0.iter().copied())
    }
}

impl Index<Variation> for WeightVector {
    type Output = Float;

    fn index(&self, variation: Variation) -> &Float {
        &self.0[variation.index()]
    }
}

/// A multiplicative correction with its ±1σ shifted values
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Factor {
    pub nominal: Float,
    pub up: Float,
    pub down: Float,
}
//
impl Factor {
    /// Factor which does not change anything
    pub const UNITY: Factor = Factor {
        nominal: 1.,
        up: 1.,
        down: 1.,
    };

    /// Symmetric ±error around a central value
    pub fn symmetric(value: ScaleFactor) -> Self {
        Self {
            nominal: value.sf,
            up: value.sf + value.err,
            down: value.sf - value.err,
        }
    }

    /// Product of two independent corrections whose shifts are applied
    /// together
    pub fn product(a: ScaleFactor, b: ScaleFactor) -> Self {
        Self {
            nominal: a.sf * b.sf,
            up: (a.sf + a.err) * (b.sf + b.err),
            down: (a.sf - a.err) * (b.sf - b.err),
        }
    }
}

/// Scale factor with its uncertainty
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScaleFactor {
    pub sf: Float,
    pub err: Float,
}
//
impl ScaleFactor {
    /// Used when no measurement covers a phase space region
    pub const UNITY: ScaleFactor = ScaleFactor { sf: 1., err: 0. };
}

/// One (|η|, pT) cell of a scale factor table
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScaleFactorBin {
    pub eta_min: Float,
    pub eta_max: Float,
    pub pt_min: Float,
    pub pt_max: Float,
    pub sf: Float,
    pub err: Float,
}
//
impl ScaleFactorBin {
    /// Truth that this cell covers a given object
    fn contains(&self, abs_eta: Float, pt: Float) -> bool {
        (self.eta_min..self.eta_max).contains(&abs_eta) && (self.pt_min..self.pt_max).contains(&pt)
    }
}

/// Scale factors binned in |η| and pT
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ScaleFactorTable(Vec<ScaleFactorBin>);
//
impl ScaleFactorTable {
    /// Build a table from its cells
    pub fn new(bins: Vec<ScaleFactorBin>) -> Self {
        Self(bins)
    }

    /// Look up the scale factor of an object
    ///
    /// When cells overlap, the last matching one wins. Objects outside of the
    /// table get a unit scale factor without uncertainty.
    pub fn lookup(&self, eta: Float, pt: Float) -> ScaleFactor {
        let abs_eta = abs(eta);
        self.0
            .iter()
            .rev()
            .find(|bin| bin.contains(abs_eta, pt))
            .map_or(ScaleFactor::UNITY, |bin| ScaleFactor {
                sf: bin.sf,
                err: bin.err,
            })
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Truth that the table has no cell
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Data/simulation efficiency corrections
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaleFactors {
    /// Trigger efficiency scale factor, flat in phase space
    pub trigger: ScaleFactor,

    /// Electron identification scale factors
    pub electron_id: ScaleFactorTable,

    /// Muon tight identification scale factors
    pub muon_id: ScaleFactorTable,

    /// Muon isolation scale factors
    pub muon_iso: ScaleFactorTable,
}
//
impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            trigger: ScaleFactor::UNITY,
            electron_id: ScaleFactorTable::default(),
            muon_id: ScaleFactorTable::default(),
            muon_iso: ScaleFactorTable::default(),
        }
    }
}
//
impl ScaleFactors {
    /// Trigger correction
    pub fn trigger_factor(&self) -> Factor {
        Factor::symmetric(self.trigger)
    }

    /// Electron identification correction of a selected pair
    pub fn electron_factor(&self, pair: &LeptonPair) -> Factor {
        let ele = pair.electron();
        Factor::symmetric(self.electron_id.lookup(ele.eta, ele.pt))
    }

    /// Muon identification × isolation correction of a selected pair
    pub fn muon_factor(&self, pair: &LeptonPair) -> Factor {
        let mu = pair.muon();
        Factor::product(self.muon_id.lookup(mu.eta, mu.pt), self.muon_iso.lookup(mu.eta, mu.pt))
    }

    /// Weights of a selected simulated event, given its base weight
    pub fn event_weights(&self, base: Float, pair: &LeptonPair) -> WeightVector {
        WeightVector::simulation(
            base,
            self.trigger_factor(),
            self.electron_factor(pair),
            self.muon_factor(pair),
        )
    }
}

/// Cross-section and generator weight sum of a simulated sample
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct SampleMetadata {
    /// Cross-section (pb)
    pub xsec: Float,
    /// Sum of generator weights over the whole sample
    pub sum_gen_weight: Float,
}

/// Normalization of generator weights to the integrated luminosity
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Normalization {
    /// Detector data, not normalized
    Data,
    /// Simulation with a known cross-section
    Simulation(Float),
    /// Simulation from a sample without metadata, which must not contribute
    Unknown,
}
//
impl Normalization {
    /// Normalization of a simulated sample
    pub fn simulation(metadata: &SampleMetadata, luminosity: Float) -> Self {
        Normalization::Simulation(metadata.xsec * luminosity / metadata.sum_gen_weight)
    }

    /// Normalization of the sample behind a metadata key
    pub fn lookup(
        key: Option<&str>,
        samples: &BTreeMap<String, SampleMetadata>,
        luminosity: Float,
    ) -> Self {
        match key {
            None => Normalization::Data,
            Some(key) => samples
                .get(key)
                .map_or(Normalization::Unknown, |m| Self::simulation(m, luminosity)),
        }
    }

    /// Base weight of an event, given its generator weight
    pub fn base_weight(self, gen_weight: Float) -> Float {
        match self {
            Normalization::Data => 1.,
            Normalization::Simulation(factor) => gen_weight * factor,
            Normalization::Unknown => 0.,
        }
    }
}

/// Cross-sections (pb) and generator weight sums of the 2016 simulation
pub fn default_sample_metadata() -> BTreeMap<String, SampleMetadata> {
    [
        ("DYJetsToLL_M-50", 6189.39, 82448537.0),
        ("TTTo2L2Nu", 87.31, 3140127171.4748),
        ("ST_t-channel_top", 44.33, 6703802049.126),
        ("ST_t-channel_antitop", 26.38, 1522100315.652),
        ("ST_tW_top", 35.60, 20635251.1008),
        ("ST_tW_antitop", 35.60, 27306324.658),
        ("ST_s-channel", 3.36, 19429336.179),
        ("WJetsToLNu", 61526.7, 9697410121705.164),
        ("TTToSemiLeptonic", 364.35, 43548253725.284),
        ("ZGToLLG", 58.83, 3106465270.711),
        ("WGToLNuG", 405.271, 3353413.0),
        ("WZTo3LNu", 4.42965, 4077550.6318),
        ("WZTo2Q2L", 5.595, 129756627.882),
        ("ZZ", 16.523, 1151000.0),
        ("GluGluToWW", 0.06387, 17662000.0),
        ("WWTo2L2Nu", 12.178, 32147079.595),
        ("Higgs", 1.0315, 63281816.82),
    ]
    .into_iter()
    .map(|(key, xsec, sum_gen_weight)| {
        (
            key.to_owned(),
            SampleMetadata {
                xsec,
                sum_gen_weight,
            },
        )
    })
    .collect()
}

/// Integrated luminosity of the 2016 G+H data-taking periods (pb⁻¹)
pub const DEFAULT_LUMINOSITY: Float = 16_150.0;
