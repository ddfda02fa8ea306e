//! Weighted histograms of kinematic variables
//!
//! Every (stage, variable, variation) combination gets its own histogram. As
//! all three dimensions are enumerated, histograms are kept in one flat
//! vector, which makes merging two stores a simple elementwise addition.

use crate::{
    kinematics::DileptonKinematics,
    numeric::{reals::consts::PI, Float},
    selection::LeptonPair,
    stage::HistStage,
    weights::{Variation, WeightVector},
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Kinematic variable that gets histogrammed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    /// Dilepton invariant mass
    Mass,
    /// Missing transverse energy
    Met,
    /// Azimuthal angle between the two leptons
    DPhi,
    /// Dilepton transverse momentum
    Ptll,
    /// Transverse mass of the dilepton + MET system
    MtHiggs,
    /// Transverse mass of the subleading lepton + missing energy system
    MtL2Met,
    /// Dijet invariant mass, in the 2-jet bin
    Mjj,
    /// Transverse momentum of the leading lepton
    LeadingPt,
    /// Transverse momentum of the subleading lepton
    SubleadingPt,
}
//
impl Variable {
    /// Number of histogrammed variables
    pub const COUNT: usize = 9;

    /// All variables, in storage order
    pub const ALL: [Variable; Self::COUNT] = [
        Variable::Mass,
        Variable::Met,
        Variable::DPhi,
        Variable::Ptll,
        Variable::MtHiggs,
        Variable::MtL2Met,
        Variable::Mjj,
        Variable::LeadingPt,
        Variable::SubleadingPt,
    ];

    /// Dense index of this variable
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in histogram keys
    pub fn name(self) -> &'static str {
        match self {
            Variable::Mass => "mass",
            Variable::Met => "met",
            Variable::DPhi => "dphi",
            Variable::Ptll => "ptll",
            Variable::MtHiggs => "mt_higgs",
            Variable::MtL2Met => "mt_l2_met",
            Variable::Mjj => "mjj",
            Variable::LeadingPt => "leading_pt",
            Variable::SubleadingPt => "subleading_pt",
        }
    }

    /// Look up a variable by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variable| variable.name() == name)
    }

    /// Default binning of this variable
    pub fn default_axis(self) -> RegularAxis {
        let upper = match self {
            Variable::DPhi => PI,
            Variable::MtHiggs => 300.,
            Variable::Mjj => 500.,
            _ => 200.,
        };
        RegularAxis::new(20, 0., upper)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values of every histogrammed variable for one event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventVariables([Float; Variable::COUNT]);
//
impl EventVariables {
    /// Collect the variables of a selected event
    pub fn new(pair: &LeptonPair, kin: &DileptonKinematics, met_pt: Float, mjj: Float) -> Self {
        let mut values = [0.; Variable::COUNT];
        for variable in Variable::ALL {
            values[variable.index()] = match variable {
                Variable::Mass => kin.mll,
                Variable::Met => met_pt,
                Variable::DPhi => kin.dphi_ll,
                Variable::Ptll => kin.ptll,
                Variable::MtHiggs => kin.mt_higgs,
                Variable::MtL2Met => kin.mt_l2_met,
                Variable::Mjj => mjj,
                Variable::LeadingPt => pair.leading.pt,
                Variable::SubleadingPt => pair.subleading.pt,
            };
        }
        Self(values)
    }

    /// Same variables, with a different dijet mass
    pub fn with_mjj(mut self, mjj: Float) -> Self {
        self.0[Variable::Mjj.index()] = mjj;
        self
    }

    /// Value of one variable
    pub fn get(&self, variable: Variable) -> Float {
        self.0[variable.index()]
    }
}

/// Equal-width binning of a variable
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegularAxis {
    /// Number of bins (excluding under/overflow)
    pub bins: usize,
    /// Lower edge of the first bin
    pub min: Float,
    /// Upper edge of the last bin
    pub max: Float,
}
//
impl RegularAxis {
    /// Set up a binning
    pub fn new(bins: usize, min: Float, max: Float) -> Self {
        assert!(bins > 0, "An axis needs at least one bin");
        assert!(min < max, "Axis range must not be empty");
        Self { bins, min, max }
    }

    /// Bin of a value, where 0 is the underflow and bins + 1 the overflow
    ///
    /// Returns None for NaN.
    pub fn locate(&self, x: Float) -> Option<usize> {
        if x.is_nan() {
            None
        } else if x < self.min {
            Some(0)
        } else if x >= self.max {
            Some(self.bins + 1)
        } else {
            let frac = (x - self.min) / (self.max - self.min);
            // Rounding may push values right below max into the overflow
            let bin = ((frac * self.bins as Float) as usize).min(self.bins - 1);
            Some(bin + 1)
        }
    }

    /// Bin edges, from min to max
    pub fn edges(&self) -> Vec<Float> {
        let width = (self.max - self.min) / self.bins as Float;
        (0..=self.bins)
            .map(|i| self.min + width * i as Float)
            .collect()
    }
}

/// Weighted histogram, with per-bin variance
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    /// Binning
    pub axis: RegularAxis,

    /// Sum of weights per bin, underflow first and overflow last
    values: Vec<Float>,

    /// Sum of squared weights per bin, same layout as values
    variances: Vec<Float>,

    /// Sum of weights of NaN entries, which belong to no bin
    nan: Float,
}
//
impl Histogram {
    /// Set up an empty histogram
    pub fn new(axis: RegularAxis) -> Self {
        Self {
            axis,
            values: vec![0.; axis.bins + 2],
            variances: vec![0.; axis.bins + 2],
            nan: 0.,
        }
    }

    /// Record one weighted entry
    pub fn fill(&mut self, x: Float, weight: Float) {
        match self.axis.locate(x) {
            Some(bin) => {
                self.values[bin] += weight;
                self.variances[bin] += weight.powi(2);
            }
            None => self.nan += weight,
        }
    }

    /// Integrate the contents of another histogram with the same binning
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.axis, other.axis, "Cannot merge differently binned histograms");
        for (v1, v2) in self.values.iter_mut().zip(&other.values) {
            *v1 += v2;
        }
        for (s1, s2) in self.variances.iter_mut().zip(&other.variances) {
            *s1 += s2;
        }
        self.nan += other.nan;
    }

    /// In-range bin values
    pub fn values(&self) -> &[Float] {
        &self.values[1..=self.axis.bins]
    }

    /// In-range bin variances
    pub fn variances(&self) -> &[Float] {
        &self.variances[1..=self.axis.bins]
    }

    /// Underflow bin value
    pub fn underflow(&self) -> Float {
        self.values[0]
    }

    /// Overflow bin value
    pub fn overflow(&self) -> Float {
        self.values[self.axis.bins + 1]
    }

    /// Sum of weights of entries that were NaN
    pub fn nan(&self) -> Float {
        self.nan
    }

    /// Sum of all weights, including out-of-range entries
    pub fn sum(&self) -> Float {
        self.values.iter().sum::<Float>() + self.nan
    }
}

/// Binning of every variable
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Axes([RegularAxis; Variable::COUNT]);
//
impl Axes {
    /// Override the binning of one variable
    pub fn with(mut self, variable: Variable, axis: RegularAxis) -> Self {
        self.0[variable.index()] = axis;
        self
    }

    /// Binning of one variable
    pub fn get(&self, variable: Variable) -> RegularAxis {
        self.0[variable.index()]
    }
}
//
impl Default for Axes {
    fn default() -> Self {
        Self(Variable::ALL.map(Variable::default_axis))
    }
}

/// Histograms of every (stage, variable, variation) combination
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramStore {
    histograms: Vec<Histogram>,
}
//
impl HistogramStore {
    /// Set up empty histograms
    pub fn new(axes: &Axes) -> Self {
        let histograms = HistStage::all()
            .flat_map(|_stage| {
                Variable::ALL.into_iter().flat_map(move |variable| {
                    Variation::ALL
                        .into_iter()
                        .map(move |_variation| Histogram::new(axes.get(variable)))
                })
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(
            histograms.len(),
            HistStage::COUNT * Variable::COUNT * Variation::COUNT
        );
        Self { histograms }
    }

    /// Flat index of a histogram
    fn index(stage: HistStage, variable: Variable, variation: Variation) -> usize {
        (stage.index() * Variable::COUNT + variable.index()) * Variation::COUNT + variation.index()
    }

    /// Access one histogram
    pub fn get(&self, stage: HistStage, variable: Variable, variation: Variation) -> &Histogram {
        &self.histograms[Self::index(stage, variable, variation)]
    }

    /// Record one event at one stage, in every variable and variation
    pub fn fill(&mut self, stage: HistStage, values: &EventVariables, weights: &WeightVector) {
        for variable in Variable::ALL {
            let x = values.get(variable);
            for (variation, weight) in weights.iter() {
                self.histograms[Self::index(stage, variable, variation)].fill(x, weight);
            }
        }
    }

    /// Integrate the contents of another store
    pub fn merge(&mut self, other: &Self) {
        for (h1, h2) in self.histograms.iter_mut().zip(&other.histograms) {
            h1.merge(h2);
        }
    }

    /// Iterate over all histograms with their coordinates
    pub fn iter(&self) -> impl Iterator<Item = ((HistStage, Variable, Variation), &Histogram)> + '_ {
        HistStage::all()
            .flat_map(|stage| {
                Variable::ALL.into_iter().flat_map(move |variable| {
                    Variation::ALL
                        .into_iter()
                        .map(move |variation| (stage, variable, variation))
                })
            })
            .map(move |coords| (coords, self.get(coords.0, coords.1, coords.2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_location() {
        let axis = RegularAxis::new(20, 0., 200.);
        assert_eq!(axis.locate(-1.), Some(0));
        assert_eq!(axis.locate(0.), Some(1));
        assert_eq!(axis.locate(9.99), Some(1));
        assert_eq!(axis.locate(10.), Some(2));
        assert_eq!(axis.locate(199.999), Some(20));
        assert_eq!(axis.locate(200.), Some(21));
        assert_eq!(axis.locate(Float::NAN), None);
        assert_eq!(axis.edges().len(), 21);
        assert_relative_eq!(axis.edges()[20], 200.);
    }

    #[test]
    fn fill_tracks_variance() {
        let mut hist = Histogram::new(RegularAxis::new(4, 0., 4.));
        hist.fill(0.5, 2.);
        hist.fill(0.7, 3.);
        hist.fill(-1., 1.);
        hist.fill(10., 0.5);
        hist.fill(Float::NAN, 0.25);
        assert_eq!(hist.values(), &[5., 0., 0., 0.]);
        assert_eq!(hist.variances(), &[13., 0., 0., 0.]);
        assert_eq!(hist.underflow(), 1.);
        assert_eq!(hist.overflow(), 0.5);
        assert_eq!(hist.nan(), 0.25);
        assert_eq!(hist.sum(), 6.75);
    }

    #[test]
    fn merge_adds_bins_and_variances() {
        let axis = RegularAxis::new(2, 0., 2.);
        let mut h1 = Histogram::new(axis);
        let mut h2 = Histogram::new(axis);
        h1.fill(0.5, 1.);
        h2.fill(0.5, 2.);
        h2.fill(1.5, 3.);
        h1.merge(&h2);
        assert_eq!(h1.values(), &[3., 3.]);
        assert_eq!(h1.variances(), &[5., 9.]);
    }

    #[test]
    #[should_panic]
    fn merge_rejects_different_binning() {
        let mut h1 = Histogram::new(RegularAxis::new(2, 0., 2.));
        h1.merge(&Histogram::new(RegularAxis::new(3, 0., 2.)));
    }

    #[test]
    fn store_layout() {
        let axes = Axes::default();
        let store = HistogramStore::new(&axes);
        assert_eq!(store.iter().count(), HistStage::COUNT * Variable::COUNT * Variation::COUNT);
        for ((_, variable, _), hist) in store.iter() {
            assert_eq!(hist.axis, axes.get(variable));
        }
        assert_relative_eq!(axes.get(Variable::DPhi).max, PI);
        assert_eq!(axes.get(Variable::Mjj).max, 500.);
    }
}
