//! Enumerated analysis categories
//!
//! Jet bins, signal/control regions, cutflow stages and histogram stages are
//! all known at compile time, so they are modeled as enums that can be turned
//! into dense array indices. This lets results be stored in fixed-shape
//! arrays rather than in maps keyed by strings.

use std::fmt::{self, Display};

/// Jet multiplicity bin of a selected event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JetBin {
    /// No jet above threshold
    Zero,
    /// Exactly one jet above threshold
    One,
    /// Two or more jets above threshold
    Two,
}
//
impl JetBin {
    /// Number of jet bins
    pub const COUNT: usize = 3;

    /// All jet bins, in index order
    pub const ALL: [JetBin; Self::COUNT] = [JetBin::Zero, JetBin::One, JetBin::Two];

    /// Dense index of this bin
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in stage keys
    pub fn name(self) -> &'static str {
        match self {
            JetBin::Zero => "0jet",
            JetBin::One => "1jet",
            JetBin::Two => "2jet",
        }
    }
}

/// Family of analysis regions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKind {
    /// Signal region
    Signal,
    /// Top-quark enriched control region
    TopControl,
    /// Drell-Yan → ττ enriched control region
    TauControl,
}
//
impl RegionKind {
    /// Number of region families
    pub const COUNT: usize = 3;

    /// All region families, in index order
    pub const ALL: [RegionKind; Self::COUNT] = [
        RegionKind::Signal,
        RegionKind::TopControl,
        RegionKind::TauControl,
    ];
}

/// Analysis region: a region family specialized to one jet bin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    /// Signal or control region family
    pub kind: RegionKind,
    /// Jet multiplicity bin
    pub bin: JetBin,
}
//
impl Region {
    /// Number of regions
    pub const COUNT: usize = RegionKind::COUNT * JetBin::COUNT;

    /// Region names, indexed by `Region::index()`
    const NAMES: [&'static str; Self::COUNT] = [
        "SR_0jet",
        "SR_1jet",
        "SR_2jet",
        "CR_top_0jet",
        "CR_top_1jet",
        "CR_top_2jet",
        "CR_tau_0jet",
        "CR_tau_1jet",
        "CR_tau_2jet",
    ];

    /// Table headers, indexed by `Region::index()`
    const LABELS: [&'static str; Self::COUNT] = [
        "SR 0j",
        "SR 1j",
        "SR 2j",
        "CR Top 0j",
        "CR Top 1j",
        "CR Top 2j",
        "CR Tau 0j",
        "CR Tau 1j",
        "CR Tau 2j",
    ];

    /// Build a region
    pub const fn new(kind: RegionKind, bin: JetBin) -> Self {
        Self { kind, bin }
    }

    /// Iterate over all regions, in index order
    pub fn all() -> impl Iterator<Item = Region> {
        RegionKind::ALL
            .into_iter()
            .flat_map(|kind| JetBin::ALL.into_iter().map(move |bin| Region::new(kind, bin)))
    }

    /// Dense index of this region
    pub fn index(self) -> usize {
        (self.kind as usize) * JetBin::COUNT + self.bin.index()
    }

    /// Name used in stage keys
    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    /// Human-readable name used in tables
    pub fn label(self) -> &'static str {
        Self::LABELS[self.index()]
    }
}

/// Checkpoint of the cutflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CutflowStage {
    /// All events read from the input
    Total,
    /// Events inside certified luminosity sections (data only)
    AfterJson,
    /// Events with exactly one electron and one muon passing preselection
    EMuPreselection,
    /// Events passing the global kinematic cuts and b-jet veto
    GlobalCuts,
    /// Global cuts plus one jet multiplicity bin
    JetBin(JetBin),
    /// One signal or control region
    Region(Region),
}
//
impl CutflowStage {
    /// Number of cutflow stages
    pub const COUNT: usize = 4 + JetBin::COUNT + Region::COUNT;

    /// Iterate over all stages, in cutflow order
    pub fn all() -> impl Iterator<Item = CutflowStage> {
        [
            CutflowStage::Total,
            CutflowStage::AfterJson,
            CutflowStage::EMuPreselection,
            CutflowStage::GlobalCuts,
        ]
        .into_iter()
        .chain(JetBin::ALL.into_iter().map(CutflowStage::JetBin))
        .chain(Region::all().map(CutflowStage::Region))
    }

    /// Dense index of this stage
    pub fn index(self) -> usize {
        match self {
            CutflowStage::Total => 0,
            CutflowStage::AfterJson => 1,
            CutflowStage::EMuPreselection => 2,
            CutflowStage::GlobalCuts => 3,
            CutflowStage::JetBin(bin) => 4 + bin.index(),
            CutflowStage::Region(region) => 4 + JetBin::COUNT + region.index(),
        }
    }

    /// Name used in stage keys
    pub fn name(self) -> &'static str {
        match self {
            CutflowStage::Total => "total",
            CutflowStage::AfterJson => "after_json",
            CutflowStage::EMuPreselection => "e_mu_preselection",
            CutflowStage::GlobalCuts => "global_cuts",
            CutflowStage::JetBin(bin) => bin.name(),
            CutflowStage::Region(region) => region.name(),
        }
    }

    /// Column header of this stage in cutflow tables
    ///
    /// The luminosity filter stage has no column of its own: for data, it
    /// replaces the total instead.
    pub fn label(self) -> Option<&'static str> {
        Some(match self {
            CutflowStage::Total => "Total",
            CutflowStage::AfterJson => return None,
            CutflowStage::EMuPreselection => "e-μ Preselect",
            CutflowStage::GlobalCuts => "Global Cuts",
            CutflowStage::JetBin(JetBin::Zero) => "0-jet",
            CutflowStage::JetBin(JetBin::One) => "1-jet",
            CutflowStage::JetBin(JetBin::Two) => "2-jet",
            CutflowStage::Region(region) => region.label(),
        })
    }
}

impl Display for CutflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage at which kinematic histograms are recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HistStage {
    /// All e-μ preselected events
    BeforeCuts,
    /// Events passing the global cuts
    Global,
    /// Global cuts plus one jet multiplicity bin
    JetBin(JetBin),
    /// One signal or control region
    Region(Region),
}
//
impl HistStage {
    /// Number of histogram stages
    pub const COUNT: usize = 2 + JetBin::COUNT + Region::COUNT;

    /// Iterate over all stages, in storage order
    pub fn all() -> impl Iterator<Item = HistStage> {
        [HistStage::BeforeCuts, HistStage::Global]
            .into_iter()
            .chain(JetBin::ALL.into_iter().map(HistStage::JetBin))
            .chain(Region::all().map(HistStage::Region))
    }

    /// Dense index of this stage
    pub fn index(self) -> usize {
        match self {
            HistStage::BeforeCuts => 0,
            HistStage::Global => 1,
            HistStage::JetBin(bin) => 2 + bin.index(),
            HistStage::Region(region) => 2 + JetBin::COUNT + region.index(),
        }
    }

    /// Name used in histogram keys
    pub fn name(self) -> &'static str {
        match self {
            HistStage::BeforeCuts => "before_cuts",
            HistStage::Global => "global",
            HistStage::JetBin(bin) => bin.name(),
            HistStage::Region(region) => region.name(),
        }
    }
}

impl Display for HistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutflow_stage_order() {
        let names = CutflowStage::all().map(CutflowStage::name).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "total",
                "after_json",
                "e_mu_preselection",
                "global_cuts",
                "0jet",
                "1jet",
                "2jet",
                "SR_0jet",
                "SR_1jet",
                "SR_2jet",
                "CR_top_0jet",
                "CR_top_1jet",
                "CR_top_2jet",
                "CR_tau_0jet",
                "CR_tau_1jet",
                "CR_tau_2jet",
            ]
        );
    }

    #[test]
    fn indices_are_dense() {
        for (expected, stage) in CutflowStage::all().enumerate() {
            assert_eq!(stage.index(), expected, "{stage}");
        }
        assert_eq!(CutflowStage::all().count(), CutflowStage::COUNT);
        for (expected, stage) in HistStage::all().enumerate() {
            assert_eq!(stage.index(), expected, "{stage}");
        }
        assert_eq!(HistStage::all().count(), HistStage::COUNT);
        for (expected, region) in Region::all().enumerate() {
            assert_eq!(region.index(), expected);
        }
    }

    #[test]
    fn region_names_match_their_parts() {
        let region = Region::new(RegionKind::TopControl, JetBin::One);
        assert_eq!(region.name(), "CR_top_1jet");
        assert_eq!(region.label(), "CR Top 1j");
        assert_eq!(Region::new(RegionKind::Signal, JetBin::Two).name(), "SR_2jet");
    }
}
