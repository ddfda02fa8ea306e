//! This module defines the properties and storage of input events
//!
//! Events come in batches laid out in columnar fashion: fixed per-event
//! scalars are stored as plain columns, while the variable-length electron,
//! muon and jet collections are stored as jagged arrays.

#![allow(missing_docs)]

use crate::{
    error::{Error, Result},
    numeric::Float,
};
use serde::{Deserialize, Serialize};

/// Reconstructed electron candidate
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Electron {
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    pub mass: Float,
    pub charge: i32,
    /// Isolated MVA identification at the 90% efficiency working point
    pub mva_wp90: bool,
}

/// Reconstructed muon candidate
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Muon {
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    pub mass: Float,
    pub charge: i32,
    /// Tight identification flag
    pub tight_id: bool,
    /// Relative PF isolation in a ΔR = 0.4 cone
    pub rel_iso: Float,
}

/// Reconstructed jet
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    pub mass: Float,
    /// Identification quality bitmask (2 = tight)
    pub jet_id: i32,
    /// Pileup identification bitmask
    pub pu_id: i32,
    /// b-tagging discriminant
    pub btag: Float,
}

/// Whether a file holds recorded collisions or simulated ones
///
/// This decides which optional columns are expected in event batches, and
/// how events are weighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Detector data (carries run and luminosity block numbers)
    Data,
    /// Simulation (carries generator weights)
    Simulation,
}
//
impl SampleKind {
    /// Sample label used for detector data
    pub const DATA_LABEL: &'static str = "Data";

    /// Deduce the kind of a sample from its label
    pub fn of_label(label: &str) -> Self {
        if label == Self::DATA_LABEL {
            SampleKind::Data
        } else {
            SampleKind::Simulation
        }
    }
}

/// Variable-length per-event collections, stored contiguously
///
/// Items of event `i` are `items[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Jagged<T> {
    offsets: Vec<usize>,
    items: Vec<T>,
}
//
impl<T> Jagged<T> {
    /// Build from explicit offsets and items, checking their consistency
    pub fn new(offsets: Vec<usize>, items: Vec<T>) -> Result<Self> {
        if offsets.first() != Some(&0) {
            return Err(Error::MalformedBatch(
                "jagged offsets must start at 0".to_owned(),
            ));
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::MalformedBatch(
                "jagged offsets must be non-decreasing".to_owned(),
            ));
        }
        if offsets.last() != Some(&items.len()) {
            return Err(Error::MalformedBatch(format!(
                "jagged offsets end at {:?} but there are {} items",
                offsets.last(),
                items.len()
            )));
        }
        Ok(Self { offsets, items })
    }

    /// Flatten a list of per-event collections
    pub fn from_nested(nested: impl IntoIterator<Item = Vec<T>>) -> Self {
        let mut offsets = vec![0];
        let mut items = Vec::new();
        for event_items in nested {
            items.extend(event_items);
            offsets.push(items.len());
        }
        Self { offsets, items }
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Truth that there are no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items of one event
    pub fn get(&self, event: usize) -> &[T] {
        &self.items[self.offsets[event]..self.offsets[event + 1]]
    }
}
//
impl<T: Clone> Jagged<T> {
    /// Keep only the events whose mask entry is true
    pub fn filter(&self, mask: &[bool]) -> Self {
        debug_assert_eq!(mask.len(), self.len());
        Self::from_nested(
            mask.iter()
                .enumerate()
                .filter(|(_, &keep)| keep)
                .map(|(event, _)| self.get(event).to_vec()),
        )
    }
}

/// A batch of events in columnar layout
#[derive(Clone, Debug, PartialEq)]
pub struct EventBatch {
    /// Missing transverse energy magnitude
    pub met_pt: Vec<Float>,
    /// Missing transverse energy azimuth
    pub met_phi: Vec<Float>,
    /// Run number (data only)
    pub run: Option<Vec<u32>>,
    /// Luminosity block number (data only)
    pub luminosity_block: Option<Vec<u32>>,
    /// Generator-level weight (simulation only)
    pub gen_weight: Option<Vec<Float>>,
    pub electrons: Jagged<Electron>,
    pub muons: Jagged<Muon>,
    pub jets: Jagged<Jet>,
}
//
impl EventBatch {
    /// Build a batch from row-wise event records
    pub fn from_records(records: Vec<EventRecord>) -> Self {
        // Optional columns are present only if every event carries them
        let run = records.iter().map(|r| r.run).collect::<Option<Vec<_>>>();
        let luminosity_block = records
            .iter()
            .map(|r| r.luminosity_block)
            .collect::<Option<Vec<_>>>();
        let gen_weight = records.iter().map(|r| r.gen_weight).collect::<Option<Vec<_>>>();
        let met_pt = records.iter().map(|r| r.met_pt).collect();
        let met_phi = records.iter().map(|r| r.met_phi).collect();
        let mut electrons = Vec::with_capacity(records.len());
        let mut muons = Vec::with_capacity(records.len());
        let mut jets = Vec::with_capacity(records.len());
        for record in records {
            electrons.push(record.electrons);
            muons.push(record.muons);
            jets.push(record.jets);
        }
        Self {
            met_pt,
            met_phi,
            run,
            luminosity_block,
            gen_weight,
            electrons: Jagged::from_nested(electrons),
            muons: Jagged::from_nested(muons),
            jets: Jagged::from_nested(jets),
        }
    }

    /// Number of events in the batch
    pub fn len(&self) -> usize {
        self.met_pt.len()
    }

    /// Truth that the batch holds no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that all columns agree on the number of events, and that the
    /// columns which the sample kind requires are present
    pub fn validate(&self, kind: SampleKind) -> Result<()> {
        let n = self.len();
        let mut lengths = vec![
            ("met_phi", self.met_phi.len()),
            ("electrons", self.electrons.len()),
            ("muons", self.muons.len()),
            ("jets", self.jets.len()),
        ];
        match kind {
            SampleKind::Data => {
                // Run/lumi columns are only needed by the validity filter,
                // which reports their absence itself
                if let Some(run) = &self.run {
                    lengths.push(("run", run.len()));
                }
                if let Some(lumi) = &self.luminosity_block {
                    lengths.push(("luminosity_block", lumi.len()));
                }
            }
            SampleKind::Simulation => match &self.gen_weight {
                Some(w) => lengths.push(("gen_weight", w.len())),
                None if n > 0 => {
                    return Err(Error::MalformedBatch(
                        "simulation batch without a gen_weight column".to_owned(),
                    ))
                }
                None => {}
            },
        }
        for (name, len) in lengths {
            if len != n {
                return Err(Error::MalformedBatch(format!(
                    "column {name} has {len} entries, expected {n}"
                )));
            }
        }
        Ok(())
    }

    /// Keep only the events whose mask entry is true
    pub fn filter(&self, mask: &[bool]) -> Self {
        fn pick<T: Copy>(column: &[T], mask: &[bool]) -> Vec<T> {
            column
                .iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(&x, _)| x)
                .collect()
        }
        Self {
            met_pt: pick(&self.met_pt, mask),
            met_phi: pick(&self.met_phi, mask),
            run: self.run.as_deref().map(|c| pick(c, mask)),
            luminosity_block: self.luminosity_block.as_deref().map(|c| pick(c, mask)),
            gen_weight: self.gen_weight.as_deref().map(|c| pick(c, mask)),
            electrons: self.electrons.filter(mask),
            muons: self.muons.filter(mask),
            jets: self.jets.filter(mask),
        }
    }
}

/// One event in row-wise layout, as found in line-oriented input files
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub met_pt: Float,
    pub met_phi: Float,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luminosity_block: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gen_weight: Option<Float>,
    #[serde(default)]
    pub electrons: Vec<Electron>,
    #[serde(default)]
    pub muons: Vec<Muon>,
    #[serde(default)]
    pub jets: Vec<Jet>,
}
