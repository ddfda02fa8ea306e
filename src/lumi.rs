//! Certified luminosity section filter for detector data
//!
//! The "golden JSON" published for each data-taking period maps run numbers
//! to inclusive ranges of luminosity blocks during which the detector was
//! fully operational. Data events outside of these ranges are discarded
//! before any physics selection.

use crate::{
    error::{Error, Result},
    event::EventBatch,
};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};

/// Inclusive range of run numbers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct RunPeriod {
    /// First run of the period
    pub run_min: u32,
    /// Last run of the period
    pub run_max: u32,
}
//
impl RunPeriod {
    /// Truth that a run belongs to this period
    pub fn contains(&self, run: u32) -> bool {
        (self.run_min..=self.run_max).contains(&run)
    }
}

/// Run periods G and H of the 2016 data-taking
pub fn default_run_periods() -> BTreeMap<String, RunPeriod> {
    [
        ("Run2016G", 278_820, 280_385),
        ("Run2016H", 280_919, 284_044),
    ]
    .into_iter()
    .map(|(name, run_min, run_max)| (name.to_owned(), RunPeriod { run_min, run_max }))
    .collect()
}

/// Certified luminosity sections, by run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoldenJson {
    runs: BTreeMap<u32, Vec<(u32, u32)>>,
}
//
impl GoldenJson {
    /// Parse a golden JSON document, optionally keeping only some run periods
    pub fn parse(text: &str, periods: Option<&BTreeMap<String, RunPeriod>>) -> Result<Self> {
        let raw: BTreeMap<String, Vec<[u32; 2]>> = serde_json::from_str(text)?;
        let mut runs = BTreeMap::new();
        for (run, ranges) in raw {
            let run = run
                .trim()
                .parse::<u32>()
                .map_err(|e| Error::Config(format!("invalid run number {run:?} in golden JSON: {e}")))?;
            if let Some(periods) = periods {
                if !periods.values().any(|p| p.contains(run)) {
                    continue;
                }
            }
            runs.insert(run, ranges.into_iter().map(|[lo, hi]| (lo, hi)).collect());
        }
        Ok(Self { runs })
    }

    /// Load a golden JSON file
    pub fn load(path: impl AsRef<Path>, periods: Option<&BTreeMap<String, RunPeriod>>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?, periods)
    }

    /// Number of certified runs
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// Truth that a luminosity block of some run is certified
    pub fn contains(&self, run: u32, luminosity_block: u32) -> bool {
        self.runs.get(&run).map_or(false, |ranges| {
            ranges
                .iter()
                .any(|&(lo, hi)| (lo..=hi).contains(&luminosity_block))
        })
    }

    /// Tell which events of a data batch are certified
    pub fn mask(&self, batch: &EventBatch) -> Result<Vec<bool>> {
        match (&batch.run, &batch.luminosity_block) {
            (Some(runs), Some(lumis)) => Ok(runs
                .iter()
                .zip(lumis)
                .map(|(&run, &lumi)| self.contains(run, lumi))
                .collect()),
            _ if batch.is_empty() => Ok(Vec::new()),
            _ => Err(Error::MalformedBatch(
                "data batch lacks run/luminosity_block columns needed by the golden JSON".to_owned(),
            )),
        }
    }
}
