//! This module contains everything that is needed to gather the results of
//! all input files into per-sample totals

use crate::{
    config::AnalysisContext,
    dataset,
    histogram::HistogramStore,
    resacc::{Cutflow, ResultsAccumulator},
    stage::CutflowStage,
    worker::FileOutcome,
};
use std::collections::BTreeMap;
use tracing::{error, info};

/// A file that could not be processed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedFile {
    /// Sample which the file belongs to
    pub label: String,
    /// Location of the file
    pub file: String,
    /// Short file name and error summary
    pub message: String,
}

/// Final results of the analysis
#[derive(Clone, Debug, PartialEq)]
pub struct FinalResults {
    /// Accumulated results of each sample
    samples: BTreeMap<String, ResultsAccumulator>,

    /// Files which could not be processed
    pub failures: Vec<FailedFile>,

    /// Number of files which were processed successfully
    pub processed_files: usize,

    /// Truth that data were filtered through a golden JSON
    pub luminosity_filtered: bool,

    /// Empty results, used to create new samples on the fly
    empty: ResultsAccumulator,
}
//
impl FinalResults {
    /// Prepare for results aggregation
    ///
    /// The listed samples are always reported, even if none of their files
    /// could be processed.
    pub fn new<'a>(context: &AnalysisContext, labels: impl IntoIterator<Item = &'a str>) -> Self {
        let empty = ResultsAccumulator::new(context);
        Self {
            samples: labels
                .into_iter()
                .map(|label| (label.to_owned(), empty.clone()))
                .collect(),
            failures: Vec::new(),
            processed_files: 0,
            luminosity_filtered: context.golden_json.is_some(),
            empty,
        }
    }

    /// Integrate the outcome of processing one file
    pub fn integrate(&mut self, outcome: FileOutcome) {
        let FileOutcome {
            label,
            file,
            result,
        } = outcome;
        match result {
            Ok(results) => {
                info!("Merged {} into {label}", dataset::file_name(&file));
                self.processed_files += 1;
                match self.samples.get_mut(&label) {
                    Some(aggregate) => aggregate.merge(results),
                    None => {
                        self.samples.insert(label, results);
                    }
                }
            }
            Err(e) => {
                let message = format!("{}: {e}", dataset::file_name(&file));
                error!("{label}/{message}");
                self.failures.push(FailedFile {
                    label,
                    file,
                    message,
                });
            }
        }
    }

    /// Number of files which could not be processed
    pub fn failed_files(&self) -> usize {
        self.failures.len()
    }

    /// Sample labels, in reporting order
    pub fn labels(&self) -> Vec<&str> {
        dataset::sort_samples(self.samples.keys().map(String::as_str))
    }

    /// Accumulated results of one sample
    pub fn sample(&self, label: &str) -> &ResultsAccumulator {
        self.samples.get(label).unwrap_or(&self.empty)
    }

    /// Cutflow of one sample
    pub fn cutflow(&self, label: &str) -> &Cutflow {
        &self.sample(label).cutflow
    }

    /// Histograms of one sample
    pub fn histograms(&self, label: &str) -> &HistogramStore {
        &self.sample(label).histograms
    }

    /// Total number of events read across all samples
    pub fn total_events(&self) -> u64 {
        self.samples
            .values()
            .map(|results| results.cutflow.raw(CutflowStage::Total))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::FileError;

    fn outcome(label: &str, events: usize) -> FileOutcome {
        let context = AnalysisContext::default();
        let mut results = ResultsAccumulator::new(&context);
        for _ in 0..events {
            results.cutflow.record(CutflowStage::Total, 1.);
        }
        FileOutcome {
            label: label.to_owned(),
            file: format!("root://host//{label}/{events}.root"),
            result: Ok(results),
        }
    }

    #[test]
    fn aggregation() {
        let context = AnalysisContext::default();
        let mut results = FinalResults::new(&context, ["WW", "Data"]);
        results.integrate(outcome("Data", 3));
        results.integrate(outcome("Data", 4));
        results.integrate(outcome("VG", 2));
        results.integrate(FileOutcome {
            label: "WW".to_owned(),
            file: "root://host//WW/bad.root".to_owned(),
            result: Err(FileError {
                class: "TimeoutError",
                message: "timed out".to_owned(),
                attempts: 3,
            }),
        });

        assert_eq!(results.labels(), ["Data", "WW", "VG"]);
        assert_eq!(results.cutflow("Data").raw(CutflowStage::Total), 7);
        assert_eq!(results.cutflow("WW").raw(CutflowStage::Total), 0);
        assert_eq!(results.cutflow("Unknown").raw(CutflowStage::Total), 0);
        assert_eq!(results.total_events(), 9);
        assert_eq!(results.processed_files, 3);
        assert_eq!(results.failed_files(), 1);
        assert_eq!(
            results.failures[0].message,
            "bad.root: TimeoutError after 3 attempts - timed out"
        );
    }
}
