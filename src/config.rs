//! Mechanism for loading and sharing the analysis configuration

use crate::{
    evcut::EventCut,
    histogram::{Axes, RegularAxis, Variable},
    lumi::{GoldenJson, RunPeriod},
    numeric::Float,
    selection::ObjectCuts,
    weights::{self, SampleMetadata, ScaleFactors},
    worker::RetryPolicy,
};
use eyre::{ensure, eyre, Result, WrapErr};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::{Path, PathBuf}, time::Duration};

/// Analysis configuration, as read from a JSON file
///
/// Every field is optional and takes its default value when missing.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    /// Directories holding the file lists of each sample
    pub input_dirs: Vec<PathBuf>,

    /// Directory where results are written
    pub output_dir: PathBuf,

    /// Local mirror of the remote storage, holding the event files that
    /// file lists point to
    pub data_dir: Option<PathBuf>,

    /// Maximal number of files to read from each file list
    pub max_files_per_list: Option<usize>,

    /// Maximal number of events per batch
    pub batch_size: usize,

    /// Number of attempts at reading a file
    pub max_attempts: usize,

    /// Delay between two attempts at reading a file (s)
    pub retry_backoff_secs: f64,

    /// Number of worker threads (0 lets the thread pool decide)
    pub num_threads: usize,

    /// Integrated luminosity of the data (pb⁻¹)
    pub luminosity: Float,

    /// Cross-section and generator weight sum of each simulated sample
    pub samples: BTreeMap<String, SampleMetadata>,

    /// Certified luminosity sections of the data, if they must be checked
    pub golden_json: Option<PathBuf>,

    /// Run periods to keep from the golden JSON (all runs if missing)
    pub run_periods: Option<BTreeMap<String, RunPeriod>>,

    /// Data/simulation efficiency corrections
    pub scale_factors: ScaleFactors,

    /// Physics object selection
    pub object_cuts: ObjectCuts,

    /// Global cuts and region definitions
    pub event_cut: EventCut,

    /// Histogram binning overrides, by variable name
    pub histogram_axes: BTreeMap<String, RegularAxis>,
}
//
impl Default for Configuration {
    fn default() -> Self {
        Self {
            input_dirs: Vec::new(),
            output_dir: PathBuf::from("output"),
            data_dir: None,
            max_files_per_list: None,
            batch_size: 1_000_000,
            max_attempts: 3,
            retry_backoff_secs: 3.,
            num_threads: 0,
            luminosity: weights::DEFAULT_LUMINOSITY,
            samples: weights::default_sample_metadata(),
            golden_json: None,
            run_periods: None,
            scale_factors: ScaleFactors::default(),
            object_cuts: ObjectCuts::default(),
            event_cut: EventCut::default(),
            histogram_axes: BTreeMap::new(),
        }
    }
}
//
impl Configuration {
    /// Load the configuration from a file, check it, and print it out
    pub fn load(file_name: impl AsRef<Path>) -> Result<Self> {
        let file_name = file_name.as_ref();
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Could not read {}", file_name.display()))?;
        let config = Self::parse(&config_str)?;
        config.print();
        Ok(config)
    }

    /// Decode and check a configuration
    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(config_str).wrap_err("Could not decode the configuration")?;
        config.check()?;
        Ok(config)
    }

    /// Check that the configuration makes sense
    fn check(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "Batches must hold at least one event");
        ensure!(self.max_attempts > 0, "Files must be read at least once");
        ensure!(
            self.retry_backoff_secs.is_finite() && self.retry_backoff_secs >= 0.,
            "Retry backoff must be a nonnegative duration"
        );
        ensure!(self.luminosity > 0., "Luminosity must be positive");
        for (key, metadata) in &self.samples {
            ensure!(
                metadata.sum_gen_weight != 0.,
                "Sample {key} has a zero generator weight sum"
            );
        }
        for (name, axis) in &self.histogram_axes {
            ensure!(
                Variable::from_name(name).is_some(),
                "Unknown histogram variable {name}"
            );
            ensure!(axis.bins > 0, "Histogram of {name} needs at least one bin");
            ensure!(axis.min < axis.max, "Histogram of {name} has an empty range");
        }
        Ok(())
    }

    /// Display the configuration
    pub fn print(&self) {
        println!("Input directories      : {:?}", self.input_dirs);
        println!("Output directory       : {}", self.output_dir.display());
        match &self.data_dir {
            Some(dir) => println!("Event data directory   : {}", dir.display()),
            None => println!("Event data directory   : none (local paths only)"),
        }
        match self.max_files_per_list {
            Some(max) => println!("Max files per list     : {max}"),
            None => println!("Max files per list     : all"),
        }
        println!("Batch size             : {}", self.batch_size);
        println!(
            "Read attempts          : {} ({} s apart)",
            self.max_attempts, self.retry_backoff_secs
        );
        println!("Worker threads         : {}", self.num_threads);
        println!("Luminosity (pb⁻¹)      : {}", self.luminosity);
        println!("Simulated samples      : {}", self.samples.len());
        match &self.golden_json {
            Some(path) => println!("Golden JSON            : {}", path.display()),
            None => println!("Golden JSON            : none"),
        }
        if let Some(periods) = &self.run_periods {
            for (name, period) in periods {
                println!(
                    "Run period {name:<12}: {}-{}",
                    period.run_min, period.run_max
                );
            }
        }
        println!(
            "Trigger scale factor   : {} ± {}",
            self.scale_factors.trigger.sf, self.scale_factors.trigger.err
        );
        println!(
            "Scale factor cells     : {} e ID, {} μ ID, {} μ iso",
            self.scale_factors.electron_id.len(),
            self.scale_factors.muon_id.len(),
            self.scale_factors.muon_iso.len()
        );
        println!("Jet pT threshold (GeV) : {}", self.object_cuts.jet_pt_threshold);
    }

    /// Histogram binning of every variable
    pub fn axes(&self) -> Result<Axes> {
        self.histogram_axes
            .iter()
            .try_fold(Axes::default(), |axes, (name, &axis)| {
                let variable = Variable::from_name(name)
                    .ok_or_else(|| eyre!("Unknown histogram variable {name}"))?;
                Ok(axes.with(variable, axis))
            })
    }

    /// Build the immutable context shared by all workers
    ///
    /// This loads the golden JSON file, if any.
    pub fn context(&self) -> Result<AnalysisContext> {
        let golden_json = self
            .golden_json
            .as_ref()
            .map(|path| {
                GoldenJson::load(path, self.run_periods.as_ref())
                    .wrap_err_with(|| format!("Could not load golden JSON {}", path.display()))
            })
            .transpose()?;
        Ok(AnalysisContext {
            object_cuts: self.object_cuts.clone(),
            event_cut: self.event_cut.clone(),
            scale_factors: self.scale_factors.clone(),
            axes: self.axes()?,
            golden_json,
            samples: self.samples.clone(),
            luminosity: self.luminosity,
            batch_size: self.batch_size,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff: Duration::try_from_secs_f64(self.retry_backoff_secs)
                    .wrap_err("Invalid retry backoff")?,
            },
        })
    }
}

/// Everything a worker needs to know in order to process a file
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisContext {
    /// Physics object selection
    pub object_cuts: ObjectCuts,
    /// Global cuts and region definitions
    pub event_cut: EventCut,
    /// Data/simulation efficiency corrections
    pub scale_factors: ScaleFactors,
    /// Histogram binning
    pub axes: Axes,
    /// Certified luminosity sections, if data must be filtered
    pub golden_json: Option<GoldenJson>,
    /// Normalization inputs of simulated samples
    pub samples: BTreeMap<String, SampleMetadata>,
    /// Integrated luminosity of the data (pb⁻¹)
    pub luminosity: Float,
    /// Maximal number of events per batch
    pub batch_size: usize,
    /// How hard to try reading each file
    pub retry: RetryPolicy,
}
//
impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            object_cuts: ObjectCuts::default(),
            event_cut: EventCut::default(),
            scale_factors: ScaleFactors::default(),
            axes: Axes::default(),
            golden_json: None,
            samples: weights::default_sample_metadata(),
            luminosity: weights::DEFAULT_LUMINOSITY,
            batch_size: 1_000_000,
            retry: RetryPolicy::default(),
        }
    }
}
