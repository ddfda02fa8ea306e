//! This module is in charge of outputting the final analysis results to the
//! standard output and various files

use crate::{
    config::Configuration,
    event::SampleKind,
    histogram::Histogram,
    numeric::Float,
    resfin::FinalResults,
    stage::CutflowStage,
};
use eyre::{Result, WrapErr};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};
use time::{macros::format_description, OffsetDateTime};

/// File name of the histogram export
pub const HISTOGRAMS_FILE: &str = "histograms.json";

/// File name of the raw cutflow table
pub const RAW_CUTFLOW_FILE: &str = "Cutflow_Raw.csv";

/// File name of the weighted cutflow table
pub const SCALED_CUTFLOW_FILE: &str = "Cutflow_scaled.csv";

/// File name of the run timing record
pub const TIMES_FILE: &str = "run.times";

/// Label of the row summing up all simulated samples
const TOTAL_MC_LABEL: &str = "TOTAL (MC)";

/// Output the analysis results to the console and to disk
pub fn dump_results(cfg: &Configuration, results: &FinalResults, elapsed_time: Duration) -> Result<()> {
    let output_dir = &cfg.output_dir;
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Could not create {}", output_dir.display()))?;

    let histograms_path = output_dir.join(HISTOGRAMS_FILE);
    write_histograms(&histograms_path, results)
        .wrap_err_with(|| format!("Could not write {}", histograms_path.display()))?;
    println!("Saved histograms to: {}", histograms_path.display());

    for (weighted, file_name) in [(false, RAW_CUTFLOW_FILE), (true, SCALED_CUTFLOW_FILE)] {
        let path = output_dir.join(file_name);
        write_cutflow(&path, results, weighted)
            .wrap_err_with(|| format!("Could not write {}", path.display()))?;
        println!("Saved cutflow to: {}", path.display());
    }

    // Compute a timestamp of when the run ended
    let format =
        format_description!("[day]-[month repr:short]-[year repr:last_two]   [hour]:[minute]:[second]");
    let timestamp = OffsetDateTime::now_utc().format(format)?;
    let elapsed_secs = elapsed_time.as_secs_f64();

    // Keep track of when the run ended and how long it took
    {
        let path = output_dir.join(TIMES_FILE);
        let mut times_file = File::create(&path)
            .wrap_err_with(|| format!("Could not create {}", path.display()))?;
        writeln!(times_file, "{timestamp}")?;
        writeln!(times_file, "{elapsed_secs:.3}")?;
    }

    print_report(results, &timestamp, elapsed_secs);
    Ok(())
}

/// Contents of one exported histogram
#[derive(Serialize)]
struct HistogramExport<'a> {
    edges: Vec<f64>,
    values: &'a [Float],
    variances: &'a [Float],
    underflow: Float,
    overflow: Float,
    nan: Float,
}
//
impl<'a> From<&'a Histogram> for HistogramExport<'a> {
    fn from(hist: &'a Histogram) -> Self {
        Self {
            edges: hist.axis.edges().into_iter().map(f64::from).collect(),
            values: hist.values(),
            variances: hist.variances(),
            underflow: hist.underflow(),
            overflow: hist.overflow(),
            nan: hist.nan(),
        }
    }
}

/// All histograms, keyed by `{sample}_{stage}_{variable}_{variation}`
pub fn histograms_json(results: &FinalResults) -> Result<Value> {
    let mut map = Map::new();
    for label in results.labels() {
        for ((stage, variable, variation), hist) in results.histograms(label).iter() {
            let key = format!("{label}_{stage}_{variable}_{variation}");
            map.insert(key, serde_json::to_value(HistogramExport::from(hist))?);
        }
    }
    Ok(Value::Object(map))
}

/// Write the histogram export
fn write_histograms(path: &Path, results: &FinalResults) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &histograms_json(results)?)?;
    Ok(())
}

/// Cutflow table, as a header and rows of formatted cells
///
/// Raw counts are printed without decimals, weighted yields with two. The
/// luminosity filter stage has no column of its own: when it was applied, it
/// replaces the total of the data row.
pub fn cutflow_table(results: &FinalResults, weighted: bool) -> (Vec<String>, Vec<Vec<String>>) {
    let stages = CutflowStage::all()
        .filter_map(|stage| stage.label().map(|label| (stage, label)))
        .collect::<Vec<_>>();
    let header = std::iter::once("Sample")
        .chain(stages.iter().map(|&(_, label)| label))
        .map(str::to_owned)
        .collect();

    let value = |label: &str, stage: CutflowStage| {
        let stage = if label == SampleKind::DATA_LABEL
            && stage == CutflowStage::Total
            && results.luminosity_filtered
        {
            CutflowStage::AfterJson
        } else {
            stage
        };
        let cutflow = results.cutflow(label);
        if weighted {
            cutflow.weighted(stage) as f64
        } else {
            cutflow.raw(stage) as f64
        }
    };
    let format = |x: f64| {
        if weighted {
            format!("{x:.2}")
        } else {
            format!("{x:.0}")
        }
    };

    let labels = results.labels();
    let mut rows = labels
        .iter()
        .map(|&label| {
            std::iter::once(label.to_owned())
                .chain(stages.iter().map(|&(stage, _)| format(value(label, stage))))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let total_mc = std::iter::once(TOTAL_MC_LABEL.to_owned())
        .chain(stages.iter().map(|&(stage, _)| {
            let total = labels
                .iter()
                .filter(|&&label| label != SampleKind::DATA_LABEL)
                .map(|&label| value(label, stage))
                .fold(0., |acc, x| acc + x);
            format(total)
        }))
        .collect();
    rows.push(total_mc);
    (header, rows)
}

/// Write one of the cutflow tables
fn write_cutflow(path: &Path, results: &FinalResults, weighted: bool) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let (header, rows) = cutflow_table(results, weighted);
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Format an integer with thousands separators
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() * 4 / 3);
    for (idx, digit) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Print the end-of-run summary
fn print_report(results: &FinalResults, timestamp: &str, elapsed_secs: f64) {
    println!();
    println!("{}", "=".repeat(70));
    println!("{:20} | {:>12}", "SAMPLE", "EVENTS");
    println!("{}", "-".repeat(35));
    for label in results.labels() {
        let events = results.cutflow(label).raw(CutflowStage::Total);
        println!("{label:20} | {:>12}", thousands(events));
    }
    println!("{}", "-".repeat(35));
    let total_events = results.total_events();
    println!("{:20} | {:>12}", "TOTAL", thousands(total_events));
    println!("{}", "=".repeat(70));

    if results.failed_files() > 0 {
        println!();
        println!("WARNING: {} files failed processing.", results.failed_files());
        for failure in &results.failures {
            println!("  {}/{}", failure.label, failure.message);
        }
    }

    println!();
    println!("Run finished        : {timestamp} (UTC)");
    println!("Files processed     : {}", results.processed_files);
    println!("Elapsed time        : {elapsed_secs:.1} s");
    if elapsed_secs > 0. {
        println!(
            "Event rate          : {:.0} events/s",
            total_events as f64 / elapsed_secs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AnalysisContext,
        lumi::GoldenJson,
        resacc::ResultsAccumulator,
        worker::FileOutcome,
    };

    fn outcome(label: &str, total: usize, after_json: usize, weight: Float) -> FileOutcome {
        let mut results = ResultsAccumulator::new(&AnalysisContext::default());
        for _ in 0..total {
            results.cutflow.record(CutflowStage::Total, weight);
        }
        for _ in 0..after_json {
            results.cutflow.record(CutflowStage::AfterJson, weight);
        }
        FileOutcome {
            label: label.to_owned(),
            file: format!("{label}.root"),
            result: Ok(results),
        }
    }

    #[test]
    fn separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn cutflow_rows() {
        let context = AnalysisContext {
            golden_json: Some(GoldenJson::default()),
            ..AnalysisContext::default()
        };
        let mut results = FinalResults::new(&context, ["Data", "WW", "VG"]);
        results.integrate(outcome("Data", 10, 6, 1.));
        results.integrate(outcome("WW", 4, 0, 0.25));
        results.integrate(outcome("VG", 2, 0, 0.5));

        let (header, rows) = cutflow_table(&results, false);
        assert_eq!(header.len(), CutflowStage::COUNT);
        assert_eq!(&header[..3], ["Sample", "Total", "e-μ Preselect"]);
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][..3], ["Data", "6", "0"]);
        assert_eq!(&rows[1][..2], ["WW", "4"]);
        assert_eq!(&rows[3][..2], ["TOTAL (MC)", "6"]);

        let (_, rows) = cutflow_table(&results, true);
        assert_eq!(&rows[1][..2], ["WW", "1.00"]);
        assert_eq!(&rows[3][..2], ["TOTAL (MC)", "2.00"]);
    }

    #[test]
    fn histogram_keys() {
        let context = AnalysisContext::default();
        let results = FinalResults::new(&context, ["WW"]);
        let json = histograms_json(&results).unwrap();
        let hist = &json["WW_SR_2jet_mjj_mu_id_down"];
        assert_eq!(hist["edges"].as_array().unwrap().len(), 21);
        assert_eq!(hist["values"].as_array().unwrap().len(), 20);
        assert_eq!(json.as_object().unwrap().len(), 14 * 9 * 7);
    }

    #[test]
    fn files_on_disk() {
        let output_dir = std::env::temp_dir().join(format!("hww-output-{}", std::process::id()));
        let cfg = Configuration {
            output_dir: output_dir.clone(),
            ..Configuration::default()
        };
        let mut results = FinalResults::new(&AnalysisContext::default(), ["Data"]);
        results.integrate(outcome("Data", 3, 0, 1.));
        dump_results(&cfg, &results, Duration::from_millis(1500)).unwrap();

        let raw = fs::read_to_string(output_dir.join(RAW_CUTFLOW_FILE)).unwrap();
        let mut lines = raw.lines();
        assert!(lines.next().unwrap().starts_with("Sample,Total,"));
        assert!(lines.next().unwrap().starts_with("Data,3,0,"));
        assert!(lines.next().unwrap().starts_with("TOTAL (MC),0,"));
        let scaled = fs::read_to_string(output_dir.join(SCALED_CUTFLOW_FILE)).unwrap();
        assert!(scaled.contains("Data,3.00,0.00,"));

        let histograms = fs::read_to_string(output_dir.join(HISTOGRAMS_FILE)).unwrap();
        let json: Value = serde_json::from_str(&histograms).unwrap();
        assert!(json.get("Data_before_cuts_mass_nominal").is_some());

        let times = fs::read_to_string(output_dir.join(TIMES_FILE)).unwrap();
        assert_eq!(times.lines().nth(1), Some("1.500"));
        fs::remove_dir_all(&output_dir).unwrap();
    }

    #[test]
    fn empty_simulation_total_is_zero() {
        let context = AnalysisContext::default();
        let mut results = FinalResults::new(&context, ["Data"]);
        results.integrate(outcome("Data", 2, 0, 1.));
        for weighted in [false, true] {
            let (_, rows) = cutflow_table(&results, weighted);
            let total = rows.last().unwrap();
            assert_eq!(total[0], TOTAL_MC_LABEL);
            assert!(total[1..].iter().all(|cell| !cell.starts_with('-')), "{total:?}");
        }
    }

    #[test]
    fn cutflow_csv_reads_back() {
        let output_dir = std::env::temp_dir().join(format!("hww-csv-{}", std::process::id()));
        fs::create_dir_all(&output_dir).unwrap();
        let path = output_dir.join(RAW_CUTFLOW_FILE);
        let mut results = FinalResults::new(&AnalysisContext::default(), ["Data", "WW"]);
        results.integrate(outcome("WW", 5, 0, 0.5));
        write_cutflow(&path, &results, false).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.get(0), Some("Sample"));
        assert_eq!(header.len(), CutflowStage::COUNT);
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get(0), Some("WW"));
        assert_eq!(rows[1].get(1), Some("5"));
        assert_eq!(rows[2].get(0), Some("TOTAL (MC)"));
        assert_eq!(rows[2].get(1), Some("5"));
        fs::remove_dir_all(&output_dir).unwrap();
    }
}
