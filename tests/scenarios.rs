//! End-to-end checks of file processing, from raw events to cutflows and
//! histograms

use approx::assert_relative_eq;
use hww_emu::{
    config::AnalysisContext,
    dataset,
    event::{Electron, EventRecord, Jet, Muon},
    histogram::Variable,
    numeric::Float,
    resacc::ResultsAccumulator,
    source::{Fault, JsonSource, MemorySource},
    stage::{CutflowStage, HistStage, JetBin, Region, RegionKind},
    weights::{SampleMetadata, ScaleFactor, ScaleFactorBin, ScaleFactorTable, Variation},
    worker::{FileTask, FileWorker, RetryPolicy},
};
use std::{collections::BTreeMap, fs, io, time::Duration};

const DATA_FILE: &str = "root://host//store/data/Run2016G/MuonEG/NANOAOD/1.root";
const WW_FILE: &str = "root://host//store/mc/WWTo2L2Nu_13TeV/NANOAODSIM/1.root";

fn context() -> AnalysisContext {
    AnalysisContext {
        retry: RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        },
        ..AnalysisContext::default()
    }
}

fn task(label: &str, file: &str) -> FileTask {
    FileTask {
        label: label.to_owned(),
        file: file.to_owned(),
    }
}

fn process(context: &AnalysisContext, source: &MemorySource, task: &FileTask) -> ResultsAccumulator {
    FileWorker::new(context, source)
        .process(task)
        .result
        .expect("file should be processed successfully")
}

/// Opposite-charge e-μ pair of equal pT at η = 0, with the requested
/// dilepton pT and mass, and missing energy opposite to the dilepton system
fn e_mu_event(ptll: Float, mll: Float, met: Float) -> EventRecord {
    let pt = (ptll.powi(2) + mll.powi(2)).sqrt() / 2.;
    let half_dphi = mll.atan2(ptll);
    let electron = Electron {
        pt,
        eta: 0.,
        phi: 0.,
        mass: 0.,
        charge: -1,
        mva_wp90: true,
    };
    let muon = Muon {
        pt,
        eta: 0.,
        phi: 2. * half_dphi,
        mass: 0.,
        charge: 1,
        tight_id: true,
        rel_iso: 0.05,
    };
    EventRecord {
        met_pt: met,
        met_phi: half_dphi - std::f64::consts::PI as Float,
        electrons: vec![electron],
        muons: vec![muon],
        ..EventRecord::default()
    }
}

/// Two forward jets of 60 GeV with a given dijet mass, far from the
/// leptons of `e_mu_event`
fn dijet(mjj: Float) -> Vec<Jet> {
    let pt: Float = 60.;
    let dphi = (1. - mjj.powi(2) / (2. * pt * pt)).acos();
    let jet = |phi| Jet {
        pt,
        eta: 2.,
        phi,
        mass: 0.,
        jet_id: 6,
        pu_id: 7,
        btag: 0.,
    };
    vec![jet(0.), jet(dphi)]
}

#[test]
fn data_event_in_signal_region() {
    let context = context();
    let source = MemorySource::new().with_file(DATA_FILE, vec![e_mu_event(35., 50., 25.)]);
    let results = process(&context, &source, &task("Data", DATA_FILE));

    let sr = Region::new(RegionKind::Signal, JetBin::Zero);
    let reached = [
        CutflowStage::Total,
        CutflowStage::EMuPreselection,
        CutflowStage::GlobalCuts,
        CutflowStage::JetBin(JetBin::Zero),
        CutflowStage::Region(sr),
    ];
    for stage in CutflowStage::all() {
        let expected = u64::from(reached.contains(&stage));
        assert_eq!(results.cutflow.raw(stage), expected, "{stage}");
        assert_eq!(results.cutflow.weighted(stage), expected as Float, "{stage}");
    }
    let hist = results
        .histograms
        .get(HistStage::Region(sr), Variable::Met, Variation::Nominal);
    assert_eq!(hist.sum(), 1.);
}

#[test]
fn simulation_weights_and_variations() {
    let mut context = context();
    context.luminosity = 1.;
    context.samples = BTreeMap::from([(
        "WWTo2L2Nu".to_owned(),
        SampleMetadata {
            xsec: 1.,
            sum_gen_weight: 100.,
        },
    )]);
    let cell = |sf, err| {
        ScaleFactorTable::new(vec![ScaleFactorBin {
            eta_min: 0.,
            eta_max: 2.5,
            pt_min: 10.,
            pt_max: 200.,
            sf,
            err,
        }])
    };
    context.scale_factors.trigger = ScaleFactor { sf: 0.95, err: 0.02 };
    context.scale_factors.electron_id = cell(0.9, 0.05);
    context.scale_factors.muon_id = cell(0.98, 0.01);
    context.scale_factors.muon_iso = cell(0.99, 0.005);

    let event = EventRecord {
        gen_weight: Some(2.),
        ..e_mu_event(35., 50., 25.)
    };
    let source = MemorySource::new().with_file(WW_FILE, vec![event]);
    let results = process(&context, &source, &task("WW", WW_FILE));

    let (ele, mu) = (0.9, 0.98 * 0.99);
    let nominal = 2.0 * 0.01 * 0.95 * ele * mu;
    let sr = CutflowStage::Region(Region::new(RegionKind::Signal, JetBin::Zero));
    assert_eq!(results.cutflow.raw(sr), 1);
    assert_relative_eq!(results.cutflow.weighted(sr), nominal, max_relative = 1e-9);

    let weight = |variation| {
        results
            .histograms
            .get(HistStage::Global, Variable::Mass, variation)
            .sum()
    };
    assert_relative_eq!(weight(Variation::Nominal), nominal, max_relative = 1e-9);
    assert_relative_eq!(
        weight(Variation::TriggerUp),
        2.0 * 0.01 * 0.97 * ele * mu,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        weight(Variation::TriggerDown),
        2.0 * 0.01 * 0.93 * ele * mu,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        weight(Variation::EleIdUp),
        2.0 * 0.01 * 0.95 * 0.95 * mu,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        weight(Variation::MuIdDown),
        2.0 * 0.01 * 0.95 * ele * (0.97 * 0.985),
        max_relative = 1e-9
    );
}

#[test]
fn dijet_mass_window() {
    let context = context();
    let inside = EventRecord {
        jets: dijet(110.),
        ..e_mu_event(35., 50., 25.)
    };
    let outside = EventRecord {
        jets: dijet(90.),
        ..e_mu_event(35., 50., 25.)
    };
    let source = MemorySource::new()
        .with_file("inside", vec![inside])
        .with_file("outside", vec![outside]);
    let sr = CutflowStage::Region(Region::new(RegionKind::Signal, JetBin::Two));

    let results = process(&context, &source, &task("Data", "inside"));
    assert_eq!(results.cutflow.raw(CutflowStage::JetBin(JetBin::Two)), 1);
    assert_eq!(results.cutflow.raw(sr), 1);
    let mjj = results
        .histograms
        .get(HistStage::Region(Region::new(RegionKind::Signal, JetBin::Two)), Variable::Mjj, Variation::Nominal);
    assert_eq!(mjj.sum(), 1.);

    let results = process(&context, &source, &task("Data", "outside"));
    assert_eq!(results.cutflow.raw(CutflowStage::JetBin(JetBin::Two)), 1);
    assert_eq!(results.cutflow.raw(sr), 0);
}

#[test]
fn retried_file_matches_clean_read() {
    let mut context = context();
    context.batch_size = 2;
    let events = (0..5)
        .map(|i| EventRecord {
            gen_weight: Some(1. + i as Float),
            ..e_mu_event(35. + i as Float, 50., 25.)
        })
        .collect::<Vec<_>>();
    let clean = MemorySource::new().with_file(WW_FILE, events.clone());
    let flaky = MemorySource::new()
        .with_file(WW_FILE, events)
        .fail_read(WW_FILE, 2, 1, Fault::Io(io::ErrorKind::ConnectionReset));

    let expected = process(&context, &clean, &task("WW", WW_FILE));
    let retried = process(&context, &flaky, &task("WW", WW_FILE));
    assert_eq!(flaky.opens(WW_FILE), 3);
    assert_eq!(retried, expected);
    assert_eq!(retried.cutflow.raw(CutflowStage::Total), 5);
}

#[test]
fn file_list_to_local_mirror() {
    let base = std::env::temp_dir().join(format!("hww-mirror-{}", std::process::id()));
    let (lists, mirror) = (base.join("lists"), base.join("mirror"));
    let event_dir = mirror.join("store/data/Run2016G/MuonEG/NANOAOD");
    fs::create_dir_all(&lists).unwrap();
    fs::create_dir_all(&event_dir).unwrap();
    fs::write(lists.join("data.txt"), format!("# 2016G\n{DATA_FILE}\n")).unwrap();
    let events = [e_mu_event(35., 50., 25.), e_mu_event(35., 50., 5.), EventRecord::default()]
        .iter()
        .map(|event| serde_json::to_string(event).unwrap() + "\n")
        .collect::<String>();
    fs::write(event_dir.join("1.root"), events).unwrap();

    let file_lists = dataset::load_file_lists(&[lists], None).unwrap();
    assert_eq!(file_lists["Data"], [DATA_FILE]);
    let context = AnalysisContext {
        batch_size: 2,
        ..context()
    };
    let source = JsonSource::with_root(&mirror);
    let outcome = FileWorker::new(&context, &source).process(&task("Data", &file_lists["Data"][0]));
    let results = outcome.result.expect("mirrored file should be readable");

    assert_eq!(results.cutflow.raw(CutflowStage::Total), 3);
    assert_eq!(results.cutflow.raw(CutflowStage::EMuPreselection), 2);
    let sr = CutflowStage::Region(Region::new(RegionKind::Signal, JetBin::Zero));
    assert_eq!(results.cutflow.raw(sr), 1);
    fs::remove_dir_all(&base).unwrap();
}
