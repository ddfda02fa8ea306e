//! This module allows integrating analysis results across event batches

use crate::{
    config::AnalysisContext,
    error::Result,
    event::{EventBatch, SampleKind},
    evcut::EventSummary,
    histogram::{EventVariables, HistogramStore},
    kinematics::{self, DileptonKinematics, MissingEt},
    numeric::Float,
    selection::{self, BTagCategories},
    stage::{CutflowStage, HistStage},
    weights::{Normalization, WeightVector},
};
use std::borrow::Cow;
use tracing::debug;

/// Number of events reaching each cutflow stage, raw and weighted
#[derive(Clone, Debug, PartialEq)]
pub struct Cutflow {
    /// Raw event counts
    raw: [u64; CutflowStage::COUNT],

    /// Sum of nominal event weights
    weighted: [Float; CutflowStage::COUNT],
}
//
impl Default for Cutflow {
    fn default() -> Self {
        Self {
            raw: [0; CutflowStage::COUNT],
            weighted: [0.; CutflowStage::COUNT],
        }
    }
}
//
impl Cutflow {
    /// Record that one event reached some stage
    pub fn record(&mut self, stage: CutflowStage, nominal_weight: Float) {
        self.raw[stage.index()] += 1;
        self.weighted[stage.index()] += nominal_weight;
    }

    /// Raw number of events at some stage
    pub fn raw(&self, stage: CutflowStage) -> u64 {
        self.raw[stage.index()]
    }

    /// Weighted number of events at some stage
    pub fn weighted(&self, stage: CutflowStage) -> Float {
        self.weighted[stage.index()]
    }

    /// Integrate counts from another cutflow
    pub fn merge(&mut self, other: &Self) {
        for (r1, r2) in self.raw.iter_mut().zip(&other.raw) {
            *r1 += r2;
        }
        for (w1, w2) in self.weighted.iter_mut().zip(&other.weighted) {
            *w1 += w2;
        }
    }
}

/// This struct accumulates the cutflow and histograms of one sample, across
/// as many batches (and files) as needed
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsAccumulator {
    /// Events reaching each selection stage
    pub cutflow: Cutflow,

    /// Kinematic distributions at each histogram stage
    pub histograms: HistogramStore,
}
//
impl ResultsAccumulator {
    /// Prepare for results integration
    pub fn new(context: &AnalysisContext) -> Self {
        Self {
            cutflow: Cutflow::default(),
            histograms: HistogramStore::new(&context.axes),
        }
    }

    /// Run one batch of events through the full selection
    ///
    /// Stages are filled in order, and a single event usually increments
    /// several of them. Fails only if the batch is malformed.
    pub fn integrate_batch(
        &mut self,
        batch: &EventBatch,
        kind: SampleKind,
        normalization: Normalization,
        context: &AnalysisContext,
    ) -> Result<()> {
        batch.validate(kind)?;

        // Event weights before lepton scale factors, which need a lepton pair
        let mut base_weights = match (kind, &batch.gen_weight) {
            (SampleKind::Simulation, Some(gen_weights)) => gen_weights
                .iter()
                .map(|&w| normalization.base_weight(w))
                .collect::<Vec<_>>(),
            _ => vec![normalization.base_weight(1.); batch.len()],
        };
        let total_factor = match kind {
            SampleKind::Data => 1.,
            SampleKind::Simulation => context.scale_factors.trigger.sf,
        };
        for &base in &base_weights {
            self.cutflow.record(CutflowStage::Total, base * total_factor);
        }

        // Luminosity section filter, for data only
        let mut batch = Cow::Borrowed(batch);
        if let (SampleKind::Data, Some(golden_json)) = (kind, &context.golden_json) {
            let mask = golden_json.mask(&batch)?;
            base_weights = base_weights
                .into_iter()
                .zip(&mask)
                .filter(|(_, &keep)| keep)
                .map(|(w, _)| w)
                .collect();
            for &base in &base_weights {
                self.cutflow.record(CutflowStage::AfterJson, base);
            }
            if base_weights.len() < batch.len() {
                batch = Cow::Owned(batch.filter(&mask));
            }
        }

        // e-μ pair selection
        let cuts = &context.object_cuts;
        let tight_leptons = selection::select_tight_leptons(&batch, cuts);
        let Some(emu) = selection::select_e_mu_pairs(&tight_leptons, cuts) else {
            debug!("No e-μ pair in batch of {} events", batch.len());
            return Ok(());
        };
        debug!("e-μ preselection: {:?}", emu.counts);

        for (&event, pair) in emu.events.iter().zip(&emu.pairs) {
            let weights = match kind {
                SampleKind::Data => WeightVector::data(),
                SampleKind::Simulation => {
                    context.scale_factors.event_weights(base_weights[event], pair)
                }
            };
            self.cutflow.record(CutflowStage::EMuPreselection, weights.nominal());

            let met = MissingEt {
                pt: batch.met_pt[event],
                phi: batch.met_phi[event],
            };
            let kin = DileptonKinematics::new(pair, met);

            // Jets are not looked at before the global cuts
            let before_cuts = EventVariables::new(pair, &kin, met.pt, 0.);
            self.histograms.fill(HistStage::BeforeCuts, &before_cuts, &weights);

            let jets = batch.jets.get(event);
            let clean_jets = selection::clean_jets(jets, tight_leptons.get(event), cuts);
            let mjj = kinematics::dijet_mass(&clean_jets);
            let variables = before_cuts.with_mjj(mjj);
            let regions = context.event_cut.classify(&EventSummary {
                kinematics: kin,
                met_pt: met.pt,
                mjj,
                jet_bin: selection::jet_bin(&clean_jets, cuts.jet_pt_threshold),
                btag: BTagCategories::of(jets, cuts),
            });

            let mut record = |cutflow_stage, hist_stage| {
                self.cutflow.record(cutflow_stage, weights.nominal());
                self.histograms.fill(hist_stage, &variables, &weights);
            };
            if regions.global {
                record(CutflowStage::GlobalCuts, HistStage::Global);
            }
            if let Some(bin) = regions.jet_bin() {
                record(CutflowStage::JetBin(bin), HistStage::JetBin(bin));
            }
            for region in regions.iter() {
                record(CutflowStage::Region(region), HistStage::Region(region));
            }
        }
        Ok(())
    }

    /// Integrate analysis results from another ResultsAccumulator
    #[allow(clippy::needless_pass_by_value)]
    pub fn merge(&mut self, other: Self) {
        self.cutflow.merge(&other.cutflow);
        self.histograms.merge(&other.histograms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{EventRecord, Electron, Muon},
        histogram::Variable,
        lumi::GoldenJson,
        stage::{JetBin, Region, RegionKind},
        weights::{ScaleFactor, ScaleFactorBin, ScaleFactorTable, Variation},
    };
    use approx::assert_relative_eq;

    fn electron(pt: Float, eta: Float, phi: Float, charge: i32) -> Electron {
        Electron {
            pt,
            eta,
            phi,
            mass: 0.,
            charge,
            mva_wp90: true,
        }
    }

    fn muon(pt: Float, eta: Float, phi: Float, charge: i32) -> Muon {
        Muon {
            pt,
            eta,
            phi,
            mass: 0.,
            charge,
            tight_id: true,
            rel_iso: 0.05,
        }
    }

    /// Signal-like e-μ event with no jets
    fn signal_event() -> EventRecord {
        EventRecord {
            met_pt: 45.,
            met_phi: 2.5,
            electrons: vec![electron(30., 0.5, 0., -1)],
            muons: vec![muon(40., -1., 1.2, 1)],
            ..EventRecord::default()
        }
    }

    #[test]
    fn cutflow_merge() {
        let mut c1 = Cutflow::default();
        let mut c2 = Cutflow::default();
        c1.record(CutflowStage::Total, 0.5);
        c2.record(CutflowStage::Total, 1.5);
        c2.record(CutflowStage::GlobalCuts, 2.);
        c1.merge(&c2);
        assert_eq!(c1.raw(CutflowStage::Total), 2);
        assert_eq!(c1.weighted(CutflowStage::Total), 2.);
        assert_eq!(c1.raw(CutflowStage::GlobalCuts), 1);
        assert_eq!(c1.raw(CutflowStage::EMuPreselection), 0);
    }

    #[test]
    fn data_signal_event() {
        let context = AnalysisContext::default();
        let mut acc = ResultsAccumulator::new(&context);
        let batch = EventBatch::from_records(vec![signal_event(), EventRecord::default()]);
        acc.integrate_batch(&batch, SampleKind::Data, Normalization::Data, &context)
            .unwrap();

        let cutflow = &acc.cutflow;
        assert_eq!(cutflow.raw(CutflowStage::Total), 2);
        assert_eq!(cutflow.raw(CutflowStage::AfterJson), 0);
        assert_eq!(cutflow.raw(CutflowStage::EMuPreselection), 1);
        assert_eq!(cutflow.raw(CutflowStage::GlobalCuts), 1);
        assert_eq!(cutflow.raw(CutflowStage::JetBin(JetBin::Zero)), 1);
        let sr = Region::new(RegionKind::Signal, JetBin::Zero);
        assert_eq!(cutflow.raw(CutflowStage::Region(sr)), 1);
        assert_eq!(cutflow.weighted(CutflowStage::Region(sr)), 1.);

        // Data weights are the same in every variation
        for variation in Variation::ALL {
            let hist = acc.histograms.get(HistStage::Region(sr), Variable::LeadingPt, variation);
            assert_eq!(hist.sum(), 1.);
        }
        let mjj = acc
            .histograms
            .get(HistStage::BeforeCuts, Variable::Mjj, Variation::Nominal);
        assert_eq!(mjj.values()[0], 1.);
    }

    #[test]
    fn simulation_weights() {
        let mut context = AnalysisContext::default();
        context.scale_factors.trigger = ScaleFactor { sf: 0.9, err: 0.1 };
        context.scale_factors.electron_id = ScaleFactorTable::new(vec![ScaleFactorBin {
            eta_min: 0.,
            eta_max: 2.5,
            pt_min: 10.,
            pt_max: 500.,
            sf: 0.8,
            err: 0.05,
        }]);
        let mut acc = ResultsAccumulator::new(&context);
        let mut event = signal_event();
        event.gen_weight = Some(2.);
        let batch = EventBatch::from_records(vec![event]);
        acc.integrate_batch(&batch, SampleKind::Simulation, Normalization::Simulation(0.5), &context)
            .unwrap();

        // The total only includes the trigger correction
        assert_relative_eq!(acc.cutflow.weighted(CutflowStage::Total), 0.9, max_relative = 1e-12);
        assert_relative_eq!(acc.cutflow.weighted(CutflowStage::EMuPreselection), 0.9 * 0.8, max_relative = 1e-12);

        let hist = |variation| {
            acc.histograms
                .get(HistStage::Global, Variable::Mass, variation)
                .sum()
        };
        assert_relative_eq!(hist(Variation::TriggerUp), 1.0 * 0.8, max_relative = 1e-12);
        assert_relative_eq!(hist(Variation::EleIdDown), 0.9 * 0.75, max_relative = 1e-12);
        assert_relative_eq!(hist(Variation::MuIdUp), 0.9 * 0.8, max_relative = 1e-12);
    }

    #[test]
    fn unknown_sample_weighs_nothing() {
        let context = AnalysisContext::default();
        let mut acc = ResultsAccumulator::new(&context);
        let mut event = signal_event();
        event.gen_weight = Some(1.);
        let batch = EventBatch::from_records(vec![event]);
        acc.integrate_batch(&batch, SampleKind::Simulation, Normalization::Unknown, &context)
            .unwrap();
        assert_eq!(acc.cutflow.raw(CutflowStage::GlobalCuts), 1);
        assert_eq!(acc.cutflow.weighted(CutflowStage::GlobalCuts), 0.);
    }

    #[test]
    fn golden_json_filter() {
        let mut context = AnalysisContext::default();
        context.golden_json = Some(GoldenJson::parse(r#"{"279000": [[1, 10]]}"#, None).unwrap());
        let mut acc = ResultsAccumulator::new(&context);
        let certified = EventRecord {
            run: Some(279000),
            luminosity_block: Some(5),
            ..signal_event()
        };
        let uncertified = EventRecord {
            luminosity_block: Some(11),
            ..certified.clone()
        };
        let batch = EventBatch::from_records(vec![certified, uncertified]);
        acc.integrate_batch(&batch, SampleKind::Data, Normalization::Data, &context)
            .unwrap();
        assert_eq!(acc.cutflow.raw(CutflowStage::Total), 2);
        assert_eq!(acc.cutflow.raw(CutflowStage::AfterJson), 1);
        assert_eq!(acc.cutflow.raw(CutflowStage::EMuPreselection), 1);
    }

    #[test]
    fn simulation_without_weights_is_malformed() {
        let context = AnalysisContext::default();
        let mut acc = ResultsAccumulator::new(&context);
        let batch = EventBatch::from_records(vec![signal_event()]);
        assert!(acc
            .integrate_batch(&batch, SampleKind::Simulation, Normalization::Simulation(1.), &context)
            .is_err());
    }
}
