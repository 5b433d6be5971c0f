//! Experiment runner comparing a network against its adapted and radiated variants.
//!
//! A run configuration selects an optional adaptation and an optional radiation setting.
//! Every applicable variant of the graph is built, simulated on its own copy of the
//! topology, and the radiated variant is classified against its unradiated counterpart:
//! `RadAdapted` against `Adapted` when an adaptation is configured, `Radiated` against
//! `Baseline` otherwise.
//!
//! # Example
//! ```rust
//! use snn_compare::experiment::{Experiment, RunConfig, SnnVariant};
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::radiation::config::RadiationConfig;
//!
//! let spec = GraphSpec::new(
//!     vec![NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0), NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0)],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//! let config =
//!     RunConfig::new(7, "relay", 10).with_radiation(RadiationConfig::synaptic_death(1.0));
//!
//! let result = Experiment::new(config).run(&spec).unwrap();
//! assert!(result.variant(SnnVariant::Radiated).is_some());
//! assert!(!result.entries.is_empty());
//! ```
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::comparator::{first_occurrence_only, Comparator, FailureModeEntry};
use crate::error::SNNError;
use crate::network::adaptation::AdaptationSpec;
use crate::network::builder::GraphSpec;
use crate::network::topology::Topology;
use crate::neuron::NeuronId;
use crate::radiation::config::RadiationConfig;
use crate::radiation::injector::{RadiationEvent, RadiationInjector};
use crate::simulator::engine::{CancelFlag, Simulator};
use crate::simulator::trace::Trace;
use crate::U_TOLERANCE;

/// The name used in tables for runs without adaptation.
pub const NO_ADAPTATION: &str = "no_adaptation";

/// The variants of a graph in an experiment.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnnVariant {
    /// The graph as specified.
    Baseline,
    /// The graph with the adaptation applied.
    Adapted,
    /// The graph under radiation.
    Radiated,
    /// The adapted graph under radiation.
    RadAdapted,
}

impl SnnVariant {
    pub fn name(&self) -> &'static str {
        match self {
            SnnVariant::Baseline => "snn_algo_graph",
            SnnVariant::Adapted => "adapted_snn_graph",
            SnnVariant::Radiated => "rad_snn_algo_graph",
            SnnVariant::RadAdapted => "rad_adapted_snn_graph",
        }
    }

    pub fn is_adapted(&self) -> bool {
        matches!(self, SnnVariant::Adapted | SnnVariant::RadAdapted)
    }

    pub fn is_radiated(&self) -> bool {
        matches!(self, SnnVariant::Radiated | SnnVariant::RadAdapted)
    }
}

fn tolerance_default() -> f64 {
    U_TOLERANCE
}

/// The configuration of a single experiment run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// The seed of the radiation draws.
    pub seed: u64,
    /// The number of nodes of the graph before adaptation.
    #[serde(default)]
    pub graph_size: usize,
    /// The name of the algorithm setting the graph implements.
    pub algorithm_setting: String,
    /// The number of simulated timesteps.
    pub duration: usize,
    #[serde(default)]
    pub adaptation: Option<AdaptationSpec>,
    #[serde(default)]
    pub radiation: Option<RadiationConfig>,
    /// The current tolerance of the failure-mode classifier.
    #[serde(default = "tolerance_default")]
    pub tolerance: f64,
}

impl RunConfig {
    pub fn new(seed: u64, algorithm_setting: impl Into<String>, duration: usize) -> Self {
        RunConfig {
            seed,
            graph_size: 0,
            algorithm_setting: algorithm_setting.into(),
            duration,
            adaptation: None,
            radiation: None,
            tolerance: U_TOLERANCE,
        }
    }

    pub fn with_graph_size(mut self, graph_size: usize) -> Self {
        self.graph_size = graph_size;
        self
    }

    pub fn with_adaptation(mut self, adaptation: AdaptationSpec) -> Self {
        self.adaptation = Some(adaptation);
        self
    }

    pub fn with_radiation(mut self, radiation: RadiationConfig) -> Self {
        self.radiation = Some(radiation);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The name of the adaptation, or [`NO_ADAPTATION`].
    pub fn adaptation_name(&self) -> String {
        match &self.adaptation {
            Some(adaptation) => adaptation.name(),
            None => NO_ADAPTATION.to_string(),
        }
    }

    /// The hex SHA-256 digest of the JSON serialization of the configuration.
    pub fn unique_id(&self) -> Result<String, SNNError> {
        let json = serde_json::to_string(self).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(json);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// The variants to run, in ascending order.
    pub fn variants(&self) -> Vec<SnnVariant> {
        let mut variants = vec![SnnVariant::Baseline];
        if self.adaptation.is_some() {
            variants.push(SnnVariant::Adapted);
        }
        if self.radiation.is_some() {
            variants.push(SnnVariant::Radiated);
            if self.adaptation.is_some() {
                variants.push(SnnVariant::RadAdapted);
            }
        }
        variants
    }

    /// The (reference, subject) pair to classify, if radiation is configured.
    pub fn comparison(&self) -> Option<(SnnVariant, SnnVariant)> {
        match (&self.adaptation, &self.radiation) {
            (_, None) => None,
            (Some(_), Some(_)) => Some((SnnVariant::Adapted, SnnVariant::RadAdapted)),
            (None, Some(_)) => Some((SnnVariant::Baseline, SnnVariant::Radiated)),
        }
    }
}

/// The outcome of simulating one variant.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct VariantRun {
    pub variant: SnnVariant,
    pub trace: Trace,
    /// The injected radiation events, empty for unradiated variants.
    pub events: Vec<RadiationEvent>,
    /// The names of the neurons and synapses hit by radiation, in event order.
    pub hit: Vec<String>,
}

/// The outcome of an experiment run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub config: RunConfig,
    pub unique_id: String,
    pub runs: Vec<VariantRun>,
    /// The classified divergence of the radiated variant, empty without radiation.
    pub entries: Vec<FailureModeEntry>,
}

impl ExperimentResult {
    pub fn variant(&self, variant: SnnVariant) -> Option<&VariantRun> {
        self.runs.iter().find(|run| run.variant == variant)
    }

    /// Classify the trace of a subject variant against the trace of a reference variant.
    /// Returns an error if one of the variants was not run or if their traces differ
    /// in neurons.
    pub fn classify_variants(
        &self,
        reference: SnnVariant,
        subject: SnnVariant,
    ) -> Result<Vec<FailureModeEntry>, SNNError> {
        let comparator = Comparator::build(self.config.tolerance)?;
        let (run_r, run_s) = match (self.variant(reference), self.variant(subject)) {
            (Some(run_r), Some(run_s)) => (run_r, run_s),
            _ => {
                return Err(SNNError::TraceMismatch(format!(
                    "variants {} and {} were not both run",
                    reference.name(),
                    subject.name()
                )))
            }
        };
        comparator.classify(&run_r.trace, &run_s.trace)
    }

    /// Save the result to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a result from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// Runs all the variants of a configuration.
#[derive(Debug, Clone)]
pub struct Experiment {
    config: RunConfig,
    cancel: Option<CancelFlag>,
}

impl Experiment {
    pub fn new(config: RunConfig) -> Self {
        Experiment {
            config,
            cancel: None,
        }
    }

    /// Share a cancellation flag with every variant run.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Simulate every variant of a graph in parallel and classify the radiated one.
    pub fn run(&self, spec: &GraphSpec) -> Result<ExperimentResult, SNNError> {
        let unique_id = self.config.unique_id()?;
        log::info!(
            "Starting experiment {} ({}, {})",
            unique_id,
            self.config.algorithm_setting,
            self.config.adaptation_name()
        );

        if self.config.graph_size > 0 && self.config.graph_size != spec.size() {
            log::warn!(
                "Run configuration expects {} nodes, the graph has {}",
                self.config.graph_size,
                spec.size()
            );
        }
        if let Some(radiation) = &self.config.radiation {
            radiation.validate()?;
        }

        let runs = self
            .config
            .variants()
            .into_par_iter()
            .map(|variant| self.run_variant(variant, spec))
            .collect::<Result<Vec<VariantRun>, SNNError>>()?;

        let mut result = ExperimentResult {
            config: self.config.clone(),
            unique_id,
            runs,
            entries: vec![],
        };

        match self.config.comparison() {
            Some((reference, subject)) => {
                result.entries = result.classify_variants(reference, subject)?;
                log::info!(
                    "Classified {} against {}: {} failure entries",
                    subject.name(),
                    reference.name(),
                    result.entries.len()
                );
            }
            None => log::info!("No radiation configured, nothing to classify"),
        }

        Ok(result)
    }

    /// Build and simulate a single variant on its own topology.
    pub fn run_variant(
        &self,
        variant: SnnVariant,
        spec: &GraphSpec,
    ) -> Result<VariantRun, SNNError> {
        let adaptation = if variant.is_adapted() {
            Some(self.config.adaptation.as_ref().ok_or_else(|| {
                SNNError::InvalidGraphSpec(format!("{} requires an adaptation", variant.name()))
            })?)
        } else {
            None
        };
        let mut topology = Topology::build(spec, adaptation)?;

        let (schedule, events, hit) = if variant.is_radiated() {
            let radiation = self.config.radiation.clone().ok_or_else(|| {
                SNNError::InvalidRadiationConfig(format!(
                    "{} requires a radiation setting",
                    variant.name()
                ))
            })?;
            let schedule =
                RadiationInjector::build(radiation, self.config.seed)?.inject(&topology);
            let events = schedule.events().to_vec();
            let hit = events
                .iter()
                .map(|event| event.target_name(&topology))
                .collect::<Vec<String>>();
            (Some(schedule), events, hit)
        } else {
            (None, vec![], vec![])
        };

        log::info!("Simulating {}...", variant.name());
        let mut simulator = Simulator::new(&mut topology)?;
        if let Some(schedule) = schedule {
            simulator = simulator.with_radiation(schedule)?;
        }
        if let Some(cancel) = &self.cancel {
            simulator = simulator.with_cancel_flag(cancel.clone());
        }
        let trace = simulator.run(self.config.duration)?;

        Ok(VariantRun {
            variant,
            trace,
            events,
            hit,
        })
    }
}

/// A failure-mode entry tagged with the configuration of its run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FailureModeRecord {
    pub config: RunConfig,
    pub unique_id: String,
    pub entry: FailureModeEntry,
}

/// Which entries of a log end up in a table.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TableSelection {
    pub seed: u64,
    pub graph_size: usize,
    pub algorithm_setting: String,
    /// Spike mismatches if set, current drifts otherwise.
    pub spike_failures: bool,
    /// Keep only the first entry of every neuron of every run.
    pub first_occurrence_only: bool,
}

/// The failure-mode entries of many experiment runs.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct FailureModeLog {
    records: Vec<FailureModeRecord>,
}

impl FailureModeLog {
    pub fn new() -> Self {
        FailureModeLog::default()
    }

    /// Add the entries of an experiment result.
    pub fn push(&mut self, result: &ExperimentResult) {
        self.records
            .extend(result.entries.iter().map(|entry| FailureModeRecord {
                config: result.config.clone(),
                unique_id: result.unique_id.clone(),
                entry: entry.clone(),
            }));
    }

    pub fn records(&self) -> &[FailureModeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the records satisfying a predicate, in insertion order.
    pub fn entries_matching<P>(&self, predicate: P) -> Vec<&FailureModeRecord>
    where
        P: Fn(&RunConfig, &FailureModeEntry) -> bool,
    {
        self.records
            .iter()
            .filter(|record| predicate(&record.config, &record.entry))
            .collect()
    }

    /// Group the selected neuron ids per timestep, then per adaptation name.
    pub fn table_by_timestep(
        &self,
        selection: &TableSelection,
    ) -> BTreeMap<usize, BTreeMap<String, Vec<NeuronId>>> {
        let mut records = self.entries_matching(|config, entry| {
            config.seed == selection.seed
                && config.graph_size == selection.graph_size
                && config.algorithm_setting == selection.algorithm_setting
                && entry.category.is_spike_failure() == selection.spike_failures
        });

        if selection.first_occurrence_only {
            let mut seen = HashSet::new();
            records.retain(|record| {
                seen.insert((record.unique_id.as_str(), record.entry.neuron_id.as_str()))
            });
        }

        let mut table: BTreeMap<usize, BTreeMap<String, Vec<NeuronId>>> = BTreeMap::new();
        for record in records {
            table
                .entry(record.entry.timestep)
                .or_default()
                .entry(record.config.adaptation_name())
                .or_default()
                .push(record.entry.neuron_id.clone());
        }
        table
    }

    /// Save the log to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a log from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// Keep only the first entry of every neuron of an experiment result.
pub fn first_entries(result: &ExperimentResult) -> Vec<FailureModeEntry> {
    first_occurrence_only(&result.entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::FailureCategory;
    use crate::network::builder::{EdgeSpec, NodeSpec};

    fn relay() -> GraphSpec {
        GraphSpec::new(
            vec![
                NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0),
                NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0),
            ],
            vec![EdgeSpec::new("a", "b", 1.0)],
        )
    }

    #[test]
    fn test_variants() {
        let config = RunConfig::new(0, "relay", 5);
        assert_eq!(config.variants(), vec![SnnVariant::Baseline]);
        assert_eq!(config.comparison(), None);

        let config = config
            .with_adaptation(AdaptationSpec::redundancy(1))
            .with_radiation(RadiationConfig::neuron_death(0.1));
        assert_eq!(
            config.variants(),
            vec![
                SnnVariant::Baseline,
                SnnVariant::Adapted,
                SnnVariant::Radiated,
                SnnVariant::RadAdapted
            ]
        );
        assert_eq!(
            config.comparison(),
            Some((SnnVariant::Adapted, SnnVariant::RadAdapted))
        );
    }

    #[test]
    fn test_unique_id() {
        let config = RunConfig::new(3, "relay", 5);
        let id = config.unique_id().unwrap();
        assert_eq!(id.len(), 64);
        assert_eq!(id, config.clone().unique_id().unwrap());
        assert_ne!(id, config.with_tolerance(0.5).unique_id().unwrap());
    }

    #[test]
    fn test_without_radiation() {
        let config = RunConfig::new(0, "relay", 5).with_adaptation(AdaptationSpec::redundancy(2));
        let result = Experiment::new(config).run(&relay()).unwrap();
        assert_eq!(result.runs.len(), 2);
        assert!(result.entries.is_empty());
        assert_eq!(
            result.variant(SnnVariant::Adapted).unwrap().trace.neuron_ids().len(),
            6
        );
    }

    #[test]
    fn test_synaptic_death_silences_relay() {
        let config =
            RunConfig::new(0, "relay", 6).with_radiation(RadiationConfig::synaptic_death(1.0));
        let result = Experiment::new(config).run(&relay()).unwrap();

        let radiated = result.variant(SnnVariant::Radiated).unwrap();
        assert_eq!(radiated.hit, vec!["a -> b".to_string()]);
        assert!(radiated.trace.spike_times("b").is_empty());

        let first = first_entries(&result);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].neuron_id, "b");
        assert_eq!(first[0].timestep, 2);
        assert_eq!(first[0].category, FailureCategory::IncorrectlySilent);
    }

    #[test]
    fn test_missing_variant() {
        let result = Experiment::new(RunConfig::new(0, "relay", 2))
            .run(&relay())
            .unwrap();
        assert!(matches!(
            result.classify_variants(SnnVariant::Baseline, SnnVariant::Radiated),
            Err(SNNError::TraceMismatch(_))
        ));
    }

    #[test]
    fn test_table_by_timestep() {
        let mut log = FailureModeLog::new();
        for redundancy in [1, 2] {
            let config = RunConfig::new(0, "relay", 4)
                .with_graph_size(2)
                .with_adaptation(AdaptationSpec::redundancy(redundancy))
                .with_radiation(RadiationConfig::neuron_death(1.0));
            log.push(&Experiment::new(config).run(&relay()).unwrap());
        }
        assert!(!log.is_empty());

        let mut selection = TableSelection {
            seed: 0,
            graph_size: 2,
            algorithm_setting: "relay".to_string(),
            spike_failures: true,
            first_occurrence_only: false,
        };
        let table = log.table_by_timestep(&selection);
        let first = &table[&1];
        assert_eq!(first.len(), 2);
        assert_eq!(first["redundancy_1"], vec!["a".to_string(), "r_1_a".to_string()]);

        selection.first_occurrence_only = true;
        let table = log.table_by_timestep(&selection);
        let total = table
            .values()
            .flat_map(|row| row.values())
            .map(|ids| ids.len())
            .sum::<usize>();
        // a and its copies fail once, b and its copies once as well
        assert_eq!(total, 2 * 2 + 3 * 2);

        selection.seed = 1;
        assert!(log.table_by_timestep(&selection).is_empty());
    }
}
