use clap::Parser;
use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use sha2::{Digest, Sha256};
use std::path::Path;

use snn_compare::error::SNNError;
use snn_compare::experiment::{first_entries, Experiment, RunConfig};
use snn_compare::network::adaptation::AdaptationSpec;
use snn_compare::network::builder::GraphSpec;
use snn_compare::radiation::config::{Perturbation, RadiationConfig, RadiationKind};
use snn_compare::U_TOLERANCE;

#[derive(Parser, Debug)]
struct Args {
    /// The JSON graph specification to simulate
    #[arg(long)]
    graph: String,
    /// The seed used for radiation draws
    #[arg(long)]
    seed: u64,
    /// The name of the algorithm setting the graph implements
    #[arg(long, default_value = "default")]
    algorithm_setting: String,
    /// The number of simulated timesteps
    #[arg(short = 'T', long, default_value = "50")]
    duration: usize,
    /// The number of redundant copies of every neuron, 0 for no adaptation
    #[arg(short = 'r', long, default_value = "0")]
    redundancy: usize,
    /// The radiation kind, must be one of:
    /// neuron_death, synaptic_death, delta_vth, delta_synaptic_w
    #[arg(long)]
    radiation: Option<String>,
    /// The probability for every neuron or synapse to be hit
    #[arg(short = 'p', long, default_value = "0.1")]
    probability: f64,
    /// The perturbation magnitude of delta_vth and delta_synaptic_w
    #[arg(long, default_value = "0.0")]
    magnitude: f64,
    /// How the magnitude combines with the original value, must be one of: additive, multiplicative
    #[arg(long, default_value = "additive")]
    perturbation: String,
    /// The timestep at which perturbations start
    #[arg(long, default_value = "0")]
    onset: usize,
    /// The number of timesteps perturbations last, 0 for permanent
    #[arg(long, default_value = "0")]
    transient: usize,
    /// The current tolerance of the failure-mode classifier
    #[arg(long, default_value_t = U_TOLERANCE)]
    tolerance: f64,
    /// Only report the first failure of every neuron
    #[arg(long)]
    first_occurrence_only: bool,
    /// The result file, defaults to results/<hash>.json
    #[arg(short = 'o', long)]
    output: Option<String>,
}

fn main() -> Result<(), SNNError> {
    let args = Args::parse();

    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", args));
    let hash = hasher.finalize();
    let log_path = format!("log/{:x}.log", hash);
    let results_path = args
        .output
        .clone()
        .unwrap_or_else(|| format!("results/{:x}.json", hash));

    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build(log_path)
        .map_err(|e| SNNError::IOError(e.to_string()))?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(LevelFilter::Info))
        .map_err(|e| SNNError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| SNNError::IOError(e.to_string()))?;

    log::info!("{:?}", args);

    let spec = GraphSpec::load_from(&args.graph)?;
    log::info!("Graph loading: done! {} nodes", spec.size());

    let mut config = RunConfig::new(args.seed, args.algorithm_setting.clone(), args.duration)
        .with_graph_size(spec.size())
        .with_tolerance(args.tolerance);
    if args.redundancy > 0 {
        config = config.with_adaptation(AdaptationSpec::redundancy(args.redundancy));
    }
    if let Some(kind) = &args.radiation {
        config = config.with_radiation(RadiationConfig {
            kind: kind.parse::<RadiationKind>()?,
            probability: args.probability,
            magnitude: args.magnitude,
            perturbation: args.perturbation.parse::<Perturbation>()?,
            onset: args.onset,
            duration: args.transient,
        });
    }

    let mut result = Experiment::new(config).run(&spec)?;
    log::info!("Experiment: done! Id {}", result.unique_id);

    for run in result.runs.iter().filter(|run| !run.hit.is_empty()) {
        log::info!(
            "Radiation hit {} entities in {}: {}",
            run.hit.len(),
            run.variant.name(),
            run.hit.join(", ")
        );
    }

    if args.first_occurrence_only {
        result.entries = first_entries(&result);
    }
    for entry in result.entries.iter() {
        log::info!(
            "t={} {} {}",
            entry.timestep,
            entry.neuron_id,
            entry.category.name()
        );
    }

    if let Some(parent) = Path::new(&results_path).parent() {
        std::fs::create_dir_all(parent).map_err(|e| SNNError::IOError(e.to_string()))?;
    }
    result.save_to(&results_path)?;
    log::info!("Results saving: done! Saved to {}", results_path);

    Ok(())
}
