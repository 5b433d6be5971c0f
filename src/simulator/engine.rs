//! The synchronous two-phase propagation engine.
//!
//! Every timestep `t` is executed in two phases over the whole topology:
//! 1. each live neuron computes its next state from its committed state and its current
//!    input, and the signals of the neurons firing at `t` are accumulated into the input
//!    of their targets for `t + 1`;
//! 2. all neurons commit their new state at once.
//!
//! No neuron ever observes a partially updated state of another neuron within a step,
//! and every input is summed over the incoming synapses in canonical order, so a run is
//! independent of the order in which neurons or synapses were declared.
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::trace::{NeuronSnapshot, TimestepSnapshot, Trace};
use crate::error::SNNError;
use crate::network::topology::Topology;
use crate::neuron::NeuronUpdate;
use crate::radiation::injector::RadiationSchedule;

/// Minimum number of neurons to compute the first phase in parallel.
pub const MIN_NEURONS_PAR: usize = 10_000;

/// A flag shared with a running simulation to abort it at the next step boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a topology through discrete timesteps.
/// The simulator has exclusive access to the topology for the whole run.
#[derive(Debug)]
pub struct Simulator<'a> {
    topology: &'a mut Topology,
    timestep: usize,
    radiation: Option<RadiationSchedule>,
    cancel: Option<CancelFlag>,
}

impl<'a> Simulator<'a> {
    /// Prepare a topology for a run from the zero state of t=0.
    /// Returns an error if the topology is structurally invalid.
    pub fn new(topology: &'a mut Topology) -> Result<Self, SNNError> {
        topology.validate()?;
        topology.reset_state();
        Ok(Simulator {
            topology,
            timestep: 0,
            radiation: None,
            cancel: None,
        })
    }

    /// Attach a radiation schedule to the run.
    /// The events with onset 0 take effect immediately, before the first step.
    pub fn with_radiation(mut self, mut schedule: RadiationSchedule) -> Result<Self, SNNError> {
        schedule.apply_boundary(self.topology, self.timestep)?;
        self.radiation = Some(schedule);
        Ok(self)
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The last committed timestep, 0 before the first step.
    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn topology(&self) -> &Topology {
        self.topology
    }

    /// Execute one timestep and return the committed state of every neuron.
    pub fn step(&mut self) -> Result<TimestepSnapshot, SNNError> {
        let timestep = self.timestep + 1;
        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                return Err(SNNError::Cancelled { timestep });
            }
        }

        // Phase 1: compute the next state of every neuron from the committed states
        let updates: Vec<NeuronUpdate> = if self.topology.num_neurons() > MIN_NEURONS_PAR {
            self.topology
                .neurons()
                .par_iter()
                .map(|neuron| neuron.compute())
                .collect()
        } else {
            self.topology
                .neurons()
                .iter()
                .map(|neuron| neuron.compute())
                .collect()
        };

        for (neuron, update) in self.topology.neurons().iter().zip(updates.iter()) {
            if !update.is_finite() {
                return Err(SNNError::NumericFault {
                    neuron_id: neuron.id().to_string(),
                    timestep,
                });
            }
        }

        // Accumulate the signals of the firing neurons for the next step
        let signals = (0..self.topology.num_neurons())
            .map(|target| {
                self.topology
                    .incoming(target)
                    .iter()
                    .map(|&k| {
                        let synapse = &self.topology.synapses()[k];
                        synapse.transmit(updates[synapse.source()].spiked)
                    })
                    .sum::<f64>()
            })
            .collect::<Vec<f64>>();

        for (neuron, signal) in self.topology.neurons().iter().zip(signals.iter()) {
            if !signal.is_finite() {
                return Err(SNNError::NumericFault {
                    neuron_id: neuron.id().to_string(),
                    timestep,
                });
            }
        }

        // Phase 2: commit all neurons at once
        for (index, (update, signal)) in updates.into_iter().zip(signals).enumerate() {
            if let Some(neuron) = self.topology.neuron_mut(index) {
                neuron.receive(signal);
                neuron.commit(update);
            }
        }
        self.timestep = timestep;

        if let Some(radiation) = self.radiation.as_mut() {
            radiation.apply_boundary(self.topology, timestep)?;
        }

        Ok(TimestepSnapshot {
            timestep,
            neurons: self
                .topology
                .neurons()
                .iter()
                .map(|neuron| NeuronSnapshot::new(neuron.u(), neuron.v(), neuron.spiked()))
                .collect(),
        })
    }

    /// Execute the given number of timesteps and return the recorded trace.
    pub fn run(&mut self, duration: usize) -> Result<Trace, SNNError> {
        log::info!(
            "Starting simulation of {} neurons for {} timesteps...",
            self.topology.num_neurons(),
            duration
        );

        let mut trace = Trace::new(self.topology.neuron_ids())?;
        let log_interval = (duration / 100).max(1);

        for _ in 0..duration {
            let snapshot = self.step()?;
            if snapshot.timestep % log_interval == 0 {
                log::debug!(
                    "Simulation progress: {:.2}% (Timestep: {}/{})",
                    100.0 * snapshot.timestep as f64 / duration as f64,
                    snapshot.timestep,
                    duration
                );
            }
            trace.push(snapshot)?;
        }

        log::info!("Simulation completed successfully!");
        Ok(trace)
    }
}

/// Run a topology for the given number of timesteps, without radiation.
pub fn run(topology: &mut Topology, duration: usize) -> Result<Trace, SNNError> {
    Simulator::new(topology)?.run(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
    use crate::radiation::config::RadiationConfig;
    use crate::radiation::injector::RadiationInjector;

    fn relay() -> GraphSpec {
        GraphSpec::new(
            vec![
                NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0),
                NodeSpec::lif("b", 0.0, 0.0, 0.0, 1.0),
            ],
            vec![EdgeSpec::new("a", "b", 1.0)],
        )
    }

    #[test]
    fn test_relay_spikes_one_step_later() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        let trace = run(&mut topology, 3).unwrap();

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.spike_times("a"), vec![1, 2, 3]);
        assert_eq!(trace.spike_times("b")[0], 2);
        assert!(!trace.snapshot(1, "b").unwrap().spiked);
    }

    #[test]
    fn test_killed_synapse_silences_target() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        topology.kill_synapse("a", "b").unwrap();
        let trace = run(&mut topology, 20).unwrap();

        assert_eq!(trace.spike_times("a").len(), 20);
        assert!(trace.spike_times("b").is_empty());
    }

    #[test]
    fn test_spike_resets_potential() {
        let spec = GraphSpec::new(vec![NodeSpec::lif("a", 0.5, 0.0, 0.0, 1.0)], vec![]);
        let mut topology = Topology::build(&spec, None).unwrap();
        let trace = run(&mut topology, 4).unwrap();

        assert_eq!(trace.snapshot(1, "a").unwrap().v, 0.5);
        assert_eq!(trace.spike_times("a"), vec![2, 4]);
        assert_eq!(trace.snapshot(2, "a").unwrap().v, 0.0);
    }

    #[test]
    fn test_zero_duration() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        let trace = run(&mut topology, 0).unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.neuron_ids(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_empty_topology() {
        let mut topology = Topology::build(&GraphSpec::default(), None).unwrap();
        let trace = run(&mut topology, 5).unwrap();
        assert_eq!(trace.len(), 5);
        assert!(trace.iter().all(|step| step.neurons.is_empty()));
    }

    #[test]
    fn test_numeric_fault_names_neuron() {
        let spec = GraphSpec::new(
            vec![NodeSpec::lif("a", -f64::MAX / 2.0, 0.0, 1.0, 1.0)],
            vec![],
        );
        let mut topology = Topology::build(&spec, None).unwrap();
        let error = run(&mut topology, 10).unwrap_err();
        assert!(matches!(
            error,
            SNNError::NumericFault { ref neuron_id, .. } if neuron_id == "a"
        ));
    }

    #[test]
    fn test_numeric_fault_on_spiking_overflow() {
        let spec = GraphSpec::new(
            vec![
                NodeSpec::lif("a", f64::MAX, 0.0, 0.0, 1.0),
                NodeSpec::lif("b", f64::MAX, 0.0, 0.0, 1.0),
            ],
            vec![EdgeSpec::new("a", "b", f64::MAX / 4.0)],
        );
        let mut topology = Topology::build(&spec, None).unwrap();
        assert_eq!(
            run(&mut topology, 4).unwrap_err(),
            SNNError::NumericFault {
                neuron_id: "b".to_string(),
                timestep: 2
            }
        );
    }

    #[test]
    fn test_cancel_before_next_step() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        let cancel = CancelFlag::new();
        let mut simulator = Simulator::new(&mut topology)
            .unwrap()
            .with_cancel_flag(cancel.clone());

        simulator.step().unwrap();
        cancel.cancel();
        assert_eq!(simulator.step(), Err(SNNError::Cancelled { timestep: 2 }));
        assert_eq!(simulator.timestep(), 1);
    }

    #[test]
    fn test_neuron_death_at_onset() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        let schedule = RadiationInjector::build(RadiationConfig::neuron_death(1.0), 0)
            .unwrap()
            .inject(&topology);
        let trace = Simulator::new(&mut topology)
            .unwrap()
            .with_radiation(schedule)
            .unwrap()
            .run(10)
            .unwrap();

        assert!(trace.spike_times("a").is_empty());
        assert!(trace.spike_times("b").is_empty());
    }

    #[test]
    fn test_rerun_starts_from_zero_state() {
        let mut topology = Topology::build(&relay(), None).unwrap();
        let first = run(&mut topology, 7).unwrap();
        let second = run(&mut topology, 7).unwrap();
        assert_eq!(first, second);
    }
}
