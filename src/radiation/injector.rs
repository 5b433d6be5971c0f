//! Seeded injection of radiation events into a topology.
//!
//! The injector visits the eligible neurons (or synapses) of a topology in canonical
//! index order and selects each one independently with the configured probability. The
//! selection only depends on the seed and the topology, so two injectors built with the
//! same seed produce the same events on the same topology.
//!
//! # Examples
//!
//! ```
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::network::topology::Topology;
//! use snn_compare::radiation::config::RadiationConfig;
//! use snn_compare::radiation::injector::RadiationInjector;
//!
//! let spec = GraphSpec::new(
//!     vec![NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0), NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0)],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//! let topology = Topology::build(&spec, None).unwrap();
//!
//! let mut injector = RadiationInjector::build(RadiationConfig::synaptic_death(1.0), 42).unwrap();
//! let schedule = injector.inject(&topology);
//! assert_eq!(schedule.events().len(), 1);
//! ```
use derivative::Derivative;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use super::config::{Perturbation, RadiationConfig, RadiationKind};
use crate::error::SNNError;
use crate::network::topology::Topology;

/// The entity hit by a radiation event, by index in the topology.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    Neuron(usize),
    Synapse(usize),
}

/// A single radiation event.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RadiationEvent {
    pub kind: RadiationKind,
    pub target: EventTarget,
    pub magnitude: f64,
    /// The commit boundary at which the event takes effect, 0 being before the first step.
    pub onset: usize,
    /// The number of steps before the event is reverted, 0 meaning permanent.
    pub duration: usize,
}

impl RadiationEvent {
    pub fn is_permanent(&self) -> bool {
        self.duration == 0
    }

    /// The commit boundary at which a transient event is reverted.
    pub fn reverted_at(&self) -> Option<usize> {
        match self.duration {
            0 => None,
            duration => Some(self.onset + duration),
        }
    }

    /// A human readable name of the hit entity, e.g., `a` or `a -> b`.
    pub fn target_name(&self, topology: &Topology) -> String {
        match self.target {
            EventTarget::Neuron(index) => topology
                .neuron(index)
                .map(|neuron| neuron.id().to_string())
                .unwrap_or_else(|| format!("#{}", index)),
            EventTarget::Synapse(index) => match topology.synapse(index) {
                Some(synapse) => format!(
                    "{} -> {}",
                    topology.neurons()[synapse.source()].id(),
                    topology.neurons()[synapse.target()].id()
                ),
                None => format!("#{}", index),
            },
        }
    }
}

/// Draws radiation events from a seeded random number generator.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RadiationInjector {
    config: RadiationConfig,
    selector: Bernoulli,
    #[derivative(Debug = "ignore")]
    rng: ChaCha8Rng,
}

impl RadiationInjector {
    /// Create an injector for the given setting and seed.
    /// Returns an error if the setting is out of range.
    pub fn build(config: RadiationConfig, seed: u64) -> Result<Self, SNNError> {
        config.validate()?;
        let selector = Bernoulli::new(config.probability).map_err(|e| {
            SNNError::InvalidRadiationConfig(format!("{}: {}", config.kind.name(), e))
        })?;
        Ok(RadiationInjector {
            config,
            selector,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn config(&self) -> &RadiationConfig {
        &self.config
    }

    /// Draw the radiation events for a topology.
    /// Dead neurons and synapses are not eligible.
    pub fn draw(&mut self, topology: &Topology) -> Vec<RadiationEvent> {
        let targets: Vec<EventTarget> = if self.config.kind.targets_neurons() {
            topology
                .neurons()
                .iter()
                .enumerate()
                .filter(|(_, neuron)| neuron.is_alive())
                .map(|(index, _)| EventTarget::Neuron(index))
                .collect()
        } else {
            topology
                .synapses()
                .iter()
                .enumerate()
                .filter(|(_, synapse)| synapse.is_alive())
                .map(|(index, _)| EventTarget::Synapse(index))
                .collect()
        };

        let events: Vec<RadiationEvent> = targets
            .into_iter()
            .filter(|_| self.selector.sample(&mut self.rng))
            .map(|target| RadiationEvent {
                kind: self.config.kind,
                target,
                magnitude: self.config.magnitude,
                onset: self.config.onset,
                duration: self.config.duration,
            })
            .collect();

        log::info!(
            "Radiation {} drew {} events",
            self.config.name(),
            events.len()
        );
        events
    }

    /// Draw the radiation events for a topology and schedule them.
    pub fn inject(&mut self, topology: &Topology) -> RadiationSchedule {
        let events = self.draw(topology);
        RadiationSchedule::new(events, self.config.perturbation)
    }
}

/// Applies radiation events at the commit boundaries of a run, and reverts transient ones.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RadiationSchedule {
    events: Vec<RadiationEvent>,
    perturbation: Perturbation,
    /// The value of each perturbed entity before its event took effect.
    originals: Vec<Option<f64>>,
}

impl RadiationSchedule {
    pub fn new(events: Vec<RadiationEvent>, perturbation: Perturbation) -> Self {
        let originals = vec![None; events.len()];
        RadiationSchedule {
            events,
            perturbation,
            originals,
        }
    }

    /// The scheduled events.
    pub fn events(&self) -> &[RadiationEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Apply the changes due at the commit boundary of a timestep:
    /// first the transient events ending here are reverted, then the events starting
    /// here take effect.
    pub fn apply_boundary(
        &mut self,
        topology: &mut Topology,
        timestep: usize,
    ) -> Result<(), SNNError> {
        for (event, original) in self.events.iter().zip(self.originals.iter_mut()) {
            if event.reverted_at() != Some(timestep) {
                continue;
            }
            if let Some(value) = original.take() {
                log::debug!(
                    "Reverting {} on {} at timestep {}",
                    event.kind.name(),
                    event.target_name(topology),
                    timestep
                );
                set_value(topology, event, value)?;
            }
        }

        for (event, original) in self.events.iter().zip(self.originals.iter_mut()) {
            if event.onset != timestep {
                continue;
            }
            match event.kind {
                RadiationKind::NeuronDeath => {
                    neuron_mut(topology, event.target)?.kill();
                }
                RadiationKind::SynapticDeath => {
                    if let EventTarget::Synapse(index) = event.target {
                        topology
                            .synapse_mut(index)
                            .ok_or_else(|| unknown_target(event.target))?
                            .kill();
                    } else {
                        return Err(unknown_target(event.target));
                    }
                }
                RadiationKind::DeltaVth | RadiationKind::DeltaSynapticW => {
                    let value = get_value(topology, event)?;
                    let perturbed = self.perturbation.apply(value, event.magnitude);
                    if !perturbed.is_finite() {
                        return Err(SNNError::InvalidRadiationConfig(format!(
                            "{} on {} yields a non-finite value",
                            event.kind.name(),
                            event.target_name(topology)
                        )));
                    }
                    *original = Some(value);
                    set_value(topology, event, perturbed)?;
                }
            }
        }
        Ok(())
    }
}

fn unknown_target(target: EventTarget) -> SNNError {
    SNNError::InvalidTopology(format!("radiation event targets unknown {:?}", target))
}

fn neuron_mut(
    topology: &mut Topology,
    target: EventTarget,
) -> Result<&mut crate::neuron::Neuron, SNNError> {
    match target {
        EventTarget::Neuron(index) => topology
            .neuron_mut(index)
            .ok_or_else(|| unknown_target(target)),
        EventTarget::Synapse(_) => Err(unknown_target(target)),
    }
}

fn get_value(topology: &Topology, event: &RadiationEvent) -> Result<f64, SNNError> {
    match (event.kind, event.target) {
        (RadiationKind::DeltaVth, EventTarget::Neuron(index)) => topology
            .neuron(index)
            .map(|neuron| neuron.vth())
            .ok_or_else(|| unknown_target(event.target)),
        (RadiationKind::DeltaSynapticW, EventTarget::Synapse(index)) => topology
            .synapse(index)
            .map(|synapse| synapse.weight())
            .ok_or_else(|| unknown_target(event.target)),
        _ => Err(unknown_target(event.target)),
    }
}

fn set_value(topology: &mut Topology, event: &RadiationEvent, value: f64) -> Result<(), SNNError> {
    match (event.kind, event.target) {
        (RadiationKind::DeltaVth, EventTarget::Neuron(_)) => {
            neuron_mut(topology, event.target)?.set_vth(value);
            Ok(())
        }
        (RadiationKind::DeltaSynapticW, EventTarget::Synapse(index)) => {
            topology
                .synapse_mut(index)
                .ok_or_else(|| unknown_target(event.target))?
                .set_weight(value);
            Ok(())
        }
        _ => Err(unknown_target(event.target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::builder::{EdgeSpec, GraphSpec, NodeSpec};

    fn ring(size: usize) -> Topology {
        let nodes = (0..size)
            .map(|i| NodeSpec::lif(format!("n{:02}", i), 0.5, 0.0, 0.0, 1.0))
            .collect();
        let edges = (0..size)
            .map(|i| EdgeSpec::new(format!("n{:02}", i), format!("n{:02}", (i + 1) % size), 1.0))
            .collect();
        Topology::build(&GraphSpec::new(nodes, edges), None).unwrap()
    }

    #[test]
    fn test_invalid_probability() {
        assert!(matches!(
            RadiationInjector::build(RadiationConfig::neuron_death(1.01), 0),
            Err(SNNError::InvalidRadiationConfig(_))
        ));
    }

    #[test]
    fn test_extreme_probabilities() {
        let topology = ring(10);
        let mut injector = RadiationInjector::build(RadiationConfig::neuron_death(0.0), 3).unwrap();
        assert!(injector.draw(&topology).is_empty());

        let mut injector =
            RadiationInjector::build(RadiationConfig::synaptic_death(1.0), 3).unwrap();
        let events = injector.draw(&topology);
        assert_eq!(events.len(), 10);
        assert!(events
            .iter()
            .all(|event| matches!(event.target, EventTarget::Synapse(_))));
    }

    #[test]
    fn test_same_seed_same_events() {
        let topology = ring(50);
        let config = RadiationConfig::delta_vth(0.3, 0.25);
        let events_1 = RadiationInjector::build(config.clone(), 7)
            .unwrap()
            .draw(&topology);
        let events_2 = RadiationInjector::build(config.clone(), 7)
            .unwrap()
            .draw(&topology);
        assert_eq!(events_1, events_2);
        assert!(!events_1.is_empty());

        let events_3 = RadiationInjector::build(config, 8).unwrap().draw(&topology);
        assert_ne!(events_1, events_3);
    }

    #[test]
    fn test_dead_entities_are_not_eligible() {
        let mut topology = ring(4);
        topology.kill_neuron("n00").unwrap();
        let events = RadiationInjector::build(RadiationConfig::delta_vth(1.0, 1.0), 0)
            .unwrap()
            .draw(&topology);
        assert_eq!(events.len(), 3);
        assert!(!events
            .iter()
            .any(|event| event.target == EventTarget::Neuron(0)));
    }

    #[test]
    fn test_transient_weight_revert() {
        let mut topology = ring(3);
        let original = topology.synapses()[1].weight();
        let config = RadiationConfig::delta_synaptic_w(1.0, 0.7)
            .with_perturbation(Perturbation::Multiplicative)
            .transient(1, 2);
        let mut schedule = RadiationInjector::build(config, 0)
            .unwrap()
            .inject(&topology);

        schedule.apply_boundary(&mut topology, 0).unwrap();
        assert_eq!(topology.synapses()[1].weight(), original);
        schedule.apply_boundary(&mut topology, 1).unwrap();
        assert_eq!(topology.synapses()[1].weight(), original * 0.7);
        schedule.apply_boundary(&mut topology, 2).unwrap();
        assert_eq!(topology.synapses()[1].weight(), original * 0.7);
        schedule.apply_boundary(&mut topology, 3).unwrap();
        assert_eq!(topology.synapses()[1].weight(), original);
    }

    #[test]
    fn test_event_names() {
        let topology = ring(2);
        let event = RadiationEvent {
            kind: RadiationKind::SynapticDeath,
            target: EventTarget::Synapse(0),
            magnitude: 0.0,
            onset: 0,
            duration: 0,
        };
        assert_eq!(event.target_name(&topology), "n00 -> n01");
        assert!(event.is_permanent());
        assert_eq!(event.reverted_at(), None);
    }
}
