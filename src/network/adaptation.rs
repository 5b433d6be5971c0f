//! Redundancy adaptation of a topology.
//!
//! With redundancy `r`, every neuron `n` is doubled by `r` copies named `r_<k>_<n>`
//! (`k = 1..=r`) with the same parameters. Every synapse `s -> t` of weight `w` is
//! replicated from every copy of `s` to every copy of `t` with weight `w / (r + 1)`, so a
//! target copy receives the original input as long as all copies of its source fire.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::topology::Topology;
use crate::error::SNNError;
use crate::neuron::NeuronId;
use crate::synapse::Synapse;

/// The kind of adaptation applied to a topology.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationKind {
    /// Add redundant copies of every neuron.
    Redundancy,
}

/// An adaptation and its redundancy factor.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct AdaptationSpec {
    pub kind: AdaptationKind,
    pub redundancy: usize,
}

impl AdaptationSpec {
    pub fn redundancy(redundancy: usize) -> Self {
        AdaptationSpec {
            kind: AdaptationKind::Redundancy,
            redundancy,
        }
    }

    /// The name of the adaptation, e.g., `redundancy_2`.
    pub fn name(&self) -> String {
        match self.kind {
            AdaptationKind::Redundancy => format!("redundancy_{}", self.redundancy),
        }
    }

    /// The id of the k-th copy (starting at 1) of a neuron.
    pub fn copy_id(neuron_id: &str, k: usize) -> NeuronId {
        format!("r_{}_{}", k, neuron_id)
    }

    /// Returns the adapted version of an unadapted topology.
    /// Liveness of neurons and synapses is carried over to their copies.
    pub fn apply(&self, topology: &Topology) -> Result<Topology, SNNError> {
        if self.redundancy == 0 {
            return Err(SNNError::InvalidGraphSpec(
                "redundancy must be at least 1".to_string(),
            ));
        }
        if topology.is_adapted() {
            return Err(SNNError::InvalidGraphSpec(
                "the topology is already adapted".to_string(),
            ));
        }

        let num_neurons = topology.num_neurons();
        let num_copies = self.redundancy + 1;

        // copy c of neuron i lives at index c * num_neurons + i, copy 0 being the original
        let mut neurons = Vec::with_capacity(num_neurons * num_copies);
        neurons.extend(topology.neurons().iter().cloned());
        let mut adaptation: BTreeMap<NeuronId, Vec<NeuronId>> = BTreeMap::new();
        for k in 1..num_copies {
            for neuron in topology.neurons().iter() {
                let id = Self::copy_id(neuron.id(), k);
                let mut copy = neuron.duplicate(id.clone());
                if !neuron.is_alive() {
                    copy.kill();
                }
                adaptation
                    .entry(neuron.id().to_string())
                    .or_default()
                    .push(id);
                neurons.push(copy);
            }
        }

        let mut synapses = Vec::with_capacity(topology.num_synapses() * num_copies * num_copies);
        for synapse in topology.synapses().iter() {
            let weight = synapse.weight() / num_copies as f64;
            for c_source in 0..num_copies {
                for c_target in 0..num_copies {
                    let mut copy = Synapse::build(
                        c_source * num_neurons + synapse.source(),
                        c_target * num_neurons + synapse.target(),
                        weight,
                    )?;
                    if !synapse.is_alive() {
                        copy.kill();
                    }
                    synapses.push(copy);
                }
            }
        }

        let adapted = Topology::new(neurons, synapses, adaptation)?;
        log::info!(
            "Adaptation {} applied: {} neurons, {} synapses",
            self.name(),
            adapted.num_neurons(),
            adapted.num_synapses()
        );
        Ok(adapted)
    }
}
