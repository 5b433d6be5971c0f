//! The topology owns every neuron and synapse of a network.
//!
//! Neurons are kept sorted by id so that their index order is canonical: two topologies
//! describing the same graph have the same layout, whatever order their records were
//! provided in. Synapses refer to neurons by index and are sorted by `(source, target)`.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::neuron::{Neuron, NeuronId};
use crate::synapse::Synapse;

/// A directed graph of neurons and synapses with index-based adjacency.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Topology {
    neurons: Vec<Neuron>,
    synapses: Vec<Synapse>,
    /// Maps every original neuron to the neurons added to reproduce its output.
    adaptation: BTreeMap<NeuronId, Vec<NeuronId>>,
    #[serde(skip)]
    outgoing: Vec<Vec<usize>>,
    #[serde(skip)]
    incoming: Vec<Vec<usize>>,
}

impl<'de> Deserialize<'de> for Topology {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TopologyData {
            neurons: Vec<Neuron>,
            synapses: Vec<Synapse>,
            #[serde(default)]
            adaptation: BTreeMap<NeuronId, Vec<NeuronId>>,
        }

        let data = TopologyData::deserialize(deserializer)?;
        Topology::new(data.neurons, data.synapses, data.adaptation)
            .map_err(serde::de::Error::custom)
    }
}

impl Topology {
    /// Create a topology from neurons and synapses indexing into `neurons`.
    /// The neurons are reordered by id and the synapse indices remapped accordingly.
    /// Returns an error for duplicate neuron ids, dangling or duplicate synapses,
    /// and adaptation entries naming unknown neurons.
    pub fn new(
        neurons: Vec<Neuron>,
        synapses: Vec<Synapse>,
        adaptation: BTreeMap<NeuronId, Vec<NeuronId>>,
    ) -> Result<Self, SNNError> {
        let num_neurons = neurons.len();

        let mut indexed: Vec<(usize, Neuron)> = neurons.into_iter().enumerate().collect();
        indexed.sort_by(|(_, n1), (_, n2)| n1.id().cmp(n2.id()));
        if let Some(w) = indexed.windows(2).find(|w| w[0].1.id() == w[1].1.id()) {
            return Err(SNNError::InvalidTopology(format!(
                "duplicate neuron id {}",
                w[0].1.id()
            )));
        }

        // position[old index] = new index
        let mut position = vec![0; num_neurons];
        for (new, (old, _)) in indexed.iter().enumerate() {
            position[*old] = new;
        }
        let neurons: Vec<Neuron> = indexed.into_iter().map(|(_, neuron)| neuron).collect();

        let mut remapped = Vec::with_capacity(synapses.len());
        for synapse in synapses.into_iter() {
            if synapse.source() >= num_neurons || synapse.target() >= num_neurons {
                return Err(SNNError::InvalidTopology(format!(
                    "synapse {} -> {} refers to a neuron outside of the {} neurons",
                    synapse.source(),
                    synapse.target(),
                    num_neurons
                )));
            }
            let mut moved = Synapse::build(
                position[synapse.source()],
                position[synapse.target()],
                synapse.weight(),
            )?;
            if !synapse.is_alive() {
                moved.kill();
            }
            remapped.push(moved);
        }
        remapped.sort_by_key(|synapse| (synapse.source(), synapse.target()));

        if let Some(w) = remapped
            .windows(2)
            .find(|w| w[0].source() == w[1].source() && w[0].target() == w[1].target())
        {
            return Err(SNNError::InvalidTopology(format!(
                "duplicate synapse {} -> {}",
                neurons[w[0].source()].id(),
                neurons[w[0].target()].id()
            )));
        }

        let mut topology = Topology {
            neurons,
            synapses: remapped,
            adaptation,
            outgoing: vec![],
            incoming: vec![],
        };
        topology.index();

        for (original, copies) in topology.adaptation.iter() {
            if let Some(unknown) = std::iter::once(original)
                .chain(copies.iter())
                .find(|id| topology.index_of(id).is_none())
            {
                return Err(SNNError::InvalidTopology(format!(
                    "adaptation refers to unknown neuron {}",
                    unknown
                )));
            }
        }

        Ok(topology)
    }

    /// Rebuild the adjacency lists. Incoming lists are sorted by source index.
    fn index(&mut self) {
        self.outgoing = vec![vec![]; self.neurons.len()];
        self.incoming = vec![vec![]; self.neurons.len()];
        for (k, synapse) in self.synapses.iter().enumerate() {
            self.outgoing[synapse.source()].push(k);
            self.incoming[synapse.target()].push(k);
        }
    }

    /// Check the structural invariants of the topology.
    pub fn validate(&self) -> Result<(), SNNError> {
        let num_neurons = self.neurons.len();
        for synapse in self.synapses.iter() {
            if synapse.source() >= num_neurons || synapse.target() >= num_neurons {
                return Err(SNNError::InvalidTopology(format!(
                    "dangling synapse {} -> {}",
                    synapse.source(),
                    synapse.target()
                )));
            }
        }
        if self.outgoing.len() != num_neurons || self.incoming.len() != num_neurons {
            return Err(SNNError::InvalidTopology(
                "adjacency does not match the neurons".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for neuron in self.neurons.iter() {
            if !seen.insert(neuron.id()) {
                return Err(SNNError::InvalidTopology(format!(
                    "duplicate neuron id {}",
                    neuron.id()
                )));
            }
        }
        Ok(())
    }

    /// The number of neurons in the topology.
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    /// The number of synapses in the topology.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// The neurons, sorted by id.
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    pub fn neuron(&self, index: usize) -> Option<&Neuron> {
        self.neurons.get(index)
    }

    pub fn neuron_mut(&mut self, index: usize) -> Option<&mut Neuron> {
        self.neurons.get_mut(index)
    }

    pub fn synapse(&self, index: usize) -> Option<&Synapse> {
        self.synapses.get(index)
    }

    pub fn synapse_mut(&mut self, index: usize) -> Option<&mut Synapse> {
        self.synapses.get_mut(index)
    }

    /// Returns the index of the neuron with the given id, if any.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.neurons
            .binary_search_by(|neuron| neuron.id().cmp(id))
            .ok()
    }

    /// Returns the neuron with the given id, if any.
    pub fn neuron_by_id(&self, id: &str) -> Option<&Neuron> {
        self.index_of(id).map(|index| &self.neurons[index])
    }

    /// Returns the index of the synapse from `source_id` to `target_id`, if any.
    pub fn synapse_between(&self, source_id: &str, target_id: &str) -> Option<usize> {
        let source = self.index_of(source_id)?;
        let target = self.index_of(target_id)?;
        self.outgoing[source]
            .iter()
            .copied()
            .find(|&k| self.synapses[k].target() == target)
    }

    /// The indices of the synapses leaving a neuron.
    pub fn outgoing(&self, index: usize) -> &[usize] {
        &self.outgoing[index]
    }

    /// The indices of the synapses reaching a neuron, sorted by source index.
    pub fn incoming(&self, index: usize) -> &[usize] {
        &self.incoming[index]
    }

    /// The neuron ids in canonical order.
    pub fn neuron_ids(&self) -> Vec<NeuronId> {
        self.neurons.iter().map(|neuron| neuron.id().to_string()).collect()
    }

    /// The adaptation relation, empty for an unadapted topology.
    pub fn adaptation(&self) -> &BTreeMap<NeuronId, Vec<NeuronId>> {
        &self.adaptation
    }

    pub fn is_adapted(&self) -> bool {
        !self.adaptation.is_empty()
    }

    /// Kill the neuron with the given id.
    pub fn kill_neuron(&mut self, id: &str) -> Result<(), SNNError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| SNNError::InvalidTopology(format!("unknown neuron {}", id)))?;
        self.neurons[index].kill();
        Ok(())
    }

    /// Kill the synapse from `source_id` to `target_id`.
    pub fn kill_synapse(&mut self, source_id: &str, target_id: &str) -> Result<(), SNNError> {
        let index = self.synapse_between(source_id, target_id).ok_or_else(|| {
            SNNError::InvalidTopology(format!("unknown synapse {} -> {}", source_id, target_id))
        })?;
        self.synapses[index].kill();
        Ok(())
    }

    /// Restore the zero dynamic state of every neuron.
    pub fn reset_state(&mut self) {
        self.neurons.iter_mut().for_each(|neuron| neuron.reset());
    }

    /// Save the topology to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a topology from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}
