//! Module implementing the synapses of a topology.

use serde::{Deserialize, Serialize};

use crate::error::SNNError;

/// Represents a directed synapse between two neurons of a topology.
/// Neurons are referred to by their index in the topology.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Synapse {
    /// Source index
    source: usize,
    /// Target index
    target: usize,
    /// Synaptic weight
    weight: f64,
    /// A dead synapse transmits nothing
    #[serde(default = "alive_default")]
    alive: bool,
}

fn alive_default() -> bool {
    true
}

impl Synapse {
    /// Create a new live synapse with the specified parameters.
    /// Returns an error if the weight is not finite.
    pub fn build(source: usize, target: usize, weight: f64) -> Result<Self, SNNError> {
        if !weight.is_finite() {
            return Err(SNNError::InvalidParameter(format!(
                "synapse {} -> {}: weight must be finite, got {}",
                source, target, weight
            )));
        }

        Ok(Synapse {
            source,
            target,
            weight,
            alive: true,
        })
    }

    /// Returns the index of the source neuron.
    pub fn source(&self) -> usize {
        self.source
    }

    /// Returns the index of the target neuron.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Returns the weight of the synapse.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Set the weight of the synapse.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Permanently disable the synapse.
    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// The signal delivered to the target for a given source spike state.
    pub fn transmit(&self, source_spiked: bool) -> f64 {
        match (self.alive, source_spiked) {
            (true, true) => self.weight,
            _ => 0.0,
        }
    }
}
