//! This module contains the trace recorded by a simulation run.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::SNNError;
use crate::neuron::NeuronId;

/// The committed state of a neuron at the end of a timestep.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct NeuronSnapshot {
    pub u: f64,
    pub v: f64,
    pub spiked: bool,
}

impl NeuronSnapshot {
    pub fn new(u: f64, v: f64, spiked: bool) -> Self {
        NeuronSnapshot { u, v, spiked }
    }
}

/// The state of every neuron at the end of a timestep, in canonical neuron order.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TimestepSnapshot {
    pub timestep: usize,
    pub neurons: Vec<NeuronSnapshot>,
}

/// Represents the per-timestep snapshots of a run, starting at timestep 1.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Trace {
    neuron_ids: Vec<NeuronId>,
    steps: Vec<TimestepSnapshot>,
}

impl<'de> Deserialize<'de> for Trace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct TraceData {
            neuron_ids: Vec<NeuronId>,
            steps: Vec<TimestepSnapshot>,
        }

        let data = TraceData::deserialize(deserializer)?;
        let mut trace = Trace::new(data.neuron_ids).map_err(serde::de::Error::custom)?;
        for snapshot in data.steps.into_iter() {
            trace.push(snapshot).map_err(serde::de::Error::custom)?;
        }
        Ok(trace)
    }
}

impl Trace {
    /// Create an empty trace over the given neurons.
    /// Returns an error if a neuron id appears more than once.
    pub fn new(neuron_ids: Vec<NeuronId>) -> Result<Self, SNNError> {
        let mut seen = HashSet::with_capacity(neuron_ids.len());
        if let Some(id) = neuron_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(SNNError::TraceMismatch(format!(
                "neuron {} appears more than once",
                id
            )));
        }
        Ok(Trace {
            neuron_ids,
            steps: vec![],
        })
    }

    /// Create a trace from per-timestep snapshots; the i-th entry is timestep i + 1.
    /// Returns an error if a neuron id is repeated or a timestep does not cover every neuron.
    pub fn from_steps(
        neuron_ids: Vec<NeuronId>,
        steps: Vec<Vec<NeuronSnapshot>>,
    ) -> Result<Self, SNNError> {
        let mut trace = Trace::new(neuron_ids)?;
        for (i, neurons) in steps.into_iter().enumerate() {
            trace.push(TimestepSnapshot {
                timestep: i + 1,
                neurons,
            })?;
        }
        Ok(trace)
    }

    /// Append the snapshot of the next timestep.
    pub(crate) fn push(&mut self, snapshot: TimestepSnapshot) -> Result<(), SNNError> {
        if snapshot.neurons.len() != self.neuron_ids.len() {
            return Err(SNNError::TraceMismatch(format!(
                "timestep {} has {} neurons instead of {}",
                snapshot.timestep,
                snapshot.neurons.len(),
                self.neuron_ids.len()
            )));
        }
        if snapshot.timestep != self.steps.len() + 1 {
            return Err(SNNError::TraceMismatch(format!(
                "expected timestep {}, got {}",
                self.steps.len() + 1,
                snapshot.timestep
            )));
        }
        self.steps.push(snapshot);
        Ok(())
    }

    /// The neuron ids, in the order of the snapshots.
    pub fn neuron_ids(&self) -> &[NeuronId] {
        &self.neuron_ids
    }

    /// The number of recorded timesteps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the position of a neuron in the snapshots.
    pub fn index_of(&self, neuron_id: &str) -> Option<usize> {
        self.neuron_ids.iter().position(|id| id == neuron_id)
    }

    /// Returns the snapshot of a timestep (starting at 1).
    pub fn at(&self, timestep: usize) -> Option<&TimestepSnapshot> {
        timestep
            .checked_sub(1)
            .and_then(|index| self.steps.get(index))
    }

    /// Returns the snapshot of a neuron at a given timestep.
    pub fn snapshot(&self, timestep: usize, neuron_id: &str) -> Option<&NeuronSnapshot> {
        let index = self.index_of(neuron_id)?;
        self.at(timestep).map(|step| &step.neurons[index])
    }

    /// Iterate over the timesteps in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &TimestepSnapshot> + '_ {
        self.steps.iter()
    }

    /// The timesteps at which a neuron fired.
    pub fn spike_times(&self, neuron_id: &str) -> Vec<usize> {
        match self.index_of(neuron_id) {
            Some(index) => self
                .steps
                .iter()
                .filter(|step| step.neurons[index].spiked)
                .map(|step| step.timestep)
                .collect(),
            None => vec![],
        }
    }
}
