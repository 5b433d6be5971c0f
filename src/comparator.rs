//! This module provides a comparator classifying the divergence between two traces.
//!
//! # Examples
//!
//! ```rust
//! use snn_compare::comparator::{Comparator, FailureCategory};
//! use snn_compare::simulator::trace::{NeuronSnapshot, Trace};
//!
//! let ids = vec!["x".to_string()];
//! let quiet = NeuronSnapshot::new(0.0, 0.0, false);
//! let fired = NeuronSnapshot::new(0.0, 0.0, true);
//!
//! let reference = Trace::from_steps(ids.clone(), vec![vec![quiet]; 3]).unwrap();
//! let subject = Trace::from_steps(ids, vec![vec![quiet], vec![fired], vec![quiet]]).unwrap();
//!
//! let entries = Comparator::default().classify(&reference, &subject).unwrap();
//! assert_eq!(entries.len(), 1);
//! assert_eq!(entries[0].timestep, 2);
//! assert_eq!(entries[0].category, FailureCategory::IncorrectlySpikes);
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::SNNError;
use crate::neuron::NeuronId;
use crate::simulator::trace::{NeuronSnapshot, Trace};
use crate::U_TOLERANCE;

/// The categories of divergence of a subject neuron from its reference.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The subject fires while the reference does not.
    IncorrectlySpikes,
    /// The reference fires while the subject does not.
    IncorrectlySilent,
    /// The subject current exceeds the reference one.
    ExcitatoryDeltaU,
    /// The subject current falls below the reference one.
    InhibitoryDeltaU,
}

impl FailureCategory {
    pub fn name(&self) -> &'static str {
        match self {
            FailureCategory::IncorrectlySpikes => "incorrectly_spikes",
            FailureCategory::IncorrectlySilent => "incorrectly_silent",
            FailureCategory::ExcitatoryDeltaU => "excitatory_delta_u",
            FailureCategory::InhibitoryDeltaU => "inhibitory_delta_u",
        }
    }

    /// The category obtained when reference and subject are swapped.
    pub fn mirrored(&self) -> Self {
        match self {
            FailureCategory::IncorrectlySpikes => FailureCategory::IncorrectlySilent,
            FailureCategory::IncorrectlySilent => FailureCategory::IncorrectlySpikes,
            FailureCategory::ExcitatoryDeltaU => FailureCategory::InhibitoryDeltaU,
            FailureCategory::InhibitoryDeltaU => FailureCategory::ExcitatoryDeltaU,
        }
    }

    /// Whether the category is a spike mismatch (as opposed to a current drift).
    pub fn is_spike_failure(&self) -> bool {
        matches!(
            self,
            FailureCategory::IncorrectlySpikes | FailureCategory::IncorrectlySilent
        )
    }
}

/// A neuron diverging from the reference at a given timestep.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct FailureModeEntry {
    pub timestep: usize,
    pub neuron_id: NeuronId,
    pub category: FailureCategory,
}

/// Represents a comparator between a reference trace and a subject trace.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Comparator {
    /// The largest current difference not reported as a drift.
    tolerance: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator {
            tolerance: U_TOLERANCE,
        }
    }
}

impl Comparator {
    /// Create a comparator with the given current tolerance.
    /// Returns an error if the tolerance is negative or not finite.
    pub fn build(tolerance: f64) -> Result<Self, SNNError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SNNError::InvalidParameter(format!(
                "tolerance must be finite and non-negative, got {}",
                tolerance
            )));
        }
        Ok(Comparator { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Classify a single neuron at a single timestep, spike mismatches first.
    pub fn category(
        &self,
        reference: &NeuronSnapshot,
        subject: &NeuronSnapshot,
    ) -> Option<FailureCategory> {
        let delta_u = subject.u - reference.u;
        match (reference.spiked, subject.spiked) {
            (false, true) => Some(FailureCategory::IncorrectlySpikes),
            (true, false) => Some(FailureCategory::IncorrectlySilent),
            _ if delta_u > self.tolerance => Some(FailureCategory::ExcitatoryDeltaU),
            _ if delta_u < -self.tolerance => Some(FailureCategory::InhibitoryDeltaU),
            _ => None,
        }
    }

    /// Classify every neuron at every timestep of the subject against the reference.
    /// Entries are ordered by timestep, then by neuron order of the reference.
    /// The subject may list the same neurons in another order.
    /// Returns an error if the traces differ in length or in their sets of neurons.
    pub fn classify(
        &self,
        reference: &Trace,
        subject: &Trace,
    ) -> Result<Vec<FailureModeEntry>, SNNError> {
        if reference.len() != subject.len() {
            return Err(SNNError::TraceMismatch(format!(
                "reference has {} timesteps, subject has {}",
                reference.len(),
                subject.len()
            )));
        }
        let subject_index: HashMap<&str, usize> = subject
            .neuron_ids()
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();
        let order = reference
            .neuron_ids()
            .iter()
            .filter_map(|id| subject_index.get(id.as_str()).copied())
            .collect::<Vec<usize>>();
        if order.len() != reference.neuron_ids().len()
            || order.len() != subject.neuron_ids().len()
        {
            let missing = reference
                .neuron_ids()
                .iter()
                .filter(|id| subject.index_of(id).is_none())
                .chain(
                    subject
                        .neuron_ids()
                        .iter()
                        .filter(|id| reference.index_of(id).is_none()),
                )
                .join(", ");
            return Err(SNNError::TraceMismatch(format!(
                "neurons differ between reference and subject: [{}]",
                missing
            )));
        }

        let entries = reference
            .iter()
            .zip_eq(subject.iter())
            .flat_map(|(step_r, step_s)| {
                reference
                    .neuron_ids()
                    .iter()
                    .zip_eq(step_r.neurons.iter().zip_eq(order.iter()))
                    .filter_map(move |(id, (snapshot_r, &index_s))| {
                        self.category(snapshot_r, &step_s.neurons[index_s])
                            .map(|category| FailureModeEntry {
                                timestep: step_s.timestep,
                                neuron_id: id.clone(),
                                category,
                            })
                    })
            })
            .collect::<Vec<FailureModeEntry>>();

        log::debug!(
            "Classified {} failure entries over {} timesteps",
            entries.len(),
            subject.len()
        );
        Ok(entries)
    }
}

/// Keep only the first entry of every neuron.
pub fn first_occurrence_only(entries: &[FailureModeEntry]) -> Vec<FailureModeEntry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.neuron_id.as_str()))
        .cloned()
        .collect()
}
