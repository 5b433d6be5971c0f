//! Radiation configuration: which fault is injected, how likely, and how strong.
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SNNError;

/// The kinds of radiation-induced faults.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiationKind {
    /// A neuron stops working for good.
    NeuronDeath,
    /// A synapse stops transmitting for good.
    SynapticDeath,
    /// The firing threshold of a neuron is perturbed.
    DeltaVth,
    /// The weight of a synapse is perturbed.
    DeltaSynapticW,
}

impl RadiationKind {
    pub fn name(&self) -> &'static str {
        match self {
            RadiationKind::NeuronDeath => "neuron_death",
            RadiationKind::SynapticDeath => "synaptic_death",
            RadiationKind::DeltaVth => "delta_vth",
            RadiationKind::DeltaSynapticW => "delta_synaptic_w",
        }
    }

    /// Whether the fault affects neurons (as opposed to synapses).
    pub fn targets_neurons(&self) -> bool {
        matches!(self, RadiationKind::NeuronDeath | RadiationKind::DeltaVth)
    }

    /// Whether the fault is a death, which is always permanent.
    pub fn is_death(&self) -> bool {
        matches!(
            self,
            RadiationKind::NeuronDeath | RadiationKind::SynapticDeath
        )
    }
}

impl FromStr for RadiationKind {
    type Err = SNNError;

    /// Parse a radiation kind from its name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "neuron_death" => Ok(RadiationKind::NeuronDeath),
            "synaptic_death" => Ok(RadiationKind::SynapticDeath),
            "delta_vth" => Ok(RadiationKind::DeltaVth),
            "delta_synaptic_w" => Ok(RadiationKind::DeltaSynapticW),
            _ => Err(SNNError::InvalidRadiationConfig(format!(
                "unknown radiation kind {}",
                name
            ))),
        }
    }
}

/// How the magnitude of a perturbation combines with the original value.
/// This is part of the configuration and is never changed during a run.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perturbation {
    /// `x' = x + magnitude`
    #[default]
    Additive,
    /// `x' = x * magnitude`
    Multiplicative,
}

impl Perturbation {
    pub fn apply(&self, value: f64, magnitude: f64) -> f64 {
        match self {
            Perturbation::Additive => value + magnitude,
            Perturbation::Multiplicative => value * magnitude,
        }
    }
}

impl FromStr for Perturbation {
    type Err = SNNError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "additive" => Ok(Perturbation::Additive),
            "multiplicative" => Ok(Perturbation::Multiplicative),
            _ => Err(SNNError::InvalidRadiationConfig(format!(
                "unknown perturbation {}",
                name
            ))),
        }
    }
}

/// Represents a radiation setting.
///
/// Perturbations start at the commit boundary of step `onset` (0 being before the
/// first step) and, for `duration = k > 0`, are reverted at the commit boundary of
/// step `onset + k`. A duration of 0 makes them permanent.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RadiationConfig {
    pub kind: RadiationKind,
    pub probability: f64,
    #[serde(default)]
    pub magnitude: f64,
    #[serde(default)]
    pub perturbation: Perturbation,
    #[serde(default)]
    pub onset: usize,
    #[serde(default)]
    pub duration: usize,
}

impl RadiationConfig {
    fn new(kind: RadiationKind, probability: f64, magnitude: f64) -> Self {
        RadiationConfig {
            kind,
            probability,
            magnitude,
            perturbation: Perturbation::default(),
            onset: 0,
            duration: 0,
        }
    }

    pub fn neuron_death(probability: f64) -> Self {
        Self::new(RadiationKind::NeuronDeath, probability, 0.0)
    }

    pub fn synaptic_death(probability: f64) -> Self {
        Self::new(RadiationKind::SynapticDeath, probability, 0.0)
    }

    pub fn delta_vth(probability: f64, magnitude: f64) -> Self {
        Self::new(RadiationKind::DeltaVth, probability, magnitude)
    }

    pub fn delta_synaptic_w(probability: f64, magnitude: f64) -> Self {
        Self::new(RadiationKind::DeltaSynapticW, probability, magnitude)
    }

    /// Make the perturbation start at `onset` and last `duration` steps.
    pub fn transient(mut self, onset: usize, duration: usize) -> Self {
        self.onset = onset;
        self.duration = duration;
        self
    }

    pub fn with_perturbation(mut self, perturbation: Perturbation) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// The name of the setting, e.g., `delta_vth_0.1`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind.name(), self.probability)
    }

    /// Check the radiation setting.
    /// Returns an error for probabilities outside of [0, 1], non-finite magnitudes,
    /// and transient or delayed deaths.
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(SNNError::InvalidRadiationConfig(format!(
                "{}: probability must be in [0, 1], got {}",
                self.kind.name(),
                self.probability
            )));
        }
        if !self.magnitude.is_finite() {
            return Err(SNNError::InvalidRadiationConfig(format!(
                "{}: magnitude must be finite, got {}",
                self.kind.name(),
                self.magnitude
            )));
        }
        if self.kind.is_death() && (self.duration > 0 || self.onset > 0) {
            return Err(SNNError::InvalidRadiationConfig(format!(
                "{}: deaths are drawn before the run and are permanent",
                self.kind.name()
            )));
        }
        Ok(())
    }
}
