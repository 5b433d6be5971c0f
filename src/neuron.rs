//! This module provides the LIF `Neuron` structure which composes the `Topology` structure.
//!
//! A neuron holds fixed parameters `{bias, du, dv, vth}` and a dynamic state
//! `{u, v, a_in, a_in_next, spiked, alive}`. A timestep is split in two phases:
//! [`Neuron::compute`] reads the current state without mutating it, and
//! [`Neuron::commit`] writes the new state and moves the accumulated input for the
//! next step into `a_in`.

use serde::{Deserialize, Serialize};

use crate::error::SNNError;

/// The identifier of a neuron, stable across adaptation and radiation.
pub type NeuronId = String;

/// The outcome of the read-only phase of a timestep for a single neuron.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct NeuronUpdate {
    /// The new current.
    pub u: f64,
    /// The new membrane potential (already reset to zero on a spike).
    pub v: f64,
    /// Whether the neuron fires in this timestep.
    pub spiked: bool,
    /// Whether the membrane potential was finite before the reset.
    pub finite: bool,
}

impl NeuronUpdate {
    /// Whether the update only contains finite values, the potential being checked
    /// before the reset so that an overflow is never hidden by a spike.
    pub fn is_finite(&self) -> bool {
        self.finite && self.u.is_finite() && self.v.is_finite()
    }
}

/// Represents a leaky-integrate-and-fire neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Neuron {
    // The neuron ID.
    id: NeuronId,
    // Constant input added to the membrane potential at every step.
    bias: f64,
    // Current recurrence control term.
    du: f64,
    // Membrane potential recurrence control term.
    dv: f64,
    // The firing threshold of the neuron.
    vth: f64,
    // The current.
    #[serde(default)]
    u: f64,
    // The membrane potential.
    #[serde(default)]
    v: f64,
    // The input accumulated for the current step.
    #[serde(default)]
    a_in: f64,
    // The input accumulated during the current step, read at the next one.
    #[serde(default)]
    a_in_next: f64,
    // Whether the neuron fired at the last step.
    #[serde(default)]
    spiked: bool,
    // Whether the neuron is alive, a dead neuron never comes back.
    #[serde(default = "alive_default")]
    alive: bool,
}

fn alive_default() -> bool {
    true
}

impl Neuron {
    /// Create a new neuron with the specified parameters and a zero dynamic state.
    /// Returns an error if any parameter is not finite.
    pub fn build(
        id: impl Into<NeuronId>,
        bias: f64,
        du: f64,
        dv: f64,
        vth: f64,
    ) -> Result<Self, SNNError> {
        let id = id.into();
        for (name, value) in [("bias", bias), ("du", du), ("dv", dv), ("vth", vth)] {
            if !value.is_finite() {
                return Err(SNNError::InvalidParameter(format!(
                    "neuron {}: {} must be finite, got {}",
                    id, name, value
                )));
            }
        }

        Ok(Neuron {
            id,
            bias,
            du,
            dv,
            vth,
            u: 0.0,
            v: 0.0,
            a_in: 0.0,
            a_in_next: 0.0,
            spiked: false,
            alive: true,
        })
    }

    /// Returns a copy of the neuron with a new id and a fresh state.
    pub fn duplicate(&self, id: impl Into<NeuronId>) -> Self {
        let mut neuron = self.clone();
        neuron.id = id.into();
        neuron.reset();
        neuron.alive = true;
        neuron
    }

    /// Returns the neuron ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn du(&self) -> f64 {
        self.du
    }

    pub fn dv(&self) -> f64 {
        self.dv
    }

    /// Returns the neuron firing threshold.
    pub fn vth(&self) -> f64 {
        self.vth
    }

    /// Set the neuron firing threshold.
    pub fn set_vth(&mut self, vth: f64) {
        self.vth = vth;
    }

    pub fn u(&self) -> f64 {
        self.u
    }

    pub fn v(&self) -> f64 {
        self.v
    }

    pub fn a_in(&self) -> f64 {
        self.a_in
    }

    pub fn a_in_next(&self) -> f64 {
        self.a_in_next
    }

    /// Whether the neuron fired at the last committed step.
    pub fn spiked(&self) -> bool {
        self.spiked
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Kill the neuron. The transition is absorbing: the neuron never fires again
    /// and its incoming signals are discarded.
    pub fn kill(&mut self) {
        self.alive = false;
        self.spiked = false;
        self.a_in = 0.0;
        self.a_in_next = 0.0;
    }

    /// Restore the zero dynamic state of t=0. Liveness and parameters are kept.
    pub fn reset(&mut self) {
        self.u = 0.0;
        self.v = 0.0;
        self.a_in = 0.0;
        self.a_in_next = 0.0;
        self.spiked = false;
    }

    /// Compute the next state from the current `(u, v, a_in)` without mutating the neuron.
    ///
    /// ```text
    /// u' = u + du*u + a_in
    /// v' = v + dv*v + u' + bias
    /// spiked = v' >= vth, and then v' = 0
    /// ```
    /// A dead neuron keeps its state and never fires.
    pub fn compute(&self) -> NeuronUpdate {
        if !self.alive {
            return NeuronUpdate {
                u: self.u,
                v: self.v,
                spiked: false,
                finite: self.v.is_finite(),
            };
        }

        let u = self.u + self.du * self.u + self.a_in;
        let v = self.v + self.dv * self.v + u + self.bias;
        let spiked = v >= self.vth;
        NeuronUpdate {
            u,
            v: if spiked { 0.0 } else { v },
            spiked,
            finite: v.is_finite(),
        }
    }

    /// Add a synaptic signal to the input of the next step. Dead neurons discard it.
    pub fn receive(&mut self, signal: f64) {
        if self.alive {
            self.a_in_next += signal;
        }
    }

    /// Commit the computed update and move the accumulated input into `a_in`.
    pub fn commit(&mut self, update: NeuronUpdate) {
        self.u = update.u;
        self.v = update.v;
        self.spiked = update.spiked && self.alive;
        self.a_in = if self.alive { self.a_in_next } else { 0.0 };
        self.a_in_next = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_non_finite() {
        assert!(matches!(
            Neuron::build("a", f64::NAN, 0.0, 0.0, 1.0),
            Err(SNNError::InvalidParameter(_))
        ));
        assert!(matches!(
            Neuron::build("a", 0.0, 0.0, 0.0, f64::INFINITY),
            Err(SNNError::InvalidParameter(_))
        ));
        assert!(Neuron::build("a", 0.0, -0.5, 0.25, 1.0).is_ok());
    }

    #[test]
    fn test_compute_is_linear_recurrence() {
        let mut neuron = Neuron::build("a", 0.25, 0.5, -0.5, 10.0).unwrap();
        neuron.u = 2.0;
        neuron.v = 4.0;
        neuron.a_in = 1.0;

        let update = neuron.compute();
        assert_eq!(update.u, 2.0 + 0.5 * 2.0 + 1.0);
        assert_eq!(update.v, 4.0 - 0.5 * 4.0 + 4.0 + 0.25);
        assert!(!update.spiked);

        // compute never mutates
        assert_eq!(neuron.u(), 2.0);
        assert_eq!(neuron.v(), 4.0);
    }

    #[test]
    fn test_spike_resets_potential() {
        let neuron = Neuron::build("a", 2.0, 0.0, 0.0, 1.0).unwrap();
        let update = neuron.compute();
        assert!(update.spiked);
        assert_eq!(update.v, 0.0);

        let neuron = Neuron::build("b", 1.0, 0.0, 0.0, 1.0).unwrap();
        assert!(neuron.compute().spiked);
    }

    #[test]
    fn test_overflow_is_not_hidden_by_spike() {
        let mut neuron = Neuron::build("a", f64::MAX, 0.0, 0.0, 1.0).unwrap();
        neuron.u = f64::MAX / 2.0;

        let update = neuron.compute();
        assert!(update.spiked);
        assert_eq!(update.v, 0.0);
        assert!(!update.finite);
        assert!(!update.is_finite());
    }

    #[test]
    fn test_commit_moves_next_input() {
        let mut neuron = Neuron::build("a", 0.0, 0.0, 0.0, 5.0).unwrap();
        neuron.receive(1.5);
        neuron.receive(0.5);
        assert_eq!(neuron.a_in(), 0.0);
        assert_eq!(neuron.a_in_next(), 2.0);

        let update = neuron.compute();
        neuron.commit(update);
        assert_eq!(neuron.a_in(), 2.0);
        assert_eq!(neuron.a_in_next(), 0.0);
    }

    #[test]
    fn test_dead_neuron_is_silent() {
        let mut neuron = Neuron::build("a", 5.0, 0.0, 0.0, 1.0).unwrap();
        neuron.kill();
        neuron.receive(10.0);
        assert_eq!(neuron.a_in_next(), 0.0);

        let update = neuron.compute();
        assert!(!update.spiked);
        neuron.commit(update);
        assert!(!neuron.spiked());
        assert!(!neuron.is_alive());
    }

    #[test]
    fn test_duplicate_has_fresh_state() {
        let mut neuron = Neuron::build("a", 0.5, 0.1, 0.2, 1.0).unwrap();
        neuron.receive(3.0);
        neuron.kill();

        let copy = neuron.duplicate("r_1_a");
        assert_eq!(copy.id(), "r_1_a");
        assert!(copy.is_alive());
        assert_eq!(copy.a_in_next(), 0.0);
        assert_eq!(copy.vth(), 1.0);
    }
}
