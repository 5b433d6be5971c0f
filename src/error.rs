//! Error module for the SNN comparison library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, Clone, PartialEq)]
pub enum SNNError {
    /// Error for malformed neuron or synapse data, e.g., non-finite parameters.
    InvalidParameter(String),
    /// Error for incomplete graph specifications, e.g., a node without threshold.
    InvalidGraphSpec(String),
    /// Error for structural defects of a topology, e.g., dangling or duplicate edges.
    InvalidTopology(String),
    /// Error for out-of-range radiation parameters, e.g., a probability outside [0, 1].
    InvalidRadiationConfig(String),
    /// Error for non-finite neuron state during a simulation step.
    NumericFault { neuron_id: String, timestep: usize },
    /// Error for traces that cannot be compared, e.g., different lengths or neuron sets.
    TraceMismatch(String),
    /// The run was aborted at a step boundary.
    Cancelled { timestep: usize },
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SNNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SNNError::InvalidParameter(e) => write!(f, "Invalid parameter: {}", e),
            SNNError::InvalidGraphSpec(e) => write!(f, "Invalid graph specification: {}", e),
            SNNError::InvalidTopology(e) => write!(f, "Invalid topology: {}", e),
            SNNError::InvalidRadiationConfig(e) => {
                write!(f, "Invalid radiation configuration: {}", e)
            }
            SNNError::NumericFault {
                neuron_id,
                timestep,
            } => write!(
                f,
                "Numeric fault: neuron {} reached a non-finite state at timestep {}",
                neuron_id, timestep
            ),
            SNNError::TraceMismatch(e) => write!(f, "Incompatible traces: {}", e),
            SNNError::Cancelled { timestep } => {
                write!(f, "Simulation cancelled before timestep {}", timestep)
            }
            SNNError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SNNError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_offending_entity() {
        let error = SNNError::NumericFault {
            neuron_id: "n3".to_string(),
            timestep: 12,
        };
        let message = error.to_string();
        assert!(message.contains("n3"));
        assert!(message.contains("12"));
    }
}
