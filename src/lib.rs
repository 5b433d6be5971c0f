//! This crate provides tools for simulating leaky-integrate-and-fire spiking neural networks
//! (SNNs) in discrete time, injecting radiation faults into them, and classifying how a
//! faulty run diverges from a fault-free one.
//!
//! # Building Networks
//!
//! ```rust
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::network::topology::Topology;
//!
//! let spec = GraphSpec::new(
//!     vec![
//!         NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0),
//!         NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0),
//!     ],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//! let topology = Topology::build(&spec, None).unwrap();
//!
//! assert_eq!(topology.num_neurons(), 2);
//! assert_eq!(topology.num_synapses(), 1);
//! ```
//!
//! # Simulating Networks under Radiation
//!
//! ```rust
//! use snn_compare::comparator::{Comparator, FailureCategory};
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::network::topology::Topology;
//! use snn_compare::radiation::config::RadiationConfig;
//! use snn_compare::radiation::injector::RadiationInjector;
//! use snn_compare::simulator::engine::{run, Simulator};
//!
//! let spec = GraphSpec::new(
//!     vec![
//!         NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0),
//!         NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0),
//!     ],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//!
//! // Fault-free reference
//! let mut topology = Topology::build(&spec, None).unwrap();
//! let reference = run(&mut topology, 10).unwrap();
//!
//! // Same network with every synapse killed
//! let mut topology = Topology::build(&spec, None).unwrap();
//! let schedule = RadiationInjector::build(RadiationConfig::synaptic_death(1.0), 42)
//!     .unwrap()
//!     .inject(&topology);
//! let subject = Simulator::new(&mut topology)
//!     .unwrap()
//!     .with_radiation(schedule)
//!     .unwrap()
//!     .run(10)
//!     .unwrap();
//!
//! let entries = Comparator::default().classify(&reference, &subject).unwrap();
//! assert_eq!(entries[0].neuron_id, "b");
//! assert_eq!(entries[0].category, FailureCategory::IncorrectlySilent);
//! ```

pub mod comparator;
pub mod error;
pub mod experiment;
pub mod network;
pub mod neuron;
pub mod radiation;
pub mod simulator;
pub mod synapse;

/// The default tolerance for a current difference to be considered negligible.
pub const U_TOLERANCE: f64 = 1e-9;
