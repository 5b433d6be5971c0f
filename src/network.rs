//! Network structure: neurons and synapses arranged in a topology.
//!
//! - [`topology`]: the graph owning all neuron and synapse records
//! - [`builder`]: construction of a topology from a graph specification
//! - [`adaptation`]: redundancy adaptation of a topology
pub mod adaptation;
pub mod builder;
pub mod topology;
