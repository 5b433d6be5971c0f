//! Simulation of spiking neural networks in discrete time.
//!
//! This module provides two components:
//! - [`engine`]: the synchronous two-phase propagation engine.
//! - [`trace`]: the per-timestep record of a run.
//!
//! # Example
//! ```rust
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::network::topology::Topology;
//! use snn_compare::simulator::engine::run;
//!
//! let spec = GraphSpec::new(
//!     vec![NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0), NodeSpec::lif("b", 0.0, 0.0, 0.0, 1.0)],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//! let mut topology = Topology::build(&spec, None).unwrap();
//! let trace = run(&mut topology, 3).unwrap();
//!
//! assert_eq!(trace.spike_times("a"), vec![1, 2, 3]);
//! assert_eq!(trace.spike_times("b")[0], 2);
//! ```
pub mod engine;
pub mod trace;
