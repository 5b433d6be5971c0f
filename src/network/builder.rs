//! Builder module turning a graph specification into a topology.
//!
//! A [`GraphSpec`] is what the graph-generation layer hands over: nodes and edges whose
//! parameters may be missing. Every neuron needs finite `bias`, `du`, `dv` and `vth`,
//! and every synapse needs a finite `weight`; the builder checks these once, so the
//! resulting [`Topology`] never has to.
//!
//! # Examples
//!
//! ```
//! use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
//! use snn_compare::network::topology::Topology;
//!
//! let spec = GraphSpec::new(
//!     vec![NodeSpec::lif("a", 2.0, 0.0, 0.0, 1.0), NodeSpec::lif("b", 0.0, 0.0, 1.0, 1.0)],
//!     vec![EdgeSpec::new("a", "b", 1.0)],
//! );
//! let topology = Topology::build(&spec, None).unwrap();
//! assert_eq!(topology.num_neurons(), 2);
//! assert_eq!(topology.num_synapses(), 1);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::adaptation::AdaptationSpec;
use super::topology::Topology;
use crate::error::SNNError;
use crate::neuron::{Neuron, NeuronId};
use crate::synapse::Synapse;

/// The specification of a single neuron, as provided by the graph layer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NeuronId,
    #[serde(default)]
    pub bias: Option<f64>,
    #[serde(default)]
    pub du: Option<f64>,
    #[serde(default)]
    pub dv: Option<f64>,
    #[serde(default)]
    pub vth: Option<f64>,
}

impl NodeSpec {
    /// A fully specified LIF node.
    pub fn lif(id: impl Into<NeuronId>, bias: f64, du: f64, dv: f64, vth: f64) -> Self {
        NodeSpec {
            id: id.into(),
            bias: Some(bias),
            du: Some(du),
            dv: Some(dv),
            vth: Some(vth),
        }
    }
}

/// The specification of a single synapse, as provided by the graph layer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub source: NeuronId,
    pub target: NeuronId,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl EdgeSpec {
    pub fn new(source: impl Into<NeuronId>, target: impl Into<NeuronId>, weight: f64) -> Self {
        EdgeSpec {
            source: source.into(),
            target: target.into(),
            weight: Some(weight),
        }
    }
}

/// A graph of LIF nodes and weighted edges.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl GraphSpec {
    pub fn new(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        GraphSpec { nodes, edges }
    }

    /// The number of nodes in the graph.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Save the graph specification to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a graph specification from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}

fn required(value: Option<f64>, what: &str, owner: &str) -> Result<f64, SNNError> {
    match value {
        Some(value) if value.is_finite() => Ok(value),
        Some(value) => Err(SNNError::InvalidGraphSpec(format!(
            "{}: {} must be finite, got {}",
            owner, what, value
        ))),
        None => Err(SNNError::InvalidGraphSpec(format!(
            "{}: {} is not specified",
            owner, what
        ))),
    }
}

impl Topology {
    /// Build a topology from a graph specification, optionally applying an adaptation.
    /// Returns an error if a node or edge parameter is missing or not finite, or if an
    /// edge refers to an unknown node.
    pub fn build(spec: &GraphSpec, adaptation: Option<&AdaptationSpec>) -> Result<Self, SNNError> {
        let mut neurons = Vec::with_capacity(spec.nodes.len());
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(spec.nodes.len());
        for node in spec.nodes.iter() {
            let owner = format!("neuron {}", node.id);
            let neuron = Neuron::build(
                node.id.clone(),
                required(node.bias, "bias", &owner)?,
                required(node.du, "du", &owner)?,
                required(node.dv, "dv", &owner)?,
                required(node.vth, "vth", &owner)?,
            )?;
            positions.insert(node.id.as_str(), neurons.len());
            neurons.push(neuron);
        }

        let mut synapses = Vec::with_capacity(spec.edges.len());
        for edge in spec.edges.iter() {
            let owner = format!("synapse {} -> {}", edge.source, edge.target);
            let weight = required(edge.weight, "weight", &owner)?;
            let (source, target) = match (
                positions.get(edge.source.as_str()),
                positions.get(edge.target.as_str()),
            ) {
                (Some(&source), Some(&target)) => (source, target),
                _ => {
                    return Err(SNNError::InvalidTopology(format!(
                        "{} refers to an unknown neuron",
                        owner
                    )))
                }
            };
            synapses.push(Synapse::build(source, target, weight)?);
        }

        let topology = Topology::new(neurons, synapses, BTreeMap::new())?;
        log::debug!(
            "Topology built with {} neurons and {} synapses",
            topology.num_neurons(),
            topology.num_synapses()
        );

        match adaptation {
            Some(adaptation) => adaptation.apply(&topology),
            None => Ok(topology),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_parameter() {
        let mut node = NodeSpec::lif("a", 0.0, 0.0, 0.0, 1.0);
        node.vth = None;
        let spec = GraphSpec::new(vec![node], vec![]);
        assert!(matches!(
            Topology::build(&spec, None),
            Err(SNNError::InvalidGraphSpec(_))
        ));
    }

    #[test]
    fn test_non_finite_weight() {
        let spec = GraphSpec::new(
            vec![
                NodeSpec::lif("a", 0.0, 0.0, 0.0, 1.0),
                NodeSpec::lif("b", 0.0, 0.0, 0.0, 1.0),
            ],
            vec![EdgeSpec::new("a", "b", f64::INFINITY)],
        );
        assert!(matches!(
            Topology::build(&spec, None),
            Err(SNNError::InvalidGraphSpec(_))
        ));
    }

    #[test]
    fn test_edge_to_unknown_node() {
        let spec = GraphSpec::new(
            vec![NodeSpec::lif("a", 0.0, 0.0, 0.0, 1.0)],
            vec![EdgeSpec::new("a", "ghost", 1.0)],
        );
        assert!(matches!(
            Topology::build(&spec, None),
            Err(SNNError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_recurrent_edges() {
        let spec = GraphSpec::new(
            vec![
                NodeSpec::lif("a", 0.0, 0.0, 0.0, 1.0),
                NodeSpec::lif("b", 0.0, 0.0, 0.0, 1.0),
            ],
            vec![
                EdgeSpec::new("a", "b", 1.0),
                EdgeSpec::new("b", "a", -1.0),
                EdgeSpec::new("a", "a", 0.5),
            ],
        );
        let topology = Topology::build(&spec, None).unwrap();
        assert_eq!(topology.num_synapses(), 3);
        assert_eq!(topology.incoming(0).len(), 2);
        assert_eq!(topology.outgoing(0).len(), 2);
    }

    #[test]
    fn test_missing_parameter_from_json() {
        let json = r#"{"nodes": [{"id": "a", "bias": 0.0, "du": 0.0, "dv": 0.0}], "edges": []}"#;
        let spec: GraphSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(
            Topology::build(&spec, None),
            Err(SNNError::InvalidGraphSpec(_))
        ));
    }

    #[test]
    fn test_save_load() {
        let spec = GraphSpec::new(
            vec![NodeSpec::lif("a", 1.0, 0.0, 0.0, 1.0)],
            vec![EdgeSpec::new("a", "a", 0.5)],
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        spec.save_to(&path).unwrap();
        assert_eq!(GraphSpec::load_from(&path).unwrap(), spec);
    }
}
