use approx::assert_relative_eq;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use snn_compare::network::adaptation::AdaptationSpec;
use snn_compare::network::builder::{EdgeSpec, GraphSpec, NodeSpec};
use snn_compare::network::topology::Topology;
use snn_compare::simulator::engine::{run, Simulator};

fn chain() -> GraphSpec {
    GraphSpec::new(
        vec![
            NodeSpec::lif("A", 2.0, 0.0, 0.0, 1.0),
            NodeSpec::lif("B", 0.0, 0.0, 1.0, 1.0),
        ],
        vec![EdgeSpec::new("A", "B", 1.0)],
    )
}

fn rand_graph(num_neurons: usize, num_synapses: usize, seed: u64) -> GraphSpec {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let nodes = (0..num_neurons)
        .map(|i| {
            NodeSpec::lif(
                format!("n{:03}", i),
                rng.gen_range(0.0..0.5),
                rng.gen_range(-0.5..0.0),
                rng.gen_range(-0.5..0.0),
                rng.gen_range(0.5..1.5),
            )
        })
        .collect();

    let mut edges: Vec<EdgeSpec> = vec![];
    while edges.len() < num_synapses {
        let source = format!("n{:03}", rng.gen_range(0..num_neurons));
        let target = format!("n{:03}", rng.gen_range(0..num_neurons));
        if edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
        {
            continue;
        }
        edges.push(EdgeSpec::new(source, target, rng.gen_range(-0.5..0.5)));
    }
    GraphSpec::new(nodes, edges)
}

#[test]
fn test_chain_scenario() {
    let mut topology = Topology::build(&chain(), None).unwrap();
    let mut simulator = Simulator::new(&mut topology).unwrap();

    let step_1 = simulator.step().unwrap();
    assert!(step_1.neurons[0].spiked);
    assert!(!step_1.neurons[1].spiked);
    assert_eq!(simulator.topology().neuron_by_id("B").unwrap().a_in(), 1.0);

    let step_2 = simulator.step().unwrap();
    assert!(step_2.neurons[0].spiked);
    assert!(step_2.neurons[1].spiked);
    assert_eq!(step_2.neurons[1].v, 0.0);
}

#[test]
fn test_chain_with_killed_synapse() {
    let mut topology = Topology::build(&chain(), None).unwrap();
    topology.kill_synapse("A", "B").unwrap();

    let trace = run(&mut topology, 20).unwrap();
    assert_eq!(trace.len(), 20);
    assert_eq!(trace.spike_times("A"), (1..=20).collect::<Vec<usize>>());
    assert!(trace.spike_times("B").is_empty());
    assert!(trace.iter().all(|step| step.neurons[1].u == 0.0));
}

#[test]
fn test_determinism() {
    let spec = rand_graph(50, 400, 42);
    let mut topology_1 = Topology::build(&spec, None).unwrap();
    let mut topology_2 = Topology::build(&spec, None).unwrap();

    let trace_1 = run(&mut topology_1, 100).unwrap();
    let trace_2 = run(&mut topology_2, 100).unwrap();
    assert_eq!(trace_1, trace_2);
    assert_eq!(
        serde_json::to_string(&trace_1).unwrap(),
        serde_json::to_string(&trace_2).unwrap()
    );
}

#[test]
fn test_order_independence() {
    let spec = rand_graph(40, 300, 7);
    let mut shuffled = spec.clone();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    shuffled.nodes.shuffle(&mut rng);
    shuffled.edges.shuffle(&mut rng);
    assert_ne!(spec, shuffled);

    let trace = run(&mut Topology::build(&spec, None).unwrap(), 80).unwrap();
    let trace_shuffled = run(&mut Topology::build(&shuffled, None).unwrap(), 80).unwrap();
    assert_eq!(trace, trace_shuffled);
}

#[test]
fn test_reset_on_spike() {
    let spec = rand_graph(30, 200, 3);
    let mut topology = Topology::build(&spec, None).unwrap();
    let trace = run(&mut topology, 100).unwrap();

    let mut num_spikes = 0;
    for step in trace.iter() {
        for snapshot in step.neurons.iter().filter(|snapshot| snapshot.spiked) {
            assert_eq!(snapshot.v, 0.0);
            num_spikes += 1;
        }
    }
    assert!(num_spikes > 0);
}

#[test]
fn test_dead_neuron_silence() {
    let mut topology = Topology::build(&chain(), None).unwrap();
    topology.kill_neuron("A").unwrap();

    let trace = run(&mut topology, 50).unwrap();
    assert!(trace.spike_times("A").is_empty());
    assert!(trace.spike_times("B").is_empty());
    assert!(trace.iter().all(|step| step.neurons[1].u == 0.0));
}

#[test]
fn test_redundant_copies_follow_originals() {
    let adaptation = AdaptationSpec::redundancy(2);
    let mut topology = Topology::build(&chain(), Some(&adaptation)).unwrap();
    assert_eq!(topology.num_neurons(), 6);
    assert_eq!(topology.num_synapses(), 9);
    for synapse in topology.synapses() {
        assert_relative_eq!(synapse.weight(), 1.0 / 3.0);
    }
    assert_eq!(
        topology.adaptation()["B"],
        vec!["r_1_B".to_string(), "r_2_B".to_string()]
    );

    let trace = run(&mut topology, 5).unwrap();
    for id in ["A", "r_1_A", "r_2_A"] {
        assert_eq!(trace.spike_times(id), vec![1, 2, 3, 4, 5]);
    }
    for id in ["B", "r_1_B", "r_2_B"] {
        assert_eq!(trace.spike_times(id)[0], 2);
    }
}
