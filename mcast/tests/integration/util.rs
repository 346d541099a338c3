use std::sync::Arc;

use rand::prelude::StdRng;
use rand::SeedableRng;

use mcast::config::Config;
use mcast::graph::NetworkGraph;
use mcast::scenario::{run_scenario, Event};
use mcast::stats::Statistics;
use mcast::tree::MulticastTree;
use mcast::NodeId;

#[allow(dead_code)]
pub fn n( i : usize ) -> NodeId {
	NodeId::new( i )
}

/// Complete graph on 4 nodes with unit weights.
#[allow(dead_code)]
pub fn complete_unit_graph() -> Arc<NetworkGraph> {
	let mut edges = vec![];
	for u in 0..4 {
		for v in u + 1..4 {
			edges.push( ( u, v, 1 ) );
		}
	}
	Arc::new( NetworkGraph::from_edges( 4, &edges, 1 ) )
}

/// Unit-weight square 0-1-2-3-0 with a diagonal 0-2 of weight 3.
#[allow(dead_code)]
pub fn square_graph() -> Arc<NetworkGraph> {
	Arc::new( NetworkGraph::from_edges( 4,
		&[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 1), (0, 2, 3)], 1 ) )
}

/// A ring of `num_nodes` nodes with a few fixed chords; connected, varied weights.
#[allow(dead_code)]
pub fn ring_graph( num_nodes : usize ) -> Arc<NetworkGraph> {
	let mut edges : Vec<(usize, usize, u64)> = (0..num_nodes)
		.map( |u| ( u, ( u + 1 ) % num_nodes, 1 + ( u as u64 * 3 ) % 7 ) )
		.collect();
	for u in 0..num_nodes / 2 {
		edges.push( ( u, u + num_nodes / 2, 2 + ( u as u64 * 5 ) % 9 ) );
	}
	Arc::new( NetworkGraph::from_edges( num_nodes, &edges, 1 ) )
}

/// Runs `events` against a fresh tree rooted at 0 with a fixed seed.
#[allow(dead_code)]
pub fn run( graph : &Arc<NetworkGraph>, config : Config, events : &[Event], seed : u64 )
		-> (MulticastTree, Statistics)
{
	let config = Arc::new( config );
	let mut rng = StdRng::seed_from_u64( seed );
	let mut stats = Statistics::new();
	let tree = run_scenario( graph, &config, n( 0 ), events, &mut rng, &mut stats );
	(tree, stats)
}

#[allow(dead_code)]
pub fn sorted_edges( t : &MulticastTree ) -> Vec<(usize, usize)> {
	let mut edges : Vec<(usize, usize)> = t.edges().iter()
		.map( |(u, v)| ( u.index(), v.index() ) )
		.collect();
	edges.sort();
	edges
}
