/*!
Data structures and heuristics to maintain low-cost multicast distribution trees.

This crate maintains a rooted *multicast tree* (an arborescence spanning a dynamic set of
client nodes) over a weighted, undirected network graph, under a stream of client
join/leave events. Between events, a simulated-annealing local search repeatedly removes a
tree edge and reconnects the two resulting components through a cheaper path, keeping the
best tree seen. A priority index of *macro-paths* (maximal chains of degree-2 non-client
nodes) supports path-level edge selection, and a tabu list keeps recently installed edges
out of the search for a while.

The network graph is immutable after construction and carries precomputed shortest-path
oracles, so it can be shared (via [std::sync::Arc]) by any number of trees.

# Examples

```
use std::sync::Arc;
use mcast::NodeId;
use mcast::config::Config;
use mcast::graph::NetworkGraph;
use mcast::tree::MulticastTree;

// A unit-weight square with one expensive diagonal
let g = Arc::new( NetworkGraph::from_edges( 4,
	&[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 1), (0, 2, 3)], 1 ) );
let conf = Arc::new( Config::default() );

let mut t = MulticastTree::new( g, conf, NodeId::new( 0 ) );
t.add_client( NodeId::new( 1 ) );
t.add_client( NodeId::new( 2 ) );

// Joins connect through shortest paths to the nearest tree node
assert_eq!( t.weight(), 2 );
assert_eq!( t.edges().len(), 2 );
```

# Crate feature flags

* `verify_tree`
	* Optional. WARNING: slow.
	* Validate tree invariants after every scenario event, even in release builds.
	  Debug builds always validate.
*/

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::private_doc_tests)]


use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub mod config;
pub mod err;
pub mod graph;
pub mod improve;
pub mod ksp;
pub mod paths;
pub mod scenario;
pub mod stats;
pub mod tabu;
pub mod tree;


/// Represents a node of the network graph (and of trees over it) to the outside world.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId {
	raw_id : usize
}

impl NodeId {
	/// Convert `usize` into `NodeId`.
	///
	/// Use with care, as this can circumvent bounds checking.
	pub fn new( id : usize ) -> NodeId {
		NodeId { raw_id : id }
	}

	/// Convert this into `usize`.
	#[inline]
	pub fn index( &self ) -> usize {
		self.raw_id
	}
}

impl Display for NodeId {
	fn fmt( &self, f : &mut Formatter<'_> ) -> std::fmt::Result {
		write!( f, "{}", self.index() )
	}
}


/// A directed tree edge `(parent, child)`, oriented away from the tree root.
pub type DirectedEdge = (NodeId, NodeId);


/// Converts a path expressed as nodes `[n1, n2, n3]` into edges `[(n1,n2), (n2,n3)]`.
pub fn node_path_to_edge_path( node_path : &[NodeId] ) -> Vec<DirectedEdge> {
	node_path.windows( 2 ).map( |w| ( w[0], w[1] ) ).collect()
}

/// Converts a path expressed as edges `[(n1,n2), (n2,n3)]` into nodes `[n1, n2, n3]`.
///
/// Panics if consecutive edges do not share a node.
pub fn edge_path_to_node_path( edge_path : &[DirectedEdge] ) -> Vec<NodeId> {
	let (n1, n2) = edge_path[0];
	let mut node_path = vec![n1, n2];
	for (u, v) in &edge_path[1..] {
		assert_eq!( *u, *node_path.last().unwrap(), "edge path is not contiguous" );
		node_path.push( *v );
	}
	node_path
}
