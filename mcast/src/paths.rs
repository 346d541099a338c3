//! Priority index of the tree's macro-paths.
//!
//! A *macro-path* is a maximal chain of directed tree edges whose interior nodes are
//! non-client nodes of tree degree exactly two. The directed edge set of the tree is
//! always the disjoint union of the edge sequences of the current macro-paths; endpoints
//! (clients, the root, branching nodes) may be shared.
//!
//! The index keeps every macro-path in a priority queue keyed by its negated selection
//! weight, so that the heaviest path surfaces first, together with two side indices:
//! `parent_path` maps a node to the unique path ending at it (if any), `children_paths`
//! maps a node to the paths starting at it. All tree mutations go through the protocol
//! operations below ([PathIndex::add], [PathIndex::remove], [PathIndex::split_around],
//! [PathIndex::try_merge], [PathIndex::invert]), which keep the three structures
//! consistent.
//!
//! Consumers tolerate *stale* entries: a path whose interior stopped being interior is
//! only repaired (split) when it surfaces during selection.

use std::cmp::Reverse;

use indexmap::IndexMap;
use priority_queue::PriorityQueue;

use crate::config::{Config, SelectionHeuristic};
use crate::graph::NetworkGraph;
use crate::{DirectedEdge, NodeId};


/// The selection weight of a node path, as stored (negated) in the path heap.
///
/// Under `AVERAGED_MOST_EXPENSIVE_PATH` the weight is divided by the path length and
/// decremented by one, so long paths with a low average weight are deprioritised. This
/// only affects selection order; tree weight accounting always uses true edge sums.
pub fn path_key( graph : &NetworkGraph, config : &Config, nodes : &[NodeId] ) -> i64 {
	let total = graph.node_path_weight( nodes ) as i64;
	if config.selection_heuristic == SelectionHeuristic::AveragedMostExpensivePath {
		total / nodes.len() as i64 - 1
	}
	else {
		total
	}
}


/// A macro-path: its heap key (negated selection weight) and its node sequence.
///
/// The first node is the root-side endpoint, the last one the leaf-side endpoint.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TreePath {
	key : i64,
	nodes : Vec<NodeId>
}

impl TreePath {
	/// Creates a path with the given (already negated) key.
	pub fn new( key : i64, nodes : Vec<NodeId> ) -> TreePath {
		debug_assert!( nodes.len() >= 2 );
		TreePath { key, nodes }
	}

	/// Creates a path for `nodes`, deriving the key from the graph and configuration.
	pub fn of( graph : &NetworkGraph, config : &Config, nodes : Vec<NodeId> ) -> TreePath {
		TreePath::new( -path_key( graph, config, &nodes ), nodes )
	}

	/// The negated selection weight.
	pub fn key( &self ) -> i64 {
		self.key
	}

	/// The node sequence, root side first.
	pub fn nodes( &self ) -> &[NodeId] {
		&self.nodes
	}

	/// The root-side endpoint.
	pub fn root_end( &self ) -> NodeId {
		self.nodes[0]
	}

	/// The leaf-side endpoint.
	pub fn leaf_end( &self ) -> NodeId {
		*self.nodes.last().unwrap()
	}

	/// The interior nodes (everything but the endpoints).
	pub fn interior( &self ) -> &[NodeId] {
		&self.nodes[1..self.nodes.len() - 1]
	}

	/// The directed edges of this path.
	pub fn edges( &self ) -> impl Iterator<Item = DirectedEdge> + '_ {
		self.nodes.windows( 2 ).map( |w| ( w[0], w[1] ) )
	}
}


/// Priority queue of macro-paths with side indices, under lazy invalidation.
#[derive(Clone, Default)]
pub struct PathIndex {
	queue : PriorityQueue<TreePath, Reverse<i64>>,
	parent_path : IndexMap<NodeId, TreePath>,
	children_paths : IndexMap<NodeId, Vec<TreePath>>
}

impl PathIndex {
	/// Creates an empty index.
	pub fn new() -> PathIndex {
		PathIndex::default()
	}

	/// The number of indexed paths.
	pub fn len( &self ) -> usize {
		self.queue.len()
	}

	/// Whether no path is indexed.
	pub fn is_empty( &self ) -> bool {
		self.queue.is_empty()
	}

	/// The path ending at `node`, if any.
	pub fn parent_path( &self, node : NodeId ) -> Option<&TreePath> {
		self.parent_path.get( &node )
	}

	/// The paths starting at `node`.
	pub fn children_paths( &self, node : NodeId ) -> &[TreePath] {
		self.children_paths.get( &node ).map_or( &[], |ps| &ps[..] )
	}

	/// Iterates over all indexed paths, in no particular order.
	pub fn iter( &self ) -> impl Iterator<Item = &TreePath> {
		self.queue.iter().map( |(p, _)| p )
	}

	/// Indexes `p`: pushes it onto the heap and registers both side indices.
	pub fn add( &mut self, p : TreePath ) {
		assert!( p.root_end() != p.leaf_end(),
			"path begins and ends with the same node {}", p.root_end() );
		self.children_paths.entry( p.root_end() ).or_default().push( p.clone() );
		let previous = self.parent_path.insert( p.leaf_end(), p.clone() );
		debug_assert!( previous.is_none(), "{} already had a parent path", p.leaf_end() );
		let key = p.key();
		self.queue.push( p, Reverse( key ) );
	}

	/// Removes `p` from the heap and both side indices.
	///
	/// With `try_merge`, afterwards attempts to coalesce the paths around both former
	/// endpoints; `is_client` tells which nodes are clients.
	pub fn remove<F>( &mut self, p : &TreePath, try_merge : bool, is_client : F )
		where F : Fn( NodeId ) -> bool
	{
		self.remove_no_merge( p );
		if try_merge {
			self.try_merge( p.root_end(), &is_client );
			self.try_merge( p.leaf_end(), &is_client );
		}
	}

	fn remove_no_merge( &mut self, p : &TreePath ) {
		self.queue.remove( p ).unwrap_or_else( || panic!( "path index is corrupted" ) );

		let children = self.children_paths.get_mut( &p.root_end() )
			.expect( "path index is corrupted" );
		let pos = children.iter().position( |q| q == p ).expect( "path index is corrupted" );
		children.remove( pos );
		if children.is_empty() {
			self.children_paths.shift_remove( &p.root_end() );
		}

		let parent = self.parent_path.shift_remove( &p.leaf_end() );
		assert!( parent.as_ref() == Some( p ), "path index is corrupted" );
	}

	/// Attempts to merge the two paths meeting at `node`.
	///
	/// Succeeds when `node` is not a client, ends exactly one path and starts exactly
	/// one path; the pair is then replaced by their concatenation.
	pub fn try_merge<F>( &mut self, node : NodeId, is_client : F )
		where F : Fn( NodeId ) -> bool
	{
		if is_client( node ) {
			return;
		}
		let parent = match self.parent_path.get( &node ) {
			Some( p ) => p.clone(),
			None => return
		};
		let children = match self.children_paths.get( &node ) {
			Some( cs ) if cs.len() == 1 => cs.clone(),
			_ => return
		};
		let child = children.into_iter().next().unwrap();

		let mut nodes = parent.nodes.clone();
		nodes.extend( &child.nodes[1..] );
		let merged = TreePath::new( parent.key + child.key, nodes );

		self.remove_no_merge( &child );
		self.remove_no_merge( &parent );
		self.add( merged );
	}

	/// Replaces `p` by its prefix up to `node` and (unless `drop_bot`) its suffix from
	/// `node`, with keys recomputed through `key_of`.
	///
	/// `node` must lie strictly inside `p`.
	pub fn split_around<K>( &mut self, p : &TreePath, node : NodeId, drop_bot : bool, key_of : K )
		where K : Fn( &[NodeId] ) -> i64
	{
		let idx = p.nodes.iter().position( |v| *v == node )
			.unwrap_or_else( || panic!( "cannot split a path around {node}: not on the path" ) );

		let top_nodes = p.nodes[..=idx].to_vec();
		let bot_nodes = p.nodes[idx..].to_vec();
		let top_key = -key_of( &top_nodes );
		let bot_key = p.key - top_key;

		self.remove_no_merge( p );
		self.add( TreePath::new( top_key, top_nodes ) );
		if !drop_bot {
			self.add( TreePath::new( bot_key, bot_nodes ) );
		}
	}

	/// Replaces `p` by its reversal (same key, reversed node sequence).
	pub fn invert( &mut self, p : &TreePath ) {
		let mut nodes = p.nodes.clone();
		nodes.reverse();
		let reversed = TreePath::new( p.key, nodes );
		self.remove_no_merge( p );
		self.add( reversed );
	}

	/// The heaviest indexed path (which may be stale).
	pub fn peek( &self ) -> Option<&TreePath> {
		self.queue.peek().map( |(p, _)| p )
	}

	/// Pops the heaviest path off the heap only; the side indices keep their entries.
	///
	/// Use together with [PathIndex::push_heap] to scan past entries that must be
	/// restored afterwards.
	pub fn pop_heap( &mut self ) -> Option<TreePath> {
		self.queue.pop().map( |(p, _)| p )
	}

	/// Pushes a path popped by [PathIndex::pop_heap] back onto the heap.
	pub fn push_heap( &mut self, p : TreePath ) {
		let key = p.key();
		self.queue.push( p, Reverse( key ) );
	}
}
