//! The multicast tree and its maintenance operations.
//!
//! A [MulticastTree] is an arborescence rooted at a fixed source node, spanning every
//! subscribed client (plus the transit nodes connecting them) over a shared
//! [NetworkGraph]. Clients join through shortest paths, leave with cascading prunes, and
//! local-search rounds ([MulticastTree::improve_once]) swap an expensive edge for a
//! cheaper reconnection between the two components its removal leaves behind.
//!
//! The tree owns its [TabuIndex] and, when path-level selection is configured, a
//! [PathIndex] that is kept consistent across every structural change.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{Config, SearchStrategy, SelectionHeuristic};
use crate::graph::NetworkGraph;
use crate::paths::{path_key, PathIndex, TreePath};
use crate::tabu::TabuIndex;
use crate::{edge_path_to_node_path, node_path_to_edge_path, DirectedEdge, NodeId};


/// Decides whether a degrading reconnection is accepted, given the weight of the removed
/// path, the weight of its candidate replacement and the current temperature.
///
/// The degradation is expressed as a percentage of the new weight; a strictly positive
/// degradation is accepted with probability `exp( -delta / temperature )`, and never at
/// temperature zero. Improvements are always accepted.
fn evaluate_sa_probability( old_weight : i64, new_weight : i64, temperature : f64,
		rng : &mut impl Rng ) -> bool
{
	let delta = 100.0 * ( new_weight - old_weight ) as f64 / new_weight as f64;
	if delta > 0.0 {
		if temperature == 0.0 {
			return false;
		}
		rng.gen::<f64>() < ( -delta / temperature ).exp()
	}
	else {
		true
	}
}


/// A multicast distribution tree over a shared network graph.
#[derive(Clone)]
pub struct MulticastTree {
	graph : Arc<NetworkGraph>,
	config : Arc<Config>,
	root : NodeId,
	nodes : IndexSet<NodeId>,
	clients : IndexSet<NodeId>,
	parent : IndexMap<NodeId, NodeId>,
	children : IndexMap<NodeId, Vec<NodeId>>,
	weight : u64,
	improvements : u64,
	use_path_queue : bool,
	tabu : TabuIndex,
	paths : PathIndex
}

impl MulticastTree {
	/// Creates a tree holding only `root`, which is always a client and never removed.
	pub fn new( graph : Arc<NetworkGraph>, config : Arc<Config>, root : NodeId ) -> MulticastTree {
		let use_path_queue = config.use_path_queue();
		let mut tree = MulticastTree {
			graph,
			config,
			root,
			nodes : IndexSet::new(),
			clients : IndexSet::new(),
			parent : IndexMap::new(),
			children : IndexMap::new(),
			weight : 0,
			improvements : 0,
			use_path_queue,
			tabu : TabuIndex::new(),
			paths : PathIndex::new()
		};
		tree.nodes.insert( root );
		tree.clients.insert( root );
		tree
	}

	/// The fixed source of this tree.
	pub fn root( &self ) -> NodeId {
		self.root
	}

	/// The current total edge weight.
	pub fn weight( &self ) -> u64 {
		self.weight
	}

	/// The current client set (always contains the root).
	pub fn clients( &self ) -> &IndexSet<NodeId> {
		&self.clients
	}

	/// The number of improvement rounds performed so far.
	pub fn improvements( &self ) -> u64 {
		self.improvements
	}

	/// The configuration this tree runs under.
	pub fn config( &self ) -> &Config {
		&self.config
	}

	/// The number of tree nodes (clients plus transit nodes).
	pub fn num_nodes( &self ) -> usize {
		self.nodes.len()
	}

	/// Whether `v` is currently a tree node.
	pub fn contains_node( &self, v : NodeId ) -> bool {
		self.nodes.contains( &v )
	}

	/// Whether `v` is currently a client.
	pub fn is_client( &self, v : NodeId ) -> bool {
		self.clients.contains( &v )
	}

	/// The tree degree of `v` (parent edge plus child edges).
	pub fn degree( &self, v : NodeId ) -> usize {
		self.parent.contains_key( &v ) as usize
			+ self.children.get( &v ).map_or( 0, Vec::len )
	}

	/// The parent of `v`, or `None` for the root (or a detached sub-root).
	pub fn predecessor( &self, v : NodeId ) -> Option<NodeId> {
		self.parent.get( &v ).copied()
	}

	/// The children of `v`.
	pub fn successors( &self, v : NodeId ) -> &[NodeId] {
		self.children.get( &v ).map_or( &[], |cs| &cs[..] )
	}

	/// All directed tree edges.
	pub fn edges( &self ) -> Vec<DirectedEdge> {
		self.parent.iter().map( |(c, p)| ( *p, *c ) ).collect()
	}

	/// The tabu index of this tree.
	pub fn tabu( &self ) -> &TabuIndex {
		&self.tabu
	}

	/// Forgets all tabu entries.
	pub fn clear_tabu( &mut self ) {
		self.tabu.clear();
	}

	/// Ages all tabu entries by one round.
	pub fn decay_tabu( &mut self ) {
		self.tabu.decay();
	}

	/// The macro-path index of this tree (unused unless path-level selection is active).
	pub fn path_index( &self ) -> &PathIndex {
		&self.paths
	}

	// ------------------------------------------------------------------
	// low-level structure edits

	fn add_tree_edge( &mut self, u : NodeId, v : NodeId ) {
		self.nodes.insert( u );
		self.nodes.insert( v );
		self.children.entry( u ).or_default().push( v );
		let previous = self.parent.insert( v, u );
		debug_assert!( previous.is_none(), "{v} already had a parent" );
	}

	fn remove_tree_edge( &mut self, u : NodeId, v : NodeId ) {
		let cs = self.children.get_mut( &u ).expect( "tree is corrupted" );
		let pos = cs.iter().position( |x| *x == v ).expect( "tree is corrupted" );
		cs.remove( pos );
		if cs.is_empty() {
			self.children.shift_remove( &u );
		}
		let previous = self.parent.shift_remove( &v );
		debug_assert!( previous == Some( u ), "tree is corrupted" );
	}

	/// Removes `v` and all its incident edges.
	fn remove_node( &mut self, v : NodeId ) {
		if let Some( p ) = self.parent.get( &v ).copied() {
			self.remove_tree_edge( p, v );
		}
		if let Some( cs ) = self.children.get( &v ).cloned() {
			for c in cs {
				self.remove_tree_edge( v, c );
			}
		}
		self.nodes.shift_remove( &v );
	}

	/// Installs the directed edges of a node path, fetching weights from the graph.
	///
	/// Panics if a step of the path is not a graph edge.
	fn add_edges( &mut self, path : &[NodeId] ) {
		for w in path.windows( 2 ) {
			let (n1, n2) = ( w[0], w[1] );
			let weight = self.graph.edge_weight( n1, n2 )
				.unwrap_or_else( || panic!( "tree is corrupted: ({n1}, {n2}) is not a graph edge" ) );
			self.add_tree_edge( n1, n2 );
			self.weight += weight;
		}
	}

	fn remove_weight_for( &mut self, edges : &[DirectedEdge] ) {
		for (u, v) in edges {
			self.weight -= self.graph.edge_weight( *u, *v ).expect( "tree is corrupted" );
		}
	}

	/// All nodes reachable from `v` in the directed tree, `v` included.
	fn descendants( &self, v : NodeId ) -> IndexSet<NodeId> {
		let mut seen = IndexSet::new();
		let mut stack = vec![v];
		while let Some( u ) = stack.pop() {
			if seen.insert( u ) {
				if let Some( cs ) = self.children.get( &u ) {
					stack.extend( cs.iter().copied() );
				}
			}
		}
		seen
	}

	// ------------------------------------------------------------------
	// path index helpers

	fn push_path_to_queue( &mut self, path : &[NodeId] ) {
		self.paths.add( TreePath::of( &self.graph, &self.config, path.to_vec() ) );
	}

	fn remove_path( &mut self, p : &TreePath, try_merge : bool ) {
		let clients = &self.clients;
		self.paths.remove( p, try_merge, |v| clients.contains( &v ) );
	}

	fn try_merge_paths_at( &mut self, node : NodeId ) {
		let clients = &self.clients;
		self.paths.try_merge( node, |v| clients.contains( &v ) );
	}

	fn split_path_around( &mut self, p : &TreePath, node : NodeId, drop_bot : bool ) {
		let graph = self.graph.clone();
		let config = self.config.clone();
		self.paths.split_around( p, node, drop_bot, |ns| path_key( &graph, &config, ns ) );
	}

	// ------------------------------------------------------------------
	// client addition

	/// Subscribes client `c`, attaching it through a shortest path if it is not already
	/// a tree node.
	pub fn add_client( &mut self, c : NodeId ) {
		debug!( "adding client {c}" );
		if !self.contains_node( c ) {
			let path = if self.config.pim_mode {
				self.shortest_path_to_source( c )
			}
			else {
				self.shortest_path_to_tree( c )
			};
			debug!( "cleaned connection path: {path:?}" );

			if self.use_path_queue {
				self.push_path_to_queue( &path );
			}
			self.add_edges( &path );
		}
		else {
			debug!( "client {c} is already a tree node" );
		}
		self.clients.insert( c );
	}

	/// The root-to-client shortest path, as used when mimicking PIM-SSM.
	fn shortest_path_to_source( &self, c : NodeId ) -> Vec<NodeId> {
		let closest_path = self.graph.shortest_path( self.root, c );
		let mut desc_side = IndexSet::new();
		desc_side.insert( c );
		self.clean_path( closest_path, &self.nodes, &desc_side )
	}

	/// The shortest path from the nearest current tree node to `c`.
	///
	/// The nearest node is the first minimum encountered in a stable scan of the tree
	/// nodes (insertion order), so ties resolve deterministically.
	fn shortest_path_to_tree( &self, c : NodeId ) -> Vec<NodeId> {
		let mut closest = None;
		let mut closest_length = u64::MAX;
		for t in &self.nodes {
			let length = self.graph.shortest_path_length( c, *t );
			if length < closest_length {
				closest = Some( *t );
				closest_length = length;
			}
		}
		let closest = closest.expect( "tree has no nodes" );
		debug!( "closest tree node to {c}: {closest} at distance {closest_length}" );

		let closest_path = self.graph.shortest_path( closest, c );
		let mut desc_side = IndexSet::new();
		desc_side.insert( c );
		self.clean_path( closest_path, &self.nodes, &desc_side )
	}

	/// Reshapes a prospective connection path so that installing it cannot close a
	/// cycle: the result starts at the last path node lying on the source side and stops
	/// at the first subsequent node lying on the descendant side.
	fn clean_path( &self, path : &[NodeId], source_side : &IndexSet<NodeId>,
			desc_side : &IndexSet<NodeId> ) -> Vec<NodeId>
	{
		let mut cleaned = vec![];
		let mut first_in_source = 0;
		for i in (0..path.len()).rev() {
			if source_side.contains( &path[i] ) {
				cleaned.push( path[i] );
				first_in_source = i;
				break;
			}
		}
		for i in first_in_source + 1..path.len() {
			cleaned.push( path[i] );
			if desc_side.contains( &path[i] ) {
				break;
			}
		}
		cleaned
	}

	// ------------------------------------------------------------------
	// client removal

	/// Unsubscribes client `c`.
	///
	/// Ignored (with an error log) when `c` is the root or not a client. The tree shape
	/// only changes when `c` is a leaf, in which case the chain of transit nodes it hung
	/// from is pruned as well.
	pub fn remove_client( &mut self, c : NodeId ) {
		if c == self.root {
			log::error!( "root cannot be removed from the client set" );
			return;
		}
		if !self.clients.contains( &c ) {
			log::error!( "{c} is not in the clients set" );
			return;
		}

		let deg = self.degree( c );
		self.clients.shift_remove( &c );

		if deg == 1 {
			let leaf_path = if self.use_path_queue {
				Some( self.paths.parent_path( c ).expect( "path index is corrupted" ).clone() )
			}
			else {
				None
			};

			let (kept, removed_edges) = self.ascending_clean( c );
			self.remove_weight_for( &removed_edges );

			if let Some( p ) = leaf_path {
				self.update_paths_after_leaf_removal( kept, &p );
			}
			debug!( "removed edges upon removal of {c}: {removed_edges:?}" );
		}
		else if deg == 2 {
			debug!( "client {c} of degree 2 removed, may merge paths" );
			if self.use_path_queue {
				self.try_merge_paths_at( c );
			}
		}
		else {
			debug!( "client {c} of degree >= 3 removed, no structural change" );
		}
	}

	/// Path index maintenance after an ascending prune that removed the leaf path `p` up
	/// to the first kept node. The cases are exhaustive and mutually exclusive.
	fn update_paths_after_leaf_removal( &mut self, kept : NodeId, p : &TreePath ) {
		if kept == self.root {
			// the prune climbed all the way up: p must span from the root
			assert!( p.root_end() == self.root,
				"cleaning reached the root but the removed path starts at {}", p.root_end() );
			self.remove_path( p, false );
			return;
		}
		match self.degree( kept ) {
			1 => {
				if self.paths.parent_path( kept ).is_some() {
					self.remove_path( p, true );
				}
				else {
					self.split_path_around( p, kept, true );
				}
			}
			2 => {
				if self.paths.parent_path( kept ).is_some() {
					self.remove_path( p, true );
				}
				else {
					// kept was a branching node inside p's owner before the prune
					let n_children = self.paths.children_paths( kept ).len();
					assert!( n_children == 1,
						"a node inside a path must have exactly one child path" );
					let unique_child = self.paths.children_paths( kept )[0].clone();
					if unique_child == *p {
						self.remove_path( p, false );
					}
					else {
						self.split_path_around( p, kept, true );
						self.try_merge_paths_at( kept );
					}
				}
			}
			_ => {
				if p.root_end() == kept {
					self.remove_path( p, false );
				}
				else {
					self.split_path_around( p, kept, true );
				}
			}
		}
	}

	// ------------------------------------------------------------------
	// cleaning

	/// Prunes upward from `current`: while the node is a non-client of degree < 2, its
	/// parent edge is removed and the climb continues. Returns the first kept node and
	/// the removed edges, deepest first.
	fn ascending_clean( &mut self, mut current : NodeId ) -> (NodeId, Vec<DirectedEdge>) {
		let mut removed = vec![];
		loop {
			if self.clients.contains( &current ) || self.degree( current ) >= 2 {
				return ( current, removed );
			}
			let parent = self.predecessor( current ).expect( "tree is corrupted" );
			self.remove_node( current );
			removed.push( ( parent, current ) );
			current = parent;
		}
	}

	/// Symmetric to [MulticastTree::ascending_clean], following the unique child.
	fn descending_clean( &mut self, mut current : NodeId ) -> (NodeId, Vec<DirectedEdge>) {
		let mut removed = vec![];
		loop {
			if self.clients.contains( &current ) || self.degree( current ) >= 2 {
				return ( current, removed );
			}
			let child = self.successors( current )[0];
			self.remove_node( current );
			removed.push( ( current, child ) );
			current = child;
		}
	}

	/// Prunes both components after the removal of `(parent, child)`. Returns the
	/// surviving node of the child component and all removed edges, ordered from the
	/// source side to the leaf side.
	fn clean_components( &mut self, parent : NodeId, child : NodeId )
			-> (NodeId, Vec<DirectedEdge>)
	{
		let (_, mut removed) = self.ascending_clean( parent );
		let (sub_root, desc_removed) = self.descending_clean( child );
		self.remove_weight_for( &removed );
		self.remove_weight_for( &desc_removed );

		removed.reverse();
		removed.push( ( parent, child ) );
		removed.extend( desc_removed );
		( sub_root, removed )
	}

	// ------------------------------------------------------------------
	// improvement rounds

	/// Performs one round of local search: select and remove an edge, prune both
	/// components, reconnect them through the cheapest acceptable path (possibly the
	/// removed one).
	///
	/// Returns whether a new path was installed, and whether it was accepted as a
	/// degrading move.
	pub fn improve_once( &mut self, temperature : f64, rng : &mut impl Rng ) -> (bool, bool) {
		if let Some( (parent, child) ) = self.remove_selected_edge( rng ) {
			let (sub_root, removed_edges) = self.clean_components( parent, child );
			let result = self.reconnect( sub_root, removed_edges, temperature, rng );
			self.improvements += 1;
			result
		}
		else {
			debug!( "no edge found to remove" );
			(false, false)
		}
	}

	fn remove_selected_edge( &mut self, rng : &mut impl Rng ) -> Option<DirectedEdge> {
		let edge = self.select_edge( rng )?;
		debug!( "selected edge: ({}, {})", edge.0, edge.1 );
		let weight = self.graph.edge_weight( edge.0, edge.1 ).expect( "tree is corrupted" );
		self.weight -= weight;
		self.remove_tree_edge( edge.0, edge.1 );
		Some( edge )
	}

	fn select_edge( &mut self, rng : &mut impl Rng ) -> Option<DirectedEdge> {
		match self.config.selection_heuristic {
			SelectionHeuristic::Random => self.select_random_edge( rng ),
			SelectionHeuristic::MostExpensive => self.select_most_expensive_edge( rng ),
			SelectionHeuristic::MostExpensivePath
				| SelectionHeuristic::AveragedMostExpensivePath
				=> self.select_most_expensive_path_edge( rng )
		}
	}

	fn select_random_edge( &self, rng : &mut impl Rng ) -> Option<DirectedEdge> {
		let candidates : Vec<DirectedEdge> = self.edges().into_iter()
			.filter( |e| !self.tabu.contains( e ) )
			.collect();
		candidates.choose( rng ).copied()
	}

	/// The maximum-weight non-tabu edge; on the k-th equally heavy candidate the current
	/// choice is replaced with probability 1/k.
	fn select_most_expensive_edge( &self, rng : &mut impl Rng ) -> Option<DirectedEdge> {
		let mut selected = None;
		let mut best_weight = 0;
		let mut ties = 2.0f64;
		for e in self.edges() {
			if self.tabu.contains( &e ) {
				continue;
			}
			let weight = self.graph.edge_weight( e.0, e.1 ).expect( "tree is corrupted" );
			if selected.is_none() || weight > best_weight {
				selected = Some( e );
				best_weight = weight;
				ties = 2.0;
			}
			else if weight == best_weight {
				if rng.gen::<f64>() < 1.0 / ties {
					selected = Some( e );
				}
				ties += 1.0;
			}
		}
		selected
	}

	fn select_most_expensive_path_edge( &mut self, rng : &mut impl Rng ) -> Option<DirectedEdge> {
		if !self.use_path_queue {
			return None;
		}
		let path = self.pop_first_valid_path( self.config.max_paths, rng )?;
		Some( ( path.nodes()[0], path.nodes()[1] ) )
	}

	/// Scans the path heap for valid paths, repairing stale entries on the way, and
	/// picks one of the first `max_paths` valid candidates uniformly at random.
	///
	/// Stale paths (an interior node became a client or grew extra edges) are split and
	/// reconsidered; paths with a tabu edge are set aside and restored afterwards. The
	/// chosen path is removed from the index.
	fn pop_first_valid_path( &mut self, max_paths : usize, rng : &mut impl Rng )
			-> Option<TreePath>
	{
		let mut to_restore = vec![];
		let mut valid_paths : Vec<TreePath> = vec![];

		while !self.paths.is_empty() && valid_paths.len() < max_paths {
			let path = self.paths.peek().unwrap().clone();

			let stale_interior = path.interior().iter().copied()
				.find( |v| self.clients.contains( v ) || self.degree( *v ) > 2 );
			if let Some( bad ) = stale_interior {
				self.split_path_around( &path, bad, false );
				continue;
			}

			let popped = self.paths.pop_heap().unwrap();
			assert!( popped == path, "path queue is corrupted" );

			if path.edges().any( |(u, v)|
					self.tabu.contains( &(u, v) ) || self.tabu.contains( &(v, u) ) ) {
				to_restore.push( popped );
			}
			else {
				valid_paths.push( popped );
			}
		}

		for p in to_restore {
			self.paths.push_heap( p );
		}

		if valid_paths.is_empty() {
			return None;
		}
		let chosen = valid_paths[rng.gen_range( 0..valid_paths.len() )].clone();
		for p in valid_paths {
			self.paths.push_heap( p );
		}
		self.remove_path( &chosen, true );
		Some( chosen )
	}

	// ------------------------------------------------------------------
	// reconnection

	/// Reconnects the two components left by an edge removal, through the selected path
	/// or, failing that, the removed one. Installs the path, marks it tabu and reroots
	/// the detached component if it attaches at a node other than `sub_root`.
	fn reconnect( &mut self, sub_root : NodeId, removed_edges : Vec<DirectedEdge>,
			temperature : f64, rng : &mut impl Rng ) -> (bool, bool)
	{
		debug!( "sub-root: {sub_root}" );
		let desc = self.descendants( sub_root );
		let src : IndexSet<NodeId> = self.nodes.iter().copied()
			.filter( |v| !desc.contains( v ) )
			.collect();

		let (best, degrading)
			= self.select_reconnection_path( &src, &desc, &removed_edges, temperature, rng );

		let (path, installed) = match best {
			Some( p ) => (p, true),
			None => {
				debug!( "no acceptable reconnection path, restoring the removed edges" );
				( edge_path_to_node_path( &removed_edges ), false )
			}
		};

		let attachment = *path.last().unwrap();
		if attachment != sub_root {
			self.re_root( attachment, sub_root );
		}
		if self.use_path_queue {
			self.push_path_to_queue( &path );
		}
		self.tabu.add_path( &path, self.config.tabu_ttl );
		self.add_edges( &path );

		(installed, degrading)
	}

	/// Searches a reconnection path between the two components.
	///
	/// Enumerates pairs of a sampled source-side node and a descendant-side node. A pair
	/// strictly cheaper than the removed path is an improving candidate; otherwise the
	/// cheapest pair whose path differs from the removed one may still be accepted as a
	/// degrading move, subject to [evaluate_sa_probability].
	fn select_reconnection_path( &self, src : &IndexSet<NodeId>, desc : &IndexSet<NodeId>,
			removed_edges : &[DirectedEdge], temperature : f64, rng : &mut impl Rng )
			-> (Option<Vec<NodeId>>, bool)
	{
		let removed_path = edge_path_to_node_path( removed_edges );
		let to_improve = self.graph.edge_path_weight( removed_edges );
		debug!( "cost to improve: {to_improve}" );

		let intensify = self.config.intensify_only;
		let sample_size = self.config.improve_search_space.min( src.len() );
		let src_nodes : Vec<NodeId> = src.iter().copied().collect();
		let src_sample : Vec<NodeId>
			= src_nodes.choose_multiple( rng, sample_size ).copied().collect();

		let mut improving : Option<(NodeId, NodeId)> = None;
		let mut improving_cost = u64::MAX;
		let mut less_degrading : Option<Vec<NodeId>> = None;
		let mut less_degrading_cost = u64::MAX;

		for s in &src_sample {
			for d in desc {
				let length = self.graph.shortest_path_length( *s, *d );
				if length < to_improve && length < improving_cost {
					improving = Some( ( *s, *d ) );
					improving_cost = length;
				}
				else if !intensify && length < less_degrading_cost {
					let sp = self.graph.shortest_path( *s, *d );
					if sp != removed_path.as_slice() {
						less_degrading = Some( sp.to_vec() );
						less_degrading_cost = length;
					}
				}
			}
			if self.config.search_strategy == SearchStrategy::FirstImprovement
					&& improving.is_some() {
				break;
			}
		}

		if let Some( (s, d) ) = improving {
			let cleaned = self.clean_path( self.graph.shortest_path( s, d ), src, desc );
			return ( Some( cleaned ), false );
		}

		if !intensify {
			if let Some( p ) = less_degrading {
				let cleaned = self.clean_path( &p, src, desc );
				if cleaned != removed_path {
					let cleaned_weight = path_key( &self.graph, &self.config, &cleaned );
					if cleaned_weight < to_improve as i64 {
						return ( Some( cleaned ), false );
					}
					if evaluate_sa_probability( to_improve as i64, cleaned_weight,
							temperature, rng ) {
						return ( Some( cleaned ), true );
					}
				}
			}
		}

		( None, false )
	}

	// ------------------------------------------------------------------
	// rerooting

	/// Reorients the detached component so that `new_root` (the attachment point of the
	/// reconnection path) becomes its root instead of `old_root`.
	fn re_root( &mut self, new_root : NodeId, old_root : NodeId ) {
		debug!( "rerooting from {old_root} to {new_root}" );

		// path bookkeeping first, while the edges still point the old way
		if self.use_path_queue {
			if self.paths.parent_path( new_root ).is_none() {
				self.split_path_containing( new_root, old_root );
			}
			assert!( self.paths.parent_path( new_root ).is_some(), "reroot failed" );
			self.invert_paths_up_to( new_root, old_root );
			self.try_merge_paths_at( old_root );
		}

		// collect the ancestor chain before touching it; flipping in place would leave
		// a node with two parents halfway through
		let mut chain = vec![new_root];
		let mut x = new_root;
		while let Some( p ) = self.predecessor( x ) {
			chain.push( p );
			x = p;
		}
		debug_assert!( *chain.last().unwrap() == old_root, "reroot failed" );
		for w in chain.windows( 2 ) {
			self.remove_tree_edge( w[1], w[0] );
		}
		for w in chain.windows( 2 ) {
			self.add_tree_edge( w[0], w[1] );
		}
	}

	/// Splits the owner of `new_root` so that a path ends exactly at `new_root`.
	///
	/// The owner is found by climbing towards the component root and checking the
	/// children paths of each ancestor.
	fn split_path_containing( &mut self, new_root : NodeId, old_root : NodeId ) {
		let mut n1 = new_root;
		let containing = loop {
			match self.predecessor( n1 ) {
				Some( parent ) => {
					if let Some( p ) = self.paths.children_paths( parent ).iter()
							.find( |p| p.nodes().contains( &new_root ) ) {
						break p.clone();
					}
					n1 = parent;
				}
				None => {
					if n1 == old_root {
						panic!( "no path contains {new_root} while rerooting" );
					}
					panic!( "reached a root other than {old_root} while rerooting" );
				}
			}
		};
		self.split_path_around( &containing, new_root, false );
	}

	/// Collects the chain of parent paths from `new_root` up to `old_root`, splitting
	/// intermediate owners as needed, and inverts them top-down.
	fn invert_paths_up_to( &mut self, new_root : NodeId, old_root : NodeId ) {
		let mut current = new_root;
		let mut to_invert = vec![];
		while current != old_root {
			if self.paths.parent_path( current ).is_none() {
				self.split_path_containing( current, old_root );
			}
			let p = self.paths.parent_path( current )
				.expect( "path index is corrupted" ).clone();
			current = p.root_end();
			to_invert.push( p );
		}
		// inverting top-down keeps the parent side index consistent
		to_invert.reverse();
		for p in &to_invert {
			self.paths.invert( p );
		}
	}

	// ------------------------------------------------------------------
	// validation

	/// Asserts the structural invariants: a single component rooted at the root,
	/// clients all present, `|nodes| == |edges| + 1`, and consistent weight accounting.
	pub fn validate( &self ) {
		let reachable = self.descendants( self.root );
		assert!( reachable.len() == self.nodes.len()
				&& self.nodes.iter().all( |v| reachable.contains( v ) ),
			"tree is not a single component rooted at {}", self.root );
		assert!( self.clients.iter().all( |c| self.nodes.contains( c ) ),
			"a client is not a tree node" );
		assert!( self.nodes.len() == self.parent.len() + 1,
			"{} nodes for {} edges", self.nodes.len(), self.parent.len() );

		let actual : u64 = self.parent.iter()
			.map( |(c, p)| self.graph.edge_weight( *p, *c ).expect( "tree is corrupted" ) )
			.sum();
		assert!( actual == self.weight,
			"tracked weight {} differs from edge sum {actual}", self.weight );
	}

	/// Asserts that the tree equals the union of root-to-client shortest paths, the
	/// shape produced by shortest-path-tree (PIM-style) construction.
	pub fn validate_pim_tree( &self ) {
		let mut pim_edges : IndexSet<DirectedEdge> = IndexSet::new();
		for c in &self.clients {
			let sp = self.graph.shortest_path( self.root, *c );
			pim_edges.extend( node_path_to_edge_path( sp ) );
		}
		let tree_edges : IndexSet<DirectedEdge> = self.edges().into_iter().collect();
		assert!( pim_edges == tree_edges,
			"tree does not equal the union of root-to-client shortest paths" );
	}

	/// Asserts that the macro-paths partition the directed edge set and that both side
	/// indices agree with the heap. Interior staleness is legal (repaired lazily) and
	/// not checked here.
	pub fn validate_path_index( &self ) {
		if !self.use_path_queue {
			return;
		}
		let mut covered : IndexSet<DirectedEdge> = IndexSet::new();
		for p in self.paths.iter() {
			for e in p.edges() {
				assert!( covered.insert( e ),
					"edge ({}, {}) is covered by two paths", e.0, e.1 );
			}
			assert!( self.paths.parent_path( p.leaf_end() ) == Some( p ),
				"parent index disagrees with path ending at {}", p.leaf_end() );
			assert!( self.paths.children_paths( p.root_end() ).contains( p ),
				"children index disagrees with path starting at {}", p.root_end() );
		}
		let tree_edges : IndexSet<DirectedEdge> = self.edges().into_iter().collect();
		assert!( covered == tree_edges, "macro-paths do not partition the tree edges" );
	}
}


#[cfg(test)]
mod tests {
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use super::*;

	fn n( i : usize ) -> NodeId {
		NodeId::new( i )
	}

	/// Unit-weight square 0-1-2-3-0 with an expensive diagonal 0-2.
	fn square_graph() -> Arc<NetworkGraph> {
		Arc::new( NetworkGraph::from_edges( 4,
			&[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 1), (0, 2, 3)], 1 ) )
	}

	fn tree_with( config : Config ) -> MulticastTree {
		MulticastTree::new( square_graph(), Arc::new( config ), n( 0 ) )
	}

	fn sorted_edges( t : &MulticastTree ) -> Vec<(usize, usize)> {
		let mut edges : Vec<(usize, usize)> = t.edges().iter()
			.map( |(u, v)| ( u.index(), v.index() ) )
			.collect();
		edges.sort();
		edges
	}

	#[test]
	fn test_new_tree_is_root_only() {
		let t = tree_with( Config::default() );
		assert_eq!( t.weight(), 0 );
		assert_eq!( t.num_nodes(), 1 );
		assert!( t.is_client( n( 0 ) ) );
		t.validate();
	}

	#[test]
	fn test_add_client_installs_shortest_path() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 2 ) );
		// the diagonal costs 3, going around costs 2
		assert_eq!( t.weight(), 2 );
		assert_eq!( t.num_nodes(), 3 );
		t.validate();
	}

	#[test]
	fn test_add_client_attaches_to_nearest_tree_node() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		assert_eq!( sorted_edges( &t ), vec![(0, 1), (1, 2)] );
		assert_eq!( t.weight(), 2 );
		t.validate();
	}

	#[test]
	fn test_degenerate_add_changes_nothing() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		let edges_before = sorted_edges( &t );
		// node 1 is already a transit node of the tree
		t.remove_client( n( 1 ) );
		t.add_client( n( 1 ) );
		assert_eq!( sorted_edges( &t ), edges_before );
		t.validate();
	}

	#[test]
	fn test_remove_leaf_client_prunes_chain() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 2 ) );
		t.remove_client( n( 2 ) );
		assert_eq!( t.weight(), 0 );
		assert_eq!( t.num_nodes(), 1 );
		t.validate();
	}

	#[test]
	fn test_remove_transit_client_keeps_structure() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		t.remove_client( n( 1 ) );
		// 1 is still needed to reach 2
		assert_eq!( sorted_edges( &t ), vec![(0, 1), (1, 2)] );
		assert!( !t.is_client( n( 1 ) ) );
		t.validate();
	}

	#[test]
	fn test_remove_root_is_ignored() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		t.remove_client( n( 0 ) );
		assert!( t.is_client( n( 0 ) ) );
		assert_eq!( t.num_nodes(), 2 );
	}

	#[test]
	fn test_remove_non_client_is_ignored() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		t.remove_client( n( 2 ) );
		assert_eq!( t.num_nodes(), 2 );
		t.validate();
	}

	#[test]
	fn test_pim_mode_builds_shortest_path_tree() {
		let config = Config { pim_mode : true, ..Config::default() };
		let mut t = tree_with( config );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		t.add_client( n( 3 ) );
		t.validate();
		t.validate_pim_tree();
	}

	#[test]
	fn test_improve_once_finds_cheaper_reconnection() {
		// build a deliberately bad tree: 0 -> 1 -> 2 plus 0 -> 3, then drop client 1;
		// the optimal Steiner tree for {0, 2, 3} is 0 -> 3 -> 2 of weight 2
		let mut t = tree_with( Config { tabu_ttl : 1, ..Config::default() } );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		t.add_client( n( 3 ) );
		t.remove_client( n( 1 ) );
		assert_eq!( t.weight(), 3 );

		let mut rng = StdRng::seed_from_u64( 0 );
		for _ in 0..50 {
			t.improve_once( 0.0, &mut rng );
			t.decay_tabu();
			t.validate();
		}
		assert_eq!( t.weight(), 2 );
		assert_eq!( sorted_edges( &t ), vec![(0, 3), (3, 2)] );
	}

	#[test]
	fn test_improve_once_with_everything_tabu_is_a_no_op() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 2 ) );
		let edges = sorted_edges( &t );

		for (u, v) in t.edges() {
			t.tabu.add_path( &[u, v], 5 );
		}
		let mut rng = StdRng::seed_from_u64( 0 );
		let (installed, degrading) = t.improve_once( 10.0, &mut rng );
		assert!( !installed && !degrading );
		assert_eq!( sorted_edges( &t ), edges );
		t.validate();
	}

	#[test]
	fn test_path_queue_partitions_edges() {
		let config = Config {
			selection_heuristic : SelectionHeuristic::MostExpensivePath,
			..Config::default()
		};
		let mut t = tree_with( config );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		t.add_client( n( 3 ) );
		t.validate_path_index();
		t.remove_client( n( 1 ) );
		t.validate_path_index();
		t.remove_client( n( 2 ) );
		t.validate_path_index();
		t.validate();
	}

	#[test]
	fn test_path_selection_improves_tree() {
		let config = Config {
			selection_heuristic : SelectionHeuristic::MostExpensivePath,
			tabu_ttl : 1,
			..Config::default()
		};
		let mut t = tree_with( config );
		t.add_client( n( 1 ) );
		t.add_client( n( 2 ) );
		t.add_client( n( 3 ) );
		t.remove_client( n( 1 ) );
		assert_eq!( t.weight(), 3 );

		let mut rng = StdRng::seed_from_u64( 0 );
		for _ in 0..50 {
			t.improve_once( 0.0, &mut rng );
			t.decay_tabu();
			t.validate();
			t.validate_path_index();
		}
		assert_eq!( t.weight(), 2 );
	}

	#[test]
	fn test_snapshot_is_independent() {
		let mut t = tree_with( Config::default() );
		t.add_client( n( 1 ) );
		let snapshot = t.clone();
		t.add_client( n( 2 ) );
		assert_eq!( snapshot.num_nodes(), 2 );
		assert_eq!( t.num_nodes(), 3 );
		assert_eq!( snapshot.weight(), 1 );
	}

	#[test]
	fn test_sa_acceptance() {
		let mut rng = StdRng::seed_from_u64( 0 );
		// improvements are always accepted
		assert!( evaluate_sa_probability( 10, 8, 0.0, &mut rng ) );
		assert!( evaluate_sa_probability( 10, 10, 0.0, &mut rng ) );
		// degradations are rejected at temperature zero
		assert!( !evaluate_sa_probability( 10, 12, 0.0, &mut rng ) );
		// at high temperature, degradations are eventually accepted
		let accepted = (0..1000)
			.filter( |_| evaluate_sa_probability( 10, 11, 1000.0, &mut rng ) )
			.count();
		assert!( accepted > 900, "only {accepted} of 1000 mild degradations accepted" );
	}
}
