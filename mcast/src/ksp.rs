//! All-pairs k-shortest-paths precomputation and its on-disk cache.
//!
//! Paths are computed with Yen's algorithm on top of Dijkstra, once per unordered node
//! pair and mirrored for the opposite direction. The resulting oracle is immutable; the
//! tree only ever consumes the first (shortest) path of each pair, the remaining breadth
//! is kept for forward compatibility.

use std::cmp::Reverse;
use std::fs::File;
use std::io;
use std::path::Path;

use indexmap::IndexSet;
use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};

use crate::NodeId;


/// Adjacency lists of an undirected weighted graph: `adj[u]` holds `(v, weight)` pairs.
pub type Adjacency = Vec<Vec<(usize, u64)>>;


fn norm_edge( u : usize, v : usize ) -> (usize, usize) {
	if u <= v { (u, v) } else { (v, u) }
}

fn path_cost( adj : &Adjacency, path : &[usize] ) -> u64 {
	path.windows( 2 ).map( |w| {
		adj[w[0]].iter().find( |(v, _)| *v == w[1] )
			.unwrap_or_else( || panic!( "no edge ({}, {})", w[0], w[1] ) ).1
	} ).sum()
}

/// Dijkstra from `src` to `dst`, ignoring `banned_edges` (undirected) and `banned_nodes`.
///
/// Returns the cost and node sequence of a shortest path, or `None` if `dst` is
/// unreachable. Deterministic for a fixed adjacency order.
fn dijkstra( adj : &Adjacency, src : usize, dst : usize,
		banned_edges : &IndexSet<(usize, usize)>, banned_nodes : &IndexSet<usize> )
		-> Option<(u64, Vec<usize>)>
{
	if src == dst {
		return Some( ( 0, vec![src] ) );
	}

	let mut dist : Vec<u64> = vec![u64::MAX; adj.len()];
	let mut prev : Vec<usize> = vec![usize::MAX; adj.len()];
	let mut queue = PriorityQueue::new();

	dist[src] = 0;
	queue.push( src, Reverse( 0u64 ) );

	while let Some( (u, Reverse( d )) ) = queue.pop() {
		if u == dst {
			let mut path = vec![dst];
			let mut x = dst;
			while x != src {
				x = prev[x];
				path.push( x );
			}
			path.reverse();
			return Some( (d, path) );
		}
		for (v, w) in &adj[u] {
			if banned_nodes.contains( v ) || banned_edges.contains( &norm_edge( u, *v ) ) {
				continue;
			}
			let nd = d + w;
			if nd < dist[*v] {
				dist[*v] = nd;
				prev[*v] = u;
				queue.push( *v, Reverse( nd ) );
			}
		}
	}
	None
}

/// Computes up to `k` loopless shortest paths from `src` to `dst` (Yen's algorithm).
///
/// The result is sorted by increasing cost and contains at least one path if `dst` is
/// reachable at all.
pub fn k_shortest_paths( adj : &Adjacency, src : usize, dst : usize, k : usize )
		-> Vec<(u64, Vec<usize>)>
{
	assert!( k >= 1, "k must be at least 1" );

	let first = match dijkstra( adj, src, dst, &IndexSet::new(), &IndexSet::new() ) {
		Some( p ) => p,
		None => return vec![]
	};
	let mut found = vec![first];
	let mut candidates : Vec<(u64, Vec<usize>)> = Vec::new();

	for _ in 1..k {
		let (_, prev_path) = found.last().unwrap().clone();
		for i in 0..prev_path.len() - 1 {
			let spur = prev_path[i];
			let root_path = &prev_path[..=i];

			// ban the edges continuing any known path that shares this root
			let mut banned_edges = IndexSet::new();
			for (_, p) in &found {
				if p.len() > i + 1 && p[..=i] == *root_path {
					banned_edges.insert( norm_edge( p[i], p[i + 1] ) );
				}
			}
			// ban the root path itself, except for the spur node
			let banned_nodes : IndexSet<usize> = root_path[..i].iter().copied().collect();

			if let Some( (spur_cost, spur_path) )
					= dijkstra( adj, spur, dst, &banned_edges, &banned_nodes ) {
				let mut total_path = root_path.to_vec();
				total_path.extend( &spur_path[1..] );
				let total_cost = path_cost( adj, root_path ) + spur_cost;
				let candidate = (total_cost, total_path);
				if !candidates.contains( &candidate ) && !found.contains( &candidate ) {
					candidates.push( candidate );
				}
			}
		}
		if candidates.is_empty() {
			break;
		}
		candidates.sort();
		found.push( candidates.remove( 0 ) );
	}
	found
}


/// Precomputed, read-only shortest-path oracles for every ordered node pair.
///
/// `paths[u][v]` is the list of up to `k` node sequences from `u` to `v`, cheapest
/// first; `lengths[u][v]` the matching costs; `counts[u][v]` how many were found.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathOracle {
	k : usize,
	paths : Vec<Vec<Vec<Vec<NodeId>>>>,
	lengths : Vec<Vec<Vec<u64>>>,
	counts : Vec<Vec<usize>>
}

impl ShortestPathOracle {
	/// Computes the oracle for the given adjacency structure.
	///
	/// Each unordered pair is solved once; the opposite direction reuses the reversed
	/// node sequences with the same costs.
	pub fn compute( adj : &Adjacency, k : usize ) -> ShortestPathOracle {
		let n = adj.len();
		let mut paths = vec![vec![Vec::new(); n]; n];
		let mut lengths = vec![vec![Vec::new(); n]; n];
		let mut counts = vec![vec![0; n]; n];

		for i in 0..n {
			for j in 0..=i {
				let solutions = k_shortest_paths( adj, i, j, k );
				counts[i][j] = solutions.len();
				counts[j][i] = solutions.len();
				for (cost, path) in solutions {
					let forward : Vec<NodeId> = path.iter().map( |v| NodeId::new( *v ) ).collect();
					let mut backward = forward.clone();
					backward.reverse();
					paths[i][j].push( forward );
					lengths[i][j].push( cost );
					paths[j][i].push( backward );
					lengths[j][i].push( cost );
				}
			}
		}
		ShortestPathOracle { k, paths, lengths, counts }
	}

	/// The breadth this oracle was computed with.
	pub fn k( &self ) -> usize {
		self.k
	}

	/// The canonical (first) shortest node sequence from `u` to `v`.
	pub fn path( &self, u : NodeId, v : NodeId ) -> &[NodeId] {
		&self.paths[u.index()][v.index()].first()
			.unwrap_or_else( || panic!( "no path between {u} and {v}" ) )[..]
	}

	/// The length of the canonical shortest path from `u` to `v`.
	pub fn length( &self, u : NodeId, v : NodeId ) -> u64 {
		*self.lengths[u.index()][v.index()].first()
			.unwrap_or_else( || panic!( "no path between {u} and {v}" ) )
	}

	/// All stored node sequences from `u` to `v`, cheapest first.
	pub fn all_paths( &self, u : NodeId, v : NodeId ) -> &[Vec<NodeId>] {
		&self.paths[u.index()][v.index()]
	}

	/// The number of stored paths from `u` to `v`.
	pub fn count( &self, u : NodeId, v : NodeId ) -> usize {
		self.counts[u.index()][v.index()]
	}

	/// Serializes the oracle to the given file.
	pub fn save( &self, path : &Path ) -> io::Result<()> {
		let file = File::create( path )?;
		serde_json::to_writer( file, self ).map_err( io::Error::from )
	}

	/// Reads back an oracle written by [ShortestPathOracle::save].
	pub fn load( path : &Path ) -> io::Result<ShortestPathOracle> {
		let file = File::open( path )?;
		serde_json::from_reader( file ).map_err( io::Error::from )
	}
}
