//! The immutable weighted network graph and its shortest-path oracles.
//!
//! A [NetworkGraph] is loaded once from a topology file (or built from explicit edges),
//! derives its edge weights according to a [WeightPolicy], computes (or reads from a
//! cache file) the all-pairs k-shortest-paths oracle, and is immutable afterwards. Trees
//! only hold a shared reference to it.

use std::io;
use std::io::BufRead;
use std::path::Path;

use log::{info, warn};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::config::WeightPolicy;
use crate::err::TopologyError;
use crate::ksp::{Adjacency, ShortestPathOracle};
use crate::{DirectedEdge, NodeId};


/// Distance assigned to an edge under the `GEO` policy when a coordinate is missing.
const DEFAULT_GEO_DISTANCE : u64 = 60;

const EARTH_RADIUS_KM : f64 = 6371.0;


/// Geographic position of a node, used by the `GEO` weight policy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
	/// Latitude in degrees.
	pub lat : f64,
	/// Longitude in degrees.
	pub lon : f64
}

/// Great-circle distance between two points, in km.
fn haversine( a : GeoPoint, b : GeoPoint ) -> f64 {
	let d_lat = (b.lat - a.lat).to_radians();
	let d_lon = (b.lon - a.lon).to_radians();
	let h = (d_lat / 2.0).sin().powi( 2 )
		+ a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi( 2 );
	2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}


fn conv_idx( v : NodeId ) -> NodeIndex {
	NodeIndex::new( v.index() )
}


/// An edge line of a topology file, before weight derivation.
struct RawEdge {
	u : usize,
	v : usize,
	weight : Option<u64>
}

/// A parsed topology file: node count, per-node coordinates, raw edges.
struct RawTopology {
	num_nodes : usize,
	coords : Vec<Option<GeoPoint>>,
	edges : Vec<RawEdge>
}

fn read_topology( path : &Path ) -> Result<RawTopology, TopologyError> {
	let file = std::fs::File::open( path )?;
	let mut num_nodes = None;
	let mut coords : Vec<Option<GeoPoint>> = vec![];
	let mut edges : Vec<RawEdge> = vec![];

	for line in io::BufReader::new( file ).lines() {
		let line = line?;
		let line = line.trim();
		if line.is_empty() || line.starts_with( '#' ) {
			continue;
		}
		let parts : Vec<&str> = line.split_whitespace().collect();
		match parts[0] {
			// "graph <num_nodes>"
			"graph" if parts.len() == 2 => {
				let n : usize = parts[1].parse()?;
				num_nodes = Some( n );
				coords = vec![None; n];
			}
			// "n <id> [<lat> <lon>]"
			"n" if parts.len() == 2 || parts.len() == 4 => {
				let id : usize = parts[1].parse()?;
				if id >= coords.len() {
					return Err( TopologyError::UnknownNode( id ) );
				}
				if parts.len() == 4 {
					coords[id] = Some( GeoPoint {
						lat : parts[2].parse()?,
						lon : parts[3].parse()?
					} );
				}
			}
			// "e <u> <v> [<weight>]"
			"e" if parts.len() == 3 || parts.len() == 4 => {
				let u : usize = parts[1].parse()?;
				let v : usize = parts[2].parse()?;
				let n = num_nodes.ok_or_else( || TopologyError::InvalidLine( line.to_string() ) )?;
				if u >= n {
					return Err( TopologyError::UnknownNode( u ) );
				}
				if v >= n || u == v {
					return Err( TopologyError::UnknownNode( v ) );
				}
				let weight = if parts.len() == 4 { Some( parts[3].parse()? ) } else { None };
				edges.push( RawEdge { u, v, weight } );
			}
			_ => return Err( TopologyError::InvalidLine( line.to_string() ) )
		}
	}

	let num_nodes = num_nodes.ok_or( TopologyError::MissingGraphLine )?;
	Ok( RawTopology { num_nodes, coords, edges } )
}


/// Immutable weighted undirected graph plus precomputed shortest-path oracles.
#[derive(Debug)]
pub struct NetworkGraph {
	g : UnGraph<Option<GeoPoint>, u64>,
	oracle : ShortestPathOracle
}

impl NetworkGraph {
	/// Loads a topology file, derives edge weights per `policy` and prepares the
	/// shortest-path oracle.
	///
	/// If `cache` names an existing file the oracle is read from it; otherwise it is
	/// recomputed and, if `cache` is given, written there.
	pub fn from_file( path : &Path, policy : WeightPolicy, k : usize, cache : Option<&Path> )
			-> Result<NetworkGraph, TopologyError>
	{
		let raw = read_topology( path )?;

		let mut g : UnGraph<Option<GeoPoint>, u64> = UnGraph::new_undirected();
		for id in 0..raw.num_nodes {
			g.add_node( raw.coords[id] );
		}
		for e in &raw.edges {
			let weight = match policy {
				WeightPolicy::Weight => e.weight.ok_or( TopologyError::MissingWeight( e.u, e.v ) )?,
				WeightPolicy::Geo => match ( raw.coords[e.u], raw.coords[e.v] ) {
					( Some( cu ), Some( cv ) ) => {
						// a link weight must be strictly positive
						(haversine( cu, cv ) as u64).max( 1 )
					}
					_ => {
						warn!( "no location information available for edge ({}, {}), \
							using default distance {DEFAULT_GEO_DISTANCE}", e.u, e.v );
						DEFAULT_GEO_DISTANCE
					}
				},
				WeightPolicy::None => 1
			};
			g.add_edge( NodeIndex::new( e.u ), NodeIndex::new( e.v ), weight );
		}

		let oracle = match cache {
			Some( cache_path ) if cache_path.is_file() => {
				info!( "loading shortest paths structures from file: {}", cache_path.display() );
				ShortestPathOracle::load( cache_path )?
			}
			_ => {
				info!( "recomputing shortest paths structures" );
				let oracle = ShortestPathOracle::compute( &Self::adjacency_of( &g ), k );
				if let Some( cache_path ) = cache {
					info!( "saving shortest paths structures to file: {}", cache_path.display() );
					oracle.save( cache_path )?;
				}
				oracle
			}
		};

		Ok( NetworkGraph { g, oracle } )
	}

	/// Builds a graph from explicit `(u, v, weight)` edges and computes its oracle.
	///
	/// Mostly useful for tests and examples.
	pub fn from_edges( num_nodes : usize, edges : &[(usize, usize, u64)], k : usize )
			-> NetworkGraph
	{
		let mut g : UnGraph<Option<GeoPoint>, u64> = UnGraph::new_undirected();
		for _ in 0..num_nodes {
			g.add_node( None );
		}
		for (u, v, weight) in edges {
			g.add_edge( NodeIndex::new( *u ), NodeIndex::new( *v ), *weight );
		}
		let oracle = ShortestPathOracle::compute( &Self::adjacency_of( &g ), k );
		NetworkGraph { g, oracle }
	}

	fn adjacency_of( g : &UnGraph<Option<GeoPoint>, u64> ) -> Adjacency {
		(0..g.node_count()).map( |u| {
			g.edges( NodeIndex::new( u ) )
				.map( |e| {
					let v = if e.source().index() == u { e.target() } else { e.source() };
					( v.index(), *e.weight() )
				} )
				.collect()
		} ).collect()
	}

	/// The number of nodes.
	pub fn num_nodes( &self ) -> usize {
		self.g.node_count()
	}

	/// Iterate over all nodes.
	pub fn nodes( &self ) -> impl Iterator<Item = NodeId> {
		(0..self.g.node_count()).map( NodeId::new )
	}

	/// Whether `v` is a node of this graph.
	pub fn contains_node( &self, v : NodeId ) -> bool {
		v.index() < self.g.node_count()
	}

	/// The weight of the undirected edge between `u` and `v`, if it exists.
	pub fn edge_weight( &self, u : NodeId, v : NodeId ) -> Option<u64> {
		self.g.find_edge( conv_idx( u ), conv_idx( v ) )
			.map( |e| *self.g.edge_weight( e ).unwrap() )
	}

	/// All undirected edges with their weights.
	pub fn edges( &self ) -> Vec<(NodeId, NodeId, u64)> {
		self.g.edge_indices().map( |e| {
			let (u, v) = self.g.edge_endpoints( e ).unwrap();
			( NodeId::new( u.index() ), NodeId::new( v.index() ), *self.g.edge_weight( e ).unwrap() )
		} ).collect()
	}

	/// The canonical shortest node sequence from `u` to `v`.
	pub fn shortest_path( &self, u : NodeId, v : NodeId ) -> &[NodeId] {
		self.oracle.path( u, v )
	}

	/// The length of the canonical shortest path from `u` to `v`.
	pub fn shortest_path_length( &self, u : NodeId, v : NodeId ) -> u64 {
		self.oracle.length( u, v )
	}

	/// The underlying oracle.
	pub fn oracle( &self ) -> &ShortestPathOracle {
		&self.oracle
	}

	/// The total weight of a path expressed as a node sequence.
	///
	/// Panics if a step of the path is not a graph edge.
	pub fn node_path_weight( &self, path : &[NodeId] ) -> u64 {
		path.windows( 2 ).map( |w| {
			self.edge_weight( w[0], w[1] )
				.unwrap_or_else( || panic!( "no edge ({}, {})", w[0], w[1] ) )
		} ).sum()
	}

	/// The total weight of a path expressed as directed edges.
	pub fn edge_path_weight( &self, path : &[DirectedEdge] ) -> u64 {
		path.iter().map( |(u, v)| {
			self.edge_weight( *u, *v )
				.unwrap_or_else( || panic!( "no edge ({u}, {v})" ) )
		} ).sum()
	}
}


#[cfg(test)]
mod tests {
	use std::io::Write;
	use super::*;

	fn n( i : usize ) -> NodeId {
		NodeId::new( i )
	}

	#[test]
	fn test_from_edges_oracle() {
		let g = NetworkGraph::from_edges( 4,
			&[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 1), (0, 2, 3)], 1 );
		assert_eq!( g.num_nodes(), 4 );
		assert_eq!( g.edge_weight( n( 0 ), n( 2 ) ), Some( 3 ) );
		assert_eq!( g.edge_weight( n( 1 ), n( 3 ) ), None );
		// the diagonal is more expensive than going around
		assert_eq!( g.shortest_path_length( n( 0 ), n( 2 ) ), 2 );
		let sp = g.shortest_path( n( 0 ), n( 2 ) );
		assert_eq!( sp.len(), 3 );
		assert_eq!( ( sp[0], sp[2] ), ( n( 0 ), n( 2 ) ) );
	}

	#[test]
	fn test_path_weights() {
		let g = NetworkGraph::from_edges( 3, &[(0, 1, 2), (1, 2, 5)], 1 );
		assert_eq!( g.node_path_weight( &[n( 0 ), n( 1 ), n( 2 )] ), 7 );
		assert_eq!( g.edge_path_weight( &[( n( 0 ), n( 1 ) ), ( n( 1 ), n( 2 ) )] ), 7 );
	}

	fn write_topology( name : &str, contents : &str ) -> std::path::PathBuf {
		let path = std::env::temp_dir().join( name );
		let mut file = std::fs::File::create( &path ).unwrap();
		file.write_all( contents.as_bytes() ).unwrap();
		path
	}

	#[test]
	fn test_load_weight_policy() {
		let path = write_topology( "mcast_test_topology_weight.txt",
			"# a triangle\ngraph 3\ne 0 1 4\ne 1 2 2\ne 0 2 10\n" );
		let g = NetworkGraph::from_file( &path, WeightPolicy::Weight, 1, None ).unwrap();
		std::fs::remove_file( &path ).ok();
		assert_eq!( g.edge_weight( n( 0 ), n( 1 ) ), Some( 4 ) );
		assert_eq!( g.shortest_path_length( n( 0 ), n( 2 ) ), 6 );
	}

	#[test]
	fn test_load_none_policy_overwrites_weights() {
		let path = write_topology( "mcast_test_topology_none.txt",
			"graph 3\ne 0 1 4\ne 1 2\ne 0 2 10\n" );
		let g = NetworkGraph::from_file( &path, WeightPolicy::None, 1, None ).unwrap();
		std::fs::remove_file( &path ).ok();
		assert_eq!( g.edge_weight( n( 0 ), n( 1 ) ), Some( 1 ) );
		assert_eq!( g.shortest_path_length( n( 0 ), n( 2 ) ), 1 );
	}

	#[test]
	fn test_load_geo_policy() {
		// Brussels, Paris, London; all pairwise links
		let path = write_topology( "mcast_test_topology_geo.txt",
			"graph 3\n\
			n 0 50.85 4.35\n\
			n 1 48.86 2.35\n\
			n 2 51.51 -0.13\n\
			e 0 1\ne 1 2\ne 0 2\n" );
		let g = NetworkGraph::from_file( &path, WeightPolicy::Geo, 1, None ).unwrap();
		std::fs::remove_file( &path ).ok();
		let brussels_paris = g.edge_weight( n( 0 ), n( 1 ) ).unwrap();
		assert!( (250..350).contains( &brussels_paris ), "got {brussels_paris} km" );
	}

	#[test]
	fn test_load_missing_weight_fails() {
		let path = write_topology( "mcast_test_topology_missing.txt", "graph 2\ne 0 1\n" );
		let result = NetworkGraph::from_file( &path, WeightPolicy::Weight, 1, None );
		std::fs::remove_file( &path ).ok();
		assert!( matches!( result, Err( TopologyError::MissingWeight( 0, 1 ) ) ) );
	}

	#[test]
	fn test_load_unknown_node_fails() {
		let path = write_topology( "mcast_test_topology_unknown.txt", "graph 2\ne 0 5 1\n" );
		let result = NetworkGraph::from_file( &path, WeightPolicy::Weight, 1, None );
		std::fs::remove_file( &path ).ok();
		assert!( matches!( result, Err( TopologyError::UnknownNode( 5 ) ) ) );
	}

	#[test]
	fn test_oracle_cache_round_trip() {
		let topo = write_topology( "mcast_test_topology_cached.txt",
			"graph 3\ne 0 1 1\ne 1 2 1\ne 0 2 5\n" );
		let cache = std::env::temp_dir().join( "mcast_test_topology_cached_sp.json" );
		std::fs::remove_file( &cache ).ok();

		let first = NetworkGraph::from_file( &topo, WeightPolicy::Weight, 2, Some( &cache ) ).unwrap();
		assert!( cache.is_file() );
		let second = NetworkGraph::from_file( &topo, WeightPolicy::Weight, 2, Some( &cache ) ).unwrap();
		std::fs::remove_file( &topo ).ok();
		std::fs::remove_file( &cache ).ok();

		assert_eq!( first.oracle(), second.oracle() );
	}
}
