//! Event streams and the scenario runner.
//!
//! A scenario is an ordered sequence of [Event]s driven against a single tree: client
//! joins and leaves mutate it, ticks record its cost, improvement events hand it to the
//! annealing driver for a bounded time. Events are totally ordered; the effect of each
//! one is fully observable before the next begins.

use std::fmt::{Display, Formatter};
use std::io;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{ClientOrdering, Config};
use crate::err::TopologyError;
use crate::graph::NetworkGraph;
use crate::improve::improve_tree;
use crate::stats::Statistics;
use crate::tree::MulticastTree;
use crate::NodeId;


const VERIFY : bool = cfg!( debug_assertions ) || cfg!( feature = "verify_tree" );


/// One entry of an event stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
	/// Subscribe a client.
	Add( NodeId ),
	/// Unsubscribe a client.
	Remove( NodeId ),
	/// Observe the current tree cost.
	Tick( u64 ),
	/// Run the improver for the given number of milliseconds.
	Improve( u64 )
}

impl Display for Event {
	fn fmt( &self, f : &mut Formatter<'_> ) -> std::fmt::Result {
		match self {
			Event::Add( v ) => write!( f, "a {v}" ),
			Event::Remove( v ) => write!( f, "r {v}" ),
			Event::Tick( t ) => write!( f, "t {t}" ),
			Event::Improve( ms ) => write!( f, "i {ms}" )
		}
	}
}


/// Parses one event line of the form `<action> <arg>`.
pub fn parse_event_line( line : &str ) -> Result<Event, TopologyError> {
	let parts : Vec<&str> = line.split_whitespace().collect();
	if parts.len() != 2 {
		return Err( TopologyError::InvalidLine( line.to_string() ) );
	}
	let arg : u64 = parts[1].parse()?;
	match parts[0] {
		"a" => Ok( Event::Add( NodeId::new( arg as usize ) ) ),
		"r" => Ok( Event::Remove( NodeId::new( arg as usize ) ) ),
		"t" => Ok( Event::Tick( arg ) ),
		"i" => Ok( Event::Improve( arg ) ),
		_ => Err( TopologyError::InvalidLine( line.to_string() ) )
	}
}

/// Reads an event stream from a file; `#` starts a comment, blank lines are skipped.
pub fn read_events( path : &Path ) -> Result<Vec<Event>, TopologyError> {
	let file = std::fs::File::open( path )?;
	let mut events = vec![];
	for line in io::BufReader::new( file ).lines() {
		let line = line?;
		let line = line.trim();
		if line.is_empty() || line.starts_with( '#' ) {
			continue;
		}
		events.push( parse_event_line( line )? );
	}
	Ok( events )
}

/// Writes an event stream, preceded by `#`-prefixed header lines.
pub fn write_events( path : &Path, header : &[String], events : &[Event] ) -> io::Result<()> {
	let mut file = std::fs::File::create( path )?;
	for line in header {
		writeln!( file, "# {line}" )?;
	}
	for event in events {
		writeln!( file, "{event}" )?;
	}
	Ok( () )
}


/// The set of clients subscribed after the whole stream has run.
pub fn final_clients( events : &[Event] ) -> Vec<NodeId> {
	let mut clients = vec![];
	for event in events {
		match event {
			Event::Add( c ) => clients.push( *c ),
			Event::Remove( c ) => {
				if let Some( pos ) = clients.iter().position( |x| x == c ) {
					clients.remove( pos );
				}
			}
			_ => {}
		}
	}
	clients
}

/// Inserts an `i <maxtime>` event after every `period`-th add/remove/tick event.
///
/// Does nothing when `period` or `maxtime` is zero.
pub fn add_improve_steps( events : &[Event], period : usize, maxtime : u64 ) -> Vec<Event> {
	if period == 0 || maxtime == 0 {
		return events.to_vec();
	}
	let mut result = vec![];
	let mut counted = 0;
	for event in events {
		result.push( *event );
		if !matches!( event, Event::Improve( _ ) ) {
			counted += 1;
			if counted % period == 0 {
				result.push( Event::Improve( maxtime ) );
			}
		}
	}
	result
}


/// Applies the configured client ordering policy to a stream.
///
/// `ORDERED` keeps the stream; `RANDOM` shuffles the join arguments among the join
/// positions; `CLOSEST_TREE` rebuilds the stream as a greedy nearest-first join sequence
/// of the final client set, with improvement steps injected per the configuration.
pub fn order_clients( events : &[Event], config : &Config, graph : &NetworkGraph,
		root : NodeId, rng : &mut impl Rng ) -> Vec<Event>
{
	match config.client_ordering {
		ClientOrdering::Ordered => events.to_vec(),
		ClientOrdering::Random => {
			let mut join_args : Vec<NodeId> = events.iter()
				.filter_map( |e| match e { Event::Add( c ) => Some( *c ), _ => None } )
				.collect();
			join_args.shuffle( rng );
			let mut next = join_args.into_iter();
			events.iter().map( |e| match e {
				Event::Add( _ ) => Event::Add( next.next().unwrap() ),
				other => *other
			} ).collect()
		}
		ClientOrdering::ClosestTree => {
			let mut remaining = final_clients( events );
			let mut tree_nodes = vec![root];
			let mut ordered = vec![];
			while !remaining.is_empty() {
				let mut best = 0;
				let mut best_cost = u64::MAX;
				for (i, c) in remaining.iter().enumerate() {
					for t in &tree_nodes {
						let cost = graph.shortest_path_length( *t, *c );
						if cost < best_cost {
							best_cost = cost;
							best = i;
						}
					}
				}
				let chosen = remaining.remove( best );
				tree_nodes.push( chosen );
				ordered.push( Event::Add( chosen ) );
			}
			add_improve_steps( &ordered, config.improve_period, config.improve_maxtime )
		}
	}
}


/// Drives an event stream against a fresh tree rooted at `root` and returns the final
/// tree. Statistics hooks surround every event.
///
/// Client ordering is applied up front; if the stream carries no explicit improvement
/// events, periodic ones are injected per `improve_period`. Events referring to nodes
/// outside the topology are ignored with a warning. Removal of a non-client and
/// addition of a node already in the tree are no-ops whose latency is recorded as zero.
pub fn run_scenario( graph : &Arc<NetworkGraph>, config : &Arc<Config>, root : NodeId,
		events : &[Event], rng : &mut impl Rng, stats : &mut Statistics ) -> MulticastTree
{
	let mut events = order_clients( events, config, graph, root, rng );
	if !events.iter().any( |e| matches!( e, Event::Improve( _ ) ) ) {
		events = add_improve_steps( &events, config.improve_period, config.improve_maxtime );
	}

	let mut tree = MulticastTree::new( graph.clone(), config.clone(), root );

	for event in &events {
		let mut discard_time = false;
		stats.start_event( tree.num_nodes() );

		match *event {
			Event::Add( c ) => {
				if !graph.contains_node( c ) {
					warn!( "ignoring addition of {c}: not a topology node" );
					discard_time = true;
				}
				else {
					if tree.contains_node( c ) {
						discard_time = true;
					}
					tree.add_client( c );
				}
			}
			Event::Remove( c ) => {
				if !graph.contains_node( c ) {
					warn!( "ignoring removal of {c}: not a topology node" );
					discard_time = true;
				}
				else {
					tree.remove_client( c );
					if tree.contains_node( c ) {
						discard_time = true;
					}
				}
			}
			Event::Tick( _ ) | Event::Improve( _ ) => {}
		}

		if VERIFY {
			tree.validate();
		}
		stats.end_event( event, tree.weight(), discard_time );

		if let Event::Improve( ms ) = *event {
			if !config.pim_mode && ms > 0 {
				stats.start_improve( tree.edges(), tree.weight() );
				tree = improve_tree( tree, ms, rng, stats );
				if VERIFY {
					tree.validate();
				}
				stats.end_improve( tree.edges(), tree.weight() );
			}
			else {
				debug!( "improvement event discarded (pim mode or zero budget)" );
			}
		}
	}

	if VERIFY {
		tree.validate();
	}
	tree
}


#[cfg(test)]
mod tests {
	use super::*;

	fn n( i : usize ) -> NodeId {
		NodeId::new( i )
	}

	#[test]
	fn test_parse_event_lines() {
		assert_eq!( parse_event_line( "a 3" ).unwrap(), Event::Add( n( 3 ) ) );
		assert_eq!( parse_event_line( "r 0" ).unwrap(), Event::Remove( n( 0 ) ) );
		assert_eq!( parse_event_line( "t 12" ).unwrap(), Event::Tick( 12 ) );
		assert_eq!( parse_event_line( "i 25" ).unwrap(), Event::Improve( 25 ) );
		assert!( parse_event_line( "x 1" ).is_err() );
		assert!( parse_event_line( "a" ).is_err() );
		assert!( parse_event_line( "a one" ).is_err() );
	}

	#[test]
	fn test_event_file_round_trip() {
		let events = vec![Event::Add( n( 1 ) ), Event::Tick( 1 ), Event::Remove( n( 1 ) ),
			Event::Improve( 25 ), Event::Tick( 2 )];
		let path = std::env::temp_dir().join( "mcast_test_events.txt" );
		write_events( &path, &["generated for a test".to_string()], &events ).unwrap();
		let read_back = read_events( &path ).unwrap();
		std::fs::remove_file( &path ).ok();
		assert_eq!( read_back, events );
	}

	#[test]
	fn test_final_clients() {
		let events = vec![Event::Add( n( 1 ) ), Event::Add( n( 2 ) ), Event::Tick( 1 ),
			Event::Remove( n( 1 ) ), Event::Add( n( 3 ) )];
		assert_eq!( final_clients( &events ), vec![n( 2 ), n( 3 )] );
	}

	#[test]
	fn test_random_ordering_permutes_joins_in_place() {
		use rand::prelude::StdRng;
		use rand::SeedableRng;

		let graph = crate::graph::NetworkGraph::from_edges( 4,
			&[(0, 1, 1), (1, 2, 1), (2, 3, 1)], 1 );
		let config = Config { client_ordering : ClientOrdering::Random, ..Config::default() };
		let events = vec![Event::Add( n( 1 ) ), Event::Tick( 1 ), Event::Add( n( 2 ) ),
			Event::Tick( 2 ), Event::Add( n( 3 ) )];

		let mut rng = StdRng::seed_from_u64( 5 );
		let ordered = order_clients( &events, &config, &graph, n( 0 ), &mut rng );

		assert_eq!( ordered.len(), events.len() );
		// ticks keep their positions
		assert_eq!( ordered[1], Event::Tick( 1 ) );
		assert_eq!( ordered[3], Event::Tick( 2 ) );
		// joins are a permutation of the original join arguments
		let mut joins : Vec<usize> = ordered.iter()
			.filter_map( |e| match e { Event::Add( c ) => Some( c.index() ), _ => None } )
			.collect();
		joins.sort();
		assert_eq!( joins, vec![1, 2, 3] );
	}

	#[test]
	fn test_closest_tree_ordering_is_greedy() {
		use rand::prelude::StdRng;
		use rand::SeedableRng;

		// a line 0 - 1 - 2 - 3: greedy ordering from the root is always 1, 2, 3
		let graph = crate::graph::NetworkGraph::from_edges( 4,
			&[(0, 1, 1), (1, 2, 1), (2, 3, 1)], 1 );
		let config = Config {
			client_ordering : ClientOrdering::ClosestTree,
			improve_maxtime : 0,
			..Config::default()
		};
		let events = vec![Event::Add( n( 3 ) ), Event::Add( n( 1 ) ), Event::Add( n( 2 ) )];

		let mut rng = StdRng::seed_from_u64( 0 );
		let ordered = order_clients( &events, &config, &graph, n( 0 ), &mut rng );
		assert_eq!( ordered,
			vec![Event::Add( n( 1 ) ), Event::Add( n( 2 ) ), Event::Add( n( 3 ) )] );
	}

	#[test]
	fn test_add_improve_steps() {
		let events = vec![Event::Add( n( 1 ) ), Event::Tick( 1 ), Event::Add( n( 2 ) ),
			Event::Tick( 2 )];
		let with_steps = add_improve_steps( &events, 2, 25 );
		assert_eq!( with_steps, vec![
			Event::Add( n( 1 ) ), Event::Tick( 1 ), Event::Improve( 25 ),
			Event::Add( n( 2 ) ), Event::Tick( 2 ), Event::Improve( 25 )] );

		assert_eq!( add_improve_steps( &events, 0, 25 ), events );
		assert_eq!( add_improve_steps( &events, 2, 0 ), events );
	}
}
