//! Per-run statistics, observed through start/end hooks around every event.

use std::time::Instant;

use indexmap::IndexMap;
use log::warn;

use crate::scenario::Event;
use crate::DirectedEdge;


/// Latencies above this many milliseconds are treated as scheduler noise and dropped
/// from the per-size buckets. Heuristic threshold.
const INSANE_EVENT_TIME_MS : f64 = 50.0;


/// Edge and weight snapshots taken around one improvement phase.
#[derive(Clone, Debug)]
pub struct ImproveImpact {
	/// Directed tree edges before the phase.
	pub edges_before : Vec<DirectedEdge>,
	/// Directed tree edges after the phase.
	pub edges_after : Vec<DirectedEdge>,
	/// Tree weight before the phase.
	pub weight_before : u64,
	/// Tree weight after the phase.
	pub weight_after : u64
}


/// Accumulates tick costs, per-size event latencies, improvement attempt counts and
/// improvement impact snapshots over one scenario run.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
	tick_costs : Vec<u64>,
	improve_attempts : Vec<u64>,
	improve_impacts : Vec<ImproveImpact>,
	addition_times : IndexMap<usize, Vec<f64>>,
	removal_times : IndexMap<usize, Vec<f64>>,
	event_start : Option<Instant>,
	nodes_before_event : usize,
	improve_before : Option<(Vec<DirectedEdge>, u64)>
}

impl Statistics {
	/// Creates an empty accumulator.
	pub fn new() -> Statistics {
		Statistics::default()
	}

	/// Marks the beginning of an event on a tree currently holding `nodes_in_tree`
	/// nodes.
	pub fn start_event( &mut self, nodes_in_tree : usize ) {
		self.event_start = Some( Instant::now() );
		self.nodes_before_event = nodes_in_tree;
	}

	/// Marks the end of `event`, with `cost` the tree weight afterwards.
	///
	/// Degenerate events pass `discard_time` so their latency is recorded as zero
	/// instead of polluting the buckets.
	pub fn end_event( &mut self, event : &Event, cost : u64, discard_time : bool ) {
		let mut elapsed_ms = self.event_start.take()
			.map_or( 0.0, |start| start.elapsed().as_secs_f64() * 1000.0 );
		if discard_time {
			elapsed_ms = 0.0;
		}
		match event {
			Event::Tick( _ ) => self.tick_costs.push( cost ),
			Event::Add( _ ) => self.record_latency( true, elapsed_ms ),
			Event::Remove( _ ) => self.record_latency( false, elapsed_ms ),
			Event::Improve( _ ) => {}
		}
	}

	fn record_latency( &mut self, addition : bool, elapsed_ms : f64 ) {
		if elapsed_ms < INSANE_EVENT_TIME_MS {
			let bucket = if addition { &mut self.addition_times } else { &mut self.removal_times };
			bucket.entry( self.nodes_before_event ).or_default().push( elapsed_ms );
		}
		else {
			warn!( "insane processing time discarded: {elapsed_ms} ms" );
		}
	}

	/// Snapshots the tree state entering an improvement phase.
	pub fn start_improve( &mut self, edges : Vec<DirectedEdge>, weight : u64 ) {
		self.improve_before = Some( ( edges, weight ) );
	}

	/// Snapshots the tree state leaving an improvement phase and records the impact.
	pub fn end_improve( &mut self, edges : Vec<DirectedEdge>, weight : u64 ) {
		let (edges_before, weight_before) = self.improve_before.take()
			.expect( "end_improve without start_improve" );
		self.improve_impacts.push( ImproveImpact {
			edges_before,
			edges_after : edges,
			weight_before,
			weight_after : weight
		} );
	}

	/// Records how many rounds one improvement phase attempted.
	pub fn record_improve_attempts( &mut self, attempts : u64 ) {
		self.improve_attempts.push( attempts );
	}

	/// Tree cost at each tick, in event order.
	pub fn tick_costs( &self ) -> &[u64] {
		&self.tick_costs
	}

	/// Attempt counts of the improvement phases, in order.
	pub fn improve_attempts( &self ) -> &[u64] {
		&self.improve_attempts
	}

	/// Before/after snapshots of the improvement phases, in order.
	pub fn improve_impacts( &self ) -> &[ImproveImpact] {
		&self.improve_impacts
	}

	/// Addition latencies (ms), bucketed by the tree size before the event.
	pub fn addition_times( &self ) -> &IndexMap<usize, Vec<f64>> {
		&self.addition_times
	}

	/// Removal latencies (ms), bucketed by the tree size before the event.
	pub fn removal_times( &self ) -> &IndexMap<usize, Vec<f64>> {
		&self.removal_times
	}

	/// Drops everything accumulated so far.
	pub fn reset( &mut self ) {
		*self = Statistics::default();
	}
}
