//! Time-bounded simulated-annealing improvement of a tree.

use std::time::Instant;

use log::debug;
use rand::Rng;

use crate::config::{TemperatureSchedule, CONSTANT_TEMPERATURE};
use crate::stats::Statistics;
use crate::tree::MulticastTree;


/// Runs improvement rounds on `tree` until `max_time_ms` of wall-clock time have
/// elapsed, and returns the best tree seen.
///
/// The tabu list is emptied on entry and aged after every round. A round in progress
/// always runs to completion before the clock is checked again, so the budget may be
/// slightly overrun. The returned snapshot never costs more than the input tree; the
/// working tree itself may end up worse through accepted degrading moves.
pub fn improve_tree( mut tree : MulticastTree, max_time_ms : u64, rng : &mut impl Rng,
		stats : &mut Statistics ) -> MulticastTree
{
	let start = Instant::now();
	let mut best = tree.clone();
	let mut best_cost = tree.weight();
	let mut attempts = 0u64;

	tree.clear_tabu();
	let mut temperature = CONSTANT_TEMPERATURE;

	loop {
		let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
		if elapsed_ms >= max_time_ms as f64 {
			break;
		}
		attempts += 1;

		if tree.config().temperature_schedule == TemperatureSchedule::Linear {
			temperature = ( max_time_ms as f64 - elapsed_ms ) / 10.0;
		}
		tree.improve_once( temperature, rng );
		tree.decay_tabu();

		if tree.weight() < best_cost {
			best = tree.clone();
			best_cost = tree.weight();
		}
	}

	debug!( "improvement phase over: {attempts} attempts, best cost {best_cost}" );
	stats.record_improve_attempts( attempts );
	best
}
