//! Run configuration.
//!
//! A [Config] is an explicit, immutable value describing every tunable of a run. It is
//! built once (from defaults, a setups file section, or CLI flags) and threaded by
//! reference through the tree, the improver and the scenario runner.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::err::ConfigError;


/// Temperature used by the `CONSTANT` schedule.
pub const CONSTANT_TEMPERATURE : f64 = 10.0;


/// How the edge to remove is chosen in each improvement round.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionHeuristic {
	/// Uniformly random non-tabu tree edge.
	Random,
	/// Maximum-weight non-tabu tree edge, ties broken fairly at random.
	MostExpensive,
	/// First edge of the heaviest valid macro-path.
	MostExpensivePath,
	/// Like [SelectionHeuristic::MostExpensivePath], but path heap keys are averaged
	/// over the path length.
	AveragedMostExpensivePath
}

/// How join events are reordered before a scenario runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientOrdering {
	/// As given in the event stream.
	Ordered,
	/// Join arguments shuffled among the join positions.
	Random,
	/// Greedy nearest-to-the-tree-first ordering of the final client set.
	ClosestTree
}

/// Whether the reconnection search stops at the first improving pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStrategy {
	/// Stop scanning source-side nodes as soon as an improving pair is known.
	FirstImprovement,
	/// Scan the whole sampled space and keep the best pair.
	BestImprovement
}

/// Temperature law of the annealing schedule.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureSchedule {
	/// Temperature decreases linearly with the remaining improvement time.
	Linear,
	/// Temperature fixed at [CONSTANT_TEMPERATURE].
	Constant
}

/// How edge weights are derived when loading a topology.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightPolicy {
	/// Take the weight column of the edge line.
	Weight,
	/// Great-circle distance between node coordinates, floored and clamped to >= 1.
	Geo,
	/// Constant 1.
	None
}


macro_rules! impl_from_str {
	( $enum_type : ident, $( $string : literal => $variant : ident ),+ ) => {
		impl FromStr for $enum_type {
			type Err = ConfigError;

			fn from_str( s : &str ) -> Result<Self, ConfigError> {
				match s {
					$( $string => Ok( $enum_type::$variant ), )+
					_ => Err( ConfigError::InvalidValue(
							stringify!( $enum_type ).to_string(), s.to_string() ) )
				}
			}
		}
	}
}

impl_from_str!( SelectionHeuristic,
	"RANDOM" => Random,
	"MOST_EXPENSIVE" => MostExpensive,
	"MOST_EXPENSIVE_PATH" => MostExpensivePath,
	"AVERAGED_MOST_EXPENSIVE_PATH" => AveragedMostExpensivePath );
impl_from_str!( ClientOrdering,
	"ORDERED" => Ordered,
	"RANDOM" => Random,
	"CLOSEST_TREE" => ClosestTree );
impl_from_str!( SearchStrategy,
	"FIRST_IMPROVEMENT" => FirstImprovement,
	"BEST_IMPROVEMENT" => BestImprovement );
impl_from_str!( TemperatureSchedule,
	"LINEAR" => Linear,
	"CONSTANT" => Constant );
impl_from_str!( WeightPolicy,
	"WEIGHT" => Weight,
	"GEO" => Geo,
	"NONE" => None );


/// All tunables of a run.
///
/// Deserializable from a setups-file section; keys not listed here are rejected, missing
/// keys inherit the defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Edge/path selection strategy for improvement rounds.
	pub selection_heuristic : SelectionHeuristic,
	/// Pre-shuffle policy for join events.
	pub client_ordering : ClientOrdering,
	/// Initial time-to-live of tabu entries, in improvement rounds.
	pub tabu_ttl : u32,
	/// Forbid degrading reconnections entirely.
	pub intensify_only : bool,
	/// Join through the root's shortest path and skip improvement (PIM-SSM behaviour).
	pub pim_mode : bool,
	/// First- versus best-improvement reconnection search.
	pub search_strategy : SearchStrategy,
	/// Number of ticks between improvement phases injected by the runner.
	pub improve_period : usize,
	/// Duration of each improvement phase, in milliseconds.
	pub improve_maxtime : u64,
	/// Cap on the source-side sample size during reconnection.
	pub improve_search_space : usize,
	/// Temperature law.
	pub temperature_schedule : TemperatureSchedule,
	/// Breadth of the shortest-path oracle. The tree only consumes the first path.
	pub k_shortest_paths : usize,
	/// Number of candidate paths collected by path-level selection.
	pub max_paths : usize
}

impl Default for Config {
	fn default() -> Self {
		Config {
			selection_heuristic : SelectionHeuristic::MostExpensive,
			client_ordering : ClientOrdering::Ordered,
			tabu_ttl : 50,
			intensify_only : false,
			pim_mode : false,
			search_strategy : SearchStrategy::BestImprovement,
			improve_period : 1,
			improve_maxtime : 25,
			improve_search_space : usize::MAX,
			temperature_schedule : TemperatureSchedule::Linear,
			k_shortest_paths : 1,
			max_paths : 1
		}
	}
}

impl Config {
	/// Whether trees built under this configuration maintain the macro-path index.
	///
	/// The index only pays off when path-level selection is active and improvement
	/// phases actually run.
	pub fn use_path_queue( &self ) -> bool {
		matches!( self.selection_heuristic,
				SelectionHeuristic::MostExpensivePath
					| SelectionHeuristic::AveragedMostExpensivePath )
			&& self.improve_maxtime > 0
	}
}


#[cfg(test)]
mod tests {
	use std::str::FromStr;
	use super::*;

	#[test]
	fn test_defaults() {
		let conf = Config::default();
		assert_eq!( conf.selection_heuristic, SelectionHeuristic::MostExpensive );
		assert_eq!( conf.tabu_ttl, 50 );
		assert_eq!( conf.improve_maxtime, 25 );
		assert_eq!( conf.improve_search_space, usize::MAX );
		assert!( !conf.use_path_queue() );
	}

	#[test]
	fn test_from_str() {
		assert_eq!( SelectionHeuristic::from_str( "AVERAGED_MOST_EXPENSIVE_PATH" ).unwrap(),
			SelectionHeuristic::AveragedMostExpensivePath );
		assert_eq!( WeightPolicy::from_str( "GEO" ).unwrap(), WeightPolicy::Geo );
		assert!( SearchStrategy::from_str( "SOMETHING_ELSE" ).is_err() );
	}

	#[test]
	fn test_path_queue_needs_improvement_time() {
		let mut conf = Config {
			selection_heuristic : SelectionHeuristic::MostExpensivePath,
			..Config::default()
		};
		assert!( conf.use_path_queue() );
		conf.improve_maxtime = 0;
		assert!( !conf.use_path_queue() );
	}
}
