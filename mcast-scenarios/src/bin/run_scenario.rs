use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mcast::config::{ClientOrdering, Config, SearchStrategy, SelectionHeuristic,
	TemperatureSchedule, WeightPolicy};
use mcast::graph::NetworkGraph;
use mcast::scenario::{read_events, run_scenario, Event};
use mcast::stats::Statistics;
use mcast::NodeId;

use mcast_scenarios::setup_util::{init_logger, read_setups, report_run, PrintType};


#[derive(Parser)]
#[command(name = "Multicast Tree Scenarios")]
struct CLI {
	/// Topology file
	topology : PathBuf,

	/// Event stream file
	#[arg(short, long)]
	events : PathBuf,

	/// Root node of the multicast tree
	#[arg(short, long, default_value_t = 0)]
	root : usize,

	/// Edge weight derivation policy (WEIGHT, GEO or NONE)
	#[arg(long, default_value = "NONE")]
	weight_policy : WeightPolicy,

	/// Cache file for the shortest-path structures
	#[arg(short = 'o', long)]
	paths_cache : Option<PathBuf>,

	/// Setups file; each of its sections is run instead of the parameter flags below
	#[arg(short = 'c', long)]
	setups : Option<PathBuf>,

	/// Seed for the random generator (test i of a setup runs with seed + i)
	#[arg(long, default_value_t = 0)]
	seed : u64,

	/// Working directory
	#[arg(short = 'w', long)]
	working_directory : Option<PathBuf>,

	/// Verbosity (-v info, -vv debug)
	#[arg(short, action = clap::ArgAction::Count)]
	verbose : u8,

	/// Print the results in human-readable form
	#[arg(long, default_value_t = false)]
	print : bool,

	/// Output the results as json
	#[arg(long, default_value_t = false)]
	json : bool,

	/// Edge/path selection strategy
	#[arg(long, default_value = "MOST_EXPENSIVE")]
	selection_heuristic : SelectionHeuristic,

	/// Pre-shuffle of join events
	#[arg(long, default_value = "ORDERED")]
	client_ordering : ClientOrdering,

	/// Initial time-to-live of tabu entries
	#[arg(long, default_value_t = 50)]
	tabu_ttl : u32,

	/// Forbid degrading reconnections
	#[arg(long, default_value_t = false)]
	intensify_only : bool,

	/// Join through root shortest paths and skip improvement
	#[arg(long, default_value_t = false)]
	pim_mode : bool,

	/// First- versus best-improvement search
	#[arg(long, default_value = "BEST_IMPROVEMENT")]
	search_strategy : SearchStrategy,

	/// Ticks between improvement phases injected by the runner
	#[arg(long, default_value_t = 1)]
	improve_period : usize,

	/// Duration of each improvement phase, in milliseconds
	#[arg(long, default_value_t = 25)]
	improve_maxtime : u64,

	/// Cap on the source-side sample during reconnection (unbounded if omitted)
	#[arg(long)]
	improve_search_space : Option<usize>,

	/// Temperature law (LINEAR or CONSTANT)
	#[arg(long, default_value = "LINEAR")]
	temperature_schedule : TemperatureSchedule,

	/// Breadth of the shortest-path oracle
	#[arg(long, default_value_t = 1)]
	k_shortest_paths : usize,

	/// Candidate paths collected by path-level selection
	#[arg(long, default_value_t = 1)]
	max_paths : usize
}

impl CLI {
	/// The configuration described by the individual parameter flags.
	fn flag_config( &self ) -> Config {
		Config {
			selection_heuristic : self.selection_heuristic,
			client_ordering : self.client_ordering,
			tabu_ttl : self.tabu_ttl,
			intensify_only : self.intensify_only,
			pim_mode : self.pim_mode,
			search_strategy : self.search_strategy,
			improve_period : self.improve_period,
			improve_maxtime : self.improve_maxtime,
			improve_search_space : self.improve_search_space.unwrap_or( usize::MAX ),
			temperature_schedule : self.temperature_schedule,
			k_shortest_paths : self.k_shortest_paths,
			max_paths : self.max_paths
		}
	}
}


fn load_graph( cli : &CLI, k : usize ) -> Result<Arc<NetworkGraph>, String> {
	let graph = NetworkGraph::from_file( &cli.topology, cli.weight_policy, k,
			cli.paths_cache.as_deref() )
		.map_err( |e| format!( "could not load topology '{}': {e}", cli.topology.display() ) )?;
	if cli.root >= graph.num_nodes() {
		return Err( format!( "root {} is not a node of the topology", cli.root ) );
	}
	Ok( Arc::new( graph ) )
}

fn run_tests( print : PrintType, name : &str, setup_idx : usize, tests : u32, base_seed : u64,
		graph : &Arc<NetworkGraph>, config : &Arc<Config>, root : NodeId, events : &[Event] )
{
	for test_idx in 0..tests {
		let seed = base_seed + test_idx as u64;
		let mut rng = StdRng::seed_from_u64( seed );
		let mut stats = Statistics::new();
		let tree = run_scenario( graph, config, root, events, &mut rng, &mut stats );
		report_run( print, name, setup_idx, test_idx, seed, &tree, &stats );
	}
}

fn run( cli : &CLI ) -> Result<(), String> {
	let print = PrintType::from_args( cli.print, cli.json );
	let root = NodeId::new( cli.root );

	let events = read_events( &cli.events )
		.map_err( |e| format!( "could not read events '{}': {e}", cli.events.display() ) )?;

	if let Some( setups_path ) = &cli.setups {
		let setups = read_setups( setups_path )
			.map_err( |e| format!( "could not read setups '{}': {e}", setups_path.display() ) )?;
		if setups.setups.is_empty() {
			return Err( "setups file contains no setup sections".to_string() );
		}
		for (setup_idx, config) in setups.setups.iter().enumerate() {
			let graph = load_graph( cli, config.k_shortest_paths )?;
			let config = Arc::new( config.clone() );
			run_tests( print, &setups.main.name, setup_idx, setups.main.tests, cli.seed,
				&graph, &config, root, &events );
		}
	}
	else {
		let config = Arc::new( cli.flag_config() );
		let graph = load_graph( cli, config.k_shortest_paths )?;
		run_tests( print, "cli", 0, 1, cli.seed, &graph, &config, root, &events );
	}
	Ok( () )
}

fn main() {
	let cli = CLI::parse();
	init_logger( cli.verbose );

	if let Some( dir ) = &cli.working_directory {
		if let Err( e ) = std::env::set_current_dir( dir ) {
			eprintln!( "could not enter working directory '{}': {e}", dir.display() );
			exit( 1 );
		}
	}

	if let Err( message ) = run( &cli ) {
		eprintln!( "{message}" );
		exit( 1 );
	}
}
