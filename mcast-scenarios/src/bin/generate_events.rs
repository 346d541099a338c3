use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::LogNormal;

use mcast::scenario::{final_clients, write_events, Event};
use mcast::NodeId;

use mcast_scenarios::setup_util::init_logger;


fn probability( s : &str ) -> Result<f64, String> {
	let value : f64 = s.parse().map_err( |e| format!( "{e}" ) )?;
	if (0.0..=1.0).contains( &value ) {
		Ok( value )
	}
	else {
		Err( "has to be a float value between 0.0 and 1.0".to_string() )
	}
}

fn positive_float( s : &str ) -> Result<f64, String> {
	let value : f64 = s.parse().map_err( |e| format!( "{e}" ) )?;
	if value > 0.0 {
		Ok( value )
	}
	else {
		Err( "has to be a strictly positive float".to_string() )
	}
}


#[derive(Parser)]
#[command(name = "Event Stream Generator")]
struct CLI {
	/// Number of nodes in the topology
	#[arg(short, long)]
	num_nodes : usize,

	/// Root node of the tree (never joins or leaves)
	#[arg(short, long, default_value_t = 0)]
	root : usize,

	/// Output file for the generated stream
	#[arg(short, long)]
	output : PathBuf,

	/// Per-tick probability that a non-client joins
	#[arg(short = 'p', long, value_parser = probability)]
	join_probability : f64,

	/// Mean client lifetime, in ticks
	#[arg(short, long, value_parser = positive_float)]
	mean_time : f64,

	/// Number of ticks to generate
	#[arg(short, long)]
	ticks : u64,

	/// Seed for the random generator
	#[arg(long, default_value_t = 0)]
	seed : u64,

	/// Verbosity (-v info, -vv debug)
	#[arg(short, action = clap::ArgAction::Count)]
	verbose : u8
}


/// Generates the tick-indexed stream: every non-client joins with the configured
/// probability at each tick and leaves after a log-normally distributed lifetime.
fn generate( cli : &CLI ) -> Vec<Event> {
	// log-normal parameters from the requested mean and a variance of (mean/2)^2
	let mean = cli.mean_time;
	let var = ( mean / 2.0 ).powi( 2 );
	let mu = ( mean.powi( 2 ) / ( var + mean.powi( 2 ) ).sqrt() ).ln();
	let sigma = ( 1.0 + var / mean.powi( 2 ) ).ln().sqrt();
	let lifetime_dist = LogNormal::new( mu, sigma ).expect( "invalid lifetime distribution" );

	let mut rng = StdRng::seed_from_u64( cli.seed );
	let mut scheduled : BTreeMap<u64, Vec<Event>> = BTreeMap::new();
	let mut non_clients : Vec<usize> = (0..cli.num_nodes)
		.filter( |v| *v != cli.root )
		.collect();

	for tick in 0..cli.ticks {
		// clients whose scheduled departure is due may rejoin from this tick on
		let due = scheduled.entry( tick ).or_default().clone();
		for event in &due {
			if let Event::Remove( c ) = event {
				non_clients.push( c.index() );
			}
		}

		non_clients.shuffle( &mut rng );
		for candidate in non_clients.clone() {
			if rng.gen_bool( cli.join_probability ) {
				scheduled.get_mut( &tick ).unwrap()
					.push( Event::Add( NodeId::new( candidate ) ) );
				non_clients.retain( |v| *v != candidate );

				let lifetime = rng.sample( lifetime_dist ).round() as u64;
				scheduled.entry( tick + lifetime ).or_default()
					.push( Event::Remove( NodeId::new( candidate ) ) );
			}
		}
	}

	let mut events = vec![];
	for (tick, tick_events) in &scheduled {
		if *tick >= cli.ticks {
			break;
		}
		events.extend( tick_events.iter().copied() );
		events.push( Event::Tick( *tick ) );
	}
	events
}

fn main() {
	let cli = CLI::parse();
	init_logger( cli.verbose );

	if cli.root >= cli.num_nodes {
		eprintln!( "root {} is not a node of the topology", cli.root );
		exit( 1 );
	}
	if cli.ticks == 0 {
		eprintln!( "ticks has to be a strictly positive integer" );
		exit( 1 );
	}

	let events = generate( &cli );

	let changes = events.iter()
		.filter( |e| matches!( e, Event::Add( _ ) | Event::Remove( _ ) ) )
		.count();
	info!( "average events per tick: {}", changes as f64 / cli.ticks as f64 );

	let header = vec![
		"generated event stream".to_string(),
		format!( "num_nodes = {}", cli.num_nodes ),
		format!( "root = {}", cli.root ),
		format!( "join_probability = {}", cli.join_probability ),
		format!( "mean_time = {}", cli.mean_time ),
		format!( "ticks = {}", cli.ticks ),
		format!( "seed = {}", cli.seed ),
		format!( "average events per tick = {}", changes as f64 / cli.ticks as f64 ),
		format!( "final client set size = {}", final_clients( &events ).len() )
	];

	if let Err( e ) = write_events( &cli.output, &header, &events ) {
		eprintln!( "could not write '{}': {e}", cli.output.display() );
		exit( 1 );
	}
	info!( "wrote {} events to {}", events.len(), cli.output.display() );
}
