//! Setups-file reading, logger setup and result reporting.

use std::fs::File;
use std::path::Path;

use itertools::Itertools;
use serde::Deserialize;

use mcast::config::Config;
use mcast::err::ConfigError;
use mcast::stats::Statistics;
use mcast::tree::MulticastTree;


/// The `main` section of a setups file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MainSection {
	pub name : String,
	pub tests : u32,
	#[serde(rename = "columnRef", default = "default_column_ref")]
	pub column_ref : i64
}

fn default_column_ref() -> i64 {
	-1
}

/// A parsed setups file: the main section plus one [Config] per setup section.
///
/// Missing keys of a setup inherit the defaults; unknown keys are rejected.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupsFile {
	pub main : MainSection,
	#[serde(default)]
	pub setups : Vec<Config>
}

/// Reads a YAML setups file.
pub fn read_setups( path : &Path ) -> Result<SetupsFile, ConfigError> {
	let file = File::open( path )?;
	serde_yaml::from_reader( file )
		.map_err( |e| ConfigError::InvalidValue( "setups file".to_string(), e.to_string() ) )
}


/// Initialises env_logger according to the `-v` count (0 warn, 1 info, 2+ debug).
pub fn init_logger( verbosity : u8 ) {
	let level = match verbosity {
		0 => "warn",
		1 => "info",
		_ => "debug"
	};
	env_logger::Builder::from_env( env_logger::Env::default().default_filter_or( level ) )
		.init();
}


/// How to print run results.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum PrintType {
	Silent,
	Print,
	Json
}

impl PrintType {
	pub fn from_args( print : bool, json : bool ) -> Self {
		if print {
			if json {
				eprintln!( "Cannot both print and print json" )
			}
			Self::Print
		}
		else if json {
			Self::Json
		}
		else {
			Self::Silent
		}
	}
}


fn mean( values : &[f64] ) -> f64 {
	values.iter().sum::<f64>() / values.len() as f64
}

/// Reports the outcome of one scenario run, in the selected format.
pub fn report_run( print : PrintType, name : &str, setup_idx : usize, test_idx : u32,
		seed : u64, tree : &MulticastTree, stats : &Statistics )
{
	match print {
		PrintType::Silent => {}
		PrintType::Print => {
			println!( "{name} (setup {setup_idx}, test {test_idx}, seed {seed})" );
			println!( "    final weight: {:6}   clients: {:3}   nodes: {:3}   rounds: {}",
				tree.weight(), tree.clients().len(), tree.num_nodes(), tree.improvements() );
			println!( "    tick costs: [{}]", stats.tick_costs().iter().join( ", " ) );
			println!( "    improve attempts: [{}]", stats.improve_attempts().iter().join( ", " ) );
			for impact in stats.improve_impacts() {
				println!( "    improvement: weight {} -> {}",
					impact.weight_before, impact.weight_after );
			}
			for (label, times) in [("addition", stats.addition_times()),
					("removal", stats.removal_times())] {
				for (size, values) in times {
					println!( "    {label} at {size:4} nodes: {:8.4} ms over {} events",
						mean( values ), values.len() );
				}
			}
		}
		PrintType::Json => {
			let addition_times : Vec<json::JsonValue> = stats.addition_times().iter()
				.map( |(size, values)| json::object!{
					tree_size : *size,
					mean_ms : mean( values ),
					events : values.len()
				} )
				.collect();
			let removal_times : Vec<json::JsonValue> = stats.removal_times().iter()
				.map( |(size, values)| json::object!{
					tree_size : *size,
					mean_ms : mean( values ),
					events : values.len()
				} )
				.collect();
			let improvements : Vec<json::JsonValue> = stats.improve_impacts().iter()
				.map( |impact| json::object!{
					weight_before : impact.weight_before,
					weight_after : impact.weight_after,
					edges_before : impact.edges_before.len(),
					edges_after : impact.edges_after.len()
				} )
				.collect();
			println!( "{}", json::stringify( json::object!{
				name : name,
				setup : setup_idx,
				test : test_idx,
				seed : seed,
				weight : tree.weight(),
				clients : tree.clients().len(),
				nodes : tree.num_nodes(),
				improve_rounds : tree.improvements(),
				tick_costs : stats.tick_costs().to_vec(),
				improve_attempts : stats.improve_attempts().to_vec(),
				addition_times : addition_times,
				removal_times : removal_times,
				improvements : improvements
			} ) )
		}
	}
}
