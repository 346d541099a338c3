//! End-to-end scenarios on small fixed graphs.

use mcast::config::{Config, SelectionHeuristic};
use mcast::scenario::Event;

use crate::util::{complete_unit_graph, n, run, sorted_edges, square_graph};


/// Configuration without improvement phases, so scenarios stay exact.
fn exact_config() -> Config {
	Config { improve_maxtime : 0, ..Config::default() }
}


#[test]
fn test_single_addition() {
	let graph = complete_unit_graph();
	let events = vec![Event::Add( n( 1 ) ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, exact_config(), &events, 0 );

	assert_eq!( sorted_edges( &tree ), vec![(0, 1)] );
	assert_eq!( tree.weight(), 1 );
	assert_eq!( stats.tick_costs(), &[1] );
}

#[test]
fn test_two_additions_form_a_two_edge_tree() {
	let graph = complete_unit_graph();
	let events = vec![Event::Add( n( 1 ) ), Event::Add( n( 2 ) ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, exact_config(), &events, 0 );

	assert_eq!( tree.edges().len(), 2 );
	assert_eq!( tree.weight(), 2 );
	assert_eq!( stats.tick_costs(), &[2] );
	tree.validate();
}

#[test]
fn test_addition_then_removal_restores_the_empty_tree() {
	let graph = complete_unit_graph();
	let events = vec![Event::Add( n( 1 ) ), Event::Remove( n( 1 ) ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, exact_config(), &events, 0 );

	assert!( tree.edges().is_empty() );
	assert_eq!( tree.weight(), 0 );
	assert_eq!( tree.num_nodes(), 1 );
	assert_eq!( stats.tick_costs(), &[0] );
}

#[test]
fn test_improvement_avoids_the_expensive_diagonal() {
	let graph = square_graph();
	let config = Config {
		selection_heuristic : SelectionHeuristic::MostExpensive,
		tabu_ttl : 2,
		..Config::default()
	};
	let events = vec![Event::Add( n( 2 ) ), Event::Improve( 50 ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, config, &events, 0 );

	// reaching 2 through the diagonal costs 3; around the square costs 2
	assert_eq!( tree.weight(), 2 );
	let edges = sorted_edges( &tree );
	assert!( edges == vec![(0, 1), (1, 2)] || edges == vec![(0, 3), (3, 2)],
		"unexpected edges {edges:?}" );
	assert!( !edges.contains( &(0, 2) ) );
	assert_eq!( stats.tick_costs(), &[2] );
	assert_eq!( stats.improve_attempts().len(), 1 );
}

#[test]
fn test_zero_budget_improvements_do_nothing() {
	let graph = complete_unit_graph();
	let events = vec![Event::Add( n( 1 ) ), Event::Improve( 0 ), Event::Improve( 0 ),
		Event::Tick( 1 )];
	let (tree, stats) = run( &graph, exact_config(), &events, 0 );

	assert!( stats.improve_attempts().is_empty() );
	assert!( stats.improve_impacts().is_empty() );
	assert_eq!( sorted_edges( &tree ), vec![(0, 1)] );
	assert_eq!( tree.improvements(), 0 );
}

#[test]
fn test_pim_mode_trees_are_shortest_path_unions() {
	let graph = square_graph();
	let config = Config { pim_mode : true, ..Config::default() };

	for joins in [vec![1, 2, 3], vec![3, 2, 1], vec![2, 3, 1]] {
		let events : Vec<Event> = joins.iter().map( |c| Event::Add( n( *c ) ) ).collect();
		let (tree, _) = run( &graph, config.clone(), &events, 0 );
		tree.validate();
		tree.validate_pim_tree();
	}
}

#[test]
fn test_pim_mode_skips_improvement() {
	let graph = square_graph();
	let config = Config { pim_mode : true, ..Config::default() };
	let events = vec![Event::Add( n( 2 ) ), Event::Improve( 50 ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, config, &events, 0 );

	assert!( stats.improve_attempts().is_empty() );
	// PIM connects through the root shortest path and never reshapes
	assert_eq!( tree.weight(), 2 );
	tree.validate_pim_tree();
}

#[test]
fn test_unknown_nodes_are_ignored_at_runtime() {
	let graph = complete_unit_graph();
	let events = vec![Event::Add( n( 1 ) ), Event::Add( n( 99 ) ),
		Event::Remove( n( 42 ) ), Event::Tick( 1 )];
	let (tree, stats) = run( &graph, exact_config(), &events, 0 );

	assert_eq!( sorted_edges( &tree ), vec![(0, 1)] );
	assert_eq!( stats.tick_costs(), &[1] );
}
