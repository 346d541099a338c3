//! Error types for configuration and topology loading.
//!
//! Structural invariants of the tree are not errors; breaking one is a bug and panics.

use std::fmt;
use std::io;
use std::num;


/// A problem with run configuration: unknown parameter names, bad values, missing files.
#[derive(Debug)]
pub enum ConfigError {
	/// A parameter name that is not part of the recognised set.
	UnknownParameter( String ),
	/// A value that cannot be parsed for its parameter.
	InvalidValue( String, String ),
	/// A required key that is absent.
	MissingKey( String ),
	/// An underlying I/O failure (file not found, unreadable).
	Io( io::Error )
}

impl fmt::Display for ConfigError {
	fn fmt( &self, f : &mut fmt::Formatter ) -> fmt::Result {
		match self {
			ConfigError::UnknownParameter( name ) => write!( f, "unrecognised parameter '{name}'" ),
			ConfigError::InvalidValue( name, value )
				=> write!( f, "invalid value '{value}' for parameter '{name}'" ),
			ConfigError::MissingKey( name ) => write!( f, "missing entry '{name}'" ),
			ConfigError::Io( e ) => e.fmt( f )
		}
	}
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
	fn from( e : io::Error ) -> Self {
		ConfigError::Io( e )
	}
}


/// A problem with the network topology or an event referring to it.
#[derive(Debug)]
pub enum TopologyError {
	/// A line of a topology or event file that could not be parsed.
	InvalidLine( String ),
	/// An edge endpoint or event argument outside the node range.
	UnknownNode( usize ),
	/// An edge without a weight under the `WEIGHT` derivation policy.
	MissingWeight( usize, usize ),
	/// A topology file without a `graph <num_nodes>` header.
	MissingGraphLine,
	/// An underlying I/O failure.
	Io( io::Error ),
	/// A malformed integer field.
	Int( num::ParseIntError ),
	/// A malformed floating-point field.
	Float( num::ParseFloatError )
}

impl fmt::Display for TopologyError {
	fn fmt( &self, f : &mut fmt::Formatter ) -> fmt::Result {
		match self {
			TopologyError::InvalidLine( line ) => write!( f, "invalid line: '{line}'" ),
			TopologyError::UnknownNode( v ) => write!( f, "node {v} is not in the topology" ),
			TopologyError::MissingWeight( u, v )
				=> write!( f, "edge ({u}, {v}) has no weight attribute" ),
			TopologyError::MissingGraphLine
				=> write!( f, "topology file has no 'graph <num_nodes>' line" ),
			TopologyError::Io( e ) => e.fmt( f ),
			TopologyError::Int( e ) => e.fmt( f ),
			TopologyError::Float( e ) => e.fmt( f )
		}
	}
}

impl std::error::Error for TopologyError {}

impl From<io::Error> for TopologyError {
	fn from( e : io::Error ) -> Self {
		TopologyError::Io( e )
	}
}

impl From<num::ParseIntError> for TopologyError {
	fn from( e : num::ParseIntError ) -> Self {
		TopologyError::Int( e )
	}
}

impl From<num::ParseFloatError> for TopologyError {
	fn from( e : num::ParseFloatError ) -> Self {
		TopologyError::Float( e )
	}
}
