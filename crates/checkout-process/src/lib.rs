//! Process engine for the marketplace checkout system.
//!
//! This module interprets named process definitions (graphs of states
//! connected by named transitions) to answer "what state is this
//! transaction in?" and "has it ever passed through state X?" across the
//! concurrently supported process variants. It owns the immutable process
//! registry, the pure state-derivation functions, and party role
//! resolution.

use checkout_types::{GraphError, ProcessGraph, ProcessSpec};
use std::collections::HashMap;
use thiserror::Error;

/// Pure role resolution for transaction parties.
pub mod actor;
/// Built-in process definitions shipped with the marketplace.
pub mod definitions;
/// Pure state-derivation functions over a graph and a transaction history.
pub mod state;

pub use actor::role_of;
pub use state::{
	current_state, has_passed_state, is_privileged, transitions_for_actor, transitions_leading_to,
};

/// Errors that can occur while resolving processes, states, or roles.
#[derive(Debug, Error)]
pub enum ProcessError {
	/// The requested process name is not registered. This indicates a
	/// build or configuration mismatch and is fatal, never retried.
	#[error("Unknown process '{0}'")]
	UnknownProcess(String),
	/// The caller's identity matches neither party of the transaction.
	/// This is an auth or data-integrity error and must propagate rather
	/// than default to a role.
	#[error("Cannot resolve role: {0}")]
	RoleResolution(String),
	/// A process definition failed to compile.
	#[error(transparent)]
	Graph(#[from] GraphError),
}

/// Immutable registry mapping process names to their compiled graphs.
///
/// Built once at startup and injected into every consumer; there is no
/// global mutable process list.
pub struct ProcessRegistry {
	processes: HashMap<String, ProcessGraph>,
}

impl ProcessRegistry {
	/// Compiles the given specs into a registry. Fails on the first spec
	/// whose graph shape is invalid; nothing is registered partially.
	pub fn new(specs: Vec<ProcessSpec>) -> Result<Self, ProcessError> {
		let mut processes = HashMap::with_capacity(specs.len());
		for spec in specs {
			let graph = ProcessGraph::compile(spec)?;
			processes.insert(graph.name().to_string(), graph);
		}
		Ok(Self { processes })
	}

	/// Builds the registry of built-in marketplace processes.
	pub fn defaults() -> Result<Self, ProcessError> {
		Self::new(definitions::built_in_specs())
	}

	/// Looks up a process by name.
	pub fn get(&self, name: &str) -> Result<&ProcessGraph, ProcessError> {
		self.processes
			.get(name)
			.ok_or_else(|| ProcessError::UnknownProcess(name.to_string()))
	}

	/// Names of all registered processes.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.processes.keys().map(String::as_str)
	}

	/// Number of registered processes.
	pub fn len(&self) -> usize {
		self.processes.len()
	}

	/// Whether the registry is empty.
	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}
}
