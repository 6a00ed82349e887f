//! Process graph types for the marketplace transaction engine.
//!
//! A process is a named graph of states connected by named transitions,
//! governing one category of transaction (booking, purchase, inquiry,
//! negotiation). The declarative form (`ProcessSpec`) is compiled once at
//! startup into a `ProcessGraph`, which adds a flattened transition to
//! destination index and rejects graph shapes that would make state
//! derivation ambiguous.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Role the authenticated caller holds on one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
	/// The party paying for the listing.
	Customer,
	/// The party offering the listing.
	Provider,
}

impl fmt::Display for PartyRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PartyRole::Customer => write!(f, "customer"),
			PartyRole::Provider => write!(f, "provider"),
		}
	}
}

/// Party allowed to initiate a transition.
///
/// Unlike [`PartyRole`], this includes the marketplace operator and the
/// system itself (delayed/automatic transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionActor {
	Customer,
	Provider,
	Operator,
	System,
}

impl fmt::Display for TransitionActor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransitionActor::Customer => write!(f, "customer"),
			TransitionActor::Provider => write!(f, "provider"),
			TransitionActor::Operator => write!(f, "operator"),
			TransitionActor::System => write!(f, "system"),
		}
	}
}

/// Metadata attached to one named transition.
#[derive(Debug, Clone)]
pub struct TransitionMeta {
	/// Who initiates the transition.
	pub actor: TransitionActor,
	/// Privileged transitions touch payment and may only be requested
	/// through the server-mediated checkout path, never directly by the UI.
	pub privileged: bool,
}

impl TransitionMeta {
	/// Creates metadata for an unprivileged transition.
	pub fn by(actor: TransitionActor) -> Self {
		Self {
			actor,
			privileged: false,
		}
	}

	/// Creates metadata for a privileged transition.
	pub fn privileged(actor: TransitionActor) -> Self {
		Self {
			actor,
			privileged: true,
		}
	}
}

/// Outgoing edges of one state, keyed by transition name.
#[derive(Debug, Clone, Default)]
pub struct StateNode {
	/// Transition name to destination state name.
	pub on: HashMap<String, String>,
}

impl StateNode {
	/// Builds a node from (transition, destination) pairs.
	pub fn with_edges<I, S>(edges: I) -> Self
	where
		I: IntoIterator<Item = (S, S)>,
		S: Into<String>,
	{
		Self {
			on: edges
				.into_iter()
				.map(|(t, s)| (t.into(), s.into()))
				.collect(),
		}
	}
}

/// Declarative description of one process variant.
///
/// Specs come from the process crate's built-in definitions and are
/// compiled exactly once at startup; nothing mutates a process afterwards.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
	/// Process name, e.g. "default-booking".
	pub name: String,
	/// State a transaction is in before its first transition.
	pub initial_state: String,
	/// All states and their outgoing edges.
	pub states: HashMap<String, StateNode>,
	/// Every transition the process knows, with its metadata. Every edge
	/// referenced inside `states` must appear here.
	pub transitions: HashMap<String, TransitionMeta>,
	/// States where the counterparty is expected to act next.
	pub attention_states: HashSet<String>,
}

/// Errors detected while compiling a [`ProcessSpec`] into a [`ProcessGraph`].
///
/// All of these indicate an authoring mistake in a process definition and
/// are fatal at startup.
#[derive(Debug, Error)]
pub enum GraphError {
	/// The declared initial state is missing from the state set.
	#[error("process '{process}': initial state '{state}' is not declared")]
	UnknownInitialState { process: String, state: String },
	/// A state edge references a transition missing from the transition set.
	#[error("process '{process}': state '{state}' references undeclared transition '{transition}'")]
	UndeclaredTransition {
		process: String,
		state: String,
		transition: String,
	},
	/// An edge points at a state that does not exist.
	#[error("process '{process}': transition '{transition}' targets unknown state '{state}'")]
	UnknownDestination {
		process: String,
		transition: String,
		state: String,
	},
	/// The same transition name reaches two different destination states,
	/// which would make the current-state lookup iteration-order dependent.
	#[error("process '{process}': transition '{transition}' leads to both '{first}' and '{second}'")]
	AmbiguousTransition {
		process: String,
		transition: String,
		first: String,
		second: String,
	},
}

/// Compiled, immutable process graph.
///
/// Compilation flattens the per-state edges into a single transition to
/// destination map so that deriving "what state is this transaction in?"
/// is an O(1) lookup instead of a scan, and so that true name collisions
/// surface at load time instead of silently picking the first match.
#[derive(Debug, Clone)]
pub struct ProcessGraph {
	name: String,
	initial_state: String,
	states: HashMap<String, StateNode>,
	transitions: HashMap<String, TransitionMeta>,
	destination_of: HashMap<String, String>,
	attention_states: HashSet<String>,
}

impl ProcessGraph {
	/// Compiles a spec into a graph, validating its shape.
	///
	/// A transition name appearing as an outgoing edge of more than one
	/// state is legal as long as every occurrence agrees on the
	/// destination (fan-in); disagreement is rejected with
	/// [`GraphError::AmbiguousTransition`].
	pub fn compile(spec: ProcessSpec) -> Result<Self, GraphError> {
		if !spec.states.contains_key(&spec.initial_state) {
			return Err(GraphError::UnknownInitialState {
				process: spec.name,
				state: spec.initial_state,
			});
		}

		let mut destination_of: HashMap<String, String> = HashMap::new();
		for (state_name, node) in &spec.states {
			for (transition, destination) in &node.on {
				if !spec.transitions.contains_key(transition) {
					return Err(GraphError::UndeclaredTransition {
						process: spec.name,
						state: state_name.clone(),
						transition: transition.clone(),
					});
				}
				if !spec.states.contains_key(destination) {
					return Err(GraphError::UnknownDestination {
						process: spec.name,
						transition: transition.clone(),
						state: destination.clone(),
					});
				}
				if let Some(existing) = destination_of.get(transition) {
					if existing != destination {
						return Err(GraphError::AmbiguousTransition {
							process: spec.name,
							transition: transition.clone(),
							first: existing.clone(),
							second: destination.clone(),
						});
					}
				} else {
					destination_of.insert(transition.clone(), destination.clone());
				}
			}
		}

		Ok(Self {
			name: spec.name,
			initial_state: spec.initial_state,
			states: spec.states,
			transitions: spec.transitions,
			destination_of,
			attention_states: spec.attention_states,
		})
	}

	/// Process name, e.g. "default-booking".
	pub fn name(&self) -> &str {
		&self.name
	}

	/// State a transaction is in before its first transition.
	pub fn initial_state(&self) -> &str {
		&self.initial_state
	}

	/// All states and their outgoing edges.
	pub fn states(&self) -> &HashMap<String, StateNode> {
		&self.states
	}

	/// Whether the graph declares the given state.
	pub fn has_state(&self, state: &str) -> bool {
		self.states.contains_key(state)
	}

	/// Metadata for the given transition, if declared.
	pub fn transition_meta(&self, transition: &str) -> Option<&TransitionMeta> {
		self.transitions.get(transition)
	}

	/// Destination state of the given transition, from the flattened index.
	pub fn destination_of(&self, transition: &str) -> Option<&str> {
		self.destination_of.get(transition).map(String::as_str)
	}

	/// Whether the given state awaits the counterparty's attention.
	pub fn requires_attention(&self, state: &str) -> bool {
		self.attention_states.contains(state)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn two_state_spec() -> ProcessSpec {
		let mut states = HashMap::new();
		states.insert(
			"initial".to_string(),
			StateNode::with_edges([("go", "done")]),
		);
		states.insert("done".to_string(), StateNode::default());
		let mut transitions = HashMap::new();
		transitions.insert("go".to_string(), TransitionMeta::by(TransitionActor::Customer));
		ProcessSpec {
			name: "test-process".to_string(),
			initial_state: "initial".to_string(),
			states,
			transitions,
			attention_states: HashSet::new(),
		}
	}

	#[test]
	fn compiles_and_flattens_destinations() {
		let graph = ProcessGraph::compile(two_state_spec()).unwrap();
		assert_eq!(graph.destination_of("go"), Some("done"));
		assert_eq!(graph.destination_of("missing"), None);
		assert!(graph.has_state("done"));
	}

	#[test]
	fn fan_in_to_same_destination_is_legal() {
		let mut spec = two_state_spec();
		spec.states.insert(
			"waiting".to_string(),
			StateNode::with_edges([("go", "done")]),
		);
		// Reachable from "initial" too, so the extra state is well formed.
		spec.states
			.get_mut("initial")
			.unwrap()
			.on
			.insert("wait".to_string(), "waiting".to_string());
		spec.transitions
			.insert("wait".to_string(), TransitionMeta::by(TransitionActor::System));

		let graph = ProcessGraph::compile(spec).unwrap();
		assert_eq!(graph.destination_of("go"), Some("done"));
	}

	#[test]
	fn ambiguous_destination_is_rejected_at_compile_time() {
		let mut spec = two_state_spec();
		spec.states.insert("elsewhere".to_string(), StateNode::default());
		spec.states.insert(
			"branch".to_string(),
			StateNode::with_edges([("go", "elsewhere")]),
		);
		spec.states
			.get_mut("initial")
			.unwrap()
			.on
			.insert("split".to_string(), "branch".to_string());
		spec.transitions
			.insert("split".to_string(), TransitionMeta::by(TransitionActor::Customer));

		let err = ProcessGraph::compile(spec).unwrap_err();
		assert!(matches!(err, GraphError::AmbiguousTransition { .. }));
	}

	#[test]
	fn undeclared_transition_is_rejected() {
		let mut spec = two_state_spec();
		spec.transitions.clear();
		let err = ProcessGraph::compile(spec).unwrap_err();
		assert!(matches!(err, GraphError::UndeclaredTransition { .. }));
	}

	#[test]
	fn unknown_initial_state_is_rejected() {
		let mut spec = two_state_spec();
		spec.initial_state = "nowhere".to_string();
		let err = ProcessGraph::compile(spec).unwrap_err();
		assert!(matches!(err, GraphError::UnknownInitialState { .. }));
	}
}
