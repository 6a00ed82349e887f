//! Pure state-derivation functions over a graph and a transaction history.
//!
//! A transaction's state is never stored by this workspace; it is derived
//! from the append-only transition history whenever it is needed. All
//! functions here are pure and operate on whatever graph the caller
//! resolved from the registry, so structurally similar process variants
//! are interpreted generically without hard-coding their shapes.

use checkout_types::{ProcessGraph, Transaction, TransitionActor};
use std::collections::HashSet;

/// Derives the transaction's current state from its last transition.
///
/// Returns `None` when the transaction has no transitions yet, or when
/// the last transition name is unknown to this graph (e.g. a projection
/// from a different process variant). Determinism is guaranteed by the
/// graph's load-time collision check.
pub fn current_state<'g>(graph: &'g ProcessGraph, tx: &Transaction) -> Option<&'g str> {
	let last = tx.last_transition.as_deref()?;
	graph.destination_of(last)
}

/// Collects every transition name whose destination is `target`.
///
/// Several source states can fan into the same destination, so this is a
/// set over all states' outgoing edges, not a single-edge lookup.
pub fn transitions_leading_to<'g>(graph: &'g ProcessGraph, target: &str) -> HashSet<&'g str> {
	graph
		.states()
		.values()
		.flat_map(|node| node.on.iter())
		.filter(|(_, destination)| destination.as_str() == target)
		.map(|(transition, _)| transition.as_str())
		.collect()
}

/// Whether the transaction has ever passed through `target`.
///
/// True iff any transition leading into `target` appears anywhere in the
/// ordered history, not only as the last transition. This answers "has
/// this transaction ever been paid for" even after it has moved further,
/// without a separate state-history log, and is monotonic: appending
/// transitions never turns a true answer false.
pub fn has_passed_state(graph: &ProcessGraph, target: &str, tx: &Transaction) -> bool {
	let leading = transitions_leading_to(graph, target);
	tx.transitions
		.iter()
		.any(|record| leading.contains(record.transition.as_str()))
}

/// Whether the named transition requires the server-mediated path.
pub fn is_privileged(graph: &ProcessGraph, transition: &str) -> bool {
	graph
		.transition_meta(transition)
		.is_some_and(|meta| meta.privileged)
}

/// Legal next transitions for one actor in one state, sorted by name.
///
/// Used to select which affordances to show a party; unknown states yield
/// an empty list.
pub fn transitions_for_actor<'g>(
	graph: &'g ProcessGraph,
	state: &str,
	actor: TransitionActor,
) -> Vec<&'g str> {
	let mut names: Vec<&str> = graph
		.states()
		.get(state)
		.map(|node| {
			node.on
				.keys()
				.filter(|transition| {
					graph
						.transition_meta(transition)
						.is_some_and(|meta| meta.actor == actor)
				})
				.map(String::as_str)
				.collect()
		})
		.unwrap_or_default();
	names.sort_unstable();
	names
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::definitions::{self, *};
	use crate::ProcessRegistry;
	use checkout_types::TransitionRecord;
	use chrono::Utc;

	fn transaction(history: &[&str]) -> Transaction {
		Transaction {
			id: "tx-1".to_string(),
			process_name: PROCESS_BOOKING.to_string(),
			customer_id: "user-a".to_string(),
			provider_id: "user-b".to_string(),
			last_transition: history.last().map(|t| t.to_string()),
			transitions: history
				.iter()
				.map(|t| TransitionRecord {
					transition: t.to_string(),
					by: TransitionActor::Customer,
					at: Utc::now(),
				})
				.collect(),
			protected_data: serde_json::Value::Null,
		}
	}

	fn booking() -> checkout_types::ProcessGraph {
		ProcessRegistry::defaults()
			.unwrap()
			.get(PROCESS_BOOKING)
			.unwrap()
			.clone()
	}

	#[test]
	fn current_state_is_none_without_transitions() {
		assert_eq!(current_state(&booking(), &transaction(&[])), None);
	}

	#[test]
	fn current_state_is_none_for_unknown_transition() {
		let tx = transaction(&["transition-from-some-other-process"]);
		assert_eq!(current_state(&booking(), &tx), None);
	}

	#[test]
	fn current_state_follows_last_transition() {
		let graph = booking();
		let tx = transaction(&[TRANSITION_REQUEST_PAYMENT]);
		assert_eq!(current_state(&graph, &tx), Some(STATE_PENDING_PAYMENT));

		let tx = transaction(&[TRANSITION_REQUEST_PAYMENT, TRANSITION_CONFIRM_PAYMENT]);
		assert_eq!(current_state(&graph, &tx), Some(STATE_PREAUTHORIZED));
	}

	#[test]
	fn transitions_leading_to_collects_fan_in() {
		let graph = booking();
		let leading = transitions_leading_to(&graph, STATE_REVIEWED);
		assert_eq!(
			leading,
			HashSet::from([
				TRANSITION_REVIEW_2_BY_CUSTOMER,
				TRANSITION_REVIEW_2_BY_PROVIDER,
				TRANSITION_EXPIRE_REVIEW_PERIOD,
			])
		);

		let leading = transitions_leading_to(&graph, STATE_PENDING_PAYMENT);
		assert_eq!(
			leading,
			HashSet::from([
				TRANSITION_REQUEST_PAYMENT,
				TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
			])
		);
	}

	#[test]
	fn has_passed_state_looks_at_the_whole_history() {
		let graph = booking();
		let tx = transaction(&[
			TRANSITION_REQUEST_PAYMENT,
			TRANSITION_CONFIRM_PAYMENT,
			TRANSITION_ACCEPT,
			TRANSITION_COMPLETE,
		]);

		// The transaction moved past preauthorized long ago, but it was
		// there once.
		assert!(has_passed_state(&graph, STATE_PREAUTHORIZED, &tx));
		assert!(has_passed_state(&graph, STATE_DELIVERED, &tx));
		assert!(!has_passed_state(&graph, STATE_DECLINED, &tx));
		assert!(!has_passed_state(&graph, STATE_INQUIRY, &tx));
	}

	#[test]
	fn has_passed_state_is_monotonic_under_appended_history() {
		let graph = booking();
		let history = [
			TRANSITION_REQUEST_PAYMENT,
			TRANSITION_CONFIRM_PAYMENT,
			TRANSITION_ACCEPT,
			TRANSITION_COMPLETE,
			TRANSITION_REVIEW_1_BY_CUSTOMER,
			TRANSITION_REVIEW_2_BY_PROVIDER,
		];

		let mut passed_at = None;
		for n in 0..=history.len() {
			let tx = transaction(&history[..n]);
			let passed = has_passed_state(&graph, STATE_PREAUTHORIZED, &tx);
			if passed && passed_at.is_none() {
				passed_at = Some(n);
			}
			if let Some(first) = passed_at {
				assert!(passed, "passed at {} transitions but not at {}", first, n);
			}
		}
		assert_eq!(passed_at, Some(2));
	}

	#[test]
	fn privileged_membership_is_per_transition() {
		let graph = booking();
		assert!(is_privileged(&graph, TRANSITION_REQUEST_PAYMENT));
		assert!(is_privileged(&graph, TRANSITION_CONFIRM_PAYMENT));
		assert!(!is_privileged(&graph, TRANSITION_INQUIRE));
		assert!(!is_privileged(&graph, "no-such-transition"));
	}

	#[test]
	fn actor_affordances_are_filtered_and_sorted() {
		let graph = booking();
		assert_eq!(
			transitions_for_actor(&graph, STATE_PREAUTHORIZED, TransitionActor::Provider),
			vec![TRANSITION_ACCEPT, TRANSITION_DECLINE]
		);
		assert_eq!(
			transitions_for_actor(&graph, STATE_PREAUTHORIZED, TransitionActor::Customer),
			Vec::<&str>::new()
		);
		assert_eq!(
			transitions_for_actor(&graph, "no-such-state", TransitionActor::Customer),
			Vec::<&str>::new()
		);
	}

	#[test]
	fn negotiation_requests_payment_from_the_offered_state() {
		let registry = ProcessRegistry::defaults().unwrap();
		let graph = registry.get(definitions::PROCESS_NEGOTIATION).unwrap();
		let tx = transaction(&[TRANSITION_INQUIRE, TRANSITION_MAKE_OFFER]);
		assert_eq!(current_state(graph, &tx), Some(STATE_OFFERED));
		assert!(transitions_leading_to(graph, STATE_PENDING_PAYMENT)
			.contains(TRANSITION_REQUEST_PAYMENT));
	}
}
