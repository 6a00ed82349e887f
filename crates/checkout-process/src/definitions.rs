//! Built-in process definitions shipped with the marketplace.
//!
//! Four variants are supported concurrently: booking (time-based listings
//! with provider acceptance), purchase (stocked product sales), free
//! inquiry, and negotiation (provider makes an offer the customer pays
//! for). The payment-touching transitions are privileged in every paid
//! variant and therefore only reachable through the checkout engine's
//! server-mediated path.

use checkout_types::{ProcessSpec, StateNode, TransitionActor, TransitionMeta};
use std::collections::{HashMap, HashSet};

pub const PROCESS_BOOKING: &str = "default-booking";
pub const PROCESS_PURCHASE: &str = "default-purchase";
pub const PROCESS_INQUIRY: &str = "default-inquiry";
pub const PROCESS_NEGOTIATION: &str = "default-negotiation";

pub const STATE_INITIAL: &str = "initial";
pub const STATE_INQUIRY: &str = "inquiry";
pub const STATE_PENDING_PAYMENT: &str = "pending-payment";
pub const STATE_PAYMENT_EXPIRED: &str = "payment-expired";
pub const STATE_PREAUTHORIZED: &str = "preauthorized";
pub const STATE_DECLINED: &str = "declined";
pub const STATE_EXPIRED: &str = "expired";
pub const STATE_ACCEPTED: &str = "accepted";
pub const STATE_CANCELED: &str = "canceled";
pub const STATE_DELIVERED: &str = "delivered";
pub const STATE_REVIEWED_BY_CUSTOMER: &str = "reviewed-by-customer";
pub const STATE_REVIEWED_BY_PROVIDER: &str = "reviewed-by-provider";
pub const STATE_REVIEWED: &str = "reviewed";
pub const STATE_PURCHASED: &str = "purchased";
pub const STATE_COMPLETED: &str = "completed";
pub const STATE_FREE_INQUIRY: &str = "free-inquiry";
pub const STATE_OFFERED: &str = "offered";
pub const STATE_OFFER_DECLINED: &str = "offer-declined";
pub const STATE_OFFER_EXPIRED: &str = "offer-expired";
pub const STATE_PAID: &str = "paid";

pub const TRANSITION_INQUIRE: &str = "inquire";
pub const TRANSITION_REQUEST_PAYMENT: &str = "request-payment";
pub const TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY: &str = "request-payment-after-inquiry";
pub const TRANSITION_EXPIRE_PAYMENT: &str = "expire-payment";
pub const TRANSITION_CONFIRM_PAYMENT: &str = "confirm-payment";
pub const TRANSITION_ACCEPT: &str = "accept";
pub const TRANSITION_DECLINE: &str = "decline";
pub const TRANSITION_EXPIRE: &str = "expire";
pub const TRANSITION_CANCEL: &str = "cancel";
pub const TRANSITION_COMPLETE: &str = "complete";
pub const TRANSITION_REVIEW_1_BY_CUSTOMER: &str = "review-1-by-customer";
pub const TRANSITION_REVIEW_1_BY_PROVIDER: &str = "review-1-by-provider";
pub const TRANSITION_REVIEW_2_BY_CUSTOMER: &str = "review-2-by-customer";
pub const TRANSITION_REVIEW_2_BY_PROVIDER: &str = "review-2-by-provider";
pub const TRANSITION_EXPIRE_REVIEW_PERIOD: &str = "expire-review-period";
pub const TRANSITION_MARK_DELIVERED: &str = "mark-delivered";
pub const TRANSITION_MARK_RECEIVED: &str = "mark-received";
pub const TRANSITION_AUTO_COMPLETE: &str = "auto-complete";
pub const TRANSITION_REVIEW_BY_CUSTOMER: &str = "review-by-customer";
pub const TRANSITION_INQUIRE_WITHOUT_PAYMENT: &str = "inquire-without-payment";
pub const TRANSITION_MAKE_OFFER: &str = "make-offer";
pub const TRANSITION_DECLINE_OFFER: &str = "decline-offer";
pub const TRANSITION_EXPIRE_OFFER: &str = "expire-offer";

/// All process specs compiled into the default registry.
pub fn built_in_specs() -> Vec<ProcessSpec> {
	vec![
		booking_spec(),
		purchase_spec(),
		inquiry_spec(),
		negotiation_spec(),
	]
}

fn states<const N: usize>(entries: [(&str, StateNode); N]) -> HashMap<String, StateNode> {
	entries
		.into_iter()
		.map(|(name, node)| (name.to_string(), node))
		.collect()
}

fn transitions<const N: usize>(entries: [(&str, TransitionMeta); N]) -> HashMap<String, TransitionMeta> {
	entries
		.into_iter()
		.map(|(name, meta)| (name.to_string(), meta))
		.collect()
}

fn attention<const N: usize>(entries: [&str; N]) -> HashSet<String> {
	entries.into_iter().map(str::to_string).collect()
}

/// Time-based bookings: the provider must accept a preauthorized request
/// before the booking is confirmed, and both sides review after delivery.
/// The second reviews and the review-period expiry all fan into the shared
/// `reviewed` state.
fn booking_spec() -> ProcessSpec {
	use TransitionActor::{Customer, Operator, Provider, System};

	ProcessSpec {
		name: PROCESS_BOOKING.to_string(),
		initial_state: STATE_INITIAL.to_string(),
		states: states([
			(
				STATE_INITIAL,
				StateNode::with_edges([
					(TRANSITION_INQUIRE, STATE_INQUIRY),
					(TRANSITION_REQUEST_PAYMENT, STATE_PENDING_PAYMENT),
				]),
			),
			(
				STATE_INQUIRY,
				StateNode::with_edges([(
					TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
					STATE_PENDING_PAYMENT,
				)]),
			),
			(
				STATE_PENDING_PAYMENT,
				StateNode::with_edges([
					(TRANSITION_EXPIRE_PAYMENT, STATE_PAYMENT_EXPIRED),
					(TRANSITION_CONFIRM_PAYMENT, STATE_PREAUTHORIZED),
				]),
			),
			(STATE_PAYMENT_EXPIRED, StateNode::default()),
			(
				STATE_PREAUTHORIZED,
				StateNode::with_edges([
					(TRANSITION_ACCEPT, STATE_ACCEPTED),
					(TRANSITION_DECLINE, STATE_DECLINED),
					(TRANSITION_EXPIRE, STATE_EXPIRED),
				]),
			),
			(STATE_DECLINED, StateNode::default()),
			(STATE_EXPIRED, StateNode::default()),
			(
				STATE_ACCEPTED,
				StateNode::with_edges([
					(TRANSITION_CANCEL, STATE_CANCELED),
					(TRANSITION_COMPLETE, STATE_DELIVERED),
				]),
			),
			(STATE_CANCELED, StateNode::default()),
			(
				STATE_DELIVERED,
				StateNode::with_edges([
					(TRANSITION_REVIEW_1_BY_CUSTOMER, STATE_REVIEWED_BY_CUSTOMER),
					(TRANSITION_REVIEW_1_BY_PROVIDER, STATE_REVIEWED_BY_PROVIDER),
					(TRANSITION_EXPIRE_REVIEW_PERIOD, STATE_REVIEWED),
				]),
			),
			(
				STATE_REVIEWED_BY_CUSTOMER,
				StateNode::with_edges([
					(TRANSITION_REVIEW_2_BY_PROVIDER, STATE_REVIEWED),
					(TRANSITION_EXPIRE_REVIEW_PERIOD, STATE_REVIEWED),
				]),
			),
			(
				STATE_REVIEWED_BY_PROVIDER,
				StateNode::with_edges([
					(TRANSITION_REVIEW_2_BY_CUSTOMER, STATE_REVIEWED),
					(TRANSITION_EXPIRE_REVIEW_PERIOD, STATE_REVIEWED),
				]),
			),
			(STATE_REVIEWED, StateNode::default()),
		]),
		transitions: transitions([
			(TRANSITION_INQUIRE, TransitionMeta::by(Customer)),
			(TRANSITION_REQUEST_PAYMENT, TransitionMeta::privileged(Customer)),
			(
				TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
				TransitionMeta::privileged(Customer),
			),
			(TRANSITION_EXPIRE_PAYMENT, TransitionMeta::by(System)),
			(TRANSITION_CONFIRM_PAYMENT, TransitionMeta::privileged(Customer)),
			(TRANSITION_ACCEPT, TransitionMeta::by(Provider)),
			(TRANSITION_DECLINE, TransitionMeta::by(Provider)),
			(TRANSITION_EXPIRE, TransitionMeta::by(System)),
			(TRANSITION_CANCEL, TransitionMeta::by(Operator)),
			(TRANSITION_COMPLETE, TransitionMeta::by(System)),
			(TRANSITION_REVIEW_1_BY_CUSTOMER, TransitionMeta::by(Customer)),
			(TRANSITION_REVIEW_1_BY_PROVIDER, TransitionMeta::by(Provider)),
			(TRANSITION_REVIEW_2_BY_CUSTOMER, TransitionMeta::by(Customer)),
			(TRANSITION_REVIEW_2_BY_PROVIDER, TransitionMeta::by(Provider)),
			(TRANSITION_EXPIRE_REVIEW_PERIOD, TransitionMeta::by(System)),
		]),
		attention_states: attention([STATE_PREAUTHORIZED]),
	}
}

/// Stocked product sales: payment is captured up front, then the provider
/// ships and the customer (or the system, after a grace period) completes.
fn purchase_spec() -> ProcessSpec {
	use TransitionActor::{Customer, Operator, Provider, System};

	ProcessSpec {
		name: PROCESS_PURCHASE.to_string(),
		initial_state: STATE_INITIAL.to_string(),
		states: states([
			(
				STATE_INITIAL,
				StateNode::with_edges([
					(TRANSITION_INQUIRE, STATE_INQUIRY),
					(TRANSITION_REQUEST_PAYMENT, STATE_PENDING_PAYMENT),
				]),
			),
			(
				STATE_INQUIRY,
				StateNode::with_edges([(
					TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
					STATE_PENDING_PAYMENT,
				)]),
			),
			(
				STATE_PENDING_PAYMENT,
				StateNode::with_edges([
					(TRANSITION_EXPIRE_PAYMENT, STATE_PAYMENT_EXPIRED),
					(TRANSITION_CONFIRM_PAYMENT, STATE_PURCHASED),
				]),
			),
			(STATE_PAYMENT_EXPIRED, StateNode::default()),
			(
				STATE_PURCHASED,
				StateNode::with_edges([
					(TRANSITION_MARK_DELIVERED, STATE_DELIVERED),
					(TRANSITION_CANCEL, STATE_CANCELED),
				]),
			),
			(STATE_CANCELED, StateNode::default()),
			(
				STATE_DELIVERED,
				StateNode::with_edges([
					(TRANSITION_MARK_RECEIVED, STATE_COMPLETED),
					(TRANSITION_AUTO_COMPLETE, STATE_COMPLETED),
				]),
			),
			(
				STATE_COMPLETED,
				StateNode::with_edges([(TRANSITION_REVIEW_BY_CUSTOMER, STATE_REVIEWED)]),
			),
			(STATE_REVIEWED, StateNode::default()),
		]),
		transitions: transitions([
			(TRANSITION_INQUIRE, TransitionMeta::by(Customer)),
			(TRANSITION_REQUEST_PAYMENT, TransitionMeta::privileged(Customer)),
			(
				TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
				TransitionMeta::privileged(Customer),
			),
			(TRANSITION_EXPIRE_PAYMENT, TransitionMeta::by(System)),
			(TRANSITION_CONFIRM_PAYMENT, TransitionMeta::privileged(Customer)),
			(TRANSITION_MARK_DELIVERED, TransitionMeta::by(Provider)),
			(TRANSITION_CANCEL, TransitionMeta::by(Operator)),
			(TRANSITION_MARK_RECEIVED, TransitionMeta::by(Customer)),
			(TRANSITION_AUTO_COMPLETE, TransitionMeta::by(System)),
			(TRANSITION_REVIEW_BY_CUSTOMER, TransitionMeta::by(Customer)),
		]),
		attention_states: attention([STATE_PURCHASED]),
	}
}

/// Free inquiry: a single conversation-opening transition, no payment.
fn inquiry_spec() -> ProcessSpec {
	use TransitionActor::Customer;

	ProcessSpec {
		name: PROCESS_INQUIRY.to_string(),
		initial_state: STATE_INITIAL.to_string(),
		states: states([
			(
				STATE_INITIAL,
				StateNode::with_edges([(TRANSITION_INQUIRE_WITHOUT_PAYMENT, STATE_FREE_INQUIRY)]),
			),
			(STATE_FREE_INQUIRY, StateNode::default()),
		]),
		transitions: transitions([(
			TRANSITION_INQUIRE_WITHOUT_PAYMENT,
			TransitionMeta::by(Customer),
		)]),
		attention_states: attention([STATE_FREE_INQUIRY]),
	}
}

/// Negotiation: the customer inquires, the provider answers with an offer,
/// and accepting the offer means paying for it.
fn negotiation_spec() -> ProcessSpec {
	use TransitionActor::{Customer, Provider, System};

	ProcessSpec {
		name: PROCESS_NEGOTIATION.to_string(),
		initial_state: STATE_INITIAL.to_string(),
		states: states([
			(
				STATE_INITIAL,
				StateNode::with_edges([(TRANSITION_INQUIRE, STATE_INQUIRY)]),
			),
			(
				STATE_INQUIRY,
				StateNode::with_edges([(TRANSITION_MAKE_OFFER, STATE_OFFERED)]),
			),
			(
				STATE_OFFERED,
				StateNode::with_edges([
					(TRANSITION_DECLINE_OFFER, STATE_OFFER_DECLINED),
					(TRANSITION_EXPIRE_OFFER, STATE_OFFER_EXPIRED),
					(TRANSITION_REQUEST_PAYMENT, STATE_PENDING_PAYMENT),
				]),
			),
			(STATE_OFFER_DECLINED, StateNode::default()),
			(STATE_OFFER_EXPIRED, StateNode::default()),
			(
				STATE_PENDING_PAYMENT,
				StateNode::with_edges([
					(TRANSITION_EXPIRE_PAYMENT, STATE_PAYMENT_EXPIRED),
					(TRANSITION_CONFIRM_PAYMENT, STATE_PAID),
				]),
			),
			(STATE_PAYMENT_EXPIRED, StateNode::default()),
			(
				STATE_PAID,
				StateNode::with_edges([(TRANSITION_COMPLETE, STATE_COMPLETED)]),
			),
			(STATE_COMPLETED, StateNode::default()),
		]),
		transitions: transitions([
			(TRANSITION_INQUIRE, TransitionMeta::by(Customer)),
			(TRANSITION_MAKE_OFFER, TransitionMeta::by(Provider)),
			(TRANSITION_DECLINE_OFFER, TransitionMeta::by(Customer)),
			(TRANSITION_EXPIRE_OFFER, TransitionMeta::by(System)),
			(TRANSITION_REQUEST_PAYMENT, TransitionMeta::privileged(Customer)),
			(TRANSITION_EXPIRE_PAYMENT, TransitionMeta::by(System)),
			(TRANSITION_CONFIRM_PAYMENT, TransitionMeta::privileged(Customer)),
			(TRANSITION_COMPLETE, TransitionMeta::by(System)),
		]),
		attention_states: attention([STATE_INQUIRY, STATE_OFFERED]),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use checkout_types::ProcessGraph;

	#[test]
	fn every_built_in_spec_compiles() {
		for spec in built_in_specs() {
			let name = spec.name.clone();
			ProcessGraph::compile(spec).unwrap_or_else(|e| panic!("{}: {}", name, e));
		}
	}

	#[test]
	fn payment_transitions_are_privileged_in_paid_processes() {
		for spec in [booking_spec(), purchase_spec(), negotiation_spec()] {
			let graph = ProcessGraph::compile(spec).unwrap();
			for transition in [TRANSITION_REQUEST_PAYMENT, TRANSITION_CONFIRM_PAYMENT] {
				let meta = graph.transition_meta(transition).unwrap();
				assert!(meta.privileged, "{}/{}", graph.name(), transition);
			}
		}
	}

	#[test]
	fn attention_states_flag_the_waiting_counterparty() {
		let booking = ProcessGraph::compile(booking_spec()).unwrap();
		assert!(booking.requires_attention(STATE_PREAUTHORIZED));
		assert!(!booking.requires_attention(STATE_REVIEWED));

		let purchase = ProcessGraph::compile(purchase_spec()).unwrap();
		assert!(purchase.requires_attention(STATE_PURCHASED));
	}

	#[test]
	fn review_expiry_fans_into_reviewed_from_three_states() {
		let graph = ProcessGraph::compile(booking_spec()).unwrap();
		let sources = graph
			.states()
			.iter()
			.filter(|(_, node)| node.on.contains_key(TRANSITION_EXPIRE_REVIEW_PERIOD))
			.count();
		assert_eq!(sources, 3);
		assert_eq!(
			graph.destination_of(TRANSITION_EXPIRE_REVIEW_PERIOD),
			Some(STATE_REVIEWED)
		);
	}
}
