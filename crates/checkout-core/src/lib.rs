//! Checkout orchestration core for the marketplace system.
//!
//! This module drives the ordered, idempotent checkout sequence — request
//! or advance the transaction, authorize payment, confirm payment, send
//! the initial message, optionally save the payment method — against the
//! external ledger and payment processor. Every step re-derives "have I
//! already done this?" from persisted state, so a reload or crash between
//! steps resumes instead of restarting, and the customer is never charged
//! twice.

use std::fmt;
use thiserror::Error;

/// Builder wiring the engine from pluggable implementations.
pub mod builder;
/// The checkout sequencer itself.
pub mod engine;

pub use builder::CheckoutBuilder;
pub use engine::CheckoutEngine;

// The state-derivation API surfaces here alongside the engine for
// UI-layer consumers.
pub use checkout_process::{
	current_state, has_passed_state, is_privileged, role_of, ProcessError, ProcessRegistry,
};

/// Steps of the checkout sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
	/// Transaction requested from (or advanced on) the ledger.
	OrderRequested,
	/// Interactive payment authorization completed.
	PaymentAuthorized,
	/// Payment confirmed against processor and ledger.
	PaymentConfirmed,
	/// Initial message delivered.
	MessageSent,
	/// Payment method persisted on the customer's profile.
	PaymentMethodSaved,
}

impl fmt::Display for CheckoutStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CheckoutStep::OrderRequested => write!(f, "order-requested"),
			CheckoutStep::PaymentAuthorized => write!(f, "payment-authorized"),
			CheckoutStep::PaymentConfirmed => write!(f, "payment-confirmed"),
			CheckoutStep::MessageSent => write!(f, "message-sent"),
			CheckoutStep::PaymentMethodSaved => write!(f, "payment-method-saved"),
		}
	}
}

/// Errors that can abort a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
	/// Unknown process or unresolvable role. Fatal; indicates a
	/// configuration or auth mismatch, never retried.
	#[error(transparent)]
	Process(#[from] ProcessError),
	/// The transaction reached the authorization step without a payment
	/// processor reference. Defensive invariant; unreachable when the
	/// order-request guard holds.
	#[error("Transaction '{0}' carries no payment authorization reference")]
	MissingAuthorization(String),
	/// A checkout step failed. Recoverable by user-initiated re-entry;
	/// `transaction_advanced` tells the caller whether a blind retry is
	/// unsafe because the ledger may already have moved.
	#[error("Checkout step '{step}' failed: {cause}")]
	StepFailed {
		step: CheckoutStep,
		cause: String,
		transaction_advanced: bool,
	},
	/// The session store failed outside a step boundary.
	#[error("Session store error: {0}")]
	Session(String),
	/// The engine was built from an unusable configuration.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Result of a completed checkout.
///
/// Non-critical failures (message delivery, payment method persistence)
/// are absorbed here rather than failing the checkout: the order stands
/// once payment is confirmed.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
	/// Ledger identifier of the resulting transaction.
	pub transaction_id: String,
	/// Whether the payment method was saved on the customer's profile.
	pub payment_method_saved: bool,
	/// Whether the initial message reached the provider (vacuously true
	/// when no message was requested).
	pub message_sent: bool,
}
