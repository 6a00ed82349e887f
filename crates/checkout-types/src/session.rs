//! Checkout session types persisted across reloads.
//!
//! A session is the durable record of one in-progress checkout. It is
//! written after every successful remote step, before the next one starts,
//! so that a crash or reload between steps always leaves the flow
//! resumable at the last completed step. Sessions are scoped per session
//! key; there is no shared state between concurrent checkouts.

use crate::{OrderParams, Transaction};
use serde::{Deserialize, Serialize};

/// Captured result of the interactive payment authorization step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
	/// Processor reference to the payment method used.
	pub payment_method_ref: String,
	/// Processor reference to the authorization itself.
	pub authorization_ref: String,
	/// True once any user-interactive challenge (e.g. a 3-D Secure step)
	/// has completed; a resumed checkout must not repeat it.
	pub action_completed: bool,
}

/// Durable record of one in-progress checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
	/// Caller-supplied key identifying this checkout, stable across
	/// reloads.
	pub session_key: String,
	/// Listing the checkout is for.
	pub listing_id: String,
	/// Order intent the checkout was started with.
	pub order_params: OrderParams,
	/// Transaction projection as last observed from the ledger.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction: Option<Transaction>,
	/// Captured authorization result, once the interactive step completed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub authorization: Option<PaymentAuthorization>,
}

impl CheckoutSession {
	/// Creates a fresh session for the given order intent.
	pub fn new(session_key: impl Into<String>, order_params: OrderParams) -> Self {
		Self {
			session_key: session_key.into(),
			listing_id: order_params.listing_id.clone(),
			order_params,
			transaction: None,
			authorization: None,
		}
	}
}

/// Marker persisted when the initial message could not be delivered after
/// a completed payment. The order stands; only the message needs a manual
/// retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRetry {
	/// Transaction the message belongs to.
	pub transaction_id: String,
	/// The undelivered message content.
	pub content: String,
	/// Why delivery failed.
	pub reason: String,
}
