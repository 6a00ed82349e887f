//! Transaction projection types owned by the external ledger.
//!
//! The transaction ledger is authoritative and serializes all transitions;
//! this workspace only ever holds a read-mostly projection, refreshed after
//! each successful remote step. The transition history is append-only and
//! is never reordered or truncated on this side.

use crate::TransitionActor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protected-data key under which the ledger stashes payment processor
/// references once a payment has been requested.
pub const PAYMENT_INTENTS_KEY: &str = "stripePaymentIntents";

/// One entry of a transaction's append-only transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
	/// Name of the transition that was taken.
	pub transition: String,
	/// Who initiated it.
	pub by: TransitionActor,
	/// When the ledger recorded it.
	pub at: DateTime<Utc>,
}

/// Read-mostly projection of one ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	/// Ledger-assigned identifier.
	pub id: String,
	/// Name of the process governing this transaction.
	pub process_name: String,
	/// Identity of the paying party.
	pub customer_id: String,
	/// Identity of the listing's owner.
	pub provider_id: String,
	/// Name of the most recent history entry; `None` until the first
	/// transition lands.
	pub last_transition: Option<String>,
	/// Ordered transition history, oldest first.
	pub transitions: Vec<TransitionRecord>,
	/// Opaque key/value bag owned by the ledger; carries payment processor
	/// references among other things.
	#[serde(default)]
	pub protected_data: serde_json::Value,
}

/// Payment processor references extracted from a transaction's protected
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentRef {
	/// Processor-side identifier of the authorization.
	#[serde(rename = "stripePaymentIntentId")]
	pub intent_id: String,
	/// Secret handed to the client to complete interactive authorization.
	#[serde(rename = "stripePaymentIntentClientSecret")]
	pub client_secret: String,
}

impl Transaction {
	/// Extracts the default payment intent reference, if a payment was ever
	/// requested for this transaction.
	pub fn payment_intent(&self) -> Option<PaymentIntentRef> {
		self.protected_data
			.get(PAYMENT_INTENTS_KEY)
			.and_then(|intents| intents.get("default"))
			.and_then(|entry| serde_json::from_value(entry.clone()).ok())
	}

	/// Whether the history and `last_transition` agree. The ledger upholds
	/// this; projections that fail it must not be trusted.
	pub fn history_consistent(&self) -> bool {
		self.last_transition.as_deref() == self.transitions.last().map(|r| r.transition.as_str())
	}

	/// Whether the named transition appears anywhere in the history.
	pub fn has_transition(&self, transition: &str) -> bool {
		self.transitions.iter().any(|r| r.transition == transition)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn transaction_with_protected(protected_data: serde_json::Value) -> Transaction {
		Transaction {
			id: "tx-1".to_string(),
			process_name: "default-booking".to_string(),
			customer_id: "user-a".to_string(),
			provider_id: "user-b".to_string(),
			last_transition: None,
			transitions: Vec::new(),
			protected_data,
		}
	}

	#[test]
	fn extracts_payment_intent_reference() {
		let tx = transaction_with_protected(json!({
			PAYMENT_INTENTS_KEY: {
				"default": {
					"stripePaymentIntentId": "pi_123",
					"stripePaymentIntentClientSecret": "pi_123_secret",
				}
			}
		}));
		let intent = tx.payment_intent().unwrap();
		assert_eq!(intent.intent_id, "pi_123");
		assert_eq!(intent.client_secret, "pi_123_secret");
	}

	#[test]
	fn missing_payment_intent_yields_none() {
		let tx = transaction_with_protected(json!({}));
		assert!(tx.payment_intent().is_none());

		let tx = transaction_with_protected(serde_json::Value::Null);
		assert!(tx.payment_intent().is_none());
	}

	#[test]
	fn history_consistency_tracks_last_transition() {
		let mut tx = transaction_with_protected(serde_json::Value::Null);
		assert!(tx.history_consistent());

		tx.transitions.push(TransitionRecord {
			transition: "request-payment".to_string(),
			by: TransitionActor::Customer,
			at: Utc::now(),
		});
		assert!(!tx.history_consistent());

		tx.last_transition = Some("request-payment".to_string());
		assert!(tx.history_consistent());
	}
}
