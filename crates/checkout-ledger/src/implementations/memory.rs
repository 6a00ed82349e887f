//! In-process ledger implementation.
//!
//! A single authoritative ledger held in memory. It serializes transitions
//! behind a write lock, validates every requested transition against the
//! compiled process graph, and keeps the last-transition invariant intact.
//! When a payment-requesting transition executes, it synthesizes the
//! payment-processor references into the transaction's protected data,
//! mirroring the handshake the real ledger performs server-side.
//!
//! Failures can be scripted through configuration, which is what the
//! checkout engine's failure-branch tests run against.

use crate::{LedgerError, LedgerFactory, LedgerInterface, LedgerRegistry, TransitionRequest};
use async_trait::async_trait;
use checkout_process::{current_state, ProcessRegistry};
use checkout_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, Transaction, TransitionRecord,
	ValidationError, PAYMENT_INTENTS_KEY,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Configuration for the in-process ledger.
#[derive(Debug, Clone)]
pub struct MemoryLedgerConfig {
	/// When true, every transition request fails with a network error.
	pub fail_transitions: bool,
	/// When true, every message delivery fails with a network error.
	pub fail_messages: bool,
	/// Transitions that mint payment-processor references into the
	/// transaction's protected data.
	pub payment_intent_transitions: Vec<String>,
}

impl Default for MemoryLedgerConfig {
	fn default() -> Self {
		Self {
			fail_transitions: false,
			fail_messages: false,
			payment_intent_transitions: default_payment_intent_transitions(),
		}
	}
}

fn default_payment_intent_transitions() -> Vec<String> {
	vec![
		"request-payment".to_string(),
		"request-payment-after-inquiry".to_string(),
	]
}

/// Operation counters exposed for assertions on idempotence.
#[derive(Debug, Default)]
pub struct LedgerStats {
	creates: AtomicUsize,
	transitions: AtomicUsize,
	messages: AtomicUsize,
}

impl LedgerStats {
	/// Number of transactions created.
	pub fn creates(&self) -> usize {
		self.creates.load(Ordering::SeqCst)
	}

	/// Number of advance calls on existing transactions.
	pub fn transitions(&self) -> usize {
		self.transitions.load(Ordering::SeqCst)
	}

	/// Number of messages delivered.
	pub fn messages(&self) -> usize {
		self.messages.load(Ordering::SeqCst)
	}
}

/// In-memory authoritative ledger.
pub struct MemoryLedger {
	registry: Arc<ProcessRegistry>,
	config: MemoryLedgerConfig,
	transactions: RwLock<HashMap<String, Transaction>>,
	stats: Arc<LedgerStats>,
}

impl MemoryLedger {
	/// Creates an empty ledger validating against the given registry.
	pub fn new(registry: Arc<ProcessRegistry>, config: MemoryLedgerConfig) -> Self {
		Self {
			registry,
			config,
			transactions: RwLock::new(HashMap::new()),
			stats: Arc::new(LedgerStats::default()),
		}
	}

	/// Handle to the operation counters; keep a clone before boxing the
	/// ledger into a service.
	pub fn stats(&self) -> Arc<LedgerStats> {
		self.stats.clone()
	}
}

#[async_trait]
impl LedgerInterface for MemoryLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}

	async fn create_or_transition(
		&self,
		request: TransitionRequest,
	) -> Result<Transaction, LedgerError> {
		// An alias like "default-booking/release-1" resolves to its process.
		let process_name = request
			.process_alias
			.split('/')
			.next()
			.unwrap_or(request.process_alias.as_str());
		let graph = self
			.registry
			.get(process_name)
			.map_err(|e| LedgerError::TransitionRejected(e.to_string()))?;
		let meta = graph.transition_meta(&request.transition).ok_or_else(|| {
			LedgerError::TransitionRejected(format!(
				"process '{}' has no transition '{}'",
				process_name, request.transition
			))
		})?;
		if meta.privileged && !request.privileged {
			return Err(LedgerError::PrivilegeRequired(request.transition));
		}
		if self.config.fail_transitions {
			return Err(LedgerError::Network("simulated ledger outage".to_string()));
		}

		let mut transactions = self.transactions.write().await;

		let creating = request.transaction_id.is_none();
		let mut tx = match &request.transaction_id {
			Some(id) => transactions
				.get(id)
				.cloned()
				.ok_or_else(|| LedgerError::NotFound(id.clone()))?,
			None => Transaction {
				id: format!("tx-{}", Uuid::new_v4()),
				process_name: process_name.to_string(),
				customer_id: request.params.customer_id.clone(),
				provider_id: format!("provider-of-{}", request.params.listing_id),
				last_transition: None,
				transitions: Vec::new(),
				protected_data: json!({}),
			},
		};

		let state = current_state(graph, &tx).unwrap_or_else(|| graph.initial_state());
		let legal = graph
			.states()
			.get(state)
			.is_some_and(|node| node.on.contains_key(&request.transition));
		if !legal {
			return Err(LedgerError::TransitionRejected(format!(
				"'{}' is not legal from state '{}'",
				request.transition, state
			)));
		}

		tx.transitions.push(TransitionRecord {
			transition: request.transition.clone(),
			by: meta.actor,
			at: Utc::now(),
		});
		tx.last_transition = Some(request.transition.clone());

		if self
			.config
			.payment_intent_transitions
			.iter()
			.any(|t| t == &request.transition)
			&& tx.payment_intent().is_none()
		{
			let intent_id = format!("pi_{}", Uuid::new_v4().simple());
			let client_secret = format!("{}_secret", intent_id);
			let intents = json!({
				"default": {
					"stripePaymentIntentId": intent_id,
					"stripePaymentIntentClientSecret": client_secret,
				}
			});
			match &mut tx.protected_data {
				serde_json::Value::Object(map) => {
					map.insert(PAYMENT_INTENTS_KEY.to_string(), intents);
				}
				other => *other = json!({ PAYMENT_INTENTS_KEY: intents }),
			}
		}

		if creating {
			self.stats.creates.fetch_add(1, Ordering::SeqCst);
		} else {
			self.stats.transitions.fetch_add(1, Ordering::SeqCst);
		}

		tracing::debug!(
			transaction = %tx.id,
			transition = %request.transition,
			"Ledger transition applied"
		);
		transactions.insert(tx.id.clone(), tx.clone());
		Ok(tx)
	}

	async fn show(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
		let transactions = self.transactions.read().await;
		transactions
			.get(transaction_id)
			.cloned()
			.ok_or_else(|| LedgerError::NotFound(transaction_id.to_string()))
	}

	async fn send_message(
		&self,
		transaction_id: &str,
		_content: &str,
	) -> Result<(), LedgerError> {
		let transactions = self.transactions.read().await;
		if !transactions.contains_key(transaction_id) {
			return Err(LedgerError::NotFound(transaction_id.to_string()));
		}
		if self.config.fail_messages {
			return Err(LedgerError::Network(
				"simulated message delivery failure".to_string(),
			));
		}
		self.stats.messages.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Configuration schema for MemoryLedger.
pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("fail_transitions", FieldType::Boolean),
				Field::new("fail_messages", FieldType::Boolean),
				Field::new(
					"payment_intent_transitions",
					FieldType::Array(Box::new(FieldType::String)),
				),
			],
		)
		.validate(config)
	}
}

/// Factory function to create an in-process ledger from configuration.
///
/// Configuration parameters:
/// - `fail_transitions`: fail every transition request (default: false)
/// - `fail_messages`: fail every message delivery (default: false)
/// - `payment_intent_transitions`: transitions minting payment references
///   (default: the two payment-request transitions)
pub fn create_ledger(
	config: &toml::Value,
	registry: Arc<ProcessRegistry>,
) -> Result<Box<dyn LedgerInterface>, LedgerError> {
	let fail_transitions = config
		.get("fail_transitions")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	let fail_messages = config
		.get("fail_messages")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	let payment_intent_transitions = config
		.get("payment_intent_transitions")
		.and_then(|v| v.as_array())
		.map(|values| {
			values
				.iter()
				.filter_map(|v| v.as_str().map(str::to_string))
				.collect()
		})
		.unwrap_or_else(default_payment_intent_transitions);

	Ok(Box::new(MemoryLedger::new(
		registry,
		MemoryLedgerConfig {
			fail_transitions,
			fail_messages,
			payment_intent_transitions,
		},
	)))
}

/// Registry for the in-process ledger implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = LedgerFactory;

	fn factory() -> Self::Factory {
		create_ledger
	}
}

impl LedgerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use checkout_process::definitions::*;
	use checkout_types::{Money, OrderParams};
	use rust_decimal::Decimal;

	fn order_params() -> OrderParams {
		OrderParams {
			process_name: PROCESS_BOOKING.to_string(),
			listing_id: "listing-1".to_string(),
			customer_id: "user-a".to_string(),
			units: 1,
			total: Money::new(Decimal::new(12000, 2), "USD"),
			booking: None,
			message: None,
			save_payment_method: false,
			extra: serde_json::Value::Null,
		}
	}

	fn request(transition: &str, transaction_id: Option<String>) -> TransitionRequest {
		TransitionRequest {
			process_alias: format!("{}/release-1", PROCESS_BOOKING),
			transaction_id,
			transition: transition.to_string(),
			params: order_params(),
			privileged: true,
		}
	}

	fn ledger() -> MemoryLedger {
		let registry = Arc::new(ProcessRegistry::defaults().unwrap());
		MemoryLedger::new(registry, MemoryLedgerConfig::default())
	}

	#[tokio::test]
	async fn creates_then_advances_a_transaction() {
		let ledger = ledger();
		let stats = ledger.stats();

		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();
		assert_eq!(tx.last_transition.as_deref(), Some(TRANSITION_REQUEST_PAYMENT));
		assert!(tx.history_consistent());
		assert!(tx.payment_intent().is_some());
		// The versioned alias resolves to its process.
		assert_eq!(tx.process_name, PROCESS_BOOKING);
		assert_eq!(tx.provider_id, "provider-of-listing-1");

		let tx = ledger
			.create_or_transition(request(TRANSITION_CONFIRM_PAYMENT, Some(tx.id.clone())))
			.await
			.unwrap();
		assert_eq!(tx.last_transition.as_deref(), Some(TRANSITION_CONFIRM_PAYMENT));
		assert_eq!(tx.transitions.len(), 2);

		assert_eq!(stats.creates(), 1);
		assert_eq!(stats.transitions(), 1);
	}

	#[tokio::test]
	async fn illegal_transitions_are_rejected() {
		let ledger = ledger();

		// Confirming before requesting payment is not legal from initial.
		let err = ledger
			.create_or_transition(request(TRANSITION_CONFIRM_PAYMENT, None))
			.await
			.unwrap_err();
		assert!(matches!(err, LedgerError::TransitionRejected(_)));

		// Neither is re-requesting payment once pending.
		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();
		let err = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, Some(tx.id)))
			.await
			.unwrap_err();
		assert!(matches!(err, LedgerError::TransitionRejected(_)));
	}

	#[tokio::test]
	async fn privileged_transitions_require_the_mediated_path() {
		let ledger = ledger();
		let mut req = request(TRANSITION_REQUEST_PAYMENT, None);
		req.privileged = false;

		let err = ledger.create_or_transition(req).await.unwrap_err();
		assert!(matches!(err, LedgerError::PrivilegeRequired(_)));
	}

	#[tokio::test]
	async fn payment_intent_is_minted_only_once() {
		let ledger = ledger();

		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();
		let first = tx.payment_intent().unwrap();

		let tx = ledger
			.create_or_transition(request(TRANSITION_CONFIRM_PAYMENT, Some(tx.id)))
			.await
			.unwrap();
		assert_eq!(tx.payment_intent().unwrap(), first);
	}

	#[tokio::test]
	async fn messages_require_an_existing_transaction() {
		let ledger = ledger();
		let stats = ledger.stats();

		assert!(matches!(
			ledger.send_message("tx-missing", "hello").await,
			Err(LedgerError::NotFound(_))
		));

		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();
		ledger.send_message(&tx.id, "hello").await.unwrap();
		assert_eq!(stats.messages(), 1);
	}

	#[tokio::test]
	async fn scripted_message_failure() {
		let registry = Arc::new(ProcessRegistry::defaults().unwrap());
		let ledger = MemoryLedger::new(
			registry,
			MemoryLedgerConfig {
				fail_messages: true,
				..MemoryLedgerConfig::default()
			},
		);

		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();
		assert!(matches!(
			ledger.send_message(&tx.id, "hello").await,
			Err(LedgerError::Network(_))
		));
	}

	#[tokio::test]
	async fn show_returns_the_stored_projection() {
		let ledger = ledger();
		let tx = ledger
			.create_or_transition(request(TRANSITION_REQUEST_PAYMENT, None))
			.await
			.unwrap();

		let shown = ledger.show(&tx.id).await.unwrap();
		assert_eq!(shown.id, tx.id);
		assert_eq!(shown.last_transition, tx.last_transition);

		assert!(matches!(
			ledger.show("tx-missing").await,
			Err(LedgerError::NotFound(_))
		));
	}
}
