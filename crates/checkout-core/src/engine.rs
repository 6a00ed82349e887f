//! The checkout sequencer.
//!
//! Steps execute strictly sequentially; each one persists the session
//! before the next remote call so that a crash between steps always
//! leaves the flow resumable at the last completed step. Nothing here
//! retries automatically: retry is a user-initiated re-entry, and every
//! step independently re-derives its completion from the persisted
//! session and the ledger projection rather than from in-memory flags.

use crate::{CheckoutError, CheckoutOutcome, CheckoutStep};
use checkout_ledger::{LedgerService, TransitionRequest};
use checkout_payment::{AuthorizeRequest, PaymentMethodParams, PaymentService};
use checkout_process::definitions::{
	STATE_INQUIRY, TRANSITION_CONFIRM_PAYMENT, TRANSITION_REQUEST_PAYMENT,
	TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY,
};
use checkout_process::{current_state, is_privileged, ProcessRegistry};
use checkout_storage::{StorageError, StorageService};
use checkout_types::{
	CheckoutSession, MessageRetry, OrderParams, PaymentAuthorization, ProcessGraph,
	StoreNamespace, Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Orchestrates the checkout sequence against the external collaborators.
///
/// One engine serves any number of concurrent checkouts; sessions are
/// scoped per session key and all shared members are read-only after
/// construction, so no locking is needed here.
pub struct CheckoutEngine {
	/// Immutable process registry.
	registry: Arc<ProcessRegistry>,
	/// Durable session store.
	storage: Arc<StorageService>,
	/// Transaction ledger client.
	ledger: Arc<LedgerService>,
	/// Payment processor client.
	payment: Arc<PaymentService>,
	/// Process name to versioned ledger alias.
	aliases: HashMap<String, String>,
	/// TTL applied to persisted sessions.
	session_ttl: Option<Duration>,
}

impl std::fmt::Debug for CheckoutEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CheckoutEngine")
			.field("aliases", &self.aliases)
			.field("session_ttl", &self.session_ttl)
			.finish_non_exhaustive()
	}
}

impl CheckoutEngine {
	/// Creates an engine over the given collaborators.
	pub fn new(
		registry: Arc<ProcessRegistry>,
		storage: Arc<StorageService>,
		ledger: Arc<LedgerService>,
		payment: Arc<PaymentService>,
		aliases: HashMap<String, String>,
		session_ttl: Option<Duration>,
	) -> Self {
		Self {
			registry,
			storage,
			ledger,
			payment,
			aliases,
			session_ttl,
		}
	}

	/// Returns a reference to the process registry.
	pub fn registry(&self) -> &Arc<ProcessRegistry> {
		&self.registry
	}

	/// Runs the checkout sequence for one session.
	///
	/// Safe to call again after any failure or reload with the same
	/// session key: completed steps are detected from persisted state and
	/// skipped, never re-issued.
	pub async fn run_checkout(
		&self,
		session_key: &str,
		order_params: OrderParams,
		payment_method: PaymentMethodParams,
	) -> Result<CheckoutOutcome, CheckoutError> {
		let mut session = self.load_or_create_session(session_key, order_params).await?;
		let graph = self.registry.get(&session.order_params.process_name)?;

		self.refresh_transaction(&mut session).await;

		let tx = self.request_order(graph, &mut session).await?;
		let authorization = self
			.authorize_payment(&mut session, &tx, payment_method)
			.await?;
		let tx = self
			.confirm_payment(graph, &mut session, tx, &authorization)
			.await?;
		let message_sent = self.send_initial_message(&session, &tx).await;
		let payment_method_saved = self.save_payment_method(&session, &tx, &authorization).await;

		if let Err(e) = self
			.storage
			.remove(StoreNamespace::Sessions, session_key)
			.await
		{
			tracing::warn!(
				session = %session_key,
				error = %e,
				"Checkout completed but the session could not be cleared"
			);
		}

		tracing::info!(session = %session_key, transaction = %tx.id, "Checkout completed");
		Ok(CheckoutOutcome {
			transaction_id: tx.id,
			payment_method_saved,
			message_sent,
		})
	}

	/// Loads the persisted session for the key, or starts a fresh one.
	/// Nothing is written until the first remote step succeeds.
	async fn load_or_create_session(
		&self,
		session_key: &str,
		order_params: OrderParams,
	) -> Result<CheckoutSession, CheckoutError> {
		match self
			.storage
			.retrieve::<CheckoutSession>(StoreNamespace::Sessions, session_key)
			.await
		{
			Ok(session) => {
				tracing::info!(session = %session_key, "Resuming persisted checkout session");
				Ok(session)
			}
			Err(StorageError::NotFound) => {
				Ok(CheckoutSession::new(session_key, order_params))
			}
			Err(e) => Err(CheckoutError::Session(e.to_string())),
		}
	}

	/// Re-reads the transaction projection from the ledger so completion
	/// checks run against the authoritative state, not a stale copy. A
	/// failed refresh falls back to the last persisted projection, which
	/// is still good enough to rule out re-issuing completed operations.
	async fn refresh_transaction(&self, session: &mut CheckoutSession) {
		if let Some(tx) = session.transaction.as_ref() {
			match self.ledger.show(&tx.id).await {
				Ok(fresh) => session.transaction = Some(fresh),
				Err(e) => {
					tracing::warn!(
						transaction = %tx.id,
						error = %e,
						"Could not refresh transaction; using last persisted projection"
					);
				}
			}
		}
	}

	fn alias_for(&self, process_name: &str) -> String {
		self.aliases
			.get(process_name)
			.cloned()
			.unwrap_or_else(|| process_name.to_string())
	}

	/// Step 1: request a new transaction or advance the existing one.
	///
	/// If the session's transaction already carries a payment processor
	/// reference, an authorization was created on a previous attempt and
	/// the transaction is reused as-is. This is the idempotence guard
	/// against duplicate authorizations after a reload.
	async fn request_order(
		&self,
		graph: &ProcessGraph,
		session: &mut CheckoutSession,
	) -> Result<Transaction, CheckoutError> {
		if let Some(tx) = session.transaction.as_ref() {
			if tx.payment_intent().is_some() {
				tracing::info!(
					transaction = %tx.id,
					"Reusing transaction with an existing payment authorization"
				);
				return Ok(tx.clone());
			}
		}

		let current = session
			.transaction
			.as_ref()
			.and_then(|tx| current_state(graph, tx));
		let transition = if current == Some(STATE_INQUIRY)
			&& graph
				.destination_of(TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY)
				.is_some()
		{
			TRANSITION_REQUEST_PAYMENT_AFTER_INQUIRY
		} else {
			TRANSITION_REQUEST_PAYMENT
		};

		let request = TransitionRequest {
			process_alias: self.alias_for(graph.name()),
			transaction_id: session.transaction.as_ref().map(|tx| tx.id.clone()),
			transition: transition.to_string(),
			params: session.order_params.clone(),
			privileged: is_privileged(graph, transition),
		};

		let transaction_advanced = session.transaction.is_some();
		let tx = self
			.ledger
			.create_or_transition(request)
			.await
			.map_err(|e| CheckoutError::StepFailed {
				step: CheckoutStep::OrderRequested,
				cause: e.to_string(),
				transaction_advanced,
			})?;
		tracing::info!(transaction = %tx.id, transition = %transition, "Order requested");

		session.transaction = Some(tx.clone());
		self.persist_session(session, CheckoutStep::OrderRequested)
			.await?;
		Ok(tx)
	}

	/// Step 2: complete interactive payment authorization.
	///
	/// Skipped when the session already holds a completed authorization
	/// from a previous attempt (e.g. a challenge the customer already
	/// passed); its captured result is reused instead of repeating the
	/// interaction.
	async fn authorize_payment(
		&self,
		session: &mut CheckoutSession,
		tx: &Transaction,
		payment_method: PaymentMethodParams,
	) -> Result<PaymentAuthorization, CheckoutError> {
		let intent = tx
			.payment_intent()
			.ok_or_else(|| CheckoutError::MissingAuthorization(tx.id.clone()))?;

		if let Some(authorization) = session
			.authorization
			.as_ref()
			.filter(|a| a.action_completed)
		{
			tracing::info!(transaction = %tx.id, "Reusing completed payment authorization");
			return Ok(authorization.clone());
		}

		let authorization = self
			.payment
			.authorize(AuthorizeRequest {
				client_secret: intent.client_secret,
				payment_method,
			})
			.await
			.map_err(|e| CheckoutError::StepFailed {
				step: CheckoutStep::PaymentAuthorized,
				cause: e.to_string(),
				transaction_advanced: true,
			})?;
		tracing::info!(transaction = %tx.id, "Payment authorized");

		session.authorization = Some(authorization.clone());
		self.persist_session(session, CheckoutStep::PaymentAuthorized)
			.await?;
		Ok(authorization)
	}

	/// Step 3: confirm the authorized payment.
	///
	/// A transaction whose last transition is already the confirmation is
	/// done; the stored projection is returned untouched so the ledger is
	/// never double-confirmed.
	async fn confirm_payment(
		&self,
		graph: &ProcessGraph,
		session: &mut CheckoutSession,
		tx: Transaction,
		authorization: &PaymentAuthorization,
	) -> Result<Transaction, CheckoutError> {
		if tx.last_transition.as_deref() == Some(TRANSITION_CONFIRM_PAYMENT) {
			tracing::info!(
				transaction = %tx.id,
				"Payment already confirmed; reusing ledger projection"
			);
			return Ok(tx);
		}

		let confirmed = self
			.payment
			.confirm(
				&tx,
				&authorization.authorization_ref,
				TRANSITION_CONFIRM_PAYMENT,
				is_privileged(graph, TRANSITION_CONFIRM_PAYMENT),
				session.order_params.clone(),
			)
			.await
			.map_err(|e| CheckoutError::StepFailed {
				step: CheckoutStep::PaymentConfirmed,
				cause: e.to_string(),
				transaction_advanced: true,
			})?;
		tracing::info!(transaction = %confirmed.id, "Payment confirmed");

		session.transaction = Some(confirmed.clone());
		self.persist_session(session, CheckoutStep::PaymentConfirmed)
			.await?;
		Ok(confirmed)
	}

	/// Step 4: deliver the initial message, if one was written.
	///
	/// Fire-and-forget relative to checkout completion: a failure never
	/// rolls back payment. It is recorded against the order so the UI can
	/// offer a message-only retry.
	async fn send_initial_message(&self, session: &CheckoutSession, tx: &Transaction) -> bool {
		let Some(content) = session.order_params.message.clone() else {
			return true;
		};

		match self.ledger.send_message(&tx.id, &content).await {
			Ok(()) => {
				tracing::info!(transaction = %tx.id, "Initial message sent");
				true
			}
			Err(e) => {
				tracing::warn!(
					transaction = %tx.id,
					error = %e,
					"Initial message failed; recording for manual retry"
				);
				let retry = MessageRetry {
					transaction_id: tx.id.clone(),
					content,
					reason: e.to_string(),
				};
				if let Err(store_err) = self
					.storage
					.store(StoreNamespace::MessageRetries, &tx.id, &retry)
					.await
				{
					tracing::error!(
						transaction = %tx.id,
						error = %store_err,
						"Could not record message retry marker"
					);
				}
				false
			}
		}
	}

	/// Step 5: persist the payment method on opt-in.
	///
	/// The order is already placed by this point, so failure is absorbed
	/// into `payment_method_saved: false` rather than failing the
	/// checkout.
	async fn save_payment_method(
		&self,
		session: &CheckoutSession,
		tx: &Transaction,
		authorization: &PaymentAuthorization,
	) -> bool {
		if !session.order_params.save_payment_method {
			return false;
		}

		match self
			.payment
			.save_payment_method(&tx.customer_id, &authorization.payment_method_ref)
			.await
		{
			Ok(()) => {
				tracing::info!(transaction = %tx.id, "Payment method saved");
				true
			}
			Err(e) => {
				tracing::warn!(
					transaction = %tx.id,
					error = %e,
					"Keeping order; payment method was not saved"
				);
				false
			}
		}
	}

	/// Persists the session before the next remote call, so a crash
	/// between steps leaves the flow resumable at the last completed one.
	async fn persist_session(
		&self,
		session: &CheckoutSession,
		step: CheckoutStep,
	) -> Result<(), CheckoutError> {
		self.storage
			.store_with_ttl(
				StoreNamespace::Sessions,
				&session.session_key,
				session,
				self.session_ttl,
			)
			.await
			.map_err(|e| CheckoutError::StepFailed {
				step,
				cause: format!("session persistence failed: {}", e),
				transaction_advanced: true,
			})
	}
}
