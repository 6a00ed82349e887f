//! Payment processor client for the checkout system.
//!
//! The payment processor is an external collaborator holding the money
//! side of a checkout: interactive authorization of a payment intent,
//! processor-side capture, and optional persistence of the payment method
//! on the customer's profile. Confirmation is a composed operation: the
//! processor captures, then the transaction ledger is advanced with the
//! confirmation transition, so the two systems cannot drift apart
//! silently.

use async_trait::async_trait;
use checkout_ledger::{LedgerError, LedgerService, TransitionRequest};
use checkout_types::{
	ConfigSchema, ImplementationRegistry, OrderParams, PaymentAuthorization, Transaction,
};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
}

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
	/// The processor declined the payment.
	#[error("Payment declined: {0}")]
	Declined(String),
	/// Network or availability failure talking to the processor.
	#[error("Network error: {0}")]
	Network(String),
	/// The referenced authorization is unknown to the processor.
	#[error("Unknown authorization '{0}'")]
	UnknownAuthorization(String),
	/// Advancing the ledger after capture failed.
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	/// The client configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Payment method details collected by the UI.
#[derive(Debug, Clone)]
pub struct PaymentMethodParams {
	/// Opaque processor token for the entered payment details.
	pub payment_method_token: String,
	/// Billing name attached to the method, if collected.
	pub billing_name: Option<String>,
}

/// A request to complete interactive authorization of a payment intent.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
	/// Client secret of the payment intent minted by the ledger.
	pub client_secret: String,
	/// Payment method to authorize with.
	pub payment_method: PaymentMethodParams,
}

/// Interface implemented by payment processor clients.
#[async_trait]
pub trait PaymentInterface: Send + Sync {
	/// Returns the configuration schema for this payment client.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Completes interactive authorization of a payment intent, including
	/// any user-facing challenge, and returns the processor references.
	async fn authorize(
		&self,
		request: AuthorizeRequest,
	) -> Result<PaymentAuthorization, PaymentError>;

	/// Settles a previously completed authorization on the processor side.
	async fn capture(&self, authorization_ref: &str) -> Result<(), PaymentError>;

	/// Persists a payment method on the customer's processor profile.
	async fn save_payment_method(
		&self,
		customer_ref: &str,
		payment_method_ref: &str,
	) -> Result<(), PaymentError>;
}

/// Type alias for payment factory functions.
pub type PaymentFactory = fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError>;

/// Registry trait for payment implementations.
pub trait PaymentRegistry: ImplementationRegistry<Factory = PaymentFactory> {}

/// Get all registered payment implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PaymentFactory)> {
	use implementations::mock;

	vec![(mock::Registry::NAME, mock::Registry::factory())]
}

/// Service coordinating the payment processor and the transaction ledger.
///
/// Composes the ledger service so that confirming a payment is one
/// operation from the caller's point of view: capture on the processor,
/// then advance the ledger with the confirmation transition, returning
/// the refreshed transaction projection.
pub struct PaymentService {
	/// The underlying payment processor client.
	implementation: Box<dyn PaymentInterface>,
	/// Ledger service advanced on confirmation.
	ledger: Arc<LedgerService>,
}

impl PaymentService {
	/// Creates a new PaymentService with the specified client and ledger.
	pub fn new(implementation: Box<dyn PaymentInterface>, ledger: Arc<LedgerService>) -> Self {
		Self {
			implementation,
			ledger,
		}
	}

	/// Completes interactive authorization of a payment intent.
	pub async fn authorize(
		&self,
		request: AuthorizeRequest,
	) -> Result<PaymentAuthorization, PaymentError> {
		self.implementation.authorize(request).await
	}

	/// Confirms an authorized payment.
	///
	/// Captures the authorization on the processor, then advances the
	/// ledger with `confirm_transition`. If the ledger call fails after a
	/// successful capture, the error surfaces so the caller can re-derive
	/// state before retrying; the capture itself is idempotent on the
	/// processor side.
	pub async fn confirm(
		&self,
		tx: &Transaction,
		authorization_ref: &str,
		confirm_transition: &str,
		privileged: bool,
		params: OrderParams,
	) -> Result<Transaction, PaymentError> {
		self.implementation.capture(authorization_ref).await?;

		let refreshed = self
			.ledger
			.create_or_transition(TransitionRequest {
				process_alias: tx.process_name.clone(),
				transaction_id: Some(tx.id.clone()),
				transition: confirm_transition.to_string(),
				params,
				privileged,
			})
			.await?;
		Ok(refreshed)
	}

	/// Persists a payment method on the customer's processor profile.
	pub async fn save_payment_method(
		&self,
		customer_ref: &str,
		payment_method_ref: &str,
	) -> Result<(), PaymentError> {
		self.implementation
			.save_payment_method(customer_ref, payment_method_ref)
			.await
	}
}
