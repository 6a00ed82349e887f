//! Mock payment processor for testing and development.
//!
//! Mints processor references and tracks authorizations in memory.
//! Failures are scriptable at runtime through the shared controls handle,
//! which the checkout engine's failure-branch and retry tests flip
//! between runs.

use crate::{
	AuthorizeRequest, PaymentError, PaymentFactory, PaymentInterface, PaymentRegistry,
};
use async_trait::async_trait;
use checkout_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, PaymentAuthorization, Schema,
	ValidationError,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Runtime controls and counters for the mock processor.
///
/// Keep a clone of the handle before boxing the client into a service;
/// the flags take effect on the next call.
#[derive(Debug, Default)]
pub struct PaymentControls {
	decline: AtomicBool,
	fail_capture: AtomicBool,
	fail_save: AtomicBool,
	authorizations: AtomicUsize,
	captures: AtomicUsize,
	saves: AtomicUsize,
}

impl PaymentControls {
	/// Decline every authorization attempt.
	pub fn set_decline(&self, decline: bool) {
		self.decline.store(decline, Ordering::SeqCst);
	}

	/// Fail every capture attempt.
	pub fn set_fail_capture(&self, fail: bool) {
		self.fail_capture.store(fail, Ordering::SeqCst);
	}

	/// Fail every save-payment-method attempt.
	pub fn set_fail_save(&self, fail: bool) {
		self.fail_save.store(fail, Ordering::SeqCst);
	}

	/// Number of successful authorizations.
	pub fn authorizations(&self) -> usize {
		self.authorizations.load(Ordering::SeqCst)
	}

	/// Number of successful captures.
	pub fn captures(&self) -> usize {
		self.captures.load(Ordering::SeqCst)
	}

	/// Number of successfully saved payment methods.
	pub fn saves(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}
}

/// Mock payment processor.
pub struct MockPayment {
	controls: Arc<PaymentControls>,
	/// Authorization references known to the processor.
	authorized: RwLock<HashSet<String>>,
}

impl MockPayment {
	/// Creates a mock processor with all failure switches off.
	pub fn new() -> Self {
		Self {
			controls: Arc::new(PaymentControls::default()),
			authorized: RwLock::new(HashSet::new()),
		}
	}

	/// Handle to the runtime controls and counters.
	pub fn controls(&self) -> Arc<PaymentControls> {
		self.controls.clone()
	}
}

impl Default for MockPayment {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl PaymentInterface for MockPayment {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockPaymentSchema)
	}

	async fn authorize(
		&self,
		request: AuthorizeRequest,
	) -> Result<PaymentAuthorization, PaymentError> {
		if request.client_secret.is_empty() {
			return Err(PaymentError::Declined("missing client secret".to_string()));
		}
		if self.controls.decline.load(Ordering::SeqCst) {
			return Err(PaymentError::Declined("card declined".to_string()));
		}

		let authorization_ref = format!("auth_{}", Uuid::new_v4().simple());
		let payment_method_ref = format!("pm_{}", Uuid::new_v4().simple());
		self.authorized.write().await.insert(authorization_ref.clone());
		self.controls.authorizations.fetch_add(1, Ordering::SeqCst);

		tracing::debug!(
			authorization = %authorization_ref,
			method = %request.payment_method.payment_method_token,
			"Authorized payment"
		);
		Ok(PaymentAuthorization {
			payment_method_ref,
			authorization_ref,
			action_completed: true,
		})
	}

	async fn capture(&self, authorization_ref: &str) -> Result<(), PaymentError> {
		if self.controls.fail_capture.load(Ordering::SeqCst) {
			return Err(PaymentError::Network(
				"simulated capture failure".to_string(),
			));
		}
		if !self.authorized.read().await.contains(authorization_ref) {
			return Err(PaymentError::UnknownAuthorization(
				authorization_ref.to_string(),
			));
		}
		self.controls.captures.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn save_payment_method(
		&self,
		customer_ref: &str,
		payment_method_ref: &str,
	) -> Result<(), PaymentError> {
		if self.controls.fail_save.load(Ordering::SeqCst) {
			return Err(PaymentError::Network(
				"simulated save failure".to_string(),
			));
		}
		self.controls.saves.fetch_add(1, Ordering::SeqCst);
		tracing::debug!(
			customer = %customer_ref,
			method = %payment_method_ref,
			"Saved payment method"
		);
		Ok(())
	}
}

/// Configuration schema for MockPayment.
pub struct MockPaymentSchema;

impl ConfigSchema for MockPaymentSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("decline", FieldType::Boolean),
				Field::new("fail_capture", FieldType::Boolean),
				Field::new("fail_save", FieldType::Boolean),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a mock payment client from configuration.
///
/// Configuration parameters:
/// - `decline`: decline every authorization (default: false)
/// - `fail_capture`: fail every capture (default: false)
/// - `fail_save`: fail every save-payment-method call (default: false)
pub fn create_payment(config: &toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError> {
	let payment = MockPayment::new();
	let controls = payment.controls();
	controls.set_decline(
		config
			.get("decline")
			.and_then(|v| v.as_bool())
			.unwrap_or(false),
	);
	controls.set_fail_capture(
		config
			.get("fail_capture")
			.and_then(|v| v.as_bool())
			.unwrap_or(false),
	);
	controls.set_fail_save(
		config
			.get("fail_save")
			.and_then(|v| v.as_bool())
			.unwrap_or(false),
	);
	Ok(Box::new(payment))
}

/// Registry for the mock payment implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = PaymentFactory;

	fn factory() -> Self::Factory {
		create_payment
	}
}

impl PaymentRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PaymentMethodParams;

	fn authorize_request() -> AuthorizeRequest {
		AuthorizeRequest {
			client_secret: "pi_test_secret".to_string(),
			payment_method: PaymentMethodParams {
				payment_method_token: "tok_visa".to_string(),
				billing_name: Some("J. Doe".to_string()),
			},
		}
	}

	#[tokio::test]
	async fn authorize_then_capture() {
		let payment = MockPayment::new();
		let controls = payment.controls();

		let authorization = payment.authorize(authorize_request()).await.unwrap();
		assert!(authorization.action_completed);
		assert!(authorization.authorization_ref.starts_with("auth_"));
		assert!(authorization.payment_method_ref.starts_with("pm_"));

		payment
			.capture(&authorization.authorization_ref)
			.await
			.unwrap();
		assert_eq!(controls.authorizations(), 1);
		assert_eq!(controls.captures(), 1);
	}

	#[tokio::test]
	async fn capture_of_unknown_authorization_is_rejected() {
		let payment = MockPayment::new();
		let err = payment.capture("auth_unknown").await.unwrap_err();
		assert!(matches!(err, PaymentError::UnknownAuthorization(_)));
	}

	#[tokio::test]
	async fn decline_switch_rejects_authorization() {
		let payment = MockPayment::new();
		let controls = payment.controls();

		controls.set_decline(true);
		let err = payment.authorize(authorize_request()).await.unwrap_err();
		assert!(matches!(err, PaymentError::Declined(_)));
		assert_eq!(controls.authorizations(), 0);

		controls.set_decline(false);
		assert!(payment.authorize(authorize_request()).await.is_ok());
	}

	#[tokio::test]
	async fn save_failure_is_reported() {
		let payment = MockPayment::new();
		let controls = payment.controls();

		controls.set_fail_save(true);
		let err = payment
			.save_payment_method("cus_1", "pm_1")
			.await
			.unwrap_err();
		assert!(matches!(err, PaymentError::Network(_)));

		controls.set_fail_save(false);
		payment.save_payment_method("cus_1", "pm_1").await.unwrap();
		assert_eq!(controls.saves(), 1);
	}
}
