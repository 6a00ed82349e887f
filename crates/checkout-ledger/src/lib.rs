//! Transaction ledger client for the checkout system.
//!
//! The transaction ledger is an external collaborator: it owns every
//! transaction, serializes all transitions, and is the single source of
//! truth for transition histories. This module defines the client
//! interface the checkout engine talks to, the delegating service
//! wrapper, and an in-process implementation that enforces process
//! legality the way the real ledger does.

use async_trait::async_trait;
use checkout_process::ProcessRegistry;
use checkout_types::{ConfigSchema, ImplementationRegistry, OrderParams, Transaction};
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// Network or availability failure talking to the ledger.
	#[error("Network error: {0}")]
	Network(String),
	/// The referenced transaction does not exist.
	#[error("Transaction '{0}' not found")]
	NotFound(String),
	/// The ledger refused the requested transition.
	#[error("Transition rejected: {0}")]
	TransitionRejected(String),
	/// A privileged transition was requested outside the server-mediated
	/// path.
	#[error("Privileged transition '{0}' requires privileged execution")]
	PrivilegeRequired(String),
	/// The client configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A request to create a transaction or advance an existing one.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
	/// Process alias the transaction runs under, e.g.
	/// "default-booking/release-1". A bare process name is a valid alias
	/// for itself.
	pub process_alias: String,
	/// `None` creates a new transaction; `Some` advances an existing one.
	pub transaction_id: Option<String>,
	/// Transition to take.
	pub transition: String,
	/// Order intent passed through to the ledger; carries the customer's
	/// identity.
	pub params: OrderParams,
	/// Whether the call runs through the server-mediated path. Must be
	/// true for transitions the process marks privileged.
	pub privileged: bool,
}

/// Interface implemented by ledger clients.
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Returns the configuration schema for this ledger client.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Creates a new transaction or advances an existing one by taking the
	/// requested transition, returning the refreshed projection.
	async fn create_or_transition(
		&self,
		request: TransitionRequest,
	) -> Result<Transaction, LedgerError>;

	/// Fetches the current projection of a transaction.
	async fn show(&self, transaction_id: &str) -> Result<Transaction, LedgerError>;

	/// Delivers a message on a transaction's conversation thread.
	async fn send_message(&self, transaction_id: &str, content: &str)
		-> Result<(), LedgerError>;
}

/// Type alias for ledger factory functions.
///
/// Ledger clients validate requested transitions against the process
/// registry, so the factory receives it alongside the configuration.
pub type LedgerFactory =
	fn(&toml::Value, Arc<ProcessRegistry>) -> Result<Box<dyn LedgerInterface>, LedgerError>;

/// Registry trait for ledger implementations.
pub trait LedgerRegistry: ImplementationRegistry<Factory = LedgerFactory> {}

/// Get all registered ledger implementations.
pub fn get_all_implementations() -> Vec<(&'static str, LedgerFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// Service wrapping a ledger client implementation.
pub struct LedgerService {
	/// The underlying ledger client implementation.
	implementation: Box<dyn LedgerInterface>,
}

impl LedgerService {
	/// Creates a new LedgerService with the specified implementation.
	pub fn new(implementation: Box<dyn LedgerInterface>) -> Self {
		Self { implementation }
	}

	/// Creates a new transaction or advances an existing one.
	pub async fn create_or_transition(
		&self,
		request: TransitionRequest,
	) -> Result<Transaction, LedgerError> {
		self.implementation.create_or_transition(request).await
	}

	/// Fetches the current projection of a transaction.
	pub async fn show(&self, transaction_id: &str) -> Result<Transaction, LedgerError> {
		self.implementation.show(transaction_id).await
	}

	/// Delivers a message on a transaction's conversation thread.
	pub async fn send_message(
		&self,
		transaction_id: &str,
		content: &str,
	) -> Result<(), LedgerError> {
		self.implementation.send_message(transaction_id, content).await
	}
}
