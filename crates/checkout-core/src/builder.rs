//! Builder wiring the checkout engine from pluggable implementations.
//!
//! Follows the factory pattern: each collaborator (session storage,
//! ledger client, payment client) is constructed by a named factory
//! selected through configuration, and validated against its own schema
//! before the engine is assembled. The process registry is injected
//! rather than read from a global, so tests can substitute their own
//! process set.

use crate::{CheckoutEngine, CheckoutError};
use checkout_config::Config;
use checkout_ledger::{LedgerError, LedgerInterface, LedgerService};
use checkout_payment::{PaymentError, PaymentInterface, PaymentService};
use checkout_process::ProcessRegistry;
use checkout_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for storage backend factory functions.
type StorageFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send>;
/// Type alias for ledger client factory functions.
type LedgerFactory = Box<
	dyn Fn(&toml::Value, Arc<ProcessRegistry>) -> Result<Box<dyn LedgerInterface>, LedgerError>
		+ Send,
>;
/// Type alias for payment client factory functions.
type PaymentFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError> + Send>;

/// Builder for constructing a CheckoutEngine with pluggable
/// implementations.
pub struct CheckoutBuilder {
	config: Config,
	registry: Option<ProcessRegistry>,
	storage_factories: HashMap<String, StorageFactory>,
	ledger_factories: HashMap<String, LedgerFactory>,
	payment_factories: HashMap<String, PaymentFactory>,
}

impl CheckoutBuilder {
	/// Creates a new CheckoutBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			registry: None,
			storage_factories: HashMap::new(),
			ledger_factories: HashMap::new(),
			payment_factories: HashMap::new(),
		}
	}

	/// Uses the given process registry instead of the built-in defaults.
	pub fn with_registry(mut self, registry: ProcessRegistry) -> Self {
		self.registry = Some(registry);
		self
	}

	/// Adds a factory for a named storage backend.
	pub fn with_storage_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send + 'static,
	{
		self.storage_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Adds a factory for a named ledger client.
	pub fn with_ledger_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value, Arc<ProcessRegistry>) -> Result<Box<dyn LedgerInterface>, LedgerError>
			+ Send
			+ 'static,
	{
		self.ledger_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Adds a factory for a named payment client.
	pub fn with_payment_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError> + Send + 'static,
	{
		self.payment_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Builds the CheckoutEngine using the configured factories.
	///
	/// Creates each collaborator from the factory named by its section's
	/// `primary`, validates the section against the implementation's own
	/// schema, and wires everything into the engine.
	pub fn build(self) -> Result<CheckoutEngine, CheckoutError> {
		let registry = Arc::new(match self.registry {
			Some(registry) => registry,
			None => ProcessRegistry::defaults()?,
		});

		// Alias keys must name registered processes; the shape of the
		// alias itself was checked by the config layer.
		for (process, alias) in &self.config.processes.aliases {
			if registry.get(process).is_err() {
				return Err(CheckoutError::Config(format!(
					"Alias '{}' maps unknown process '{}'",
					alias, process
				)));
			}
		}

		let storage_name = &self.config.storage.primary;
		let storage_section = self
			.config
			.storage
			.implementations
			.get(storage_name)
			.ok_or_else(|| {
				CheckoutError::Config(format!(
					"Storage implementation '{}' has no configuration",
					storage_name
				))
			})?;
		let storage_factory = self.storage_factories.get(storage_name).ok_or_else(|| {
			CheckoutError::Config(format!("Storage factory '{}' not registered", storage_name))
		})?;
		let storage_backend = storage_factory(storage_section).map_err(|e| {
			CheckoutError::Config(format!(
				"Failed to create storage backend '{}': {}",
				storage_name, e
			))
		})?;
		storage_backend
			.config_schema()
			.validate(storage_section)
			.map_err(|e| {
				CheckoutError::Config(format!(
					"Invalid configuration for storage backend '{}': {}",
					storage_name, e
				))
			})?;
		let storage = Arc::new(StorageService::new(storage_backend));
		tracing::info!(component = "storage", implementation = %storage_name, "Loaded");

		let ledger_name = &self.config.ledger.primary;
		let ledger_section = self
			.config
			.ledger
			.implementations
			.get(ledger_name)
			.ok_or_else(|| {
				CheckoutError::Config(format!(
					"Ledger implementation '{}' has no configuration",
					ledger_name
				))
			})?;
		let ledger_factory = self.ledger_factories.get(ledger_name).ok_or_else(|| {
			CheckoutError::Config(format!("Ledger factory '{}' not registered", ledger_name))
		})?;
		let ledger_client = ledger_factory(ledger_section, registry.clone()).map_err(|e| {
			CheckoutError::Config(format!(
				"Failed to create ledger client '{}': {}",
				ledger_name, e
			))
		})?;
		ledger_client
			.config_schema()
			.validate(ledger_section)
			.map_err(|e| {
				CheckoutError::Config(format!(
					"Invalid configuration for ledger client '{}': {}",
					ledger_name, e
				))
			})?;
		let ledger = Arc::new(LedgerService::new(ledger_client));
		tracing::info!(component = "ledger", implementation = %ledger_name, "Loaded");

		let payment_name = &self.config.payment.primary;
		let payment_section = self
			.config
			.payment
			.implementations
			.get(payment_name)
			.ok_or_else(|| {
				CheckoutError::Config(format!(
					"Payment implementation '{}' has no configuration",
					payment_name
				))
			})?;
		let payment_factory = self.payment_factories.get(payment_name).ok_or_else(|| {
			CheckoutError::Config(format!("Payment factory '{}' not registered", payment_name))
		})?;
		let payment_client = payment_factory(payment_section).map_err(|e| {
			CheckoutError::Config(format!(
				"Failed to create payment client '{}': {}",
				payment_name, e
			))
		})?;
		payment_client
			.config_schema()
			.validate(payment_section)
			.map_err(|e| {
				CheckoutError::Config(format!(
					"Invalid configuration for payment client '{}': {}",
					payment_name, e
				))
			})?;
		let payment = Arc::new(PaymentService::new(payment_client, ledger.clone()));
		tracing::info!(component = "payment", implementation = %payment_name, "Loaded");

		let session_ttl = match self.config.checkout.session_ttl_seconds {
			0 => None,
			seconds => Some(Duration::from_secs(seconds)),
		};

		Ok(CheckoutEngine::new(
			registry,
			storage,
			ledger,
			payment,
			self.config.processes.aliases.clone(),
			session_ttl,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
[checkout]
marketplace = "demo-marketplace"
session_ttl_seconds = 3600

[processes.aliases]
default-booking = "default-booking/release-1"

[storage]
primary = "memory"
[storage.implementations.memory]

[ledger]
primary = "memory"
[ledger.implementations.memory]

[payment]
primary = "mock"
[payment.implementations.mock]
"#;

	fn builder() -> CheckoutBuilder {
		let config: Config = CONFIG.parse().unwrap();
		let mut builder = CheckoutBuilder::new(config);
		for (name, factory) in checkout_storage::get_all_implementations() {
			builder = builder.with_storage_factory(name, factory);
		}
		for (name, factory) in checkout_ledger::get_all_implementations() {
			builder = builder.with_ledger_factory(name, factory);
		}
		for (name, factory) in checkout_payment::get_all_implementations() {
			builder = builder.with_payment_factory(name, factory);
		}
		builder
	}

	#[test]
	fn builds_an_engine_from_registered_factories() {
		let engine = builder().build().unwrap();
		assert!(engine.registry().get("default-booking").is_ok());
	}

	#[test]
	fn missing_factory_is_a_configuration_error() {
		let config: Config = CONFIG.parse().unwrap();
		let err = CheckoutBuilder::new(config).build().unwrap_err();
		assert!(matches!(err, CheckoutError::Config(_)));
	}

	#[test]
	fn alias_for_an_unknown_process_is_rejected() {
		let config: Config = CONFIG
			.replace(
				"default-booking = \"default-booking/release-1\"",
				"custom-flow = \"custom-flow/release-1\"",
			)
			.parse()
			.unwrap();
		let mut builder = CheckoutBuilder::new(config);
		for (name, factory) in checkout_storage::get_all_implementations() {
			builder = builder.with_storage_factory(name, factory);
		}
		let err = builder.build().unwrap_err();
		assert!(matches!(err, CheckoutError::Config(message) if message.contains("custom-flow")));
	}
}
