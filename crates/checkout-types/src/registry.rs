//! Registry trait for self-registering implementations.
//!
//! Each pluggable implementation (storage backend, ledger client, payment
//! client) provides a Registry struct implementing this trait, declaring
//! the name it answers to in configuration files together with its factory
//! function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this
	/// implementation, for example:
	/// - "file" for storage.implementations.file
	/// - "memory" for ledger.implementations.memory
	/// - "mock" for payment.implementations.mock
	const NAME: &'static str;

	/// The factory function type this implementation provides. Each crate
	/// defines its own, e.g. StorageFactory or LedgerFactory.
	type Factory;

	/// Returns the factory function able to construct this implementation
	/// from its configuration section.
	fn factory() -> Self::Factory;
}
