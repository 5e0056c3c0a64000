//! Registry trait for self-registering implementations.
//!
//! Each implementation module (chain adapters, scoring policies) provides a
//! Registry struct that implements this trait, declaring its configuration
//! name and factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "evm" for an EVM chain adapter
	/// - "consistency" for the consistency scoring policy
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each module defines its own factory type, for example AdapterFactory
	/// for chain adapters and ScoringFactory for scoring policies.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
