//! Confidence scoring module for the multi-chain verifier system.
//!
//! This module provides interfaces and implementations for deriving a
//! confidence score from a verification payload's internal consistency.
//! Scoring is a pluggable, deterministic policy: the same payload always
//! produces the same score, so per-chain votes are reproducible and
//! testable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use verifier_types::{ConfigSchema, ImplementationRegistry, VerificationPayload};

/// Re-export implementations
pub mod implementations {
	pub mod consistency;
}

/// Errors that can occur during scoring operations.
#[derive(Debug, Error)]
pub enum ScoringError {
	/// Error that occurs when the payload cannot be inspected.
	#[error("Malformed payload: {0}")]
	MalformedPayload(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Internal error that occurs during scoring operations.
	#[error("Internal error: {0}")]
	Internal(String),
}

/// Trait defining the interface for confidence scoring policies.
///
/// This trait must be implemented by any scoring policy that wants to
/// integrate with the verifier system. Implementations must be
/// deterministic: scoring the same payload twice yields the same value.
#[async_trait]
pub trait ScoringInterface: Send + Sync {
	/// Returns the configuration schema for this scoring implementation.
	///
	/// This allows each implementation to define its own configuration
	/// requirements with specific validation rules. The schema is used to
	/// validate TOML configuration before initializing the policy.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Derives a confidence score in [0, 1] from the payload.
	///
	/// The score reflects the payload's internal consistency: presence and
	/// quality of model metadata, and agreement between stated and computed
	/// output metrics.
	async fn score(&self, payload: &VerificationPayload) -> Result<f64, ScoringError>;
}

/// Type alias for scoring factory functions.
///
/// This is the function signature that all scoring implementations must
/// provide to create instances of their scoring interface.
pub type ScoringFactory = fn(&toml::Value) -> Result<Box<dyn ScoringInterface>, ScoringError>;

/// Registry trait for scoring implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// scoring implementations must provide a ScoringFactory.
pub trait ScoringRegistry: ImplementationRegistry<Factory = ScoringFactory> {}

/// Get all registered scoring implementations.
///
/// Returns a vector of (name, factory) tuples for all available scoring
/// implementations. This is used by the builder to register every policy
/// it can construct from configuration.
pub fn get_all_implementations() -> Vec<(&'static str, ScoringFactory)> {
	use implementations::consistency;

	vec![(consistency::Registry::NAME, consistency::Registry::factory())]
}

/// Service that manages scoring with multiple implementations.
///
/// The ScoringService coordinates between different scoring policies and
/// provides a unified interface for deriving confidence scores.
pub struct ScoringService {
	/// Map of implementation names to their interfaces.
	implementations: HashMap<String, Arc<dyn ScoringInterface>>,
	/// The primary implementation used for scoring.
	primary_implementation: String,
}

impl ScoringService {
	/// Creates a new ScoringService with the given implementations.
	///
	/// Returns an error if the primary implementation is not among the
	/// available ones.
	pub fn new(
		implementations: HashMap<String, Arc<dyn ScoringInterface>>,
		primary_implementation: String,
	) -> Result<Self, ScoringError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(ScoringError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	/// Scores a payload using the primary implementation.
	pub async fn score(&self, payload: &VerificationPayload) -> Result<f64, ScoringError> {
		let implementation = self
			.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				ScoringError::Internal(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})?;

		implementation.score(payload).await
	}
}
