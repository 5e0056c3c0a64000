//! Configuration module for the multi-chain verifier system.
//!
//! This module provides structures and utilities for managing verifier
//! configuration. It supports loading configuration from TOML files with
//! environment-variable resolution and validates policy parameters eagerly
//! so misconfiguration is rejected before any adapter is constructed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use verifier_types::{ChainType, ConsensusConfig};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the verifier.
///
/// Contains the verifier identity, one raw configuration block per target
/// chain, the consensus policy, and the scoring policy selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this verifier instance.
	pub verifier: VerifierConfig,
	/// Per-chain adapter configuration blocks, keyed by chain name.
	///
	/// Each block is implementation-specific raw TOML; the adapter's own
	/// schema validates it before the adapter is constructed.
	pub chains: HashMap<String, toml::Value>,
	/// Consensus policy parameters.
	#[serde(default)]
	pub consensus: ConsensusConfig,
	/// Scoring policy selection and per-implementation configuration.
	#[serde(default)]
	pub scoring: ScoringConfig,
}

/// Configuration specific to the verifier instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifierConfig {
	/// Unique identifier for this verifier instance.
	pub id: String,
}

/// Configuration for confidence scoring policies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
	/// Which scoring implementation to use as primary.
	#[serde(default = "default_scoring_primary")]
	pub primary: String,
	/// Map of scoring implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Returns the default primary scoring implementation name.
fn default_scoring_primary() -> String {
	"consistency".to_string()
}

impl Default for ScoringConfig {
	fn default() -> Self {
		Self {
			primary: default_scoring_primary(),
			implementations: HashMap::new(),
		}
	}
}

impl Config {
	/// Loads configuration from a TOML file.
	///
	/// Environment variable references of the form `${VAR}` are resolved
	/// before parsing, and the resulting configuration is validated.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		let config: Config = resolved.parse()?;
		config.validate()?;
		Ok(config)
	}

	/// Validates the loaded configuration.
	///
	/// Checks that every chain section names a known chain, that each block
	/// is a TOML table, and that the consensus policy parameters are sane.
	/// Adapter-specific fields are validated later by each adapter's own
	/// configuration schema.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".to_string(),
			));
		}

		for (name, block) in &self.chains {
			ChainType::from_str(name)
				.map_err(|e| ConfigError::Validation(format!("chains.{}: {}", name, e)))?;
			if !block.is_table() {
				return Err(ConfigError::Validation(format!(
					"chains.{} must be a table",
					name
				)));
			}
		}

		self.consensus
			.validate()
			.map_err(|e| ConfigError::Validation(e.to_string()))?;

		Ok(())
	}

	/// Returns the configured chains parsed into typed keys.
	pub fn chain_entries(&self) -> Vec<(ChainType, &toml::Value)> {
		self.chains
			.iter()
			.filter_map(|(name, block)| ChainType::from_str(name).ok().map(|c| (c, block)))
			.collect()
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(toml::from_str(s)?)
	}
}

/// Resolves `${VAR}` environment variable references in configuration text.
///
/// Unset variables are an error rather than an empty substitution, so a
/// missing credential fails loudly at load time.
pub fn resolve_env_vars(content: &str) -> Result<String, ConfigError> {
	let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
		.map_err(|e| ConfigError::Parse(format!("Invalid env var pattern: {}", e)))?;

	let mut missing = Vec::new();
	let resolved = pattern.replace_all(content, |caps: &regex::Captures| {
		let name = &caps[1];
		match std::env::var(name) {
			Ok(value) => value,
			Err(_) => {
				missing.push(name.to_string());
				String::new()
			},
		}
	});

	if !missing.is_empty() {
		return Err(ConfigError::Validation(format!(
			"Unset environment variables referenced in config: {}",
			missing.join(", ")
		)));
	}

	Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const SAMPLE: &str = r#"
[verifier]
id = "verifier-test"

[chains.ethereum]
adapter = "evm"
rpc_url = "http://localhost:8545"

[chains.polygon]
adapter = "evm"
rpc_url = "http://localhost:8546"

[consensus]
min_participating_chains = 2
consensus_threshold = 0.67
timeout_seconds = 10
byzantine_fault_tolerance = false
weighted_voting = true

[consensus.chain_weights]
ethereum = 1.0
polygon = 0.8

[scoring]
primary = "consistency"

[scoring.implementations.consistency]
"#;

	#[test]
	fn loads_sample_config_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(SAMPLE.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).unwrap();
		assert_eq!(config.verifier.id, "verifier-test");
		assert_eq!(config.chains.len(), 2);
		assert_eq!(config.consensus.min_participating_chains, 2);
		assert_eq!(config.consensus.weight_for(ChainType::Polygon), 0.8);
		assert_eq!(config.scoring.primary, "consistency");

		let entries = config.chain_entries();
		assert!(entries.iter().any(|(c, _)| *c == ChainType::Ethereum));
	}

	#[test]
	fn unknown_chain_name_is_rejected() {
		let bad = SAMPLE.replace("[chains.polygon]", "[chains.dogecoin]");
		let config: Config = bad.parse().unwrap();
		assert!(matches!(
			config.validate(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn invalid_threshold_is_rejected_at_load() {
		let bad = SAMPLE.replace("consensus_threshold = 0.67", "consensus_threshold = 1.3");
		let config: Config = bad.parse().unwrap();
		assert!(config.validate().is_err());
	}

	#[test]
	fn env_vars_are_resolved_or_reported() {
		std::env::set_var("VERIFIER_TEST_RPC", "http://node:8545");
		let resolved = resolve_env_vars("rpc_url = \"${VERIFIER_TEST_RPC}\"").unwrap();
		assert_eq!(resolved, "rpc_url = \"http://node:8545\"");

		let err = resolve_env_vars("key = \"${VERIFIER_TEST_UNSET_VAR}\"");
		assert!(matches!(err, Err(ConfigError::Validation(_))));
	}
}
