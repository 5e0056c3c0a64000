//! Chain identification and connection configuration types.
//!
//! This module defines the set of supported target ledgers and the
//! per-chain parameters an adapter needs to reach its endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::ZeroizeOnDrop;

/// Identifies a target ledger.
///
/// Carries no behavior itself; used as a map key for chain weights and
/// adapter lookup in the connection manager. Serializes as the uppercase
/// wire form ("ETHEREUM"); deserialization accepts any case so TOML
/// sections can use the lowercase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainType {
	Ethereum,
	Polygon,
	Arbitrum,
	Cardano,
	Solana,
}

impl ChainType {
	/// Returns the canonical lowercase name used in configuration sections.
	pub fn as_str(&self) -> &'static str {
		match self {
			ChainType::Ethereum => "ethereum",
			ChainType::Polygon => "polygon",
			ChainType::Arbitrum => "arbitrum",
			ChainType::Cardano => "cardano",
			ChainType::Solana => "solana",
		}
	}

	/// Well-known chain id for EVM networks, if the chain is EVM-compatible.
	///
	/// Used by the EVM adapter to cross-check the id reported by the RPC
	/// endpoint against the chain it was configured for.
	pub fn evm_chain_id(&self) -> Option<u64> {
		match self {
			ChainType::Ethereum => Some(1),
			ChainType::Polygon => Some(137),
			ChainType::Arbitrum => Some(42161),
			ChainType::Cardano | ChainType::Solana => None,
		}
	}
}

impl fmt::Display for ChainType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ChainType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"ethereum" => Ok(ChainType::Ethereum),
			"polygon" => Ok(ChainType::Polygon),
			"arbitrum" => Ok(ChainType::Arbitrum),
			"cardano" => Ok(ChainType::Cardano),
			"solana" => Ok(ChainType::Solana),
			other => Err(format!("Unknown chain type: {}", other)),
		}
	}
}

impl<'de> Deserialize<'de> for ChainType {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// A signing credential that never appears in logs or debug output.
///
/// The inner key material is zeroized when the value is dropped and can
/// only be read through [`SecretKey::with_exposed`].
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
	/// Wraps raw key material.
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	/// Runs `f` with the exposed key material.
	///
	/// The key is only accessible inside the closure; callers must not
	/// copy it out into long-lived storage.
	pub fn with_exposed<R>(&self, f: impl FnOnce(&str) -> R) -> R {
		f(&self.0)
	}
}

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretKey([REDACTED])")
	}
}

/// Per-chain connection parameters.
///
/// Immutable once an adapter is constructed; owned by whichever caller
/// configures the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
	/// The target ledger this configuration describes.
	pub chain: ChainType,
	/// RPC endpoint URL for the chain.
	pub rpc_url: String,
	/// Optional signing credential for on-chain claim submission.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signing_key: Option<SecretKey>,
	/// Optional address of the verification registry contract.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub contract_address: Option<String>,
	/// Gas or resource limit for claim submissions.
	#[serde(default = "default_resource_limit")]
	pub resource_limit: u64,
	/// Per-call timeout in seconds for this chain's RPC interactions.
	#[serde(default = "default_chain_timeout")]
	pub timeout_seconds: u64,
	/// Number of attempts made when establishing the connection.
	#[serde(default = "default_retry_attempts")]
	pub retry_attempts: u32,
}

impl ChainConfig {
	/// Builds a ChainConfig from a raw `chains.<name>` TOML block.
	///
	/// The chain key comes from the section name rather than the block
	/// itself; implementation-specific fields in the block are ignored.
	pub fn from_toml(
		chain: ChainType,
		value: &toml::Value,
	) -> Result<Self, crate::ValidationError> {
		#[derive(serde::Deserialize)]
		struct Raw {
			#[serde(default)]
			rpc_url: String,
			#[serde(default)]
			signing_key: Option<String>,
			#[serde(default)]
			contract_address: Option<String>,
			#[serde(default = "default_resource_limit")]
			resource_limit: u64,
			#[serde(default = "default_chain_timeout")]
			timeout_seconds: u64,
			#[serde(default = "default_retry_attempts")]
			retry_attempts: u32,
		}

		let raw: Raw = value
			.clone()
			.try_into()
			.map_err(|e: toml::de::Error| {
				crate::ValidationError::DeserializationError(e.message().to_string())
			})?;

		Ok(Self {
			chain,
			rpc_url: raw.rpc_url,
			signing_key: raw.signing_key.map(SecretKey::new),
			contract_address: raw.contract_address,
			resource_limit: raw.resource_limit,
			timeout_seconds: raw.timeout_seconds,
			retry_attempts: raw.retry_attempts,
		})
	}
}

/// Returns the default gas/resource limit for claim submissions.
fn default_resource_limit() -> u64 {
	500_000
}

/// Returns the default per-call timeout in seconds.
fn default_chain_timeout() -> u64 {
	30
}

/// Returns the default number of connection attempts.
fn default_retry_attempts() -> u32 {
	3
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chain_type_round_trips_through_str() {
		for chain in [
			ChainType::Ethereum,
			ChainType::Polygon,
			ChainType::Arbitrum,
			ChainType::Cardano,
			ChainType::Solana,
		] {
			assert_eq!(chain.as_str().parse::<ChainType>().unwrap(), chain);
		}
		assert!("dogecoin".parse::<ChainType>().is_err());
	}

	#[test]
	fn chain_type_serializes_screaming_snake() {
		let json = serde_json::to_string(&ChainType::Ethereum).unwrap();
		assert_eq!(json, "\"ETHEREUM\"");
	}

	#[test]
	fn chain_type_deserializes_any_case() {
		let upper: ChainType = serde_json::from_str("\"ETHEREUM\"").unwrap();
		let lower: ChainType = serde_json::from_str("\"ethereum\"").unwrap();
		assert_eq!(upper, ChainType::Ethereum);
		assert_eq!(lower, ChainType::Ethereum);
	}

	#[test]
	fn chain_config_from_toml_applies_defaults() {
		let block: toml::Value = toml::from_str(
			r#"
adapter = "evm"
rpc_url = "http://localhost:8545"
signing_key = "0xabc"
"#,
		)
		.unwrap();

		let config = ChainConfig::from_toml(ChainType::Ethereum, &block).unwrap();
		assert_eq!(config.chain, ChainType::Ethereum);
		assert_eq!(config.rpc_url, "http://localhost:8545");
		assert!(config.signing_key.is_some());
		assert_eq!(config.timeout_seconds, 30);
		assert_eq!(config.retry_attempts, 3);
	}

	#[test]
	fn secret_key_debug_is_redacted() {
		let key = SecretKey::new("0xdeadbeef");
		assert_eq!(format!("{:?}", key), "SecretKey([REDACTED])");
		key.with_exposed(|k| assert_eq!(k, "0xdeadbeef"));
	}
}
