//! EVM chain adapter built on the Alloy library.
//!
//! This adapter covers the EVM-compatible chains (Ethereum, Polygon,
//! Arbitrum). Connecting establishes an HTTP provider and cross-checks the
//! chain id reported by the endpoint against the configured chain.
//! Verification computes the deterministic content hash, scores the payload
//! through the injected scoring policy, and anchors the claim to the latest
//! block. When a signing key and registry contract are configured, accepted
//! claims are additionally submitted on-chain.

use crate::{AdapterError, AdapterFactory, AdapterInterface, AdapterRegistry, StatsRecorder};
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use verifier_scoring::ScoringService;
use verifier_types::{
	content_hash, with_0x_prefix, ChainConfig, ChainType, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Schema, ValidationError, VerificationPayload, VerificationResult,
	VerificationStats, VerificationStatus,
};

/// Provider handle shared between connect and verification paths.
type EvmProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Default minimum confidence for a VERIFIED vote.
fn default_min_confidence() -> f64 {
	0.5
}

/// Alloy-based adapter for EVM-compatible chains.
pub struct EvmAdapter {
	/// The chain this adapter votes for.
	chain: ChainType,
	/// Connection parameters, immutable after construction.
	config: ChainConfig,
	/// Confidence below which the adapter votes REJECTED.
	min_confidence: f64,
	/// Shared deterministic scoring policy.
	scoring: Arc<ScoringService>,
	/// Established provider; None until connect() succeeds.
	provider: RwLock<Option<EvmProvider>>,
	stats: StatsRecorder,
}

impl EvmAdapter {
	/// Creates a new EVM adapter.
	///
	/// Fails if the chain is not EVM-compatible; the connection itself is
	/// only established by [`AdapterInterface::connect`].
	pub fn new(
		chain: ChainType,
		config: ChainConfig,
		min_confidence: f64,
		scoring: Arc<ScoringService>,
	) -> Result<Self, AdapterError> {
		if chain.evm_chain_id().is_none() {
			return Err(AdapterError::Configuration(format!(
				"{} is not an EVM-compatible chain",
				chain
			)));
		}

		Ok(Self {
			chain,
			config,
			min_confidence,
			scoring,
			provider: RwLock::new(None),
			stats: StatsRecorder::new(),
		})
	}

	/// Builds the provider, with a wallet when a signing key is configured.
	fn build_provider(&self, expected_chain_id: u64) -> Result<EvmProvider, AdapterError> {
		let url = self.config.rpc_url.parse().map_err(|e| {
			AdapterError::Configuration(format!(
				"Invalid RPC URL for {}: {}",
				self.chain, e
			))
		})?;

		let provider: EvmProvider = match &self.config.signing_key {
			Some(key) => {
				let signer: PrivateKeySigner = key.with_exposed(|k| {
					k.parse().map_err(|_| {
						AdapterError::Configuration("Invalid signing key format".to_string())
					})
				})?;
				let chain_signer = signer.with_chain_id(Some(expected_chain_id));
				let wallet = EthereumWallet::from(chain_signer);
				Arc::new(
					ProviderBuilder::new()
						.with_recommended_fillers()
						.wallet(wallet)
						.on_http(url),
				)
			},
			None => Arc::new(ProviderBuilder::new().on_http(url)),
		};

		Ok(provider)
	}

	/// Current provider, if connected.
	fn current_provider(&self) -> Option<EvmProvider> {
		self.provider
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	/// Interacts with the chain for one accepted or rejected claim.
	///
	/// Returns the vote status, the proof reference, and gas used by an
	/// on-chain submission when one happened.
	async fn anchor_claim(
		&self,
		provider: &EvmProvider,
		agent_id: &str,
		claim_hash: &str,
		confidence: f64,
	) -> Result<(VerificationStatus, String, Option<u64>), AdapterError> {
		let block_number = provider
			.get_block_number()
			.await
			.map_err(|e| AdapterError::Connection(format!("Failed to get block number: {}", e)))?;

		// Rejections stay local; only accepted claims are published.
		if confidence < self.min_confidence {
			return Ok((
				VerificationStatus::Rejected,
				format!("{}@{}", claim_hash, block_number),
				None,
			));
		}

		let contract = match (&self.config.signing_key, &self.config.contract_address) {
			(Some(_), Some(contract)) => contract,
			// Read-anchored mode: the vote references the content hash and
			// the block it was anchored against.
			_ => {
				return Ok((
					VerificationStatus::Verified,
					format!("{}@{}", claim_hash, block_number),
					None,
				))
			},
		};

		let to: Address = contract.parse().map_err(|e| {
			AdapterError::Configuration(format!("Invalid contract address: {}", e))
		})?;

		// The registry contract ingests raw calldata:
		// keccak(agent_id) || content_hash.
		let mut call_data = Vec::with_capacity(64);
		call_data.extend_from_slice(Keccak256::digest(agent_id.as_bytes()).as_slice());
		let hash_bytes = hex::decode(claim_hash.trim_start_matches("0x"))
			.map_err(|e| AdapterError::Verification(format!("Malformed claim hash: {}", e)))?;
		call_data.extend_from_slice(&hash_bytes);

		let mut request = TransactionRequest::default().to(to).input(call_data.into());
		request.gas = Some(self.config.resource_limit);

		let pending = provider
			.send_transaction(request)
			.await
			.map_err(|e| AdapterError::Verification(format!("Failed to submit claim: {}", e)))?;

		let tx_hash = *pending.tx_hash();
		let tx_display = with_0x_prefix(&hex::encode(tx_hash.0));
		tracing::info!(chain = %self.chain, tx_hash = %tx_display, "Submitted verification claim");

		let proof = format!("{}@{}", claim_hash, tx_display);
		match provider.get_transaction_receipt(tx_hash).await {
			Ok(Some(receipt)) => Ok((
				VerificationStatus::Verified,
				proof,
				Some(receipt.gas_used as u64),
			)),
			// Claim is in flight; the vote stays PENDING until it lands.
			Ok(None) => Ok((VerificationStatus::Pending, proof, None)),
			Err(e) => Err(AdapterError::Verification(format!(
				"Failed to get claim receipt: {}",
				e
			))),
		}
	}
}

/// Configuration schema for the EVM adapter.
pub struct EvmAdapterSchema;

impl ConfigSchema for EvmAdapterSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					Some(url) => Err(format!("rpc_url must be an HTTP endpoint, got '{}'", url)),
					None => Err("rpc_url must be a string".to_string()),
				}
			})],
			vec![
				Field::new("signing_key", FieldType::String),
				Field::new("contract_address", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(addr) if addr.starts_with("0x") && addr.len() == 42 => Ok(()),
						Some(addr) => Err(format!("Invalid contract address: {}", addr)),
						None => Err("contract_address must be a string".to_string()),
					}
				}),
				Field::new(
					"resource_limit",
					FieldType::Integer {
						min: Some(21_000),
						max: None,
					},
				),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"retry_attempts",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"min_confidence",
					FieldType::Float {
						min: Some(0.0),
						max: Some(1.0),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl AdapterInterface for EvmAdapter {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EvmAdapterSchema)
	}

	fn chain_type(&self) -> ChainType {
		self.chain
	}

	async fn connect(&self) -> Result<(), AdapterError> {
		// Idempotent: a connected adapter stays on its provider.
		if self.is_connected() {
			return Ok(());
		}

		let expected = self
			.chain
			.evm_chain_id()
			.ok_or_else(|| AdapterError::Configuration(format!("{} has no EVM chain id", self.chain)))?;
		let provider = self.build_provider(expected)?;

		let per_call = Duration::from_secs(self.config.timeout_seconds);
		let retry_limit = self.config.retry_attempts.max(1);
		let attempts = AtomicU32::new(0);

		let policy = backoff::ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(500))
			.with_max_elapsed_time(Some(per_call.saturating_mul(retry_limit)))
			.build();

		let reported = backoff::future::retry(policy, || async {
			let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
			let result = tokio::time::timeout(per_call, provider.get_chain_id()).await;
			let error = match result {
				Ok(Ok(chain_id)) => return Ok(chain_id),
				Ok(Err(e)) => AdapterError::Connection(format!("Endpoint unreachable: {}", e)),
				Err(_) => AdapterError::Timeout(self.config.timeout_seconds),
			};

			if attempt < retry_limit {
				tracing::warn!(
					chain = %self.chain,
					attempt = attempt,
					error = %error,
					"Connect attempt failed, retrying"
				);
				Err(backoff::Error::transient(error))
			} else {
				Err(backoff::Error::permanent(error))
			}
		})
		.await?;

		if reported != expected {
			return Err(AdapterError::Connection(format!(
				"Endpoint reports chain id {}, expected {} for {}",
				reported, expected, self.chain
			)));
		}

		*self.provider.write().unwrap_or_else(|e| e.into_inner()) = Some(provider);
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.provider
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.is_some()
	}

	async fn verify_ai_output(
		&self,
		agent_id: &str,
		payload: &VerificationPayload,
	) -> Result<VerificationResult, AdapterError> {
		let start = Instant::now();

		let provider = match self.current_provider() {
			Some(provider) => provider,
			None => {
				self.stats.record_failure(0);
				return Err(AdapterError::NotConnected);
			},
		};

		let claim_hash = content_hash(payload);
		let confidence = match self.scoring.score(payload).await {
			Ok(confidence) => confidence,
			Err(e) => {
				self.stats
					.record_failure(start.elapsed().as_millis() as u64);
				return Err(AdapterError::Verification(e.to_string()));
			},
		};

		let per_call = Duration::from_secs(self.config.timeout_seconds);
		let outcome = tokio::time::timeout(
			per_call,
			self.anchor_claim(&provider, agent_id, &claim_hash, confidence),
		)
		.await;

		let elapsed = start.elapsed().as_millis() as u64;
		match outcome {
			Ok(Ok((status, proof, gas_used))) => {
				self.stats.record_success(elapsed, gas_used);
				Ok(VerificationResult {
					chain: self.chain,
					status,
					confidence,
					execution_time_ms: elapsed,
					proof_reference: Some(proof),
					error: None,
				})
			},
			Ok(Err(e)) => {
				self.stats.record_failure(elapsed);
				Err(e)
			},
			Err(_) => {
				self.stats.record_failure(elapsed);
				Err(AdapterError::Timeout(self.config.timeout_seconds))
			},
		}
	}

	fn get_verification_stats(&self) -> VerificationStats {
		self.stats.snapshot()
	}

	async fn disconnect(&self) -> Result<(), AdapterError> {
		*self.provider.write().unwrap_or_else(|e| e.into_inner()) = None;
		Ok(())
	}
}

/// Registry for the Alloy EVM adapter implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm";
	type Factory = AdapterFactory;

	fn factory() -> Self::Factory {
		|chain, config, scoring| -> Result<Box<dyn AdapterInterface>, AdapterError> {
			EvmAdapterSchema
				.validate(config)
				.map_err(|e| AdapterError::Configuration(e.to_string()))?;

			let chain_config = ChainConfig::from_toml(chain, config)
				.map_err(|e| AdapterError::Configuration(e.to_string()))?;

			let min_confidence = config
				.get("min_confidence")
				.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
				.unwrap_or_else(default_min_confidence);

			Ok(Box::new(EvmAdapter::new(
				chain,
				chain_config,
				min_confidence,
				scoring,
			)?))
		}
	}
}

impl AdapterRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use verifier_scoring::implementations::consistency::{
		ConsistencyScoring, ConsistencyScoringConfig,
	};
	use verifier_scoring::ScoringInterface;

	fn scoring() -> Arc<ScoringService> {
		let mut implementations: HashMap<String, Arc<dyn ScoringInterface>> = HashMap::new();
		implementations.insert(
			"consistency".to_string(),
			Arc::new(ConsistencyScoring::new(ConsistencyScoringConfig::default())),
		);
		Arc::new(ScoringService::new(implementations, "consistency".to_string()).unwrap())
	}

	fn chain_config(chain: ChainType) -> ChainConfig {
		ChainConfig {
			chain,
			rpc_url: "http://localhost:8545".to_string(),
			signing_key: None,
			contract_address: None,
			resource_limit: 100_000,
			timeout_seconds: 1,
			retry_attempts: 1,
		}
	}

	#[test]
	fn non_evm_chains_are_rejected_at_construction() {
		let result = EvmAdapter::new(
			ChainType::Solana,
			chain_config(ChainType::Solana),
			0.5,
			scoring(),
		);
		assert!(matches!(result, Err(AdapterError::Configuration(_))));
	}

	#[tokio::test]
	async fn verify_without_connect_is_not_connected() {
		let adapter = EvmAdapter::new(
			ChainType::Ethereum,
			chain_config(ChainType::Ethereum),
			0.5,
			scoring(),
		)
		.unwrap();

		let payload = VerificationPayload {
			model_output: serde_json::json!({"text": "hi"}),
			input_context: serde_json::Value::Null,
			model_metadata: None,
			execution_context: serde_json::Value::Null,
		};

		let result = adapter.verify_ai_output("agent-1", &payload).await;
		assert!(matches!(result, Err(AdapterError::NotConnected)));
		assert_eq!(adapter.get_verification_stats().failed_verifications, 1);
	}

	#[test]
	fn schema_requires_http_rpc_url() {
		let schema = EvmAdapterSchema;

		let missing: toml::Value = toml::from_str("adapter = \"evm\"").unwrap();
		assert!(schema.validate(&missing).is_err());

		let bad_scheme: toml::Value = toml::from_str("rpc_url = \"ws://localhost\"").unwrap();
		assert!(schema.validate(&bad_scheme).is_err());

		let ok: toml::Value = toml::from_str("rpc_url = \"https://rpc.example\"").unwrap();
		assert!(schema.validate(&ok).is_ok());
	}

	#[test]
	fn factory_honors_min_confidence_bounds() {
		let factory = Registry::factory();
		let config: toml::Value = toml::from_str(
			r#"
rpc_url = "http://localhost:8545"
min_confidence = 1.4
"#,
		)
		.unwrap();
		assert!(factory(ChainType::Ethereum, &config, scoring()).is_err());
	}
}
