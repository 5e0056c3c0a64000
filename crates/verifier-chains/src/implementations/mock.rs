//! Mock chain adapter for testing and local development.
//!
//! This adapter never touches a network. It returns a configurable status
//! and confidence after an optional artificial latency, while computing the
//! same deterministic content hash a real adapter would. It is used by the
//! engine tests and by local setups where live chains aren't available.

use crate::{AdapterError, AdapterFactory, AdapterInterface, AdapterRegistry, StatsRecorder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use verifier_types::{
	content_hash, ChainType, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	ValidationError, VerificationPayload, VerificationResult, VerificationStats,
	VerificationStatus,
};

/// Configuration for the mock adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockAdapterConfig {
	/// Status every verification returns.
	#[serde(default = "default_status")]
	pub status: VerificationStatus,
	/// Confidence every verification returns.
	#[serde(default = "default_confidence")]
	pub confidence: f64,
	/// Artificial latency applied to each verification.
	#[serde(default)]
	pub latency_ms: u64,
	/// Whether connect() should fail.
	#[serde(default)]
	pub fail_connect: bool,
	/// Whether verify_ai_output() should fail.
	#[serde(default)]
	pub fail_verify: bool,
	/// Whether disconnect() should fail.
	#[serde(default)]
	pub fail_disconnect: bool,
}

fn default_status() -> VerificationStatus {
	VerificationStatus::Verified
}

fn default_confidence() -> f64 {
	0.9
}

impl Default for MockAdapterConfig {
	fn default() -> Self {
		Self {
			status: default_status(),
			confidence: default_confidence(),
			latency_ms: 0,
			fail_connect: false,
			fail_verify: false,
			fail_disconnect: false,
		}
	}
}

/// Configuration schema for the mock adapter.
pub struct MockAdapterSchema;

impl ConfigSchema for MockAdapterSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("status", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(s) if ["VERIFIED", "REJECTED", "PENDING", "ERROR"].contains(&s) => {
							Ok(())
						},
						Some(s) => Err(format!("Unknown status: {}", s)),
						None => Err("status must be a string".to_string()),
					}
				}),
				Field::new(
					"confidence",
					FieldType::Float {
						min: Some(0.0),
						max: Some(1.0),
					},
				),
				Field::new(
					"latency_ms",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("fail_connect", FieldType::Boolean),
				Field::new("fail_verify", FieldType::Boolean),
				Field::new("fail_disconnect", FieldType::Boolean),
			],
		);

		schema.validate(config)
	}
}

/// In-memory adapter with fully deterministic behavior.
pub struct MockAdapter {
	chain: ChainType,
	config: MockAdapterConfig,
	connected: AtomicBool,
	stats: StatsRecorder,
}

impl MockAdapter {
	/// Creates a new mock adapter for the given chain.
	pub fn new(chain: ChainType, config: MockAdapterConfig) -> Self {
		Self {
			chain,
			config,
			connected: AtomicBool::new(false),
			stats: StatsRecorder::new(),
		}
	}
}

#[async_trait]
impl AdapterInterface for MockAdapter {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockAdapterSchema)
	}

	fn chain_type(&self) -> ChainType {
		self.chain
	}

	async fn connect(&self) -> Result<(), AdapterError> {
		if self.config.fail_connect {
			return Err(AdapterError::Connection(format!(
				"mock endpoint for {} unavailable",
				self.chain
			)));
		}
		self.connected.store(true, Ordering::Release);
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::Acquire)
	}

	async fn verify_ai_output(
		&self,
		agent_id: &str,
		payload: &VerificationPayload,
	) -> Result<VerificationResult, AdapterError> {
		let start = std::time::Instant::now();

		if !self.is_connected() {
			self.stats.record_failure(0);
			return Err(AdapterError::NotConnected);
		}

		if self.config.latency_ms > 0 {
			tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
		}

		let elapsed = start.elapsed().as_millis() as u64;

		if self.config.fail_verify {
			self.stats.record_failure(elapsed);
			return Err(AdapterError::Verification(format!(
				"mock verification failure for agent {}",
				agent_id
			)));
		}

		let proof = content_hash(payload);
		self.stats.record_success(elapsed, None);

		Ok(VerificationResult {
			chain: self.chain,
			status: self.config.status,
			confidence: self.config.confidence,
			execution_time_ms: elapsed,
			proof_reference: Some(proof),
			error: None,
		})
	}

	fn get_verification_stats(&self) -> VerificationStats {
		self.stats.snapshot()
	}

	async fn disconnect(&self) -> Result<(), AdapterError> {
		if self.config.fail_disconnect {
			return Err(AdapterError::Connection(format!(
				"mock disconnect failure for {}",
				self.chain
			)));
		}
		self.connected.store(false, Ordering::Release);
		Ok(())
	}
}

/// Registry for the mock adapter implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = AdapterFactory;

	fn factory() -> Self::Factory {
		|chain, config, _scoring| -> Result<Box<dyn AdapterInterface>, AdapterError> {
			MockAdapterSchema
				.validate(config)
				.map_err(|e| AdapterError::Configuration(e.to_string()))?;

			// The schema validates status as a string; map it by hand so the
			// error message names the field.
			let mut adapter_config: MockAdapterConfig = MockAdapterConfig::default();
			if let Some(table) = config.as_table() {
				if let Some(status) = table.get("status").and_then(|v| v.as_str()) {
					adapter_config.status =
						parse_status(status).map_err(AdapterError::Configuration)?;
				}
				if let Some(confidence) = table.get("confidence").and_then(|v| v.as_float()) {
					adapter_config.confidence = confidence;
				}
				if let Some(latency) = table.get("latency_ms").and_then(|v| v.as_integer()) {
					adapter_config.latency_ms = latency as u64;
				}
				if let Some(flag) = table.get("fail_connect").and_then(|v| v.as_bool()) {
					adapter_config.fail_connect = flag;
				}
				if let Some(flag) = table.get("fail_verify").and_then(|v| v.as_bool()) {
					adapter_config.fail_verify = flag;
				}
				if let Some(flag) = table.get("fail_disconnect").and_then(|v| v.as_bool()) {
					adapter_config.fail_disconnect = flag;
				}
			}

			Ok(Box::new(MockAdapter::new(chain, adapter_config)))
		}
	}
}

impl AdapterRegistry for Registry {}

/// Parses a configuration status string into its wire form.
fn parse_status(s: &str) -> Result<VerificationStatus, String> {
	match s {
		"VERIFIED" => Ok(VerificationStatus::Verified),
		"REJECTED" => Ok(VerificationStatus::Rejected),
		"PENDING" => Ok(VerificationStatus::Pending),
		"ERROR" => Ok(VerificationStatus::Error),
		other => Err(format!("Unknown status: {}", other)),
	}
}
