//! Verification request and result types for the verifier system.
//!
//! This module defines the unit of work submitted for cross-chain
//! confirmation, the per-chain outcome produced by each adapter, and the
//! cumulative statistics adapters expose for monitoring.

use crate::{current_timestamp, ChainType};
use serde::{Deserialize, Serialize};

/// Metadata describing the model that produced the output under verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
	/// Model name, e.g. "gpt-4" or "claude-3".
	pub model_name: String,
	/// Model version string, if the caller knows it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model_version: Option<String>,
	/// Provider that served the model.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
	/// Output length in characters as stated by the caller.
	///
	/// Scoring policies compare this against the length actually observed
	/// in the payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub declared_output_length: Option<u64>,
}

/// Opaque AI-output payload submitted for verification.
///
/// The output and context sections are arbitrary JSON owned by the caller;
/// the verifier only hashes them and inspects them through the scoring
/// policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationPayload {
	/// The model output being verified.
	pub model_output: serde_json::Value,
	/// The input/prompt context the output was produced from.
	#[serde(default)]
	pub input_context: serde_json::Value,
	/// Metadata about the producing model.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub model_metadata: Option<ModelMetadata>,
	/// Execution context (runtime, sampling parameters, trace ids).
	#[serde(default)]
	pub execution_context: serde_json::Value,
}

/// A unit of verification work.
///
/// Created once by the caller, immutable, consumed by the consensus engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
	/// Unique identifier for this request.
	pub id: String,
	/// Identifier of the AI agent whose output is being verified.
	pub agent_id: String,
	/// The payload to verify.
	pub payload: VerificationPayload,
	/// The set of chains the request should be confirmed on.
	pub target_chains: Vec<ChainType>,
	/// Per-request consensus threshold override, fraction in [0, 1].
	///
	/// Falls back to the engine's configured threshold when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub consensus_threshold: Option<f64>,
	/// Per-request overall timeout override in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_seconds: Option<u64>,
	/// Timestamp when this request was created.
	pub created_at: u64,
}

impl VerificationRequest {
	/// Creates a new request with a generated id and creation timestamp.
	pub fn new(
		agent_id: impl Into<String>,
		payload: VerificationPayload,
		target_chains: Vec<ChainType>,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			agent_id: agent_id.into(),
			payload,
			target_chains,
			consensus_threshold: None,
			timeout_seconds: None,
			created_at: current_timestamp(),
		}
	}
}

/// Per-chain verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
	/// The chain accepted the verification claim.
	Verified,
	/// The chain rejected the claim.
	Rejected,
	/// The claim was submitted but is not yet final on the chain.
	Pending,
	/// The adapter could not produce a vote (timeout, transport failure,
	/// not connected). Error votes are excluded from consensus arithmetic.
	Error,
}

/// Outcome of one adapter's verification of one request.
///
/// Produced once per adapter per request; read-only after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
	/// The chain that produced this result.
	pub chain: ChainType,
	/// Verification status on that chain.
	pub status: VerificationStatus,
	/// Confidence score in [0, 1] from the scoring policy.
	pub confidence: f64,
	/// Wall-clock time the verification took, in milliseconds.
	pub execution_time_ms: u64,
	/// Reference to the on-chain proof artifact (content hash, and the
	/// transaction hash when the claim was submitted on-chain).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub proof_reference: Option<String>,
	/// Failure description when status is ERROR.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl VerificationResult {
	/// Builds an ERROR-status result for a chain that could not vote.
	pub fn error(chain: ChainType, message: impl Into<String>, execution_time_ms: u64) -> Self {
		Self {
			chain,
			status: VerificationStatus::Error,
			confidence: 0.0,
			execution_time_ms,
			proof_reference: None,
			error: Some(message.into()),
		}
	}

	/// True when this result counts as a response in consensus arithmetic.
	pub fn responded(&self) -> bool {
		self.status != VerificationStatus::Error
	}
}

/// Cumulative per-adapter verification counters.
///
/// Monotonically non-decreasing until the adapter is reset. Snapshots are
/// cheap to clone and safe to expose to monitoring collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationStats {
	/// Total verifications attempted.
	pub total_verifications: u64,
	/// Verifications that produced a non-ERROR result.
	pub successful_verifications: u64,
	/// Verifications that failed or timed out.
	pub failed_verifications: u64,
	/// Total gas/resource units consumed by on-chain submissions.
	pub total_gas_used: u64,
	/// Average gas/resource units per successful verification.
	pub average_gas_used: f64,
	/// Fraction of attempts that succeeded, in [0, 1].
	pub success_rate: f64,
	/// Average verification latency in milliseconds.
	pub average_latency_ms: f64,
}

/// Aggregate health and throughput view across all registered adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
	/// Number of registered adapters.
	pub total_adapters: usize,
	/// Adapters currently connected and healthy.
	pub healthy_adapters: usize,
	/// Adapters registered but unhealthy.
	pub unhealthy_adapters: usize,
	/// Total verifications attempted across all adapters.
	pub total_verifications: u64,
	/// Successful verifications across all adapters.
	pub successful_verifications: u64,
	/// Failed verifications across all adapters.
	pub failed_verifications: u64,
	/// Fraction of attempts that succeeded, in [0, 1].
	pub success_rate: f64,
	/// Average verification latency across adapters, in milliseconds.
	pub average_latency_ms: f64,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn payload() -> VerificationPayload {
		VerificationPayload {
			model_output: serde_json::json!({"text": "hello"}),
			input_context: serde_json::Value::Null,
			model_metadata: None,
			execution_context: serde_json::Value::Null,
		}
	}

	#[test]
	fn new_request_gets_unique_id_and_timestamp() {
		let a = VerificationRequest::new("agent-1", payload(), vec![ChainType::Ethereum]);
		let b = VerificationRequest::new("agent-1", payload(), vec![ChainType::Ethereum]);
		assert_ne!(a.id, b.id);
		assert!(a.created_at > 0);
	}

	#[test]
	fn error_results_do_not_count_as_responses() {
		let err = VerificationResult::error(ChainType::Polygon, "timeout", 30_000);
		assert!(!err.responded());
		assert_eq!(err.status, VerificationStatus::Error);
		assert_eq!(err.confidence, 0.0);

		let ok = VerificationResult {
			chain: ChainType::Polygon,
			status: VerificationStatus::Rejected,
			confidence: 0.2,
			execution_time_ms: 12,
			proof_reference: None,
			error: None,
		};
		assert!(ok.responded());
	}
}
