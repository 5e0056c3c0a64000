//! Consensus policy and aggregated result types.
//!
//! This module defines the engine-level policy parameters, the per-request
//! lifecycle state, and the aggregated verdict returned to callers.

use crate::{ChainType, ValidationError, VerificationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Policy parameters for the consensus engine.
///
/// Set once at engine construction. Invariant: all configured weights are
/// positive when weighted voting is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
	/// Minimum number of responding chains required for a meaningful verdict.
	#[serde(default = "default_min_participating_chains")]
	pub min_participating_chains: usize,
	/// Fraction of weighted agreement required to verify, in [0, 1].
	#[serde(default = "default_consensus_threshold")]
	pub consensus_threshold: f64,
	/// Overall per-request timeout in seconds.
	#[serde(default = "default_consensus_timeout")]
	pub timeout_seconds: u64,
	/// Whether the single-chain-dominance guard is enforced.
	#[serde(default = "default_true")]
	pub byzantine_fault_tolerance: bool,
	/// Whether chain votes are scaled by their configured weights.
	#[serde(default = "default_true")]
	pub weighted_voting: bool,
	/// Per-chain vote weights. Chains not listed default to 1.0.
	#[serde(default)]
	pub chain_weights: HashMap<ChainType, f64>,
}

/// Returns the default minimum number of participating chains.
fn default_min_participating_chains() -> usize {
	2
}

/// Returns the default consensus threshold.
fn default_consensus_threshold() -> f64 {
	0.67
}

/// Returns the default per-request timeout in seconds.
fn default_consensus_timeout() -> u64 {
	30
}

fn default_true() -> bool {
	true
}

impl Default for ConsensusConfig {
	fn default() -> Self {
		Self {
			min_participating_chains: default_min_participating_chains(),
			consensus_threshold: default_consensus_threshold(),
			timeout_seconds: default_consensus_timeout(),
			byzantine_fault_tolerance: true,
			weighted_voting: true,
			chain_weights: HashMap::new(),
		}
	}
}

impl ConsensusConfig {
	/// Effective vote weight for a chain.
	///
	/// Returns 1.0 for every chain when weighted voting is disabled, and
	/// for chains without a configured weight.
	pub fn weight_for(&self, chain: ChainType) -> f64 {
		if !self.weighted_voting {
			return 1.0;
		}
		self.chain_weights.get(&chain).copied().unwrap_or(1.0)
	}

	/// Validates policy parameters.
	///
	/// These are programmer errors, not runtime conditions, so they are
	/// rejected eagerly at engine construction time.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if !(0.0..=1.0).contains(&self.consensus_threshold) {
			return Err(ValidationError::InvalidValue {
				field: "consensus_threshold".to_string(),
				message: format!("must be in [0, 1], got {}", self.consensus_threshold),
			});
		}
		if self.min_participating_chains == 0 {
			return Err(ValidationError::InvalidValue {
				field: "min_participating_chains".to_string(),
				message: "must be at least 1".to_string(),
			});
		}
		if self.timeout_seconds == 0 {
			return Err(ValidationError::InvalidValue {
				field: "timeout_seconds".to_string(),
				message: "must be positive".to_string(),
			});
		}
		if self.weighted_voting {
			for (chain, weight) in &self.chain_weights {
				if !weight.is_finite() || *weight <= 0.0 {
					return Err(ValidationError::InvalidValue {
						field: format!("chain_weights.{}", chain),
						message: format!("weights must be positive, got {}", weight),
					});
				}
			}
		}
		Ok(())
	}
}

/// Terminal verdict of one consensus run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStatus {
	/// Weighted agreement cleared the threshold (and the BFT guard, when
	/// enabled).
	Verified,
	/// Enough chains participated but agreement fell short.
	ConsensusFailed,
	/// Fewer qualifying chains than the configured minimum; no aggregation
	/// was attempted or too few chains responded.
	InsufficientChains,
}

impl fmt::Display for ConsensusStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConsensusStatus::Verified => "VERIFIED",
			ConsensusStatus::ConsensusFailed => "CONSENSUS_FAILED",
			ConsensusStatus::InsufficientChains => "INSUFFICIENT_CHAINS",
		};
		f.write_str(s)
	}
}

/// Per-request lifecycle state.
///
/// Requests move from `Pending` through `Aggregating` into one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
	/// Request accepted, adapters being queried.
	Pending,
	/// All reachable adapters have responded or timed out.
	Aggregating,
	/// Terminal state with the final verdict.
	Finalized(ConsensusStatus),
}

impl fmt::Display for RequestState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestState::Pending => f.write_str("PENDING"),
			RequestState::Aggregating => f.write_str("AGGREGATING"),
			RequestState::Finalized(status) => write!(f, "{}", status),
		}
	}
}

/// Aggregated outcome of one verification request.
///
/// Derived, never mutated after computation; lifetime bounded to the
/// request that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
	/// The request this verdict belongs to.
	pub request_id: String,
	/// Terminal status.
	pub status: ConsensusStatus,
	/// Weighted fraction of responding chains that verified, in [0, 1].
	pub consensus_score: f64,
	/// Mean confidence among VERIFIED responses; 0.0 when none verified.
	pub average_confidence: f64,
	/// Chains whose result counted as a response.
	pub participating_chains: Vec<ChainType>,
	/// The individual votes collected before the timeout.
	pub results: Vec<VerificationResult>,
	/// Wall-clock time the whole request took, in milliseconds.
	pub elapsed_ms: u64,
}

/// Engine-level counters, updated on every terminal transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusStats {
	/// Total requests submitted to the engine.
	pub total_requests: u64,
	/// Requests that reached VERIFIED.
	pub verified: u64,
	/// Requests that reached CONSENSUS_FAILED.
	pub consensus_failed: u64,
	/// Requests that reached INSUFFICIENT_CHAINS.
	pub insufficient_chains: u64,
	/// Fraction of requests that reached VERIFIED, in [0, 1].
	pub success_rate: f64,
	/// Average time to a terminal state, in milliseconds.
	pub average_consensus_time_ms: f64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_is_valid() {
		assert!(ConsensusConfig::default().validate().is_ok());
	}

	#[test]
	fn threshold_outside_unit_interval_is_rejected() {
		let config = ConsensusConfig {
			consensus_threshold: 1.5,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn zero_weight_is_rejected_when_weighted_voting_enabled() {
		let mut config = ConsensusConfig::default();
		config.chain_weights.insert(ChainType::Ethereum, 0.0);
		assert!(config.validate().is_err());

		// The same weights are fine once weighted voting is off.
		config.weighted_voting = false;
		assert!(config.validate().is_ok());
	}

	#[test]
	fn unlisted_chains_default_to_unit_weight() {
		let mut config = ConsensusConfig::default();
		config.chain_weights.insert(ChainType::Polygon, 0.8);
		assert_eq!(config.weight_for(ChainType::Polygon), 0.8);
		assert_eq!(config.weight_for(ChainType::Ethereum), 1.0);

		config.weighted_voting = false;
		assert_eq!(config.weight_for(ChainType::Polygon), 1.0);
	}
}
