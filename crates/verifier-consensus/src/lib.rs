//! Consensus engine for the multi-chain verifier system.
//!
//! This module provides the aggregation logic that turns independent
//! per-chain verification votes into a single trust verdict. One request
//! fans out concurrently to every healthy adapter matching its target
//! chains; whatever votes arrive before the timeout are reduced with
//! weighted Byzantine-fault-tolerant aggregation. Per-adapter failures are
//! contained at the adapter boundary and converted to ERROR votes, never
//! unwound as errors through the engine's public call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use verifier_chains::{AdapterFactory, ConnectionManager};
use verifier_config::Config;
use verifier_scoring::{ScoringFactory, ScoringInterface, ScoringService};
use verifier_types::{
	truncate_id, ChainConfig, ChainType, ConsensusConfig, ConsensusResult, ConsensusStats,
	ConsensusStatus, RequestState, VerificationRequest, VerificationResult, VerificationStatus,
};

/// A single chain may carry at most this share of total responding weight
/// before the fault-tolerance guard refuses to verify.
const BFT_MAX_SHARE: f64 = 1.0 / 3.0;

/// Tolerance for comparing weight shares against the BFT bound, so an
/// exact three-way split is not rejected by floating-point noise.
const SHARE_EPSILON: f64 = 1e-9;

/// Errors that can occur during consensus engine operations.
#[derive(Debug, Error)]
pub enum ConsensusError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// Error from one of the engine's collaborating services.
	#[error("Service error: {0}")]
	Service(String),
}

/// Internal engine counters, updated on every terminal transition.
#[derive(Debug, Default)]
struct EngineCounters {
	total_requests: u64,
	verified: u64,
	consensus_failed: u64,
	insufficient_chains: u64,
	total_time_ms: u64,
}

/// Engine that executes verification requests across registered adapters
/// and produces a single consensus verdict per request.
///
/// The engine holds the connection manager by reference; adapter lifecycle
/// (insert/remove) stays with the manager's owner.
pub struct ConsensusEngine {
	/// Consensus policy parameters.
	config: ConsensusConfig,
	/// Registry of chain adapters, owned by the constructing application.
	manager: Arc<ConnectionManager>,
	stats: Mutex<EngineCounters>,
}

impl ConsensusEngine {
	/// Creates a new engine with the given policy and adapter registry.
	///
	/// Policy parameters are validated eagerly: a threshold outside [0, 1]
	/// or a non-positive chain weight is a programmer error and is
	/// rejected here rather than surfacing mid-request.
	pub fn new(
		config: ConsensusConfig,
		manager: Arc<ConnectionManager>,
	) -> Result<Self, ConsensusError> {
		config
			.validate()
			.map_err(|e| ConsensusError::Config(e.to_string()))?;

		Ok(Self {
			config,
			manager,
			stats: Mutex::new(EngineCounters::default()),
		})
	}

	/// Returns the connection manager backing this engine.
	pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
		&self.manager
	}

	/// Executes one verification request and returns its terminal result.
	///
	/// This call never fails for partial chain failures: adapters that
	/// error or time out become ERROR votes and the request still reaches
	/// a terminal state.
	pub async fn verify(&self, request: &VerificationRequest) -> ConsensusResult {
		let started = Instant::now();
		let state = RequestState::Pending;
		tracing::debug!(
			request_id = %truncate_id(&request.id),
			agent_id = %request.agent_id,
			state = %state,
			targets = request.target_chains.len(),
			"Accepted verification request"
		);

		// Step 1: adapters whose chain is both targeted and healthy. Too few
		// qualifying chains fail fast; a consensus over fewer chains than
		// the configured minimum is statistically meaningless.
		let adapters = self.manager.healthy_adapters(&request.target_chains);
		if adapters.len() < self.config.min_participating_chains {
			tracing::warn!(
				request_id = %truncate_id(&request.id),
				qualifying = adapters.len(),
				required = self.config.min_participating_chains,
				"Insufficient qualifying chains"
			);
			return self.finalize(
				request,
				ConsensusStatus::InsufficientChains,
				0.0,
				0.0,
				Vec::new(),
				Vec::new(),
				started,
			);
		}

		// Step 2: concurrent dispatch, bounded by the request-level timeout.
		// A chain that misses the deadline is abandoned; its eventual result
		// is discarded and it votes ERROR.
		let overall = Duration::from_secs(
			request.timeout_seconds.unwrap_or(self.config.timeout_seconds),
		);
		let agent_id = &request.agent_id;
		let payload = &request.payload;

		let calls = adapters.iter().map(|adapter| {
			let adapter = adapter.clone();
			async move {
				let chain = adapter.chain_type();
				let call_started = Instant::now();
				match tokio::time::timeout(overall, adapter.verify_ai_output(agent_id, payload))
					.await
				{
					Ok(Ok(result)) => result,
					Ok(Err(e)) => {
						tracing::warn!(chain = %chain, error = %e, "Adapter vote failed");
						VerificationResult::error(
							chain,
							e.to_string(),
							call_started.elapsed().as_millis() as u64,
						)
					},
					Err(_) => {
						tracing::warn!(chain = %chain, "Adapter did not respond before timeout");
						VerificationResult::error(
							chain,
							format!("No response within {}s", overall.as_secs()),
							call_started.elapsed().as_millis() as u64,
						)
					},
				}
			}
		});
		let results = futures::future::join_all(calls).await;

		let state = RequestState::Aggregating;
		tracing::debug!(
			request_id = %truncate_id(&request.id),
			state = %state,
			collected = results.len(),
			"Aggregating votes"
		);

		self.aggregate(request, results, started)
	}

	/// Steps 3-6: weighted reduction of the collected votes.
	fn aggregate(
		&self,
		request: &VerificationRequest,
		results: Vec<VerificationResult>,
		started: Instant,
	) -> ConsensusResult {
		let responded: Vec<&VerificationResult> =
			results.iter().filter(|r| r.responded()).collect();
		let participating: Vec<ChainType> = responded.iter().map(|r| r.chain).collect();

		// ERROR votes don't count toward participation; a batch can still
		// fall below the minimum after dispatch.
		if responded.len() < self.config.min_participating_chains {
			return self.finalize(
				request,
				ConsensusStatus::InsufficientChains,
				0.0,
				0.0,
				participating,
				results,
				started,
			);
		}

		let total_weight: f64 = responded
			.iter()
			.map(|r| self.config.weight_for(r.chain))
			.sum();
		let verified: Vec<&VerificationResult> = responded
			.iter()
			.copied()
			.filter(|r| r.status == VerificationStatus::Verified)
			.collect();
		let verified_weight: f64 = verified
			.iter()
			.map(|r| self.config.weight_for(r.chain))
			.sum();

		let consensus_score = if total_weight > 0.0 {
			verified_weight / total_weight
		} else {
			0.0
		};
		let average_confidence = if verified.is_empty() {
			0.0
		} else {
			verified.iter().map(|r| r.confidence).sum::<f64>() / verified.len() as f64
		};

		let threshold = request
			.consensus_threshold
			.unwrap_or(self.config.consensus_threshold)
			.clamp(0.0, 1.0);

		// BFT guard: a chain whose weight share exceeds one third of the
		// responding total could swing the verdict alone, so its presence
		// invalidates the quorum regardless of how it voted.
		let bft_satisfied = if self.config.byzantine_fault_tolerance {
			let max_weight = responded
				.iter()
				.map(|r| self.config.weight_for(r.chain))
				.fold(0.0_f64, f64::max);
			let max_share = if total_weight > 0.0 {
				max_weight / total_weight
			} else {
				1.0
			};
			if max_share > BFT_MAX_SHARE + SHARE_EPSILON {
				tracing::warn!(
					request_id = %truncate_id(&request.id),
					max_share = max_share,
					"Single-chain weight share exceeds fault-tolerance bound"
				);
				false
			} else {
				true
			}
		} else {
			true
		};

		let status = if consensus_score >= threshold && bft_satisfied {
			ConsensusStatus::Verified
		} else {
			ConsensusStatus::ConsensusFailed
		};

		self.finalize(
			request,
			status,
			consensus_score,
			average_confidence,
			participating,
			results,
			started,
		)
	}

	/// Terminal transition: updates engine counters and builds the result.
	#[allow(clippy::too_many_arguments)]
	fn finalize(
		&self,
		request: &VerificationRequest,
		status: ConsensusStatus,
		consensus_score: f64,
		average_confidence: f64,
		participating_chains: Vec<ChainType>,
		results: Vec<VerificationResult>,
		started: Instant,
	) -> ConsensusResult {
		let elapsed_ms = started.elapsed().as_millis() as u64;

		{
			let mut counters = self.stats.lock().unwrap_or_else(|e| e.into_inner());
			counters.total_requests += 1;
			counters.total_time_ms += elapsed_ms;
			match status {
				ConsensusStatus::Verified => counters.verified += 1,
				ConsensusStatus::ConsensusFailed => counters.consensus_failed += 1,
				ConsensusStatus::InsufficientChains => counters.insufficient_chains += 1,
			}
		}

		let state = RequestState::Finalized(status);
		tracing::info!(
			request_id = %truncate_id(&request.id),
			state = %state,
			consensus_score = consensus_score,
			participating = participating_chains.len(),
			elapsed_ms = elapsed_ms,
			"Finalized verification request"
		);

		ConsensusResult {
			request_id: request.id.clone(),
			status,
			consensus_score,
			average_confidence,
			participating_chains,
			results,
			elapsed_ms,
		}
	}

	/// Returns engine-level counters.
	///
	/// Reading twice without intervening requests returns identical values.
	pub fn get_consensus_stats(&self) -> ConsensusStats {
		let counters = self.stats.lock().unwrap_or_else(|e| e.into_inner());
		let success_rate = if counters.total_requests > 0 {
			counters.verified as f64 / counters.total_requests as f64
		} else {
			0.0
		};
		let average_consensus_time_ms = if counters.total_requests > 0 {
			counters.total_time_ms as f64 / counters.total_requests as f64
		} else {
			0.0
		};
		ConsensusStats {
			total_requests: counters.total_requests,
			verified: counters.verified,
			consensus_failed: counters.consensus_failed,
			insufficient_chains: counters.insufficient_chains,
			success_rate,
			average_consensus_time_ms,
		}
	}
}

/// Builder for constructing a ConsensusEngine with pluggable implementations.
///
/// The builder uses the factory pattern to allow different adapter and
/// scoring implementations to be plugged in based on configuration. A chain
/// whose adapter cannot be created or connected is skipped with an error
/// log; the remaining chains still come up.
pub struct ConsensusBuilder {
	config: Config,
	adapter_factories: HashMap<String, AdapterFactory>,
	scoring_factories: HashMap<String, ScoringFactory>,
}

impl ConsensusBuilder {
	/// Creates a new ConsensusBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			adapter_factories: HashMap::new(),
			scoring_factories: HashMap::new(),
		}
	}

	/// Adds a factory function for creating chain adapters.
	///
	/// The name parameter should match the `adapter` field in the chain's
	/// configuration block.
	pub fn with_adapter_factory(mut self, name: &str, factory: AdapterFactory) -> Self {
		self.adapter_factories.insert(name.to_string(), factory);
		self
	}

	/// Adds a factory function for creating scoring policies.
	///
	/// The name parameter should match the implementation name in the
	/// scoring configuration section.
	pub fn with_scoring_factory(mut self, name: &str, factory: ScoringFactory) -> Self {
		self.scoring_factories.insert(name.to_string(), factory);
		self
	}

	/// Registers every implementation shipped with the workspace.
	pub fn with_default_implementations(mut self) -> Self {
		for (name, factory) in verifier_chains::get_all_implementations() {
			self.adapter_factories.insert(name.to_string(), factory);
		}
		for (name, factory) in verifier_scoring::get_all_implementations() {
			self.scoring_factories.insert(name.to_string(), factory);
		}
		self
	}

	/// Builds the ConsensusEngine using the configured factories.
	///
	/// This method:
	/// 1. Creates the scoring service from the configured policy
	/// 2. Creates one adapter per configured chain and registers it with
	///    the connection manager (connect failures register unhealthy)
	/// 3. Validates the consensus policy and returns the engine
	pub async fn build(self) -> Result<ConsensusEngine, ConsensusError> {
		// Create scoring implementations
		let mut scoring_impls: HashMap<String, Arc<dyn ScoringInterface>> = HashMap::new();
		for (name, impl_config) in &self.config.scoring.implementations {
			if let Some(factory) = self.scoring_factories.get(name) {
				match factory(impl_config) {
					Ok(implementation) => {
						scoring_impls.insert(name.clone(), Arc::from(implementation));
						tracing::info!(component = "scoring", implementation = %name, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "scoring",
							implementation = %name,
							error = %e,
							"Failed to create scoring implementation, skipping"
						);
					},
				}
			}
		}

		// The primary policy may be referenced without its own config block;
		// instantiate it with defaults in that case.
		let primary = self.config.scoring.primary.clone();
		if !scoring_impls.contains_key(&primary) {
			if let Some(factory) = self.scoring_factories.get(&primary) {
				let empty = toml::Value::Table(toml::map::Map::new());
				let implementation = factory(&empty)
					.map_err(|e| ConsensusError::Config(e.to_string()))?;
				scoring_impls.insert(primary.clone(), Arc::from(implementation));
				tracing::info!(component = "scoring", implementation = %primary, "Loaded");
			}
		}

		let scoring = Arc::new(
			ScoringService::new(scoring_impls, primary)
				.map_err(|e| ConsensusError::Config(e.to_string()))?,
		);

		// Create and register chain adapters
		let manager = Arc::new(ConnectionManager::new());
		for (chain, block) in self.config.chain_entries() {
			let impl_name = block
				.get("adapter")
				.and_then(|v| v.as_str())
				.unwrap_or("evm");

			let factory = match self.adapter_factories.get(impl_name) {
				Some(factory) => factory,
				None => {
					tracing::error!(
						component = "adapter",
						implementation = %impl_name,
						chain = %chain,
						"No factory registered for adapter implementation, skipping"
					);
					continue;
				},
			};

			match factory(chain, block, scoring.clone()) {
				Ok(adapter) => {
					// Validate the configuration using the adapter's schema
					match adapter.config_schema().validate(block) {
						Ok(()) => {
							let chain_config = match ChainConfig::from_toml(chain, block) {
								Ok(config) => config,
								Err(e) => {
									tracing::error!(
										component = "adapter",
										chain = %chain,
										error = %e,
										"Invalid chain configuration, skipping"
									);
									continue;
								},
							};
							let healthy = manager
								.add_chain_adapter(Arc::from(adapter), chain_config)
								.await;
							tracing::info!(
								component = "adapter",
								implementation = %impl_name,
								chain = %chain,
								healthy = healthy,
								"Loaded"
							);
						},
						Err(e) => {
							tracing::error!(
								component = "adapter",
								implementation = %impl_name,
								chain = %chain,
								error = %e,
								"Invalid configuration for adapter, skipping"
							);
						},
					}
				},
				Err(e) => {
					tracing::error!(
						component = "adapter",
						implementation = %impl_name,
						chain = %chain,
						error = %e,
						"Failed to create adapter, skipping"
					);
				},
			}
		}

		if manager.adapter_count() == 0 {
			tracing::warn!(
				"No chain adapters available - the engine cannot reach consensus on any request"
			);
		}

		ConsensusEngine::new(self.config.consensus.clone(), manager)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use verifier_chains::implementations::mock::{MockAdapter, MockAdapterConfig};
	use verifier_chains::AdapterInterface;
	use verifier_types::{ChainConfig, VerificationPayload, VerificationStatus};

	fn payload() -> VerificationPayload {
		VerificationPayload {
			model_output: serde_json::json!({"text": "the model said a thing"}),
			input_context: serde_json::json!({"prompt": "say a thing"}),
			model_metadata: None,
			execution_context: serde_json::Value::Null,
		}
	}

	fn request(targets: Vec<ChainType>) -> VerificationRequest {
		VerificationRequest::new("agent-under-test", payload(), targets)
	}

	fn chain_config(chain: ChainType) -> ChainConfig {
		ChainConfig {
			chain,
			rpc_url: "mock://local".to_string(),
			signing_key: None,
			contract_address: None,
			resource_limit: 100_000,
			timeout_seconds: 5,
			retry_attempts: 1,
		}
	}

	fn verified_with(confidence: f64) -> MockAdapterConfig {
		MockAdapterConfig {
			status: VerificationStatus::Verified,
			confidence,
			..Default::default()
		}
	}

	fn rejected() -> MockAdapterConfig {
		MockAdapterConfig {
			status: VerificationStatus::Rejected,
			confidence: 0.2,
			..Default::default()
		}
	}

	async fn engine_with(
		adapters: Vec<(ChainType, MockAdapterConfig)>,
		config: ConsensusConfig,
	) -> ConsensusEngine {
		let manager = Arc::new(ConnectionManager::new());
		for (chain, adapter_config) in adapters {
			let adapter: Arc<dyn AdapterInterface> =
				Arc::new(MockAdapter::new(chain, adapter_config));
			manager
				.add_chain_adapter(adapter, chain_config(chain))
				.await;
		}
		ConsensusEngine::new(config, manager).unwrap()
	}

	fn weighted_config() -> ConsensusConfig {
		let mut config = ConsensusConfig {
			min_participating_chains: 2,
			consensus_threshold: 0.67,
			timeout_seconds: 5,
			byzantine_fault_tolerance: false,
			weighted_voting: true,
			chain_weights: HashMap::new(),
		};
		config.chain_weights.insert(ChainType::Ethereum, 1.0);
		config.chain_weights.insert(ChainType::Polygon, 0.8);
		config.chain_weights.insert(ChainType::Arbitrum, 0.9);
		config
	}

	const TARGETS: [ChainType; 3] = [
		ChainType::Ethereum,
		ChainType::Polygon,
		ChainType::Arbitrum,
	];

	#[tokio::test]
	async fn unanimous_weighted_agreement_verifies() {
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, verified_with(0.85)),
				(ChainType::Arbitrum, verified_with(0.92)),
			],
			weighted_config(),
		)
		.await;

		let result = engine.verify(&request(TARGETS.to_vec())).await;
		assert_eq!(result.status, ConsensusStatus::Verified);
		assert_eq!(result.consensus_score, 1.0);
		assert!((result.average_confidence - 0.89).abs() < 0.01);
		assert_eq!(result.participating_chains.len(), 3);
	}

	#[tokio::test]
	async fn error_votes_do_not_count_toward_participation() {
		// Two of three chains fail outright; the lone responder is below
		// the minimum, so the verdict is INSUFFICIENT_CHAINS rather than a
		// consensus over one vote.
		let failing = MockAdapterConfig {
			fail_verify: true,
			..Default::default()
		};
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, failing.clone()),
				(ChainType::Arbitrum, failing),
			],
			weighted_config(),
		)
		.await;

		let result = engine.verify(&request(TARGETS.to_vec())).await;
		assert_eq!(result.status, ConsensusStatus::InsufficientChains);
		assert_eq!(result.participating_chains, vec![ChainType::Ethereum]);
		// Every chain still produced a terminal vote.
		assert_eq!(result.results.len(), 3);
	}

	#[tokio::test]
	async fn weighted_disagreement_below_threshold_fails() {
		// (0.8 + 0.9) / (1.0 + 0.8 + 0.9) ≈ 0.63 < 0.67
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, rejected()),
				(ChainType::Polygon, verified_with(0.85)),
				(ChainType::Arbitrum, verified_with(0.92)),
			],
			weighted_config(),
		)
		.await;

		let result = engine.verify(&request(TARGETS.to_vec())).await;
		assert_eq!(result.status, ConsensusStatus::ConsensusFailed);
		assert!((result.consensus_score - 0.6296).abs() < 0.001);
		assert_eq!(result.participating_chains.len(), 3);
	}

	#[tokio::test]
	async fn dominant_chain_share_trips_bft_guard() {
		// Both chains agree and the raw score clears the threshold, but
		// Ethereum's weight share is 1.0/1.8 ≈ 0.56 > 1/3.
		let mut config = weighted_config();
		config.byzantine_fault_tolerance = true;
		config.consensus_threshold = 0.5;

		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, verified_with(0.9)),
			],
			config,
		)
		.await;

		let result = engine
			.verify(&request(vec![ChainType::Ethereum, ChainType::Polygon]))
			.await;
		assert_eq!(result.status, ConsensusStatus::ConsensusFailed);
		assert_eq!(result.consensus_score, 1.0);
	}

	#[tokio::test]
	async fn single_chain_can_never_verify_under_bft() {
		let config = ConsensusConfig {
			min_participating_chains: 1,
			consensus_threshold: 0.0,
			byzantine_fault_tolerance: true,
			..Default::default()
		};
		let engine = engine_with(vec![(ChainType::Ethereum, verified_with(1.0))], config).await;

		let result = engine.verify(&request(vec![ChainType::Ethereum])).await;
		assert_eq!(result.consensus_score, 1.0);
		assert_eq!(result.status, ConsensusStatus::ConsensusFailed);
	}

	#[tokio::test]
	async fn equal_three_way_split_passes_bft() {
		let config = ConsensusConfig {
			min_participating_chains: 3,
			consensus_threshold: 0.6,
			byzantine_fault_tolerance: true,
			weighted_voting: false,
			..Default::default()
		};
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.8)),
				(ChainType::Polygon, verified_with(0.8)),
				(ChainType::Arbitrum, verified_with(0.8)),
			],
			config,
		)
		.await;

		let result = engine.verify(&request(TARGETS.to_vec())).await;
		assert_eq!(result.status, ConsensusStatus::Verified);
	}

	#[tokio::test]
	async fn unhealthy_adapters_fail_fast_before_dispatch() {
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(
					ChainType::Polygon,
					MockAdapterConfig {
						fail_connect: true,
						..Default::default()
					},
				),
			],
			weighted_config(),
		)
		.await;

		let result = engine
			.verify(&request(vec![ChainType::Ethereum, ChainType::Polygon]))
			.await;
		assert_eq!(result.status, ConsensusStatus::InsufficientChains);
		// Nothing was dispatched.
		assert!(result.results.is_empty());
	}

	#[tokio::test]
	async fn slow_adapters_become_error_votes_not_failures() {
		let config = ConsensusConfig {
			min_participating_chains: 2,
			consensus_threshold: 0.5,
			timeout_seconds: 1,
			byzantine_fault_tolerance: false,
			weighted_voting: false,
			chain_weights: HashMap::new(),
		};
		let slow = MockAdapterConfig {
			latency_ms: 5_000,
			..verified_with(0.9)
		};
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, verified_with(0.85)),
				(ChainType::Arbitrum, slow),
			],
			config,
		)
		.await;

		let result = engine.verify(&request(TARGETS.to_vec())).await;
		// The slow chain is abandoned at the timeout and its vote is ERROR;
		// the two responders are enough to verify.
		assert_eq!(result.status, ConsensusStatus::Verified);
		assert_eq!(result.participating_chains.len(), 2);
		assert_eq!(result.consensus_score, 1.0);
		let errored: Vec<_> = result
			.results
			.iter()
			.filter(|r| r.status == VerificationStatus::Error)
			.collect();
		assert_eq!(errored.len(), 1);
		assert_eq!(errored[0].chain, ChainType::Arbitrum);
	}

	#[tokio::test]
	async fn consensus_score_stays_in_unit_interval() {
		let mut config = weighted_config();
		config.chain_weights.insert(ChainType::Ethereum, 12.5);
		config.min_participating_chains = 1;
		config.byzantine_fault_tolerance = false;

		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, rejected()),
			],
			config,
		)
		.await;

		let result = engine
			.verify(&request(vec![ChainType::Ethereum, ChainType::Polygon]))
			.await;
		assert!((0.0..=1.0).contains(&result.consensus_score));
	}

	#[tokio::test]
	async fn request_threshold_overrides_engine_threshold() {
		let mut config = weighted_config();
		config.weighted_voting = false;
		config.byzantine_fault_tolerance = false;
		config.consensus_threshold = 0.6;

		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, verified_with(0.9)),
				(ChainType::Arbitrum, rejected()),
			],
			config,
		)
		.await;

		// 2/3 agreement clears the engine's 0.6 but not the request's 0.9.
		let mut strict = request(TARGETS.to_vec());
		strict.consensus_threshold = Some(0.9);
		let result = engine.verify(&strict).await;
		assert_eq!(result.status, ConsensusStatus::ConsensusFailed);

		let lenient = request(TARGETS.to_vec());
		let result = engine.verify(&lenient).await;
		assert_eq!(result.status, ConsensusStatus::Verified);
	}

	#[tokio::test]
	async fn engine_counters_track_every_terminal_transition() {
		let engine = engine_with(
			vec![
				(ChainType::Ethereum, verified_with(0.9)),
				(ChainType::Polygon, verified_with(0.85)),
			],
			ConsensusConfig {
				min_participating_chains: 2,
				consensus_threshold: 0.5,
				byzantine_fault_tolerance: false,
				..Default::default()
			},
		)
		.await;

		engine.verify(&request(vec![ChainType::Ethereum, ChainType::Polygon])).await;
		// Target set misses Polygon, so this one is insufficient.
		engine.verify(&request(vec![ChainType::Ethereum])).await;

		let stats = engine.get_consensus_stats();
		assert_eq!(stats.total_requests, 2);
		assert_eq!(stats.verified, 1);
		assert_eq!(stats.insufficient_chains, 1);
		assert_eq!(stats.success_rate, 0.5);

		// Idempotent without intervening requests.
		assert_eq!(engine.get_consensus_stats(), stats);
	}

	#[tokio::test]
	async fn invalid_policy_is_rejected_at_construction() {
		let manager = Arc::new(ConnectionManager::new());
		let config = ConsensusConfig {
			consensus_threshold: 2.0,
			..Default::default()
		};
		assert!(matches!(
			ConsensusEngine::new(config, manager),
			Err(ConsensusError::Config(_))
		));
	}

	#[tokio::test]
	async fn builder_wires_adapters_and_scoring_from_config() {
		let config: Config = r#"
[verifier]
id = "builder-test"

[chains.ethereum]
adapter = "mock"
confidence = 0.9

[chains.polygon]
adapter = "mock"
confidence = 0.8

[consensus]
min_participating_chains = 2
consensus_threshold = 0.5
byzantine_fault_tolerance = false

[scoring]
primary = "consistency"
"#
		.parse()
		.unwrap();

		let engine = ConsensusBuilder::new(config)
			.with_default_implementations()
			.build()
			.await
			.unwrap();

		assert_eq!(engine.connection_manager().adapter_count(), 2);

		let result = engine
			.verify(&request(vec![ChainType::Ethereum, ChainType::Polygon]))
			.await;
		assert_eq!(result.status, ConsensusStatus::Verified);

		let perf = engine.connection_manager().get_performance_stats();
		assert_eq!(perf.total_adapters, 2);
		assert_eq!(perf.healthy_adapters, 2);
	}
}
