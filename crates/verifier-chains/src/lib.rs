//! Chain adapter module for the multi-chain verifier system.
//!
//! This module defines the boundary between the consensus engine and
//! individual blockchains. Each adapter translates a generic verification
//! request into a chain-specific interaction and normalizes the chain's
//! response into a [`VerificationResult`]. The [`ConnectionManager`] owns
//! the adapter registry and supervises adapter health so one failing chain
//! never blocks verification through the others.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use verifier_scoring::ScoringService;
use verifier_types::{
	ChainConfig, ChainType, ConfigSchema, ImplementationRegistry, PerformanceStats,
	VerificationPayload, VerificationResult, VerificationStats,
};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod mock;
}

/// Errors that can occur during chain adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
	/// Error that occurs when the adapter cannot reach its configured endpoint.
	#[error("Connection error: {0}")]
	Connection(String),
	/// Error that occurs when a verification interaction fails.
	#[error("Verification failed: {0}")]
	Verification(String),
	/// Error that occurs when the chain does not respond within the
	/// configured timeout.
	#[error("Timeout after {0}s")]
	Timeout(u64),
	/// Error that occurs when verification is attempted before connect().
	#[error("Adapter not connected")]
	NotConnected,
	/// Error that occurs when adapter configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for chain adapters.
///
/// This trait must be implemented by any adapter that wants to integrate
/// with the verifier system. The capability set is fixed: connect,
/// connection observation, verification, statistics, and teardown.
/// Adapters are selected by their [`ChainType`] tag at registration time.
#[async_trait]
pub trait AdapterInterface: Send + Sync {
	/// Returns the configuration schema for this adapter implementation.
	///
	/// This allows each implementation to define its own configuration
	/// requirements with specific validation rules. The schema is used to
	/// validate TOML configuration before initializing the adapter.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The chain this adapter is configured for.
	fn chain_type(&self) -> ChainType;

	/// Establishes the adapter's connection to its configured endpoint.
	///
	/// Idempotent: repeated calls while already connected are no-ops.
	/// Fails with a connection error if the endpoint is unreachable or
	/// reports an unexpected chain id.
	async fn connect(&self) -> Result<(), AdapterError>;

	/// Whether the adapter currently holds an established connection.
	///
	/// Starts false until [`AdapterInterface::connect`] succeeds.
	fn is_connected(&self) -> bool;

	/// Verifies an AI output payload on this adapter's chain.
	///
	/// Computes the deterministic content hash of the payload (the
	/// on-chain claim reference) and a confidence score through the
	/// injected scoring policy. A successful call may incur a real
	/// on-chain write; it must not be retried blindly.
	///
	/// Fails with [`AdapterError::NotConnected`] if not connected, or
	/// [`AdapterError::Timeout`] if the chain does not respond in time.
	/// Both count toward the adapter's failure statistics.
	async fn verify_ai_output(
		&self,
		agent_id: &str,
		payload: &VerificationPayload,
	) -> Result<VerificationResult, AdapterError>;

	/// Returns cumulative verification counters for this adapter.
	///
	/// Counters are monotonically non-decreasing until adapter reset.
	fn get_verification_stats(&self) -> VerificationStats;

	/// Releases the adapter's connection.
	///
	/// Idempotent like connect; a disconnected adapter reports
	/// `is_connected() == false` afterwards.
	async fn disconnect(&self) -> Result<(), AdapterError>;
}

/// Type alias for adapter factory functions.
///
/// This is the function signature that all adapter implementations must
/// provide to create instances of their adapter interface. The scoring
/// service is injected so confidence scoring stays a single shared policy.
pub type AdapterFactory = fn(
	ChainType,
	&toml::Value,
	Arc<ScoringService>,
) -> Result<Box<dyn AdapterInterface>, AdapterError>;

/// Registry trait for adapter implementations.
///
/// This trait extends the base ImplementationRegistry to specify that
/// adapter implementations must provide an AdapterFactory.
pub trait AdapterRegistry: ImplementationRegistry<Factory = AdapterFactory> {}

/// Get all registered adapter implementations.
///
/// Returns a vector of (name, factory) tuples for all available adapter
/// implementations. This is used by the builder to wire adapters from
/// configuration.
pub fn get_all_implementations() -> Vec<(&'static str, AdapterFactory)> {
	use implementations::{evm, mock};

	vec![
		(evm::alloy::Registry::NAME, evm::alloy::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Raw counters behind a [`StatsRecorder`].
#[derive(Debug, Default)]
struct RawStats {
	total: u64,
	successful: u64,
	failed: u64,
	gas_total: u64,
	gas_samples: u64,
	latency_total_ms: u64,
}

/// Single-writer counter set shared by adapter implementations.
///
/// Each adapter owns exactly one recorder and is the only writer to it
/// during its own calls; snapshots are taken by monitoring readers.
#[derive(Debug, Default)]
pub struct StatsRecorder {
	inner: Mutex<RawStats>,
}

impl StatsRecorder {
	/// Creates an empty recorder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a verification that produced a vote.
	pub fn record_success(&self, latency_ms: u64, gas_used: Option<u64>) {
		let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		stats.total += 1;
		stats.successful += 1;
		stats.latency_total_ms += latency_ms;
		if let Some(gas) = gas_used {
			stats.gas_total += gas;
			stats.gas_samples += 1;
		}
	}

	/// Records a verification that failed or timed out.
	pub fn record_failure(&self, latency_ms: u64) {
		let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		stats.total += 1;
		stats.failed += 1;
		stats.latency_total_ms += latency_ms;
	}

	/// Takes a consistent snapshot of the counters.
	pub fn snapshot(&self) -> VerificationStats {
		let stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
		let average_gas_used = if stats.gas_samples > 0 {
			stats.gas_total as f64 / stats.gas_samples as f64
		} else {
			0.0
		};
		let success_rate = if stats.total > 0 {
			stats.successful as f64 / stats.total as f64
		} else {
			0.0
		};
		let average_latency_ms = if stats.total > 0 {
			stats.latency_total_ms as f64 / stats.total as f64
		} else {
			0.0
		};
		VerificationStats {
			total_verifications: stats.total,
			successful_verifications: stats.successful,
			failed_verifications: stats.failed,
			total_gas_used: stats.gas_total,
			average_gas_used,
			success_rate,
			average_latency_ms,
		}
	}
}

/// A registered adapter with its configuration and health flag.
struct AdapterEntry {
	adapter: Arc<dyn AdapterInterface>,
	config: ChainConfig,
	healthy: AtomicBool,
}

/// Lifecycle and health supervision for the set of active chain adapters.
///
/// The manager exclusively owns the adapter registry; adapters are only
/// inserted and removed through it. The registry is safe to read
/// concurrently with in-flight verification dispatch, and entries are
/// fully constructed before insertion so readers never observe a partial
/// registration.
#[derive(Default)]
pub struct ConnectionManager {
	adapters: DashMap<ChainType, AdapterEntry>,
}

impl ConnectionManager {
	/// Creates an empty manager.
	pub fn new() -> Self {
		Self {
			adapters: DashMap::new(),
		}
	}

	/// Registers an adapter under its chain type key and connects it once.
	///
	/// If the connection fails the adapter is still registered but marked
	/// unhealthy: verification requests skip unhealthy adapters rather
	/// than erroring the whole batch. Returns whether the adapter came up
	/// healthy.
	pub async fn add_chain_adapter(
		&self,
		adapter: Arc<dyn AdapterInterface>,
		config: ChainConfig,
	) -> bool {
		let chain = adapter.chain_type();
		let healthy = match adapter.connect().await {
			Ok(()) => {
				tracing::info!(chain = %chain, "Adapter connected");
				true
			},
			Err(e) => {
				tracing::warn!(
					chain = %chain,
					error = %e,
					"Adapter failed to connect, registered unhealthy"
				);
				false
			},
		};

		let entry = AdapterEntry {
			adapter,
			config,
			healthy: AtomicBool::new(healthy),
		};
		if self.adapters.insert(chain, entry).is_some() {
			tracing::warn!(chain = %chain, "Replaced previously registered adapter");
		}
		healthy
	}

	/// Removes an adapter from the registry, disconnecting it first.
	///
	/// Returns whether an adapter was registered for the chain.
	pub async fn remove_chain_adapter(&self, chain: ChainType) -> bool {
		match self.adapters.remove(&chain) {
			Some((_, entry)) => {
				if let Err(e) = entry.adapter.disconnect().await {
					tracing::warn!(chain = %chain, error = %e, "Disconnect during removal failed");
				}
				true
			},
			None => false,
		}
	}

	/// The connection parameters a chain was registered with.
	pub fn chain_config(&self, chain: ChainType) -> Option<ChainConfig> {
		self.adapters.get(&chain).map(|entry| entry.config.clone())
	}

	/// Whether the chain is registered and currently healthy.
	pub fn is_healthy(&self, chain: ChainType) -> bool {
		self.adapters
			.get(&chain)
			.map(|entry| entry.healthy.load(Ordering::Acquire) && entry.adapter.is_connected())
			.unwrap_or(false)
	}

	/// Marks a registered adapter unhealthy.
	///
	/// Used when a verification call reveals a lost connection; the
	/// adapter stays registered so it can be reconnected later.
	pub fn mark_unhealthy(&self, chain: ChainType) {
		if let Some(entry) = self.adapters.get(&chain) {
			entry.healthy.store(false, Ordering::Release);
		}
	}

	/// Healthy adapters whose chain is in the given target set.
	pub fn healthy_adapters(&self, targets: &[ChainType]) -> Vec<Arc<dyn AdapterInterface>> {
		self.adapters
			.iter()
			.filter(|entry| {
				targets.contains(entry.key())
					&& entry.healthy.load(Ordering::Acquire)
					&& entry.adapter.is_connected()
			})
			.map(|entry| entry.adapter.clone())
			.collect()
	}

	/// Number of registered adapters.
	pub fn adapter_count(&self) -> usize {
		self.adapters.len()
	}

	/// Aggregate health and throughput statistics across all adapters.
	pub fn get_performance_stats(&self) -> PerformanceStats {
		let mut stats = PerformanceStats::default();
		let mut latency_weighted = 0.0;

		for entry in self.adapters.iter() {
			stats.total_adapters += 1;
			if entry.healthy.load(Ordering::Acquire) && entry.adapter.is_connected() {
				stats.healthy_adapters += 1;
			} else {
				stats.unhealthy_adapters += 1;
			}

			let adapter_stats = entry.adapter.get_verification_stats();
			stats.total_verifications += adapter_stats.total_verifications;
			stats.successful_verifications += adapter_stats.successful_verifications;
			stats.failed_verifications += adapter_stats.failed_verifications;
			latency_weighted +=
				adapter_stats.average_latency_ms * adapter_stats.total_verifications as f64;
		}

		if stats.total_verifications > 0 {
			stats.success_rate =
				stats.successful_verifications as f64 / stats.total_verifications as f64;
			stats.average_latency_ms = latency_weighted / stats.total_verifications as f64;
		}

		stats
	}

	/// Scoped teardown: releases every adapter's connection.
	///
	/// Guaranteed to attempt every adapter even if individual disconnects
	/// fail; errors are collected and returned, not propagated first-fail.
	pub async fn disconnect_all(&self) -> Vec<(ChainType, AdapterError)> {
		let mut errors = Vec::new();

		let adapters: Vec<(ChainType, Arc<dyn AdapterInterface>)> = self
			.adapters
			.iter()
			.map(|entry| (*entry.key(), entry.adapter.clone()))
			.collect();

		for (chain, adapter) in adapters {
			if let Err(e) = adapter.disconnect().await {
				tracing::warn!(chain = %chain, error = %e, "Disconnect failed");
				errors.push((chain, e));
			}
			self.mark_unhealthy(chain);
		}

		errors
	}
}
