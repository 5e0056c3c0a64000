//! Main entry point for the verifier service.
//!
//! This binary provides a complete multi-chain verification run: it loads
//! configuration, wires up chain adapters and the scoring policy, submits
//! one verification request across the configured chains, and prints the
//! consensus verdict as JSON. It uses a modular architecture with pluggable
//! implementations for adapters and scoring.

use clap::Parser;
use std::path::PathBuf;
use verifier_config::Config;
use verifier_consensus::ConsensusBuilder;
use verifier_types::{ChainType, VerificationPayload, VerificationRequest};

/// Command-line arguments for the verifier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Path to a JSON file containing the verification request
	#[arg(short, long)]
	request: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// On-disk shape of a verification request.
///
/// The id and creation timestamp are assigned by the service; callers only
/// provide the work itself.
#[derive(Debug, serde::Deserialize)]
struct RequestFile {
	agent_id: String,
	payload: VerificationPayload,
	target_chains: Vec<ChainType>,
	#[serde(default)]
	consensus_threshold: Option<f64>,
	#[serde(default)]
	timeout_seconds: Option<u64>,
}

/// Main entry point for the verifier service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the consensus engine with all implementations
/// 5. Runs one verification request and prints the verdict
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt().with_env_filter(env_filter).with_target(true).init();

	tracing::info!("Started verifier");

	// Load configuration
	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", config.verifier.id);

	// Build the consensus engine with every shipped implementation
	let engine = ConsensusBuilder::new(config)
		.with_default_implementations()
		.build()
		.await?;

	// Read and submit the request
	let request_json = std::fs::read_to_string(&args.request)?;
	let parsed: RequestFile = serde_json::from_str(&request_json)?;
	let mut request =
		VerificationRequest::new(parsed.agent_id, parsed.payload, parsed.target_chains);
	request.consensus_threshold = parsed.consensus_threshold;
	request.timeout_seconds = parsed.timeout_seconds;

	let result = engine.verify(&request).await;
	println!("{}", serde_json::to_string_pretty(&result)?);

	let stats = engine.get_consensus_stats();
	tracing::info!(
		total_requests = stats.total_requests,
		success_rate = stats.success_rate,
		average_consensus_time_ms = stats.average_consensus_time_ms,
		"Engine statistics"
	);

	// Scoped teardown: every adapter is released even if some fail.
	let errors = engine.connection_manager().disconnect_all().await;
	for (chain, error) in &errors {
		tracing::warn!(chain = %chain, error = %error, "Disconnect failed during shutdown");
	}

	tracing::info!("Stopped verifier");
	Ok(())
}
