//! Utility functions for common operations.
//!
//! This module provides helpers used throughout the verifier system for
//! content hashing, timestamp retrieval, and log-friendly formatting.

use crate::VerificationPayload;
use sha3::{Digest, Keccak256};

/// Computes the deterministic keccak-256 content hash of a payload.
///
/// The hash is the on-chain claim reference for a verification. It is
/// computed over the canonical JSON serialization of the payload (object
/// keys are sorted by the serializer), so the same payload always yields
/// the same hash.
pub fn content_hash(payload: &VerificationPayload) -> String {
	let bytes = serde_json::to_vec(payload).unwrap_or_default();
	let digest = Keccak256::digest(&bytes);
	with_0x_prefix(&hex::encode(digest))
}

/// Helper function to get current timestamp, returns 0 if system time is before UNIX epoch.
pub fn current_timestamp() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Prefixes a hex string with "0x" if it is not already prefixed.
pub fn with_0x_prefix(hex: &str) -> String {
	if hex.starts_with("0x") {
		hex.to_string()
	} else {
		format!("0x{}", hex)
	}
}
