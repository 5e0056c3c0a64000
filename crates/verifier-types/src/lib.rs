//! Common types module for the multi-chain verifier system.
//!
//! This module defines the core data types and structures used throughout
//! the verifier system. It provides a centralized location for shared types
//! to ensure consistency across all verifier components.

/// Chain identification and per-chain connection configuration.
pub mod chain;
/// Consensus policy, aggregated results, and request lifecycle types.
pub mod consensus;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Utility functions for hashing, timestamps, and display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;
/// Verification requests, per-chain results, and adapter statistics.
pub mod verification;

// Re-export all types for convenient access
pub use chain::*;
pub use consensus::*;
pub use registry::*;
pub use utils::{content_hash, current_timestamp, truncate_id, with_0x_prefix};
pub use validation::*;
pub use verification::*;
