//! Deterministic consistency scoring policy.
//!
//! Scores a payload by how internally consistent it is: whether model
//! metadata is present and complete, and whether the metrics the caller
//! stated about the output agree with what can be computed from the
//! payload itself. No randomness is involved anywhere; the same payload
//! always produces the same score.

use crate::{ScoringError, ScoringFactory, ScoringInterface, ScoringRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use verifier_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	VerificationPayload,
};

/// Configuration for the consistency scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyScoringConfig {
	/// Score assigned to a payload with output but no corroborating signal.
	#[serde(default = "default_base_score")]
	pub base_score: f64,
	/// Maximum contribution from metadata presence and completeness.
	#[serde(default = "default_metadata_weight")]
	pub metadata_weight: f64,
	/// Maximum contribution from stated-vs-computed metric agreement.
	#[serde(default = "default_agreement_weight")]
	pub agreement_weight: f64,
}

fn default_base_score() -> f64 {
	0.5
}

fn default_metadata_weight() -> f64 {
	0.2
}

fn default_agreement_weight() -> f64 {
	0.3
}

impl Default for ConsistencyScoringConfig {
	fn default() -> Self {
		Self {
			base_score: default_base_score(),
			metadata_weight: default_metadata_weight(),
			agreement_weight: default_agreement_weight(),
		}
	}
}

/// Configuration schema for the consistency scoring policy.
pub struct ConsistencyScoringSchema;

impl ConfigSchema for ConsistencyScoringSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"base_score",
					FieldType::Float {
						min: Some(0.0),
						max: Some(1.0),
					},
				),
				Field::new(
					"metadata_weight",
					FieldType::Float {
						min: Some(0.0),
						max: Some(1.0),
					},
				),
				Field::new(
					"agreement_weight",
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

/// Scoring policy that measures a payload's internal consistency.
pub struct ConsistencyScoring {
	config: ConsistencyScoringConfig,
}

impl ConsistencyScoring {
	/// Creates a new consistency scoring policy with the given configuration.
	pub fn new(config: ConsistencyScoringConfig) -> Self {
		Self { config }
	}

	/// Length in characters of the model output as actually present.
	///
	/// Strings count their own length; other JSON shapes count the length
	/// of their canonical serialization.
	fn computed_output_length(output: &serde_json::Value) -> u64 {
		match output {
			serde_json::Value::String(s) => s.chars().count() as u64,
			other => serde_json::to_string(other).map(|s| s.len()).unwrap_or(0) as u64,
		}
	}

	/// Fraction in [0, 1] of how complete the model metadata is.
	fn metadata_quality(payload: &VerificationPayload) -> f64 {
		match &payload.model_metadata {
			None => 0.0,
			Some(meta) => {
				// Name is mandatory in the struct; version and provider are
				// the quality signal.
				let mut quality: f64 = 0.5;
				if meta.model_version.is_some() {
					quality += 0.25;
				}
				if meta.provider.is_some() {
					quality += 0.25;
				}
				quality
			},
		}
	}

	/// Agreement in [0, 1] between the stated output length and the one
	/// computed from the payload. Returns None when nothing was stated.
	fn metric_agreement(payload: &VerificationPayload) -> Option<f64> {
		let declared = payload
			.model_metadata
			.as_ref()
			.and_then(|m| m.declared_output_length)?;
		let actual = Self::computed_output_length(&payload.model_output);
		let larger = declared.max(actual).max(1);
		let delta = declared.abs_diff(actual);
		Some(1.0 - (delta as f64 / larger as f64))
	}
}

#[async_trait]
impl ScoringInterface for ConsistencyScoring {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(ConsistencyScoringSchema)
	}

	async fn score(&self, payload: &VerificationPayload) -> Result<f64, ScoringError> {
		// An absent or empty output carries no verifiable content.
		if payload.model_output.is_null() {
			return Ok(0.0);
		}
		if Self::computed_output_length(&payload.model_output) == 0 {
			return Ok(0.0);
		}

		let mut score = self.config.base_score;
		score += self.config.metadata_weight * Self::metadata_quality(payload);

		if let Some(agreement) = Self::metric_agreement(payload) {
			score += self.config.agreement_weight * agreement;
		}

		Ok(score.clamp(0.0, 1.0))
	}
}

/// Registry for the consistency scoring implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "consistency";
	type Factory = ScoringFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn ScoringInterface>, ScoringError> {
			ConsistencyScoringSchema
				.validate(config)
				.map_err(|e| ScoringError::Configuration(e.to_string()))?;

			let scoring_config: ConsistencyScoringConfig = config
				.clone()
				.try_into()
				.map_err(|e| ScoringError::Configuration(format!("Invalid config: {}", e)))?;

			Ok(Box::new(ConsistencyScoring::new(scoring_config)))
		}
	}
}

impl ScoringRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use verifier_types::ModelMetadata;

	fn payload_with_metadata(declared: Option<u64>) -> VerificationPayload {
		VerificationPayload {
			model_output: serde_json::Value::String("four".to_string()),
			input_context: serde_json::json!({"prompt": "count letters"}),
			model_metadata: Some(ModelMetadata {
				model_name: "test-model".to_string(),
				model_version: Some("1.2".to_string()),
				provider: Some("local".to_string()),
				declared_output_length: declared,
			}),
			execution_context: serde_json::Value::Null,
		}
	}

	#[tokio::test]
	async fn scoring_is_deterministic() {
		let policy = ConsistencyScoring::new(ConsistencyScoringConfig::default());
		let payload = payload_with_metadata(Some(4));
		let first = policy.score(&payload).await.unwrap();
		let second = policy.score(&payload).await.unwrap();
		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn score_stays_in_unit_interval() {
		let policy = ConsistencyScoring::new(ConsistencyScoringConfig {
			base_score: 1.0,
			metadata_weight: 1.0,
			agreement_weight: 1.0,
		});
		let score = policy.score(&payload_with_metadata(Some(4))).await.unwrap();
		assert!((0.0..=1.0).contains(&score));
		assert_eq!(score, 1.0);
	}

	#[tokio::test]
	async fn complete_metadata_scores_higher_than_none() {
		let policy = ConsistencyScoring::new(ConsistencyScoringConfig::default());

		let with_meta = policy.score(&payload_with_metadata(None)).await.unwrap();

		let mut bare = payload_with_metadata(None);
		bare.model_metadata = None;
		let without_meta = policy.score(&bare).await.unwrap();

		assert!(with_meta > without_meta);
	}

	#[tokio::test]
	async fn stated_metric_disagreement_lowers_score() {
		let policy = ConsistencyScoring::new(ConsistencyScoringConfig::default());

		// "four" is 4 characters; stating 4 agrees, stating 400 does not.
		let agreeing = policy.score(&payload_with_metadata(Some(4))).await.unwrap();
		let disagreeing = policy
			.score(&payload_with_metadata(Some(400)))
			.await
			.unwrap();

		assert!(agreeing > disagreeing);
	}

	#[tokio::test]
	async fn empty_output_scores_zero() {
		let policy = ConsistencyScoring::new(ConsistencyScoringConfig::default());
		let mut payload = payload_with_metadata(None);
		payload.model_output = serde_json::Value::Null;
		assert_eq!(policy.score(&payload).await.unwrap(), 0.0);

		payload.model_output = serde_json::Value::String(String::new());
		assert_eq!(policy.score(&payload).await.unwrap(), 0.0);
	}

	#[test]
	fn factory_rejects_out_of_range_weights() {
		let factory = Registry::factory();
		let bad: toml::Value = toml::from_str("base_score = 2.0").unwrap();
		assert!(factory(&bad).is_err());

		let good: toml::Value = toml::from_str("base_score = 0.4").unwrap();
		assert!(factory(&good).is_ok());
	}
}
