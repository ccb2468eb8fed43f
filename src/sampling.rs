//! Deterministic sampling.
//!
//! Every item gets a score in `[0, 100]` derived from a hash of a stable key. Items whose score
//! is below the sampling percentage are kept. Since the key is the user id when there is one, a
//! user's telemetry is either kept or dropped as a whole.

use crate::{
    diagnostics::InternalMessageId,
    models::{context_tag_keys::*, TelemetryItem},
    DiagnosticLogger, Error,
};
use std::{fmt::Debug, sync::Arc};

const INT_MAX_VALUE: f64 = 2_147_483_647.0;
const MIN_INPUT_LENGTH: usize = 8;
const HASH_SEED: i32 = 5381;

/// Computes the sampling score of a telemetry item.
pub trait SamplingScoreGenerator: Debug + Send + Sync {
    /// Score in `[0, 100]`. Must return the same score for the same item.
    fn score(&self, item: &TelemetryItem) -> f64;
}

/// Scores items by a djb2 hash of, in order of preference, the user id, the operation id, the
/// session id or the item name.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashCodeScoreGenerator;

impl HashCodeScoreGenerator {
    /// Score of `key` in `[0, 100]`.
    ///
    /// ```
    /// use application_insights_sdk::sampling::HashCodeScoreGenerator;
    ///
    /// let generator = HashCodeScoreGenerator;
    /// assert_eq!(0.0, generator.hash_code_score(""));
    /// assert_eq!(generator.hash_code_score("user1"), generator.hash_code_score("user1"));
    /// ```
    pub fn hash_code_score(&self, key: &str) -> f64 {
        self.hash_code(key) as f64 / INT_MAX_VALUE * 100.0
    }

    /// Non-negative djb2 hash over the UTF-16 code units of `key`. Short keys are repeated until
    /// they are at least 8 units long.
    pub fn hash_code(&self, key: &str) -> i64 {
        if key.is_empty() {
            return 0;
        }
        let mut units: Vec<u16> = key.encode_utf16().collect();
        while units.len() < MIN_INPUT_LENGTH {
            units.extend_from_within(..);
        }
        let hash = units.iter().fold(HASH_SEED, |hash, unit| {
            (hash << 5).wrapping_add(hash).wrapping_add(i32::from(*unit))
        });
        i64::from(hash).abs()
    }
}

impl SamplingScoreGenerator for HashCodeScoreGenerator {
    fn score(&self, item: &TelemetryItem) -> f64 {
        let key = [USER_ID, OPERATION_ID, SESSION_ID]
            .into_iter()
            .find_map(|key| item.tags.get(key).filter(|value| !value.is_empty()))
            .unwrap_or(item.name.as_str());
        self.hash_code_score(key)
    }
}

/// The sampling decision for one SDK instance.
#[derive(Debug, Clone)]
pub struct Sample {
    sample_rate: f64,
    generator: Arc<dyn SamplingScoreGenerator>,
}

impl Sample {
    /// Create a sampler keeping `sample_rate` percent of the telemetry. Rates outside `0..=100`
    /// are clamped with a warning.
    pub fn new(sample_rate: f64, logger: &DiagnosticLogger) -> Result<Self, Error> {
        let clamped = if sample_rate.is_nan() {
            100.0
        } else {
            sample_rate.clamp(0.0, 100.0)
        };
        if clamped != sample_rate {
            logger.warn_internal(
                InternalMessageId::SampleRateOutOfRange,
                &format!(
                    "Sampling rate is out of range (0..100). Sampling will be set to {}.",
                    clamped
                ),
            )?;
        }
        Ok(Self {
            sample_rate: clamped,
            generator: Arc::new(HashCodeScoreGenerator),
        })
    }

    /// Replace the score generator.
    pub fn with_score_generator(mut self, generator: Arc<dyn SamplingScoreGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Percentage of telemetry kept.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Whether `item` is kept.
    pub fn is_sampled_in(&self, item: &TelemetryItem) -> bool {
        if self.sample_rate >= 100.0 {
            return true;
        }
        if self.sample_rate <= 0.0 {
            return false;
        }
        self.generator.score(item) < self.sample_rate
    }
}
