//! Pipeline configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`pawmood.toml` unless another path is given), then `PAWMOOD__*`
//! environment variables. Nested keys use `__` as separator, e.g.
//! `PAWMOOD__RETRY__MAX_ATTEMPTS=5`. `PAWMOOD__LABELS` takes a
//! comma-separated list.

use common::mood::LabelSet;
use common::presentation::{DEFAULT_DISMISS_MS, TipBook};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::classifier::{FixedStrategy, MoodClassifier, UniformRandomStrategy};

pub const DEFAULT_CONFIG_FILE: &str = "pawmood.toml";

/// Which classification strategy the pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Fixed,
    Random,
}

/// Exponential backoff for retryable append failures
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Classifier input resolution
    pub frame_width: u32,
    pub frame_height: u32,
    pub decode_timeout_ms: u64,
    pub labels: LabelSet,
    pub strategy: StrategyKind,
    /// Label answered by the `fixed` strategy
    pub fixed_label: String,
    /// Seed for the `random` strategy, entropy when unset
    pub random_seed: Option<u64>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub retry: RetryPolicy,
    /// Local key-value file used for the anonymous diary
    pub diary_path: PathBuf,
    pub tips: TipBook,
    pub notice_dismiss_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_width: 224,
            frame_height: 224,
            decode_timeout_ms: 10_000,
            labels: LabelSet::default(),
            strategy: StrategyKind::Random,
            fixed_label: "happy".to_string(),
            random_seed: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            retry: RetryPolicy::default(),
            diary_path: PathBuf::from("pawmood-diary.json"),
            tips: TipBook::default(),
            notice_dismiss_ms: DEFAULT_DISMISS_MS,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `path` (or `pawmood.toml`) and the environment.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let config: Self = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("PAWMOOD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("labels"),
            )
            .build()?
            .try_deserialize()?;

        if config.frame_width == 0 || config.frame_height == 0 {
            return Err(ConfigError::Message(
                "frame_width and frame_height must be positive".to_string(),
            ));
        }

        info!(
            "Pipeline configured: {}x{} frames, {} strategy, labels {:?}",
            config.frame_width,
            config.frame_height,
            match config.strategy {
                StrategyKind::Fixed => "fixed",
                StrategyKind::Random => "random",
            },
            Vec::<String>::from(config.labels.clone())
        );

        Ok(config)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_millis(self.decode_timeout_ms)
    }

    pub fn build_classifier(&self) -> Arc<dyn MoodClassifier> {
        match self.strategy {
            StrategyKind::Fixed => Arc::new(FixedStrategy::new(self.fixed_label.clone())),
            StrategyKind::Random => match self.random_seed {
                Some(seed) => Arc::new(UniformRandomStrategy::seeded(seed)),
                None => Arc::new(UniformRandomStrategy::new()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::mood::MoodLabel;
    use serial_test::serial;
    use std::io::Write;

    const ENV_KEYS: [&str; 4] = [
        "PAWMOOD__LABELS",
        "PAWMOOD__DECODE_TIMEOUT_MS",
        "PAWMOOD__STRATEGY",
        "PAWMOOD__RETRY__MAX_ATTEMPTS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    fn missing_file() -> PathBuf {
        PathBuf::from("/nonexistent/pawmood.toml")
    }

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        clear_env();

        let config = PipelineConfig::load(Some(&missing_file())).unwrap();
        assert_eq!((config.frame_width, config.frame_height), (224, 224));
        assert_eq!(config.decode_timeout(), Duration::from_secs(10));
        assert_eq!(config.labels.len(), 4);
        assert_eq!(config.strategy, StrategyKind::Random);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.notice_dismiss_ms, 3000);
    }

    #[test]
    #[serial]
    fn test_file_selects_alternate_label_set() {
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
labels = ["Happy", "Sad", "Excited", "Relaxed"]
strategy = "fixed"
fixed_label = "excited"
frame_width = 128

[retry]
max_attempts = 5

[tips]
fallback = "Give your pet a hug."

[tips.tips]
Excited = ["Play fetch."]
"#
        )
        .unwrap();

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.labels, LabelSet::excited_variant());
        assert_eq!(config.strategy, StrategyKind::Fixed);
        assert_eq!(config.frame_width, 128);
        assert_eq!(config.frame_height, 224);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 100);

        let excited = MoodLabel::new("Excited").unwrap();
        assert_eq!(config.tips.pick_random(&excited), "Play fetch.");
        assert_eq!(
            config.tips.pick_random(&MoodLabel::new("Sad").unwrap()),
            "Give your pet a hug."
        );
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("PAWMOOD__LABELS", "calm,playful");
            std::env::set_var("PAWMOOD__DECODE_TIMEOUT_MS", "2500");
            std::env::set_var("PAWMOOD__RETRY__MAX_ATTEMPTS", "7");
        }

        let config = PipelineConfig::load(Some(&missing_file())).unwrap();
        assert_eq!(
            Vec::<String>::from(config.labels.clone()),
            vec!["calm".to_string(), "playful".to_string()]
        );
        assert_eq!(config.decode_timeout(), Duration::from_millis(2500));
        assert_eq!(config.retry.max_attempts, 7);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_duplicate_labels_are_rejected() {
        clear_env();
        unsafe {
            std::env::set_var("PAWMOOD__LABELS", "happy,HAPPY");
        }

        assert!(PipelineConfig::load(Some(&missing_file())).is_err());

        clear_env();
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 50,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
    }

    #[test]
    fn test_build_classifier_follows_strategy() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.build_classifier().name(), "random");

        config.strategy = StrategyKind::Fixed;
        assert_eq!(config.build_classifier().name(), "fixed");
    }
}
