//! Generation configuration with TOML, environment variable and default
//! sources.

use std::path::Path;
use std::{env, fs};

use serde::{Deserialize, Serialize};
use textgen_sampling::{DecodingStrategy, Sampler, StrategyError};
use tracing::warn;

use crate::state::StopToken;
use crate::window::{ContextWindowManager, Truncation, WindowError};

// ── Errors ──────────────────────────────────────────────────────────

/// Errors produced by configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("invalid environment variable value for {key}: {value}")]
    InvalidEnvVar { key: String, value: String },
}

// ── TOML wrapper ────────────────────────────────────────────────────

/// Wrapper used for the `[generation]` table in TOML files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TomlWrapper {
    generation: GenerationConfig,
}

// ── GenerationConfig ────────────────────────────────────────────────

/// Everything one generation run needs besides the prompt, scorer and
/// tokenizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Context window length `W`.
    pub window_len: usize,
    pub max_tokens: usize,
    pub pad_token_id: u32,
    /// Fixed RNG seed; `None` seeds from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub truncation: Truncation,
    pub strategy: DecodingStrategy,
    pub stop_token: StopToken,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            window_len: 64,
            max_tokens: 150,
            pad_token_id: 0,
            seed: None,
            truncation: Truncation::KeepEarliest,
            strategy: DecodingStrategy::NUCLEUS_0_8,
            stop_token: StopToken::default(),
        }
    }
}

impl GenerationConfig {
    pub const ENV_WINDOW_LEN: &'static str = "TEXTGEN_WINDOW_LEN";
    pub const ENV_MAX_TOKENS: &'static str = "TEXTGEN_MAX_TOKENS";
    pub const ENV_STRATEGY: &'static str = "TEXTGEN_STRATEGY";
    pub const ENV_PAD_TOKEN_ID: &'static str = "TEXTGEN_PAD_TOKEN_ID";
    pub const ENV_STOP_TOKEN_ID: &'static str = "TEXTGEN_STOP_TOKEN_ID";
    pub const ENV_STOP_TEXT: &'static str = "TEXTGEN_STOP_TEXT";
    pub const ENV_SEED: &'static str = "TEXTGEN_SEED";
    pub const ENV_TRUNCATION: &'static str = "TEXTGEN_TRUNCATION";

    // ── Constructors ────────────────────────────────────────────

    /// Load configuration from a TOML file at `path`.
    ///
    /// The file is expected to contain a `[generation]` table. If the file
    /// does not exist, returns `Ok(Self::default())`.
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file not found: {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML document containing a `[generation]` table.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let wrapper: TomlWrapper = toml::from_str(text)?;
        Ok(wrapper.generation)
    }

    /// Serialize to a TOML string (wrapped in `[generation]`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let wrapper = TomlWrapper { generation: self.clone() };
        Ok(toml::to_string_pretty(&wrapper)?)
    }

    /// Build a config from `TEXTGEN_*` environment vars on top of
    /// `Self::default()`.
    ///
    /// `TEXTGEN_STOP_TOKEN_ID` wins over `TEXTGEN_STOP_TEXT` when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(v) = env::var(Self::ENV_WINDOW_LEN) {
            cfg.window_len = parse_env(Self::ENV_WINDOW_LEN, &v)?;
        }
        if let Ok(v) = env::var(Self::ENV_MAX_TOKENS) {
            cfg.max_tokens = parse_env(Self::ENV_MAX_TOKENS, &v)?;
        }
        if let Ok(v) = env::var(Self::ENV_STRATEGY) {
            cfg.strategy = v.parse()?;
        }
        if let Ok(v) = env::var(Self::ENV_PAD_TOKEN_ID) {
            cfg.pad_token_id = parse_env(Self::ENV_PAD_TOKEN_ID, &v)?;
        }
        if let Ok(v) = env::var(Self::ENV_STOP_TEXT) {
            cfg.stop_token = StopToken::Text(v);
        }
        if let Ok(v) = env::var(Self::ENV_STOP_TOKEN_ID) {
            cfg.stop_token = StopToken::Id(parse_env(Self::ENV_STOP_TOKEN_ID, &v)?);
        }
        if let Ok(v) = env::var(Self::ENV_SEED) {
            let seed: i64 = parse_env(Self::ENV_SEED, &v)?;
            let seed = u64::try_from(seed).map_err(|_| ConfigError::InvalidEnvVar {
                key: Self::ENV_SEED.to_string(),
                value: v.clone(),
            })?;
            cfg.seed = Some(seed);
        }
        if let Ok(v) = env::var(Self::ENV_TRUNCATION) {
            cfg.truncation = v.parse()?;
        }

        Ok(cfg)
    }

    // ── Validation ──────────────────────────────────────────────

    /// Reject values that can never drive a generation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_len == 0 {
            return Err(ConfigError::Validation("window_len must be >= 1".into()));
        }
        if u32::try_from(self.window_len).is_err() {
            return Err(ConfigError::Window(WindowError::TooLarge(self.window_len)));
        }
        // TOML integers are i64.
        if self.seed.is_some_and(|seed| i64::try_from(seed).is_err()) {
            return Err(ConfigError::Validation(format!("seed must be <= {}", i64::MAX)));
        }
        if matches!(&self.stop_token, StopToken::Text(t) if t.is_empty()) {
            return Err(ConfigError::Validation("stop_token text must not be empty".into()));
        }
        Ok(())
    }

    // ── Merge ───────────────────────────────────────────────────

    /// Overlay `other` on top of `self`. Fields in `other` that differ
    /// from the default take precedence.
    #[must_use]
    pub fn merge_with(&self, other: &Self) -> Self {
        let d = Self::default();
        Self {
            window_len: pick(self.window_len, other.window_len, d.window_len),
            max_tokens: pick(self.max_tokens, other.max_tokens, d.max_tokens),
            pad_token_id: pick(self.pad_token_id, other.pad_token_id, d.pad_token_id),
            seed: other.seed.or(self.seed),
            truncation: pick(self.truncation, other.truncation, d.truncation),
            strategy: pick(self.strategy, other.strategy, d.strategy),
            stop_token: pick(self.stop_token.clone(), other.stop_token.clone(), d.stop_token),
        }
    }

    // ── Builders ────────────────────────────────────────────────

    /// Window manager for `window_len`, `pad_token_id` and `truncation`.
    pub fn window_manager(&self) -> Result<ContextWindowManager, WindowError> {
        Ok(ContextWindowManager::new(self.window_len, self.pad_token_id)?
            .with_truncation(self.truncation))
    }

    /// Sampler for `strategy`, seeded from `seed` when present.
    pub fn sampler(&self) -> Sampler {
        Sampler::with_seed(self.strategy, self.seed)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay == default { base } else { overlay }
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvVar {
        key: key.to_string(),
        value: val.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = GenerationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.window_len, 64);
        assert_eq!(cfg.max_tokens, 150);
        assert_eq!(cfg.strategy, DecodingStrategy::top_p(0.8).unwrap());
        assert_eq!(cfg.stop_token, StopToken::Text("<|endoftext|>".into()));
    }

    #[test]
    fn zero_window_fails_validation() {
        let cfg = GenerationConfig { window_len: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn empty_stop_text_fails_validation() {
        let cfg = GenerationConfig { stop_token: StopToken::Text(String::new()), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn seed_beyond_toml_integer_range_fails_validation() {
        let max = u64::try_from(i64::MAX).unwrap();
        let ok = GenerationConfig { seed: Some(max), ..Default::default() };
        assert!(ok.validate().is_ok());
        assert_eq!(GenerationConfig::from_toml_str(&ok.to_toml().unwrap()).unwrap(), ok);

        let too_big = GenerationConfig { seed: Some(max + 1), ..Default::default() };
        assert!(matches!(too_big.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn merge_prefers_non_default_overlay() {
        let base = GenerationConfig { window_len: 128, seed: Some(1), ..Default::default() };
        let overlay = GenerationConfig {
            max_tokens: 10,
            strategy: DecodingStrategy::Greedy,
            ..Default::default()
        };
        let merged = base.merge_with(&overlay);
        assert_eq!(merged.window_len, 128);
        assert_eq!(merged.max_tokens, 10);
        assert_eq!(merged.strategy, DecodingStrategy::Greedy);
        assert_eq!(merged.seed, Some(1));
    }

    #[test]
    fn toml_round_trip() {
        let cfg = GenerationConfig {
            window_len: 8,
            seed: Some(42),
            truncation: Truncation::KeepLatest,
            strategy: DecodingStrategy::top_k(40).unwrap(),
            stop_token: StopToken::Id(50_256),
            ..Default::default()
        };
        let text = cfg.to_toml().unwrap();
        assert_eq!(GenerationConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = GenerationConfig::from_toml_str("[generation]\nmax_tokens = 5\n").unwrap();
        assert_eq!(cfg.max_tokens, 5);
        assert_eq!(cfg.window_len, 64);
    }

    #[test]
    fn invalid_strategy_table_is_a_parse_error() {
        let text = "[generation.strategy]\ntype = \"top_k\"\nk = 0\n";
        assert!(matches!(GenerationConfig::from_toml_str(text), Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn builders_follow_fields() {
        let cfg = GenerationConfig {
            window_len: 4,
            pad_token_id: 9,
            truncation: Truncation::KeepLatest,
            strategy: DecodingStrategy::Greedy,
            seed: Some(3),
            ..Default::default()
        };
        let mgr = cfg.window_manager().unwrap();
        assert_eq!(mgr.window_len(), 4);
        assert_eq!(mgr.pad_token_id(), 9);
        assert_eq!(mgr.truncation(), Truncation::KeepLatest);
        assert_eq!(cfg.sampler().strategy(), DecodingStrategy::Greedy);
    }
}
