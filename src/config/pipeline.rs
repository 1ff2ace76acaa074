// src/config/pipeline.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "STREAM_SENTIMENT_CONFIG";
const ENV_LANGUAGE_API_KEY: &str = "LANGUAGE_API_KEY";

fn default_sample_interval_secs() -> u64 {
    20
}
fn default_window_secs() -> u64 {
    3600
}
fn default_flush_threshold() -> usize {
    100
}
fn default_language_endpoint() -> String {
    "https://language.googleapis.com/v1/documents:analyzeSentiment".to_string()
}

/// What to do with the throttle clock when a scoring call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFailurePolicy {
    /// Leave the clock untouched; the next event retries immediately.
    #[default]
    Retry,
    /// Treat the interval as spent, as if the call had succeeded.
    Advance,
}

/// Completion ordering of snapshot writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrdering {
    /// Writes race; the stored snapshot may lag by one generation.
    #[default]
    Unordered,
    /// Writes are serialized and stale generations are skipped.
    Monotonic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerConfig {
    #[default]
    Lexicon,
    LanguageApi {
        #[serde(default = "default_language_endpoint")]
        endpoint: String,
        /// "ENV" means: read from LANGUAGE_API_KEY
        #[serde(default)]
        api_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotSinkConfig {
    File {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default)]
        bearer_token: Option<String>,
    },
    Memory,
}

impl Default for SnapshotSinkConfig {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from("out/last_hour.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchSinkConfig {
    Jsonl {
        path: PathBuf,
    },
    Http {
        url: String,
        #[serde(default)]
        bearer_token: Option<String>,
    },
}

impl Default for BatchSinkConfig {
    fn default() -> Self {
        Self::Jsonl {
            path: PathBuf::from("out/scores.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum seconds between two scoring calls.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// History span kept in the sliding window.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Explicit window length; overrides `window_secs / sample_interval_secs`.
    #[serde(default)]
    pub window_capacity: Option<usize>,
    /// Rows cached before a batch flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    #[serde(default)]
    pub on_scoring_failure: ScoringFailurePolicy,
    #[serde(default)]
    pub snapshot_ordering: SnapshotOrdering,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub snapshot: SnapshotSinkConfig,
    #[serde(default)]
    pub batch: BatchSinkConfig,
    /// Bind address for the read-side HTTP surface; disabled when absent.
    #[serde(default)]
    pub server_addr: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            window_secs: default_window_secs(),
            window_capacity: None,
            flush_threshold: default_flush_threshold(),
            on_scoring_failure: ScoringFailurePolicy::default(),
            snapshot_ordering: SnapshotOrdering::default(),
            scorer: ScorerConfig::default(),
            snapshot: SnapshotSinkConfig::default(),
            batch: BatchSinkConfig::default(),
            server_addr: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Supports TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides and validate:
    /// 1) $STREAM_SENTIMENT_CONFIG
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new("config/pipeline.toml").exists() {
            Self::load_from(Path::new("config/pipeline.toml"))?
        } else if Path::new("config/pipeline.json").exists() {
            Self::load_from(Path::new("config/pipeline.json"))?
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        cfg.resolve_secrets()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// SAMPLE_INTERVAL_SECS, WINDOW_SECS, FLUSH_THRESHOLD, SERVER_ADDR.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u64>("SAMPLE_INTERVAL_SECS")? {
            self.sample_interval_secs = v;
        }
        if let Some(v) = env_parse::<u64>("WINDOW_SECS")? {
            self.window_secs = v;
        }
        if let Some(v) = env_parse::<usize>("FLUSH_THRESHOLD")? {
            self.flush_threshold = v;
        }
        if let Ok(v) = std::env::var("SERVER_ADDR") {
            let v = v.trim();
            self.server_addr = (!v.is_empty()).then(|| v.to_string());
        }
        Ok(())
    }

    fn resolve_secrets(&mut self) -> Result<()> {
        if let ScorerConfig::LanguageApi { api_key, .. } = &mut self.scorer {
            if api_key.trim().eq_ignore_ascii_case("env") {
                *api_key = std::env::var(ENV_LANGUAGE_API_KEY)
                    .map_err(|_| anyhow!("Missing {ENV_LANGUAGE_API_KEY} env var"))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_secs == 0 {
            bail!("sample_interval_secs must be > 0");
        }
        let interval = i64::try_from(self.sample_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds);
        if interval
            .and_then(|d| chrono::Utc::now().checked_add_signed(d))
            .is_none()
        {
            bail!(
                "sample_interval_secs={} is out of range",
                self.sample_interval_secs
            );
        }
        if self.flush_threshold == 0 {
            bail!("flush_threshold must be >= 1");
        }
        if self.window_capacity() == 0 {
            bail!(
                "window holds no samples: window_secs={} < sample_interval_secs={}",
                self.window_secs,
                self.sample_interval_secs
            );
        }
        Ok(())
    }

    /// W = window duration / sample interval, unless set explicitly.
    pub fn window_capacity(&self) -> usize {
        match self.window_capacity {
            Some(w) => w,
            None => self
                .window_secs
                .checked_div(self.sample_interval_secs)
                .unwrap_or(0) as usize,
        }
    }

    pub fn scorer_name(&self) -> &'static str {
        match self.scorer {
            ScorerConfig::Lexicon => "lexicon",
            ScorerConfig::LanguageApi { .. } => "language_api",
        }
    }

    /// Saturates for values `validate` rejects.
    pub fn sample_interval(&self) -> chrono::Duration {
        i64::try_from(self.sample_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Log the effective settings once; secrets are reduced to their length.
    pub fn log_summary(&self) {
        let scorer = match &self.scorer {
            ScorerConfig::Lexicon => "lexicon".to_string(),
            ScorerConfig::LanguageApi { endpoint, api_key } => {
                format!("language_api endpoint={endpoint} key_len={}", api_key.len())
            }
        };
        tracing::info!(
            sample_interval_secs = self.sample_interval_secs,
            window_capacity = self.window_capacity(),
            flush_threshold = self.flush_threshold,
            on_scoring_failure = ?self.on_scoring_failure,
            snapshot_ordering = ?self.snapshot_ordering,
            scorer = %scorer,
            snapshot = ?redacted_snapshot(&self.snapshot),
            batch = ?redacted_batch(&self.batch),
            server_addr = ?self.server_addr,
            "pipeline config loaded"
        );
    }
}

fn redacted_snapshot(s: &SnapshotSinkConfig) -> String {
    match s {
        SnapshotSinkConfig::File { path } => format!("file:{}", path.display()),
        SnapshotSinkConfig::Http { url, .. } => format!("http:{url}"),
        SnapshotSinkConfig::Memory => "memory".into(),
    }
}

fn redacted_batch(b: &BatchSinkConfig) -> String {
    match b {
        BatchSinkConfig::Jsonl { path } => format!("jsonl:{}", path.display()),
        BatchSinkConfig::Http { url, .. } => format!("http:{url}"),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}={v}: {e}")),
        _ => Ok(None),
    }
}
