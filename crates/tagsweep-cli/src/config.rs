//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tagsweep_core::{BackoffPolicy, RecordFilter, RunOptions};
use tagsweep_http::{JsonFetchConfig, token_from_env};

/// Global configuration for tagsweep
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub items: ItemsConfig,
    pub fetch: FetchConfig,
    pub platforms: Vec<PlatformConfig>,
    pub filter: FilterConfig,
    pub sink: SinkConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop after this many published records (across runs)
    pub target_total: Option<u64>,
    pub page_size: usize,
    /// Minimum popularity (follower count) to accept a record
    pub min_threshold: u64,
    pub concurrency: usize,
    pub batch_size: usize,
    /// Total attempts per fetch or publish call
    pub retries: u32,
    pub inter_page_delay_ms: u64,
    pub inter_item_delay_ms: u64,
    pub max_pages_per_item: Option<usize>,
    pub checkpoint: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_total: None,
            page_size: 50,
            min_threshold: 5000,
            concurrency: 4,
            batch_size: 25,
            retries: 3,
            inter_page_delay_ms: 2000,
            inter_item_delay_ms: 2000,
            max_pages_per_item: None,
            checkpoint: PathBuf::from("tagsweep-checkpoint.json"),
        }
    }
}

/// Where the hashtags come from. Exactly one source must be set.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ItemsConfig {
    pub file: Option<PathBuf>,
    pub url: Option<String>,
    pub list: Option<Vec<String>>,
    /// Bearer token for `url`; `${VAR}` reads the environment
    pub token: Option<String>,
}

/// Search endpoint layout. Unset fields take the adapter defaults.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub url: Option<String>,
    pub tag_param: Option<String>,
    pub limit_param: Option<String>,
    pub cursor_param: Option<String>,
    pub records_pointer: Option<String>,
    pub cursor_pointer: Option<String>,
    /// `${VAR}` reads the environment
    pub token: Option<String>,
}

impl FetchConfig {
    /// Fields set here win; the rest come from `base`.
    pub fn merged(&self, base: &FetchConfig) -> FetchConfig {
        fn pick(a: &Option<String>, b: &Option<String>) -> Option<String> {
            a.clone().or_else(|| b.clone())
        }
        FetchConfig {
            url: pick(&self.url, &base.url),
            tag_param: pick(&self.tag_param, &base.tag_param),
            limit_param: pick(&self.limit_param, &base.limit_param),
            cursor_param: pick(&self.cursor_param, &base.cursor_param),
            records_pointer: pick(&self.records_pointer, &base.records_pointer),
            cursor_pointer: pick(&self.cursor_pointer, &base.cursor_pointer),
            token: pick(&self.token, &base.token),
        }
    }

    /// Resolve into the adapter config, reading the token from the environment.
    pub fn resolve(&self, what: &str) -> Result<JsonFetchConfig> {
        let url = self
            .url
            .clone()
            .with_context(|| format!("{what}: fetch url is not set"))?;
        let mut cfg = JsonFetchConfig::new(url);
        let set = |slot: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        };
        set(&mut cfg.tag_param, &self.tag_param);
        set(&mut cfg.limit_param, &self.limit_param);
        set(&mut cfg.cursor_param, &self.cursor_param);
        set(&mut cfg.records_pointer, &self.records_pointer);
        set(&mut cfg.cursor_pointer, &self.cursor_pointer);
        cfg.token = resolve_secret(self.token.as_deref())
            .with_context(|| format!("{what}: fetch token"))?;
        Ok(cfg)
    }
}

/// One platform walked for every hashtag (`instagram`, `tiktok`, ...)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub name: String,
    #[serde(flatten)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub identity_field: String,
    pub popularity_field: String,
    pub required_fields: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let base = RecordFilter::default();
        Self {
            identity_field: base.identity_field,
            popularity_field: base.popularity_field,
            required_fields: base.required_fields,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SinkConfig {
    pub url: Option<String>,
    /// `${VAR}` reads the environment
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            jitter_ms: 500,
        }
    }
}

/// Expand `${VAR}` to the environment variable value
fn expand_env_var(s: &str) -> Result<String> {
    match s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        Some(var_name) => token_from_env(var_name),
        None => Ok(s.to_string()),
    }
}

/// Resolve an optional secret; a `${VAR}` that is not set is an error.
pub fn resolve_secret(raw: Option<&str>) -> Result<Option<String>> {
    raw.map(expand_env_var).transpose()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./tagsweep.toml (current directory)
    /// 2. ~/.config/tagsweep/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("tagsweep.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "tagsweep") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks that need no network or environment access.
    pub fn validate(&self) -> Result<()> {
        self.run_options().validate()?;
        anyhow::ensure!(
            self.sink.url.as_deref().is_some_and(|u| !u.trim().is_empty()),
            "[sink] url is not set"
        );
        let sources = [
            self.items.file.is_some(),
            self.items.url.is_some(),
            self.items.list.is_some(),
        ];
        match sources.iter().filter(|s| **s).count() {
            0 => anyhow::bail!("no item source: set one of [items] file, url or list"),
            1 => {}
            _ => anyhow::bail!("[items] file, url and list are mutually exclusive"),
        }
        if self.platforms.is_empty() {
            anyhow::ensure!(self.fetch.url.is_some(), "[fetch] url is not set");
        }
        let mut seen = std::collections::HashSet::new();
        for platform in &self.platforms {
            anyhow::ensure!(
                !platform.name.is_empty() && !platform.name.contains('/'),
                "invalid platform name {:?}",
                platform.name
            );
            anyhow::ensure!(
                seen.insert(platform.name.as_str()),
                "platform {} listed twice",
                platform.name
            );
            anyhow::ensure!(
                platform.fetch.merged(&self.fetch).url.is_some(),
                "platform {}: no fetch url",
                platform.name
            );
        }
        anyhow::ensure!(self.http.timeout_secs > 0, "[http] timeout_secs must be at least 1");
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        let run = &self.run;
        RunOptions {
            page_size: run.page_size,
            concurrency: run.concurrency,
            batch_size: run.batch_size,
            inter_page_delay: Duration::from_millis(run.inter_page_delay_ms),
            inter_item_delay: Duration::from_millis(run.inter_item_delay_ms),
            max_pages_per_item: run.max_pages_per_item,
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.run.retries,
            base_delay: Duration::from_millis(self.http.base_delay_ms),
            max_delay: Duration::from_millis(self.http.max_delay_ms),
            jitter: Duration::from_millis(self.http.jitter_ms),
        }
    }

    pub fn record_filter(&self) -> RecordFilter {
        RecordFilter {
            identity_field: self.filter.identity_field.clone(),
            popularity_field: self.filter.popularity_field.clone(),
            min_popularity: self.run.min_threshold,
            required_fields: self.filter.required_fields.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.iter().map(|p| p.name.clone()).collect()
    }
}
