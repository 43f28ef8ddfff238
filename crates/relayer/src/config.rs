//! Configuration management for the backing relayer.
//!
//! This module handles loading configuration from:
//! - TOML files (with `${VAR}` environment expansion)
//! - Environment variables only (no file)
//! - Default values (fallbacks)
//!
//! The resulting [`Config`] is built once at startup and handed to each
//! component by reference.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use backing_core::{
    parse_address, BACKFILL_WINDOW, BACKING_EMITTER, DEFAULT_POLL_INTERVAL_SECS, DEPLOYMENT_BLOCK,
    QUERY_ROW_LIMIT, TRUST_BATCH_GAS_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main configuration for the relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network configuration
    pub network: NetworkConfig,

    /// Contract addresses
    pub contracts: ContractsConfig,

    /// Screening service configuration
    pub screening: ScreeningConfig,

    /// Sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Trust batch submitter configuration
    pub submitter: SubmitterConfig,

    /// Processing policy
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC URL of the node (also serves `circles_query`)
    pub rpc_url: String,
}

/// Contract addresses configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Group contract that receives `trustBatchWithConditions`
    pub base_group: Address,

    /// Contract emitting `CirclesBackingCompleted`
    #[serde(default = "default_backing_emitter")]
    pub backing_emitter: Address,
}

/// Screening service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Base URL; `/bot-analytics/classify` is appended
    pub base_url: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_screening_timeout_secs")]
    pub timeout_secs: u64,

    /// Treat a failed screening call as "nobody flagged"
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Block indexing never starts before
    #[serde(default = "default_deployment_block")]
    pub deployment_block: u64,

    /// How far behind the head a fresh process starts
    #[serde(default = "default_backfill_blocks")]
    pub backfill_blocks: u64,

    /// Polling interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Row cap of the structured query
    #[serde(default = "default_query_limit")]
    pub query_limit: u32,

    /// Restrict the structured query to the cycle's block range.
    ///
    /// Off by default: every cycle then re-reads the emitter's rows, so
    /// events whose trust batch was not confirmed are retried.
    #[serde(default)]
    pub filter_block_range: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deployment_block: default_deployment_block(),
            backfill_blocks: default_backfill_blocks(),
            poll_interval_secs: default_poll_interval_secs(),
            query_limit: default_query_limit(),
            filter_block_range: false,
        }
    }
}

impl SyncConfig {
    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Trust batch submitter configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SubmitterConfig {
    /// Private key of the signing account (hex, optional 0x prefix)
    pub private_key: String,

    /// Gas limit of the trust batch transaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    /// Maximum time to wait for a receipt, in seconds
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl std::fmt::Debug for SubmitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitterConfig")
            .field("private_key", &"<redacted>")
            .field("gas_limit", &self.gas_limit)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .finish()
    }
}

impl SubmitterConfig {
    /// Confirmation deadline as a `Duration`.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Processing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Mark events processed when every candidate was flagged
    #[serde(default = "default_true")]
    pub retire_when_all_flagged: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            retire_when_all_flagged: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_backing_emitter() -> Address {
    BACKING_EMITTER
}

fn default_screening_timeout_secs() -> u64 {
    30
}

fn default_deployment_block() -> u64 {
    DEPLOYMENT_BLOCK
}

fn default_backfill_blocks() -> u64 {
    BACKFILL_WINDOW
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_query_limit() -> u32 {
    QUERY_ROW_LIMIT
}

fn default_gas_limit() -> u64 {
    TRUST_BATCH_GAS_LIMIT
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Environment variable names used by [`Config::from_env`].
pub mod env {
    /// Node JSON-RPC URL.
    pub const RPC_URL: &str = "NETHERMIND_RPC_URL";
    /// Screening service base URL.
    pub const SCREENING_URL: &str = "ALLOWLIST_ENDPOINT";
    /// Signing key.
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    /// Group contract address.
    pub const BASE_GROUP: &str = "BASEGROUP_ADDRESS";
    /// Optional poll interval override.
    pub const POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `private_key = "${PRIVATE_KEY}"`
    ///
    /// # Example
    /// ```no_run
    /// # use backing_relayer::config::Config;
    /// let config = Config::from_file("relayer.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)?;

        Self::from_toml_str(&expanded)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Reads `NETHERMIND_RPC_URL`, `ALLOWLIST_ENDPOINT`, `PRIVATE_KEY` and
    /// `BASEGROUP_ADDRESS` (all required) plus `POLL_INTERVAL_SECS`
    /// (optional). Everything else takes its default. A `.env` file in the
    /// working directory is consulted for variables the process lacks.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_dotenv(".env")
    }

    /// Like [`Config::from_env`], with an explicit dotenv file.
    ///
    /// Process variables win over the file. A missing file is ignored.
    pub fn from_env_with_dotenv<P: AsRef<Path>>(dotenv_path: P) -> Result<Self> {
        let file_vars = read_dotenv(dotenv_path.as_ref())?;
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                anyhow::anyhow!(
                    "Environment variable '{}' not set and no default value provided",
                    key
                )
            })
        };

        let base_group_raw = required(env::BASE_GROUP)?;
        let base_group = parse_address(&base_group_raw)
            .with_context(|| format!("Invalid {}", env::BASE_GROUP))?;

        let mut sync = SyncConfig::default();
        if let Some(raw) = lookup(env::POLL_INTERVAL_SECS) {
            sync.poll_interval_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {:?}", env::POLL_INTERVAL_SECS, raw))?;
        }

        let config = Config {
            network: NetworkConfig {
                rpc_url: required(env::RPC_URL)?,
            },
            contracts: ContractsConfig {
                base_group,
                backing_emitter: BACKING_EMITTER,
            },
            screening: ScreeningConfig {
                base_url: required(env::SCREENING_URL)?,
                timeout_secs: default_screening_timeout_secs(),
                fail_open: true,
            },
            sync,
            submitter: SubmitterConfig {
                private_key: required(env::PRIVATE_KEY)?,
                gas_limit: default_gas_limit(),
                confirmation_timeout_secs: default_confirmation_timeout_secs(),
            },
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("Network rpc_url", &self.network.rpc_url)?;
        validate_http_url("Screening base_url", &self.screening.base_url)?;

        if self.contracts.base_group.is_zero() {
            anyhow::bail!("Contracts base_group must be a non-zero address");
        }
        if self.contracts.backing_emitter.is_zero() {
            anyhow::bail!("Contracts backing_emitter must be a non-zero address");
        }

        if self.screening.timeout_secs == 0 {
            anyhow::bail!("Screening timeout_secs must be > 0");
        }

        if self.sync.poll_interval_secs == 0 {
            anyhow::bail!("Sync poll_interval_secs must be > 0");
        }
        if self.sync.query_limit == 0 {
            anyhow::bail!("Sync query_limit must be > 0");
        }

        let key = self.submitter.private_key.trim_start_matches("0x");
        if key.len() != 64 {
            anyhow::bail!(
                "Submitter private_key must be 64 hex characters (got {})",
                key.len()
            );
        }
        if !key.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Submitter private_key must be a valid hex string");
        }
        if self.submitter.gas_limit == 0 {
            anyhow::bail!("Submitter gas_limit must be > 0");
        }
        if self.submitter.confirmation_timeout_secs == 0 {
            anyhow::bail!("Submitter confirmation_timeout_secs must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }
}

/// Variables of a dotenv file; empty when the file does not exist.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read dotenv file: {}", path.display()))?
        .map(|item| {
            item.with_context(|| format!("Invalid line in dotenv file: {}", path.display()))
        })
        .collect()
}

fn validate_http_url(field: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        anyhow::bail!("{} cannot be empty", field);
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("{} must start with http:// or https:// (got '{}')", field, url);
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Basic,
    Literal,
    MultiBasic,
    MultiLiteral,
}

/// Expand `${VAR_NAME}` placeholders.
///
/// Placeholders inside comments (a `#` outside any string, up to end of
/// line) are left untouched. Placeholders inside any TOML string form are
/// expanded.
///
/// # Errors
/// Returns an error if a referenced variable is unset, a placeholder is
/// unclosed, or its name is empty.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut quote = Quote::None;
    let mut in_comment = false;
    let mut escaped = false;
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        }

        if escaped {
            escaped = false;
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        }

        if ch == '$' && rest.starts_with("${") {
            let offset = input.len() - rest.len();
            let Some(end) = rest.find('}') else {
                anyhow::bail!(
                    "Unclosed environment variable placeholder at position {}",
                    offset
                );
            };
            let name = &rest[2..end];
            if name.is_empty() {
                anyhow::bail!("Empty environment variable name at position {}", offset);
            }
            let value = std::env::var(name).map_err(|_| {
                anyhow::anyhow!(
                    "Environment variable '{}' is not set (referenced at position {})",
                    name,
                    offset
                )
            })?;
            out.push_str(&value);
            rest = &rest[end + 1..];
            continue;
        }

        let (next_quote, consumed) = match (quote, ch) {
            (Quote::None, '#') => {
                in_comment = true;
                (Quote::None, 1)
            }
            (Quote::None, '"') if rest.starts_with("\"\"\"") => (Quote::MultiBasic, 3),
            (Quote::None, '\'') if rest.starts_with("'''") => (Quote::MultiLiteral, 3),
            (Quote::None, '"') => (Quote::Basic, 1),
            (Quote::None, '\'') => (Quote::Literal, 1),
            (Quote::Basic | Quote::MultiBasic, '\\') => {
                escaped = true;
                (quote, 1)
            }
            (Quote::Basic, '"') | (Quote::Literal, '\'') => (Quote::None, 1),
            (Quote::MultiBasic, '"') if rest.starts_with("\"\"\"") => (Quote::None, 3),
            (Quote::MultiLiteral, '\'') if rest.starts_with("'''") => (Quote::None, 3),
            _ => (quote, ch.len_utf8()),
        };

        quote = next_quote;
        out.push_str(&rest[..consumed]);
        rest = &rest[consumed..];
    }

    Ok(out)
}
