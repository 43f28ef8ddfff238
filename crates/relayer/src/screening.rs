//! Address screening against the remote reputation service.
//!
//! The service classifies each address; an address is disqualified when it
//! is flagged as a bot or its category is `blocked` or `flagged`. Calls are
//! stateless: no retry, no backoff, no caching.

use alloy::primitives::Address;
use async_trait::async_trait;
use backing_core::parse_address;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ScreeningConfig;
use crate::error::ScreeningError;

/// Path of the classification endpoint, relative to the base URL.
pub const CLASSIFY_PATH: &str = "bot-analytics/classify";

/// Categories that disqualify an address.
const DISQUALIFYING_CATEGORIES: [&str; 2] = ["blocked", "flagged"];

/// Classifies addresses as disqualified or not.
#[async_trait]
pub trait Screener: Send + Sync {
    /// Return the subset of `addresses` that must not be trusted.
    ///
    /// An `Err` is only returned when the screener is configured fail-closed.
    async fn classify(&self, addresses: &[Address]) -> Result<HashSet<Address>, ScreeningError>;
}

#[async_trait]
impl<T: Screener + ?Sized> Screener for Arc<T> {
    async fn classify(&self, addresses: &[Address]) -> Result<HashSet<Address>, ScreeningError> {
        (**self).classify(addresses).await
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    addresses: &'a [String],
}

/// Response body of the classification endpoint.
///
/// Each verdict is decoded on its own: a malformed entry is dropped with a
/// warning and never discards the verdicts next to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyResponse {
    /// One verdict per screened address
    #[serde(default, deserialize_with = "lenient_verdicts")]
    pub verdicts: Vec<Verdict>,
}

/// Raw classification of one address.
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    /// Address as echoed by the service
    pub address: String,
    /// Automated-account flag; null or missing counts as false
    #[serde(default, deserialize_with = "truthy")]
    pub is_bot: bool,
    /// Categorical verdict, e.g. `clean`, `blocked`, `flagged`
    #[serde(default, deserialize_with = "string_or_none")]
    pub category: Option<String>,
}

fn lenient_verdicts<'de, D>(deserializer: D) -> Result<Vec<Verdict>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match Verdict::deserialize(&value) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!("Ignoring malformed screening verdict {}: {}", value, e);
                None
            }
        })
        .collect())
}

/// JSON truthiness: false, null, 0, "" and empty containers are false.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

impl Verdict {
    /// Whether this verdict disqualifies the address.
    pub fn is_flagged(&self) -> bool {
        self.is_bot
            || self
                .category
                .as_deref()
                .is_some_and(|c| DISQUALIFYING_CATEGORIES.contains(&c))
    }
}

impl ClassifyResponse {
    /// Addresses with a disqualifying verdict.
    ///
    /// Verdicts whose address cannot be parsed are skipped with a warning.
    pub fn flagged(&self) -> HashSet<Address> {
        self.verdicts
            .iter()
            .filter(|v| v.is_flagged())
            .filter_map(|v| match parse_address(&v.address) {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!("Ignoring screening verdict: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// HTTP client for the screening service.
#[derive(Clone)]
pub struct ScreeningClient {
    client: Client,
    classify_url: String,
    fail_open: bool,
}

impl ScreeningClient {
    /// Build a client with explicit settings.
    pub fn new(base_url: &str, timeout: Duration, fail_open: bool) -> Result<Self, ScreeningError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("backing-relayer/screening")
            .build()
            .map_err(|e| ScreeningError::Request(e.to_string()))?;

        Ok(Self {
            client,
            classify_url: format!("{}/{}", base_url.trim().trim_end_matches('/'), CLASSIFY_PATH),
            fail_open,
        })
    }

    /// Build a client from the screening section of the config.
    pub fn from_config(config: &ScreeningConfig) -> Result<Self, ScreeningError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.fail_open,
        )
    }

    /// Full URL of the classification endpoint.
    pub fn classify_url(&self) -> &str {
        &self.classify_url
    }

    /// Post `addresses` and return the raw verdicts.
    pub async fn request_verdicts(
        &self,
        addresses: &[Address],
    ) -> Result<ClassifyResponse, ScreeningError> {
        let addresses: Vec<String> = addresses
            .iter()
            .map(|a| alloy::hex::encode_prefixed(a))
            .collect();

        let response = self
            .client
            .post(&self.classify_url)
            .json(&ClassifyRequest {
                addresses: &addresses,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScreeningError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Screener for ScreeningClient {
    async fn classify(&self, addresses: &[Address]) -> Result<HashSet<Address>, ScreeningError> {
        if addresses.is_empty() {
            return Ok(HashSet::new());
        }

        match self.request_verdicts(addresses).await {
            Ok(response) => {
                let flagged = response.flagged();
                debug!(
                    "Screened {} addresses, {} flagged",
                    addresses.len(),
                    flagged.len()
                );
                Ok(flagged)
            }
            Err(e) if self.fail_open => {
                warn!("Screening failed, treating all addresses as clean: {}", e);
                Ok(HashSet::new())
            }
            Err(e) => Err(e),
        }
    }
}
