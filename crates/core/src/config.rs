//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Handlers never read environment variables during request handling;
//! they receive an `Arc<CoreConfig>` built here.
//!
//! Values are read through a lookup function so tests can supply a map instead of mutating the
//! process environment.

use crate::constants::*;
use crate::error::ConfigError;
use crate::format::ResponseFormat;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Accepted mnemonic lengths (BIP-39).
const MNEMONIC_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Characters permitted in the data part of a bech32 address.
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Hex characters of the wallet fingerprint sent to the ledger relay.
const FINGERPRINT_LEN: usize = 16;

/// Connection settings for the language-model provider.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Which ledger implementation the service talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBackend {
    /// Process-local store with contract-like semantics.
    Memory,
    /// HTTP signing relay at the given base URL.
    Relay { url: String },
}

impl LedgerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerBackend::Memory => "memory",
            LedgerBackend::Relay { .. } => "relay",
        }
    }
}

/// Wallet and contract settings for the ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub contract_address: String,
    pub code_hash: String,
    pub mnemonic: SecretString,
    pub timeout: Duration,
}

impl LedgerConfig {
    /// Short SHA-256 fingerprint of the wallet mnemonic.
    ///
    /// Identifies the wallet to the relay without disclosing the mnemonic. Words are joined by
    /// single spaces before hashing, so incidental whitespace does not change the fingerprint.
    pub fn wallet_fingerprint(&self) -> String {
        let normalised = self
            .mnemonic
            .expose_secret()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let digest = Sha256::digest(normalised.as_bytes());
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(FINGERPRINT_LEN);
        fingerprint
    }
}

/// Core configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    model: ModelConfig,
    ledger: LedgerConfig,
    response_format: ResponseFormat,
    min_block_lines: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig` from already-parsed parts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `min_block_lines` is zero.
    pub fn new(
        model: ModelConfig,
        ledger: LedgerConfig,
        response_format: ResponseFormat,
        min_block_lines: usize,
    ) -> Result<Self, ConfigError> {
        if min_block_lines == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MIN_HABIT_BLOCK_LINES,
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            model,
            ledger,
            response_format,
            min_block_lines,
        })
    }

    /// Resolve configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` beforehand if `.env` files should be honoured.
    ///
    /// # Errors
    ///
    /// See [`CoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for an environment variable name, if set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if a required variable is absent or blank, and
    /// `ConfigError::InvalidValue` if any value fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::MissingEnvVar(key));

        let api_key = require(ENV_MODEL_API_KEY)?;
        let mnemonic = require(ENV_WALLET_MNEMONIC)?;
        let contract_address = require(ENV_CONTRACT_ADDRESS)?;
        let code_hash = require(ENV_CONTRACT_CODE_HASH)?;

        validate_mnemonic(&mnemonic)?;
        validate_contract_address(&contract_address)?;
        validate_code_hash(&code_hash)?;

        let base_url = get(ENV_MODEL_BASE_URL).unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.into());
        validate_http_url(ENV_MODEL_BASE_URL, &base_url)?;

        let temperature = match get(ENV_MODEL_TEMPERATURE) {
            Some(raw) => parse_temperature(&raw)?,
            None => DEFAULT_MODEL_TEMPERATURE,
        };

        let model = ModelConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            model: get(ENV_MODEL_NAME).unwrap_or_else(|| DEFAULT_MODEL_NAME.into()),
            temperature,
            timeout: parse_timeout(
                ENV_MODEL_TIMEOUT_SECS,
                get(ENV_MODEL_TIMEOUT_SECS),
                DEFAULT_MODEL_TIMEOUT_SECS,
            )?,
        };

        let backend = match get(ENV_LEDGER_BACKEND).as_deref().map(str::to_ascii_lowercase) {
            None => LedgerBackend::Memory,
            Some(b) if b == "memory" => LedgerBackend::Memory,
            Some(b) if b == "relay" => {
                let url = require(ENV_LEDGER_RELAY_URL)?;
                validate_http_url(ENV_LEDGER_RELAY_URL, &url)?;
                LedgerBackend::Relay {
                    url: url.trim_end_matches('/').to_string(),
                }
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LEDGER_BACKEND,
                    message: format!("unknown backend {other:?} (expected memory or relay)"),
                })
            }
        };

        let ledger = LedgerConfig {
            backend,
            contract_address,
            code_hash: code_hash.to_ascii_lowercase(),
            mnemonic: SecretString::from(mnemonic),
            timeout: parse_timeout(
                ENV_LEDGER_TIMEOUT_SECS,
                get(ENV_LEDGER_TIMEOUT_SECS),
                DEFAULT_LEDGER_TIMEOUT_SECS,
            )?,
        };

        let response_format = match get(ENV_RESPONSE_FORMAT) {
            Some(raw) => raw.parse()?,
            None => ResponseFormat::default(),
        };

        let min_block_lines = match get(ENV_MIN_HABIT_BLOCK_LINES) {
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_MIN_HABIT_BLOCK_LINES,
                message: e.to_string(),
            })?,
            None => DEFAULT_MIN_HABIT_BLOCK_LINES,
        };

        Self::new(model, ledger, response_format, min_block_lines)
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn ledger(&self) -> &LedgerConfig {
        &self.ledger
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    pub fn min_block_lines(&self) -> usize {
        self.min_block_lines
    }

    /// Key/value pairs describing the configuration with secrets redacted.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            (ENV_MODEL_BASE_URL, self.model.base_url.clone()),
            (ENV_MODEL_NAME, self.model.model.clone()),
            (ENV_MODEL_TEMPERATURE, self.model.temperature.to_string()),
            (
                ENV_MODEL_TIMEOUT_SECS,
                self.model.timeout.as_secs().to_string(),
            ),
            (ENV_MODEL_API_KEY, "[redacted]".to_string()),
            (
                ENV_WALLET_MNEMONIC,
                format!("[redacted] fingerprint={}", self.ledger.wallet_fingerprint()),
            ),
            (ENV_CONTRACT_ADDRESS, self.ledger.contract_address.clone()),
            (ENV_CONTRACT_CODE_HASH, self.ledger.code_hash.clone()),
            (ENV_LEDGER_BACKEND, self.ledger.backend.as_str().to_string()),
        ];
        if let LedgerBackend::Relay { url } = &self.ledger.backend {
            rows.push((ENV_LEDGER_RELAY_URL, url.clone()));
        }
        rows.extend([
            (
                ENV_LEDGER_TIMEOUT_SECS,
                self.ledger.timeout.as_secs().to_string(),
            ),
            (ENV_RESPONSE_FORMAT, self.response_format.to_string()),
            (ENV_MIN_HABIT_BLOCK_LINES, self.min_block_lines.to_string()),
        ]);
        rows
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        message: message.into(),
    }
}

fn validate_mnemonic(mnemonic: &str) -> Result<(), ConfigError> {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if !MNEMONIC_WORD_COUNTS.contains(&words.len()) {
        // Never echo the mnemonic itself.
        return Err(invalid(
            ENV_WALLET_MNEMONIC,
            format!(
                "expected 12, 15, 18, 21 or 24 words, found {}",
                words.len()
            ),
        ));
    }
    if !words
        .iter()
        .all(|w| w.chars().all(|c| c.is_ascii_lowercase()))
    {
        return Err(invalid(
            ENV_WALLET_MNEMONIC,
            "words must be lowercase ASCII letters",
        ));
    }
    Ok(())
}

fn validate_contract_address(address: &str) -> Result<(), ConfigError> {
    let Some((prefix, data)) = address.rsplit_once('1') else {
        return Err(invalid(
            ENV_CONTRACT_ADDRESS,
            "expected a bech32 address such as secret1...",
        ));
    };
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid(
            ENV_CONTRACT_ADDRESS,
            "address prefix must be lowercase letters",
        ));
    }
    if data.len() < 6 || !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
        return Err(invalid(
            ENV_CONTRACT_ADDRESS,
            "address data part is not valid bech32",
        ));
    }
    Ok(())
}

fn validate_code_hash(hash: &str) -> Result<(), ConfigError> {
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            ENV_CONTRACT_CODE_HASH,
            "expected 64 hexadecimal characters",
        ));
    }
    Ok(())
}

fn validate_http_url(key: &'static str, url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(invalid(key, format!("expected an http(s) URL, got {url:?}"))),
    }
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let value: f32 = raw
        .parse()
        .map_err(|e: std::num::ParseFloatError| invalid(ENV_MODEL_TEMPERATURE, e.to_string()))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid(
            ENV_MODEL_TEMPERATURE,
            "must be between 0.0 and 2.0",
        ));
    }
    Ok(value)
}

fn parse_timeout(
    key: &'static str,
    raw: Option<String>,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| invalid(key, e.to_string()))?,
        None => default_secs,
    };
    if secs == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
