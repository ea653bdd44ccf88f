//! Constants used throughout the habit core crate.
//!
//! Environment variable names, defaults, and the canned text substituted by the response
//! extractor live here so the prompt templates, extractor, and configuration agree on them.

/// Environment variable holding the model provider API key.
pub const ENV_MODEL_API_KEY: &str = "SECRET_AI_API_KEY";
/// Environment variable holding the model provider base URL.
pub const ENV_MODEL_BASE_URL: &str = "SECRET_AI_BASE_URL";
/// Environment variable holding the model name.
pub const ENV_MODEL_NAME: &str = "SECRET_AI_MODEL";
/// Environment variable holding the sampling temperature.
pub const ENV_MODEL_TEMPERATURE: &str = "SECRET_AI_TEMPERATURE";
/// Environment variable holding the model request timeout in seconds.
pub const ENV_MODEL_TIMEOUT_SECS: &str = "MODEL_TIMEOUT_SECS";
/// Environment variable holding the wallet mnemonic.
pub const ENV_WALLET_MNEMONIC: &str = "SECRET_MNEMONIC";
/// Environment variable holding the ledger contract address.
pub const ENV_CONTRACT_ADDRESS: &str = "CONTRACT_ADDRESS";
/// Environment variable holding the ledger contract code hash.
pub const ENV_CONTRACT_CODE_HASH: &str = "CONTRACT_CODE_HASH";
/// Environment variable selecting the ledger backend (`memory` or `relay`).
pub const ENV_LEDGER_BACKEND: &str = "LEDGER_BACKEND";
/// Environment variable holding the ledger relay base URL.
pub const ENV_LEDGER_RELAY_URL: &str = "LEDGER_RELAY_URL";
/// Environment variable holding the ledger request timeout in seconds.
pub const ENV_LEDGER_TIMEOUT_SECS: &str = "LEDGER_TIMEOUT_SECS";
/// Environment variable selecting the response format version.
pub const ENV_RESPONSE_FORMAT: &str = "RESPONSE_FORMAT";
/// Environment variable overriding the minimum habit block size.
pub const ENV_MIN_HABIT_BLOCK_LINES: &str = "MIN_HABIT_BLOCK_LINES";

/// Default OpenAI-compatible base URL (a local Ollama-style endpoint).
pub const DEFAULT_MODEL_BASE_URL: &str = "http://localhost:11434/v1";
/// Default model name.
pub const DEFAULT_MODEL_NAME: &str = "deepseek-r1:70b";
/// Default sampling temperature.
pub const DEFAULT_MODEL_TEMPERATURE: f32 = 1.0;
/// Default model request timeout in seconds.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;
/// Default ledger request timeout in seconds.
pub const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;
/// Default minimum number of non-empty lines for a habit block to be kept.
pub const DEFAULT_MIN_HABIT_BLOCK_LINES: usize = 4;

/// Memo attached to analysis transactions.
pub const ANALYSIS_MEMO: &str = "Save analysis";
/// Memo attached to daily progress transactions.
pub const DAILY_PROGRESS_MEMO: &str = "Save daily progress";

/// Label preceding the general analysis in model replies.
pub const GENERAL_LABEL: &str = "GENERAL:";

/// Placeholder habit name.
pub const DEFAULT_HABIT_NAME: &str = "Habit";
/// Placeholder habit description.
pub const DEFAULT_HABIT_DESCRIPTION: &str = "Practice this habit regularly";
/// Placeholder implementation steps.
pub const DEFAULT_HABIT_STEPS: [&str; 3] = [
    "Start with a small, specific version of the habit",
    "Practice it at the same time each day",
    "Review progress weekly and adjust",
];
/// Placeholder scientific basis.
pub const DEFAULT_HABIT_BASIS: &str = "Based on behavioral psychology principles";
