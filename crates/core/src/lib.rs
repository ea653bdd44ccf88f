//! # Habit Core
//!
//! Core business logic for the behavioural analysis service.
//!
//! This crate contains the analysis pipeline and its collaborators:
//! - Prompt construction from the four functional-analysis fields
//! - A language-model client trait with an OpenAI-compatible HTTP implementation
//! - Tolerant extraction of `{general_analysis, recommended_habits}` from model replies
//! - A ledger trait for contract persistence, with in-memory and relay implementations
//! - Startup configuration resolved once into [`CoreConfig`]
//!
//! **No API concerns**: HTTP routing, request DTOs and CORS belong in `api-rest` and `api-shared`.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod format;
pub mod ledger;
pub mod llm;
pub mod model;
pub mod prompt;

pub use analysis::AnalysisService;
pub use config::{CoreConfig, LedgerBackend, LedgerConfig, ModelConfig};
pub use error::{ConfigError, CoreError, CoreResult};
pub use extract::ResponseExtractor;
pub use format::ResponseFormat;
pub use ledger::{InMemoryLedger, Ledger, RelayLedger};
pub use llm::{ChatMessage, ChatRole, LanguageModel, OpenAiCompatibleClient};
pub use model::{
    AnalysisRequest, AnalysisResult, DailyProgress, DailyProgressEntry, FormattedAnalysis, Habit,
    StoredAnalysis, Task, ViewingKeyGrant,
};
pub use prompt::PromptBuilder;

pub use habit_types::{NonEmptyText, PatientId, TextError, ViewingKey};
