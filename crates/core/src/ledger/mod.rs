//! Ledger collaborator.
//!
//! Analyses, viewing keys and daily progress are persisted through a wallet-signed smart contract.
//! The service only depends on the [`Ledger`] trait; two implementations are provided:
//!
//! - [`InMemoryLedger`]: process-local store that reproduces the contract's rules. Used for local
//!   development and tests.
//! - [`RelayLedger`]: HTTP client for a signing relay that owns transaction signing and contract
//!   encryption.
//!
//! Both speak in terms of the contract's execute and query messages ([`ExecuteMsg`],
//! [`QueryMsg`]) so the wire format is defined in one place.

mod memory;
mod relay;

pub use memory::InMemoryLedger;
pub use relay::RelayLedger;

use crate::config::{LedgerBackend, LedgerConfig};
use crate::error::CoreResult;
use crate::model::{DailyProgress, DailyProgressEntry, StoredAnalysis, Task, ViewingKeyGrant};
use async_trait::async_trait;
use habit_types::{PatientId, ViewingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persistence operations offered by the contract.
///
/// Implementations map transport and contract failures to `CoreError::LedgerUnavailable`, and
/// rejected viewing keys to `CoreError::AccessDenied`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Stores a serialised analysis and returns the transaction hash.
    async fn save_analysis(
        &self,
        patient_id: &PatientId,
        content: &str,
        memo: &str,
    ) -> CoreResult<String>;

    /// Returns every analysis stored for the patient, oldest first.
    async fn query_analyses(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<StoredAnalysis>>;

    /// Issues a viewing key for the patient, replacing any earlier one.
    async fn create_viewing_key(&self, patient_id: &PatientId) -> CoreResult<ViewingKeyGrant>;

    async fn save_daily_progress(&self, progress: &DailyProgress, memo: &str)
        -> CoreResult<String>;

    async fn query_daily_progress(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<DailyProgressEntry>>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}

/// State-changing contract messages.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    SaveAnalysis {
        patient_id: String,
        content: String,
    },
    CreateViewingKey {
        patient_id: String,
    },
    SaveDailyProgress {
        patient_id: String,
        date: u64,
        tasks: Vec<Task>,
        description: String,
    },
}

impl ExecuteMsg {
    pub fn save_analysis(patient_id: &PatientId, content: &str) -> Self {
        ExecuteMsg::SaveAnalysis {
            patient_id: patient_id.to_string(),
            content: content.to_string(),
        }
    }

    pub fn create_viewing_key(patient_id: &PatientId) -> Self {
        ExecuteMsg::CreateViewingKey {
            patient_id: patient_id.to_string(),
        }
    }

    pub fn save_daily_progress(progress: &DailyProgress) -> Self {
        ExecuteMsg::SaveDailyProgress {
            patient_id: progress.patient_id.to_string(),
            date: progress.date,
            tasks: progress.tasks.clone(),
            description: progress.description.clone(),
        }
    }
}

/// Read-only contract queries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetAnalyses {
        patient_id: String,
        viewing_key: String,
    },
    GetDailyProgress {
        patient_id: String,
    },
}

/// Daily progress record as returned by the contract.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractDailyProgress {
    pub patient_id: String,
    pub date: u64,
    pub tasks: Vec<Task>,
    pub description: String,
}

/// Builds the ledger selected by configuration.
///
/// # Errors
///
/// Returns `CoreError::LedgerUnavailable` if the relay client cannot be constructed.
pub fn from_config(cfg: &LedgerConfig) -> CoreResult<Arc<dyn Ledger>> {
    match &cfg.backend {
        LedgerBackend::Memory => {
            tracing::info!("using in-memory ledger");
            Ok(Arc::new(InMemoryLedger::new()))
        }
        LedgerBackend::Relay { url } => {
            tracing::info!("using ledger relay at {}", url);
            Ok(Arc::new(RelayLedger::new(cfg)?))
        }
    }
}

/// Random 64-character upper-case hex string in the shape of a transaction hash.
pub(crate) fn random_tx_hash() -> String {
    hex::encode_upper(rand::random::<[u8; 32]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_messages_match_contract_json() {
        let id = PatientId::parse("p1").unwrap();
        assert_eq!(
            serde_json::to_value(ExecuteMsg::save_analysis(&id, "{}")).unwrap(),
            serde_json::json!({"save_analysis": {"patient_id": "p1", "content": "{}"}})
        );
        assert_eq!(
            serde_json::to_value(ExecuteMsg::create_viewing_key(&id)).unwrap(),
            serde_json::json!({"create_viewing_key": {"patient_id": "p1"}})
        );

        let progress = DailyProgress {
            patient_id: id,
            date: 1_700_000_000,
            tasks: vec![Task {
                name: "Deep Breathing".into(),
                completed: true,
            }],
            description: "calmer".into(),
        };
        assert_eq!(
            serde_json::to_value(ExecuteMsg::save_daily_progress(&progress)).unwrap(),
            serde_json::json!({"save_daily_progress": {
                "patient_id": "p1",
                "date": 1_700_000_000u64,
                "tasks": [{"name": "Deep Breathing", "completed": true}],
                "description": "calmer"
            }})
        );
    }

    #[test]
    fn query_messages_match_contract_json() {
        let q = QueryMsg::GetAnalyses {
            patient_id: "p1".into(),
            viewing_key: "k".into(),
        };
        assert_eq!(
            serde_json::to_value(q).unwrap(),
            serde_json::json!({"get_analyses": {"patient_id": "p1", "viewing_key": "k"}})
        );
        let q = QueryMsg::GetDailyProgress {
            patient_id: "p1".into(),
        };
        assert_eq!(
            serde_json::to_value(q).unwrap(),
            serde_json::json!({"get_daily_progress": {"patient_id": "p1"}})
        );
    }

    #[test]
    fn tx_hashes_are_upper_hex() {
        let hash = random_tx_hash();
        assert_eq!(hash.len(), 64);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(hash, random_tx_hash());
    }
}
