use super::{random_tx_hash, Ledger};
use crate::error::{CoreError, CoreResult};
use crate::model::{DailyProgress, DailyProgressEntry, StoredAnalysis, ViewingKeyGrant};
use async_trait::async_trait;
use habit_types::{PatientId, ViewingKey};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    analyses: Vec<StoredAnalysis>,
    daily_progress: Vec<(String, DailyProgress)>,
    viewing_keys: HashMap<PatientId, String>,
}

impl State {
    fn check_key(&self, patient_id: &PatientId, viewing_key: &ViewingKey) -> CoreResult<()> {
        match self.viewing_keys.get(patient_id) {
            Some(key) if key == viewing_key.expose() => Ok(()),
            _ => Err(CoreError::AccessDenied("Invalid viewing key".into())),
        }
    }
}

/// Ledger held in process memory.
///
/// Follows the contract's rules: records are append-only, each patient has at most one viewing
/// key, and analyses and daily progress can only be read with that key. Contents are lost when
/// the process exits.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn save_analysis(
        &self,
        patient_id: &PatientId,
        content: &str,
        memo: &str,
    ) -> CoreResult<String> {
        let mut state = self.state.write().await;
        state.analyses.push(StoredAnalysis {
            patient_id: patient_id.to_string(),
            content: content.to_string(),
        });
        let tx_hash = random_tx_hash();
        tracing::debug!("stored analysis for {} ({}), tx {}", patient_id, memo, tx_hash);
        Ok(tx_hash)
    }

    async fn query_analyses(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<StoredAnalysis>> {
        let state = self.state.read().await;
        state.check_key(patient_id, viewing_key)?;
        Ok(state
            .analyses
            .iter()
            .filter(|a| a.patient_id == patient_id.as_str())
            .cloned()
            .collect())
    }

    async fn create_viewing_key(&self, patient_id: &PatientId) -> CoreResult<ViewingKeyGrant> {
        let key = hex::encode(rand::random::<[u8; 16]>());
        let viewing_key = ViewingKey::new(&key)?;

        let mut state = self.state.write().await;
        state.viewing_keys.insert(patient_id.clone(), key);

        Ok(ViewingKeyGrant {
            viewing_key,
            tx_hash: Some(random_tx_hash()),
        })
    }

    async fn save_daily_progress(
        &self,
        progress: &DailyProgress,
        memo: &str,
    ) -> CoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut state = self.state.write().await;
        state.daily_progress.push((id, progress.clone()));
        let tx_hash = random_tx_hash();
        tracing::debug!(
            "stored daily progress for {} ({}), tx {}",
            progress.patient_id,
            memo,
            tx_hash
        );
        Ok(tx_hash)
    }

    async fn query_daily_progress(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<DailyProgressEntry>> {
        let state = self.state.read().await;
        state.check_key(patient_id, viewing_key)?;
        Ok(state
            .daily_progress
            .iter()
            .filter(|(_, p)| &p.patient_id == patient_id)
            .map(|(id, p)| DailyProgressEntry {
                id: id.clone(),
                date: p.date,
                tasks: p.tasks.clone(),
                description: p.description.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
