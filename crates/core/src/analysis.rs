//! Analysis service.
//!
//! Composes the prompt builder, language model, response extractor and ledger into the
//! operations exposed by the API layers. Holds no per-request state; one instance is shared by
//! all handlers behind an `Arc`.

use crate::config::CoreConfig;
use crate::constants::{ANALYSIS_MEMO, DAILY_PROGRESS_MEMO};
use crate::error::{CoreError, CoreResult};
use crate::extract::ResponseExtractor;
use crate::ledger::Ledger;
use crate::llm::LanguageModel;
use crate::model::{
    AnalysisRequest, AnalysisResult, DailyProgress, DailyProgressEntry, FormattedAnalysis, Habit,
    StoredAnalysis, ViewingKeyGrant,
};
use crate::prompt::PromptBuilder;
use habit_types::{PatientId, ViewingKey};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AnalysisService {
    model: Arc<dyn LanguageModel>,
    ledger: Arc<dyn Ledger>,
    prompts: PromptBuilder,
    extractor: ResponseExtractor,
    model_timeout: Duration,
    ledger_timeout: Duration,
}

impl AnalysisService {
    /// Creates a service using the response format and timeouts from `cfg`.
    pub fn new(cfg: &CoreConfig, model: Arc<dyn LanguageModel>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            model,
            ledger,
            prompts: PromptBuilder::new(cfg.response_format()),
            extractor: ResponseExtractor::new(cfg.response_format(), cfg.min_block_lines()),
            model_timeout: cfg.model().timeout,
            ledger_timeout: cfg.ledger().timeout,
        }
    }

    /// Runs a behavioural analysis and stores the structured result on the ledger.
    ///
    /// # Arguments
    ///
    /// * `request` - The patient and the four analysis fields.
    ///
    /// # Returns
    ///
    /// The extracted analysis and the hash of the transaction that stored it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ModelUnavailable` if the model call fails or times out,
    /// `CoreError::Serialization` if the analysis cannot be encoded, and
    /// `CoreError::LedgerUnavailable` if it cannot be stored.
    pub async fn analyze(&self, request: &AnalysisRequest) -> CoreResult<AnalysisResult> {
        info!(
            "analysis requested for patient {} via {}",
            request.patient_id,
            self.model.name()
        );

        let messages = self.prompts.messages(request);
        let reply = with_timeout(self.model_timeout, self.model.complete(&messages), || {
            CoreError::ModelUnavailable(format!(
                "no reply within {}s",
                self.model_timeout.as_secs()
            ))
        })
        .await?;

        let analysis = self.extractor.extract(&reply);
        let content = serde_json::to_string(&analysis).map_err(CoreError::Serialization)?;

        let tx_hash = self
            .ledger_call(
                self.ledger
                    .save_analysis(&request.patient_id, &content, ANALYSIS_MEMO),
            )
            .await?;

        info!(
            "stored analysis for patient {} with {} habits, tx {}",
            request.patient_id,
            analysis.recommended_habits.len(),
            tx_hash
        );

        Ok(AnalysisResult { analysis, tx_hash })
    }

    pub async fn create_viewing_key(&self, patient_id: &PatientId) -> CoreResult<ViewingKeyGrant> {
        let grant = self
            .ledger_call(self.ledger.create_viewing_key(patient_id))
            .await?;
        info!("issued viewing key for patient {}", patient_id);
        Ok(grant)
    }

    /// Lists stored analyses for a patient.
    ///
    /// Records without habits are backfilled with the fallback habit set. Content that is not a
    /// stored analysis document is treated as the general analysis text.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AccessDenied` for a rejected viewing key and
    /// `CoreError::LedgerUnavailable` if the ledger cannot be queried.
    pub async fn list_analyses(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<StoredAnalysis>> {
        let records = self
            .ledger_call(self.ledger.query_analyses(patient_id, viewing_key))
            .await?;

        records.into_iter().map(backfill_habits).collect()
    }

    pub async fn save_daily_progress(&self, progress: &DailyProgress) -> CoreResult<String> {
        let tx_hash = self
            .ledger_call(
                self.ledger
                    .save_daily_progress(progress, DAILY_PROGRESS_MEMO),
            )
            .await?;
        info!(
            "stored daily progress for patient {} ({} tasks), tx {}",
            progress.patient_id,
            progress.tasks.len(),
            tx_hash
        );
        Ok(tx_hash)
    }

    pub async fn list_daily_progress(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<DailyProgressEntry>> {
        self.ledger_call(self.ledger.query_daily_progress(patient_id, viewing_key))
            .await
    }

    async fn ledger_call<T>(&self, fut: impl Future<Output = CoreResult<T>>) -> CoreResult<T> {
        with_timeout(self.ledger_timeout, fut, || {
            CoreError::LedgerUnavailable(format!(
                "{} ledger did not answer within {}s",
                self.ledger.name(),
                self.ledger_timeout.as_secs()
            ))
        })
        .await
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = CoreResult<T>>,
    on_timeout: impl FnOnce() -> CoreError,
) -> CoreResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| on_timeout())?
}

fn backfill_habits(mut record: StoredAnalysis) -> CoreResult<StoredAnalysis> {
    let analysis = match serde_json::from_str::<FormattedAnalysis>(&record.content) {
        Ok(analysis) if !analysis.recommended_habits.is_empty() => return Ok(record),
        Ok(analysis) => FormattedAnalysis {
            recommended_habits: Habit::fallback_set(),
            ..analysis
        },
        Err(e) => {
            warn!(
                "stored analysis for patient {} is not structured ({}), wrapping as text",
                record.patient_id, e
            );
            FormattedAnalysis {
                general_analysis: record.content.clone(),
                recommended_habits: Habit::fallback_set(),
            }
        }
    };

    record.content = serde_json::to_string(&analysis).map_err(CoreError::Serialization)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::config::ModelConfig;
    use crate::ledger::InMemoryLedger;
    use crate::llm::{ChatMessage, ChatRole};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Result<String, String>,
        delay: Duration,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> CoreResult<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().map_err(CoreError::ModelUnavailable)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct DownLedger;

    #[async_trait]
    impl Ledger for DownLedger {
        async fn save_analysis(&self, _: &PatientId, _: &str, _: &str) -> CoreResult<String> {
            Err(CoreError::LedgerUnavailable("node unreachable".into()))
        }
        async fn query_analyses(
            &self,
            _: &PatientId,
            _: &ViewingKey,
        ) -> CoreResult<Vec<StoredAnalysis>> {
            Err(CoreError::LedgerUnavailable("node unreachable".into()))
        }
        async fn create_viewing_key(&self, _: &PatientId) -> CoreResult<ViewingKeyGrant> {
            Err(CoreError::LedgerUnavailable("node unreachable".into()))
        }
        async fn save_daily_progress(&self, _: &DailyProgress, _: &str) -> CoreResult<String> {
            Err(CoreError::LedgerUnavailable("node unreachable".into()))
        }
        async fn query_daily_progress(
            &self,
            _: &PatientId,
            _: &ViewingKey,
        ) -> CoreResult<Vec<DailyProgressEntry>> {
            Err(CoreError::LedgerUnavailable("node unreachable".into()))
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    const REPLY: &str = "GENERAL:\nAnalysis text.\n\nHabits:\n1. **Exercise**\n   - **Description:** Walk daily\n   - **Implementation:** 1. Walk 10 min\n   - **Scientific Basis:** CBT studies";

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            patient_id: PatientId::parse("123").unwrap(),
            behavior: "Avoids social events".into(),
            antecedent: "Invitations".into(),
            consequence: "Relief".into(),
            previous_attempts: "None".into(),
        }
    }

    #[tokio::test]
    async fn test_analyze_extracts_and_persists() {
        let model = ScriptedModel::replying(REPLY);
        let ledger = Arc::new(InMemoryLedger::new());
        let service = AnalysisService::new(&test_config(), model.clone(), ledger.clone());

        let result = service.analyze(&request()).await.unwrap();
        assert_eq!(result.analysis.general_analysis, "Analysis text.");
        assert_eq!(result.analysis.recommended_habits[0].name, "Exercise");
        assert_eq!(result.tx_hash.len(), 64);

        let sent = model.seen.lock().unwrap();
        assert_eq!(sent[0][0].role, ChatRole::System);
        assert!(sent[0][1].content.contains("Avoids social events"));
        drop(sent);

        let pid = PatientId::parse("123").unwrap();
        let key = service.create_viewing_key(&pid).await.unwrap().viewing_key;
        let stored = service.list_analyses(&pid, &key).await.unwrap();
        assert_eq!(stored.len(), 1);
        let content: FormattedAnalysis = serde_json::from_str(&stored[0].content).unwrap();
        assert_eq!(content, result.analysis);
    }

    #[tokio::test]
    async fn test_model_failure_is_not_persisted() {
        let model = Arc::new(ScriptedModel {
            reply: Err("quota exceeded".into()),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        });
        let ledger = Arc::new(InMemoryLedger::new());
        let service = AnalysisService::new(&test_config(), model, ledger);

        assert!(matches!(
            service.analyze(&request()).await,
            Err(CoreError::ModelUnavailable(msg)) if msg.contains("quota")
        ));

        let pid = PatientId::parse("123").unwrap();
        let key = service.create_viewing_key(&pid).await.unwrap().viewing_key;
        assert!(service.list_analyses(&pid, &key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_timeout_maps_to_unavailable() {
        let base = test_config();
        let model_cfg = ModelConfig {
            timeout: Duration::from_millis(50),
            ..base.model().clone()
        };
        let cfg = CoreConfig::new(
            model_cfg,
            base.ledger().clone(),
            base.response_format(),
            base.min_block_lines(),
        )
        .unwrap();
        let model = Arc::new(ScriptedModel {
            reply: Ok(REPLY.into()),
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let service = AnalysisService::new(&cfg, model, Arc::new(InMemoryLedger::new()));

        assert!(matches!(
            service.analyze(&request()).await,
            Err(CoreError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_ledger_failure_surfaces() {
        let service = AnalysisService::new(
            &test_config(),
            ScriptedModel::replying(REPLY),
            Arc::new(DownLedger),
        );
        assert!(matches!(
            service.analyze(&request()).await,
            Err(CoreError::LedgerUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_list_analyses_backfills_missing_habits() {
        let ledger = Arc::new(InMemoryLedger::new());
        let pid = PatientId::parse("p").unwrap();
        ledger
            .save_analysis(&pid, r#"{"general_analysis":"old","recommended_habits":[]}"#, "m")
            .await
            .unwrap();
        ledger
            .save_analysis(&pid, r#"{"general_analysis":"older"}"#, "m")
            .await
            .unwrap();
        ledger.save_analysis(&pid, "plain text", "m").await.unwrap();

        let service =
            AnalysisService::new(&test_config(), ScriptedModel::replying(REPLY), ledger);
        let key = service.create_viewing_key(&pid).await.unwrap().viewing_key;
        let stored = service.list_analyses(&pid, &key).await.unwrap();

        let parsed: Vec<FormattedAnalysis> = stored
            .iter()
            .map(|s| serde_json::from_str(&s.content).unwrap())
            .collect();
        assert_eq!(parsed[0].general_analysis, "old");
        assert_eq!(parsed[1].general_analysis, "older");
        assert_eq!(parsed[2].general_analysis, "plain text");
        for analysis in parsed {
            assert_eq!(analysis.recommended_habits, Habit::fallback_set());
        }
    }

    #[test]
    fn test_backfill_leaves_complete_records_untouched() {
        let content = r#"{"general_analysis":"g","recommended_habits":[{"name":"n","description":"d","implementation":["s"],"scientific_basis":"b"}]}"#;
        let record = StoredAnalysis {
            patient_id: "p".into(),
            content: content.into(),
        };
        assert_eq!(backfill_habits(record.clone()).unwrap(), record);
    }

    #[tokio::test]
    async fn test_daily_progress_round_trip() {
        let service = AnalysisService::new(
            &test_config(),
            ScriptedModel::replying(REPLY),
            Arc::new(InMemoryLedger::new()),
        );
        let pid = PatientId::parse("p").unwrap();
        let key = service.create_viewing_key(&pid).await.unwrap().viewing_key;

        let progress = DailyProgress {
            patient_id: pid.clone(),
            date: 1_700_000_000,
            tasks: vec![],
            description: "rested".into(),
        };
        service.save_daily_progress(&progress).await.unwrap();

        let entries = service.list_daily_progress(&pid, &key).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "rested");

        let wrong = ViewingKey::new("wrong").unwrap();
        assert!(matches!(
            service.list_daily_progress(&pid, &wrong).await,
            Err(CoreError::AccessDenied(_))
        ));
    }
}
