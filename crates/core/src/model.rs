//! Domain records exchanged between the prompt builder, extractor, ledger and API layers.

use crate::constants::{
    DEFAULT_HABIT_BASIS, DEFAULT_HABIT_DESCRIPTION, DEFAULT_HABIT_NAME, DEFAULT_HABIT_STEPS,
};
use habit_types::PatientId;
use serde::{Deserialize, Serialize};

/// The four free-text fields of a functional behavioural analysis, plus the patient they
/// belong to. Field content is not validated; only presence is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub patient_id: PatientId,
    pub behavior: String,
    pub antecedent: String,
    pub consequence: String,
    pub previous_attempts: String,
}

/// A suggested behavioural intervention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub name: String,
    pub description: String,
    pub implementation: Vec<String>,
    pub scientific_basis: String,
}

impl Habit {
    /// A habit made entirely of placeholder text.
    pub fn placeholder() -> Self {
        Self {
            name: DEFAULT_HABIT_NAME.to_string(),
            description: DEFAULT_HABIT_DESCRIPTION.to_string(),
            implementation: default_steps(),
            scientific_basis: DEFAULT_HABIT_BASIS.to_string(),
        }
    }

    /// The canned habits used when nothing could be extracted from a reply, and to backfill
    /// stored analyses that predate habit extraction.
    pub fn fallback_set() -> Vec<Habit> {
        vec![
            Habit {
                name: "Gradual Exposure".to_string(),
                description: "Start with small, manageable steps toward the avoided situation"
                    .to_string(),
                implementation: vec![
                    "Begin with brief, low-pressure exposures".to_string(),
                    "Practice with trusted friends or family".to_string(),
                    "Gradually increase duration and complexity".to_string(),
                ],
                scientific_basis: "Based on exposure therapy principles".to_string(),
            },
            Habit {
                name: "Self-Monitoring".to_string(),
                description: "Keep a short daily record of the behavior and its context"
                    .to_string(),
                implementation: vec![
                    "Note when the behavior occurs and what preceded it".to_string(),
                    "Record what happened immediately afterwards".to_string(),
                    "Review the log weekly to spot patterns".to_string(),
                ],
                scientific_basis: "Based on self-monitoring research in behavior analysis"
                    .to_string(),
            },
        ]
    }
}

pub(crate) fn default_steps() -> Vec<String> {
    DEFAULT_HABIT_STEPS.iter().map(|s| s.to_string()).collect()
}

/// Structured form of a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedAnalysis {
    pub general_analysis: String,
    #[serde(default)]
    pub recommended_habits: Vec<Habit>,
}

/// Result of a completed analysis: the extracted record and the ledger transaction that
/// persisted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub analysis: FormattedAnalysis,
    pub tx_hash: String,
}

/// One analysis record as held by the ledger. `content` is a serialised `FormattedAnalysis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub patient_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub completed: bool,
}

/// A day's checklist submitted by a patient. `date` is a unix timestamp in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub patient_id: PatientId,
    pub date: u64,
    pub tasks: Vec<Task>,
    pub description: String,
}

/// Query-side view of a stored daily progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgressEntry {
    pub id: String,
    pub date: u64,
    pub tasks: Vec<Task>,
    pub description: String,
}

/// Result of issuing a viewing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewingKeyGrant {
    pub viewing_key: habit_types::ViewingKey,
    pub tx_hash: Option<String>,
}
