//! Request and response bodies.
//!
//! These mirror the `habit-core` records but carry OpenAPI schemas and keep the wire format
//! independent of core type changes. Inbound bodies are validated when converted into core
//! records.

use habit_core::{
    AnalysisRequest, AnalysisResult, CoreError, DailyProgress, DailyProgressEntry,
    FormattedAnalysis, Habit, PatientId, StoredAnalysis, Task, ViewingKeyGrant,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct WelcomeRes {
    pub message: String,
}

/// Error body returned by every failing endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct ErrorRes {
    /// Human-readable description.
    pub detail: String,
    /// Machine-readable class, e.g. `invalid_input` or `model_unavailable`.
    pub kind: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct AnalyzeReq {
    #[schema(example = "123")]
    pub patient_id: String,
    #[schema(example = "Avoids social events")]
    pub behavior: String,
    #[schema(example = "Invitations from coworkers")]
    pub antecedent: String,
    #[schema(example = "Immediate relief, later loneliness")]
    pub consequence: String,
    #[schema(example = "Tried forcing attendance once")]
    pub previous_attempts: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct HabitRes {
    pub name: String,
    pub description: String,
    pub implementation: Vec<String>,
    pub scientific_basis: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct FormattedAnalysisRes {
    pub general_analysis: String,
    pub recommended_habits: Vec<HabitRes>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct AnalyzeRes {
    pub analysis: FormattedAnalysisRes,
    pub tx_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct ViewingKeyRes {
    pub viewing_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// One stored analysis. `content` is a JSON-encoded `FormattedAnalysisRes`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct StoredAnalysisRes {
    pub patient_id: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct ListAnalysesRes {
    pub analyses: Vec<StoredAnalysisRes>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct TaskDto {
    #[schema(example = "Deep Breathing")]
    pub name: String,
    pub completed: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct DailyProgressReq {
    pub patient_id: String,
    /// Unix timestamp in seconds.
    pub date: u64,
    pub tasks: Vec<TaskDto>,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct DailyProgressRes {
    pub tx_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct DailyProgressEntryRes {
    pub id: String,
    pub date: u64,
    pub tasks: Vec<TaskDto>,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, ToSchema)]
pub struct ListDailyProgressRes {
    pub progress: Vec<DailyProgressEntryRes>,
}

/// Query string carrying a viewing key.
#[derive(Deserialize, Clone, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewingKeyQuery {
    pub viewing_key: String,
}

impl TryFrom<AnalyzeReq> for AnalysisRequest {
    type Error = CoreError;

    fn try_from(req: AnalyzeReq) -> Result<Self, Self::Error> {
        Ok(AnalysisRequest {
            patient_id: PatientId::parse(&req.patient_id)?,
            behavior: req.behavior,
            antecedent: req.antecedent,
            consequence: req.consequence,
            previous_attempts: req.previous_attempts,
        })
    }
}

impl From<Habit> for HabitRes {
    fn from(h: Habit) -> Self {
        HabitRes {
            name: h.name,
            description: h.description,
            implementation: h.implementation,
            scientific_basis: h.scientific_basis,
        }
    }
}

impl From<FormattedAnalysis> for FormattedAnalysisRes {
    fn from(a: FormattedAnalysis) -> Self {
        FormattedAnalysisRes {
            general_analysis: a.general_analysis,
            recommended_habits: a.recommended_habits.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<AnalysisResult> for AnalyzeRes {
    fn from(r: AnalysisResult) -> Self {
        AnalyzeRes {
            analysis: r.analysis.into(),
            tx_hash: r.tx_hash,
        }
    }
}

impl From<ViewingKeyGrant> for ViewingKeyRes {
    fn from(g: ViewingKeyGrant) -> Self {
        ViewingKeyRes {
            viewing_key: g.viewing_key.expose().to_string(),
            tx_hash: g.tx_hash,
        }
    }
}

impl From<StoredAnalysis> for StoredAnalysisRes {
    fn from(s: StoredAnalysis) -> Self {
        StoredAnalysisRes {
            patient_id: s.patient_id,
            content: s.content,
        }
    }
}

impl From<TaskDto> for Task {
    fn from(t: TaskDto) -> Self {
        Task {
            name: t.name,
            completed: t.completed,
        }
    }
}

impl From<Task> for TaskDto {
    fn from(t: Task) -> Self {
        TaskDto {
            name: t.name,
            completed: t.completed,
        }
    }
}

impl TryFrom<DailyProgressReq> for DailyProgress {
    type Error = CoreError;

    fn try_from(req: DailyProgressReq) -> Result<Self, Self::Error> {
        Ok(DailyProgress {
            patient_id: PatientId::parse(&req.patient_id)?,
            date: req.date,
            tasks: req.tasks.into_iter().map(Into::into).collect(),
            description: req.description,
        })
    }
}

impl From<DailyProgressEntry> for DailyProgressEntryRes {
    fn from(e: DailyProgressEntry) -> Self {
        DailyProgressEntryRes {
            id: e.id,
            date: e.date,
            tasks: e.tasks.into_iter().map(Into::into).collect(),
            description: e.description,
        }
    }
}
