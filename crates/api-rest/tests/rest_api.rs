//! End-to-end tests for the REST API.
//!
//! Each test starts the real router on an ephemeral port, backed by a scripted language model
//! and the in-memory ledger, and drives it over HTTP.

use api_rest::{cors_layer, router, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use habit_core::{
    AnalysisService, ChatMessage, CoreConfig, CoreError, CoreResult, FormattedAnalysis,
    InMemoryLedger, LanguageModel,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const REPLY: &str = "GENERAL:\nAnalysis text.\n\nHabits:\n1. **Exercise**\n   - **Description:** Walk daily\n   - **Implementation:** 1. Walk 10 min\n   - **Scientific Basis:** CBT studies";

struct ScriptedModel(Result<&'static str, &'static str>);

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> CoreResult<String> {
        self.0
            .map(str::to_string)
            .map_err(|e| CoreError::ModelUnavailable(e.to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn config() -> CoreConfig {
    let env = HashMap::from([
        ("SECRET_AI_API_KEY", "sk-test"),
        (
            "SECRET_MNEMONIC",
            "abandon ability able about above absent absorb abstract absurd abuse access accident",
        ),
        (
            "CONTRACT_ADDRESS",
            "secret1qpzry9x8gf2tvdw0s3jn54khce6mua7lmqqqxw",
        ),
        (
            "CONTRACT_CODE_HASH",
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        ),
    ]);
    CoreConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

fn app(model: ScriptedModel) -> axum::Router {
    let service = AnalysisService::new(
        &config(),
        Arc::new(model),
        Arc::new(InMemoryLedger::new()),
    );
    router(
        AppState {
            service: Arc::new(service),
        },
        cors_layer(&[]).unwrap(),
    )
}

async fn spawn(model: ScriptedModel) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(model);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn analyze_body() -> Value {
    json!({
        "patient_id": "123",
        "behavior": "Avoids social events",
        "antecedent": "Invitations from coworkers",
        "consequence": "Relief, then loneliness",
        "previous_attempts": "Forced attendance once"
    })
}

#[tokio::test]
async fn test_root_and_health() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let client = reqwest::Client::new();

    let root: Value = client
        .get(format!("{base}/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["message"], "Welcome to the Behavioral Analysis API");

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["ok"], true);
}

#[tokio::test]
async fn test_analyze_then_read_back_with_viewing_key() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/analyze"))
        .json(&analyze_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["analysis"]["general_analysis"], "Analysis text.");
    assert_eq!(
        body["analysis"]["recommended_habits"],
        json!([{
            "name": "Exercise",
            "description": "Walk daily",
            "implementation": ["Walk 10 min"],
            "scientific_basis": "CBT studies"
        }])
    );
    assert!(body["tx_hash"].as_str().unwrap().len() == 64);

    let key: Value = client
        .post(format!("{base}/create-viewing-key/123"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let viewing_key = key["viewing_key"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{base}/analyses/123"))
        .query(&[("viewing_key", viewing_key.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: Value = res.json().await.unwrap();
    let analyses = listed["analyses"].as_array().unwrap();
    assert_eq!(analyses.len(), 1);
    assert_eq!(analyses[0]["patient_id"], "123");
    let content: FormattedAnalysis =
        serde_json::from_str(analyses[0]["content"].as_str().unwrap()).unwrap();
    assert_eq!(content.recommended_habits[0].name, "Exercise");
}

#[tokio::test]
async fn test_analyze_with_missing_field_is_bad_request() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let mut body = analyze_body();
    body.as_object_mut().unwrap().remove("antecedent");

    let res = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["kind"], "invalid_input");
    assert!(err["detail"].as_str().unwrap().contains("antecedent"));
}

#[tokio::test]
async fn test_analyze_with_invalid_patient_id_is_bad_request() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let mut body = analyze_body();
    body["patient_id"] = json!("has spaces");

    let res = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_model_failure_is_bad_gateway() {
    let base = spawn(ScriptedModel(Err("quota exceeded"))).await;

    let res = reqwest::Client::new()
        .post(format!("{base}/analyze"))
        .json(&analyze_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["kind"], "model_unavailable");
}

#[tokio::test]
async fn test_viewing_key_is_enforced() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let client = reqwest::Client::new();
    client
        .post(format!("{base}/create-viewing-key/123"))
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{base}/analyses/123?viewing_key=wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["kind"], "access_denied");

    let res = client
        .get(format!("{base}/analyses/123"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{base}/daily-progress/123?viewing_key=wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_daily_progress_round_trip() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let client = reqwest::Client::new();

    let key: Value = client
        .post(format!("{base}/create-viewing-key/p-7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let viewing_key = key["viewing_key"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{base}/daily-progress"))
        .json(&json!({
            "patient_id": "p-7",
            "date": 1_700_000_000u64,
            "tasks": [
                {"name": "Deep Breathing", "completed": true},
                {"name": "Progressive Exposure", "completed": false}
            ],
            "description": "I felt less anxious today."
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let saved: Value = res.json().await.unwrap();
    assert!(saved["tx_hash"].is_string());

    let listed: Value = client
        .get(format!("{base}/daily-progress/p-7"))
        .query(&[("viewing_key", viewing_key.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let progress = listed["progress"].as_array().unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["date"], 1_700_000_000u64);
    assert_eq!(progress[0]["tasks"][1]["completed"], false);
    assert!(progress[0]["id"].is_string());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let res = app(ScriptedModel(Ok(REPLY)))
        .oneshot(
            Request::post("/daily-progress")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let base = spawn(ScriptedModel(Ok(REPLY))).await;
    let doc: Value = reqwest::get(format!("{base}/api-docs/openapi.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/analyze"]["post"].is_object());
}
