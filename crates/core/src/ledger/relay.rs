use super::{ContractDailyProgress, ExecuteMsg, Ledger, QueryMsg};
use crate::config::{LedgerBackend, LedgerConfig};
use crate::error::{CoreError, CoreResult};
use crate::model::{DailyProgress, DailyProgressEntry, StoredAnalysis, ViewingKeyGrant};
use async_trait::async_trait;
use habit_types::{PatientId, ViewingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header identifying the wallet the relay is expected to sign with.
pub const WALLET_FINGERPRINT_HEADER: &str = "x-wallet-fingerprint";

#[derive(Serialize, Debug)]
struct ExecuteRequest<'a> {
    contract_address: &'a str,
    code_hash: &'a str,
    msg: &'a ExecuteMsg,
    memo: &'a str,
}

#[derive(Serialize, Debug)]
struct QueryRequest<'a> {
    contract_address: &'a str,
    code_hash: &'a str,
    query: &'a QueryMsg,
}

#[derive(Deserialize, Debug)]
struct ExecuteResponse {
    tx_hash: String,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

#[derive(Deserialize, Debug)]
struct Attribute {
    key: String,
    value: String,
}

/// Ledger backed by an HTTP signing relay.
///
/// The relay holds the wallet, signs and encrypts transactions, and forwards queries to the
/// contract. This client sends contract messages as JSON:
///
/// - `POST {url}/execute` with `{contract_address, code_hash, msg, memo}`, answered by
///   `{tx_hash, attributes: [{key, value}]}`
/// - `POST {url}/query` with `{contract_address, code_hash, query}`, answered by the contract's
///   JSON result
///
/// Every request carries the configured wallet's fingerprint so the relay can refuse to sign for
/// a different wallet.
pub struct RelayLedger {
    client: reqwest::Client,
    base_url: String,
    contract_address: String,
    code_hash: String,
    fingerprint: String,
}

impl RelayLedger {
    /// # Errors
    ///
    /// Returns `CoreError::LedgerUnavailable` if the backend is not a relay or the HTTP client
    /// cannot be built.
    pub fn new(cfg: &LedgerConfig) -> CoreResult<Self> {
        let LedgerBackend::Relay { url } = &cfg.backend else {
            return Err(CoreError::LedgerUnavailable(
                "relay ledger requires a relay backend".into(),
            ));
        };

        let client = reqwest::Client::builder()
            .user_agent(concat!("habit-core/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| {
                CoreError::LedgerUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            contract_address: cfg.contract_address.clone(),
            code_hash: cfg.code_hash.clone(),
            fingerprint: cfg.wallet_fingerprint(),
        })
    }

    async fn execute(&self, msg: &ExecuteMsg, memo: &str) -> CoreResult<ExecuteResponse> {
        let body = ExecuteRequest {
            contract_address: &self.contract_address,
            code_hash: &self.code_hash,
            msg,
            memo,
        };
        self.post("execute", &body).await
    }

    async fn query<R: DeserializeOwned>(&self, query: &QueryMsg) -> CoreResult<R> {
        let body = QueryRequest {
            contract_address: &self.contract_address,
            code_hash: &self.code_hash,
            query,
        };
        self.post("query", &body).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> CoreResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("ledger relay request: {}", url);

        let response = self
            .client
            .post(&url)
            .header(WALLET_FINGERPRINT_HEADER, &self.fingerprint)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::LedgerUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::LedgerUnavailable(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| CoreError::LedgerUnavailable(format!("malformed relay response: {e}")))
    }
}

/// Maps a failed relay response to an error. Rejected viewing keys become `AccessDenied`.
fn classify_failure(status: reqwest::StatusCode, body: &str) -> CoreError {
    let detail = body.chars().take(300).collect::<String>();
    if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || detail.to_ascii_lowercase().contains("invalid viewing key")
    {
        return CoreError::AccessDenied("Invalid viewing key".into());
    }
    CoreError::LedgerUnavailable(format!("HTTP {status}: {detail}"))
}

fn viewing_key_from(response: ExecuteResponse) -> CoreResult<ViewingKeyGrant> {
    let key = response
        .attributes
        .into_iter()
        .find(|a| a.key == "viewing_key")
        .map(|a| a.value)
        .ok_or_else(|| {
            CoreError::LedgerUnavailable("relay response has no viewing_key attribute".into())
        })?;

    let viewing_key = ViewingKey::new(key)
        .map_err(|e| CoreError::LedgerUnavailable(format!("relay returned a bad key: {e}")))?;

    Ok(ViewingKeyGrant {
        viewing_key,
        tx_hash: Some(response.tx_hash),
    })
}

#[async_trait]
impl Ledger for RelayLedger {
    async fn save_analysis(
        &self,
        patient_id: &PatientId,
        content: &str,
        memo: &str,
    ) -> CoreResult<String> {
        let msg = ExecuteMsg::save_analysis(patient_id, content);
        Ok(self.execute(&msg, memo).await?.tx_hash)
    }

    async fn query_analyses(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<StoredAnalysis>> {
        self.query(&QueryMsg::GetAnalyses {
            patient_id: patient_id.to_string(),
            viewing_key: viewing_key.expose().to_string(),
        })
        .await
    }

    async fn create_viewing_key(&self, patient_id: &PatientId) -> CoreResult<ViewingKeyGrant> {
        let msg = ExecuteMsg::create_viewing_key(patient_id);
        let response = self.execute(&msg, "Create viewing key").await?;
        viewing_key_from(response)
    }

    async fn save_daily_progress(
        &self,
        progress: &DailyProgress,
        memo: &str,
    ) -> CoreResult<String> {
        let msg = ExecuteMsg::save_daily_progress(progress);
        Ok(self.execute(&msg, memo).await?.tx_hash)
    }

    async fn query_daily_progress(
        &self,
        patient_id: &PatientId,
        viewing_key: &ViewingKey,
    ) -> CoreResult<Vec<DailyProgressEntry>> {
        // The contract only checks viewing keys on analysis queries.
        self.query_analyses(patient_id, viewing_key).await?;

        let records: Vec<ContractDailyProgress> = self
            .query(&QueryMsg::GetDailyProgress {
                patient_id: patient_id.to_string(),
            })
            .await?;

        Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, p)| DailyProgressEntry {
                id: (i + 1).to_string(),
                date: p.date,
                tasks: p.tasks,
                description: p.description,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "relay"
    }
}
