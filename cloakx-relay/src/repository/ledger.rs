//! Ledger repository
//!
//! Handles communication with the ledger fullnode over JSON-RPC:
//! - Paging through the registry module's event log
//! - Reading job and pool records from the registry tables
//! - Building, signing and executing the `complete_job` transaction

use async_trait::async_trait;
use cloakx_core::domain::cursor::EventId;
use cloakx_core::domain::event::{BytesField, EventFilter, EventPage, NumericField};
use cloakx_core::domain::job::JobId;
use cloakx_core::domain::training::{OnChainJob, OnChainJobStatus};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::signer::OperatorKey;
use crate::config::ContractConfig;

/// Errors raised while talking to the ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected ledger response: {0}")]
    Decode(String),

    #[error("invalid operator key: {0}")]
    InvalidKey(String),

    #[error("transaction {digest} rejected: {reason}")]
    Rejected { digest: String, reason: String },
}

/// Arguments of the registry's `complete_job` entry point that vary per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteJobCall {
    pub job_id: JobId,
    /// Enclave timestamp covered by the signature
    pub timestamp_ms: u64,
    /// Result encoded in the registry's binary layout
    pub encoded_result: Vec<u8>,
    /// Enclave signature, forwarded untouched
    pub signature: Vec<u8>,
}

/// Accepted `complete_job` transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub digest: String,
}

/// Repository trait for ledger reads and the job completion write
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Lists events matching `filter` in ascending order, starting after `cursor`
    async fn query_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&EventId>,
        limit: usize,
    ) -> Result<EventPage, LedgerError>;

    /// Fetches the registry's record of a job, `None` if the ledger has none
    async fn get_job(&self, job_id: JobId) -> Result<Option<OnChainJob>, LedgerError>;

    /// Accounts registered as contributors of a pool
    async fn pool_contributors(&self, pool_id: u64) -> Result<Vec<String>, LedgerError>;

    /// Data blob ids contributed to a pool, in registration order
    async fn pool_data_blob_ids(&self, pool_id: u64) -> Result<Vec<String>, LedgerError>;

    /// Signs and executes `complete_job`, waiting for local execution
    ///
    /// Returns an error unless the transaction executed successfully.
    async fn complete_job(&self, call: CompleteJobCall) -> Result<SubmissionReceipt, LedgerError>;
}

/// JSON-RPC implementation of LedgerRepository
pub struct SuiLedgerRepository {
    client: Client,
    rpc_url: String,
    contract: ContractConfig,
    signer: OperatorKey,
    gas_budget: u64,
    request_id: AtomicU64,
}

impl SuiLedgerRepository {
    /// Creates a new ledger repository
    ///
    /// # Arguments
    /// * `rpc_url` - Fullnode JSON-RPC endpoint
    /// * `contract` - Package, module and object ids of the registry
    /// * `signer` - Operator key owning the admin capability
    /// * `gas_budget` - Gas budget of completion transactions
    pub fn new(
        rpc_url: String,
        contract: ContractConfig,
        signer: OperatorKey,
        gas_budget: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            rpc_url,
            contract,
            signer,
            gas_budget,
            request_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        debug!("Ledger RPC {} (id {})", method, id);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rpc {
                code: i64::from(status.as_u16()),
                message: body,
            });
        }

        let envelope = response.json::<RpcResponse<T>>().await?;
        envelope.into_result(method)
    }

    /// Reads the `value` of a `u64`-keyed dynamic field of a registry table
    async fn table_entry(&self, table_id: &str, key: u64) -> Result<Option<Value>, LedgerError> {
        let response: DynamicFieldResponse = self
            .call(
                "suix_getDynamicFieldObject",
                json!([table_id, { "type": "u64", "value": key.to_string() }]),
            )
            .await?;

        Ok(response
            .data
            .and_then(|d| d.content)
            .and_then(|mut content| content.get_mut("fields").map(Value::take))
            .and_then(|mut fields| fields.get_mut("value").map(Value::take)))
    }
}

#[async_trait]
impl LedgerRepository for SuiLedgerRepository {
    async fn query_events(
        &self,
        filter: &EventFilter,
        cursor: Option<&EventId>,
        limit: usize,
    ) -> Result<EventPage, LedgerError> {
        // Params: query, cursor, limit, descending_order
        self.call("suix_queryEvents", json!([filter, cursor, limit, false]))
            .await
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<OnChainJob>, LedgerError> {
        let Some(value) = self.table_entry(&self.contract.jobs_table_id, job_id).await? else {
            return Ok(None);
        };

        // Struct values are wrapped as `{ type, fields }`
        let fields = match value {
            Value::Object(mut map) if map.contains_key("fields") => {
                map.remove("fields").unwrap_or_default()
            }
            other => other,
        };

        parse_job_object(job_id, fields).map(Some)
    }

    async fn pool_contributors(&self, pool_id: u64) -> Result<Vec<String>, LedgerError> {
        match self
            .table_entry(&self.contract.pool_users_table_id, pool_id)
            .await?
        {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| LedgerError::Decode(format!("pool {} contributors: {}", pool_id, e))),
            None => Ok(Vec::new()),
        }
    }

    async fn pool_data_blob_ids(&self, pool_id: u64) -> Result<Vec<String>, LedgerError> {
        match self
            .table_entry(&self.contract.pool_data_table_id, pool_id)
            .await?
        {
            Some(value) => parse_blob_entries(pool_id, value),
            None => Ok(Vec::new()),
        }
    }

    async fn complete_job(&self, call: CompleteJobCall) -> Result<SubmissionReceipt, LedgerError> {
        let arguments = complete_job_arguments(&self.contract, &call);

        let built: BuiltTransaction = self
            .call(
                "unsafe_moveCall",
                json!([
                    self.signer.address(),
                    self.contract.package_id,
                    self.contract.module,
                    "complete_job",
                    [],
                    arguments,
                    null,
                    self.gas_budget.to_string(),
                    null,
                ]),
            )
            .await?;

        let signature = self.signer.sign_transaction(&built.tx_bytes)?;

        let executed: ExecutedTransaction = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    built.tx_bytes,
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution",
                ]),
            )
            .await?;

        executed.into_receipt()
    }
}

/// Move call arguments of `complete_job`, in entry point order
///
/// `u64`s travel as decimal strings and `vector<u8>` as number arrays.
fn complete_job_arguments(contract: &ContractConfig, call: &CompleteJobCall) -> Value {
    json!([
        contract.admin_cap_id,
        contract.job_registry_id,
        contract.pool_registry_id,
        contract.enclave_object_id,
        call.timestamp_ms.to_string(),
        call.encoded_result,
        call.signature,
        call.job_id.to_string(),
    ])
}

// =============================================================================
// Response Parsing
// =============================================================================

fn parse_job_object(job_id: JobId, fields: Value) -> Result<OnChainJob, LedgerError> {
    let raw: JobObjectFields = serde_json::from_value(fields)
        .map_err(|e| LedgerError::Decode(format!("job {}: {}", job_id, e)))?;

    let decode_err = |e: cloakx_core::domain::event::DecodeError| {
        LedgerError::Decode(format!("job {}: {}", job_id, e))
    };

    let model_config_blob_id = match raw.model_wid {
        Some(field) => Some(field.decode_utf8("model_wid").map_err(decode_err)?),
        None => None,
    }
    .filter(|id| !id.trim().is_empty());

    Ok(OnChainJob {
        id: job_id,
        creator: raw.creator,
        pool_id: raw.pool_id.decode("pool_id").map_err(decode_err)?,
        model_config_blob_id,
        epochs: raw.epochs.decode("epochs").map_err(decode_err)?,
        learning_rate: raw.learning_rate.decode("learning_rate").map_err(decode_err)?,
        price: raw.price.decode("price").map_err(decode_err)?,
        status: parse_job_status(&raw.status)
            .ok_or_else(|| LedgerError::Decode(format!("job {}: unknown status", job_id)))?,
    })
}

/// Accepts the enum encodings the fullnode has used: `{ variant }`,
/// `{ Pending: .. }`, a bare variant name, or the numeric discriminant
fn parse_job_status(value: &Value) -> Option<OnChainJobStatus> {
    let from_name = |name: &str| match name {
        "Pending" => Some(OnChainJobStatus::Pending),
        "Cancelled" => Some(OnChainJobStatus::Cancelled),
        "Completed" => Some(OnChainJobStatus::Completed),
        _ => None,
    };

    match value {
        Value::String(name) => from_name(name),
        Value::Number(n) => match n.as_u64()? {
            0 => Some(OnChainJobStatus::Pending),
            1 => Some(OnChainJobStatus::Cancelled),
            2 => Some(OnChainJobStatus::Completed),
            _ => None,
        },
        Value::Object(map) => match map.get("variant").and_then(Value::as_str) {
            Some(name) => from_name(name),
            None => map.keys().find_map(|k| from_name(k)),
        },
        _ => None,
    }
}

fn parse_blob_entries(pool_id: u64, value: Value) -> Result<Vec<String>, LedgerError> {
    let entries: Vec<BlobEntry> = serde_json::from_value(value)
        .map_err(|e| LedgerError::Decode(format!("pool {} data: {}", pool_id, e)))?;

    entries
        .into_iter()
        .map(|entry| {
            let field = match entry {
                BlobEntry::Blob(field) => field,
                BlobEntry::Record { fields } => fields.walrus_id,
            };
            field
                .decode_utf8("walrus_id")
                .map_err(|e| LedgerError::Decode(format!("pool {} data: {}", pool_id, e)))
        })
        .collect()
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T, LedgerError> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(LedgerError::Decode(format!("{} returned no result", method))),
        }
    }
}

#[derive(Deserialize)]
struct DynamicFieldResponse {
    data: Option<DynamicFieldData>,
}

#[derive(Deserialize)]
struct DynamicFieldData {
    content: Option<Value>,
}

#[derive(Deserialize)]
struct JobObjectFields {
    creator: String,
    pool_id: NumericField,
    #[serde(default)]
    model_wid: Option<BytesField>,
    epochs: NumericField,
    learning_rate: NumericField,
    price: NumericField,
    status: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BlobEntry {
    Blob(BytesField),
    Record { fields: BlobRecordFields },
}

#[derive(Deserialize)]
struct BlobRecordFields {
    walrus_id: BytesField,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuiltTransaction {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct ExecutedTransaction {
    digest: String,
    effects: Option<TransactionEffects>,
}

#[derive(Deserialize)]
struct TransactionEffects {
    status: ExecutionStatus,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    error: Option<String>,
}

impl ExecutedTransaction {
    fn into_receipt(self) -> Result<SubmissionReceipt, LedgerError> {
        match self.effects {
            Some(effects) if effects.status.status == "success" => Ok(SubmissionReceipt {
                digest: self.digest,
            }),
            Some(effects) => Err(LedgerError::Rejected {
                digest: self.digest,
                reason: effects
                    .status
                    .error
                    .unwrap_or_else(|| effects.status.status.clone()),
            }),
            None => Err(LedgerError::Rejected {
                digest: self.digest,
                reason: "no effects returned".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_job_arguments_order_and_types() {
        let contract = ContractConfig {
            admin_cap_id: "0xcap".to_string(),
            job_registry_id: "0xjobs".to_string(),
            pool_registry_id: "0xpools".to_string(),
            enclave_object_id: "0xenclave".to_string(),
            ..ContractConfig::default()
        };
        let call = CompleteJobCall {
            job_id: 7,
            timestamp_ms: 1_700_000_000_000,
            encoded_result: vec![2, 97, 98, 91],
            signature: vec![1, 2],
        };

        assert_eq!(
            complete_job_arguments(&contract, &call),
            json!([
                "0xcap",
                "0xjobs",
                "0xpools",
                "0xenclave",
                "1700000000000",
                [2, 97, 98, 91],
                [1, 2],
                "7"
            ])
        );
    }

    #[test]
    fn test_parse_job_object() {
        let fields = json!({
            "id": { "id": "0x99" },
            "creator": "0xA",
            "pool_id": "3",
            "model_wid": [99, 102, 103],
            "buyer_public_key": [1, 2, 3],
            "epochs": "10",
            "learning_rate": "100",
            "price": "1000000",
            "status": { "variant": "Pending", "fields": {} }
        });

        let job = parse_job_object(7, fields).unwrap();
        assert_eq!(job.id, 7);
        assert_eq!(job.pool_id, 3);
        assert_eq!(job.model_config_blob_id.as_deref(), Some("cfg"));
        assert_eq!(job.status, OnChainJobStatus::Pending);
    }

    #[test]
    fn test_empty_model_wid_is_unresolved() {
        let fields = json!({
            "creator": "0xA",
            "pool_id": "3",
            "model_wid": [],
            "epochs": "1",
            "learning_rate": "1",
            "price": "1",
            "status": 0
        });

        let job = parse_job_object(7, fields).unwrap();
        assert_eq!(job.model_config_blob_id, None);
    }

    #[test]
    fn test_parse_job_status_encodings() {
        assert_eq!(
            parse_job_status(&json!("Completed")),
            Some(OnChainJobStatus::Completed)
        );
        assert_eq!(parse_job_status(&json!(1)), Some(OnChainJobStatus::Cancelled));
        assert_eq!(
            parse_job_status(&json!({ "Pending": true })),
            Some(OnChainJobStatus::Pending)
        );
        assert_eq!(parse_job_status(&json!(7)), None);
    }

    #[test]
    fn test_parse_blob_entries() {
        let value = json!([
            [98, 49],
            "b2",
            { "type": "UserData", "fields": { "walrus_id": [98, 51] } }
        ]);
        assert_eq!(parse_blob_entries(3, value).unwrap(), vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_rpc_error_wins_over_result() {
        let response: RpcResponse<Value> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid params" }
        }))
        .unwrap();

        assert!(matches!(
            response.into_result("suix_queryEvents"),
            Err(LedgerError::Rpc { code: -32602, .. })
        ));
    }

    #[test]
    fn test_failed_effects_are_rejected() {
        let executed: ExecutedTransaction = serde_json::from_value(json!({
            "digest": "D1",
            "effects": { "status": { "status": "failure", "error": "MoveAbort(..., 3)" } }
        }))
        .unwrap();

        match executed.into_receipt() {
            Err(LedgerError::Rejected { digest, reason }) => {
                assert_eq!(digest, "D1");
                assert!(reason.contains("MoveAbort"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_successful_effects_yield_receipt() {
        let executed: ExecutedTransaction = serde_json::from_value(json!({
            "digest": "D2",
            "effects": { "status": { "status": "success" } }
        }))
        .unwrap();

        assert_eq!(
            executed.into_receipt().unwrap(),
            SubmissionReceipt {
                digest: "D2".to_string()
            }
        );
    }
}
