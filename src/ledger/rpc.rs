//! JSON-RPC implementation of the [`Ledger`] trait.
//!
//! All reads and status checks run at `finalized` commitment. The
//! publish path polls signature status over plain HTTP — no
//! subscription transport — so the service stays deployable behind
//! request-scoped runtimes.

use crate::error::{BeatsError, Result};
use crate::ledger::{tx, Ledger, MemoRecord, PublishReceipt};
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use serde_json::{json, Value};
use std::time::Duration;

/// Per-call HTTP deadline.
const RPC_TIMEOUT: Duration = Duration::from_secs(10);
/// Total budget for a publish to reach `finalized`.
pub const PUBLISH_TIMEOUT_MS: u64 = 60_000;
/// Delay between signature-status polls.
pub const POLL_INTERVAL_MS: u64 = 2_000;

/// Ledger client bound to one writer keypair and one RPC endpoint.
pub struct SolanaRpc {
    client: reqwest::Client,
    url: String,
    writer: SigningKey,
    writer_address: String,
}

impl SolanaRpc {
    pub fn new(url: &str, writer: SigningKey) -> Result<Self> {
        let writer_address = bs58::encode(writer.verifying_key().to_bytes()).into_string();
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| BeatsError::Ledger(format!("HTTP client error: {}", e)))?;
        Ok(SolanaRpc {
            client,
            url: url.to_string(),
            writer,
            writer_address,
        })
    }

    pub fn writer_address(&self) -> &str {
        &self.writer_address
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            // RPC answers must never come from an intermediary cache
            .header("Cache-Control", "no-store")
            .json(&body)
            .send()
            .await
            .map_err(|e| BeatsError::Ledger(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(BeatsError::Ledger(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| BeatsError::Ledger(format!("{} JSON parse error: {}", method, e)))?;

        if let Some(err) = payload.get("error") {
            if !err.is_null() {
                return Err(BeatsError::Ledger(format!("{} RPC error: {}", method, err)));
            }
        }
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| BeatsError::Ledger(format!("{} response missing result", method)))
    }

    async fn wait_for_finalized(&self, signature: &str) -> Result<u64> {
        let deadline = std::time::Instant::now() + Duration::from_millis(PUBLISH_TIMEOUT_MS);
        loop {
            let result = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature], {"searchTransactionHistory": false}]),
                )
                .await?;
            let status = result
                .get("value")
                .and_then(|v| v.get(0))
                .cloned()
                .unwrap_or(Value::Null);

            if !status.is_null() {
                if let Some(err) = status.get("err") {
                    if !err.is_null() {
                        return Err(BeatsError::Ledger(format!(
                            "transaction {} failed: {}",
                            signature, err
                        )));
                    }
                }
                if status.get("confirmationStatus").and_then(Value::as_str) == Some("finalized") {
                    return Ok(status.get("slot").and_then(Value::as_u64).unwrap_or(0));
                }
            }

            if std::time::Instant::now() >= deadline {
                return Err(BeatsError::PublishTimeout(PUBLISH_TIMEOUT_MS));
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

#[async_trait]
impl Ledger for SolanaRpc {
    async fn recent_memos(&self, limit: usize) -> Result<Vec<MemoRecord>> {
        let result = self
            .call(
                "getSignaturesForAddress",
                json!([self.writer_address, {"limit": limit, "commitment": "finalized"}]),
            )
            .await?;
        let rows = result
            .as_array()
            .ok_or_else(|| BeatsError::Ledger("signature list is not an array".into()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let signature = match row.get("signature").and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => continue,
            };
            records.push(MemoRecord {
                signature,
                confirmation_status: row
                    .get("confirmationStatus")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                memo: row.get("memo").and_then(Value::as_str).map(str::to_string),
            });
        }
        Ok(records)
    }

    async fn publish_memo(&self, payload: &[u8]) -> Result<PublishReceipt> {
        let entropy = self
            .external_entropy()
            .await?
            .ok_or_else(|| BeatsError::Ledger("no recent blockhash for publish".into()))?;
        let transaction = tx::build_memo_transaction(&self.writer, &entropy, payload)?;

        let signature = self
            .call(
                "sendTransaction",
                json!([transaction, {"encoding": "base64", "preflightCommitment": "finalized"}]),
            )
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BeatsError::Ledger("sendTransaction returned no signature".into()))?;

        log::info!("memo submitted, awaiting finalization: {}", signature);
        let slot = self.wait_for_finalized(&signature).await?;
        log::info!("memo finalized at slot {}: {}", slot, signature);

        Ok(PublishReceipt { signature, slot })
    }

    async fn external_entropy(&self) -> Result<Option<String>> {
        let result = self
            .call("getLatestBlockhash", json!([{"commitment": "finalized"}]))
            .await?;
        Ok(result
            .get("value")
            .and_then(|v| v.get("blockhash"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn account_balance(&self) -> Result<u64> {
        let result = self
            .call(
                "getBalance",
                json!([self.writer_address, {"commitment": "finalized"}]),
            )
            .await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| BeatsError::Ledger("getBalance returned no value".into()))
    }
}
