//! Ledger interface.
//!
//! Beats keeps no state of its own — the public ledger is both the
//! persistence layer and the broadcast channel. Everything the service
//! needs from it fits in four capabilities, expressed as a trait so the
//! whole API can run against a fake in tests.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod rpc;
pub mod tx;

pub use rpc::SolanaRpc;

/// Minimum writer balance (minor units) required before publishing.
pub const MIN_WRITER_BALANCE: u64 = 5_000;

/// Default number of memos scanned when looking for the anchor tip.
pub const DEFAULT_MEMO_SCAN: usize = 50;

/// One memo-bearing transaction observed for the writer address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoRecord {
    pub signature: String,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Outcome of a finalized memo publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub signature: String,
    pub slot: u64,
}

/// The append-only ledger as Beats consumes it. The writer address is
/// fixed at construction; all reads and status checks use the ledger's
/// strongest (finalized) commitment.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Most recent memo transactions for the writer, newest first.
    async fn recent_memos(&self, limit: usize) -> Result<Vec<MemoRecord>>;

    /// Publish a memo and wait until the transaction is finalized.
    async fn publish_memo(&self, payload: &[u8]) -> Result<PublishReceipt>;

    /// Fresh external entropy (a finalized blockhash), base58, 32 bytes.
    /// `None` when the ledger cannot supply it — callers fail closed.
    async fn external_entropy(&self) -> Result<Option<String>>;

    /// Writer balance in minor units.
    async fn account_balance(&self) -> Result<u64>;
}
