//! Shared test fixtures: an in-memory ledger and a ready-to-serve app
//! state. No test in this suite talks to a live ledger.

use actix_web::web;
use async_trait::async_trait;
use beats_core::config::BeatsConfig;
use beats_core::error::{BeatsError, Result};
use beats_core::http::AppState;
use beats_core::ledger::{Ledger, MemoRecord, PublishReceipt};
use beats_core::signer::Keychain;
use parking_lot::Mutex;
use std::sync::Arc;

pub const TEST_CRON_SECRET: &str = "test-cron-secret";
pub const TEST_PRO_TOKEN: &str = "test-pro-token";

/// In-memory stand-in for the public ledger. Published memos become
/// immediately readable, prefixed the way the real RPC layer prefixes
/// them.
pub struct FakeLedger {
    memos: Mutex<Vec<MemoRecord>>,
    entropy: Mutex<Option<String>>,
    balance: Mutex<u64>,
    publish_count: Mutex<u64>,
}

impl FakeLedger {
    pub fn new() -> Self {
        FakeLedger {
            memos: Mutex::new(Vec::new()),
            entropy: Mutex::new(Some(bs58::encode([7u8; 32]).into_string())),
            balance: Mutex::new(1_000_000),
            publish_count: Mutex::new(0),
        }
    }

    pub fn set_entropy(&self, entropy: Option<String>) {
        *self.entropy.lock() = entropy;
    }

    pub fn set_balance(&self, balance: u64) {
        *self.balance.lock() = balance;
    }

    /// Seed a raw memo as if a previous process had published it.
    pub fn seed_memo(&self, text: &str) {
        let mut memos = self.memos.lock();
        let signature = format!("SEEDED{:04}", memos.len() + 1);
        memos.insert(
            0,
            MemoRecord {
                signature,
                confirmation_status: Some("finalized".into()),
                memo: Some(format!("[{}] {}", text.len(), text)),
            },
        );
    }

    pub fn published_count(&self) -> u64 {
        *self.publish_count.lock()
    }

    pub fn memo_count(&self) -> usize {
        self.memos.lock().len()
    }
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn recent_memos(&self, limit: usize) -> Result<Vec<MemoRecord>> {
        Ok(self.memos.lock().iter().take(limit).cloned().collect())
    }

    async fn publish_memo(&self, payload: &[u8]) -> Result<PublishReceipt> {
        let text = String::from_utf8(payload.to_vec())
            .map_err(|e| BeatsError::Ledger(format!("memo is not UTF-8: {}", e)))?;
        let mut count = self.publish_count.lock();
        *count += 1;
        let signature = format!("FAKESIG{:04}", *count);
        self.memos.lock().insert(
            0,
            MemoRecord {
                signature: signature.clone(),
                confirmation_status: Some("finalized".into()),
                memo: Some(format!("[{}] {}", text.len(), text)),
            },
        );
        Ok(PublishReceipt {
            signature,
            slot: 1_000 + *count,
        })
    }

    async fn external_entropy(&self) -> Result<Option<String>> {
        Ok(self.entropy.lock().clone())
    }

    async fn account_balance(&self) -> Result<u64> {
        Ok(*self.balance.lock())
    }
}

/// App state wired to the fake ledger, with cron and pro-tier secrets set.
pub fn test_state(ledger: Arc<FakeLedger>) -> web::Data<AppState> {
    let config = BeatsConfig {
        anchor_keypair: bs58::encode([42u8; 32]).into_string(),
        cron_secret: Some(TEST_CRON_SECRET.to_string()),
        rpc_url: "https://api.devnet.solana.com".to_string(),
        pro_tier_token: Some(TEST_PRO_TOKEN.to_string()),
        listen_port: 0,
    };
    let keys = Keychain::from_master_seed(&[42u8; 32]);
    web::Data::new(AppState::new(config, keys, ledger))
}
