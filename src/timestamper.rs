//! Timestamping: bind an opaque digest to the current anchor and hand
//! back an independently verifiable receipt.

use crate::beat::is_hex_hash;
use crate::cache::AnchorCache;
use crate::config::BeatsConfig;
use crate::error::{BeatsError, Result};
use crate::ledger::{Ledger, MIN_WRITER_BALANCE};
use crate::memo::serialize_timestamp_memo;
use crate::signer::Keychain;
use serde::Serialize;
use serde_json::{json, Value};

/// Completed timestamp: the signed payload plus where it landed.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampResponse {
    /// The signed payload, exactly what the signature covers.
    pub timestamp: Value,
    pub on_chain: OnChainRef,
    pub receipt: Receipt,
    pub tier: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnChainRef {
    pub tx_signature: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub signature: String,
    pub public_key: String,
}

/// Validate the submitted digest: exactly 64 lowercase hex chars.
pub fn validate_digest(hash: &str) -> std::result::Result<(), String> {
    if !is_hex_hash(hash) {
        return Err("hash must be 64 lowercase hex characters".into());
    }
    Ok(())
}

/// Timestamp `hash` against the current anchor.
///
/// Requires a canonical tip and a funded writer; both absences are
/// operational (503-class), not caller errors.
pub async fn create_timestamp(
    ledger: &dyn Ledger,
    cache: &AnchorCache,
    keys: &Keychain,
    config: &BeatsConfig,
    hash: &str,
    tier: &'static str,
) -> Result<TimestampResponse> {
    validate_digest(hash).map_err(BeatsError::Memo)?;

    let anchor = cache
        .latest(ledger)
        .await?
        .ok_or_else(|| BeatsError::Unavailable("no anchor published yet".into()))?;

    let balance = ledger.account_balance().await?;
    if balance < MIN_WRITER_BALANCE {
        return Err(BeatsError::Unavailable(format!(
            "writer balance {} below minimum {}",
            balance, MIN_WRITER_BALANCE
        )));
    }

    let utc = chrono::Utc::now().timestamp_millis();
    let memo = serialize_timestamp_memo(hash, anchor.beat_index, &anchor.hash, utc)?;
    let published = ledger.publish_memo(memo.as_bytes()).await?;
    log::info!(
        "timestamp published: hash={}... anchor={} tx={}",
        &hash[..12],
        anchor.beat_index,
        published.signature
    );

    let payload = json!({
        "type": "timestamp",
        "hash": hash,
        "anchor_index": anchor.beat_index,
        "anchor_hash": anchor.hash,
        "utc": utc,
        "tx_signature": published.signature,
    });
    let signature = keys.timestamp.sign(&payload);

    Ok(TimestampResponse {
        timestamp: payload,
        on_chain: OnChainRef {
            explorer_url: config.explorer_tx_url(&published.signature),
            tx_signature: published.signature,
        },
        receipt: Receipt {
            signature,
            public_key: keys.timestamp.public_key_hex(),
        },
        tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_digest() {
        assert!(validate_digest(&"a".repeat(64)).is_ok());
        assert!(validate_digest(&"A".repeat(64)).is_err(), "uppercase rejected");
        assert!(validate_digest("abc").is_err(), "short rejected");
        assert!(validate_digest(&"g".repeat(64)).is_err(), "non-hex rejected");
    }
}
