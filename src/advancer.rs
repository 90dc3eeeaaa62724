//! Anchor advancement: the cron-driven state machine that grows the
//! chain.
//!
//! One invocation per minute from an external scheduler. Nothing is
//! persisted locally — the published memo *is* the new state, so every
//! step either completes on the ledger or changes nothing. When external
//! entropy cannot be fetched the head does not advance (fail closed): a
//! V1 fallback anchor would be computable ahead of time and defeat the
//! entropy binding.

use crate::beat::{
    create_global_anchor, GlobalAnchor, ANCHOR_INTERVAL_MS, DEFAULT_DIFFICULTY,
};
use crate::cache::read_latest_anchor;
use crate::error::{BeatsError, Result};
use crate::ledger::Ledger;
use crate::memo::serialize_anchor_memo;
use serde::Serialize;
use std::time::Instant;

/// Result of one advancement attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// The tip is younger than one anchor interval; nothing to do.
    Skipped {
        reason: &'static str,
        beat_index: u64,
        /// Earliest time (unix ms) the next anchor is due.
        next_at: i64,
    },
    /// A new anchor was published and finalized.
    Generated {
        beat_index: u64,
        hash: String,
        tx_signature: String,
        elapsed_ms: u64,
    },
}

/// Advance the anchor chain by one step if it is due.
pub async fn advance_anchor(ledger: &dyn Ledger) -> Result<AdvanceOutcome> {
    let started = Instant::now();

    // Tip comes straight from the ledger — the advancer never trusts the
    // serving cache.
    let tip = read_latest_anchor(ledger).await?;

    if let Some(current) = &tip {
        let now = chrono::Utc::now().timestamp_millis();
        let age_ms = now - current.utc;
        if age_ms <= ANCHOR_INTERVAL_MS {
            log::info!(
                "anchor {} is {}ms old, within the {}ms interval - skipping",
                current.beat_index,
                age_ms,
                ANCHOR_INTERVAL_MS
            );
            return Ok(AdvanceOutcome::Skipped {
                reason: "anchor_still_fresh",
                beat_index: current.beat_index,
                next_at: current.utc + ANCHOR_INTERVAL_MS,
            });
        }
    }

    let entropy = ledger.external_entropy().await?.ok_or_else(|| {
        BeatsError::Unavailable("external entropy unavailable - not advancing".into())
    })?;

    let next = build_next_anchor(tip.as_ref(), &entropy)?;
    let memo = serialize_anchor_memo(&next)?;

    let receipt = ledger.publish_memo(memo.as_bytes()).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "anchor {} published: hash={} tx={} elapsed={}ms",
        next.beat_index,
        &next.hash[..16],
        receipt.signature,
        elapsed_ms
    );

    Ok(AdvanceOutcome::Generated {
        beat_index: next.beat_index,
        hash: next.hash,
        tx_signature: receipt.signature,
        elapsed_ms,
    })
}

/// Compute the successor anchor, carrying difficulty and epoch forward
/// from the tip (or protocol defaults from genesis).
fn build_next_anchor(tip: Option<&GlobalAnchor>, entropy: &str) -> Result<GlobalAnchor> {
    let difficulty = tip.map(|t| t.difficulty).unwrap_or(DEFAULT_DIFFICULTY);
    let epoch = tip.map(|t| t.epoch).unwrap_or(0);
    create_global_anchor(tip, difficulty, epoch, Some(entropy))
}
