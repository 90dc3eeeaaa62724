//! Read-through cache for the canonical anchor tip.
//!
//! Serving endpoints consult the tip on every request; a single slot
//! with a short TTL keeps that off the ledger RPC. Concurrent readers
//! see a consistent snapshot. There is no stampede protection — a few
//! overlapping refreshes at expiry are acceptable.

use crate::beat::GlobalAnchor;
use crate::error::Result;
use crate::ledger::{Ledger, DEFAULT_MEMO_SCAN};
use crate::{memo, selector};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// How long a cached tip is served before the next caller refreshes.
pub const ANCHOR_CACHE_TTL: Duration = Duration::from_secs(10);

struct CachedTip {
    anchor: GlobalAnchor,
    fetched_at: Instant,
}

/// Single-slot TTL cache in front of [`read_latest_anchor`].
pub struct AnchorCache {
    ttl: Duration,
    slot: RwLock<Option<CachedTip>>,
}

impl AnchorCache {
    pub fn new(ttl: Duration) -> Self {
        AnchorCache {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Current canonical tip, served from cache within the TTL.
    ///
    /// An empty ledger (no tip yet) is not cached, so a cold-started
    /// service notices its first anchor without waiting out a TTL.
    pub async fn latest(&self, ledger: &dyn Ledger) -> Result<Option<GlobalAnchor>> {
        if let Some(cached) = self.slot.read().as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(Some(cached.anchor.clone()));
            }
        }

        let tip = read_latest_anchor(ledger).await?;
        if let Some(anchor) = &tip {
            *self.slot.write() = Some(CachedTip {
                anchor: anchor.clone(),
                fetched_at: Instant::now(),
            });
        }
        Ok(tip)
    }

    /// Drop the cached slot (used after the advancer publishes).
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

impl Default for AnchorCache {
    fn default() -> Self {
        Self::new(ANCHOR_CACHE_TTL)
    }
}

/// Scan recent writer memos and select the canonical tip. Non-anchor
/// memos are skipped, not errors.
pub async fn read_latest_anchor(ledger: &dyn Ledger) -> Result<Option<GlobalAnchor>> {
    let records = ledger.recent_memos(DEFAULT_MEMO_SCAN).await?;
    let mut candidates = Vec::new();
    for record in &records {
        if let Some(raw) = &record.memo {
            if let Some(mut anchor) = memo::parse_anchor_memo(raw) {
                anchor.signature = Some(record.signature.clone());
                candidates.push(anchor);
            }
        }
    }
    Ok(selector::select_canonical_anchor(&candidates))
}
