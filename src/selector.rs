//! Continuity-aware fork choice over anchor candidates.
//!
//! The writer key is the only authorized publisher, but the ledger can
//! still surface duplicates, replays, and orphaned tips (a crashed
//! publish retried under a new blockhash). Selection prefers tips whose
//! `prev_hash` links resolve into the observed candidate set over bare
//! tips with a higher index.

use crate::beat::{genesis_prev_hash, is_hex_hash, GlobalAnchor};
use std::collections::{HashMap, HashSet};

fn well_formed(anchor: &GlobalAnchor) -> bool {
    anchor.difficulty > 0
        && anchor.utc >= 0
        && is_hex_hash(&anchor.hash)
        && is_hex_hash(&anchor.prev_hash)
}

fn dedup_key(anchor: &GlobalAnchor) -> (u64, String, String, i64, u32, u32) {
    (
        anchor.beat_index,
        anchor.hash.clone(),
        anchor.prev_hash.clone(),
        anchor.utc,
        anchor.difficulty,
        anchor.epoch,
    )
}

/// Number of `prev_hash` links of a tip that resolve inside `by_hash`,
/// counting the tip itself. Bounded by the candidate count so a hash
/// cycle cannot loop.
fn link_depth(tip: &GlobalAnchor, by_hash: &HashMap<&str, &GlobalAnchor>, limit: usize) -> usize {
    let mut depth = 1;
    let mut current = tip;
    while depth <= limit {
        match by_hash.get(current.prev_hash.as_str()) {
            Some(parent) => {
                depth += 1;
                current = parent;
            }
            None => break,
        }
    }
    depth
}

/// Pick the canonical tip from the candidates scanned off the ledger.
///
/// Deterministic in the set of candidates — input order never matters.
pub fn select_canonical_anchor(candidates: &[GlobalAnchor]) -> Option<GlobalAnchor> {
    let mut seen = HashSet::new();
    let mut pool: Vec<&GlobalAnchor> = Vec::with_capacity(candidates.len());
    for anchor in candidates {
        if !well_formed(anchor) {
            continue;
        }
        if seen.insert(dedup_key(anchor)) {
            pool.push(anchor);
        }
    }
    if pool.is_empty() {
        return None;
    }

    let mut by_hash: HashMap<&str, &GlobalAnchor> = HashMap::with_capacity(pool.len());
    for anchor in &pool {
        by_hash.entry(anchor.hash.as_str()).or_insert(*anchor);
    }

    let mut scored: Vec<(&GlobalAnchor, usize, bool)> = pool
        .iter()
        .map(|anchor| {
            let depth = link_depth(anchor, &by_hash, pool.len());
            let linked = (anchor.beat_index == 0 && anchor.prev_hash == genesis_prev_hash())
                || depth > 1;
            (*anchor, depth, linked)
        })
        .collect();

    let any_linked = scored.iter().any(|(_, _, linked)| *linked);
    if any_linked {
        scored.retain(|(_, _, linked)| *linked);
    }

    scored.sort_by(|(a, da, _), (b, db, _)| {
        b.beat_index
            .cmp(&a.beat_index)
            .then(db.cmp(da))
            .then(a.hash.cmp(&b.hash))
    });

    scored.first().map(|(anchor, _, _)| (*anchor).clone())
}

/// Whether `incoming` is the unique legal successor of `latest`.
///
/// Same-index replays and index jumps are rejected; with no `latest` the
/// only legal anchor is index 0 on the genesis prev-hash.
pub fn is_continuous_next_anchor(latest: Option<&GlobalAnchor>, incoming: &GlobalAnchor) -> bool {
    if !well_formed(incoming) {
        return false;
    }
    match latest {
        None => incoming.beat_index == 0 && incoming.prev_hash == genesis_prev_hash(),
        Some(tip) => {
            incoming.beat_index == tip.beat_index + 1 && incoming.prev_hash == tip.hash
        }
    }
}
