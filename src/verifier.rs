//! Public verification: the three verify modes and the work-proof
//! pipeline.
//!
//! Everything here is deterministic and CPU-bound; ledger access (the
//! freshness tip) is fetched by the caller and passed in. Structural
//! problems surface as `Err(String)` (HTTP 400); domain-invalid but
//! well-formed submissions come back as a typed rejection reason with a
//! 200.

use crate::beat::{
    is_hex_hash, verify_beat, Beat, ANCHOR_HASH_GRACE_WINDOW, DEFAULT_DIFFICULTY, MIN_DIFFICULTY,
    PUBLIC_MAX_DIFFICULTY, PUBLIC_MAX_SPOT_CHECKS,
};
use crate::beat::GlobalAnchor;
use crate::proof::{CheckinProof, SpotCheck};
use serde::{Deserialize, Serialize};

/// Largest chain accepted by the chain verify mode.
pub const MAX_CHAIN_BEATS: usize = 1_000;

/// Tagged request body for `POST /api/v1/beat/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum VerifyRequest {
    Beat {
        beat: Beat,
        #[serde(default)]
        difficulty: Option<u32>,
    },
    Chain {
        beats: Vec<Beat>,
        #[serde(default)]
        spot_checks: Option<usize>,
        #[serde(default)]
        difficulty: Option<u32>,
    },
    Proof {
        proof: CheckinProof,
        #[serde(default)]
        difficulty: Option<u32>,
    },
}

/// A claim of `beats_computed` sequential beats anchored to the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkProof {
    pub from_hash: String,
    pub to_hash: String,
    pub beats_computed: u64,
    pub difficulty: u32,
    pub anchor_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_hash: Option<String>,
    pub spot_checks: Vec<SpotCheck>,
}

/// Work-proof verdict after the logic stage.
#[derive(Debug, Clone)]
pub enum WorkProofVerdict {
    /// Well-formed but not acceptable; `reason` is a stable token.
    Invalid { reason: &'static str },
    /// All checks passed at the (clamped) difficulty.
    Valid {
        difficulty: u32,
        spot_checks_verified: usize,
    },
}

/// Clamp a caller-supplied difficulty into the public band: at most
/// [`PUBLIC_MAX_DIFFICULTY`], at least 1 so the chain formula stays
/// defined. Low difficulties are allowed here — verify endpoints attest
/// recomputation, not work value.
pub fn clamp_public_difficulty(difficulty: Option<u32>) -> u32 {
    difficulty
        .unwrap_or(DEFAULT_DIFFICULTY)
        .clamp(1, PUBLIC_MAX_DIFFICULTY)
}

/// Clamp a caller-supplied spot-check count to the public cap.
pub fn clamp_public_spot_checks(spot_checks: Option<usize>) -> usize {
    spot_checks
        .unwrap_or(PUBLIC_MAX_SPOT_CHECKS)
        .min(PUBLIC_MAX_SPOT_CHECKS)
        .max(1)
}

/// Structural validation of a work proof. Failures here are the caller's
/// encoding mistakes (HTTP 400), not judgments about the work.
pub fn validate_work_proof_shape(proof: &WorkProof) -> Result<(), String> {
    if !is_hex_hash(&proof.from_hash) {
        return Err("from_hash must be 64 lowercase hex chars".into());
    }
    if !is_hex_hash(&proof.to_hash) {
        return Err("to_hash must be 64 lowercase hex chars".into());
    }
    if proof.beats_computed < 1 {
        return Err("beats_computed must be at least 1".into());
    }
    if let Some(anchor_hash) = &proof.anchor_hash {
        if !is_hex_hash(anchor_hash) {
            return Err("anchor_hash must be 64 lowercase hex chars".into());
        }
    }
    if proof.spot_checks.is_empty() {
        return Err("spot_checks must not be empty".into());
    }
    if proof.spot_checks.len() > PUBLIC_MAX_SPOT_CHECKS {
        return Err(format!(
            "at most {} spot checks per submission",
            PUBLIC_MAX_SPOT_CHECKS
        ));
    }
    for check in &proof.spot_checks {
        if !is_hex_hash(&check.hash) {
            return Err(format!("spot check {} hash must be 64 lowercase hex chars", check.index));
        }
        match &check.prev {
            Some(prev) if is_hex_hash(prev) => {}
            Some(_) => {
                return Err(format!(
                    "spot check {} prev must be 64 lowercase hex chars",
                    check.index
                ))
            }
            None => return Err(format!("spot check {} is missing prev", check.index)),
        }
    }
    Ok(())
}

/// Logic stage of work-proof verification: difficulty floor, coverage,
/// index span, anchor freshness, then the sampled recomputation.
///
/// `tip` is the current canonical anchor if one could be read; a cold
/// start (no tip) skips the freshness check rather than rejecting work.
pub fn evaluate_work_proof(proof: &WorkProof, tip: Option<&GlobalAnchor>) -> WorkProofVerdict {
    if proof.difficulty < MIN_DIFFICULTY {
        return WorkProofVerdict::Invalid {
            reason: "insufficient_difficulty",
        };
    }
    let difficulty = proof.difficulty.min(PUBLIC_MAX_DIFFICULTY);

    let required = proof.beats_computed.min(3) as usize;
    if proof.spot_checks.len() < required {
        return WorkProofVerdict::Invalid {
            reason: "insufficient_spot_checks",
        };
    }

    let min_index = proof.spot_checks.iter().map(|c| c.index).min().unwrap_or(0);
    let max_index = proof.spot_checks.iter().map(|c| c.index).max().unwrap_or(0);
    if max_index - min_index > proof.beats_computed {
        return WorkProofVerdict::Invalid {
            reason: "count_mismatch",
        };
    }

    if let Some(tip) = tip {
        let stale = proof.anchor_index > tip.beat_index
            || tip.beat_index - proof.anchor_index > ANCHOR_HASH_GRACE_WINDOW;
        if stale {
            return WorkProofVerdict::Invalid {
                reason: "stale_anchor",
            };
        }
    }

    let mut verified = 0;
    for check in &proof.spot_checks {
        let beat = Beat {
            index: check.index,
            hash: check.hash.clone(),
            prev: check.prev.clone().unwrap_or_default(),
            nonce: check.nonce.clone(),
            anchor_hash: proof.anchor_hash.clone(),
        };
        if !verify_beat(&beat, difficulty) {
            return WorkProofVerdict::Invalid {
                reason: "spot_check_failed",
            };
        }
        verified += 1;
    }

    WorkProofVerdict::Valid {
        difficulty,
        spot_checks_verified: verified,
    }
}
