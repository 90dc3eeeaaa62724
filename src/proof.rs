//! Chain and check-in proof verification.
//!
//! Verification cost is proportional to difficulty × samples; the public
//! band is bounded by the caller-facing caps in [`crate::beat`]. Sample
//! selection is a pure function of the chain itself so a prover cannot
//! retry a request hoping for a friendlier sample.

use crate::beat::{sha256_hex, verify_beat, Beat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound on extra-sample derivation rounds. The stream is modular
/// over `n`, so in principle it could take arbitrarily long to produce a
/// new index; in practice a few dozen rounds cover any public request.
const MAX_SAMPLE_ROUNDS: usize = 4_096;

/// Result of sampling a beat chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    /// Number of beats recomputed.
    pub checked: usize,
    /// Positions (array indices) that failed linkage or recomputation.
    pub failed: Vec<usize>,
}

/// One exposed beat of a check-in proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotCheck {
    pub index: u64,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// A prover's claim of sequential work over `[from_beat, to_beat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinProof {
    pub from_beat: u64,
    pub to_beat: u64,
    pub from_hash: String,
    pub to_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats_computed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_hash: Option<String>,
    #[serde(default)]
    pub spot_checks: Vec<SpotCheck>,
}

/// Outcome of check-in proof verification.
#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_checks_verified: Option<usize>,
}

impl CheckinOutcome {
    fn fail(reason: impl Into<String>) -> Self {
        CheckinOutcome {
            valid: false,
            reason: Some(reason.into()),
            spot_checks_verified: None,
        }
    }
}

/// Deterministically choose which chain positions to recompute.
///
/// The anchors are always included: first, last, midpoint (n ≥ 4) and
/// quartiles (n ≥ 8). Further samples are drawn from a hash stream seeded
/// with `"<n>:<difficulty>:<first_hash>:<last_hash>"`, iterated as
/// lowercase hex strings, taking the first 32 bits of each round modulo
/// `n`. No call-site randomness influences the selection.
pub fn select_spot_indices(
    n: usize,
    difficulty: u32,
    first_hash: &str,
    last_hash: &str,
    requested: usize,
) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let mut picked: BTreeSet<usize> = BTreeSet::new();
    picked.insert(0);
    picked.insert(n - 1);
    if n >= 4 {
        picked.insert(n / 2);
    }
    if n >= 8 {
        picked.insert(n / 4);
        picked.insert(3 * n / 4);
    }

    let want = requested.min(n);
    let mut material = format!("{}:{}:{}:{}", n, difficulty, first_hash, last_hash);
    let mut rounds = 0;
    while picked.len() < want && rounds < MAX_SAMPLE_ROUNDS {
        material = sha256_hex(&material);
        let word = u32::from_str_radix(&material[..8], 16).unwrap_or(0);
        picked.insert(word as usize % n);
        rounds += 1;
    }
    picked.into_iter().collect()
}

/// Verify a chain of beats: linkage over the whole chain, recomputation
/// at the sampled positions.
pub fn verify_beat_chain(beats: &[Beat], difficulty: u32, spot_checks: usize) -> ChainVerification {
    let n = beats.len();
    if n == 0 {
        return ChainVerification {
            valid: false,
            checked: 0,
            failed: Vec::new(),
        };
    }

    let mut failed: BTreeSet<usize> = BTreeSet::new();
    for i in 1..n {
        if beats[i].prev != beats[i - 1].hash {
            failed.insert(i);
        }
    }

    let samples = select_spot_indices(n, difficulty, &beats[0].hash, &beats[n - 1].hash, spot_checks);
    let checked = samples.len();
    for idx in samples {
        if !verify_beat(&beats[idx], difficulty) {
            failed.insert(idx);
        }
    }

    ChainVerification {
        valid: failed.is_empty(),
        checked,
        failed: failed.into_iter().collect(),
    }
}

/// Verify a check-in proof.
///
/// Order of checks matters for the reason a caller sees: range shape,
/// claimed count, spot-check coverage, endpoint inclusion, then the
/// per-beat recomputation.
pub fn verify_checkin_proof(proof: &CheckinProof, difficulty: u32) -> CheckinOutcome {
    if proof.to_beat <= proof.from_beat {
        return CheckinOutcome::fail("Beat range must be forward-moving");
    }
    let span = proof.to_beat - proof.from_beat;
    let beats_computed = proof.beats_computed.unwrap_or(span);
    if beats_computed != span {
        return CheckinOutcome::fail("Beat count mismatch");
    }

    let required = span.min(3) as usize;
    if proof.spot_checks.len() < required {
        return CheckinOutcome::fail(format!(
            "Insufficient spot checks: need at least {}",
            required
        ));
    }
    if !proof.spot_checks.iter().any(|sc| sc.index == proof.to_beat) {
        return CheckinOutcome::fail(format!(
            "Spot checks must include to_beat {}",
            proof.to_beat
        ));
    }

    let mut verified = 0;
    for sc in &proof.spot_checks {
        let prev = match &sc.prev {
            Some(p) => p.clone(),
            None => {
                return CheckinOutcome::fail(format!("Spot check {} is missing prev", sc.index))
            }
        };
        let beat = Beat {
            index: sc.index,
            hash: sc.hash.clone(),
            prev,
            nonce: sc.nonce.clone(),
            anchor_hash: proof.anchor_hash.clone(),
        };
        if !verify_beat(&beat, difficulty) {
            return CheckinOutcome::fail(format!("Spot check failed at index {}", sc.index));
        }
        verified += 1;
    }

    CheckinOutcome {
        valid: true,
        reason: None,
        spot_checks_verified: Some(verified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat::{compute_beat, genesis_prev_hash};

    fn build_chain(len: usize, difficulty: u32) -> Vec<Beat> {
        let mut beats = Vec::with_capacity(len);
        let mut prev = genesis_prev_hash().to_string();
        for i in 0..len {
            let beat = compute_beat(&prev, i as u64, difficulty, None, None);
            prev = beat.hash.clone();
            beats.push(beat);
        }
        beats
    }

    #[test]
    fn test_sampling_always_includes_anchors() {
        let picked = select_spot_indices(10, 10, &"a".repeat(64), &"b".repeat(64), 3);
        assert!(picked.contains(&0));
        assert!(picked.contains(&9));
        assert!(picked.contains(&5), "midpoint required for n >= 4");
        assert!(picked.contains(&2) && picked.contains(&7), "quartiles required for n >= 8");
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let a = select_spot_indices(100, 1000, &"a".repeat(64), &"b".repeat(64), 20);
        let b = select_spot_indices(100, 1000, &"a".repeat(64), &"b".repeat(64), 20);
        assert_eq!(a, b, "same inputs must select the same sample set");
        assert!(a.len() >= 20);
    }

    #[test]
    fn test_sampling_varies_with_inputs() {
        let a = select_spot_indices(100, 1000, &"a".repeat(64), &"b".repeat(64), 20);
        let b = select_spot_indices(100, 1001, &"a".repeat(64), &"b".repeat(64), 20);
        let c = select_spot_indices(100, 1000, &"c".repeat(64), &"b".repeat(64), 20);
        assert_ne!(a, b, "difficulty feeds the sample stream");
        assert_ne!(a, c, "first hash feeds the sample stream");
    }

    #[test]
    fn test_sampling_caps_at_chain_length() {
        let picked = select_spot_indices(3, 10, &"a".repeat(64), &"b".repeat(64), 25);
        assert_eq!(picked, vec![0, 1, 2]);
    }

    #[test]
    fn test_chain_round_trip() {
        let beats = build_chain(5, 10);
        let result = verify_beat_chain(&beats, 10, 3);
        assert!(result.valid, "well-formed chain must verify: {:?}", result.failed);
        assert!(result.checked >= 3);
        assert!(result.failed.is_empty());
    }

    #[test]
    fn test_chain_detects_broken_link() {
        let mut beats = build_chain(5, 10);
        beats[3].prev = "9".repeat(64);
        let result = verify_beat_chain(&beats, 10, 3);
        assert!(!result.valid);
        assert!(result.failed.contains(&3), "break at position 3 must be reported");
    }

    #[test]
    fn test_empty_chain_is_invalid() {
        let result = verify_beat_chain(&[], 10, 3);
        assert!(!result.valid);
        assert_eq!(result.checked, 0);
    }

    fn build_checkin(from: u64, to: u64, difficulty: u32) -> CheckinProof {
        let mut prev = genesis_prev_hash().to_string();
        let mut checks = Vec::new();
        let mut from_hash = String::new();
        let mut last_hash = String::new();
        for i in from..=to {
            let beat = compute_beat(&prev, i, difficulty, None, None);
            if i == from {
                from_hash = beat.hash.clone();
            }
            // expose first, middle, and final beats
            if i == from || i == (from + to) / 2 || i == to {
                checks.push(SpotCheck {
                    index: i,
                    hash: beat.hash.clone(),
                    prev: Some(beat.prev.clone()),
                    nonce: None,
                });
            }
            last_hash = beat.hash.clone();
            prev = beat.hash;
        }
        CheckinProof {
            from_beat: from,
            to_beat: to,
            from_hash,
            to_hash: last_hash,
            beats_computed: Some(to - from),
            anchor_hash: None,
            spot_checks: checks,
        }
    }

    #[test]
    fn test_checkin_round_trip() {
        let proof = build_checkin(100, 105, 10);
        let outcome = verify_checkin_proof(&proof, 10);
        assert!(outcome.valid, "reason: {:?}", outcome.reason);
        assert_eq!(outcome.spot_checks_verified, Some(3));
    }

    #[test]
    fn test_checkin_rejects_backward_range() {
        let mut proof = build_checkin(100, 105, 10);
        proof.to_beat = 100;
        proof.from_beat = 105;
        let outcome = verify_checkin_proof(&proof, 10);
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some("Beat range must be forward-moving"));
    }

    #[test]
    fn test_checkin_rejects_count_mismatch() {
        let mut proof = build_checkin(100, 105, 10);
        proof.beats_computed = Some(50);
        let outcome = verify_checkin_proof(&proof, 10);
        assert_eq!(outcome.reason.as_deref(), Some("Beat count mismatch"));
    }

    #[test]
    fn test_checkin_requires_to_beat_endpoint() {
        let mut proof = build_checkin(100, 105, 10);
        proof.spot_checks.retain(|sc| sc.index != 105);
        // keep the count above the minimum so the endpoint rule is what fires
        proof.spot_checks.push(SpotCheck {
            index: 101,
            hash: proof.spot_checks[0].hash.clone(),
            prev: proof.spot_checks[0].prev.clone(),
            nonce: None,
        });
        let outcome = verify_checkin_proof(&proof, 10);
        assert!(!outcome.valid);
        let reason = outcome.reason.expect("reason required");
        assert!(reason.contains("to_beat"), "reason must mention to_beat: {}", reason);
    }

    #[test]
    fn test_checkin_requires_prev_on_every_check() {
        let mut proof = build_checkin(100, 105, 10);
        proof.spot_checks[1].prev = None;
        let outcome = verify_checkin_proof(&proof, 10);
        assert!(!outcome.valid);
        assert!(outcome.reason.expect("reason").contains("missing prev"));
    }

    #[test]
    fn test_checkin_detects_forged_check() {
        let mut proof = build_checkin(100, 105, 10);
        proof.spot_checks[2].hash = "f".repeat(64);
        let outcome = verify_checkin_proof(&proof, 10);
        assert!(!outcome.valid);
        assert!(outcome.reason.expect("reason").contains("Spot check failed"));
    }
}
