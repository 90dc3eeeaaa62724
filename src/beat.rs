use crate::error::{BeatsError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Seed string for the prev-hash of anchor zero. Every deployment of the
/// protocol derives the same genesis prev-hash from it, so independently
/// operated chains remain cross-verifiable.
pub const GENESIS_SEED: &str = "provenonce:beat:genesis:v1:2026";

/// Domain-separation prefix for the V3 anchor hash preimage (19 bytes).
pub const ANCHOR_V3_DOMAIN: &[u8; 19] = b"PROVENONCE_BEATS_V1";

/// Lowest difficulty accepted for work proofs.
pub const MIN_DIFFICULTY: u32 = 100;
/// Highest difficulty the engine will iterate.
pub const MAX_DIFFICULTY: u32 = 1_000_000;
/// Per-request difficulty cap on public endpoints.
pub const PUBLIC_MAX_DIFFICULTY: u32 = 5_000;
/// Per-request spot-check cap on public endpoints.
pub const PUBLIC_MAX_SPOT_CHECKS: usize = 25;
/// Difficulty used when the chain tip carries none.
pub const DEFAULT_DIFFICULTY: u32 = 1_000;

/// Target spacing between anchors.
pub const ANCHOR_INTERVAL_MS: i64 = 60_000;
/// How many anchors behind the tip a work proof may reference.
pub const ANCHOR_HASH_GRACE_WINDOW: u64 = 5;

static GENESIS_PREV_HASH: Lazy<String> = Lazy::new(|| sha256_hex(GENESIS_SEED));

/// SHA-256 of a UTF-8 string, as 64 lowercase hex chars.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// The prev-hash every chain starts from: `SHA-256(GENESIS_SEED)`.
pub fn genesis_prev_hash() -> &'static str {
    &GENESIS_PREV_HASH
}

/// True for a 64-char lowercase hex string.
pub fn is_hex_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// One step of the sequential hash chain.
///
/// The invariant is `hash == chain_hash(prev, index, difficulty, nonce,
/// anchor_hash)`; a beat is meaningless without the difficulty it was
/// computed at, which travels separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    pub index: u64,
    pub hash: String,
    pub prev: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_hash: Option<String>,
}

/// An anchor: a beat published to the public ledger as the global clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAnchor {
    pub beat_index: u64,
    pub hash: String,
    pub prev_hash: String,
    /// Unix milliseconds at creation.
    pub utc: i64,
    pub difficulty: u32,
    pub epoch: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solana_entropy: Option<String>,
    /// Ledger transaction id, once published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

fn seed_string(prev: &str, index: u64, nonce: Option<&str>, anchor_hash: Option<&str>) -> String {
    let mut seed = format!("{}:{}", prev, index);
    if let Some(n) = nonce {
        seed.push(':');
        seed.push_str(n);
    }
    if let Some(ah) = anchor_hash {
        seed.push(':');
        seed.push_str(ah);
    }
    seed
}

/// The sequential-work primitive: hash the seed once, then apply
/// `difficulty` further SHA-256 rounds.
///
/// Each round hashes the previous round's 64-char lowercase hex string,
/// not its raw bytes. The chain is defined over hex strings so that every
/// implementation — whatever its internal digest representation —
/// produces identical output.
pub fn chain_hash(
    prev: &str,
    index: u64,
    difficulty: u32,
    nonce: Option<&str>,
    anchor_hash: Option<&str>,
) -> String {
    let mut current = sha256_hex(&seed_string(prev, index, nonce, anchor_hash));
    for _ in 0..difficulty {
        current = sha256_hex(&current);
    }
    current
}

/// Compute a beat at the given difficulty.
pub fn compute_beat(
    prev: &str,
    index: u64,
    difficulty: u32,
    nonce: Option<&str>,
    anchor_hash: Option<&str>,
) -> Beat {
    Beat {
        index,
        hash: chain_hash(prev, index, difficulty, nonce, anchor_hash),
        prev: prev.to_string(),
        nonce: nonce.map(str::to_string),
        anchor_hash: anchor_hash.map(str::to_string),
    }
}

/// Recompute a beat and compare. Malformed hex fields count as failure,
/// never as an error.
pub fn verify_beat(beat: &Beat, difficulty: u32) -> bool {
    if !is_hex_hash(&beat.hash) || !is_hex_hash(&beat.prev) {
        return false;
    }
    if let Some(ah) = &beat.anchor_hash {
        if !is_hex_hash(ah) {
            return false;
        }
    }
    let expected = chain_hash(
        &beat.prev,
        beat.index,
        difficulty,
        beat.nonce.as_deref(),
        beat.anchor_hash.as_deref(),
    );
    expected == beat.hash
}

/// V3 anchor hash: one SHA-256 over the 91-byte preimage
/// `domain(19) || prev_hash(32) || beat_index_be(8) || entropy(32)`.
///
/// No difficulty iteration — the entropy binding, not sequential work, is
/// what makes a V3 anchor unforgeable ahead of time. Returns `None` when
/// the prev-hash is not 64 hex chars or the entropy does not decode to
/// 32 bytes of base58.
pub fn compute_anchor_hash_v3(prev_hash: &str, beat_index: u64, entropy: &str) -> Option<String> {
    if !is_hex_hash(prev_hash) {
        return None;
    }
    let prev_bytes = hex::decode(prev_hash).ok()?;
    let entropy_bytes = bs58::decode(entropy).into_vec().ok()?;
    if entropy_bytes.len() != 32 {
        return None;
    }
    let mut preimage = Vec::with_capacity(91);
    preimage.extend_from_slice(ANCHOR_V3_DOMAIN);
    preimage.extend_from_slice(&prev_bytes);
    preimage.extend_from_slice(&beat_index.to_be_bytes());
    preimage.extend_from_slice(&entropy_bytes);
    let mut hasher = Sha256::new();
    hasher.update(&preimage);
    Some(hex::encode(hasher.finalize()))
}

fn v1_nonce(utc: i64, epoch: u32) -> String {
    format!("anchor:{}:{}", utc, epoch)
}

/// Build the next anchor on top of `prev` (or the genesis anchor when
/// `prev` is `None`), stamped with the current wall clock.
///
/// With entropy the hash uses the V3 formula; without it the legacy V1
/// sequential formula at `difficulty`.
pub fn create_global_anchor(
    prev: Option<&GlobalAnchor>,
    difficulty: u32,
    epoch: u32,
    entropy: Option<&str>,
) -> Result<GlobalAnchor> {
    if difficulty == 0 {
        return Err(BeatsError::Anchor("difficulty must be positive".into()));
    }
    let (beat_index, prev_hash) = match prev {
        Some(p) => (p.beat_index + 1, p.hash.clone()),
        None => (0, genesis_prev_hash().to_string()),
    };
    let utc = chrono::Utc::now().timestamp_millis();
    let hash = match entropy {
        Some(e) => compute_anchor_hash_v3(&prev_hash, beat_index, e).ok_or_else(|| {
            BeatsError::Anchor(format!("entropy is not 32 bytes of base58: {}", e))
        })?,
        None => chain_hash(&prev_hash, beat_index, difficulty, Some(&v1_nonce(utc, epoch)), None),
    };
    Ok(GlobalAnchor {
        beat_index,
        hash,
        prev_hash,
        utc,
        difficulty,
        epoch,
        solana_entropy: entropy.map(str::to_string),
        signature: None,
    })
}

/// Verify an anchor against whichever hash formula its fields select:
/// V3 when `solana_entropy` is present, V1 otherwise.
pub fn verify_global_anchor(anchor: &GlobalAnchor) -> bool {
    if anchor.difficulty == 0 || anchor.utc < 0 {
        return false;
    }
    if !is_hex_hash(&anchor.hash) || !is_hex_hash(&anchor.prev_hash) {
        return false;
    }
    let expected = match &anchor.solana_entropy {
        Some(entropy) => {
            match compute_anchor_hash_v3(&anchor.prev_hash, anchor.beat_index, entropy) {
                Some(h) => h,
                None => return false,
            }
        }
        None => chain_hash(
            &anchor.prev_hash,
            anchor.beat_index,
            anchor.difficulty,
            Some(&v1_nonce(anchor.utc, anchor.epoch)),
            None,
        ),
    };
    expected == anchor.hash
}
