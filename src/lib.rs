//! Beats: a public, stateless time-authentication service.
//!
//! The service publishes an append-only chain of anchors to a public
//! ledger — a canonical clock anyone can audit — and verifies sequential
//! SHA-256 work submitted against it. Three public capabilities:
//!
//! 1. timestamp an opaque 32-byte digest against the current anchor,
//! 2. verify beats, beat chains, and check-in proofs by recomputing the
//!    hash chain,
//! 3. accept work-proof submissions and return signed receipts.
//!
//! The process holds no durable state: the ledger is the persistence,
//! the anchor chain is the clock, and every receipt can be verified
//! offline against the published Ed25519 keys.

// Production modules
pub mod error;
pub mod config;
pub mod metrics;

// Core engine
pub mod beat;
pub mod proof;
pub mod memo;
pub mod selector;
pub mod canonical;
pub mod signer;

// Ledger + serving
pub mod ledger;
pub mod cache;
pub mod advancer;
pub mod verifier;
pub mod timestamper;
pub mod ratelimit;
pub mod http;

// Re-export the protocol surface
pub use beat::{
    compute_anchor_hash_v3, compute_beat, create_global_anchor, genesis_prev_hash, verify_beat,
    verify_global_anchor, Beat, GlobalAnchor, ANCHOR_HASH_GRACE_WINDOW, ANCHOR_INTERVAL_MS,
    DEFAULT_DIFFICULTY, MAX_DIFFICULTY, MIN_DIFFICULTY, PUBLIC_MAX_DIFFICULTY,
    PUBLIC_MAX_SPOT_CHECKS,
};
pub use error::{BeatsError, Result};
pub use proof::{verify_beat_chain, verify_checkin_proof, CheckinProof, SpotCheck};
pub use selector::{is_continuous_next_anchor, select_canonical_anchor};
pub use signer::{verify_receipt, Keychain};
