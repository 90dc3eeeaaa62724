//! Endpoint handlers.

use crate::advancer::{advance_anchor, AdvanceOutcome};
use crate::beat::{
    verify_beat, ANCHOR_HASH_GRACE_WINDOW, ANCHOR_INTERVAL_MS, PUBLIC_MAX_DIFFICULTY,
    PUBLIC_MAX_SPOT_CHECKS,
};
use crate::cache::ANCHOR_CACHE_TTL;
use crate::error::BeatsError;
use crate::http::{client_ip, constant_time_eq, AppState};
use crate::proof::verify_beat_chain;
use crate::proof::verify_checkin_proof;
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::timestamper::{create_timestamp, validate_digest};
use crate::verifier::{
    clamp_public_difficulty, clamp_public_spot_checks, evaluate_work_proof,
    validate_work_proof_shape, VerifyRequest, WorkProof, WorkProofVerdict, MAX_CHAIN_BEATS,
};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": message.into() }))
}

fn service_unavailable(message: impl Into<String>) -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({ "error": message.into() }))
}

fn rate_limited(state: &AppState, decision: &RateDecision) -> HttpResponse {
    state.ops.record_rate_limited();
    let retry_after = decision.retry_after_secs().max(1);
    HttpResponse::TooManyRequests()
        .insert_header((header::RETRY_AFTER, retry_after.to_string()))
        .json(json!({ "error": "rate limit exceeded", "retry_after": retry_after }))
}

fn error_response(err: BeatsError) -> HttpResponse {
    if err.is_unavailable() {
        service_unavailable(err.to_string())
    } else {
        log::error!("request failed: {}", err);
        HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }))
    }
}

/// GET /api/health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let anchor = state.cache.latest(state.ledger.as_ref()).await.ok().flatten();
    HttpResponse::Ok().json(json!({
        "service": "beats",
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "anchor": anchor,
        "anchor_signer": state.keys.writer_address,
        "timing": {
            "uptime_secs": state.ops.uptime_secs(),
            "anchor_interval_ms": ANCHOR_INTERVAL_MS,
            "anchor_grace_window": ANCHOR_HASH_GRACE_WINDOW,
            "anchor_cache_ttl_secs": ANCHOR_CACHE_TTL.as_secs(),
        },
        "operations": state.ops.snapshot(),
    }))
}

/// GET /api/v1/beat/anchor — canonical tip plus a signed anchor receipt.
pub async fn anchor(state: web::Data<AppState>) -> HttpResponse {
    let tip = match state.cache.latest(state.ledger.as_ref()).await {
        Ok(Some(tip)) => tip,
        Ok(None) => return service_unavailable("no anchor published yet"),
        Err(err) => return error_response(err),
    };

    let mut payload = json!({
        "type": "anchor",
        "beat_index": tip.beat_index,
        "hash": tip.hash,
        "prev_hash": tip.prev_hash,
        "utc": tip.utc,
        "difficulty": tip.difficulty,
        "epoch": tip.epoch,
    });
    if let Some(entropy) = &tip.solana_entropy {
        payload["solana_entropy"] = json!(entropy);
    }
    let signature = state.keys.timestamp.sign(&payload);

    HttpResponse::Ok().json(json!({
        "anchor": tip,
        "receipt": {
            "payload": payload,
            "signature": signature,
            "public_key": state.keys.timestamp.public_key_hex(),
        },
    }))
}

/// GET /api/v1/beat/key — receipt verification keys.
pub async fn keys(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "algorithm": "Ed25519",
        "timestamp": {
            "public_key": state.keys.timestamp.public_key_hex(),
            "public_key_base58": state.keys.timestamp.public_key_base58(),
            "signing_context": state.keys.timestamp.context,
        },
        "work_proof": {
            "public_key": state.keys.work_proof.public_key_hex(),
            "public_key_base58": state.keys.work_proof.public_key_base58(),
            "signing_context": state.keys.work_proof.context,
        },
    }))
}

/// GET /api/v1/beat/verify — endpoint metadata.
pub async fn verify_meta() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": "beats",
        "modes": ["beat", "chain", "proof"],
        "limits": {
            "max_chain_beats": MAX_CHAIN_BEATS,
            "max_spot_checks": PUBLIC_MAX_SPOT_CHECKS,
            "max_difficulty": PUBLIC_MAX_DIFFICULTY,
        },
    }))
}

/// POST /api/v1/beat/verify — beat / chain / proof modes.
pub async fn verify(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> HttpResponse {
    let decision = state.limiters.verify.check(&client_ip(&req));
    if !decision.allowed {
        return rate_limited(&state, &decision);
    }
    state.ops.record_verification();

    match body.into_inner() {
        VerifyRequest::Beat { beat, difficulty } => {
            let difficulty = clamp_public_difficulty(difficulty);
            let valid = verify_beat(&beat, difficulty);
            HttpResponse::Ok().json(json!({
                "valid": valid,
                "beat_index": beat.index,
                "difficulty": difficulty,
            }))
        }
        VerifyRequest::Chain {
            beats,
            spot_checks,
            difficulty,
        } => {
            if beats.len() > MAX_CHAIN_BEATS {
                return bad_request(format!("at most {} beats per chain", MAX_CHAIN_BEATS));
            }
            let difficulty = clamp_public_difficulty(difficulty);
            let spot_checks = clamp_public_spot_checks(spot_checks);
            let result = verify_beat_chain(&beats, difficulty, spot_checks);
            HttpResponse::Ok().json(json!({
                "valid": result.valid,
                "chain_length": beats.len(),
                "beats_checked": result.checked,
                "failed_indices": result.failed,
            }))
        }
        VerifyRequest::Proof { proof, difficulty } => {
            if proof.spot_checks.len() > PUBLIC_MAX_SPOT_CHECKS {
                return bad_request(format!(
                    "at most {} spot checks per proof",
                    PUBLIC_MAX_SPOT_CHECKS
                ));
            }
            let difficulty = clamp_public_difficulty(difficulty);
            let outcome = verify_checkin_proof(&proof, difficulty);
            HttpResponse::Ok().json(outcome)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimestampBody {
    hash: String,
}

/// POST /api/v1/beat/timestamp
pub async fn timestamp(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<TimestampBody>,
) -> HttpResponse {
    let ip = client_ip(&req);
    let pro = is_pro_tier(&req, &state);
    let (minute, day, tier): (&RateLimiter, &RateLimiter, &'static str) = if pro {
        (&state.limiters.pro_minute, &state.limiters.pro_day, "pro")
    } else {
        (
            &state.limiters.timestamp_minute,
            &state.limiters.timestamp_day,
            "free",
        )
    };

    let minute_decision = minute.check(&ip);
    if !minute_decision.allowed {
        return rate_limited(&state, &minute_decision);
    }
    let day_decision = day.check(&ip);
    if !day_decision.allowed {
        return rate_limited(&state, &day_decision);
    }

    if let Err(message) = validate_digest(&body.hash) {
        return bad_request(message);
    }
    state.ops.record_timestamp();

    match create_timestamp(
        state.ledger.as_ref(),
        &state.cache,
        &state.keys,
        &state.config,
        &body.hash,
        tier,
    )
    .await
    {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(err),
    }
}

fn is_pro_tier(req: &HttpRequest, state: &AppState) -> bool {
    let token = match &state.config.pro_tier_token {
        Some(token) => token,
        None => return false,
    };
    req.headers()
        .get("x-beats-tier-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| constant_time_eq(v, token))
        .unwrap_or(false)
}

/// Work-proof submissions arrive wrapped (`{"work_proof": …}`) or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WorkProofBody {
    Wrapped { work_proof: WorkProof },
    Flat(WorkProof),
}

/// POST /api/v1/beat/work-proof
pub async fn work_proof(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<WorkProofBody>,
) -> HttpResponse {
    let decision = state.limiters.verify.check(&client_ip(&req));
    if !decision.allowed {
        return rate_limited(&state, &decision);
    }

    let proof = match body.into_inner() {
        WorkProofBody::Wrapped { work_proof } => work_proof,
        WorkProofBody::Flat(work_proof) => work_proof,
    };
    if let Err(reason) = validate_work_proof_shape(&proof) {
        return bad_request(reason);
    }
    state.ops.record_work_proof();

    // A ledger hiccup reads as a cold start: freshness is skipped rather
    // than rejecting otherwise-valid work.
    let tip = state.cache.latest(state.ledger.as_ref()).await.ok().flatten();

    match evaluate_work_proof(&proof, tip.as_ref()) {
        WorkProofVerdict::Invalid { reason } => {
            log::debug!("work proof rejected: {}", reason);
            HttpResponse::Ok().json(json!({ "valid": false, "reason": reason }))
        }
        WorkProofVerdict::Valid {
            difficulty,
            spot_checks_verified,
        } => {
            let mut receipt = json!({
                "type": "work_proof",
                "from_hash": proof.from_hash,
                "to_hash": proof.to_hash,
                "beats_computed": proof.beats_computed,
                "difficulty": difficulty,
                "anchor_index": proof.anchor_index,
                "spot_checks_verified": spot_checks_verified,
                "utc": chrono::Utc::now().timestamp_millis(),
                "public_key": state.keys.work_proof.public_key_hex(),
            });
            if let Some(anchor_hash) = &proof.anchor_hash {
                receipt["anchor_hash"] = json!(anchor_hash);
            }
            // sign everything except the signature field itself
            let signature = state.keys.work_proof.sign(&receipt);
            receipt["signature"] = json!(signature);
            HttpResponse::Ok().json(json!({ "valid": true, "receipt": receipt }))
        }
    }
}

/// GET /api/cron/anchor — scheduler-driven anchor advancement.
pub async fn cron_anchor(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let secret = match &state.config.cron_secret {
        Some(secret) => secret,
        None => return service_unavailable("CRON_SECRET is not configured"),
    };
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| constant_time_eq(v, &format!("Bearer {}", secret)))
        .unwrap_or(false);
    if !authorized {
        return HttpResponse::Unauthorized().json(json!({ "error": "unauthorized" }));
    }

    let started = Instant::now();
    match advance_anchor(state.ledger.as_ref()).await {
        Ok(outcome) => {
            if matches!(outcome, AdvanceOutcome::Generated { .. }) {
                state.ops.record_anchor_generated();
                state.cache.invalidate();
            }
            HttpResponse::Ok().json(outcome)
        }
        Err(err) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            log::error!("anchor advancement failed after {}ms: {}", elapsed_ms, err);
            let body = json!({
                "status": "error",
                "error": err.to_string(),
                "elapsed_ms": elapsed_ms,
            });
            if err.is_unavailable() {
                HttpResponse::ServiceUnavailable().json(body)
            } else {
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}
