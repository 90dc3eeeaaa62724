//! HTTP surface: routing, CORS, payload guards, and client identity.

pub mod handlers;

use crate::cache::AnchorCache;
use crate::config::BeatsConfig;
use crate::ledger::Ledger;
use crate::metrics::OpsCollector;
use crate::ratelimit::Limiters;
use crate::signer::Keychain;
use actix_cors::Cors;
use actix_web::http::{header, StatusCode};
use actix_web::{error, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Default JSON body cap.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;
/// Chain verification can carry up to 1000 beats.
pub const VERIFY_BODY_LIMIT: usize = 512 * 1024;
/// A timestamp submission is one 64-char digest.
pub const TIMESTAMP_BODY_LIMIT: usize = 256;

/// Everything a handler needs, shared across workers.
pub struct AppState {
    pub config: BeatsConfig,
    pub keys: Keychain,
    pub ledger: Arc<dyn Ledger>,
    pub cache: AnchorCache,
    pub ops: OpsCollector,
    pub limiters: Limiters,
}

impl AppState {
    pub fn new(config: BeatsConfig, keys: Keychain, ledger: Arc<dyn Ledger>) -> Self {
        AppState {
            config,
            keys,
            ledger,
            cache: AnchorCache::default(),
            ops: OpsCollector::new(),
            limiters: Limiters::new(),
        }
    }
}

/// Timing-safe string comparison for bearer credentials.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Resolve the client IP for rate limiting.
///
/// Platform headers are tried in trust order; `x-forwarded-for` is only
/// trusted for its last element (appended by the closest proxy). With
/// nothing usable, loopback — direct connections all share one bucket,
/// which only happens outside any fronting proxy.
pub fn client_ip(req: &HttpRequest) -> String {
    for name in ["x-vercel-forwarded-for", "x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = req.headers().get(name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(value) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        let last = value.split(',').next_back().unwrap_or("").trim();
        if !last.is_empty() {
            return last.to_string();
        }
    }
    "127.0.0.1".to_string()
}

/// Open CORS policy for the public API. The cron scope deliberately
/// skips this — schedulers are not browsers.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-beats-tier-token"),
        ])
        .max_age(3600)
}

/// JSON extractor config with a body cap and JSON-shaped errors:
/// 413 on overflow, 415 on wrong content type, 400 otherwise.
fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let status = match &err {
                error::JsonPayloadError::Overflow { .. }
                | error::JsonPayloadError::OverflowKnownLength { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                error::JsonPayloadError::ContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::BAD_REQUEST,
            };
            let body = serde_json::json!({ "error": err.to_string() });
            error::InternalError::from_response(err, HttpResponse::build(status).json(body)).into()
        })
}

/// Route table. The cron scope registers first and stays outside the
/// CORS wrap.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/cron").route("/anchor", web::get().to(handlers::cron_anchor)));
    cfg.service(
        web::scope("/api")
            .wrap(cors())
            .app_data(json_config(DEFAULT_BODY_LIMIT))
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/v1/beat")
                    .route("/anchor", web::get().to(handlers::anchor))
                    .route("/key", web::get().to(handlers::keys))
                    .service(
                        web::resource("/verify")
                            .app_data(json_config(VERIFY_BODY_LIMIT))
                            .route(web::get().to(handlers::verify_meta))
                            .route(web::post().to(handlers::verify)),
                    )
                    .service(
                        web::resource("/timestamp")
                            .app_data(json_config(TIMESTAMP_BODY_LIMIT))
                            .route(web::post().to(handlers::timestamp)),
                    )
                    .service(
                        web::resource("/work-proof")
                            .app_data(json_config(DEFAULT_BODY_LIMIT))
                            .route(web::post().to(handlers::work_proof)),
                    ),
            ),
    );
}
