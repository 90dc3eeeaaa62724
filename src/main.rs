use actix_web::{web, App, HttpServer};
use anyhow::Context;
use beats_core::config::BeatsConfig;
use beats_core::http::{routes, AppState};
use beats_core::ledger::SolanaRpc;
use beats_core::ratelimit::SWEEP_INTERVAL;
use beats_core::signer::Keychain;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = BeatsConfig::from_env().context("loading configuration")?;
    log::info!("beats starting: {}", config.summary());

    let keys = Keychain::from_base58_secret(&config.anchor_keypair)
        .context("parsing BEATS_ANCHOR_KEYPAIR")?;
    log::info!("anchor signer: {}", keys.writer_address);
    log::info!(
        "receipt keys: timestamp={} work_proof={}",
        keys.timestamp.public_key_base58(),
        keys.work_proof.public_key_base58()
    );

    let ledger = Arc::new(
        SolanaRpc::new(&config.rpc_url, keys.writer.clone()).context("building ledger client")?,
    );

    let listen_port = config.listen_port;
    let state = web::Data::new(AppState::new(config, keys, ledger));

    // Periodic rate-limit sweep; dies with the server process.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            sweep_state.limiters.sweep_all();
        }
    });

    log::info!("listening on 0.0.0.0:{}", listen_port);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(("0.0.0.0", listen_port))?
        .run()
        .await?;

    Ok(())
}
