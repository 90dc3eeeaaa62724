//! Service configuration, loaded once from the environment.

use crate::error::{BeatsError, Result};
use std::env;

/// Default ledger RPC endpoint when none is configured.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Runtime configuration for the beats service.
#[derive(Clone, Debug)]
pub struct BeatsConfig {
    /// Base58 writer secret; also the HKDF master for receipt keys.
    pub anchor_keypair: String,
    /// Bearer credential for the cron endpoint. Unset means the cron
    /// endpoint refuses to run.
    pub cron_secret: Option<String>,
    /// Ledger JSON-RPC endpoint.
    pub rpc_url: String,
    /// Token that unlocks the raised timestamp quotas.
    pub pro_tier_token: Option<String>,
    /// HTTP listen port.
    pub listen_port: u16,
}

impl BeatsConfig {
    /// Load configuration from the environment.
    ///
    /// `BEATS_ANCHOR_KEYPAIR` is required; everything else has a default
    /// or is optional.
    pub fn from_env() -> Result<Self> {
        let anchor_keypair = env::var("BEATS_ANCHOR_KEYPAIR")
            .map_err(|_| BeatsError::Config("BEATS_ANCHOR_KEYPAIR is not set".into()))?;

        let rpc_url = env::var("NEXT_PUBLIC_SOLANA_RPC_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let listen_port = match env::var("BEATS_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| BeatsError::Config(format!("BEATS_PORT is not a port: {}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        let config = BeatsConfig {
            anchor_keypair,
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            rpc_url,
            pro_tier_token: env::var("BEATS_PRO_TIER_TOKEN").ok().filter(|s| !s.is_empty()),
            listen_port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.anchor_keypair.trim().is_empty() {
            return Err(BeatsError::Config("BEATS_ANCHOR_KEYPAIR is empty".into()));
        }
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(BeatsError::Config(format!(
                "RPC URL must be http(s): {}",
                self.rpc_url
            )));
        }
        if self.cron_secret.is_none() {
            log::warn!("CRON_SECRET is not set - the anchor cron endpoint will refuse to run");
        }
        Ok(())
    }

    /// Ledger cluster inferred from the RPC URL.
    pub fn cluster(&self) -> &'static str {
        if self.rpc_url.contains("devnet") {
            "devnet"
        } else if self.rpc_url.contains("testnet") {
            "testnet"
        } else {
            "mainnet-beta"
        }
    }

    /// Public explorer link for a ledger transaction.
    pub fn explorer_tx_url(&self, signature: &str) -> String {
        match self.cluster() {
            "mainnet-beta" => format!("https://explorer.solana.com/tx/{}", signature),
            cluster => format!("https://explorer.solana.com/tx/{}?cluster={}", signature, cluster),
        }
    }

    /// One-line summary for startup logs. Never includes secrets.
    pub fn summary(&self) -> String {
        format!(
            "cluster={} rpc={} port={} cron_secret={} pro_tier={}",
            self.cluster(),
            self.rpc_url,
            self.listen_port,
            if self.cron_secret.is_some() { "set" } else { "unset" },
            if self.pro_tier_token.is_some() { "set" } else { "unset" },
        )
    }
}
