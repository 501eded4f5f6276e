//! Configuration for Vivi
//!
//! CLI arguments with environment variable fallbacks. A `.env` file in the
//! working directory is loaded before parsing.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::content::DEFAULT_MAX_VOICE_BYTES;
use crate::ledger::{Address, DEFAULT_EVENT_BUFFER};

/// Owner used for the development ledger when none is configured
pub const DEV_CONTRACT_OWNER: &str = "0x00000000000000000000000000000000000dec0d";

/// Vivi - social ledger with an off-chain content mirror
#[derive(Parser, Debug, Clone)]
#[command(name = "vivi")]
#[command(about = "Vivi posts, comments, reactions and bounties: ledger, content mirror and REST API")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI. Without one the mirror is kept in memory.
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "vivi")]
    pub mongodb_db: String,

    /// Address that deploys (owns) the ledger contract
    #[arg(long, env = "CONTRACT_OWNER")]
    pub contract_owner: Option<String>,

    /// Enable development mode (faucet, default contract owner)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Largest accepted voice upload in bytes
    #[arg(long, env = "MAX_VOICE_BYTES", default_value_t = DEFAULT_MAX_VOICE_BYTES)]
    pub max_voice_bytes: usize,

    /// Seconds between reconciliation passes (0 disables the periodic pass)
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "300")]
    pub reconcile_interval_secs: u64,

    /// Capacity of the ledger event channel
    #[arg(long, env = "EVENT_BUFFER", default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,
}

impl Args {
    /// Ledger owner (falls back to a fixed development address in dev mode)
    pub fn contract_owner(&self) -> Result<Address, String> {
        match (&self.contract_owner, self.dev_mode) {
            (Some(raw), _) => {
                Address::parse(raw).map_err(|e| format!("CONTRACT_OWNER: {}", e))
            }
            (None, true) => Address::parse(DEV_CONTRACT_OWNER).map_err(|e| e.to_string()),
            (None, false) => Err("CONTRACT_OWNER is required in production mode".to_string()),
        }
    }

    /// Reconciliation period, `None` when disabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    /// Request body limit: base64 inflates voice payloads by 4/3, plus room
    /// for the JSON around them
    pub fn max_body_bytes(&self) -> usize {
        self.max_voice_bytes
            .saturating_mul(4)
            .saturating_div(3)
            .saturating_add(64 * 1024)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.contract_owner()?;

        if self.max_voice_bytes == 0 {
            return Err("MAX_VOICE_BYTES must be greater than zero".to_string());
        }

        if self.event_buffer == 0 {
            return Err("EVENT_BUFFER must be greater than zero".to_string());
        }

        if let Some(uri) = &self.mongodb_uri {
            if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
                return Err("MONGODB_URI must start with mongodb:// or mongodb+srv://".to_string());
            }
        }

        Ok(())
    }
}
