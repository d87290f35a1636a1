use anyhow::Context;
use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

use crate::models::{Address, NATIVE_MINT};

const DEFAULT_PROGRAM_ID: &str = "JAycaSPgFD8hd4Ys7RuJ5pJFzBL8pf11BT8z5HMa1zhZ";
const DEFAULT_NETWORK_PROGRAM_ID: &str = "Arcj82pX7HxYKLR92qvgZUAd7vGS1k4hQvAFcPATFdEQ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format {other:?} (expected pretty or json)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Identities
    pub program_id: Address,
    pub network_program_id: Address,
    pub cluster_offset: u32,

    // Job plumbing
    pub finalize_timeout: Duration,
    pub finalize_poll_interval: Duration,
    pub job_channel_capacity: usize,
    pub simulated_compute_latency: Duration,

    // Demo round
    pub settlement_mint: Address,
    pub demo_bet_amount: Decimal,

    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let job_channel_capacity: usize = var("JOB_CHANNEL_CAPACITY", "256")
            .parse()
            .context("JOB_CHANNEL_CAPACITY must be an integer")?;
        if job_channel_capacity == 0 {
            anyhow::bail!("JOB_CHANNEL_CAPACITY must be at least 1");
        }

        let settlement_mint = match lookup("SETTLEMENT_MINT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SETTLEMENT_MINT is not a valid address: {raw}"))?,
            None => NATIVE_MINT,
        };

        Ok(Self {
            program_id: var("PROGRAM_ID", DEFAULT_PROGRAM_ID)
                .parse()
                .context("PROGRAM_ID is not a valid address")?,
            network_program_id: var("ARCIUM_PROGRAM_ID", DEFAULT_NETWORK_PROGRAM_ID)
                .parse()
                .context("ARCIUM_PROGRAM_ID is not a valid address")?,
            cluster_offset: var("CLUSTER_OFFSET", "456")
                .parse()
                .context("CLUSTER_OFFSET must be a u32")?,

            finalize_timeout: Duration::from_secs(
                var("FINALIZE_TIMEOUT_SECS", "120")
                    .parse()
                    .context("FINALIZE_TIMEOUT_SECS must be an integer")?,
            ),
            finalize_poll_interval: Duration::from_millis(
                var("FINALIZE_POLL_INTERVAL_MS", "500")
                    .parse()
                    .context("FINALIZE_POLL_INTERVAL_MS must be an integer")?,
            ),
            job_channel_capacity,
            simulated_compute_latency: Duration::from_millis(
                var("SIMULATED_COMPUTE_LATENCY_MS", "250")
                    .parse()
                    .context("SIMULATED_COMPUTE_LATENCY_MS must be an integer")?,
            ),

            settlement_mint,
            demo_bet_amount: var("DEMO_BET_AMOUNT", "1.0")
                .parse()
                .context("DEMO_BET_AMOUNT must be a decimal")?,

            log_format: var("LOG_FORMAT", "pretty").parse()?,
        })
    }
}
