use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;

/// Maximum question length, in characters.
pub const MAX_QUESTION_LEN: usize = 200;

// ---------------------------------------------------------------------------
// MarketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    /// Created, pool state not yet initialized.
    #[default]
    Created,
    /// Pool initialized, accepting wagers inside the betting window.
    Open,
    /// Betting window over, awaiting resolution.
    BettingClosed,
    /// Winning outcome recorded; payouts can be computed and claimed.
    Resolved,
    /// No computations outstanding, claims only.
    Settled,
    /// Refunds available.
    Cancelled,
}

impl MarketStatus {
    /// `winning_outcome` must be present exactly in these states.
    pub fn has_outcome(self) -> bool {
        match self {
            MarketStatus::Resolved | MarketStatus::Settled => true,
            MarketStatus::Created
            | MarketStatus::Open
            | MarketStatus::BettingClosed
            | MarketStatus::Cancelled => false,
        }
    }

    pub fn accepts_claims(self) -> bool {
        match self {
            MarketStatus::Resolved | MarketStatus::Settled => true,
            MarketStatus::Created
            | MarketStatus::Open
            | MarketStatus::BettingClosed
            | MarketStatus::Cancelled => false,
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketStatus::Created => "created",
            MarketStatus::Open => "open",
            MarketStatus::BettingClosed => "betting_closed",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Settled => "settled",
            MarketStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    No,
    Yes,
}

impl Outcome {
    pub fn as_u8(self) -> u8 {
        match self {
            Outcome::No => 0,
            Outcome::Yes => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Outcome::No),
            1 => Some(Outcome::Yes),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::No => write!(f, "no"),
            Outcome::Yes => write!(f, "yes"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Ledger record for one binary-outcome market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: u64,
    pub authority: Address,
    pub question: String,
    /// Settlement asset.
    pub token_mint: Address,
    pub vault: Address,
    pub pool_state: Address,
    pub betting_start_ts: i64,
    pub betting_end_ts: i64,
    pub resolution_end_ts: i64,
    pub status: MarketStatus,
    pub winning_outcome: Option<Outcome>,
    /// Bet count only; per-side totals stay encrypted.
    pub total_positions: u32,
    pub state_commitment: [u8; 32],
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl Market {
    pub fn in_betting_window(&self, now: i64) -> bool {
        now >= self.betting_start_ts && now < self.betting_end_ts
    }

    pub fn view(&self, address: Address, now: i64) -> MarketView {
        MarketView {
            address,
            market_id: self.market_id,
            question: self.question.clone(),
            status: self.status,
            token_mint: self.token_mint,
            betting_start: ts_to_datetime(self.betting_start_ts),
            betting_end: ts_to_datetime(self.betting_end_ts),
            resolution_end: ts_to_datetime(self.resolution_end_ts),
            total_positions: self.total_positions,
            winning_outcome: self.winning_outcome,
            created_at: ts_to_datetime(self.created_at),
            resolved_at: self.resolved_at.map(ts_to_datetime),
            authority: self.authority,
            is_active: self.status == MarketStatus::Open,
            can_bet: self.status == MarketStatus::Open && self.in_betting_window(now),
            is_resolved: self.status == MarketStatus::Resolved,
        }
    }
}

/// Read model of a market for display and API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketView {
    pub address: Address,
    pub market_id: u64,
    pub question: String,
    pub status: MarketStatus,
    pub token_mint: Address,
    pub betting_start: DateTime<Utc>,
    pub betting_end: DateTime<Utc>,
    pub resolution_end: DateTime<Utc>,
    pub total_positions: u32,
    pub winning_outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub authority: Address,
    pub is_active: bool,
    pub can_bet: bool,
    pub is_resolved: bool,
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}
