use serde::{Deserialize, Serialize};

use super::address::Address;
use super::job::ComputationKind;
use super::market::Outcome;

/// Events emitted by confirmed transactions, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    MarketCreated {
        market: Address,
        market_id: u64,
        authority: Address,
        token_mint: Address,
        betting_end_ts: i64,
        resolution_end_ts: i64,
    },
    MarketOpened {
        market: Address,
        opened_at: i64,
    },
    BetPlaced {
        market: Address,
        position: Address,
        bettor: Address,
        deposit_amount: u64,
        computation_id: u64,
    },
    BetProcessed {
        market: Address,
        position: Address,
        state_version: u64,
        new_commitment: [u8; 32],
    },
    BettingClosed {
        market: Address,
        total_positions: u32,
        closed_at: i64,
    },
    MarketResolved {
        market: Address,
        winning_outcome: Outcome,
        resolved_at: i64,
    },
    MarketCancelled {
        market: Address,
        cancelled_at: i64,
    },
    MarketSettled {
        market: Address,
        settled_at: i64,
    },
    PayoutComputed {
        market: Address,
        position: Address,
        user: Address,
        payout_amount: u64,
    },
    PayoutClaimed {
        market: Address,
        position: Address,
        user: Address,
        amount: u64,
    },
    RefundClaimed {
        market: Address,
        position: Address,
        user: Address,
        amount: u64,
    },
    PoolStateUpdated {
        market: Address,
        state_version: u64,
        pending_computations: u32,
    },
    ComputationQueued {
        market: Address,
        position: Address,
        offset: u64,
        kind: ComputationKind,
    },
    ComputationFinalized {
        market: Address,
        offset: u64,
        kind: ComputationKind,
        state_version: Option<u64>,
    },
    ComputationAborted {
        market: Address,
        offset: u64,
        kind: ComputationKind,
        reason: String,
    },
}

impl LedgerEvent {
    /// Offset of the job this event finalizes, if any.
    pub fn finalized_offset(&self) -> Option<u64> {
        match self {
            LedgerEvent::ComputationFinalized { offset, .. }
            | LedgerEvent::ComputationAborted { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
