use serde::{Deserialize, Serialize};
use std::fmt;

use super::address::Address;

/// Encrypted wager size: two 32-byte cipher blocks (outcome, amount).
pub const ENCRYPTED_BET_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    /// Wager escrowed, `process_bet` queued.
    #[default]
    Pending,
    /// Wager folded into the encrypted pool.
    Processed,
    /// Payout known, claim possible.
    PayoutComputed,
    Claimed,
    /// Deposit returned after cancellation.
    Refunded,
}

impl PositionStatus {
    /// Terminal states: funds for this position have left the vault.
    pub fn is_settled(self) -> bool {
        match self {
            PositionStatus::Claimed | PositionStatus::Refunded => true,
            PositionStatus::Pending
            | PositionStatus::Processed
            | PositionStatus::PayoutComputed => false,
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionStatus::Pending => "pending",
            PositionStatus::Processed => "processed",
            PositionStatus::PayoutComputed => "payout_computed",
            PositionStatus::Claimed => "claimed",
            PositionStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// A bettor's single position in a market. Lives at the address derived
/// from `(market, owner)`, which is what makes it unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub market: Address,
    pub owner: Address,
    pub encrypted_bet: Vec<u8>,
    /// Bettor's ephemeral x25519 public key.
    pub user_pubkey: [u8; 32],
    pub nonce: u128,
    /// Transparent stake in the asset's smallest unit.
    pub deposit_amount: u64,
    /// Meaningful only once the payout has been computed.
    pub payout_amount: u64,
    pub status: PositionStatus,
    /// Offset of the most recent computation queued for this position.
    pub computation_id: u64,
    pub created_at: i64,
    pub processed_at: Option<i64>,
    pub claimed_at: Option<i64>,
}

impl Position {
    pub fn can_claim_payout(&self) -> bool {
        self.status == PositionStatus::PayoutComputed && self.payout_amount > 0
    }

    pub fn can_claim_refund(&self) -> bool {
        !self.status.is_settled()
    }
}
