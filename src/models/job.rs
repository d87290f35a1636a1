use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::address::Address;
use crate::pda::QueueAccounts;

// ---------------------------------------------------------------------------
// ComputationKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationKind {
    ProcessBet,
    ComputePayout,
}

impl ComputationKind {
    /// Circuit name registered with the compute network.
    pub fn circuit_name(self) -> &'static str {
        match self {
            ComputationKind::ProcessBet => "process_bet",
            ComputationKind::ComputePayout => "compute_payout",
        }
    }

    fn tag(self) -> u8 {
        match self {
            ComputationKind::ProcessBet => 0,
            ComputationKind::ComputePayout => 1,
        }
    }
}

impl fmt::Display for ComputationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.circuit_name())
    }
}

// ---------------------------------------------------------------------------
// ComputationRecord: ledger receipt of a queued job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationStatus {
    Queued,
    Finalized,
    Aborted,
}

/// Stored at the computation address derived from the job offset. Its
/// existence is what makes an offset "in flight"; its status is what makes
/// result application idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationRecord {
    pub offset: u64,
    pub kind: ComputationKind,
    pub market_id: u64,
    pub market: Address,
    pub position: Address,
    pub comp_def: Address,
    pub cluster: Address,
    pub status: ComputationStatus,
    pub queued_at: i64,
    pub finalized_at: Option<i64>,
    /// Pool version produced by this job, when it applied successfully.
    pub state_version: Option<u64>,
    pub abort_reason: Option<String>,
}

impl ComputationRecord {
    pub fn is_finalized(&self) -> bool {
        self.status != ComputationStatus::Queued
    }
}

// ---------------------------------------------------------------------------
// Two-message job protocol
// ---------------------------------------------------------------------------

/// Sent to the compute network once the queueing transaction confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSubmitted {
    pub offset: u64,
    pub kind: ComputationKind,
    pub market_id: u64,
    pub position: Address,
    pub accounts: QueueAccounts,
}

/// Raw result of a computation as produced by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputationOutput {
    ProcessBet {
        encrypted_state: Vec<u8>,
        state_nonce: u128,
    },
    ComputePayout {
        payout_amount: u64,
    },
    Aborted {
        reason: String,
    },
}

impl ComputationOutput {
    /// Message the cluster signs: binds the result to one offset and kind.
    pub fn signing_digest(&self, offset: u64, kind: ComputationKind) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"darkpool:computation-output");
        hasher.update(offset.to_le_bytes());
        hasher.update([kind.tag()]);
        match self {
            ComputationOutput::ProcessBet {
                encrypted_state,
                state_nonce,
            } => {
                hasher.update([0u8]);
                hasher.update((encrypted_state.len() as u64).to_le_bytes());
                hasher.update(encrypted_state);
                hasher.update(state_nonce.to_le_bytes());
            }
            ComputationOutput::ComputePayout { payout_amount } => {
                hasher.update([1u8]);
                hasher.update(payout_amount.to_le_bytes());
            }
            ComputationOutput::Aborted { reason } => {
                hasher.update([2u8]);
                hasher.update(reason.as_bytes());
            }
        }
        hasher.finalize().into()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ComputationOutput::Aborted { .. })
    }
}

/// Result message delivered by the network; applied exactly once per offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFinalized {
    pub offset: u64,
    pub kind: ComputationKind,
    pub output: ComputationOutput,
    /// Cluster ed25519 signature over [`ComputationOutput::signing_digest`].
    pub signature: [u8; 64],
}

/// What a caller holds after submitting a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub offset: u64,
    pub kind: ComputationKind,
    pub market_id: u64,
    pub position: Address,
    pub accounts: QueueAccounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_binds_offset_and_kind() {
        let output = ComputationOutput::ComputePayout { payout_amount: 190 };
        let a = output.signing_digest(1, ComputationKind::ComputePayout);
        let b = output.signing_digest(2, ComputationKind::ComputePayout);
        let c = output.signing_digest(1, ComputationKind::ProcessBet);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, output.signing_digest(1, ComputationKind::ComputePayout));
    }

    #[test]
    fn circuit_names() {
        assert_eq!(ComputationKind::ProcessBet.circuit_name(), "process_bet");
        assert_eq!(ComputationKind::ComputePayout.to_string(), "compute_payout");
    }
}
