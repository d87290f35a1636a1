use crate::models::{Address, ComputationOutput};

/// One step of a transaction. A transaction's instructions apply in order
/// and all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    // -- market lifecycle ---------------------------------------------------
    CreateMarket {
        authority: Address,
        market_id: u64,
        question: String,
        betting_start_ts: i64,
        betting_end_ts: i64,
        resolution_end_ts: i64,
        token_mint: Address,
    },
    OpenMarket {
        authority: Address,
        market_id: u64,
    },
    CloseBetting {
        authority: Address,
        market_id: u64,
    },
    ResolveMarket {
        authority: Address,
        market_id: u64,
        winning_outcome: u8,
    },
    CancelMarket {
        authority: Address,
        market_id: u64,
    },
    SettleMarket {
        authority: Address,
        market_id: u64,
    },

    // -- token plumbing ------------------------------------------------------
    /// Creates `owner`'s associated account for `mint`; no-op when it exists.
    CreateAssociatedTokenAccount {
        payer: Address,
        owner: Address,
        mint: Address,
    },
    TransferNative {
        from: Address,
        to: Address,
        lamports: u64,
    },
    /// Sets a wrapped native account's token amount to its lamport balance.
    SyncNative {
        account: Address,
    },

    // -- wagers and jobs -----------------------------------------------------
    PlaceBet {
        bettor: Address,
        market_id: u64,
        computation_offset: u64,
        encrypted_bet: Vec<u8>,
        user_pubkey: [u8; 32],
        nonce: u128,
        deposit_amount: u64,
    },
    RetryProcessBet {
        payer: Address,
        market_id: u64,
        owner: Address,
        computation_offset: u64,
    },
    ComputePayout {
        payer: Address,
        market_id: u64,
        owner: Address,
        computation_offset: u64,
    },
    ClaimPayout {
        claimer: Address,
        market_id: u64,
    },
    ClaimRefund {
        claimer: Address,
        market_id: u64,
    },
    /// Network-initiated; authenticated by the cluster signature, not by a
    /// transaction signer.
    FinalizeComputation {
        computation_offset: u64,
        output: ComputationOutput,
        signature: [u8; 64],
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::CreateMarket { .. } => "create_market",
            Instruction::OpenMarket { .. } => "open_market",
            Instruction::CloseBetting { .. } => "close_betting",
            Instruction::ResolveMarket { .. } => "resolve_market",
            Instruction::CancelMarket { .. } => "cancel_market",
            Instruction::SettleMarket { .. } => "settle_market",
            Instruction::CreateAssociatedTokenAccount { .. } => "create_associated_token_account",
            Instruction::TransferNative { .. } => "transfer_native",
            Instruction::SyncNative { .. } => "sync_native",
            Instruction::PlaceBet { .. } => "place_bet",
            Instruction::RetryProcessBet { .. } => "retry_process_bet",
            Instruction::ComputePayout { .. } => "compute_payout",
            Instruction::ClaimPayout { .. } => "claim_payout",
            Instruction::ClaimRefund { .. } => "claim_refund",
            Instruction::FinalizeComputation { .. } => "finalize_computation",
        }
    }

    /// Address that must have signed the enclosing transaction, if any.
    pub fn required_signer(&self) -> Option<Address> {
        match self {
            Instruction::CreateMarket { authority, .. }
            | Instruction::OpenMarket { authority, .. }
            | Instruction::CloseBetting { authority, .. }
            | Instruction::ResolveMarket { authority, .. }
            | Instruction::CancelMarket { authority, .. }
            | Instruction::SettleMarket { authority, .. } => Some(*authority),
            Instruction::CreateAssociatedTokenAccount { payer, .. }
            | Instruction::RetryProcessBet { payer, .. }
            | Instruction::ComputePayout { payer, .. } => Some(*payer),
            Instruction::TransferNative { from, .. } => Some(*from),
            Instruction::PlaceBet { bettor, .. } => Some(*bettor),
            Instruction::ClaimPayout { claimer, .. } | Instruction::ClaimRefund { claimer, .. } => {
                Some(*claimer)
            }
            Instruction::SyncNative { .. } | Instruction::FinalizeComputation { .. } => None,
        }
    }
}
