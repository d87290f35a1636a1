use std::time::Duration;

use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::crypto::{CryptoSession, HmacKeystreamCipher, WagerCipher};
use crate::errors::{ProgramError, SettlementError};
use crate::ledger::{InMemoryLedger, Transaction, TxReceipt};
use crate::metrics::{BETS_PLACED, PAYOUTS_CLAIMED, REFUNDS_CLAIMED};
use crate::models::amount::to_base_units;
use crate::models::{
    Address, ComputationKind, ComputationRecord, JobTicket, Market, MarketStatus, MarketView,
    Outcome, PoolState, Position, PositionStatus,
};
use crate::pda::{AddressDeriver, MarketAccounts};
use crate::program::Instruction;

use super::job_client::{JobClient, JobRequest};
use super::vault_custodian::VaultCustodian;

/// Parameters of a market to create.
#[derive(Debug, Clone)]
pub struct MarketParams {
    pub market_id: u64,
    pub question: String,
    pub betting_start_ts: i64,
    pub betting_end_ts: i64,
    pub resolution_end_ts: i64,
    pub token_mint: Address,
}

/// Result of a confirmed bet. The wager is escrowed; its processing job
/// is still running.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedBet {
    pub position: Address,
    pub ticket: JobTicket,
    pub receipt: TxReceipt,
}

/// The user-facing use cases, composed from address derivation, wager
/// encryption, escrow and the job client. `C` is the network's wager cipher.
pub struct SettlementOrchestrator<C = HmacKeystreamCipher> {
    ledger: InMemoryLedger,
    deriver: AddressDeriver,
    crypto: CryptoSession<C>,
    custodian: VaultCustodian,
    jobs: JobClient,
    finalize_timeout: Duration,
}

impl<C> Clone for SettlementOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            deriver: self.deriver,
            crypto: self.crypto.clone(),
            custodian: self.custodian.clone(),
            jobs: self.jobs.clone(),
            finalize_timeout: self.finalize_timeout,
        }
    }
}

impl<C: WagerCipher> SettlementOrchestrator<C> {
    pub fn new(
        ledger: InMemoryLedger,
        crypto: CryptoSession<C>,
        custodian: VaultCustodian,
        jobs: JobClient,
        finalize_timeout: Duration,
    ) -> Self {
        let deriver = ledger.config().deriver;
        Self {
            ledger,
            deriver,
            crypto,
            custodian,
            jobs,
            finalize_timeout,
        }
    }

    pub fn accounts(&self, market_id: u64) -> Result<MarketAccounts, SettlementError> {
        Ok(self
            .deriver
            .market_accounts(market_id)
            .map_err(ProgramError::from)?)
    }

    pub fn position_address(
        &self,
        market_id: u64,
        owner: &Address,
    ) -> Result<Address, SettlementError> {
        let market = self.accounts(market_id)?.market;
        Ok(self
            .deriver
            .position(&market, owner)
            .map_err(ProgramError::from)?
            .address)
    }

    async fn execute(
        &self,
        instructions: Vec<Instruction>,
        signer: Address,
    ) -> Result<TxReceipt, SettlementError> {
        Ok(self
            .ledger
            .execute(Transaction::new(instructions, vec![signer]))
            .await?)
    }

    async fn load_market(&self, market_id: u64) -> Result<(Address, Market), SettlementError> {
        let address = self.accounts(market_id)?.market;
        let market = self
            .ledger
            .market(&address)
            .await
            .ok_or(SettlementError::AccountNotFound(address))?;
        Ok((address, market))
    }

    async fn load_position(
        &self,
        market_id: u64,
        owner: &Address,
    ) -> Result<(Address, Position), SettlementError> {
        let address = self.position_address(market_id, owner)?;
        let position = self
            .ledger
            .position(&address)
            .await
            .ok_or(SettlementError::AccountNotFound(address))?;
        Ok((address, position))
    }

    // -----------------------------------------------------------------------
    // Market lifecycle (authority)
    // -----------------------------------------------------------------------

    pub async fn create_market(
        &self,
        authority: Address,
        params: MarketParams,
    ) -> Result<MarketAccounts, SettlementError> {
        let accounts = self.accounts(params.market_id)?;
        let receipt = self
            .execute(
                vec![Instruction::CreateMarket {
                    authority,
                    market_id: params.market_id,
                    question: params.question,
                    betting_start_ts: params.betting_start_ts,
                    betting_end_ts: params.betting_end_ts,
                    resolution_end_ts: params.resolution_end_ts,
                    token_mint: params.token_mint,
                }],
                authority,
            )
            .await?;
        tracing::info!(
            market_id = params.market_id,
            market = %accounts.market,
            slot = receipt.slot,
            "Market created"
        );
        Ok(accounts)
    }

    pub async fn open_market(
        &self,
        authority: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let receipt = self
            .execute(
                vec![Instruction::OpenMarket {
                    authority,
                    market_id,
                }],
                authority,
            )
            .await?;
        tracing::info!(market_id, "Market opened");
        Ok(receipt)
    }

    pub async fn close_betting(
        &self,
        authority: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let receipt = self
            .execute(vec![Instruction::CloseBetting { authority, market_id }], authority)
            .await?;
        tracing::info!(market_id, "Betting closed");
        Ok(receipt)
    }

    pub async fn resolve_market(
        &self,
        authority: Address,
        market_id: u64,
        winning_outcome: Outcome,
    ) -> Result<TxReceipt, SettlementError> {
        let receipt = self
            .execute(
                vec![Instruction::ResolveMarket {
                    authority,
                    market_id,
                    winning_outcome: winning_outcome.as_u8(),
                }],
                authority,
            )
            .await?;
        tracing::info!(market_id, outcome = %winning_outcome, "Market resolved");
        Ok(receipt)
    }

    pub async fn cancel_market(
        &self,
        authority: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let receipt = self
            .execute(vec![Instruction::CancelMarket { authority, market_id }], authority)
            .await?;
        tracing::info!(market_id, "Market cancelled");
        Ok(receipt)
    }

    pub async fn settle_market(
        &self,
        authority: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let receipt = self
            .execute(vec![Instruction::SettleMarket { authority, market_id }], authority)
            .await?;
        tracing::info!(market_id, "Market settled");
        Ok(receipt)
    }

    // -----------------------------------------------------------------------
    // Wagers
    // -----------------------------------------------------------------------

    /// Encrypt and escrow a wager of `amount` base units.
    ///
    /// Wrapping, the bet record and the job request commit in one
    /// transaction. Returns on confirmation; processing happens later.
    pub async fn place_bet(
        &self,
        bettor: Address,
        market_id: u64,
        outcome: Outcome,
        amount: u64,
    ) -> Result<PlacedBet, SettlementError> {
        let (market_address, market) = self.load_market(market_id).await?;
        let position = self
            .deriver
            .position(&market_address, &bettor)
            .map_err(ProgramError::from)?
            .address;
        // One position per owner, whatever else is wrong with the bet.
        if self.ledger.position(&position).await.is_some() {
            return Err(ProgramError::PositionAlreadyExists.into());
        }
        let now = self.ledger.now();
        if market.status != MarketStatus::Open {
            return Err(ProgramError::MarketNotOpen.into());
        }
        if now < market.betting_start_ts {
            return Err(ProgramError::NotYetStarted.into());
        }
        if now >= market.betting_end_ts {
            return Err(ProgramError::BettingEnded.into());
        }
        if amount == 0 {
            return Err(ProgramError::InvalidBetAmount.into());
        }

        let wager = self.crypto.encrypt_wager(outcome, amount)?;
        let funding = self
            .custodian
            .deposit_instructions(bettor, market.token_mint, amount)
            .await?;

        let request = JobRequest {
            kind: ComputationKind::ProcessBet,
            market_id,
            position,
        };
        let (receipt, ticket) = self
            .jobs
            .submit(request, vec![bettor], |offset| {
                let mut instructions = funding.clone();
                instructions.push(Instruction::PlaceBet {
                    bettor,
                    market_id,
                    computation_offset: offset,
                    encrypted_bet: wager.ciphertext.clone(),
                    user_pubkey: wager.ephemeral_public_key,
                    nonce: wager.nonce_u128(),
                    deposit_amount: wager.deposit_amount,
                });
                instructions
            })
            .await?;

        counter!(BETS_PLACED).increment(1);
        tracing::info!(
            market_id,
            bettor = %bettor,
            position = %position,
            amount,
            offset = ticket.offset,
            "Bet placed"
        );
        Ok(PlacedBet {
            position,
            ticket,
            receipt,
        })
    }

    /// Like [`place_bet`](Self::place_bet) with a whole-unit amount
    /// (e.g. `1.5`) converted using the market asset's decimals.
    pub async fn place_bet_decimal(
        &self,
        bettor: Address,
        market_id: u64,
        outcome: Outcome,
        amount: Decimal,
    ) -> Result<PlacedBet, SettlementError> {
        let (_, market) = self.load_market(market_id).await?;
        let decimals = self
            .ledger
            .mint(&market.token_mint)
            .await
            .ok_or(SettlementError::AccountNotFound(market.token_mint))?
            .decimals;
        let base_units = to_base_units(amount, decimals)?;
        self.place_bet(bettor, market_id, outcome, base_units).await
    }

    /// Requeue processing of a bet whose last job aborted.
    pub async fn retry_process_bet(
        &self,
        payer: Address,
        market_id: u64,
        owner: Address,
    ) -> Result<JobTicket, SettlementError> {
        let (position, _) = self.load_position(market_id, &owner).await?;
        let request = JobRequest {
            kind: ComputationKind::ProcessBet,
            market_id,
            position,
        };
        let (_, ticket) = self
            .jobs
            .submit(request, vec![payer], |offset| {
                vec![Instruction::RetryProcessBet {
                    payer,
                    market_id,
                    owner,
                    computation_offset: offset,
                }]
            })
            .await?;
        tracing::info!(
            market_id,
            owner = %owner,
            offset = ticket.offset,
            "Bet processing requeued"
        );
        Ok(ticket)
    }

    // -----------------------------------------------------------------------
    // Payouts and claims
    // -----------------------------------------------------------------------

    /// Queue the payout computation for `owner`'s position. Returns at once.
    pub async fn compute_payout(
        &self,
        payer: Address,
        market_id: u64,
        owner: Address,
    ) -> Result<JobTicket, SettlementError> {
        let (_, market) = self.load_market(market_id).await?;
        if market.status != MarketStatus::Resolved {
            return Err(ProgramError::MarketNotResolved.into());
        }
        let (position, current) = self.load_position(market_id, &owner).await?;
        if current.status != PositionStatus::Processed {
            return Err(ProgramError::InvalidStateTransition.into());
        }

        let request = JobRequest {
            kind: ComputationKind::ComputePayout,
            market_id,
            position,
        };
        let (_, ticket) = self
            .jobs
            .submit(request, vec![payer], |offset| {
                vec![Instruction::ComputePayout {
                    payer,
                    market_id,
                    owner,
                    computation_offset: offset,
                }]
            })
            .await?;
        tracing::info!(
            market_id,
            owner = %owner,
            offset = ticket.offset,
            "Payout computation queued"
        );
        Ok(ticket)
    }

    pub async fn claim_payout(
        &self,
        claimer: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let (_, market) = self.load_market(market_id).await?;
        let mut instructions = self
            .custodian
            .payout_account_instructions(claimer, market.token_mint)
            .await?;
        instructions.push(Instruction::ClaimPayout { claimer, market_id });
        let receipt = self.execute(instructions, claimer).await?;

        counter!(PAYOUTS_CLAIMED).increment(1);
        tracing::info!(market_id, claimer = %claimer, "Payout claimed");
        Ok(receipt)
    }

    pub async fn claim_refund(
        &self,
        claimer: Address,
        market_id: u64,
    ) -> Result<TxReceipt, SettlementError> {
        let (_, market) = self.load_market(market_id).await?;
        let mut instructions = self
            .custodian
            .payout_account_instructions(claimer, market.token_mint)
            .await?;
        instructions.push(Instruction::ClaimRefund { claimer, market_id });
        let receipt = self.execute(instructions, claimer).await?;

        counter!(REFUNDS_CLAIMED).increment(1);
        tracing::info!(market_id, claimer = %claimer, "Refund claimed");
        Ok(receipt)
    }

    /// Wait for a job, bounded by `timeout` or the configured default.
    pub async fn await_job(
        &self,
        ticket: &JobTicket,
        timeout: Option<Duration>,
    ) -> Result<ComputationRecord, SettlementError> {
        self.jobs
            .await_finalization(ticket.offset, timeout.unwrap_or(self.finalize_timeout))
            .await
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub async fn market_view(&self, market_id: u64) -> Result<MarketView, SettlementError> {
        let (address, market) = self.load_market(market_id).await?;
        Ok(market.view(address, self.ledger.now()))
    }

    pub async fn position(
        &self,
        market_id: u64,
        owner: &Address,
    ) -> Result<Position, SettlementError> {
        self.load_position(market_id, owner).await.map(|(_, p)| p)
    }

    pub async fn pool_state(&self, market_id: u64) -> Result<PoolState, SettlementError> {
        let address = self.accounts(market_id)?.pool_state;
        self.ledger
            .pool_state(&address)
            .await
            .ok_or(SettlementError::AccountNotFound(address))
    }

    pub async fn vault_balance(&self, market_id: u64) -> Result<u64, SettlementError> {
        self.custodian.vault_balance(market_id).await
    }
}
