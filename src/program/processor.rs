use super::{computation, market, pool, position, token, vault, Instruction, InvokeContext};
use crate::errors::{InstructionError, ProgramError};
use crate::models::{
    Address, ComputationKind, ComputationStatus, LedgerEvent, Market, MarketStatus,
    PositionStatus,
};
use crate::pda::{associated_token_address, MarketAccounts};

/// Execute one instruction against the transaction's working state.
pub fn process(
    ctx: &mut InvokeContext<'_>,
    instruction: Instruction,
) -> Result<(), InstructionError> {
    match instruction {
        Instruction::CreateMarket {
            authority,
            market_id,
            question,
            betting_start_ts,
            betting_end_ts,
            resolution_end_ts,
            token_mint,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            if ctx.store.markets.contains_key(&accounts.market) {
                return Err(ProgramError::AccountAlreadyExists.into());
            }
            let created = market::create(
                market::NewMarket {
                    market_id,
                    authority,
                    question: &question,
                    betting_start_ts,
                    betting_end_ts,
                    resolution_end_ts,
                    token_mint,
                    vault: accounts.vault,
                    pool_state: accounts.pool_state,
                },
                ctx.now,
            )?;
            vault::create(ctx.store, accounts.vault, accounts.market, token_mint)?;
            ctx.store.markets.insert(accounts.market, created);

            tracing::info!(market_id, market = %accounts.market, "Program: market created");
            ctx.emit(LedgerEvent::MarketCreated {
                market: accounts.market,
                market_id,
                authority,
                token_mint,
                betting_end_ts,
                resolution_end_ts,
            });
        }

        Instruction::OpenMarket {
            authority,
            market_id,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            market::open(ctx.store.market_mut(&accounts.market)?, &authority)?;
            if ctx.store.pools.contains_key(&accounts.pool_state) {
                return Err(ProgramError::AccountAlreadyExists.into());
            }
            ctx.store
                .pools
                .insert(accounts.pool_state, pool::initialize(accounts.market, ctx.now));

            tracing::info!(market_id, "Program: market opened");
            ctx.emit(LedgerEvent::MarketOpened {
                market: accounts.market,
                opened_at: ctx.now,
            });
        }

        Instruction::CloseBetting {
            authority,
            market_id,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            let now = ctx.now;
            let m = ctx.store.market_mut(&accounts.market)?;
            market::close_betting(m, &authority, now)?;
            let total_positions = m.total_positions;

            tracing::info!(market_id, total_positions, "Program: betting closed");
            ctx.emit(LedgerEvent::BettingClosed {
                market: accounts.market,
                total_positions,
                closed_at: now,
            });
        }

        Instruction::ResolveMarket {
            authority,
            market_id,
            winning_outcome,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            let now = ctx.now;
            let outcome = market::resolve(
                ctx.store.market_mut(&accounts.market)?,
                &authority,
                winning_outcome,
                now,
            )?;

            tracing::info!(market_id, outcome = %outcome, "Program: market resolved");
            ctx.emit(LedgerEvent::MarketResolved {
                market: accounts.market,
                winning_outcome: outcome,
                resolved_at: now,
            });
        }

        Instruction::CancelMarket {
            authority,
            market_id,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            market::cancel(ctx.store.market_mut(&accounts.market)?, &authority)?;

            tracing::info!(market_id, "Program: market cancelled");
            ctx.emit(LedgerEvent::MarketCancelled {
                market: accounts.market,
                cancelled_at: ctx.now,
            });
        }

        Instruction::SettleMarket {
            authority,
            market_id,
        } => {
            let accounts = market_accounts(ctx, market_id)?;
            let pending = ctx
                .store
                .pools
                .get(&accounts.pool_state)
                .map_or(0, |p| p.pending_computations);
            market::settle(ctx.store.market_mut(&accounts.market)?, &authority, pending)?;

            tracing::info!(market_id, "Program: market settled");
            ctx.emit(LedgerEvent::MarketSettled {
                market: accounts.market,
                settled_at: ctx.now,
            });
        }

        Instruction::CreateAssociatedTokenAccount { owner, mint, .. } => {
            token::create_associated_account(ctx.store, owner, mint)?;
        }

        Instruction::TransferNative { from, to, lamports } => {
            token::transfer_native(ctx.store, &from, &to, lamports)?;
        }

        Instruction::SyncNative { account } => {
            token::sync_native(ctx.store, &account)?;
        }

        Instruction::PlaceBet {
            bettor,
            market_id,
            computation_offset,
            encrypted_bet,
            user_pubkey,
            nonce,
            deposit_amount,
        } => place_bet(
            ctx,
            market_id,
            position::NewBet {
                owner: bettor,
                encrypted_bet,
                user_pubkey,
                nonce,
                deposit_amount,
                computation_id: computation_offset,
            },
        )?,

        Instruction::RetryProcessBet {
            market_id,
            owner,
            computation_offset,
            ..
        } => retry_process_bet(ctx, market_id, owner, computation_offset)?,

        Instruction::ComputePayout {
            market_id,
            owner,
            computation_offset,
            ..
        } => compute_payout(ctx, market_id, owner, computation_offset)?,

        Instruction::ClaimPayout { claimer, market_id } => claim_payout(ctx, market_id, claimer)?,

        Instruction::ClaimRefund { claimer, market_id } => claim_refund(ctx, market_id, claimer)?,

        Instruction::FinalizeComputation {
            computation_offset,
            output,
            signature,
        } => computation::finalize(ctx, computation_offset, output, &signature)?,
    }
    Ok(())
}

fn market_accounts(
    ctx: &InvokeContext<'_>,
    market_id: u64,
) -> Result<MarketAccounts, ProgramError> {
    Ok(ctx.config.deriver.market_accounts(market_id)?)
}

fn derive_position(
    ctx: &InvokeContext<'_>,
    market: &Address,
    owner: &Address,
) -> Result<Address, ProgramError> {
    Ok(ctx.config.deriver.position(market, owner)?.address)
}

fn load_market(ctx: &InvokeContext<'_>, market_id: u64) -> Result<(Address, Market), ProgramError> {
    let accounts = market_accounts(ctx, market_id)?;
    let loaded = ctx.store.market(&accounts.market)?.clone();
    Ok((accounts.market, loaded))
}

fn admit(
    ctx: &InvokeContext<'_>,
    market_address: &Address,
    m: &Market,
) -> Result<(), ProgramError> {
    let pool_state = ctx
        .store
        .pools
        .get(&m.pool_state)
        .ok_or(ProgramError::PoolStateNotInitialized)?;
    pool::admit(pool_state, market_address)
}

fn place_bet(
    ctx: &mut InvokeContext<'_>,
    market_id: u64,
    bet: position::NewBet,
) -> Result<(), ProgramError> {
    let (market_address, m) = load_market(ctx, market_id)?;
    let bettor = bet.owner;
    let offset = bet.computation_id;
    let deposit_amount = bet.deposit_amount;
    let position_address = derive_position(ctx, &market_address, &bettor)?;

    let recorded = position::record_bet(
        market_address,
        &m,
        ctx.store.positions.get(&position_address),
        bet,
        ctx.now,
    )?;
    admit(ctx, &market_address, &m)?;

    let bettor_account = associated_token_address(&bettor, &m.token_mint)?;
    vault::deposit(ctx.store, &m, &bettor_account, &bettor, deposit_amount)?;

    ctx.store.positions.insert(position_address, recorded);
    let total_positions = {
        let stored = ctx.store.market_mut(&market_address)?;
        stored.total_positions = stored
            .total_positions
            .checked_add(1)
            .ok_or(ProgramError::Overflow)?;
        stored.total_positions
    };

    tracing::info!(
        market_id,
        position = %position_address,
        bettor = %bettor,
        deposit_amount,
        total_positions,
        "Program: bet placed"
    );
    ctx.emit(LedgerEvent::BetPlaced {
        market: market_address,
        position: position_address,
        bettor,
        deposit_amount,
        computation_id: offset,
    });
    computation::queue(
        ctx,
        ComputationKind::ProcessBet,
        offset,
        market_address,
        &m,
        position_address,
    )?;
    Ok(())
}

fn retry_process_bet(
    ctx: &mut InvokeContext<'_>,
    market_id: u64,
    owner: Address,
    offset: u64,
) -> Result<(), ProgramError> {
    let (market_address, m) = load_market(ctx, market_id)?;
    match m.status {
        MarketStatus::Open | MarketStatus::BettingClosed => {}
        // Payouts may already be computed against the resolved tally.
        MarketStatus::Created
        | MarketStatus::Resolved
        | MarketStatus::Settled
        | MarketStatus::Cancelled => return Err(ProgramError::InvalidStateTransition),
    }
    let position_address = derive_position(ctx, &market_address, &owner)?;
    let existing = ctx.store.position(&position_address)?;
    if existing.status != PositionStatus::Pending {
        return Err(ProgramError::InvalidPosition);
    }
    let last = ctx.config.network.computation(existing.computation_id)?;
    match ctx.store.computations.get(&last).map(|r| r.status) {
        Some(ComputationStatus::Aborted) => {}
        Some(ComputationStatus::Queued) => return Err(ProgramError::ComputationInFlight),
        Some(ComputationStatus::Finalized) | None => return Err(ProgramError::InvalidPosition),
    }
    admit(ctx, &market_address, &m)?;

    ctx.store.position_mut(&position_address)?.computation_id = offset;
    tracing::info!(market_id, position = %position_address, offset, "Program: bet requeued");
    computation::queue(
        ctx,
        ComputationKind::ProcessBet,
        offset,
        market_address,
        &m,
        position_address,
    )?;
    Ok(())
}

fn compute_payout(
    ctx: &mut InvokeContext<'_>,
    market_id: u64,
    owner: Address,
    offset: u64,
) -> Result<(), ProgramError> {
    let (market_address, m) = load_market(ctx, market_id)?;
    if m.status != MarketStatus::Resolved {
        return Err(ProgramError::MarketNotResolved);
    }
    let position_address = derive_position(ctx, &market_address, &owner)?;
    let existing = ctx.store.position(&position_address)?;
    if existing.market != market_address {
        return Err(ProgramError::InvalidPosition);
    }
    if existing.status != PositionStatus::Processed {
        return Err(ProgramError::InvalidStateTransition);
    }
    admit(ctx, &market_address, &m)?;

    ctx.store.position_mut(&position_address)?.computation_id = offset;
    tracing::info!(market_id, position = %position_address, offset, "Program: payout requested");
    computation::queue(
        ctx,
        ComputationKind::ComputePayout,
        offset,
        market_address,
        &m,
        position_address,
    )?;
    Ok(())
}

fn claim_payout(
    ctx: &mut InvokeContext<'_>,
    market_id: u64,
    claimer: Address,
) -> Result<(), InstructionError> {
    let (market_address, m) = load_market(ctx, market_id)?;
    let position_address = derive_position(ctx, &market_address, &claimer)?;
    let now = ctx.now;
    let amount = position::claim(ctx.store.position_mut(&position_address)?, &m, &claimer, now)?;

    let destination =
        associated_token_address(&claimer, &m.token_mint).map_err(ProgramError::from)?;
    vault::check_holder(ctx.store, &m, &destination, &claimer)?;
    vault::withdraw(ctx.store, &m, &destination, amount)?;

    tracing::info!(market_id, position = %position_address, amount, "Program: payout claimed");
    ctx.emit(LedgerEvent::PayoutClaimed {
        market: market_address,
        position: position_address,
        user: claimer,
        amount,
    });
    Ok(())
}

fn claim_refund(
    ctx: &mut InvokeContext<'_>,
    market_id: u64,
    claimer: Address,
) -> Result<(), InstructionError> {
    let (market_address, m) = load_market(ctx, market_id)?;
    let position_address = derive_position(ctx, &market_address, &claimer)?;
    let now = ctx.now;
    let amount = position::refund(ctx.store.position_mut(&position_address)?, &m, &claimer, now)?;

    let destination =
        associated_token_address(&claimer, &m.token_mint).map_err(ProgramError::from)?;
    vault::check_holder(ctx.store, &m, &destination, &claimer)?;
    vault::withdraw(ctx.store, &m, &destination, amount)?;

    tracing::info!(market_id, position = %position_address, amount, "Program: refund claimed");
    ctx.emit(LedgerEvent::RefundClaimed {
        market: market_address,
        position: position_address,
        user: claimer,
        amount,
    });
    Ok(())
}
