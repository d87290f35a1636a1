//! Queueing computation jobs and applying their results.
//!
//! A queued job is a [`ComputationRecord`] stored at the computation
//! address derived from its offset, so an offset already in flight is
//! detected by address. Results apply at most once per offset: a record
//! that is no longer `Queued` turns a repeated finalize into a no-op.

use ed25519_dalek::Signature;

use super::{pool, position, InvokeContext};
use crate::errors::ProgramError;
use crate::models::{
    Address, ComputationKind, ComputationOutput, ComputationRecord, ComputationStatus,
    LedgerEvent, Market, Position,
};

/// Record a new job against `market`'s pool. The caller has already run
/// admission control.
pub fn queue(
    ctx: &mut InvokeContext<'_>,
    kind: ComputationKind,
    offset: u64,
    market_address: Address,
    market: &Market,
    position: Address,
) -> Result<Address, ProgramError> {
    let accounts = ctx.config.network.queue_accounts(kind, offset)?;
    let computation = accounts.computation;
    if ctx.store.computations.contains_key(&computation) {
        return Err(ProgramError::ComputationOffsetInUse);
    }

    let pool_state = ctx.store.pool_mut(&market.pool_state)?;
    pool::enqueue(pool_state)?;
    let (state_version, pending_computations) =
        (pool_state.state_version, pool_state.pending_computations);

    ctx.store.computations.insert(
        computation,
        ComputationRecord {
            offset,
            kind,
            market_id: market.market_id,
            market: market_address,
            position,
            comp_def: accounts.comp_def,
            cluster: accounts.cluster,
            status: ComputationStatus::Queued,
            queued_at: ctx.now,
            finalized_at: None,
            state_version: None,
            abort_reason: None,
        },
    );

    ctx.emit(LedgerEvent::ComputationQueued {
        market: market_address,
        position,
        offset,
        kind,
    });
    ctx.emit(LedgerEvent::PoolStateUpdated {
        market: market_address,
        state_version,
        pending_computations,
    });
    Ok(computation)
}

/// Apply a signed result for `offset`.
pub fn finalize(
    ctx: &mut InvokeContext<'_>,
    offset: u64,
    output: ComputationOutput,
    signature: &[u8; 64],
) -> Result<(), ProgramError> {
    let computation = ctx.config.network.computation(offset)?;
    let record = ctx
        .store
        .computations
        .get(&computation)
        .cloned()
        .ok_or(ProgramError::UnknownComputation)?;

    if record.is_finalized() {
        tracing::debug!(offset, kind = %record.kind, "Finalize: offset already consumed");
        return Ok(());
    }

    let digest = output.signing_digest(offset, record.kind);
    ctx.config
        .cluster_key
        .verify_strict(&digest, &Signature::from_bytes(signature))
        .map_err(|_| ProgramError::InvalidComputationSignature)?;

    let market = ctx.store.market(&record.market)?.clone();

    let state_version = match (record.kind, output) {
        (_, ComputationOutput::Aborted { reason }) => {
            pool::release(ctx.store.pool_mut(&market.pool_state)?)?;
            mark(ctx, &computation, ComputationStatus::Aborted, None)?;
            ctx.store.computation_mut(&computation)?.abort_reason = Some(reason.clone());
            emit_pool(ctx, record.market, &market)?;
            ctx.emit(LedgerEvent::ComputationAborted {
                market: record.market,
                offset,
                kind: record.kind,
                reason,
            });
            return Ok(());
        }
        (
            ComputationKind::ProcessBet,
            ComputationOutput::ProcessBet {
                encrypted_state,
                state_nonce,
            },
        ) => apply_process_bet(ctx, &record, &market, encrypted_state, state_nonce)?,
        (ComputationKind::ComputePayout, ComputationOutput::ComputePayout { payout_amount }) => {
            apply_compute_payout(ctx, &record, &market, payout_amount)?
        }
        _ => return Err(ProgramError::InvalidComputationResult),
    };

    mark(ctx, &computation, ComputationStatus::Finalized, state_version)?;
    emit_pool(ctx, record.market, &market)?;
    ctx.emit(LedgerEvent::ComputationFinalized {
        market: record.market,
        offset,
        kind: record.kind,
        state_version,
    });
    Ok(())
}

/// Loads the job's position, checking it belongs to the job's market.
fn job_position<'s>(
    ctx: &'s mut InvokeContext<'_>,
    record: &ComputationRecord,
) -> Result<&'s mut Position, ProgramError> {
    let position = ctx.store.position_mut(&record.position)?;
    if position.market != record.market {
        return Err(ProgramError::InvalidPosition);
    }
    Ok(position)
}

fn apply_process_bet(
    ctx: &mut InvokeContext<'_>,
    record: &ComputationRecord,
    market: &Market,
    encrypted_state: Vec<u8>,
    state_nonce: u128,
) -> Result<Option<u64>, ProgramError> {
    let now = ctx.now;
    if job_position(ctx, record)?.status.is_settled() {
        // Refunded while the job was in flight: consume the offset only.
        pool::release(ctx.store.pool_mut(&market.pool_state)?)?;
        tracing::info!(
            offset = record.offset,
            position = %record.position,
            "Finalize: position already settled, result discarded"
        );
        return Ok(None);
    }

    let pool_state = ctx.store.pool_mut(&market.pool_state)?;
    let version = pool::apply_result(pool_state, record.offset, Some(encrypted_state), now)?;
    let commitment = pool::state_commitment(&pool_state.encrypted_state, state_nonce, version);

    position::apply_process_result(job_position(ctx, record)?, now)?;
    ctx.store.market_mut(&record.market)?.state_commitment = commitment;

    ctx.emit(LedgerEvent::BetProcessed {
        market: record.market,
        position: record.position,
        state_version: version,
        new_commitment: commitment,
    });
    Ok(Some(version))
}

fn apply_compute_payout(
    ctx: &mut InvokeContext<'_>,
    record: &ComputationRecord,
    market: &Market,
    payout_amount: u64,
) -> Result<Option<u64>, ProgramError> {
    let now = ctx.now;
    let target = job_position(ctx, record)?;
    position::apply_payout_result(target, market, payout_amount)?;
    let user = target.owner;

    let version = pool::apply_result(
        ctx.store.pool_mut(&market.pool_state)?,
        record.offset,
        None,
        now,
    )?;

    ctx.emit(LedgerEvent::PayoutComputed {
        market: record.market,
        position: record.position,
        user,
        payout_amount,
    });
    Ok(Some(version))
}

fn mark(
    ctx: &mut InvokeContext<'_>,
    computation: &Address,
    status: ComputationStatus,
    state_version: Option<u64>,
) -> Result<(), ProgramError> {
    let now = ctx.now;
    let record = ctx.store.computation_mut(computation)?;
    record.status = status;
    record.finalized_at = Some(now);
    record.state_version = state_version;
    Ok(())
}

fn emit_pool(
    ctx: &mut InvokeContext<'_>,
    market_address: Address,
    market: &Market,
) -> Result<(), ProgramError> {
    let pool_state = ctx.store.pool_mut(&market.pool_state)?;
    let event = LedgerEvent::PoolStateUpdated {
        market: market_address,
        state_version: pool_state.state_version,
        pending_computations: pool_state.pending_computations,
    };
    ctx.emit(event);
    Ok(())
}
