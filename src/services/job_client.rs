use std::time::Duration;

use metrics::{counter, gauge, histogram};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};

use crate::errors::{ProgramError, SettlementError};
use crate::ledger::{InMemoryLedger, Transaction, TxReceipt};
use crate::metrics::{
    COMPUTATIONS_SUBMITTED, FINALIZE_TIMEOUTS, FINALIZE_WAIT_SECONDS, PENDING_COMPUTATIONS,
};
use crate::models::{
    Address, ComputationKind, ComputationRecord, ComputationStatus, JobSubmitted, JobTicket,
};
use crate::program::Instruction;

/// Attempts at finding a free offset before giving up.
const MAX_OFFSET_ATTEMPTS: usize = 4;

/// Stand-in deadline for waits too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// What a job is for, before it has an offset.
#[derive(Debug, Clone, Copy)]
pub struct JobRequest {
    pub kind: ComputationKind,
    pub market_id: u64,
    pub position: Address,
}

/// Submits computation jobs and waits for their results.
///
/// Submission returns as soon as the queueing transaction commits. The
/// result arrives later through a separate finalize transaction, which
/// [`await_finalization`](Self::await_finalization) watches for.
#[derive(Clone)]
pub struct JobClient {
    ledger: InMemoryLedger,
    network_tx: mpsc::Sender<JobSubmitted>,
    poll_interval: Duration,
}

impl JobClient {
    pub fn new(
        ledger: InMemoryLedger,
        network_tx: mpsc::Sender<JobSubmitted>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            network_tx,
            poll_interval,
        }
    }

    fn computation_address(&self, offset: u64) -> Result<Address, SettlementError> {
        Ok(self
            .ledger
            .config()
            .network
            .computation(offset)
            .map_err(ProgramError::from)?)
    }

    /// Uniformly random offset with no record on the ledger yet.
    async fn fresh_offset(&self) -> Result<u64, SettlementError> {
        loop {
            let offset = OsRng.next_u64();
            let address = self.computation_address(offset)?;
            if self.ledger.computation(&address).await.is_none() {
                return Ok(offset);
            }
            tracing::debug!(offset, "Job client: offset taken, drawing again");
        }
    }

    /// Commit `build(offset)` as one transaction, then notify the network.
    /// An offset lost to a concurrent submitter is redrawn.
    pub async fn submit<F>(
        &self,
        request: JobRequest,
        signers: Vec<Address>,
        build: F,
    ) -> Result<(TxReceipt, JobTicket), SettlementError>
    where
        F: Fn(u64) -> Vec<Instruction>,
    {
        let mut attempt = 0;
        let (offset, receipt) = loop {
            attempt += 1;
            let offset = self.fresh_offset().await?;
            let tx = Transaction::new(build(offset), signers.clone());
            match self.ledger.execute(tx).await {
                Ok(receipt) => break (offset, receipt),
                Err(e)
                    if e.program_error() == Some(ProgramError::ComputationOffsetInUse)
                        && attempt < MAX_OFFSET_ATTEMPTS =>
                {
                    tracing::warn!(offset, attempt, "Job client: offset collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        counter!(COMPUTATIONS_SUBMITTED).increment(1);
        gauge!(PENDING_COMPUTATIONS).increment(1.0);

        let accounts = self
            .ledger
            .config()
            .network
            .queue_accounts(request.kind, offset)
            .map_err(ProgramError::from)?;
        let ticket = JobTicket {
            offset,
            kind: request.kind,
            market_id: request.market_id,
            position: request.position,
            accounts,
        };
        tracing::info!(
            offset,
            kind = %request.kind,
            market_id = request.market_id,
            slot = receipt.slot,
            "Job client: job queued"
        );

        let message = JobSubmitted {
            offset,
            kind: request.kind,
            market_id: request.market_id,
            position: request.position,
            accounts,
        };
        if self.network_tx.send(message).await.is_err() {
            tracing::error!(offset, "Job client: network channel closed after job was queued");
            return Err(SettlementError::NetworkUnavailable);
        }
        Ok((receipt, ticket))
    }

    /// Wait up to `timeout` for `offset` to be finalized on the ledger.
    ///
    /// Timing out leaves the job running; its result still applies when it
    /// arrives, so callers should wait again rather than resubmit.
    pub async fn await_finalization(
        &self,
        offset: u64,
        timeout: Duration,
    ) -> Result<ComputationRecord, SettlementError> {
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let address = self.computation_address(offset)?;
        // Subscribe before the first read so a finalize in between is seen.
        let mut events = self.ledger.subscribe();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let record = self
                .ledger
                .computation(&address)
                .await
                .ok_or(SettlementError::AccountNotFound(address))?;
            match record.status {
                ComputationStatus::Queued => {}
                ComputationStatus::Finalized => {
                    histogram!(FINALIZE_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
                    return Ok(record);
                }
                ComputationStatus::Aborted => {
                    histogram!(FINALIZE_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
                    return Err(SettlementError::ComputationAborted {
                        offset,
                        reason: record.abort_reason.unwrap_or_else(|| "aborted".into()),
                    });
                }
            }

            let woke = timeout_at(deadline, async {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => event.finalized_offset() == Some(offset),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                offset,
                                skipped,
                                "Job client: event feed lagged, re-reading"
                            );
                            true
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tokio::time::sleep(self.poll_interval).await;
                            true
                        }
                    },
                    _ = ticker.tick() => true,
                }
            })
            .await;

            match woke {
                Ok(true) => continue,
                Ok(false) => {
                    tracing::debug!(offset, "Job client: unrelated event");
                }
                Err(_) => {
                    counter!(FINALIZE_TIMEOUTS).increment(1);
                    let waited = started.elapsed();
                    tracing::warn!(
                        offset,
                        waited_ms = waited.as_millis() as u64,
                        "Job client: finalization wait timed out"
                    );
                    return Err(SettlementError::TimedOut { offset, waited });
                }
            }
        }
    }
}
