use metrics::{counter, gauge};
use tokio::sync::mpsc;

use crate::errors::SettlementError;
use crate::ledger::{InMemoryLedger, Transaction};
use crate::metrics::{COMPUTATIONS_ABORTED, COMPUTATIONS_FINALIZED, PENDING_COMPUTATIONS};
use crate::models::JobFinalized;
use crate::program::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The result changed ledger state.
    Applied,
    /// The offset had already been consumed; nothing changed.
    Duplicate,
}

/// Applies each network result to the ledger exactly once per offset.
///
/// Holds no memory of its own: the computation record's status is the only
/// guard, so any number of reconcilers may share a ledger.
#[derive(Clone)]
pub struct JobReconciler {
    ledger: InMemoryLedger,
}

impl JobReconciler {
    pub fn new(ledger: InMemoryLedger) -> Self {
        Self { ledger }
    }

    pub async fn apply(&self, message: JobFinalized) -> Result<Reconciled, SettlementError> {
        let offset = message.offset;
        let aborted = message.output.is_aborted();
        let receipt = self
            .ledger
            .execute(Transaction::unsigned(Instruction::FinalizeComputation {
                computation_offset: offset,
                output: message.output,
                signature: message.signature,
            }))
            .await?;

        // The ledger treats a consumed offset as a no-op with no events.
        if receipt.events.is_empty() {
            tracing::warn!(offset, "Reconciler: offset already finalized on ledger");
            return Ok(Reconciled::Duplicate);
        }

        gauge!(PENDING_COMPUTATIONS).decrement(1.0);
        if aborted {
            counter!(COMPUTATIONS_ABORTED).increment(1);
        } else {
            counter!(COMPUTATIONS_FINALIZED).increment(1);
        }
        tracing::info!(
            offset,
            kind = %message.kind,
            aborted,
            slot = receipt.slot,
            "Reconciler: result applied"
        );
        Ok(Reconciled::Applied)
    }
}

/// Reconciler task: drain network results into finalize transactions.
pub async fn run_reconciler(ledger: InMemoryLedger, mut rx: mpsc::Receiver<JobFinalized>) {
    let reconciler = JobReconciler::new(ledger);
    tracing::info!("Reconciler started");

    while let Some(message) = rx.recv().await {
        let offset = message.offset;
        if let Err(e) = reconciler.apply(message).await {
            tracing::error!(offset, error = %e, "Reconciler: finalize transaction failed");
        }
    }

    tracing::warn!("Reconciler: result channel closed, stopping");
}
