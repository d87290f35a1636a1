use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::mpsc;

use super::circuits::{self, Tally};
use crate::crypto::{
    DecryptedWager, HmacKeystreamCipher, NetworkKeypair, WagerCipher, NONCE_SIZE,
};
use crate::ledger::InMemoryLedger;
use crate::models::{
    ComputationKind, ComputationOutput, JobFinalized, JobSubmitted, Outcome, Position,
};

/// Local stand-in for the compute cluster.
///
/// Reads the ledger the way cluster nodes do, evaluates the circuit on
/// decrypted inputs and returns a signed result. The per-market tally
/// lives only in the pool's encrypted state, sealed under a key the
/// cluster alone holds. Cheap to clone; clones share abort injection.
#[derive(Clone)]
pub struct SimulatedCluster {
    inner: Arc<ClusterInner>,
}

struct ClusterInner {
    keypair: NetworkKeypair,
    signing_key: SigningKey,
    state_key: [u8; 32],
    latency: Duration,
    abort_next: AtomicU32,
}

impl SimulatedCluster {
    pub fn new(latency: Duration) -> Self {
        let mut state_key = [0u8; 32];
        OsRng.fill_bytes(&mut state_key);
        Self {
            inner: Arc::new(ClusterInner {
                keypair: NetworkKeypair::generate(),
                signing_key: SigningKey::generate(&mut OsRng),
                state_key,
                latency,
                abort_next: AtomicU32::new(0),
            }),
        }
    }

    /// x25519 key bettors encrypt wagers to.
    pub fn encryption_key(&self) -> [u8; 32] {
        self.inner.keypair.public_key()
    }

    /// Key the program checks result signatures against.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.inner.signing_key.verifying_key()
    }

    /// Make the next `count` jobs abort regardless of their inputs.
    pub fn abort_next(&self, count: u32) {
        self.inner.abort_next.fetch_add(count, Ordering::SeqCst);
    }

    fn take_injected_abort(&self) -> bool {
        self.inner
            .abort_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Sign `output` for `offset`; used for results and by test fakes.
    pub fn sign(
        &self,
        offset: u64,
        kind: ComputationKind,
        output: ComputationOutput,
    ) -> JobFinalized {
        let digest = output.signing_digest(offset, kind);
        let signature = self.inner.signing_key.sign(&digest).to_bytes();
        JobFinalized {
            offset,
            kind,
            output,
            signature,
        }
    }

    /// Evaluate one job against current ledger state.
    pub async fn execute(&self, ledger: &InMemoryLedger, job: &JobSubmitted) -> JobFinalized {
        let output = if self.take_injected_abort() {
            Err("injected abort".to_string())
        } else {
            self.evaluate(ledger, job).await
        };
        let output = output.unwrap_or_else(|reason| {
            tracing::warn!(
                offset = job.offset,
                kind = %job.kind,
                reason = %reason,
                "Cluster: job aborted"
            );
            ComputationOutput::Aborted { reason }
        });
        self.sign(job.offset, job.kind, output)
    }

    async fn evaluate(
        &self,
        ledger: &InMemoryLedger,
        job: &JobSubmitted,
    ) -> Result<ComputationOutput, String> {
        check_accounts(ledger, job)?;
        match job.kind {
            ComputationKind::ProcessBet => self.process_bet(ledger, job).await,
            ComputationKind::ComputePayout => self.compute_payout(ledger, job).await,
        }
    }

    async fn process_bet(
        &self,
        ledger: &InMemoryLedger,
        job: &JobSubmitted,
    ) -> Result<ComputationOutput, String> {
        let position = ledger
            .position(&job.position)
            .await
            .ok_or("position not found")?;
        let (outcome, amount) = self.open_wager(&position)?;

        let tally = self.load_tally(ledger, &position).await?;
        let tally = tally.add(outcome, amount).ok_or("pool total overflow")?;
        let (encrypted_state, state_nonce) = self.seal_tally(tally)?;

        tracing::debug!(
            offset = job.offset,
            market_id = job.market_id,
            "Cluster: bet folded into pool"
        );
        Ok(ComputationOutput::ProcessBet {
            encrypted_state,
            state_nonce,
        })
    }

    async fn compute_payout(
        &self,
        ledger: &InMemoryLedger,
        job: &JobSubmitted,
    ) -> Result<ComputationOutput, String> {
        let position = ledger
            .position(&job.position)
            .await
            .ok_or("position not found")?;
        let market = ledger
            .market(&position.market)
            .await
            .ok_or("market not found")?;
        let winning = market.winning_outcome.ok_or("market not resolved")?;
        let (outcome, stake) = self.open_wager(&position)?;
        let tally = self.load_tally(ledger, &position).await?;

        let payout_amount =
            circuits::payout(outcome, stake, winning, tally).ok_or("payout overflow")?;
        tracing::debug!(
            offset = job.offset,
            market_id = job.market_id,
            "Cluster: payout computed"
        );
        Ok(ComputationOutput::ComputePayout { payout_amount })
    }

    /// Decrypt and validate a wager against its transparent deposit.
    fn open_wager(&self, position: &Position) -> Result<(Outcome, u64), String> {
        let DecryptedWager { outcome, amount } = self
            .inner
            .keypair
            .decrypt_wager(
                &position.encrypted_bet,
                &position.user_pubkey,
                &position.nonce.to_le_bytes(),
            )
            .map_err(|e| e.to_string())?;
        let outcome = u8::try_from(outcome)
            .ok()
            .and_then(Outcome::from_u8)
            .ok_or("outcome must be 0 or 1")?;
        if amount == 0 || amount != position.deposit_amount {
            return Err(format!(
                "encrypted amount does not match deposit of {}",
                position.deposit_amount
            ));
        }
        Ok((outcome, amount))
    }

    async fn load_tally(
        &self,
        ledger: &InMemoryLedger,
        position: &Position,
    ) -> Result<Tally, String> {
        let market = ledger
            .market(&position.market)
            .await
            .ok_or("market not found")?;
        let pool = ledger
            .pool_state(&market.pool_state)
            .await
            .ok_or("pool state not found")?;
        self.open_tally(&pool.encrypted_state)
    }

    /// Pool state layout: nonce (16) followed by two cipher blocks.
    fn open_tally(&self, sealed: &[u8]) -> Result<Tally, String> {
        if sealed.is_empty() {
            return Ok(Tally::default());
        }
        if sealed.len() <= NONCE_SIZE {
            return Err("pool state truncated".into());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| "pool state nonce")?;
        let cipher = HmacKeystreamCipher::from_shared_secret(&self.inner.state_key)
            .map_err(|e| e.to_string())?;
        match cipher.decrypt(ciphertext, &nonce).map_err(|e| e.to_string())?.as_slice() {
            [yes_pool, no_pool] => Ok(Tally {
                yes_pool: *yes_pool,
                no_pool: *no_pool,
            }),
            _ => Err("pool state has wrong shape".into()),
        }
    }

    fn seal_tally(&self, tally: Tally) -> Result<(Vec<u8>, u128), String> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let cipher = HmacKeystreamCipher::from_shared_secret(&self.inner.state_key)
            .map_err(|e| e.to_string())?;
        let ciphertext = cipher
            .encrypt(&[tally.yes_pool, tally.no_pool], &nonce)
            .map_err(|e| e.to_string())?;
        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok((sealed, u128::from_le_bytes(nonce)))
    }
}

/// A job must name the accounts its circuit and offset derive to on this
/// cluster; anything else was queued against another definition.
fn check_accounts(ledger: &InMemoryLedger, job: &JobSubmitted) -> Result<(), String> {
    let expected = ledger
        .config()
        .network
        .queue_accounts(job.kind, job.offset)
        .map_err(|e| e.to_string())?;
    if job.accounts != expected {
        return Err(format!(
            "accounts do not match the {} computation definition",
            job.kind
        ));
    }
    Ok(())
}

/// Cluster task: evaluate submitted jobs in arrival order and send each
/// signed result back.
pub async fn run_simulated_cluster(
    cluster: SimulatedCluster,
    ledger: InMemoryLedger,
    mut jobs: mpsc::Receiver<JobSubmitted>,
    results: mpsc::Sender<JobFinalized>,
) {
    tracing::info!(latency_ms = cluster.inner.latency.as_millis() as u64, "Cluster: started");

    while let Some(job) = jobs.recv().await {
        if !cluster.inner.latency.is_zero() {
            tokio::time::sleep(cluster.inner.latency).await;
        }
        let finalized = cluster.execute(&ledger, &job).await;
        if results.send(finalized).await.is_err() {
            tracing::warn!("Cluster: result channel closed, stopping");
            return;
        }
    }

    tracing::warn!("Cluster: job channel closed, stopping");
}
