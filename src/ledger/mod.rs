//! In-process ledger.
//!
//! Transactions execute one at a time under a single lock. Each runs
//! against a copy of the account store with one timestamp for all its
//! instructions; the copy is committed only if every instruction
//! succeeded, and only then are its events published.

pub mod clock;
pub mod store;
pub mod transaction;

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::errors::{LedgerError, ProgramError};
use crate::models::{
    Address, ComputationRecord, LedgerEvent, Market, Mint, PoolState, Position, TokenAccount,
    NATIVE_DECIMALS, NATIVE_MINT,
};
use crate::program::{self, token, InvokeContext, ProgramConfig};

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::AccountStore;
pub use transaction::{Transaction, TxReceipt};

const EVENT_FEED_CAPACITY: usize = 1024;

struct LedgerInner {
    store: AccountStore,
    slot: u64,
}

#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<Mutex<LedgerInner>>,
    config: Arc<ProgramConfig>,
    clock: Arc<dyn Clock>,
    events_tx: broadcast::Sender<LedgerEvent>,
}

impl InMemoryLedger {
    /// Genesis: empty store plus the native mint.
    pub fn new(config: ProgramConfig, clock: Arc<dyn Clock>) -> Self {
        let mut store = AccountStore::default();
        store.mints.insert(
            NATIVE_MINT,
            Mint {
                decimals: NATIVE_DECIMALS,
                supply: 0,
            },
        );
        let (events_tx, _) = broadcast::channel(EVENT_FEED_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(LedgerInner { store, slot: 0 })),
            config: Arc::new(config),
            clock,
            events_tx,
        }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.unix_timestamp()
    }

    /// Events from every transaction committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events_tx.subscribe()
    }

    pub async fn execute(&self, tx: Transaction) -> Result<TxReceipt, LedgerError> {
        if tx.instructions.is_empty() {
            return Err(LedgerError::EmptyTransaction);
        }
        for instruction in &tx.instructions {
            if let Some(signer) = instruction.required_signer() {
                if !tx.signers.contains(&signer) {
                    return Err(LedgerError::MissingSignature(signer));
                }
            }
        }

        let mut inner = self.inner.lock().await;
        let mut working = inner.store.clone();
        let now = self.clock.unix_timestamp();
        let mut events = Vec::new();

        for (index, instruction) in tx.instructions.into_iter().enumerate() {
            let name = instruction.name();
            let mut ctx = InvokeContext {
                store: &mut working,
                config: &self.config,
                now,
                events: &mut events,
            };
            if let Err(source) = program::process(&mut ctx, instruction) {
                tracing::debug!(
                    index,
                    instruction = name,
                    error = %source,
                    "Ledger: transaction rolled back"
                );
                return Err(LedgerError::InstructionFailed { index, source });
            }
        }

        inner.store = working;
        inner.slot += 1;
        let slot = inner.slot;
        drop(inner);

        for event in &events {
            // No subscribers is fine.
            let _ = self.events_tx.send(event.clone());
        }

        Ok(TxReceipt {
            tx_id: Uuid::new_v4(),
            slot,
            events,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn slot(&self) -> u64 {
        self.inner.lock().await.slot
    }

    pub async fn market(&self, address: &Address) -> Option<Market> {
        self.inner.lock().await.store.markets.get(address).cloned()
    }

    pub async fn position(&self, address: &Address) -> Option<Position> {
        self.inner.lock().await.store.positions.get(address).cloned()
    }

    pub async fn pool_state(&self, address: &Address) -> Option<PoolState> {
        self.inner.lock().await.store.pools.get(address).cloned()
    }

    pub async fn token_account(&self, address: &Address) -> Option<TokenAccount> {
        self.inner
            .lock()
            .await
            .store
            .token_accounts
            .get(address)
            .cloned()
    }

    pub async fn computation(&self, address: &Address) -> Option<ComputationRecord> {
        self.inner
            .lock()
            .await
            .store
            .computations
            .get(address)
            .cloned()
    }

    pub async fn mint(&self, address: &Address) -> Option<Mint> {
        self.inner.lock().await.store.mints.get(address).cloned()
    }

    pub async fn lamports(&self, address: &Address) -> u64 {
        self.inner.lock().await.store.lamports(address)
    }

    // -----------------------------------------------------------------------
    // Devnet faucet
    // -----------------------------------------------------------------------

    pub async fn airdrop(&self, to: &Address, lamports: u64) -> Result<u64, ProgramError> {
        let mut inner = self.inner.lock().await;
        let balance = inner
            .store
            .lamports(to)
            .checked_add(lamports)
            .ok_or(ProgramError::Overflow)?;
        inner.store.lamports.insert(*to, balance);
        tracing::debug!(to = %to, lamports, balance, "Ledger: airdrop");
        Ok(balance)
    }

    pub async fn create_mint(&self, address: Address, decimals: u8) -> Result<(), ProgramError> {
        let mut inner = self.inner.lock().await;
        token::create_mint(&mut inner.store, address, decimals)
    }

    /// Mint into `owner`'s associated account, creating it when absent.
    pub async fn mint_to(
        &self,
        mint: &Address,
        owner: Address,
        amount: u64,
    ) -> Result<Address, ProgramError> {
        let mut inner = self.inner.lock().await;
        let mut working = inner.store.clone();
        let account = token::create_associated_account(&mut working, owner, *mint)?;
        token::mint_to(&mut working, mint, &account, amount)?;
        inner.store = working;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::{AddressDeriver, NetworkAddresses};
    use crate::program::Instruction;
    use ed25519_dalek::SigningKey;

    fn ledger() -> (InMemoryLedger, ManualClock) {
        let program_id = Address::new_from_array([7; 32]);
        let config = ProgramConfig {
            deriver: AddressDeriver::new(program_id),
            network: NetworkAddresses::new(Address::new_from_array([8; 32]), program_id, 456),
            cluster_key: SigningKey::from_bytes(&[3; 32]).verifying_key(),
        };
        let clock = ManualClock::new(1_000);
        (InMemoryLedger::new(config, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn failed_instruction_rolls_back_whole_transaction() {
        let (ledger, _) = ledger();
        let alice = Address::new_from_array([1; 32]);
        let bob = Address::new_from_array([2; 32]);
        ledger.airdrop(&alice, 100).await.unwrap();

        let tx = Transaction::new(
            vec![
                Instruction::TransferNative {
                    from: alice,
                    to: bob,
                    lamports: 60,
                },
                Instruction::TransferNative {
                    from: alice,
                    to: bob,
                    lamports: 60,
                },
            ],
            vec![alice],
        );
        let err = ledger.execute(tx).await.unwrap_err();
        assert_eq!(err.program_error(), Some(ProgramError::InsufficientFunds));
        assert!(matches!(err, LedgerError::InstructionFailed { index: 1, .. }));
        assert_eq!(ledger.lamports(&alice).await, 100);
        assert_eq!(ledger.lamports(&bob).await, 0);
        assert_eq!(ledger.slot().await, 0);
    }

    #[tokio::test]
    async fn missing_signer_is_rejected_before_execution() {
        let (ledger, _) = ledger();
        let alice = Address::new_from_array([1; 32]);
        let mallory = Address::new_from_array([9; 32]);
        ledger.airdrop(&alice, 100).await.unwrap();

        let tx = Transaction::single(
            Instruction::TransferNative {
                from: alice,
                to: mallory,
                lamports: 100,
            },
            mallory,
        );
        assert_eq!(
            ledger.execute(tx).await.unwrap_err(),
            LedgerError::MissingSignature(alice)
        );
        assert_eq!(
            ledger.execute(Transaction::new(vec![], vec![])).await.unwrap_err(),
            LedgerError::EmptyTransaction
        );
    }

    #[tokio::test]
    async fn committed_events_reach_subscribers() {
        let (ledger, clock) = ledger();
        let mut feed = ledger.subscribe();
        let authority = Address::new_from_array([1; 32]);
        let now = clock.unix_timestamp();

        let receipt = ledger
            .execute(Transaction::single(
                Instruction::CreateMarket {
                    authority,
                    market_id: 1,
                    question: "Will X happen?".into(),
                    betting_start_ts: now + 5,
                    betting_end_ts: now + 3600,
                    resolution_end_ts: now + 7200,
                    token_mint: NATIVE_MINT,
                },
                authority,
            ))
            .await
            .unwrap();
        assert_eq!(receipt.slot, 1);
        assert!(matches!(
            feed.recv().await.unwrap(),
            LedgerEvent::MarketCreated { market_id: 1, .. }
        ));
    }

    #[tokio::test]
    async fn mint_to_creates_holder_account() {
        let (ledger, _) = ledger();
        let usdc = Address::new_from_array([5; 32]);
        let alice = Address::new_from_array([1; 32]);
        ledger.create_mint(usdc, 6).await.unwrap();
        let account = ledger.mint_to(&usdc, alice, 250).await.unwrap();
        let holding = ledger.token_account(&account).await.unwrap();
        assert_eq!(holding.amount, 250);
        assert_eq!(holding.owner, alice);
        assert_eq!(ledger.mint(&usdc).await.unwrap().supply, 250);
    }
}
