//! The settlement program: every state change the ledger accepts goes
//! through [`process`].

pub mod computation;
pub mod instruction;
pub mod market;
pub mod pool;
pub mod position;
pub mod processor;
pub mod token;
pub mod vault;

use ed25519_dalek::VerifyingKey;

use crate::ledger::store::AccountStore;
use crate::models::LedgerEvent;
use crate::pda::{AddressDeriver, NetworkAddresses};

pub use instruction::Instruction;
pub use processor::process;

/// Fixed at genesis: program identity, compute-network addressing, and the
/// key whose signature authenticates computation results.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub deriver: AddressDeriver,
    pub network: NetworkAddresses,
    pub cluster_key: VerifyingKey,
}

/// What one instruction sees while it runs.
pub struct InvokeContext<'a> {
    pub store: &'a mut AccountStore,
    pub config: &'a ProgramConfig,
    pub now: i64,
    pub events: &'a mut Vec<LedgerEvent>,
}

impl InvokeContext<'_> {
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }
}
