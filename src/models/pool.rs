use serde::{Deserialize, Serialize};

use super::address::Address;

/// Upper bound on the aggregate ciphertext the cluster may write back.
pub const ENCRYPTED_STATE_SIZE: usize = 256;

/// Per-market encrypted aggregate. Only finalized computation results
/// mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PoolState {
    pub market: Address,
    /// Opaque to everyone but the cluster.
    pub encrypted_state: Vec<u8>,
    pub state_version: u64,
    pub last_computation_id: u64,
    pub pending_computations: u32,
    pub last_updated: i64,
    pub is_initialized: bool,
}

impl PoolState {
    pub fn has_pending(&self) -> bool {
        self.pending_computations > 0
    }
}
