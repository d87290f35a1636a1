//! Encrypted pool aggregate and its admission gate.
//!
//! `pending_computations` admits one job per market at a time, so results
//! apply in a total order and `state_version` moves by exactly one per
//! applied result.

use sha2::{Digest, Sha256};

use crate::errors::ProgramError;
use crate::models::{Address, PoolState, ENCRYPTED_STATE_SIZE};

/// Fresh aggregate for a market that just opened.
pub fn initialize(market: Address, now: i64) -> PoolState {
    PoolState {
        market,
        encrypted_state: Vec::new(),
        state_version: 0,
        last_computation_id: 0,
        pending_computations: 0,
        last_updated: now,
        is_initialized: true,
    }
}

/// Reject a new job unless the pool is live and idle.
pub fn admit(pool: &PoolState, market: &Address) -> Result<(), ProgramError> {
    if pool.market != *market {
        return Err(ProgramError::InvalidPoolState);
    }
    if !pool.is_initialized {
        return Err(ProgramError::PoolStateNotInitialized);
    }
    if pool.has_pending() {
        return Err(ProgramError::ComputationInFlight);
    }
    Ok(())
}

pub fn enqueue(pool: &mut PoolState) -> Result<(), ProgramError> {
    pool.pending_computations = pool
        .pending_computations
        .checked_add(1)
        .ok_or(ProgramError::Overflow)?;
    Ok(())
}

/// A job left the queue without changing the aggregate.
pub fn release(pool: &mut PoolState) -> Result<(), ProgramError> {
    pool.pending_computations = pool
        .pending_computations
        .checked_sub(1)
        .ok_or(ProgramError::Underflow)?;
    Ok(())
}

/// A job's result applied: bump the version once and release the slot.
/// Returns the new version.
pub fn apply_result(
    pool: &mut PoolState,
    computation_offset: u64,
    encrypted_state: Option<Vec<u8>>,
    now: i64,
) -> Result<u64, ProgramError> {
    if let Some(state) = &encrypted_state {
        if state.len() > ENCRYPTED_STATE_SIZE {
            return Err(ProgramError::EncryptedStateTooLarge);
        }
    }
    release(pool)?;
    pool.state_version = pool
        .state_version
        .checked_add(1)
        .ok_or(ProgramError::Overflow)?;
    if let Some(state) = encrypted_state {
        pool.encrypted_state = state;
    }
    pool.last_computation_id = computation_offset;
    pool.last_updated = now;
    Ok(pool.state_version)
}

/// Hash binding the aggregate ciphertext, its nonce and its version.
pub fn state_commitment(encrypted_state: &[u8], state_nonce: u128, state_version: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(encrypted_state);
    hasher.update(state_nonce.to_le_bytes());
    hasher.update(state_version.to_le_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> Address {
        Address::new_from_array([1; 32])
    }

    #[test]
    fn opened_pool_starts_at_version_zero() {
        let pool = initialize(market(), 5);
        assert!(pool.is_initialized);
        assert_eq!(pool.state_version, 0);
        assert_eq!(pool.pending_computations, 0);
    }

    #[test]
    fn admission_blocks_while_pending() {
        let mut pool = initialize(market(), 0);
        admit(&pool, &market()).unwrap();
        enqueue(&mut pool).unwrap();
        assert_eq!(
            admit(&pool, &market()).unwrap_err(),
            ProgramError::ComputationInFlight
        );
        apply_result(&mut pool, 7, Some(vec![1; 64]), 10).unwrap();
        admit(&pool, &market()).unwrap();
    }

    #[test]
    fn uninitialized_or_foreign_pool_is_rejected() {
        let mut pool = initialize(market(), 0);
        assert_eq!(
            admit(&pool, &Address::new_from_array([2; 32])).unwrap_err(),
            ProgramError::InvalidPoolState
        );
        pool.is_initialized = false;
        assert_eq!(
            admit(&pool, &market()).unwrap_err(),
            ProgramError::PoolStateNotInitialized
        );
    }

    #[test]
    fn version_moves_once_per_applied_result() {
        let mut pool = initialize(market(), 0);
        for expected in 1..=5u64 {
            enqueue(&mut pool).unwrap();
            let v = apply_result(&mut pool, expected * 11, None, 0).unwrap();
            assert_eq!(v, expected);
            assert_eq!(pool.last_computation_id, expected * 11);
        }
        assert_eq!(pool.pending_computations, 0);
    }

    #[test]
    fn release_never_goes_negative() {
        let mut pool = initialize(market(), 0);
        assert_eq!(release(&mut pool).unwrap_err(), ProgramError::Underflow);
        assert_eq!(
            apply_result(&mut pool, 1, None, 0).unwrap_err(),
            ProgramError::Underflow
        );
        assert_eq!(pool.state_version, 0);
    }

    #[test]
    fn oversized_state_is_rejected_without_side_effects() {
        let mut pool = initialize(market(), 0);
        enqueue(&mut pool).unwrap();
        let err = apply_result(&mut pool, 1, Some(vec![0; ENCRYPTED_STATE_SIZE + 1]), 0);
        assert_eq!(err.unwrap_err(), ProgramError::EncryptedStateTooLarge);
        assert_eq!(pool.pending_computations, 1);
    }

    #[test]
    fn commitment_depends_on_version() {
        assert_ne!(state_commitment(b"s", 1, 1), state_commitment(b"s", 1, 2));
        assert_ne!(state_commitment(b"s", 1, 1), state_commitment(b"s", 2, 1));
    }
}
