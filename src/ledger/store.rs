use std::collections::HashMap;

use crate::errors::ProgramError;
use crate::models::{
    Address, ComputationRecord, Market, Mint, PoolState, Position, TokenAccount,
};

/// Every account the ledger knows about, keyed by address.
///
/// Transactions run against a clone and the clone replaces the committed
/// store only when every instruction succeeded.
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    pub lamports: HashMap<Address, u64>,
    pub mints: HashMap<Address, Mint>,
    pub token_accounts: HashMap<Address, TokenAccount>,
    pub markets: HashMap<Address, Market>,
    pub pools: HashMap<Address, PoolState>,
    pub positions: HashMap<Address, Position>,
    pub computations: HashMap<Address, ComputationRecord>,
}

impl AccountStore {
    pub fn lamports(&self, address: &Address) -> u64 {
        self.lamports.get(address).copied().unwrap_or(0)
    }

    /// True when any typed account already lives at `address`.
    pub fn is_allocated(&self, address: &Address) -> bool {
        self.mints.contains_key(address)
            || self.token_accounts.contains_key(address)
            || self.markets.contains_key(address)
            || self.pools.contains_key(address)
            || self.positions.contains_key(address)
            || self.computations.contains_key(address)
    }

    pub fn market(&self, address: &Address) -> Result<&Market, ProgramError> {
        self.markets.get(address).ok_or(ProgramError::AccountNotFound)
    }

    pub fn market_mut(&mut self, address: &Address) -> Result<&mut Market, ProgramError> {
        self.markets
            .get_mut(address)
            .ok_or(ProgramError::AccountNotFound)
    }

    pub fn pool_mut(&mut self, address: &Address) -> Result<&mut PoolState, ProgramError> {
        self.pools
            .get_mut(address)
            .ok_or(ProgramError::PoolStateNotInitialized)
    }

    pub fn position(&self, address: &Address) -> Result<&Position, ProgramError> {
        self.positions
            .get(address)
            .ok_or(ProgramError::InvalidPosition)
    }

    pub fn position_mut(&mut self, address: &Address) -> Result<&mut Position, ProgramError> {
        self.positions
            .get_mut(address)
            .ok_or(ProgramError::InvalidPosition)
    }

    pub fn token_account(&self, address: &Address) -> Result<&TokenAccount, ProgramError> {
        self.token_accounts
            .get(address)
            .ok_or(ProgramError::AccountNotFound)
    }

    pub fn token_account_mut(
        &mut self,
        address: &Address,
    ) -> Result<&mut TokenAccount, ProgramError> {
        self.token_accounts
            .get_mut(address)
            .ok_or(ProgramError::AccountNotFound)
    }

    pub fn computation_mut(
        &mut self,
        address: &Address,
    ) -> Result<&mut ComputationRecord, ProgramError> {
        self.computations
            .get_mut(address)
            .ok_or(ProgramError::UnknownComputation)
    }
}
