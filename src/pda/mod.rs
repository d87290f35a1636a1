//! Deterministic account addressing.
//!
//! Every protocol account lives at a program-derived address: the ledger's
//! standard scheme with the bump walked down from 255 until the result has
//! no private key. No network access needed.

pub mod network;

use solana_pubkey::{Pubkey, PubkeyError};
use thiserror::Error;

use crate::errors::ProgramError;
use crate::models::{Address, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};

pub use network::{NetworkAddresses, QueueAccounts};
pub use solana_pubkey::{MAX_SEEDS, MAX_SEED_LEN};

pub const MARKET_SEED: &[u8] = b"dark_market";
pub const POOL_STATE_SEED: &[u8] = b"pool_state";
pub const VAULT_SEED: &[u8] = b"vault";
pub const POSITION_SEED: &[u8] = b"position";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("too many seeds: {0} (max {MAX_SEEDS})")]
    TooManySeeds(usize),

    #[error("seed of {0} bytes exceeds {MAX_SEED_LEN}")]
    SeedTooLong(usize),

    #[error("program id may not own derived addresses")]
    IllegalOwner,

    #[error("no off-curve bump found")]
    NoViableBump,
}

impl From<DerivationError> for ProgramError {
    fn from(_: DerivationError) -> Self {
        ProgramError::AddressDerivationFailed
    }
}

/// A derived address together with the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub address: Address,
    pub bump: u8,
}

fn check_seeds(seeds: &[&[u8]], room: usize) -> Result<(), DerivationError> {
    if seeds.len() + room > MAX_SEEDS {
        return Err(DerivationError::TooManySeeds(seeds.len() + room));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(DerivationError::SeedTooLong(seed.len()));
    }
    Ok(())
}

/// Program address for exactly these seeds; `None` when it lands on the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Option<Address>, DerivationError> {
    check_seeds(seeds, 0)?;
    match Pubkey::create_program_address(seeds, program_id.as_pubkey()) {
        Ok(pubkey) => Ok(Some(pubkey.into())),
        Err(PubkeyError::InvalidSeeds) => Ok(None),
        Err(PubkeyError::IllegalOwner) => Err(DerivationError::IllegalOwner),
        Err(_) => Err(DerivationError::SeedTooLong(
            seeds.iter().map(|s| s.len()).max().unwrap_or_default(),
        )),
    }
}

/// Walk bumps from 255 down and return the first off-curve address.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Derived, DerivationError> {
    // The bump is appended as one more seed.
    check_seeds(seeds, 1)?;
    Pubkey::try_find_program_address(seeds, program_id.as_pubkey())
        .map(|(pubkey, bump)| Derived {
            address: pubkey.into(),
            bump,
        })
        .ok_or(DerivationError::NoViableBump)
}

/// Derives every protocol account address from stable seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Address,
}

impl AddressDeriver {
    pub fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    pub fn market(&self, market_id: u64) -> Result<Derived, DerivationError> {
        find_program_address(&[MARKET_SEED, &market_id.to_le_bytes()], &self.program_id)
    }

    pub fn pool_state(&self, market_id: u64) -> Result<Derived, DerivationError> {
        find_program_address(&[POOL_STATE_SEED, &market_id.to_le_bytes()], &self.program_id)
    }

    pub fn vault(&self, market_id: u64) -> Result<Derived, DerivationError> {
        find_program_address(&[VAULT_SEED, &market_id.to_le_bytes()], &self.program_id)
    }

    pub fn position(&self, market: &Address, owner: &Address) -> Result<Derived, DerivationError> {
        find_program_address(
            &[POSITION_SEED, market.as_ref(), owner.as_ref()],
            &self.program_id,
        )
    }

    /// All three per-market accounts at once.
    pub fn market_accounts(&self, market_id: u64) -> Result<MarketAccounts, DerivationError> {
        Ok(MarketAccounts {
            market: self.market(market_id)?.address,
            pool_state: self.pool_state(market_id)?.address,
            vault: self.vault(market_id)?.address,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAccounts {
    pub market: Address,
    pub pool_state: Address,
    pub vault: Address,
}

/// Canonical holding account of `owner` for `mint`.
pub fn associated_token_address(
    owner: &Address,
    mint: &Address,
) -> Result<Address, DerivationError> {
    find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|d| d.address)
}
