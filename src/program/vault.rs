//! Per-market escrow.
//!
//! The vault is a token account at the market's derived vault address,
//! owned by the market. Money enters only alongside a recorded bet and
//! leaves only for a computed payout or a refund.

use crate::errors::{CustodyViolation, InstructionError, ProgramError};
use crate::ledger::store::AccountStore;
use crate::models::{Address, Market};

use super::token;

pub fn create(
    store: &mut AccountStore,
    vault: Address,
    market: Address,
    mint: Address,
) -> Result<(), ProgramError> {
    token::create_account(store, vault, market, mint)
}

pub fn balance(store: &AccountStore, vault: &Address) -> Result<u64, ProgramError> {
    Ok(store.token_account(vault)?.amount)
}

/// Check that `account` is `owner`'s holding account in the market's asset.
pub fn check_holder(
    store: &AccountStore,
    market: &Market,
    account: &Address,
    owner: &Address,
) -> Result<(), ProgramError> {
    let holding = store.token_account(account)?;
    if holding.owner != *owner {
        return Err(ProgramError::InvalidTokenAccountOwner);
    }
    if holding.mint != market.token_mint {
        return Err(ProgramError::InvalidTokenMint);
    }
    Ok(())
}

pub fn deposit(
    store: &mut AccountStore,
    market: &Market,
    from: &Address,
    depositor: &Address,
    amount: u64,
) -> Result<(), ProgramError> {
    check_holder(store, market, from, depositor)?;
    token::transfer(store, from, &market.vault, amount)?;
    tracing::debug!(
        vault = %market.vault,
        market_id = market.market_id,
        amount,
        "Vault: deposit"
    );
    Ok(())
}

/// Release funds to `to`. A vault short of `amount` means accounting is
/// broken somewhere else; that is a custody violation, not a user error.
pub fn withdraw(
    store: &mut AccountStore,
    market: &Market,
    to: &Address,
    amount: u64,
) -> Result<(), InstructionError> {
    let held = balance(store, &market.vault)?;
    if held < amount {
        let violation = CustodyViolation {
            vault: market.vault,
            balance: held,
            requested: amount,
        };
        tracing::error!(
            vault = %market.vault,
            market_id = market.market_id,
            balance = held,
            requested = amount,
            "Vault: custody violation, release exceeds balance"
        );
        return Err(violation.into());
    }
    token::transfer(store, &market.vault, to, amount)?;
    tracing::debug!(
        vault = %market.vault,
        market_id = market.market_id,
        amount,
        remaining = held - amount,
        "Vault: withdrawal"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketStatus, NATIVE_DECIMALS, NATIVE_MINT};

    fn setup() -> (AccountStore, Market, Address, Address) {
        let mut store = AccountStore::default();
        token::create_mint(&mut store, NATIVE_MINT, NATIVE_DECIMALS).unwrap();
        let market_addr = Address::new_from_array([1; 32]);
        let vault = Address::new_from_array([2; 32]);
        create(&mut store, vault, market_addr, NATIVE_MINT).unwrap();

        let alice = Address::new_from_array([3; 32]);
        store.lamports.insert(alice, 1_000);
        let ata = token::create_associated_account(&mut store, alice, NATIVE_MINT).unwrap();
        token::transfer_native(&mut store, &alice, &ata, 1_000).unwrap();
        token::sync_native(&mut store, &ata).unwrap();

        let market = Market {
            market_id: 1,
            authority: Address::new_from_array([9; 32]),
            question: "q".into(),
            token_mint: NATIVE_MINT,
            vault,
            pool_state: Address::new_from_array([4; 32]),
            betting_start_ts: 0,
            betting_end_ts: 10,
            resolution_end_ts: 20,
            status: MarketStatus::Open,
            winning_outcome: None,
            total_positions: 0,
            state_commitment: [0; 32],
            created_at: 0,
            resolved_at: None,
        };
        (store, market, alice, ata)
    }

    #[test]
    fn deposit_then_withdraw() {
        let (mut store, market, alice, ata) = setup();
        deposit(&mut store, &market, &ata, &alice, 100).unwrap();
        assert_eq!(balance(&store, &market.vault).unwrap(), 100);
        withdraw(&mut store, &market, &ata, 60).unwrap();
        assert_eq!(balance(&store, &market.vault).unwrap(), 40);
        assert_eq!(store.token_account(&ata).unwrap().amount, 960);
    }

    #[test]
    fn deposit_from_foreign_account_is_rejected() {
        let (mut store, market, _alice, ata) = setup();
        let mallory = Address::new_from_array([7; 32]);
        assert_eq!(
            deposit(&mut store, &market, &ata, &mallory, 1).unwrap_err(),
            ProgramError::InvalidTokenAccountOwner
        );
    }

    #[test]
    fn overdrawn_vault_is_a_custody_violation() {
        let (mut store, market, alice, ata) = setup();
        deposit(&mut store, &market, &ata, &alice, 100).unwrap();
        let err = withdraw(&mut store, &market, &ata, 101).unwrap_err();
        assert_eq!(
            err,
            InstructionError::Custody(CustodyViolation {
                vault: market.vault,
                balance: 100,
                requested: 101,
            })
        );
        assert_eq!(balance(&store, &market.vault).unwrap(), 100);
    }
}
