//! Token plumbing: holding accounts, native coin wrapping, transfers.

use crate::errors::ProgramError;
use crate::ledger::store::AccountStore;
use crate::models::{Address, Mint, TokenAccount, MAX_DECIMALS, NATIVE_MINT};
use crate::pda::associated_token_address;

pub fn create_mint(
    store: &mut AccountStore,
    address: Address,
    decimals: u8,
) -> Result<(), ProgramError> {
    if decimals > MAX_DECIMALS {
        return Err(ProgramError::InvalidTokenMint);
    }
    if store.is_allocated(&address) {
        return Err(ProgramError::AccountAlreadyExists);
    }
    store.mints.insert(address, Mint { decimals, supply: 0 });
    Ok(())
}

/// Allocate a holding account at `address`. Native accounts start synced
/// to whatever lamports already sit at the address.
pub fn create_account(
    store: &mut AccountStore,
    address: Address,
    owner: Address,
    mint: Address,
) -> Result<(), ProgramError> {
    if !store.mints.contains_key(&mint) {
        return Err(ProgramError::InvalidTokenMint);
    }
    if store.is_allocated(&address) {
        return Err(ProgramError::AccountAlreadyExists);
    }
    let is_native = mint == NATIVE_MINT;
    let amount = if is_native { store.lamports(&address) } else { 0 };
    store.token_accounts.insert(
        address,
        TokenAccount {
            mint,
            owner,
            amount,
            is_native,
        },
    );
    Ok(())
}

/// Idempotent: an existing account with the right owner and mint is fine.
pub fn create_associated_account(
    store: &mut AccountStore,
    owner: Address,
    mint: Address,
) -> Result<Address, ProgramError> {
    let address = associated_token_address(&owner, &mint)?;
    if let Some(existing) = store.token_accounts.get(&address) {
        if existing.owner == owner && existing.mint == mint {
            return Ok(address);
        }
        return Err(ProgramError::AccountAlreadyExists);
    }
    create_account(store, address, owner, mint)?;
    Ok(address)
}

pub fn transfer_native(
    store: &mut AccountStore,
    from: &Address,
    to: &Address,
    lamports: u64,
) -> Result<(), ProgramError> {
    let from_balance = store.lamports(from);
    if from_balance < lamports {
        return Err(ProgramError::InsufficientFunds);
    }
    if from == to {
        return Ok(());
    }
    let to_balance = store
        .lamports(to)
        .checked_add(lamports)
        .ok_or(ProgramError::Overflow)?;
    store.lamports.insert(*from, from_balance - lamports);
    store.lamports.insert(*to, to_balance);
    Ok(())
}

pub fn sync_native(store: &mut AccountStore, account: &Address) -> Result<u64, ProgramError> {
    let lamports = store.lamports(account);
    let token = store.token_account_mut(account)?;
    if !token.is_native {
        return Err(ProgramError::InvalidTokenMint);
    }
    token.amount = lamports;
    Ok(lamports)
}

/// Move `amount` between two accounts of the same mint. Wrapped native
/// balances carry their lamports along.
pub fn transfer(
    store: &mut AccountStore,
    from: &Address,
    to: &Address,
    amount: u64,
) -> Result<(), ProgramError> {
    let source = store.token_account(from)?;
    let destination = store.token_account(to)?;
    if source.mint != destination.mint {
        return Err(ProgramError::InvalidTokenMint);
    }
    if source.amount < amount {
        return Err(ProgramError::InsufficientFunds);
    }
    if from == to {
        return Ok(());
    }
    let is_native = source.is_native;
    let credited = destination
        .amount
        .checked_add(amount)
        .ok_or(ProgramError::Overflow)?;

    store.token_account_mut(from)?.amount -= amount;
    store.token_account_mut(to)?.amount = credited;
    if is_native {
        transfer_native(store, from, to, amount)?;
    }
    Ok(())
}

pub fn mint_to(
    store: &mut AccountStore,
    mint: &Address,
    to: &Address,
    amount: u64,
) -> Result<(), ProgramError> {
    if *mint == NATIVE_MINT {
        // Native supply comes from lamports, not from minting.
        return Err(ProgramError::InvalidTokenMint);
    }
    let account = store.token_account(to)?;
    if account.mint != *mint {
        return Err(ProgramError::InvalidTokenMint);
    }
    let credited = account
        .amount
        .checked_add(amount)
        .ok_or(ProgramError::Overflow)?;
    let mint_account = store
        .mints
        .get_mut(mint)
        .ok_or(ProgramError::InvalidTokenMint)?;
    mint_account.supply = mint_account
        .supply
        .checked_add(amount)
        .ok_or(ProgramError::Overflow)?;
    store.token_account_mut(to)?.amount = credited;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NATIVE_DECIMALS;

    fn store_with_native() -> AccountStore {
        let mut store = AccountStore::default();
        create_mint(&mut store, NATIVE_MINT, NATIVE_DECIMALS).unwrap();
        store
    }

    #[test]
    fn wrap_native_then_sync() {
        let mut store = store_with_native();
        let alice = Address::new_from_array([1; 32]);
        store.lamports.insert(alice, 1_000);

        let ata = create_associated_account(&mut store, alice, NATIVE_MINT).unwrap();
        transfer_native(&mut store, &alice, &ata, 400).unwrap();
        assert_eq!(store.token_account(&ata).unwrap().amount, 0);
        assert_eq!(sync_native(&mut store, &ata).unwrap(), 400);
        assert_eq!(store.lamports(&alice), 600);
    }

    #[test]
    fn mint_precision_is_bounded() {
        let mut store = store_with_native();
        let wide = Address::new_from_array([9; 32]);
        assert_eq!(
            create_mint(&mut store, wide, MAX_DECIMALS + 1).unwrap_err(),
            ProgramError::InvalidTokenMint
        );
        assert!(!store.mints.contains_key(&wide));
        create_mint(&mut store, wide, MAX_DECIMALS).unwrap();
        assert_eq!(store.mints[&wide].decimals, MAX_DECIMALS);
    }

    #[test]
    fn associated_account_creation_is_idempotent() {
        let mut store = store_with_native();
        let alice = Address::new_from_array([1; 32]);
        let a = create_associated_account(&mut store, alice, NATIVE_MINT).unwrap();
        let b = create_associated_account(&mut store, alice, NATIVE_MINT).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.token_accounts.len(), 1);
    }

    #[test]
    fn overdraft_is_rejected() {
        let mut store = store_with_native();
        let alice = Address::new_from_array([1; 32]);
        let bob = Address::new_from_array([2; 32]);
        store.lamports.insert(alice, 10);
        assert_eq!(
            transfer_native(&mut store, &alice, &bob, 11).unwrap_err(),
            ProgramError::InsufficientFunds
        );
    }

    #[test]
    fn native_transfer_moves_lamports_with_amount() {
        let mut store = store_with_native();
        let alice = Address::new_from_array([1; 32]);
        let bob = Address::new_from_array([2; 32]);
        store.lamports.insert(alice, 500);
        let a = create_associated_account(&mut store, alice, NATIVE_MINT).unwrap();
        let b = create_associated_account(&mut store, bob, NATIVE_MINT).unwrap();
        transfer_native(&mut store, &alice, &a, 500).unwrap();
        sync_native(&mut store, &a).unwrap();

        transfer(&mut store, &a, &b, 200).unwrap();
        assert_eq!(store.token_account(&a).unwrap().amount, 300);
        assert_eq!(store.token_account(&b).unwrap().amount, 200);
        assert_eq!(store.lamports(&b), 200);
    }

    #[test]
    fn mint_to_rejects_native_and_mismatched_mint() {
        let mut store = store_with_native();
        let usdc = Address::new_from_array([9; 32]);
        create_mint(&mut store, usdc, 6).unwrap();
        let alice = Address::new_from_array([1; 32]);
        let ata = create_associated_account(&mut store, alice, usdc).unwrap();

        mint_to(&mut store, &usdc, &ata, 1_000).unwrap();
        assert_eq!(store.token_account(&ata).unwrap().amount, 1_000);
        assert_eq!(store.mints[&usdc].supply, 1_000);
        assert_eq!(
            mint_to(&mut store, &NATIVE_MINT, &ata, 1).unwrap_err(),
            ProgramError::InvalidTokenMint
        );
    }
}
