use serde::{Deserialize, Serialize};

use super::address::Address;

/// Decimals of the ledger's native coin.
pub const NATIVE_DECIMALS: u8 = 9;

/// Widest precision a mint may declare; `10^19` still fits in a `u64`.
pub const MAX_DECIMALS: u8 = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub decimals: u8,
    pub supply: u64,
}

/// Holding account for one mint. For wrapped native accounts `amount`
/// tracks the lamports held by the account as of the last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
    pub is_native: bool,
}
