use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::{ParsePubkeyError, Pubkey};
use thiserror::Error;

/// 32-byte ledger account address, displayed in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(Pubkey);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid base58 address: {0}")]
    InvalidBase58(String),

    #[error("address must decode to 32 bytes: {0}")]
    WrongLength(String),
}

/// Wrapped native coin mint (`So11111111111111111111111111111111111111112`).
pub const NATIVE_MINT: Address = Address::new_from_array([
    6, 155, 136, 87, 254, 171, 129, 132, 251, 104, 127, 99, 70, 24, 192, 53, 218, 196, 57, 220,
    26, 235, 59, 85, 152, 160, 240, 0, 0, 0, 0, 1,
]);

/// Token program (`TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`).
pub const TOKEN_PROGRAM_ID: Address = Address::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// Associated token account program (`ATokenGPvbdGVxr1b2hvZbsiqKBoRgNRC8yZn5mUCZoM`).
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 89, 245, 244, 56,
    53, 33, 219, 224, 49, 101, 184, 194, 16, 220, 104,
]);

impl Address {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(Pubkey::new_from_array(bytes))
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn as_pubkey(&self) -> &Pubkey {
        &self.0
    }

    /// Random address, used for wallets and test identities.
    pub fn new_unique() -> Self {
        Self::new_from_array(rand::random())
    }

    /// Shortened form for log lines: first and last four characters.
    pub fn short(&self) -> String {
        let full = self.to_string();
        if full.len() > 10 {
            format!("{}..{}", &full[..4], &full[full.len() - 4..])
        } else {
            full
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self::new_from_array(bytes)
    }
}

impl From<Pubkey> for Address {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s).map(Self).map_err(|e| match e {
            ParsePubkeyError::WrongSize => AddressParseError::WrongLength(s.to_string()),
            _ => AddressParseError::InvalidBase58(s.to_string()),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
