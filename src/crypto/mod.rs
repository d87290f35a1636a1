//! Client-side encryption of wagers for the compute network.

pub mod cipher;
pub mod session;

pub use cipher::{HmacKeystreamCipher, WagerCipher, BLOCK_SIZE, NONCE_SIZE};
pub use session::{CryptoSession, DecryptedWager, EncryptedWager, NetworkKeypair};
