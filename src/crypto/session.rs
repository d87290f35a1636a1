use std::marker::PhantomData;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use super::cipher::{HmacKeystreamCipher, WagerCipher, NONCE_SIZE};
use crate::errors::CryptoError;
use crate::models::{Outcome, ENCRYPTED_BET_SIZE};

/// Everything a bettor sends to place one confidential wager. The deposit
/// travels in the clear so escrow can check it against the transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedWager {
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    pub ephemeral_public_key: [u8; 32],
    pub nonce: [u8; NONCE_SIZE],
    pub deposit_amount: u64,
}

impl EncryptedWager {
    /// Nonce as the little-endian integer the program stores.
    pub fn nonce_u128(&self) -> u128 {
        u128::from_le_bytes(self.nonce)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Client half of the encryption handshake with the compute network.
///
/// Holds only the network's public key. Every call to
/// [`encrypt_wager`](Self::encrypt_wager) draws a fresh ephemeral key pair
/// and a fresh nonce. `C` is the cipher the network speaks.
pub struct CryptoSession<C = HmacKeystreamCipher> {
    network_public_key: PublicKey,
    cipher: PhantomData<fn() -> C>,
}

impl<C> Clone for CryptoSession<C> {
    fn clone(&self) -> Self {
        Self {
            network_public_key: self.network_public_key,
            cipher: PhantomData,
        }
    }
}

impl CryptoSession {
    pub fn new(network_public_key: [u8; 32]) -> Result<Self, CryptoError> {
        Self::with_cipher(network_public_key)
    }
}

impl<C: WagerCipher> CryptoSession<C> {
    pub fn with_cipher(network_public_key: [u8; 32]) -> Result<Self, CryptoError> {
        if network_public_key == [0u8; 32] {
            return Err(CryptoError::InvalidNetworkKey);
        }
        Ok(Self {
            network_public_key: PublicKey::from(network_public_key),
            cipher: PhantomData,
        })
    }

    pub fn network_public_key(&self) -> [u8; 32] {
        self.network_public_key.to_bytes()
    }

    pub fn encrypt_wager(
        &self,
        outcome: Outcome,
        amount: u64,
    ) -> Result<EncryptedWager, CryptoError> {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public_key = PublicKey::from(&secret);
        let shared = secret.diffie_hellman(&self.network_public_key);
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidNetworkKey);
        }

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = C::from_shared_secret(shared.as_bytes())?;
        let ciphertext = cipher.encrypt(&[u64::from(outcome.as_u8()), amount], &nonce)?;

        Ok(EncryptedWager {
            ciphertext,
            ephemeral_public_key: ephemeral_public_key.to_bytes(),
            nonce,
            deposit_amount: amount,
        })
    }
}

/// Plaintext recovered by the network. `outcome` is left raw so the
/// cluster can reject values other than 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedWager {
    pub outcome: u64,
    pub amount: u64,
}

/// The network's long-lived x25519 key pair, decrypting with cipher `C`.
pub struct NetworkKeypair<C = HmacKeystreamCipher> {
    secret: StaticSecret,
    public: PublicKey,
    cipher: PhantomData<fn() -> C>,
}

impl NetworkKeypair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self::with_cipher(secret)
    }
}

impl<C: WagerCipher> NetworkKeypair<C> {
    pub fn with_cipher(secret: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(secret))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self {
            secret,
            public,
            cipher: PhantomData,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn decrypt_wager(
        &self,
        ciphertext: &[u8],
        ephemeral_public_key: &[u8; 32],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<DecryptedWager, CryptoError> {
        if ciphertext.len() != ENCRYPTED_BET_SIZE {
            return Err(CryptoError::CiphertextLength {
                expected: ENCRYPTED_BET_SIZE,
                actual: ciphertext.len(),
            });
        }
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(*ephemeral_public_key));
        let cipher = C::from_shared_secret(shared.as_bytes())?;
        match cipher.decrypt(ciphertext, nonce)?.as_slice() {
            [outcome, amount] => Ok(DecryptedWager {
                outcome: *outcome,
                amount: *amount,
            }),
            _ => Err(CryptoError::MalformedPlaintext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::BLOCK_SIZE;

    #[test]
    fn round_trip_recovers_outcome_and_amount() {
        let network = NetworkKeypair::generate();
        let session = CryptoSession::new(network.public_key()).unwrap();

        let mut amounts = vec![1u64, 2, 100, 255, 256, u64::from(u32::MAX), (1u64 << 63) - 1];
        amounts.extend((0..32).map(|_| (OsRng.next_u64() >> 1).max(1)));

        for outcome in [Outcome::No, Outcome::Yes] {
            for &amount in &amounts {
                let wager = session.encrypt_wager(outcome, amount).unwrap();
                assert_eq!(wager.ciphertext.len(), ENCRYPTED_BET_SIZE);
                assert_eq!(wager.deposit_amount, amount);

                let plain = network
                    .decrypt_wager(&wager.ciphertext, &wager.ephemeral_public_key, &wager.nonce)
                    .unwrap();
                assert_eq!(plain.outcome, u64::from(outcome.as_u8()));
                assert_eq!(plain.amount, amount);
            }
        }
    }

    #[test]
    fn ephemeral_key_and_nonce_are_fresh_per_wager() {
        let network = NetworkKeypair::generate();
        let session = CryptoSession::new(network.public_key()).unwrap();
        let a = session.encrypt_wager(Outcome::Yes, 100).unwrap();
        let b = session.encrypt_wager(Outcome::Yes, 100).unwrap();
        assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn other_network_key_cannot_decrypt() {
        let network = NetworkKeypair::generate();
        let other = NetworkKeypair::generate();
        let wager = CryptoSession::new(network.public_key())
            .unwrap()
            .encrypt_wager(Outcome::No, 42)
            .unwrap();
        let result =
            other.decrypt_wager(&wager.ciphertext, &wager.ephemeral_public_key, &wager.nonce);
        assert!(result.is_err());
    }

    /// Cleartext blocks, just enough to show a session and the network
    /// agree on whichever cipher they are built with.
    struct PlainBlocks;

    impl WagerCipher for PlainBlocks {
        fn from_shared_secret(_: &[u8; 32]) -> Result<Self, CryptoError> {
            Ok(PlainBlocks)
        }

        fn encrypt(
            &self,
            plaintext: &[u64],
            _: &[u8; NONCE_SIZE],
        ) -> Result<Vec<u8>, CryptoError> {
            let mut out = Vec::new();
            for value in plaintext {
                let mut block = [0u8; BLOCK_SIZE];
                block[..8].copy_from_slice(&value.to_le_bytes());
                out.extend_from_slice(&block);
            }
            Ok(out)
        }

        fn decrypt(
            &self,
            ciphertext: &[u8],
            _: &[u8; NONCE_SIZE],
        ) -> Result<Vec<u64>, CryptoError> {
            ciphertext
                .chunks_exact(BLOCK_SIZE)
                .map(|block| {
                    let mut le = [0u8; 8];
                    le.copy_from_slice(&block[..8]);
                    Ok(u64::from_le_bytes(le))
                })
                .collect()
        }
    }

    #[test]
    fn session_and_network_share_a_pluggable_cipher() {
        let network = NetworkKeypair::<PlainBlocks>::with_cipher([11; 32]);
        let session = CryptoSession::<PlainBlocks>::with_cipher(network.public_key()).unwrap();
        let wager = session.encrypt_wager(Outcome::Yes, 77).unwrap();
        assert_eq!(wager.ciphertext.len(), ENCRYPTED_BET_SIZE);
        assert_eq!(wager.ciphertext[..8], 1u64.to_le_bytes());

        let plain = network
            .decrypt_wager(&wager.ciphertext, &wager.ephemeral_public_key, &wager.nonce)
            .unwrap();
        assert_eq!(plain, DecryptedWager { outcome: 1, amount: 77 });

        // The default network cipher does not read it.
        let keystream = NetworkKeypair::from_bytes([11; 32]);
        let misread =
            keystream.decrypt_wager(&wager.ciphertext, &wager.ephemeral_public_key, &wager.nonce);
        assert_ne!(misread.ok(), Some(plain));
    }

    #[test]
    fn zero_network_key_is_rejected() {
        assert!(matches!(
            CryptoSession::new([0; 32]),
            Err(CryptoError::InvalidNetworkKey)
        ));
    }

    #[test]
    fn nonce_is_read_little_endian() {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[0] = 1;
        let wager = EncryptedWager {
            ciphertext: vec![0; ENCRYPTED_BET_SIZE],
            ephemeral_public_key: [0; 32],
            nonce,
            deposit_amount: 1,
        };
        assert_eq!(wager.nonce_u128(), 1);
    }
}
