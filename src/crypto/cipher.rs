use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Size of one encrypted field element.
pub const BLOCK_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 16;

const KEY_LABEL: &[u8] = b"darkpool/wager-cipher/v1";

/// Field cipher keyed by an x25519 shared secret.
///
/// The compute network decides which cipher it speaks; bettors and the
/// network must use the same one. Every implementation maps each `u64`
/// element to exactly one `BLOCK_SIZE` ciphertext block, so wager and pool
/// state layouts do not depend on the choice.
pub trait WagerCipher: Sized {
    fn from_shared_secret(shared_secret: &[u8; 32]) -> Result<Self, CryptoError>;

    fn encrypt(
        &self,
        plaintext: &[u64],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u64>, CryptoError>;
}

/// The local network's cipher.
///
/// Each plaintext element is a `u64` laid out little-endian in a zero-padded
/// 32-byte block and XORed with keystream block `i`, where block `i` is
/// `HMAC(key, nonce || i)`.
#[derive(Clone)]
pub struct HmacKeystreamCipher {
    key: [u8; 32],
}

impl HmacKeystreamCipher {
    fn keystream_block(
        &self,
        nonce: &[u8; NONCE_SIZE],
        index: u64,
    ) -> Result<[u8; BLOCK_SIZE], CryptoError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|e| CryptoError::Mac(e.to_string()))?;
        mac.update(nonce);
        mac.update(&index.to_le_bytes());
        Ok(mac.finalize().into_bytes().into())
    }
}

impl WagerCipher for HmacKeystreamCipher {
    fn from_shared_secret(shared_secret: &[u8; 32]) -> Result<Self, CryptoError> {
        let mut mac = HmacSha256::new_from_slice(KEY_LABEL)
            .map_err(|e| CryptoError::Mac(e.to_string()))?;
        mac.update(shared_secret);
        Ok(Self {
            key: mac.finalize().into_bytes().into(),
        })
    }

    fn encrypt(
        &self,
        plaintext: &[u64],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut out = Vec::with_capacity(plaintext.len() * BLOCK_SIZE);
        for (i, value) in plaintext.iter().enumerate() {
            let mut block = [0u8; BLOCK_SIZE];
            block[..8].copy_from_slice(&value.to_le_bytes());
            let stream = self.keystream_block(nonce, i as u64)?;
            for (b, k) in block.iter_mut().zip(stream.iter()) {
                *b ^= k;
            }
            out.extend_from_slice(&block);
        }
        Ok(out)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u64>, CryptoError> {
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::CiphertextLength {
                expected: ciphertext.len().next_multiple_of(BLOCK_SIZE),
                actual: ciphertext.len(),
            });
        }
        let mut values = Vec::with_capacity(ciphertext.len() / BLOCK_SIZE);
        for (i, chunk) in ciphertext.chunks_exact(BLOCK_SIZE).enumerate() {
            let stream = self.keystream_block(nonce, i as u64)?;
            let mut block = [0u8; BLOCK_SIZE];
            for ((b, c), k) in block.iter_mut().zip(chunk).zip(stream.iter()) {
                *b = c ^ k;
            }
            if block[8..].iter().any(|b| *b != 0) {
                return Err(CryptoError::MalformedPlaintext);
            }
            let mut le = [0u8; 8];
            le.copy_from_slice(&block[..8]);
            values.push(u64::from_le_bytes(le));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(seed: u8) -> HmacKeystreamCipher {
        HmacKeystreamCipher::from_shared_secret(&[seed; 32]).unwrap()
    }

    #[test]
    fn blocks_are_fixed_size() {
        let ct = cipher(1).encrypt(&[1, 100], &[0; NONCE_SIZE]).unwrap();
        assert_eq!(ct.len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn nonce_changes_ciphertext() {
        let c = cipher(1);
        let a = c.encrypt(&[1, 100], &[0; NONCE_SIZE]).unwrap();
        let b = c.encrypt(&[1, 100], &[1; NONCE_SIZE]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_is_detected_as_malformed() {
        let nonce = [3; NONCE_SIZE];
        let ct = cipher(1).encrypt(&[1, 100], &nonce).unwrap();
        let err = cipher(2).decrypt(&ct, &nonce).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedPlaintext));
    }

    #[test]
    fn ragged_ciphertext_is_rejected() {
        let err = cipher(1).decrypt(&[0; 40], &[0; NONCE_SIZE]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::CiphertextLength {
                expected: 64,
                actual: 40
            }
        ));
    }
}
