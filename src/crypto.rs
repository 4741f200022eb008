//! Authenticated encryption for blobs handed to callers
//!
//! A [`BlobCrypter`] seals bytes into an opaque URL-safe string and opens it
//! again, failing on any modification. [`AesBlobCrypter`] uses AES-256-GCM
//! with a random 96-bit nonce; the crypter's label is bound as associated
//! data, so a blob sealed for one purpose never opens under another.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// AES-GCM nonce length
const NONCE_LEN: usize = 12;

/// GCM authentication tag length
const TAG_LEN: usize = 16;

/// Shortest master key accepted
const MIN_KEY_LEN: usize = 16;

/// Seal/unseal collaborator used for client state
pub trait BlobCrypter: Send + Sync {
    /// Encrypt and authenticate `plaintext`
    fn seal(&self, plaintext: &[u8]) -> Result<String>;

    /// Verify and decrypt a sealed blob
    fn unseal(&self, sealed: &str) -> Result<Vec<u8>>;
}

/// AES-256-GCM crypter
pub struct AesBlobCrypter {
    cipher: Aes256Gcm,
    label: String,
}

impl AesBlobCrypter {
    /// Derive a crypter from master key material and a purpose label
    pub fn new(master_key: &[u8], label: &str) -> Result<Self> {
        if master_key.len() < MIN_KEY_LEN {
            return Err(Error::Config(format!(
                "Crypter key must be at least {MIN_KEY_LEN} bytes, got {}",
                master_key.len()
            )));
        }

        let mut hasher = Sha256::new();
        hasher.update(b"gadget-oauth:");
        hasher.update(label.as_bytes());
        hasher.update(b":");
        hasher.update(master_key);
        let key = hasher.finalize();

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| Error::Crypto(format!("Key setup failed: {e}")))?;

        Ok(Self {
            cipher,
            label: label.to_string(),
        })
    }

    /// Generate fresh master key material, base64url encoded
    #[must_use]
    pub fn generate_key() -> String {
        let bytes: [u8; 32] = rand::rng().random();
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

impl fmt::Debug for AesBlobCrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesBlobCrypter")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl BlobCrypter for AesBlobCrypter {
    fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: self.label.as_bytes(),
                },
            )
            .map_err(|e| Error::Crypto(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn unseal(&self, sealed: &str) -> Result<Vec<u8>> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed.trim())
            .map_err(|e| Error::Crypto(format!("Invalid encoding: {e}")))?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Crypto("Sealed blob too short".to_string()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: self.label.as_bytes(),
                },
            )
            .map_err(|_| Error::Crypto("Blob failed authentication".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypter(label: &str) -> AesBlobCrypter {
        AesBlobCrypter::new(b"0123456789abcdef0123456789abcdef", label).unwrap()
    }

    #[test]
    fn seal_then_unseal() {
        let c = crypter("state");
        let sealed = c.seal(b"hello").unwrap();
        assert_eq!(c.unseal(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn sealed_output_is_url_safe_and_randomized() {
        let c = crypter("state");
        let a = c.seal(b"same").unwrap();
        let b = c.seal(b"same").unwrap();
        assert_ne!(a, b, "nonces must differ");
        for s in [&a, &b] {
            assert!(!s.contains('+') && !s.contains('/') && !s.contains('='));
        }
    }

    #[test]
    fn tampering_is_detected() {
        let c = crypter("state");
        let sealed = c.seal(b"payload").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(c.unseal(&tampered).is_err());
    }

    #[test]
    fn label_separates_purposes() {
        let sealed = crypter("state").seal(b"payload").unwrap();
        assert!(crypter("other").unseal(&sealed).is_err());
    }

    #[test]
    fn different_keys_do_not_open_each_other() {
        let a = AesBlobCrypter::new(b"aaaaaaaaaaaaaaaaaaaaaaaa", "state").unwrap();
        let b = AesBlobCrypter::new(b"bbbbbbbbbbbbbbbbbbbbbbbb", "state").unwrap();
        let sealed = a.seal(b"payload").unwrap();
        assert!(b.unseal(&sealed).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let c = crypter("state");
        assert!(c.unseal("").is_err());
        assert!(c.unseal("not base64 !!").is_err());
        assert!(c.unseal("AAAA").is_err());
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(matches!(
            AesBlobCrypter::new(b"short", "state"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn generated_keys_are_usable() {
        let key = AesBlobCrypter::generate_key();
        assert!(AesBlobCrypter::new(key.as_bytes(), "state").is_ok());
    }
}
