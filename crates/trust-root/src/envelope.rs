//! Sealed blob wire format.
//!
//! New writes always use the self-describing format: `[version=1][policy][12-byte
//! nonce][AES-256-GCM ciphertext+tag]`. Blobs written by a legacy XOR scheme
//! (`[policy][32-byte key echo][XOR ciphertext]`, no version byte and no
//! authentication) are still accepted on read so that upgrading a deployment
//! doesn't strand old sealed state.

use crate::errors::TrustRootError;
use crate::seal::SealPolicy;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

const CURRENT_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const LEGACY_KEY_ECHO_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SealedBlobError {
    #[error("sealed blob is too short to contain a valid header")]
    TooShort,
    #[error("unknown seal policy byte: {0}")]
    UnknownPolicy(u8),
}

impl From<SealedBlobError> for TrustRootError {
    fn from(err: SealedBlobError) -> Self {
        TrustRootError::MalformedSealedBlob(err.to_string())
    }
}

/// A blob sealed in the current (AES-256-GCM) format. Legacy blobs are opened
/// read-only by [`SealedBlob::decode_and_open`] and never round-tripped back
/// into this type — they're re-sealed as `Current` the next time the caller
/// seals anything.
pub struct SealedBlob {
    policy: SealPolicy,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Seal `plaintext` under `key` using the current (AES-256-GCM) format.
    pub(crate) fn seal(
        policy: SealPolicy,
        key: &[u8; 32],
        plaintext: &[u8],
    ) -> Result<Self, TrustRootError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| TrustRootError::Crypto(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| TrustRootError::Crypto(e.to_string()))?;

        Ok(Self { policy, nonce, ciphertext })
    }

    pub fn policy(&self) -> SealPolicy {
        self.policy
    }

    /// Encode to the wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + NONCE_LEN + self.ciphertext.len());
        out.push(CURRENT_VERSION);
        out.push(self.policy.to_byte());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode and open a sealed blob, trying the current format first and
    /// falling back to the legacy format on failure.
    ///
    /// The two formats can't be told apart by their first byte alone: a legacy
    /// blob sealed under `SealPolicy::Product` (byte value 1) has the exact same
    /// first byte as `CURRENT_VERSION`. `key_for_policy` is called once per
    /// attempted policy interpretation so both readings can be tried against
    /// their own derived key; the current-format reading is only accepted once
    /// its AEAD tag actually verifies, never on the version byte alone.
    pub(crate) fn decode_and_open(
        sealed: &[u8],
        key_for_policy: impl Fn(SealPolicy) -> [u8; 32],
    ) -> Result<Vec<u8>, TrustRootError> {
        if sealed.is_empty() {
            return Err(SealedBlobError::TooShort.into());
        }

        if sealed[0] == CURRENT_VERSION && sealed.len() >= 2 + NONCE_LEN {
            if let Some(policy) = SealPolicy::from_byte(sealed[1]) {
                let nonce = Nonce::from_slice(&sealed[2..2 + NONCE_LEN]);
                let ciphertext = &sealed[2 + NONCE_LEN..];
                let key = key_for_policy(policy);
                if let Ok(cipher) = Aes256Gcm::new_from_slice(&key) {
                    if let Ok(plaintext) = cipher.decrypt(nonce, ciphertext) {
                        return Ok(plaintext);
                    }
                }
            }
        }

        // Either the version byte didn't match, or the current-format reading
        // failed to authenticate — fall back to the legacy format, where byte 0
        // is the policy directly (no version byte, no authentication).
        tracing::warn!("reading legacy XOR-sealed blob; this format is read-only and will be rewritten on next seal");
        let policy = SealPolicy::from_byte(sealed[0]).ok_or(SealedBlobError::UnknownPolicy(sealed[0]))?;
        if sealed.len() < 1 + LEGACY_KEY_ECHO_LEN {
            return Err(SealedBlobError::TooShort.into());
        }
        let key_echo = &sealed[1..1 + LEGACY_KEY_ECHO_LEN];
        let ciphertext = &sealed[1 + LEGACY_KEY_ECHO_LEN..];
        let key = key_for_policy(policy);
        if key_echo != &key[..LEGACY_KEY_ECHO_LEN] {
            return Err(TrustRootError::UnsealAuthenticationFailed);
        }
        Ok(ciphertext
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()])
            .collect())
    }
}
