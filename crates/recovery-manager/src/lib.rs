//! Multi-holder recovery of the sealing key via replicated RSA-OAEP shares.
//!
//! This is proof-of-possession, not secret-sharing: the sealing key is encrypted
//! whole under every holder's public key, and recovery succeeds once enough
//! holders have independently decrypted their copy and it agrees byte-for-byte.

mod errors;

pub use errors::RecoveryManagerError;

use parking_lot::RwLock;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use std::collections::BTreeMap;
use zeroize::Zeroizing;

const OAEP_LABEL: &str = "neo-service-layer-recovery";

struct State {
    keys: BTreeMap<String, RsaPublicKey>,
    threshold: usize,
    shares: BTreeMap<String, Vec<u8>>,
}

pub struct RecoveryManager {
    state: RwLock<State>,
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                keys: BTreeMap::new(),
                threshold: 0,
                shares: BTreeMap::new(),
            }),
        }
    }

    /// Parse and store each holder's RSA public key, rejecting a threshold that
    /// could never be met.
    pub fn set_recovery_keys(
        &self,
        keys_pem: &BTreeMap<String, String>,
        threshold: usize,
    ) -> Result<(), RecoveryManagerError> {
        if threshold > keys_pem.len() {
            return Err(RecoveryManagerError::ThresholdExceedsKeys {
                threshold,
                key_count: keys_pem.len(),
            });
        }

        let mut parsed = BTreeMap::new();
        for (name, pem_str) in keys_pem {
            let key = RsaPublicKey::from_public_key_pem(pem_str)
                .map_err(|e| RecoveryManagerError::InvalidPublicKey(name.clone(), e.to_string()))?;
            parsed.insert(name.clone(), key);
        }

        let mut state = self.state.write();
        state.keys = parsed;
        state.threshold = threshold;
        state.shares.clear();
        Ok(())
    }

    /// Encrypt `sealing_key` under every holder's public key.
    pub fn generate_recovery_data(&self, sealing_key: &[u8]) -> Result<(), RecoveryManagerError> {
        let mut state = self.state.write();
        let mut shares = BTreeMap::new();
        for (name, key) in &state.keys {
            let mut rng = rand::thread_rng();
            let padding = Oaep::new_with_label::<Sha256, _>(OAEP_LABEL);
            let ciphertext = key
                .encrypt(&mut rng, padding, sealing_key)
                .map_err(|e| RecoveryManagerError::Crypto(e.to_string()))?;
            shares.insert(name.clone(), ciphertext);
        }
        state.shares = shares;
        tracing::debug!(holders = state.keys.len(), "generated recovery data");
        Ok(())
    }

    /// Reload a previously generated key set and share table from persisted
    /// recovery data, without re-encrypting — used when a process restarts and
    /// needs `get_recovery_data`/`recover` to work before (or without ever)
    /// unsealing state, since recovery data must survive independently of the
    /// sealed blob it recovers.
    pub fn restore(
        &self,
        keys_pem: &BTreeMap<String, String>,
        threshold: usize,
        shares: BTreeMap<String, Vec<u8>>,
    ) -> Result<(), RecoveryManagerError> {
        let mut parsed = BTreeMap::new();
        for (name, pem_str) in keys_pem {
            let key = RsaPublicKey::from_public_key_pem(pem_str)
                .map_err(|e| RecoveryManagerError::InvalidPublicKey(name.clone(), e.to_string()))?;
            parsed.insert(name.clone(), key);
        }
        let mut state = self.state.write();
        state.keys = parsed;
        state.threshold = threshold;
        state.shares = shares;
        Ok(())
    }

    pub fn get_recovery_data(&self, holder_name: &str) -> Result<Vec<u8>, RecoveryManagerError> {
        let state = self.state.read();
        state
            .shares
            .get(holder_name)
            .cloned()
            .ok_or_else(|| RecoveryManagerError::NoRecoveryData(holder_name.to_string()))
    }

    /// Every currently held share, keyed by holder name — used only to persist
    /// recovery data alongside the manifest's recovery key PEMs.
    pub fn export_shares(&self) -> BTreeMap<String, Vec<u8>> {
        self.state.read().shares.clone()
    }

    /// Recover the sealing key from holder-decrypted shares.
    ///
    /// Callers present the *decrypted* bytes for each holder (decryption happens
    /// off-line, with the holder's own private key — this process never sees a
    /// holder's private key). Every share must agree with the first; disagreement
    /// means at least one holder decrypted a stale or tampered envelope. Each
    /// presented share *is* a full copy of the sealing key, so the reconstructed
    /// value is returned wrapped in [`Zeroizing`] — the most sensitive secret in
    /// the system should never outlive its last use as a bare `Vec<u8>`.
    pub fn recover(&self, shares: &BTreeMap<String, Vec<u8>>) -> Result<Zeroizing<Vec<u8>>, RecoveryManagerError> {
        let state = self.state.read();

        if shares.len() < state.threshold {
            return Err(RecoveryManagerError::BelowThreshold {
                presented: shares.len(),
                threshold: state.threshold,
            });
        }

        for holder in shares.keys() {
            if !state.keys.contains_key(holder) {
                return Err(RecoveryManagerError::UnknownHolder(holder.clone()));
            }
        }

        let mut values = shares.values();
        let Some(first) = values.next() else {
            return Err(RecoveryManagerError::BelowThreshold {
                presented: 0,
                threshold: state.threshold,
            });
        };
        if values.any(|v| v != first) {
            return Err(RecoveryManagerError::ShareMismatch);
        }

        tracing::info!(holders = shares.len(), "sealing key recovered");
        Ok(Zeroizing::new(first.clone()))
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}
