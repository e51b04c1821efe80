//! Seal key derivation.

use crate::identity::Identity;
use hkdf::Hkdf;
use sha2::Sha256;

/// Which measurement a sealed blob is bound to.
///
/// `Unique` binds to this exact build (`unique_id`); only an identical binary can
/// unseal the blob. `Product` binds to the signer/product family instead, so a
/// later build from the same signer with the same `product_id` can still unseal
/// data written by an older build — the standard "allow upgrades" policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SealPolicy {
    Unique,
    Product,
}

impl SealPolicy {
    pub(crate) fn tag(self) -> &'static [u8] {
        match self {
            SealPolicy::Unique => b"seal:unique",
            SealPolicy::Product => b"seal:product",
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            SealPolicy::Unique => 0,
            SealPolicy::Product => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SealPolicy::Unique),
            1 => Some(SealPolicy::Product),
            _ => None,
        }
    }
}

/// Derive a 256-bit sealing key from the process seal key, the policy, and the
/// identity material the policy binds to, via HKDF-SHA256.
pub(crate) fn derive_seal_key(seal_key: &[u8; 32], identity: &Identity, policy: SealPolicy) -> [u8; 32] {
    let binding: &[u8] = match policy {
        SealPolicy::Unique => &identity.unique_id,
        SealPolicy::Product => &identity.signer_id,
    };

    let hk = Hkdf::<Sha256>::new(Some(policy.tag()), seal_key);
    let mut info = Vec::with_capacity(binding.len() + 2);
    info.extend_from_slice(binding);
    if policy == SealPolicy::Product {
        info.extend_from_slice(&identity.product_id.to_le_bytes());
    }

    let mut out = [0u8; 32];
    hk.expand(&info, &mut out).expect("32-byte output is valid for HKDF-SHA256");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            unique_id: [1u8; 32],
            signer_id: [2u8; 32],
            product_id: 9,
            security_version: 1,
            in_enclave: false,
            simulation: true,
        }
    }

    #[test]
    fn different_policies_derive_different_keys() {
        let identity = identity();
        let seal_key = [3u8; 32];
        let unique = derive_seal_key(&seal_key, &identity, SealPolicy::Unique);
        let product = derive_seal_key(&seal_key, &identity, SealPolicy::Product);
        assert_ne!(unique, product);
    }

    #[test]
    fn same_inputs_are_deterministic() {
        let identity = identity();
        let seal_key = [3u8; 32];
        let a = derive_seal_key(&seal_key, &identity, SealPolicy::Unique);
        let b = derive_seal_key(&seal_key, &identity, SealPolicy::Unique);
        assert_eq!(a, b);
    }
}
