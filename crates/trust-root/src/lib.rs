//! Enclave identity, attestation quotes, and sealing primitives.
//!
//! This crate is the leaf of the coordinator's dependency graph: every other manager consumes a [`TrustRoot`] to generate/verify quotes or to
//! seal state, but `trust-root` depends on nothing else in this workspace.

mod envelope;
mod errors;
mod identity;
mod quote;
mod seal;

pub use envelope::{SealedBlob, SealedBlobError};
pub use errors::TrustRootError;
pub use identity::{Identity, Report, TcbStatus};
pub use quote::{QuoteVerificationError, VerifiedQuote};
pub use seal::SealPolicy;

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The root of trust for a single coordinator process.
///
/// In simulation mode (`in_enclave = false`) identity is fabricated deterministically
/// from the executable path, host, and architecture, and quotes carry a structured
/// envelope with an HMAC-like integrity tag instead of real SGX/TDX evidence. Callers
/// never need to branch on this: [`TrustRoot::generate_quote`] and
/// [`TrustRoot::verify_quote`] have the same contract either way.
pub struct TrustRoot {
    identity: Identity,
    seal_key: [u8; 32],
    report_cache: Mutex<Option<(Report, Instant)>>,
}

const REPORT_CACHE_TTL: Duration = Duration::from_secs(60);

impl TrustRoot {
    /// Build a simulated trust root, fabricating identity from process metadata.
    ///
    /// `seal_key` is the process-local secret used to derive sealing keys and to tag
    /// simulated quotes; in a real enclave deployment this would come from the
    /// platform's sealing key derivation instead of a caller-supplied buffer.
    pub fn simulated(seal_key: [u8; 32]) -> Self {
        Self {
            identity: identity::fabricate_simulated_identity(),
            seal_key,
            report_cache: Mutex::new(None),
        }
    }

    /// The coordinator's own identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The raw process seal key this trust root was built from.
    ///
    /// This is the "master sealing key" the Coordinator exclusively owns: it is
    /// what recovery reconstructs and re-derives everything else from. Callers
    /// outside the Coordinator should never see this.
    pub fn master_seal_key(&self) -> [u8; 32] {
        self.seal_key
    }

    /// Produce a self-report, refreshing the ≤60s cache if stale.
    pub fn self_report(&self, report_data: [u8; 64]) -> Report {
        let mut cache = self.report_cache.lock().expect("report cache poisoned");
        if let Some((report, at)) = cache.as_ref() {
            if at.elapsed() < REPORT_CACHE_TTL && report.data == report_data {
                return report.clone();
            }
        }
        let report = identity::build_report(&self.identity, report_data);
        *cache = Some((report.clone(), Instant::now()));
        report
    }

    /// Generate an attestation quote over up to 64 bytes of caller-supplied data.
    pub fn generate_quote(&self, report_data: &[u8]) -> Result<Vec<u8>, TrustRootError> {
        if report_data.len() > 64 {
            return Err(TrustRootError::ReportDataTooLong(report_data.len()));
        }
        let mut padded = [0u8; 64];
        padded[..report_data.len()].copy_from_slice(report_data);
        let report = self.self_report(padded);
        Ok(quote::encode_simulation_quote(&report, &self.seal_key))
    }

    /// Verify a quote, optionally pinning the expected measurement fields.
    ///
    /// Decoupled from the wire layout on purpose: every
    /// check below compares named fields, never raw byte offsets, so a real
    /// DCAP/ECDSA verifier could satisfy the same contract with a different wire
    /// format.
    pub fn verify_quote(
        &self,
        quote: &[u8],
        expected_unique_id: Option<&[u8; 32]>,
        expected_signer_id: Option<&[u8; 32]>,
    ) -> Result<VerifiedQuote, QuoteVerificationError> {
        let report = quote::decode_simulation_quote(quote, &self.seal_key)?;

        if let Some(expected) = expected_unique_id {
            if &report.unique_id != expected {
                return Err(QuoteVerificationError::mismatch(
                    "UniqueId",
                    hex::encode(expected),
                    hex::encode(report.unique_id),
                ));
            }
        }
        if let Some(expected) = expected_signer_id {
            if &report.signer_id != expected {
                return Err(QuoteVerificationError::mismatch(
                    "SignerId",
                    hex::encode(expected),
                    hex::encode(report.signer_id),
                ));
            }
        }

        Ok(VerifiedQuote::new(report))
    }

    /// Seal plaintext under the given policy. New writes are always
    /// AES-256-GCM with a random 96-bit nonce.
    pub fn seal(&self, plaintext: &[u8], policy: SealPolicy) -> Result<Vec<u8>, TrustRootError> {
        let key = seal::derive_seal_key(&self.seal_key, &self.identity, policy);
        let blob = SealedBlob::seal(policy, &key, plaintext)?;
        Ok(blob.encode())
    }

    /// Unseal a blob sealed by [`TrustRoot::seal`], or a legacy XOR blob read for
    /// migration only.
    pub fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, TrustRootError> {
        SealedBlob::decode_and_open(sealed, |policy| {
            seal::derive_seal_key(&self.seal_key, &self.identity, policy)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_quote() {
        let root = TrustRoot::simulated([7u8; 32]);
        let quote = root.generate_quote(b"hello").unwrap();
        let verified = root.verify_quote(&quote, None, None).unwrap();
        assert_eq!(&verified.report().data[..5], b"hello");
    }

    #[test]
    fn tampered_quote_fails() {
        let root = TrustRoot::simulated([7u8; 32]);
        let mut quote = root.generate_quote(b"hello").unwrap();
        let last = quote.len() - 1;
        quote[last] ^= 0xFF;
        assert!(root.verify_quote(&quote, None, None).is_err());
    }

    #[test]
    fn seal_roundtrip_every_policy() {
        let root = TrustRoot::simulated([9u8; 32]);
        for policy in [SealPolicy::Unique, SealPolicy::Product] {
            let sealed = root.seal(b"top secret state", policy).unwrap();
            let opened = root.unseal(&sealed).unwrap();
            assert_eq!(opened, b"top secret state");
        }
    }

    #[test]
    fn single_bit_mutation_breaks_unseal() {
        let root = TrustRoot::simulated([9u8; 32]);
        let mut sealed = root.seal(b"state", SealPolicy::Unique).unwrap();
        let mid = sealed.len() / 2;
        sealed[mid] ^= 0x01;
        assert!(root.unseal(&sealed).is_err());
    }

    /// A legacy blob sealed under `SealPolicy::Product` has first byte `1`, the
    /// same value as `CURRENT_VERSION` — `unseal` must still recover it rather
    /// than misparse it as a (garbage) current-format blob.
    #[test]
    fn legacy_product_policy_blob_is_not_confused_with_current_format() {
        let root = TrustRoot::simulated([11u8; 32]);
        let key = crate::seal::derive_seal_key(&root.master_seal_key(), root.identity(), SealPolicy::Product);

        let plaintext = b"legacy state";
        let ciphertext: Vec<u8> = plaintext.iter().enumerate().map(|(i, b)| b ^ key[i % key.len()]).collect();

        let mut legacy_blob = Vec::new();
        legacy_blob.push(SealPolicy::Product.to_byte());
        legacy_blob.extend_from_slice(&key[..32]);
        legacy_blob.extend_from_slice(&ciphertext);

        assert_eq!(legacy_blob[0], 1, "precondition: collides with CURRENT_VERSION");
        assert_eq!(root.unseal(&legacy_blob).unwrap(), plaintext);
    }
}
