//! The simulation quote envelope.
//!
//! Byte layout is fixed so that simulated deployments stay interoperable across
//! implementations; real hardware quotes are opaque to this crate and would
//! arrive through a different decode path entirely.

use crate::identity::{Report, TcbStatus};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const MAGIC: &[u8; 12] = b"SGX_QUOTE_V3";
const VERSION: u16 = 3;
/// Documented Intel QE vendor ID constant carried in the simulated envelope header.
const QE_VENDOR_ID: [u8; 16] = [
    0x93, 0x9A, 0x72, 0x33, 0xF7, 0x9C, 0x4C, 0xA9, 0x94, 0x0A, 0x0D, 0xB3, 0x95, 0x7F, 0x06, 0x07,
];
const QUOTE_LEN: usize = 234;
const TAG_LEN: usize = 32;

/// A quote whose envelope and (where pinned) measurement fields have already been
/// checked by [`crate::TrustRoot::verify_quote`]. Only constructible inside this
/// crate, giving callers a type-level guarantee that they aren't acting on
/// unverified evidence.
#[derive(Debug, Clone)]
pub struct VerifiedQuote {
    report: Report,
}

impl VerifiedQuote {
    pub(crate) fn new(report: Report) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn unique_id(&self) -> &[u8; 32] {
        &self.report.unique_id
    }

    pub fn signer_id(&self) -> &[u8; 32] {
        &self.report.signer_id
    }

    pub fn product_id(&self) -> u16 {
        self.report.product_id
    }

    pub fn security_version(&self) -> u16 {
        self.report.security_version
    }

    pub fn tcb_status(&self) -> TcbStatus {
        self.report.tcb_status
    }
}

/// A structured field-level verification failure: every caller-facing
/// quote rejection names the field, what was expected, and what was seen.
#[derive(Debug, thiserror::Error)]
#[error("quote verification failed: field={field} expected={expected} actual={actual}")]
pub struct QuoteVerificationError {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl QuoteVerificationError {
    pub fn mismatch(field: &str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub(crate) fn encode_simulation_quote(report: &Report, seal_key: &[u8; 32]) -> Vec<u8> {
    let mut buf = vec![0u8; QUOTE_LEN];

    buf[0..12].copy_from_slice(MAGIC);
    buf[12..14].copy_from_slice(&VERSION.to_le_bytes());
    buf[14..16].copy_from_slice(&0u16.to_le_bytes()); // attestation-key type
    buf[16..20].copy_from_slice(&[0u8; 4]); // reserved
    buf[20..22].copy_from_slice(&0u16.to_le_bytes()); // QE SVN
    buf[22..24].copy_from_slice(&0u16.to_le_bytes()); // PCE SVN
    buf[24..40].copy_from_slice(&QE_VENDOR_ID);

    let data_hash = sha2::Sha256::digest(report.data);
    buf[40..60].copy_from_slice(&data_hash[..20]);

    buf[60..92].copy_from_slice(&report.unique_id);
    buf[92..124].copy_from_slice(&report.signer_id);
    buf[124..126].copy_from_slice(&report.product_id.to_le_bytes());
    buf[126..128].copy_from_slice(&report.security_version.to_le_bytes());
    buf[128..192].copy_from_slice(&report.data);
    buf[192..200].copy_from_slice(&report.timestamp.to_le_bytes());
    buf[200] = report.tcb_status.to_byte();
    buf[201] = report.debug as u8;

    let tag = compute_tag(&buf[..202], seal_key);
    buf[202..234].copy_from_slice(&tag);

    buf
}

pub(crate) fn decode_simulation_quote(
    quote: &[u8],
    seal_key: &[u8; 32],
) -> Result<Report, QuoteVerificationError> {
    if quote.len() != QUOTE_LEN {
        return Err(QuoteVerificationError::mismatch(
            "Length",
            QUOTE_LEN.to_string(),
            quote.len().to_string(),
        ));
    }
    if &quote[0..12] != MAGIC {
        return Err(QuoteVerificationError::mismatch(
            "Magic",
            String::from_utf8_lossy(MAGIC).to_string(),
            String::from_utf8_lossy(&quote[0..12]).to_string(),
        ));
    }
    let version = u16::from_le_bytes([quote[12], quote[13]]);
    if version != VERSION {
        return Err(QuoteVerificationError::mismatch(
            "Version",
            VERSION.to_string(),
            version.to_string(),
        ));
    }

    let expected_tag = compute_tag(&quote[..202], seal_key);
    let actual_tag = &quote[202..234];
    if !constant_time_eq(&expected_tag, actual_tag) {
        return Err(QuoteVerificationError::mismatch(
            "IntegrityTag",
            hex::encode(expected_tag),
            hex::encode(actual_tag),
        ));
    }

    let mut unique_id = [0u8; 32];
    unique_id.copy_from_slice(&quote[60..92]);
    let mut signer_id = [0u8; 32];
    signer_id.copy_from_slice(&quote[92..124]);
    let mut data = [0u8; 64];
    data.copy_from_slice(&quote[128..192]);

    Ok(Report {
        data,
        unique_id,
        signer_id,
        product_id: u16::from_le_bytes([quote[124], quote[125]]),
        security_version: u16::from_le_bytes([quote[126], quote[127]]),
        debug: quote[201] != 0,
        tcb_status: TcbStatus::from_byte(quote[200]),
        timestamp: u64::from_le_bytes(quote[192..200].try_into().unwrap()),
    })
}

fn compute_tag(prefix: &[u8], seal_key: &[u8; 32]) -> [u8; TAG_LEN] {
    let mut mac = HmacSha256::new_from_slice(seal_key).expect("hmac accepts any key length");
    mac.update(prefix);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&result);
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::build_report;

    fn sample_identity() -> crate::Identity {
        crate::Identity {
            unique_id: [1u8; 32],
            signer_id: [2u8; 32],
            product_id: 7,
            security_version: 3,
            in_enclave: false,
            simulation: true,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let identity = sample_identity();
        let report = build_report(&identity, [0u8; 64]);
        let key = [5u8; 32];
        let quote = encode_simulation_quote(&report, &key);
        let decoded = decode_simulation_quote(&quote, &key).unwrap();
        assert_eq!(decoded.unique_id, report.unique_id);
        assert_eq!(decoded.security_version, report.security_version);
    }

    #[test]
    fn wrong_key_fails_tag_check() {
        let identity = sample_identity();
        let report = build_report(&identity, [0u8; 64]);
        let quote = encode_simulation_quote(&report, &[5u8; 32]);
        assert!(decode_simulation_quote(&quote, &[6u8; 32]).is_err());
    }
}
