//! The mesh root CA and per-marble leaf issuance.

use crate::errors::TlsManagerError;
use parking_lot::RwLock;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, KeyUsagePurpose,
};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use x509_parser::pem::parse_x509_pem;

const CA_VALIDITY_YEARS: i64 = 10;
const LEAF_VALIDITY_YEARS: i64 = 1;

/// Why a certificate was removed from the issued-cert table. Informational only —
/// never exposed on the wire — but useful to have named in logs when diagnosing an
/// unexpected TLS failure after a marble cycles.
#[derive(Debug, Clone, Copy)]
pub enum RevocationReason {
    Deactivated,
    Expired,
    Replaced,
}

struct IssuedCert {
    cert_pem: String,
    key_pem: String,
}

/// Self-signed P-256 root, `MaxPathLen=1`, 10-year validity. Its private key is
/// mutated only at initialize/recover time; every other access is a read under
/// this struct's own lock, following the outer-Coordinator/inner-manager lock
/// order.
pub struct MeshCa {
    cert_pem: String,
    key_pair: KeyPair,
    issued: RwLock<BTreeMap<String, IssuedCert>>,
}

impl MeshCa {
    /// Generate a fresh root CA (fresh-start path of the Coordinator's startup).
    pub fn generate() -> Result<Self, TlsManagerError> {
        let key_pair = KeyPair::generate().map_err(|e| TlsManagerError::Generation(e.to_string()))?;
        let mut params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| TlsManagerError::Generation(e.to_string()))?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "mesh-coordinator-ca");
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params.not_before = rcgen::date_time_ymd(1975, 1, 1);
        params.not_after = params
            .not_before
            .checked_add(time::Duration::days(365 * CA_VALIDITY_YEARS))
            .unwrap_or(params.not_before);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| TlsManagerError::Generation(e.to_string()))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pair,
            issued: RwLock::new(BTreeMap::new()),
        })
    }

    /// Reload a CA that was previously unsealed (recovery path of the
    /// Coordinator's startup): the key material is loaded, not regenerated, so previously
    /// issued leaves remain valid against it. `cert_pem` is parsed as X.509 before
    /// being accepted, so a truncated or corrupted sealed blob fails here with a
    /// clear error instead of surfacing later as an opaque `rcgen` issuer failure.
    pub fn from_components(cert_pem: &str, key_pem: &str) -> Result<Self, TlsManagerError> {
        let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| TlsManagerError::CaLoad(format!("CA certificate is not a valid PEM block: {e}")))?;
        pem.parse_x509()
            .map_err(|e| TlsManagerError::CaLoad(format!("CA certificate is not a valid X.509 certificate: {e}")))?;

        let key_pair = KeyPair::from_pem(key_pem).map_err(|e| TlsManagerError::CaLoad(e.to_string()))?;
        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pair,
            issued: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn root_cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> String {
        self.key_pair.serialize_pem()
    }

    /// Issue a 1-year leaf for `marble_name`/`uuid`, signed by this CA.
    ///
    /// Subsequent calls for a UUID that already has a record return the prior
    /// issuance instead of minting a new certificate.
    pub fn issue(&self, marble_name: &str, uuid: &str) -> Result<(String, String, String), TlsManagerError> {
        if let Some(existing) = self.issued.read().get(uuid) {
            return Ok((existing.cert_pem.clone(), existing.key_pem.clone(), self.cert_pem.clone()));
        }

        let leaf_key = KeyPair::generate().map_err(|e| TlsManagerError::Generation(e.to_string()))?;
        let sans = vec![
            marble_name.to_string(),
            uuid.to_string(),
            format!("{marble_name}.service-layer.local"),
        ];
        let mut params =
            CertificateParams::new(sans).map_err(|e| TlsManagerError::Generation(e.to_string()))?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, marble_name);
        params.distinguished_name = dn;
        params.serial_number = Some(rcgen::SerialNumber::from(current_nanos()));
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
        params.not_before = rcgen::date_time_ymd(1975, 1, 1);
        params.not_after = params
            .not_before
            .checked_add(time::Duration::days(365 * LEAF_VALIDITY_YEARS))
            .unwrap_or(params.not_before);

        let ca_params = self.as_issuer_params()?;
        let issuer = rcgen::Issuer::new(ca_params, &self.key_pair);
        let cert = params
            .signed_by(&leaf_key, &issuer)
            .map_err(|e| TlsManagerError::Generation(e.to_string()))?;

        let cert_pem = cert.pem();
        let key_pem = leaf_key.serialize_pem();

        self.issued.write().insert(
            uuid.to_string(),
            IssuedCert {
                cert_pem: cert_pem.clone(),
                key_pem: key_pem.clone(),
            },
        );

        tracing::debug!(marble = marble_name, uuid, "issued leaf certificate");
        Ok((cert_pem, key_pem, self.cert_pem.clone()))
    }

    pub fn revoke(&self, uuid: &str, reason: RevocationReason) {
        let removed = self.issued.write().remove(uuid);
        if removed.is_some() {
            tracing::debug!(uuid, reason = ?reason, "revoked leaf certificate");
        }
    }

    fn as_issuer_params(&self) -> Result<CertificateParams, TlsManagerError> {
        CertificateParams::from_ca_cert_pem(&self.cert_pem).map_err(|e| TlsManagerError::Generation(e.to_string()))
    }
}

fn current_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_reissue_is_idempotent() {
        let ca = MeshCa::generate().unwrap();
        let (cert1, key1, _) = ca.issue("web", "uuid-1").unwrap();
        let (cert2, key2, _) = ca.issue("web", "uuid-1").unwrap();
        assert_eq!(cert1, cert2);
        assert_eq!(key1, key2);
    }

    #[test]
    fn revoke_forgets_issuance() {
        let ca = MeshCa::generate().unwrap();
        ca.issue("web", "uuid-1").unwrap();
        ca.revoke("uuid-1", RevocationReason::Deactivated);
        assert!(ca.issued.read().get("uuid-1").is_none());
    }

    #[test]
    fn from_components_roundtrips_a_freshly_generated_ca() {
        let ca = MeshCa::generate().unwrap();
        let reloaded = MeshCa::from_components(ca.root_cert_pem(), &ca.key_pem()).unwrap();
        assert_eq!(reloaded.root_cert_pem(), ca.root_cert_pem());
    }

    #[test]
    fn from_components_rejects_a_corrupted_cert_pem() {
        let ca = MeshCa::generate().unwrap();
        let corrupted = ca.root_cert_pem().replace("MII", "xxx");
        assert!(MeshCa::from_components(&corrupted, &ca.key_pem()).is_err());
    }
}
