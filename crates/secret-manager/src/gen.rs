//! Key and certificate generation for each secret type.

use crate::errors::SecretManagerError;
use crate::value::SecretValue;
use manifest::{CertConfig, SecretDefinition, SecretType};
use rand::RngCore;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rsa::pkcs8::EncodePrivateKey;

const DEFAULT_SYMMETRIC_BITS: u32 = 256;
const DEFAULT_VALIDITY_DAYS: u32 = 365;

pub fn generate(name: &str, definition: &SecretDefinition) -> Result<SecretValue, SecretManagerError> {
    match definition.kind {
        SecretType::Symmetric => generate_symmetric(name, definition),
        SecretType::CertRsa => generate_cert_rsa(name, definition),
        SecretType::CertEcdsa => generate_cert_ecdsa(name, definition),
        SecretType::CertEd25519 => generate_cert_ed25519(name, definition),
        SecretType::Plain => {
            if !definition.user_defined {
                return Err(SecretManagerError::InvalidDefinition {
                    name: name.to_string(),
                    reason: "plain secrets require user_defined = true".to_string(),
                });
            }
            Ok(SecretValue::plain(Vec::new()))
        }
    }
}

fn generate_symmetric(name: &str, definition: &SecretDefinition) -> Result<SecretValue, SecretManagerError> {
    let bits = definition.size.unwrap_or(DEFAULT_SYMMETRIC_BITS);
    let byte_len = ((bits as usize) + 7) / 8;
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    tracing::debug!(secret = name, bits, "generated symmetric secret");
    Ok(SecretValue::symmetric(bytes))
}

fn generate_cert_ecdsa(name: &str, definition: &SecretDefinition) -> Result<SecretValue, SecretManagerError> {
    let key_pair = KeyPair::generate().map_err(|e| gen_error(name, e))?;
    build_self_signed(name, definition, key_pair)
}

fn generate_cert_ed25519(name: &str, definition: &SecretDefinition) -> Result<SecretValue, SecretManagerError> {
    let key_pair = KeyPair::generate_for(&rcgen::PKCS_ED25519).map_err(|e| gen_error(name, e))?;
    build_self_signed(name, definition, key_pair)
}

fn generate_cert_rsa(name: &str, definition: &SecretDefinition) -> Result<SecretValue, SecretManagerError> {
    let mut rng = rand::thread_rng();
    let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).map_err(|e| gen_error(name, e))?;
    let pkcs8_der = private_key
        .to_pkcs8_der()
        .map_err(|e| gen_error(name, e))?;
    let key_pair = KeyPair::from_pkcs8_der_and_sign_algo(pkcs8_der.as_bytes(), &rcgen::PKCS_RSA_SHA256)
        .map_err(|e| gen_error(name, e))?;
    build_self_signed(name, definition, key_pair)
}

fn build_self_signed(
    name: &str,
    definition: &SecretDefinition,
    key_pair: KeyPair,
) -> Result<SecretValue, SecretManagerError> {
    let cert_config = definition.cert_config.clone().unwrap_or_default();
    let params = self_signed_params(name, &cert_config)?;
    let cert = params.self_signed(&key_pair).map_err(|e| gen_error(name, e))?;

    let cert_pem = cert.pem();
    let key_pem = key_pair.serialize_pem();

    tracing::debug!(secret = name, "generated self-signed certificate");
    Ok(SecretValue::certificate(cert_pem, key_pem))
}

fn self_signed_params(name: &str, cert_config: &CertConfig) -> Result<CertificateParams, SecretManagerError> {
    let subject = if cert_config.subject.is_empty() {
        name.to_string()
    } else {
        cert_config.subject.clone()
    };

    let mut params = CertificateParams::new(vec![subject.clone()]).map_err(|e| gen_error(name, e))?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject);
    params.distinguished_name = dn;

    let validity_days = cert_config.validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS);
    params.not_before = rcgen::date_time_ymd(1975, 1, 1);
    params.not_after = params
        .not_before
        .checked_add(time::Duration::days(validity_days as i64))
        .unwrap_or(params.not_before);

    if cert_config.is_ca {
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    }
    params.key_usages = vec![
        rcgen::KeyUsagePurpose::DigitalSignature,
        rcgen::KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        rcgen::ExtendedKeyUsagePurpose::ServerAuth,
        rcgen::ExtendedKeyUsagePurpose::ClientAuth,
    ];

    Ok(params)
}

fn gen_error(name: &str, err: impl std::fmt::Display) -> SecretManagerError {
    SecretManagerError::Generation {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
