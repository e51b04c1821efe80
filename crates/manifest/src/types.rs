use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level manifest document: an immutable configuration object loaded
/// exactly once per Coordinator generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,
    #[serde(default)]
    pub marbles: BTreeMap<String, Marble>,
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretDefinition>,
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub roles: BTreeMap<String, Role>,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub recovery_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub recovery_threshold: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub unique_id: Option<[u8; 32]>,
    #[serde(default)]
    pub signer_id: Option<[u8; 32]>,
    #[serde(default)]
    pub product_id: u16,
    #[serde(default)]
    pub security_version: u16,
    #[serde(default)]
    pub accepted_tcb_statuses: Vec<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Marble {
    pub package: String,
    #[serde(default)]
    pub max_activations: u32,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub tls: MarbleTls,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarbleTls {
    #[serde(default)]
    pub incoming: Vec<String>,
    #[serde(default)]
    pub outgoing: Vec<String>,
}

impl Marble {
    pub fn declares_tls(&self) -> bool {
        !self.tls.incoming.is_empty() || !self.tls.outgoing.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    Symmetric,
    CertRsa,
    CertEcdsa,
    CertEd25519,
    Plain,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertConfig {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub is_ca: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretDefinition {
    #[serde(rename = "type")]
    pub kind: SecretType,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub user_defined: bool,
    #[serde(default)]
    pub cert_config: Option<CertConfig>,
    #[serde(default)]
    pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub certificate: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub resource_type: String,
    #[serde(default)]
    pub resource_names: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub incoming: BTreeMap<String, Vec<TlsPolicy>>,
    #[serde(default)]
    pub outgoing: BTreeMap<String, Vec<TlsPolicy>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsPolicy {
    pub port: String,
    #[serde(default)]
    pub allowed_marbles: Vec<String>,
}

impl Manifest {
    /// Secrets visible to `marble`: the marble's own parameter references, plus
    /// every secret whose `shared_with` names the marble.
    ///
    /// `shared_with` is additive only — it can never narrow a secret that the
    /// marble already references through its own parameters.
    pub fn secrets_visible_to(&self, marble_name: &str, marble: &Marble) -> Vec<String> {
        let mut names: Vec<String> = self
            .secrets
            .iter()
            .filter(|(_, def)| def.shared_with.iter().any(|m| m == marble_name))
            .map(|(name, _)| name.clone())
            .collect();

        for value in marble.parameters.env.values().chain(marble.parameters.files.values()) {
            for reference in extract_placeholder_names(value) {
                if !names.contains(&reference) {
                    names.push(reference);
                }
            }
        }
        names
    }
}

/// Extract every secret name referenced by `{{ .Secrets.X }}` or
/// `{{ raw .Secrets.X }}` placeholders in `text`.
pub fn extract_placeholder_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let Some(end_rel) = rest[start..].find("}}") else {
            break;
        };
        let inner = rest[start + 2..start + end_rel].trim();
        let inner = inner.strip_prefix("raw").map(str::trim_start).unwrap_or(inner);
        if let Some(name) = inner.strip_prefix(".Secrets.") {
            let name = name.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        rest = &rest[start + end_rel + 2..];
    }
    names
}
