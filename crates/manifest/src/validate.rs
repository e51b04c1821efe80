use crate::types::{Manifest, SecretType};

/// A single validation failure: the dotted path into the manifest and why it's
/// invalid. Mirrors a typed `Manifest::verify` pass that collects path+reason pairs
/// rather than failing on the first problem found, so an operator sees every issue
/// in one pass.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub fn validate(manifest: &Manifest) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, package) in &manifest.packages {
        if name.is_empty() {
            errors.push(ValidationError::new("packages", "package name must not be empty"));
        }
        if package.unique_id.is_some() && is_duplicate_unique_id(manifest, name) {
            errors.push(ValidationError::new(
                format!("packages.{name}.unique_id"),
                "package measurements (unique_id) must be unique across packages",
            ));
        }
    }

    for (name, marble) in &manifest.marbles {
        if name.is_empty() {
            errors.push(ValidationError::new("marbles", "marble name must not be empty"));
        }
        if !manifest.packages.contains_key(&marble.package) {
            errors.push(ValidationError::new(
                format!("marbles.{name}.package"),
                format!("references undeclared package '{}'", marble.package),
            ));
        }
        for value in marble.parameters.env.values().chain(marble.parameters.files.values()) {
            for referenced in crate::types::extract_placeholder_names(value) {
                if !manifest.secrets.contains_key(&referenced) {
                    errors.push(ValidationError::new(
                        format!("marbles.{name}.parameters"),
                        format!("placeholder references undeclared secret '{referenced}'"),
                    ));
                }
            }
        }
        for marble_name in marble.tls.incoming.iter().chain(marble.tls.outgoing.iter()) {
            if !manifest.marbles.contains_key(marble_name) && marble_name != "*" {
                errors.push(ValidationError::new(
                    format!("marbles.{name}.tls"),
                    format!("references unknown marble '{marble_name}'"),
                ));
            }
        }
    }

    for (name, secret) in &manifest.secrets {
        if name.is_empty() {
            errors.push(ValidationError::new("secrets", "secret name must not be empty"));
        }
        if secret.kind == SecretType::Plain && !secret.user_defined {
            errors.push(ValidationError::new(
                format!("secrets.{name}"),
                "plain secrets are only valid when user_defined = true",
            ));
        }
        for marble_name in &secret.shared_with {
            if !manifest.marbles.contains_key(marble_name) {
                errors.push(ValidationError::new(
                    format!("secrets.{name}.shared_with"),
                    format!("references unknown marble '{marble_name}'"),
                ));
            }
        }
    }

    for (name, user) in &manifest.users {
        if name.is_empty() {
            errors.push(ValidationError::new("users", "user name must not be empty"));
        }
        if let Err(reason) = parse_pem(&user.certificate) {
            errors.push(ValidationError::new(format!("users.{name}.certificate"), reason));
        }
        for role in &user.roles {
            if !manifest.roles.contains_key(role) {
                errors.push(ValidationError::new(
                    format!("users.{name}.roles"),
                    format!("references undeclared role '{role}'"),
                ));
            }
        }
    }

    for (name, tls) in manifest.tls.incoming.iter().chain(manifest.tls.outgoing.iter()) {
        for (index, policy) in tls.iter().enumerate() {
            if policy.port != "*" && policy.port.parse::<u16>().is_err() {
                errors.push(ValidationError::new(
                    format!("tls.{name}[{index}].port"),
                    format!("port must be '*' or a valid port number, got '{}'", policy.port),
                ));
            }
        }
    }

    if manifest.recovery_threshold > manifest.recovery_keys.len() {
        errors.push(ValidationError::new(
            "recovery_threshold",
            format!(
                "threshold {} exceeds the number of configured recovery keys ({})",
                manifest.recovery_threshold,
                manifest.recovery_keys.len()
            ),
        ));
    }
    for (name, pem_str) in &manifest.recovery_keys {
        if let Err(reason) = parse_pem(pem_str) {
            errors.push(ValidationError::new(format!("recovery_keys.{name}"), reason));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_duplicate_unique_id(manifest: &Manifest, excluding: &str) -> bool {
    let Some(id) = manifest.packages.get(excluding).and_then(|p| p.unique_id) else {
        return false;
    };
    manifest
        .packages
        .iter()
        .any(|(name, p)| name.as_str() != excluding && p.unique_id == Some(id))
}

fn parse_pem(text: &str) -> Result<(), String> {
    pem::parse(text.as_bytes()).map(|_| ()).map_err(|e| format!("not a parseable PEM block: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_manifest_is_valid() {
        assert!(validate(&Manifest::default()).is_ok());
    }

    #[test]
    fn marble_with_unknown_package_is_rejected() {
        let mut manifest = Manifest::default();
        manifest.marbles.insert(
            "web".into(),
            Marble {
                package: "missing".into(),
                ..Default::default()
            },
        );
        let errors = validate(&manifest).unwrap_err();
        assert!(errors.iter().any(|e| e.path == "marbles.web.package"));
    }

    #[test]
    fn recovery_threshold_above_key_count_is_rejected() {
        let mut manifest = Manifest::default();
        manifest.recovery_threshold = 2;
        manifest.recovery_keys = BTreeMap::new();
        let errors = validate(&manifest).unwrap_err();
        assert!(errors.iter().any(|e| e.path == "recovery_threshold"));
    }

    #[test]
    fn placeholder_referencing_missing_secret_is_rejected() {
        let mut manifest = Manifest::default();
        manifest.packages.insert("pkg".into(), Package::default());
        let mut marble = Marble {
            package: "pkg".into(),
            ..Default::default()
        };
        marble.parameters.env.insert("TOKEN".into(), "{{ .Secrets.api_key }}".into());
        manifest.marbles.insert("web".into(), marble);
        let errors = validate(&manifest).unwrap_err();
        assert!(errors.iter().any(|e| e.reason.contains("api_key")));
    }
}
