use crate::errors::SecretManagerError;
use crate::value::{ExportedSecret, SecretValue};
use crate::{gen, placeholder};
use manifest::SecretDefinition;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Owns every secret for one Coordinator generation behind a single reader-writer
/// lock, per the outer-lock-ordering rule: the Coordinator's lock is
/// always acquired before this one, never the reverse.
pub struct SecretManager {
    secrets: RwLock<BTreeMap<String, SecretValue>>,
}

impl SecretManager {
    pub fn new() -> Self {
        Self {
            secrets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Generate every non-user-defined secret declared by the manifest. Called once
    /// at `SetManifest` time.
    pub fn generate_all(
        &self,
        definitions: &BTreeMap<String, SecretDefinition>,
    ) -> Result<(), SecretManagerError> {
        let mut secrets = self.secrets.write();
        for (name, definition) in definitions {
            if definition.user_defined {
                secrets.insert(
                    name.clone(),
                    SecretValue {
                        private: Default::default(),
                        public: None,
                        cert_pem: None,
                        key_pem: None,
                        user_defined: true,
                    },
                );
                continue;
            }
            let value = gen::generate(name, definition)?;
            secrets.insert(name.clone(), value);
        }
        Ok(())
    }

    /// Set the bytes of a user-defined secret that has not yet been given a value.
    pub fn set_user(&self, name: &str, bytes: Vec<u8>) -> Result<(), SecretManagerError> {
        let mut secrets = self.secrets.write();
        let existing = secrets
            .get(name)
            .ok_or_else(|| SecretManagerError::Undefined(name.to_string()))?;
        if !existing.user_defined {
            return Err(SecretManagerError::NotUserDefined(name.to_string()));
        }
        secrets.insert(name.to_string(), SecretValue::plain(bytes));
        Ok(())
    }

    /// Private bytes (or PEM) for a secret.
    pub fn get(&self, name: &str) -> Result<Vec<u8>, SecretManagerError> {
        let secrets = self.secrets.read();
        let value = secrets
            .get(name)
            .ok_or_else(|| SecretManagerError::Undefined(name.to_string()))?;
        Ok(value.private.to_vec())
    }

    pub fn get_cert(&self, name: &str) -> Result<(String, String), SecretManagerError> {
        let secrets = self.secrets.read();
        let value = secrets
            .get(name)
            .ok_or_else(|| SecretManagerError::Undefined(name.to_string()))?;
        match (&value.cert_pem, &value.key_pem) {
            (Some(cert), Some(key)) => Ok((cert.clone(), key.to_string())),
            _ => Err(SecretManagerError::NoCertificate(name.to_string())),
        }
    }

    /// Render `text`'s `{{ .Secrets.X }}` / `{{ raw .Secrets.X }}` placeholders
    /// against the secrets currently held.
    pub fn substitute(&self, text: &str) -> String {
        let secrets = self.secrets.read();
        placeholder::substitute(text, |name| secrets.get(name).map(|v| v.private.to_vec()))
    }

    /// Snapshot every secret for sealing. Used only by the Coordinator's
    /// write-then-rename sealed-state path; never exposed on any operator-facing
    /// surface.
    pub fn export_all(&self) -> BTreeMap<String, ExportedSecret> {
        self.secrets
            .read()
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    ExportedSecret {
                        private: value.private.to_vec(),
                        cert_pem: value.cert_pem.clone(),
                        key_pem: value.key_pem.as_ref().map(|k| k.to_string()),
                        user_defined: value.user_defined,
                    },
                )
            })
            .collect()
    }

    /// Restore a snapshot produced by [`SecretManager::export_all`], replacing
    /// whatever this manager currently holds.
    pub fn import_all(&self, exported: BTreeMap<String, ExportedSecret>) {
        let mut secrets = self.secrets.write();
        secrets.clear();
        for (name, value) in exported {
            let mut restored = SecretValue::symmetric(value.private);
            restored.user_defined = value.user_defined;
            restored.cert_pem = value.cert_pem;
            restored.key_pem = value.key_pem.map(zeroize::Zeroizing::new);
            secrets.insert(name, restored);
        }
    }

    /// Overwrite every held byte buffer before dropping references.
    /// `Zeroizing` already scrubs on drop; this additionally clears the map
    /// eagerly so secret material doesn't linger for the lifetime of a lingering
    /// read guard elsewhere.
    pub fn zeroize(&self) {
        let mut secrets = self.secrets.write();
        secrets.clear();
    }
}

impl Default for SecretManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest::SecretType;

    fn symmetric_def() -> SecretDefinition {
        SecretDefinition {
            kind: SecretType::Symmetric,
            size: Some(128),
            user_defined: false,
            cert_config: None,
            shared_with: vec![],
        }
    }

    #[test]
    fn generate_all_then_get() {
        let manager = SecretManager::new();
        let mut defs = BTreeMap::new();
        defs.insert("k".to_string(), symmetric_def());
        manager.generate_all(&defs).unwrap();
        assert_eq!(manager.get("k").unwrap().len(), 16);
    }

    #[test]
    fn set_user_requires_user_defined() {
        let manager = SecretManager::new();
        let mut defs = BTreeMap::new();
        defs.insert("k".to_string(), symmetric_def());
        manager.generate_all(&defs).unwrap();
        assert!(manager.set_user("k", vec![1, 2, 3]).is_err());
    }

    #[test]
    fn zeroize_clears_all_secrets() {
        let manager = SecretManager::new();
        let mut defs = BTreeMap::new();
        defs.insert("k".to_string(), symmetric_def());
        manager.generate_all(&defs).unwrap();
        manager.zeroize();
        assert!(manager.get("k").is_err());
    }
}
