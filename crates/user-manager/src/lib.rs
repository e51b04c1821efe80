//! Certificate-fingerprint authentication and wildcard RBAC.

mod errors;

pub use errors::UserManagerError;

use manifest::{Manifest, Role};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

struct UserEntry {
    roles: Vec<String>,
}

/// Users indexed by the SHA-256 fingerprint of their DER-encoded certificate, with
/// the manifest's role table alongside for permission evaluation.
pub struct UserManager {
    by_fingerprint: RwLock<BTreeMap<String, UserEntry>>,
    roles: RwLock<BTreeMap<String, Role>>,
}

impl UserManager {
    pub fn new() -> Self {
        Self {
            by_fingerprint: RwLock::new(BTreeMap::new()),
            roles: RwLock::new(BTreeMap::new()),
        }
    }

    /// Index every manifest user by certificate fingerprint and load the role
    /// table. Called once at `SetManifest` time.
    pub fn load(&self, manifest: &Manifest) -> Result<(), UserManagerError> {
        let mut by_fingerprint = self.by_fingerprint.write();
        by_fingerprint.clear();
        for (name, user) in &manifest.users {
            for role in &user.roles {
                if !manifest.roles.contains_key(role) {
                    return Err(UserManagerError::UnknownRole(role.clone()));
                }
            }
            let fingerprint =
                fingerprint_pem(&user.certificate).map_err(UserManagerError::InvalidCertificate)?;
            by_fingerprint.insert(
                fingerprint,
                UserEntry {
                    roles: user.roles.clone(),
                },
            );
        }

        let mut roles = self.roles.write();
        roles.clone_from(&manifest.roles);
        Ok(())
    }

    /// Resolve the presented DER certificate to a user fingerprint.
    pub fn authenticate(&self, der_certificate: &[u8]) -> Result<String, UserManagerError> {
        let fingerprint = hex::encode(Sha256::digest(der_certificate));
        let by_fingerprint = self.by_fingerprint.read();
        if by_fingerprint.contains_key(&fingerprint) {
            Ok(fingerprint)
        } else {
            Err(UserManagerError::UnknownCertificate)
        }
    }

    pub fn has_permission(&self, user: &str, resource_type: &str, resource_name: &str, action: &str) -> bool {
        let by_fingerprint = self.by_fingerprint.read();
        let Some(entry) = by_fingerprint.get(user) else {
            return false;
        };
        let roles = self.roles.read();
        entry
            .roles
            .iter()
            .filter_map(|role_name| roles.get(role_name))
            .any(|role| role_grants(role, resource_type, resource_name, action))
    }

    pub fn allowed_actions(&self, user: &str, resource_type: &str, resource_name: &str) -> BTreeSet<String> {
        let by_fingerprint = self.by_fingerprint.read();
        let Some(entry) = by_fingerprint.get(user) else {
            return BTreeSet::new();
        };
        let roles = self.roles.read();
        entry
            .roles
            .iter()
            .filter_map(|role_name| roles.get(role_name))
            .filter(|role| resource_matches(role, resource_type, resource_name))
            .flat_map(|role| role.actions.iter().cloned())
            .collect()
    }
}

impl Default for UserManager {
    fn default() -> Self {
        Self::new()
    }
}

fn resource_matches(role: &Role, resource_type: &str, resource_name: &str) -> bool {
    (role.resource_type == resource_type || role.resource_type == "*")
        && (role.resource_names.is_empty()
            || role.resource_names.iter().any(|n| n == resource_name || n == "*"))
}

fn role_grants(role: &Role, resource_type: &str, resource_name: &str, action: &str) -> bool {
    resource_matches(role, resource_type, resource_name)
        && role.actions.iter().any(|a| a == action || a == "*")
}

fn fingerprint_pem(pem_str: &str) -> Result<String, String> {
    let der = pem::parse(pem_str.as_bytes()).map_err(|e| e.to_string())?;
    Ok(hex::encode(Sha256::digest(der.contents())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(resource_type: &str, names: &[&str], actions: &[&str]) -> Role {
        Role {
            resource_type: resource_type.to_string(),
            resource_names: names.iter().map(|s| s.to_string()).collect(),
            actions: actions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn wildcard_resource_name_grants_access_to_any_target() {
        let r = role("Secrets", &["*"], &["Read"]);
        assert!(role_grants(&r, "Secrets", "anything", "Read"));
    }

    #[test]
    fn empty_resource_names_means_all_resources() {
        let r = role("Secrets", &[], &["Read"]);
        assert!(role_grants(&r, "Secrets", "anything", "Read"));
    }

    #[test]
    fn mismatched_resource_type_denies() {
        let r = role("Secrets", &[], &["Read"]);
        assert!(!role_grants(&r, "Marbles", "anything", "Read"));
    }

    #[test]
    fn wildcard_action_grants_anything() {
        let r = role("Secrets", &["x"], &["*"]);
        assert!(role_grants(&r, "Secrets", "x", "WriteSecret"));
    }
}
