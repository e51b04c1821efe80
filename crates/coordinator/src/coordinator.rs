use crate::errors::CoordinatorError;
use crate::instance::MarbleInstance;
use crate::sealing::{write_then_rename, RecoveryDataFile, SealedState};
use crate::state::CoordinatorState;
use crate::wire::{ActivateError, ActivationRequest, ActivationResponse, CoordinatorStatus};
use manifest::Manifest;
use parking_lot::RwLock;
use recovery_manager::RecoveryManager;
use secret_manager::SecretManager;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tls_manager::{MeshCa, RevocationReason};
use trust_root::TrustRoot;
use user_manager::UserManager;

/// On-disk location and sealing toggles, supplied at construction.
pub struct CoordinatorConfig {
    pub sealed_state_path: Option<PathBuf>,
    pub seal_key_path: Option<PathBuf>,
    pub recovery_data_path: Option<PathBuf>,
}

/// The mesh coordinator: the single struct that owns every manager and drives the
/// generation state machine. Its own lock (`state`) is always acquired before
/// any manager's internal lock, and no public method holds `state` across a
/// manager call that might block on I/O.
pub struct Coordinator {
    state: RwLock<CoordinatorState>,
    trust_root: RwLock<TrustRoot>,
    manifest: RwLock<Option<Manifest>>,
    secret_manager: SecretManager,
    mesh_ca: RwLock<Option<MeshCa>>,
    user_manager: UserManager,
    recovery_manager: RecoveryManager,
    instances: RwLock<BTreeMap<String, MarbleInstance>>,
    failed_activations: AtomicU64,
    last_activation_at: RwLock<Option<SystemTime>>,
    pending_sealed_bytes: RwLock<Option<Vec<u8>>>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            state: RwLock::new(CoordinatorState::Uninitialized),
            trust_root: RwLock::new(TrustRoot::simulated(fresh_key())),
            manifest: RwLock::new(None),
            secret_manager: SecretManager::new(),
            mesh_ca: RwLock::new(None),
            user_manager: UserManager::new(),
            recovery_manager: RecoveryManager::new(),
            instances: RwLock::new(BTreeMap::new()),
            failed_activations: AtomicU64::new(0),
            last_activation_at: RwLock::new(None),
            pending_sealed_bytes: RwLock::new(None),
            config,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.read()
    }

    pub fn failed_activations(&self) -> u64 {
        self.failed_activations.load(Ordering::Relaxed)
    }

    /// A snapshot operators can poll: current state, failed-activation count,
    /// and when a marble last activated successfully.
    pub fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            state: self.state(),
            failed_activations: self.failed_activations(),
            last_activation_at: *self.last_activation_at.read(),
        }
    }

    /// `Uninitialized -> {AcceptingManifest | AcceptingMarbles | Recovery}`.
    pub fn start(&self) -> Result<(), CoordinatorError> {
        if let Some(key_path) = &self.config.seal_key_path {
            if let Ok(bytes) = std::fs::read(key_path) {
                if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
                    *self.trust_root.write() = TrustRoot::simulated(key);
                }
            } else {
                let key = fresh_key();
                let _ = std::fs::write(key_path, key);
                *self.trust_root.write() = TrustRoot::simulated(key);
            }
        }

        if let Some(recovery_data_path) = &self.config.recovery_data_path {
            if let Ok(bytes) = std::fs::read(recovery_data_path) {
                if let Ok(file) = serde_json::from_slice::<RecoveryDataFile>(&bytes) {
                    self.recovery_manager
                        .restore(&file.keys_pem, file.threshold, file.shares)?;
                }
            }
        }

        let Some(state_path) = &self.config.sealed_state_path else {
            *self.state.write() = CoordinatorState::AcceptingManifest;
            return Ok(());
        };

        let Ok(sealed_bytes) = std::fs::read(state_path) else {
            *self.state.write() = CoordinatorState::AcceptingManifest;
            return Ok(());
        };

        match self.trust_root.read().unseal(&sealed_bytes) {
            Ok(plaintext) => {
                self.restore_from_plaintext(&plaintext)?;
                *self.state.write() = CoordinatorState::AcceptingMarbles;
            }
            Err(_) => {
                tracing::warn!("sealed state present but unsealable with the current seal key; entering recovery");
                *self.pending_sealed_bytes.write() = Some(sealed_bytes);
                *self.state.write() = CoordinatorState::Recovery;
            }
        }
        Ok(())
    }

    /// `AcceptingManifest -> AcceptingMarbles`.
    pub fn set_manifest(&self, manifest: Manifest) -> Result<(), CoordinatorError> {
        self.require_state(CoordinatorState::AcceptingManifest)?;
        manifest::validate(&manifest)?;

        self.secret_manager.generate_all(&manifest.secrets)?;
        self.user_manager.load(&manifest)?;
        self.recovery_manager
            .set_recovery_keys(&manifest.recovery_keys, manifest.recovery_threshold)?;

        let seal_key = self.trust_root.read().master_seal_key();
        self.recovery_manager.generate_recovery_data(&seal_key)?;

        if let Some(recovery_data_path) = &self.config.recovery_data_path {
            let file = RecoveryDataFile {
                keys_pem: manifest.recovery_keys.clone(),
                threshold: manifest.recovery_threshold,
                shares: self.recovery_manager.export_shares(),
            };
            let bytes = serde_json::to_vec(&file).map_err(CoordinatorError::internal)?;
            write_then_rename(recovery_data_path, &bytes).map_err(CoordinatorError::internal)?;
        }

        let ca = MeshCa::generate()?;
        *self.mesh_ca.write() = Some(ca);
        *self.manifest.write() = Some(manifest);
        *self.state.write() = CoordinatorState::AcceptingMarbles;
        tracing::info!("accepted manifest, transitioned AcceptingManifest -> AcceptingMarbles");
        Ok(())
    }

    /// `AcceptingMarbles -> AcceptingMarbles`, the full activation sequence:
    /// replay check, package/marble lookup, quote verification, secret and
    /// TLS issuance.
    pub fn activate(&self, request: ActivationRequest) -> Result<ActivationResponse, ActivateError> {
        if self.state() != CoordinatorState::AcceptingMarbles {
            return Err(ActivateError::NotAcceptingMarbles);
        }

        // Replay: an already-issued UUID returns its prior result unchanged.
        if let Some(existing) = self.instances.read().get(&request.uuid).cloned() {
            return self.replay_response(&existing);
        }

        let manifest_guard = self.manifest.read();
        let manifest = manifest_guard.as_ref().expect("manifest present once AcceptingMarbles");

        let Some(marble) = manifest.marbles.get(&request.marble_name) else {
            self.failed_activations.fetch_add(1, Ordering::Relaxed);
            return Err(ActivateError::UnknownMarble(request.marble_name));
        };

        if marble.max_activations > 0 {
            let live_count = self
                .instances
                .read()
                .values()
                .filter(|instance| instance.name == request.marble_name)
                .count() as u32;
            if live_count >= marble.max_activations {
                return Err(ActivateError::MaxActivationsReached(request.marble_name));
            }
        }

        let package = manifest
            .packages
            .get(&marble.package)
            .expect("manifest validated: marble.package exists");

        let verified = match self.trust_root.read().verify_quote(&request.quote, None, None) {
            Ok(v) => v,
            Err(err) => {
                self.failed_activations.fetch_add(1, Ordering::Relaxed);
                return Err(err.into());
            }
        };
        if let Err(err) = package_manager::verify(&verified, package) {
            self.failed_activations.fetch_add(1, Ordering::Relaxed);
            return Err(err.into());
        }

        let visible = manifest.secrets_visible_to(&request.marble_name, marble);
        let mut secrets = BTreeMap::new();
        for name in &visible {
            match self.secret_manager.get(name) {
                Ok(bytes) => {
                    secrets.insert(name.clone(), bytes);
                }
                Err(_) => return Err(ActivateError::MissingSecret(name.clone())),
            }
        }

        let env: BTreeMap<String, String> = marble
            .parameters
            .env
            .iter()
            .map(|(k, v)| (k.clone(), self.secret_manager.substitute(v)))
            .collect();
        let files: BTreeMap<String, Vec<u8>> = marble
            .parameters
            .files
            .iter()
            .map(|(path, contents)| (path.clone(), self.secret_manager.substitute(contents).into_bytes()))
            .collect();

        let mut certificate = None;
        let mut private_key = None;
        let mut root_ca = None;
        if marble.declares_tls() {
            if let Some(ca) = self.mesh_ca.read().as_ref() {
                let (cert, key, root) = ca
                    .issue(&request.marble_name, &request.uuid)
                    .map_err(|e| ActivateError::QuoteVerificationFailed {
                        field: "TlsIssuance".to_string(),
                        expected: "success".to_string(),
                        actual: e.to_string(),
                    })?;
                certificate = Some(cert);
                private_key = Some(key);
                root_ca = Some(root);
            }
        }

        drop(manifest_guard);

        let instance = MarbleInstance {
            name: request.marble_name.clone(),
            uuid: request.uuid.clone(),
            activated_at: SystemTime::now(),
            quote: request.quote,
        };
        self.instances.write().insert(request.uuid.clone(), instance);
        *self.last_activation_at.write() = Some(SystemTime::now());

        tracing::debug!(marble = %request.marble_name, uuid = %request.uuid, "marble activated");

        Ok(ActivationResponse {
            secrets,
            env,
            files,
            certificate,
            private_key,
            root_ca,
        })
    }

    /// `AcceptingMarbles -> AcceptingMarbles`: revoke any issued cert, drop the
    /// instance.
    pub fn deactivate(&self, uuid: &str) -> Result<(), CoordinatorError> {
        self.require_state(CoordinatorState::AcceptingMarbles)?;
        let removed = self.instances.write().remove(uuid);
        if removed.is_none() {
            return Err(CoordinatorError::NotFound(format!("marble instance '{uuid}'")));
        }
        if let Some(ca) = self.mesh_ca.read().as_ref() {
            ca.revoke(uuid, RevocationReason::Deactivated);
        }
        Ok(())
    }

    /// `AcceptingMarbles -> AcceptingMarbles`: RBAC-gated write of a user-defined
    /// secret.
    pub fn set_secret(&self, user: &str, name: &str, value: Vec<u8>) -> Result<(), CoordinatorError> {
        self.require_state(CoordinatorState::AcceptingMarbles)?;
        if !self.user_manager.has_permission(user, "Secrets", name, "WriteSecret") {
            return Err(CoordinatorError::PermissionDenied);
        }
        self.secret_manager.set_user(name, value)?;
        Ok(())
    }

    pub fn get_recovery_data(&self, holder_name: &str) -> Result<Vec<u8>, CoordinatorError> {
        Ok(self.recovery_manager.get_recovery_data(holder_name)?)
    }

    /// `Recovery -> AcceptingMarbles`.
    pub fn recover(&self, shares: &BTreeMap<String, Vec<u8>>) -> Result<(), CoordinatorError> {
        self.require_state(CoordinatorState::Recovery)?;
        let recovered_key_material = self.recovery_manager.recover(shares)?;
        let key = <[u8; 32]>::try_from(recovered_key_material.as_slice())
            .map_err(|_| CoordinatorError::internal("recovered sealing key material is not 32 bytes"))?;

        *self.trust_root.write() = TrustRoot::simulated(key);

        let sealed_bytes = self
            .pending_sealed_bytes
            .write()
            .take()
            .ok_or_else(|| CoordinatorError::internal("recovery attempted with no pending sealed state"))?;
        let plaintext = self
            .trust_root
            .read()
            .unseal(&sealed_bytes)
            .map_err(|e| CoordinatorError::CryptoError(e.to_string()))?;
        self.restore_from_plaintext(&plaintext)?;

        if let Some(key_path) = &self.config.seal_key_path {
            let _ = std::fs::write(key_path, key);
        }

        *self.state.write() = CoordinatorState::AcceptingMarbles;
        tracing::info!("recovery succeeded, transitioned Recovery -> AcceptingMarbles");
        Ok(())
    }

    /// `any -> Uninitialized`: seal state if enabled, zeroize secrets.
    pub fn stop(&self) -> Result<(), CoordinatorError> {
        if let (Some(state_path), Some(manifest)) = (&self.config.sealed_state_path, self.manifest.read().clone()) {
            let sealed = SealedState {
                manifest,
                ca_cert_pem: self
                    .mesh_ca
                    .read()
                    .as_ref()
                    .map(|ca| ca.root_cert_pem().to_string())
                    .unwrap_or_default(),
                ca_key_pem: self.mesh_ca.read().as_ref().map(|ca| ca.key_pem()).unwrap_or_default(),
                secrets: self.secret_manager.export_all(),
            };
            let plaintext = serde_json::to_vec(&sealed).map_err(|e| CoordinatorError::internal(e))?;
            let ciphertext = self
                .trust_root
                .read()
                .seal(&plaintext, trust_root::SealPolicy::Product)
                .map_err(|e| CoordinatorError::CryptoError(e.to_string()))?;
            write_then_rename(state_path, &ciphertext).map_err(|e| CoordinatorError::internal(e))?;
        }

        self.secret_manager.zeroize();
        self.instances.write().clear();
        *self.manifest.write() = None;
        *self.mesh_ca.write() = None;
        *self.state.write() = CoordinatorState::Uninitialized;
        Ok(())
    }

    fn restore_from_plaintext(&self, plaintext: &[u8]) -> Result<(), CoordinatorError> {
        let sealed: SealedState = serde_json::from_slice(plaintext).map_err(|e| CoordinatorError::internal(e))?;
        self.user_manager.load(&sealed.manifest)?;
        self.recovery_manager
            .set_recovery_keys(&sealed.manifest.recovery_keys, sealed.manifest.recovery_threshold)?;
        self.secret_manager.import_all(sealed.secrets);
        *self.mesh_ca.write() = Some(MeshCa::from_components(&sealed.ca_cert_pem, &sealed.ca_key_pem)?);
        *self.manifest.write() = Some(sealed.manifest);
        Ok(())
    }

    fn replay_response(&self, instance: &MarbleInstance) -> Result<ActivationResponse, ActivateError> {
        let manifest_guard = self.manifest.read();
        let manifest = manifest_guard.as_ref().expect("manifest present once AcceptingMarbles");
        let marble = manifest
            .marbles
            .get(&instance.name)
            .ok_or_else(|| ActivateError::UnknownMarble(instance.name.clone()))?;

        let visible = manifest.secrets_visible_to(&instance.name, marble);
        let mut secrets = BTreeMap::new();
        for name in &visible {
            if let Ok(bytes) = self.secret_manager.get(name) {
                secrets.insert(name.clone(), bytes);
            }
        }
        let (certificate, private_key, root_ca) = match self.mesh_ca.read().as_ref() {
            Some(ca) if marble.declares_tls() => ca
                .issue(&instance.name, &instance.uuid)
                .map(|(c, k, r)| (Some(c), Some(k), Some(r)))
                .unwrap_or((None, None, None)),
            _ => (None, None, None),
        };

        Ok(ActivationResponse {
            secrets,
            env: BTreeMap::new(),
            files: BTreeMap::new(),
            certificate,
            private_key,
            root_ca,
        })
    }

    fn require_state(&self, expected: CoordinatorState) -> Result<(), CoordinatorError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(CoordinatorError::StateError(format!("expected {expected}, found {actual}")))
        }
    }
}

fn fresh_key() -> [u8; 32] {
    use rand::RngCore;
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
