use coordinator::{ActivateError, ActivationRequest, Coordinator, CoordinatorConfig, CoordinatorState};
use manifest::{Manifest, Marble, MarbleTls, Package, TlsConfig, TlsPolicy};
use trust_root::TrustRoot;

/// A fresh, known seal key pre-seeded into `seal_key_path` so the test can build a
/// `TrustRoot` that generates quotes the Coordinator's own trust root will accept.
fn seeded_coordinator(dir: &tempfile::TempDir) -> (Coordinator, TrustRoot) {
    let seal_key_path = dir.path().join("seal.key");
    let key = [0x42u8; 32];
    std::fs::write(&seal_key_path, key).unwrap();

    let coordinator = Coordinator::new(CoordinatorConfig {
        sealed_state_path: Some(dir.path().join("sealed-state.bin")),
        seal_key_path: Some(seal_key_path),
        recovery_data_path: Some(dir.path().join("recovery-data.json")),
    });
    coordinator.start().unwrap();
    (coordinator, TrustRoot::simulated(key))
}

fn debug_package() -> Package {
    let mut package = Package::default();
    package.debug = true;
    package
}

fn simple_marble(package: &str) -> Marble {
    Marble {
        package: package.to_string(),
        ..Marble::default()
    }
}

#[test]
fn fresh_coordinator_accepts_manifest_then_activates_a_marble() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);
    assert_eq!(coordinator.state(), CoordinatorState::AcceptingManifest);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();
    assert_eq!(coordinator.state(), CoordinatorState::AcceptingMarbles);

    let quote = trust_root.generate_quote(b"").unwrap();
    let response = coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "11111111-1111-1111-1111-111111111111".to_string(),
            quote,
            csr: None,
        })
        .unwrap();

    assert!(response.certificate.is_none());
    assert_eq!(coordinator.failed_activations(), 0);
}

#[test]
fn replayed_uuid_returns_prior_issuance_without_reactivating() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    let mut marble = simple_marble("demo-pkg");
    marble.max_activations = 1;
    manifest.marbles.insert("demo-marble".to_string(), marble);
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    let request = ActivationRequest {
        marble_name: "demo-marble".to_string(),
        uuid: "22222222-2222-2222-2222-222222222222".to_string(),
        quote,
        csr: None,
    };

    coordinator.activate(request.clone()).unwrap();
    // A second activation with the same uuid must replay, not hit max_activations.
    coordinator.activate(request).unwrap();
}

#[test]
fn max_activations_rejects_a_new_uuid_past_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    let mut marble = simple_marble("demo-pkg");
    marble.max_activations = 1;
    manifest.marbles.insert("demo-marble".to_string(), marble);
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "33333333-3333-3333-3333-333333333333".to_string(),
            quote: quote.clone(),
            csr: None,
        })
        .unwrap();

    let err = coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "44444444-4444-4444-4444-444444444444".to_string(),
            quote,
            csr: None,
        })
        .unwrap_err();
    assert!(matches!(err, ActivateError::MaxActivationsReached(name) if name == "demo-marble"));
}

#[test]
fn deactivate_frees_a_max_activations_slot_for_a_new_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    let mut marble = simple_marble("demo-pkg");
    marble.max_activations = 1;
    manifest.marbles.insert("demo-marble".to_string(), marble);
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa".to_string(),
            quote: quote.clone(),
            csr: None,
        })
        .unwrap();

    coordinator.deactivate("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa").unwrap();

    // With the slot freed, a brand new uuid must be able to activate.
    coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "cccccccc-cccc-cccc-cccc-cccccccccccc".to_string(),
            quote,
            csr: None,
        })
        .unwrap();
}

#[test]
fn get_status_reflects_failed_and_successful_activations() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();

    let status = coordinator.get_status();
    assert_eq!(status.state, CoordinatorState::AcceptingMarbles);
    assert_eq!(status.failed_activations, 0);
    assert!(status.last_activation_at.is_none());

    let quote = trust_root.generate_quote(b"").unwrap();
    coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "dddddddd-dddd-dddd-dddd-dddddddddddd".to_string(),
            quote,
            csr: None,
        })
        .unwrap();

    let status = coordinator.get_status();
    assert_eq!(status.failed_activations, 0);
    assert!(status.last_activation_at.is_some());
}

#[test]
fn security_version_downgrade_is_rejected_and_counted_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut package = Package::default();
    package.security_version = 2; // the simulated identity always reports 1
    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), package);
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    let err = coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "55555555-5555-5555-5555-555555555555".to_string(),
            quote,
            csr: None,
        })
        .unwrap_err();
    assert!(matches!(err, ActivateError::QuoteVerificationFailed { field, .. } if field == "SecurityVersion"));
    assert_eq!(coordinator.failed_activations(), 1);
}

#[test]
fn unknown_marble_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    let err = coordinator
        .activate(ActivationRequest {
            marble_name: "no-such-marble".to_string(),
            uuid: "66666666-6666-6666-6666-666666666666".to_string(),
            quote,
            csr: None,
        })
        .unwrap_err();
    assert!(matches!(err, ActivateError::UnknownMarble(name) if name == "no-such-marble"));
}

#[test]
fn tls_declaring_marble_receives_a_certificate_chained_to_the_root_ca() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert(
        "demo-marble".to_string(),
        Marble {
            package: "demo-pkg".to_string(),
            tls: MarbleTls {
                incoming: vec!["443".to_string()],
                outgoing: vec![],
            },
            ..Marble::default()
        },
    );
    coordinator.set_manifest(manifest).unwrap();

    let quote = trust_root.generate_quote(b"").unwrap();
    let response = coordinator
        .activate(ActivationRequest {
            marble_name: "demo-marble".to_string(),
            uuid: "77777777-7777-7777-7777-777777777777".to_string(),
            quote,
            csr: None,
        })
        .unwrap();

    assert!(response.certificate.is_some());
    assert!(response.private_key.is_some());
    assert!(response.root_ca.is_some());
}

#[test]
fn seal_then_restart_restores_accepting_marbles_without_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();
    coordinator.stop().unwrap();
    assert_eq!(coordinator.state(), CoordinatorState::Uninitialized);

    // A fresh Coordinator instance, same on-disk paths, simulating a process restart.
    let seal_key_path = dir.path().join("seal.key");
    let restarted = Coordinator::new(CoordinatorConfig {
        sealed_state_path: Some(dir.path().join("sealed-state.bin")),
        seal_key_path: Some(seal_key_path),
        recovery_data_path: Some(dir.path().join("recovery-data.json")),
    });
    restarted.start().unwrap();
    assert_eq!(restarted.state(), CoordinatorState::AcceptingMarbles);
}

#[test]
fn restart_with_wrong_seal_key_enters_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();
    coordinator.stop().unwrap();

    // Overwrite the seal key file before restart, simulating a lost/rotated key.
    let seal_key_path = dir.path().join("seal.key");
    std::fs::write(&seal_key_path, [0x99u8; 32]).unwrap();

    let restarted = Coordinator::new(CoordinatorConfig {
        sealed_state_path: Some(dir.path().join("sealed-state.bin")),
        seal_key_path: Some(seal_key_path),
        recovery_data_path: Some(dir.path().join("recovery-data.json")),
    });
    restarted.start().unwrap();
    assert_eq!(restarted.state(), CoordinatorState::Recovery);
}

#[test]
fn tls_policy_denies_activation_when_caller_is_not_in_the_allow_list() {
    // This exercises the manifest-level policy surface directly rather than
    // through activation, since incoming connections aren't brokered by the
    // Coordinator itself.
    let mut tls = TlsConfig::default();
    tls.incoming.insert(
        "server".to_string(),
        vec![TlsPolicy {
            port: "443".to_string(),
            allowed_marbles: vec!["client-a".to_string()],
        }],
    );
    assert!(tls_manager::is_allowed(&tls, "client-a", "server", "443", true));
    assert!(!tls_manager::is_allowed(&tls, "client-b", "server", "443", true));
}

#[test]
fn set_secret_is_rejected_without_permission() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _trust_root) = seeded_coordinator(&dir);

    let mut manifest = Manifest::default();
    manifest.packages.insert("demo-pkg".to_string(), debug_package());
    manifest.marbles.insert("demo-marble".to_string(), simple_marble("demo-pkg"));
    coordinator.set_manifest(manifest).unwrap();

    let err = coordinator.set_secret("nobody", "any-secret", b"value".to_vec()).unwrap_err();
    assert_eq!(err.kind(), coordinator::ErrorKind::PermissionDenied);
}
