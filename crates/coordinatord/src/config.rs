use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk daemon configuration, loaded from a TOML file and overridable by CLI
/// flags. Mirrors the sealing/recovery knobs `Coordinator::new` expects, plus
/// process-level concerns (log level) the coordinator crate itself has no opinion
/// on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Where the sealed state blob is read from and written to across restarts.
    pub sealed_state_path: Option<PathBuf>,

    /// Where the process-local seal key is persisted in simulation mode.
    pub seal_key_path: Option<PathBuf>,

    /// Where recovery public keys and RSA-OAEP shares are persisted, independent
    /// of the sealed blob.
    pub recovery_data_path: Option<PathBuf>,

    /// A manifest to load automatically on first start, if the coordinator comes
    /// up in `AcceptingManifest` with none already sealed. Optional: an operator
    /// can always submit one out-of-band instead.
    pub manifest_path: Option<PathBuf>,

    /// Default `tracing` filter directive, overridden by `RUST_LOG` if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sealed_state_path: Some(PathBuf::from("./data/sealed-state.bin")),
            seal_key_path: Some(PathBuf::from("./data/seal.key")),
            recovery_data_path: Some(PathBuf::from("./data/recovery-data.json")),
            manifest_path: None,
            log_level: default_log_level(),
        }
    }
}

/// Load configuration from `path`, falling back to defaults if the file doesn't
/// exist yet.
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<DaemonConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let config: DaemonConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
    Ok(config)
}
