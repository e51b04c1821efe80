//! Write-then-rename persistence of Coordinator state across restarts.

use manifest::Manifest;
use secret_manager::ExportedSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
pub struct SealedState {
    pub manifest: Manifest,
    pub ca_cert_pem: String,
    pub ca_key_pem: String,
    pub secrets: BTreeMap<String, ExportedSecret>,
}

/// Recovery data deliberately lives outside the sealed blob: an operator must be
/// able to fetch their RSA-OAEP envelope even before the sealing key has
/// been recovered, since fetching it is the first step of recovering that key.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecoveryDataFile {
    pub keys_pem: BTreeMap<String, String>,
    pub threshold: usize,
    pub shares: BTreeMap<String, Vec<u8>>,
}

/// Write `bytes` to `path` via a temp file in the same directory followed by an
/// atomic rename, so a crash mid-write never leaves a half-written sealed file.
pub fn write_then_rename(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("sealed-state")
    ));
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
