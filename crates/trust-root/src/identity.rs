use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Static identity of the running process/enclave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub unique_id: [u8; 32],
    pub signer_id: [u8; 32],
    pub product_id: u16,
    pub security_version: u16,
    pub in_enclave: bool,
    pub simulation: bool,
}

/// The trusted computing base status reported by the platform for a given quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcbStatus {
    UpToDate,
    Simulation,
    Unknown,
}

impl TcbStatus {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            TcbStatus::UpToDate => 0x00,
            TcbStatus::Simulation => 0xFF,
            TcbStatus::Unknown => 0x01,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => TcbStatus::UpToDate,
            0xFF => TcbStatus::Simulation,
            _ => TcbStatus::Unknown,
        }
    }
}

/// A self-report of this process's identity and a caller-supplied data blob,
/// cached for up to 60 seconds by [`crate::TrustRoot::self_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub data: [u8; 64],
    pub unique_id: [u8; 32],
    pub signer_id: [u8; 32],
    pub product_id: u16,
    pub security_version: u16,
    pub debug: bool,
    pub tcb_status: TcbStatus,
    pub timestamp: u64,
}

/// Fabricate a deterministic identity when not running inside real hardware.
///
/// Derived from the executable path, hostname, and architecture. This is
/// intentionally NOT cryptographically meaningful — it exists so that repeated
/// runs of the same build
/// on the same host produce the same measurement, which is what local development
/// and CI need from "simulation mode".
pub(crate) fn fabricate_simulated_identity() -> Identity {
    let exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let host = std::env::var("HOSTNAME")
        .or_else(|_| hostname_fallback())
        .unwrap_or_default();
    let arch = std::env::consts::ARCH;

    let unique_id = {
        let mut hasher = Sha256::new();
        hasher.update(b"unique_id");
        hasher.update(exe.as_bytes());
        hasher.update(arch.as_bytes());
        hasher.finalize().into()
    };
    let signer_id = {
        let mut hasher = Sha256::new();
        hasher.update(b"signer_id");
        hasher.update(host.as_bytes());
        hasher.finalize().into()
    };

    Identity {
        unique_id,
        signer_id,
        product_id: 1,
        security_version: 1,
        in_enclave: false,
        simulation: true,
    }
}

fn hostname_fallback() -> std::io::Result<String> {
    Ok("localhost".to_string())
}

pub(crate) fn build_report(identity: &Identity, data: [u8; 64]) -> Report {
    Report {
        data,
        unique_id: identity.unique_id,
        signer_id: identity.signer_id,
        product_id: identity.product_id,
        security_version: identity.security_version,
        debug: identity.simulation,
        tcb_status: if identity.simulation {
            TcbStatus::Simulation
        } else {
            TcbStatus::UpToDate
        },
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    }
}
