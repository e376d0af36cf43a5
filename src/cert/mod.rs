//! Self-signed certificate provisioning for the dev server
//!
//! Browsers only expose Web Bluetooth to secure contexts, so the dev server
//! needs a certificate. When none exists we ask `openssl` for one.

pub mod openssl;

pub use openssl::{ensure_cert, openssl_config};

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

pub const DEFAULT_CERT_PATH: &str = "certs/localhost.crt";
pub const DEFAULT_KEY_PATH: &str = "certs/localhost.key";
pub const DEFAULT_COMMON_NAME: &str = "localhost";
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

/// What to generate and where
#[derive(Debug, Clone)]
pub struct CertRequest {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub common_name: String,
    pub days: u32,
    /// Program invoked to generate the pair
    pub openssl: PathBuf,
    /// Where the temporary request config goes (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for CertRequest {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from(DEFAULT_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            common_name: DEFAULT_COMMON_NAME.to_string(),
            days: DEFAULT_VALIDITY_DAYS,
            openssl: PathBuf::from("openssl"),
            scratch_dir: None,
        }
    }
}

impl CertRequest {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            ..Default::default()
        }
    }

    pub fn with_common_name(mut self, common_name: &str) -> Self {
        self.common_name = common_name.to_string();
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn with_openssl(mut self, program: impl Into<PathBuf>) -> Self {
        self.openssl = program.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Both halves of the pair are on disk
    pub fn pair_exists(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

/// Result of [`ensure_cert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Existing,
    Generated,
}

#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write temporary openssl config: {0}")]
    TempConfig(#[source] io::Error),
    #[error("failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to generate certificate with openssl ({status}).\n{stdout}\n{stderr}")]
    GenerationFailed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
}

pub(crate) fn create_parent(path: &Path) -> Result<(), CertError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| CertError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
