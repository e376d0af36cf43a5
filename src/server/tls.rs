//! TLS termination from a PEM certificate/key pair.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read PEM from {}: {detail}", path.display())]
    Pem { path: PathBuf, detail: String },
    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),
    #[error("invalid certificate or key: {0}")]
    Config(#[from] rustls::Error),
}

fn pem_error(path: &Path, err: rustls::pki_types::pem::Error) -> TlsError {
    TlsError::Pem {
        path: path.to_path_buf(),
        detail: format!("{:?}", err),
    }
}

/// Builds the acceptor for the dev server: no client auth, h2 and http/1.1.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = CertificateDer::pem_file_iter(cert_path)
        .map_err(|e| pem_error(cert_path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pem_error(cert_path, e))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(cert_path.to_path_buf()));
    }

    let key = PrivateKeyDer::from_pem_file(key_path).map_err(|e| pem_error(key_path, e))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_garbage_pem_is_rejected() {
        let dir = tempdir().unwrap();
        let cert = dir.path().join("c.crt");
        let key = dir.path().join("c.key");
        fs::write(&cert, "not a certificate").unwrap();
        fs::write(&key, "not a key").unwrap();

        let err = load_acceptor(&cert, &key).err().unwrap();
        assert!(matches!(err, TlsError::NoCertificate(_)));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = load_acceptor(&dir.path().join("c.crt"), &dir.path().join("c.key"))
            .err()
            .unwrap();
        assert!(matches!(err, TlsError::Pem { .. }));
    }

    #[test]
    fn test_generated_pair_loads() {
        let dir = tempdir().unwrap();
        let (cert, key) = super::super::tests::write_test_pair(dir.path());
        assert!(load_acceptor(&cert, &key).is_ok());
    }
}
