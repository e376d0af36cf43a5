//! Certificate generation through the `openssl req` command line tool.

use log::{debug, info, warn};
use std::io::Write;
use std::process::Command;

use super::{create_parent, CertError, CertRequest, Provisioned};

/// Request config for a localhost server certificate
pub fn openssl_config(common_name: &str) -> String {
    format!(
        "[req]
distinguished_name=req_distinguished_name
x509_extensions=v3_req
prompt = no

[req_distinguished_name]
CN = {common_name}

[v3_req]
subjectAltName = @alt_names
basicConstraints = CA:FALSE
keyUsage = digitalSignature, keyEncipherment
extendedKeyUsage = serverAuth

[alt_names]
DNS.1 = localhost
IP.1 = 127.0.0.1
"
    )
}

/// Make sure the certificate/key pair exists, generating it if needed.
///
/// An existing pair is used as is, without any expiry check. The temporary
/// request config is removed before returning in every case.
pub fn ensure_cert(req: &CertRequest) -> Result<Provisioned, CertError> {
    if req.pair_exists() {
        info!(
            "using existing certificate {} and key {}",
            req.cert_path.display(),
            req.key_path.display()
        );
        return Ok(Provisioned::Existing);
    }

    create_parent(&req.cert_path)?;
    create_parent(&req.key_path)?;

    let builder = {
        let mut b = tempfile::Builder::new();
        b.prefix("devcert-").suffix(".cnf");
        b
    };
    let mut config = match req.scratch_dir {
        Some(ref dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(CertError::TempConfig)?;

    config
        .write_all(openssl_config(&req.common_name).as_bytes())
        .and_then(|_| config.flush())
        .map_err(CertError::TempConfig)?;

    let mut cmd = Command::new(&req.openssl);
    cmd.args(["req", "-x509", "-newkey", "rsa:2048", "-nodes", "-keyout"])
        .arg(&req.key_path)
        .arg("-out")
        .arg(&req.cert_path)
        .arg("-days")
        .arg(req.days.to_string())
        .arg("-config")
        .arg(config.path())
        .args(["-extensions", "v3_req"]);

    debug!("running {:?}", cmd);
    let output = cmd.output();

    if let Err(e) = config.close() {
        warn!("failed to remove temporary openssl config: {}", e);
    }

    let output = output.map_err(|source| CertError::Spawn {
        program: req.openssl.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(CertError::GenerationFailed {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    info!(
        "generated self-signed certificate for CN={} at {}",
        req.common_name,
        req.cert_path.display()
    );
    Ok(Provisioned::Generated)
}
