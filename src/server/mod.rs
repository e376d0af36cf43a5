//! Local HTTPS static file server for Web Bluetooth testing.
//!
//! Startup order matters: the certificate pair is provisioned before any
//! socket is opened, so a failed `openssl` run never leaves a listener behind.

pub mod files;
pub mod tls;

pub use tls::{load_acceptor, TlsError};

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use crate::cert::{ensure_cert, CertError, CertRequest};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8443;

/// Pause after a failed `accept`, so running out of descriptors does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory tree to serve
    pub root: PathBuf,
    pub cert: CertRequest,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            root: root.into(),
            cert: CertRequest::default(),
        }
    }

    pub fn with_bind(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    pub fn with_cert(mut self, cert: CertRequest) -> Self {
        self.cert = cert;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Cert(#[from] CertError),
    #[error("certificate provisioning task failed: {0}")]
    CertTask(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error("cannot serve {}: {source}", path.display())]
    MissingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A bound, ready-to-serve HTTPS server
pub struct DevServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    root: Arc<PathBuf>,
}

impl DevServer {
    /// Provision the certificate, load it, then bind the listener.
    pub async fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        let request = config.cert.clone();
        tokio::task::spawn_blocking(move || ensure_cert(&request)).await??;

        let root = config
            .root
            .canonicalize()
            .and_then(|root| {
                if root.is_dir() {
                    Ok(root)
                } else {
                    Err(io::Error::new(io::ErrorKind::NotFound, "not a directory"))
                }
            })
            .map_err(|source| ServerError::MissingDir {
                path: config.root.clone(),
                source,
            })?;

        let acceptor = load_acceptor(&config.cert.cert_path, &config.cert.key_path)?;

        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("listening on {:?}, serving {}", listener.local_addr(), root.display());

        Ok(Self {
            listener,
            acceptor,
            root: Arc::new(root),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve until Ctrl+C.
    pub async fn serve(self) {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections, one task each, until `shutdown` resolves.
    /// The listening socket is closed on return.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let acceptor = self.acceptor.clone();
                    let root = Arc::clone(&self.root);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, acceptor, root).await {
                            debug!("connection from {} ended: {}", peer, e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    root: Arc<PathBuf>,
) -> Result<(), ConnectionError> {
    let tls_stream = acceptor
        .accept(stream)
        .await
        .map_err(ConnectionError::TlsHandshake)?;

    let service = service_fn(move |req: Request<Incoming>| {
        let root = Arc::clone(&root);
        async move {
            let resp = files::respond(&root, req.method(), req.uri()).await;
            info!(
                "{} \"{} {}\" {}",
                peer,
                req.method(),
                req.uri(),
                resp.status().as_u16()
            );
            Ok::<_, Infallible>(resp)
        }
    });

    ServerBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
        .map_err(ConnectionError::Http)
}
