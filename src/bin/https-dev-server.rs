use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use demo_tools::cert::{
    CertRequest, DEFAULT_CERT_PATH, DEFAULT_COMMON_NAME, DEFAULT_KEY_PATH, DEFAULT_VALIDITY_DAYS,
};
use demo_tools::server::{DevServer, ServerConfig, ServerError, DEFAULT_HOST, DEFAULT_PORT};

/// The demo project this crate lives in
const PROJECT_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/..");

/// Local HTTPS server for Web Bluetooth testing.
#[derive(Parser)]
#[command(name = "https-dev-server")]
#[command(version, about)]
struct Cli {
    /// Bind address
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory to serve
    #[arg(long, default_value = PROJECT_DIR)]
    dir: PathBuf,

    /// Certificate path
    #[arg(long, default_value = DEFAULT_CERT_PATH)]
    cert: PathBuf,

    /// Private key path
    #[arg(long, default_value = DEFAULT_KEY_PATH)]
    key: PathBuf,

    /// Certificate common name
    #[arg(long, default_value = DEFAULT_COMMON_NAME)]
    cn: String,

    /// Validity of a generated certificate, in days
    #[arg(long, default_value_t = DEFAULT_VALIDITY_DAYS)]
    days: u32,

    /// openssl executable used to generate the certificate
    #[arg(long, default_value = "openssl")]
    openssl: PathBuf,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let cert = CertRequest::new(absolute(&cli.cert)?, absolute(&cli.key)?)
        .with_common_name(&cli.cn)
        .with_days(cli.days)
        .with_openssl(&cli.openssl);
    let config = ServerConfig::new(&cli.dir)
        .with_bind(&cli.host, cli.port)
        .with_cert(cert);

    let server = match DevServer::start(&config).await {
        Ok(server) => server,
        Err(ServerError::Cert(e)) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            eprintln!("Make sure openssl is installed, or provide --cert/--key.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let port = server.local_addr().map(|a| a.port()).unwrap_or(cli.port);
    println!(
        "{} Serving HTTPS on https://{}:{} (dir: {})",
        "[OK]".green().bold(),
        cli.host,
        port,
        server.root().display()
    );
    println!("If the browser warns about the cert, accept the exception once.");
    println!("Web Bluetooth works only on secure contexts (HTTPS/localhost).");

    server.serve().await;
    println!("\n{}", "Shutting down...".yellow());

    Ok(())
}
