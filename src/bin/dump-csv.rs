use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use demo_tools::capture::{self, CaptureError, CaptureOutcome, CaptureSettings};
use demo_tools::serial::port::{print_ports, DEFAULT_BAUD};
use demo_tools::serial::PortConfig;

/// Dump the CSV log from the demo board over its serial console.
#[derive(Parser)]
#[command(name = "dump-csv")]
#[command(version, about)]
struct Cli {
    /// Serial port path (e.g., /dev/ttyUSB0, COM3)
    #[arg(required_unless_present = "list")]
    port: Option<String>,

    /// File the CSV is written to
    #[arg(required_unless_present = "list")]
    output: Option<PathBuf>,

    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Give up after this many seconds without a line from the board
    #[arg(long, default_value_t = 20)]
    idle_timeout: u64,

    /// List available serial ports and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage errors exit with 1, not clap's default of 2
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if cli.list {
        return print_ports();
    }

    let (Some(port), Some(output)) = (cli.port, cli.output) else {
        anyhow::bail!("both <PORT> and <OUTPUT> are required");
    };

    let port_config = PortConfig::new(&port).with_baud_rate(cli.baud);
    let settings =
        CaptureSettings::default().with_idle_timeout(Duration::from_secs(cli.idle_timeout));

    println!(
        "{} Requesting CSV from {} at {} baud",
        "[*]".cyan().bold(),
        port.white(),
        cli.baud
    );

    let outcome = match capture::capture_from_port(port_config, settings) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let CaptureOutcome::TimedOut(ref lines) = outcome {
        if !lines.is_empty() {
            eprintln!(
                "{} Board went quiet before CSV_END, saving {} partial lines",
                "[WARNING]".yellow().bold(),
                lines.len()
            );
        }
    }

    match capture::write_csv(&output, outcome.lines()) {
        Ok(count) => {
            println!("{}", capture::wrote_message(count, &output));
            Ok(())
        }
        Err(CaptureError::NoData) => {
            println!("{}", CaptureError::NoData);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
