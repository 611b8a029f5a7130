//! loghaul (CLI)
//!
//! Send whatever arrives on stdin to a loghaul server as one stream.
//!
//! ```bash
//! tail -F /var/log/app.json | loghaul --name app --remote-addr logs:4560
//! ```
//!
//! Configuration:
//! - `REMOTE_ADDR`: server address (default: 127.0.0.1:4560)
//! - `LOG_NAME`: stream name (default: test)
//! - `LOG_COMPRESSION`: LZ4-frame the stream (default: false)

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use clap::Parser;

use loghaul_client::{ClientConfig, SyncLogClient};

#[derive(Parser, Debug)]
#[command(name = "loghaul", version, about = "Send stdin to a loghaul server")]
struct Args {
    #[arg(long, env = "REMOTE_ADDR", default_value = "127.0.0.1:4560")]
    remote_addr: String,

    /// Stream name, [0-9A-Za-z_-]+
    #[arg(long, env = "LOG_NAME", default_value = "test")]
    name: String,

    #[arg(long, env = "LOG_COMPRESSION")]
    compression: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let stdin = io::stdin();
    if stdin.is_terminal() {
        println!("nothing to send");
        return Ok(());
    }

    let config = ClientConfig::new(&args.name, &args.remote_addr).with_compression(args.compression);
    let client = SyncLogClient::new(config);

    let sent = io::copy(&mut stdin.lock(), &mut &client)
        .with_context(|| format!("sending to {}", args.remote_addr))?;
    client.close().context("closing connection")?;

    println!("done with {sent} bytes");
    Ok(())
}
