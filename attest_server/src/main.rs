use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "attest-server", version, about = "Attestation metadata service")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration (e.g. `:10011`)
    listen: Option<String>,
}

/// Accept Go-style `:port` shorthand for "all interfaces".
fn normalize_listen(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => addr.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = attest_server::load_config(args.config.as_deref())?;
    if let Some(listen) = &args.listen {
        config.listen = normalize_listen(listen);
    }

    // Initialize logging; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    info!("Starting attest_server...");
    attest_server::serve(config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_listen() {
        assert_eq!(normalize_listen(":10011"), "0.0.0.0:10011");
        assert_eq!(normalize_listen("127.0.0.1:80"), "127.0.0.1:80");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["attest-server", "--config", "broker.toml", ":7777"]);
        assert_eq!(args.config, Some(PathBuf::from("broker.toml")));
        assert_eq!(args.listen.as_deref(), Some(":7777"));
    }
}
