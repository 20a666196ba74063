mod scenario;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use attest_core::{Broker, EndpointRange, ResolutionPolicy};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

#[derive(Debug, Parser)]
#[command(name = "attest-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate an `<ipv4>:<portMin>-<portMax>` endpoint range
    CheckRange {
        range: String,
    },
    /// Replay a scenario file against an in-memory broker
    Replay {
        /// TOML file with `[[step]]` entries
        scenario: PathBuf,

        /// How overlapping ranges are narrowed (`nested` or `start-within`)
        #[arg(long, default_value = "nested")]
        resolution: ResolutionPolicy,

        /// Print the final registry as JSON
        #[arg(long)]
        dump: bool,
    },
    /// Replay a scenario, then report which principal answers for an endpoint
    Resolve {
        scenario: PathBuf,

        /// `<ipv4>:<port>` to resolve
        endpoint: String,

        #[arg(long, default_value = "nested")]
        resolution: ResolutionPolicy,
    },
}

fn load_broker(path: &Path, resolution: ResolutionPolicy) -> anyhow::Result<(Broker, Scenario)> {
    let scenario = Scenario::load(path)?;
    info!(steps = scenario.steps.len(), %resolution, "loaded scenario");
    Ok((Broker::new(resolution), scenario))
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::CheckRange { range } => match range.parse::<EndpointRange>() {
            Ok(parsed) => {
                println!(
                    "{} (address {}, {} ports)",
                    parsed,
                    parsed.address,
                    parsed.ports.width()
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Replay {
            scenario,
            resolution,
            dump,
        } => {
            let (broker, scenario) = load_broker(&scenario, resolution)?;
            for report in scenario.run(&broker) {
                println!("{}", report);
            }
            if dump {
                println!("{}", serde_json::to_string_pretty(&broker.snapshot())?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve {
            scenario,
            endpoint,
            resolution,
        } => {
            let (broker, scenario) = load_broker(&scenario, resolution)?;
            scenario.run(&broker);
            match broker
                .authorizer()
                .resolver()
                .resolve_str(broker.registry(), &endpoint)
            {
                Ok(principal) => {
                    println!(
                        "{} -> {} (image {}, range {})",
                        endpoint, principal.id, principal.image_id, principal.endpoint
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
