use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use devcap::{ClientConfig, CloudClient, DeviceRecord, Identity};

/// DevCap - Device capability lookups against a remote capability service
#[derive(Parser)]
#[command(name = "devcap", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/devcap/config.toml)
    #[arg(long, env = "DEVCAP_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve capabilities for a user agent
    Lookup {
        /// User agent to resolve
        #[arg(short, long)]
        user_agent: String,

        /// Capability to fetch (repeatable)
        #[arg(short = 'c', long = "capability", required = true)]
        capabilities: Vec<String>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,devcap=info",
        1 => "info,devcap=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    match cli.command {
        Command::Lookup {
            user_agent,
            capabilities,
            json,
        } => lookup(&config, &user_agent, &capabilities, json).await,
        Command::Config => {
            print_config(&config);
            Ok(())
        }
    }
}

async fn lookup(
    config: &ClientConfig,
    user_agent: &str,
    capabilities: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let client = CloudClient::new(config)?;
    let record = client
        .resolve(Identity::UserAgent(user_agent), capabilities)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record, capabilities);
    }

    if record.is_degraded() && !record.has_capabilities() {
        anyhow::bail!("lookup failed");
    }
    Ok(())
}

fn print_record(record: &DeviceRecord, capabilities: &[String]) {
    println!("device:  {}", record.device_id);
    println!("origin:  {}", record.origin);
    println!("api:     {}", record.server_version);
    println!("updated: {}", record.last_dataset_update.to_rfc3339());

    for name in capabilities {
        println!("  {name} = {}", record.get(name));
    }

    let mut errors: Vec<_> = record.errors.iter().collect();
    errors.sort();
    for (tag, message) in errors {
        println!("  error [{tag}]: {message}");
    }
}

fn print_config(config: &ClientConfig) {
    let (user, _) = config.api_key().split_once(':').unwrap_or(("", ""));

    println!("client:       {}", CloudClient::client_version());
    println!("api key:      {user}:********");
    for server in &config.servers {
        println!("server:       {server}");
    }
    println!("compression:  {}", config.compression);
    println!("connect:      {} ms", config.connection_timeout.as_millis());
    println!("read:         {} ms", config.read_timeout.as_millis());
    println!("proxy:        {}", config.proxy.as_deref().unwrap_or("none"));
    match config.report_interval {
        Some(interval) => println!("report every: {} s", interval.as_secs()),
        None => println!("report every: never"),
    }
    match config.cache.ttl {
        Some(ttl) => println!("cache:        {} ({} s)", config.cache.kind, ttl.as_secs()),
        None => println!("cache:        {}", config.cache.kind),
    }
}
