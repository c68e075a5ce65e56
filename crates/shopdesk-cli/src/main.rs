use anyhow::Result;
use clap::{Parser, Subcommand};
use shopdesk_core::ClientConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "shopdesk")]
#[command(about = "Shop console client - session, presence and navigation from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive console session
    Run(commands::run::RunArgs),
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::load()?;

    match cli.command {
        Commands::Config => commands::config::show(&config)?,
        Commands::Run(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::run::run(config, args))?;
        }
    }

    Ok(())
}
