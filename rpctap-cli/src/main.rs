//! RpcTap CLI - Run the interception proxy and work with its output

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rpctap_core::config::ProxyConfig;
use rpctap_core::proxy::ProxyServer;
use rpctap_core::record::SessionLog;
use rpctap_core::script::ScriptletGenerator;

#[derive(Parser)]
#[command(name = "rpctap")]
#[command(about = "Transparent RPC interception proxy", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy until EXIT arrives on the admin channel
    Serve {
        /// Configuration file
        #[arg(short, long, default_value = "rpctap.toml", env = "RPCTAP_CONFIG")]
        config: PathBuf,
    },
    /// Render a recorded session log as a reconstruction script
    Render {
        /// Session log file (JSONL)
        session: PathBuf,
        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = ProxyConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let server = ProxyServer::builder(config).build().await?;
            server.serve().await?;
        }
        Commands::Render { session, output } => {
            let log = SessionLog::load(&session)
                .with_context(|| format!("loading {}", session.display()))?;
            let generator = ScriptletGenerator::new();
            let mut script = String::new();
            for envelope in &log.invocations {
                script.push_str(&generator.render_invocation(&envelope.invocation, envelope.sequence));
            }
            match output {
                Some(path) => std::fs::write(&path, script)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{script}"),
            }
        }
        Commands::Version => {
            println!("rpctap {}", env!("CARGO_PKG_VERSION"));
            println!("rpctap-core {}", rpctap_core::VERSION);
        }
    }

    Ok(())
}
