use anyhow::Result;
use clap::{Parser, Subcommand};
use contactd::config::{self, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Authenticated contact book service.
#[derive(Parser, Debug)]
#[command(name = "contactd", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.contactd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Bind address (overrides config and CONTACTD_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config and CONTACTD_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contactd=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate()?;
            contactd::gateway::run_gateway(config).await
        }
        Commands::Init => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let mut config = Config::default();
            config.auth.token_secret = Some(contactd::auth::token::generate_secret());
            config.write_new(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "contactd", "--config", "/tmp/c.toml", "serve", "--port", "8080",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.toml")));
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(8080));
            }
            Commands::Init => panic!("expected serve"),
        }
    }
}
