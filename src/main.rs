use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use gatehouse::config::AppConfig;
use gatehouse::{logging, webui};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "LinkedIn login redirect and payments SDK bootstrap service")]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "GATEHOUSE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },

    /// Validate configuration without starting the server
    CheckConfig,

    /// Display version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            logging::init(logging::DEFAULT_FILTER);
            let config = load_config();
            if let Err(e) = webui::run_server(bind, config) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            let config = load_config();
            println!("Configuration OK");
            println!("  LinkedIn client:   {}", config.linkedin.client_id);
            println!("  LinkedIn redirect: {}", config.linkedin.redirect_uri);
            println!("  LinkedIn scopes:   {}", config.linkedin.scopes);
            println!("  Price id:          {}", config.server_payments.price_id);
        }
        Commands::Version => {
            println!("Gatehouse v{}", VERSION);
        }
    }
}

/// Misconfigured deployments never get as far as binding a socket.
fn load_config() -> AppConfig {
    match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
