use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use vcd_saml_auth::{AuthClientConfig, Connector, observability};

/// CLI arguments for vcd-saml-auth
#[derive(Parser, Debug)]
#[command(version, about = "SAML/WS-Trust login for federated cloud control planes", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "vcd-saml-auth.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Authenticate and print a summary of the session
    Login {
        /// Authenticate this many times through the session cache
        #[arg(long, default_value = "1")]
        repeat: u32,
    },
    /// Load and validate the config file, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AuthClientConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::CheckConfig => {
            println!("{}: OK", args.config.display());
            println!("  url:       {}", config.connection.url);
            println!("  org:       {}", config.connection.login_org());
            println!("  auth_type: {}", config.connection.auth_type);
            println!(
                "  cache:     {} (ttl {}s)",
                if config.cache.enabled { "enabled" } else { "disabled" },
                config.cache.ttl_secs
            );
            ExitCode::SUCCESS
        }
        Command::Login { repeat } => {
            if let Err(e) = observability::init_tracing(&config.observability) {
                eprintln!("Failed to initialize tracing: {}", e);
                return ExitCode::FAILURE;
            }
            run_login(&config, repeat).await
        }
    }
}

async fn run_login(config: &AuthClientConfig, repeat: u32) -> ExitCode {
    let connector = Connector::from_config(config);

    for attempt in 1..=repeat.max(1) {
        match connector.client(&config.connection).await {
            Ok(client) => {
                tracing::debug!(attempt, "Login succeeded");
                if attempt == 1 {
                    println!("Authenticated to {}", client.base_url());
                    println!("  org:         {}", client.org());
                    println!("  vdc:         {}", client.vdc().unwrap_or("-"));
                    println!("  api_version: {}", client.api_version());
                    println!("  token:       <{} chars>", client.token().len());
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if repeat > 1 {
        println!(
            "  sessions served from cache: {}",
            connector.cache().served()
        );
    }
    ExitCode::SUCCESS
}
