//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Courier personal assistant CLI
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Personal AI assistant host over MCP servers")]
#[command(version)]
pub struct Cli {
    /// Backend descriptor and agent roster YAML
    #[arg(long, global = true, default_value = "config/servers.yaml")]
    pub servers: PathBuf,

    /// LLM provider YAML
    #[arg(long = "llm-config", global = true, default_value = "config/llm.yaml")]
    pub llm_config: PathBuf,

    /// SQLite database file
    #[arg(long, global = true, default_value = "data/courier.db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat session
    Chat {
        /// User id memories and messages are filed under
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Run the webhook server
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// List the aggregated tool catalog and exit
    Tools,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            servers_config: self.servers.clone(),
            llm_config: self.llm_config.clone(),
            db_path: self.db.clone(),
            ..AppConfig::default()
        }
    }
}

/// Run the parsed CLI command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.app_config();

    match cli.command {
        Some(Commands::Chat { user }) => crate::chat::run(config, &user).await,
        Some(Commands::Serve { bind }) => {
            let config = AppConfig { bind, ..config };
            crate::server::run(config).await
        }
        Some(Commands::Tools) => crate::chat::list_tools(config).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
