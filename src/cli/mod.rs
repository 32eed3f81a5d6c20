pub mod client;
pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "tenant-admin")]
#[command(about = "Tenant Admin CLI - Command-line interface for the multi-tenant admin API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Remote server management")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Tenant access: impersonation and secure login")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Multi-factor authentication for the logged-in account")]
    Mfa {
        #[command(subcommand)]
        cmd: commands::mfa::MfaCommands,
    },

    #[command(about = "Offline helpers for operators")]
    Util {
        #[command(subcommand)]
        cmd: commands::util::UtilCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Server { cmd } => commands::server::handle(cmd, output_format).await,
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, output_format).await,
        Commands::Mfa { cmd } => commands::mfa::handle(cmd, output_format).await,
        Commands::Util { cmd } => commands::util::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_impersonate_with_global_json_flag() {
        let cli = Cli::try_parse_from([
            "tenant-admin",
            "tenant",
            "impersonate",
            "6f1c1a7e-3d55-4d7b-9b1e-0d6f4f3c2a11",
            "0b0c5f8e-8a1d-4b4e-8c55-3f7a3c9c1e22",
            "--json",
        ])
        .unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Tenant { cmd: commands::tenant::TenantCommands::Impersonate { .. } }
        ));
    }

    #[test]
    fn login_requires_email() {
        assert!(Cli::try_parse_from(["tenant-admin", "auth", "login"]).is_err());
    }
}
