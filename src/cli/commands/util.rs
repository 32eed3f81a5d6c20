use clap::Subcommand;
use serde_json::json;
use crate::auth::password::hash_password;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::store::fixture::Fixture;

#[derive(Subcommand)]
pub enum UtilCommands {
    #[command(about = "Hash a password for use as password_hash in fixtures or SQL")]
    HashPassword {
        #[arg(help = "Password (falls back to TENANT_ADMIN_PASSWORD, then stdin)")]
        password: Option<String>,
    },

    #[command(about = "Parse a fixture file and report what it would load")]
    CheckFixture {
        #[arg(help = "Path to the YAML fixture")]
        path: String,
    },
}

pub async fn handle(cmd: UtilCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UtilCommands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_secret("TENANT_ADMIN_PASSWORD", "Password")?,
            };
            let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "password_hash": hash }))?),
                OutputFormat::Text => println!("{}", hash),
            }
            Ok(())
        }
        UtilCommands::CheckFixture { path } => {
            let fixture = Fixture::load(&path)?;
            let store = crate::store::MemoryStore::new();
            let summary = fixture.apply(&store).await?;
            output_success(
                &output_format,
                &format!("Fixture '{}' is valid", path),
                Some(json!({
                    "tenants": summary.tenants,
                    "roles": summary.roles,
                    "users": summary.users,
                    "grants": summary.grants,
                })),
            )
        }
    }
}
