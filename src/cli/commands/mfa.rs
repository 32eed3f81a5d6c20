use clap::Subcommand;
use serde_json::json;
use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum MfaCommands {
    #[command(about = "Show whether MFA is enabled")]
    Status,

    #[command(about = "Start enrollment: prints the secret, otpauth URI and backup codes")]
    Setup,

    #[command(about = "Confirm enrollment with a code from the authenticator")]
    Verify {
        #[arg(help = "Six-digit TOTP code")]
        code: String,
    },

    #[command(about = "Turn MFA off (requires the account password)")]
    Disable {
        #[arg(long, help = "Password (falls back to TENANT_ADMIN_PASSWORD, then stdin)")]
        password: Option<String>,
    },

    #[command(about = "Replace all backup codes")]
    BackupCodes {
        #[arg(help = "Current TOTP code")]
        code: String,
    },
}

pub async fn handle(cmd: MfaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_environment()?.require_session()?;

    match cmd {
        MfaCommands::Status => {
            let status = client.get("/auth/mfa").await?;
            output_value(&output_format, &status, |status| {
                println!("Enabled:      {}", status["enabled"].as_bool().unwrap_or(false));
                println!("Backup codes: {}", status["backup_codes_remaining"].as_u64().unwrap_or(0));
            })
        }
        MfaCommands::Setup => {
            let enrollment = client.post_empty("/auth/mfa/setup").await?;
            output_value(&output_format, &enrollment, |enrollment| {
                println!("Secret:  {}", enrollment["secret"].as_str().unwrap_or("-"));
                println!("URI:     {}", enrollment["otpauth_uri"].as_str().unwrap_or("-"));
                println!("Backup codes (shown once):");
                for code in enrollment["backup_codes"].as_array().into_iter().flatten() {
                    println!("  {}", code.as_str().unwrap_or("-"));
                }
                println!("Run `tenant-admin mfa verify <code>` to finish enrollment");
            })
        }
        MfaCommands::Verify { code } => {
            client.post("/auth/mfa/verify", &json!({ "code": code })).await?;
            output_success(&output_format, "MFA enabled", Some(json!({ "enabled": true })))
        }
        MfaCommands::Disable { password } => {
            let password = match password {
                Some(password) => password,
                None => read_secret("TENANT_ADMIN_PASSWORD", "Password")?,
            };
            client.post("/auth/mfa/disable", &json!({ "password": password })).await?;
            output_success(&output_format, "MFA disabled", Some(json!({ "enabled": false })))
        }
        MfaCommands::BackupCodes { code } => {
            let codes = client.post("/auth/mfa/backup-codes", &json!({ "code": code })).await?;
            output_value(&output_format, &codes, |codes| {
                println!("New backup codes (shown once):");
                for code in codes["backup_codes"].as_array().into_iter().flatten() {
                    println!("  {}", code.as_str().unwrap_or("-"));
                }
            })
        }
    }
}
