use clap::Subcommand;
use serde_json::{json, Value};
use crate::cli::client::ApiClient;
use crate::cli::config::{load_environment_config, store_session};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::rbac::MatchMode;
use crate::services::LoginRequest;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the current server")]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Tenant slug; omit for platform accounts")]
        tenant: Option<String>,
        #[arg(long, help = "Password (falls back to TENANT_ADMIN_PASSWORD, then stdin)")]
        password: Option<String>,
        #[arg(long, help = "TOTP or backup code when MFA is enabled")]
        code: Option<String>,
    },

    #[command(about = "Revoke the current session")]
    Logout,

    #[command(about = "Show the locally stored session")]
    Status,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "List the permissions of the current session")]
    Permissions,

    #[command(about = "Check whether the current session holds permissions")]
    Check {
        #[arg(required = true, help = "Permissions to check")]
        permissions: Vec<String>,
        #[arg(long, help = "Pass when any permission is held instead of all")]
        any: bool,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, tenant, password, code } => {
            let password = match password {
                Some(password) => password,
                None => read_secret("TENANT_ADMIN_PASSWORD", "Password")?,
            };
            let request = LoginRequest { tenant, email, password, code };

            let client = ApiClient::from_environment()?;
            let session = match client.post("/auth/login", &request).await {
                Err(e) if e.code() == Some("MFA_REQUIRED") => {
                    return Err(anyhow::anyhow!("This account has MFA enabled; pass --code"));
                }
                other => other?,
            };
            let info = remember_session(&session)?;

            output_success(
                &output_format,
                &format!("Logged in as {}", info.email),
                Some(json!({ "session_id": session["session_id"], "expires_at": info.expires_at })),
            )
        }
        AuthCommands::Logout => {
            let client = ApiClient::from_environment()?.require_session()?;
            let result = client.post_empty("/auth/logout").await;
            // Forget the token even when the server already considers it dead
            store_session(None)?;
            let view = match result {
                Err(e) if e.code() == Some("UNAUTHORIZED") => json!({ "revoked": false }),
                other => other?,
            };
            output_success(&output_format, "Logged out", Some(view))
        }
        AuthCommands::Status => {
            let env_config = load_environment_config()?;
            match env_config.session {
                Some(session) => {
                    let value = json!({
                        "email": session.email,
                        "access_type": session.access_type,
                        "tenant_id": session.tenant_id,
                        "expires_at": session.expires_at,
                        "expired": session.is_expired(),
                    });
                    output_value(&output_format, &value, |_| {
                        println!("Email:       {}", session.email);
                        println!("Access type: {}", session.access_type);
                        println!("Tenant:      {}", session.tenant_id.as_deref().unwrap_or("-"));
                        println!("Expired:     {}", session.is_expired());
                    })
                }
                None => output_no_current_item(&output_format, "session"),
            }
        }
        AuthCommands::Whoami => {
            let client = ApiClient::from_environment()?.require_session()?;
            let me = client.get("/auth/whoami").await?;
            output_value(&output_format, &me, |me| {
                println!("User:        {} ({})", me["email"].as_str().unwrap_or("-"), me["user_id"].as_str().unwrap_or("-"));
                println!("Access type: {}", me["access_type"].as_str().unwrap_or("-"));
                if let Some(tenant) = me["tenant_id"].as_str() {
                    println!("Tenant:      {}", tenant);
                }
                if let Some(original) = me["original_user"]["email"].as_str() {
                    println!("Acting for:  {}", original);
                }
                print_list("Permissions", &me["permissions"]);
            })
        }
        AuthCommands::Permissions => {
            let client = ApiClient::from_environment()?.require_session()?;
            let view = client.get("/auth/permissions").await?;
            output_value(&output_format, &view, |view| print_list("Permissions", &view["permissions"]))
        }
        AuthCommands::Check { permissions, any } => {
            let mode = if any { MatchMode::Any } else { MatchMode::All };
            let client = ApiClient::from_environment()?.require_session()?;
            let view = client
                .post("/auth/permissions/check", &json!({ "required": permissions, "mode": mode }))
                .await?;
            output_value(&output_format, &view, |view| {
                if view["allowed"].as_bool().unwrap_or(false) {
                    println!("✓ allowed");
                } else {
                    println!("✗ denied");
                    print_list("Missing", &view["missing"]);
                }
            })
        }
    }
}

fn print_list(label: &str, values: &Value) {
    let items: Vec<&str> = values
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if items.is_empty() {
        println!("{}: (none)", label);
    } else {
        println!("{}:", label);
        for item in items {
            println!("  {}", item);
        }
    }
}
