use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;
use crate::cli::client::ApiClient;
use crate::cli::config::{load_environment_config, store_session};
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List tenants you can enter and how")]
    Options,

    #[command(about = "List the users of a tenant")]
    Users {
        #[arg(help = "Tenant ID")]
        tenant_id: Uuid,
    },

    #[command(about = "Act as a tenant user")]
    Impersonate {
        #[arg(help = "Tenant ID")]
        tenant_id: Uuid,
        #[arg(help = "User ID within the tenant")]
        user_id: Uuid,
    },

    #[command(about = "Enter a tenant with super-admin access")]
    SecureLogin {
        #[arg(help = "Tenant ID")]
        tenant_id: Uuid,
    },

    #[command(about = "End the impersonation or secure-login session")]
    End,
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::Options => {
            let client = ApiClient::from_environment()?.require_session()?;
            let options = client.get("/tenants/access-options").await?;
            let rows = options.as_array().cloned().unwrap_or_default();

            if rows.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants available");
            }

            output_value(&output_format, &options, |_| {
                println!("{:<38} {:<15} {:<25} {:<8} {:<6} {}", "ID", "SLUG", "NAME", "ACCESS", "IMP", "SECURE");
                println!("{}", "-".repeat(105));
                for row in &rows {
                    println!("{:<38} {:<15} {:<25} {:<8} {:<6} {}",
                        str_of(row, "tenant_id"),
                        str_of(row, "slug"),
                        str_of(row, "name"),
                        str_of(row, "access_level"),
                        yes_no(row, "can_impersonate"),
                        yes_no(row, "can_secure_login"));
                }
            })
        }
        TenantCommands::Users { tenant_id } => {
            let client = ApiClient::from_environment()?.require_session()?;
            let users = client.get(&format!("/tenants/{}/users", tenant_id)).await?;
            let rows = users.as_array().cloned().unwrap_or_default();

            if rows.is_empty() {
                return output_empty_collection(&output_format, "users", "No users in tenant");
            }

            output_value(&output_format, &users, |_| {
                println!("{:<38} {:<30} {}", "ID", "EMAIL", "NAME");
                println!("{}", "-".repeat(90));
                for row in &rows {
                    println!("{:<38} {:<30} {}", str_of(row, "id"), str_of(row, "email"), str_of(row, "name"));
                }
            })
        }
        TenantCommands::Impersonate { tenant_id, user_id } => {
            let client = ApiClient::from_environment()?.require_session()?;
            let session = client
                .post("/tenants/impersonate", &json!({ "tenant_id": tenant_id, "user_id": user_id }))
                .await?;
            let info = remember_session(&session)?;

            output_success(
                &output_format,
                &format!("Now impersonating {} in tenant {}", info.email, tenant_id),
                Some(json!({ "session_id": session["session_id"], "redirect_to": session["redirect_to"] })),
            )
        }
        TenantCommands::SecureLogin { tenant_id } => {
            let client = ApiClient::from_environment()?.require_session()?;
            let session = client
                .post("/tenants/secure-login", &json!({ "tenant_id": tenant_id }))
                .await?;
            remember_session(&session)?;

            output_success(
                &output_format,
                &format!("Secure login to tenant {}", tenant_id),
                Some(json!({ "session_id": session["session_id"], "redirect_to": session["redirect_to"] })),
            )
        }
        TenantCommands::End => {
            // End is idempotent and works without a live session
            let client = ApiClient::from_environment()?;
            let view = client.post_empty("/tenant-access/impersonate/end").await?;

            match view.get("session").filter(|s| !s.is_null()) {
                Some(session) => {
                    remember_session(session)?;
                }
                None => {
                    let elevated = load_environment_config()?
                        .session
                        .is_some_and(|s| s.access_type != "normal");
                    if elevated {
                        store_session(None)?;
                    }
                }
            }

            let message = if view["ended"].as_bool().unwrap_or(false) {
                "Elevated session ended"
            } else {
                "No elevated session was active"
            };
            output_success(&output_format, message, Some(json!({ "redirect_to": view["redirect_to"] })))
        }
    }
}

fn str_of<'a>(row: &'a Value, key: &str) -> &'a str {
    row[key].as_str().unwrap_or("-")
}

fn yes_no(row: &Value, key: &str) -> &'static str {
    if row[key].as_bool().unwrap_or(false) { "yes" } else { "no" }
}
