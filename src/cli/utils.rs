use serde_json::{json, Value};
use crate::cli::config::{store_session, SessionInfo};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print an API payload: pretty JSON, or the given text rendering
pub fn output_value(
    output_format: &OutputFormat,
    value: &Value,
    text: impl FnOnce(&Value),
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Output current item information in the appropriate format
pub fn output_current_item(
    output_format: &OutputFormat,
    item_type: &str,
    name: &str,
    details: Value,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                format!("current_{}", item_type): details
            }))?);
        }
        OutputFormat::Text => {
            println!("Current {}: {}", item_type, name);
            if let Some(url) = details.get("url").and_then(Value::as_str) {
                println!("URL: {}", url);
            }
            if let Some(desc) = details.get("description").and_then(Value::as_str) {
                if !desc.is_empty() {
                    println!("Description: {}", desc);
                }
            }
        }
    }
    Ok(())
}

/// Output "no current item" message in the appropriate format
pub fn output_no_current_item(
    output_format: &OutputFormat,
    item_type: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                format!("current_{}", item_type): null
            }))?);
        }
        OutputFormat::Text => {
            println!("No current {} set", item_type);
        }
    }
    Ok(())
}

/// Remember the session returned by login, impersonation, secure login or end
pub fn remember_session(session: &Value) -> anyhow::Result<SessionInfo> {
    let token = session["token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Server response did not include a session token"))?;

    let info = SessionInfo {
        token: token.to_string(),
        email: session["user"]["email"].as_str().unwrap_or_default().to_string(),
        access_type: session["access_type"].as_str().unwrap_or("normal").to_string(),
        expires_at: session["expires_at"].as_i64().unwrap_or_default(),
        tenant_id: session["tenant_id"].as_str().map(String::from),
    };
    store_session(Some(info.clone()))?;
    Ok(info)
}

/// Read a secret from the named environment variable or the first line of stdin
pub fn read_secret(env_var: &str, prompt: &str) -> anyhow::Result<String> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(value);
    }

    eprint!("{}: ", prompt);
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        anyhow::bail!("{} is required", prompt);
    }
    Ok(secret)
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
