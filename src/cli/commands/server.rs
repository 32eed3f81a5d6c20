use clap::Subcommand;
use serde_json::json;
use crate::cli::client::ApiClient;
use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Register remote server")]
    Add {
        #[arg(help = "Server name")]
        name: String,
        #[arg(help = "Server URL, e.g. http://localhost:3000")]
        url: String,
        #[arg(long, default_value = "", help = "Free-form description")]
        description: String,
    },

    #[command(about = "List all servers")]
    List,

    #[command(about = "Show currently selected server")]
    Current,

    #[command(about = "Switch to server (persistent selection)")]
    Use {
        #[arg(help = "Server name to switch to")]
        name: String,
    },

    #[command(about = "Remove server from registry")]
    Delete {
        #[arg(help = "Server name to delete")]
        name: String,
    },

    #[command(about = "Health check specific server (defaults to current server)")]
    Ping {
        #[arg(help = "Server name to ping")]
        name: Option<String>,
    },

    #[command(about = "Show server information from API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Add { name, url, description } => {
            url::Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;

            let mut config = load_server_config()?;
            if config.servers.contains_key(&name) {
                return Err(anyhow::anyhow!("Server '{}' already exists", name));
            }
            config.servers.insert(name.clone(), ServerInfo::new(url.clone(), description));
            save_server_config(&config)?;

            // The first server becomes current automatically
            let mut env_config = load_environment_config()?;
            if env_config.current_server.is_none() {
                env_config.current_server = Some(name.clone());
                save_environment_config(&env_config)?;
            }

            output_success(
                &output_format,
                &format!("Server '{}' added", name),
                Some(json!({ "name": name, "url": url })),
            )
        }
        ServerCommands::List => {
            let config = load_server_config()?;
            let env_config = load_environment_config()?;

            if config.servers.is_empty() {
                return output_empty_collection(&output_format, "servers", "No servers configured");
            }

            match output_format {
                OutputFormat::Json => {
                    let servers: Vec<_> = config.servers.iter().map(|(name, info)| {
                        json!({
                            "name": name,
                            "url": info.url,
                            "description": info.description,
                            "status": info.status,
                            "last_ping": info.last_ping,
                            "current": env_config.current_server.as_ref() == Some(name)
                        })
                    }).collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "servers": servers }))?);
                }
                OutputFormat::Text => {
                    println!("{:<15} {:<35} {:<8} {}", "NAME", "URL", "STATUS", "DESCRIPTION");
                    println!("{}", "-".repeat(80));

                    for (name, info) in &config.servers {
                        let current_marker = if env_config.current_server.as_ref() == Some(name) { "*" } else { " " };
                        let status = serde_json::to_value(info.status)?;
                        println!("{}{:<14} {:<35} {:<8} {}",
                            current_marker, name, info.url, status.as_str().unwrap_or("unknown"), info.description);
                    }
                }
            }
            Ok(())
        }
        ServerCommands::Current => {
            let env_config = load_environment_config()?;
            match env_config.current_server {
                Some(_) => {
                    let (name, info) = current_server()?;
                    let details = json!({ "name": name, "url": info.url, "description": info.description });
                    output_current_item(&output_format, "server", &name, details)
                }
                None => output_no_current_item(&output_format, "server"),
            }
        }
        ServerCommands::Use { name } => {
            if !load_server_config()?.servers.contains_key(&name) {
                return Err(anyhow::anyhow!("{} '{}' not found", capitalize("server"), name));
            }

            // A session belongs to the server that issued it
            let mut env_config = load_environment_config()?;
            env_config.current_server = Some(name.clone());
            env_config.session = None;
            save_environment_config(&env_config)?;

            output_success(
                &output_format,
                &format!("Switched to server '{}'", name),
                Some(json!({ "current_server": name })),
            )
        }
        ServerCommands::Delete { name } => {
            let mut config = load_server_config()?;
            if config.servers.remove(&name).is_none() {
                return Err(anyhow::anyhow!("{} '{}' not found", capitalize("server"), name));
            }
            save_server_config(&config)?;

            let mut env_config = load_environment_config()?;
            if env_config.current_server.as_ref() == Some(&name) {
                env_config.current_server = None;
                env_config.session = None;
                save_environment_config(&env_config)?;
            }

            output_success(&output_format, &format!("Server '{}' deleted successfully", name), None)
        }
        ServerCommands::Ping { name } => {
            let name = match name {
                Some(name) => name,
                None => current_server()?.0,
            };

            let mut config = load_server_config()?;
            let info = config
                .servers
                .get_mut(&name)
                .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", name))?;
            let status = ping_server(info).await;
            info.update_ping(status);
            let url = info.url.clone();
            save_server_config(&config)?;

            match status {
                ServerStatus::Up => output_success(
                    &output_format,
                    &format!("Server '{}' is up", name),
                    Some(json!({ "name": name, "url": url, "status": status })),
                ),
                _ => Err(anyhow::anyhow!("Server '{}' at {} is not responding", name, url)),
            }
        }
        ServerCommands::Info => {
            let client = ApiClient::from_environment()?;
            let info = client.get("/").await?;
            output_value(&output_format, &info, |info| {
                println!("Name:        {}", info["name"].as_str().unwrap_or("-"));
                println!("Version:     {}", info["version"].as_str().unwrap_or("-"));
                println!("Description: {}", info["description"].as_str().unwrap_or("-"));
            })
        }
    }
}
