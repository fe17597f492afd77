use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check a running server's /health endpoint")]
    Ping {
        #[arg(long, default_value = "http://127.0.0.1:3000", help = "Server base URL")]
        url: String,
    },

    #[command(about = "Show server information from the API root endpoint")]
    Info {
        #[arg(long, default_value = "http://127.0.0.1:3000", help = "Server base URL")]
        url: String,
    },
}

pub async fn handle(cmd: ServerCommands, output: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Ping { url } => ping(output, &url).await,
        ServerCommands::Info { url } => info(output, &url).await,
    }
}

fn endpoint(base: &str, path: &str) -> anyhow::Result<url::Url> {
    let base = url::Url::parse(base).with_context(|| format!("invalid server URL: {}", base))?;
    base.join(path).context("failed to build endpoint URL")
}

async fn ping(output: OutputFormat, base: &str) -> anyhow::Result<()> {
    let endpoint = endpoint(base, "health")?;
    let response = reqwest::get(endpoint.clone())
        .await
        .with_context(|| format!("failed to reach {}", endpoint))?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    match output {
        OutputFormat::Json => {
            println!("{}", json!({ "status": status.as_u16(), "body": body }));
        }
        OutputFormat::Text => {
            let database = body["data"]["database"].as_str().unwrap_or("unknown");
            println!("Server: {} ({})", status, database);
        }
    }

    anyhow::ensure!(status.is_success(), "server reported {}", status);
    Ok(())
}

async fn info(output: OutputFormat, base: &str) -> anyhow::Result<()> {
    let endpoint = endpoint(base, "/")?;
    let response = reqwest::get(endpoint.clone())
        .await
        .with_context(|| format!("failed to reach {}", endpoint))?;

    let body: Value = response.json().await.context("server returned non-JSON body")?;

    match output {
        OutputFormat::Json => println!("{}", body),
        OutputFormat::Text => {
            let name = body["data"]["name"].as_str().unwrap_or("unknown");
            let version = body["data"]["version"].as_str().unwrap_or("unknown");
            println!("{} v{}", name, version);
            if let Some(endpoints) = body["data"]["endpoints"].as_object() {
                for (key, value) in endpoints {
                    println!("  {:<14} {}", key, value.as_str().unwrap_or(""));
                }
            }
        }
    }

    Ok(())
}
