use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::db;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Apply pending migrations")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Health,
}

pub async fn handle(cmd: DbCommands, output: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DbCommands::Migrate => migrate(output).await,
        DbCommands::Health => health(output).await,
    }
}

async fn migrate(output: OutputFormat) -> anyhow::Result<()> {
    let pool = db::pool().await.context("failed to connect to database")?;
    db::migrate(pool).await.context("migration failed")?;

    match output {
        OutputFormat::Json => println!("{}", json!({ "migrated": true })),
        OutputFormat::Text => println!("Migrations up to date"),
    }
    Ok(())
}

async fn health(output: OutputFormat) -> anyhow::Result<()> {
    match db::health_check().await {
        Ok(_) => {
            match output {
                OutputFormat::Json => println!("{}", json!({ "database": "ok" })),
                OutputFormat::Text => println!("Database: ok"),
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("database unavailable: {}", e),
    }
}
