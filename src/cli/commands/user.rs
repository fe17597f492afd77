use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::auth;
use crate::cli::OutputFormat;
use crate::db;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "System")]
        first_name: String,

        #[arg(long, default_value = "Admin")]
        last_name: String,
    },

    #[command(about = "Activate a pending or deactivated account")]
    Activate {
        email: String,
    },

    #[command(about = "Show role distribution and accounts missing a department")]
    CheckRoles,
}

pub async fn handle(cmd: UserCommands, output: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::CreateAdmin { email, password, first_name, last_name } => {
            create_admin(output, email, password, first_name, last_name).await
        }
        UserCommands::Activate { email } => activate(output, email).await,
        UserCommands::CheckRoles => check_roles(output).await,
    }
}

async fn create_admin(
    output: OutputFormat,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    anyhow::ensure!(email.contains('@'), "invalid email: {}", email);
    auth::validate_password(&password).map_err(|e| anyhow::anyhow!(e))?;

    let password_hash = auth::hash_password(&password).context("failed to hash password")?;

    let pool = db::pool().await.context("failed to connect to database")?;
    let result = sqlx::query(
        "INSERT INTO users (first_name, last_name, email, password_hash, role, status) \
         VALUES ($1, $2, $3, $4, 'admin', 'active')",
    )
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(&email)
    .bind(&password_hash)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            match output {
                OutputFormat::Json => println!("{}", json!({ "created": email })),
                OutputFormat::Text => println!("Administrator account created: {}", email),
            }
            Ok(())
        }
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
            anyhow::bail!("an account with email {} already exists", email)
        }
        Err(e) => Err(e).context("failed to create administrator"),
    }
}

async fn activate(output: OutputFormat, email: String) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();

    let pool = db::pool().await.context("failed to connect to database")?;
    let result = sqlx::query(
        "UPDATE users SET status = 'active', updated_at = now() \
         WHERE email = $1 AND deleted_at IS NULL",
    )
    .bind(&email)
    .execute(pool)
    .await
    .context("failed to update account")?;

    anyhow::ensure!(result.rows_affected() > 0, "no account found for {}", email);

    match output {
        OutputFormat::Json => println!("{}", json!({ "activated": email })),
        OutputFormat::Text => println!("Account activated: {}", email),
    }
    Ok(())
}

async fn check_roles(output: OutputFormat) -> anyhow::Result<()> {
    let pool = db::pool().await.context("failed to connect to database")?;

    let counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT role, COUNT(*) FROM users WHERE deleted_at IS NULL GROUP BY role ORDER BY role",
    )
    .fetch_all(pool)
    .await?;

    // Admins work across departments; everyone else should belong to one
    let missing_department: Vec<(String,)> = sqlx::query_as(
        "SELECT email FROM users \
         WHERE deleted_at IS NULL AND department_id IS NULL AND role <> 'admin' \
         ORDER BY email",
    )
    .fetch_all(pool)
    .await?;

    match output {
        OutputFormat::Json => {
            let roles: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(role, count)| (role.clone(), json!(count)))
                .collect();
            let missing: Vec<&str> =
                missing_department.iter().map(|(email,)| email.as_str()).collect();
            println!("{}", json!({ "roles": roles, "missing_department": missing }));
        }
        OutputFormat::Text => {
            println!("Role distribution:");
            for (role, count) in &counts {
                println!("  {:<10} {}", role, count);
            }
            if missing_department.is_empty() {
                println!("All non-admin accounts have a department.");
            } else {
                println!("Accounts missing a department:");
                for (email,) in &missing_department {
                    println!("  {}", email);
                }
            }
        }
    }
    Ok(())
}
