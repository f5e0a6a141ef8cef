use clap::{Parser, Subcommand};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::Credits;
use crate::ports::LedgerStore;
use crate::services::{history, AccountService};

#[derive(Parser)]
#[command(name = "vaulty-ledger")]
#[command(about = "Vaulty credit ledger service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Print the effective configuration
    Config,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Print a user's transaction history, newest first
    History {
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,

        /// Maximum number of entries to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account with a zero balance
    Open {
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,
    },

    /// Show the current balance
    Balance {
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,
    },

    /// Credit purchased credits to an account
    Issue {
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,

        #[arg(value_name = "AMOUNT")]
        amount: Credits,

        #[arg(short, long)]
        description: Option<String>,

        /// Payment reference
        #[arg(long)]
        related_id: Option<Uuid>,
    },

    /// Close an account; its history is kept
    Close {
        #[arg(value_name = "USER_ID")]
        user_id: Uuid,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(url) = config.database_url.as_deref() else {
        anyhow::bail!("DATABASE_URL is required to run migrations");
    };

    let pool = crate::db::create_pool(url, config.database_max_connections).await?;
    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

/// Store for one-shot commands. An in-memory store would vanish with the process,
/// so these commands need a database.
pub async fn persistent_store(config: &Config) -> anyhow::Result<Arc<dyn LedgerStore>> {
    if config.database_url.is_none() {
        anyhow::bail!("DATABASE_URL is required for account and history commands");
    }
    crate::build_store(config).await
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: <unset, in-memory store>"),
    }
    println!("  Database Max Connections: {}", config.database_max_connections);
    println!("  Log Format: {:?}", config.log_format);
    println!("  History Page Limit: {}", config.history_page_limit);

    println!("✓ Configuration is valid");
    Ok(())
}

pub async fn handle_account(store: Arc<dyn LedgerStore>, command: AccountCommands) -> anyhow::Result<()> {
    let accounts = AccountService::new(store);

    match command {
        AccountCommands::Open { user_id } => {
            let account = accounts.open_account(user_id).await?;
            println!("✓ Account {} open, balance {}", account.user_id, account.balance);
        }
        AccountCommands::Balance { user_id } => {
            let account = accounts.get_account(user_id).await?;
            let state = if account.is_closed() { " (closed)" } else { "" };
            println!("{}: {} credits{}", user_id, account.balance, state);
        }
        AccountCommands::Issue {
            user_id,
            amount,
            description,
            related_id,
        } => {
            let entry = accounts
                .credit_issue(user_id, amount, description.as_deref(), related_id)
                .await?;
            println!(
                "✓ Issued {} credits to {}, balance {}",
                entry.amount, user_id, entry.balance_after
            );
        }
        AccountCommands::Close { user_id } => {
            accounts.close_account(user_id).await?;
            println!("✓ Account {} closed", user_id);
        }
    }

    Ok(())
}

pub async fn handle_history(
    store: Arc<dyn LedgerStore>,
    user_id: Uuid,
    limit: usize,
) -> anyhow::Result<()> {
    AccountService::new(store.clone()).get_account(user_id).await?;

    let entries: Vec<_> = history(store, user_id, limit.clamp(1, 100))
        .take(limit)
        .try_collect()
        .await?;

    if entries.is_empty() {
        println!("No transactions found");
        return Ok(());
    }

    println!(
        "{:<25} {:<22} {:>10} {:>10}  {}",
        "Date", "Category", "Amount", "Balance", "Description"
    );
    println!("{}", "-".repeat(90));
    for entry in entries {
        println!(
            "{:<25} {:<22} {:>10} {:>10}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.category.as_str(),
            entry.amount,
            entry.balance_after,
            entry.description
        );
    }

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
