use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;

use crate::application::{LedgerService, NewAccount, TransferRequest};
use crate::domain::format_cents;
use crate::storage::StoreOptions;
use crate::telemetry::{self, LogFormat};

/// ledgerd - named accounts with atomic transfers
#[derive(Parser)]
#[command(name = "ledgerd")]
#[command(about = "A small account ledger with atomic transfers, served over HTTP")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "LEDGER_DATABASE", default_value = "ledger.db", global = true)]
    pub database: String,

    /// Maximum time to wait for account locks or a database connection, in milliseconds
    #[arg(long, env = "LEDGER_LOCK_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub lock_timeout_ms: u64,

    /// Size of the database connection pool
    #[arg(long, env = "LEDGER_MAX_CONNECTIONS", default_value_t = 8, global = true)]
    pub max_connections: u32,

    /// Log output format
    #[arg(long, env = "LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP server
    Serve(ServeArgs),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transfer funds between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account name
        #[arg(long)]
        from: String,

        /// Destination account name
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account name (must be unique)
        name: String,

        /// Initial balance (e.g., "100.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// List all accounts
    List,

    /// Show a single account
    Show {
        /// Account name
        name: String,
    },
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "LEDGER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Backing store for accounts
    #[arg(long, env = "LEDGER_STORE", value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// SQLite database file (durable)
    Sqlite,
    /// Process memory (lost on exit)
    Memory,
}

impl Cli {
    fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            max_connections: self.max_connections,
        }
    }

    pub async fn run(self) -> Result<()> {
        let level = if self.verbose { "debug" } else { "info" };
        telemetry::init(self.log_format, level);

        let options = self.store_options();

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database, &options).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve(args) => {
                let service = match args.store {
                    StoreKind::Sqlite => LedgerService::init(&self.database, &options).await?,
                    StoreKind::Memory => LedgerService::in_memory(&options),
                };
                let listener = TcpListener::bind(&args.bind)
                    .await
                    .with_context(|| format!("Failed to bind {}", args.bind))?;
                tracing::info!(store = ?args.store, "starting ledger server");
                crate::http::serve(listener, service).await?;
            }

            Commands::Account(account_cmd) => {
                let service = LedgerService::connect(&self.database, &options).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Transfer { amount, from, to } => {
                let service = LedgerService::connect(&self.database, &options).await?;
                let receipt = service
                    .transfer(TransferRequest::new(from, to, amount))
                    .await?;

                println!("{}", receipt.message);
                println!(
                    "  {}: {}",
                    receipt.from.name,
                    format_cents(receipt.from.new_balance)
                );
                println!(
                    "  {}: {}",
                    receipt.to.name,
                    format_cents(receipt.to.new_balance)
                );
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create { name, balance } => {
            let account = service
                .create_account(NewAccount::new(name, balance))
                .await?;
            println!(
                "Created account: {} ({}) with balance {}",
                account.name,
                account.id,
                format_cents(account.balance)
            );
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;

            if accounts.is_empty() {
                println!("No accounts found.");
                return Ok(());
            }

            println!("{:<30} {:>15}", "NAME", "BALANCE");
            println!("{}", "-".repeat(46));
            for account in accounts {
                println!(
                    "{:<30} {:>15}",
                    truncate(&account.name, 30),
                    format_cents(account.balance)
                );
            }
        }

        AccountCommands::Show { name } => {
            let account = service.get_account(&name).await?;
            println!("Account: {}", account.name);
            println!("  ID:      {}", account.id);
            println!("  Balance: {}", format_cents(account.balance));
            println!("  Created: {}", account.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
