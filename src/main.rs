//! # Bank Synchronization Service Entry Point
//!
//! Operational CLI: migrations, the scheduler daemon, and manual triggers
//! for individual connections.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use banksync::bank::BankEnvironment;
use banksync::config::{AppConfig, ConfigLoader};
use banksync::crypto::CryptoKey;
use banksync::db;
use banksync::discovery::canonical_account_number;
use banksync::ledger::LedgerStore;
use banksync::ledger::orm::SeaOrmLedger;
use banksync::logging;
use banksync::migration::{Migrator, MigratorTrait};
use banksync::notify::orm::AlertNotifier;
use banksync::scheduler::SyncScheduler;
use banksync::sync_executor::{SyncExecutor, SyncOutcome};

#[derive(Parser)]
#[command(name = "banksync", about = "Bank transaction synchronization service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Run the scheduler daemon until interrupted
    Run,
    /// Run one sync pass for a connection
    Sync {
        connection_id: Uuid,
        /// Restrict the pass to a single linked journal
        #[arg(long)]
        journal: Option<Uuid>,
    },
    /// Re-login and re-discover accounts for a connection, then sync
    Reconnect { connection_id: Uuid },
    /// Create a connection from credentials and run its first pass
    Connect {
        #[arg(long, default_value = "production")]
        environment: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        secret: String,
        /// Import transactions starting from this date (default: 90 days back)
        #[arg(long)]
        history_from: Option<NaiveDate>,
    },
    /// Create a ledger journal for a pending remote account and link it
    CreateJournal {
        connection_id: Uuid,
        #[arg(long)]
        iban: String,
        #[arg(long)]
        currency: String,
        /// Journal display name (defaults to the account number)
        #[arg(long)]
        name: Option<String>,
    },
    /// List connections and their health
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(ConfigLoader::new().load()?);
    logging::init_subscriber(&config);
    tracing::info!(profile = %config.profile, "Loaded configuration");

    let db = Arc::new(db::init_pool(&config).await?);

    match cli.command {
        Command::Migrate => {
            Migrator::up(db.as_ref(), None).await?;
            println!("migrations applied");
        }
        Command::Run => {
            let executor = Arc::new(build_executor(db.clone(), config.clone())?);
            let scheduler = SyncScheduler::new(config.clone(), executor);

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            scheduler.run(shutdown).await?;
        }
        Command::Sync {
            connection_id,
            journal,
        } => {
            let executor = build_executor(db.clone(), config.clone())?;
            let outcome = match journal {
                Some(journal_id) => {
                    executor
                        .run_sync_for_journal(connection_id, journal_id)
                        .await?
                }
                None => executor.run_sync(connection_id).await?,
            };
            print_outcome(&outcome);
        }
        Command::Reconnect { connection_id } => {
            let executor = build_executor(db.clone(), config.clone())?;
            let outcome = executor.reconnect(connection_id).await?;
            print_outcome(&outcome);
        }
        Command::Connect {
            environment,
            username,
            secret,
            history_from,
        } => {
            let environment = BankEnvironment::parse(&environment)
                .context("environment must be 'production' or 'sandbox'")?;

            let executor = build_executor(db.clone(), config.clone())?;
            let connection = executor
                .connections()
                .create(environment, &username, &secret, history_from)
                .await?;
            println!("created connection {}", connection.id);

            let outcome = executor.run_sync(connection.id).await?;
            print_outcome(&outcome);
        }
        Command::CreateJournal {
            connection_id,
            iban,
            currency,
            name,
        } => {
            let ledger = SeaOrmLedger::new(db.clone());
            let account_number = canonical_account_number(&iban);
            let name = name.unwrap_or_else(|| account_number.clone());

            let journal = ledger
                .create_journal(&name, &account_number, &currency)
                .await?;
            ledger
                .record_link(&connection_id, &account_number, &journal.id, None)
                .await?;
            println!("created journal {} and linked {}", journal.id, account_number);
        }
        Command::Status => {
            let executor = build_executor(db.clone(), config.clone())?;
            for connection in executor.connections().list().await? {
                let watermark = connection
                    .last_success_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  {:<11} {:<10} {} (watermark: {}){}",
                    connection.id,
                    connection.environment,
                    connection.status,
                    connection.username,
                    watermark,
                    connection
                        .last_error
                        .map(|e| format!(" last error: {e}"))
                        .unwrap_or_default(),
                );
            }
        }
    }

    Ok(())
}

fn build_executor(
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
) -> anyhow::Result<SyncExecutor> {
    let key_bytes = config
        .crypto_key
        .clone()
        .context("crypto key is not configured")?;
    let crypto_key = CryptoKey::new(key_bytes)?;

    let ledger = Arc::new(SeaOrmLedger::new(db.clone()));
    let notifier = Arc::new(AlertNotifier::new(db.clone()));

    Ok(SyncExecutor::new(db, config, crypto_key, ledger, notifier))
}

fn print_outcome(outcome: &SyncOutcome) {
    println!(
        "imported {} transactions ({} duplicates skipped, {} parse failures, {} below history floor)",
        outcome.stats.imported,
        outcome.stats.duplicates,
        outcome.stats.parse_failures,
        outcome.stats.below_floor,
    );
    if outcome.linked > 0 || outcome.pending > 0 {
        println!(
            "linked {} accounts, {} pending manual link",
            outcome.linked, outcome.pending
        );
    }
}
