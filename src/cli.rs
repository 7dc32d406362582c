use clap::{Parser, Subcommand};
use sqlx::PgPool;

use crate::db::queries;
use crate::services::sweeper;

#[derive(Parser)]
#[command(name = "paybridge")]
#[command(about = "Paybridge - payment gateway broker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Merchant credential commands
    #[command(subcommand)]
    Merchant(MerchantCommands),

    /// Run one reconciliation sweep batch and exit
    Sweep,

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Force-fail a transaction by its txnid
    ForceFail {
        /// Transaction identifier
        #[arg(value_name = "TXNID")]
        txnid: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum MerchantCommands {
    /// Register a merchant key and its shared secret
    Add {
        #[arg(value_name = "MERCHANT_KEY")]
        merchant_key: String,
        #[arg(value_name = "SALT")]
        salt: String,
    },

    /// List registered merchants
    List,
}

pub async fn handle_tx_force_fail(pool: &PgPool, txnid: &str) -> anyhow::Result<()> {
    let result = queries::force_fail(
        pool,
        txnid,
        "force-failed by operator",
        chrono::Utc::now(),
    )
    .await?;

    match result {
        Some(id) => println!("Transaction {} ({}) marked FAILED", txnid, id),
        None => println!("Transaction {} not found", txnid),
    }

    Ok(())
}

pub async fn handle_merchant_add(pool: &PgPool, merchant_key: &str, salt: &str) -> anyhow::Result<()> {
    let merchant = queries::insert_merchant(pool, merchant_key, salt).await?;
    println!("Merchant {} registered ({})", merchant.merchant_key, merchant.id);

    Ok(())
}

pub async fn handle_merchant_list(pool: &PgPool) -> anyhow::Result<()> {
    let merchants = queries::list_merchants(pool).await?;
    if merchants.is_empty() {
        println!("No merchants registered");
        return Ok(());
    }

    for merchant in merchants {
        println!(
            "{}  active={}  created={}",
            merchant.merchant_key, merchant.active, merchant.created_at
        );
    }

    Ok(())
}

pub async fn handle_sweep(pool: &PgPool, stale_after_secs: i64) -> anyhow::Result<()> {
    let report = sweeper::sweep_batch(pool, stale_after_secs).await?;
    println!(
        "Sweep complete: examined={} swept={} skipped={} failed={}",
        report.examined, report.swept, report.skipped, report.failed
    );

    let counts = queries::count_by_status(pool).await?;
    for (status, count) in counts {
        println!("  {}: {}", status, count);
    }

    Ok(())
}
