use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paybridge::cli::{Cli, Commands, DbCommands, MerchantCommands, TxCommands};
use paybridge::config::Config;
use paybridge::gateway::GatewayClient;
use paybridge::services::sweeper;
use paybridge::{cli, create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => {
            let pool = db::create_pool(&config).await?;
            Migrator::new(Path::new("./migrations"))
                .await?
                .run(&pool)
                .await?;
            println!("Migrations applied");
            Ok(())
        }
        Commands::Tx(TxCommands::ForceFail { txnid }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_force_fail(&pool, &txnid).await
        }
        Commands::Merchant(MerchantCommands::Add { merchant_key, salt }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_merchant_add(&pool, &merchant_key, &salt).await
        }
        Commands::Merchant(MerchantCommands::List) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_merchant_list(&pool).await
        }
        Commands::Sweep => {
            let pool = db::create_pool(&config).await?;
            cli::handle_sweep(&pool, config.stale_after_secs).await
        }
        Commands::Config => {
            let pool = db::create_pool(&config).await?;
            let report = startup::validate_environment(&config, &pool).await?;
            report.print();
            if !report.is_valid() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let gateway = GatewayClient::new(
        config.gateway_base_url.clone(),
        Duration::from_secs(config.gateway_timeout_secs),
    );
    tracing::info!(
        "Gateway client initialized with URL: {}",
        config.gateway_base_url
    );

    tokio::spawn(sweeper::run_sweeper(
        pool.clone(),
        config.sweep_interval_secs,
        config.stale_after_secs,
    ));

    let state = AppState { db: pool, gateway };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
