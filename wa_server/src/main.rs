//! Tournament automation daemon.
//!
//! Hosts the wallet_arena lifecycle engine and deployment scheduler on
//! timers: the engine polls tournament instances for due state transitions,
//! and the scheduler keeps upcoming deployment dates populated with
//! instances of every configured variant.

mod config;
mod metrics;

use anyhow::Error;
use chrono::Utc;
use config::ServerConfig;
use ctrlc::set_handler;
use log::{error, info, warn};
use pico_args::Arguments;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wallet_arena::db::Database;
use wallet_arena::db::repository::{
    PgEntryRepository, PgResultsRepository, PgTournamentRepository,
};
use wallet_arena::engine::{EngineConfig, LifecycleEngine};
use wallet_arena::provider::{BalanceProvider, FailoverProvider, RpcProvider};
use wallet_arena::rate_limit::RateLimiter;
use wallet_arena::scheduler::{DeploymentConfig, DeploymentScheduler};
use wallet_arena::snapshot::SnapshotManager;

const HELP: &str = "\
Run the wallet tournament automation daemon

USAGE:
  wa_server [OPTIONS]

OPTIONS:
  --db-url     URL      Database connection string  [default: env DATABASE_URL]
  --interval   SECS     Lifecycle poll interval     [default: env CHECK_INTERVAL_SECS or 60]
  --catalog    PATH     Deployment catalog JSON     [default: env DEPLOYMENT_CONFIG or built-in]

FLAGS:
  -h, --help            Print help information

ENVIRONMENT:
  DATABASE_URL                  PostgreSQL connection string
  METRICS_BIND                  Prometheus exporter address (e.g. 127.0.0.1:9090)
  RPC_PRIMARY_URL               Primary Solana RPC endpoint
  HELIUS_API_KEY                Enables the Helius backup endpoint
  RPC_FALLBACK_URL              Fallback RPC endpoint
  RATE_LIMIT_MAX_REQUESTS       Provider calls per rate-limit window
  SNAPSHOT_CALLS_PER_HOUR       Hourly provider call budget
  SNAPSHOT_CALLS_PER_DAY        Daily provider call budget
  DEPLOYMENT_SWEEP_INTERVAL_SECS  Seconds between deployment sweeps
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let check_interval: Option<u64> = pargs.opt_value_from_str("--interval")?;
    let catalog: Option<PathBuf> = pargs.opt_value_from_str("--catalog")?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let config = ServerConfig::from_env(database_url, check_interval, catalog)?;
    info!("Starting tournament automation daemon");

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics exposed at http://{addr}/metrics");
    }

    info!("Connecting to database: {}", config.database.database_url);
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.health_check()
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;
    info!("Database connected successfully");

    let tournaments = Arc::new(PgTournamentRepository::new(db.pool().clone()));
    let entries = Arc::new(PgEntryRepository::new(db.pool().clone()));
    let results = Arc::new(PgResultsRepository::new(db.pool().clone()));

    // Balance providers in priority order: primary, Helius backup when an
    // API key is configured, then the public fallback
    let mut providers: Vec<Arc<dyn BalanceProvider>> = vec![Arc::new(RpcProvider::new(
        "Solana RPC",
        &config.providers.primary_url,
    ))];
    if let Some(key) = &config.providers.helius_api_key {
        providers.push(Arc::new(RpcProvider::new(
            "Helius",
            &format!("https://mainnet.helius-rpc.com/?api-key={key}"),
        )));
    }
    providers.push(Arc::new(RpcProvider::new(
        "Ankr Public",
        &config.providers.fallback_url,
    )));
    info!("Balance providers configured: {} endpoints", providers.len());

    let provider = Arc::new(FailoverProvider::new(providers));
    let limiter = Arc::new(RateLimiter::new(
        config.providers.rate_limit_max_requests,
        Duration::from_secs(config.providers.rate_limit_window_secs),
    ));
    let snapshots = SnapshotManager::new(entries.clone(), provider, limiter);

    let deployment_config = match &config.deployment_config_path {
        Some(path) => {
            info!("Loading deployment catalog from {}", path.display());
            DeploymentConfig::from_json_file(path)?
        }
        None => DeploymentConfig::default(),
    };
    if let Err(message) = deployment_config.prize_tiers.validate() {
        return Err(anyhow::anyhow!("Invalid prize tier table: {message}"));
    }

    let engine = LifecycleEngine::new(
        tournaments.clone(),
        entries,
        results,
        snapshots,
        EngineConfig {
            check_interval: Duration::from_secs(config.engine.check_interval_secs),
            prize_tiers: deployment_config.prize_tiers.clone(),
            snapshot_calls_per_hour: config.engine.snapshot_calls_per_hour,
            snapshot_calls_per_day: config.engine.snapshot_calls_per_day,
        },
    );
    let scheduler = DeploymentScheduler::new(tournaments, deployment_config);

    info!(
        "Polling every {}s, deployment sweep every {}s",
        config.engine.check_interval_secs, config.deployment_sweep_interval_secs
    );

    let mut poll_timer =
        tokio::time::interval(Duration::from_secs(config.engine.check_interval_secs));
    let mut sweep_timer =
        tokio::time::interval(Duration::from_secs(config.deployment_sweep_interval_secs));

    // Both timers fire immediately on startup: the first sweep populates the
    // calendar and the first poll catches up anything due while offline.
    loop {
        tokio::select! {
            _ = poll_timer.tick() => {
                let started = Instant::now();
                match engine.poll_once().await {
                    Ok(summary) => {
                        metrics::poll_duration_ms(started.elapsed().as_secs_f64() * 1000.0);
                        metrics::instances_checked(summary.instances_checked);
                        metrics::transitions_fired_total(summary.transitions_fired);
                        metrics::transitions_skipped_total(summary.transitions_skipped);
                        metrics::transition_failures_total(summary.failures);
                        if summary.transitions_fired > 0 || summary.failures > 0 {
                            info!(
                                "poll pass: {} checked, {} fired, {} skipped, {} failed",
                                summary.instances_checked,
                                summary.transitions_fired,
                                summary.transitions_skipped,
                                summary.failures
                            );
                        }
                        let status = engine.status();
                        metrics::budget_calls_used(
                            status.budget.hourly_used,
                            status.budget.daily_used,
                        );
                    }
                    Err(e) => {
                        error!("poll pass failed: {e}");
                        metrics::poll_failures_total();
                    }
                }
            }
            _ = sweep_timer.tick() => {
                match scheduler.ensure_scheduled(Utc::now()).await {
                    Ok(summary) => {
                        metrics::deployments_created_total(summary.created);
                        metrics::deployment_failures_total(summary.failures);
                        if summary.created > 0 {
                            info!(
                                "deployment sweep: {} created across {} dates",
                                summary.created, summary.dates_checked
                            );
                        }
                        if summary.failures > 0 {
                            warn!("deployment sweep had {} failures", summary.failures);
                        }
                    }
                    Err(e) => {
                        error!("deployment sweep failed: {e}");
                        metrics::sweep_failures_total();
                    }
                }
            }
        }
    }
}
