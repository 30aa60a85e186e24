//! # Wallet Arena
//!
//! A tournament lifecycle automation engine for wallet-performance
//! tournaments.
//!
//! Champions register a wallet for a scheduled tournament; the engine takes a
//! balance snapshot of every entrant when the tournament starts, another when
//! it ends, ranks the field by percentage change in wallet value, and records
//! tiered prize distributions. Tournament instances themselves are stamped
//! out ahead of time by a calendar-driven deployment scheduler.
//!
//! ## Architecture
//!
//! A host process drives two components on timers:
//!
//! - [`scheduler::DeploymentScheduler`] keeps the upcoming weeks populated
//!   with one instance per configured variant per deployment date.
//! - [`engine::LifecycleEngine`] polls non-terminal instances and fires
//!   time-driven transitions: `scheduled` → `registering` →
//!   `registration_closed` → `active` → `ended` → `complete`, with
//!   `cancelled` and `needs_review` as the exit ramps.
//!
//! Snapshots flow through [`snapshot::SnapshotManager`], which calls a
//! [`provider::BalanceProvider`] behind a shared sliding-window
//! [`rate_limit::RateLimiter`]. All persistence goes through the repository
//! traits in [`db::repository`], injected at construction.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wallet_arena::db::{Database, DatabaseConfig};
//! use wallet_arena::db::repository::{
//!     PgEntryRepository, PgResultsRepository, PgTournamentRepository,
//! };
//! use wallet_arena::engine::{EngineConfig, LifecycleEngine};
//! use wallet_arena::provider::{FailoverProvider, RpcProvider};
//! use wallet_arena::rate_limit::RateLimiter;
//! use wallet_arena::snapshot::SnapshotManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let tournaments = Arc::new(PgTournamentRepository::new(db.pool().clone()));
//!     let entries = Arc::new(PgEntryRepository::new(db.pool().clone()));
//!     let results = Arc::new(PgResultsRepository::new(db.pool().clone()));
//!
//!     let provider = Arc::new(FailoverProvider::new(vec![Arc::new(RpcProvider::new(
//!         "Solana RPC",
//!         "https://api.mainnet-beta.solana.com",
//!     ))]));
//!     let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
//!     let snapshots = SnapshotManager::new(entries.clone(), provider, limiter);
//!
//!     let engine = LifecycleEngine::new(
//!         tournaments,
//!         entries,
//!         results,
//!         snapshots,
//!         EngineConfig::default(),
//!     );
//!     engine.poll_once().await?;
//!     Ok(())
//! }
//! ```

/// Record store access: pool management and repository traits.
pub mod db;

/// The lifecycle automation engine and its guards.
pub mod engine;

/// Wallet balance snapshot providers.
pub mod provider;

/// Sliding-window rate limiting for provider calls.
pub mod rate_limit;

/// Calendar-driven tournament deployment.
pub mod scheduler;

/// Snapshot batches, performance, and rankings.
pub mod snapshot;

/// Tournament domain models and the prize calculator.
pub mod tournament;

pub use engine::{EngineConfig, EngineError, LifecycleEngine, PollSummary};
pub use rate_limit::RateLimiter;
pub use scheduler::{DeploymentConfig, DeploymentScheduler, DeploymentSummary};
pub use snapshot::{SnapshotManager, TournamentOutcome};
pub use tournament::{
    TournamentEntry, TournamentId, TournamentInstance, TournamentStatus, TournamentTemplate,
};
