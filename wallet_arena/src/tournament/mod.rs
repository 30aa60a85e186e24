//! Tournament domain types for wallet-performance tournaments.
//!
//! This module holds the data model shared by the whole crate:
//! - Tournament templates, instances, and the lifecycle status machine
//! - Entries and their linked start/end wallet snapshots
//! - Rankings, prize distributions, and champion statistics
//! - The tiered prize distribution calculator

pub mod models;
pub mod prize;

pub use models::{
    ChampionId, ChampionStats, EntryId, EntryStatus, PrizeDistribution, Ranking, SnapshotId,
    SnapshotKind, TemplateId, TournamentEntry, TournamentId, TournamentInstance, TournamentStatus,
    TournamentTemplate, TradingStyle, WalletSnapshot,
};
pub use prize::{PrizeTier, PrizeTierTable, calculate_distribution};
