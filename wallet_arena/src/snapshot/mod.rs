//! Wallet snapshot orchestration.
//!
//! Captures wallet state for every entrant at exactly two moments per
//! tournament (start and end), computes per-entrant performance from the two
//! stored snapshots, and ranks the field. Per-entrant provider failures never
//! abort a batch; they are collected and reported.

pub mod manager;

pub use manager::{
    ExcludedEntrant, SnapshotBatchReport, SnapshotError, SnapshotFailure, SnapshotManager,
    SnapshotResult, TournamentOutcome, TournamentReport, performance_percentage,
};
