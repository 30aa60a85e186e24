//! Snapshot manager for tournament start/end wallet captures and rankings.

use crate::db::repository::{EntryRepository, NewWalletSnapshot, StoreError};
use crate::provider::BalanceProvider;
use crate::rate_limit::RateLimiter;
use crate::tournament::models::{
    ChampionId, EntryId, EntryStatus, Ranking, SnapshotKind, TournamentEntry, TournamentId,
    WalletSnapshot,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Snapshot manager errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Record store error that aborted a whole batch
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Fewer than two entrants have both snapshots, nothing to rank
    #[error("Ranking unavailable: only {ranked} entrants with both snapshots")]
    RankingUnavailable { ranked: usize },
}

/// One entrant whose snapshot attempt failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub entry_id: EntryId,
    pub reason: String,
}

/// Outcome counts for one snapshot batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotBatchReport {
    /// Entrants with a usable snapshot after this batch
    pub successful: usize,
    /// Entrants whose capture failed
    pub failed: usize,
    /// Per-entrant failure reasons
    pub failures: Vec<SnapshotFailure>,
}

/// An entrant excluded from ranking, kept visible for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedEntrant {
    pub entry_id: EntryId,
    pub champion_id: ChampionId,
    pub reason: String,
}

/// Result of end-of-tournament processing
#[derive(Debug, Clone)]
pub struct TournamentOutcome {
    /// Final rankings, best performance first
    pub rankings: Vec<Ranking>,
    /// Entrants excluded from ranking
    pub excluded: Vec<ExcludedEntrant>,
    /// End snapshot batch counts
    pub batch: SnapshotBatchReport,
}

/// Archived summary of a finished tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentReport {
    pub tournament_id: TournamentId,
    pub participant_count: usize,
    pub ranked_count: usize,
    pub snapshot_failures: usize,
    pub best_performance: Option<f64>,
    pub worst_performance: Option<f64>,
    pub average_performance: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Performance as percentage change between start and end total values.
pub fn performance_percentage(start_value: f64, end_value: f64) -> f64 {
    (end_value - start_value) / start_value * 100.0
}

/// Orchestrates wallet snapshots for all entrants of a tournament.
///
/// Owns no state beyond its collaborators; every operation re-reads entries
/// from the record store, which makes batches safely re-runnable: entries
/// that already carry a snapshot of the requested kind are reused, never
/// captured twice.
pub struct SnapshotManager {
    entries: Arc<dyn EntryRepository>,
    provider: Arc<dyn BalanceProvider>,
    limiter: Arc<RateLimiter>,
}

impl SnapshotManager {
    /// Create a new snapshot manager
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        provider: Arc<dyn BalanceProvider>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            entries,
            provider,
            limiter,
        }
    }

    /// Capture start snapshots for every registered entrant.
    ///
    /// Each entrant's attempt is independent; one provider failure never
    /// aborts the others. Only failing to list entries aborts the batch.
    pub async fn process_tournament_start(
        &self,
        tournament_id: TournamentId,
    ) -> SnapshotResult<SnapshotBatchReport> {
        let entries = self
            .entries
            .list_entries(tournament_id, Some(EntryStatus::Registered))
            .await?;

        info!(
            "taking start snapshots for tournament {tournament_id}: {} entrants",
            entries.len()
        );

        let mut report = SnapshotBatchReport::default();
        for entry in &entries {
            if entry.start_snapshot_id.is_some() {
                // Already captured on a previous attempt
                report.successful += 1;
                continue;
            }
            match self.capture(entry, SnapshotKind::Start).await {
                Ok(_) => report.successful += 1,
                Err(reason) => {
                    warn!(
                        "start snapshot failed for entry {} ({}): {reason}",
                        entry.id, entry.champion_id
                    );
                    report.failed += 1;
                    report.failures.push(SnapshotFailure {
                        entry_id: entry.id,
                        reason,
                    });
                }
            }
        }

        info!(
            "start snapshots for tournament {tournament_id}: {} successful, {} failed",
            report.successful, report.failed
        );
        Ok(report)
    }

    /// Capture end snapshots and compute final rankings.
    ///
    /// Only entrants holding a start snapshot participate; those who never
    /// properly started are ignored entirely. Entrants whose end snapshot
    /// cannot be captured are excluded from ranking but flagged. Ties are
    /// broken by earlier registration (the entry listing order), which the
    /// stable sort preserves.
    pub async fn process_tournament_end(
        &self,
        tournament_id: TournamentId,
    ) -> SnapshotResult<TournamentOutcome> {
        let entries = self
            .entries
            .list_entries(tournament_id, Some(EntryStatus::Registered))
            .await?;

        let started: Vec<&TournamentEntry> =
            entries.iter().filter(|e| e.has_start_snapshot()).collect();

        info!(
            "ending tournament {tournament_id}: {} of {} entrants properly started",
            started.len(),
            entries.len()
        );

        let mut batch = SnapshotBatchReport::default();
        let mut excluded = Vec::new();
        let mut scored: Vec<(&TournamentEntry, f64)> = Vec::new();

        for &entry in &started {
            let end_snapshot = match self.end_snapshot(entry).await {
                Ok(snapshot) => {
                    batch.successful += 1;
                    snapshot
                }
                Err(reason) => {
                    warn!("end snapshot failed for entry {}: {reason}", entry.id);
                    batch.failed += 1;
                    batch.failures.push(SnapshotFailure {
                        entry_id: entry.id,
                        reason: reason.clone(),
                    });
                    excluded.push(ExcludedEntrant {
                        entry_id: entry.id,
                        champion_id: entry.champion_id,
                        reason,
                    });
                    continue;
                }
            };

            let start_id = match entry.start_snapshot_id {
                Some(id) => id,
                None => continue,
            };
            let start_snapshot = match self.entries.get_snapshot(start_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    excluded.push(ExcludedEntrant {
                        entry_id: entry.id,
                        champion_id: entry.champion_id,
                        reason: format!("start snapshot unreadable: {e}"),
                    });
                    continue;
                }
            };

            if start_snapshot.total_value <= 0.0 {
                // Percentage change is undefined from zero
                excluded.push(ExcludedEntrant {
                    entry_id: entry.id,
                    champion_id: entry.champion_id,
                    reason: "zero-value start snapshot".to_string(),
                });
                continue;
            }

            let performance =
                performance_percentage(start_snapshot.total_value, end_snapshot.total_value);
            scored.push((entry, performance));
        }

        // Stable sort: equal performances keep registration order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        if scored.len() < 2 {
            return Err(SnapshotError::RankingUnavailable {
                ranked: scored.len(),
            });
        }

        let rankings = scored
            .iter()
            .enumerate()
            .map(|(index, (entry, performance))| Ranking {
                champion_id: entry.champion_id,
                entry_id: entry.id,
                rank: index as u32 + 1,
                performance: *performance,
            })
            .collect();

        Ok(TournamentOutcome {
            rankings,
            excluded,
            batch,
        })
    }

    /// Assemble an archival summary for a tournament. Pure read.
    pub async fn generate_report(
        &self,
        tournament_id: TournamentId,
    ) -> SnapshotResult<TournamentReport> {
        let entries = self
            .entries
            .list_entries(tournament_id, Some(EntryStatus::Registered))
            .await?;

        let mut performances = Vec::new();
        let mut snapshot_failures = 0;

        for entry in &entries {
            let (Some(start_id), Some(end_id)) = (entry.start_snapshot_id, entry.end_snapshot_id)
            else {
                snapshot_failures += 1;
                continue;
            };
            let start = self.entries.get_snapshot(start_id).await?;
            let end = self.entries.get_snapshot(end_id).await?;
            if start.total_value > 0.0 {
                performances.push(performance_percentage(start.total_value, end.total_value));
            }
        }

        let best = performances.iter().cloned().fold(None, |best: Option<f64>, p| {
            Some(best.map_or(p, |b| b.max(p)))
        });
        let worst = performances.iter().cloned().fold(None, |worst: Option<f64>, p| {
            Some(worst.map_or(p, |w| w.min(p)))
        });
        let average = if performances.is_empty() {
            None
        } else {
            Some(performances.iter().sum::<f64>() / performances.len() as f64)
        };

        Ok(TournamentReport {
            tournament_id,
            participant_count: entries.len(),
            ranked_count: performances.len(),
            snapshot_failures,
            best_performance: best,
            worst_performance: worst,
            average_performance: average,
            generated_at: Utc::now(),
        })
    }

    /// Fetch the entry's end snapshot, capturing one if none is linked yet
    async fn end_snapshot(&self, entry: &TournamentEntry) -> Result<WalletSnapshot, String> {
        if let Some(end_id) = entry.end_snapshot_id {
            return self
                .entries
                .get_snapshot(end_id)
                .await
                .map_err(|e| format!("end snapshot unreadable: {e}"));
        }
        let id = self.capture(entry, SnapshotKind::End).await?;
        self.entries
            .get_snapshot(id)
            .await
            .map_err(|e| format!("end snapshot unreadable: {e}"))
    }

    /// Capture, persist, and link one snapshot for an entry.
    ///
    /// Errors are stringly-typed: every failure here is per-entrant and gets
    /// aggregated, never propagated.
    async fn capture(
        &self,
        entry: &TournamentEntry,
        kind: SnapshotKind,
    ) -> Result<i64, String> {
        self.limiter.acquire().await;

        let snapshot = self
            .provider
            .get_full_snapshot(&entry.wallet_address)
            .await
            .map_err(|e| e.to_string())?;

        let snapshot_id = self
            .entries
            .insert_snapshot(&NewWalletSnapshot {
                entry_id: entry.id,
                wallet_address: snapshot.address.clone(),
                kind,
                sol_balance: snapshot.sol_balance,
                holdings: snapshot.holdings.clone(),
                total_value: snapshot.total_value,
                captured_at: snapshot.captured_at,
                raw: snapshot.raw.clone(),
            })
            .await
            .map_err(|e| format!("snapshot insert failed: {e}"))?;

        self.entries
            .link_snapshot(entry.id, kind, snapshot_id)
            .await
            .map_err(|e| format!("snapshot link failed: {e}"))?;

        Ok(snapshot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::mock::MockStore;
    use crate::provider::mock::MockProvider;
    use crate::tournament::models::TradingStyle;
    use chrono::Duration;
    use uuid::Uuid;

    fn entry(id: EntryId, tournament_id: TournamentId, address: &str, offset_secs: i64) -> TournamentEntry {
        TournamentEntry {
            id,
            tournament_id,
            champion_id: Uuid::new_v4(),
            wallet_address: address.to_string(),
            entry_fee_paid: 0.05,
            trading_style: TradingStyle::PureWallet,
            status: EntryStatus::Registered,
            registered_at: Utc::now() + Duration::seconds(offset_secs),
            start_snapshot_id: None,
            end_snapshot_id: None,
        }
    }

    fn addr(i: usize) -> String {
        // Valid-looking base58 addresses, distinct per entrant
        format!("{}{}", "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJos", 1000 + i)
    }

    fn manager(store: Arc<MockStore>, provider: Arc<MockProvider>) -> SnapshotManager {
        SnapshotManager::new(
            store,
            provider,
            Arc::new(RateLimiter::new(1000, std::time::Duration::from_secs(60))),
        )
    }

    #[test]
    fn test_performance_percentage() {
        assert_eq!(performance_percentage(10.0, 12.5), 25.0);
        assert_eq!(performance_percentage(10.0, 7.5), -25.0);
        assert_eq!(performance_percentage(2.0, 2.0), 0.0);
    }

    #[tokio::test]
    async fn test_start_batch_captures_and_links_all_entrants() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..3 {
            store.add_entry(entry(i as i64 + 1, 42, &addr(i), i as i64));
            provider.set_balance(&addr(i), 1.0 + i as f64);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));

        let report = manager.process_tournament_start(42).await.unwrap();
        assert_eq!(report.successful, 3);
        assert_eq!(report.failed, 0);

        for i in 0..3i64 {
            let entry = store.entry(i + 1).unwrap();
            assert!(entry.start_snapshot_id.is_some());
            let snapshots = store.snapshots_for_entry(i + 1);
            assert_eq!(snapshots.len(), 1);
            assert_eq!(snapshots[0].kind, SnapshotKind::Start);
        }
    }

    #[tokio::test]
    async fn test_start_batch_isolates_provider_failures() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..25 {
            store.add_entry(entry(i as i64 + 1, 7, &addr(i), i as i64));
            provider.set_balance(&addr(i), 5.0);
        }
        provider.fail_address(&addr(3), "rpc timeout");
        provider.fail_address(&addr(17), "rpc timeout");
        let manager = manager(Arc::clone(&store), provider);

        let report = manager.process_tournament_start(7).await.unwrap();
        assert_eq!(report.successful, 23);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(store.entry(4).unwrap().start_snapshot_id.is_none());
        assert!(store.entry(5).unwrap().start_snapshot_id.is_some());
    }

    #[tokio::test]
    async fn test_start_batch_rerun_never_duplicates_snapshots() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        store.add_entry(entry(1, 9, &addr(0), 0));
        provider.set_balance(&addr(0), 2.0);
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));

        manager.process_tournament_start(9).await.unwrap();
        let report = manager.process_tournament_start(9).await.unwrap();

        assert_eq!(report.successful, 1);
        assert_eq!(store.snapshots_for_entry(1).len(), 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_end_computes_rankings_from_stored_snapshots() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..3 {
            store.add_entry(entry(i as i64 + 1, 5, &addr(i), i as i64));
            provider.set_balance(&addr(i), 10.0);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(5).await.unwrap();

        // Entrant 1: +50%, entrant 2: -20%, entrant 3: +10%
        provider.set_balance(&addr(0), 15.0);
        provider.set_balance(&addr(1), 8.0);
        provider.set_balance(&addr(2), 11.0);

        let outcome = manager.process_tournament_end(5).await.unwrap();
        assert_eq!(outcome.rankings.len(), 3);
        assert!(outcome.excluded.is_empty());

        assert_eq!(outcome.rankings[0].entry_id, 1);
        assert_eq!(outcome.rankings[0].rank, 1);
        assert!((outcome.rankings[0].performance - 50.0).abs() < 1e-9);
        assert_eq!(outcome.rankings[1].entry_id, 3);
        assert!((outcome.rankings[1].performance - 10.0).abs() < 1e-9);
        assert_eq!(outcome.rankings[2].entry_id, 2);
        assert!((outcome.rankings[2].performance + 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_end_ranking_ties_break_by_registration_order() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        // Entrant 2 registered before entrant 1
        let mut first = entry(1, 6, &addr(0), 100);
        let mut second = entry(2, 6, &addr(1), 0);
        first.champion_id = Uuid::new_v4();
        second.champion_id = Uuid::new_v4();
        store.add_entry(first);
        store.add_entry(second);
        provider.set_balance(&addr(0), 10.0);
        provider.set_balance(&addr(1), 10.0);
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(6).await.unwrap();

        // Identical performance
        provider.set_balance(&addr(0), 12.0);
        provider.set_balance(&addr(1), 12.0);

        let outcome = manager.process_tournament_end(6).await.unwrap();
        // Entry 2 registered earlier, wins the tie
        assert_eq!(outcome.rankings[0].entry_id, 2);
        assert_eq!(outcome.rankings[1].entry_id, 1);

        // Deterministic: a second run yields the same order
        let rerun = manager.process_tournament_end(6).await.unwrap();
        assert_eq!(rerun.rankings, outcome.rankings);
    }

    #[tokio::test]
    async fn test_end_excludes_entrants_without_end_snapshot() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..3 {
            store.add_entry(entry(i as i64 + 1, 8, &addr(i), i as i64));
            provider.set_balance(&addr(i), 10.0);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(8).await.unwrap();

        provider.fail_address(&addr(1), "gone");

        let outcome = manager.process_tournament_end(8).await.unwrap();
        assert_eq!(outcome.rankings.len(), 2);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].entry_id, 2);
        assert_eq!(outcome.batch.failed, 1);
    }

    #[tokio::test]
    async fn test_end_requires_two_ranked_entrants() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..2 {
            store.add_entry(entry(i as i64 + 1, 3, &addr(i), i as i64));
            provider.set_balance(&addr(i), 10.0);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(3).await.unwrap();

        provider.fail_address(&addr(0), "gone");

        let err = manager.process_tournament_end(3).await.unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::RankingUnavailable { ranked: 1 }
        ));
    }

    #[tokio::test]
    async fn test_end_excludes_zero_value_start() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..3 {
            store.add_entry(entry(i as i64 + 1, 4, &addr(i), i as i64));
            provider.set_balance(&addr(i), if i == 0 { 0.0 } else { 10.0 });
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(4).await.unwrap();

        for i in 0..3 {
            provider.set_balance(&addr(i), 11.0);
        }

        let outcome = manager.process_tournament_end(4).await.unwrap();
        assert_eq!(outcome.rankings.len(), 2);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].entry_id, 1);
        assert!(outcome.excluded[0].reason.contains("zero-value"));
    }

    #[tokio::test]
    async fn test_end_rerun_reuses_existing_end_snapshots() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..2 {
            store.add_entry(entry(i as i64 + 1, 2, &addr(i), i as i64));
            provider.set_balance(&addr(i), 10.0);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(2).await.unwrap();
        provider.set_balance(&addr(0), 20.0);
        provider.set_balance(&addr(1), 5.0);
        manager.process_tournament_end(2).await.unwrap();

        let calls_before = provider.call_count();
        let outcome = manager.process_tournament_end(2).await.unwrap();

        // No new provider calls, at most one end snapshot per entry
        assert_eq!(provider.call_count(), calls_before);
        for id in 1..=2i64 {
            let kinds: Vec<SnapshotKind> = store
                .snapshots_for_entry(id)
                .iter()
                .map(|s| s.kind)
                .collect();
            assert_eq!(kinds, vec![SnapshotKind::Start, SnapshotKind::End]);
        }
        assert_eq!(outcome.rankings[0].entry_id, 1);
    }

    #[tokio::test]
    async fn test_generate_report_summarizes_field() {
        let store = Arc::new(MockStore::new());
        let provider = Arc::new(MockProvider::new("mock"));
        for i in 0..4 {
            store.add_entry(entry(i as i64 + 1, 1, &addr(i), i as i64));
            provider.set_balance(&addr(i), 10.0);
        }
        let manager = manager(Arc::clone(&store), Arc::clone(&provider));
        manager.process_tournament_start(1).await.unwrap();

        provider.set_balance(&addr(0), 15.0);
        provider.set_balance(&addr(1), 5.0);
        provider.set_balance(&addr(2), 10.0);
        provider.fail_address(&addr(3), "gone");
        manager.process_tournament_end(1).await.unwrap();

        let report = manager.generate_report(1).await.unwrap();
        assert_eq!(report.participant_count, 4);
        assert_eq!(report.ranked_count, 3);
        assert_eq!(report.snapshot_failures, 1);
        assert_eq!(report.best_performance, Some(50.0));
        assert_eq!(report.worst_performance, Some(-50.0));
        assert!((report.average_performance.unwrap() - 0.0).abs() < 1e-9);
    }
}
