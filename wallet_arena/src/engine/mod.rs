//! Tournament lifecycle automation engine.
//!
//! The engine owns every instance-status write. A host process drives
//! [`LifecycleEngine::poll_once`] on a timer; each pass lists instances in
//! non-terminal states, compares the clock against their timestamps, and
//! fires at most one transition per instance:
//!
//! ```text
//! scheduled --(now >= registration_opens)--> registering
//! registering --(now >= registration_closes)--> registration_closed
//!                  participant_count < minimum --> cancelled
//! registration_closed --(now >= start_time)--> active    [start snapshots]
//! active --(now >= end_time)--> ended                    [end snapshots]
//! ended --> complete | needs_review
//! ```
//!
//! Transitions are never chained within one pass; a missed moment is picked
//! up late rather than skipped, because evaluation always restarts from the
//! persisted status. `Ended` instances stay in the poll set so an end
//! sequence interrupted by a crash is resumed; snapshot capture and prize
//! inserts are idempotent, which makes that resume safe.

pub mod budget;
pub mod guard;

pub use budget::{BudgetStatus, CallBudget};
pub use guard::{InFlightGuard, TransitionKind, TransitionPermit};

use crate::db::repository::{
    EntryRepository, NewPrizeDistribution, ResultsRepository, StoreError, TournamentRepository,
};
use crate::snapshot::{SnapshotError, SnapshotManager};
use crate::tournament::models::{
    ChampionStats, EntryStatus, Ranking, TournamentId, TournamentInstance, TournamentStatus,
};
use crate::tournament::prize::{PrizeTierTable, calculate_distribution};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Record store error
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Snapshot processing error
    #[error("Snapshot processing error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the host should call `poll_once`
    pub check_interval: Duration,
    /// Prize tier table applied at tournament end
    pub prize_tiers: PrizeTierTable,
    /// Hourly cap on snapshot-provider calls
    pub snapshot_calls_per_hour: u32,
    /// Daily cap on snapshot-provider calls
    pub snapshot_calls_per_day: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            prize_tiers: PrizeTierTable::standard(),
            snapshot_calls_per_hour: 3_000,
            snapshot_calls_per_day: 25_000,
        }
    }
}

/// Counts for one poll pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Instances evaluated
    pub instances_checked: usize,
    /// Transitions executed
    pub transitions_fired: usize,
    /// Transitions skipped (guard held or budget exhausted)
    pub transitions_skipped: usize,
    /// Instances whose transition handler errored
    pub failures: usize,
}

/// Observability snapshot of the engine
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub check_interval: Duration,
    pub in_flight: Vec<(TournamentId, TransitionKind)>,
    pub budget: BudgetStatus,
}

/// Statuses the driver loop keeps evaluating
const POLLED_STATUSES: [TournamentStatus; 5] = [
    TournamentStatus::Scheduled,
    TournamentStatus::Registering,
    TournamentStatus::RegistrationClosed,
    TournamentStatus::Active,
    TournamentStatus::Ended,
];

enum Evaluation {
    Idle,
    Fired,
    Skipped,
}

/// The lifecycle automation engine.
///
/// All collaborators are injected at construction; the engine holds no
/// process-wide state beyond its in-flight guard and call budget.
pub struct LifecycleEngine {
    tournaments: Arc<dyn TournamentRepository>,
    entries: Arc<dyn EntryRepository>,
    results: Arc<dyn ResultsRepository>,
    snapshots: SnapshotManager,
    guard: InFlightGuard,
    budget: CallBudget,
    config: EngineConfig,
}

impl LifecycleEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        tournaments: Arc<dyn TournamentRepository>,
        entries: Arc<dyn EntryRepository>,
        results: Arc<dyn ResultsRepository>,
        snapshots: SnapshotManager,
        config: EngineConfig,
    ) -> Self {
        let budget = CallBudget::new(
            config.snapshot_calls_per_hour,
            config.snapshot_calls_per_day,
        );
        Self {
            tournaments,
            entries,
            results,
            snapshots,
            guard: InFlightGuard::new(),
            budget,
            config,
        }
    }

    /// Evaluate every non-terminal tournament against the current clock.
    pub async fn poll_once(&self) -> EngineResult<PollSummary> {
        self.poll_at(Utc::now()).await
    }

    /// Evaluate every non-terminal tournament against the given clock.
    ///
    /// Per-instance failures are logged and counted; only failing to list
    /// the instances at all errors the pass.
    pub async fn poll_at(&self, now: DateTime<Utc>) -> EngineResult<PollSummary> {
        let instances = self.tournaments.list_by_status(&POLLED_STATUSES).await?;

        let mut summary = PollSummary::default();
        for instance in &instances {
            summary.instances_checked += 1;
            match self.evaluate(instance, now).await {
                Ok(Evaluation::Fired) => summary.transitions_fired += 1,
                Ok(Evaluation::Skipped) => summary.transitions_skipped += 1,
                Ok(Evaluation::Idle) => {}
                Err(e) => {
                    // Leave the instance as-is; the next pass retries
                    error!(
                        "transition failed for tournament {} ({}): {e}",
                        instance.id, instance.name
                    );
                    summary.failures += 1;
                }
            }
        }
        Ok(summary)
    }

    /// The single due transition for an instance, if any
    fn due_transition(instance: &TournamentInstance, now: DateTime<Utc>) -> Option<TransitionKind> {
        match instance.status {
            TournamentStatus::Scheduled if now >= instance.registration_opens => {
                Some(TransitionKind::OpenRegistration)
            }
            TournamentStatus::Registering if now >= instance.registration_closes => {
                Some(TransitionKind::CloseRegistration)
            }
            TournamentStatus::RegistrationClosed if now >= instance.start_time => {
                Some(TransitionKind::Start)
            }
            TournamentStatus::Active if now >= instance.end_time => Some(TransitionKind::End),
            // An interrupted end sequence is resumed regardless of clock
            TournamentStatus::Ended => Some(TransitionKind::End),
            _ => None,
        }
    }

    async fn evaluate(
        &self,
        instance: &TournamentInstance,
        now: DateTime<Utc>,
    ) -> EngineResult<Evaluation> {
        let Some(kind) = Self::due_transition(instance, now) else {
            return Ok(Evaluation::Idle);
        };

        match kind {
            TransitionKind::OpenRegistration => {
                self.open_registration(instance).await?;
                Ok(Evaluation::Fired)
            }
            TransitionKind::CloseRegistration => {
                self.close_registration(instance).await?;
                Ok(Evaluation::Fired)
            }
            TransitionKind::Start => {
                if self.start_at(instance.id, now).await? {
                    Ok(Evaluation::Fired)
                } else {
                    Ok(Evaluation::Skipped)
                }
            }
            TransitionKind::End => {
                if self.end_at(instance.id, now).await? {
                    Ok(Evaluation::Fired)
                } else {
                    Ok(Evaluation::Skipped)
                }
            }
        }
    }

    async fn open_registration(&self, instance: &TournamentInstance) -> EngineResult<()> {
        info!("opening registration for tournament {} ({})", instance.id, instance.name);
        self.tournaments
            .set_status(instance.id, TournamentStatus::Registering)
            .await?;
        Ok(())
    }

    async fn close_registration(&self, instance: &TournamentInstance) -> EngineResult<()> {
        let entries = self
            .entries
            .list_entries(instance.id, Some(EntryStatus::Registered))
            .await?;

        if (entries.len() as u32) < instance.min_participants {
            info!(
                "tournament {} has {} of {} required participants, cancelling",
                instance.id,
                entries.len(),
                instance.min_participants
            );
            self.tournaments
                .cancel_instance(instance.id, "Not enough participants")
                .await?;
            return Ok(());
        }

        info!(
            "closing registration for tournament {} with {} participants",
            instance.id,
            entries.len()
        );
        self.tournaments
            .set_status(instance.id, TournamentStatus::RegistrationClosed)
            .await?;
        Ok(())
    }

    /// Activate a tournament and capture start snapshots.
    ///
    /// Returns false when skipped (already in flight, wrong status, or
    /// budget exhausted). The status write happens before the snapshot
    /// batch; partial snapshot coverage after activation is deliberately not
    /// rolled back, only reported.
    pub async fn start_tournament(&self, id: TournamentId) -> EngineResult<bool> {
        self.start_at(id, Utc::now()).await
    }

    async fn start_at(&self, id: TournamentId, now: DateTime<Utc>) -> EngineResult<bool> {
        let Some(_permit) = self.guard.try_acquire(id, TransitionKind::Start) else {
            debug!("start already in flight for tournament {id}, skipping");
            return Ok(false);
        };

        let instance = self.tournaments.get_instance(id).await?;
        if instance.status != TournamentStatus::RegistrationClosed {
            warn!(
                "refusing to start tournament {id} from status {}",
                instance.status.as_str()
            );
            return Ok(false);
        }

        let estimated_calls = instance.participant_count.max(1);
        if !self.budget.try_reserve(estimated_calls, now) {
            warn!(
                "snapshot budget exhausted, postponing start of tournament {id} \
                 ({estimated_calls} calls needed)"
            );
            return Ok(false);
        }

        // Status first; a failed write aborts before any snapshot is taken
        self.tournaments.mark_active(id).await?;

        let report = self.snapshots.process_tournament_start(id).await?;
        info!(
            "tournament {id} started: {} snapshots captured, {} failed",
            report.successful, report.failed
        );
        Ok(true)
    }

    /// End a tournament: end snapshots, rankings, prizes, completion.
    ///
    /// Returns false when skipped. Ranking failure parks the instance at
    /// `NeedsReview` for manual remediation instead of reverting.
    pub async fn end_tournament(&self, id: TournamentId) -> EngineResult<bool> {
        self.end_at(id, Utc::now()).await
    }

    async fn end_at(&self, id: TournamentId, now: DateTime<Utc>) -> EngineResult<bool> {
        let Some(_permit) = self.guard.try_acquire(id, TransitionKind::End) else {
            debug!("end already in flight for tournament {id}, skipping");
            return Ok(false);
        };

        let instance = self.tournaments.get_instance(id).await?;
        let resuming = instance.status == TournamentStatus::Ended;
        if instance.status != TournamentStatus::Active && !resuming {
            warn!(
                "refusing to end tournament {id} from status {}",
                instance.status.as_str()
            );
            return Ok(false);
        }

        let estimated_calls = instance.participant_count.max(1);
        if !self.budget.try_reserve(estimated_calls, now) {
            warn!("snapshot budget exhausted, postponing end of tournament {id}");
            return Ok(false);
        }

        if !resuming {
            self.tournaments.mark_ended(id).await?;
        } else {
            info!("resuming interrupted end processing for tournament {id}");
        }

        match self.snapshots.process_tournament_end(id).await {
            Ok(outcome) => {
                info!(
                    "tournament {id} ranked: {} entrants, {} excluded",
                    outcome.rankings.len(),
                    outcome.excluded.len()
                );
                self.distribute_prizes(&instance, &outcome.rankings).await;
                self.tournaments
                    .set_status(id, TournamentStatus::Complete)
                    .await?;
                self.archive_report(id).await;
                Ok(true)
            }
            Err(e) => {
                // Not auto-retryable; parking here avoids double payment
                error!("end processing failed for tournament {id}: {e}");
                self.tournaments
                    .set_status(id, TournamentStatus::NeedsReview)
                    .await?;
                Ok(true)
            }
        }
    }

    /// Cancel a tournament with a reason. Never orchestrates refunds.
    pub async fn cancel_tournament(&self, id: TournamentId, reason: &str) -> EngineResult<()> {
        info!("cancelling tournament {id}: {reason}");
        self.tournaments.cancel_instance(id, reason).await?;
        Ok(())
    }

    /// Record prize rows and winner stats for the ranked field.
    ///
    /// Every insert is guarded by a (tournament, champion) existence check,
    /// so re-running after a partial failure never double-pays. Individual
    /// insert failures are logged and skip to the next winner.
    async fn distribute_prizes(&self, instance: &TournamentInstance, rankings: &[Ranking]) {
        let amounts = calculate_distribution(
            instance.total_prize_pool,
            rankings.len(),
            &self.config.prize_tiers,
        );

        let mut paid = 0usize;
        let mut paid_total = 0.0;
        for (ranking, amount) in rankings.iter().zip(&amounts) {
            if *amount <= 0.0 {
                continue;
            }

            match self
                .results
                .prize_exists(instance.id, ranking.champion_id)
                .await
            {
                Ok(true) => {
                    debug!(
                        "prize for champion {} in tournament {} already recorded",
                        ranking.champion_id, instance.id
                    );
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        "prize existence check failed for champion {}: {e}",
                        ranking.champion_id
                    );
                    continue;
                }
            }

            if let Err(e) = self
                .results
                .insert_prize(&NewPrizeDistribution {
                    tournament_id: instance.id,
                    champion_id: ranking.champion_id,
                    rank: ranking.rank,
                    prize_amount: *amount,
                    performance: ranking.performance,
                })
                .await
            {
                error!(
                    "failed to record prize for champion {} (rank {}): {e}",
                    ranking.champion_id, ranking.rank
                );
                continue;
            }

            paid += 1;
            paid_total += *amount;
            self.update_winner_stats(ranking, *amount).await;
        }

        info!(
            "distributed {paid_total} SOL across {paid} winners for tournament {}",
            instance.id
        );
    }

    /// Read-modify-write of one winner's cumulative stats.
    ///
    /// Only prize winners are updated here; non-winning finishers keep their
    /// previous counts.
    async fn update_winner_stats(&self, ranking: &Ranking, prize: f64) {
        let mut stats = match self.results.get_stats(ranking.champion_id).await {
            Ok(Some(stats)) => stats,
            Ok(None) => ChampionStats::new(ranking.champion_id),
            Err(e) => {
                error!("stats read failed for champion {}: {e}", ranking.champion_id);
                return;
            }
        };

        stats.tournaments_played += 1;
        if ranking.rank == 1 {
            stats.tournaments_won += 1;
            stats.current_win_streak += 1;
        }
        stats.total_sol_earned += prize;
        stats.updated_at = Utc::now();

        if let Err(e) = self.results.upsert_stats(&stats).await {
            error!("stats write failed for champion {}: {e}", ranking.champion_id);
        }
    }

    async fn archive_report(&self, id: TournamentId) {
        let report = match self.snapshots.generate_report(id).await {
            Ok(report) => report,
            Err(e) => {
                warn!("report generation failed for tournament {id}: {e}");
                return;
            }
        };
        let payload = match serde_json::to_value(&report) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("report serialization failed for tournament {id}: {e}");
                return;
            }
        };
        if let Err(e) = self.results.insert_report(id, &payload).await {
            warn!("report insert failed for tournament {id}: {e}");
        }
    }

    /// Current engine state for operators
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            check_interval: self.config.check_interval,
            in_flight: self.guard.active(),
            budget: self.budget.status(Utc::now()),
        }
    }
}
