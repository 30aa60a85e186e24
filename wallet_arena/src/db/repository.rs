//! Repository trait definitions for the tournament record store.
//!
//! Trait-based abstractions over the record store, enabling dependency
//! injection and mock-backed testing. Each call is one independent statement;
//! no multi-statement transactions are assumed, so callers handle each
//! write's failure on its own.

use crate::provider::TokenHolding;
use crate::tournament::models::{
    ChampionId, ChampionStats, EntryId, EntryStatus, SnapshotId, SnapshotKind, TemplateId,
    TournamentEntry, TournamentId, TournamentInstance, TournamentStatus, TournamentTemplate,
    TradingStyle, WalletSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use thiserror::Error;

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Tournament instance not found
    #[error("Tournament not found: {0}")]
    InstanceNotFound(TournamentId),

    /// Tournament template not found
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// Wallet snapshot not found
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data failed validation
    #[error("Record store corruption: {message}")]
    Corruption { message: String },
}

/// Insert payload for a new tournament instance
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub template_id: TemplateId,
    pub name: String,
    pub status: TournamentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_opens: DateTime<Utc>,
    pub registration_closes: DateTime<Utc>,
    pub min_participants: u32,
    pub deployment_metadata: serde_json::Value,
}

/// Lookup-or-create payload for a tournament template
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub name: String,
    pub trading_style: TradingStyle,
    pub entry_fee: f64,
    pub max_participants: u32,
    pub prize_pool_percentage: f64,
}

/// Insert payload for a wallet snapshot
#[derive(Debug, Clone)]
pub struct NewWalletSnapshot {
    pub entry_id: EntryId,
    pub wallet_address: String,
    pub kind: SnapshotKind,
    pub sol_balance: f64,
    pub holdings: Vec<TokenHolding>,
    pub total_value: f64,
    pub captured_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

/// Insert payload for a prize distribution record
#[derive(Debug, Clone)]
pub struct NewPrizeDistribution {
    pub tournament_id: TournamentId,
    pub champion_id: ChampionId,
    pub rank: u32,
    pub prize_amount: f64,
    pub performance: f64,
}

/// Trait for tournament instance and template operations
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// List instances in any of the given statuses, ordered by start time
    async fn list_by_status(
        &self,
        statuses: &[TournamentStatus],
    ) -> StoreResult<Vec<TournamentInstance>>;

    /// Fetch one instance
    async fn get_instance(&self, id: TournamentId) -> StoreResult<TournamentInstance>;

    /// Fetch one template
    async fn get_template(&self, id: TemplateId) -> StoreResult<TournamentTemplate>;

    /// Update instance status
    async fn set_status(&self, id: TournamentId, status: TournamentStatus) -> StoreResult<()>;

    /// Cancel an instance, recording the reason
    async fn cancel_instance(&self, id: TournamentId, reason: &str) -> StoreResult<()>;

    /// Move an instance to `Active` and stamp the actual start time
    async fn mark_active(&self, id: TournamentId) -> StoreResult<()>;

    /// Move an instance to `Ended` and stamp the actual end time
    async fn mark_ended(&self, id: TournamentId) -> StoreResult<()>;

    /// Insert a new instance, returning its id
    async fn insert_instance(&self, instance: &NewInstance) -> StoreResult<TournamentId>;

    /// Find an existing template by name or create it
    async fn get_or_create_template(&self, spec: &TemplateSpec) -> StoreResult<TournamentTemplate>;

    /// Find a non-cancelled instance of a template starting inside a window
    async fn find_instance_in_window(
        &self,
        template_id: TemplateId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> StoreResult<Option<TournamentInstance>>;

    /// Count non-cancelled instances starting inside a window
    async fn count_instances_between(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> StoreResult<usize>;
}

/// Trait for entry and snapshot operations
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// List a tournament's entries, ordered by registration time.
    ///
    /// Registration order is the ranking tie-break, so the ordering here is
    /// load-bearing.
    async fn list_entries(
        &self,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> StoreResult<Vec<TournamentEntry>>;

    /// Insert a snapshot row, returning its id
    async fn insert_snapshot(&self, snapshot: &NewWalletSnapshot) -> StoreResult<SnapshotId>;

    /// Link a captured snapshot to its entry
    async fn link_snapshot(
        &self,
        entry_id: EntryId,
        kind: SnapshotKind,
        snapshot_id: SnapshotId,
    ) -> StoreResult<()>;

    /// Fetch one snapshot
    async fn get_snapshot(&self, id: SnapshotId) -> StoreResult<WalletSnapshot>;
}

/// Trait for prize, stats, and report operations
#[async_trait]
pub trait ResultsRepository: Send + Sync {
    /// Whether a prize row already exists for (tournament, champion).
    ///
    /// Checked before every insert so re-running a distribution never
    /// double-pays.
    async fn prize_exists(
        &self,
        tournament_id: TournamentId,
        champion_id: ChampionId,
    ) -> StoreResult<bool>;

    /// Insert a prize distribution record
    async fn insert_prize(&self, prize: &NewPrizeDistribution) -> StoreResult<i64>;

    /// Fetch a champion's cumulative stats
    async fn get_stats(&self, champion_id: ChampionId) -> StoreResult<Option<ChampionStats>>;

    /// Insert or replace a champion's cumulative stats
    async fn upsert_stats(&self, stats: &ChampionStats) -> StoreResult<()>;

    /// Store an archived tournament report
    async fn insert_report(
        &self,
        tournament_id: TournamentId,
        report: &serde_json::Value,
    ) -> StoreResult<()>;
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

const INSTANCE_COLUMNS: &str = "id, template_id, name, status, start_time, end_time, \
     registration_opens, registration_closes, actual_start_time, actual_end_time, \
     participant_count, total_prize_pool, min_participants, cancellation_reason, \
     deployment_metadata, created_at, updated_at";

fn instance_from_row(row: &PgRow) -> StoreResult<TournamentInstance> {
    let status_code: String = row.get("status");
    let status = TournamentStatus::parse(&status_code).ok_or_else(|| StoreError::Corruption {
        message: format!("unknown tournament status: {status_code}"),
    })?;

    Ok(TournamentInstance {
        id: row.get("id"),
        template_id: row.get("template_id"),
        name: row.get("name"),
        status,
        start_time: row.get::<chrono::NaiveDateTime, _>("start_time").and_utc(),
        end_time: row.get::<chrono::NaiveDateTime, _>("end_time").and_utc(),
        registration_opens: row
            .get::<chrono::NaiveDateTime, _>("registration_opens")
            .and_utc(),
        registration_closes: row
            .get::<chrono::NaiveDateTime, _>("registration_closes")
            .and_utc(),
        actual_start_time: row
            .get::<Option<chrono::NaiveDateTime>, _>("actual_start_time")
            .map(|dt| dt.and_utc()),
        actual_end_time: row
            .get::<Option<chrono::NaiveDateTime>, _>("actual_end_time")
            .map(|dt| dt.and_utc()),
        participant_count: row.get::<i32, _>("participant_count") as u32,
        total_prize_pool: row.get("total_prize_pool"),
        min_participants: row.get::<i32, _>("min_participants") as u32,
        cancellation_reason: row.get("cancellation_reason"),
        deployment_metadata: row.get("deployment_metadata"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    })
}

fn template_from_row(row: &PgRow) -> StoreResult<TournamentTemplate> {
    let style_code: String = row.get("trading_style");
    let trading_style = TradingStyle::parse(&style_code).ok_or_else(|| StoreError::Corruption {
        message: format!("unknown trading style: {style_code}"),
    })?;

    Ok(TournamentTemplate {
        id: row.get("id"),
        name: row.get("name"),
        trading_style,
        entry_fee: row.get("entry_fee"),
        max_participants: row.get::<i32, _>("max_participants") as u32,
        prize_pool_percentage: row.get("prize_pool_percentage"),
        is_active: row.get("is_active"),
    })
}

fn entry_from_row(row: &PgRow) -> StoreResult<TournamentEntry> {
    let status_code: String = row.get("status");
    let status = EntryStatus::parse(&status_code).ok_or_else(|| StoreError::Corruption {
        message: format!("unknown entry status: {status_code}"),
    })?;
    let style_code: String = row.get("trading_style");
    let trading_style = TradingStyle::parse(&style_code).ok_or_else(|| StoreError::Corruption {
        message: format!("unknown trading style: {style_code}"),
    })?;

    Ok(TournamentEntry {
        id: row.get("id"),
        tournament_id: row.get("tournament_instance_id"),
        champion_id: row.get("champion_id"),
        wallet_address: row.get("wallet_address"),
        entry_fee_paid: row.get("entry_fee_paid"),
        trading_style,
        status,
        registered_at: row
            .get::<chrono::NaiveDateTime, _>("registered_at")
            .and_utc(),
        start_snapshot_id: row.get("start_snapshot_id"),
        end_snapshot_id: row.get("end_snapshot_id"),
    })
}

/// PostgreSQL implementation of `TournamentRepository`
pub struct PgTournamentRepository {
    pool: PgPool,
}

impl PgTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn list_by_status(
        &self,
        statuses: &[TournamentStatus],
    ) -> StoreResult<Vec<TournamentInstance>> {
        let codes: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM tournament_instances \
             WHERE status = ANY($1) ORDER BY start_time ASC",
        ))
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(instance_from_row).collect()
    }

    async fn get_instance(&self, id: TournamentId) -> StoreResult<TournamentInstance> {
        let row = sqlx::query(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM tournament_instances WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::InstanceNotFound(id))?;

        instance_from_row(&row)
    }

    async fn get_template(&self, id: TemplateId) -> StoreResult<TournamentTemplate> {
        let row = sqlx::query(
            "SELECT id, name, trading_style, entry_fee, max_participants, \
                    prize_pool_percentage, is_active \
             FROM tournament_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::TemplateNotFound(id))?;

        template_from_row(&row)
    }

    async fn set_status(&self, id: TournamentId, status: TournamentStatus) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tournament_instances SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(id));
        }
        Ok(())
    }

    async fn cancel_instance(&self, id: TournamentId, reason: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tournament_instances \
             SET status = 'cancelled', cancellation_reason = $1, updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(id));
        }
        Ok(())
    }

    async fn mark_active(&self, id: TournamentId) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tournament_instances \
             SET status = 'active', actual_start_time = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(id));
        }
        Ok(())
    }

    async fn mark_ended(&self, id: TournamentId) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tournament_instances \
             SET status = 'ended', actual_end_time = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(id));
        }
        Ok(())
    }

    async fn insert_instance(&self, instance: &NewInstance) -> StoreResult<TournamentId> {
        let row = sqlx::query(
            r#"
            INSERT INTO tournament_instances
                (template_id, name, status, start_time, end_time,
                 registration_opens, registration_closes,
                 participant_count, total_prize_pool, min_participants,
                 deployment_metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8, $9)
            RETURNING id
            "#,
        )
        .bind(instance.template_id)
        .bind(&instance.name)
        .bind(instance.status.as_str())
        .bind(instance.start_time.naive_utc())
        .bind(instance.end_time.naive_utc())
        .bind(instance.registration_opens.naive_utc())
        .bind(instance.registration_closes.naive_utc())
        .bind(instance.min_participants as i32)
        .bind(&instance.deployment_metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn get_or_create_template(&self, spec: &TemplateSpec) -> StoreResult<TournamentTemplate> {
        let existing = sqlx::query(
            "SELECT id, name, trading_style, entry_fee, max_participants, \
                    prize_pool_percentage, is_active \
             FROM tournament_templates WHERE name = $1",
        )
        .bind(&spec.name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return template_from_row(&row);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO tournament_templates
                (name, trading_style, entry_fee, max_participants, prize_pool_percentage, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id, name, trading_style, entry_fee, max_participants,
                      prize_pool_percentage, is_active
            "#,
        )
        .bind(&spec.name)
        .bind(spec.trading_style.as_str())
        .bind(spec.entry_fee)
        .bind(spec.max_participants as i32)
        .bind(spec.prize_pool_percentage)
        .fetch_one(&self.pool)
        .await?;

        template_from_row(&row)
    }

    async fn find_instance_in_window(
        &self,
        template_id: TemplateId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> StoreResult<Option<TournamentInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM tournament_instances \
             WHERE template_id = $1 AND start_time >= $2 AND start_time <= $3 \
               AND status <> 'cancelled' \
             LIMIT 1",
        ))
        .bind(template_id)
        .bind(window_start.naive_utc())
        .bind(window_end.naive_utc())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(instance_from_row).transpose()
    }

    async fn count_instances_between(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM tournament_instances \
             WHERE start_time >= $1 AND start_time <= $2 AND status <> 'cancelled'",
        )
        .bind(window_start.naive_utc())
        .bind(window_end.naive_utc())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n") as usize)
    }
}

/// PostgreSQL implementation of `EntryRepository`
pub struct PgEntryRepository {
    pool: PgPool,
}

impl PgEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn list_entries(
        &self,
        tournament_id: TournamentId,
        status: Option<EntryStatus>,
    ) -> StoreResult<Vec<TournamentEntry>> {
        const COLUMNS: &str = "id, tournament_instance_id, champion_id, wallet_address, \
             entry_fee_paid, trading_style, status, registered_at, \
             start_snapshot_id, end_snapshot_id";

        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {COLUMNS} FROM tournament_entries \
                 WHERE tournament_instance_id = $1 AND status = $2 \
                 ORDER BY registered_at ASC",
            ))
            .bind(tournament_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {COLUMNS} FROM tournament_entries \
                 WHERE tournament_instance_id = $1 ORDER BY registered_at ASC",
            ))
            .bind(tournament_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(entry_from_row).collect()
    }

    async fn insert_snapshot(&self, snapshot: &NewWalletSnapshot) -> StoreResult<SnapshotId> {
        let holdings = serde_json::to_value(&snapshot.holdings)?;

        let row = sqlx::query(
            r#"
            INSERT INTO wallet_snapshots
                (entry_id, wallet_address, kind, sol_balance, holdings,
                 total_value, captured_at, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(snapshot.entry_id)
        .bind(&snapshot.wallet_address)
        .bind(snapshot.kind.as_str())
        .bind(snapshot.sol_balance)
        .bind(holdings)
        .bind(snapshot.total_value)
        .bind(snapshot.captured_at.naive_utc())
        .bind(&snapshot.raw)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn link_snapshot(
        &self,
        entry_id: EntryId,
        kind: SnapshotKind,
        snapshot_id: SnapshotId,
    ) -> StoreResult<()> {
        let column = match kind {
            SnapshotKind::Start => "start_snapshot_id",
            SnapshotKind::End => "end_snapshot_id",
        };

        sqlx::query(&format!(
            "UPDATE tournament_entries SET {column} = $1 WHERE id = $2",
        ))
        .bind(snapshot_id)
        .bind(entry_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> StoreResult<WalletSnapshot> {
        let row = sqlx::query(
            "SELECT id, entry_id, wallet_address, kind, sol_balance, holdings, \
                    total_value, captured_at, raw \
             FROM wallet_snapshots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SnapshotNotFound(id))?;

        let kind_code: String = row.get("kind");
        let kind = SnapshotKind::parse(&kind_code).ok_or_else(|| StoreError::Corruption {
            message: format!("unknown snapshot kind: {kind_code}"),
        })?;
        let holdings: Vec<TokenHolding> = serde_json::from_value(row.get("holdings"))?;

        Ok(WalletSnapshot {
            id: row.get("id"),
            entry_id: row.get("entry_id"),
            wallet_address: row.get("wallet_address"),
            kind,
            sol_balance: row.get("sol_balance"),
            holdings,
            total_value: row.get("total_value"),
            captured_at: row.get::<chrono::NaiveDateTime, _>("captured_at").and_utc(),
            raw: row.get("raw"),
        })
    }
}

/// PostgreSQL implementation of `ResultsRepository`
pub struct PgResultsRepository {
    pool: PgPool,
}

impl PgResultsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultsRepository for PgResultsRepository {
    async fn prize_exists(
        &self,
        tournament_id: TournamentId,
        champion_id: ChampionId,
    ) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT id FROM prize_distributions \
             WHERE tournament_instance_id = $1 AND champion_id = $2",
        )
        .bind(tournament_id)
        .bind(champion_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn insert_prize(&self, prize: &NewPrizeDistribution) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO prize_distributions
                (tournament_instance_id, champion_id, rank, prize_amount,
                 performance_percentage, distributed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id
            "#,
        )
        .bind(prize.tournament_id)
        .bind(prize.champion_id)
        .bind(prize.rank as i32)
        .bind(prize.prize_amount)
        .bind(prize.performance)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn get_stats(&self, champion_id: ChampionId) -> StoreResult<Option<ChampionStats>> {
        let row = sqlx::query(
            "SELECT champion_id, tournaments_played, tournaments_won, \
                    total_sol_earned, current_win_streak, updated_at \
             FROM champion_stats WHERE champion_id = $1",
        )
        .bind(champion_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ChampionStats {
            champion_id: r.get("champion_id"),
            tournaments_played: r.get::<i32, _>("tournaments_played") as u32,
            tournaments_won: r.get::<i32, _>("tournaments_won") as u32,
            total_sol_earned: r.get("total_sol_earned"),
            current_win_streak: r.get::<i32, _>("current_win_streak") as u32,
            updated_at: r.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }))
    }

    async fn upsert_stats(&self, stats: &ChampionStats) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO champion_stats
                (champion_id, tournaments_played, tournaments_won,
                 total_sol_earned, current_win_streak, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (champion_id)
            DO UPDATE SET
                tournaments_played = EXCLUDED.tournaments_played,
                tournaments_won = EXCLUDED.tournaments_won,
                total_sol_earned = EXCLUDED.total_sol_earned,
                current_win_streak = EXCLUDED.current_win_streak,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(stats.champion_id)
        .bind(stats.tournaments_played as i32)
        .bind(stats.tournaments_won as i32)
        .bind(stats.total_sol_earned)
        .bind(stats.current_win_streak as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_report(
        &self,
        tournament_id: TournamentId,
        report: &serde_json::Value,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tournament_reports (tournament_instance_id, report_data, created_at) \
             VALUES ($1, $2, NOW())",
        )
        .bind(tournament_id)
        .bind(report)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
