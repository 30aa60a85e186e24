//! Tournament data models for wallet-performance tournaments.

use crate::provider::TokenHolding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tournament instance ID type
pub type TournamentId = i64;

/// Tournament template ID type
pub type TemplateId = i64;

/// Tournament entry ID type
pub type EntryId = i64;

/// Wallet snapshot row ID type
pub type SnapshotId = i64;

/// Champion (participant) ID type
pub type ChampionId = Uuid;

/// Tournament instance status.
///
/// Transitions are monotonic along the lifecycle; the only backward-looking
/// exits are `Cancelled` (manual or insufficient participants) and
/// `NeedsReview` (end-of-tournament processing failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TournamentStatus {
    /// Created by the deployment scheduler, registration not yet open
    Scheduled,
    /// Accepting registrations
    Registering,
    /// Registration closed, waiting for start time
    RegistrationClosed,
    /// Tournament in progress, start snapshots taken
    Active,
    /// End time reached, results being computed
    Ended,
    /// Results computed and prizes recorded
    Complete,
    /// End-of-tournament processing failed, operator attention required
    NeedsReview,
    /// Tournament cancelled
    Cancelled,
}

impl TournamentStatus {
    /// Storage code for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Scheduled => "scheduled",
            TournamentStatus::Registering => "registering",
            TournamentStatus::RegistrationClosed => "registration_closed",
            TournamentStatus::Active => "active",
            TournamentStatus::Ended => "ended",
            TournamentStatus::Complete => "complete",
            TournamentStatus::NeedsReview => "needs_review",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a storage code
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "scheduled" => Some(TournamentStatus::Scheduled),
            "registering" => Some(TournamentStatus::Registering),
            "registration_closed" => Some(TournamentStatus::RegistrationClosed),
            "active" => Some(TournamentStatus::Active),
            "ended" => Some(TournamentStatus::Ended),
            "complete" => Some(TournamentStatus::Complete),
            "needs_review" => Some(TournamentStatus::NeedsReview),
            "cancelled" => Some(TournamentStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether no further automated transitions apply
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Complete | TournamentStatus::NeedsReview | TournamentStatus::Cancelled
        )
    }

    /// Position along the forward lifecycle, for monotonicity checks.
    ///
    /// Terminal exit states share the highest position so that a move into
    /// them never counts as a regression.
    pub fn phase(&self) -> u8 {
        match self {
            TournamentStatus::Scheduled => 0,
            TournamentStatus::Registering => 1,
            TournamentStatus::RegistrationClosed => 2,
            TournamentStatus::Active => 3,
            TournamentStatus::Ended => 4,
            TournamentStatus::Complete => 5,
            TournamentStatus::NeedsReview => 5,
            TournamentStatus::Cancelled => 5,
        }
    }
}

/// Trading style a tournament (and each entry) is played under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingStyle {
    /// Wallet balance changes only, no token trading expected
    PureWallet,
    /// Any on-chain trading counts toward performance
    OpenTrading,
}

impl TradingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingStyle::PureWallet => "pure_wallet",
            TradingStyle::OpenTrading => "open_trading",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "pure_wallet" => Some(TradingStyle::PureWallet),
            "open_trading" => Some(TradingStyle::OpenTrading),
            _ => None,
        }
    }
}

/// Reusable tournament definition a scheduler deployment stamps instances from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentTemplate {
    /// Template ID
    pub id: TemplateId,
    /// Template name (e.g. "Pure Wallet Bronze League")
    pub name: String,
    /// Trading style for instances of this template
    pub trading_style: TradingStyle,
    /// Entry fee in SOL
    pub entry_fee: f64,
    /// Maximum participants per instance
    pub max_participants: u32,
    /// Share of collected fees that funds the prize pool (0-100)
    pub prize_pool_percentage: f64,
    /// Whether the scheduler still deploys this template
    pub is_active: bool,
}

/// A single scheduled run of a tournament template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentInstance {
    /// Instance ID
    pub id: TournamentId,
    /// Template this instance was stamped from
    pub template_id: TemplateId,
    /// Display name, unique per deployment date
    pub name: String,
    /// Current lifecycle status
    pub status: TournamentStatus,
    /// Scheduled start time
    pub start_time: DateTime<Utc>,
    /// Scheduled end time
    pub end_time: DateTime<Utc>,
    /// When registration opens
    pub registration_opens: DateTime<Utc>,
    /// When registration closes
    pub registration_closes: DateTime<Utc>,
    /// When the engine actually activated the tournament
    pub actual_start_time: Option<DateTime<Utc>>,
    /// When the engine actually ended the tournament
    pub actual_end_time: Option<DateTime<Utc>>,
    /// Registered participant count
    pub participant_count: u32,
    /// Prize pool in SOL, funded from entry fees
    pub total_prize_pool: f64,
    /// Minimum participants required to run
    pub min_participants: u32,
    /// Reason recorded when the instance was cancelled
    pub cancellation_reason: Option<String>,
    /// Free-form deployment metadata (tier, trading style, batch)
    pub deployment_metadata: serde_json::Value,
    /// Created at timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Entry (registration) status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Registered and eligible for snapshots
    Registered,
    /// Withdrew before the tournament started
    Withdrawn,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Registered => "registered",
            EntryStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "registered" => Some(EntryStatus::Registered),
            "withdrawn" => Some(EntryStatus::Withdrawn),
            _ => None,
        }
    }
}

/// A champion's registration in one tournament instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentEntry {
    /// Entry ID
    pub id: EntryId,
    /// Tournament instance
    pub tournament_id: TournamentId,
    /// Participating champion
    pub champion_id: ChampionId,
    /// Wallet address snapshots are taken against
    pub wallet_address: String,
    /// Entry fee paid in SOL
    pub entry_fee_paid: f64,
    /// Declared trading style
    pub trading_style: TradingStyle,
    /// Entry status
    pub status: EntryStatus,
    /// Registration timestamp (ranking tie-break order)
    pub registered_at: DateTime<Utc>,
    /// Start snapshot, linked once captured
    pub start_snapshot_id: Option<SnapshotId>,
    /// End snapshot, linked once captured
    pub end_snapshot_id: Option<SnapshotId>,
}

impl TournamentEntry {
    /// Whether this entry properly started the tournament
    pub fn has_start_snapshot(&self) -> bool {
        self.start_snapshot_id.is_some()
    }
}

/// Which side of the tournament a snapshot was captured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotKind {
    Start,
    End,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Start => "start",
            SnapshotKind::End => "end",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "start" => Some(SnapshotKind::Start),
            "end" => Some(SnapshotKind::End),
            _ => None,
        }
    }
}

/// Point-in-time capture of a wallet's state, insert-only.
///
/// A snapshot row is never edited after insert; corrections are new rows.
/// Each entry holds at most one `Start` and one `End` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// Snapshot ID
    pub id: SnapshotId,
    /// Entry this snapshot belongs to
    pub entry_id: EntryId,
    /// Wallet address captured
    pub wallet_address: String,
    /// Start or end of tournament
    pub kind: SnapshotKind,
    /// SOL balance at capture time
    pub sol_balance: f64,
    /// Token holdings at capture time
    pub holdings: Vec<TokenHolding>,
    /// Total wallet value in SOL terms
    pub total_value: f64,
    /// Capture timestamp
    pub captured_at: DateTime<Utc>,
    /// Raw provider response, kept for audit
    pub raw: serde_json::Value,
}

/// One ranked entrant, computed transiently at tournament end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Champion being ranked
    pub champion_id: ChampionId,
    /// Entry the ranking was computed from
    pub entry_id: EntryId,
    /// 1-based rank, descending by performance
    pub rank: u32,
    /// Performance percentage between start and end snapshots
    pub performance: f64,
}

/// A recorded prize payout, append-only and unique per (tournament, champion)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeDistribution {
    /// Row ID
    pub id: i64,
    /// Tournament instance
    pub tournament_id: TournamentId,
    /// Winning champion
    pub champion_id: ChampionId,
    /// Final rank
    pub rank: u32,
    /// Prize amount in SOL
    pub prize_amount: f64,
    /// Performance percentage at tournament end
    pub performance: f64,
    /// When the prize was recorded
    pub distributed_at: DateTime<Utc>,
}

/// Cumulative per-champion statistics, updated after each completed tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampionStats {
    /// Champion ID
    pub champion_id: ChampionId,
    /// Tournaments completed
    pub tournaments_played: u32,
    /// First-place finishes
    pub tournaments_won: u32,
    /// Cumulative SOL earned from prizes
    pub total_sol_earned: f64,
    /// Current consecutive-win streak
    pub current_win_streak: u32,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ChampionStats {
    /// Fresh stats row for a champion with no history
    pub fn new(champion_id: ChampionId) -> Self {
        Self {
            champion_id,
            tournaments_played: 0,
            tournaments_won: 0,
            total_sol_earned: 0.0,
            current_win_streak: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        let statuses = [
            TournamentStatus::Scheduled,
            TournamentStatus::Registering,
            TournamentStatus::RegistrationClosed,
            TournamentStatus::Active,
            TournamentStatus::Ended,
            TournamentStatus::Complete,
            TournamentStatus::NeedsReview,
            TournamentStatus::Cancelled,
        ];
        for status in statuses {
            assert_eq!(TournamentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TournamentStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TournamentStatus::Complete.is_terminal());
        assert!(TournamentStatus::NeedsReview.is_terminal());
        assert!(TournamentStatus::Cancelled.is_terminal());
        assert!(!TournamentStatus::Scheduled.is_terminal());
        assert!(!TournamentStatus::Active.is_terminal());
        assert!(!TournamentStatus::Ended.is_terminal());
    }

    #[test]
    fn test_phase_is_monotonic_along_lifecycle() {
        let forward = [
            TournamentStatus::Scheduled,
            TournamentStatus::Registering,
            TournamentStatus::RegistrationClosed,
            TournamentStatus::Active,
            TournamentStatus::Ended,
            TournamentStatus::Complete,
        ];
        for pair in forward.windows(2) {
            assert!(
                pair[0].phase() < pair[1].phase(),
                "{:?} should precede {:?}",
                pair[0],
                pair[1]
            );
        }
        // Exits never rank below the states they exit from
        assert!(TournamentStatus::Cancelled.phase() >= TournamentStatus::Active.phase());
        assert!(TournamentStatus::NeedsReview.phase() >= TournamentStatus::Ended.phase());
    }

    #[test]
    fn test_trading_style_codes() {
        assert_eq!(TradingStyle::parse("pure_wallet"), Some(TradingStyle::PureWallet));
        assert_eq!(TradingStyle::parse("open_trading"), Some(TradingStyle::OpenTrading));
        assert_eq!(TradingStyle::PureWallet.as_str(), "pure_wallet");
        assert_eq!(TradingStyle::parse("hodl"), None);
    }

    #[test]
    fn test_snapshot_kind_codes() {
        assert_eq!(SnapshotKind::parse("start"), Some(SnapshotKind::Start));
        assert_eq!(SnapshotKind::parse("end"), Some(SnapshotKind::End));
        assert_eq!(SnapshotKind::parse("mid"), None);
    }
}
