//! Calendar-driven tournament deployment.
//!
//! The scheduler makes sure that for every deployment date inside the
//! lookahead horizon, each configured tournament variant has exactly one
//! instance. Existence checks use a tolerant time window around the target
//! start keyed on the template, not the display name, so clock drift or a
//! retried sweep never creates duplicates.

use crate::db::repository::{NewInstance, StoreResult, TemplateSpec, TournamentRepository};
use crate::tournament::models::{TournamentStatus, TradingStyle};
use crate::tournament::prize::PrizeTierTable;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors loading a deployment configuration file
#[derive(Debug, Error)]
pub enum SchedulerConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One tournament variant stamped on every deployment date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentVariant {
    /// Variant (and template) name
    pub name: String,
    /// Trading style
    pub trading_style: TradingStyle,
    /// Participant cap
    pub max_participants: u32,
    /// Minimum participants to run
    pub min_participants: u32,
    /// Entry fee in SOL
    pub entry_fee: f64,
    /// Tournament length in days
    pub duration_days: u32,
    /// Share of collected fees funding the prize pool (0-100)
    pub prize_pool_percentage: f64,
}

/// Deployment cadence and catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Weekdays tournaments deploy on
    #[serde(default = "default_deployment_days")]
    pub deployment_days: Vec<Weekday>,
    /// Start time-of-day (UTC) for deployed tournaments
    #[serde(default = "default_deployment_time")]
    pub deployment_time: NaiveTime,
    /// How many days ahead to deploy
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: u32,
    /// Cap on deployment dates handled per sweep
    #[serde(default = "default_max_dates")]
    pub max_dates_per_sweep: usize,
    /// Days before start that registration opens
    #[serde(default = "default_registration_lead_days")]
    pub registration_lead_days: u32,
    /// Minutes before start that registration closes
    #[serde(default = "default_registration_close_lead_minutes")]
    pub registration_close_lead_minutes: u32,
    /// Variants created on every deployment date
    #[serde(default = "default_variants")]
    pub variants: Vec<TournamentVariant>,
    /// Prize tiers applied at tournament end
    #[serde(default)]
    pub prize_tiers: PrizeTierTable,
}

fn default_deployment_days() -> Vec<Weekday> {
    vec![Weekday::Mon, Weekday::Thu]
}

fn default_deployment_time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).expect("valid time")
}

fn default_lookahead_days() -> u32 {
    28
}

fn default_max_dates() -> usize {
    8
}

fn default_registration_lead_days() -> u32 {
    3
}

fn default_registration_close_lead_minutes() -> u32 {
    10
}

fn default_variants() -> Vec<TournamentVariant> {
    let leagues = [
        ("Bronze", 100, 10, 0.01),
        ("Silver", 500, 25, 0.05),
        ("Gold", 1000, 50, 0.1),
    ];
    let mut variants = Vec::new();
    for (tier, max, min, fee) in leagues {
        variants.push(TournamentVariant {
            name: format!("Pure Wallet {tier} League"),
            trading_style: TradingStyle::PureWallet,
            max_participants: max,
            min_participants: min,
            entry_fee: fee,
            duration_days: 7,
            prize_pool_percentage: 85.0,
        });
        variants.push(TournamentVariant {
            name: format!("Open Trading {tier} Battle"),
            trading_style: TradingStyle::OpenTrading,
            max_participants: max,
            min_participants: min,
            entry_fee: fee,
            duration_days: 7,
            prize_pool_percentage: 80.0,
        });
    }
    variants
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployment_days: default_deployment_days(),
            deployment_time: default_deployment_time(),
            lookahead_days: default_lookahead_days(),
            max_dates_per_sweep: default_max_dates(),
            registration_lead_days: default_registration_lead_days(),
            registration_close_lead_minutes: default_registration_close_lead_minutes(),
            variants: default_variants(),
            prize_tiers: PrizeTierTable::standard(),
        }
    }
}

impl DeploymentConfig {
    /// Load a configuration from a JSON file; absent fields use defaults
    pub fn from_json_file(path: &Path) -> Result<Self, SchedulerConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

/// Counts for one deployment sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentSummary {
    pub dates_checked: usize,
    pub created: usize,
    pub skipped: usize,
    pub failures: usize,
}

/// Creates future tournament instances on the configured cadence.
pub struct DeploymentScheduler {
    tournaments: Arc<dyn TournamentRepository>,
    config: DeploymentConfig,
}

impl DeploymentScheduler {
    /// Create a scheduler over the given repository
    pub fn new(tournaments: Arc<dyn TournamentRepository>, config: DeploymentConfig) -> Self {
        Self {
            tournaments,
            config,
        }
    }

    /// Deployment datetimes within the horizon, soonest first
    fn upcoming_deployment_dates(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let today = now.date_naive();
        let mut dates = Vec::new();
        for offset in 0..self.config.lookahead_days {
            let day = today + Duration::days(offset as i64);
            if !self.config.deployment_days.contains(&day.weekday()) {
                continue;
            }
            let when = day.and_time(self.config.deployment_time).and_utc();
            if when > now {
                dates.push(when);
            }
        }
        dates.truncate(self.config.max_dates_per_sweep);
        dates
    }

    /// Ensure every upcoming deployment date has all its variants.
    ///
    /// Failure to create one variant never blocks the others; each creation
    /// attempt is isolated and counted.
    pub async fn ensure_scheduled(&self, now: DateTime<Utc>) -> StoreResult<DeploymentSummary> {
        let dates = self.upcoming_deployment_dates(now);
        info!(
            "deployment sweep: {} candidate dates within {} days",
            dates.len(),
            self.config.lookahead_days
        );

        let mut summary = DeploymentSummary::default();
        for date in dates {
            summary.dates_checked += 1;

            let day_start = date.date_naive().and_time(NaiveTime::MIN).and_utc();
            let day_end = day_start + Duration::days(1) - Duration::seconds(1);
            let existing = match self
                .tournaments
                .count_instances_between(day_start, day_end)
                .await
            {
                Ok(count) => count,
                Err(e) => {
                    // The per-variant window check below still prevents
                    // duplicates, so creation may proceed
                    warn!("existence count failed for {date}: {e}");
                    0
                }
            };

            if existing >= self.config.variants.len() {
                debug!("date {date} already has {existing} tournaments, skipping");
                summary.skipped += self.config.variants.len();
                continue;
            }

            for variant in &self.config.variants {
                match self.deploy_variant(date, variant).await {
                    Ok(true) => summary.created += 1,
                    Ok(false) => summary.skipped += 1,
                    Err(e) => {
                        error!("failed to deploy {} for {date}: {e}", variant.name);
                        summary.failures += 1;
                    }
                }
            }
        }

        info!(
            "deployment sweep complete: {} created, {} skipped, {} failures",
            summary.created, summary.skipped, summary.failures
        );
        Ok(summary)
    }

    /// Create one variant's instance for a deployment date unless it exists.
    ///
    /// Dedup key is (template, start-time window), with the variant's tier
    /// carried in the template identity; display names are not compared.
    async fn deploy_variant(
        &self,
        start: DateTime<Utc>,
        variant: &TournamentVariant,
    ) -> StoreResult<bool> {
        let template = self
            .tournaments
            .get_or_create_template(&TemplateSpec {
                name: variant.name.clone(),
                trading_style: variant.trading_style,
                entry_fee: variant.entry_fee,
                max_participants: variant.max_participants,
                prize_pool_percentage: variant.prize_pool_percentage,
            })
            .await?;

        // Tolerant window absorbs clock drift between sweeps
        let window_start = start - Duration::hours(1);
        let window_end = start + Duration::hours(1);
        if let Some(existing) = self
            .tournaments
            .find_instance_in_window(template.id, window_start, window_end)
            .await?
        {
            debug!(
                "tournament already exists: {} at {}",
                existing.name, existing.start_time
            );
            return Ok(false);
        }

        let registration_opens = start - Duration::days(self.config.registration_lead_days as i64);
        let registration_closes =
            start - Duration::minutes(self.config.registration_close_lead_minutes as i64);
        let end_time = start + Duration::days(variant.duration_days as i64);
        let name = format!("{} - {}", variant.name, start.format("%b %-d, %Y"));

        let metadata = serde_json::json!({
            "deployed_at": Utc::now().to_rfc3339(),
            "variant": variant.name,
            "trading_style": variant.trading_style.as_str(),
            "deployment_batch": format!(
                "{}-{}",
                start.format("%Y-%m-%d"),
                variant.trading_style.as_str()
            ),
        });

        let id = self
            .tournaments
            .insert_instance(&NewInstance {
                template_id: template.id,
                name: name.clone(),
                status: TournamentStatus::Scheduled,
                start_time: start,
                end_time,
                registration_opens,
                registration_closes,
                min_participants: variant.min_participants,
                deployment_metadata: metadata,
            })
            .await?;

        info!("created tournament {id}: {name}");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::mock::MockStore;
    use chrono::TimeZone;

    fn test_config() -> DeploymentConfig {
        DeploymentConfig {
            deployment_days: vec![Weekday::Mon, Weekday::Thu],
            lookahead_days: 7,
            max_dates_per_sweep: 8,
            variants: vec![
                TournamentVariant {
                    name: "Pure Wallet Bronze League".to_string(),
                    trading_style: TradingStyle::PureWallet,
                    max_participants: 100,
                    min_participants: 10,
                    entry_fee: 0.01,
                    duration_days: 7,
                    prize_pool_percentage: 85.0,
                },
                TournamentVariant {
                    name: "Open Trading Bronze Battle".to_string(),
                    trading_style: TradingStyle::OpenTrading,
                    max_participants: 100,
                    min_participants: 10,
                    entry_fee: 0.01,
                    duration_days: 7,
                    prize_pool_percentage: 80.0,
                },
            ],
            ..DeploymentConfig::default()
        }
    }

    /// Wednesday 2026-08-05 10:00 UTC
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_upcoming_dates_follow_cadence() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(store, test_config());

        let dates = scheduler.upcoming_deployment_dates(wednesday());
        // Within 7 days of Wed 8/5: Thu 8/6 and Mon 8/10, both at 14:00 UTC
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0], Utc.with_ymd_and_hms(2026, 8, 6, 14, 0, 0).unwrap());
        assert_eq!(dates[1], Utc.with_ymd_and_hms(2026, 8, 10, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_upcoming_dates_exclude_past_deployment_time() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(store, test_config());

        // Thursday 15:00, an hour after that day's deployment time
        let late_thursday = Utc.with_ymd_and_hms(2026, 8, 6, 15, 0, 0).unwrap();
        let dates = scheduler.upcoming_deployment_dates(late_thursday);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].weekday(), Weekday::Mon);
    }

    #[test]
    fn test_upcoming_dates_are_capped() {
        let store = Arc::new(MockStore::new());
        let config = DeploymentConfig {
            lookahead_days: 180,
            max_dates_per_sweep: 8,
            ..test_config()
        };
        let scheduler = DeploymentScheduler::new(store, config);
        assert_eq!(scheduler.upcoming_deployment_dates(wednesday()).len(), 8);
    }

    #[tokio::test]
    async fn test_sweep_creates_every_variant_per_date() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, test_config());

        let summary = scheduler.ensure_scheduled(wednesday()).await.unwrap();
        // 2 dates x 2 variants
        assert_eq!(summary.created, 4);
        assert_eq!(summary.failures, 0);

        let instances = store.instances();
        assert_eq!(instances.len(), 4);
        assert!(instances.iter().all(|i| i.status == TournamentStatus::Scheduled));
        // One template per variant, reused across dates
        assert_eq!(store.templates().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_rerun_creates_nothing_new() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, test_config());

        scheduler.ensure_scheduled(wednesday()).await.unwrap();
        let rerun = scheduler.ensure_scheduled(wednesday()).await.unwrap();

        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.skipped, 4);
        assert_eq!(store.instances().len(), 4);
    }

    #[tokio::test]
    async fn test_instance_times_derive_from_config() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, test_config());

        scheduler.ensure_scheduled(wednesday()).await.unwrap();

        let thursday_start = Utc.with_ymd_and_hms(2026, 8, 6, 14, 0, 0).unwrap();
        let instance = store
            .instances()
            .into_iter()
            .find(|i| i.start_time == thursday_start)
            .unwrap();
        assert_eq!(instance.registration_opens, thursday_start - Duration::days(3));
        assert_eq!(
            instance.registration_closes,
            thursday_start - Duration::minutes(10)
        );
        assert_eq!(instance.end_time, thursday_start + Duration::days(7));
        assert!(instance.name.starts_with("Pure Wallet Bronze League - Aug 6, 2026")
            || instance.name.starts_with("Open Trading Bronze Battle - Aug 6, 2026"));
    }

    #[tokio::test]
    async fn test_drifted_duplicate_within_window_is_skipped() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, test_config());
        scheduler.ensure_scheduled(wednesday()).await.unwrap();
        let created = store.instances().len();

        // A sweep whose clock drifted 20 minutes still matches the existing
        // instances through the tolerant window
        let drifted = DeploymentConfig {
            deployment_time: NaiveTime::from_hms_opt(14, 20, 0).unwrap(),
            ..test_config()
        };
        let drifted_scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, drifted);
        let summary = drifted_scheduler.ensure_scheduled(wednesday()).await.unwrap();

        assert_eq!(summary.created, 0);
        assert_eq!(store.instances().len(), created);
    }

    #[tokio::test]
    async fn test_variant_failures_do_not_block_the_sweep() {
        let store = Arc::new(MockStore::new());
        let scheduler = DeploymentScheduler::new(Arc::clone(&store) as _, test_config());

        store.fail_call("insert_instance");
        let summary = scheduler.ensure_scheduled(wednesday()).await.unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(summary.failures, 4);

        // Recovery: the next sweep fills everything in
        store.clear_failures();
        let summary = scheduler.ensure_scheduled(wednesday()).await.unwrap();
        assert_eq!(summary.created, 4);
    }

    #[test]
    fn test_default_catalog_shape() {
        let config = DeploymentConfig::default();
        assert_eq!(config.variants.len(), 6);
        assert_eq!(config.deployment_days, vec![Weekday::Mon, Weekday::Thu]);
        assert!(config.prize_tiers.validate().is_ok());
        assert!(
            config
                .variants
                .iter()
                .all(|v| v.min_participants < v.max_participants)
        );
    }

    #[test]
    fn test_config_json_round_trip_with_defaults() {
        let json = r#"{
            "deployment_days": ["Fri"],
            "lookahead_days": 14,
            "variants": [{
                "name": "Weekend Sprint",
                "trading_style": "PureWallet",
                "max_participants": 50,
                "min_participants": 5,
                "entry_fee": 0.02,
                "duration_days": 2,
                "prize_pool_percentage": 90.0
            }]
        }"#;
        let config: DeploymentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.deployment_days, vec![Weekday::Fri]);
        assert_eq!(config.lookahead_days, 14);
        assert_eq!(config.variants.len(), 1);
        // Unspecified fields fall back to defaults
        assert_eq!(config.deployment_time, default_deployment_time());
        assert_eq!(config.max_dates_per_sweep, 8);
    }
}
