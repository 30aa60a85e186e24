//! Tiered prize distribution calculator.

use serde::{Deserialize, Serialize};

/// One payout tier: applies once a tournament reaches `min_participants`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeTier {
    /// Smallest participant count this tier applies to
    pub min_participants: u32,
    /// Ordered payout percentages, rank 1 first
    pub percentages: Vec<f64>,
}

/// Participant-count-keyed table of payout percentage lists.
///
/// Tier selection picks the row with the largest threshold not exceeding the
/// participant count; below every threshold the winner takes all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeTierTable {
    tiers: Vec<PrizeTier>,
}

impl PrizeTierTable {
    /// Build a table from tiers, sorted by ascending threshold
    pub fn new(mut tiers: Vec<PrizeTier>) -> Self {
        tiers.sort_by_key(|t| t.min_participants);
        Self { tiers }
    }

    /// Standard table:
    /// - 10+ participants: top 3 paid (50/30/20)
    /// - 100+ participants: top 6 paid (35/25/15/10/8/7)
    /// - 500+ participants: top 9 paid (30/20/15/10/8/7/5/3/2)
    pub fn standard() -> Self {
        Self::new(vec![
            PrizeTier {
                min_participants: 10,
                percentages: vec![50.0, 30.0, 20.0],
            },
            PrizeTier {
                min_participants: 100,
                percentages: vec![35.0, 25.0, 15.0, 10.0, 8.0, 7.0],
            },
            PrizeTier {
                min_participants: 500,
                percentages: vec![30.0, 20.0, 15.0, 10.0, 8.0, 7.0, 5.0, 3.0, 2.0],
            },
        ])
    }

    /// Select the payout percentages for a participant count.
    ///
    /// Returns winner-takes-all when no tier threshold qualifies.
    pub fn select(&self, participant_count: usize) -> Vec<f64> {
        let mut selected = vec![100.0];
        for tier in &self.tiers {
            if participant_count >= tier.min_participants as usize {
                selected = tier.percentages.clone();
            }
        }
        selected
    }

    /// Configuration-time sanity check: every tier's percentages must be
    /// positive and sum to at most 100.
    pub fn validate(&self) -> Result<(), String> {
        for tier in &self.tiers {
            if tier.percentages.is_empty() {
                return Err(format!(
                    "tier at {} participants has no payout percentages",
                    tier.min_participants
                ));
            }
            if tier.percentages.iter().any(|p| *p <= 0.0) {
                return Err(format!(
                    "tier at {} participants contains a non-positive percentage",
                    tier.min_participants
                ));
            }
            let sum: f64 = tier.percentages.iter().sum();
            if sum > 100.0 + 1e-9 {
                return Err(format!(
                    "tier at {} participants pays out {sum}% (> 100%)",
                    tier.min_participants
                ));
            }
        }
        Ok(())
    }
}

impl Default for PrizeTierTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Compute absolute prize amounts for a tournament.
///
/// The selected tier's percentages are applied to `total_pool`; the result is
/// truncated to `participant_count` entries so a short field never pays more
/// ranks than it has entrants. Unpaid ranks are omitted, not zeroed.
pub fn calculate_distribution(
    total_pool: f64,
    participant_count: usize,
    table: &PrizeTierTable,
) -> Vec<f64> {
    let percentages = table.select(participant_count);
    percentages
        .iter()
        .take(participant_count)
        .map(|percentage| total_pool * percentage / 100.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_winner_takes_all_below_first_tier() {
        let table = PrizeTierTable::standard();
        let amounts = calculate_distribution(1.0, 5, &table);
        assert_eq!(amounts.len(), 1);
        assert!(close(amounts[0], 1.0));
    }

    #[test]
    fn test_first_tier_top_three() {
        let table = PrizeTierTable::standard();
        let amounts = calculate_distribution(2.3, 23, &table);
        assert_eq!(amounts.len(), 3);
        assert!(close(amounts[0], 1.15));
        assert!(close(amounts[1], 0.69));
        assert!(close(amounts[2], 0.46));
    }

    #[test]
    fn test_largest_qualifying_threshold_wins() {
        let table = PrizeTierTable::standard();
        assert_eq!(table.select(99).len(), 3);
        assert_eq!(table.select(100).len(), 6);
        assert_eq!(table.select(499).len(), 6);
        assert_eq!(table.select(500).len(), 9);
        assert_eq!(table.select(5000).len(), 9);
    }

    #[test]
    fn test_truncated_to_participant_count() {
        let table = PrizeTierTable::new(vec![PrizeTier {
            min_participants: 2,
            percentages: vec![50.0, 30.0, 20.0],
        }]);
        // Three paid ranks configured, but only two entrants to pay
        let amounts = calculate_distribution(10.0, 2, &table);
        assert_eq!(amounts.len(), 2);
        assert!(close(amounts[0], 5.0));
        assert!(close(amounts[1], 3.0));

        // Below every threshold the winner takes the whole pool
        let solo = calculate_distribution(10.0, 1, &table);
        assert_eq!(solo.len(), 1);
        assert!(close(solo[0], 10.0));
    }

    #[test]
    fn test_validate_rejects_overpaying_tier() {
        let table = PrizeTierTable::new(vec![PrizeTier {
            min_participants: 2,
            percentages: vec![80.0, 30.0],
        }]);
        assert!(table.validate().is_err());
        assert!(PrizeTierTable::standard().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_tier() {
        let table = PrizeTierTable::new(vec![PrizeTier {
            min_participants: 2,
            percentages: vec![],
        }]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_unsorted_tiers_are_normalized() {
        let table = PrizeTierTable::new(vec![
            PrizeTier {
                min_participants: 100,
                percentages: vec![60.0, 40.0],
            },
            PrizeTier {
                min_participants: 10,
                percentages: vec![100.0],
            },
        ]);
        assert_eq!(table.select(150).len(), 2);
        assert_eq!(table.select(10).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_payouts_never_exceed_pool(
            pool in 0.0f64..10_000.0,
            participants in 0usize..2_000,
        ) {
            let table = PrizeTierTable::standard();
            let amounts = calculate_distribution(pool, participants, &table);
            let paid: f64 = amounts.iter().sum();
            prop_assert!(paid <= pool + 1e-6);
            prop_assert!(amounts.len() <= participants.max(1));
        }

        #[test]
        fn prop_paid_rank_count_matches_tier(
            participants in 10usize..2_000,
        ) {
            let table = PrizeTierTable::standard();
            let amounts = calculate_distribution(100.0, participants, &table);
            let expected = table.select(participants).len().min(participants);
            prop_assert_eq!(amounts.len(), expected);
        }
    }
}
