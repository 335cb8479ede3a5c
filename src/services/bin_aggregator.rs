// Aggregates and tier counts over a bin snapshot. Pure functions, no I/O.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{BinRecord, Tier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct TierCounts {
    pub full: usize,
    pub half: usize,
    pub low: usize,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Full => self.full,
            Tier::Half => self.half,
            Tier::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.full + self.half + self.low
    }
}

pub struct BinAggregator<'a> {
    bins: &'a BTreeMap<String, BinRecord>,
}

impl<'a> BinAggregator<'a> {
    pub fn new(bins: &'a BTreeMap<String, BinRecord>) -> Self {
        Self { bins }
    }

    pub fn total_count(&self) -> usize {
        self.bins.len()
    }

    pub fn full_count(&self) -> usize {
        self.bins.values().filter(|b| b.tier() == Tier::Full).count()
    }

    /// Mean fill level, `None` when there are no bins
    pub fn average_level(&self) -> Option<f64> {
        if self.bins.is_empty() {
            return None;
        }
        let sum: u64 = self.bins.values().map(|b| u64::from(b.level)).sum();
        Some(sum as f64 / self.bins.len() as f64)
    }

    pub fn tier_counts(&self) -> TierCounts {
        self.bins
            .values()
            .fold(TierCounts::default(), |mut counts, bin| {
                match bin.tier() {
                    Tier::Full => counts.full += 1,
                    Tier::Half => counts.half += 1,
                    Tier::Low => counts.low += 1,
                }
                counts
            })
    }
}

/// "62.5%" or "No data"
pub fn format_average(average: Option<f64>) -> String {
    match average {
        Some(avg) => format!("{:.1}%", avg),
        None => "No data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bins(levels: &[(&str, u8)]) -> BTreeMap<String, BinRecord> {
        levels
            .iter()
            .map(|(key, level)| {
                (
                    key.to_string(),
                    BinRecord {
                        id: key.to_string(),
                        location: format!("Street {}", key),
                        lat: 6.9,
                        lng: 79.8,
                        level: *level,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_tiers_partition_every_snapshot() {
        // Sweep every level through a growing map
        let mut map = BTreeMap::new();
        for level in 0..=100u8 {
            let key = format!("bin-{}", level);
            map.insert(
                key.clone(),
                BinRecord {
                    id: key,
                    location: String::new(),
                    lat: 0.0,
                    lng: 0.0,
                    level,
                },
            );
            let agg = BinAggregator::new(&map);
            let counts = agg.tier_counts();
            assert_eq!(counts.total(), agg.total_count());
            assert_eq!(counts.full, agg.full_count());
        }
        let counts = BinAggregator::new(&map).tier_counts();
        assert_eq!(counts, TierCounts { full: 26, half: 35, low: 40 });
    }

    #[test]
    fn test_average_of_two() {
        let map = bins(&[("A", 80), ("B", 20)]);
        assert_eq!(BinAggregator::new(&map).average_level(), Some(50.0));
    }

    #[test]
    fn test_average_of_empty_is_no_data() {
        let map = BTreeMap::new();
        let agg = BinAggregator::new(&map);
        assert_eq!(agg.average_level(), None);
        assert_eq!(format_average(agg.average_level()), "No data");
        assert_eq!(agg.total_count(), 0);
        assert_eq!(agg.tier_counts(), TierCounts::default());
    }

    #[test]
    fn test_one_bin_per_tier() {
        let map = bins(&[("a", 90), ("b", 50), ("c", 10)]);
        let counts = BinAggregator::new(&map).tier_counts();
        assert_eq!(counts, TierCounts { full: 1, half: 1, low: 1 });
        assert_eq!(counts.get(Tier::Half), 1);
    }

    #[test]
    fn test_format_average() {
        assert_eq!(format_average(Some(62.4567)), "62.5%");
        assert_eq!(format_average(Some(50.0)), "50.0%");
    }
}
