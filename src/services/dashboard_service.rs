// View models for the user dashboard, the admin bin table and the map.
// Everything here is derived from one BinSnapshot; tiers always come from `level`.

use serde::{Deserialize, Serialize};

use crate::models::{BinRecord, BinSnapshot, QuarantinedBin, Tier};
use crate::services::bin_aggregator::{format_average, BinAggregator, TierCounts};

/// Colombo
pub const DEFAULT_CENTER: MapCenter = MapCenter { lat: 6.9271, lng: 79.8612 };
pub const DEFAULT_ZOOM: u8 = 13;

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct BinSummary {
    pub total_bins: usize,
    pub full_bins: usize,
    /// `null` when there are no bins
    pub average_fill_level: Option<f64>,
    pub average_display: String,
    pub tiers: TierCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DoughnutChart {
    pub labels: Vec<String>,
    pub data: Vec<usize>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct LocationLevel {
    pub location: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct UserDashboard {
    pub summary: BinSummary,
    pub fill_levels: DoughnutChart,
    pub levels_by_location: Vec<LocationLevel>,
    pub quarantined: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct BinRow {
    pub id: String,
    pub location: String,
    pub level: u8,
    pub status: String,
    pub tier: Tier,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct AdminDashboard {
    pub summary: BinSummary,
    pub bins: Vec<BinRow>,
    pub quarantined: Vec<QuarantinedBin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MapCenter {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct MapMarker {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub status: String,
    pub tier: Tier,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct MapView {
    pub api_key: String,
    pub center: MapCenter,
    pub zoom: u8,
    pub markers: Vec<MapMarker>,
}

pub fn summarize(snapshot: &BinSnapshot) -> BinSummary {
    let aggregator = BinAggregator::new(&snapshot.bins);
    let average = aggregator.average_level();
    let tiers = aggregator.tier_counts();
    debug_assert_eq!(tiers.total(), aggregator.total_count());
    BinSummary {
        total_bins: aggregator.total_count(),
        full_bins: aggregator.full_count(),
        average_fill_level: average,
        average_display: format_average(average),
        tiers,
    }
}

pub fn user_dashboard(snapshot: &BinSnapshot) -> UserDashboard {
    let summary = summarize(snapshot);
    let fill_levels = DoughnutChart {
        labels: Tier::ALL.iter().map(|t| t.chart_label().to_string()).collect(),
        data: Tier::ALL.iter().map(|t| summary.tiers.get(*t)).collect(),
        colors: Tier::ALL.iter().map(|t| t.chart_color().to_string()).collect(),
    };
    let levels_by_location = snapshot
        .bins
        .values()
        .map(|bin| LocationLevel {
            location: bin.location.clone(),
            level: bin.level,
        })
        .collect();

    UserDashboard {
        summary,
        fill_levels,
        levels_by_location,
        quarantined: snapshot.quarantined.len(),
    }
}

pub fn bin_row(bin: &BinRecord) -> BinRow {
    let tier = bin.tier();
    BinRow {
        id: bin.id.clone(),
        location: bin.location.clone(),
        level: bin.level,
        status: tier.status_label().to_string(),
        tier,
        color: tier.display_color().to_string(),
    }
}

pub fn admin_dashboard(snapshot: &BinSnapshot) -> AdminDashboard {
    let bins = snapshot.bins.values().map(bin_row).collect();

    AdminDashboard {
        summary: summarize(snapshot),
        bins,
        quarantined: snapshot.quarantined.clone(),
    }
}

pub fn map_view(snapshot: &BinSnapshot, api_key: &str, center: Option<MapCenter>) -> MapView {
    let markers = snapshot
        .bins
        .values()
        .map(|bin| {
            let tier = bin.tier();
            MapMarker {
                id: bin.id.clone(),
                lat: bin.lat,
                lng: bin.lng,
                status: tier.status_label().to_string(),
                tier,
                icon: tier.display_color().to_string(),
            }
        })
        .collect();

    MapView {
        api_key: api_key.to_string(),
        center: center.unwrap_or(DEFAULT_CENTER),
        zoom: DEFAULT_ZOOM,
        markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuarantinedBin;

    fn snapshot(levels: &[(&str, u8)]) -> BinSnapshot {
        BinSnapshot::from_records(levels.iter().map(|(id, level)| BinRecord {
            id: id.to_string(),
            location: format!("{} Junction", id),
            lat: 6.91,
            lng: 79.86,
            level: *level,
        }))
    }

    #[test]
    fn test_user_dashboard_cards_and_charts() {
        let view = user_dashboard(&snapshot(&[("a", 90), ("b", 50), ("c", 10)]));
        assert_eq!(view.summary.total_bins, 3);
        assert_eq!(view.summary.full_bins, 1);
        assert_eq!(view.summary.average_display, "50.0%");
        assert_eq!(view.fill_levels.data, vec![1, 1, 1]);
        assert_eq!(view.fill_levels.labels[0], "Full (75-100%)");
        assert_eq!(view.fill_levels.colors[2], "#66cc66");
        assert_eq!(view.levels_by_location.len(), 3);
        assert_eq!(view.levels_by_location[0].location, "a Junction");
    }

    #[test]
    fn test_empty_snapshot_shows_no_data() {
        let view = user_dashboard(&BinSnapshot::default());
        assert_eq!(view.summary.average_fill_level, None);
        assert_eq!(view.summary.average_display, "No data");
        assert_eq!(view.fill_levels.data, vec![0, 0, 0]);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["summary"]["average_fill_level"].is_null());
    }

    #[test]
    fn test_admin_rows_follow_level() {
        let view = admin_dashboard(&snapshot(&[("a", 75), ("b", 74), ("c", 39)]));
        let colors: Vec<&str> = view.bins.iter().map(|r| r.color.as_str()).collect();
        assert_eq!(colors, vec!["red", "yellow", "green"]);
        let statuses: Vec<&str> = view.bins.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["Full", "Half-Full", "Low"]);
    }

    #[test]
    fn test_quarantined_bins_are_reported_not_counted() {
        let mut snap = snapshot(&[("a", 80)]);
        snap.quarantined.push(QuarantinedBin {
            key: "bad".to_string(),
            reason: "missing level".to_string(),
        });

        let admin = admin_dashboard(&snap);
        assert_eq!(admin.summary.total_bins, 1);
        assert_eq!(admin.quarantined.len(), 1);
        assert_eq!(user_dashboard(&snap).quarantined, 1);
    }

    #[test]
    fn test_map_defaults_to_colombo() {
        let view = map_view(&snapshot(&[("a", 80), ("b", 20)]), "key-123", None);
        assert_eq!(view.center, DEFAULT_CENTER);
        assert_eq!(view.zoom, 13);
        assert_eq!(view.api_key, "key-123");
        assert_eq!(view.markers[0].icon, "red");
        assert_eq!(view.markers[1].icon, "green");

        let here = MapCenter { lat: 7.29, lng: 80.63 };
        assert_eq!(map_view(&BinSnapshot::default(), "", Some(here)).center, here);
    }
}
