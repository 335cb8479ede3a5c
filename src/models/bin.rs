use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::{error::AppError, validation};

/// Lower bound (inclusive) of the "full" tier
pub const FULL_THRESHOLD: u8 = 75;
/// Lower bound (inclusive) of the "half" tier
pub const HALF_THRESHOLD: u8 = 40;

/// Fill-level classification band. Always derived from `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Full,
    Half,
    Low,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Full, Tier::Half, Tier::Low];

    pub fn from_level(level: u8) -> Self {
        if level >= FULL_THRESHOLD {
            Tier::Full
        } else if level >= HALF_THRESHOLD {
            Tier::Half
        } else {
            Tier::Low
        }
    }

    /// Value persisted in the `status` field of a bin document
    pub fn status_label(self) -> &'static str {
        match self {
            Tier::Full => "Full",
            Tier::Half => "Half-Full",
            Tier::Low => "Low",
        }
    }

    pub fn chart_label(self) -> &'static str {
        match self {
            Tier::Full => "Full (75-100%)",
            Tier::Half => "Half-Full (40-74%)",
            Tier::Low => "Low (0-39%)",
        }
    }

    pub fn chart_color(self) -> &'static str {
        match self {
            Tier::Full => "#ff4d4d",
            Tier::Half => "#ffcc00",
            Tier::Low => "#66cc66",
        }
    }

    /// Badge colour for table rows and map markers
    pub fn display_color(self) -> &'static str {
        match self {
            Tier::Full => "red",
            Tier::Half => "yellow",
            Tier::Low => "green",
        }
    }
}

/// A validated bin. `id` is the store key.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct BinRecord {
    pub id: String,
    pub location: String,
    pub lat: f64,
    pub lng: f64,
    pub level: u8,
}

impl BinRecord {
    pub fn tier(&self) -> Tier {
        Tier::from_level(self.level)
    }

    pub fn status(&self) -> &'static str {
        self.tier().status_label()
    }
}

/// Bin document as it sits in the store, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBin {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawBin {
    pub fn validate(self, key: &str) -> Result<BinRecord, String> {
        let level = self.level.ok_or_else(|| "missing level".to_string())?;
        if !level.is_finite() {
            return Err(format!("level is not a number: {}", level));
        }
        let rounded = level.round();
        if !(0.0..=100.0).contains(&rounded) {
            return Err(format!("level out of range: {}", level));
        }
        let level = rounded as u8;

        let lat = self.lat.ok_or_else(|| "missing lat".to_string())?;
        let lng = self.lng.ok_or_else(|| "missing lng".to_string())?;
        validation::validate_coordinates(lat, lng).map_err(|e| e.to_string())?;

        let location = self
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| key.to_string());

        let tier = Tier::from_level(level);
        if let Some(stored) = self.status.as_deref() {
            if stored != tier.status_label() {
                log::debug!(
                    "Bin {} has stale status '{}' (level {} => '{}')",
                    key,
                    stored,
                    level,
                    tier.status_label()
                );
            }
        }

        Ok(BinRecord {
            id: key.to_string(),
            location,
            lat,
            lng,
            level,
        })
    }
}

/// A bin that failed validation and was kept out of aggregates
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct QuarantinedBin {
    pub key: String,
    pub reason: String,
}

/// Full state of the bin collection at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinSnapshot {
    pub bins: BTreeMap<String, BinRecord>,
    pub quarantined: Vec<QuarantinedBin>,
}

impl BinSnapshot {
    pub fn from_raw<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, RawBin)>,
    {
        let mut snapshot = BinSnapshot::default();
        for (key, raw) in entries {
            match raw.validate(&key) {
                Ok(bin) => {
                    snapshot.bins.insert(key, bin);
                }
                Err(reason) => {
                    log::warn!("⚠️ Quarantined bin {}: {}", key, reason);
                    snapshot.quarantined.push(QuarantinedBin { key, reason });
                }
            }
        }
        snapshot
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = BinRecord>,
    {
        BinSnapshot {
            bins: records.into_iter().map(|b| (b.id.clone(), b)).collect(),
            quarantined: Vec::new(),
        }
    }
}

/// PATCH body for a bin. Status is never accepted; it follows `level`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct BinPatch {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub level: Option<i64>,
}

/// A `BinPatch` that passed validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinUpdate {
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub level: Option<u8>,
}

impl BinPatch {
    pub fn validate(self) -> Result<BinUpdate, AppError> {
        if self.location.is_none() && self.lat.is_none() && self.lng.is_none() && self.level.is_none() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }

        let location = match self.location {
            Some(l) if l.trim().is_empty() => {
                return Err(AppError::Validation("Location cannot be empty".to_string()));
            }
            Some(l) => Some(l.trim().to_string()),
            None => None,
        };

        validation::validate_coordinates(self.lat.unwrap_or(0.0), self.lng.unwrap_or(0.0))?;

        let level = self.level.map(validation::validate_level).transpose()?;

        Ok(BinUpdate {
            location,
            lat: self.lat,
            lng: self.lng,
            level,
        })
    }
}

impl BinUpdate {
    pub fn apply(&self, bin: &mut BinRecord) {
        if let Some(location) = &self.location {
            bin.location = location.clone();
        }
        if let Some(lat) = self.lat {
            bin.lat = lat;
        }
        if let Some(lng) = self.lng {
            bin.lng = lng;
        }
        if let Some(level) = self.level {
            bin.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(level: Option<f64>) -> RawBin {
        RawBin {
            location: Some("Galle Road".to_string()),
            lat: Some(6.9),
            lng: Some(79.85),
            level,
            status: None,
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::from_level(0), Tier::Low);
        assert_eq!(Tier::from_level(39), Tier::Low);
        assert_eq!(Tier::from_level(40), Tier::Half);
        assert_eq!(Tier::from_level(74), Tier::Half);
        assert_eq!(Tier::from_level(75), Tier::Full);
        assert_eq!(Tier::from_level(100), Tier::Full);
    }

    #[test]
    fn test_missing_level_is_rejected() {
        let err = raw(None).validate("b1").unwrap_err();
        assert!(err.contains("missing level"));
    }

    #[test]
    fn test_out_of_range_level_is_rejected() {
        assert!(raw(Some(120.0)).validate("b1").is_err());
        assert!(raw(Some(-3.0)).validate("b1").is_err());
        assert!(raw(Some(f64::NAN)).validate("b1").is_err());
    }

    #[test]
    fn test_level_is_rounded() {
        let bin = raw(Some(74.6)).validate("b1").unwrap();
        assert_eq!(bin.level, 75);
        assert_eq!(bin.tier(), Tier::Full);
    }

    #[test]
    fn test_stale_status_is_ignored() {
        let mut stale = raw(Some(10.0));
        stale.status = Some("Full".to_string());
        let bin = stale.validate("b1").unwrap();
        assert_eq!(bin.status(), "Low");
    }

    #[test]
    fn test_missing_location_falls_back_to_key() {
        let mut unnamed = raw(Some(50.0));
        unnamed.location = None;
        let bin = unnamed.validate("bin-42").unwrap();
        assert_eq!(bin.location, "bin-42");
    }

    #[test]
    fn test_snapshot_quarantines_bad_entries() {
        let snapshot = BinSnapshot::from_raw(vec![
            ("a".to_string(), raw(Some(90.0))),
            ("b".to_string(), raw(None)),
        ]);
        assert_eq!(snapshot.bins.len(), 1);
        assert_eq!(snapshot.quarantined.len(), 1);
        assert_eq!(snapshot.quarantined[0].key, "b");
    }

    #[test]
    fn test_patch_validation() {
        assert!(BinPatch::default().validate().is_err());

        let bad_level = BinPatch { level: Some(101), ..Default::default() };
        assert!(bad_level.validate().is_err());

        let blank = BinPatch { location: Some("  ".to_string()), ..Default::default() };
        assert!(blank.validate().is_err());

        let ok = BinPatch { level: Some(80), ..Default::default() }.validate().unwrap();
        assert_eq!(ok.level, Some(80));
    }
}
