//! Versioned tariff coefficient table

use crate::practice::{BuildingScope, ClimateZone, SubjectType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Duration applied when a coefficient row leaves it blank
pub const DEFAULT_DURATION_YEARS: u32 = 5;

/// Maximum number of yearly instalments a coefficient may prescribe
pub const MAX_DURATION_YEARS: u32 = 10;

/// Unit the coefficient is expressed per
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureUnit {
    #[serde(rename = "kW")]
    Kw,
    #[serde(rename = "m2")]
    M2,
    #[serde(rename = "kWh")]
    Kwh,
    #[serde(rename = "unit")]
    Unit,
}

impl MeasureUnit {
    /// Parse the exact unit labels used in coefficient tables
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "kW" => Some(MeasureUnit::Kw),
            "m2" => Some(MeasureUnit::M2),
            "kWh" => Some(MeasureUnit::Kwh),
            "unit" => Some(MeasureUnit::Unit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureUnit::Kw => "kW",
            MeasureUnit::M2 => "m2",
            MeasureUnit::Kwh => "kWh",
            MeasureUnit::Unit => "unit",
        }
    }
}

/// Unique key of a coefficient row; `climate_zone == None` is the table default
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoefficientKey {
    pub version_code: String,
    pub intervention_code: String,
    pub subject_type: SubjectType,
    pub building_scope: BuildingScope,
    pub climate_zone: Option<ClimateZone>,
}

/// One tariff coefficient (immutable reference data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub version_code: String,
    pub intervention_code: String,
    pub subject_type: SubjectType,
    pub building_scope: BuildingScope,
    pub climate_zone: Option<ClimateZone>,
    pub unit: MeasureUnit,
    /// Euro per unit of main value (> 0)
    pub coeff_eur_per_unit: f64,
    /// Number of yearly instalments (1-10)
    pub duration_years: u32,
    /// Explicit cap rate override (0-1)
    pub cap_rate: Option<f64>,
    pub notes: Option<String>,
}

impl CoefficientRow {
    pub fn key(&self) -> CoefficientKey {
        CoefficientKey {
            version_code: self.version_code.clone(),
            intervention_code: self.intervention_code.clone(),
            subject_type: self.subject_type.clone(),
            building_scope: self.building_scope,
            climate_zone: self.climate_zone,
        }
    }
}

/// Coefficient rows indexed by key, shared read-only across calculations
#[derive(Debug, Clone, Default)]
pub struct CoefficientTable {
    rows: BTreeMap<CoefficientKey, CoefficientRow>,
}

impl CoefficientTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table; later rows replace earlier rows with the same key
    pub fn from_rows<I: IntoIterator<Item = CoefficientRow>>(rows: I) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.insert(row);
        }
        table
    }

    /// Insert a row, returning the row it replaced
    pub fn insert(&mut self, row: CoefficientRow) -> Option<CoefficientRow> {
        self.rows.insert(row.key(), row)
    }

    pub fn get(&self, key: &CoefficientKey) -> Option<&CoefficientRow> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = &CoefficientRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct version codes present in the table, sorted
    pub fn versions(&self) -> Vec<&str> {
        let versions: BTreeSet<&str> = self.rows.keys().map(|k| k.version_code.as_str()).collect();
        versions.into_iter().collect()
    }

    pub fn contains_version(&self, version_code: &str) -> bool {
        self.rows.keys().any(|k| k.version_code == version_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(version: &str, zone: Option<ClimateZone>, coeff: f64) -> CoefficientRow {
        CoefficientRow {
            version_code: version.to_string(),
            intervention_code: "2.C".to_string(),
            subject_type: SubjectType::normalize("PA").unwrap(),
            building_scope: BuildingScope::Terziario,
            climate_zone: zone,
            unit: MeasureUnit::Kw,
            coeff_eur_per_unit: coeff,
            duration_years: DEFAULT_DURATION_YEARS,
            cap_rate: None,
            notes: None,
        }
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let mut table = CoefficientTable::new();
        assert!(table.insert(row("V1", None, 10.0)).is_none());
        let replaced = table.insert(row("V1", None, 12.0)).unwrap();
        assert_eq!(replaced.coeff_eur_per_unit, 10.0);
        assert_eq!(table.len(), 1);

        // Zone-specific row is a distinct key
        table.insert(row("V1", Some(ClimateZone::E), 15.0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_versions_sorted_and_distinct() {
        let table = CoefficientTable::from_rows(vec![
            row("V2", None, 1.0),
            row("V1", None, 1.0),
            row("V1", Some(ClimateZone::A), 1.0),
        ]);
        assert_eq!(table.versions(), vec!["V1", "V2"]);
        assert!(table.contains_version("V2"));
        assert!(!table.contains_version("V3"));
    }

    #[test]
    fn test_measure_unit_labels() {
        assert_eq!(MeasureUnit::parse("m2"), Some(MeasureUnit::M2));
        assert_eq!(MeasureUnit::parse("KW"), None);
        assert_eq!(MeasureUnit::Kwh.as_str(), "kWh");
    }
}
