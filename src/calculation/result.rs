//! Calculation output structures

use crate::practice::{BuildingScope, ClimateZone, PracticeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Computed amounts for one intervention line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    pub intervention_code: String,
    pub main_value: f64,
    pub unit: String,
    /// Euro per unit from the resolved coefficient
    pub coefficient: f64,
    /// main_value * coefficient
    pub gross: f64,
    /// gross capped at eligible_costs * cap_rate
    pub net: f64,
    pub duration_years: u32,
    pub cap_rate: f64,
}

/// Persisted calculation result, one per practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveRecord {
    pub practice_id: PracticeId,
    pub version_code: String,
    pub computed_at: DateTime<Utc>,
    pub subject_type: Option<String>,
    pub climate_zone: Option<ClimateZone>,
    pub building_scope: Option<BuildingScope>,
    /// Aggregate cap rate (see `AggregateCapRate`)
    pub cap_rate: f64,
    pub total_gross: f64,
    pub total_net: f64,
    pub duration_years: u32,
    /// Yearly amounts; they sum to `total_net` to the cent
    pub rates: Vec<f64>,
    pub details: Vec<LineResult>,
    pub warnings: Vec<String>,
}

impl IncentiveRecord {
    /// Sum of the yearly amounts
    pub fn rates_total(&self) -> f64 {
        self.rates.iter().sum()
    }
}
