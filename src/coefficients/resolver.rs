//! Coefficient resolution with climate-zone fallback
//!
//! Candidates share version, intervention, subject type and building scope.
//! A row for the requested climate zone always wins over the zone-agnostic
//! table default; with no zone requested only the default can match.

use super::table::{CoefficientKey, CoefficientRow, CoefficientTable};
use crate::practice::{BuildingScope, ClimateZone, SubjectType};

/// Lookup criteria for one intervention line
#[derive(Debug, Clone, Copy)]
pub struct CoefficientQuery<'a> {
    pub version_code: &'a str,
    pub intervention_code: &'a str,
    pub subject_type: Option<&'a SubjectType>,
    pub building_scope: Option<BuildingScope>,
    pub climate_zone: Option<ClimateZone>,
}

impl CoefficientTable {
    /// Matching rows, most specific first
    pub fn candidates(&self, query: &CoefficientQuery<'_>) -> Vec<&CoefficientRow> {
        // Without subject type or scope nothing can match
        let (subject_type, building_scope) = match (query.subject_type, query.building_scope) {
            (Some(st), Some(scope)) => (st, scope),
            _ => return Vec::new(),
        };

        let key_for = |climate_zone: Option<ClimateZone>| CoefficientKey {
            version_code: query.version_code.to_string(),
            intervention_code: query.intervention_code.to_string(),
            subject_type: subject_type.clone(),
            building_scope,
            climate_zone,
        };

        let mut zones = Vec::with_capacity(2);
        if let Some(zone) = query.climate_zone {
            zones.push(Some(zone));
        }
        zones.push(None);

        zones
            .into_iter()
            .filter_map(|zone| self.get(&key_for(zone)))
            .collect()
    }

    /// The single best-matching row, or `None` when nothing matches
    pub fn resolve(&self, query: &CoefficientQuery<'_>) -> Option<&CoefficientRow> {
        self.candidates(query).into_iter().next()
    }
}
