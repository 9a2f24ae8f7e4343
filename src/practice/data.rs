//! Practice data structures matching the administrative store format

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of one incentive application
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PracticeId(pub String);

impl PracticeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PracticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PracticeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Italian climate zone of the building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClimateZone {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl ClimateZone {
    /// Parse a zone letter, ignoring surrounding whitespace and case
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(ClimateZone::A),
            "B" => Some(ClimateZone::B),
            "C" => Some(ClimateZone::C),
            "D" => Some(ClimateZone::D),
            "E" => Some(ClimateZone::E),
            "F" => Some(ClimateZone::F),
            _ => None,
        }
    }

    /// Zones E and F get the cold-climate cap floor
    pub fn is_cold(&self) -> bool {
        matches!(self, ClimateZone::E | ClimateZone::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClimateZone::A => "A",
            ClimateZone::B => "B",
            ClimateZone::C => "C",
            ClimateZone::D => "D",
            ClimateZone::E => "E",
            ClimateZone::F => "F",
        }
    }
}

/// Building use the coefficient table is segmented by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildingScope {
    /// Tertiary sector (offices, schools, public buildings)
    Terziario,
    /// Residential
    Residenziale,
}

impl BuildingScope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TERZIARIO" => Some(BuildingScope::Terziario),
            "RESIDENZIALE" => Some(BuildingScope::Residenziale),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingScope::Terziario => "TERZIARIO",
            BuildingScope::Residenziale => "RESIDENZIALE",
        }
    }
}

/// Normalized (trimmed, upper-case) subject type, e.g. `PA`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectType(String);

impl SubjectType {
    /// Public administration
    pub const PUBLIC_ADMINISTRATION: &'static str = "PA";

    /// Normalize a raw subject type; blank input yields `None`
    pub fn normalize(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn is_public_administration(&self) -> bool {
        self.0 == Self::PUBLIC_ADMINISTRATION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric field as entered by users: a JSON number or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// Yes/no field as entered: a boolean, a number or a text flag
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawFlag {
    fn is_set(&self) -> bool {
        match self {
            RawFlag::Bool(b) => *b,
            RawFlag::Number(n) => *n != 0.0 && !n.is_nan(),
            RawFlag::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "si" | "y" | "s"
            ),
        }
    }
}

/// `null`, absent or unrecognized values read as `false`
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(raw.map_or(false, |flag| flag.is_set()))
}

/// One incentive application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Practice {
    pub id: PracticeId,

    #[serde(default)]
    pub title: Option<String>,

    /// Reference to the applying subject
    #[serde(default)]
    pub subject_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_public_building: bool,

    /// Energy saved by the interventions (kWh/year)
    #[serde(default)]
    pub saved_energy_kwh: Option<f64>,

    /// Derived CO₂-equivalent (tonnes), written back after each calculation
    #[serde(default)]
    pub co2_ton: Option<f64>,
}

/// Applying subject (municipality, condominium, company, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,

    /// Raw type as stored; normalized with [`SubjectType::normalize`] on read
    #[serde(default)]
    pub subject_type: Option<String>,
}

/// Economic context of a practice (one per practice)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeEconomics {
    pub practice_id: PracticeId,

    /// Coefficient table version; the configured default applies when absent
    #[serde(default)]
    pub version_code: Option<String>,

    #[serde(default)]
    pub climate_zone: Option<ClimateZone>,

    #[serde(default)]
    pub building_scope: Option<BuildingScope>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_small_municipality: bool,
}

/// Intervention selected on a practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedIntervention {
    pub practice_id: PracticeId,
    pub intervention_code: String,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_combined_insulation: bool,

    /// Catalog category (e.g. `termico`, `efficienza`)
    #[serde(default)]
    pub category: String,
}

/// Economic inputs for one (practice, intervention) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEconomics {
    pub practice_id: PracticeId,
    pub intervention_code: String,

    /// Technical quantity (kW, m², ...); required for the line to be computable
    #[serde(default)]
    pub main_value: Option<RawAmount>,

    #[serde(default)]
    pub unit: Option<String>,

    /// Costs the cap rate applies to; absence disables the cap with a warning
    #[serde(default)]
    pub eligible_costs: Option<RawAmount>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_eu_component: bool,

    /// PV registration bonus as a percentage, as entered
    #[serde(default)]
    pub pv_registration_level: Option<RawAmount>,

    #[serde(default)]
    pub notes: Option<String>,
}
