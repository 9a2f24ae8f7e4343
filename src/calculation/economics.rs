//! Economics input resolution
//!
//! Turns the user-entered economics of a selected intervention into typed
//! line inputs. Nothing here raises: a bad or missing value becomes a
//! [`LineIssue`] and the line is left out of the calculation.

use crate::error::LineIssue;
use crate::practice::{InterventionEconomics, RawAmount, SelectedIntervention};
use thiserror::Error;

/// Why a user-entered amount could not be read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountParseError {
    #[error("value is empty")]
    Empty,

    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("value is not finite")]
    NotFinite,

    #[error("value {0} is negative")]
    Negative(f64),
}

/// Parse an amount entered as a number or as text (decimal comma accepted)
pub fn parse_amount(raw: &RawAmount) -> Result<f64, AmountParseError> {
    let value = match raw {
        RawAmount::Number(n) => *n,
        RawAmount::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(AmountParseError::Empty);
            }
            trimmed
                .replace(',', ".")
                .parse::<f64>()
                .map_err(|_| AmountParseError::NotNumeric(trimmed.to_string()))?
        }
    };

    if !value.is_finite() {
        return Err(AmountParseError::NotFinite);
    }
    if value < 0.0 {
        return Err(AmountParseError::Negative(value));
    }
    Ok(value)
}

/// State of the eligible costs for a line
#[derive(Debug, Clone, PartialEq)]
pub enum EligibleCosts {
    Known(f64),
    Missing,
    Invalid(AmountParseError),
}

impl EligibleCosts {
    fn from_raw(raw: Option<&RawAmount>) -> Self {
        match raw {
            None => EligibleCosts::Missing,
            Some(RawAmount::Text(text)) if text.trim().is_empty() => EligibleCosts::Missing,
            Some(raw) => match parse_amount(raw) {
                Ok(value) => EligibleCosts::Known(value),
                Err(err) => EligibleCosts::Invalid(err),
            },
        }
    }

}

/// Normalized inputs for one computable line
#[derive(Debug, Clone, PartialEq)]
pub struct LineInputs {
    pub intervention_code: String,
    pub main_value: f64,
    pub unit: String,
    pub eligible_costs: EligibleCosts,
    pub is_eu_component: bool,
    pub pv_registration_level: u32,
    pub is_combined_insulation: bool,
    /// Warnings that leave the line computable
    pub issues: Vec<LineIssue>,
}

/// PV level as an integer percentage; blank means no bonus
fn parse_pv_level(raw: Option<&RawAmount>) -> Result<u32, AmountParseError> {
    match raw {
        None => Ok(0),
        Some(RawAmount::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(raw) => parse_amount(raw).map(|level| level.round() as u32),
    }
}

/// Validate the economics row of a selected intervention
pub fn resolve_economics(
    selected: &SelectedIntervention,
    economics: Option<&InterventionEconomics>,
) -> Result<LineInputs, LineIssue> {
    let code = &selected.intervention_code;
    let missing = || LineIssue::MissingEconomics { code: code.clone() };

    let economics = economics.ok_or_else(missing)?;

    let unit = economics
        .unit
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(missing)?;

    let main_value = economics.main_value.as_ref().ok_or_else(missing)?;
    let main_value = parse_amount(main_value).map_err(|err| LineIssue::InvalidMainValue {
        code: code.clone(),
        reason: err.to_string(),
    })?;

    let mut issues = Vec::new();
    let pv_registration_level = match parse_pv_level(economics.pv_registration_level.as_ref()) {
        Ok(level) => level,
        Err(err) => {
            issues.push(LineIssue::InvalidPvLevel {
                code: code.clone(),
                reason: err.to_string(),
            });
            0
        }
    };

    Ok(LineInputs {
        intervention_code: code.clone(),
        main_value,
        unit: unit.to_string(),
        eligible_costs: EligibleCosts::from_raw(economics.eligible_costs.as_ref()),
        is_eu_component: economics.is_eu_component,
        pv_registration_level,
        is_combined_insulation: selected.is_combined_insulation,
        issues,
    })
}
