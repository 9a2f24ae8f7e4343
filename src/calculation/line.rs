//! Per-intervention gross/net calculation

use super::economics::{EligibleCosts, LineInputs};
use super::result::LineResult;
use crate::coefficients::CoefficientRow;
use crate::error::LineIssue;

/// Line result plus the warning raised while capping, if any
#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
    pub result: LineResult,
    pub issue: Option<LineIssue>,
}

/// Combine inputs, coefficient and cap rate into gross and net amounts
///
/// Net is `min(gross, eligible_costs * cap_rate)`; without usable eligible
/// costs the cap is skipped and net equals gross.
pub fn calculate_line(inputs: &LineInputs, coefficient: &CoefficientRow, cap_rate: f64) -> LineOutcome {
    let gross = inputs.main_value * coefficient.coeff_eur_per_unit;
    let code = || inputs.intervention_code.clone();

    let (net, issue) = match &inputs.eligible_costs {
        EligibleCosts::Known(costs) => (gross.min(costs * cap_rate), None),
        EligibleCosts::Missing => (gross, Some(LineIssue::CapNotApplied { code: code() })),
        EligibleCosts::Invalid(err) => (
            gross,
            Some(LineIssue::InvalidEligibleCosts {
                code: code(),
                reason: err.to_string(),
            }),
        ),
    };

    LineOutcome {
        result: LineResult {
            intervention_code: inputs.intervention_code.clone(),
            main_value: inputs.main_value,
            unit: inputs.unit.clone(),
            coefficient: coefficient.coeff_eur_per_unit,
            gross,
            net,
            duration_years: coefficient.duration_years,
            cap_rate,
        },
        issue,
    }
}
