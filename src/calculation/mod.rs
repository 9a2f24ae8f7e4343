//! Incentive calculation: cap rates, line amounts, yearly schedules and the
//! engine that ties them to a store

mod cap_rate;
mod economics;
mod engine;
mod line;
mod result;
mod schedule;

pub use cap_rate::{CapRateContext, CapRateDerivation, CapRatePolicy, CapRateRule};
pub use economics::{parse_amount, resolve_economics, AmountParseError, EligibleCosts, LineInputs};
pub use engine::{CalcStage, IncentiveEngine};
pub use line::{calculate_line, LineOutcome};
pub use result::{IncentiveRecord, LineResult};
pub use schedule::{round_cents, AmortizationSchedule, Instalment};
