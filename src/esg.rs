//! CO₂-equivalent of saved energy
//!
//! Pass-through used after a calculation to refresh the derived CO₂ figure
//! on the practice record.

use serde::Serialize;

/// Grid emission factor, kg CO₂ per kWh
pub const DEFAULT_EMISSION_FACTOR: f64 = 0.406;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Co2Equivalent {
    pub kg: f64,
    pub ton: f64,
}

/// `co2_ton = saved_kwh * emission_factor / 1000`
pub fn co2_from_saved_energy(saved_kwh: f64, emission_factor: f64) -> Co2Equivalent {
    let kwh = if saved_kwh.is_finite() { saved_kwh } else { 0.0 };
    let kg = kwh * emission_factor;
    Co2Equivalent { kg, ton: kg / 1000.0 }
}
