//! Cap-rate policy: the share of eligible costs an incentive may cover
//!
//! The rate starts from the coefficient's explicit cap (or a subject-based
//! default) and then passes through the rules of [`CapRateRule::ORDER`].
//! Floors only raise the rate, the public-building rule forces it to 1.0,
//! and the two bonuses multiply and saturate at 1.0.

use crate::practice::{ClimateZone, SubjectType};
use serde::{Deserialize, Serialize};

/// Constants of the cap-rate policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapRatePolicy {
    /// Cap when the coefficient has no explicit rate
    pub default_rate: f64,
    /// Cap for public administrations in small municipalities
    pub small_municipality_pa_rate: f64,
    /// Minimum cap in climate zones E and F
    pub cold_climate_floor: f64,
    /// Minimum cap for combined insulation interventions
    pub combined_insulation_floor: f64,
    /// Multiplier for EU-origin components
    pub eu_component_multiplier: f64,
}

impl Default for CapRatePolicy {
    fn default() -> Self {
        Self {
            default_rate: 0.65,
            small_municipality_pa_rate: 1.0,
            cold_climate_floor: 0.5,
            combined_insulation_floor: 0.55,
            eu_component_multiplier: 1.1,
        }
    }
}

/// Everything the policy looks at for one line
#[derive(Debug, Clone, Copy, Default)]
pub struct CapRateContext<'a> {
    pub coefficient_cap_rate: Option<f64>,
    pub subject_type: Option<&'a SubjectType>,
    pub is_small_municipality: bool,
    pub climate_zone: Option<ClimateZone>,
    pub is_combined_insulation: bool,
    pub is_public_building: bool,
    pub is_eu_component: bool,
    pub pv_registration_level: u32,
}

/// Adjustment applied after the base rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapRateRule {
    ColdClimateFloor,
    CombinedInsulationFloor,
    PublicBuildingOverride,
    EuComponentBonus,
    PvRegistrationBonus,
}

impl CapRateRule {
    /// Application order; later rules see the output of earlier ones
    pub const ORDER: [CapRateRule; 5] = [
        CapRateRule::ColdClimateFloor,
        CapRateRule::CombinedInsulationFloor,
        CapRateRule::PublicBuildingOverride,
        CapRateRule::EuComponentBonus,
        CapRateRule::PvRegistrationBonus,
    ];
}

/// Derived rate plus the rules that fired
#[derive(Debug, Clone, PartialEq)]
pub struct CapRateDerivation {
    pub base_rate: f64,
    pub rate: f64,
    pub applied: Vec<CapRateRule>,
}

impl CapRatePolicy {
    /// Coefficient override, else 1.0 for PA in small municipalities, else the default
    pub fn base_rate(&self, ctx: &CapRateContext<'_>) -> f64 {
        if let Some(rate) = ctx.coefficient_cap_rate {
            return rate;
        }
        let is_pa = ctx.subject_type.map_or(false, SubjectType::is_public_administration);
        if is_pa && ctx.is_small_municipality {
            self.small_municipality_pa_rate
        } else {
            self.default_rate
        }
    }

    /// Apply one rule, or `None` when it does not concern this line
    fn apply_rule(&self, rule: CapRateRule, rate: f64, ctx: &CapRateContext<'_>) -> Option<f64> {
        match rule {
            CapRateRule::ColdClimateFloor => ctx
                .climate_zone
                .filter(ClimateZone::is_cold)
                .map(|_| rate.max(self.cold_climate_floor)),
            CapRateRule::CombinedInsulationFloor => ctx
                .is_combined_insulation
                .then(|| rate.max(self.combined_insulation_floor)),
            CapRateRule::PublicBuildingOverride => ctx.is_public_building.then_some(1.0),
            CapRateRule::EuComponentBonus => ctx
                .is_eu_component
                .then(|| (rate * self.eu_component_multiplier).min(1.0)),
            CapRateRule::PvRegistrationBonus => (ctx.pv_registration_level > 0)
                .then(|| (rate * (1.0 + f64::from(ctx.pv_registration_level) / 100.0)).min(1.0)),
        }
    }

    /// Full derivation with the list of rules that fired
    pub fn derive_traced(&self, ctx: &CapRateContext<'_>) -> CapRateDerivation {
        let base_rate = self.base_rate(ctx);
        let mut rate = base_rate;
        let mut applied = Vec::new();

        for rule in CapRateRule::ORDER {
            if let Some(next) = self.apply_rule(rule, rate, ctx) {
                log::debug!("cap rule {:?}: {:.4} -> {:.4}", rule, rate, next);
                rate = next;
                applied.push(rule);
            }
        }

        CapRateDerivation {
            base_rate,
            rate,
            applied,
        }
    }

    /// Effective cap rate in [0, 1]
    pub fn derive(&self, ctx: &CapRateContext<'_>) -> f64 {
        self.derive_traced(ctx).rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn subject(raw: &str) -> SubjectType {
        SubjectType::normalize(raw).unwrap()
    }

    #[test]
    fn test_base_rate_selection() {
        let policy = CapRatePolicy::default();
        let pa = subject("PA");
        let private = subject("PRIVATO");

        let mut ctx = CapRateContext {
            subject_type: Some(&pa),
            is_small_municipality: true,
            ..Default::default()
        };
        assert_eq!(policy.derive(&ctx), 1.0);

        ctx.subject_type = Some(&private);
        assert_eq!(policy.derive(&ctx), 0.65);

        // Explicit coefficient override beats the subject default
        ctx.subject_type = Some(&pa);
        ctx.coefficient_cap_rate = Some(0.4);
        assert_eq!(policy.derive(&ctx), 0.4);
    }

    #[test]
    fn test_cold_zone_floor() {
        let policy = CapRatePolicy::default();
        for zone in [ClimateZone::E, ClimateZone::F] {
            let ctx = CapRateContext {
                coefficient_cap_rate: Some(0.3),
                climate_zone: Some(zone),
                ..Default::default()
            };
            assert_eq!(policy.derive(&ctx), 0.5);
        }

        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.3),
            climate_zone: Some(ClimateZone::D),
            ..Default::default()
        };
        assert_eq!(policy.derive(&ctx), 0.3);
    }

    #[test]
    fn test_floors_never_lower_the_rate() {
        let policy = CapRatePolicy::default();
        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.8),
            climate_zone: Some(ClimateZone::E),
            is_combined_insulation: true,
            ..Default::default()
        };
        let derivation = policy.derive_traced(&ctx);
        assert_eq!(derivation.rate, 0.8);
        assert_eq!(
            derivation.applied,
            vec![CapRateRule::ColdClimateFloor, CapRateRule::CombinedInsulationFloor]
        );
    }

    #[test]
    fn test_combined_insulation_floor() {
        let policy = CapRatePolicy::default();
        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.3),
            climate_zone: Some(ClimateZone::F),
            is_combined_insulation: true,
            ..Default::default()
        };
        assert_eq!(policy.derive(&ctx), 0.55);
    }

    #[test]
    fn test_public_building_forces_full_rate() {
        let policy = CapRatePolicy::default();
        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.2),
            climate_zone: Some(ClimateZone::E),
            is_combined_insulation: true,
            is_public_building: true,
            is_eu_component: true,
            pv_registration_level: 20,
            ..Default::default()
        };
        assert_eq!(policy.derive(&ctx), 1.0);
    }

    #[test]
    fn test_bonuses_compose_multiplicatively() {
        let policy = CapRatePolicy::default();
        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.5),
            is_eu_component: true,
            pv_registration_level: 10,
            ..Default::default()
        };
        // 0.5 * 1.1 * 1.1
        assert_abs_diff_eq!(policy.derive(&ctx), 0.605, epsilon = 1e-12);

        let ctx = CapRateContext {
            coefficient_cap_rate: Some(0.95),
            is_eu_component: true,
            pv_registration_level: 30,
            ..Default::default()
        };
        assert_eq!(policy.derive(&ctx), 1.0);
    }

    #[test]
    fn test_no_rules_fire_without_flags() {
        let policy = CapRatePolicy::default();
        let derivation = policy.derive_traced(&CapRateContext::default());
        assert_eq!(derivation.base_rate, 0.65);
        assert_eq!(derivation.rate, 0.65);
        assert!(derivation.applied.is_empty());
    }
}
