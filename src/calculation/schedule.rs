//! Amortization of the net incentive into yearly instalments
//!
//! Year `y` pays `net_i / duration_i` for every line still running in that
//! year, rounded to the cent. Rounding each year independently can drift a
//! few cents from the total, so the whole difference is added to the last
//! instalment. The final year absorbs all rounding error, and can go negative
//! when tiny lines round up every year. The instalments always sum to the
//! total net amount.

use super::result::LineResult;
use serde::Serialize;

/// Round half-up to two decimals
pub fn round_cents(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0 + 0.5).floor() / 100.0
}

/// Net amount and duration of one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instalment {
    pub net: f64,
    pub duration_years: u32,
}

impl From<&LineResult> for Instalment {
    fn from(line: &LineResult) -> Self {
        Self {
            net: line.net,
            duration_years: line.duration_years,
        }
    }
}

/// Yearly payment schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmortizationSchedule {
    pub duration_years: u32,
    pub rates: Vec<f64>,
    /// Unrounded sum of the line nets
    pub total_net: f64,
    /// Amount moved onto the last instalment during reconciliation
    pub reconciliation: f64,
}

impl AmortizationSchedule {
    /// Build the schedule; `None` when there are no instalments
    pub fn build(instalments: &[Instalment]) -> Option<Self> {
        // Durations are validated to 1..=10 on load; guard against a zero anyway
        let duration_years = instalments.iter().map(|i| i.duration_years.max(1)).max()?;
        let total_net: f64 = instalments.iter().map(|i| i.net).sum();

        let mut rates: Vec<f64> = (1..=duration_years)
            .map(|year| {
                let amount: f64 = instalments
                    .iter()
                    .filter(|i| i.duration_years.max(1) >= year)
                    .map(|i| i.net / f64::from(i.duration_years.max(1)))
                    .sum();
                round_cents(amount)
            })
            .collect();

        let rounded_total: f64 = rates.iter().sum();
        let reconciliation = round_cents(total_net - rounded_total);
        if let Some(last) = rates.last_mut() {
            *last = round_cents(*last + reconciliation);
        }

        Some(Self {
            duration_years,
            rates,
            total_net,
            reconciliation,
        })
    }

    /// Build from computed lines
    pub fn from_lines(lines: &[LineResult]) -> Option<Self> {
        let instalments: Vec<Instalment> = lines.iter().map(Instalment::from).collect();
        Self::build(&instalments)
    }

    pub fn total(&self) -> f64 {
        self.rates.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn inst(net: f64, duration_years: u32) -> Instalment {
        Instalment { net, duration_years }
    }

    #[test]
    fn test_round_cents_half_up() {
        assert_eq!(round_cents(1.005), 1.01);
        assert_eq!(round_cents(33.333333), 33.33);
        assert_eq!(round_cents(-0.004), 0.0);
        assert_eq!(round_cents(26.0), 26.0);
    }

    #[test]
    fn test_single_line_exact_split() {
        let schedule = AmortizationSchedule::build(&[inst(130.0, 5)]).unwrap();
        assert_eq!(schedule.duration_years, 5);
        assert_eq!(schedule.rates, vec![26.0, 26.0, 26.0, 26.0, 26.0]);
        assert_eq!(schedule.reconciliation, 0.0);
    }

    #[test]
    fn test_staggered_durations() {
        // 90 over 3 years, 100 over 5 years
        let schedule = AmortizationSchedule::build(&[inst(90.0, 3), inst(100.0, 5)]).unwrap();
        assert_eq!(schedule.duration_years, 5);
        assert_eq!(schedule.rates, vec![50.0, 50.0, 50.0, 20.0, 20.0]);
        assert_abs_diff_eq!(schedule.total(), 190.0, epsilon = 1e-9);
    }

    #[test]
    fn test_drift_lands_on_last_year() {
        let schedule = AmortizationSchedule::build(&[inst(100.0, 3)]).unwrap();
        assert_eq!(schedule.rates, vec![33.33, 33.33, 33.34]);
        assert_abs_diff_eq!(schedule.reconciliation, 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(schedule.total(), 100.0, epsilon = 1e-9);

        // Downward drift: 3 x 66.67 = 200.01
        let schedule = AmortizationSchedule::build(&[inst(200.0, 3)]).unwrap();
        assert_eq!(schedule.rates, vec![66.67, 66.67, 66.66]);
        assert_abs_diff_eq!(schedule.total(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_drift_with_staggered_lines() {
        // Years 1-3 carry both lines; the 7-year line alone runs to the end
        let schedule = AmortizationSchedule::build(&[inst(100.0, 3), inst(100.0, 7)]).unwrap();
        assert_eq!(schedule.duration_years, 7);
        assert_eq!(&schedule.rates[..3], &[47.62, 47.62, 47.62]);
        assert_eq!(&schedule.rates[3..6], &[14.29, 14.29, 14.29]);
        assert_abs_diff_eq!(schedule.total(), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sum_matches_total_to_the_cent() {
        let cases: Vec<Vec<Instalment>> = vec![
            vec![inst(1234.567, 7), inst(89.01, 2)],
            vec![inst(0.07, 3)],
            vec![inst(999.99, 9), inst(10.0, 10), inst(333.333, 6)],
            vec![inst(0.0, 5)],
        ];
        for instalments in cases {
            let schedule = AmortizationSchedule::build(&instalments).unwrap();
            assert_eq!(schedule.rates.len(), schedule.duration_years as usize);
            assert_abs_diff_eq!(schedule.total(), round_cents(schedule.total_net), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_upward_drift_can_turn_last_year_negative() {
        // 0.005 rounds up to 0.01 in every year, so the last year gives back 0.05
        let schedule = AmortizationSchedule::build(&[inst(0.05, 10)]).unwrap();
        for rate in &schedule.rates[..9] {
            assert_abs_diff_eq!(*rate, 0.01, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(schedule.rates[9], -0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(schedule.reconciliation, -0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(schedule.total(), 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_input_has_no_schedule() {
        assert!(AmortizationSchedule::build(&[]).is_none());
    }
}
