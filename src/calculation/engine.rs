//! Incentive aggregation for one practice
//!
//! A run moves through `Loading -> LineProcessing -> Scheduling -> Persisting -> Done`
//! and can fail from any stage. Reads and the final upsert share one store
//! transaction; nothing is written unless the whole run succeeds.

use super::cap_rate::CapRateContext;
use super::economics::resolve_economics;
use super::line::calculate_line;
use super::result::{IncentiveRecord, LineResult};
use super::schedule::AmortizationSchedule;
use crate::coefficients::{CoefficientQuery, CoefficientTable};
use crate::config::{AggregateCapRate, EngineConfig};
use crate::error::{CalcError, LineIssue};
use crate::esg::co2_from_saved_energy;
use crate::practice::{InterventionEconomics, PracticeId, SelectedIntervention};
use crate::store::{IncentiveStore, PracticeContext, StoreTransaction};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;

/// Stage of a calculation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcStage {
    Loading,
    LineProcessing,
    Scheduling,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for CalcStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CalcStage::Loading => "LOADING",
            CalcStage::LineProcessing => "LINE_PROCESSING",
            CalcStage::Scheduling => "SCHEDULING",
            CalcStage::Persisting => "PERSISTING",
            CalcStage::Done => "DONE",
            CalcStage::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Tracks the stage of one run for logging
struct CalcRun<'a> {
    practice_id: &'a PracticeId,
    stage: CalcStage,
}

impl<'a> CalcRun<'a> {
    fn new(practice_id: &'a PracticeId) -> Self {
        log::debug!("practice {}: {}", practice_id, CalcStage::Loading);
        Self {
            practice_id,
            stage: CalcStage::Loading,
        }
    }

    fn advance(&mut self, next: CalcStage) {
        log::debug!("practice {}: {} -> {}", self.practice_id, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: &CalcError) {
        log::warn!("practice {}: failed during {}: {}", self.practice_id, self.stage, err);
        self.stage = CalcStage::Failed;
    }
}

/// Calculation inputs shared by every line of a practice
struct RunContext {
    version_code: String,
    context: PracticeContext,
}

/// Lines and warnings collected during line processing
#[derive(Debug, Default)]
struct LineBatch {
    lines: Vec<LineResult>,
    warnings: Vec<String>,
}

impl LineBatch {
    fn warn(&mut self, issue: LineIssue) {
        log::warn!("{}", issue);
        self.warnings.push(issue.to_string());
    }
}

/// Computes and persists incentives against an immutable coefficient table
pub struct IncentiveEngine<'t> {
    table: &'t CoefficientTable,
    config: EngineConfig,
}

impl<'t> IncentiveEngine<'t> {
    pub fn new(table: &'t CoefficientTable, config: EngineConfig) -> Self {
        Self { table, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the full calculation for one practice and persist the result
    pub fn calculate<S: IncentiveStore>(
        &self,
        store: &S,
        practice_id: &PracticeId,
    ) -> Result<IncentiveRecord, CalcError> {
        let mut run = CalcRun::new(practice_id);
        match self.run(store, practice_id, &mut run) {
            Ok(record) => {
                run.advance(CalcStage::Done);
                log::info!(
                    "practice {}: total net {:.2} over {} years ({} warnings)",
                    practice_id,
                    record.total_net,
                    record.duration_years,
                    record.warnings.len()
                );
                Ok(record)
            }
            Err(err) => {
                run.fail(&err);
                Err(err)
            }
        }
    }

    /// Calculate several practices in parallel, results in input order
    pub fn calculate_many<S>(
        &self,
        store: &S,
        practice_ids: &[PracticeId],
    ) -> Vec<(PracticeId, Result<IncentiveRecord, CalcError>)>
    where
        S: IncentiveStore + Sync,
    {
        practice_ids
            .par_iter()
            .map(|id| (id.clone(), self.calculate(store, id)))
            .collect()
    }

    fn run<S: IncentiveStore>(
        &self,
        store: &S,
        practice_id: &PracticeId,
        run: &mut CalcRun<'_>,
    ) -> Result<IncentiveRecord, CalcError> {
        // Dropping `tx` on any early return rolls the run back
        let mut tx = store.begin()?;

        let context = tx
            .practice_context(practice_id)?
            .ok_or_else(|| CalcError::PracticeNotFound(practice_id.to_string()))?;
        let selected = tx.selected_interventions(practice_id)?;
        if selected.is_empty() {
            return Err(CalcError::NoInterventionsSelected(practice_id.to_string()));
        }
        let economics = tx.intervention_economics(practice_id)?;

        let version_code = context
            .economics
            .as_ref()
            .and_then(|e| e.version_code.clone())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.config.default_version_code.clone());
        if !self.table.contains_version(&version_code) {
            log::warn!("practice {}: coefficient version {} is not loaded", practice_id, version_code);
        }
        let ctx = RunContext { version_code, context };

        run.advance(CalcStage::LineProcessing);
        let batch = self.process_lines(&ctx, &selected, &economics);

        run.advance(CalcStage::Scheduling);
        let schedule = match AmortizationSchedule::from_lines(&batch.lines) {
            Some(schedule) => schedule,
            None => {
                return Err(CalcError::AllLinesUnresolved {
                    warnings: batch.warnings,
                })
            }
        };
        if schedule.reconciliation != 0.0 {
            log::debug!(
                "practice {}: reconciled {:+.2} into year {}",
                practice_id,
                schedule.reconciliation,
                schedule.duration_years
            );
        }

        run.advance(CalcStage::Persisting);
        let economics_ctx = ctx.context.economics.as_ref();
        let record = IncentiveRecord {
            practice_id: practice_id.clone(),
            version_code: ctx.version_code.clone(),
            computed_at: Utc::now(),
            subject_type: ctx.context.subject_type.as_ref().map(|s| s.as_str().to_string()),
            climate_zone: economics_ctx.and_then(|e| e.climate_zone),
            building_scope: economics_ctx.and_then(|e| e.building_scope),
            cap_rate: self.aggregate_cap_rate(&batch.lines),
            total_gross: batch.lines.iter().map(|l| l.gross).sum(),
            total_net: schedule.total_net,
            duration_years: schedule.duration_years,
            rates: schedule.rates,
            details: batch.lines,
            warnings: batch.warnings,
        };

        tx.upsert_incentive(&record)?;
        if let Some(saved_kwh) = ctx.context.practice.saved_energy_kwh {
            let co2 = co2_from_saved_energy(saved_kwh, self.config.emission_factor);
            tx.update_practice_co2(practice_id, co2.ton)?;
        }
        tx.commit()?;

        Ok(record)
    }

    /// Run every selected intervention through resolve -> coefficient -> cap -> line
    fn process_lines(
        &self,
        ctx: &RunContext,
        selected: &[SelectedIntervention],
        economics: &[InterventionEconomics],
    ) -> LineBatch {
        let by_code: HashMap<&str, &InterventionEconomics> = economics
            .iter()
            .map(|e| (e.intervention_code.as_str(), e))
            .collect();

        let mut batch = LineBatch::default();
        for intervention in selected {
            let econ = by_code.get(intervention.intervention_code.as_str()).copied();
            let (line, issues) = self.process_line(ctx, intervention, econ);
            let excluded = issues.iter().any(LineIssue::excludes_line);
            for issue in issues {
                batch.warn(issue);
            }
            if let Some(line) = line.filter(|_| !excluded) {
                batch.lines.push(line);
            }
        }
        batch
    }

    /// Computed line, if it got that far, plus every issue raised on the way
    fn process_line(
        &self,
        ctx: &RunContext,
        selected: &SelectedIntervention,
        economics: Option<&InterventionEconomics>,
    ) -> (Option<LineResult>, Vec<LineIssue>) {
        let mut inputs = match resolve_economics(selected, economics) {
            Ok(inputs) => inputs,
            Err(issue) => return (None, vec![issue]),
        };
        let mut issues = std::mem::take(&mut inputs.issues);

        let practice_econ = ctx.context.economics.as_ref();
        let climate_zone = practice_econ.and_then(|e| e.climate_zone);

        let query = CoefficientQuery {
            version_code: &ctx.version_code,
            intervention_code: &selected.intervention_code,
            subject_type: ctx.context.subject_type.as_ref(),
            building_scope: practice_econ.and_then(|e| e.building_scope),
            climate_zone,
        };
        let coefficient = match self.table.resolve(&query) {
            Some(coefficient) => coefficient,
            None => {
                issues.push(LineIssue::MissingCoefficient {
                    code: selected.intervention_code.clone(),
                });
                return (None, issues);
            }
        };

        let cap_rate = self.config.cap_policy.derive(&CapRateContext {
            coefficient_cap_rate: coefficient.cap_rate,
            subject_type: ctx.context.subject_type.as_ref(),
            is_small_municipality: practice_econ.map_or(false, |e| e.is_small_municipality),
            climate_zone,
            is_combined_insulation: inputs.is_combined_insulation,
            is_public_building: ctx.context.practice.is_public_building,
            is_eu_component: inputs.is_eu_component,
            pv_registration_level: inputs.pv_registration_level,
        });

        let outcome = calculate_line(&inputs, coefficient, cap_rate);
        issues.extend(outcome.issue);
        (Some(outcome.result), issues)
    }

    fn aggregate_cap_rate(&self, lines: &[LineResult]) -> f64 {
        let first = lines.first().map_or(0.0, |l| l.cap_rate);
        match self.config.aggregate_cap_rate {
            AggregateCapRate::FirstLine => first,
            AggregateCapRate::NetWeighted => {
                let total_net: f64 = lines.iter().map(|l| l.net).sum();
                if total_net > 0.0 {
                    lines.iter().map(|l| l.cap_rate * l.net).sum::<f64>() / total_net
                } else {
                    first
                }
            }
        }
    }
}
