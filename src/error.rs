//! Error types shared across the calculation pipeline
//!
//! Line-level problems are [`LineIssue`]s: they never abort a run, they become
//! warning strings on the result. Run-level problems are [`CalcError`]s and
//! leave any previously persisted result untouched.

use thiserror::Error;

/// Failure raised by a persistence backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required table or collection has not been provisioned
    #[error("schema not available: {0}")]
    SchemaUnavailable(String),

    /// The write violated a backend constraint
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Any other backend failure (connection lost, poisoned lock, ...)
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Run-level failure of an incentive calculation
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("practice {0} not found")]
    PracticeNotFound(String),

    #[error("no interventions selected for practice {0}")]
    NoInterventionsSelected(String),

    /// Every selected intervention degraded; nothing was written
    #[error("coefficients or economic data missing for every selected intervention ({} warnings)", warnings.len())]
    AllLinesUnresolved { warnings: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CalcError {
    /// Stable machine-readable code for callers
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::PracticeNotFound(_) => "PracticeNotFound",
            CalcError::NoInterventionsSelected(_) => "NoInterventionsSelected",
            CalcError::AllLinesUnresolved { .. } => "AllLinesUnresolved",
            CalcError::Store(_) => "InternalError",
        }
    }

    /// Warnings accumulated before the failure, if any
    pub fn warnings(&self) -> &[String] {
        match self {
            CalcError::AllLinesUnresolved { warnings } => warnings,
            _ => &[],
        }
    }
}

/// Data-quality problem on a single intervention line
///
/// The `Display` output is the warning text recorded on the result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LineIssue {
    #[error("economic data missing for {code}")]
    MissingEconomics { code: String },

    #[error("main value not valid for {code}: {reason}")]
    InvalidMainValue { code: String, reason: String },

    #[error("coefficient missing for {code}")]
    MissingCoefficient { code: String },

    #[error("cap not applied: costs missing for {code}")]
    CapNotApplied { code: String },

    #[error("cap not applied: eligible costs not valid for {code}: {reason}")]
    InvalidEligibleCosts { code: String, reason: String },

    #[error("PV registration bonus not applied: level not valid for {code}: {reason}")]
    InvalidPvLevel { code: String, reason: String },
}

impl LineIssue {
    /// Whether the line is dropped from totals because of this issue
    pub fn excludes_line(&self) -> bool {
        matches!(
            self,
            LineIssue::MissingEconomics { .. }
                | LineIssue::InvalidMainValue { .. }
                | LineIssue::MissingCoefficient { .. }
        )
    }
}
