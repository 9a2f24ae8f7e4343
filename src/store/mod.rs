//! Collaborator contract for the data the engine reads and writes
//!
//! A calculation runs inside one [`StoreTransaction`]. Dropping the
//! transaction without calling [`StoreTransaction::commit`] discards every
//! staged write, so a failed run never leaves partial state behind.

mod memory;

pub use memory::{InMemoryStore, InMemoryTransaction};

use crate::calculation::IncentiveRecord;
use crate::error::StoreError;
use crate::practice::{InterventionEconomics, Practice, PracticeEconomics, PracticeId, SelectedIntervention, SubjectType};

/// Practice joined with its subject type and economic context
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeContext {
    pub practice: Practice,
    pub subject_type: Option<SubjectType>,
    pub economics: Option<PracticeEconomics>,
}

/// Reads and staged writes of a single calculation run
pub trait StoreTransaction {
    /// Practice with subject type and economics, `None` if the id is unknown
    fn practice_context(&self, practice_id: &PracticeId) -> Result<Option<PracticeContext>, StoreError>;

    /// Selected interventions ordered by catalog category, then code
    fn selected_interventions(&self, practice_id: &PracticeId) -> Result<Vec<SelectedIntervention>, StoreError>;

    fn intervention_economics(&self, practice_id: &PracticeId) -> Result<Vec<InterventionEconomics>, StoreError>;

    /// Insert or fully replace the result row keyed by practice id
    fn upsert_incentive(&mut self, record: &IncentiveRecord) -> Result<(), StoreError>;

    fn update_practice_co2(&mut self, practice_id: &PracticeId, co2_ton: f64) -> Result<(), StoreError>;

    /// Apply all staged writes atomically
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Backend able to open calculation transactions
pub trait IncentiveStore {
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError>;

    /// Currently persisted result for a practice
    fn incentive(&self, practice_id: &PracticeId) -> Result<Option<IncentiveRecord>, StoreError>;
}
