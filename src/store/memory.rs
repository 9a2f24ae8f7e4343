//! In-memory store seeded from a practice dataset
//!
//! Reads take the lock briefly; writes are staged on the transaction and
//! applied together on commit. Two concurrent runs for the same practice
//! both commit and the later one wins.

use super::{IncentiveStore, PracticeContext, StoreTransaction};
use crate::calculation::IncentiveRecord;
use crate::error::StoreError;
use crate::practice::{
    InterventionEconomics, Practice, PracticeDataset, PracticeEconomics, PracticeId, SelectedIntervention, Subject,
    SubjectType,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct StoreState {
    practices: BTreeMap<PracticeId, Practice>,
    subjects: BTreeMap<String, Subject>,
    economics: BTreeMap<PracticeId, PracticeEconomics>,
    interventions: Vec<SelectedIntervention>,
    intervention_economics: Vec<InterventionEconomics>,
    incentives: BTreeMap<PracticeId, IncentiveRecord>,
}

/// Thread-safe in-memory backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn from_dataset(dataset: PracticeDataset) -> Self {
        let state = StoreState {
            practices: dataset.practices.into_iter().map(|p| (p.id.clone(), p)).collect(),
            subjects: dataset.subjects.into_iter().map(|s| (s.id.clone(), s)).collect(),
            economics: dataset.economics.into_iter().map(|e| (e.practice_id.clone(), e)).collect(),
            interventions: dataset.interventions,
            intervention_economics: dataset.intervention_economics,
            incentives: dataset
                .incentives
                .into_iter()
                .map(|r| (r.practice_id.clone(), r))
                .collect(),
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Export the current contents
    pub fn snapshot(&self) -> Result<PracticeDataset, StoreError> {
        let state = self.lock()?;
        Ok(PracticeDataset {
            practices: state.practices.values().cloned().collect(),
            subjects: state.subjects.values().cloned().collect(),
            economics: state.economics.values().cloned().collect(),
            interventions: state.interventions.clone(),
            intervention_economics: state.intervention_economics.clone(),
            incentives: state.incentives.values().cloned().collect(),
        })
    }

    pub fn practice(&self, practice_id: &PracticeId) -> Result<Option<Practice>, StoreError> {
        Ok(self.lock()?.practices.get(practice_id).cloned())
    }

    pub fn practice_ids(&self) -> Result<Vec<PracticeId>, StoreError> {
        Ok(self.lock()?.practices.keys().cloned().collect())
    }

    /// Remove an intervention from a practice selection, with its economics
    pub fn deselect_intervention(&self, practice_id: &PracticeId, intervention_code: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .interventions
            .retain(|i| !(&i.practice_id == practice_id && i.intervention_code == intervention_code));
        state
            .intervention_economics
            .retain(|e| !(&e.practice_id == practice_id && e.intervention_code == intervention_code));
        Ok(())
    }
}

enum PendingWrite {
    Incentive(IncentiveRecord),
    Co2 { practice_id: PracticeId, co2_ton: f64 },
}

/// Transaction over an [`InMemoryStore`]
pub struct InMemoryTransaction<'a> {
    store: &'a InMemoryStore,
    pending: Vec<PendingWrite>,
}

impl StoreTransaction for InMemoryTransaction<'_> {
    fn practice_context(&self, practice_id: &PracticeId) -> Result<Option<PracticeContext>, StoreError> {
        let state = self.store.lock()?;
        let practice = match state.practices.get(practice_id) {
            Some(p) => p.clone(),
            None => return Ok(None),
        };

        let subject_type = practice
            .subject_id
            .as_ref()
            .and_then(|id| state.subjects.get(id))
            .and_then(|s| s.subject_type.as_deref())
            .and_then(SubjectType::normalize);

        Ok(Some(PracticeContext {
            economics: state.economics.get(practice_id).cloned(),
            practice,
            subject_type,
        }))
    }

    fn selected_interventions(&self, practice_id: &PracticeId) -> Result<Vec<SelectedIntervention>, StoreError> {
        let state = self.store.lock()?;
        let mut selected: Vec<_> = state
            .interventions
            .iter()
            .filter(|i| &i.practice_id == practice_id)
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.intervention_code.cmp(&b.intervention_code))
        });
        Ok(selected)
    }

    fn intervention_economics(&self, practice_id: &PracticeId) -> Result<Vec<InterventionEconomics>, StoreError> {
        let state = self.store.lock()?;
        Ok(state
            .intervention_economics
            .iter()
            .filter(|e| &e.practice_id == practice_id)
            .cloned()
            .collect())
    }

    fn upsert_incentive(&mut self, record: &IncentiveRecord) -> Result<(), StoreError> {
        self.pending.push(PendingWrite::Incentive(record.clone()));
        Ok(())
    }

    fn update_practice_co2(&mut self, practice_id: &PracticeId, co2_ton: f64) -> Result<(), StoreError> {
        self.pending.push(PendingWrite::Co2 {
            practice_id: practice_id.clone(),
            co2_ton,
        });
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut state = self.store.lock()?;

        // Check every write first so a violation leaves the store untouched
        for write in &self.pending {
            let practice_id = match write {
                PendingWrite::Incentive(record) => &record.practice_id,
                PendingWrite::Co2 { practice_id, .. } => practice_id,
            };
            if !state.practices.contains_key(practice_id) {
                return Err(StoreError::Constraint(format!("unknown practice {}", practice_id)));
            }
        }

        for write in self.pending {
            match write {
                PendingWrite::Incentive(record) => {
                    state.incentives.insert(record.practice_id.clone(), record);
                }
                PendingWrite::Co2 { practice_id, co2_ton } => {
                    if let Some(practice) = state.practices.get_mut(&practice_id) {
                        practice.co2_ton = Some(co2_ton);
                    }
                }
            }
        }
        Ok(())
    }
}

impl IncentiveStore for InMemoryStore {
    type Transaction<'a> = InMemoryTransaction<'a>;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError> {
        Ok(InMemoryTransaction {
            store: self,
            pending: Vec::new(),
        })
    }

    fn incentive(&self, practice_id: &PracticeId) -> Result<Option<IncentiveRecord>, StoreError> {
        Ok(self.lock()?.incentives.get(practice_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn dataset() -> PracticeDataset {
        serde_json::from_str(
            r#"{
                "practices": [{"id": "p1", "subject_id": "s1", "saved_energy_kwh": 1000.0}],
                "subjects": [{"id": "s1", "subject_type": " pa "}],
                "economics": [{"practice_id": "p1", "climate_zone": "E", "building_scope": "TERZIARIO"}],
                "interventions": [
                    {"practice_id": "p1", "intervention_code": "2.C", "category": "termico"},
                    {"practice_id": "p1", "intervention_code": "1.A", "category": "termico"},
                    {"practice_id": "p1", "intervention_code": "1.B", "category": "efficienza"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn record(practice_id: &str) -> IncentiveRecord {
        IncentiveRecord {
            practice_id: PracticeId::new(practice_id),
            version_code: "CT3".to_string(),
            computed_at: Utc::now(),
            subject_type: Some("PA".to_string()),
            climate_zone: None,
            building_scope: None,
            cap_rate: 0.65,
            total_gross: 10.0,
            total_net: 10.0,
            duration_years: 1,
            rates: vec![10.0],
            details: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_context_joins_subject_and_economics() {
        let store = InMemoryStore::from_dataset(dataset());
        let tx = store.begin().unwrap();
        let ctx = tx.practice_context(&PracticeId::new("p1")).unwrap().unwrap();
        assert_eq!(ctx.subject_type.unwrap().as_str(), "PA");
        assert!(ctx.economics.is_some());
        assert!(tx.practice_context(&PracticeId::new("nope")).unwrap().is_none());
    }

    #[test]
    fn test_selection_ordered_by_category_then_code() {
        let store = InMemoryStore::from_dataset(dataset());
        let tx = store.begin().unwrap();
        let codes: Vec<_> = tx
            .selected_interventions(&PracticeId::new("p1"))
            .unwrap()
            .into_iter()
            .map(|i| i.intervention_code)
            .collect();
        assert_eq!(codes, vec!["1.B", "1.A", "2.C"]);
    }

    #[test]
    fn test_writes_visible_only_after_commit() {
        let store = InMemoryStore::from_dataset(dataset());
        let id = PracticeId::new("p1");

        let mut tx = store.begin().unwrap();
        tx.upsert_incentive(&record("p1")).unwrap();
        tx.update_practice_co2(&id, 0.406).unwrap();
        assert!(store.incentive(&id).unwrap().is_none());
        tx.commit().unwrap();

        assert_eq!(store.incentive(&id).unwrap().unwrap().rates, vec![10.0]);
        assert_eq!(store.practice(&id).unwrap().unwrap().co2_ton, Some(0.406));
    }

    #[test]
    fn test_dropped_transaction_discards_writes() {
        let store = InMemoryStore::from_dataset(dataset());
        {
            let mut tx = store.begin().unwrap();
            tx.upsert_incentive(&record("p1")).unwrap();
        }
        assert!(store.incentive(&PracticeId::new("p1")).unwrap().is_none());
    }

    #[test]
    fn test_constraint_violation_applies_nothing() {
        let store = InMemoryStore::from_dataset(dataset());
        let mut tx = store.begin().unwrap();
        tx.upsert_incentive(&record("p1")).unwrap();
        tx.upsert_incentive(&record("ghost")).unwrap();
        let err = tx.commit().unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.incentive(&PracticeId::new("p1")).unwrap().is_none());
    }

    #[test]
    fn test_deselect_removes_selection_and_economics() {
        let store = InMemoryStore::from_dataset(dataset());
        let id = PracticeId::new("p1");
        store.deselect_intervention(&id, "2.C").unwrap();
        let tx = store.begin().unwrap();
        assert_eq!(tx.selected_interventions(&id).unwrap().len(), 2);
    }
}
