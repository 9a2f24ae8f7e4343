//! Load practice datasets from JSON snapshots (data/practices.json)

use super::{
    InterventionEconomics, Practice, PracticeEconomics, PracticeId, SelectedIntervention, Subject,
};
use crate::calculation::IncentiveRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Default path to the practice dataset
pub const DEFAULT_DATASET_PATH: &str = "data/practices.json";

/// Snapshot of the administrative tables the engine reads and writes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeDataset {
    #[serde(default)]
    pub practices: Vec<Practice>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub economics: Vec<PracticeEconomics>,
    #[serde(default)]
    pub interventions: Vec<SelectedIntervention>,
    #[serde(default)]
    pub intervention_economics: Vec<InterventionEconomics>,
    /// Previously persisted results
    #[serde(default)]
    pub incentives: Vec<IncentiveRecord>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate practice id {0}")]
    DuplicatePractice(PracticeId),

    #[error("{table} row references unknown practice {practice_id}")]
    UnknownPractice {
        table: &'static str,
        practice_id: PracticeId,
    },
}

impl PracticeDataset {
    /// Check primary keys and practice references
    pub fn validate(&self) -> Result<(), DatasetError> {
        let mut ids = HashSet::new();
        for practice in &self.practices {
            if !ids.insert(&practice.id) {
                return Err(DatasetError::DuplicatePractice(practice.id.clone()));
            }
        }

        let check = |table: &'static str, practice_id: &PracticeId| {
            if ids.contains(practice_id) {
                Ok(())
            } else {
                Err(DatasetError::UnknownPractice {
                    table,
                    practice_id: practice_id.clone(),
                })
            }
        };

        for row in &self.economics {
            check("economics", &row.practice_id)?;
        }
        for row in &self.interventions {
            check("interventions", &row.practice_id)?;
        }
        for row in &self.intervention_economics {
            check("intervention_economics", &row.practice_id)?;
        }
        for row in &self.incentives {
            check("incentives", &row.practice_id)?;
        }

        Ok(())
    }
}

/// Load a dataset from a JSON file
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<PracticeDataset, DatasetError> {
    let file = File::open(path)?;
    load_dataset_from_reader(BufReader::new(file))
}

/// Load a dataset from any reader (e.g., request body, string buffer)
pub fn load_dataset_from_reader<R: std::io::Read>(reader: R) -> Result<PracticeDataset, DatasetError> {
    let dataset: PracticeDataset = serde_json::from_reader(reader)?;
    dataset.validate()?;
    Ok(dataset)
}

/// Load the dataset from the default data/practices.json location
pub fn load_default_dataset() -> Result<PracticeDataset, DatasetError> {
    load_dataset(DEFAULT_DATASET_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_dataset() {
        let dataset = load_default_dataset().expect("Failed to load dataset");
        assert!(!dataset.practices.is_empty());
        assert!(!dataset.interventions.is_empty());
        assert!(dataset
            .practices
            .iter()
            .any(|p| p.id == PracticeId::new("PRA-001")));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let json = r#"{
            "practices": [{"id": "p1"}],
            "interventions": [{"practice_id": "p2", "intervention_code": "2.C"}]
        }"#;
        let err = load_dataset_from_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::UnknownPractice { table: "interventions", .. }));
    }

    #[test]
    fn test_duplicate_practice_rejected() {
        let json = r#"{"practices": [{"id": "p1"}, {"id": "p1"}]}"#;
        let err = load_dataset_from_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicatePractice(_)));
    }
}
