//! Practice data structures and dataset loading

mod data;
pub mod loader;

pub use data::{
    BuildingScope, ClimateZone, InterventionEconomics, Practice, PracticeEconomics, PracticeId,
    RawAmount, SelectedIntervention, Subject, SubjectType,
};
pub use loader::{load_dataset, load_dataset_from_reader, load_default_dataset, DatasetError, PracticeDataset};
