//! Incentive Engine - calculation of energy-efficiency incentives for practices
//!
//! This library provides:
//! - Versioned tariff coefficient tables with zone-specific fallback
//! - The cap-rate policy bounding incentives against eligible costs
//! - Per-intervention gross/net amounts and cent-exact yearly schedules
//! - Transactional persistence of the aggregate result per practice

pub mod calculation;
pub mod coefficients;
pub mod config;
pub mod error;
pub mod esg;
pub mod practice;
pub mod store;

// Re-export commonly used types
pub use calculation::{AmortizationSchedule, CapRatePolicy, IncentiveEngine, IncentiveRecord, LineResult};
pub use coefficients::{CoefficientQuery, CoefficientRow, CoefficientTable};
pub use config::EngineConfig;
pub use error::{CalcError, LineIssue, StoreError};
pub use practice::{PracticeDataset, PracticeId};
pub use store::{IncentiveStore, InMemoryStore, StoreTransaction};
