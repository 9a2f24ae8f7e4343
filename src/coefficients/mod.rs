//! Tariff coefficient tables: storage, CSV loading and resolution

mod table;
mod resolver;
pub mod loader;

pub use table::{
    CoefficientKey, CoefficientRow, CoefficientTable, MeasureUnit, DEFAULT_DURATION_YEARS, MAX_DURATION_YEARS,
};
pub use resolver::CoefficientQuery;
pub use loader::{
    load_coefficients, load_coefficients_from_reader, load_default_coefficients, CoefficientImport,
    CoefficientLoadError, ImportReport, RowError,
};
