//! CSV-based coefficient table loader
//!
//! Loads tariff coefficients from data/coefficients.csv. Invalid rows are
//! skipped and reported; only an unreadable file or a wrong header aborts.

use super::table::{CoefficientRow, CoefficientTable, MeasureUnit, DEFAULT_DURATION_YEARS, MAX_DURATION_YEARS};
use crate::practice::{BuildingScope, ClimateZone, SubjectType};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Default path to the coefficient table
pub const DEFAULT_COEFFICIENTS_PATH: &str = "data/coefficients.csv";

/// Expected header, in order
pub const EXPECTED_HEADERS: [&str; 10] = [
    "version_code",
    "intervention_code",
    "subject_type",
    "building_scope",
    "climate_zone",
    "unit",
    "coeff_eur_per_unit",
    "duration_years",
    "cap_rate",
    "notes",
];

#[derive(Debug, Error)]
pub enum CoefficientLoadError {
    #[error("failed to open coefficient file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse coefficient CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid CSV header, expected: {expected}")]
    Header { expected: String },
}

/// Rejected row with its 1-based line number in the file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: u64,
    pub message: String,
}

/// Outcome counters of a coefficient load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

/// Loaded table together with its import report
#[derive(Debug, Clone)]
pub struct CoefficientImport {
    pub table: CoefficientTable,
    pub report: ImportReport,
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Validate one record; every violation is collected, not just the first
fn validate_record(record: &StringRecord, default_duration_years: u32) -> Result<CoefficientRow, Vec<String>> {
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();
    let mut errors = Vec::new();

    let version_code = field(0).to_string();
    if version_code.is_empty() {
        errors.push("version_code required".to_string());
    }

    let intervention_code = field(1).to_string();
    if intervention_code.is_empty() {
        errors.push("intervention_code required".to_string());
    }

    let subject_type = SubjectType::normalize(field(2));
    if subject_type.is_none() {
        errors.push("subject_type required".to_string());
    }

    let building_scope = BuildingScope::parse(field(3));
    if building_scope.is_none() {
        errors.push("building_scope not valid".to_string());
    }

    let climate_zone = match field(4) {
        "" => Ok(None),
        raw => ClimateZone::parse(raw).map(Some).ok_or(()),
    };
    if climate_zone.is_err() {
        errors.push("climate_zone not valid".to_string());
    }

    let unit = MeasureUnit::parse(field(5));
    if unit.is_none() {
        errors.push("unit not valid".to_string());
    }

    let coeff = parse_decimal(field(6)).filter(|c| *c > 0.0);
    if coeff.is_none() {
        errors.push("coeff_eur_per_unit must be numeric > 0".to_string());
    }

    let duration = match field(7) {
        "" => Some(default_duration_years),
        raw => raw
            .parse::<u32>()
            .ok()
            .filter(|d| (1..=MAX_DURATION_YEARS).contains(d)),
    };
    if duration.is_none() {
        errors.push(format!("duration_years must be an integer between 1 and {}", MAX_DURATION_YEARS));
    }

    let cap_rate = match field(8) {
        "" => Ok(None),
        raw => parse_decimal(raw)
            .filter(|r| (0.0..=1.0).contains(r))
            .map(Some)
            .ok_or(()),
    };
    if cap_rate.is_err() {
        errors.push("cap_rate must be between 0 and 1".to_string());
    }

    let notes = Some(field(9).to_string()).filter(|n| !n.is_empty());

    match (subject_type, building_scope, climate_zone, unit, coeff, duration, cap_rate) {
        (Some(subject_type), Some(building_scope), Ok(climate_zone), Some(unit), Some(coeff), Some(duration), Ok(cap_rate))
            if errors.is_empty() =>
        {
            Ok(CoefficientRow {
                version_code,
                intervention_code,
                subject_type,
                building_scope,
                climate_zone,
                unit,
                coeff_eur_per_unit: coeff,
                duration_years: duration,
                cap_rate,
                notes,
            })
        }
        _ => Err(errors),
    }
}

/// Load coefficients from any reader
pub fn load_coefficients_from_reader<R: std::io::Read>(
    reader: R,
    default_duration_years: u32,
) -> Result<CoefficientImport, CoefficientLoadError> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if headers.len() != EXPECTED_HEADERS.len()
        || !headers.iter().zip(EXPECTED_HEADERS.iter()).all(|(h, e)| h == *e)
    {
        return Err(CoefficientLoadError::Header {
            expected: EXPECTED_HEADERS.join(","),
        });
    }

    let mut table = CoefficientTable::new();
    let mut report = ImportReport::default();

    for (idx, result) in csv_reader.records().enumerate() {
        let record = result?;
        let row_number = record
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 2);

        match validate_record(&record, default_duration_years) {
            Ok(row) => {
                if table.insert(row).is_some() {
                    report.updated += 1;
                } else {
                    report.inserted += 1;
                }
            }
            Err(messages) => {
                log::warn!("coefficient row {} rejected: {}", row_number, messages.join("; "));
                report.skipped += 1;
                report.errors.push(RowError {
                    row: row_number,
                    message: messages.join("; "),
                });
            }
        }
    }

    log::info!(
        "loaded {} coefficient rows ({} inserted, {} updated, {} skipped)",
        table.len(),
        report.inserted,
        report.updated,
        report.skipped
    );

    Ok(CoefficientImport { table, report })
}

/// Load coefficients from a CSV file
pub fn load_coefficients<P: AsRef<Path>>(
    path: P,
    default_duration_years: u32,
) -> Result<CoefficientImport, CoefficientLoadError> {
    let file = File::open(path)?;
    load_coefficients_from_reader(file, default_duration_years)
}

/// Load coefficients from the default data/coefficients.csv location
pub fn load_default_coefficients() -> Result<CoefficientImport, CoefficientLoadError> {
    load_coefficients(DEFAULT_COEFFICIENTS_PATH, DEFAULT_DURATION_YEARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "version_code,intervention_code,subject_type,building_scope,climate_zone,unit,coeff_eur_per_unit,duration_years,cap_rate,notes\n";

    #[test]
    fn test_load_default_coefficients() {
        let import = load_default_coefficients().expect("Failed to load coefficients");
        assert!(!import.table.is_empty());
        assert!(import.report.errors.is_empty(), "{:?}", import.report.errors);
        assert!(import.table.contains_version("CT3_DM_2025_08_07"));
    }

    #[test]
    fn test_valid_rows_normalized() {
        let csv = format!(
            "{}CT3,2.C, pa ,terziario,e,kW,\"120,5\",,,heat pump\nCT3,1.B,PA,TERZIARIO,,m2,40,8,0.4,\n",
            HEADER
        );
        let import = load_coefficients_from_reader(csv.as_bytes(), DEFAULT_DURATION_YEARS).unwrap();
        assert_eq!(import.report.inserted, 2);
        assert_eq!(import.report.skipped, 0);

        let rows: Vec<_> = import.table.rows().collect();
        let heat_pump = rows.iter().find(|r| r.intervention_code == "2.C").unwrap();
        assert_eq!(heat_pump.subject_type.as_str(), "PA");
        assert_eq!(heat_pump.building_scope, BuildingScope::Terziario);
        assert_eq!(heat_pump.climate_zone, Some(ClimateZone::E));
        assert_eq!(heat_pump.coeff_eur_per_unit, 120.5);
        assert_eq!(heat_pump.duration_years, 5);
        assert_eq!(heat_pump.cap_rate, None);
        assert_eq!(heat_pump.notes.as_deref(), Some("heat pump"));

        let insulation = rows.iter().find(|r| r.intervention_code == "1.B").unwrap();
        assert_eq!(insulation.climate_zone, None);
        assert_eq!(insulation.duration_years, 8);
        assert_eq!(insulation.cap_rate, Some(0.4));
    }

    #[test]
    fn test_invalid_rows_reported_with_line_numbers() {
        let csv = format!(
            "{}CT3,2.C,PA,TERZIARIO,,kW,100,5,,\nCT3,2.C,PA,OFFICE,G,MW,-3,12,1.5,\nCT3,2.C,PA,TERZIARIO,,kW,0,,,\n",
            HEADER
        );
        let import = load_coefficients_from_reader(csv.as_bytes(), DEFAULT_DURATION_YEARS).unwrap();
        assert_eq!(import.report.inserted, 1);
        assert_eq!(import.report.skipped, 2);
        assert_eq!(import.report.errors[0].row, 3);
        assert_eq!(import.report.errors[1].row, 4);

        let message = &import.report.errors[0].message;
        for expected in ["building_scope", "climate_zone", "unit", "coeff_eur_per_unit", "duration_years", "cap_rate"] {
            assert!(message.contains(expected), "missing {} in {}", expected, message);
        }
    }

    #[test]
    fn test_duplicate_key_counts_as_update() {
        let csv = format!(
            "{}CT3,2.C,PA,TERZIARIO,,kW,100,5,,\nCT3,2.C,pa,TERZIARIO,,kW,110,5,,\n",
            HEADER
        );
        let import = load_coefficients_from_reader(csv.as_bytes(), DEFAULT_DURATION_YEARS).unwrap();
        assert_eq!(import.report.inserted, 1);
        assert_eq!(import.report.updated, 1);
        assert_eq!(import.table.len(), 1);
        assert_eq!(import.table.rows().next().unwrap().coeff_eur_per_unit, 110.0);
    }

    #[test]
    fn test_wrong_header_is_fatal() {
        let csv = "intervention_code,subject_type\n2.C,PA\n";
        let err = load_coefficients_from_reader(csv.as_bytes(), DEFAULT_DURATION_YEARS).unwrap_err();
        assert!(matches!(err, CoefficientLoadError::Header { .. }));
    }
}
