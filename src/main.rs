//! Incentive Engine CLI
//!
//! Command-line interface for calculating practice incentives against the
//! shipped coefficient table and practice dataset

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use incentive_engine::coefficients::{load_coefficients, CoefficientImport};
use incentive_engine::config::{data_dir_from_env, COEFFICIENTS_FILE, DATASET_FILE};
use incentive_engine::practice::load_dataset;
use incentive_engine::{EngineConfig, IncentiveEngine, IncentiveRecord, InMemoryStore, PracticeId};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "incentive_engine",
    about = "Calculate energy-efficiency incentives for practices",
    version
)]
struct Cli {
    /// Directory with coefficients.csv and practices.json (defaults to INCENTIVE_DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calculate one practice and print the result
    Calc {
        /// Practice identifier
        #[arg(long)]
        practice: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recalculate every practice in the dataset
    Batch {
        /// Write one CSV line per practice to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a coefficient CSV and print the import report
    Validate {
        #[arg(long)]
        coefficients: PathBuf,
    },
}

fn load_table(path: &Path, config: &EngineConfig) -> Result<CoefficientImport> {
    let import = load_coefficients(path, config.default_duration_years)
        .with_context(|| format!("failed to load coefficients from {}", path.display()))?;
    if !import.report.errors.is_empty() {
        log::warn!("{} coefficient rows skipped", import.report.errors.len());
    }
    Ok(import)
}

fn load_store(data_dir: &Path) -> Result<InMemoryStore> {
    let path = data_dir.join(DATASET_FILE);
    let dataset = load_dataset(&path).with_context(|| format!("failed to load dataset from {}", path.display()))?;
    Ok(InMemoryStore::from_dataset(dataset))
}

fn print_record(record: &IncentiveRecord) {
    println!("Practice: {}", record.practice_id);
    println!("  Version:      {}", record.version_code);
    println!("  Subject type: {}", record.subject_type.as_deref().unwrap_or("-"));
    println!("  Cap rate:     {:.4}", record.cap_rate);
    println!("  Total gross:  {:.2}", record.total_gross);
    println!("  Total net:    {:.2}", record.total_net);
    println!("  Duration:     {} years", record.duration_years);
    println!();

    println!("{:<10} {:>12} {:>10} {:>14} {:>14} {:>6} {:>8}", "Code", "Main value", "Coeff", "Gross", "Net", "Years", "Cap");
    for line in &record.details {
        println!(
            "{:<10} {:>12.2} {:>10.2} {:>14.2} {:>14.2} {:>6} {:>8.4}",
            line.intervention_code, line.main_value, line.coefficient, line.gross, line.net, line.duration_years, line.cap_rate
        );
    }
    println!();

    for (year, rate) in record.rates.iter().enumerate() {
        println!("  Year {:>2}: {:>14.2}", year + 1, rate);
    }

    if !record.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &record.warnings {
            println!("  - {}", warning);
        }
    }
}

fn run_calc(data_dir: &Path, config: EngineConfig, practice: &str, json: bool) -> Result<()> {
    let import = load_table(&data_dir.join(COEFFICIENTS_FILE), &config)?;
    let store = load_store(data_dir)?;
    let engine = IncentiveEngine::new(&import.table, config);

    let practice_id = PracticeId::new(practice);
    match engine.calculate(&store, &practice_id) {
        Ok(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            Ok(())
        }
        Err(err) => {
            for warning in err.warnings() {
                eprintln!("  - {}", warning);
            }
            Err(err).with_context(|| format!("calculation failed for {}", practice_id))
        }
    }
}

fn run_batch(data_dir: &Path, config: EngineConfig, output: Option<&Path>) -> Result<()> {
    let start = std::time::Instant::now();
    let import = load_table(&data_dir.join(COEFFICIENTS_FILE), &config)?;
    let store = load_store(data_dir)?;
    let engine = IncentiveEngine::new(&import.table, config);

    let ids = store.practice_ids()?;
    println!("Calculating {} practices...", ids.len());
    let results = engine.calculate_many(&store, &ids);

    let mut writer = match output {
        Some(path) => Some(
            csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => None,
    };
    if let Some(w) = writer.as_mut() {
        w.write_record(["practice_id", "status", "total_gross", "total_net", "cap_rate", "duration_years", "rates", "warnings"])?;
    }

    let mut failed = 0usize;
    let mut grand_total = 0.0;
    for (id, result) in &results {
        match result {
            Ok(record) => {
                grand_total += record.total_net;
                println!(
                    "{:<12} net {:>14.2}  {} years  {} warnings",
                    id,
                    record.total_net,
                    record.duration_years,
                    record.warnings.len()
                );
                if let Some(w) = writer.as_mut() {
                    let rates: Vec<String> = record.rates.iter().map(|r| format!("{:.2}", r)).collect();
                    w.write_record(vec![
                        id.to_string(),
                        "OK".to_string(),
                        format!("{:.2}", record.total_gross),
                        format!("{:.2}", record.total_net),
                        format!("{:.4}", record.cap_rate),
                        record.duration_years.to_string(),
                        rates.join(";"),
                        record.warnings.join(" | "),
                    ])?;
                }
            }
            Err(err) => {
                failed += 1;
                println!("{:<12} {}: {}", id, err.code(), err);
                if let Some(w) = writer.as_mut() {
                    let empty = String::new();
                    w.write_record(vec![
                        id.to_string(),
                        err.code().to_string(),
                        empty.clone(),
                        empty.clone(),
                        empty.clone(),
                        empty.clone(),
                        empty,
                        err.warnings().join(" | "),
                    ])?;
                }
            }
        }
    }

    if let Some(w) = writer.as_mut() {
        w.flush()?;
    }

    println!();
    println!(
        "Done in {:?}: {} calculated, {} failed, total net {:.2}",
        start.elapsed(),
        results.len() - failed,
        failed,
        grand_total
    );
    if let Some(path) = output {
        println!("Results written to {}", path.display());
    }
    Ok(())
}

fn run_validate(path: &Path, config: &EngineConfig) -> Result<()> {
    let import = load_table(path, config)?;
    let report = &import.report;

    println!("Coefficients: {}", path.display());
    println!("  Inserted: {}", report.inserted);
    println!("  Updated:  {}", report.updated);
    println!("  Skipped:  {}", report.skipped);
    println!("  Versions: {}", import.table.versions().join(", "));
    for error in &report.errors {
        println!("  row {}: {}", error.row, error.message);
    }

    if !report.errors.is_empty() {
        bail!("{} invalid coefficient rows", report.errors.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let data_dir = cli.data_dir.unwrap_or_else(data_dir_from_env);

    match cli.command {
        Command::Calc { practice, json } => run_calc(&data_dir, config, &practice, json),
        Command::Batch { output } => run_batch(&data_dir, config, output.as_deref()),
        Command::Validate { coefficients } => run_validate(&coefficients, &config),
    }
}
