//! Experiment Pipeline
//!
//! Cleans a viability dataset, trains every candidate estimator on the same
//! split and reports which ones clear the deployment gate. Nothing is written
//! to the model directory.
//!
//! Usage: experiment <dataset.csv> [n_estimators] [max_depth] [min_r2]

use anyhow::Context;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, warn};
use viability_service::training::dataset::RawTable;
use viability_service::training::estimator::{self, EstimatorConfig, EstimatorKind};
use viability_service::training::evaluation::RegressionMetrics;
use viability_service::training::split::train_test_split;

const TEST_SIZE: f64 = 0.2;
const RANDOM_STATE: u64 = 42;
const DEFAULT_MIN_R2: f64 = 0.85;

struct Candidate {
    kind: EstimatorKind,
    metrics: RegressionMetrics,
    elapsed_ms: u128,
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("experiment=info".parse()?)
                .add_directive("viability_service=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let Some(dataset_path) = args.get(1) else {
        eprintln!("usage: experiment <dataset.csv> [n_estimators] [max_depth] [min_r2]");
        return Ok(ExitCode::from(2));
    };
    let n_estimators: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let max_depth: Option<u16> = args.get(3).and_then(|s| s.parse().ok()).filter(|d| *d > 0);
    let min_r2: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MIN_R2);

    info!(
        dataset = %dataset_path,
        n_estimators = n_estimators,
        max_depth = ?max_depth,
        min_r2 = min_r2,
        "Starting experiment"
    );

    // Ingest and clean
    let dataset = RawTable::from_csv(dataset_path)
        .and_then(RawTable::into_cleaned_dataset)
        .with_context(|| format!("failed to prepare {}", dataset_path))?;

    // Divide
    let split = train_test_split(dataset.len(), TEST_SIZE, RANDOM_STATE)?;
    let (x_train, y_train) = dataset.select(&split.train);
    let (x_test, y_test) = dataset.select(&split.test);
    info!(train = x_train.len(), test = x_test.len(), "Data divided");

    // Train and evaluate every candidate
    let mut candidates = Vec::new();
    for kind in [EstimatorKind::LinearRegression, EstimatorKind::RandomForest] {
        let started = Instant::now();
        let config = EstimatorConfig {
            kind,
            n_estimators,
            max_depth,
            seed: RANDOM_STATE,
        };
        let model = estimator::fit(&config, &x_train, &y_train)
            .with_context(|| format!("{} training failed", kind))?;
        let predicted = model.predict(&x_test)?;
        let metrics = RegressionMetrics::compute(&y_test, &predicted)?;

        info!(
            estimator = %kind,
            r2_score = metrics.r2_score,
            rmse = metrics.rmse,
            "Model evaluated"
        );
        candidates.push(Candidate {
            kind,
            metrics,
            elapsed_ms: started.elapsed().as_millis(),
        });
    }

    // Compare
    candidates.sort_by(|a, b| b.metrics.r2_score.total_cmp(&a.metrics.r2_score));

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║                  EXPERIMENT - MODEL COMPARISON               ║");
    info!("╠══════════════════════════════════════════════════════════════╣");
    for c in &candidates {
        let verdict = if c.metrics.r2_score >= min_r2 { "PASS" } else { "FAIL" };
        info!(
            "║ {:18} R²={:>7.4} RMSE={:>8.4} {:>6}ms  {}",
            c.kind.as_str(),
            c.metrics.r2_score,
            c.metrics.rmse,
            c.elapsed_ms,
            verdict
        );
    }
    info!("╚══════════════════════════════════════════════════════════════╝");

    match candidates.iter().find(|c| c.metrics.r2_score >= min_r2) {
        Some(best) => {
            info!(
                estimator = %best.kind,
                r2_score = best.metrics.r2_score,
                "Deployment gate passed"
            );
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(min_r2 = min_r2, "No model cleared the deployment gate");
            Ok(ExitCode::FAILURE)
        }
    }
}
