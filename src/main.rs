use convgrad::{ensure_all_within_tolerance, parse_arguments, run_scenario};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let start = Instant::now();

    let config = match parse_arguments() {
        Ok(config) => config,
        Err(e) => e.exit(),
    };

    let reports = match run_scenario(&config) {
        Ok(reports) => reports,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    for report in &reports {
        info!(
            layer = report.layer,
            parameter = report.parameter,
            checked = report.checked,
            max_abs_diff = report.max_abs_diff,
            passed = report.passed(),
            "parameter checked"
        );
    }

    match ensure_all_within_tolerance(reports) {
        Ok(_) => info!(elapsed = ?start.elapsed(), "all gradients match"),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
