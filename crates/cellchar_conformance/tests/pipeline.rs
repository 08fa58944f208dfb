//! Configuration-to-report runs: an on-disk `cellchar.toml`, the retrying
//! adapter, fatal simulator errors, and the JSON report.

use std::fs;

use cellchar_config::{load_config, CONFIG_FILE};
use cellchar_conformance::{and2_toml, characterize, config, dff_toml, Flaky, Flop, LinearDelay};
use cellchar_engine::{EngineError, PathStatus};
use cellchar_sim::{Outcome, RetryingAdapter, SimError, SimulatorAdapter, Stimulus};
use tempfile::TempDir;

struct Missing;

impl SimulatorAdapter for Missing {
    fn simulate(&self, _: &Stimulus) -> Result<Outcome, SimError> {
        Err(SimError::NoExecutable)
    }
}

#[test]
fn config_file_to_report() {
    let dir = TempDir::new().unwrap();
    let toml = format!(
        "{}\n{}",
        and2_toml(&[0.01, 0.05], &[0.001, 0.005], "worst-case"),
        dff_toml(&["worst-case", "binary-search-constraint"])
            .replace("[simulator]\nworkers = 4\nsettle_time = 1.0\nwindow = 2.0\n", "")
    );
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, toml).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.cells.len(), 2);
    assert_eq!(config.settings.simulator.work_dir, dir.path().join("work"));

    let flop = Flop::dffr(2e-10, 5e-11, 1.5e-10, 1e-10);
    let result = characterize(&config, &flop, 3).unwrap();
    assert!(!result.has_errors, "{:?}", result.diagnostics);
    let names: Vec<&str> = result.reports.iter().map(|r| r.cell.as_str()).collect();
    assert_eq!(names, vec!["AND2X1", "DFFRX1"]);
    for report in &result.reports {
        assert_eq!(report.count(PathStatus::Degraded), 0);
        assert_eq!(report.count(PathStatus::Failed), 0);
    }

    let json = serde_json::to_value(&result.reports).unwrap();
    assert_eq!(json[0]["cell"], "AND2X1");
    assert_eq!(json[0]["procedures"][0]["procedure"], "worst-case");
    assert_eq!(json[0]["procedures"][0]["paths"][0]["status"], "complete");
    assert_eq!(
        json[1]["procedures"][1]["procedure"],
        "binary-search-constraint"
    );
}

#[test]
fn perturbed_retries_recover_every_stimulus() {
    let config = config(&and2_toml(&[0.01, 0.05], &[0.001, 0.005], "worst-case"));

    let bare = characterize(&config, &Flaky::new(LinearDelay::typical()), 2).unwrap();
    assert_eq!(bare.reports[0].count(PathStatus::Failed), 4);

    let retrying = RetryingAdapter::new(Flaky::new(LinearDelay::typical()));
    let result = characterize(&config, &retrying, 2).unwrap();
    assert!(!result.has_errors);
    assert_eq!(result.reports[0].count(PathStatus::Complete), 4);
    assert_eq!(retrying.retries(), 16);
    assert_eq!(retrying.recovered(), 16);

    let reference = characterize(&config, &LinearDelay::typical(), 2).unwrap();
    assert_eq!(result.reports, reference.reports);
}

#[test]
fn missing_simulator_stops_the_run() {
    let config = config(&and2_toml(&[0.01], &[0.001], "worst-case"));
    let err = characterize(&config, &Missing, 2).err().unwrap();
    assert!(matches!(err, EngineError::Simulator(SimError::NoExecutable)));
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code.to_string(), "S202");
    assert!(!diagnostic.help.is_empty());
}
