//! Batch-mode ngspice adapter.
//!
//! Each stimulus is rendered to a deck in a fresh temporary directory under
//! the work directory, simulated with `<executable> -b`, and reduced by
//! parsing `.measure` results from the simulator's output.

use crate::adapter::{Outcome, SimulatorAdapter};
use crate::deck;
use crate::error::SimError;
use crate::stimulus::Stimulus;
use cellchar_common::ContentHash;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs stimuli through an external SPICE simulator in batch mode.
#[derive(Debug, Clone)]
pub struct NgspiceAdapter {
    executable: PathBuf,
    work_dir: PathBuf,
    keep_decks: bool,
    timeout: Option<Duration>,
}

impl NgspiceAdapter {
    /// Creates an adapter for `executable`, writing decks under `work_dir`.
    pub fn new(executable: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            work_dir: work_dir.into(),
            keep_decks: false,
            timeout: None,
        }
    }

    /// Keeps every deck directory after simulation.
    pub fn keep_decks(mut self, keep: bool) -> Self {
        self.keep_decks = keep;
        self
    }

    /// Kills simulations that run longer than `limit`.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// The simulator executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn wait(&self, mut child: std::process::Child) -> Result<ExitStatus, SimError> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                // the process may exit between the check and the kill
                let _ = child.kill();
                let _ = child.wait();
                return Err(SimError::Timeout {
                    seconds: limit.as_secs_f64(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SimulatorAdapter for NgspiceAdapter {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        let text = deck::render(stimulus);
        let hash = ContentHash::of_text(&text);

        std::fs::create_dir_all(&self.work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", hash.short()))
            .tempdir_in(&self.work_dir)?;
        let deck_path = dir.path().join("deck.sp");
        let log_path = dir.path().join("deck.log");
        std::fs::write(&deck_path, &text)?;
        let log = File::create(&log_path)?;

        tracing::debug!(stimulus = %stimulus.title, deck = %deck_path.display(), "simulating");
        let child = Command::new(&self.executable)
            .arg("-b")
            .arg(&deck_path)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log)
            .spawn()
            .map_err(|source| SimError::Launch {
                executable: self.executable.clone(),
                source,
            })?;
        let status = self.wait(child);
        let output = std::fs::read(&log_path);
        if self.keep_decks {
            let kept = dir.keep();
            tracing::debug!(dir = %kept.display(), "kept deck");
        }
        let status = status?;
        // the log may hold non-UTF-8 bytes from netlist comments or models
        let output = String::from_utf8_lossy(&output?).into_owned();

        if let Some(line) = deck::non_convergence(&output) {
            return Err(SimError::NonConvergence {
                detail: line.to_string(),
            });
        }
        if !status.success() {
            return Err(SimError::Failed {
                status: status.to_string(),
                detail: output.lines().last().unwrap_or("").trim().to_string(),
            });
        }
        deck::outcome(stimulus, &output)
    }

    fn supports_perturbation(&self) -> bool {
        true
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::stimulus::{Circuit, Levels, Probe};
    use std::os::unix::fs::PermissionsExt;
    use std::sync::{Mutex, MutexGuard};

    // A script written while another test forks can fail to exec with
    // ETXTBSY, so tests that write and run scripts take turns.
    static SCRIPTS: Mutex<()> = Mutex::new(());

    fn serial() -> MutexGuard<'static, ()> {
        SCRIPTS.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-spice");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn state_check() -> Stimulus {
        Stimulus {
            title: "DFF".into(),
            circuit: Circuit {
                subcircuit: "DFF".into(),
                netlist: PathBuf::from("dff.sp"),
                models: vec![],
                pins: vec!["D".into(), "CLK".into(), "Q".into()],
            },
            supplies: vec![],
            sources: vec![],
            loads: vec![],
            initial: vec![],
            levels: Levels {
                delay_rise: 0.5,
                delay_fall: 0.5,
                slew_low: 0.2,
                slew_high: 0.8,
            },
            probe: Probe::StateCheck {
                node: "Q".into(),
                expected_high: false,
                at: 1e-9,
            },
            stop: 2e-9,
            step: None,
            temperature: 25.0,
            perturbed: false,
        }
    }

    #[test]
    fn runs_script_and_parses_output() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 'state = -1.0e-3'");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work"));
        assert_eq!(
            adapter.simulate(&state_check()).unwrap(),
            Outcome::Registered(true)
        );
        // the deck directory is removed afterwards
        let left = std::fs::read_dir(dir.path().join("work")).unwrap().count();
        assert_eq!(left, 0);
    }

    #[test]
    fn reads_output_with_invalid_utf8() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "printf '* \\377\\376 model\\n'\necho 'state = -1.0e-3'");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work"));
        assert_eq!(
            adapter.simulate(&state_check()).unwrap(),
            Outcome::Registered(true)
        );
    }

    #[test]
    fn keeps_decks_on_request() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 'state = 0'");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work")).keep_decks(true);
        adapter.simulate(&state_check()).unwrap();
        let kept: Vec<_> = std::fs::read_dir(dir.path().join("work"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(kept.len(), 1);
        let deck = std::fs::read_to_string(kept[0].join("deck.sp")).unwrap();
        assert!(deck.contains(".measure tran state FIND v(Q)"));
    }

    #[test]
    fn classifies_non_convergence() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 'doAnalyses: TRAN:  Timestep too small'\nexit 1");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work"));
        let err = adapter.simulate(&state_check()).unwrap_err();
        assert!(matches!(err, SimError::NonConvergence { .. }));
    }

    #[test]
    fn reports_unclassified_failure() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "echo 'fatal: bad netlist'\nexit 3");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work"));
        let err = adapter.simulate(&state_check()).unwrap_err();
        let SimError::Failed { detail, .. } = err else {
            panic!("expected Failed, got {err:?}");
        };
        assert_eq!(detail, "fatal: bad netlist");
    }

    #[test]
    fn times_out() {
        let _guard = serial();
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "sleep 5");
        let adapter = NgspiceAdapter::new(exe, dir.path().join("work"))
            .timeout(Some(Duration::from_millis(50)));
        let err = adapter.simulate(&state_check()).unwrap_err();
        assert!(matches!(err, SimError::Timeout { .. }));
    }

    #[test]
    fn missing_executable_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = NgspiceAdapter::new(dir.path().join("nope"), dir.path().join("work"));
        let err = adapter.simulate(&state_check()).unwrap_err();
        assert!(err.is_fatal());
    }
}
