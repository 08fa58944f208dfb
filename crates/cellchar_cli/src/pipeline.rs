//! Shared helpers for CLI commands: locating and loading the configuration,
//! constructing the simulator adapter, and rendering diagnostics.

use std::path::{Path, PathBuf};

use cellchar_config::{CharConfig, Settings, CONFIG_FILE};
use cellchar_diagnostics::{
    Diagnostic, DiagnosticRenderer, DiagnosticSink, JsonRenderer, TerminalRenderer,
};
use cellchar_sim::{NgspiceAdapter, SimError};

use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest `cellchar.toml`.
pub fn find_config(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the configuration file from global CLI args.
///
/// `--config` may name the file itself or the directory holding it.
/// Otherwise walks up from the current directory.
pub fn resolve_config_path(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &global.config {
        Some(path) if path.is_dir() => Ok(path.join(CONFIG_FILE)),
        Some(path) => Ok(path.clone()),
        None => find_config(&std::env::current_dir()?),
    }
}

/// Locates and loads the configuration.
pub fn load(global: &GlobalArgs) -> Result<CharConfig, Box<dyn std::error::Error>> {
    let path = resolve_config_path(global)?;
    if !global.quiet {
        eprintln!("   Loading {}", path.display());
    }
    Ok(cellchar_config::load_config(&path)?)
}

/// The batch-mode simulator described by `settings`.
pub fn ngspice(settings: &Settings) -> Result<NgspiceAdapter, SimError> {
    let simulator = &settings.simulator;
    let executable = simulator.executable.clone().ok_or(SimError::NoExecutable)?;
    Ok(NgspiceAdapter::new(executable, &simulator.work_dir)
        .keep_decks(simulator.keep_decks)
        .timeout(simulator.timeout))
}

/// Prints every diagnostic to standard error.
pub fn render_diagnostics(diagnostics: &[Diagnostic], format: ReportFormat, color: bool) {
    let renderer: Box<dyn DiagnosticRenderer> = match format {
        ReportFormat::Text => Box::new(TerminalRenderer::new(color)),
        ReportFormat::Json => Box::new(JsonRenderer),
    };
    for diag in diagnostics {
        eprint!("{}", renderer.render(diag));
    }
}

/// Prints the error and warning totals.
pub fn print_result(sink: &DiagnosticSink, global: &GlobalArgs) {
    if !global.quiet {
        eprintln!(
            "   Result: {} error(s), {} warning(s)",
            sink.error_count(),
            sink.warning_count()
        );
    }
}

/// The process exit code for a finished run.
pub fn exit_code(sink: &DiagnosticSink) -> i32 {
    if sink.has_errors() {
        1
    } else {
        0
    }
}
