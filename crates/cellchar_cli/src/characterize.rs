//! `cellchar characterize`: runs the configured procedures.
//!
//! 1. Load the configuration and select cells
//! 2. Build the simulator adapter, wrapped in a retrying adapter when
//!    `simulator.retry_on_failure` is set
//! 3. Characterize each cell on the worker pool
//! 4. Write the report and render diagnostics
//!
//! A fatal error (no simulator, a cell that cannot be characterized as
//! configured) is rendered as a diagnostic and stops the run.

use std::fmt::Write as _;

use cellchar_common::EngineeringUnit;
use cellchar_config::{CellJob, Settings};
use cellchar_diagnostics::DiagnosticSink;
use cellchar_engine::error::retried;
use cellchar_engine::{CellReport, Characterizer, EngineError};
use cellchar_sim::{RetryingAdapter, SimulatorAdapter};

use crate::pipeline::{exit_code, load, ngspice, print_result, render_diagnostics};
use crate::{CharacterizeArgs, GlobalArgs, ReportFormat};

/// Runs the `cellchar characterize` command.
pub fn run(
    args: &CharacterizeArgs,
    global: &GlobalArgs,
) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load(global)?;
    let jobs = config.select(&args.cells)?;
    let settings = &config.settings;
    let sink = DiagnosticSink::new();

    let outcome = match ngspice(settings) {
        Ok(simulator) if settings.simulator.retry_on_failure => {
            let retrying = RetryingAdapter::new(simulator);
            let outcome = characterize(settings, &retrying, &jobs, args, global, &sink);
            tracing::info!(
                retries = retrying.retries(),
                recovered = retrying.recovered(),
                "perturbed retries"
            );
            if let Some(note) = retried(retrying.retries(), retrying.recovered()) {
                sink.emit(note);
            }
            outcome
        }
        Ok(simulator) => characterize(settings, &simulator, &jobs, args, global, &sink),
        Err(err) => Err(EngineError::from(err)),
    };

    match outcome {
        Ok(reports) => write_report(&reports, settings, args)?,
        Err(err) => sink.emit(err.to_diagnostic()),
    }

    render_diagnostics(&sink.diagnostics(), args.format, global.color);
    if args.format == ReportFormat::Text {
        print_result(&sink, global);
    }
    Ok(exit_code(&sink))
}

fn characterize(
    settings: &Settings,
    adapter: &dyn SimulatorAdapter,
    jobs: &[&CellJob],
    args: &CharacterizeArgs,
    global: &GlobalArgs,
    sink: &DiagnosticSink,
) -> Result<Vec<CellReport>, EngineError> {
    let workers = args.jobs.unwrap_or(settings.simulator.workers);
    let engine = Characterizer::with_workers(settings, adapter, workers)?;
    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        if !global.quiet {
            eprintln!("   Characterizing {} ({} workers)", job.cell.name(), engine.workers());
        }
        reports.push(engine.characterize(job, sink)?);
    }
    Ok(reports)
}

fn write_report(
    reports: &[CellReport],
    settings: &Settings,
    args: &CharacterizeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = match args.format {
        ReportFormat::Json => serde_json::to_string_pretty(reports)? + "\n",
        ReportFormat::Text => render_text(reports, settings.units.time),
    };
    match &args.output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

/// One line per path with its status and summary values.
fn render_text(reports: &[CellReport], time: EngineeringUnit) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "{}", report.cell);
        for procedure in &report.procedures {
            let _ = writeln!(out, "  {}", procedure.procedure);
            for path in &procedure.paths {
                let values: Vec<String> = path
                    .summary
                    .iter()
                    .map(|s| format!("{}={:.6} {time}", s.measure, s.value))
                    .collect();
                let _ = writeln!(
                    out,
                    "    {:<28} {:<9} {}",
                    path.path,
                    path.status.to_string(),
                    values.join(", ")
                );
                if path.summary.is_empty() {
                    let _ = writeln!(out, "      no values measured");
                }
            }
        }
    }
    out
}
