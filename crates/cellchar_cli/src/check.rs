//! `cellchar check`: validates the configuration without simulating.
//!
//! Loads the configuration, derives every cell's timing arcs and sensitizing
//! conditions, and reports what each procedure would measure. A missing
//! simulator is reported as an error, since nothing could be characterized.

use cellchar_cell::{conditions, enumerate_paths};
use cellchar_config::CellJob;
use cellchar_diagnostics::DiagnosticSink;
use cellchar_engine::{applies, EngineError};
use cellchar_sim::SimError;

use crate::pipeline::{exit_code, load, print_result, render_diagnostics};
use crate::{CheckArgs, GlobalArgs, ReportFormat};

/// What one cell would be characterized on.
#[derive(Debug, PartialEq, Eq)]
struct CellSummary {
    /// Each arc and its number of sensitizing conditions.
    paths: Vec<(String, usize)>,
    /// Procedure name and the number of arcs it measures.
    procedures: Vec<(&'static str, usize)>,
}

fn summarize(job: &CellJob, sink: &DiagnosticSink) -> CellSummary {
    let cell = &job.cell;
    let mut kinds = Vec::new();
    let mut paths = Vec::new();
    for path in enumerate_paths(cell) {
        match conditions(cell, &path) {
            Ok(found) => {
                paths.push((path.describe(cell), found.count()));
                kinds.push(path.kind);
            }
            Err(source) => sink.emit(
                EngineError::Cell {
                    cell: cell.name().to_string(),
                    source,
                }
                .to_diagnostic(),
            ),
        }
    }
    let procedures = job
        .procedures
        .iter()
        .map(|&p| (p.name(), kinds.iter().filter(|&&k| applies(p, k)).count()))
        .collect();
    CellSummary { paths, procedures }
}

/// Runs the `cellchar check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load(global)?;
    if !global.quiet {
        if args.settings {
            println!("{}", config.settings);
        } else {
            println!("{}", config.settings.units);
        }
    }

    let sink = DiagnosticSink::new();
    if config.settings.simulator.executable.is_none() {
        sink.emit(EngineError::from(SimError::NoExecutable).to_diagnostic());
    }

    for job in config.select(&args.cells)? {
        let summary = summarize(job, &sink);
        if global.quiet {
            continue;
        }
        let procedures: Vec<String> = summary
            .procedures
            .iter()
            .map(|(name, arcs)| format!("{name} ({arcs} arcs)"))
            .collect();
        println!(
            "{}: {} paths; {}",
            job.cell.name(),
            summary.paths.len(),
            if procedures.is_empty() {
                "no procedures".to_string()
            } else {
                procedures.join(", ")
            }
        );
        for (path, conditions) in &summary.paths {
            println!("    {path:<28} {conditions} condition(s)");
        }
    }

    render_diagnostics(&sink.diagnostics(), ReportFormat::Text, global.color);
    print_result(&sink, global);
    Ok(exit_code(&sink))
}
