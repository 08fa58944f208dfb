//! Scheduling a cell's procedures over a worker pool.
//!
//! Each procedure is expanded into independent units of work, one per
//! (path, variation point, condition) and, for searches, per constraint
//! kind. Units run in parallel on a private rayon pool and their results are
//! collected in unit order, so every reduction sees the same inputs in the
//! same order regardless of which worker finished first. Diagnostics are
//! emitted during the reduction, on the calling thread.
//!
//! A fatal simulator error stops the pool from starting further units and
//! aborts the whole run. Any other failure is local to its unit: it is
//! recorded on the path report, reported as a warning, and the rest of the
//! work continues.

use crate::bench::{Bench, ConstraintKind};
use crate::delay::{aggregate, Aggregation, DelaySample};
use crate::error::{
    EngineError, GRID_INCOMPLETE, NON_MONOTONIC, NOTHING_TO_MEASURE, PATH_FAILED, SEARCH_FAILED,
    STIMULUS_FAILED,
};
use crate::report::{
    CellReport, FailedCondition, Measure, MeasuredTable, PathReport, PathStatus, ProcedureReport,
    Summary,
};
use crate::search::{search, SearchFailure, SearchReport};
use crate::table::TableBuilder;
use crate::variation::{VariationPoint, VariationSpace};
use cellchar_cell::{conditions, enumerate_paths, Cell, Condition, Path, PathKind};
use cellchar_config::{Axis, CellJob, Procedure, Settings};
use cellchar_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use cellchar_sim::{Outcome, SimError, SimulatorAdapter, Stimulus};
use rayon::prelude::*;

/// Whether `procedure` measures arcs of `kind`.
pub fn applies(procedure: Procedure, kind: PathKind) -> bool {
    match procedure {
        Procedure::WorstCase | Procedure::Average => kind != PathKind::Data,
        Procedure::BinarySearchConstraint => kind == PathKind::Data,
        Procedure::RecoverySearch | Procedure::RemovalSearch => kind == PathKind::Async,
    }
}

/// The constraints a search procedure measures, in table order.
pub fn constraint_kinds(procedure: Procedure) -> &'static [ConstraintKind] {
    match procedure {
        Procedure::BinarySearchConstraint => &[ConstraintKind::Setup, ConstraintKind::Hold],
        Procedure::RecoverySearch => &[ConstraintKind::Recovery],
        Procedure::RemovalSearch => &[ConstraintKind::Removal],
        Procedure::WorstCase | Procedure::Average => &[],
    }
}

/// Runs characterization procedures against a simulator.
pub struct Characterizer<'a> {
    settings: &'a Settings,
    adapter: &'a dyn SimulatorAdapter,
    pool: rayon::ThreadPool,
}

/// One arc with its conditions, shared by every procedure of a cell.
struct PathPlan {
    path: Path,
    describe: String,
    conditions: Vec<Condition>,
}

/// Per-cell state shared by the procedures.
struct CellRun<'j> {
    job: &'j CellJob,
    bench: Bench<'j>,
    space: VariationSpace,
    arcs: Vec<PathPlan>,
    sink: &'j DiagnosticSink,
}

impl CellRun<'_> {
    fn cell(&self) -> &Cell {
        &self.job.cell
    }

    fn points(&self, axes: &[Axis]) -> Result<Vec<VariationPoint>, EngineError> {
        let variations = self
            .space
            .variations(axes)
            .map_err(|source| EngineError::Variation {
                cell: self.cell().name().to_string(),
                source,
            })?;
        Ok(variations.collect())
    }

    fn table(&self, axes: &[Axis]) -> Result<TableBuilder, EngineError> {
        let index = axes.iter().map(|&axis| {
            let values = self.space.values(axis).unwrap_or_default().to_vec();
            (axis, values)
        });
        TableBuilder::new(index).map_err(|source| EngineError::Table {
            cell: self.cell().name().to_string(),
            source,
        })
    }

    fn diagnostic(
        &self,
        diagnostic: Diagnostic,
        procedure: Procedure,
        arc: &PathPlan,
    ) -> Diagnostic {
        diagnostic
            .with_context("cell", self.cell().name())
            .with_context("procedure", procedure.name())
            .with_context("path", arc.describe.clone())
    }

    fn unit_failed(
        &self,
        code: DiagnosticCode,
        procedure: Procedure,
        arc: &PathPlan,
        failure: FailedCondition,
        report: &mut PathReport,
    ) {
        let message = match failure.measure {
            Measure::Delay | Measure::Transition => format!("stimulus failed: {}", failure.reason),
            measure => format!("{measure} search failed: {}", failure.reason),
        };
        let diagnostic = self
            .diagnostic(Diagnostic::warning(code, message), procedure, arc)
            .with_context("variation", failure.variation.clone())
            .with_context("condition", failure.condition.clone())
            .with_context("measure", failure.measure.to_string());
        self.sink.emit(diagnostic);
        report.failed_conditions.push(failure);
    }

    /// Builds a table and reports holes and load inversions.
    fn finish_table(
        &self,
        procedure: Procedure,
        arc: &PathPlan,
        measure: Measure,
        builder: TableBuilder,
        report: &mut PathReport,
    ) {
        match builder.build() {
            Ok((table, violations)) => {
                for violation in violations {
                    let diagnostic = Diagnostic::warning(
                        NON_MONOTONIC,
                        format!("{measure} decreases with load: {violation}"),
                    );
                    self.sink.emit(
                        self.diagnostic(diagnostic, procedure, arc)
                            .with_context("measure", measure.to_string()),
                    );
                }
                report.tables.push(MeasuredTable { measure, table });
            }
            Err(err) => {
                let diagnostic =
                    Diagnostic::error(GRID_INCOMPLETE, format!("{measure} table: {err}"));
                self.sink.emit(
                    self.diagnostic(diagnostic, procedure, arc)
                        .with_context("measure", measure.to_string())
                        .with_help("rerun the missing points or widen the search bounds"),
                );
                report.table_errors.push(format!("{measure}: {err}"));
            }
        }
    }

    fn path_failed(&self, procedure: Procedure, arc: &PathPlan, report: &mut PathReport) {
        let diagnostic = Diagnostic::error(
            PATH_FAILED,
            format!("no condition of {} produced a result", arc.describe),
        );
        self.sink.emit(self.diagnostic(diagnostic, procedure, arc));
        report.status = PathStatus::Failed;
    }
}

fn path_report(cell: &Cell, arc: &PathPlan) -> PathReport {
    let path = &arc.path;
    PathReport {
        path: arc.describe.clone(),
        kind: path.kind,
        input: cell.port_name(path.input).to_string(),
        input_transition: path.input_transition,
        output: cell.port_name(path.output).to_string(),
        output_transition: path.output_transition,
        tables: Vec::new(),
        summary: Vec::new(),
        failed_conditions: Vec::new(),
        table_errors: Vec::new(),
        status: PathStatus::Complete,
    }
}

fn settle_status(report: &mut PathReport) {
    if report.status != PathStatus::Failed
        && (!report.failed_conditions.is_empty() || !report.table_errors.is_empty())
    {
        report.status = PathStatus::Degraded;
    }
}

/// Offsets of each arc's first unit in a flat unit list where every arc
/// has `per_condition` units per (point, condition).
fn bases(arcs: &[&PathPlan], points: usize, per_condition: usize) -> Vec<usize> {
    let mut next = 0;
    arcs.iter()
        .map(|arc| {
            let base = next;
            next += points * arc.conditions.len() * per_condition;
            base
        })
        .collect()
}

impl<'a> Characterizer<'a> {
    /// A characterizer with one worker per configured simulator slot.
    pub fn new(
        settings: &'a Settings,
        adapter: &'a dyn SimulatorAdapter,
    ) -> Result<Self, EngineError> {
        Self::with_workers(settings, adapter, settings.simulator.workers)
    }

    /// A characterizer with `workers` threads.
    pub fn with_workers(
        settings: &'a Settings,
        adapter: &'a dyn SimulatorAdapter,
        workers: usize,
    ) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("cellchar-worker-{i}"))
            .build()?;
        Ok(Self {
            settings,
            adapter,
            pool,
        })
    }

    /// The number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Characterizes every job in order. Stops at the first fatal error.
    pub fn characterize_all<'j>(
        &self,
        jobs: impl IntoIterator<Item = &'j CellJob>,
        sink: &DiagnosticSink,
    ) -> Result<Vec<CellReport>, EngineError> {
        jobs.into_iter()
            .map(|job| self.characterize(job, sink))
            .collect()
    }

    /// Runs every procedure configured for `job`.
    pub fn characterize(
        &self,
        job: &CellJob,
        sink: &DiagnosticSink,
    ) -> Result<CellReport, EngineError> {
        let cell = &job.cell;
        let _span = tracing::info_span!("cell", cell = cell.name()).entered();

        let mut arcs = Vec::new();
        for path in enumerate_paths(cell) {
            let found = conditions(cell, &path).map_err(|source| EngineError::Cell {
                cell: cell.name().to_string(),
                source,
            })?;
            arcs.push(PathPlan {
                describe: path.describe(cell),
                conditions: found.collect(),
                path,
            });
        }
        tracing::info!(paths = arcs.len(), procedures = job.procedures.len(), "characterizing");

        let run = CellRun {
            job,
            bench: Bench::new(self.settings, job),
            space: VariationSpace::from_sweeps(&job.sweeps),
            arcs,
            sink,
        };
        let mut procedures = Vec::with_capacity(job.procedures.len());
        for &procedure in &job.procedures {
            if !run.arcs.iter().any(|arc| applies(procedure, arc.path.kind)) {
                sink.emit(
                    Diagnostic::warning(
                        NOTHING_TO_MEASURE,
                        format!("{procedure} has no timing arc to measure on this cell"),
                    )
                    .with_context("cell", cell.name())
                    .with_context("procedure", procedure.name()),
                );
            }
            let paths = match Aggregation::of(procedure) {
                Some(policy) => self.delays(&run, procedure, policy)?,
                None => self.constraints(&run, procedure)?,
            };
            let degraded = paths.iter().filter(|p| p.status != PathStatus::Complete).count();
            tracing::info!(%procedure, paths = paths.len(), degraded, "procedure finished");
            procedures.push(ProcedureReport { procedure, paths });
        }
        Ok(CellReport {
            cell: cell.name().to_string(),
            procedures,
        })
    }

    /// Runs one stimulus. Only a fatal simulator error is an `Err`.
    fn simulate(&self, stimulus: &Stimulus) -> Result<Result<Outcome, SimError>, SimError> {
        match self.adapter.simulate(stimulus) {
            Err(err) if err.is_fatal() => Err(err),
            other => Ok(other),
        }
    }

    fn delays(
        &self,
        run: &CellRun<'_>,
        procedure: Procedure,
        policy: Aggregation,
    ) -> Result<Vec<PathReport>, EngineError> {
        let axes = procedure.axes(run.cell().is_sequential());
        let points = run.points(axes)?;
        let arcs: Vec<&PathPlan> = run
            .arcs
            .iter()
            .filter(|arc| applies(procedure, arc.path.kind))
            .collect();
        let bases = bases(&arcs, points.len(), 1);

        let mut units = Vec::new();
        for arc in &arcs {
            for point in &points {
                for condition in &arc.conditions {
                    units.push((*arc, point, condition));
                }
            }
        }
        tracing::debug!(%procedure, units = units.len(), "scheduling");

        let time = self.settings.units.time;
        let results: Vec<Result<DelaySample, SimError>> = self.pool.install(|| {
            units
                .par_iter()
                .map(|&(arc, point, condition)| -> Result<_, EngineError> {
                    let stimulus = run.bench.delay(&arc.path, condition, point)?;
                    let sample = self.simulate(&stimulus)?.and_then(|outcome| {
                        let m = outcome.measurement().ok_or_else(|| {
                            SimError::MissingMeasurement {
                                name: "delay".into(),
                            }
                        })?;
                        Ok(DelaySample {
                            delay: time.from_si(m.delay),
                            transition: time.from_si(m.transition),
                        })
                    });
                    Ok(sample)
                })
                .collect::<Result<Vec<_>, EngineError>>()
        })?;

        let mut reports = Vec::with_capacity(arcs.len());
        for (arc, base) in arcs.iter().zip(bases) {
            let mut report = path_report(run.cell(), arc);
            let mut delays = run.table(axes)?;
            let mut transitions = run.table(axes)?;
            let mut all = Vec::new();
            let per_point = arc.conditions.len();

            for (v, point) in points.iter().enumerate() {
                let mut samples = Vec::with_capacity(per_point);
                for (c, condition) in arc.conditions.iter().enumerate() {
                    match &results[base + v * per_point + c] {
                        Ok(sample) => samples.push(*sample),
                        Err(err) => {
                            let failure = FailedCondition {
                                measure: Measure::Delay,
                                condition: condition.describe(run.cell()),
                                variation: point.to_string(),
                                reason: err.to_string(),
                            };
                            run.unit_failed(STIMULUS_FAILED, procedure, arc, failure, &mut report);
                        }
                    }
                }
                if let Some(reduced) = aggregate(policy, &samples) {
                    let coordinates = point.coordinates(axes);
                    delays.insert(&coordinates, reduced.delay);
                    transitions.insert(&coordinates, reduced.transition);
                }
                all.extend(samples);
            }

            match aggregate(policy, &all) {
                Some(summary) => {
                    report.summary = vec![
                        Summary {
                            measure: Measure::Delay,
                            value: summary.delay,
                        },
                        Summary {
                            measure: Measure::Transition,
                            value: summary.transition,
                        },
                    ];
                    run.finish_table(procedure, arc, Measure::Delay, delays, &mut report);
                    run.finish_table(procedure, arc, Measure::Transition, transitions, &mut report);
                }
                None => run.path_failed(procedure, arc, &mut report),
            }
            settle_status(&mut report);
            reports.push(report);
        }
        Ok(reports)
    }

    fn constraints(
        &self,
        run: &CellRun<'_>,
        procedure: Procedure,
    ) -> Result<Vec<PathReport>, EngineError> {
        let kinds = constraint_kinds(procedure);
        let axes = procedure.axes(run.cell().is_sequential());
        let points = run.points(axes)?;
        let arcs: Vec<&PathPlan> = run
            .arcs
            .iter()
            .filter(|arc| applies(procedure, arc.path.kind))
            .collect();
        let bases = bases(&arcs, points.len(), kinds.len());

        let mut units = Vec::new();
        for arc in &arcs {
            for point in &points {
                for condition in &arc.conditions {
                    for &kind in kinds {
                        units.push((*arc, point, condition, kind));
                    }
                }
            }
        }
        tracing::debug!(%procedure, units = units.len(), "scheduling");

        let job = run.job;
        let results: Vec<SearchReport> = self.pool.install(|| {
            units
                .par_iter()
                .map(|&(arc, point, condition, kind)| -> Result<_, EngineError> {
                    let bench = run.bench.constraint(kind, &arc.path, condition, point)?;
                    let report = search(kind.bounds(&job.bounds), job.max_iterations, |offset| {
                        let outcome = self.adapter.simulate(&bench.at(offset))?;
                        outcome.registered().ok_or_else(|| SimError::MissingMeasurement {
                            name: "state".into(),
                        })
                    })?;
                    tracing::trace!(
                        path = %arc.describe,
                        %point,
                        ?kind,
                        probes = report.probes,
                        "search finished"
                    );
                    Ok(report)
                })
                .collect::<Result<Vec<_>, EngineError>>()
        })?;

        let mut reports = Vec::with_capacity(arcs.len());
        for (arc, base) in arcs.iter().zip(bases) {
            let mut report = path_report(run.cell(), arc);
            let per_point = arc.conditions.len() * kinds.len();
            let mut builders = Vec::with_capacity(kinds.len());
            let mut converged = vec![Vec::new(); kinds.len()];

            for (k, &kind) in kinds.iter().enumerate() {
                let mut builder = run.table(axes)?;
                for (v, point) in points.iter().enumerate() {
                    let mut values = Vec::new();
                    for (c, condition) in arc.conditions.iter().enumerate() {
                        let unit = &results[base + v * per_point + c * kinds.len() + k];
                        match &unit.result {
                            Ok(value) => values.push(*value),
                            Err(failure) => {
                                let code = match failure {
                                    SearchFailure::Simulation { .. } => STIMULUS_FAILED,
                                    _ => SEARCH_FAILED,
                                };
                                let failure = FailedCondition {
                                    measure: kind.measure(),
                                    condition: condition.describe(run.cell()),
                                    variation: point.to_string(),
                                    reason: failure.to_string(),
                                };
                                run.unit_failed(code, procedure, arc, failure, &mut report);
                            }
                        }
                    }
                    // the constraint must hold under every condition
                    if let Some(worst) = Aggregation::WorstCase.reduce(values.iter().copied()) {
                        builder.insert(&point.coordinates(axes), worst);
                    }
                    converged[k].extend(values);
                }
                builders.push(builder);
            }

            if converged.iter().all(Vec::is_empty) {
                run.path_failed(procedure, arc, &mut report);
            } else {
                for ((&kind, builder), values) in kinds.iter().zip(builders).zip(&converged) {
                    if let Some(value) = Aggregation::WorstCase.reduce(values.iter().copied()) {
                        report.summary.push(Summary {
                            measure: kind.measure(),
                            value,
                        });
                    }
                    run.finish_table(procedure, arc, kind.measure(), builder, &mut report);
                }
            }
            settle_status(&mut report);
            reports.push(report);
        }
        Ok(reports)
    }
}
