//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;

/// Trait for rendering diagnostics into formatted output strings.
///
/// Implementations format diagnostics for different output targets:
/// terminal (human-readable) and JSON (machine-readable).
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[R301]: setup search did not converge
///   --> cell: DFFX1
///    |  path: D rise -> IQ rise
///    |  variation: data_slew=0.1, clock_slew=0.1
///    |
///    = note: pass region starts above 1.0 ns
///    = help: widen setup_bounds
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let head = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return head;
        }
        let ansi = match diag.severity {
            Severity::Error => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
            Severity::Note => "\x1b[1;36m",
        };
        format!("{ansi}{head}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!("{}: {}\n", self.header(diag), diag.message));

        let mut context = diag.context.iter();
        if let Some(first) = context.next() {
            out.push_str(&format!("  --> {first}\n"));
            for entry in context {
                out.push_str(&format!("   |  {entry}\n"));
            }
            if !diag.notes.is_empty() || !diag.help.is_empty() {
                out.push_str("   |\n");
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as one line of JSON.
#[derive(Default)]
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let value = serde_json::json!({
            "severity": diag.severity.to_string(),
            "code": diag.code.to_string(),
            "message": diag.message,
            "context": diag
                .context
                .iter()
                .map(|e| (e.key.clone(), serde_json::Value::String(e.value.clone())))
                .collect::<serde_json::Map<_, _>>(),
            "notes": diag.notes,
            "help": diag.help,
        });
        format!("{value}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    #[test]
    fn render_warning_with_context() {
        let code = DiagnosticCode::new(Category::Search, 301);
        let diag = Diagnostic::warning(code, "setup search did not converge")
            .with_context("cell", "DFFX1")
            .with_context("path", "D rise -> IQ rise")
            .with_help("widen setup_bounds");

        let output = TerminalRenderer::new(false).render(&diag);

        assert!(output.contains("warning[R301]: setup search did not converge"));
        assert!(output.contains("--> cell: DFFX1"));
        assert!(output.contains("|  path: D rise -> IQ rise"));
        assert!(output.contains("= help: widen setup_bounds"));
    }

    #[test]
    fn render_without_context() {
        let code = DiagnosticCode::new(Category::Configuration, 999);
        let diag = Diagnostic::error(code, "general error").with_note("more");

        let output = TerminalRenderer::new(false).render(&diag);

        assert!(output.starts_with("error[E999]: general error\n"));
        assert!(!output.contains("-->"));
        assert!(output.contains("= note: more"));
    }

    #[test]
    fn color_wraps_header() {
        let code = DiagnosticCode::new(Category::Simulation, 201);
        let diag = Diagnostic::error(code, "failed");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.starts_with("\x1b[1;31merror[S201]\x1b[0m"));
    }

    #[test]
    fn json_is_one_line_object() {
        let code = DiagnosticCode::new(Category::Table, 401);
        let diag = Diagnostic::warning(code, "delay decreased with load")
            .with_context("cell", "INVX1")
            .with_context("load", "0.02");

        let output = JsonRenderer.render(&diag);
        assert_eq!(output.lines().count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["code"], "T401");
        assert_eq!(parsed["severity"], "warning");
        assert_eq!(parsed["context"]["cell"], "INVX1");
        assert_eq!(parsed["context"]["load"], "0.02");
    }
}
