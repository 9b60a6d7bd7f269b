//! Error rendering using ariadne
//!
//! Assembly errors are shown against the source text with the offending
//! span underlined. Module and execution errors have no source location
//! and are printed as a single line.

use crate::Error;
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use luna_core::asm::{AsmError, AsmErrorKind};
use std::io::Write;

const SOURCE_ID: &str = "<asm>";

/// Render an error with formatting to stderr
///
/// # Example
/// ```no_run
/// use luna::{Error, render_error};
///
/// let source = "FUNC main {\n  R 1\n  FROB 0\n}";
/// if let Err(e) = luna::asm::assemble(source) {
///     render_error(&Error::assembly(e, source));
/// }
/// ```
pub fn render_error(error: &Error) {
    render_error_to_writer(error, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(error: &Error, writer: &mut dyn Write) -> std::io::Result<()> {
    render_error_to_writer(error, writer, true)
}

/// Render an error to a String
pub fn render_error_to_string(error: &Error) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Assembly { error, text } => render_assembly(text, error, writer, use_color),
        Error::Format(e) => writeln!(writer, "Error: invalid module: {e}"),
        Error::Execution(e) => writeln!(writer, "Error: runtime error in {e}"),
        Error::Io(e) => writeln!(writer, "Error: {e}"),
    }
}

fn render_assembly(
    text: &str,
    error: &AsmError,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    let mut colors = ColorGenerator::new();
    colors.next(); // Skip the first color.

    let message = error.kind.to_string();
    let mut report = Report::build(ReportKind::Error, (SOURCE_ID, error.span.clone()))
        .with_message(&message)
        .with_config(ariadne::Config::default().with_color(use_color))
        .with_label(
            Label::new((SOURCE_ID, error.span.clone()))
                .with_message(label(&error.kind))
                .with_color(colors.next()),
        );

    if let Some(help) = help(&error.kind) {
        report = report.with_help(help);
    }

    report
        .finish()
        .write((SOURCE_ID, Source::from(text)), &mut *writer)
}

fn label(kind: &AsmErrorKind) -> String {
    match kind {
        AsmErrorKind::InvalidToken(_) => "not a valid token".to_string(),
        AsmErrorKind::Unexpected { expected, .. } => format!("expected {expected} here"),
        AsmErrorKind::UnknownMnemonic(_) => "unknown instruction".to_string(),
        AsmErrorKind::Arity { found, .. } => format!("{found} operands given"),
        AsmErrorKind::Operand(e) => format!("operand {} is out of range", e.field),
        other => other.to_string(),
    }
}

fn help(kind: &AsmErrorKind) -> Option<String> {
    match kind {
        AsmErrorKind::Arity { op, .. } => {
            let modes = op.modes();
            let fields = [("A", modes.a), ("B", modes.b), ("C", modes.c)]
                .into_iter()
                .filter(|(_, mode)| mode.is_used())
                .map(|(name, _)| name)
                .collect::<Vec<_>>();
            Some(format!("usage: {op} {}", fields.join(", ")))
        }
        AsmErrorKind::Operand(e) => Some(format!(
            "{} accepts {}..={} for {}",
            e.op,
            e.range.start(),
            e.range.end(),
            e.field
        )),
        AsmErrorKind::ParamCount { .. } => {
            Some("declare at least as many registers as parameters".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn render(source: &str) -> String {
        let error = luna_core::asm::assemble(source).unwrap_err();
        render_error_to_string_no_color(&Error::assembly(error, source))
    }

    #[test]
    fn test_render_unknown_mnemonic() {
        let output = render(indoc! {"
            FUNC main {
              R 1
              FROB 0, 1
            }
        "});

        assert!(output.contains("Error"));
        assert!(output.contains("unknown mnemonic `FROB`"));
        // Should show the source line
        assert!(output.contains("FROB 0, 1"));
    }

    #[test]
    fn test_render_arity_help() {
        let output = render(indoc! {"
            FUNC main {
              R 1
              MOVE 0
            }
        "});

        assert!(output.contains("MOVE takes 2 operands, found 1"));
        assert!(output.contains("usage: MOVE A, B"));
    }

    #[test]
    fn test_render_operand_range() {
        let output = render(indoc! {"
            FUNC main {
              R 1
              LOADBOOL 0, 1, 600
            }
        "});

        assert!(output.contains("LOADBOOL accepts 0..=511 for C"));
        assert!(output.lines().count() > 1);
    }

    #[test]
    fn test_render_runtime_error() {
        let error = crate::run_source(
            indoc! {r#"
                FUNC main {
                  R 1
                  K "x"
                  UNM 0, 0
                  RETURN 0, 1
                }
            "#},
            Default::default(),
        )
        .unwrap_err();

        assert_eq!(
            render_error_to_string_no_color(&error),
            "Error: runtime error in main:0: UNM expected number, found nil\n"
        );
    }
}
