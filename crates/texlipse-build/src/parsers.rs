//! Output parsers for the tools a build cycle runs.

use crate::markers::MarkerSink;
use crate::process::ProcessOutput;
use crate::runner::{BuildTarget, OutputParser};
use crate::session::BuildSessionState;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use texlipse_log::{Diagnostic, DiagnosticSink, LatexLogAnalyzer, Severity};

static BIBTEX_CANNOT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^I couldn't open (?:database |style |auxiliary )?file (.+)$").unwrap());
static BIBTEX_LINE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)---line (\d+) of file (.+)$").unwrap());
static BIBTEX_WARNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Warning--(.+)$").unwrap());
static BIBTEX_WARNING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--line (\d+) of file (.+)$").unwrap());
static BIBTEX_FOUND_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^I found no (.+)$").unwrap());

static BIBER_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(WARN|ERROR) - (.+)$").unwrap());
static BIBER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r", line (\d+),").unwrap());

static INDEX_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^!! (.+?) \(file = (.+?), line = (\d+)\):?$").unwrap());
static INDEX_WARNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^## Warning \(input = (.+?), line = (\d+);.*$").unwrap());
static INDEX_DETAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-- (.+)$").unwrap());

/// Forwards diagnostics to a marker sink, counting errors on the way.
struct Forward<'a> {
    origin: &'a str,
    default_file: String,
    markers: &'a mut dyn MarkerSink,
    errors: usize,
}

impl<'a> Forward<'a> {
    fn new(origin: &'a str, target: &BuildTarget, markers: &'a mut dyn MarkerSink) -> Self {
        Self {
            origin,
            default_file: target.source().display().to_string(),
            markers,
            errors: 0,
        }
    }
}

impl DiagnosticSink for Forward<'_> {
    fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors += 1;
        }
        // Messages without a file belong to the document being built.
        if diagnostic.file.is_none() {
            diagnostic.file = Some(self.default_file.clone());
        }
        self.markers.add(self.origin, diagnostic);
    }
}

/// Reads `path`, falling back to what the tool printed.
fn read_or_output(path: &Path, output: &ProcessOutput) -> String {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            log::debug!("{} not readable ({e}), using console output", path.display());
            output.combined()
        }
    }
}

/// For the LaTeX engines. Reads `<base>.log`, which holds the complete
/// transcript even when the console output was cut short.
#[derive(Debug, Default)]
pub struct LatexOutputParser;

impl OutputParser for LatexOutputParser {
    fn parse(
        &self,
        origin: &str,
        target: &BuildTarget,
        output: &ProcessOutput,
        session: &mut BuildSessionState,
        markers: &mut dyn MarkerSink,
    ) -> usize {
        let text = read_or_output(&target.sibling("log"), output);
        let mut analyzer = LatexLogAnalyzer::new();
        let mut forward = Forward::new(origin, target, markers);
        analyzer.parse_text(&text, &mut forward);

        if analyzer.parsing_stack_error() {
            log::debug!("unbalanced file nesting in {} log", target.base_name());
        }
        session.needs_latex_rerun = analyzer.needs_latex_rerun();
        session.needs_bib_rerun = analyzer.needs_bib_rerun();
        session.log_inputs = analyzer.input_files().clone();
        session.log_outputs = analyzer.output_files().clone();
        forward.errors
    }
}

/// For BibTeX, which reports on stdout.
#[derive(Debug, Default)]
pub struct BibtexOutputParser;

impl OutputParser for BibtexOutputParser {
    fn parse(
        &self,
        origin: &str,
        target: &BuildTarget,
        output: &ProcessOutput,
        _session: &mut BuildSessionState,
        markers: &mut dyn MarkerSink,
    ) -> usize {
        let text = output.combined();
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        let mut forward = Forward::new(origin, target, markers);

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if BIBTEX_CANNOT_OPEN.is_match(line) || BIBTEX_FOUND_NO.is_match(line) {
                let mut diagnostic = Diagnostic::new(Severity::Error, line);
                // The location follows on its own line.
                if let Some(at) = lines
                    .get(i + 1)
                    .and_then(|next| BIBTEX_LINE_ERROR.captures(next))
                    .filter(|at| at[1].trim().is_empty())
                {
                    diagnostic = diagnostic
                        .with_file(Some(at[3].to_string()))
                        .with_line(at[2].parse().ok());
                    i += 1;
                }
                forward.report(diagnostic);
            } else if let Some(caps) = BIBTEX_LINE_ERROR.captures(line) {
                let message = match caps[1].trim() {
                    "" => "Error",
                    m => m,
                };
                forward.report(
                    Diagnostic::new(Severity::Error, message)
                        .with_file(Some(caps[3].to_string()))
                        .with_line(caps[2].parse().ok()),
                );
            } else if let Some(caps) = BIBTEX_WARNING.captures(line) {
                let mut diagnostic = Diagnostic::new(Severity::Warning, caps[1].trim());
                if let Some(at) = lines.get(i + 1).and_then(|next| BIBTEX_WARNING_LINE.captures(next)) {
                    diagnostic = diagnostic
                        .with_file(Some(at[2].to_string()))
                        .with_line(at[1].parse().ok());
                    i += 1;
                }
                forward.report(diagnostic);
            }
            i += 1;
        }
        forward.errors
    }
}

/// For biber's `WARN - ` and `ERROR - ` lines.
#[derive(Debug, Default)]
pub struct BiberOutputParser;

impl OutputParser for BiberOutputParser {
    fn parse(
        &self,
        origin: &str,
        target: &BuildTarget,
        output: &ProcessOutput,
        _session: &mut BuildSessionState,
        markers: &mut dyn MarkerSink,
    ) -> usize {
        let mut forward = Forward::new(origin, target, markers);
        for line in output.combined().lines() {
            let Some(caps) = BIBER_MESSAGE.captures(line) else {
                continue;
            };
            let severity = if &caps[1] == "ERROR" {
                Severity::Error
            } else {
                Severity::Warning
            };
            let message = caps[2].trim();
            let line_no = BIBER_LINE
                .captures(message)
                .and_then(|at| at[1].parse().ok());
            forward.report(Diagnostic::new(severity, message).with_line(line_no));
        }
        forward.errors
    }
}

/// For makeindex. Reads the `<base>.ilg` transcript.
#[derive(Debug, Default)]
pub struct MakeindexOutputParser;

impl OutputParser for MakeindexOutputParser {
    fn parse(
        &self,
        origin: &str,
        target: &BuildTarget,
        output: &ProcessOutput,
        _session: &mut BuildSessionState,
        markers: &mut dyn MarkerSink,
    ) -> usize {
        let text = read_or_output(&target.sibling("ilg"), output);
        let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
        let mut forward = Forward::new(origin, target, markers);

        let mut i = 0;
        while i < lines.len() {
            let detail = lines
                .get(i + 1)
                .and_then(|next| INDEX_DETAIL.captures(next))
                .map(|caps| caps[1].to_string());

            let found = if let Some(caps) = INDEX_ERROR.captures(lines[i]) {
                let message = match &detail {
                    Some(d) => format!("{}: {d}", &caps[1]),
                    None => caps[1].to_string(),
                };
                Some(
                    Diagnostic::new(Severity::Error, message)
                        .with_file(Some(caps[2].to_string()))
                        .with_line(caps[3].parse().ok()),
                )
            } else {
                INDEX_WARNING.captures(lines[i]).map(|caps| {
                    Diagnostic::new(Severity::Warning, detail.as_deref().unwrap_or("Warning"))
                        .with_file(Some(caps[1].to_string()))
                        .with_line(caps[2].parse().ok())
                })
            };

            if let Some(diagnostic) = found {
                forward.report(diagnostic);
                if detail.is_some() {
                    i += 1;
                }
            }
            i += 1;
        }
        forward.errors
    }
}

/// For format converters such as dvips and ps2pdf, whose output carries
/// nothing worth a marker.
#[derive(Debug, Default)]
pub struct NoOutputParser;

impl OutputParser for NoOutputParser {
    fn parse(
        &self,
        origin: &str,
        _target: &BuildTarget,
        output: &ProcessOutput,
        _session: &mut BuildSessionState,
        _markers: &mut dyn MarkerSink,
    ) -> usize {
        if output.exit_code != Some(0) {
            log::warn!("{origin} exited with {:?}", output.exit_code);
        }
        0
    }
}
