use crate::filenames::{self, TraceToken};
use crate::ir::{Diagnostic, DiagnosticSink, Severity};
use crate::lines::{self, WRAP_WIDTH};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TEX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\s*(.*)$").unwrap());
static CSTYLE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?):(\d+): (.*)$").unwrap());
static AT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^l\.(\d+)(?: (.*))?$").unwrap());
static FULL_BOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Over|Under)full \\[hv]box \([^)]*\)").unwrap());
static BOX_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:at lines? |detected at line )(\d+)").unwrap());
static LATEX_WARNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^LaTeX(?: (\S+))? Warning: (.*)$").unwrap());
static SOURCE_WARNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Package|Class|Module) (\S+) Warning: (.*)$").unwrap());
static PDFTEX_WARNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:!\s*)?pdfTeX warning(?: \(([^)]*)\))?: (.*)$").unwrap());
static GENERIC_WARNING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+(?: \S+){0,2} [Ww]arning: (.*)$").unwrap());
static INPUT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"on input line (\d+)").unwrap());
static NO_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^No file (.+)\.(bbl|toc)\.$").unwrap());
static OUTPUT_WRITTEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Output written on (.+?) \(.*\)\.?$").unwrap());
static TRANSCRIPT_WRITTEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Transcript written on (.+)\.$").unwrap());
static DIAGNOSTIC_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:!|(?:LaTeX|Package|Class|Module)\b.*?Warning:|(?:Over|Under)full \\[hv]box|pdfTeX warning|No file )",
    )
    .unwrap()
});

/// Context lines an error may wait for its `l.<n>` line before it is
/// reported without one.
const MAX_ERROR_CONTEXT_LINES: usize = 20;
/// Lines of box contents skipped after an over/underfull box warning.
const MAX_BOX_DETAIL_LINES: usize = 10;

/// How the message that is currently being assembled continues.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Continuation {
    /// A TeX error waiting for the `l.<n>` line that locates it.
    ErrorContext,
    /// A warning continued by lines starting with `(<source>)`, or by
    /// indented lines when there is no source.
    Prefixed(Option<String>),
    /// A pdfTeX warning continued by the next non-empty line.
    NextLine,
    /// A box warning followed by a dump of the box, up to a blank line.
    BoxDetail,
}

#[derive(Debug)]
struct PendingMessage {
    kind: Continuation,
    text: String,
    line: Option<u32>,
    severity: Severity,
    file: Option<String>,
    waited: usize,
}

impl PendingMessage {
    fn new(kind: Continuation, severity: Severity, text: &str, file: Option<String>) -> Self {
        Self {
            kind,
            text: text.trim().to_string(),
            line: None,
            severity,
            file,
            waited: 0,
        }
    }

    fn append(&mut self, more: &str) {
        let more = more.trim();
        if more.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(more);
    }
}

/// Parser for the transcript a LaTeX pass leaves behind.
///
/// Besides reporting errors and warnings, the analyzer answers the questions
/// the build cycle asks after every pass: does LaTeX need to run again, does
/// the bibliography need rebuilding, and which files did the pass read.
///
/// Diagnostics are attributed to the file that was open when they were
/// printed, using TeX's `(file ... )` convention. That attribution is a
/// heuristic. When the trace loses balance, [`parsing_stack_error`] is set and
/// the file names of later diagnostics may be off.
///
/// [`parsing_stack_error`]: LatexLogAnalyzer::parsing_stack_error
#[derive(Debug)]
pub struct LatexLogAnalyzer {
    wrap_width: usize,
    file_stack: Vec<Option<String>>,
    pending: Option<PendingMessage>,
    skip_indented: usize,
    citation_seen: bool,
    needs_latex_rerun: bool,
    needs_bib_rerun: bool,
    has_errors: bool,
    has_warnings: bool,
    parsing_stack_error: bool,
    input_files: BTreeSet<String>,
    output_files: BTreeSet<String>,
}

impl Default for LatexLogAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LatexLogAnalyzer {
    pub fn new() -> Self {
        Self::with_wrap_width(WRAP_WIDTH)
    }

    /// Creates an analyzer for logs written with a non-default
    /// `max_print_line`.
    pub fn with_wrap_width(wrap_width: usize) -> Self {
        Self {
            wrap_width,
            file_stack: Vec::new(),
            pending: None,
            skip_indented: 0,
            citation_seen: false,
            needs_latex_rerun: false,
            needs_bib_rerun: false,
            has_errors: false,
            has_warnings: false,
            parsing_stack_error: false,
            input_files: BTreeSet::new(),
            output_files: BTreeSet::new(),
        }
    }

    fn reset(&mut self) {
        *self = Self::with_wrap_width(self.wrap_width);
    }

    /// Parses a complete log, reporting every problem to `sink`.
    ///
    /// State from a previous call is discarded first. A leading version
    /// banner (`This is pdfTeX, ...`) is skipped.
    pub fn parse_text(&mut self, log: &str, sink: &mut dyn DiagnosticSink) {
        self.reset();
        for (index, line) in lines::logical_lines(log, self.wrap_width).iter().enumerate() {
            if index == 0 && line.starts_with("This is ") {
                continue;
            }
            self.process_line(line, sink);
        }
        if let Some(pending) = self.pending.take() {
            self.complete(pending, sink);
        }
        if !self.file_stack.is_empty() {
            log::debug!("{} file(s) still open at end of log", self.file_stack.len());
        }
    }

    /// Convenience wrapper around [`parse_text`](Self::parse_text) that
    /// collects the diagnostics.
    pub fn parse(&mut self, log: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.parse_text(log, &mut diagnostics);
        diagnostics
    }

    pub fn needs_latex_rerun(&self) -> bool {
        self.needs_latex_rerun
    }

    pub fn needs_bib_rerun(&self) -> bool {
        self.needs_bib_rerun
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn has_warnings(&self) -> bool {
        self.has_warnings
    }

    /// True if a `)` was seen with no open file to close.
    pub fn parsing_stack_error(&self) -> bool {
        self.parsing_stack_error
    }

    /// Names of files the log says were opened for reading.
    pub fn input_files(&self) -> &BTreeSet<String> {
        &self.input_files
    }

    /// Names of files the log says were written (output and transcript).
    pub fn output_files(&self) -> &BTreeSet<String> {
        &self.output_files
    }

    fn current_file(&self) -> Option<String> {
        self.file_stack
            .iter()
            .rev()
            .find_map(|f| f.as_deref())
            .map(filenames::clean_name)
    }

    fn process_line(&mut self, line: &str, sink: &mut dyn DiagnosticSink) {
        if self.skip_indented > 0 {
            self.skip_indented -= 1;
            if line.is_empty() || line.starts_with(' ') {
                return;
            }
        }

        if let Some(pending) = self.pending.take() {
            if self.continue_pending(pending, line, sink) {
                return;
            }
        }
        self.process_fresh(line, sink);
    }

    /// Feeds `line` to the message being assembled. Returns false when the
    /// line was not part of it; the message is then complete and the line
    /// still has to be processed.
    fn continue_pending(
        &mut self,
        mut pending: PendingMessage,
        line: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        match pending.kind.clone() {
            Continuation::ErrorContext => {
                if let Some(caps) = AT_LINE.captures(line) {
                    if pending.line.is_none() {
                        pending.line = caps[1].parse().ok();
                    }
                    let context = caps.get(2).map_or("", |m| m.as_str().trim());
                    pending.text = error_message(&pending.text, context);
                    self.complete(pending, sink);
                    self.skip_indented = 1;
                    return true;
                }
                if starts_diagnostic(line) || pending.waited >= MAX_ERROR_CONTEXT_LINES {
                    self.complete(pending, sink);
                    return false;
                }
                pending.waited += 1;
                self.pending = Some(pending);
                true
            }
            Continuation::Prefixed(source) => {
                let rest = match &source {
                    Some(source) => line.strip_prefix(&format!("({source})")),
                    None => line.strip_prefix(' '),
                };
                match rest {
                    Some(rest) => {
                        pending.append(rest);
                        self.pending = Some(pending);
                        true
                    }
                    None => {
                        self.complete(pending, sink);
                        false
                    }
                }
            }
            Continuation::NextLine => {
                if line.trim().is_empty() {
                    self.pending = Some(pending);
                    return true;
                }
                if starts_diagnostic(line) || line.starts_with(['(', ')', '<', '[']) {
                    self.complete(pending, sink);
                    return false;
                }
                pending.append(line);
                self.complete(pending, sink);
                true
            }
            Continuation::BoxDetail => {
                if line.trim().is_empty() {
                    self.complete(pending, sink);
                    return true;
                }
                if starts_diagnostic(line)
                    || line.starts_with(['(', ')'])
                    || pending.waited >= MAX_BOX_DETAIL_LINES
                {
                    self.complete(pending, sink);
                    return false;
                }
                pending.waited += 1;
                self.pending = Some(pending);
                true
            }
        }
    }

    fn process_fresh(&mut self, line: &str, sink: &mut dyn DiagnosticSink) {
        if line.is_empty() {
            return;
        }

        if let Some(caps) = PDFTEX_WARNING.captures(line) {
            let mut pending = PendingMessage::new(
                Continuation::NextLine,
                Severity::Warning,
                &caps[2],
                self.current_file(),
            );
            if let Some(kind) = caps.get(1) {
                pending.text = format!("pdfTeX ({}): {}", kind.as_str(), pending.text);
            }
            self.pending = Some(pending);
            return;
        }

        if let Some(caps) = TEX_ERROR.captures(line) {
            let message = caps[1].trim();
            // `! ==> Fatal error occurred, ...` repeats what was reported.
            if message.starts_with("==>") {
                return;
            }
            self.pending = Some(PendingMessage::new(
                Continuation::ErrorContext,
                Severity::Error,
                message,
                self.current_file(),
            ));
            return;
        }

        if let Some(caps) = CSTYLE_ERROR.captures(line) {
            if filenames::looks_like_file(&caps[1]) {
                let mut pending = PendingMessage::new(
                    Continuation::ErrorContext,
                    Severity::Error,
                    &caps[3],
                    Some(filenames::clean_name(&caps[1])),
                );
                pending.line = caps[2].parse().ok();
                self.pending = Some(pending);
                return;
            }
        }

        if FULL_BOX.is_match(line) {
            let mut pending =
                PendingMessage::new(Continuation::BoxDetail, Severity::Layout, line, self.current_file());
            pending.line = BOX_LINE
                .captures(line)
                .and_then(|caps| caps[1].parse().ok());
            self.pending = Some(pending);
            return;
        }

        if let Some(caps) = SOURCE_WARNING.captures(line) {
            self.pending = Some(PendingMessage::new(
                Continuation::Prefixed(Some(caps[1].to_string())),
                Severity::Warning,
                &caps[2],
                self.current_file(),
            ));
            return;
        }

        if let Some(caps) = LATEX_WARNING.captures(line) {
            let source = caps.get(1).map(|m| m.as_str().to_string());
            self.pending = Some(PendingMessage::new(
                Continuation::Prefixed(source),
                Severity::Warning,
                &caps[2],
                self.current_file(),
            ));
            return;
        }

        if let Some(caps) = GENERIC_WARNING.captures(line) {
            let pending =
                PendingMessage::new(Continuation::NextLine, Severity::Warning, &caps[1], self.current_file());
            self.complete(pending, sink);
            return;
        }

        if let Some(caps) = NO_FILE.captures(line) {
            match &caps[2] {
                "bbl" => self.needs_bib_rerun = true,
                _ => self.needs_latex_rerun = true,
            }
            return;
        }

        if let Some(caps) = OUTPUT_WRITTEN
            .captures(line)
            .or_else(|| TRANSCRIPT_WRITTEN.captures(line))
        {
            self.output_files.insert(filenames::clean_name(&caps[1]));
            return;
        }

        let scan = filenames::scan_line(line, starts_diagnostic);
        for token in scan.tokens {
            match token {
                TraceToken::Open(name) => {
                    self.input_files.insert(name.clone());
                    self.file_stack.push(Some(name));
                }
                TraceToken::Group => self.file_stack.push(None),
                TraceToken::Close => {
                    if self.file_stack.pop().is_none() {
                        self.parsing_stack_error = true;
                    }
                }
                TraceToken::Graphic(name) => {
                    self.input_files.insert(name);
                }
            }
        }
        if let Some(offset) = scan.diagnostic_at {
            self.process_fresh(&line[offset..], sink);
        }
    }

    /// Reports a finished message, applying the rerun rules to warnings.
    fn complete(&mut self, mut pending: PendingMessage, sink: &mut dyn DiagnosticSink) {
        if pending.severity == Severity::Warning {
            if !self.keep_warning(&pending.text) {
                return;
            }
            if pending.line.is_none() {
                pending.line = INPUT_LINE
                    .captures(&pending.text)
                    .and_then(|caps| caps[1].parse().ok());
            }
        }

        match pending.severity {
            Severity::Error => self.has_errors = true,
            Severity::Warning => self.has_warnings = true,
            Severity::Layout => {}
        }
        sink.report(
            Diagnostic::new(pending.severity, pending.text)
                .with_file(pending.file)
                .with_line(pending.line),
        );
    }

    /// Updates the rerun flags from a warning. Returns false for warnings
    /// that are consumed here instead of being reported.
    fn keep_warning(&mut self, message: &str) -> bool {
        if message.contains("Label(s) may have changed")
            || message.contains("Rerun to get")
            || message.contains("Please rerun LaTeX")
        {
            self.needs_latex_rerun = true;
            return false;
        }
        if message.contains("Please (re)run Biber") || message.contains("Please (re)run BibTeX") {
            self.needs_bib_rerun = true;
            return false;
        }
        if message.starts_with("There were undefined") {
            // Undefined references alone do not call for a bibliography run.
            if self.citation_seen {
                self.needs_bib_rerun = true;
            }
            return false;
        }
        // Missing references and citations are reported by the document
        // resolver, not by the build.
        if message.starts_with("Reference ") {
            return false;
        }
        if message.starts_with("Citation ") {
            self.citation_seen = true;
            return false;
        }
        true
    }
}

/// Whether `text` opens a new diagnostic.
fn starts_diagnostic(text: &str) -> bool {
    if DIAGNOSTIC_START.is_match(text) {
        return true;
    }
    CSTYLE_ERROR
        .captures(text)
        .is_some_and(|caps| filenames::looks_like_file(&caps[1]))
}

/// Builds the final text of a TeX error once its context line is known.
fn error_message(message: &str, context: &str) -> String {
    let message = message.trim();
    if message.starts_with("Undefined control sequence") {
        if let Some(command) = context.split_whitespace().last() {
            return format!("Undefined control sequence: {command}");
        }
        return message.to_string();
    }
    let is_missing = message.starts_with("Missing ") && message.contains(" inserted");
    if (is_missing || message.starts_with("Extra ")) && !context.is_empty() {
        return format!("{}, near: {}", message.trim_end_matches('.'), context);
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(log: &str) -> (LatexLogAnalyzer, Vec<Diagnostic>) {
        let mut analyzer = LatexLogAnalyzer::new();
        let diagnostics = analyzer.parse(log);
        (analyzer, diagnostics)
    }

    #[test]
    fn undefined_control_sequence() {
        let (analyzer, diagnostics) = analyze("! Undefined control sequence.\nl.5 \\foo\n");
        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.line, Some(5));
        assert_eq!(d.message, "Undefined control sequence: \\foo");
        assert!(analyzer.has_errors());
    }

    #[test]
    fn reference_warnings_are_swallowed() {
        let log = "This is pdfTeX\nLaTeX Warning: Reference `fig:1' on page 1 undefined on input line 12.\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(diagnostics.is_empty());
        assert!(!analyzer.needs_latex_rerun());
        assert!(!analyzer.needs_bib_rerun());
    }

    #[test]
    fn undefined_references_alone_do_not_rerun_bibtex() {
        let (analyzer, _) = analyze("LaTeX Warning: There were undefined references.\n");
        assert!(!analyzer.needs_bib_rerun());
    }

    #[test]
    fn citation_then_undefined_reruns_bibtex() {
        let log = "LaTeX Warning: Citation 'x' undefined on input line 3.\n\
                   LaTeX Warning: There were undefined references.\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(analyzer.needs_bib_rerun());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn labels_changed() {
        let log = "LaTeX Warning: Label(s) may have changed. Rerun to get cross-references right.\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(analyzer.needs_latex_rerun());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn missing_bbl_and_toc() {
        let (analyzer, _) = analyze("No file main.bbl.\n");
        assert!(analyzer.needs_bib_rerun());
        assert!(!analyzer.needs_latex_rerun());

        let (analyzer, _) = analyze("No file main.toc.\n");
        assert!(analyzer.needs_latex_rerun());
        assert!(!analyzer.needs_bib_rerun());
    }

    #[test]
    fn error_inside_nested_file() {
        let (_, diagnostics) = analyze("(main.tex (chapter1.tex ! Undefined control sequence.");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("chapter1.tex"));
    }

    #[test]
    fn closed_file_no_longer_current() {
        let log = "(./main.tex (./chapter1.tex)\n! Missing $ inserted.\n<inserted text> \n$\nl.9 a^\n       b\n";
        let (_, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("main.tex"));
        assert_eq!(diagnostics[0].line, Some(9));
        assert_eq!(diagnostics[0].message, "Missing $ inserted, near: a^");
    }

    #[test]
    fn verbatim_tail_is_not_scanned() {
        let log = "(./main.tex\n! Undefined control sequence.\nl.3 \\foo\n (oops)) more\n";
        let (analyzer, _) = analyze(log);
        assert!(!analyzer.parsing_stack_error());
    }

    #[test]
    fn cstyle_error() {
        let log = "./sub/part.tex:7: Undefined control sequence.\nl.7 \\bar\n";
        let (_, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("sub/part.tex"));
        assert_eq!(diagnostics[0].line, Some(7));
        assert_eq!(diagnostics[0].message, "Undefined control sequence: \\bar");
    }

    #[test]
    fn error_without_context_line() {
        let log = "! Emergency stop.\n<*> main.tex\n";
        let (_, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, None);
    }

    #[test]
    fn fatal_error_trailer_is_ignored() {
        let log = "! ==> Fatal error occurred, no output PDF file produced!\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(diagnostics.is_empty());
        assert!(!analyzer.has_errors());
    }

    #[test]
    fn package_warning_continues_with_prefix() {
        let log = "Package hyperref Warning: Token not allowed in a PDF string (Unicode):\n\
                   (hyperref)                removing `\\@ifnextchar' on input line 14.\n\
                   \n";
        let (analyzer, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.line, Some(14));
        assert_eq!(
            d.message,
            "Token not allowed in a PDF string (Unicode): removing `\\@ifnextchar' on input line 14."
        );
        assert!(analyzer.has_warnings());
    }

    #[test]
    fn font_warning_uses_font_prefix() {
        let log = "LaTeX Font Warning: Font shape `OT1/cmss/m/it' undefined\n\
                   (Font)              using `OT1/cmss/m/n' instead on input line 8.\n";
        let (_, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, Some(8));
        assert!(diagnostics[0].message.ends_with("instead on input line 8."));
    }

    #[test]
    fn natbib_citation_rule() {
        let log = "Package natbib Warning: Citation `knuth' on page 1 undefined on input line 4.\n\
                   \n\
                   Package natbib Warning: There were undefined citations.\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(analyzer.needs_bib_rerun());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn biblatex_asks_for_biber() {
        let log = "Package biblatex Warning: Please (re)run Biber on the file:\n\
                   (biblatex)                main\n\
                   (biblatex)                and rerun LaTeX afterwards.\n";
        let (analyzer, diagnostics) = analyze(log);
        assert!(analyzer.needs_bib_rerun());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn rerunfilecheck_asks_for_latex() {
        let log = "Package rerunfilecheck Warning: File `main.out' has changed.\n\
                   (rerunfilecheck)                Rerun to get outlines right\n\
                   (rerunfilecheck)                or use package `bookmark'.\n";
        let (analyzer, _) = analyze(log);
        assert!(analyzer.needs_latex_rerun());
    }

    #[test]
    fn box_warnings_are_layout() {
        let log = "(./main.tex\n\
                   Overfull \\hbox (12.5pt too wide) in paragraph at lines 20--22\n\
                   []\\OT1/cmr/m/n/10 Some (unbalanced text\n\
                   \n\
                   )\n";
        let (analyzer, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Layout);
        assert_eq!(diagnostics[0].line, Some(20));
        assert_eq!(diagnostics[0].file.as_deref(), Some("main.tex"));
        assert!(!analyzer.has_warnings());
        assert!(!analyzer.needs_latex_rerun());
        assert!(!analyzer.parsing_stack_error());
    }

    #[test]
    fn pdftex_warning_takes_next_line() {
        let log = "pdfTeX warning (ext4): destination with the same identifier (name{page.1}) has\n\
                   been already used, duplicate ignored\n";
        let (_, diagnostics) = analyze(log);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("pdfTeX (ext4): destination"));
        assert!(diagnostics[0].message.ends_with("duplicate ignored"));
    }

    #[test]
    fn unbalanced_close_sets_stack_error() {
        let (analyzer, diagnostics) = analyze("(./main.tex))\n");
        assert!(analyzer.parsing_stack_error());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn wrapped_message_reassembles() {
        let message = format!(
            "LaTeX Warning: {} on input line 3.",
            "A rather long warning text that keeps going and going until the line wraps"
        );
        let split = WRAP_WIDTH;
        let wrapped = format!("{}\n{}\n", &message[..split], &message[split..]);

        let (_, direct) = analyze(&format!("{message}\n"));
        let (_, reassembled) = analyze(&wrapped);
        assert_eq!(direct, reassembled);
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].line, Some(3));
    }

    #[test]
    fn files_and_outputs_are_collected() {
        let log = "(./main.tex (/usr/share/texmf/tex/latex/base/article.cls)\n\
                   <./fig.png>\n\
                   Output written on main.pdf (1 page, 12345 bytes).\n\
                   Transcript written on main.log.\n";
        let (analyzer, _) = analyze(log);
        assert!(analyzer.input_files().contains("./main.tex"));
        assert!(analyzer.input_files().contains("/usr/share/texmf/tex/latex/base/article.cls"));
        assert!(analyzer.input_files().contains("./fig.png"));
        assert!(analyzer.output_files().contains("main.pdf"));
        assert!(analyzer.output_files().contains("main.log"));
    }

    #[test]
    fn state_resets_between_parses() {
        let mut analyzer = LatexLogAnalyzer::new();
        analyzer.parse("No file main.toc.\n");
        assert!(analyzer.needs_latex_rerun());
        analyzer.parse("nothing to see\n");
        assert!(!analyzer.needs_latex_rerun());
    }
}
