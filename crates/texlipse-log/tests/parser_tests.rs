use texlipse_log::{LatexLogAnalyzer, Severity};

#[test]
fn test_simple_structure() {
    let input = "(./main.tex\nLaTeX Warning: Marginpar on page 1 moved on input line 10.\n)";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    assert_eq!(diagnostics.len(), 1);
    let warning = &diagnostics[0];
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.message, "Marginpar on page 1 moved on input line 10.");
    assert_eq!(warning.file.as_deref(), Some("main.tex"));
    assert_eq!(warning.line, Some(10));
    assert!(!analyzer.parsing_stack_error());
}

#[test]
fn test_error_line_ref() {
    let input = "! Undefined control sequence.\nl.100 \\foo";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "Undefined control sequence: \\foo");
    assert_eq!(diagnostics[0].line, Some(100));
    assert_eq!(diagnostics[0].file, None);
}

#[test]
fn test_errors_in_sibling_files() {
    let input = "(./main.tex (./a.tex\n\
                 ! Extra }, or forgotten $.\n\
                 l.3 x}\n\
                 ) (./b.tex\n\
                 ! Missing number, treated as zero.\n\
                 <to be read again> \n\
                 l.8 \\vspace{x}\n\
                 ))\n";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].file.as_deref(), Some("a.tex"));
    assert_eq!(diagnostics[0].message, "Extra }, or forgotten $, near: x}");
    assert_eq!(diagnostics[1].file.as_deref(), Some("b.tex"));
    assert_eq!(diagnostics[1].line, Some(8));
    assert_eq!(diagnostics[1].message, "Missing number, treated as zero.");
    assert!(analyzer.has_errors());
    assert!(!analyzer.parsing_stack_error());
}

#[test]
fn test_biber_and_latex_rerun_together() {
    let input = "Package biblatex Warning: Please rerun LaTeX.\n\
                 \n\
                 No file main.bbl.\n";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    assert!(diagnostics.is_empty());
    assert!(analyzer.needs_latex_rerun());
    assert!(analyzer.needs_bib_rerun());
}

#[test]
fn test_warning_without_line() {
    let input = "LaTeX Warning: Unused global option(s):\n    [a4].\n\n";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "Unused global option(s): [a4].");
    assert_eq!(diagnostics[0].line, None);
}
