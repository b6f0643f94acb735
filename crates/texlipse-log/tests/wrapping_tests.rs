use texlipse_log::LatexLogAnalyzer;
use texlipse_log::lines::WRAP_WIDTH;

/// Breaks `line` the way TeX does when writing its log.
fn wrap(line: &str) -> String {
    line.as_bytes()
        .chunks(WRAP_WIDTH)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_wrapped_filename() {
    let name = "./some/very/long/path/to/a/file/that/gets/wrapped/across/two/physical/lines/here.tex";
    let input = format!("{}\n)\n", wrap(&format!("({name}")));
    assert_eq!(input.lines().next().unwrap().len(), WRAP_WIDTH);

    let mut analyzer = LatexLogAnalyzer::new();
    analyzer.parse(&input);

    assert!(analyzer.input_files().contains(name), "{:?}", analyzer.input_files());
    assert!(!analyzer.parsing_stack_error());
}

#[test]
fn test_wrapped_error_is_attributed() {
    let name = "./chapters/a-rather-long-chapter-name-that-pushes-the-error-past-the-wrap.tex";
    let first = format!("({name} ! Undefined control sequence.");
    let input = format!("{}\nl.12 \\missing\n)\n", wrap(&first));

    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(&input);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].file.as_deref(),
        Some("chapters/a-rather-long-chapter-name-that-pushes-the-error-past-the-wrap.tex")
    );
    assert_eq!(diagnostics[0].line, Some(12));
    assert_eq!(diagnostics[0].message, "Undefined control sequence: \\missing");
}

#[test]
fn test_ellipsis_at_wrap_width_is_not_joined() {
    let first = format!("{}...", "x".repeat(WRAP_WIDTH - 3));
    let input = format!("{first}\n! Emergency stop.\n");

    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(&input);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "Emergency stop.");
}
