use texlipse_log::LatexLogAnalyzer;

#[test]
fn test_latexmk_noise() {
    let input = include_str!("fixtures/latexmk_noise.txt");
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);

    for diagnostic in &diagnostics {
        println!("{:?}", diagnostic);
    }
    assert!(diagnostics.is_empty());

    // "Latexmk: (Info)" is prose, not a file.
    assert!(!analyzer.input_files().contains("Info"));
    assert!(!analyzer.parsing_stack_error());

    for expected in [
        "./main.tex",
        "./setup.tex",
        "./chapter1.tex",
        "./chapter2.tex",
        "./main.aux",
        "/usr/local/texlive/2023/texmf-dist/tex/latex/base/size10.clo",
    ] {
        assert!(
            analyzer.input_files().contains(expected),
            "missing {expected} in {:?}",
            analyzer.input_files()
        );
    }
    assert!(analyzer.output_files().contains("main.pdf"));
    assert!(analyzer.output_files().contains("main.log"));
}

#[test]
fn test_prose_parentheses_do_not_close_files() {
    let input = "(./main.tex\n\
                 Package foo Info: loaded (see docs) on input line 3.\n\
                 ! Undefined control sequence.\n\
                 l.10 \\oops\n\
                 )\n";
    let mut analyzer = LatexLogAnalyzer::new();
    let diagnostics = analyzer.parse(input);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].file.as_deref(), Some("main.tex"));
    assert!(!analyzer.parsing_stack_error());
}

#[test]
fn test_stray_close_is_reported() {
    let input = "(./main.tex)\nSome text) more\n";
    let mut analyzer = LatexLogAnalyzer::new();
    analyzer.parse(input);
    assert!(analyzer.parsing_stack_error());
}
