use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use texlipse_log::{Diagnostic, LatexLogAnalyzer};

#[derive(Serialize)]
struct Report<'a> {
    diagnostics: Vec<Diagnostic>,
    needs_latex_rerun: bool,
    needs_bib_rerun: bool,
    has_errors: bool,
    has_warnings: bool,
    parsing_stack_error: bool,
    input_files: &'a BTreeSet<String>,
    output_files: &'a BTreeSet<String>,
}

#[test]
fn run_golden_tests() {
    let fixtures_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut checked = 0;

    for entry in fs::read_dir(&fixtures_dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_none_or(|ext| ext != "log") {
            continue;
        }

        let log = fs::read_to_string(&path).expect("Failed to read log");
        let mut analyzer = LatexLogAnalyzer::new();
        let diagnostics = analyzer.parse(&log);
        let report = Report {
            diagnostics,
            needs_latex_rerun: analyzer.needs_latex_rerun(),
            needs_bib_rerun: analyzer.needs_bib_rerun(),
            has_errors: analyzer.has_errors(),
            has_warnings: analyzer.has_warnings(),
            parsing_stack_error: analyzer.parsing_stack_error(),
            input_files: analyzer.input_files(),
            output_files: analyzer.output_files(),
        };
        let json_output = serde_json::to_string_pretty(&report).expect("Failed to serialize report");

        let golden_path = path.with_extension("golden.json");
        if std::env::var("UPDATE_GOLDEN").is_ok() {
            fs::write(&golden_path, &json_output).expect("Failed to update golden file");
        } else {
            let expected = fs::read_to_string(&golden_path)
                .expect("Failed to read golden file (run with UPDATE_GOLDEN=1 to create)");
            assert_eq!(
                json_output.replace("\r\n", "\n").trim_end(),
                expected.replace("\r\n", "\n").trim_end(),
                "Golden test failed for {:?}",
                path
            );
        }
        checked += 1;
    }
    assert!(checked >= 2, "expected golden fixtures in {:?}", fixtures_dir);
}
