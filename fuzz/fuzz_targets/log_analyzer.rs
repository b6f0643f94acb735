#![no_main]
use libfuzzer_sys::fuzz_target;
use texlipse_log::LatexLogAnalyzer;

fuzz_target!(|data: &[u8]| {
    // Logs are not guaranteed to be UTF-8; the build reads them lossily too.
    let log = String::from_utf8_lossy(data);
    let mut analyzer = LatexLogAnalyzer::new();
    let _ = analyzer.parse(&log);

    // Narrow wrap widths stress the line joiner.
    let mut narrow = LatexLogAnalyzer::with_wrap_width(7);
    let _ = narrow.parse(&log);
});
