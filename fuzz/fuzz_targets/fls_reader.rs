#![no_main]
use libfuzzer_sys::fuzz_target;
use std::path::Path;
use texlipse_log::FlsAnalyzer;

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);
    let reader = FlsAnalyzer::new(Path::new("/project"), "/project/main.fls");
    let _ = reader.parse_str(&content).used_packages();
});
