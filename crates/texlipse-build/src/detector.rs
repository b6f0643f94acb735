//! Decides whether another LaTeX pass or an auxiliary tool is needed.
//!
//! After every LaTeX pass the detector combines three signals:
//!
//! ```text
//!   log analyzer flags ──┐
//!   file trace (.fls)  ──┼──> queue of runners + done flag
//!   filesystem diff    ──┘
//! ```
//!
//! The pass counter is checked before anything else, so a build never runs
//! LaTeX more than `max_cycles` times however the signals oscillate.

use crate::config::BuildConfig;
use crate::error::Result;
use crate::queue::BuildQueue;
use crate::registry::{RunnerId, RunnerRegistry};
use crate::runner::BuildTarget;
use crate::session::BuildSessionState;
use crate::tracking::ProjectFileTracking;
use std::path::{Path, PathBuf};
use texlipse_log::{FileTrace, FlsAnalyzer, LogTrace, TraceError, TraceSource};

#[derive(Debug)]
pub struct BuildCycleDetector<'a> {
    registry: &'a RunnerRegistry,
    target: &'a BuildTarget,
    config: &'a BuildConfig,
    tracking: ProjectFileTracking,
    /// Project-relative directory LaTeX writes into.
    container: PathBuf,
    queue: BuildQueue,
    total_count: usize,
    total_max: usize,
    done: bool,
}

impl<'a> BuildCycleDetector<'a> {
    pub fn new(registry: &'a RunnerRegistry, target: &'a BuildTarget, config: &'a BuildConfig) -> Self {
        Self {
            registry,
            target,
            config,
            tracking: ProjectFileTracking::new(
                target.root(),
                config.output_dir.as_deref(),
                config.temp_dir.as_deref(),
            ),
            container: target.relative_dir(),
            queue: BuildQueue::new(),
            total_count: 0,
            total_max: config.max_cycles,
            done: false,
        }
    }

    /// Takes the starting snapshot and schedules the bibliography tool if
    /// the previous build left that pending.
    pub fn init_file_tracking(&mut self, session: &mut BuildSessionState) -> Result<()> {
        self.tracking.refresh_snapshots(&self.container)?;
        if session.bibliography_pending() {
            if let Some(id) = self.registry.bibliography_runner(self.config.biblatex_mode) {
                log::debug!("bibliography pending from the previous build");
                self.queue.push(id);
                self.done = false;
            }
            session.clear_bibliography();
        }
        Ok(())
    }

    /// Called after every LaTeX pass.
    pub fn check_latex_output(&mut self, session: &mut BuildSessionState) -> Result<()> {
        self.total_count += 1;
        if self.total_count >= self.total_max {
            log::info!("stopping after {} LaTeX pass(es)", self.total_count);
            // Requests left at the ceiling must not leak into the next build.
            session.needs_latex_rerun = false;
            session.clear_bibliography();
            self.done = true;
            return Ok(());
        }
        self.done = self.queue.is_empty();

        let trace = self.file_trace(session)?;

        if session.needs_latex_rerun {
            log::debug!("log asks for another LaTeX pass");
            session.needs_latex_rerun = false;
            self.done = false;
        }
        if session.needs_bib_rerun {
            if let Some(id) = self.registry.bibliography_runner(self.config.biblatex_mode) {
                log::debug!("log asks for {}", self.registry.runner(id).name());
                self.queue.push(id);
                self.done = false;
            }
            session.clear_bibliography();
        }

        for path in self.tracking.changed_files(&self.container)? {
            let Some(extension) = extension_of(&path) else {
                continue;
            };
            if extension == "tex" {
                continue;
            }
            if let Some(id) = self.runner_for(&extension) {
                log::debug!("{} changed, scheduling {}", path.display(), self.registry.runner(id).name());
                self.queue.append(id);
                self.done = false;
            }
            if trace.is_input(&path) {
                log::debug!("{} is read by LaTeX and changed", path.display());
                self.done = false;
            }
        }

        self.tracking.refresh_snapshots(&self.container)
    }

    /// Called after every auxiliary runner. Tools triggered by its output
    /// run before the next LaTeX pass.
    pub fn check_runner_output(&mut self) -> Result<()> {
        for path in self.tracking.changed_files(&self.container)? {
            let Some(extension) = extension_of(&path) else {
                continue;
            };
            if extension == "tex" {
                continue;
            }
            if let Some(id) = self.runner_for(&extension) {
                log::debug!("{} changed, scheduling {} next", path.display(), self.registry.runner(id).name());
                self.queue.push(id);
                self.done = false;
            }
        }
        self.tracking.refresh_snapshots(&self.container)
    }

    /// `None` means LaTeX runs next, or the cycle is over if
    /// [`is_done`](Self::is_done).
    pub fn next_runner(&mut self) -> Option<RunnerId> {
        self.queue.take_next()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_maxed_out(&self) -> bool {
        self.total_count >= self.total_max
    }

    /// LaTeX must be started with `-recorder` to write the `.fls` file.
    pub fn needs_recorder_flag(&self) -> bool {
        self.config.use_fls
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn queued(&self) -> impl Iterator<Item = RunnerId> + '_ {
        self.queue.iter()
    }

    /// Drops the snapshots once the cycle is over.
    pub fn finish(&mut self) {
        self.tracking.clear_snapshots();
    }

    fn runner_for(&self, extension: &str) -> Option<RunnerId> {
        self.registry.runner_for_extension(extension, self.config.biblatex_mode)
    }

    /// The recorder file when there is one, else the names the log
    /// mentioned.
    fn file_trace(&self, session: &BuildSessionState) -> Result<FileTrace> {
        if self.config.use_fls {
            match FlsAnalyzer::new(self.target.root(), self.target.sibling("fls")).trace() {
                Ok(trace) => return Ok(trace),
                Err(TraceError::NotFound(path)) => {
                    log::warn!("{} was not written, falling back to the log", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }
        let trace = LogTrace::new(
            self.target.root(),
            &self.container,
            session.log_inputs.iter().cloned().collect(),
            session.log_outputs.iter().cloned().collect(),
        )
        .trace()?;
        Ok(trace)
    }
}

/// Last extension, lowercased.
fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    struct Fixture {
        dir: tempfile::TempDir,
        target: BuildTarget,
        registry: RunnerRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("main.tex"), "\\documentclass{article}").unwrap();
            let target = BuildTarget::new(dir.path(), "main.tex");
            let registry = RunnerRegistry::with_defaults(&BuildConfig::default());
            Self { dir, target, registry }
        }

        /// Writes `name` with a timestamp `secs` seconds in the future.
        fn write(&self, name: &str, content: &str, secs: u64) {
            let path = self.dir.path().join(name);
            fs::write(&path, content).unwrap();
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::now() + Duration::from_secs(secs))
                .unwrap();
        }

        fn name(&self, id: Option<RunnerId>) -> Option<&str> {
            id.map(|id| self.registry.runner(id).name())
        }
    }

    fn log_config() -> BuildConfig {
        BuildConfig {
            use_fls: false,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn pass_ceiling_always_terminates() {
        let fixture = Fixture::new();
        let config = BuildConfig {
            max_cycles: 3,
            ..log_config()
        };
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        let mut passes = 0;
        loop {
            passes += 1;
            session.needs_latex_rerun = true;
            detector.check_latex_output(&mut session).unwrap();
            if detector.is_done() {
                break;
            }
            assert!(passes < 10, "detector never finished");
        }
        assert_eq!(passes, 3);
        assert!(detector.is_maxed_out());
    }

    #[test]
    fn quiet_pass_converges() {
        let fixture = Fixture::new();
        let config = log_config();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        fixture.write("main.log", "clean", 60);
        detector.check_latex_output(&mut session).unwrap();
        assert!(detector.is_done());
        assert!(!detector.is_maxed_out());
        assert_eq!(detector.next_runner(), None);
    }

    #[test]
    fn pending_bibliography_is_scheduled_first() {
        let fixture = Fixture::new();
        let config = BuildConfig {
            biblatex_mode: true,
            ..log_config()
        };
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState {
            bib_files_changed: true,
            ..BuildSessionState::default()
        };
        detector.init_file_tracking(&mut session).unwrap();

        assert!(!session.bibliography_pending());
        assert!(!detector.is_done());
        assert_eq!(fixture.name(detector.next_runner()), Some("biber"));
    }

    #[test]
    fn changed_files_schedule_runners_and_passes() {
        let fixture = Fixture::new();
        let config = log_config();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        fixture.write("main.idx", "\\indexentry{a}{1}", 60);
        fixture.write("main.toc", "\\contentsline", 61);
        session.needs_bib_rerun = true;
        session.log_inputs.insert("main.toc".into());
        detector.check_latex_output(&mut session).unwrap();

        assert!(!detector.is_done());
        assert!(!session.needs_bib_rerun);
        let queued: Vec<_> = detector.queued().map(|id| fixture.registry.runner(id).name()).collect();
        assert_eq!(queued, vec!["bibtex", "makeindex"]);
    }

    #[test]
    fn reread_input_alone_forces_another_pass() {
        let fixture = Fixture::new();
        let config = log_config();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        fixture.write("main.aux", "\\relax", 60);
        session.log_inputs.insert("./main.aux".into());
        detector.check_latex_output(&mut session).unwrap();
        assert!(!detector.is_done());
        assert_eq!(detector.next_runner(), None);

        // Same content again: nothing left to do.
        fixture.write("main.aux", "\\relax", 120);
        detector.check_latex_output(&mut session).unwrap();
        assert!(detector.is_done());
    }

    #[test]
    fn runner_output_goes_to_the_front() {
        let fixture = Fixture::new();
        let config = log_config();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        fixture.write("main.idx", "\\indexentry{a}{1}", 60);
        detector.check_latex_output(&mut session).unwrap();
        fixture.write("main.nlo", "\\nomenclentry", 61);
        detector.check_runner_output().unwrap();

        assert_eq!(fixture.name(detector.next_runner()), Some("makeindex-nomencl"));
        assert_eq!(fixture.name(detector.next_runner()), Some("makeindex"));
        assert_eq!(detector.next_runner(), None);
    }

    #[test]
    fn missing_fls_falls_back_to_log_inputs() {
        let fixture = Fixture::new();
        let config = BuildConfig::default();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();
        assert!(detector.needs_recorder_flag());

        fixture.write("main.aux", "\\relax", 60);
        session.log_inputs.insert("./main.aux".into());
        detector.check_latex_output(&mut session).unwrap();
        assert!(!detector.is_done());

        fixture.write("main.aux", "\\relax", 120);
        detector.check_latex_output(&mut session).unwrap();
        assert!(detector.is_done());
    }

    #[test]
    fn ceiling_clears_pending_requests() {
        let fixture = Fixture::new();
        let config = BuildConfig {
            max_cycles: 1,
            ..log_config()
        };
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        session.needs_latex_rerun = true;
        session.needs_bib_rerun = true;
        detector.check_latex_output(&mut session).unwrap();

        assert!(detector.is_maxed_out());
        assert!(!session.needs_latex_rerun);
        assert!(!session.bibliography_pending());
    }

    #[test]
    fn fls_inputs_are_used() {
        let fixture = Fixture::new();
        let config = BuildConfig::default();
        let mut detector = BuildCycleDetector::new(&fixture.registry, &fixture.target, &config);
        let mut session = BuildSessionState::default();
        detector.init_file_tracking(&mut session).unwrap();

        fixture.write("main.fls", "PWD .\nINPUT main.tex\nINPUT main.lof\nOUTPUT main.lof\n", 60);
        fixture.write("main.lof", "\\contentsline", 61);
        detector.check_latex_output(&mut session).unwrap();
        assert!(!detector.is_done());
    }
}
