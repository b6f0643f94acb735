use crate::cancel::CancellationToken;
use crate::config::BuildConfig;
use crate::detector::BuildCycleDetector;
use crate::error::{BuildError, Result, RunnerError};
use crate::markers::MarkerSink;
use crate::output::{OutputFileManager, ProjectView};
use crate::plan::BuildPlan;
use crate::process::{CommandExecutor, Console, DeclinePrompts, LogConsole, NullConsole, PromptHandler};
use crate::registry::{RunnerId, RunnerRegistry};
use crate::runner::{BuildTarget, RunContext};
use crate::session::BuildSessionState;
use std::collections::BTreeMap;
use std::path::Path;
use texlipse_log::{Diagnostic, Severity};

/// Marker origin for problems of the build as a whole.
pub const BUILD_ORIGIN: &str = "build";

const RECORDER_FLAG: &str = "-recorder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// All passes ran. `errors` counts the document errors the last run
    /// of each tool reported.
    Completed { passes: usize, errors: usize },
    /// Cancelled through the builder's token.
    Stopped,
}

/// Runs one document through its tool chain.
///
/// The session state survives between calls to [`build`](Self::build), so
/// a bibliography rerun requested at the end of one build is honoured at
/// the start of the next.
pub struct Builder<'a> {
    registry: &'a RunnerRegistry,
    executor: &'a dyn CommandExecutor,
    config: &'a BuildConfig,
    target: BuildTarget,
    session: BuildSessionState,
    cancel: CancellationToken,
    console: Box<dyn Console>,
    prompts: Box<dyn PromptHandler>,
}

impl<'a> Builder<'a> {
    pub fn new(
        registry: &'a RunnerRegistry,
        executor: &'a dyn CommandExecutor,
        config: &'a BuildConfig,
        root: &Path,
    ) -> Self {
        let console: Box<dyn Console> = if config.echo_console {
            Box::new(LogConsole::default())
        } else {
            Box::new(NullConsole)
        };
        Self {
            registry,
            executor,
            config,
            target: BuildTarget::new(root, &config.main_file),
            session: BuildSessionState::default(),
            cancel: CancellationToken::new(),
            console,
            prompts: Box::new(DeclinePrompts),
        }
    }

    pub fn with_console(mut self, console: Box<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_prompts(mut self, prompts: Box<dyn PromptHandler>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_session(mut self, session: BuildSessionState) -> Self {
        self.session = session;
        self
    }

    /// A handle that stops the build from another thread. Once cancelled
    /// the builder stays cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &BuildSessionState {
        &self.session
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// Builds the document, delivering tool diagnostics to `markers`.
    pub fn build(&mut self, markers: &mut dyn MarkerSink, view: &mut dyn ProjectView) -> Result<BuildOutcome> {
        markers.clear(BUILD_ORIGIN);
        self.config.validate()?;
        let plan = BuildPlan::for_format(self.config.output_format, self.config.builder_index)?;
        plan.validate()?;
        let chain = plan.resolve(self.registry)?;
        let Some((&latex, converters)) = chain.split_first() else {
            return Err(BuildError::Config("empty tool chain".into()));
        };
        for id in &chain {
            self.registry
                .runner(*id)
                .validate()
                .map_err(|e| BuildError::Config(e.to_string()))?;
        }
        let source = self.target.root().join(self.target.source());
        if !source.is_file() {
            return Err(BuildError::Config(format!("main file {} does not exist", source.display())));
        }
        log::info!("building {} with {}", self.target.source().display(), plan.describe(self.registry));

        let config = self.config;
        let target = self.target.clone();
        let mut output = OutputFileManager::new(config, &target);
        output.perform_before_build()?;
        if output.bibliography_outdated()? {
            log::debug!("bibliography database changed since the last build");
            self.session.bib_files_changed = true;
        }

        let mut errors = BTreeMap::new();
        let passes = if config.build_cycle {
            self.run_cycle(latex, markers, &mut errors)?
        } else {
            self.run_runner(latex, &[], markers, &mut errors)?.then_some(1)
        };
        let Some(passes) = passes else {
            return Ok(BuildOutcome::Stopped);
        };

        for id in converters {
            if self.cancel.is_cancelled() || !self.run_runner(*id, &[], markers, &mut errors)? {
                return Ok(BuildOutcome::Stopped);
            }
        }

        output.perform_after_build(view)?;
        let errors: usize = errors.values().sum();
        log::info!("build finished after {passes} pass(es) with {errors} error(s)");
        Ok(BuildOutcome::Completed { passes, errors })
    }

    /// Repeats LaTeX and the auxiliary tools until the detector is done.
    /// `None` means the build was stopped.
    fn run_cycle(
        &mut self,
        latex: RunnerId,
        markers: &mut dyn MarkerSink,
        errors: &mut BTreeMap<String, usize>,
    ) -> Result<Option<usize>> {
        let registry = self.registry;
        let config = self.config;
        let target = self.target.clone();
        let mut detector = BuildCycleDetector::new(registry, &target, config);
        detector.init_file_tracking(&mut self.session)?;
        let extra_args = if detector.needs_recorder_flag() {
            vec![RECORDER_FLAG.to_string()]
        } else {
            Vec::new()
        };

        loop {
            if self.cancel.is_cancelled() || !self.run_runner(latex, &extra_args, markers, errors)? {
                return Ok(None);
            }
            detector.check_latex_output(&mut self.session)?;

            while let Some(id) = detector.next_runner() {
                let runner = registry.runner(id);
                if let Err(e) = runner.validate() {
                    if config.halt_on_invalid_runner {
                        return Err(BuildError::Config(e.to_string()));
                    }
                    log::warn!("skipping {}: {e}", runner.name());
                    continue;
                }
                if self.cancel.is_cancelled() || !self.run_runner(id, &[], markers, errors)? {
                    return Ok(None);
                }
                detector.check_runner_output()?;
            }

            if detector.is_done() || detector.is_maxed_out() {
                break;
            }
        }

        if detector.is_maxed_out() && config.show_max_reached_error {
            let message = format!(
                "LaTeX ran {} times and the document may still be incomplete; increase max_cycles",
                detector.total_count()
            );
            markers.add(
                BUILD_ORIGIN,
                Diagnostic::new(Severity::Error, message).with_file(Some(target.source().display().to_string())),
            );
        }
        detector.finish();
        Ok(Some(detector.total_count()))
    }

    /// Runs one tool. Document errors are recorded and the build goes on;
    /// `false` means the run was stopped.
    fn run_runner(
        &mut self,
        id: RunnerId,
        extra_args: &[String],
        markers: &mut dyn MarkerSink,
        errors: &mut BTreeMap<String, usize>,
    ) -> Result<bool> {
        let registry = self.registry;
        let runner = registry.runner(id);
        let mut ctx = RunContext {
            executor: self.executor,
            console: self.console.as_mut(),
            prompts: self.prompts.as_ref(),
            cancel: &self.cancel,
            session: &mut self.session,
            markers,
        };
        match runner.run(&self.target, extra_args, &mut ctx) {
            Ok(()) => {
                errors.insert(runner.name().to_string(), 0);
                Ok(true)
            }
            Err(RunnerError::Document { runner, count }) => {
                log::warn!("{runner} reported {count} error(s)");
                errors.insert(runner, count);
                Ok(true)
            }
            Err(RunnerError::Stopped(name)) => {
                log::info!("{name} stopped");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
