use crate::cancel::CancellationToken;
use crate::error::RunnerError;
use crate::format::Format;
use crate::markers::MarkerSink;
use crate::process::{CommandExecutor, Console, ExecutionContext, Invocation, ProcessOutput, PromptHandler};
use crate::session::BuildSessionState;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%(fullinput|fulloutput|input|output|base)").unwrap());

/// The document a build works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    root: PathBuf,
    source: PathBuf,
}

impl BuildTarget {
    /// `source` is the main file relative to the project `root`.
    pub fn new(root: impl Into<PathBuf>, source: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: source.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Directory of the main file, relative to the project root.
    pub fn relative_dir(&self) -> PathBuf {
        self.source.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Directory tools run in.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(self.relative_dir())
    }

    pub fn base_name(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<base>.<extension>` next to the main file, relative to the root.
    pub fn relative_sibling(&self, extension: &str) -> PathBuf {
        self.relative_dir().join(format!("{}.{}", self.base_name(), extension))
    }

    /// `<base>.<extension>` next to the main file.
    pub fn sibling(&self, extension: &str) -> PathBuf {
        self.root.join(self.relative_sibling(extension))
    }
}

/// A runner's place in the format conversion graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunnerDescriptor {
    pub input: Format,
    pub output: Format,
}

impl fmt::Display for RunnerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Turns what a tool printed into markers and session signals.
pub trait OutputParser: Send + Sync + fmt::Debug {
    /// Returns the number of errors found.
    fn parse(
        &self,
        origin: &str,
        target: &BuildTarget,
        output: &ProcessOutput,
        session: &mut BuildSessionState,
        markers: &mut dyn MarkerSink,
    ) -> usize;
}

/// Collaborators of a single run.
pub struct RunContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub console: &'a mut dyn Console,
    pub prompts: &'a dyn PromptHandler,
    pub cancel: &'a CancellationToken,
    pub session: &'a mut BuildSessionState,
    pub markers: &'a mut dyn MarkerSink,
}

/// Wrapper around one external tool.
///
/// The argument template may contain `%input`, `%output`, `%fullinput`,
/// `%fulloutput` and `%base`. Input and output names are the target's base
/// name with the extension of the runner's formats; for LaTeX runners the
/// input is the main file itself.
#[derive(Debug)]
pub struct ProgramRunner {
    name: String,
    descriptor: RunnerDescriptor,
    program: PathBuf,
    arguments: String,
    parser: Box<dyn OutputParser>,
    trigger_extensions: Vec<String>,
    prompts: Vec<String>,
    state: Mutex<RunnerState>,
    active: Mutex<Option<CancellationToken>>,
}

impl ProgramRunner {
    pub fn new(
        name: &str,
        descriptor: RunnerDescriptor,
        program: impl Into<PathBuf>,
        arguments: &str,
        parser: Box<dyn OutputParser>,
    ) -> Self {
        Self {
            name: name.to_string(),
            descriptor,
            program: program.into(),
            arguments: arguments.to_string(),
            parser,
            trigger_extensions: Vec::new(),
            prompts: Vec::new(),
            state: Mutex::new(RunnerState::Idle),
            active: Mutex::new(None),
        }
    }

    /// Extra file extensions whose change schedules this runner.
    pub fn with_triggers(mut self, extensions: &[&str]) -> Self {
        self.trigger_extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_prompts(mut self, prompts: &[&str]) -> Self {
        self.prompts = prompts.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> RunnerDescriptor {
        self.descriptor
    }

    pub fn input_format(&self) -> Format {
        self.descriptor.input
    }

    pub fn output_format(&self) -> Format {
        self.descriptor.output
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn state(&self) -> RunnerState {
        *lock(&self.state)
    }

    /// Whether a changed file with `extension` calls for this runner.
    pub fn handles_extension(&self, extension: &str) -> bool {
        self.descriptor.input.extension() == extension
            || self.trigger_extensions.iter().any(|e| e == extension)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Checks that the configured program is an existing file. Settings can
    /// change between builds, so this is asked again before every run.
    pub fn validate(&self) -> Result<(), RunnerError> {
        let reason = if !self.program.exists() {
            format!("{} does not exist", self.program.display())
        } else if !self.program.is_file() {
            format!("{} is not a file", self.program.display())
        } else {
            return Ok(());
        };
        Err(RunnerError::Invalid {
            runner: self.name.clone(),
            reason,
        })
    }

    /// The argument template with placeholders filled in for `target`.
    pub fn arguments_for(&self, target: &BuildTarget) -> Vec<String> {
        let base = target.base_name();
        let input = if self.descriptor.input == Format::Tex {
            target.file_name()
        } else {
            format!("{base}.{}", self.descriptor.input.extension())
        };
        let output = format!("{base}.{}", self.descriptor.output.extension());
        let dir = target.source_dir();

        split_arguments(&self.arguments)
            .into_iter()
            .map(|arg| {
                PLACEHOLDER
                    .replace_all(&arg, |caps: &Captures<'_>| match &caps[1] {
                        "fullinput" => dir.join(&input).display().to_string(),
                        "fulloutput" => dir.join(&output).display().to_string(),
                        "input" => input.clone(),
                        "output" => output.clone(),
                        _ => base.clone(),
                    })
                    .into_owned()
            })
            .collect()
    }

    pub fn invocation(&self, target: &BuildTarget, extra_args: &[String]) -> Invocation {
        let mut args = extra_args.to_vec();
        args.extend(self.arguments_for(target));
        Invocation {
            program: self.program.clone(),
            args,
            working_dir: target.source_dir(),
            prompts: self.prompts.clone(),
        }
    }

    /// Runs the tool on `target` and reports what it printed.
    ///
    /// `extra_args` go before the templated arguments. Problems the tool
    /// reported in the document fail with [`RunnerError::Document`] after
    /// the markers have been delivered.
    pub fn run(
        &self,
        target: &BuildTarget,
        extra_args: &[String],
        ctx: &mut RunContext<'_>,
    ) -> Result<(), RunnerError> {
        let token = ctx.cancel.child();
        *lock(&self.state) = RunnerState::Running;
        *lock(&self.active) = Some(token.clone());

        let invocation = self.invocation(target, extra_args);
        log::info!("{}: {} {}", self.name, invocation.program.display(), invocation.args.join(" "));
        let result = {
            let mut exec = ExecutionContext {
                console: &mut *ctx.console,
                prompts: ctx.prompts,
                cancel: &token,
            };
            ctx.executor.execute(&invocation, &mut exec)
        };
        *lock(&self.active) = None;

        let output = match result {
            Ok(_) if token.is_cancelled() => {
                return self.finish(Err(RunnerError::Stopped(self.name.clone())));
            }
            Ok(output) => output,
            Err(e) => return self.finish(Err(e)),
        };
        if output.exit_code != Some(0) {
            log::debug!("{} exited with {:?}", self.name, output.exit_code);
        }

        ctx.markers.clear(&self.name);
        let errors = self
            .parser
            .parse(&self.name, target, &output, ctx.session, ctx.markers);
        if errors > 0 {
            return self.finish(Err(RunnerError::Document {
                runner: self.name.clone(),
                count: errors,
            }));
        }
        self.finish(Ok(()))
    }

    /// Terminates a run in progress. Does nothing when idle.
    pub fn stop(&self) {
        if let Some(token) = lock(&self.active).as_ref() {
            log::info!("stop requested for {}", self.name);
            token.cancel();
        }
    }

    fn finish(&self, result: Result<(), RunnerError>) -> Result<(), RunnerError> {
        let state = match &result {
            Ok(()) => RunnerState::Completed,
            Err(RunnerError::Stopped(_)) => RunnerState::Stopped,
            Err(_) => RunnerState::Failed,
        };
        *lock(&self.state) = state;
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Splits an argument template at whitespace. Double quotes group words.
fn split_arguments(template: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for c in template.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}
