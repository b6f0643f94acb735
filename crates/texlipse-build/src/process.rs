//! Running external tools.
//!
//! Tools are started through the [`CommandExecutor`] trait so that build
//! cycles can be exercised without a TeX installation.
//!
//! - **Production**: [`RealCommandExecutor`] spawns the process, drains
//!   stdout and stderr on two reader threads and watches a
//!   [`CancellationToken`] while it waits.
//! - **Testing**: `MockCommandExecutor` replays canned output and writes the
//!   files a tool would have written.

use crate::cancel::CancellationToken;
use crate::error::RunnerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often a waiting build looks at its cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One fully resolved tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Output fragments meaning the tool waits for a line on stdin.
    pub prompts: Vec<String>,
}

impl Invocation {
    /// Short name for messages: the program's file stem.
    pub fn name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// What a finished process printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Where tool output is echoed while it runs.
pub trait Console: Send {
    fn echo(&mut self, text: &str);
}

/// Discards tool output.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn echo(&mut self, _text: &str) {}
}

/// Echoes tool output through the `log` facade, one record per line.
#[derive(Debug, Default)]
pub struct LogConsole {
    partial: String,
}

impl Console for LogConsole {
    fn echo(&mut self, text: &str) {
        self.partial.push_str(text);
        while let Some(end) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=end).collect();
            log::info!(target: "texlipse::console", "{}", line.trim_end());
        }
    }
}

/// Supplies the line a tool asks for when it stops at a prompt.
pub trait PromptHandler: Send + Sync {
    /// `None` closes stdin, which makes TeX-family tools give up.
    fn reply(&self, prompt: &str) -> Option<String>;
}

/// Answers no prompt.
#[derive(Debug, Default)]
pub struct DeclinePrompts;

impl PromptHandler for DeclinePrompts {
    fn reply(&self, _prompt: &str) -> Option<String> {
        None
    }
}

/// Everything an executor needs besides the command itself.
pub struct ExecutionContext<'a> {
    pub console: &'a mut dyn Console,
    pub prompts: &'a dyn PromptHandler,
    pub cancel: &'a CancellationToken,
}

/// Trait for executing external tools.
/// This allows us to replace real processes in tests.
pub trait CommandExecutor: Send + Sync + fmt::Debug {
    /// Runs `invocation` to completion.
    ///
    /// Fails with [`RunnerError::Stopped`] if the cancellation token fires
    /// before or during the run, and with [`RunnerError::Launch`] if the
    /// process cannot be started.
    fn execute(
        &self,
        invocation: &Invocation,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ProcessOutput, RunnerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Default implementation of [`CommandExecutor`] using `std::process::Command`.
#[derive(Debug, Default)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        invocation: &Invocation,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ProcessOutput, RunnerError> {
        let name = invocation.name();
        if ctx.cancel.is_cancelled() {
            return Err(RunnerError::Stopped(name));
        }

        let launch_error = |source| RunnerError::Launch {
            program: invocation.program.clone(),
            source,
        };
        let stdin = if invocation.prompts.is_empty() {
            Stdio::null()
        } else {
            Stdio::piped()
        };
        log::debug!("running {} {:?}", invocation.program.display(), invocation.args);
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut stdin = child.stdin.take();
        let drained = drain(&rx, invocation, ctx, &mut stdin);
        drop(stdin);

        let (stdout, stderr) = match drained {
            Ok(collected) => collected,
            Err(()) => {
                log::info!("stopping {name}");
                let _ = child.kill();
                let _ = child.wait();
                // Readers finish on their own once the pipes close.
                return Err(RunnerError::Stopped(name));
            }
        };
        join_readers(readers);

        let status = child.wait().map_err(launch_error)?;
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn spawn_reader(
    mut source: impl Read + Send + 'static,
    stream: Stream,
    tx: Sender<(Stream, Vec<u8>)>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("reader for {stream:?} stopped: {e}");
                    break;
                }
            }
        }
    })
}

fn join_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        if reader.join().is_err() {
            log::warn!("output reader thread panicked");
        }
    }
}

/// Collects output until both streams close. `Err` means cancelled.
fn drain(
    rx: &Receiver<(Stream, Vec<u8>)>,
    invocation: &Invocation,
    ctx: &mut ExecutionContext<'_>,
    stdin: &mut Option<ChildStdin>,
) -> Result<(Vec<u8>, Vec<u8>), ()> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    // Text since the last newline, where a prompt would appear.
    let mut tail = String::new();

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(());
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((stream, bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                ctx.console.echo(&text);
                match stream {
                    Stream::Stdout => stdout.extend_from_slice(&bytes),
                    Stream::Stderr => stderr.extend_from_slice(&bytes),
                }
                if stdin.is_some() {
                    tail.push_str(&text);
                    answer_prompt(&mut tail, invocation, ctx.prompts, stdin);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok((stdout, stderr)),
        }
    }
}

fn answer_prompt(
    tail: &mut String,
    invocation: &Invocation,
    handler: &dyn PromptHandler,
    stdin: &mut Option<ChildStdin>,
) {
    let Some(prompt) = invocation.prompts.iter().find(|p| tail.contains(p.as_str())) else {
        if let Some(end) = tail.rfind('\n') {
            tail.drain(..=end);
        }
        return;
    };
    tail.clear();

    match handler.reply(prompt) {
        Some(line) => {
            log::debug!("answering prompt '{prompt}' with '{line}'");
            let written = stdin.as_mut().map(|pipe| {
                pipe.write_all(line.as_bytes())
                    .and_then(|_| pipe.write_all(b"\n"))
                    .and_then(|_| pipe.flush())
            });
            if let Some(Err(e)) = written {
                log::warn!("cannot answer prompt '{prompt}': {e}");
                *stdin = None;
            }
        }
        None => {
            log::debug!("declining prompt '{prompt}'");
            *stdin = None;
        }
    }
}

#[cfg(test)]
pub(crate) use mock::{MockCommandExecutor, MockRun};
