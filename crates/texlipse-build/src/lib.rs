//! # TeXlipse Build
//!
//! Runs LaTeX and its helper tools until a document has settled.
//!
//! A LaTeX document rarely builds in one pass: cross references, the table
//! of contents, bibliographies and indexes all need the output of an
//! earlier pass. [`Builder`] repeats the engine and schedules the helpers
//! until [`BuildCycleDetector`] finds nothing left to do, or until the
//! configured pass ceiling is reached.
//!
//! ## Architecture
//!
//! ```text
//!            BuildConfig ──► BuildPlan ──► RunnerRegistry
//!                                              │
//!  OutputFileManager::perform_before_build     │
//!            │                                 ▼
//!            └──► Builder ── LaTeX pass ──► ProgramRunner ──► CommandExecutor
//!                    ▲            │              │
//!                    │            ▼              └──► OutputParser ──► MarkerSink
//!                    └──── BuildCycleDetector
//!                          (log flags, .fls trace, ProjectFileTracking)
//!            │
//!  OutputFileManager::perform_after_build ──► ProjectView
//! ```
//!
//! Processes are started through [`CommandExecutor`], which keeps the cycle
//! testable without a TeX installation. Cancellation is cooperative through
//! a [`CancellationToken`].

pub mod builder;
pub mod cancel;
pub mod config;
pub mod detector;
pub mod error;
pub mod format;
pub mod markers;
pub mod output;
pub mod parsers;
pub mod plan;
pub mod process;
pub mod queue;
pub mod registry;
pub mod runner;
pub mod session;
pub mod tracking;

pub use builder::{BUILD_ORIGIN, BuildOutcome, Builder};
pub use cancel::CancellationToken;
pub use config::{BuildConfig, CONFIG_FILE, ProgramConfig};
pub use detector::BuildCycleDetector;
pub use error::{BuildError, Result, RunnerError};
pub use format::Format;
pub use markers::{MarkerSink, MarkerStore};
pub use output::{LogProjectView, NullProjectView, OutputFileManager, ProjectView};
pub use plan::{BuildPlan, PlanStep};
pub use process::{
    CommandExecutor, Console, DeclinePrompts, ExecutionContext, Invocation, LogConsole, NullConsole,
    ProcessOutput, PromptHandler, RealCommandExecutor,
};
pub use queue::BuildQueue;
pub use registry::{RunnerId, RunnerRegistry};
pub use runner::{BuildTarget, OutputParser, ProgramRunner, RunContext, RunnerDescriptor, RunnerState};
pub use session::BuildSessionState;
pub use tracking::ProjectFileTracking;
