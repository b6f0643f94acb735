//! # TeXlipse Log Analysis
//!
//! Readers for what a LaTeX pass leaves behind: the transcript (`*.log`) and
//! the recorder file list (`*.fls`).
//!
//! ## Overview
//!
//! The build cycle asks three questions after every LaTeX pass:
//!
//! - **What went wrong?** Errors, warnings and box problems, attributed to
//!   the file and line they came from.
//! - **Is another pass needed?** Either LaTeX itself (labels changed, missing
//!   `.toc`) or the bibliography tool (missing `.bbl`, undefined citations).
//! - **Which files were involved?** Needed to decide whether a changed file
//!   could influence the next pass.
//!
//! [`LatexLogAnalyzer`] answers the first two and gives a best-effort answer
//! to the third. [`FlsAnalyzer`] answers the third exactly when the engine
//! was run with `-recorder`.
//!
//! ## Architecture
//!
//! ```text
//! main.log ──► lines::logical_lines ──► LatexLogAnalyzer ──► DiagnosticSink
//!                                              │
//!                                              ├── rerun flags
//!                                              └── LogTrace ─┐
//!                                                            ├──► FileTrace
//! main.fls ─────────────────────────────► FlsAnalyzer ───────┘
//! ```
//!
//! Both trace readers implement [`TraceSource`] and share a
//! [`PathResolver`], which maps names onto project-relative paths and sets
//! aside anything outside the project.
//!
//! ## Examples
//!
//! ```
//! use texlipse_log::{LatexLogAnalyzer, Severity};
//!
//! let log = "(./main.tex\n! Undefined control sequence.\nl.5 \\foo\n)\n";
//! let mut analyzer = LatexLogAnalyzer::new();
//! let diagnostics = analyzer.parse(log);
//!
//! assert_eq!(diagnostics[0].severity, Severity::Error);
//! assert_eq!(diagnostics[0].file.as_deref(), Some("main.tex"));
//! assert_eq!(diagnostics[0].line, Some(5));
//! assert!(!analyzer.needs_latex_rerun());
//! ```
//!
//! Diagnostics serialize with `serde`, which is how the command line tool
//! prints them:
//!
//! ```no_run
//! use texlipse_log::LatexLogAnalyzer;
//! use std::fs;
//!
//! let log = fs::read_to_string("main.log")?;
//! let diagnostics = LatexLogAnalyzer::new().parse(&log);
//! println!("{}", serde_json::to_string_pretty(&diagnostics)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Transcript analysis: diagnostics, rerun flags and traced file names.
pub mod analyzer;
mod filenames;
/// Recorder (`.fls`) file list reader.
pub mod fls;
/// Diagnostic and file trace types.
pub mod ir;
pub mod lines;
/// Resolving traced names against the project.
pub mod trace;


pub use analyzer::LatexLogAnalyzer;
pub use fls::FlsAnalyzer;
pub use ir::{Diagnostic, DiagnosticSink, FileTrace, Severity};
pub use trace::{LogTrace, PathResolver, Resolved, TraceError, TraceSource};

/// Version of the JSON produced from [`Diagnostic`] and [`FileTrace`].
///
/// Bumped on a breaking change to field names or meaning.
pub const SCHEMA_VERSION: &str = "1.0.0";
