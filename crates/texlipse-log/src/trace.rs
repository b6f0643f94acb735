//! Two ways to learn which files a LaTeX pass touched.
//!
//! [`LogTrace`] reuses the names the log analyzer spotted in the transcript,
//! [`FlsAnalyzer`](crate::fls::FlsAnalyzer) reads the `-recorder` file list.
//! Both resolve names with the same [`PathResolver`] and produce a
//! [`FileTrace`], so the build cycle can switch between them with a flag.

use crate::analyzer::LatexLogAnalyzer;
use crate::ir::FileTrace;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("file trace {0} does not exist")]
    NotFound(PathBuf),
    #[error("cannot read file trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A source of [`FileTrace`]s for the pass that just finished.
pub trait TraceSource {
    fn trace(&self) -> Result<FileTrace, TraceError>;
}

/// Where a traced name ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Inside the project, relative to its root.
    Project(PathBuf),
    /// Outside the project; the name as the tool wrote it.
    External(String),
}

/// Maps names written by TeX onto project-relative paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: Vec<String>,
}

impl PathResolver {
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: plain_components(project_root).unwrap_or_default(),
        }
    }

    /// Turns a working directory reported by TeX into a project-relative
    /// one. `None` means the directory lies outside the project.
    pub fn working_dir(&self, dir: &Path) -> Option<PathBuf> {
        if dir.has_root() {
            let parts = plain_components(dir)?;
            parts
                .strip_prefix(self.root.as_slice())
                .map(|rest| rest.iter().collect())
        } else {
            normalize(dir)
        }
    }

    /// Resolves `name` as seen from `working_dir` (project-relative, or
    /// `None` when outside the project).
    ///
    /// Absolute names are matched against the project root with any drive
    /// prefix ignored. Relative names starting with `..` are treated as
    /// leaving the project.
    pub fn resolve(&self, working_dir: Option<&Path>, name: &str) -> Resolved {
        let path = Path::new(name);
        if path.has_root() {
            return match self.working_dir(path) {
                Some(relative) if relative.as_os_str().is_empty() => Resolved::External(name.to_string()),
                Some(relative) => Resolved::Project(relative),
                None => Resolved::External(name.to_string()),
            };
        }

        if matches!(path.components().next(), Some(Component::ParentDir)) {
            return Resolved::External(name.to_string());
        }
        match working_dir.and_then(|dir| normalize(&dir.join(path))) {
            Some(relative) if !relative.as_os_str().is_empty() => Resolved::Project(relative),
            _ => Resolved::External(name.to_string()),
        }
    }
}

/// Components of an absolute path with any root or drive prefix dropped.
fn plain_components(path: &Path) -> Option<Vec<String>> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    Some(parts)
}

/// Lexically normalises a relative path. `None` if it climbs above its start.
fn normalize(path: &Path) -> Option<PathBuf> {
    plain_components(path).map(|parts| parts.iter().collect())
}

/// File trace built from the names a [`LatexLogAnalyzer`] found in the log.
#[derive(Debug, Clone)]
pub struct LogTrace {
    resolver: PathResolver,
    working_dir: PathBuf,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl LogTrace {
    /// `working_dir` is the project-relative directory LaTeX ran in.
    pub fn new(project_root: &Path, working_dir: &Path, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self {
            resolver: PathResolver::new(project_root),
            working_dir: working_dir.to_path_buf(),
            inputs,
            outputs,
        }
    }

    pub fn from_analyzer(project_root: &Path, working_dir: &Path, analyzer: &LatexLogAnalyzer) -> Self {
        Self::new(
            project_root,
            working_dir,
            analyzer.input_files().iter().cloned().collect(),
            analyzer.output_files().iter().cloned().collect(),
        )
    }
}

impl TraceSource for LogTrace {
    fn trace(&self) -> Result<FileTrace, TraceError> {
        let mut trace = FileTrace::default();
        let cwd = Some(self.working_dir.as_path());
        for name in &self.inputs {
            match self.resolver.resolve(cwd, name) {
                Resolved::Project(path) => {
                    trace.inputs.insert(path);
                }
                Resolved::External(name) => {
                    trace.external_inputs.insert(name);
                }
            }
        }
        for name in &self.outputs {
            match self.resolver.resolve(cwd, name) {
                Resolved::Project(path) => {
                    trace.outputs.insert(path);
                }
                Resolved::External(name) => {
                    trace.external_outputs.insert(name);
                }
            }
        }
        Ok(trace)
    }
}
