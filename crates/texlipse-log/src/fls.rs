use crate::ir::FileTrace;
use crate::trace::{PathResolver, Resolved, TraceError, TraceSource};
use std::fs;
use std::path::{Path, PathBuf};

/// Reader for the `.fls` file list written by `latex -recorder`.
///
/// The format is one record per line:
///
/// ```text
/// PWD /home/user/thesis
/// INPUT /usr/share/texmf-dist/tex/latex/base/article.cls
/// INPUT ./main.aux
/// OUTPUT main.log
/// ```
///
/// `PWD` changes the directory relative names are resolved against. Names
/// are not escaped, so everything after the keyword and one space is the
/// name.
#[derive(Debug, Clone)]
pub struct FlsAnalyzer {
    fls_path: PathBuf,
    resolver: PathResolver,
}

impl FlsAnalyzer {
    pub fn new(project_root: &Path, fls_path: impl Into<PathBuf>) -> Self {
        Self {
            fls_path: fls_path.into(),
            resolver: PathResolver::new(project_root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.fls_path
    }

    /// Reads and parses the trace file.
    pub fn parse(&self) -> Result<FileTrace, TraceError> {
        if !self.fls_path.is_file() {
            return Err(TraceError::NotFound(self.fls_path.clone()));
        }
        let bytes = fs::read(&self.fls_path).map_err(|source| TraceError::Io {
            path: self.fls_path.clone(),
            source,
        })?;
        Ok(self.parse_str(&String::from_utf8_lossy(&bytes)))
    }

    /// Parses trace records that are already in memory.
    pub fn parse_str(&self, content: &str) -> FileTrace {
        let mut trace = FileTrace::default();
        // Until the first PWD record names are taken relative to the project root.
        let mut working_dir: Option<PathBuf> = Some(PathBuf::new());

        for line in content.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(dir) = line.strip_prefix("PWD ") {
                working_dir = self.resolver.working_dir(Path::new(dir));
                if working_dir.is_none() {
                    log::debug!("working directory {dir} is outside the project");
                }
            } else if let Some(name) = line.strip_prefix("INPUT ") {
                match self.resolver.resolve(working_dir.as_deref(), name) {
                    Resolved::Project(path) => {
                        trace.inputs.insert(path);
                    }
                    Resolved::External(name) => {
                        trace.external_inputs.insert(name);
                    }
                }
            } else if let Some(name) = line.strip_prefix("OUTPUT ") {
                match self.resolver.resolve(working_dir.as_deref(), name) {
                    Resolved::Project(path) => {
                        trace.outputs.insert(path);
                    }
                    Resolved::External(name) => {
                        trace.external_outputs.insert(name);
                    }
                }
            }
        }
        trace
    }
}

impl TraceSource for FlsAnalyzer {
    fn trace(&self) -> Result<FileTrace, TraceError> {
        self.parse()
    }
}
