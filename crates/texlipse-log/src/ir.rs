use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// How serious a reported problem is.
///
/// `Layout` covers over/underfull boxes. It is reported separately from
/// warnings and never influences rerun decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Layout,
}

/// A problem found in tool output, ready to become an editor marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// File the problem was attributed to, as the tool named it.
    /// `None` means the document being built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }
}

/// Receiver for diagnostics produced while parsing tool output.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Files one LaTeX pass read and wrote.
///
/// Paths inside the project are stored relative to the project root.
/// Anything else keeps the name the tool reported and lands in the
/// `external_*` sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTrace {
    pub inputs: BTreeSet<PathBuf>,
    pub outputs: BTreeSet<PathBuf>,
    pub external_inputs: BTreeSet<String>,
    pub external_outputs: BTreeSet<String>,
}

impl FileTrace {
    pub fn is_input(&self, path: &std::path::Path) -> bool {
        self.inputs.contains(path)
    }

    /// Names of the packages (`.sty`) and classes (`.cls`) that were read,
    /// wherever they came from.
    pub fn used_packages(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut packages = BTreeSet::new();
        let mut classes = BTreeSet::new();
        let names = self
            .inputs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .chain(self.external_inputs.iter().cloned());
        for name in names {
            let file = name.rsplit(['/', '\\']).next().unwrap_or(&name);
            if let Some(stem) = file.strip_suffix(".sty") {
                packages.insert(stem.to_string());
            } else if let Some(stem) = file.strip_suffix(".cls") {
                classes.insert(stem.to_string());
            }
        }
        (packages, classes)
    }
}
