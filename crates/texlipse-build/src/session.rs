use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Signals carried between passes of one build and from one build to the
/// next.
///
/// The LaTeX output parser writes the rerun flags and the file names it saw
/// in the log; the cycle detector consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSessionState {
    pub needs_latex_rerun: bool,
    pub needs_bib_rerun: bool,
    /// A `.bib` file is newer than the bibliography built from it.
    pub bib_files_changed: bool,
    /// Files the last LaTeX log says were read.
    #[serde(default)]
    pub log_inputs: BTreeSet<String>,
    /// Files the last LaTeX log says were written.
    #[serde(default)]
    pub log_outputs: BTreeSet<String>,
}

impl BuildSessionState {
    /// True if the bibliography tool should run before anything else.
    pub fn bibliography_pending(&self) -> bool {
        self.needs_bib_rerun || self.bib_files_changed
    }

    pub fn clear_bibliography(&mut self) {
        self.needs_bib_rerun = false;
        self.bib_files_changed = false;
    }
}
