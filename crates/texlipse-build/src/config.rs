use crate::error::{BuildError, Result};
use crate::format::Format;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = ".texlipse.json";

/// Per-runner overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Executable to use instead of the one found on `PATH`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Argument template replacing the runner's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Project build settings.
///
/// Every field has a default so that a partial `.texlipse.json` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Main document, relative to the project root.
    pub main_file: PathBuf,
    pub output_format: Format,
    /// Which of the alternative tool chains for `output_format` to use.
    pub builder_index: usize,
    /// Run LaTeX and auxiliary tools until nothing changes, instead of once.
    pub build_cycle: bool,
    /// Ceiling on LaTeX passes per build.
    pub max_cycles: usize,
    /// Read the `-recorder` file list instead of guessing from the log.
    pub use_fls: bool,
    pub temp_extensions: Vec<String>,
    /// Extensions of files that travel with the final output.
    pub derived_extensions: Vec<String>,
    /// Directory the final output is moved to. `None` leaves it in place.
    pub output_dir: Option<PathBuf>,
    /// Directory temporary files are moved to between builds.
    pub temp_dir: Option<PathBuf>,
    /// Explicit project-relative name for the final output.
    pub output_file: Option<PathBuf>,
    /// Abort instead of skipping an auxiliary runner that is not installed.
    pub halt_on_invalid_runner: bool,
    /// Report an error marker when the pass ceiling is reached.
    pub show_max_reached_error: bool,
    /// Use biber instead of bibtex.
    pub biblatex_mode: bool,
    /// Echo tool output to the log.
    pub echo_console: bool,
    /// Overrides keyed by runner name.
    pub programs: BTreeMap<String, ProgramConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            main_file: PathBuf::from("main.tex"),
            output_format: Format::Pdf,
            builder_index: 0,
            build_cycle: true,
            max_cycles: 6,
            use_fls: true,
            temp_extensions: [
                "aux", "log", "bbl", "blg", "bcf", "run.xml", "idx", "ilg", "ind", "nlo", "nls",
                "toc", "lof", "lot", "out", "nav", "snm", "fls", "dvi", "ps",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            derived_extensions: vec!["synctex.gz".to_string()],
            output_dir: None,
            temp_dir: Some(PathBuf::from("tmp")),
            output_file: None,
            halt_on_invalid_runner: false,
            show_max_reached_error: true,
            biblatex_mode: false,
            echo_console: false,
            programs: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BuildError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads `.texlipse.json` from `root`, or the defaults if there is none.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            log::debug!("no {} in {}, using defaults", CONFIG_FILE, root.display());
            Ok(Self::default())
        }
    }

    /// Checks the settings that must hold before any tool is started.
    pub fn validate(&self) -> Result<()> {
        if self.main_file.as_os_str().is_empty() {
            return Err(BuildError::Config("no main file configured".into()));
        }
        if self.main_file.is_absolute() {
            return Err(BuildError::Config(format!(
                "main file {} must be relative to the project root",
                self.main_file.display()
            )));
        }
        if !self.output_format.is_output() {
            return Err(BuildError::Config(format!(
                "{} is not an output format",
                self.output_format
            )));
        }
        if self.max_cycles == 0 {
            return Err(BuildError::Config("max_cycles must be at least 1".into()));
        }
        Ok(())
    }

    pub fn program(&self, runner: &str) -> Option<&ProgramConfig> {
        self.programs.get(runner)
    }

    /// Whether `name` ends in one of the temporary file extensions.
    pub fn is_temp_file(&self, name: &str) -> bool {
        has_extension(name, &self.temp_extensions)
    }

    pub fn is_derived_file(&self, name: &str) -> bool {
        has_extension(name, &self.derived_extensions)
    }
}

/// Matches multi-part extensions such as `synctex.gz` too.
pub(crate) fn has_extension(name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| {
        name.len() > ext.len() + 1
            && name.ends_with(ext.as_str())
            && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
    })
}
