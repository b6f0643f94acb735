use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::runner::BuildTarget;
use crate::session::BuildSessionState;
use crate::tracking::ProjectFileTracking;
use std::fs;
use std::path::{Path, PathBuf};

/// The host's view of the project, told about files the build moved.
pub trait ProjectView {
    /// `path` is project-relative and was produced by the build.
    fn mark_derived(&mut self, path: &Path);
    fn refresh(&mut self);
}

#[derive(Debug, Default)]
pub struct NullProjectView;

impl ProjectView for NullProjectView {
    fn mark_derived(&mut self, _path: &Path) {}
    fn refresh(&mut self) {}
}

/// Logs what a host would mark.
#[derive(Debug, Default)]
pub struct LogProjectView;

impl ProjectView for LogProjectView {
    fn mark_derived(&mut self, path: &Path) {
        log::debug!("derived: {}", path.display());
    }

    fn refresh(&mut self) {
        log::debug!("project view refreshed");
    }
}

/// Moves build products into place around a build.
///
/// Temporary files live in `temp_dir` between builds and are put back next
/// to the main file before the tools run. The final document goes to
/// `output_file`, or into `output_dir`, together with its derived files.
#[derive(Debug)]
pub struct OutputFileManager<'a> {
    config: &'a BuildConfig,
    target: &'a BuildTarget,
    tracking: ProjectFileTracking,
}

impl<'a> OutputFileManager<'a> {
    pub fn new(config: &'a BuildConfig, target: &'a BuildTarget) -> Self {
        Self {
            config,
            target,
            tracking: ProjectFileTracking::new(
                target.root(),
                config.output_dir.as_deref(),
                config.temp_dir.as_deref(),
            ),
        }
    }

    /// Project-relative path the final document ends up at.
    pub fn output_path(&self) -> PathBuf {
        let extension = self.config.output_format.extension();
        if let Some(file) = &self.config.output_file {
            return file.clone();
        }
        match &self.config.output_dir {
            Some(dir) => dir.join(format!("{}.{extension}", self.target.base_name())),
            None => self.target.relative_sibling(extension),
        }
    }

    /// Snapshots the source directory, then moves temporary files back
    /// from the temp directory.
    pub fn perform_before_build(&mut self) -> Result<()> {
        self.tracking.refresh_snapshots(&self.target.relative_dir())?;
        let Some(temp_dir) = self.tracking.temp_dir() else {
            return Ok(());
        };

        let root = self.target.root();
        for path in self.tracking.temp_folder_files()? {
            let Ok(relative) = path.strip_prefix(temp_dir) else {
                continue;
            };
            let to = root.join(relative);
            if is_at_least_as_new(&to, &root.join(&path)) {
                log::debug!("keeping {}, it is newer than the stored copy", relative.display());
                continue;
            }
            move_file(&root.join(&path), &to)?;
        }
        Ok(())
    }

    /// Moves the output and then the temporary files, then refreshes
    /// `view`. Every step is attempted; the first failure is returned at
    /// the end.
    pub fn perform_after_build(&mut self, view: &mut dyn ProjectView) -> Result<()> {
        let mut first_error = None;
        if let Err(e) = self.move_outputs(view) {
            log::warn!("{e}");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.move_temp_files(view) {
            log::warn!("{e}");
            first_error.get_or_insert(e);
        }
        view.refresh();
        self.tracking.clear_snapshots();
        first_error.map_or(Ok(()), Err)
    }

    /// True if the output exists and is strictly newer than every project
    /// file other than build products.
    pub fn is_up_to_date(&self) -> Result<bool> {
        let output = self.output_path();
        let Some(output_modified) = modified(&self.target.root().join(&output)) else {
            return Ok(false);
        };
        for (path, modified) in self.tracking.project_files()? {
            let name = path.to_string_lossy();
            if path == output || self.config.is_temp_file(&name) || self.config.is_derived_file(&name) {
                continue;
            }
            if modified >= output_modified {
                log::debug!("{} is not older than {}", path.display(), output.display());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// False only if the output is up to date and `session` has nothing
    /// left over from the previous build.
    pub fn needs_build(&self, session: &BuildSessionState) -> Result<bool> {
        if session.bibliography_pending() || session.needs_latex_rerun {
            return Ok(true);
        }
        Ok(!self.is_up_to_date()?)
    }

    /// True if some `.bib` file is newer than the existing bibliography.
    pub fn bibliography_outdated(&self) -> Result<bool> {
        let Some(bbl_modified) = modified(&self.target.sibling("bbl")) else {
            return Ok(false);
        };
        Ok(self.tracking.project_files()?.into_iter().any(|(path, modified)| {
            path.extension().is_some_and(|e| e == "bib") && modified > bbl_modified
        }))
    }

    fn move_outputs(&self, view: &mut dyn ProjectView) -> Result<()> {
        let root = self.target.root();
        let produced = self.target.relative_sibling(self.config.output_format.extension());
        let destination = self.output_path();
        if !root.join(&produced).is_file() {
            log::warn!("{} was not produced", produced.display());
            return Ok(());
        }

        let mut first_error = None;
        if produced != destination {
            if let Err(e) = move_file(&root.join(&produced), &root.join(&destination)) {
                first_error.get_or_insert(e);
            }
        }
        view.mark_derived(&destination);

        // Derived files follow the output's new name.
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.target.base_name());
        let destination_dir = destination.parent().map(Path::to_path_buf).unwrap_or_default();
        for extension in &self.config.derived_extensions {
            let from = self.target.relative_sibling(extension);
            let to = destination_dir.join(format!("{stem}.{extension}"));
            if from == to || !root.join(&from).is_file() {
                continue;
            }
            match move_file(&root.join(&from), &root.join(&to)) {
                Ok(()) => view.mark_derived(&to),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn move_temp_files(&self, view: &mut dyn ProjectView) -> Result<()> {
        let Some(temp_dir) = self.tracking.temp_dir() else {
            return Ok(());
        };
        let names = self.tracking.new_temp_names(
            &self.target.relative_dir(),
            &self.config.temp_extensions,
            self.config.output_format,
        )?;

        let root = self.target.root();
        let mut first_error = None;
        for name in names {
            let stored = temp_dir.join(&name);
            match move_file(&root.join(&name), &root.join(&stored)) {
                Ok(()) => view.mark_derived(&stored),
                Err(e) => {
                    log::warn!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_at_least_as_new(path: &Path, other: &Path) -> bool {
    match (modified(path), modified(other)) {
        (Some(a), Some(b)) => a >= b,
        _ => false,
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    let relocation = |source| BuildError::Relocation {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(relocation)?;
    }
    fs::rename(from, to).map_err(relocation)?;
    log::debug!("moved {} to {}", from.display(), to.display());
    Ok(())
}
