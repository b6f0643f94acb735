use crate::config::has_extension;
use crate::error::{BuildError, Result};
use crate::format::Format;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Extensions of files that belong to the project itself and never count as
/// build products.
const PROJECT_EXTENSIONS: [&str; 7] = ["tex", "ltx", "cls", "sty", "bst", "dtx", "ins"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    modified: SystemTime,
    fingerprint: String,
}

type Snapshot = BTreeMap<PathBuf, Entry>;

/// Remembers what the project directory looked like so that the files a
/// tool created or changed can be found afterwards.
///
/// Paths are relative to the project root. The tracker is "initial" until
/// the first [`refresh_snapshots`](Self::refresh_snapshots); diffs taken
/// before that treat every file as new.
#[derive(Debug, Clone)]
pub struct ProjectFileTracking {
    root: PathBuf,
    excluded_dirs: Vec<PathBuf>,
    temp_dir: Option<PathBuf>,
    container: Option<Snapshot>,
    temp: Option<Snapshot>,
}

impl ProjectFileTracking {
    /// `output_dir` and `temp_dir` are project-relative and are left out of
    /// container scans.
    pub fn new(root: &Path, output_dir: Option<&Path>, temp_dir: Option<&Path>) -> Self {
        Self {
            root: root.to_path_buf(),
            excluded_dirs: output_dir.into_iter().chain(temp_dir).map(normalize).collect(),
            temp_dir: temp_dir.map(normalize),
            container: None,
            temp: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The temp directory as walked: project-relative without `.` parts.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn is_initial(&self) -> bool {
        self.container.is_none()
    }

    /// Records the current state of `container` (project-relative) and of
    /// the temp directory.
    pub fn refresh_snapshots(&mut self, container: &Path) -> Result<()> {
        let previous = self.container.take().unwrap_or_default();
        let mut snapshot = Snapshot::new();
        for (path, modified) in self.scan(container)? {
            let entry = match previous.get(&path) {
                Some(old) if old.modified == modified => old.clone(),
                _ => Entry {
                    modified,
                    fingerprint: self.fingerprint(&path)?,
                },
            };
            snapshot.insert(path, entry);
        }
        self.container = Some(snapshot);

        self.temp = match &self.temp_dir {
            Some(dir) => Some(
                self.scan_all(dir)?
                    .into_iter()
                    .map(|(path, modified)| {
                        let entry = Entry {
                            modified,
                            fingerprint: String::new(),
                        };
                        (path, entry)
                    })
                    .collect(),
            ),
            None => Some(Snapshot::new()),
        };
        log::debug!(
            "snapshot of {} holds {} file(s)",
            container.display(),
            self.container.as_ref().map_or(0, BTreeMap::len)
        );
        Ok(())
    }

    pub fn clear_snapshots(&mut self) {
        self.container = None;
        self.temp = None;
    }

    /// Files in `container` that are new, or whose timestamp moved forward
    /// and whose content differs from the snapshot.
    pub fn changed_files(&self, container: &Path) -> Result<Vec<PathBuf>> {
        let mut changed = Vec::new();
        for (path, modified) in self.scan(container)? {
            let is_changed = match self.container.as_ref().and_then(|s| s.get(&path)) {
                None => true,
                Some(entry) => {
                    modified > entry.modified && self.fingerprint(&path)? != entry.fingerprint
                }
            };
            if is_changed {
                changed.push(path);
            }
        }
        Ok(changed)
    }

    /// Temporary files `container` gained since the snapshot.
    ///
    /// A file counts if it is new or newer than recorded and carries one of
    /// `temp_extensions`. A `.dvi` or `.ps` file is the build's product,
    /// not a temporary, when `format` says so.
    pub fn new_temp_names(
        &self,
        container: &Path,
        temp_extensions: &[String],
        format: Format,
    ) -> Result<BTreeSet<PathBuf>> {
        let mut names = BTreeSet::new();
        for (path, modified) in self.scan(container)? {
            let name = path.to_string_lossy();
            if !has_extension(&name, temp_extensions) {
                continue;
            }
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if matches!(format, Format::Dvi | Format::Ps) && extension == format.extension() {
                continue;
            }
            if self.is_newer(&path, modified) {
                names.insert(path);
            }
        }
        Ok(names)
    }

    /// Files currently in the temp directory.
    pub fn temp_folder_files(&self) -> Result<BTreeSet<PathBuf>> {
        match &self.temp_dir {
            Some(dir) => Ok(self.scan_all(dir)?.into_iter().map(|(path, _)| path).collect()),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Whether `modified` is strictly later than the snapshot of `path`.
    /// A path the snapshot has never seen counts as newer.
    pub fn is_newer(&self, path: &Path, modified: SystemTime) -> bool {
        let recorded = self
            .container
            .as_ref()
            .and_then(|s| s.get(path))
            .or_else(|| self.temp.as_ref().and_then(|s| s.get(path)));
        recorded.is_none_or(|entry| modified > entry.modified)
    }

    fn is_excluded_dir(&self, relative: &Path) -> bool {
        let relative = normalize(relative);
        self.excluded_dirs.iter().any(|dir| relative == *dir)
    }

    /// Build products in `container`: everything except project sources,
    /// hidden entries and the output and temp directories.
    fn scan(&self, container: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
        let files = self.walk(container, true)?;
        Ok(files
            .into_iter()
            .filter(|(path, _)| {
                let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                !PROJECT_EXTENSIONS.contains(&extension)
            })
            .collect())
    }

    /// Every file of the project outside the output and temp directories,
    /// with its modification time.
    pub fn project_files(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        self.walk(Path::new(""), true)
    }

    fn scan_all(&self, dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
        self.walk(dir, false)
    }

    fn walk(&self, dir: &Path, exclude: bool) -> Result<Vec<(PathBuf, SystemTime)>> {
        let start = self.root.join(dir);
        if !start.is_dir() {
            return Ok(Vec::new());
        }
        let tracking_error = |path: &Path, source: std::io::Error| BuildError::Tracking {
            path: path.to_path_buf(),
            source,
        };

        let walker = WalkDir::new(&start).sort_by_file_name().into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            if exclude && entry.file_type().is_dir() {
                let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
                return !self.is_excluded_dir(relative);
            }
            true
        });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| tracking_error(&start, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .map_err(|e| tracking_error(entry.path(), e.into()))?
                .modified()
                .map_err(|e| tracking_error(entry.path(), e))?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push((relative, modified));
        }
        Ok(files)
    }

    fn fingerprint(&self, relative: &Path) -> Result<String> {
        let path = self.root.join(relative);
        let bytes = fs::read(&path).map_err(|source| BuildError::Tracking { path, source })?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Drops `.` components so `./tmp`, `tmp/` and `tmp` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn touch(root: &Path, name: &str, content: &str, offset_secs: u64) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        let time = SystemTime::now() + Duration::from_secs(offset_secs);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn tracker(root: &Path) -> ProjectFileTracking {
        ProjectFileTracking::new(root, Some(Path::new("out")), Some(Path::new("tmp")))
    }

    #[test]
    fn initial_until_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracking = tracker(dir.path());
        assert!(tracking.is_initial());
        tracking.refresh_snapshots(Path::new("")).unwrap();
        assert!(!tracking.is_initial());
        tracking.clear_snapshots();
        assert!(tracking.is_initial());
    }

    #[test]
    fn reports_new_and_modified_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "main.tex", "\\documentclass{article}", 0);
        touch(root, "main.aux", "\\relax", 0);

        let mut tracking = tracker(root);
        tracking.refresh_snapshots(Path::new("")).unwrap();
        assert!(tracking.changed_files(Path::new("")).unwrap().is_empty());

        touch(root, "main.aux", "\\relax\n\\citation{x}", 10);
        touch(root, "main.idx", "\\indexentry{a}{1}", 10);
        touch(root, "main.tex", "edited", 10);

        let changed = tracking.changed_files(Path::new("")).unwrap();
        assert_eq!(changed, vec![PathBuf::from("main.aux"), PathBuf::from("main.idx")]);
    }

    #[test]
    fn identical_rewrite_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "main.ind", "\\begin{theindex}", 0);

        let mut tracking = tracker(root);
        tracking.refresh_snapshots(Path::new("")).unwrap();
        touch(root, "main.ind", "\\begin{theindex}", 10);

        assert!(tracking.changed_files(Path::new("")).unwrap().is_empty());
        // The timestamp contract still sees the newer file.
        let modified = fs::metadata(root.join("main.ind")).unwrap().modified().unwrap();
        assert!(tracking.is_newer(Path::new("main.ind"), modified));
    }

    #[test]
    fn skips_output_temp_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut tracking = tracker(root);
        tracking.refresh_snapshots(Path::new("")).unwrap();

        touch(root, "out/main.pdf", "pdf", 5);
        touch(root, "tmp/main.aux", "aux", 5);
        touch(root, ".git/index", "git", 5);
        touch(root, "chapters/one.aux", "aux", 5);

        let changed = tracking.changed_files(Path::new("")).unwrap();
        assert_eq!(changed, vec![PathBuf::from("chapters/one.aux")]);
        assert_eq!(
            tracking.temp_folder_files().unwrap(),
            BTreeSet::from([PathBuf::from("tmp/main.aux")])
        );
    }

    #[test]
    fn dotted_and_slashed_dirs_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut tracking = ProjectFileTracking::new(root, Some(Path::new("out/")), Some(Path::new("./tmp")));
        tracking.refresh_snapshots(Path::new("")).unwrap();

        touch(root, "out/main.pdf", "pdf", 5);
        touch(root, "tmp/main.aux", "aux", 5);
        touch(root, "main.toc", "toc", 5);

        assert_eq!(tracking.temp_dir(), Some(Path::new("tmp")));
        assert_eq!(tracking.changed_files(Path::new("")).unwrap(), vec![PathBuf::from("main.toc")]);
        assert_eq!(
            tracking.temp_folder_files().unwrap(),
            BTreeSet::from([PathBuf::from("tmp/main.aux")])
        );
    }

    #[test]
    fn final_format_is_not_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut tracking = tracker(root);
        tracking.refresh_snapshots(Path::new("")).unwrap();

        touch(root, "main.dvi", "dvi", 5);
        touch(root, "main.log", "log", 5);
        touch(root, "main.pdf", "pdf", 5);
        let exts: Vec<String> = ["dvi", "log"].iter().map(|s| s.to_string()).collect();

        let as_dvi = tracking.new_temp_names(Path::new(""), &exts, Format::Dvi).unwrap();
        assert_eq!(as_dvi, BTreeSet::from([PathBuf::from("main.log")]));

        let as_pdf = tracking.new_temp_names(Path::new(""), &exts, Format::Pdf).unwrap();
        assert_eq!(
            as_pdf,
            BTreeSet::from([PathBuf::from("main.dvi"), PathBuf::from("main.log")])
        );
    }

    #[test]
    fn is_newer_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "main.toc", "toc", 0);
        let mut tracking = tracker(root);
        tracking.refresh_snapshots(Path::new("")).unwrap();

        let recorded = fs::metadata(root.join("main.toc")).unwrap().modified().unwrap();
        assert!(!tracking.is_newer(Path::new("main.toc"), recorded));
        assert!(tracking.is_newer(Path::new("main.toc"), recorded + Duration::from_secs(1)));
        assert!(tracking.is_newer(Path::new("unseen.aux"), recorded));
    }
}
