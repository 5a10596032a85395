//! Revision sources
//!
//! A [`RevisionSource`] answers two questions for the run: what a schema file
//! looked like at a revision, and which schema files changed between two
//! revisions. The gate ships three: Git history ([`GitSource`]), two
//! directories on disk ([`DirectorySource`]) and an in-memory map
//! ([`MemorySource`]).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use git2::{DiffOptions, ErrorCode, Repository, Tree};
use tracing::debug;
use walkdir::WalkDir;

use crate::checksum::Checksum;
use crate::error::{GateError, Result};

/// Access to schema files at arbitrary revisions
pub trait RevisionSource {
    /// Content of `path` at `revision`, or `None` if the file does not exist there
    fn file_at(&self, revision: &str, path: &str) -> Result<Option<String>>;

    /// Schema files under `dir` that differ between `base` and `head`, sorted
    fn changed_files(&self, base: &str, head: &str, dir: &str) -> Result<Vec<String>>;
}

/// Whether a path names a schema document
pub fn is_schema_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
}

fn within_dir(path: &str, dir: &str) -> bool {
    let dir = slash_path(Path::new(dir));
    dir.is_empty() || path.starts_with(&format!("{}/", dir))
}

/// Forward-slash form of a relative path, matching Git's path notation
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Schema files read from a Git repository's history
pub struct GitSource {
    repo: Repository,
}

impl GitSource {
    /// Open the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            repo: Repository::discover(path)?,
        })
    }

    fn tree(&self, revision: &str) -> Result<Tree<'_>> {
        let object = self
            .repo
            .revparse_single(revision)
            .map_err(|_| GateError::RevisionNotFound(revision.to_string()))?;
        Ok(object.peel_to_tree()?)
    }
}

impl RevisionSource for GitSource {
    fn file_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
        let tree = self.tree(revision)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let object = entry.to_object(&self.repo)?;
        match object.as_blob() {
            Some(blob) => Ok(Some(String::from_utf8(blob.content().to_vec())?)),
            None => Ok(None),
        }
    }

    fn changed_files(&self, base: &str, head: &str, dir: &str) -> Result<Vec<String>> {
        let old_tree = self.tree(base)?;
        let new_tree = self.tree(head)?;

        // "./schemas" and "schemas/" must select the same files as "schemas"
        let dir = slash_path(Path::new(dir));
        let mut options = DiffOptions::new();
        if !dir.is_empty() {
            options.pathspec(dir.as_str());
        }

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut options))?;

        let mut files = BTreeSet::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path() {
                    let path_str = slash_path(path);
                    if is_schema_file(path) && within_dir(&path_str, &dir) {
                        files.insert(path_str);
                    }
                }
            }
        }

        debug!(base, head, %dir, count = files.len(), "listed changed files from git");
        Ok(files.into_iter().collect())
    }
}

/// Schema files read from directories on disk; a revision names a directory
/// (relative to `root`) holding a checkout of the project
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn revision_root(&self, revision: &str) -> Result<PathBuf> {
        let root = self.root.join(revision);
        if root.is_dir() {
            Ok(root)
        } else {
            Err(GateError::RevisionNotFound(revision.to_string()))
        }
    }

    /// Checksums of every schema file under `dir`, keyed by revision-relative path
    fn scan(&self, revision: &str, dir: &str) -> Result<BTreeMap<String, Checksum>> {
        let revision_root = self.revision_root(revision)?;
        let scan_root = revision_root.join(dir);
        let mut files = BTreeMap::new();
        if !scan_root.is_dir() {
            return Ok(files);
        }

        for entry in WalkDir::new(&scan_root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_schema_file(path) {
                continue;
            }
            let relative = path
                .strip_prefix(&revision_root)
                .map_err(|e| GateError::InvalidSource(e.to_string()))?;
            files.insert(slash_path(relative), Checksum::from_bytes(&fs::read(path)?));
        }

        Ok(files)
    }
}

impl RevisionSource for DirectorySource {
    fn file_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
        let full = self.revision_root(revision)?.join(path);
        match fs::read_to_string(&full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn changed_files(&self, base: &str, head: &str, dir: &str) -> Result<Vec<String>> {
        let old = self.scan(base, dir)?;
        let new = self.scan(head, dir)?;

        let paths: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let changed: Vec<String> = paths
            .into_iter()
            .filter(|path| old.get(*path) != new.get(*path))
            .cloned()
            .collect();

        debug!(base, head, dir, count = changed.len(), "listed changed files from directories");
        Ok(changed)
    }
}

/// Schema files held in memory, keyed by revision then path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    revisions: HashMap<String, BTreeMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a revision exists, even with no files
    pub fn with_revision(mut self, revision: &str) -> Self {
        self.revisions.entry(revision.to_string()).or_default();
        self
    }

    pub fn with_file(mut self, revision: &str, path: &str, content: impl Into<String>) -> Self {
        self.insert(revision, path, content);
        self
    }

    pub fn insert(&mut self, revision: &str, path: &str, content: impl Into<String>) {
        self.revisions
            .entry(revision.to_string())
            .or_default()
            .insert(path.to_string(), content.into());
    }

    fn revision(&self, revision: &str) -> Result<&BTreeMap<String, String>> {
        self.revisions
            .get(revision)
            .ok_or_else(|| GateError::RevisionNotFound(revision.to_string()))
    }
}

impl RevisionSource for MemorySource {
    fn file_at(&self, revision: &str, path: &str) -> Result<Option<String>> {
        Ok(self.revision(revision)?.get(path).cloned())
    }

    fn changed_files(&self, base: &str, head: &str, dir: &str) -> Result<Vec<String>> {
        let old = self.revision(base)?;
        let new = self.revision(head)?;

        let paths: BTreeSet<&String> = old
            .keys()
            .chain(new.keys())
            .filter(|path| within_dir(path, dir) && is_schema_file(Path::new(path.as_str())))
            .collect();

        Ok(paths
            .into_iter()
            .filter(|path| old.get(*path) != new.get(*path))
            .cloned()
            .collect())
    }
}
