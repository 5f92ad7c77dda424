//! Breadth-first discovery of signable files
//!
//! The signing job traverses the same root twice: once to count the work,
//! once to do it. Both passes must see the same files in the same order,
//! so the traversal is a queue-driven breadth-first walk that expands one
//! directory at a time and sorts each directory's children by name. A
//! root whose contents change between the two passes is unsupported.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SignError};

/// Predicate deciding whether a regular file is a signing candidate.
pub type FileFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Restartable breadth-first file discovery under a root path.
pub struct FileDiscoverer {
    root: PathBuf,
    filter: FileFilter,
    log_visits: bool,
}

impl FileDiscoverer {
    /// Create a discoverer for `root` yielding files accepted by `filter`.
    pub fn new(root: impl Into<PathBuf>, filter: FileFilter, log_visits: bool) -> Self {
        Self {
            root: root.into(),
            filter,
            log_visits,
        }
    }

    /// Start a fresh traversal. Each call walks the tree from scratch and,
    /// on an unchanged filesystem, yields an identical sequence.
    pub fn scan(&self) -> Scan {
        let mut queue = VecDeque::new();
        queue.push_back(self.root.clone());
        Scan {
            queue,
            filter: self.filter.clone(),
            log_visits: self.log_visits,
        }
    }
}

/// One lazy traversal over the tree. Yields candidate files in
/// breadth-first order; directory read failures surface as errors.
pub struct Scan {
    queue: VecDeque<PathBuf>,
    filter: FileFilter,
    log_visits: bool,
}

impl Scan {
    /// Queue the direct children of `dir`, sorted by name.
    fn expand(&mut self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|source| SignError::Traversal {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SignError::Traversal {
                path: dir.to_path_buf(),
                source,
            })?;
            children.push(entry.path());
        }
        children.sort();
        self.queue.extend(children);
        Ok(())
    }
}

impl Iterator for Scan {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.queue.pop_front() {
            if self.log_visits {
                debug!(path = %path.display(), "visiting");
            }
            if path.is_dir() {
                if let Err(err) = self.expand(&path) {
                    return Some(Err(err));
                }
            } else if path.is_file() {
                if (self.filter)(&path) {
                    return Some(Ok(path));
                }
            }
            // Everything else (broken symlinks, special files) is skipped.
        }
        None
    }
}
