//! In-memory stand-in for `/proc`, `/sys`, share configs and the notification store.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Tree {
    files: HashMap<PathBuf, String>,
    /// Every ancestor of a file plus directories added explicitly.
    directories: HashSet<PathBuf>,
}

impl Tree {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

/// In-memory filesystem for testing.
///
/// Mutation takes `&self` so a test can keep a handle to a filesystem it has
/// already given to a collector and change files between collection passes.
#[derive(Debug, Default)]
pub struct MockFs {
    tree: RwLock<Tree>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. Parent directories are automatically created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.add_parents(&path);
        tree.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        tree.add_parents(&path);
        tree.directories.insert(path);
    }

    /// Removes a file. Directories are left in place.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.tree
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .remove(path.as_ref())
            .is_some()
    }

    /// Adds `/proc/[pid]/stat` for a process with the given CPU ticks.
    pub fn add_process(&self, pid: u32, comm: &str, utime: u64, stime: u64) {
        self.add_file(
            format!("/proc/{pid}/stat"),
            format!(
                "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194560 1000 0 0 0 {utime} {stime} 0 0 20 0 8 0 12345 1000000 500"
            ),
        );
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.files.contains_key(path) || tree.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        if !tree.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();

        for file_path in tree.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &tree.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }
}
