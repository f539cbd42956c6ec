//! Filesystems a format engine resolves dataset names through.
//!
//! [`MemoryFs`] keeps files as byte buffers and is what in-memory datasets are
//! mounted into. [`DiskFs`] maps names onto the host filesystem, optionally
//! below a root directory.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub trait VirtualFs: Send + Sync {
    /// Place `bytes` at `name`, creating the parent directory if needed.
    fn mount(&self, name: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Read the whole file at `name`.
    fn read(&self, name: &Path) -> io::Result<Vec<u8>>;

    /// Replace the file at `name`. The parent directory must exist.
    fn write(&self, name: &Path, bytes: &[u8]) -> io::Result<()>;

    fn exists(&self, name: &Path) -> bool;
}

/// An in-process filesystem. Clones share the same storage, so a clone can be
/// handed to an engine while the original is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<RwLock<HashSet<PathBuf>>>,
}

impl MemoryFs {
    /// A filesystem holding an empty `/tmp`. [`MemoryFs::default`] holds
    /// only the root.
    pub fn new() -> Self {
        let fs = Self::default();
        fs.create_dir_all("/tmp");
        fs
    }

    /// Create `dir` and all of its ancestors.
    pub fn create_dir_all<P: AsRef<Path>>(&self, dir: P) {
        let dir = normalize(dir.as_ref());
        let mut dirs = self.dirs.write();
        for d in dir.ancestors() {
            dirs.insert(d.to_path_buf());
        }
    }

    /// Names of all stored files, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut names: Vec<_> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    fn dir_exists(&self, dir: &Path) -> bool {
        dir.as_os_str().is_empty() || dir == Path::new("/") || self.dirs.read().contains(dir)
    }
}

impl VirtualFs for MemoryFs {
    fn mount(&self, name: &Path, bytes: &[u8]) -> io::Result<()> {
        let name = normalize(name);
        if let Some(parent) = name.parent() {
            self.create_dir_all(parent);
        }
        self.files.write().insert(name, bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &Path) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    fn write(&self, name: &Path, bytes: &[u8]) -> io::Result<()> {
        let name = normalize(name);
        match name.parent() {
            Some(parent) if !self.dir_exists(parent) => Err(not_found(parent)),
            _ => {
                self.files.write().insert(name, bytes.to_vec());
                Ok(())
            }
        }
    }

    fn exists(&self, name: &Path) -> bool {
        self.files.read().contains_key(&normalize(name))
    }
}

/// The host filesystem. With a root, names are resolved below it and
/// absolute names are re-rooted.
#[derive(Debug, Clone, Default)]
pub struct DiskFs {
    root: Option<PathBuf>,
}

impl DiskFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: Some(root.into()) }
    }

    pub fn resolve(&self, name: &Path) -> PathBuf {
        match &self.root {
            None => name.to_path_buf(),
            Some(root) => {
                let relative: PathBuf = name
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                root.join(relative)
            }
        }
    }
}

impl VirtualFs for DiskFs {
    fn mount(&self, name: &Path, bytes: &[u8]) -> io::Result<()> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }

    fn read(&self, name: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(name))
    }

    fn write(&self, name: &Path, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(self.resolve(name), bytes)
    }

    fn exists(&self, name: &Path) -> bool {
        self.resolve(name).is_file()
    }
}

fn normalize(name: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in name.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c),
        }
    }
    out
}

fn not_found(name: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: '{}'", name.display()),
    )
}
