//! Kiln directory management
//!
//! The [`KilnDir`] struct manages the `.kiln/` directory where project-local
//! kiln data is stored.

use std::path::{Path, PathBuf};

/// Manages the `.kiln/` directory for project-local data storage.
///
/// The registry database lives here, so the project root only needs a single
/// `.gitignore` entry.
#[derive(Debug, Clone)]
pub struct KilnDir {
    path: PathBuf,
}

impl KilnDir {
    pub const NAME: &str = ".kiln";

    /// Registry database file name
    pub const DB_FILE: &str = "kiln.db";

    /// `.kiln/` in the current directory.
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(Self::NAME),
        }
    }

    /// `.kiln/` under the given project root.
    pub fn in_project<P: AsRef<Path>>(root: P) -> Self {
        Self {
            path: root.as_ref().join(Self::NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.path.join(path)
    }

    pub fn db_path(&self) -> PathBuf {
        self.join(Self::DB_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the directory if it doesn't exist.
    pub fn create(&self) -> std::io::Result<()> {
        if !self.exists() {
            std::fs::create_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Default for KilnDir {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Path> for KilnDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let dir = KilnDir::new();
        assert_eq!(dir.path(), Path::new(".kiln"));
        assert_eq!(dir.db_path(), PathBuf::from(".kiln/kiln.db"));
    }

    #[test]
    fn test_in_project() {
        let dir = KilnDir::in_project("/work/flipper");
        assert_eq!(dir.path(), Path::new("/work/flipper/.kiln"));
    }

    #[test]
    fn test_create() {
        let root = tempfile::tempdir().unwrap();
        let dir = KilnDir::in_project(root.path());
        assert!(!dir.exists());
        dir.create().unwrap();
        assert!(dir.exists());
        // second call is a no-op
        dir.create().unwrap();
    }
}
