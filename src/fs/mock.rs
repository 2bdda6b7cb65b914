// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
    Symlink(PathBuf),
}

/// In-memory filesystem for tests. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.add_file_modified_at(path, content, SystemTime::now());
    }

    pub fn add_file_modified_at(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.files.lock().unwrap();
        files.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Self::ensure_dir_entry(&mut files, parent);
            Self::link_child(&mut files, parent, &path);
        }
    }

    /// Add a symbolic link at `path` pointing to the absolute `target`.
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.files.lock().unwrap();
        files.insert(path.clone(), MockEntry::Symlink(target.into()));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Self::ensure_dir_entry(&mut files, parent);
            Self::link_child(&mut files, parent, &path);
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap();
        Self::ensure_dir_entry(&mut files, path.as_ref());
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            // Avoid infinite loop at root
            if parent != path && !parent.as_os_str().is_empty() {
                Self::ensure_dir_entry(files, parent);
                Self::link_child(files, parent, path);
            }
        }
    }

    /// Follow symlinks, including ones on ancestor directories, to the entry
    /// they point at. Gives up after a few hops, like `ELOOP`.
    fn resolve<'a>(
        files: &'a HashMap<PathBuf, MockEntry>,
        path: &Path,
    ) -> Option<(PathBuf, &'a MockEntry)> {
        let mut current = path.to_path_buf();
        for _ in 0..8 {
            match files.get(&current) {
                Some(MockEntry::Symlink(target)) => current = target.clone(),
                Some(entry) => return Some((current, entry)),
                None => {
                    // A link further up the path, e.g. `link/child`.
                    let (link, target) = current.ancestors().skip(1).find_map(|a| {
                        match files.get(a) {
                            Some(MockEntry::Symlink(t)) => Some((a.to_path_buf(), t.clone())),
                            _ => None,
                        }
                    })?;
                    let rest = current.strip_prefix(&link).ok()?.to_path_buf();
                    current = target.join(rest);
                }
            }
        }
        None
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files.lock().unwrap();
        match Self::resolve(&files, path) {
            Some((_, MockEntry::File { content, .. })) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(_) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        Self::resolve(&files, path).is_some()
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(Self::resolve(&files, path), Some((_, MockEntry::File { .. })))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(Self::resolve(&files, path), Some((_, MockEntry::Dir(_))))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(path), Some(MockEntry::Symlink(_)))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let files = self.files.lock().unwrap();
        match Self::resolve(&files, path) {
            Some((_, MockEntry::File { modified, .. })) => Ok(*modified),
            Some(_) => Ok(SystemTime::UNIX_EPOCH),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let files = self.files.lock().unwrap();
        match Self::resolve(&files, path) {
            Some((_, MockEntry::File { content, .. })) => Ok(content.len() as u64),
            Some(_) => Ok(0),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    /// Children are reported under `path`, even when `path` is a link.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        match Self::resolve(&files, path) {
            Some((_, MockEntry::Dir(children))) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
