use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::gateway::{FileSystem, Stat};
use crate::storage::paths::parent_path;
use crate::storage::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum Node {
    Directory { created: DateTime<Utc> },
    File { size: u64, created: DateTime<Utc> },
}

/// In-memory [`FileSystem`] for deterministic tests.
///
/// Paths are absolute and `/`-separated; `/` always exists. Moves overwrite
/// their target like a native rename would. Failures can be injected per path
/// with [`MemoryFileSystem::fail_moves_from`] and
/// [`MemoryFileSystem::fail_deletes_of`].
#[derive(Debug)]
pub struct MemoryFileSystem {
    nodes: Mutex<BTreeMap<String, Node>>,
    failing_moves: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

fn child_prefix(path: &str) -> String {
    if path == "/" { "/".to_string() } else { format!("{path}/") }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(path: &str) -> Error {
    Error::Io(io::Error::other(format!("injected failure for {path}")))
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Directory { created: Utc::now() });
        MemoryFileSystem {
            nodes: Mutex::new(nodes),
            failing_moves: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a directory and any missing ancestors.
    pub fn add_directory(&self, path: &str) {
        let path = normalize(path);
        let mut nodes = lock(&self.nodes);
        Self::create_ancestors(&mut nodes, &path);
        nodes.entry(path).or_insert(Node::Directory { created: Utc::now() });
    }

    /// Creates (or replaces) a file of `size` bytes, creating missing ancestors.
    pub fn add_file(&self, path: &str, size: u64) {
        let path = normalize(path);
        let mut nodes = lock(&self.nodes);
        Self::create_ancestors(&mut nodes, &path);
        nodes.insert(path, Node::File { size, created: Utc::now() });
    }

    pub fn exists(&self, path: &str) -> bool {
        lock(&self.nodes).contains_key(&normalize(path))
    }

    pub fn is_directory(&self, path: &str) -> bool {
        matches!(lock(&self.nodes).get(&normalize(path)), Some(Node::Directory { .. }))
    }

    /// Every path currently stored, in sorted order.
    pub fn paths(&self) -> Vec<String> {
        lock(&self.nodes).keys().cloned().collect()
    }

    /// Makes every future move whose source is `path` fail with an I/O error.
    pub fn fail_moves_from(&self, path: &str) {
        lock(&self.failing_moves).insert(normalize(path));
    }

    /// Makes every future delete of `path` fail with an I/O error.
    pub fn fail_deletes_of(&self, path: &str) {
        lock(&self.failing_deletes).insert(normalize(path));
    }

    fn create_ancestors(nodes: &mut BTreeMap<String, Node>, path: &str) {
        let mut current = parent_path(path);
        let mut missing = Vec::new();
        while !current.is_empty() && !nodes.contains_key(current) {
            missing.push(current.to_string());
            current = parent_path(current);
        }
        for dir in missing {
            nodes.insert(dir, Node::Directory { created: Utc::now() });
        }
    }

    fn subtree_keys(nodes: &BTreeMap<String, Node>, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        nodes
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn stat_sync(&self, path: &str) -> Stat {
        match lock(&self.nodes).get(&normalize(path)) {
            Some(Node::Directory { created }) => Stat {
                exists: true,
                is_directory: true,
                is_symlink: false,
                size: 0,
                created: Some(*created),
                modified: Some(*created),
            },
            Some(Node::File { size, created }) => Stat {
                exists: true,
                is_directory: false,
                is_symlink: false,
                size: *size,
                created: Some(*created),
                modified: Some(*created),
            },
            None => Stat::missing(),
        }
    }

    fn list_sync(&self, path: &str) -> Result<Vec<String>> {
        let path = normalize(path);
        let nodes = lock(&self.nodes);
        match nodes.get(&path) {
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(Error::NotADirectory(path)),
            None => return Err(Error::NotFound(path)),
        }
        let prefix = child_prefix(&path);
        Ok(nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn mkdir_sync(&self, path: &str, intermediates: bool) -> Result<()> {
        let path = normalize(path);
        let mut nodes = lock(&self.nodes);
        match nodes.get(&path) {
            Some(Node::Directory { .. }) if intermediates => return Ok(()),
            Some(_) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{path} already exists"),
                )));
            }
            None => {}
        }

        let mut missing = vec![path.clone()];
        let mut current = parent_path(&path);
        while !current.is_empty() {
            match nodes.get(current) {
                Some(Node::Directory { .. }) => break,
                Some(Node::File { .. }) => return Err(Error::NotADirectory(current.to_string())),
                None if intermediates => {
                    missing.push(current.to_string());
                    current = parent_path(current);
                }
                None => return Err(Error::NotFound(current.to_string())),
            }
        }
        for dir in missing {
            nodes.insert(dir, Node::Directory { created: Utc::now() });
        }
        Ok(())
    }

    fn move_sync(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        if lock(&self.failing_moves).contains(&from) {
            return Err(injected(&from));
        }

        let mut nodes = lock(&self.nodes);
        if !nodes.contains_key(&from) {
            return Err(Error::NotFound(from));
        }
        if from == to {
            return Ok(());
        }
        if to.starts_with(&child_prefix(&from)) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot move {from} below itself"),
            )));
        }
        if from.starts_with(&child_prefix(&to)) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("cannot move {from} onto its ancestor {to}"),
            )));
        }
        match nodes.get(parent_path(&to)) {
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(Error::NotADirectory(parent_path(&to).to_string())),
            None => return Err(Error::NotFound(parent_path(&to).to_string())),
        }

        for key in Self::subtree_keys(&nodes, &to) {
            nodes.remove(&key);
        }
        for key in Self::subtree_keys(&nodes, &from) {
            if let Some(node) = nodes.remove(&key) {
                let moved = format!("{to}{}", &key[from.len()..]);
                nodes.insert(moved, node);
            }
        }
        Ok(())
    }

    fn delete_sync(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        if lock(&self.failing_deletes).contains(&path) {
            return Err(injected(&path));
        }
        if path == "/" {
            return Err(Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "cannot delete /")));
        }
        let mut nodes = lock(&self.nodes);
        if !nodes.contains_key(&path) {
            return Err(Error::NotFound(path));
        }
        for key in Self::subtree_keys(&nodes, &path) {
            nodes.remove(&key);
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn stat(&self, path: &str) -> Result<Stat> {
        Ok(self.stat_sync(path))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<String>> {
        self.list_sync(path)
    }

    async fn mkdir(&self, path: &str, intermediates: bool) -> Result<()> {
        self.mkdir_sync(path, intermediates)
    }

    async fn move_item(&self, from: &str, to: &str) -> Result<()> {
        self.move_sync(from, to)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.delete_sync(path)
    }
}
