//! Shared include files.
//!
//! `/*@include NAME@*/` directives name helper files that are prepended to
//! the test body before execution. Names are bare file names; they are
//! looked up in the configured search directories first and in the test
//! file's own directory last. File contents are cached so a helper pulled
//! in by thousands of tests is read once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::CorpusError;

/// Locates and caches include files.
#[derive(Debug, Default)]
pub struct IncludeResolver {
    search_dirs: Vec<PathBuf>,
    cache: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl IncludeResolver {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve one include name for a test located in `test_dir`.
    pub fn resolve(&self, name: &str, test_dir: &Path) -> Result<Arc<str>, CorpusError> {
        let mut searched = Vec::new();
        for dir in self
            .search_dirs
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(test_dir))
        {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return self.read_cached(&candidate);
            }
            searched.push(dir.to_path_buf());
        }
        Err(CorpusError::IncludeNotFound {
            name: name.to_string(),
            searched,
        })
    }

    /// Resolve every include of a test, in declaration order.
    pub fn resolve_all(
        &self,
        names: &[String],
        test_dir: &Path,
    ) -> Result<Vec<Arc<str>>, CorpusError> {
        names
            .iter()
            .map(|name| self.resolve(name, test_dir))
            .collect()
    }

    fn read_cached(&self, path: &Path) -> Result<Arc<str>, CorpusError> {
        if let Ok(cache) = self.cache.read()
            && let Some(content) = cache.get(path)
        {
            return Ok(Arc::clone(content));
        }
        let content: Arc<str> =
            fs::read_to_string(path)
                .map_err(|source| CorpusError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?
                .into();
        tracing::debug!(path = %path.display(), "include loaded");
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(path.to_path_buf(), Arc::clone(&content));
        }
        Ok(content)
    }
}
