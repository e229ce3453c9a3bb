//! TOML configuration (`ectest.toml`).
//!
//! Every field has a default, so a missing or partial file is fine. CLI
//! flags override whatever the file says.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::Budgets;
use crate::verdict::EngineRole;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub engine: EngineSection,
    pub run: RunSection,
    pub corpus: CorpusSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Engine command line, e.g. `"duk --strict"`.
    pub cmd: Option<String>,
    pub role: EngineRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Worker count; 0 means one per logical CPU.
    pub workers: usize,
    pub timeout_secs: u64,
    pub slow_timeout_secs: u64,
    /// Stop the run after this many failures; 0 means never.
    pub max_failures: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            workers: 0,
            timeout_secs: 60,
            slow_timeout_secs: 300,
            max_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSection {
    /// Default corpus root for runs that name no paths.
    pub dir: Option<PathBuf>,
    /// Directories searched for `/*@include ...@*/` files.
    pub include_dirs: Vec<PathBuf>,
    /// Path substrings to skip.
    pub ignore: Vec<String>,
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if it exists, falling back to defaults. A file that
    /// exists but cannot be read or parsed is reported and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("{err}, using defaults");
                Self::default()
            }
        }
    }

    pub fn budgets(&self) -> Budgets {
        Budgets {
            normal: Duration::from_secs(self.run.timeout_secs),
            slow: Duration::from_secs(self.run.slow_timeout_secs),
        }
    }

    pub fn max_failures(&self) -> Option<usize> {
        match self.run.max_failures {
            0 => None,
            cap => Some(cap),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
