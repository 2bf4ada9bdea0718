//! The on-disk manifests: the deployment state file and the post-deploy call file.
//!
//! Both are read once when a command starts and rewritten in full, pretty-printed,
//! when it ends. A single writer per manifest is assumed: two pipelines running
//! against the same file race on the final write and the last one wins.

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    constants::{DATA_FILE_STEM, MANIFEST_EXTENSION, SETUP_FILE_STEM},
    errors::ScriptError,
    types::{CallDirective, Unit},
};

/// Resolve the manifest path for `stem` in `dir`, preferring the variant
/// qualified by `chain_id` when that file exists
pub fn manifest_path(dir: &Path, stem: &str, chain_id: Option<u64>) -> PathBuf {
    if let Some(chain_id) = chain_id {
        let qualified = dir.join(format!("{}.{}.{}", stem, chain_id, MANIFEST_EXTENSION));
        if qualified.exists() {
            return qualified;
        }
    }
    dir.join(format!("{}.{}", stem, MANIFEST_EXTENSION))
}

/// Read a JSON manifest, yielding `None` if the file does not exist
fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ScriptError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| ScriptError::ReadManifest(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ScriptError::ManifestParse(format!("{}: {}", path.display(), e)))
}

/// Overwrite a JSON manifest, going through a sibling temporary file so that
/// an interrupted write never leaves a truncated manifest behind
fn write_manifest<T: Serialize>(path: &Path, value: &T) -> Result<(), ScriptError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| ScriptError::WriteManifest(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content)
        .map_err(|e| ScriptError::WriteManifest(format!("{}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| ScriptError::WriteManifest(format!("{}: {}", path.display(), e)))
}

// ---------------
// | State store |
// ---------------

/// The deployment units, in declaration order, backed by the state file
#[derive(Clone, Debug)]
pub struct StateStore {
    /// The file the units are read from and written back to
    path: PathBuf,
    /// The units, keyed by name
    units: IndexMap<String, Unit>,
}

impl StateStore {
    /// Load the state file of `dir` for the given chain
    pub fn open(dir: &Path, chain_id: Option<u64>) -> Result<Self, ScriptError> {
        Self::load(manifest_path(dir, DATA_FILE_STEM, chain_id))
    }

    /// Load the state file at `path`; a missing file is an empty manifest
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ScriptError> {
        let path = path.into();
        let units = read_manifest(&path)?.unwrap_or_default();
        debug!("Loaded state file {}", path.display());
        Ok(Self { path, units })
    }

    /// An in-memory store to be written at `path`
    pub fn from_units(path: impl Into<PathBuf>, units: IndexMap<String, Unit>) -> Self {
        Self { path: path.into(), units }
    }

    /// Write every unit back to the state file
    pub fn persist(&self) -> Result<(), ScriptError> {
        write_manifest(&self.path, &self.units)?;
        debug!("Wrote state file {}", self.path.display());
        Ok(())
    }

    /// The path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The units, in declaration order
    pub fn units(&self) -> &IndexMap<String, Unit> {
        &self.units
    }

    /// The units, mutably
    pub fn units_mut(&mut self) -> &mut IndexMap<String, Unit> {
        &mut self.units
    }

    /// The unit named `name`
    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// The unit named `name`, mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Unit> {
        self.units.get_mut(name)
    }

    /// The unit names, in declaration order
    pub fn names(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    /// The `(name, address)` pairs of units with a recorded address
    pub fn known_addresses(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units
            .iter()
            .filter(|(_, u)| u.has_address())
            .map(|(name, u)| (name.as_str(), u.address.as_str()))
    }
}

// -----------------
// | Call manifest |
// -----------------

/// The post-deploy call directives, in declaration order, backed by the setup file.
///
/// Only the `called` flag is ever changed by the pipeline; the file keeps its
/// placeholders and empty addresses so it can be replayed against another chain.
#[derive(Clone, Debug)]
pub struct CallManifest {
    /// The file the directives are read from and written back to
    path: PathBuf,
    /// The directives
    directives: Vec<CallDirective>,
}

impl CallManifest {
    /// Load the setup file of `dir` for the given chain
    pub fn open(dir: &Path, chain_id: Option<u64>) -> Result<Self, ScriptError> {
        Self::load(manifest_path(dir, SETUP_FILE_STEM, chain_id))
    }

    /// Load the setup file at `path`; a missing file holds no directives
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ScriptError> {
        let path = path.into();
        let directives = read_manifest(&path)?.unwrap_or_default();
        debug!("Loaded setup file {}", path.display());
        Ok(Self { path, directives })
    }

    /// An in-memory manifest to be written at `path`
    pub fn from_directives(path: impl Into<PathBuf>, directives: Vec<CallDirective>) -> Self {
        Self { path: path.into(), directives }
    }

    /// Write every directive back to the setup file
    pub fn persist(&self) -> Result<(), ScriptError> {
        write_manifest(&self.path, &self.directives)?;
        debug!("Wrote setup file {}", self.path.display());
        Ok(())
    }

    /// Mark the directive at `index` as called and persist the manifest at once
    pub fn commit(&mut self, index: usize) -> Result<(), ScriptError> {
        if let Some(directive) = self.directives.get_mut(index) {
            directive.called = true;
        }
        self.persist()
    }

    /// The path of the setup file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directives, in declaration order
    pub fn directives(&self) -> &[CallDirective] {
        &self.directives
    }
}
