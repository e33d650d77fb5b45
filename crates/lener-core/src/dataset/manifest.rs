//! Content manifest used to decide whether an adapted directory is stale.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::dataset::format::FormatSpec;
use crate::error::Result;
use crate::types::Split;

/// File name of the manifest inside an adapted directory.
pub const MANIFEST_FILE: &str = ".adapt-manifest.json";

/// Digest of every source file that went into an adapted directory, plus the
/// format it was adapted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptManifest {
    pub format: FormatSpec,
    /// `"<split>/<file name>"` -> hex SHA-256 of the file contents.
    pub sources: BTreeMap<String, String>,
}

impl AdaptManifest {
    /// Hash the listed source files of every split.
    pub fn compute(format: &FormatSpec, listings: &[(Split, Vec<PathBuf>)]) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for (split, files) in listings {
            for file in files {
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sources.insert(format!("{split}/{name}"), file_digest(file)?);
            }
        }
        Ok(Self {
            format: format.clone(),
            sources,
        })
    }

    /// Read the manifest stored in `target_dir`, if there is a readable one.
    pub fn load(target_dir: &Path) -> Option<Self> {
        let content = fs::read_to_string(target_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn store(&self, target_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(target_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

fn file_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
