//! On-disk plan and status documents.
//!
//! Both are small JSON files read once and rewritten whole on every change.

use crate::types::{MigrationPlan, MigrationStatus};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-file migration records keyed by relative source path
#[derive(Debug)]
pub struct StatusStore {
    path: PathBuf,
    records: BTreeMap<String, MigrationStatus>,
}

impl StatusStore {
    /// Open the store at `path`; a missing document is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        let records = read_json(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn get(&self, file: &str) -> Option<&MigrationStatus> {
        self.records.get(file)
    }

    pub fn records(&self) -> &BTreeMap<String, MigrationStatus> {
        &self.records
    }

    /// Replace the record for a file and persist the whole store
    pub fn record(&mut self, status: MigrationStatus) -> Result<()> {
        debug!("Recording {} as {}", status.file_path, status.status);
        self.records.insert(status.file_path.clone(), status);
        write_json(&self.path, &self.records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn load_plan(path: &Path) -> Result<Option<MigrationPlan>> {
    read_json(path)
}

/// Persist a plan, replacing any previous one
pub fn save_plan(path: &Path, plan: &MigrationPlan) -> Result<()> {
    write_json(path, plan)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt state document {}", path.display()))?;
    Ok(Some(value))
}

/// Write via a sibling temp file so a crash never leaves a torn document
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
