// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Pipeline audit log.

One entry per stage key, each holding a snapshot of the stage's output and its
summary line. The whole log lives in a single file that is rewritten on every
update; re-running a stage replaces only its own entry.

## File format
```text
[Header]
- Magic: "TMLOG" (5 bytes)
- Version: u32 LE (4 bytes)
[Data]
- Bincode-serialized BTreeMap<String, AuditEntry>
```
*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::centroid::SampleSet;
use crate::data::HemisphereFork;
use crate::error::{CurationError, CurationResult};
use crate::registry::ExperimentRegistry;
use crate::stages::{ExperimentFailure, StageName};

const MAGIC: &[u8; 5] = b"TMLOG";
const FORMAT_VERSION: u32 = 1;

/// Snapshot stored with a stage entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditPayload {
    Registry(ExperimentRegistry),
    Fork(HemisphereFork),
    CentroidSamples {
        ipsilateral: SampleSet,
        contralateral: SampleSet,
    },
}

/// One stage's record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub payload: AuditPayload,
    pub summary: String,
    pub failures: Vec<ExperimentFailure>,
    /// Parameters the payload depends on; replay requires a match
    pub fingerprint: Option<String>,
    /// RFC 3339 time of recording
    pub recorded_at: String,
}

impl AuditEntry {
    pub fn new(payload: AuditPayload, summary: impl Into<String>) -> Self {
        Self {
            payload,
            summary: summary.into(),
            failures: Vec::new(),
            fingerprint: None,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<ExperimentFailure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn registry(&self) -> Option<&ExperimentRegistry> {
        match &self.payload {
            AuditPayload::Registry(registry) => Some(registry),
            _ => None,
        }
    }
}

/// File-backed audit log
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    entries: BTreeMap<String, AuditEntry>,
}

impl AuditLog {
    /// Load the log at `path`, or start an empty one if the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> CurationResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.is_file() {
            let entries = read_entries(&path)?;
            info!(
                target: "tractmap-curation",
                "Loaded audit log {} ({} entries)",
                path.display(),
                entries.len()
            );
            entries
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, stage: StageName) -> Option<&AuditEntry> {
        self.entries.get(stage.key())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a stage's entry and rewrite the file
    pub fn record(&mut self, stage: StageName, entry: AuditEntry) -> CurationResult<()> {
        self.entries.insert(stage.key().to_string(), entry);
        write_entries(&self.path, &self.entries)?;
        debug!(target: "tractmap-curation", "Audit log entry {} written", stage);
        Ok(())
    }
}

fn read_entries(path: &Path) -> CurationResult<BTreeMap<String, AuditEntry>> {
    let bytes = std::fs::read(path)?;
    let header_len = MAGIC.len() + 4;
    if bytes.len() < header_len || &bytes[..MAGIC.len()] != MAGIC {
        return Err(CurationError::AuditLog(format!(
            "{} is not an audit log",
            path.display()
        )));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..header_len]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(CurationError::AuditLog(format!(
            "{}: unsupported format version {} (expected {})",
            path.display(),
            version,
            FORMAT_VERSION
        )));
    }
    Ok(bincode::deserialize(&bytes[header_len..])?)
}

/// Write through a temporary file, then rename over the log
fn write_entries(path: &Path, entries: &BTreeMap<String, AuditEntry>) -> CurationResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut bytes = Vec::with_capacity(1024);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend(bincode::serialize(entries)?);

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry(experiments: Vec<u64>) -> ExperimentRegistry {
        ExperimentRegistry::from_map(BTreeMap::from([(100, experiments)]))
    }

    #[test]
    fn test_record_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit_log.bin");

        let mut log = AuditLog::load_or_default(&path).unwrap();
        assert!(log.is_empty());
        log.record(
            StageName::OverlapRemoved,
            AuditEntry::new(AuditPayload::Registry(registry(vec![1, 3])), "1 experiments removed: [2]"),
        )
        .unwrap();

        let reloaded = AuditLog::load_or_default(&path).unwrap();
        let entry = reloaded.get(StageName::OverlapRemoved).unwrap();
        assert_eq!(entry.summary, "1 experiments removed: [2]");
        assert_eq!(entry.registry().unwrap().experiments(100), &[1, 3]);
        assert!(!dir.path().join("audit_log.bin.tmp").exists());
    }

    #[test]
    fn test_rerun_replaces_only_its_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit_log.bin");

        let mut log = AuditLog::load_or_default(&path).unwrap();
        log.record(
            StageName::ExperimentsCollected,
            AuditEntry::new(AuditPayload::Registry(registry(vec![1, 2, 3])), "collected"),
        )
        .unwrap();
        log.record(
            StageName::HemisphereSelected,
            AuditEntry::new(AuditPayload::Registry(registry(vec![1])), "first").with_fingerprint("a"),
        )
        .unwrap();

        let mut log = AuditLog::load_or_default(&path).unwrap();
        log.record(
            StageName::HemisphereSelected,
            AuditEntry::new(AuditPayload::Registry(registry(vec![3])), "second"),
        )
        .unwrap();

        let reloaded = AuditLog::load_or_default(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(StageName::ExperimentsCollected).unwrap().summary, "collected");
        let entry = reloaded.get(StageName::HemisphereSelected).unwrap();
        assert_eq!(entry.summary, "second");
        assert_eq!(entry.fingerprint, None);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit_log.bin");
        std::fs::write(&path, b"not a log at all").unwrap();
        assert!(matches!(
            AuditLog::load_or_default(&path),
            Err(CurationError::AuditLog(_))
        ));
    }
}
