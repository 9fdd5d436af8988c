// Copyright 2025 The tractmap Authors
// SPDX-License-Identifier: Apache-2.0

/*!
Fetch-or-load store for per-experiment measurement tables.

Tables are cached as CSV files under one directory:
```text
cache_dir/
  area_<region>_experiment_<experiment>.csv                        (full table)
  area_<region>_experiment_<experiment>_injection_<structure>.csv  (injection rows at one structure)
```
A cached file is always preferred over the atlas. Empty atlas responses are
never written, so a later run asks again; within one store they are
remembered and not queried twice.
*/

use ahash::AHashSet;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AtlasError, AtlasResult};
use crate::query::{AtlasQueryService, UnionizeQuery};
use crate::types::{ExperimentId, RegionId, StructureId};
use crate::unionize::MeasurementTable;

/// What to do when a table is not cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Query the atlas and persist the result
    #[default]
    FetchMissing,
    /// Never query; a missing file is `DataUnavailable`
    CacheOnly,
}

/// Composite key of one cached table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub region_id: RegionId,
    pub experiment_id: ExperimentId,
    pub is_injection: bool,
    pub structure_filter: Option<StructureId>,
}

impl TableKey {
    /// Full (projection) table of an experiment
    pub fn full(region_id: RegionId, experiment_id: ExperimentId) -> Self {
        Self {
            region_id,
            experiment_id,
            is_injection: false,
            structure_filter: None,
        }
    }

    /// Injection rows of an experiment at one structure
    pub fn injection(region_id: RegionId, experiment_id: ExperimentId, structure_id: StructureId) -> Self {
        Self {
            region_id,
            experiment_id,
            is_injection: true,
            structure_filter: Some(structure_id),
        }
    }

    pub fn file_name(&self) -> String {
        let mut name = format!("area_{}_experiment_{}", self.region_id, self.experiment_id);
        match (self.is_injection, self.structure_filter) {
            (false, None) => {}
            (true, Some(structure)) => name.push_str(&format!("_injection_{}", structure)),
            (true, None) => name.push_str("_injection"),
            (false, Some(structure)) => name.push_str(&format!("_structure_{}", structure)),
        }
        name.push_str(".csv");
        name
    }

    fn query(&self) -> UnionizeQuery {
        let query = UnionizeQuery::new(self.experiment_id, self.is_injection);
        match self.structure_filter {
            Some(structure) => query.with_structure(structure),
            None => query,
        }
    }
}

/// Outcome of [`MeasurementStore::prefetch`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefetchReport {
    pub available: usize,
    pub failed: Vec<(ExperimentId, String)>,
}

/// Measurement table cache in front of an [`AtlasQueryService`]
#[derive(Clone)]
pub struct MeasurementStore {
    service: Arc<dyn AtlasQueryService>,
    cache_dir: PathBuf,
    policy: FetchPolicy,
    /// Keys the atlas answered with no rows during this run
    unavailable: Arc<RwLock<AHashSet<TableKey>>>,
}

impl std::fmt::Debug for MeasurementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementStore")
            .field("cache_dir", &self.cache_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MeasurementStore {
    /// Create a store; the cache directory is created if missing
    pub fn new<P: AsRef<Path>>(
        service: Arc<dyn AtlasQueryService>,
        cache_dir: P,
        policy: FetchPolicy,
    ) -> AtlasResult<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            service,
            cache_dir,
            policy,
            unavailable: Arc::new(RwLock::new(AHashSet::new())),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub fn table_path(&self, key: &TableKey) -> PathBuf {
        self.cache_dir.join(key.file_name())
    }

    pub fn is_cached(&self, key: &TableKey) -> bool {
        self.table_path(key).is_file()
    }

    /// Load the cached table for a key, or fetch and persist it
    ///
    /// # Errors
    /// * `AtlasError::DataUnavailable` - the atlas returned no rows, or the
    ///   table is not cached under [`FetchPolicy::CacheOnly`]
    pub fn fetch_or_load(
        &self,
        region_id: RegionId,
        experiment_id: ExperimentId,
        is_injection: bool,
        structure_filter: Option<StructureId>,
    ) -> AtlasResult<MeasurementTable> {
        self.get(&TableKey {
            region_id,
            experiment_id,
            is_injection,
            structure_filter,
        })
    }

    pub fn get(&self, key: &TableKey) -> AtlasResult<MeasurementTable> {
        let path = self.table_path(key);
        if path.is_file() {
            debug!(target: "tractmap-atlas", "Loading cached table {}", path.display());
            return MeasurementTable::read_csv(&path, key.experiment_id);
        }

        if self.policy == FetchPolicy::CacheOnly {
            debug!(target: "tractmap-atlas", "No cached table {} (cache-only)", path.display());
            return Err(AtlasError::DataUnavailable {
                experiment_id: key.experiment_id,
            });
        }

        if self.unavailable.read().contains(key) {
            debug!(target: "tractmap-atlas", "Atlas already returned no rows for {}", key.file_name());
            return Err(AtlasError::DataUnavailable {
                experiment_id: key.experiment_id,
            });
        }

        let query = key.query();
        let rows = self.service.unionized_rows(&query)?;
        if rows.is_empty() {
            self.unavailable.write().insert(*key);
            return Err(AtlasError::DataUnavailable {
                experiment_id: key.experiment_id,
            });
        }

        let table = MeasurementTable::from_rows(key.experiment_id, rows)?;
        self.persist(&table, &path)?;
        info!(
            target: "tractmap-atlas",
            "Fetched {} rows for experiment {} ({}{})",
            table.len(),
            key.experiment_id,
            query.criteria(),
            query.include().map(|include| format!(", include {}", include)).unwrap_or_default()
        );
        Ok(table)
    }

    /// Write through a temporary file so readers never see a partial table
    fn persist(&self, table: &MeasurementTable, path: &Path) -> AtlasResult<()> {
        let tmp_path = path.with_extension("csv.tmp");
        table.write_csv(&tmp_path)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Make sure the full table of every `(region, experiment)` is cached
    pub fn prefetch<I>(&self, experiments: I) -> PrefetchReport
    where
        I: IntoIterator<Item = (RegionId, ExperimentId)>,
    {
        let mut report = PrefetchReport::default();
        for (region_id, experiment_id) in experiments {
            match self.get(&TableKey::full(region_id, experiment_id)) {
                Ok(_) => report.available += 1,
                Err(e) => {
                    warn!(
                        target: "tractmap-atlas",
                        "Prefetch failed for experiment {} in region {}: {}",
                        experiment_id, region_id, e
                    );
                    report.failed.push((experiment_id, e.to_string()));
                }
            }
        }
        info!(
            target: "tractmap-atlas",
            "Prefetch complete: {} tables available, {} failed",
            report.available,
            report.failed.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::AtlasArchive;
    use crate::query::{StructureCriteria, StructureInfo};
    use crate::types::Hemisphere;
    use crate::unionize::UnionizeRow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingService {
        inner: AtlasArchive,
        calls: AtomicUsize,
    }

    impl AtlasQueryService for CountingService {
        fn unionized_rows(&self, query: &UnionizeQuery) -> AtlasResult<Vec<UnionizeRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.unionized_rows(query)
        }

        fn structure(&self, criteria: &StructureCriteria) -> AtlasResult<StructureInfo> {
            self.inner.structure(criteria)
        }

        fn structure_set(&self, structure_set_id: u32) -> AtlasResult<Vec<StructureInfo>> {
            self.inner.structure_set(structure_set_id)
        }
    }

    fn counting_service() -> Arc<CountingService> {
        let archive = AtlasArchive::new().with_rows(
            11,
            vec![
                UnionizeRow::new(385, Hemisphere::Left)
                    .injection(true)
                    .with_volume(0.4)
                    .with_max_voxel(1.0, 2.0, 3.0),
                UnionizeRow::new(512, Hemisphere::Right).with_metric("projection_density", 0.02),
            ],
        );
        Arc::new(CountingService {
            inner: archive,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_file_names() {
        assert_eq!(TableKey::full(385, 11).file_name(), "area_385_experiment_11.csv");
        assert_eq!(
            TableKey::injection(385, 11, 385).file_name(),
            "area_385_experiment_11_injection_385.csv"
        );
    }

    #[test]
    fn test_second_load_uses_cache() {
        let dir = tempdir().unwrap();
        let service = counting_service();
        let store = MeasurementStore::new(service.clone(), dir.path(), FetchPolicy::FetchMissing).unwrap();

        let first = store.fetch_or_load(385, 11, true, Some(385)).unwrap();
        let second = store.fetch_or_load(385, 11, true, Some(385)).unwrap();

        assert_eq!(first, second);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert!(store.is_cached(&TableKey::injection(385, 11, 385)));
        assert!(!dir.path().join("area_385_experiment_11_injection_385.csv.tmp").exists());
    }

    #[test]
    fn test_empty_response_is_unavailable_and_not_cached() {
        let dir = tempdir().unwrap();
        let service = counting_service();
        let store = MeasurementStore::new(service.clone(), dir.path(), FetchPolicy::FetchMissing).unwrap();

        let result = store.fetch_or_load(385, 99, false, None);
        assert!(matches!(result, Err(AtlasError::DataUnavailable { experiment_id: 99 })));
        assert!(!store.is_cached(&TableKey::full(385, 99)));

        // Same store: answered from memory
        let again = store.fetch_or_load(385, 99, false, None);
        assert!(again.unwrap_err().is_data_unavailable());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        // A new store (next run) asks the atlas again
        let next_run = MeasurementStore::new(service.clone(), dir.path(), FetchPolicy::FetchMissing).unwrap();
        let _ = next_run.fetch_or_load(385, 99, false, None);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_only_never_queries() {
        let dir = tempdir().unwrap();
        let service = counting_service();
        let store = MeasurementStore::new(service.clone(), dir.path(), FetchPolicy::CacheOnly).unwrap();

        let result = store.fetch_or_load(385, 11, false, None);
        assert!(result.unwrap_err().is_data_unavailable());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prefetch_reports_failures() {
        let dir = tempdir().unwrap();
        let store = MeasurementStore::new(counting_service(), dir.path(), FetchPolicy::FetchMissing).unwrap();

        let report = store.prefetch(vec![(385, 11), (385, 12)]);
        assert_eq!(report.available, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 12);
        assert!(store.is_cached(&TableKey::full(385, 11)));
    }

    #[test]
    fn test_prefetch_failures_are_not_queried_again() {
        let dir = tempdir().unwrap();
        let service = counting_service();
        let store = MeasurementStore::new(service.clone(), dir.path(), FetchPolicy::FetchMissing).unwrap();

        store.prefetch(vec![(385, 11), (385, 12)]);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);

        assert!(store.fetch_or_load(385, 11, false, None).is_ok());
        assert!(store.fetch_or_load(385, 12, false, None).unwrap_err().is_data_unavailable());
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
