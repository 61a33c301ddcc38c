//! Mosaic lifecycle operations over a store and the granule files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use mosaic_common::{
    encode, ArchiveHour, Granule, GranuleRecord, GranuleSelection, MosaicResult, MosaicStore,
};
use retention::{RetentionPolicy, SweepRule};

use crate::files::GranuleFiles;
use crate::layer::MosaicLayer;

/// Result of removing one selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalStats {
    /// Index records deleted
    pub granules_removed: usize,
    /// Granule files deleted (missing files are not counted)
    pub files_deleted: usize,
}

impl RemovalStats {
    fn add(&mut self, other: RemovalStats) {
        self.granules_removed += other.granules_removed;
        self.files_deleted += other.files_deleted;
    }
}

/// Per-rule outcome of a retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub steps: Vec<(SweepRule, RemovalStats)>,
}

impl SweepReport {
    pub fn total(&self) -> RemovalStats {
        let mut total = RemovalStats::default();
        for (_, stats) in &self.steps {
            total.add(*stats);
        }
        total
    }

    pub fn removed_by(&self, rule: SweepRule) -> usize {
        self.steps
            .iter()
            .filter(|(r, _)| *r == rule)
            .map(|(_, s)| s.granules_removed)
            .sum()
    }
}

/// What happened to an ingestion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A granule with the same name is already indexed
    AlreadyIndexed,
    /// The file was placed at `path` and announced to the store
    Published { path: PathBuf },
}

/// Runs the mosaic lifecycle for any layer of one store.
pub struct MosaicManager<S: MosaicStore + ?Sized> {
    store: Arc<S>,
    files: GranuleFiles,
    publish_delay: Duration,
}

impl<S: MosaicStore + ?Sized> MosaicManager<S> {
    pub fn new(store: Arc<S>, files: GranuleFiles) -> Self {
        Self {
            store,
            files,
            publish_delay: Duration::ZERO,
        }
    }

    /// Wait this long between placing a granule file and publishing it,
    /// for data directories mirrored to the map server.
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn files(&self) -> &GranuleFiles {
        &self.files
    }

    /// Index records matching `selection`; a timed-out query yields nothing.
    async fn query(
        &self,
        layer: &str,
        selection: Option<&GranuleSelection>,
    ) -> MosaicResult<Vec<GranuleRecord>> {
        match self.store.list_granules(layer, selection).await {
            Ok(records) => Ok(records),
            Err(e) if e.is_degradable() => {
                warn!(layer = %layer, error = %e, "Granule index unavailable, assuming empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Locations of every granule indexed for `layer`.
    #[instrument(skip(self))]
    pub async fn list_granule_filenames(&self, layer: &str) -> MosaicResult<Vec<String>> {
        let records = self.query(layer, None).await?;
        Ok(records.into_iter().map(|r| r.location).collect())
    }

    /// Decoded granules of `layer`, oldest first. Records whose names do not
    /// decode are skipped.
    pub async fn granules(
        &self,
        layer: &str,
        archive_hours: &[ArchiveHour],
    ) -> MosaicResult<Vec<Granule>> {
        let records = self.query(layer, None).await?;
        let mut granules: Vec<Granule> = records
            .iter()
            .filter_map(|record| match Granule::from_record(layer, record, archive_hours) {
                Ok(granule) => Some(granule),
                Err(e) => {
                    warn!(layer = %layer, location = %record.location, error = %e, "Skipping granule");
                    None
                }
            })
            .collect();
        granules.sort_by_key(|g| g.timestamp);
        Ok(granules)
    }

    /// Whether a granule at `timestamp` still needs to be ingested.
    pub async fn should_ingest(&self, layer: &str, timestamp: DateTime<Utc>) -> MosaicResult<bool> {
        let expected = encode(layer, timestamp)?;
        let records = self.query(layer, None).await?;
        let indexed = records.iter().any(|r| r.filename() == expected);
        if indexed {
            debug!(layer = %layer, granule = %expected, "Granule already indexed");
        }
        Ok(!indexed)
    }

    /// Delete every granule matching `selection`: the file first, then the
    /// index record. A failed record delete aborts the rest of the batch.
    /// Files whose location escapes the layer directory are left on disk.
    #[instrument(skip(self, selection), fields(filter = %selection))]
    pub async fn remove(&self, layer: &str, selection: &GranuleSelection) -> MosaicResult<RemovalStats> {
        let records = self.query(layer, Some(selection)).await?;
        let mut stats = RemovalStats::default();

        for record in &records {
            match self.files.granule_path(layer, &record.location) {
                Ok(path) => {
                    if self.files.remove(&path).await? {
                        stats.files_deleted += 1;
                    }
                }
                Err(e) => warn!(layer = %layer, id = %record.id, error = %e, "Leaving granule file in place"),
            }
            self.store.delete_granule(layer, &record.id).await?;
            stats.granules_removed += 1;
        }

        Ok(stats)
    }

    /// Run the three retention rules for `layer` at `now`, in order.
    pub async fn sweep(
        &self,
        layer: &str,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> MosaicResult<SweepReport> {
        let mut report = SweepReport::default();

        for step in policy.sweep(now) {
            let stats = self.remove(layer, &step.selection).await?;
            if stats.granules_removed > 0 {
                info!(
                    layer = %layer,
                    rule = %step.rule,
                    removed = stats.granules_removed,
                    files_deleted = stats.files_deleted,
                    "Removed granules"
                );
            }
            report.steps.push((step.rule, stats));
        }

        Ok(report)
    }

    /// Sweep a layer with its own policy. Layers without one are left alone.
    pub async fn maintain(&self, layer: &MosaicLayer, now: DateTime<Utc>) -> MosaicResult<Option<SweepReport>> {
        match &layer.retention {
            Some(policy) => self.sweep(&layer.name, policy, now).await.map(Some),
            None => {
                debug!(layer = %layer.name, "No retention policy, skipping sweep");
                Ok(None)
            }
        }
    }

    /// Place `source` as the granule for `timestamp` and publish it, without
    /// checking the index first.
    #[instrument(skip(self, source), fields(source = %source.display()))]
    pub async fn publish(
        &self,
        layer: &str,
        timestamp: DateTime<Utc>,
        source: &Path,
    ) -> MosaicResult<PathBuf> {
        let filename = encode(layer, timestamp)?;
        let dest = self.files.granule_path(layer, &filename)?;
        self.files.place(source, &dest).await?;

        if !self.publish_delay.is_zero() {
            tokio::time::sleep(self.publish_delay).await;
        }

        self.store.publish_granule(layer, &dest).await?;
        info!(layer = %layer, granule = %filename, "Published granule");
        Ok(dest)
    }

    /// Publish `source` as the granule for `timestamp` unless it is already
    /// indexed.
    pub async fn ingest(
        &self,
        layer: &str,
        timestamp: DateTime<Utc>,
        source: &Path,
    ) -> MosaicResult<IngestOutcome> {
        if !self.should_ingest(layer, timestamp).await? {
            return Ok(IngestOutcome::AlreadyIndexed);
        }
        let path = self.publish(layer, timestamp, source).await?;
        Ok(IngestOutcome::Published { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_common::MosaicError;
    use test_utils::{utc, InMemoryMosaicStore, TempDataDir};

    fn manager(store: InMemoryMosaicStore, data: &TempDataDir) -> MosaicManager<InMemoryMosaicStore> {
        MosaicManager::new(Arc::new(store), GranuleFiles::new(data.root(), data.workspace()))
    }

    #[tokio::test]
    async fn test_list_on_empty_layer() {
        let data = TempDataDir::new("geonode");
        let manager = manager(InMemoryMosaicStore::new(), &data);

        assert!(manager.list_granule_filenames("gfms_current").await.unwrap().is_empty());
        assert!(manager
            .should_ingest("gfms_current", utc(2024, 3, 10, 15))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let data = TempDataDir::new("geonode");
        let store = InMemoryMosaicStore::with_granules("gfms_current", &[utc(2024, 3, 10, 15)]);
        store.simulate_index_timeout(true);
        let manager = manager(store, &data);

        assert!(manager.list_granule_filenames("gfms_current").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_ingest_rejects_sub_hour() {
        let data = TempDataDir::new("geonode");
        let manager = manager(InMemoryMosaicStore::new(), &data);
        let ts = utc(2024, 3, 10, 15) + chrono::Duration::minutes(30);

        assert!(matches!(
            manager.should_ingest("gfms_current", ts).await,
            Err(MosaicError::SubHourTimestamp(_))
        ));
    }

    #[test]
    fn test_sweep_report_totals() {
        let report = SweepReport {
            steps: vec![
                (SweepRule::TodayHourly, RemovalStats { granules_removed: 2, files_deleted: 1 }),
                (SweepRule::YesterdayHourly, RemovalStats::default()),
                (SweepRule::DailyCutoff, RemovalStats { granules_removed: 3, files_deleted: 3 }),
            ],
        };
        assert_eq!(report.total(), RemovalStats { granules_removed: 5, files_deleted: 4 });
        assert_eq!(report.removed_by(SweepRule::DailyCutoff), 3);
    }
}
