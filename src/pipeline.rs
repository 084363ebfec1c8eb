use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::warn;

use crate::domain::{DATASETS, MERGE_TARGETS, MergeTarget, WORLD_MAP_FILENAME};
use crate::error::OkavangoError;
use crate::fetch::{FetchResult, Fetcher, Retriever};
use crate::merge::{MergedMaps, merge};
use crate::table::Table;
use crate::world::WorldMap;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Discards all events.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct RawDatasetInfo {
    pub key: String,
    pub rows: usize,
    pub columns: usize,
}

/// Retrieval and merge as explicit steps over one download directory.
///
/// Nothing happens on construction; callers run [`Pipeline::fetch_all`]
/// before [`Pipeline::process_and_merge`].
pub struct Pipeline<F: Fetcher> {
    download_dir: Utf8PathBuf,
    retriever: Retriever<F>,
    targets: Vec<MergeTarget>,
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(download_dir: impl Into<Utf8PathBuf>, retriever: Retriever<F>) -> Self {
        Self {
            download_dir: download_dir.into(),
            retriever,
            targets: MERGE_TARGETS.to_vec(),
        }
    }

    /// Restricts loading and merging to the given targets.
    pub fn with_targets(mut self, targets: Vec<MergeTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn fetch_all(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, OkavangoError> {
        self.retriever
            .ensure_all(&self.download_dir, DATASETS, force, sink)
    }

    /// Every indicator CSV keyed by its short name. Absent files are skipped.
    pub fn load_raw_datasets(&self) -> Result<Vec<(String, Table)>, OkavangoError> {
        let mut datasets = Vec::new();
        for target in &self.targets {
            let path = self.download_dir.join(target.filename);
            if !path.as_std_path().exists() {
                warn!(path = %path, "dataset not found, skipping");
                continue;
            }
            datasets.push((
                target.key.to_string(),
                Table::from_path(path.as_std_path())?,
            ));
        }
        Ok(datasets)
    }

    pub fn raw_dataset_info(&self) -> Result<Vec<RawDatasetInfo>, OkavangoError> {
        Ok(self
            .load_raw_datasets()?
            .into_iter()
            .map(|(key, table)| RawDatasetInfo {
                key,
                rows: table.len(),
                columns: table.columns().len(),
            })
            .collect())
    }

    pub fn load_world_map(&self) -> Result<WorldMap, OkavangoError> {
        WorldMap::from_zip(self.download_dir.join(WORLD_MAP_FILENAME).as_std_path())
    }

    /// Indicator tables keyed by display label; any absent file is fatal.
    pub fn load_merge_inputs(&self) -> Result<Vec<(String, Table)>, OkavangoError> {
        self.targets
            .iter()
            .map(|target| {
                let path = self.download_dir.join(target.filename);
                Ok((
                    target.label.to_string(),
                    Table::from_path(path.as_std_path())?,
                ))
            })
            .collect()
    }

    pub fn process_and_merge(&self) -> Result<MergedMaps, OkavangoError> {
        let world = self.load_world_map()?;
        let datasets = self.load_merge_inputs()?;
        merge(&world, &datasets)
    }

    pub fn run(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<(FetchResult, MergedMaps), OkavangoError> {
        let fetched = self.fetch_all(force, sink)?;
        let merged = self.process_and_merge()?;
        Ok((fetched, merged))
    }
}
