// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The entry point for reading pools and datasets.

use crate::host::BoxedExecutor;
use crate::zfs::{
    Dataset, DatasetType, GetDatasetError, ListDatasetsError, Zfs, ZFS,
};
use crate::zpool::{GetInfoError, ListError, Zpool, ZpoolInfo, ZPOOL};
use slog::{debug, o, Logger};

/// Reads pools and datasets from the host, through an executor.
///
/// Every call runs fresh commands; nothing is cached between calls.
#[derive(Clone)]
pub struct Inventory {
    log: Logger,
    executor: BoxedExecutor,
    zfs: String,
    zpool: String,
}

impl Inventory {
    /// Creates an inventory which runs `zfs` and `zpool` from `PATH`.
    pub fn new(log: &Logger, executor: BoxedExecutor) -> Self {
        Self {
            log: log.new(o!("component" => "Inventory")),
            executor,
            zfs: ZFS.to_string(),
            zpool: ZPOOL.to_string(),
        }
    }

    /// Overrides the programs run for `zfs` and `zpool`.
    pub fn with_programs(
        mut self,
        zfs: impl Into<String>,
        zpool: impl Into<String>,
    ) -> Self {
        self.zfs = zfs.into();
        self.zpool = zpool.into();
        self
    }

    fn list(
        &self,
        kind: Option<DatasetType>,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        let datasets =
            Zfs::list_by_type(&self.executor, &self.zfs, kind, filter)?;
        debug!(
            self.log,
            "listed datasets";
            "type" => kind.map_or("all", |k| k.as_str()),
            "filter" => filter,
            "count" => datasets.len(),
        );
        Ok(datasets)
    }

    /// Lists datasets of every type.
    pub fn datasets(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        self.list(None, filter)
    }

    pub fn filesystems(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        self.list(Some(DatasetType::Filesystem), filter)
    }

    pub fn volumes(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        self.list(Some(DatasetType::Volume), filter)
    }

    pub fn snapshots(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        self.list(Some(DatasetType::Snapshot), filter)
    }

    /// Lists the snapshots of `dataset` and of its descendants.
    pub fn snapshots_of(
        &self,
        dataset: &Dataset,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        self.snapshots(Some(&dataset.name))
    }

    pub fn get_dataset(&self, name: &str) -> Result<Dataset, GetDatasetError> {
        Zfs::get_dataset(&self.executor, &self.zfs, name)
    }

    /// Fetches every imported pool.
    pub fn zpools(&self) -> Result<Vec<ZpoolInfo>, ListError> {
        let pools = Zpool::list(&self.executor, &self.zpool)?;
        debug!(self.log, "listed zpools"; "count" => pools.len());
        Ok(pools)
    }

    pub fn get_zpool(&self, name: &str) -> Result<ZpoolInfo, GetInfoError> {
        Zpool::get_info(&self.executor, &self.zpool, name)
    }
}
