// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listing ZFS datasets.

use crate::coerce::{projection, Field, Property};
use crate::command::{self, Row};
use crate::host::{BoxedExecutor, ExecutionError};
use crate::ParseError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const ZFS: &str = "zfs";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("ZFS execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Dataset not found")]
    NotFound,
}

/// Error returned by [`Zfs::list_by_type`].
#[derive(thiserror::Error, Debug)]
#[error("Could not list datasets (type: {kind}, filter: {filter:?}): {err}")]
pub struct ListDatasetsError {
    pub kind: String,
    pub filter: Option<String>,
    #[source]
    pub err: Error,
}

/// Error returned by [`Zfs::get_dataset`].
#[derive(thiserror::Error, Debug)]
#[error("Could not get dataset {name}: {err}")]
pub struct GetDatasetError {
    pub name: String,
    #[source]
    pub err: Error,
}

/// The type of a dataset, as reported by its `type` property.
///
/// Clones are not a type of their own: they report as filesystems (or
/// volumes) with an `origin`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum DatasetType {
    Filesystem,
    Snapshot,
    Volume,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Filesystem => "filesystem",
            DatasetType::Snapshot => "snapshot",
            DatasetType::Volume => "volume",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(DatasetType::Filesystem),
            "snapshot" => Ok(DatasetType::Snapshot),
            "volume" => Ok(DatasetType::Volume),
            _ => Err(format!("Unrecognized dataset type: {s}")),
        }
    }
}

/// A ZFS dataset: a filesystem, snapshot, volume or clone.
///
/// Every property is kept exactly as `zfs list -p` printed it. The
/// vocabulary is large and varies between ZFS versions, so interpreting the
/// values is left to consumers. The meaning of each property is described in
/// zfsprops(7).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: String,
    pub available: String,
    pub clones: String,
    pub compressratio: String,
    pub creation: String,
    pub defer_destroy: String,
    pub logicalreferenced: String,
    pub logicalused: String,
    pub mounted: String,
    pub origin: String,
    pub refcompressratio: String,
    pub referenced: String,
    #[serde(rename = "type")]
    pub dataset_type: String,
    pub used: String,
    pub usedbychildren: String,
    pub usedbydataset: String,
    pub usedbyrefreservation: String,
    pub usedbysnapshots: String,
    pub userrefs: String,
    pub written: String,
    pub aclinherit: String,
    pub acltype: String,
    pub atime: String,
    pub canmount: String,
    pub casesensitivity: String,
    pub checksum: String,
    pub compression: String,
    pub context: String,
    pub copies: String,
    pub dedup: String,
    pub defcontext: String,
    pub devices: String,
    pub exec: String,
    pub filesystem_count: String,
    pub filesystem_limit: String,
    pub fscontext: String,
    pub logbias: String,
    pub mlslabel: String,
    pub mountpoint: String,
    pub nbmand: String,
    pub normalization: String,
    pub overlay: String,
    pub primarycache: String,
    pub quota: String,
    pub readonly: String,
    pub recordsize: String,
    pub redundant_metadata: String,
    pub refquota: String,
    pub refreservation: String,
    pub relatime: String,
    pub reservation: String,
    pub rootcontext: String,
    pub secondarycache: String,
    pub setuid: String,
    pub sharenfs: String,
    pub sharesmb: String,
    pub snapdev: String,
    pub snapdir: String,
    pub snapshot_count: String,
    pub snapshot_limit: String,
    pub sync: String,
    pub utf8only: String,
    pub version: String,
    pub volblocksize: String,
    pub volsize: String,
    pub vscan: String,
    pub xattr: String,
    pub zoned: String,
}

macro_rules! text {
    ($name:literal, $field:ident) => {
        Property { name: $name, field: Field::Text(|d| &mut d.$field) }
    };
}

/// The properties requested from `zfs list`, in column order.
///
/// This list is both the `-o` argument and the parser, so the position of an
/// entry is the column it is read from.
pub static DATASET_PROPERTIES: &[Property<Dataset>] = &[
    text!("name", name),
    text!("available", available),
    text!("clones", clones),
    text!("compressratio", compressratio),
    text!("creation", creation),
    text!("defer_destroy", defer_destroy),
    text!("logicalreferenced", logicalreferenced),
    text!("logicalused", logicalused),
    text!("mounted", mounted),
    text!("origin", origin),
    text!("refcompressratio", refcompressratio),
    text!("referenced", referenced),
    text!("type", dataset_type),
    text!("used", used),
    text!("usedbychildren", usedbychildren),
    text!("usedbydataset", usedbydataset),
    text!("usedbyrefreservation", usedbyrefreservation),
    text!("usedbysnapshots", usedbysnapshots),
    text!("userrefs", userrefs),
    text!("written", written),
    text!("aclinherit", aclinherit),
    text!("acltype", acltype),
    text!("atime", atime),
    text!("canmount", canmount),
    text!("casesensitivity", casesensitivity),
    text!("checksum", checksum),
    text!("compression", compression),
    text!("context", context),
    text!("copies", copies),
    text!("dedup", dedup),
    text!("defcontext", defcontext),
    text!("devices", devices),
    text!("exec", exec),
    text!("filesystem_count", filesystem_count),
    text!("filesystem_limit", filesystem_limit),
    text!("fscontext", fscontext),
    text!("logbias", logbias),
    text!("mlslabel", mlslabel),
    text!("mountpoint", mountpoint),
    text!("nbmand", nbmand),
    text!("normalization", normalization),
    text!("overlay", overlay),
    text!("primarycache", primarycache),
    text!("quota", quota),
    text!("readonly", readonly),
    text!("recordsize", recordsize),
    text!("redundant_metadata", redundant_metadata),
    text!("refquota", refquota),
    text!("refreservation", refreservation),
    text!("relatime", relatime),
    text!("reservation", reservation),
    text!("rootcontext", rootcontext),
    text!("secondarycache", secondarycache),
    text!("setuid", setuid),
    text!("sharenfs", sharenfs),
    text!("sharesmb", sharesmb),
    text!("snapdev", snapdev),
    text!("snapdir", snapdir),
    text!("snapshot_count", snapshot_count),
    text!("snapshot_limit", snapshot_limit),
    text!("sync", sync),
    text!("utf8only", utf8only),
    text!("version", version),
    text!("volblocksize", volblocksize),
    text!("volsize", volsize),
    text!("vscan", vscan),
    text!("xattr", xattr),
    text!("zoned", zoned),
];

/// Returns the `-o` argument matching [`DATASET_PROPERTIES`].
pub fn dataset_projection() -> String {
    projection(DATASET_PROPERTIES)
}

impl Dataset {
    /// Parses the `type` property.
    pub fn kind(&self) -> Option<DatasetType> {
        self.dataset_type.parse().ok()
    }

    /// A clone is a dataset created from a snapshot, which it names as its
    /// `origin`.
    pub fn is_clone(&self) -> bool {
        !self.origin.is_empty() && self.origin != "-"
    }

    /// The name of the pool holding this dataset: the first component of its
    /// name.
    pub fn pool_name(&self) -> &str {
        match self.name.find(|c| c == '/' || c == '@') {
            Some(i) => &self.name[..i],
            None => &self.name,
        }
    }

    fn apply_row(&mut self, row: &[String]) -> Result<(), ParseError> {
        crate::coerce::apply_columns(DATASET_PROPERTIES, self, row)
    }
}

/// Builds datasets from the rows of a `zfs list` using
/// [`DATASET_PROPERTIES`].
///
/// Consecutive rows naming the same dataset are folded into a single entity,
/// with later rows overwriting earlier values. Datasets are returned in the
/// order they were first seen.
pub fn parse_datasets(rows: &[Row]) -> Result<Vec<Dataset>, ParseError> {
    let mut datasets: Vec<Dataset> = Vec::new();
    for row in rows {
        match datasets.last_mut() {
            Some(dataset) if row.first() == Some(&dataset.name) => {
                dataset.apply_row(row)?;
            }
            _ => {
                let mut dataset = Dataset::default();
                dataset.apply_row(row)?;
                datasets.push(dataset);
            }
        }
    }
    Ok(datasets)
}

/// Wraps commands for interacting with ZFS.
pub struct Zfs {}

impl Zfs {
    /// Recursively lists datasets of one type, or of every type if
    /// `kind` is `None`.
    ///
    /// `filter` restricts the listing to a dataset and its descendants.
    pub fn list_by_type(
        executor: &BoxedExecutor,
        program: &str,
        kind: Option<DatasetType>,
        filter: Option<&str>,
    ) -> Result<Vec<Dataset>, ListDatasetsError> {
        let kind_arg = kind.map_or("all", |k| k.as_str());
        let projection = dataset_projection();
        let mut args =
            vec!["list", "-rpH", "-t", kind_arg, "-o", projection.as_str()];
        if let Some(filter) = filter {
            args.push(filter);
        }

        let err = |err: Error| ListDatasetsError {
            kind: kind_arg.to_string(),
            filter: filter.map(String::from),
            err,
        };
        let rows = command::run(executor, program, args)
            .map_err(|e| err(e.into()))?;
        parse_datasets(&rows).map_err(|e| err(e.into()))
    }

    /// Fetches a single dataset of any type by name.
    pub fn get_dataset(
        executor: &BoxedExecutor,
        program: &str,
        name: &str,
    ) -> Result<Dataset, GetDatasetError> {
        let projection = dataset_projection();
        let err = |err: Error| GetDatasetError { name: name.to_string(), err };

        let rows = command::run(
            executor,
            program,
            ["list", "-Hp", "-o", projection.as_str(), name],
        )
        .map_err(|e| err(e.into()))?;
        parse_datasets(&rows)
            .map_err(|e| err(e.into()))?
            .into_iter()
            .next()
            .ok_or_else(|| err(Error::NotFound))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::{CommandSequence, FakeExecutor};
    use crate::testing::{
        dataset_line, test_log, zfs_get_input, zfs_list_input,
    };
    use std::collections::BTreeSet;

    fn text_field(field: &Field<Dataset>) -> fn(&mut Dataset) -> &mut String {
        match field {
            Field::Text(f) => *f,
            _ => panic!("dataset properties are all text"),
        }
    }

    #[test]
    fn test_projection_matches_parser() {
        let projection = dataset_projection();
        let names: Vec<&str> = projection.split(',').collect();
        assert_eq!(names.len(), DATASET_PROPERTIES.len());
        assert_eq!(names.len(), 68);
        assert_eq!(names.first(), Some(&"name"));
        assert_eq!(names.last(), Some(&"zoned"));

        let unique: BTreeSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len(), "duplicate property names");

        // Feed a row where every column is distinct. If two entries of the
        // schema pointed at the same field, the earlier column would be
        // overwritten and read back wrong.
        let row: Row =
            (0..DATASET_PROPERTIES.len()).map(|i| format!("col{i}")).collect();
        let mut datasets = parse_datasets(&[row]).unwrap();
        assert_eq!(datasets.len(), 1);
        let dataset = &mut datasets[0];
        for (i, property) in DATASET_PROPERTIES.iter().enumerate() {
            let field = text_field(&property.field);
            assert_eq!(
                field(dataset).as_str(),
                format!("col{i}"),
                "column {i} ({}) landed in the wrong field",
                property.name
            );
        }
    }

    #[test]
    fn test_projection_matches_serialized_names() {
        // Events are keyed by serialized field name, which should be the
        // property name.
        let dataset = Dataset::default();
        let value = serde_json::to_value(&dataset).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), DATASET_PROPERTIES.len());
        for property in DATASET_PROPERTIES {
            assert!(object.contains_key(property.name), "{}", property.name);
        }
    }

    #[test]
    fn test_parse_distinct_names_in_order() {
        let rows = command::split_rows(&format!(
            "{}\n{}\n{}\n",
            dataset_line(&[("name", "tank")]),
            dataset_line(&[("name", "tank/home")]),
            dataset_line(&[("name", "tank/home@snap1")]),
        ));
        let datasets = parse_datasets(&rows).unwrap();
        let names: Vec<&str> =
            datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["tank", "tank/home", "tank/home@snap1"]);
        assert_eq!(datasets[1].mountpoint, "mountpoint-value");
    }

    #[test]
    fn test_parse_folds_repeated_names() {
        let rows = command::split_rows(&format!(
            "{}\n{}\n{}\n",
            dataset_line(&[("name", "tank"), ("used", "100")]),
            dataset_line(&[("name", "tank"), ("used", "200")]),
            dataset_line(&[("name", "tank/home")]),
        ));
        let datasets = parse_datasets(&rows).unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].name, "tank");
        assert_eq!(datasets[0].used, "200");
        assert_eq!(datasets[1].name, "tank/home");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_datasets(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_short_row() {
        let row: Row = (0..10).map(|i| format!("col{i}")).collect();
        let err = parse_datasets(&[row]).unwrap_err();
        assert_eq!(
            err,
            ParseError::ShortRow { expected: DATASET_PROPERTIES.len(), found: 10 }
        );
    }

    #[test]
    fn test_dataset_helpers() {
        let mut dataset = Dataset {
            name: "tank/home@snap1".to_string(),
            dataset_type: "snapshot".to_string(),
            origin: "-".to_string(),
            ..Default::default()
        };
        assert_eq!(dataset.kind(), Some(DatasetType::Snapshot));
        assert_eq!(dataset.pool_name(), "tank");
        assert!(!dataset.is_clone());

        dataset.name = "tank/clone".to_string();
        dataset.dataset_type = "filesystem".to_string();
        dataset.origin = "tank/home@snap1".to_string();
        assert_eq!(dataset.kind(), Some(DatasetType::Filesystem));
        assert!(dataset.is_clone());

        dataset.name = "tank".to_string();
        dataset.dataset_type = "bookmark".to_string();
        assert_eq!(dataset.pool_name(), "tank");
        assert_eq!(dataset.kind(), None);
    }

    #[test]
    fn test_list_by_type() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(
            zfs_list_input("filesystem", None),
            format!(
                "{}\n{}\n{}\n",
                dataset_line(&[("name", "rpool"), ("type", "filesystem")]),
                dataset_line(&[("name", "tank"), ("type", "filesystem")]),
                dataset_line(&[("name", "tank/home"), ("type", "filesystem")]),
            ),
        );
        seq.register(&executor);

        let datasets = Zfs::list_by_type(
            &executor.as_executor(),
            ZFS,
            Some(DatasetType::Filesystem),
            None,
        )
        .unwrap();
        assert_eq!(datasets.len(), 3);
        assert_eq!(datasets[0].name, "rpool");
        assert_eq!(datasets[1].name, "tank");
        assert_eq!(datasets[2].name, "tank/home");
        assert!(datasets
            .iter()
            .all(|d| d.kind() == Some(DatasetType::Filesystem)));
    }

    #[test]
    fn test_list_by_type_all_with_filter() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zfs_list_input("all", Some("tank/home")), "");
        seq.register(&executor);

        let datasets = Zfs::list_by_type(
            &executor.as_executor(),
            ZFS,
            None,
            Some("tank/home"),
        )
        .unwrap();
        assert!(datasets.is_empty());
    }

    #[test]
    fn test_list_by_type_short_row_fails_whole_listing() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        let short: Vec<String> = (0..10).map(|i| format!("col{i}")).collect();
        seq.expect_stdout(
            zfs_list_input("snapshot", None),
            format!(
                "{}\n{}\n",
                dataset_line(&[("name", "tank@a")]),
                short.join("\t")
            ),
        );
        seq.register(&executor);

        let err = Zfs::list_by_type(
            &executor.as_executor(),
            ZFS,
            Some(DatasetType::Snapshot),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind, "snapshot");
        assert!(matches!(
            err.err,
            Error::Parse(ParseError::ShortRow { expected: 68, found: 10 })
        ));
    }

    #[test]
    fn test_list_by_type_blank_line_fails_whole_listing() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(
            zfs_list_input("filesystem", None),
            format!(
                "{}\n\n{}\n",
                dataset_line(&[("name", "tank")]),
                dataset_line(&[("name", "tank/home")]),
            ),
        );
        seq.register(&executor);

        let err = Zfs::list_by_type(
            &executor.as_executor(),
            ZFS,
            Some(DatasetType::Filesystem),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err.err,
            Error::Parse(ParseError::ShortRow { expected: 68, found: 1 })
        ));
    }

    #[test]
    fn test_get_dataset() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(
            zfs_get_input("tank/vol"),
            format!(
                "{}\n",
                dataset_line(&[
                    ("name", "tank/vol"),
                    ("type", "volume"),
                    ("volsize", "1073741824"),
                ])
            ),
        );
        seq.register(&executor);

        let dataset =
            Zfs::get_dataset(&executor.as_executor(), ZFS, "tank/vol").unwrap();
        assert_eq!(dataset.name, "tank/vol");
        assert_eq!(dataset.kind(), Some(DatasetType::Volume));
        assert_eq!(dataset.volsize, "1073741824");
    }

    #[test]
    fn test_get_dataset_not_found() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        let input = zfs_get_input("tank/gone");
        seq.expect_stdout(input.clone(), "");
        seq.expect_stderr(
            input,
            "cannot open 'tank/gone': dataset does not exist\n",
        );
        seq.register(&executor);
        let executor = executor.as_executor();

        let err = Zfs::get_dataset(&executor, ZFS, "tank/gone").unwrap_err();
        assert_eq!(err.name, "tank/gone");
        assert!(matches!(err.err, Error::NotFound));

        let err = Zfs::get_dataset(&executor, ZFS, "tank/gone").unwrap_err();
        let Error::Execution(exec) = &err.err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(
            exec.stderr(),
            Some("cannot open 'tank/gone': dataset does not exist\n")
        );
    }
}
