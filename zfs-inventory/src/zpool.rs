// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utilities for inspecting Zpools.

use crate::coerce::{apply_named, projection, Field, Property};
use crate::command::{self, Row};
use crate::host::{BoxedExecutor, ExecutionError};
use crate::ParseError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const ZPOOL: &str = "zpool";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Zpool execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(thiserror::Error, Debug)]
pub enum ListError {
    #[error("Failed to list zpools: {0}")]
    Names(#[source] Error),

    #[error("Failed to list zpools: {0}")]
    Info(#[from] GetInfoError),
}

#[derive(thiserror::Error, Debug)]
#[error("Failed to get info for zpool '{name}': {err}")]
pub struct GetInfoError {
    pub name: String,
    #[source]
    pub err: Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZpoolHealth {
    /// The device is online and functioning.
    Online,
    /// One or more components are degraded or faulted, but sufficient
    /// replicas exist to continue functioning.
    Degraded,
    /// One or more components are degraded or faulted, and insufficient
    /// replicas exist to continue functioning.
    Faulted,
    /// The device was explicitly taken offline by "zpool offline".
    Offline,
    /// The device was physically removed.
    Removed,
    /// The device could not be opened.
    Unavailable,
}

impl ZpoolHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZpoolHealth::Online => "ONLINE",
            ZpoolHealth::Degraded => "DEGRADED",
            ZpoolHealth::Faulted => "FAULTED",
            ZpoolHealth::Offline => "OFFLINE",
            ZpoolHealth::Removed => "REMOVED",
            ZpoolHealth::Unavailable => "UNAVAIL",
        }
    }
}

impl fmt::Display for ZpoolHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ZpoolHealth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ONLINE" => Ok(ZpoolHealth::Online),
            "DEGRADED" => Ok(ZpoolHealth::Degraded),
            "FAULTED" => Ok(ZpoolHealth::Faulted),
            "OFFLINE" => Ok(ZpoolHealth::Offline),
            "REMOVED" => Ok(ZpoolHealth::Removed),
            "UNAVAIL" => Ok(ZpoolHealth::Unavailable),
            _ => Err(format!("Unrecognized zpool 'health': {}", s)),
        }
    }
}

/// Describes a Zpool.
///
/// Sizes are in bytes. `capacity` and `fragmentation` are whole percentages,
/// and `dedupratio` is the bare multiplier. Everything else is kept as the
/// text `zpool get -p` printed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ZpoolInfo {
    pub name: String,
    pub size: u64,
    pub capacity: u64,
    pub altroot: String,
    pub health: String,
    pub guid: String,
    pub version: String,
    pub bootfs: String,
    pub delegation: String,
    pub autoreplace: String,
    pub cachefile: String,
    pub failmode: String,
    pub listsnapshots: String,
    pub autoexpand: String,
    pub dedupditto: String,
    pub dedupratio: f64,
    pub free: u64,
    pub allocated: u64,
    pub readonly: String,
    pub ashift: u64,
    pub comment: String,
    pub expandsize: u64,
    pub freeing: u64,
    pub fragmentation: u64,
    pub leaked: u64,
    #[serde(rename = "feature@async_destroy")]
    pub feature_async_destroy: String,
    #[serde(rename = "feature@empty_bpobj")]
    pub feature_empty_bpobj: String,
    #[serde(rename = "feature@lz4_compress")]
    pub feature_lz4_compress: String,
    #[serde(rename = "feature@spacemap_histogram")]
    pub feature_spacemap_histogram: String,
    #[serde(rename = "feature@enabled_txg")]
    pub feature_enabled_txg: String,
    #[serde(rename = "feature@hole_birth")]
    pub feature_hole_birth: String,
    #[serde(rename = "feature@extensible_dataset")]
    pub feature_extensible_dataset: String,
    #[serde(rename = "feature@embedded_data")]
    pub feature_embedded_data: String,
    #[serde(rename = "feature@bookmarks")]
    pub feature_bookmarks: String,
    #[serde(rename = "feature@filesystem_limits")]
    pub feature_filesystem_limits: String,
    #[serde(rename = "feature@large_blocks")]
    pub feature_large_blocks: String,
}

impl ZpoolInfo {
    /// Parses the `health` property.
    pub fn health_state(&self) -> Option<ZpoolHealth> {
        self.health.parse().ok()
    }
}

macro_rules! prop {
    ($name:literal, $kind:ident, $field:ident) => {
        Property { name: $name, field: Field::$kind(|z| &mut z.$field) }
    };
}

/// The properties requested from `zpool get`, and the field each one fills.
pub static ZPOOL_PROPERTIES: &[Property<ZpoolInfo>] = &[
    prop!("name", Text, name),
    prop!("size", Unsigned, size),
    prop!("capacity", Percent, capacity),
    prop!("altroot", Text, altroot),
    prop!("health", Text, health),
    prop!("guid", Text, guid),
    prop!("version", Text, version),
    prop!("bootfs", Text, bootfs),
    prop!("delegation", Text, delegation),
    prop!("autoreplace", Text, autoreplace),
    prop!("cachefile", Text, cachefile),
    prop!("failmode", Text, failmode),
    prop!("listsnapshots", Text, listsnapshots),
    prop!("autoexpand", Text, autoexpand),
    prop!("dedupditto", Text, dedupditto),
    prop!("dedupratio", Ratio, dedupratio),
    prop!("free", Unsigned, free),
    prop!("allocated", Unsigned, allocated),
    prop!("readonly", Text, readonly),
    prop!("ashift", Unsigned, ashift),
    prop!("comment", Text, comment),
    prop!("expandsize", Unsigned, expandsize),
    prop!("freeing", Unsigned, freeing),
    prop!("fragmentation", Percent, fragmentation),
    prop!("leaked", Unsigned, leaked),
    prop!("feature@async_destroy", Text, feature_async_destroy),
    prop!("feature@empty_bpobj", Text, feature_empty_bpobj),
    prop!("feature@lz4_compress", Text, feature_lz4_compress),
    prop!("feature@spacemap_histogram", Text, feature_spacemap_histogram),
    prop!("feature@enabled_txg", Text, feature_enabled_txg),
    prop!("feature@hole_birth", Text, feature_hole_birth),
    prop!("feature@extensible_dataset", Text, feature_extensible_dataset),
    prop!("feature@embedded_data", Text, feature_embedded_data),
    prop!("feature@bookmarks", Text, feature_bookmarks),
    prop!("feature@filesystem_limits", Text, feature_filesystem_limits),
    prop!("feature@large_blocks", Text, feature_large_blocks),
];

/// Returns the property list passed to `zpool get`.
pub fn zpool_projection() -> String {
    projection(ZPOOL_PROPERTIES)
}

/// Builds a pool from the `<pool> <property> <value> <source>` rows of a
/// `zpool get`, with the header line already removed.
///
/// Properties missing from [`ZPOOL_PROPERTIES`] are skipped, so that output
/// from a newer `zpool` which knows more properties still parses.
pub fn parse_zpool(name: &str, rows: &[Row]) -> Result<ZpoolInfo, ParseError> {
    let mut zpool = ZpoolInfo { name: name.to_string(), ..Default::default() };
    for row in rows {
        let [_, property, value, ..] = row.as_slice() else {
            return Err(ParseError::ShortRow { expected: 3, found: row.len() });
        };
        apply_named(ZPOOL_PROPERTIES, &mut zpool, property, value)?;
    }
    Ok(zpool)
}

/// Wraps commands for interacting with ZFS pools.
pub struct Zpool {}

impl Zpool {
    /// Lists the names of all imported pools.
    ///
    /// A blank line names no pool and is skipped.
    pub fn list_names(
        executor: &BoxedExecutor,
        program: &str,
    ) -> Result<Vec<String>, Error> {
        let rows = command::run(executor, program, ["list", "-Ho", "name"])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Fetches every imported pool, one `zpool get` per pool.
    ///
    /// Fails as a whole if any single pool cannot be fetched.
    pub fn list(
        executor: &BoxedExecutor,
        program: &str,
    ) -> Result<Vec<ZpoolInfo>, ListError> {
        let names =
            Self::list_names(executor, program).map_err(ListError::Names)?;
        let mut pools = Vec::with_capacity(names.len());
        for name in &names {
            pools.push(Self::get_info(executor, program, name)?);
        }
        Ok(pools)
    }

    pub fn get_info(
        executor: &BoxedExecutor,
        program: &str,
        name: &str,
    ) -> Result<ZpoolInfo, GetInfoError> {
        let projection = zpool_projection();
        let err = |err: Error| GetInfoError { name: name.to_string(), err };

        let rows = command::run(
            executor,
            program,
            ["get", "-p", projection.as_str(), name],
        )
        .map_err(|e| err(e.into()))?;

        // Without -H, the first line is a header.
        let rows = rows.get(1..).unwrap_or_default();
        parse_zpool(name, rows).map_err(|e| err(e.into()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coerce::{MalformedNumber, NumberKind};
    use crate::host::{CommandSequence, FakeExecutor};
    use crate::testing::{
        test_log, zpool_get_input, zpool_get_output, zpool_list_input,
    };
    use std::collections::BTreeSet;

    #[test]
    fn test_projection_matches_parser() {
        let projection = zpool_projection();
        let names: Vec<&str> = projection.split(',').collect();
        assert_eq!(names.len(), ZPOOL_PROPERTIES.len());
        let unique: BTreeSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len(), "duplicate property names");

        // Give every property a distinct value of the right shape, then read
        // each one back through its own field.
        let rows: Vec<Row> = ZPOOL_PROPERTIES
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let value = match p.field {
                    Field::Text(_) => format!("text{i}"),
                    Field::Unsigned(_) => format!("{i}"),
                    Field::Percent(_) => format!("{i}%"),
                    Field::Ratio(_) => format!("{i}.50x"),
                };
                vec!["tank".to_string(), p.name.to_string(), value, "-".into()]
            })
            .collect();
        let mut zpool = parse_zpool("tank", &rows).unwrap();

        for (i, property) in ZPOOL_PROPERTIES.iter().enumerate() {
            let name = property.name;
            match property.field {
                Field::Text(f) => {
                    assert_eq!(*f(&mut zpool), format!("text{i}"), "{name}")
                }
                Field::Unsigned(f) | Field::Percent(f) => {
                    assert_eq!(*f(&mut zpool), i as u64, "{name}")
                }
                Field::Ratio(f) => {
                    assert_eq!(*f(&mut zpool), i as f64 + 0.5, "{name}")
                }
            }
        }
    }

    #[test]
    fn test_projection_matches_serialized_names() {
        let value = serde_json::to_value(ZpoolInfo::default()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), ZPOOL_PROPERTIES.len());
        for property in ZPOOL_PROPERTIES {
            assert!(object.contains_key(property.name), "{}", property.name);
        }
    }

    #[test]
    fn test_parse_zpool() {
        let rows = command::split_rows(
            "tank\tsize\t1000000\t-\n\
             tank\tcapacity\t42%\t-\n\
             tank\thealth\tONLINE\t-\n\
             tank\tdedupratio\t1.23x\t-\n\
             tank\tfragmentation\t7%\t-\n\
             tank\tfeature@bookmarks\tenabled\tlocal\n\
             tank\tfeature@zilsaxattr\tactive\tlocal\n\
             tank\tload_guid\t1234\t-\n",
        );
        let zpool = parse_zpool("tank", &rows).unwrap();
        assert_eq!(
            zpool,
            ZpoolInfo {
                name: "tank".to_string(),
                size: 1000000,
                capacity: 42,
                health: "ONLINE".to_string(),
                dedupratio: 1.23,
                fragmentation: 7,
                feature_bookmarks: "enabled".to_string(),
                ..Default::default()
            }
        );
        assert_eq!(zpool.health_state(), Some(ZpoolHealth::Online));
    }

    #[test]
    fn test_parse_zpool_short_row() {
        let rows = vec![vec!["tank".to_string(), "size".to_string()]];
        let err = parse_zpool("tank", &rows).unwrap_err();
        assert_eq!(err, ParseError::ShortRow { expected: 3, found: 2 });
    }

    #[test]
    fn test_parse_zpool_not_applicable_is_malformed() {
        let rows = command::split_rows("tank\texpandsize\t-\t-\n");
        let err = parse_zpool("tank", &rows).unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedNumber {
                property: "expandsize".to_string(),
                err: MalformedNumber {
                    value: "-".to_string(),
                    kind: NumberKind::Unsigned,
                },
            }
        );
    }

    #[test]
    fn test_health() {
        for state in ["ONLINE", "DEGRADED", "FAULTED", "OFFLINE", "REMOVED", "UNAVAIL"]
        {
            let health: ZpoolHealth = state.parse().unwrap();
            assert_eq!(health.to_string(), state);
        }
        assert!("SUSPENDED".parse::<ZpoolHealth>().is_err());

        let zpool =
            ZpoolInfo { health: "SUSPENDED".to_string(), ..Default::default() };
        assert_eq!(zpool.health_state(), None);
    }

    #[test]
    fn test_get_info_discards_header() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(
            zpool_get_input("rpool"),
            zpool_get_output(&[
                ("rpool", "size", "68719476736"),
                ("rpool", "free", "68718428160"),
                ("rpool", "allocated", "1048576"),
                ("rpool", "health", "DEGRADED"),
                ("rpool", "ashift", "12"),
                ("rpool", "comment", "-"),
            ]),
        );
        seq.register(&executor);

        let zpool =
            Zpool::get_info(&executor.as_executor(), ZPOOL, "rpool").unwrap();
        assert_eq!(zpool.name, "rpool");
        assert_eq!(zpool.size, 68719476736);
        assert_eq!(zpool.free, 68718428160);
        assert_eq!(zpool.allocated, 1048576);
        assert_eq!(zpool.ashift, 12);
        assert_eq!(zpool.comment, "-");
        assert_eq!(zpool.health_state(), Some(ZpoolHealth::Degraded));
    }

    #[test]
    fn test_get_info_header_only() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zpool_get_input("tank"), zpool_get_output(&[]));
        seq.register(&executor);

        let zpool =
            Zpool::get_info(&executor.as_executor(), ZPOOL, "tank").unwrap();
        assert_eq!(
            zpool,
            ZpoolInfo { name: "tank".to_string(), ..Default::default() }
        );
    }

    #[test]
    fn test_list() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zpool_list_input(), "tank\n");
        seq.expect_stdout(
            zpool_get_input("tank"),
            zpool_get_output(&[
                ("tank", "size", "1000000"),
                ("tank", "capacity", "42%"),
            ]),
        );
        seq.register(&executor);

        let pools = Zpool::list(&executor.as_executor(), ZPOOL).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "tank");
        assert_eq!(pools[0].size, 1000000);
        assert_eq!(pools[0].capacity, 42);
    }

    #[test]
    fn test_list_fails_if_any_pool_fails() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zpool_list_input(), "rpool\ntank\n");
        seq.expect_stdout(
            zpool_get_input("rpool"),
            zpool_get_output(&[("rpool", "size", "10")]),
        );
        seq.expect_stdout(
            zpool_get_input("tank"),
            zpool_get_output(&[("tank", "capacity", "lots")]),
        );
        seq.register(&executor);

        let err = Zpool::list(&executor.as_executor(), ZPOOL).unwrap_err();
        let ListError::Info(info) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(info.name, "tank");
        assert!(matches!(
            info.err,
            Error::Parse(ParseError::MalformedNumber { ref property, .. })
                if property == "capacity"
        ));
    }

    #[test]
    fn test_list_names_failure() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stderr(
            zpool_list_input(),
            "internal error: failed to initialize ZFS library\n",
        );
        seq.register(&executor);

        let err = Zpool::list(&executor.as_executor(), ZPOOL).unwrap_err();
        assert!(matches!(err, ListError::Names(Error::Execution(_))), "{err}");
    }

    #[test]
    fn test_list_names_skips_blank_lines() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zpool_list_input(), "rpool\n\ntank\n");
        seq.register(&executor);

        let names =
            Zpool::list_names(&executor.as_executor(), ZPOOL).unwrap();
        assert_eq!(names, ["rpool", "tank"]);
    }

    #[test]
    fn test_get_info_blank_property_line() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        let mut out = zpool_get_output(&[("tank", "size", "10")]);
        out.push_str("\ntank\tfree\t5\t-\n");
        seq.expect_stdout(zpool_get_input("tank"), out);
        seq.register(&executor);

        let err =
            Zpool::get_info(&executor.as_executor(), ZPOOL, "tank").unwrap_err();
        assert!(matches!(
            err.err,
            Error::Parse(ParseError::ShortRow { expected: 3, found: 1 })
        ));
    }

    #[test]
    fn test_list_no_pools() {
        let executor = FakeExecutor::new(test_log());
        let mut seq = CommandSequence::new();
        seq.expect_stdout(zpool_list_input(), "");
        seq.register(&executor);

        let pools = Zpool::list(&executor.as_executor(), ZPOOL).unwrap();
        assert!(pools.is_empty());
    }
}
