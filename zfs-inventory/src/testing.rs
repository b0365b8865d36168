// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test support: a captured logger, and builders for the exact commands
//! (and plausible outputs) of the inventory.
//!
//! Paired with [`crate::host::CommandSequence`], these let a test script the
//! `zfs` and `zpool` invocations without spelling out the property lists.

use crate::host::Input;
use crate::zfs::{dataset_projection, DATASET_PROPERTIES, ZFS};
use crate::zpool::{zpool_projection, ZPOOL};
use slog::{o, Drain, Logger};

/// A logger whose output is captured by the test harness.
pub fn test_log() -> Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    Logger::root(drain, o!())
}

/// The recursive `zfs list` of datasets of type `kind` ("all" for every
/// type).
pub fn zfs_list_input(kind: &str, filter: Option<&str>) -> Input {
    let mut args = vec![
        "list".to_string(),
        "-rpH".to_string(),
        "-t".to_string(),
        kind.to_string(),
        "-o".to_string(),
        dataset_projection(),
    ];
    args.extend(filter.map(String::from));
    Input::new(ZFS.to_string(), args)
}

/// The `zfs list` of a single dataset.
pub fn zfs_get_input(name: &str) -> Input {
    Input::new(
        ZFS.to_string(),
        vec![
            "list".to_string(),
            "-Hp".to_string(),
            "-o".to_string(),
            dataset_projection(),
            name.to_string(),
        ],
    )
}

/// One line of `zfs list` output. Each column holds `<property>-value`
/// unless `overrides` gives it a value.
pub fn dataset_line(overrides: &[(&str, &str)]) -> String {
    DATASET_PROPERTIES
        .iter()
        .map(|property| {
            overrides
                .iter()
                .find(|(name, _)| *name == property.name)
                .map_or_else(
                    || format!("{}-value", property.name),
                    |(_, value)| value.to_string(),
                )
        })
        .collect::<Vec<_>>()
        .join("\t")
}

pub fn zpool_list_input() -> Input {
    Input::shell("zpool list -Ho name")
}

pub fn zpool_get_input(name: &str) -> Input {
    Input::new(
        ZPOOL.to_string(),
        vec![
            "get".to_string(),
            "-p".to_string(),
            zpool_projection(),
            name.to_string(),
        ],
    )
}

/// The output of `zpool get -p`, header included, for
/// `(pool, property, value)` triples.
pub fn zpool_get_output(properties: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("NAME  PROPERTY  VALUE  SOURCE\n");
    for (pool, property, value) in properties {
        out.push_str(&format!("{pool}\t{property}\t{value}\t-\n"));
    }
    out
}
