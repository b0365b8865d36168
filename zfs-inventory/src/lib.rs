// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A typed inventory of ZFS pools and datasets.
//!
//! The inventory is read by running the `zfs` and `zpool` command-line tools
//! in their scripted, parsable modes and converting each property into a
//! field of [`Dataset`] or [`ZpoolInfo`]. Commands are run through a
//! [`host::Executor`], so that tests can script their output.

pub mod coerce;
pub mod command;
pub mod host;
pub mod inventory;
pub mod zfs;
pub mod zpool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use inventory::Inventory;
pub use zfs::{Dataset, DatasetType};
pub use zpool::{ZpoolHealth, ZpoolInfo};

/// Failure to turn command output into an entity.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Failed to parse property '{property}': {err}")]
    MalformedNumber {
        property: String,
        #[source]
        err: coerce::MalformedNumber,
    },

    #[error("Expected at least {expected} fields in a row, found {found}")]
    ShortRow { expected: usize, found: usize },
}
