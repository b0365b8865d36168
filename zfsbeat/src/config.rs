// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for zfsbeat.
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between collection cycles.
    pub period_secs: u64,
    /// Whether pools are collected.
    pub source_zpool: bool,
    /// Whether filesystems are collected.
    pub source_filesystem: bool,
    /// Whether snapshots are collected.
    pub source_snapshot: bool,
    /// Log filter used when `RUST_LOG` is not set, such as `info` or `debug`.
    pub log_level: String,
    pub commands: CommandsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period_secs: 1,
            source_zpool: true,
            source_filesystem: true,
            source_snapshot: true,
            log_level: "info".to_string(),
            commands: CommandsConfig::default(),
        }
    }
}

/// The programs run to read the inventory.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandsConfig {
    pub zfs: String,
    pub zpool: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            zfs: zfs_inventory::zfs::ZFS.to_string(),
            zpool: zfs_inventory::zpool::ZPOOL.to_string(),
        }
    }
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        if config.period_secs == 0 {
            return Err(LoadError::InvalidPeriod { path: path.into() });
        }
        Ok(config)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\": {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
    #[error("invalid config \"{path}\": period_secs must be greater than zero")]
    InvalidPeriod { path: Utf8PathBuf },
}
