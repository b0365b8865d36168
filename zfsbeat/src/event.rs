// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The records published for each collected entity.

use crate::BEAT_NAME;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// The entity classes which can be collected, in collection order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Zpool,
    Filesystem,
    Snapshot,
}

impl Class {
    pub const ALL: [Class; 3] = [Class::Zpool, Class::Filesystem, Class::Snapshot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Class::Zpool => "zpool",
            Class::Filesystem => "filesystem",
            Class::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EventError {
    #[error("failed to serialize {class} entity")]
    Serialize {
        class: Class,
        #[source]
        err: serde_json::Error,
    },

    #[error("{class} entity did not serialize to an object")]
    NotAnObject { class: Class },
}

/// One published record: a single pool or dataset, keyed by property name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub beat: &'static str,
    #[serde(rename = "type")]
    pub class: Class,
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new<T: Serialize>(
        class: Class,
        timestamp: DateTime<Utc>,
        entity: &T,
    ) -> Result<Self, EventError> {
        let value = serde_json::to_value(entity)
            .map_err(|err| EventError::Serialize { class, err })?;
        let Value::Object(fields) = value else {
            return Err(EventError::NotAnObject { class });
        };
        Ok(Self { timestamp, beat: BEAT_NAME, class, fields })
    }
}
