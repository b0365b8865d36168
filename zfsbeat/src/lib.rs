// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic collection of the ZFS inventory into published events.

pub mod beat;
pub mod config;
pub mod event;
pub mod publish;

pub use beat::{Beat, CycleReport};
pub use config::Config;
pub use event::{Class, Event};
pub use publish::{JsonLinesPublisher, Publisher};

/// The name every event is stamped with.
pub const BEAT_NAME: &str = "zfsbeat";
