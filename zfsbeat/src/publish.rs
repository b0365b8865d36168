// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivering events.

use crate::event::Event;
use std::io::Write;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),
}

/// A destination for events.
pub trait Publisher: Send {
    fn publish(&mut self, event: &Event) -> Result<(), PublishError>;

    /// Pushes out anything buffered by earlier calls to
    /// [`Publisher::publish`].
    fn flush(&mut self) -> Result<(), PublishError>;
}

/// Writes each event as one line of JSON.
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish(&mut self, event: &Event) -> Result<(), PublishError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        self.writer.flush()?;
        Ok(())
    }
}
