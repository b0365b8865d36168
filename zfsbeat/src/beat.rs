// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collection cycles, and the loop which runs them on a timer.

use crate::config::Config;
use crate::event::{Class, Event, EventError};
use crate::publish::{PublishError, Publisher};
use chrono::{DateTime, Utc};
use serde::Serialize;
use slog::{error, info, o, Logger};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use zfs_inventory::zfs::ListDatasetsError;
use zfs_inventory::zpool::ListError;
use zfs_inventory::Inventory;

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Zpools(#[from] ListError),

    #[error(transparent)]
    Datasets(#[from] ListDatasetsError),

    #[error(transparent)]
    Event(#[from] EventError),
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("collection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A class which could not be collected during a cycle.
#[derive(Debug)]
pub struct ClassFailure {
    pub class: Class,
    pub err: CollectError,
}

/// The outcome of one collection cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub events: Vec<Event>,
    pub failures: Vec<ClassFailure>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct Beat {
    log: Logger,
    inventory: Inventory,
    classes: Vec<Class>,
}

impl Beat {
    pub fn new(log: &Logger, inventory: Inventory, config: &Config) -> Self {
        let classes = Class::ALL
            .into_iter()
            .filter(|class| match class {
                Class::Zpool => config.source_zpool,
                Class::Filesystem => config.source_filesystem,
                Class::Snapshot => config.source_snapshot,
            })
            .collect();
        Self { log: log.new(o!("component" => "Beat")), inventory, classes }
    }

    /// The classes collected each cycle, in order.
    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// Runs one collection cycle, blocking until every command has exited.
    ///
    /// A failure in one class is recorded in the report and does not stop
    /// the classes after it. Every event of a cycle carries the same
    /// timestamp.
    pub fn collect(&self) -> CycleReport {
        let timestamp = Utc::now();
        let mut report = CycleReport::default();
        for &class in &self.classes {
            match self.collect_class(class, timestamp) {
                Ok(events) => {
                    info!(
                        self.log,
                        "collected";
                        "class" => %class,
                        "count" => events.len(),
                    );
                    report.events.extend(events);
                }
                Err(err) => {
                    error!(
                        self.log,
                        "failed to collect";
                        "class" => %class,
                        "error" => %err,
                    );
                    report.failures.push(ClassFailure { class, err });
                }
            }
        }
        report
    }

    fn collect_class(
        &self,
        class: Class,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Event>, CollectError> {
        let events = match class {
            Class::Zpool => {
                to_events(class, timestamp, &self.inventory.zpools()?)?
            }
            Class::Filesystem => {
                to_events(class, timestamp, &self.inventory.filesystems(None)?)?
            }
            Class::Snapshot => {
                to_events(class, timestamp, &self.inventory.snapshots(None)?)?
            }
        };
        Ok(events)
    }

    /// Runs [`Beat::collect`] on a blocking thread.
    pub async fn collect_blocking(&self) -> Result<CycleReport, RunError> {
        let beat = self.clone();
        let report = tokio::task::spawn_blocking(move || beat.collect()).await?;
        Ok(report)
    }

    /// Publishes every event of `report`, then flushes the publisher.
    pub fn publish<P: Publisher + ?Sized>(
        &self,
        publisher: &mut P,
        report: &CycleReport,
    ) -> Result<(), PublishError> {
        for event in &report.events {
            publisher.publish(event)?;
        }
        publisher.flush()?;
        info!(self.log, "Events sent"; "count" => report.events.len());
        Ok(())
    }

    /// Collects and publishes every `period` until `shutdown` completes.
    ///
    /// The first cycle starts immediately. A cycle which overruns the period
    /// delays the next one rather than causing a burst, and a cycle in
    /// progress is always finished before checking for shutdown.
    pub async fn run_until<P, F>(
        &self,
        publisher: &mut P,
        period: Duration,
        shutdown: F,
    ) -> Result<(), RunError>
    where
        P: Publisher + ?Sized,
        F: Future<Output = ()>,
    {
        info!(self.log, "zfsbeat is running! Hit CTRL-C to stop it.");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {}
            }
            let report = self.collect_blocking().await?;
            self.publish(publisher, &report)?;
        }

        info!(self.log, "zfsbeat stopped");
        Ok(())
    }
}

fn to_events<T: Serialize>(
    class: Class,
    timestamp: DateTime<Utc>,
    entities: &[T],
) -> Result<Vec<Event>, EventError> {
    entities
        .iter()
        .map(|entity| Event::new(class, timestamp, entity))
        .collect()
}
