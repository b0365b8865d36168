// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable which publishes the ZFS inventory as JSON lines on stdout.

use anyhow::{bail, Context};
use camino::Utf8PathBuf;
use clap::Parser;
use slog::{warn, Drain, Logger};
use zfs_inventory::host::HostExecutor;
use zfs_inventory::Inventory;
use zfsbeat::{Beat, Config, JsonLinesPublisher};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file. Without one, every setting takes
    /// its default.
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Run a single collection cycle, then exit.
    #[arg(long)]
    once: bool,
}

fn stderr_env_drain(
    default_level: &str,
) -> impl Drain<Ok = (), Err = slog::Never> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let mut builder = slog_envlogger::LogBuilder::new(drain);
    if let Ok(s) = std::env::var("RUST_LOG") {
        builder = builder.parse(&s);
    } else {
        builder = builder.parse(default_level);
    }
    builder.build()
}

fn setup_log(default_level: &str) -> Logger {
    let drain = stderr_env_drain(default_level);
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!())
}

async fn wait_for_ctrl_c(log: &Logger) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // Without a signal handler the only way out is to kill the process.
        warn!(log, "failed to listen for CTRL-C"; "error" => %err);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => Config::default(),
    };

    let log = setup_log(&config.log_level);
    let executor = HostExecutor::new(log.clone()).as_executor();
    let inventory = Inventory::new(&log, executor)
        .with_programs(&config.commands.zfs, &config.commands.zpool);
    let beat = Beat::new(&log, inventory, &config);
    let mut publisher = JsonLinesPublisher::new(std::io::stdout());

    if args.once {
        let report = beat.collect_blocking().await?;
        beat.publish(&mut publisher, &report)
            .context("publishing events")?;
        if !report.is_success() {
            let classes: Vec<String> =
                report.failures.iter().map(|f| f.class.to_string()).collect();
            bail!("failed to collect: {}", classes.join(", "));
        }
        return Ok(());
    }

    beat.run_until(&mut publisher, config.period(), wait_for_ctrl_c(&log))
        .await
        .context("running zfsbeat")?;
    Ok(())
}
