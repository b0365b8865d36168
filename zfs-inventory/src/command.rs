// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running an inventory command and splitting its output into rows.
//!
//! Both `zfs` and `zpool` are asked for scripted output, where each line is a
//! record and each field is separated by exactly one tab. Nothing here looks
//! at the content of a field; that is the job of the parsers.

use crate::host::{BoxedExecutor, ExecutionError};
use std::ffi::OsStr;

/// One line of command output, split into its tab-separated fields.
pub type Row = Vec<String>;

/// Runs `program` with `args`, returning its standard output as rows.
///
/// A command which succeeds without printing anything yields no rows.
pub fn run<I, S>(
    executor: &BoxedExecutor,
    program: &str,
    args: I,
) -> Result<Vec<Row>, ExecutionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = std::process::Command::new(program);
    let cmd = command.args(args);
    let output = executor.execute(cmd)?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(split_rows(&stdout))
}

/// Splits scripted output into rows of fields.
///
/// Every line is a row, including a blank one, which becomes a row holding a
/// single empty field. Only the final line terminator is not a row.
pub fn split_rows(stdout: &str) -> Vec<Row> {
    stdout
        .lines()
        .map(|line| line.split('\t').map(String::from).collect())
        .collect()
}
