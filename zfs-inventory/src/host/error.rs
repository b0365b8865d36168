// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::host::output::Output;

/// Details about a command which ran to completion but reported failure.
#[derive(Debug)]
pub struct CommandFailureInfo {
    pub command: String,
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl std::fmt::Display for CommandFailureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Command [{}] executed and failed with status: {}",
            self.command, self.status
        )?;
        write!(f, "  stdout: {}", self.stdout)?;
        write!(f, "  stderr: {}", self.stderr)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    /// The program could not be found, or the process could not be started.
    #[error("Failed to start execution of [{command}]: {err}")]
    ExecutionStart { command: String, err: std::io::Error },

    /// The process ran, but exited with a non-zero status.
    #[error("{0}")]
    CommandFailure(Box<CommandFailureInfo>),
}

impl ExecutionError {
    /// Returns the captured standard error of a failed command, if the
    /// command got far enough to produce any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecutionError::CommandFailure(info) => Some(&info.stderr),
            ExecutionError::ExecutionStart { .. } => None,
        }
    }
}

pub fn output_to_exec_error(command: String, output: &Output) -> ExecutionError {
    ExecutionError::CommandFailure(Box::new(CommandFailureInfo {
        command,
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
}
