// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::host::{
    error::output_to_exec_error, error::ExecutionError, input::Input,
    output::Output,
};

use itertools::Itertools;
use slog::{debug, error, info, Logger};
use std::process::Command;
use std::str::from_utf8;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub fn command_to_string(command: &std::process::Command) -> String {
    Input::from(command).to_string()
}

fn to_space_separated_string<T, I>(iter: T) -> String
where
    T: IntoIterator<Item = I>,
    I: std::fmt::Debug,
{
    Itertools::intersperse(
        iter.into_iter().map(|arg| format!("{arg:?}")),
        " ".into(),
    )
    .collect::<String>()
}

fn log_input(log: &Logger, id: u64, command: &Command) {
    info!(
        log,
        "running command via executor"; "id" => id, "command" => %Input::from(command)
    );
    debug!(
        log,
        "running command via executor"; "id" => id, "envs" => %to_space_separated_string(command.get_envs())
    );
}

fn log_output(log: &Logger, id: u64, output: &Output) {
    info!(
        log,
        "finished running command via executor";
        "id" => id,
        "result" => if output.status.success() { "OK" } else { "ERROR" },
        "status" => output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    if !output.stdout.is_empty() {
        debug!(
            log,
            "finished command stdout";
            "id" => id,
            "stdout" => from_utf8(&output.stdout).unwrap_or("<Not valid UTF-8>"),
        );
    }
    if !output.stderr.is_empty() {
        debug!(
            log,
            "finished command stderr";
            "id" => id,
            "stderr" => from_utf8(&output.stderr).unwrap_or("<Not valid UTF-8>"),
        );
    }
}

/// Describes the commonly-used "safe-to-reference" type describing the
/// Executor as a trait object.
pub type BoxedExecutor = Arc<dyn Executor>;

/// Describes an "executor", which can run [Command]s and return a response.
///
/// - In production, this is usually simply a [HostExecutor].
/// - Under test, this can be customized, and a [FakeExecutor] may be used.
pub trait Executor: Send + Sync {
    /// Executes a task, waiting for it to complete, and returning output.
    ///
    /// A process which exits with a non-zero status is reported as
    /// [ExecutionError::CommandFailure].
    fn execute(&self, command: &mut Command) -> Result<Output, ExecutionError>;
}

pub struct HostExecutor {
    log: slog::Logger,
    counter: std::sync::atomic::AtomicU64,
}

impl HostExecutor {
    pub fn new(log: Logger) -> Arc<Self> {
        Arc::new(Self { log, counter: AtomicU64::new(0) })
    }

    pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
        self
    }

    fn prepare(&self, command: &Command) -> u64 {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_input(&self.log, id, command);
        id
    }

    fn finalize(
        &self,
        command: &Command,
        id: u64,
        output: Output,
    ) -> Result<Output, ExecutionError> {
        log_output(&self.log, id, &output);
        if !output.status.success() {
            return Err(output_to_exec_error(
                command_to_string(command),
                &output,
            ));
        }
        Ok(output)
    }
}

impl Executor for HostExecutor {
    fn execute(&self, command: &mut Command) -> Result<Output, ExecutionError> {
        let id = self.prepare(command);
        let output = command.output().map_err(|err| {
            error!(self.log, "Could not start program!"; "id" => id, "error" => %err);
            ExecutionError::ExecutionStart {
                command: command_to_string(command),
                err,
            }
        })?;
        self.finalize(command, id, output)
    }
}

#[cfg(any(test, feature = "testing"))]
pub use fake::*;

#[cfg(any(test, feature = "testing"))]
mod fake {
    use super::*;
    use crate::host::output::OutputExt;
    use std::sync::Mutex;

    /// Handler called when a fake command is "run".
    pub type WaitFn = dyn FnMut(&Input) -> Output + Send + Sync;
    pub type BoxedWaitFn = Box<WaitFn>;

    /// An executor which can expect certain inputs, and respond with specific
    /// outputs.
    pub struct FakeExecutor {
        log: Logger,
        counter: AtomicU64,
        wait_handler: Mutex<BoxedWaitFn>,
    }

    impl FakeExecutor {
        pub fn new(log: Logger) -> Arc<FakeExecutor> {
            Arc::new(Self {
                log,
                counter: AtomicU64::new(0),
                wait_handler: Mutex::new(Box::new(|_input| Output::success())),
            })
        }

        /// Set the request handler to an arbitrary function.
        pub fn set_wait_handler(&self, f: BoxedWaitFn) {
            *self.wait_handler.lock().unwrap() = f;
        }

        /// Perform some type coercion to access a commonly-used trait object.
        pub fn as_executor(self: Arc<Self>) -> BoxedExecutor {
            self
        }
    }

    impl Executor for FakeExecutor {
        fn execute(
            &self,
            command: &mut Command,
        ) -> Result<Output, ExecutionError> {
            let id = self.counter.fetch_add(1, Ordering::SeqCst);
            log_input(&self.log, id, command);

            let input = Input::from(&*command);
            let output = self.wait_handler.lock().unwrap()(&input);
            log_output(&self.log, id, &output);

            if !output.status.success() {
                return Err(output_to_exec_error(input.to_string(), &output));
            }
            Ok(output)
        }
    }

    /// A handler that may be used for setting inputs/outputs to the executor
    /// when these commands are known ahead-of-time.
    ///
    /// See: [Self::register] for integration with a [FakeExecutor].
    pub struct CommandSequence {
        expected: Vec<(Input, Output)>,
        index: usize,
    }

    impl CommandSequence {
        pub fn new() -> Self {
            Self { expected: Vec::new(), index: 0 }
        }

        /// Convenience function to register the sequence with a
        /// [FakeExecutor].
        pub fn register(mut self, executor: &FakeExecutor) {
            executor.set_wait_handler(Box::new(move |input| -> Output {
                self.execute(input)
            }));
        }

        /// Expects a static "input" to exactly produce some "output".
        pub fn expect(&mut self, input: Input, output: Output) {
            self.expected.push((input, output));
        }

        /// A helper for [Self::expect] which succeeds with the given stdout.
        pub fn expect_stdout<S: AsRef<str>>(&mut self, input: Input, stdout: S) {
            self.expect(input, Output::success().set_stdout(stdout))
        }

        /// A helper for [Self::expect] which fails with the given stderr.
        pub fn expect_stderr<S: AsRef<str>>(&mut self, input: Input, stderr: S) {
            self.expect(input, Output::failure().set_stderr(stderr))
        }

        fn execute(&mut self, observed_input: &Input) -> Output {
            let (input, output) = self
                .expected
                .get(self.index)
                .unwrap_or_else(|| panic!("Unexpected command: {observed_input}"));
            self.index += 1;
            assert_eq!(observed_input, input, "Unexpected input command");
            output.clone()
        }
    }

    impl Drop for CommandSequence {
        fn drop(&mut self) {
            let expected = self.expected.len();
            let actual = self.index;
            if actual < expected {
                let (next, _) = &self.expected[actual];
                let errmsg = format!("Only saw {actual} calls, expected {expected}\nNext would have been: {next}");
                if !std::thread::panicking() {
                    panic!("{errmsg}");
                } else {
                    eprintln!("{errmsg}");
                }
            }
        }
    }
}
