// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running host commands, and the seam which lets tests replace them.

pub mod error;
pub mod executor;
pub mod input;
pub mod output;

pub use error::{CommandFailureInfo, ExecutionError};
pub use executor::{BoxedExecutor, Executor, HostExecutor};
pub use input::Input;
pub use output::Output;

#[cfg(any(test, feature = "testing"))]
pub use executor::{CommandSequence, FakeExecutor};
#[cfg(any(test, feature = "testing"))]
pub use output::OutputExt;
