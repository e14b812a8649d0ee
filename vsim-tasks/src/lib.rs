//! vsim-tasks: asynchronous operations with a strict lifecycle
//!
//! A task wraps one unit of work acting on a registered entity. Tasks are
//! registered objects themselves, so clients observe them through the
//! property collector like anything else.
//!
//! ```text
//! queued --run--> running --body returns--> success | error
//!                    \--cancel-----------------------^
//! ```
//!
//! Terminal states are final. The work body runs on a blocking worker; how
//! the target entity's lock crosses from the caller to that worker is set by
//! [`TaskConfig::lock_handoff`].

mod config;
mod handle;
mod info;
mod task;

pub use config::TaskConfig;
pub use handle::{TaskHandle, CANCELLED_MESSAGE};
pub use info::{TaskInfo, TaskObject, TaskState};
pub use task::{Task, TaskManager, TaskOutcome, TaskScope};
