//! The functions in this crate turn a [`workflow::PipelineConfig`] into a [`Graph`]
//! of concrete tasks, ready to be handed to the scheduler.
//!
//! Stage kinds are built one at a time, in their fixed order, so every task a
//! block can refer to already exists when the block is built. For each block:
//! 1. Select the upstream tasks the block fans out over, using its masks.
//! 2. Resolve each named cross-reference to exactly one upstream task.
//! 3. Record each resolved task in a typed dependency slot, and publish
//!    the values downstream kinds will need.
//!
//! Nothing here touches the filesystem or the batch system.

/// matching declarative references to upstream tasks
mod resolver;
pub use resolver::{Attr, Error as ResolveError, Resolver};

/// per-kind expansion of config blocks into tasks
mod builder;

mod context;
pub use context::BuildContext;

mod node;
pub use node::{ResolvedConfig, TaskNode, SUB_JOB_SEPARATOR};

mod graph;
pub use graph::Graph;

use workflow::StageKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind}.{label} matched no upstream tasks ({masks})")]
    EmptyFanOut {
        kind: StageKind,
        label: String,
        masks: String,
    },
    #[error("{kind}.{label} selects no tasks to depend on")]
    NoDependencies { kind: StageKind, label: String },
    #[error("{kind} task name \"{name}\" may not contain '.'")]
    InvalidName { kind: StageKind, name: String },
    #[error("Two {kind} tasks are named \"{name}\"")]
    DuplicateName { kind: StageKind, name: String },
    #[error("Too many tasks ({0}); check the masks for runaway fan-out")]
    TooManyTasks(usize),
}
