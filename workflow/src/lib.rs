//! Declarative side of a pipeline: stage kinds, config blocks,
//! typed dependency roles, and the values tasks publish for each other.

mod kind;
pub use kind::StageKind;

mod id;
pub use id::TaskId;

mod config;
pub use config::{PipelineConfig, StageBlock};

mod output;
pub use output::{Output, Role, Slots};

mod error;
pub use error::{AggregatedErrors, Errors};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unknown pipeline section \"{0}\"")]
    UnknownSection(String),
    #[error("Expected a mapping of labels to blocks in {0}")]
    NotAMapping(String),
    #[error("{kind}.{label} is missing required field {field}")]
    MissingField {
        kind: StageKind,
        label: String,
        field: String,
    },
    #[error("{kind}.{label}: {field} should be {expected}")]
    InvalidField {
        kind: StageKind,
        label: String,
        field: String,
        expected: String,
    },
}
