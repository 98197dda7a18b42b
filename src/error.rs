use std::io;
use std::path::PathBuf;

use crate::PayloadFormat;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Every failure is fatal to the sweep; there is no per-trial recovery.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no {format} payload found in benchmark output")]
    NoPayload { format: PayloadFormat },

    #[error("malformed benchmark payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("measurement {name:?} reported more than once in a single trial")]
    DuplicateMeasurement { name: String },

    #[error("trial at size {test_size} is missing measurement {name:?}")]
    MissingMeasurement { test_size: u64, name: String },

    #[error("trial at size {test_size} reported unknown measurement {name:?}")]
    UnexpectedMeasurement { test_size: u64, name: String },

    #[error("trial (repeat {repeat}, size {test_size}) failed: {source}")]
    Trial {
        repeat: u32,
        test_size: u64,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
