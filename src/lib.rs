use std::fmt;

use clap::ValueEnum;

pub mod aggregate;
pub mod error;
pub mod harness;
pub mod parser;
pub mod plot;
pub mod runner;
pub mod schema;

pub use error::{HarnessError, Result};

/// How the JSON payload is located inside the captured stdout of a trial.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Everything from the first `[` to the end of output.
    #[default]
    Bracket,
    /// The remainder of the last line starting with the sentinel prefix.
    Sentinel,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Bracket => "bracket",
            PayloadFormat::Sentinel => "sentinel",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
