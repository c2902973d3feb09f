//! Result reporter
//!
//! The only place a pipeline result becomes text.

use std::fmt;

use super::pipeline::{Network, Outcome};
use crate::error::PipelineError;

const TWEETED: &str = "🚀";
const RECORDED: &str = "✨";
const FAILED: &str = "🔥";

/// Final, displayable result of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Success(&'static str),
    Failure { kind: &'static str, detail: String },
}

impl Report {
    pub fn is_success(&self) -> bool {
        matches!(self, Report::Success(_))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Success(token) => f.write_str(token),
            Report::Failure { detail, .. } => {
                // A JSON string literal; the detail may contain quotes and newlines.
                let quoted = serde_json::to_string(detail).map_err(|_| fmt::Error)?;
                write!(f, "{} {}", FAILED, quoted)
            }
        }
    }
}

/// Map a pipeline result to its report
pub fn report(result: &Result<Outcome, PipelineError>) -> Report {
    match result {
        Ok(outcome) => Report::Success(match outcome.network {
            Network::Twitter => TWEETED,
            Network::Instagram => RECORDED,
        }),
        Err(error) => Report::Failure {
            kind: error.kind(),
            detail: error.to_string(),
        },
    }
}
