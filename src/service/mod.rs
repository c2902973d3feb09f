//! Service layer
//!
//! The posting pipeline and the reporter that turns its result into the
//! invocation's output. Kept apart from the HTTP handlers.

mod pipeline;
mod reporter;

pub use pipeline::{Network, Outcome, Pipeline, PipelineVariant, PostRequest};
pub use reporter::{Report, report};
