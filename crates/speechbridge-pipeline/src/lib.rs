//! Speech pipeline: orchestration, batch jobs, output layout, and the live worker.

pub mod batch;
pub mod orchestrator;
pub mod output;
pub mod worker;

#[cfg(test)]
pub(crate) mod fakes;

pub use orchestrator::{
    CHUNK_SECS, Pipeline, PipelineRun, PipelineSettings, StageTimings, SynthesisOutcome,
};
pub use output::OutputLayout;
