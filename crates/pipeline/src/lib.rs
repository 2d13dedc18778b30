//! Batch orchestration for animation generation jobs.
//!
//! Drives the full per-spec lifecycle (build, submit, poll, collect,
//! assemble) against an inference service, runs many specs as a batch
//! with bounded concurrency, and produces the batch report that is the
//! run's sole externally visible result.

pub mod batch;
pub mod job;
pub mod report;
