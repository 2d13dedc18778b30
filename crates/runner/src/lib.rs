//! Batch generation entrypoint.
//!
//! The runner wires the other crates together: it loads configuration from
//! the environment, selects animations from the built-in catalog, checks
//! that the inference service is reachable, and drives a [`BatchRunner`]
//! over the selection.
//!
//! [`BatchRunner`]: loopforge_pipeline::batch::BatchRunner

pub mod config;
