//! Domain types for the loopforge batch animation generator.
//!
//! Provides the built-in animation catalog, the workflow graph model
//! with its construction strategies, and the frame-sequence video
//! assembly wrapper around ffmpeg.

pub mod assemble;
pub mod builder;
pub mod catalog;
pub mod workflow;
