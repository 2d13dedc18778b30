//! ComfyUI-compatible REST client library.
//!
//! Wraps the inference service's HTTP API: workflow submission, history
//! polling, artifact download, and the liveness probe, plus typed
//! parsing of history payloads into output artifact lists.

pub mod api;
pub mod outputs;
