//! Docflux Engine - Batch job engine for the docflux document service.
//!
//! This crate provides the batch processing core of the docflux system:
//! task admission, a bounded worker pool, fan-out/fan-in execution of
//! per-item work, progress events, retry and retention-based cleanup.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// HTTP command/query surface and event stream.
pub mod api;
/// Domain types and in-memory task storage.
pub mod batch;
/// The batch engine: admission, dispatch, execution, retention.
pub mod engine;
/// Lifecycle and progress event notification.
pub mod events;
/// Infrastructure components (config, server, telemetry, audit).
pub mod infrastructure;
