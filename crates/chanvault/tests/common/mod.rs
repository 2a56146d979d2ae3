//! Shared test utilities for chanvault integration tests.
//!
//! This module provides:
//! - `ScriptedSource`, an in-memory `HistorySource` with scripted failures
//! - `RecordingReporter`, which keeps engine events and can stop a run
//! - `TestEnv` for isolated database and download directories

pub mod harness;

pub use harness::*;
