// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Distributed test-session coordination for requirement-tagged test runs.
//!
//! A test-execution harness embeds this crate through the
//! [`LifecyclePlugin`](plugin::LifecyclePlugin): the controller process
//! establishes an isolated session scratch area, workers receive their
//! configuration at spawn time, every discovered test is recorded in a
//! lock-guarded file-backed store shared by all processes in the run, and
//! session finish produces a consolidated CSV traceability report.
//!
//! The serializable types that cross process boundaries live in the
//! `reqtrace-metadata` crate.

pub mod config;
pub mod debug;
pub mod errors;
pub mod plugin;
pub mod report;
pub mod session;
pub mod store;
pub mod validate;
pub mod worker;
