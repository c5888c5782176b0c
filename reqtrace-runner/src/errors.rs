// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by reqtrace.

use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// An error that occurs while creating the session scratch area.
///
/// Session-directory creation has no fallback location, so these errors are
/// fatal to the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionSetupError {
    /// The cache base directory is not valid UTF-8.
    #[error("cache directory `{}` is not valid UTF-8", .path.display())]
    CacheDirNotUtf8 {
        /// The non-UTF-8 path.
        path: std::path::PathBuf,
    },

    /// Creating the session directory failed.
    #[error("error creating session directory `{path}`")]
    SessionDirCreate {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurs while configuring a worker process or resolving the
/// current process's run context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerSetupError {
    /// Creating the worker's scratch directory failed.
    #[error("error creating worker directory `{path}`")]
    WorkerDirCreate {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The worker configuration payload in the environment was malformed.
    /// This indicates a bug in the controller that spawned this process.
    #[error("error reading worker configuration from the environment")]
    Env(#[from] reqtrace_metadata::WorkerInfoError),
}

/// An error that occurs while operating on the collected-test store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Opening or locking the store's lock file failed.
    #[error("error locking collected-test store via `{path}`")]
    FileLock {
        /// The lock file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The store lock could not be acquired within the timeout. Another
    /// process is holding it for an unexpectedly long time, or has crashed
    /// while holding it.
    #[error("timed out after {timeout_secs}s waiting for store lock `{path}`")]
    FileLockTimeout {
        /// The lock file path.
        path: Utf8PathBuf,
        /// The timeout, in seconds.
        timeout_secs: u64,
    },

    /// Reading the collected-test document failed.
    #[error("error reading collected-test document `{path}`")]
    DocumentRead {
        /// The document path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Deserializing the collected-test document failed.
    #[error("error deserializing collected-test document `{path}`")]
    DocumentDeserialize {
        /// The document path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// Serializing the collected-test document failed.
    #[error("error serializing collected-test document `{path}`")]
    DocumentSerialize {
        /// The document path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// Writing the collected-test document back to disk failed.
    #[error("error writing collected-test document `{path}`")]
    DocumentWrite {
        /// The document path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },

    /// The requested test identifier is not present in the store. For status
    /// updates this indicates a lifecycle-ordering bug in the caller: a
    /// status can only be set on a previously collected test.
    #[error("test `{node_id}` not found in the collected-test store")]
    TestNotFound {
        /// The missing test identifier.
        node_id: String,
    },
}

/// An error that occurs while parsing the plugin configuration.
#[derive(Debug, Error)]
#[error("failed to parse reqtrace configuration")]
pub struct ConfigParseError {
    #[source]
    error: toml::de::Error,
}

impl ConfigParseError {
    pub(crate) fn new(error: toml::de::Error) -> Self {
        Self { error }
    }
}

/// A consolidated requirement-validation failure, raised once after every
/// discovered test has been checked.
///
/// The message enumerates every violation found across the whole collection,
/// so a single run reports all defects rather than forcing a
/// fix-one-rerun cycle.
#[derive(Debug, Error)]
pub struct InvalidTestConfiguration {
    errors: Vec<String>,
}

impl InvalidTestConfiguration {
    pub(crate) fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// Returns the individual violation messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for InvalidTestConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "invalid test configuration ({} error{}):",
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" },
        )?;
        for error in &self.errors {
            writeln!(f, "  - {error}")?;
        }
        Ok(())
    }
}

/// An error that occurs while writing the end-of-run CSV report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// The collected-test snapshot was completely empty, so there are no
    /// field names or rows to write. Surfaced as an explicit condition
    /// rather than producing a headerless or malformed file.
    #[error("nothing to report: no tests were collected (report destination `{path}`)")]
    NothingToReport {
        /// The configured report destination.
        path: Utf8PathBuf,
    },

    /// Creating an intermediate directory for the report failed.
    #[error("error creating report directory `{path}`")]
    DirCreate {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Writing the report file failed.
    #[error("error writing report `{path}`")]
    Write {
        /// The report path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: std::io::Error,
    },
}

/// An error produced by a lifecycle plugin hook.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PluginError {
    /// Creating the session scratch area failed.
    #[error("error creating session scratch area")]
    SessionSetup(#[from] SessionSetupError),

    /// Resolving or creating worker configuration failed.
    #[error("error resolving worker configuration")]
    WorkerSetup(#[from] WorkerSetupError),

    /// Requirement validation failed for one or more collected tests.
    #[error(transparent)]
    InvalidConfiguration(#[from] InvalidTestConfiguration),

    /// A collected-test store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing the end-of-run report failed.
    #[error("error writing the session report")]
    Report(#[source] ReportError),

    /// A lifecycle hook fired before `session_start` established the run
    /// context.
    #[error("lifecycle hook `{hook}` fired before session start")]
    NotStarted {
        /// The hook that was called out of order.
        hook: &'static str,
    },
}
