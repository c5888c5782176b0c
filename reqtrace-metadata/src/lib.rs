// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model shared between reqtrace controller and worker processes.
//!
//! These types cross process boundaries: the controller serializes them into
//! the session's collected-test document and into worker environment
//! variables, and workers (as well as report consumers) read them back. For
//! the coordinator logic built on top of this model, see the
//! `reqtrace-runner` crate.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{error, fmt, str::FromStr};
use uuid::Uuid;

/// Environment variable carrying the session identifier to worker processes.
pub const SESSION_ID_ENV: &str = "REQTRACE_SESSION_ID";

/// Environment variable carrying the shared session scratch directory.
pub const SESSION_DIR_ENV: &str = "REQTRACE_SESSION_DIR";

/// Environment variable carrying the worker's private scratch directory.
pub const WORKER_DIR_ENV: &str = "REQTRACE_WORKER_DIR";

/// Environment variable carrying the worker identifier.
pub const WORKER_ID_ENV: &str = "REQTRACE_WORKER_ID";

/// A unique identifier for one test session.
///
/// Generated once per run by the controller process, before any workers are
/// spawned, and never mutated afterwards. The identifier doubles as the name
/// of the session's scratch directory on shared storage.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random (v4) session ID.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The execution status of a collected test.
///
/// Serialized as the wire strings `"PASS"`, `"FAIL"` and `""` for
/// compatibility with existing consumers of the CSV report and the on-disk
/// collected-test document.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum TestStatus {
    /// The test's call phase succeeded.
    #[serde(rename = "PASS")]
    Pass,

    /// The test's call phase failed.
    #[serde(rename = "FAIL")]
    Fail,

    /// The test was collected but its call phase has not produced an outcome
    /// (not yet executed, or skipped).
    #[default]
    #[serde(rename = "")]
    NotRun,
}

impl TestStatus {
    /// Returns the wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::NotRun => "",
        }
    }

    /// Returns true if the test produced an outcome (passed or failed).
    pub fn is_executed(&self) -> bool {
        !matches!(self, TestStatus::NotRun)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata recorded for one collected test.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollectedTestMetadata {
    /// The test identifier (file path plus test name). This is a copy of the
    /// key the test is stored under, kept inline for export convenience.
    pub node_id: String,

    /// The descriptive text attached to the test, trimmed of surrounding
    /// whitespace. Empty if the test carries no description.
    pub doc_string: String,

    /// Requirement tags attached to the test, in declaration order. Empty if
    /// the test has no (valid) tags.
    pub requirements: Vec<String>,

    /// The test's execution status.
    pub status: TestStatus,
}

/// The collected-test document for one session: an insertion-ordered mapping
/// from test identifier to metadata.
///
/// This is the exact shape of the store's backing file (a JSON object keyed
/// by test identifier). Insertion order is preserved so that the final report
/// is deterministic for a given collection order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CollectedTestsSummary {
    /// The collected tests, keyed by test identifier.
    pub tests: IndexMap<String, CollectedTestMetadata>,
}

impl CollectedTestsSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of collected tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if no tests have been collected.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// The configuration payload handed to one worker process at spawn time.
///
/// Created by the controller, immutable for the worker's lifetime. Propagated
/// through the `REQTRACE_*` environment variables rather than attached
/// dynamically to a shared configuration object, so that the
/// controller/worker role is always explicit.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WorkerInfo {
    /// The session this worker belongs to.
    pub session_id: SessionId,

    /// The session's shared scratch directory.
    pub session_dir: Utf8PathBuf,

    /// The worker's private scratch directory, a subdirectory of the session
    /// directory. No other worker writes here.
    pub worker_dir: Utf8PathBuf,

    /// The worker identifier, unique within the session.
    pub worker_id: String,
}

impl WorkerInfo {
    /// Returns the environment variables that propagate this payload to a
    /// spawned worker process.
    pub fn to_env_vars(&self) -> [(&'static str, String); 4] {
        [
            (SESSION_ID_ENV, self.session_id.to_string()),
            (SESSION_DIR_ENV, self.session_dir.to_string()),
            (WORKER_DIR_ENV, self.worker_dir.to_string()),
            (WORKER_ID_ENV, self.worker_id.clone()),
        ]
    }

    /// Reconstructs a worker payload from an environment lookup.
    ///
    /// Returns `Ok(None)` if the session ID variable is absent, i.e. the
    /// current process is not a worker. Returns an error if the payload is
    /// only partially present or malformed, which indicates a controller bug.
    pub fn from_env_fn(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, WorkerInfoError> {
        let Some(session_id) = lookup(SESSION_ID_ENV) else {
            return Ok(None);
        };
        let session_id = session_id
            .parse()
            .map_err(|error| WorkerInfoError::InvalidSessionId { session_id, error })?;

        let require = |name: &'static str| {
            lookup(name).ok_or(WorkerInfoError::MissingVar { name })
        };

        Ok(Some(Self {
            session_id,
            session_dir: Utf8PathBuf::from(require(SESSION_DIR_ENV)?),
            worker_dir: Utf8PathBuf::from(require(WORKER_DIR_ENV)?),
            worker_id: require(WORKER_ID_ENV)?,
        }))
    }

    /// Reconstructs a worker payload from the process environment.
    ///
    /// See [`WorkerInfo::from_env_fn`].
    pub fn from_env() -> Result<Option<Self>, WorkerInfoError> {
        Self::from_env_fn(|name| std::env::var(name).ok())
    }
}

/// An error that occurs while reading a [`WorkerInfo`] payload from the
/// environment.
#[derive(Debug)]
pub enum WorkerInfoError {
    /// The session ID variable was present but not a valid UUID.
    InvalidSessionId {
        /// The value that failed to parse.
        session_id: String,
        /// The underlying parse error.
        error: uuid::Error,
    },

    /// The payload was partially present: the session ID variable was set but
    /// another variable was missing.
    MissingVar {
        /// The name of the missing environment variable.
        name: &'static str,
    },
}

impl fmt::Display for WorkerInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSessionId { session_id, .. } => {
                write!(f, "invalid session ID in {SESSION_ID_ENV}: `{session_id}`")
            }
            Self::MissingVar { name } => {
                write!(
                    f,
                    "incomplete worker configuration: {SESSION_ID_ENV} is set but `{name}` is missing"
                )
            }
        }
    }
}

impl error::Error for WorkerInfoError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::InvalidSessionId { error, .. } => Some(error),
            Self::MissingVar { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&TestStatus::Pass).unwrap(), r#""PASS""#);
        assert_eq!(serde_json::to_string(&TestStatus::Fail).unwrap(), r#""FAIL""#);
        assert_eq!(serde_json::to_string(&TestStatus::NotRun).unwrap(), r#""""#);

        let status: TestStatus = serde_json::from_str(r#""""#).unwrap();
        assert_eq!(status, TestStatus::NotRun);
        assert!(!status.is_executed());
    }

    #[test]
    fn test_summary_round_trip_preserves_order() {
        let mut summary = CollectedTestsSummary::new();
        for name in ["tests/z.rs::first", "tests/a.rs::second", "tests/m.rs::third"] {
            summary.tests.insert(
                name.to_owned(),
                CollectedTestMetadata {
                    node_id: name.to_owned(),
                    doc_string: String::new(),
                    requirements: vec!["REQ-001-001".to_owned()],
                    status: TestStatus::NotRun,
                },
            );
        }

        let json = serde_json::to_string(&summary).unwrap();
        let parsed: CollectedTestsSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);

        let keys: Vec<_> = parsed.tests.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["tests/z.rs::first", "tests/a.rs::second", "tests/m.rs::third"],
            "insertion order survives serialization"
        );
    }

    #[test]
    fn worker_info_env_round_trip() {
        let info = WorkerInfo {
            session_id: SessionId::new_random(),
            session_dir: "/tmp/reqtrace/sessions/abc".into(),
            worker_dir: "/tmp/reqtrace/sessions/abc/gw0".into(),
            worker_id: "gw0".to_owned(),
        };

        let env: HashMap<_, _> = info
            .to_env_vars()
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();

        let resolved = WorkerInfo::from_env_fn(|name| env.get(name).cloned())
            .unwrap()
            .expect("payload should resolve as a worker");
        assert_eq!(resolved, info);
    }

    #[test]
    fn worker_info_absent_env_is_not_a_worker() {
        let resolved = WorkerInfo::from_env_fn(|_| None).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn worker_info_partial_env_is_an_error() {
        let session_id = SessionId::new_random().to_string();
        let result = WorkerInfo::from_env_fn(|name| {
            (name == SESSION_ID_ENV).then(|| session_id.clone())
        });
        let error = result.unwrap_err();
        assert!(matches!(
            error,
            WorkerInfoError::MissingVar { name: SESSION_DIR_ENV }
        ));
    }
}
