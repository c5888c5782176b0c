// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session scratch-area management.
//!
//! Each test run gets one unpredictable, filesystem-isolated scratch
//! directory on shared storage, created by the controller process before any
//! worker starts. The directory persists after the run; cleaning it up is the
//! caller's responsibility.

use crate::errors::SessionSetupError;
use camino::{Utf8Path, Utf8PathBuf};
use reqtrace_metadata::SessionId;
use tracing::debug;

/// Environment variable overriding the base cache directory under which
/// session scratch areas are created.
pub const CACHE_DIR_ENV: &str = "REQTRACE_CACHE_DIR";

static SESSIONS_DIR_NAME: &str = "sessions";

/// Returns the base cache directory for session scratch areas.
///
/// If `REQTRACE_CACHE_DIR` is set, uses that. Otherwise uses
/// `<os-temp-dir>/reqtrace`. The directory is not created here; session
/// creation does that.
pub fn default_cache_dir() -> Result<Utf8PathBuf, SessionSetupError> {
    if let Ok(cache_dir) = std::env::var(CACHE_DIR_ENV) {
        return Ok(Utf8PathBuf::from(cache_dir));
    }
    let temp_dir = std::env::temp_dir().join("reqtrace");
    Utf8PathBuf::from_path_buf(temp_dir)
        .map_err(|path| SessionSetupError::CacheDirNotUtf8 { path })
}

/// The filesystem layout of one session's scratch area.
///
/// Created exactly once per run, by the controller, at session start. The
/// identity is read-only for the duration of the run; workers receive it
/// through their spawn-time configuration payload.
#[derive(Clone, Debug)]
pub struct SessionLayout {
    session_id: SessionId,
    session_dir: Utf8PathBuf,
}

impl SessionLayout {
    /// Generates a fresh session identity and materializes its scratch
    /// directory at `<base>/sessions/<session-id>/`, creating parent
    /// directories as needed.
    ///
    /// Directory-creation failure is fatal to the run: there is no fallback
    /// location.
    pub fn create(base_dir: &Utf8Path) -> Result<Self, SessionSetupError> {
        let session_id = SessionId::new_random();
        let session_dir = base_dir.join(SESSIONS_DIR_NAME).join(session_id.to_string());
        std::fs::create_dir_all(&session_dir).map_err(|error| {
            SessionSetupError::SessionDirCreate {
                path: session_dir.clone(),
                error,
            }
        })?;
        debug!(%session_id, %session_dir, "created session scratch directory");

        Ok(Self {
            session_id,
            session_dir,
        })
    }

    /// Reconstructs a layout from an existing identity and directory, e.g. on
    /// a worker process resolving its propagated configuration.
    pub fn from_parts(session_id: SessionId, session_dir: Utf8PathBuf) -> Self {
        Self {
            session_id,
            session_dir,
        }
    }

    /// Returns the session identity.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the session's shared scratch directory.
    pub fn session_dir(&self) -> &Utf8Path {
        &self.session_dir
    }

    /// Returns the scratch subdirectory for the given worker. The directory
    /// is not created here; worker configuration does that.
    pub fn worker_dir(&self, worker_id: &str) -> Utf8PathBuf {
        self.session_dir.join(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_materializes_directory() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let layout = SessionLayout::create(temp_dir.path()).expect("session should be created");

        assert!(layout.session_dir().is_dir());
        assert!(
            layout
                .session_dir()
                .as_str()
                .contains(&layout.session_id().to_string()),
            "session dir should be named after the session ID: {}",
            layout.session_dir()
        );
    }

    #[test]
    fn create_twice_yields_distinct_sessions() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let first = SessionLayout::create(temp_dir.path()).expect("session should be created");
        let second = SessionLayout::create(temp_dir.path()).expect("session should be created");

        assert_ne!(first.session_id(), second.session_id());
        assert_ne!(first.session_dir(), second.session_dir());
    }

    #[test]
    fn create_tolerates_existing_parents() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        std::fs::create_dir_all(temp_dir.path().join(SESSIONS_DIR_NAME))
            .expect("pre-creating the sessions dir should work");

        SessionLayout::create(temp_dir.path())
            .expect("pre-existing parent directories are not an error");
    }

    #[test]
    fn worker_dir_is_under_session_dir() {
        let temp_dir = camino_tempfile::tempdir().expect("tempdir should be created");
        let layout = SessionLayout::create(temp_dir.path()).expect("session should be created");

        let worker_dir = layout.worker_dir("gw1");
        assert_eq!(worker_dir, layout.session_dir().join("gw1"));
    }
}
