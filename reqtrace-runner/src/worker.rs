// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker configuration propagation and run-context resolution.
//!
//! On multi-process runs the controller gives each worker its session
//! identity and a private scratch subdirectory before the worker executes any
//! test. The payload travels through `REQTRACE_*` environment variables set
//! on the worker's command, the same way the session identity would reach any
//! other spawned subprocess.
//!
//! On non-distributed runs no worker configuration exists: the single process
//! acts as both controller and sole worker and uses the session directory
//! directly.

use crate::{errors::WorkerSetupError, session::SessionLayout};
use camino::Utf8Path;
use reqtrace_metadata::{SessionId, WorkerInfo};
use std::process::Command;
use tracing::debug;

/// Creates the worker's scratch directory and builds its spawn-time
/// configuration payload.
///
/// Runs only on the controller, once per worker, before that worker begins
/// executing tests. A pre-existing worker directory is treated as success.
pub fn configure_worker(
    layout: &SessionLayout,
    worker_id: &str,
) -> Result<WorkerInfo, WorkerSetupError> {
    let worker_dir = layout.worker_dir(worker_id);
    std::fs::create_dir_all(&worker_dir).map_err(|error| WorkerSetupError::WorkerDirCreate {
        path: worker_dir.clone(),
        error,
    })?;
    debug!(worker_id, %worker_dir, "configured worker scratch directory");

    Ok(WorkerInfo {
        session_id: layout.session_id(),
        session_dir: layout.session_dir().to_owned(),
        worker_dir,
        worker_id: worker_id.to_owned(),
    })
}

/// Like [`configure_worker`], additionally attaching the payload to the
/// worker's command as environment variables.
pub fn configure_worker_command(
    layout: &SessionLayout,
    worker_id: &str,
    command: &mut Command,
) -> Result<WorkerInfo, WorkerSetupError> {
    let info = configure_worker(layout, worker_id)?;
    for (name, value) in info.to_env_vars() {
        command.env(name, value);
    }
    Ok(info)
}

/// The current process's view of the run: controller or worker.
///
/// The two roles are distinguished explicitly by the presence of the
/// propagated worker payload, not by sniffing attributes off a shared
/// configuration object.
#[derive(Clone, Debug)]
pub enum RunContext {
    /// This process is the controller and owns the in-process session record.
    Controller(SessionLayout),

    /// This process is a worker; the payload was propagated at spawn time.
    Worker(WorkerInfo),
}

impl RunContext {
    /// Resolves the current process's run context.
    ///
    /// If the worker payload is present in the environment, this process is a
    /// worker. Otherwise, if the caller holds an in-process session record,
    /// it is the controller. Otherwise no role has been established yet and
    /// `None` is returned; that is not an error, so this is safe to call from
    /// either role at any lifecycle point.
    pub fn resolve(
        controller_session: Option<&SessionLayout>,
    ) -> Result<Option<Self>, WorkerSetupError> {
        Self::resolve_with_env(controller_session, |name| std::env::var(name).ok())
    }

    /// [`RunContext::resolve`] with an explicit environment lookup.
    pub fn resolve_with_env(
        controller_session: Option<&SessionLayout>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, WorkerSetupError> {
        if let Some(info) = WorkerInfo::from_env_fn(lookup)? {
            return Ok(Some(Self::Worker(info)));
        }
        Ok(controller_session.cloned().map(Self::Controller))
    }

    /// Returns the session identity, regardless of role.
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Controller(layout) => layout.session_id(),
            Self::Worker(info) => info.session_id,
        }
    }

    /// Returns the session's shared scratch directory, regardless of role.
    pub fn session_dir(&self) -> &Utf8Path {
        match self {
            Self::Controller(layout) => layout.session_dir(),
            Self::Worker(info) => &info.session_dir,
        }
    }

    /// Returns true if this process is a worker.
    pub fn is_worker(&self) -> bool {
        matches!(self, Self::Worker(_))
    }
}
