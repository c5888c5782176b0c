// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lifecycle plugin: a state machine over the harness's test-run
//! lifecycle.
//!
//! The harness drives the plugin through its hooks, in fixed order within one
//! process: [`session_start`](LifecyclePlugin::session_start) →
//! [`collection_modify_items`](LifecyclePlugin::collection_modify_items) →
//! per-test [`test_report`](LifecyclePlugin::test_report) calls →
//! [`session_finish`](LifecyclePlugin::session_finish). The plugin is the
//! sole writer of the collected-test store and the sole emitter of the CSV
//! artifact.

use crate::{
    config::PluginConfig,
    debug::AutoDebugger,
    errors::{InvalidTestConfiguration, PluginError},
    report::{self, ReportStats},
    session::SessionLayout,
    store::CollectedTestStore,
    validate::validate_requirement_tags,
    worker::{self, RunContext},
};
use camino::Utf8PathBuf;
use reqtrace_metadata::{CollectedTestMetadata, TestStatus, WorkerInfo};
use serde_json::Value;
use std::process::Command;
use tracing::debug;

/// One discovered test, as the harness reports it at collection time.
#[derive(Clone, Debug)]
pub struct DiscoveredTest {
    /// The test identifier (file path plus test name), unique within the run.
    pub node_id: String,

    /// The descriptive text attached to the test, if any.
    pub doc_string: Option<String>,

    /// Raw arguments of the test's closest `requirements` marker. Empty when
    /// the marker is absent or carries no arguments.
    pub requirement_args: Vec<Value>,
}

/// The execution phase a test report refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionPhase {
    /// Test setup.
    Setup,
    /// The test body itself. Only this phase determines pass/fail status.
    Call,
    /// Test teardown.
    Teardown,
}

/// A per-test outcome report from the harness.
#[derive(Clone, Debug)]
pub struct TestReport {
    /// The test identifier.
    pub node_id: String,

    /// The phase this report refers to.
    pub phase: ExecutionPhase,

    /// Whether the phase succeeded.
    pub passed: bool,
}

/// Run-level lifecycle state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    /// Constructed; no session established yet.
    Initialized,
    /// Session established; collection in progress.
    Collecting,
    /// Collection recorded; tests executing under the harness's control.
    Executing,
    /// Session finished; report (if configured) emitted.
    Finished,
}

/// The reqtrace lifecycle plugin.
pub struct LifecyclePlugin {
    config: PluginConfig,
    cache_dir: Utf8PathBuf,
    context: Option<RunContext>,
    store: Option<CollectedTestStore>,
    debugger: AutoDebugger,
    state: RunState,
}

impl LifecyclePlugin {
    /// Creates a plugin with an explicit cache base directory for session
    /// scratch areas.
    pub fn new(config: PluginConfig, cache_dir: impl Into<Utf8PathBuf>) -> Self {
        debug!("reqtrace plugin registered");
        Self {
            config,
            cache_dir: cache_dir.into(),
            context: None,
            store: None,
            debugger: AutoDebugger::new(),
            state: RunState::Initialized,
        }
    }

    /// Creates a plugin using [`crate::session::default_cache_dir`].
    pub fn with_default_cache_dir(config: PluginConfig) -> Result<Self, PluginError> {
        let cache_dir = crate::session::default_cache_dir()?;
        Ok(Self::new(config, cache_dir))
    }

    /// Session start: establishes this process's run context.
    ///
    /// On the controller this creates the session scratch area (exactly once
    /// per run, before any worker is spawned) and engages the debugger if
    /// configured. On a worker it resolves the propagated configuration
    /// payload instead; nothing else to do there.
    pub fn session_start(&mut self) -> Result<(), PluginError> {
        let context = match RunContext::resolve(None).map_err(PluginError::WorkerSetup)? {
            Some(worker_context) => worker_context,
            None => {
                let layout = SessionLayout::create(&self.cache_dir)?;
                RunContext::Controller(layout)
            }
        };

        if !context.is_worker() {
            self.debugger.engage(&self.config, false);
        }

        self.store = Some(CollectedTestStore::new(context.session_dir()));
        self.context = Some(context);
        self.state = RunState::Collecting;
        Ok(())
    }

    /// Configures one worker about to be spawned: creates its scratch
    /// subdirectory and attaches the propagation payload to `command`'s
    /// environment. Controller only, once per worker, before the worker
    /// executes any test.
    pub fn configure_worker_command(
        &self,
        worker_id: &str,
        command: &mut Command,
    ) -> Result<WorkerInfo, PluginError> {
        let Some(RunContext::Controller(layout)) = &self.context else {
            return Err(PluginError::NotStarted {
                hook: "configure_worker_command",
            });
        };
        worker::configure_worker_command(layout, worker_id, command)
            .map_err(PluginError::WorkerSetup)
    }

    /// Collection-modify step, called once with the full discovered test
    /// set.
    ///
    /// Records a collected-test entry for every test regardless of its
    /// individual validation outcome, accumulating all validation errors
    /// across all tests; if any were found, the run is aborted afterwards
    /// with a single consolidated failure enumerating every violation.
    pub fn collection_modify_items(
        &mut self,
        items: &[DiscoveredTest],
    ) -> Result<(), PluginError> {
        // Configuration might have changed since session start, so recheck
        // whether the debugger needs engaging.
        let is_worker = self.is_worker();
        self.debugger.engage(&self.config, is_worker);

        // Handles are cheap to clone; this keeps `self` free for the state
        // transition below.
        let store = self.store.clone().ok_or(PluginError::NotStarted {
            hook: "collection_modify_items",
        })?;

        let mut errors: Vec<String> = Vec::new();
        for item in items {
            let mut requirements = Vec::new();
            if self.config.mandate_requirement_markers {
                let validation =
                    validate_requirement_tags(&item.node_id, &item.requirement_args);
                errors.extend(validation.errors);
                requirements = validation.validated_requirements;
            }

            store.insert(CollectedTestMetadata {
                node_id: item.node_id.clone(),
                doc_string: item.doc_string.as_deref().unwrap_or("").trim().to_owned(),
                requirements,
                status: TestStatus::NotRun,
            })?;
        }

        self.state = RunState::Executing;

        if !errors.is_empty() {
            return Err(InvalidTestConfiguration::new(errors).into());
        }
        Ok(())
    }

    /// Collection finish: a late chance to engage the debugger before
    /// execution starts.
    pub fn collection_finish(&mut self) {
        let is_worker = self.is_worker();
        self.debugger.engage(&self.config, is_worker);
    }

    /// Per-test result event. Only the `Call` phase determines a test's
    /// status; setup and teardown reports are ignored.
    pub fn test_report(&self, report: &TestReport) -> Result<(), PluginError> {
        if report.phase != ExecutionPhase::Call {
            return Ok(());
        }
        let store = self.store.as_ref().ok_or(PluginError::NotStarted {
            hook: "test_report",
        })?;
        let status = if report.passed {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        };
        store.update_status(&report.node_id, status)?;
        Ok(())
    }

    /// Session finish: emits the CSV report if a destination is configured.
    ///
    /// Reporting happens on the controller only; the harness is responsible
    /// for firing this after all workers have finished, so the snapshot
    /// reflects every status update that landed.
    pub fn session_finish(&mut self) -> Result<Option<ReportStats>, PluginError> {
        self.state = RunState::Finished;

        if self.is_worker() {
            return Ok(None);
        }
        let Some(reporting) = &self.config.reporting else {
            return Ok(None);
        };
        let store = self.store.as_ref().ok_or(PluginError::NotStarted {
            hook: "session_finish",
        })?;

        let snapshot = store.snapshot()?;
        let stats = report::write_csv_report(
            &snapshot,
            &reporting.csv_export_path,
            reporting.omit_unexecuted_tests,
        )
        .map_err(PluginError::Report)?;
        Ok(Some(stats))
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the resolved run context, if a session has been established.
    pub fn context(&self) -> Option<&RunContext> {
        self.context.as_ref()
    }

    /// Returns this process's store handle, if a session has been
    /// established.
    pub fn store(&self) -> Option<&CollectedTestStore> {
        self.store.as_ref()
    }

    fn is_worker(&self) -> bool {
        self.context.as_ref().is_some_and(RunContext::is_worker)
    }
}
