// Copyright (c) The reqtrace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The collected-test store: a durable, race-free mapping from test
//! identifier to collected metadata, shared by every process in one run.
//!
//! The store is backed by a single JSON document under the session's scratch
//! directory, with a companion lock file. Every operation is a full
//! read-modify-write (or a locked read): the backing format has no
//! append/merge primitive, so the OS-level exclusive lock is held across the
//! whole read-mutate-write window, never just the write. The write itself is
//! atomic, so no reader ever observes a partially-written document.
//!
//! This is the simplest correct design for low-to-moderate test counts. Each
//! status update rewrites the whole document, so throughput scales with run
//! size; a log-structured scheme would lift that ceiling if it ever matters.

use crate::errors::StoreError;
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use reqtrace_metadata::{CollectedTestMetadata, CollectedTestsSummary, TestStatus};
use std::{
    fs::{File, TryLockError},
    io::{self, Write},
    thread,
    time::{Duration, Instant},
};

static COLLECTED_JSON_FILE_NAME: &str = "collected-tests.json";
static COLLECTED_LOCK_FILE_NAME: &str = "collected-tests.json.lock";

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// A handle to one session's collected-test store.
///
/// Cheap to construct; every operation opens and locks the backing files
/// independently, so handles can live in any process of the run. Constructing
/// a handle performs no I/O: a store whose backing file does not exist yet
/// reads as an empty mapping.
#[derive(Clone, Debug)]
pub struct CollectedTestStore {
    document_path: Utf8PathBuf,
    lock_path: Utf8PathBuf,
}

impl CollectedTestStore {
    /// Creates a store handle for the given session scratch directory.
    pub fn new(session_dir: &Utf8Path) -> Self {
        Self {
            document_path: session_dir.join(COLLECTED_JSON_FILE_NAME),
            lock_path: session_dir.join(COLLECTED_LOCK_FILE_NAME),
        }
    }

    /// Returns the path to the backing document.
    pub fn document_path(&self) -> &Utf8Path {
        &self.document_path
    }

    /// Returns the metadata recorded for `node_id`.
    ///
    /// Fails with [`StoreError::TestNotFound`] if the identifier has not been
    /// collected, including when the backing file does not exist yet.
    pub fn get(&self, node_id: &str) -> Result<CollectedTestMetadata, StoreError> {
        let locked = self.lock_exclusive()?;
        locked
            .summary
            .tests
            .get(node_id)
            .cloned()
            .ok_or_else(|| StoreError::TestNotFound {
                node_id: node_id.to_owned(),
            })
    }

    /// Inserts or overwrites the entry for `metadata.node_id`.
    pub fn insert(&self, metadata: CollectedTestMetadata) -> Result<(), StoreError> {
        let mut locked = self.lock_exclusive()?;
        locked
            .summary
            .tests
            .insert(metadata.node_id.clone(), metadata);
        locked.write_back()
    }

    /// Sets the status of a previously collected test.
    ///
    /// Fails with [`StoreError::TestNotFound`] if the identifier is absent:
    /// a status update before collection recorded the test is a
    /// lifecycle-ordering bug in the caller.
    pub fn update_status(&self, node_id: &str, status: TestStatus) -> Result<(), StoreError> {
        let mut locked = self.lock_exclusive()?;
        let entry = locked.summary.tests.get_mut(node_id).ok_or_else(|| {
            StoreError::TestNotFound {
                node_id: node_id.to_owned(),
            }
        })?;
        entry.status = status;
        locked.write_back()
    }

    /// Returns the entire mapping, for reporting.
    pub fn snapshot(&self) -> Result<CollectedTestsSummary, StoreError> {
        let locked = self.lock_exclusive()?;
        Ok(locked.summary)
    }

    /// Acquires the store's exclusive lock and reads the current document.
    ///
    /// The lock is held until the returned guard is dropped, so it covers the
    /// caller's full read-modify-write window.
    fn lock_exclusive(&self) -> Result<ExclusiveLockedStore<'_>, StoreError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|error| StoreError::FileLock {
                path: self.lock_path.clone(),
                error,
            })?;

        acquire_lock_with_retry(&file, &self.lock_path)?;

        // Now that the lock is held, read the current document. A missing
        // file is an empty mapping, not an error.
        let summary = match std::fs::read_to_string(&self.document_path) {
            Ok(json) => serde_json::from_str(&json).map_err(|error| {
                StoreError::DocumentDeserialize {
                    path: self.document_path.clone(),
                    error,
                }
            })?,
            Err(error) if error.kind() == io::ErrorKind::NotFound => CollectedTestsSummary::new(),
            Err(error) => {
                return Err(StoreError::DocumentRead {
                    path: self.document_path.clone(),
                    error,
                });
            }
        };

        Ok(ExclusiveLockedStore {
            store: self,
            locked_file: DebugIgnore(file),
            summary,
        })
    }
}

/// The store with its exclusive lock held and its document loaded.
///
/// The lifetime parameter ensures this isn't held for longer than the
/// corresponding [`CollectedTestStore`].
#[derive(Debug)]
struct ExclusiveLockedStore<'store> {
    store: &'store CollectedTestStore,
    // Held for RAII lock semantics; the lock is released when this struct is
    // dropped.
    #[expect(dead_code)]
    locked_file: DebugIgnore<File>,
    summary: CollectedTestsSummary,
}

impl ExclusiveLockedStore<'_> {
    /// Writes the (mutated) document back to disk atomically, then releases
    /// the lock by consuming self.
    fn write_back(self) -> Result<(), StoreError> {
        let document_path = &self.store.document_path;
        let json = serde_json::to_string(&self.summary).map_err(|error| {
            StoreError::DocumentSerialize {
                path: document_path.clone(),
                error,
            }
        })?;

        atomicwrites::AtomicFile::new(document_path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(json.as_bytes()))
            .map_err(|error| StoreError::DocumentWrite {
                path: document_path.clone(),
                error,
            })
    }
}

/// Acquires an exclusive file lock with retries, timing out after
/// [`LOCK_TIMEOUT`].
///
/// The store's critical sections are single-document read-modify-writes, so
/// contention is brief; a holder that exceeds the timeout has almost
/// certainly crashed, and surfacing that beats hanging every other process in
/// the run.
fn acquire_lock_with_retry(file: &File, lock_path: &Utf8Path) -> Result<(), StoreError> {
    let start = Instant::now();
    loop {
        match file.try_lock() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= LOCK_TIMEOUT {
                    return Err(StoreError::FileLockTimeout {
                        path: lock_path.to_owned(),
                        timeout_secs: LOCK_TIMEOUT.as_secs(),
                    });
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(TryLockError::Error(error)) => {
                return Err(StoreError::FileLock {
                    path: lock_path.to_owned(),
                    error,
                });
            }
        }
    }
}
