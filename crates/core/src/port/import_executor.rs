// Import Executor Port
// Performs the actual copy/registration of one queued file, asynchronously

use crate::domain::{ImportOutcome, ImportRequest};
use thiserror::Error;
use tokio::sync::mpsc;

/// Monotonic id of one dispatch, used to discard outcomes of superseded dispatches
pub type DispatchId = u64;

/// Outcome tagged with the dispatch it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub dispatch_id: DispatchId,
    pub outcome: ImportOutcome,
}

/// Errors raised synchronously by `begin_import`
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Source not importable: {0}")]
    Unsupported(String),

    #[error("Executor busy: {0}")]
    Busy(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Single-use completion handle for one dispatch.
///
/// Every reporting method consumes the reporter, so an executor can report at
/// most one outcome per dispatch. Reports for a dispatch the engine no longer
/// tracks are ignored by the engine. Dropping a reporter without reporting
/// leaves the queue stalled and is logged.
#[derive(Debug)]
pub struct OutcomeReporter {
    dispatch_id: DispatchId,
    tx: mpsc::UnboundedSender<DispatchOutcome>,
    reported: bool,
}

impl OutcomeReporter {
    pub fn new(dispatch_id: DispatchId, tx: mpsc::UnboundedSender<DispatchOutcome>) -> Self {
        Self {
            dispatch_id,
            tx,
            reported: false,
        }
    }

    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    pub fn completed(self, name: impl Into<String>) {
        self.report(ImportOutcome::Completed { name: name.into() });
    }

    pub fn cancelled(self, name: impl Into<String>) {
        self.report(ImportOutcome::Cancelled { name: name.into() });
    }

    pub fn failed(self, name: impl Into<String>, message: impl Into<String>) {
        self.report(ImportOutcome::Failed {
            name: name.into(),
            message: message.into(),
        });
    }

    pub fn report(mut self, outcome: ImportOutcome) {
        self.reported = true;
        let outcome = DispatchOutcome {
            dispatch_id: self.dispatch_id,
            outcome,
        };
        if self.tx.send(outcome).is_err() {
            // Engine already dropped (shutdown); nothing left to notify
            tracing::debug!(dispatch_id = self.dispatch_id, "Outcome reported after engine shutdown");
        }
    }
}

impl Drop for OutcomeReporter {
    fn drop(&mut self) {
        if !self.reported && !self.tx.is_closed() {
            tracing::warn!(
                dispatch_id = self.dispatch_id,
                "Reporter dropped without an outcome"
            );
        }
    }
}

/// Import Executor trait
///
/// Implementations:
/// - CopyImportExecutor: copies the file into the host project
/// - CommandImportExecutor: hands the file to an external host command
pub trait ImportExecutor: Send + Sync {
    /// Start importing one file and return immediately.
    ///
    /// The outcome must be reported later through `reporter`. Returning an
    /// error (or panicking) is treated by the engine exactly like a
    /// `failed` report.
    fn begin_import(
        &self,
        request: &ImportRequest,
        reporter: OutcomeReporter,
    ) -> Result<(), ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Report completion immediately
        Complete,
        /// Report cancellation immediately
        Cancel,
        /// Report failure immediately
        Fail(String),
        /// Return an error from `begin_import`
        Reject(String),
        /// Panic inside `begin_import`
        Panic(String),
        /// Keep the reporter until the test resolves it
        Hold,
    }

    /// Scripted executor recording every request it receives
    #[derive(Clone)]
    pub struct MockImportExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        requests: Arc<Mutex<Vec<ImportRequest>>>,
        held: Arc<Mutex<VecDeque<(ImportRequest, OutcomeReporter)>>>,
    }

    impl MockImportExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                requests: Arc::new(Mutex::new(Vec::new())),
                held: Arc::new(Mutex::new(VecDeque::new())),
            }
        }

        pub fn new_complete() -> Self {
            Self::new(MockBehavior::Complete)
        }

        pub fn new_holding() -> Self {
            Self::new(MockBehavior::Hold)
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Source paths in dispatch order
        pub fn dispatched_paths(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.source_path.clone())
                .collect()
        }

        pub fn last_request(&self) -> Option<ImportRequest> {
            self.requests.lock().unwrap().last().cloned()
        }

        pub fn held_count(&self) -> usize {
            self.held.lock().unwrap().len()
        }

        /// Resolve the oldest held dispatch with `outcome`. Returns false if none is held.
        pub fn resolve_next(&self, outcome: ImportOutcome) -> bool {
            match self.held.lock().unwrap().pop_front() {
                Some((_, reporter)) => {
                    reporter.report(outcome);
                    true
                }
                None => false,
            }
        }

        /// Hand out the oldest held reporter so a test can report late or twice
        pub fn take_held(&self) -> Option<(ImportRequest, OutcomeReporter)> {
            self.held.lock().unwrap().pop_front()
        }
    }

    impl ImportExecutor for MockImportExecutor {
        fn begin_import(
            &self,
            request: &ImportRequest,
            reporter: OutcomeReporter,
        ) -> Result<(), ExecutionError> {
            self.requests.lock().unwrap().push(request.clone());

            let behavior = self.behavior.lock().unwrap().clone();
            let name = file_name(&request.source_path);

            match behavior {
                MockBehavior::Complete => reporter.completed(name),
                MockBehavior::Cancel => reporter.cancelled(name),
                MockBehavior::Fail(msg) => reporter.failed(name, msg),
                MockBehavior::Reject(msg) => return Err(ExecutionError::SpawnFailed(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Hold => {
                    self.held
                        .lock()
                        .unwrap()
                        .push_back((request.clone(), reporter));
                }
            }
            Ok(())
        }
    }

    fn file_name(path: &str) -> String {
        std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }
}
