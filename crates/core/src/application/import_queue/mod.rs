// Import Queue Engine
//
// Sequential, crash-tolerant import queue. Exactly one item is handed to the
// ImportExecutor at a time; every mutation is written through to the
// PersistedQueueStore before control returns to the caller.

mod panic_guard;
pub mod store;

#[cfg(test)]
mod engine_test;

pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use store::PersistedQueueStore;

use crate::application::recovery::RecoveryPlan;
use crate::domain::{ImportOutcome, ImportRequest, QueueItem, QueueState};
use crate::error::Result;
use crate::port::{DispatchId, DispatchOutcome, ImportExecutor, InstallationTracker, OutcomeReporter};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Buffered events per subscriber before slow listeners start lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Engine state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnginePhase {
    /// Nothing dispatched, nothing scheduled
    Idle,
    /// One item is with the executor
    Dispatched,
    /// A tick is posted; the next item (if any) is dispatched when it runs
    AwaitingNextTick,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnginePhase::Idle => write!(f, "IDLE"),
            EnginePhase::Dispatched => write!(f, "DISPATCHED"),
            EnginePhase::AwaitingNextTick => write!(f, "AWAITING_NEXT_TICK"),
        }
    }
}

/// Work the engine posts to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Continue with the next item after an outcome
    Next,
    /// Resume a run interrupted by a restart
    Resume,
}

/// Message to be handled by `ImportQueue::handle_message`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    Tick(Tick),
    Outcome(DispatchOutcome),
}

/// Notification for presentation-layer observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// An item was imported successfully
    ItemFinished { item: QueueItem },
    /// "Is an import active" changed
    ActivityChanged { active: bool },
}

/// Snapshot of the engine for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub remaining: usize,
    pub processing: bool,
    pub phase: EnginePhase,
    pub paths: Vec<String>,
    pub current_path: Option<String>,
    pub current_owner_id: Option<String>,
    pub interactive: bool,
}

#[derive(Debug)]
struct Dispatch {
    id: DispatchId,
    item: QueueItem,
}

/// The import queue engine. Single owner, not shared between threads;
/// see `application::runner` for the task that serializes access to it.
pub struct ImportQueue {
    state: QueueState,
    current: Option<Dispatch>,
    phase: EnginePhase,
    interactive: bool,
    manual_active: bool,
    next_dispatch_id: DispatchId,

    store: PersistedQueueStore,
    executor: Arc<dyn ImportExecutor>,
    tracker: Arc<dyn InstallationTracker>,
    events: broadcast::Sender<QueueEvent>,

    tick_tx: mpsc::UnboundedSender<Tick>,
    tick_rx: mpsc::UnboundedReceiver<Tick>,
    outcome_tx: mpsc::UnboundedSender<DispatchOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<DispatchOutcome>,
}

impl ImportQueue {
    /// Load persisted state and apply startup recovery.
    ///
    /// An interrupted run is never re-dispatched: its item already left the
    /// durable list. Remaining items resume on the first tick handled after
    /// construction, not during it.
    pub async fn load(
        store: PersistedQueueStore,
        executor: Arc<dyn ImportExecutor>,
        tracker: Arc<dyn InstallationTracker>,
    ) -> Result<Self> {
        let state = store.load().await;
        let interactive = store.load_interactive().await;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let mut queue = Self {
            state,
            current: None,
            phase: EnginePhase::Idle,
            interactive,
            manual_active: false,
            next_dispatch_id: 1,
            store,
            executor,
            tracker,
            events,
            tick_tx,
            tick_rx,
            outcome_tx,
            outcome_rx,
        };

        let plan = RecoveryPlan::for_state(&queue.state);
        if plan.needs_persist() {
            queue.state.processing = false;
            queue.persist().await?;
        }
        if let RecoveryPlan::ResumeOnNextTick { .. } = plan {
            queue.schedule(Tick::Resume);
        }

        info!(
            remaining = queue.state.items.len(),
            phase = %queue.phase,
            interactive = queue.interactive,
            "Import queue loaded"
        );
        Ok(queue)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Append one file. Empty and already-queued paths are ignored.
    /// Returns whether the item was added.
    pub async fn enqueue(&mut self, path: &str, owner_id: &str) -> Result<bool> {
        if !self.admit(path, owner_id) {
            return Ok(false);
        }

        if let Err(e) = self.persist().await {
            self.state.items.pop_back();
            return Err(e);
        }

        info!(path = %path, owner_id = %owner_id, remaining = self.state.items.len(), "Item enqueued");
        Ok(true)
    }

    /// Append several files in order with a single persist.
    /// Returns how many were added.
    pub async fn enqueue_many<I, S>(&mut self, paths: I, owner_id: &str) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.state.items.len();
        for path in paths {
            self.admit(path.as_ref(), owner_id);
        }

        let added = self.state.items.len() - before;
        if added > 0 {
            if let Err(e) = self.persist().await {
                self.state.items.truncate(before);
                return Err(e);
            }
        }

        info!(added = added, owner_id = %owner_id, remaining = self.state.items.len(), "Batch enqueued");
        Ok(added)
    }

    /// Begin sequential processing. Never auto-started by enqueue.
    pub async fn start_processing(&mut self) -> Result<()> {
        if self.state.processing || self.current.is_some() || self.manual_active {
            warn!(phase = %self.phase, "Import queue is already processing, ignoring start");
            return Ok(());
        }

        if self.state.items.is_empty() {
            debug!("Start requested on an empty queue");
            return Ok(());
        }

        info!(remaining = self.state.items.len(), "Starting import queue");
        self.process_next().await
    }

    /// Drop every pending item and clear the processing flag.
    ///
    /// An item already with the executor still finishes; its outcome then
    /// finds an empty queue.
    pub async fn clear(&mut self) -> Result<()> {
        let dropped = self.state.items.len();
        self.state.items.clear();
        self.set_processing(false);
        self.persist().await?;

        if let Some(dispatch) = &self.current {
            info!(
                dropped = dropped,
                in_flight = %dispatch.item.source_path(),
                "Queue cleared, in-flight import continues"
            );
        } else {
            info!(dropped = dropped, "Queue cleared");
        }
        Ok(())
    }

    pub async fn set_interactive(&mut self, interactive: bool) -> Result<()> {
        self.store.save_interactive(interactive).await?;
        self.interactive = interactive;
        Ok(())
    }

    /// Mark the engine busy around a synchronous import that bypasses the queue.
    /// Touches neither the queue nor the store.
    pub fn manual_import_begin(&mut self) {
        let was_active = self.is_processing();
        self.manual_active = true;
        self.notify_activity(was_active);
    }

    pub fn manual_import_end(&mut self) {
        let was_active = self.is_processing();
        self.manual_active = false;
        self.notify_activity(was_active);

        // A tick that ran during the manual import was skipped; post it again
        if self.phase == EnginePhase::AwaitingNextTick {
            self.schedule(Tick::Next);
        }
    }

    // ------------------------------------------------------------------
    // Message handling
    // ------------------------------------------------------------------

    /// Wait for the next tick or executor outcome
    pub async fn next_message(&mut self) -> EngineMessage {
        tokio::select! {
            Some(outcome) = self.outcome_rx.recv() => EngineMessage::Outcome(outcome),
            Some(tick) = self.tick_rx.recv() => EngineMessage::Tick(tick),
            // Both senders are owned by self, so the channels never close
            else => std::future::pending().await,
        }
    }

    /// Next pending message without waiting
    pub fn try_next_message(&mut self) -> Option<EngineMessage> {
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            return Some(EngineMessage::Outcome(outcome));
        }
        self.tick_rx.try_recv().ok().map(EngineMessage::Tick)
    }

    pub async fn handle_message(&mut self, message: EngineMessage) -> Result<()> {
        match message {
            EngineMessage::Tick(Tick::Next) => self.check_queue().await,
            EngineMessage::Tick(Tick::Resume) => {
                if self.current.is_some() {
                    debug!("Import already dispatched since restart, resume skipped");
                    return Ok(());
                }
                info!(remaining = self.state.items.len(), "Resuming import queue after restart");
                self.set_processing(false);
                self.check_queue().await
            }
            EngineMessage::Outcome(outcome) => self.finish_dispatch(outcome).await,
        }
    }

    /// Handle every message already queued, including ones produced while
    /// handling. Returns once nothing is pending (a held dispatch may remain).
    pub async fn run_until_idle(&mut self) -> Result<()> {
        while let Some(message) = self.try_next_message() {
            self.handle_message(message).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn remaining_count(&self) -> usize {
        self.state.items.len()
    }

    pub fn is_processing(&self) -> bool {
        self.state.processing || self.manual_active
    }

    pub fn list_paths(&self) -> Vec<String> {
        self.state.paths()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    /// Owner of the in-flight item, if one is dispatched and has an owner
    pub fn current_owner_id(&self) -> Option<&str> {
        self.current.as_ref().and_then(|d| d.item.owner())
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current.as_ref().map(|d| d.item.source_path())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Sender half, for handles that let callers subscribe without the engine
    pub fn event_sender(&self) -> broadcast::Sender<QueueEvent> {
        self.events.clone()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            remaining: self.remaining_count(),
            processing: self.is_processing(),
            phase: self.phase,
            paths: self.list_paths(),
            current_path: self.current_path().map(str::to_string),
            current_owner_id: self.current_owner_id().map(str::to_string),
            interactive: self.interactive,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Validate and append one item in memory only
    fn admit(&mut self, path: &str, owner_id: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let item = match QueueItem::new(path, owner_id) {
            Ok(item) => item,
            Err(e) => {
                warn!(path = %path, error = %e, "Rejecting queue item");
                return false;
            }
        };
        if !self.state.push_unique(item) {
            debug!(path = %path, "Path already queued, ignoring");
            return false;
        }
        true
    }

    async fn check_queue(&mut self) -> Result<()> {
        if self.current.is_some() || self.state.processing || self.manual_active {
            debug!(phase = %self.phase, "Import in progress, tick skipped");
            return Ok(());
        }
        self.process_next().await
    }

    /// Dispatch the head item, skipping items whose file vanished
    async fn process_next(&mut self) -> Result<()> {
        loop {
            if self.state.items.is_empty() {
                self.set_processing(false);
                self.phase = EnginePhase::Idle;
                self.persist().await?;
                info!("Import queue drained");
                return Ok(());
            }

            // Durability point A: a crash from here on is seen as an interrupted run
            self.set_processing(true);
            if let Err(e) = self.persist().await {
                self.abandon_run();
                return Err(e);
            }

            // Durability point B: the item leaves the durable list before dispatch
            let Some(item) = self.state.items.pop_front() else {
                continue;
            };
            if let Err(e) = self.persist().await {
                self.state.items.push_front(item);
                self.abandon_run();
                return Err(e);
            }

            if !Path::new(item.source_path()).is_file() {
                warn!(path = %item.source_path(), "Queued file no longer exists, skipping");
                continue;
            }

            return self.dispatch(item).await;
        }
    }

    async fn dispatch(&mut self, item: QueueItem) -> Result<()> {
        let dispatch_id = self.next_dispatch_id;
        self.next_dispatch_id += 1;

        let request = ImportRequest {
            source_path: item.source_path().to_string(),
            owner_id: item.owner_id().to_string(),
            interactive: self.interactive,
        };
        let reporter = OutcomeReporter::new(dispatch_id, self.outcome_tx.clone());

        info!(
            dispatch_id = dispatch_id,
            path = %request.source_path,
            owner_id = %request.owner_id,
            remaining = self.state.items.len(),
            "Dispatching import"
        );

        self.current = Some(Dispatch { id: dispatch_id, item });
        self.phase = EnginePhase::Dispatched;

        let executor = Arc::clone(&self.executor);
        let message = match execute_guarded(|| executor.begin_import(&request, reporter)) {
            PanicGuardResult::Returned(Ok(())) => return Ok(()),
            PanicGuardResult::Returned(Err(e)) => e.to_string(),
            PanicGuardResult::Panicked(msg) => format!("executor panicked: {msg}"),
        };

        // A synchronous failure is handled exactly like a reported one
        let name = file_name(&request.source_path);
        self.finish_dispatch(DispatchOutcome {
            dispatch_id,
            outcome: ImportOutcome::Failed { name, message },
        })
        .await
    }

    async fn finish_dispatch(&mut self, report: DispatchOutcome) -> Result<()> {
        let dispatch = match self.current.take() {
            Some(dispatch) if dispatch.id == report.dispatch_id => dispatch,
            other => {
                self.current = other;
                debug!(dispatch_id = report.dispatch_id, "Ignoring outcome of a finished dispatch");
                return Ok(());
            }
        };

        self.set_processing(false);
        let persisted = self.persist().await;

        match &report.outcome {
            ImportOutcome::Completed { name } => {
                info!(dispatch_id = dispatch.id, name = %name, "Import completed");
                self.on_success(&dispatch.item).await;
            }
            ImportOutcome::Cancelled { name } => {
                info!(dispatch_id = dispatch.id, name = %name, "Import cancelled");
            }
            ImportOutcome::Failed { name, message } => {
                warn!(
                    dispatch_id = dispatch.id,
                    name = %name,
                    error = %message,
                    "Import failed, moving on"
                );
            }
        }

        // Continue on the next idle tick, never recursively from here
        self.schedule(Tick::Next);
        persisted
    }

    async fn on_success(&self, item: &QueueItem) {
        // No subscribers is fine
        let _ = self.events.send(QueueEvent::ItemFinished { item: item.clone() });

        if let Some(owner) = item.owner() {
            if let Err(e) = self.tracker.mark_installed(owner).await {
                error!(owner_id = %owner, error = %e, "Failed to record installation");
            }
        }
    }

    /// Back to idle after a failed write, leaving the queue startable again
    fn abandon_run(&mut self) {
        error!(remaining = self.state.items.len(), "Queue state could not be saved, stopping");
        self.set_processing(false);
        self.phase = EnginePhase::Idle;
    }

    fn schedule(&mut self, tick: Tick) {
        self.phase = EnginePhase::AwaitingNextTick;
        // Receiver is owned by self; send cannot fail while self is alive
        let _ = self.tick_tx.send(tick);
    }

    fn set_processing(&mut self, processing: bool) {
        let was_active = self.is_processing();
        self.state.processing = processing;
        self.notify_activity(was_active);
    }

    fn notify_activity(&self, was_active: bool) {
        let active = self.is_processing();
        if active != was_active {
            let _ = self.events.send(QueueEvent::ActivityChanged { active });
        }
    }

    async fn persist(&self) -> Result<()> {
        self.store.save(&self.state).await
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
