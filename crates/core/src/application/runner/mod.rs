// Queue Runner - owns the ImportQueue on a single task
//
// All callers talk to the engine through a QueueHandle. Commands, ticks and
// executor outcomes are handled one at a time on the runner task, which gives
// the engine the single-threaded discipline it relies on.

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::import_queue::{ImportQueue, QueueEvent, QueueStatus};
use crate::error::{AppError, Result};
use constants::COMMAND_CHANNEL_CAPACITY;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Request sent from a handle to the runner task
#[derive(Debug)]
pub enum QueueCommand {
    Enqueue {
        paths: Vec<String>,
        owner_id: String,
        reply: oneshot::Sender<Result<usize>>,
    },
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Clear {
        reply: oneshot::Sender<Result<()>>,
    },
    SetInteractive {
        interactive: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<QueueStatus>,
    },
    ManualBegin,
    ManualEnd,
}

/// Cloneable front door to a running ImportQueue
#[derive(Clone)]
pub struct QueueHandle {
    commands: mpsc::Sender<QueueCommand>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueHandle {
    /// Enqueue files for one owner; returns how many were added
    pub async fn enqueue(&self, paths: Vec<String>, owner_id: impl Into<String>) -> Result<usize> {
        let owner_id = owner_id.into();
        self.request(|reply| QueueCommand::Enqueue {
            paths,
            owner_id,
            reply,
        })
        .await?
    }

    pub async fn start(&self) -> Result<()> {
        self.request(|reply| QueueCommand::Start { reply }).await?
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| QueueCommand::Clear { reply }).await?
    }

    pub async fn set_interactive(&self, interactive: bool) -> Result<()> {
        self.request(|reply| QueueCommand::SetInteractive { interactive, reply })
            .await?
    }

    pub async fn status(&self) -> Result<QueueStatus> {
        self.request(|reply| QueueCommand::Status { reply }).await
    }

    pub async fn manual_import_begin(&self) -> Result<()> {
        self.send(QueueCommand::ManualBegin).await
    }

    pub async fn manual_import_end(&self) -> Result<()> {
        self.send(QueueCommand::ManualEnd).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| AppError::Internal("queue runner dropped the request".to_string()))
    }

    async fn send(&self, command: QueueCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::Internal("queue runner is not running".to_string()))
    }
}

/// Event loop driving one ImportQueue
pub struct QueueRunner {
    queue: ImportQueue,
    commands: mpsc::Receiver<QueueCommand>,
}

impl QueueRunner {
    pub fn new(queue: ImportQueue) -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = QueueHandle {
            commands: tx,
            events: queue.event_sender(),
        };
        (Self { queue, commands: rx }, handle)
    }

    /// Run until shutdown is signalled or every handle is dropped
    pub async fn run(mut self, mut shutdown: ShutdownToken) {
        info!(remaining = self.queue.remaining_count(), "Queue runner started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    info!("Queue runner shutting down");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("All queue handles dropped, stopping runner");
                        break;
                    };
                    self.handle_command(command).await;
                }
                message = self.queue.next_message() => {
                    if let Err(e) = self.queue.handle_message(message).await {
                        error!(error = %e, "Import queue step failed");
                    }
                }
            }
        }

        info!(
            remaining = self.queue.remaining_count(),
            in_flight = ?self.queue.current_path(),
            "Queue runner stopped"
        );
    }

    async fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue {
                paths,
                owner_id,
                reply,
            } => {
                let result = self.queue.enqueue_many(paths, &owner_id).await;
                respond(reply, result);
            }
            QueueCommand::Start { reply } => {
                let result = self.queue.start_processing().await;
                respond(reply, result);
            }
            QueueCommand::Clear { reply } => {
                let result = self.queue.clear().await;
                respond(reply, result);
            }
            QueueCommand::SetInteractive { interactive, reply } => {
                let result = self.queue.set_interactive(interactive).await;
                respond(reply, result);
            }
            QueueCommand::Status { reply } => {
                let _ = reply.send(self.queue.status());
            }
            QueueCommand::ManualBegin => self.queue.manual_import_begin(),
            QueueCommand::ManualEnd => self.queue.manual_import_end(),
        }
    }
}

fn respond<T>(reply: oneshot::Sender<Result<T>>, result: Result<T>) {
    if let Err(e) = &result {
        error!(error = %e, "Queue command failed");
    }
    if reply.send(result).is_err() {
        debug!("Caller went away before the reply");
    }
}

/// Spawn the runner on the current tokio runtime
pub fn spawn_queue_runner(queue: ImportQueue, shutdown: ShutdownToken) -> (QueueHandle, JoinHandle<()>) {
    let (runner, handle) = QueueRunner::new(queue);
    let join = tokio::spawn(runner.run(shutdown));
    (handle, join)
}
