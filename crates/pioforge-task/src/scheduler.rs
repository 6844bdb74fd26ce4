//! The per-connection task scheduler.
//!
//! # Design
//!
//! The registry is a `HashMap<(ConnectionId, TaskCategory), Handle>`
//! behind a short `std::sync::Mutex` section; every task runs in its own
//! tokio task (its *runner*). A handle holds the sending side of a
//! one-shot control channel. Stopping, replacing and connection teardown
//! all work the same way: take the handle out of the map, send it a
//! control message, and wait for the runner to acknowledge.
//!
//! ```text
//! schedule ──→ [Pending] ──delay──→ [Running] ──→ done (or re-arm if repeating)
//!                  │                    │
//!                  │ control msg         └── control msg waits; acts before
//!                  ▼                         the next iteration, or is dropped
//!          on_cancelled / on_force_complete  if this was the last one
//! ```
//!
//! Each runner waits with `tokio::select! { biased; ... }` with the
//! control channel first, so a stop that arrives together with the timer
//! always wins. Once `execute` has started the runner stops listening
//! until the iteration is over; a stop that lands then either takes
//! effect before the next iteration or, for a one-shot task, finds the
//! runner gone and reports [`StopOutcome::NotFound`].
//!
//! Entries carry a generation number. A runner that finishes on its own
//! only removes its entry if the generation still matches, so it can
//! never remove the task that replaced it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use pioforge_transport::{ClientConnection, ConnectionId, TransportError};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{CancelReason, ServerTask, TaskCategory, TaskError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Registry key: one live task per connection and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub connection: ConnectionId,
    pub category: TaskCategory,
}

/// How [`TaskScheduler::stop`] should end a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Cancel; neither `execute` nor `on_complete` run.
    Cancel,
    /// Fast-forward through `on_force_complete`.
    ForceComplete,
}

/// What a stop actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task was waiting and has been cancelled.
    Stopped,
    /// The task was waiting and `on_force_complete` has run.
    ForceCompleted,
    /// No task was waiting: never scheduled, already fired, or already
    /// stopped. Not an error.
    NotFound,
}

/// Observable state of a live task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;

// ---------------------------------------------------------------------------
// Control channel
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ControlKind {
    Cancel(CancelReason),
    ForceComplete,
}

#[derive(Debug)]
struct Control {
    kind: ControlKind,
    ack: oneshot::Sender<StopOutcome>,
}

struct Handle {
    generation: u64,
    task_id: String,
    state: Arc<AtomicU8>,
    control: oneshot::Sender<Control>,
}

impl Handle {
    /// Sends `kind` to the runner and waits for it to act.
    async fn signal(self, kind: ControlKind) -> StopOutcome {
        let (ack, ack_rx) = oneshot::channel();
        if self.control.send(Control { kind, ack }).is_err() {
            return StopOutcome::NotFound;
        }
        // The runner drops the message unanswered when it has already
        // fired its last iteration.
        ack_rx.await.unwrap_or(StopOutcome::NotFound)
    }

    /// Sends `kind` without waiting. A runner that is mid-iteration reads
    /// it once the iteration ends.
    fn notify(self, kind: ControlKind) {
        let (ack, _) = oneshot::channel();
        let _ = self.control.send(Control { kind, ack });
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }
}

type Registry = Mutex<HashMap<TaskKey, Handle>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<TaskKey, Handle>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TaskScheduler
// ---------------------------------------------------------------------------

/// Registry of live tasks for every connection.
///
/// Shared through `Arc` by the handlers and the server. Cheap to call from
/// any task; no lock is held across an `.await`.
pub struct TaskScheduler {
    registry: Arc<Registry>,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Schedules `task` on `connection`, replacing any live task of the
    /// same category.
    ///
    /// A replaced task gets `on_cancelled(Replaced)` before this returns
    /// (unless it was already executing, in which case it finishes
    /// normally and this does not wait for it). Returns the derived task
    /// id.
    ///
    /// # Errors
    /// - [`TaskError::SchedulerClosed`] after [`shutdown`](Self::shutdown).
    /// - [`TaskError::Connection`] if the connection is already closed.
    pub async fn schedule<T: ServerTask>(
        &self,
        connection: &Arc<ClientConnection>,
        task: T,
    ) -> Result<String, TaskError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TaskError::SchedulerClosed);
        }
        if connection.is_closed() {
            return Err(TaskError::Connection(TransportError::ConnectionClosed(
                connection.remote_addr().to_string(),
            )));
        }

        let task: Arc<dyn ServerTask> = Arc::new(task);
        let category = task.category();
        let key = TaskKey {
            connection: connection.id(),
            category,
        };
        let task_id = category.task_id(&connection.player_id(), task.entity_id().as_deref());
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(PENDING));
        let (control, control_rx) = oneshot::channel();

        let previous = lock(&self.registry).insert(
            key,
            Handle {
                generation,
                task_id: task_id.clone(),
                state: Arc::clone(&state),
                control,
            },
        );

        if let Some(previous) = previous {
            tracing::debug!(
                task_id = %previous.task_id,
                replaced_by = %task_id,
                "replacing live task"
            );
            if previous.is_running() {
                // Possibly the caller itself, scheduling its successor
                // from a hook; waiting would never return.
                previous.notify(ControlKind::Cancel(CancelReason::Replaced));
            } else {
                previous.signal(ControlKind::Cancel(CancelReason::Replaced)).await;
            }
        }

        let runner = Runner {
            task,
            connection: Arc::clone(connection),
            control: control_rx,
            state,
            registry: Arc::downgrade(&self.registry),
            key,
            generation,
            task_id: task_id.clone(),
        };
        tokio::spawn(runner.run());

        tracing::debug!(%task_id, conn = %key.connection, "task scheduled");
        Ok(task_id)
    }

    /// Stops the live task of `category` on `connection`.
    ///
    /// Stopping something that is not there, or has already fired, is a
    /// no-op that returns [`StopOutcome::NotFound`].
    pub async fn stop(
        &self,
        connection: ConnectionId,
        category: TaskCategory,
        mode: StopMode,
    ) -> StopOutcome {
        let key = TaskKey {
            connection,
            category,
        };
        let Some(handle) = lock(&self.registry).remove(&key) else {
            tracing::debug!(conn = %connection, %category, "stop: no live task");
            return StopOutcome::NotFound;
        };

        let task_id = handle.task_id.clone();
        let kind = match mode {
            StopMode::Cancel => ControlKind::Cancel(CancelReason::Manual),
            StopMode::ForceComplete => ControlKind::ForceComplete,
        };
        let outcome = handle.signal(kind).await;
        tracing::debug!(%task_id, ?outcome, "task stopped");
        outcome
    }

    /// Cancels every live task on `connection`. Returns how many were
    /// still waiting.
    pub async fn stop_all_for_connection(&self, connection: ConnectionId) -> usize {
        let handles: Vec<Handle> = {
            let mut map = lock(&self.registry);
            let keys: Vec<TaskKey> = map
                .keys()
                .filter(|k| k.connection == connection)
                .copied()
                .collect();
            keys.iter().filter_map(|k| map.remove(k)).collect()
        };

        let mut stopped = 0;
        for handle in handles {
            let outcome = handle
                .signal(ControlKind::Cancel(CancelReason::ConnectionClosed))
                .await;
            if outcome == StopOutcome::Stopped {
                stopped += 1;
            }
        }
        if stopped > 0 {
            tracing::debug!(conn = %connection, stopped, "stopped tasks for connection");
        }
        stopped
    }

    /// State of the live task, if any.
    pub fn state(&self, connection: ConnectionId, category: TaskCategory) -> Option<TaskState> {
        let key = TaskKey {
            connection,
            category,
        };
        lock(&self.registry).get(&key).map(|h| {
            match h.state.load(Ordering::Acquire) {
                RUNNING => TaskState::Running,
                _ => TaskState::Pending,
            }
        })
    }

    pub fn is_scheduled(&self, connection: ConnectionId, category: TaskCategory) -> bool {
        self.state(connection, category).is_some()
    }

    /// Task ids of every live task on `connection`.
    pub fn task_ids(&self, connection: ConnectionId) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.registry)
            .iter()
            .filter(|(k, _)| k.connection == connection)
            .map(|(_, h)| h.task_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every task and refuses new ones.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let handles: Vec<Handle> = lock(&self.registry).drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            handle.signal(ControlKind::Cancel(CancelReason::Shutdown)).await;
        }
        tracing::info!(cancelled = count, "task scheduler shut down");
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// What woke a waiting runner.
enum Wake {
    Control(Control),
    /// The handle was dropped without a message (scheduler dropped).
    Orphaned,
    ConnectionClosed,
    TimedOut,
    Due,
}

struct Runner {
    task: Arc<dyn ServerTask>,
    connection: Arc<ClientConnection>,
    control: oneshot::Receiver<Control>,
    state: Arc<AtomicU8>,
    registry: Weak<Registry>,
    key: TaskKey,
    generation: u64,
    task_id: String,
}

impl Runner {
    async fn run(mut self) {
        let config = self.task.config().validated();
        let deadline = config.timeout.map(|t| Instant::now() + t);
        let closed = self.connection.cancel_token();
        let mut delay = config.start_delay;
        let mut iteration: u32 = 0;

        loop {
            let wake = tokio::select! {
                biased;
                ctrl = &mut self.control => match ctrl {
                    Ok(ctrl) => Wake::Control(ctrl),
                    Err(_) => Wake::Orphaned,
                },
                _ = closed.cancelled() => Wake::ConnectionClosed,
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => Wake::TimedOut,
                _ = tokio::time::sleep(delay) => Wake::Due,
            };

            match wake {
                Wake::Due => {}
                Wake::Control(ctrl) => {
                    self.handle_control(ctrl).await;
                    return;
                }
                Wake::Orphaned => {
                    self.cancel(CancelReason::Shutdown).await;
                    return;
                }
                Wake::ConnectionClosed => {
                    self.cancel(CancelReason::ConnectionClosed).await;
                    self.release();
                    return;
                }
                Wake::TimedOut => {
                    tracing::debug!(task_id = %self.task_id, "task timed out");
                    self.cancel(CancelReason::Timeout).await;
                    self.release();
                    return;
                }
            }

            self.state.store(RUNNING, Ordering::Release);
            iteration += 1;
            if let Err(e) = self.fire(iteration).await {
                tracing::warn!(task_id = %self.task_id, iteration, error = %e, "task failed");
                self.cancel(CancelReason::Error).await;
                self.release();
                return;
            }

            if !config.allows_another(iteration) {
                tracing::debug!(task_id = %self.task_id, iteration, "task completed");
                self.release();
                return;
            }
            // Re-arm; repeat_interval is always set when another run is allowed.
            delay = config.repeat_interval.unwrap_or_default();
            self.state.store(PENDING, Ordering::Release);
        }
    }

    async fn fire(&self, iteration: u32) -> Result<(), TaskError> {
        let conn = self.connection.as_ref();
        self.task.on_iteration_start(conn, iteration).await;
        self.task.execute(conn).await?;
        self.task.on_complete(conn).await?;
        self.task.on_iteration_complete(conn, iteration).await;
        Ok(())
    }

    async fn handle_control(&self, ctrl: Control) {
        let outcome = match ctrl.kind {
            ControlKind::Cancel(reason) => {
                self.cancel(reason).await;
                StopOutcome::Stopped
            }
            ControlKind::ForceComplete => {
                self.state.store(RUNNING, Ordering::Release);
                if let Err(e) = self.task.on_force_complete(&self.connection).await {
                    tracing::warn!(task_id = %self.task_id, error = %e, "force-complete failed");
                    self.cancel(CancelReason::Error).await;
                }
                StopOutcome::ForceCompleted
            }
        };
        // The stopper may have given up waiting; nothing to do then.
        let _ = ctrl.ack.send(outcome);
    }

    async fn cancel(&self, reason: CancelReason) {
        tracing::debug!(task_id = %self.task_id, ?reason, "task cancelled");
        self.task.on_cancelled(&self.connection, reason).await;
    }

    /// Removes this runner's entry unless it has been replaced.
    fn release(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut map = lock(&registry);
        if map
            .get(&self.key)
            .is_some_and(|h| h.generation == self.generation)
        {
            map.remove(&self.key);
        }
    }
}
