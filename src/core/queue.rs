//! Per-conversation task queue.
//!
//! Every conversation key owns a FIFO of pending tasks. At most one task per
//! key is processed at a time; different keys drain independently. A key's
//! entry exists exactly while it has work: it is created by the first
//! enqueue and removed by its drain once the FIFO is empty.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use super::identity::ConversationKey;
use super::pipeline::{QueuedTask, TaskProcessor};

/// Queue state of one active conversation.
#[derive(Debug, Default)]
pub struct ConversationQueueState {
    pending: VecDeque<QueuedTask>,
    /// A task of this conversation is being processed right now.
    locked: bool,
}

impl ConversationQueueState {
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Result of handing a task to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    /// Tasks waiting for this key, including the new one.
    pub pending: usize,
    /// Whether this enqueue started a new drain for the key.
    pub started_drain: bool,
}

struct Inner {
    states: Mutex<HashMap<ConversationKey, ConversationQueueState>>,
    processor: Arc<dyn TaskProcessor>,
    drained: Notify,
}

/// Process-wide registry of conversation queues.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    pub fn new(processor: Arc<dyn TaskProcessor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                states: Mutex::new(HashMap::new()),
                processor,
                drained: Notify::new(),
            }),
        }
    }

    /// Append a task to its conversation's queue.
    ///
    /// Returns promptly; processing happens on a spawned drain. A drain is
    /// started only when the key had no entry, otherwise the running drain
    /// picks the task up.
    pub async fn enqueue(&self, task: QueuedTask) -> Enqueued {
        let key = task.message.key.clone();
        let task_id = task.id.clone();

        let enqueued = {
            let mut states = self.inner.states.lock().await;
            let started_drain = !states.contains_key(&key);
            let state = states.entry(key.clone()).or_default();
            state.pending.push_back(task);
            Enqueued {
                pending: state.pending.len(),
                started_drain,
            }
        };

        tracing::debug!(
            key = %key,
            task_id = %task_id,
            pending = enqueued.pending,
            "Enqueued task"
        );

        if enqueued.started_drain {
            tokio::spawn(self.clone().drain(key));
        }

        enqueued
    }

    /// Process `key`'s tasks one at a time until none remain, then drop its entry.
    async fn drain(self, key: ConversationKey) {
        tracing::debug!(key = %key, "Draining conversation queue");

        loop {
            let task = {
                let mut states = self.inner.states.lock().await;
                let Some(state) = states.get_mut(&key) else {
                    return;
                };
                match state.pending.pop_front() {
                    Some(task) => {
                        state.locked = true;
                        task
                    }
                    None => {
                        states.remove(&key);
                        let now_idle = states.is_empty();
                        drop(states);
                        tracing::debug!(key = %key, "Conversation queue drained and removed");
                        if now_idle {
                            self.inner.drained.notify_waiters();
                        }
                        return;
                    }
                }
            };

            self.run(&key, task).await;

            if let Some(state) = self.inner.states.lock().await.get_mut(&key) {
                state.locked = false;
            }
        }
    }

    /// Run one task, isolating the drain from panics inside the processor.
    async fn run(&self, key: &ConversationKey, task: QueuedTask) {
        let task_id = task.id.clone();
        let processor = self.inner.processor.clone();

        match tokio::spawn(async move { processor.process(task).await }).await {
            Ok(outcome) => {
                tracing::debug!(key = %key, task_id = %task_id, ?outcome, "Task finished");
            }
            Err(e) => {
                tracing::error!(key = %key, task_id = %task_id, error = %e, "Task aborted");
            }
        }
    }

    /// Keys that currently have queued or running work.
    pub async fn active_keys(&self) -> Vec<ConversationKey> {
        let mut keys: Vec<_> = self.inner.states.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether `key` currently has an entry.
    pub async fn is_active(&self, key: &ConversationKey) -> bool {
        self.inner.states.lock().await.contains_key(key)
    }

    /// Get queue statistics.
    pub async fn stats(&self) -> QueueStats {
        let states = self.inner.states.lock().await;
        QueueStats {
            active_keys: states.len(),
            pending: states.values().map(|s| s.pending()).sum(),
            processing: states.values().filter(|s| s.is_locked()).count(),
        }
    }

    /// Wait until every conversation queue has drained.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.states.lock().await.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub active_keys: usize,
    pub pending: usize,
    pub processing: usize,
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Queue Stats:")?;
        writeln!(f, "  Active keys: {}", self.active_keys)?;
        writeln!(f, "  Pending:     {}", self.pending)?;
        write!(f, "  Processing:  {}", self.processing)
    }
}
