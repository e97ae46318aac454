//! Event intake: the entry point transports call for every inbound event.

use super::pipeline::QueuedTask;
use super::queue::{Enqueued, TaskQueue};
use crate::transport::InboundMessage;

/// Sender suffixes of group chats and broadcast lists, which are not relayed.
const IGNORED_SUFFIXES: &[&str] = &["@g.us", "@broadcast", "@newsletter"];

/// Hands inbound messages to the task queue without waiting for processing.
#[derive(Clone)]
pub struct EventIntake {
    queue: TaskQueue,
}

impl EventIntake {
    pub fn new(queue: TaskQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Queue one inbound message. Returns `None` when the event is ignored.
    pub async fn accept(&self, message: InboundMessage) -> Option<Enqueued> {
        if let Some(reason) = ignore_reason(&message) {
            tracing::debug!(
                key = %message.key,
                transport = message.transport.name(),
                reason,
                "Ignoring inbound event"
            );
            return None;
        }

        tracing::info!(
            key = %message.key,
            transport = message.transport.name(),
            "Received message"
        );

        Some(self.queue.enqueue(QueuedTask::new(message)).await)
    }
}

fn ignore_reason(message: &InboundMessage) -> Option<&'static str> {
    if message.key.as_str().is_empty() {
        return Some("missing sender");
    }
    if message.body.trim().is_empty() {
        return Some("empty body");
    }
    if IGNORED_SUFFIXES
        .iter()
        .any(|suffix| message.raw_identifier.ends_with(suffix))
    {
        return Some("group or broadcast sender");
    }
    None
}
