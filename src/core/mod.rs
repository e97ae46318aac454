//! Core module - conversation queues and the relay pipeline.
//!
//! This module contains the heart of chatrelay's message processing:
//! - Sender identity resolution
//! - The per-message relay pipeline
//! - Per-conversation serialized task queues
//! - Event intake from transports

pub mod identity;
pub mod intake;
pub mod pipeline;
pub mod queue;

#[cfg(test)]
pub(crate) mod testing;

pub use identity::{ConversationKey, IdentityResolver};
pub use intake::EventIntake;
pub use pipeline::{ConversationPipeline, PipelineOutcome, QueuedTask, TaskProcessor};
pub use queue::{ConversationQueueState, Enqueued, QueueStats, TaskQueue};
