//! chatrelay library root.

pub mod backend;
pub mod cli;
pub mod config;
pub mod core;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod transport;
pub mod web;

pub use backend::{BackendError, BackendRelay, HttpBackend};
pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use crate::core::{
    ConversationKey, ConversationPipeline, EventIntake, IdentityResolver, PipelineOutcome,
    QueuedTask, TaskQueue,
};
pub use daemon::run_relay_daemon;
pub use error::{Error, Result};
pub use transport::{InboundMessage, Transport};
