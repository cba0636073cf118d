//! notifyd - a notification service with channel fallback
//!
//! Delivers a message to a user over email, SMS or Telegram, trying the
//! channels in a fixed priority order until one succeeds, and keeps a small
//! store of incident records alongside.

pub mod app;
pub mod channels;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod formatting;
pub mod http;
pub mod incidents;
pub mod internal_metrics;
pub mod task_manager;
pub mod validation;

// Re-export core types for convenience
pub use core::*;
