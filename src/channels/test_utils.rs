//! Scriptable senders for exercising the dispatcher without a network.

use crate::core::{ChannelSender, SendError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`ScriptedSender`] does on each attempt.
#[derive(Debug, Clone)]
pub enum Behavior {
    Deliver,
    /// Returns `Ok(false)`.
    Reject,
    /// Returns `Err` with the given message.
    Fail(String),
    Panic,
    /// Sleeps for the duration, then delivers.
    Hang(Duration),
}

/// A sender that follows a script of [`Behavior`]s and records every attempt.
///
/// Each attempt consumes the next behavior; the last one repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedSender {
    script: Arc<Mutex<VecDeque<Behavior>>>,
    attempts: Arc<Mutex<Vec<(String, String)>>>,
    deliveries: Arc<AtomicUsize>,
}

impl ScriptedSender {
    pub fn new(behavior: Behavior) -> Self {
        Self::sequence(vec![behavior])
    }

    /// Plays `behaviors` in order, repeating the last one.
    pub fn sequence(behaviors: Vec<Behavior>) -> Self {
        assert!(!behaviors.is_empty(), "a script needs at least one behavior");
        Self {
            script: Arc::new(Mutex::new(behaviors.into())),
            attempts: Arc::new(Mutex::new(Vec::new())),
            deliveries: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn next_behavior(&self) -> Behavior {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script[0].clone()
        }
    }

    pub fn delivering() -> Self {
        Self::new(Behavior::Deliver)
    }

    pub fn rejecting() -> Self {
        Self::new(Behavior::Reject)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Behavior::Fail(message.to_string()))
    }

    /// The `(destination, message)` pairs seen so far.
    pub fn attempts(&self) -> Vec<(String, String)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Attempts that ran to completion and reported success.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn attempt_send(&self, destination: &str, message: &str) -> Result<bool, SendError> {
        self.attempts
            .lock()
            .unwrap()
            .push((destination.to_string(), message.to_string()));

        match self.next_behavior() {
            Behavior::Reject => return Ok(false),
            Behavior::Fail(reason) => return Err(SendError::Other(reason)),
            Behavior::Panic => panic!("scripted sender panicked"),
            Behavior::Hang(duration) => tokio::time::sleep(duration).await,
            Behavior::Deliver => {}
        }
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
