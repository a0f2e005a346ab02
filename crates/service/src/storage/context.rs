use std::time::{Duration, Instant};

use uuid::Uuid;

/// Per-operation context passed through every store call.
///
/// Carries a request id for log correlation and an optional deadline.
/// The engine is synchronous, so neither is wired into transaction
/// cancellation; a started transaction always runs to completion.
#[derive(Clone, Debug)]
pub struct OpContext {
    pub request_id: Uuid,
    pub deadline: Option<Instant>,
}

impl OpContext {
    pub fn new() -> Self {
        Self { request_id: Uuid::new_v4(), deadline: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for OpContext {
    fn default() -> Self { Self::new() }
}
