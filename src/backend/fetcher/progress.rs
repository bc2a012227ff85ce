//! Progress reporting seam between the orchestrator and its caller.

/// Receives aggregated progress percentages from an orchestration run.
///
/// Callers that only care about the percentage can pass any
/// `Fn(u8) + Send + Sync` closure; the message-aware form defaults to
/// forwarding the percentage alone.
pub trait ProgressSink: Send + Sync {
    fn update(&self, percent: u8);

    fn update_with_message(&self, percent: u8, message: &str) {
        let _ = message;
        self.update(percent);
    }
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn update(&self, percent: u8) {
        self(percent);
    }
}
