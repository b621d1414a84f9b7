//! Progress reporting surface.

/// Receives `(current, total, message)` updates during a batch run.
///
/// Called from worker tasks; implementations must return promptly and
/// must not block on I/O.
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize, message: &str);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _current: usize, _total: usize, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}
