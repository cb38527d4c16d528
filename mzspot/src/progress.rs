use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Receives `(done, total)` updates from long-running sweeps
pub trait ProgressReporter: Sync {
    fn report(&self, done: usize, total: usize);
}

impl<F: Fn(usize, usize) + Sync> ProgressReporter for F {
    fn report(&self, done: usize, total: usize) {
        (self)(done, total)
    }
}

/// A reporter that discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _done: usize, _total: usize) {}
}

/// A cooperative cancellation flag shared between a caller and a running task
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_shared() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_closure_reporter() {
        let seen = AtomicUsize::new(0);
        let reporter = |done: usize, _total: usize| {
            seen.store(done, Ordering::SeqCst);
        };
        reporter.report(7, 10);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
