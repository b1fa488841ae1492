use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Job-wide cancellation flag shared by every table task.
#[derive(Debug, Default)]
pub struct JobSignal {
    aborted: AtomicBool,
    cause: Mutex<Option<String>>,
}

impl JobSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Only the first cause is kept.
    pub fn abort(&self, cause: impl Into<String>) {
        let mut slot = self.cause.lock();
        if slot.is_none() {
            *slot = Some(cause.into());
        }
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn cause(&self) -> Option<String> {
        self.cause.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cause_wins() {
        let signal = JobSignal::new();
        assert!(!signal.is_aborted());
        assert_eq!(signal.cause(), None);

        signal.abort("users: write rejected");
        signal.abort("orders: write rejected");

        assert!(signal.is_aborted());
        assert_eq!(signal.cause().as_deref(), Some("users: write rejected"));
    }
}
