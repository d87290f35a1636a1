use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the ledger's notion of "now", in unix seconds.
pub trait Clock: Send + Sync {
    fn unix_timestamp(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Cloning shares the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Starts at the current wall-clock second.
    pub fn starting_now() -> Self {
        Self::new(SystemClock.unix_timestamp())
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
