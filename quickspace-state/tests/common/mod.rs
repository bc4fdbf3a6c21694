//! Shared helpers for controller integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use quickspace_state::{AggregationController, OnDataListener};

pub const FLUSH: Duration = Duration::from_secs(2);

/// Listener that counts its notifications
pub struct CountingListener {
    count: AtomicUsize,
}

impl CountingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn as_listener(self: &Arc<Self>) -> Arc<dyn OnDataListener> {
        Arc::clone(self) as Arc<dyn OnDataListener>
    }
}

impl OnDataListener for CountingListener {
    fn on_data_updated(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Flush the queue, failing the test on timeout
pub fn settle(controller: &AggregationController) {
    assert!(controller.flush(FLUSH), "dispatch queue did not drain");
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
