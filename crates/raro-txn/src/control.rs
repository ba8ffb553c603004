use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::stats::TxStats;

/// Shared between a [`crate::GraphTx`] and the [`crate::TransactionManager`]
/// that issued it, so the manager can force-abort a transaction it does not
/// otherwise own, and read its live stats.
pub(crate) struct TxControl {
    pub abort_requested: AtomicBool,
    pub stats: Mutex<TxStats>,
}

impl TxControl {
    pub fn new() -> Self {
        Self {
            abort_requested: AtomicBool::new(false),
            stats: Mutex::new(TxStats::default()),
        }
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    pub fn snapshot_stats(&self) -> TxStats {
        self.stats.lock().unwrap().clone()
    }
}
