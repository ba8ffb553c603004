use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct TxStats {
    pub op_count: u64,
    pub read_count: u64,
    pub write_count: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub duration: Duration,
    pub(crate) started_at: Instant,
}

impl Default for TxStats {
    fn default() -> Self {
        Self {
            op_count: 0,
            read_count: 0,
            write_count: 0,
            bytes_read: 0,
            bytes_written: 0,
            duration: Duration::ZERO,
            started_at: Instant::now(),
        }
    }
}

impl TxStats {
    pub(crate) fn record_read(&mut self, bytes: usize) {
        self.op_count += 1;
        self.read_count += 1;
        self.bytes_read += bytes as u64;
        self.duration = self.started_at.elapsed();
    }

    pub(crate) fn record_write(&mut self, bytes: usize) {
        self.op_count += 1;
        self.write_count += 1;
        self.bytes_written += bytes as u64;
        self.duration = self.started_at.elapsed();
    }
}
