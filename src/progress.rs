use crate::structures::Percentage;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Shared download progress of a single conversion.
///
/// Written by the fetch side as chunks are handed to the encoder, read by the
/// progress bridge whenever the encoder reports a tick. A total of 0 means the
/// total is not yet known.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total_bytes: AtomicU64,
    downloaded_bytes: AtomicU64,
    reported: AtomicU8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_total(&self, total_bytes: u64) {
        self.total_bytes.store(total_bytes, Ordering::Release);
    }
    /// Returns the new downloaded total.
    pub fn add_downloaded(&self, bytes: u64) -> u64 {
        self.downloaded_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes
    }
    pub fn total_bytes(&self) -> Option<u64> {
        match self.total_bytes.load(Ordering::Acquire) {
            0 => None,
            total => Some(total),
        }
    }
    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::Acquire)
    }
    /// Current percentage, or None while the total is unknown.
    ///
    /// Never lower than a percentage previously returned by this tracker.
    pub fn percentage(&self) -> Option<Percentage> {
        let total = self.total_bytes()?;
        let current = raw_percentage(self.downloaded_bytes(), total);
        let previous = self.reported.fetch_max(current, Ordering::AcqRel);
        Some(Percentage(previous.max(current)))
    }
}

fn raw_percentage(downloaded: u64, total: u64) -> u8 {
    let percentage = (downloaded as f64 / total as f64 * 100.0).round();
    percentage.clamp(0.0, 100.0) as u8
}
