//! Single-slot latest-wins frame store shared between ingestion and capture

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam::utils::CachePadded;

use crate::capture::RawFrame;

/// Holds only the newest published frame.
///
/// The mutex guards nothing but the slot swap and the clone-out, so a slow
/// capture can never stall ingestion. The sequence counter lives outside the
/// lock and is incremented after the frame it counts is visible.
pub struct FrameStore {
    latest: Mutex<Option<RawFrame>>,
    sequence: CachePadded<AtomicU64>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            sequence: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Producer: replace the held frame
    pub fn publish(&self, frame: RawFrame) {
        let previous = self.slot().replace(frame);
        self.sequence.fetch_add(1, Ordering::Release);
        // Old frame is released outside the lock
        drop(previous);
    }

    /// Consumer: copy of the newest frame, `None` before the first publish
    pub fn snapshot(&self) -> Option<RawFrame> {
        self.slot().clone()
    }

    /// Number of frames published so far
    pub fn sequence_count(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    // The slot only ever holds whole frames, so a panic elsewhere while the
    // lock was held cannot leave it inconsistent.
    fn slot(&self) -> MutexGuard<'_, Option<RawFrame>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
