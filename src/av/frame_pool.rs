use parking_lot::Mutex;

use super::frame::Frame;

/// Recycles `Frame` structs so hot paths avoid reallocating slot arrays.
///
/// The pool only caches empty frames; buffers are released on return, while
/// the slot arrays, side-data list and metadata keep their capacity.
#[derive(Debug)]
pub struct FramePool {
    frames: Mutex<Vec<Frame>>,
    max_cached: usize,
}

impl FramePool {
    /// A pool caching at most `max_cached` frames.
    pub fn new(max_cached: usize) -> Self {
        FramePool {
            frames: Mutex::new(Vec::new()),
            max_cached,
        }
    }

    /// An empty frame, recycled when one is cached.
    pub fn acquire(&self) -> Frame {
        self.frames.lock().pop().unwrap_or_default()
    }

    /// Unreferences `frame` and caches it for the next `acquire`.
    pub fn release(&self, mut frame: Frame) {
        frame.unref();
        let mut frames = self.frames.lock();
        if frames.len() < self.max_cached {
            frames.push(frame);
        }
    }

    /// Frames waiting to be reused.
    pub fn cached(&self) -> usize {
        self.frames.lock().len()
    }

    /// Drops every cached frame.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new(crate::config::pool_max_free())
    }
}
