//! Cooperative per-frame callback queue
//!
//! Stands in for the host's display-refresh callback: callbacks requested
//! during a tick run on the next tick, one at a time, on the calling thread.

use std::cell::RefCell;
use std::rc::Rc;

/// Handle to a pending frame callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

type FrameCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct FrameQueue {
    next_id: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
    ticks: u64,
}

/// Shared frame scheduler; clones refer to the same queue
#[derive(Clone, Default)]
pub struct FrameLoop {
    queue: Rc<RefCell<FrameQueue>>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` for the next tick
    pub fn request(&self, callback: impl FnOnce() + 'static) -> FrameHandle {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let handle = FrameHandle(queue.next_id);
        queue.pending.push((handle, Box::new(callback)));
        handle
    }

    /// Drop a pending callback. Returns false if it already ran or was
    /// canceled.
    pub fn cancel(&self, handle: FrameHandle) -> bool {
        let mut queue = self.queue.borrow_mut();
        let before = queue.pending.len();
        queue.pending.retain(|(h, _)| *h != handle);
        queue.pending.len() != before
    }

    /// Run every callback that was pending when the tick started.
    /// Returns how many ran.
    pub fn tick(&self) -> usize {
        // Callbacks re-request frames, so the borrow must end before they run
        let due = {
            let mut queue = self.queue.borrow_mut();
            queue.ticks += 1;
            std::mem::take(&mut queue.pending)
        };
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    pub fn ticks(&self) -> u64 {
        self.queue.borrow().ticks
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("pending", &self.pending())
            .field("ticks", &self.ticks())
            .finish()
    }
}
