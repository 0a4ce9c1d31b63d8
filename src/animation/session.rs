//! Per-container render loops

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::animation::frame_loop::{FrameHandle, FrameLoop};
use crate::core::types::Result;
use crate::host::ContainerId;

/// Lifecycle of a session. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    frame: Option<FrameHandle>,
    frames_drawn: u64,
}

/// A render loop bound to one container.
///
/// While running, the draw step is invoked once per frame tick. A draw error
/// stops the session.
#[derive(Clone, Debug)]
pub struct AnimationSession {
    container: ContainerId,
    inner: Rc<RefCell<SessionInner>>,
}

impl AnimationSession {
    pub fn new(container: ContainerId) -> Self {
        Self {
            container,
            inner: Rc::new(RefCell::new(SessionInner {
                state: SessionState::Idle,
                frame: None,
                frames_drawn: 0,
            })),
        }
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn frames_drawn(&self) -> u64 {
        self.inner.borrow().frames_drawn
    }

    /// Idle -> Running. Returns false (and does nothing) in any other state.
    pub fn start<F>(&self, frames: &FrameLoop, draw: F) -> bool
    where
        F: FnMut() -> Result<()> + 'static,
    {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state != SessionState::Idle {
                return false;
            }
            inner.state = SessionState::Running;
        }
        log::debug!("Session started for container {}", self.container);
        schedule(frames.clone(), self.inner.clone(), self.container, Rc::new(RefCell::new(draw)));
        true
    }

    /// Stop drawing and cancel the pending frame. Safe in any state.
    pub fn stop(&self, frames: &FrameLoop) {
        let mut inner = self.inner.borrow_mut();
        if let Some(handle) = inner.frame.take() {
            frames.cancel(handle);
        }
        if inner.state == SessionState::Running {
            log::debug!(
                "Session stopped for container {} after {} frames",
                self.container,
                inner.frames_drawn
            );
        }
        inner.state = SessionState::Stopped;
    }
}

fn schedule<F>(frames: FrameLoop, inner: Rc<RefCell<SessionInner>>, container: ContainerId, draw: Rc<RefCell<F>>)
where
    F: FnMut() -> Result<()> + 'static,
{
    let next_frames = frames.clone();
    let next_inner = inner.clone();
    let handle = frames.request(move || {
        {
            let mut state = next_inner.borrow_mut();
            state.frame = None;
            if state.state != SessionState::Running {
                return;
            }
        }
        let result = {
            let mut step = draw.borrow_mut();
            (&mut *step)()
        };
        match result {
            Ok(()) => {
                let running = {
                    let mut state = next_inner.borrow_mut();
                    state.frames_drawn += 1;
                    state.state == SessionState::Running
                };
                if running {
                    schedule(next_frames, next_inner, container, draw);
                }
            }
            Err(e) => {
                log::error!("Render loop for container {} stopped: {}", container, e);
                next_inner.borrow_mut().state = SessionState::Stopped;
            }
        }
    });
    inner.borrow_mut().frame = Some(handle);
}

/// Side table of the session bound to each container
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<ContainerId, AnimationSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session for `container`, stopping any previous one first
    pub fn start<F>(&mut self, frames: &FrameLoop, container: ContainerId, draw: F) -> AnimationSession
    where
        F: FnMut() -> Result<()> + 'static,
    {
        self.stop(frames, container);
        let session = AnimationSession::new(container);
        session.start(frames, draw);
        self.sessions.insert(container, session.clone());
        session
    }

    /// Stop and forget the session for `container`. Returns whether one existed.
    pub fn stop(&mut self, frames: &FrameLoop, container: ContainerId) -> bool {
        match self.sessions.remove(&container) {
            Some(session) => {
                session.stop(frames);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self, frames: &FrameLoop) -> usize {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            session.stop(frames);
        }
        count
    }

    pub fn get(&self, container: ContainerId) -> Option<&AnimationSession> {
        self.sessions.get(&container)
    }

    /// Sessions still drawing (ones stopped by a draw error are excluded)
    pub fn running(&self) -> usize {
        self.sessions.values().filter(|s| s.is_running()).count()
    }
}
