//! The concurrency gate between background work and the render loop.
//!
//! Background tasks take [`EventEnv::lock`], mutate shared state, and release
//! with [`EventLock::unlock_render`]. The render loop blocks in
//! [`EventEnv::wait`] and holds a read guard while it builds, so a build never
//! sees a half-applied mutation.
//!
//! ```rust
//! use std::sync::Arc;
//! use vireo_core::EventEnv;
//!
//! let env = Arc::new(EventEnv::new(0u32));
//! let bg = {
//!     let env = env.clone();
//!     std::thread::spawn(move || {
//!         let mut n = env.lock();
//!         *n += 1;
//!         n.unlock_render();
//!     })
//! };
//! bg.join().unwrap();
//! assert!(env.wait());
//! assert_eq!(*env.read(), 1);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct SignalState {
    pending: bool,
    shutdown: bool,
    requests: u64,
}

#[derive(Default)]
struct SignalInner {
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// Level-triggered render request flag plus the wait primitive.
///
/// Cloneable; every clone refers to the same flag.
#[derive(Clone, Default)]
pub struct RenderHandle {
    inner: Arc<SignalInner>,
}

impl RenderHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a render as pending. Requests made before the loop wakes
    /// collapse into one pass.
    pub fn request_render(&self) {
        let mut s = self.inner.state.lock();
        s.requests += 1;
        if !s.pending {
            s.pending = true;
            self.inner.cond.notify_one();
        }
    }

    /// Makes every current and future `wait` return `false`.
    pub fn shutdown(&self) {
        let mut s = self.inner.state.lock();
        s.shutdown = true;
        self.inner.cond.notify_all();
    }

    /// Blocks until a render is pending (`true`) or shutdown was requested (`false`).
    pub fn wait(&self) -> bool {
        let mut s = self.inner.state.lock();
        while !s.pending && !s.shutdown {
            self.inner.cond.wait(&mut s);
        }
        Self::take(&mut s)
    }

    /// Like [`RenderHandle::wait`], giving up after `timeout` with `None`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<bool> {
        let mut s = self.inner.state.lock();
        while !s.pending && !s.shutdown {
            if self.inner.cond.wait_for(&mut s, timeout).timed_out() {
                if s.pending || s.shutdown {
                    break;
                }
                return None;
            }
        }
        Some(Self::take(&mut s))
    }

    fn take(s: &mut SignalState) -> bool {
        if s.shutdown {
            return false;
        }
        s.pending = false;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.state.lock().shutdown
    }

    /// Total render requests seen, coalesced or not.
    pub fn requests(&self) -> u64 {
        self.inner.state.lock().requests
    }
}

/// Shared application state guarded for the render loop.
pub struct EventEnv<S> {
    state: RwLock<S>,
    signal: RenderHandle,
}

impl<S> EventEnv<S> {
    pub fn new(state: S) -> Self {
        Self::with_handle(state, RenderHandle::new())
    }

    pub fn with_handle(state: S, signal: RenderHandle) -> Self {
        Self {
            state: RwLock::new(state),
            signal,
        }
    }

    /// Exclusive access; blocks until no other holder (including a running build) is active.
    pub fn lock(&self) -> EventLock<'_, S> {
        EventLock {
            guard: self.state.write(),
            signal: &self.signal,
        }
    }

    /// Shared access. Recursive on one thread, so components may read while
    /// the render loop already holds a read guard for the pass.
    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.state.read_recursive()
    }

    /// Lock, apply `f`, release and schedule a render.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.lock();
        let r = f(&mut guard);
        guard.unlock_render();
        r
    }

    pub fn wait(&self) -> bool {
        self.signal.wait()
    }

    pub fn request_render(&self) {
        self.signal.request_render();
    }

    pub fn shutdown(&self) {
        self.signal.shutdown();
    }

    pub fn render_handle(&self) -> &RenderHandle {
        &self.signal
    }
}

/// Write guard returned by [`EventEnv::lock`].
///
/// Dropping it releases the lock without scheduling a render.
pub struct EventLock<'a, S> {
    guard: RwLockWriteGuard<'a, S>,
    signal: &'a RenderHandle,
}

impl<S> EventLock<'_, S> {
    /// Release and schedule a render.
    pub fn unlock_render(self) {
        let EventLock { guard, signal } = self;
        drop(guard);
        signal.request_render();
    }

    /// Release without scheduling a render.
    pub fn unlock_only(self) {
        drop(self);
    }
}

impl<S> Deref for EventLock<'_, S> {
    type Target = S;
    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for EventLock<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}
