//! Bounded worker pool of OCR engine instances.
//!
//! Engine instances are expensive to create and bound to one language at a
//! time, so the pool keeps a small, resizable set of [`EngineHandle`]s and
//! hands them out one request at a time. The pipeline runs on a
//! current-thread runtime: exclusivity comes from moving a handle out of its
//! slot while checked out, and waiters suspend on a [`Notify`] until a
//! release signals a free slot. There is no fairness guarantee; handle
//! assignment is first-idle-found, not FIFO.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::engine::{EngineHandle, EngineProvider};
use crate::error::OcrError;

/// Smallest allowed pool size.
pub const MIN_POOL_SIZE: usize = 1;
/// Largest allowed pool size.
pub const MAX_POOL_SIZE: usize = 4;

/// Pool of engine handles. Shared via `Rc`; all mutation happens inside the
/// pool's own operations.
pub struct WorkerPool {
    provider: Rc<dyn EngineProvider>,
    state: RefCell<PoolState>,
    freed: Notify,
}

struct PoolState {
    /// `None` marks a slot whose handle is checked out.
    slots: Vec<Option<EngineHandle>>,
    /// Handles whose slot disappeared (or was refilled) while they were
    /// checked out. Release runs in sync context, so termination is deferred
    /// to the next pool operation.
    retired: Vec<EngineHandle>,
    closed: bool,
}

impl WorkerPool {
    pub fn new(provider: Rc<dyn EngineProvider>) -> Self {
        Self {
            provider,
            state: RefCell::new(PoolState {
                slots: Vec::new(),
                retired: Vec::new(),
                closed: false,
            }),
            freed: Notify::new(),
        }
    }

    /// Current number of slots, busy or idle.
    pub fn size(&self) -> usize {
        self.state.borrow().slots.len()
    }

    /// Number of handles currently idle.
    pub fn idle_count(&self) -> usize {
        self.state
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Resize the pool to `desired` slots, clamped to 1..=4.
    ///
    /// Growing constructs handles through the provider; shrinking removes
    /// slots from the end and terminates their engines best-effort, so a
    /// failing termination never fails the resize. Calling with the current
    /// size is a no-op.
    pub async fn ensure_size(&self, desired: usize) -> Result<(), OcrError> {
        let target = desired.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE);
        self.reap_retired().await;

        let removed: Vec<EngineHandle> = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return Err(OcrError::EngineFailure("worker pool is closed".to_string()));
            }
            if state.slots.len() > target {
                debug!(from = state.slots.len(), to = target, "shrinking worker pool");
                state
                    .slots
                    .split_off(target)
                    .into_iter()
                    .flatten()
                    .collect()
            } else {
                Vec::new()
            }
        };
        for mut handle in removed {
            if let Err(err) = handle.shutdown().await {
                warn!(%err, "engine termination failed during pool shrink");
            }
        }

        loop {
            {
                let state = self.state.borrow();
                if state.slots.len() >= target {
                    break;
                }
            }
            let engine = self.provider.create_engine().await?;
            let handle = EngineHandle::new(engine, self.provider.capabilities());

            let surplus = {
                let mut state = self.state.borrow_mut();
                if state.slots.len() < target {
                    info!(size = state.slots.len() + 1, "added engine to worker pool");
                    state.slots.push(Some(handle));
                    None
                } else {
                    // A concurrent resize reached the target first.
                    Some(handle)
                }
            };
            match surplus {
                None => self.freed.notify_one(),
                Some(mut handle) => {
                    if let Err(err) = handle.shutdown().await {
                        warn!(%err, "engine termination failed for surplus handle");
                    }
                }
            }
        }
        Ok(())
    }

    /// Terminate handles parked by [`Self::put_back`], best-effort.
    async fn reap_retired(&self) {
        let retired: Vec<EngineHandle> = {
            let mut state = self.state.borrow_mut();
            state.retired.drain(..).collect()
        };
        for mut handle in retired {
            if let Err(err) = handle.shutdown().await {
                warn!(%err, "engine termination failed for retired handle");
            }
        }
    }

    /// Take an idle handle initialized for `language`, suspending until one
    /// frees up. Never creates handles beyond the configured size.
    ///
    /// Takes the pool by `Rc` so the returned guard can hand the handle
    /// back; cloning the `Rc` at the call site is cheap.
    pub async fn acquire(self: Rc<Self>, language: &str) -> Result<PoolGuard, OcrError> {
        loop {
            let taken = {
                let mut state = self.state.borrow_mut();
                if state.closed {
                    return Err(OcrError::EngineFailure("worker pool is closed".to_string()));
                }
                state
                    .slots
                    .iter_mut()
                    .enumerate()
                    .find_map(|(index, slot)| slot.take().map(|handle| (index, handle)))
            };

            if let Some((index, mut handle)) = taken {
                if let Err(err) = handle.ensure_language(language).await {
                    self.put_back(index, handle);
                    return Err(err);
                }
                return Ok(PoolGuard {
                    pool: self,
                    index,
                    handle: Some(handle),
                });
            }

            self.freed.notified().await;
        }
    }

    /// Terminate every engine and empty the pool.
    ///
    /// Shutdown operation for when the owning node is closed; per-handle
    /// termination failures are isolated and ignored. Waiters are woken and
    /// subsequently fail rather than hang.
    pub async fn destroy(&self) {
        let drained: Vec<EngineHandle> = {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            let mut drained: Vec<EngineHandle> = state.slots.drain(..).flatten().collect();
            drained.append(&mut state.retired);
            drained
        };
        info!(handles = drained.len(), "destroying worker pool");
        for mut handle in drained {
            if let Err(err) = handle.shutdown().await {
                warn!(%err, "engine termination failed during pool destroy");
            }
        }
        self.freed.notify_waiters();
    }

    /// Return a handle to its slot. The slot may have been removed by a
    /// shrink, or removed and refilled by a later grow, while the handle was
    /// out; the handle is retired then, never written over an idle one, and
    /// terminated by the next pool operation.
    fn put_back(&self, index: usize, handle: EngineHandle) {
        {
            let mut state = self.state.borrow_mut();
            let vacant = matches!(state.slots.get(index), Some(None));
            if vacant {
                state.slots[index] = Some(handle);
            } else {
                debug!(index, "slot changed while its handle was checked out");
                state.retired.push(handle);
            }
        }
        self.freed.notify_one();
    }
}

/// Exclusive access to one pooled engine handle.
///
/// Dropping the guard releases the handle, so error paths cannot leak a
/// handle into a permanently busy state. Releasing twice is impossible by
/// construction.
pub struct PoolGuard {
    pool: Rc<WorkerPool>,
    index: usize,
    handle: Option<EngineHandle>,
}

impl PoolGuard {
    /// Return the handle to the pool.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Deref for PoolGuard {
    type Target = EngineHandle;

    fn deref(&self) -> &EngineHandle {
        self.handle.as_ref().expect("engine handle already released")
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut EngineHandle {
        self.handle.as_mut().expect("engine handle already released")
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.put_back(self.index, handle);
        }
    }
}
