//! Job Queue
//!
//! The job queue batches effect re-runs. An effect created with
//! [`JobQueue::scheduler`] as its scheduler is queued instead of re-run when
//! a dependency changes; [`JobQueue::flush`] then runs each queued effect
//! once, however many writes happened in between.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends the effect unless it is already waiting.
//! 2. `flush` pops jobs in FIFO order and runs them, skipping effects that
//!    were stopped while waiting. A job may queue further jobs (including
//!    itself); those run in the same flush.
//! 3. Once the queue is empty, post-flush callbacks run. If they queued more
//!    jobs, the flush continues with the same per-job run counts.
//! 4. A job that runs more than the recursion limit within one flush is
//!    treated as runaway recursion: the queue is dropped and an error is
//!    returned.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::config;
use crate::error::ReactiveError;
use crate::reactive::{Effect, EffectId, Scheduler};

type PostFlush = Box<dyn FnOnce()>;

#[derive(Default)]
struct JobQueueInner {
    queue: RefCell<VecDeque<Effect>>,
    queued: RefCell<HashSet<EffectId>>,
    post_flush: RefCell<Vec<PostFlush>>,
    flushing: Cell<bool>,
}

/// A FIFO of pending effect re-runs.
///
/// Cloning the queue shares it.
#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Rc<JobQueueInner>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an effect. Returns false if it is already waiting.
    pub fn queue_job(&self, effect: &Effect) -> bool {
        if !self.inner.queued.borrow_mut().insert(effect.id()) {
            return false;
        }
        self.inner.queue.borrow_mut().push_back(effect.clone());
        tracing::trace!(effect = %effect.id(), "job queued");
        true
    }

    /// Run `callback` after the next flush drains the queue.
    pub fn queue_post_flush(&self, callback: impl FnOnce() + 'static) {
        self.inner.post_flush.borrow_mut().push(Box::new(callback));
    }

    /// A scheduler that queues effects here. It holds the queue weakly, so
    /// effects outliving the queue simply stop being re-run.
    pub fn scheduler(&self) -> Scheduler {
        let queue = Rc::downgrade(&self.inner);
        Rc::new(move |effect: &Effect| {
            if let Some(inner) = queue.upgrade() {
                JobQueue { inner }.queue_job(effect);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Run queued jobs and post-flush callbacks until nothing is left.
    ///
    /// Calling `flush` from inside a job is a no-op; the outer flush picks up
    /// anything queued.
    pub fn flush(&self) -> Result<(), ReactiveError> {
        struct Flushing<'a>(&'a Cell<bool>);

        impl Drop for Flushing<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        if self.inner.flushing.replace(true) {
            return Ok(());
        }
        let _flushing = Flushing(&self.inner.flushing);

        let limit = config::recursion_limit();
        let mut seen: HashMap<EffectId, usize> = HashMap::new();
        let mut jobs = 0usize;

        loop {
            while let Some(job) = self.pop() {
                if !job.is_active() {
                    continue;
                }
                let count = seen.entry(job.id()).or_insert(0);
                *count += 1;
                if *count > limit {
                    tracing::error!(effect = %job.id(), limit, "maximum recursive updates exceeded");
                    self.clear();
                    return Err(ReactiveError::RecursionLimitExceeded {
                        effect: job.id(),
                        limit,
                    });
                }
                job.run();
                jobs += 1;
            }

            let callbacks = std::mem::take(&mut *self.inner.post_flush.borrow_mut());
            for callback in callbacks {
                callback();
            }

            if self.is_empty() {
                break;
            }
        }

        tracing::debug!(jobs, distinct = seen.len(), "flush complete");
        Ok(())
    }

    fn pop(&self) -> Option<Effect> {
        let job = self.inner.queue.borrow_mut().pop_front()?;
        self.inner.queued.borrow_mut().remove(&job.id());
        Some(job)
    }

    fn clear(&self) {
        let dropped = std::mem::take(&mut *self.inner.queue.borrow_mut());
        self.inner.queued.borrow_mut().clear();
        self.inner.post_flush.borrow_mut().clear();
        drop(dropped);
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("len", &self.len())
            .field("post_flush", &self.inner.post_flush.borrow().len())
            .field("flushing", &self.is_flushing())
            .finish()
    }
}
