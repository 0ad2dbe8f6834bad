//! The job ring buffer.
//!
//! Lives entirely behind the pool mutex; none of these methods lock
//! anything themselves.

use workerpool_core::job::{Job, JobFn, JobId};
use std::os::raw::c_void;

pub struct JobQueue {
    jobs: Vec<Option<Job>>,
    head: usize,
    len: usize,
}

impl JobQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(4).next_power_of_two();
        let mut jobs = Vec::with_capacity(capacity);
        jobs.resize(capacity, None);
        Self {
            jobs,
            head: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.jobs.len()
    }

    /// Push a job, growing the backing array 2x if full.
    ///
    /// Returns `false` only if we'd need to grow and the allocation fails
    /// (which in Rust means the allocator aborts rather than returning, but
    /// we keep the `bool` return to mirror the pool's ENOMEM contract and
    /// leave room for a fallible-allocation backend later).
    pub fn push(&mut self, job: Job) -> bool {
        if self.len == self.capacity() {
            self.grow();
        }
        let idx = (self.head + self.len) % self.capacity();
        self.jobs[idx] = Some(job);
        self.len += 1;
        true
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = old_capacity * 2;
        let mut new_jobs = Vec::with_capacity(new_capacity);
        new_jobs.resize(new_capacity, None);
        // Live range is [head, head+len) mod old_capacity. Copy the
        // contiguous tail first, then the wrapped-around head portion
        // right after it so the range stays contiguous starting at 0.
        for i in 0..self.len {
            let src = (self.head + i) % old_capacity;
            new_jobs[i] = self.jobs[src].take();
        }
        self.jobs = new_jobs;
        self.head = 0;
    }

    /// Pop the oldest job, if any.
    pub fn pop(&mut self) -> Option<Job> {
        if self.len == 0 {
            return None;
        }
        let job = self.jobs[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        job
    }

    /// Undo a push that a caller has decided will never be seen by a
    /// worker (e.g. the condition signal right after it failed).
    pub fn undo_push(&mut self) {
        debug_assert!(self.len > 0);
        let capacity = self.capacity();
        let last = (self.head + self.len - 1) % capacity;
        self.jobs[last] = None;
        self.len -= 1;
    }

    /// Drop every live entry and reset to an empty queue, keeping the
    /// backing allocation. Used when a forked child is born with no
    /// workers left to own the jobs that were in flight.
    pub fn reset(&mut self) {
        for slot in &mut self.jobs {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Remove every live entry matching `(id, func, payload)`, compacting
    /// in place. Returns the number removed.
    pub fn cancel(&mut self, id: JobId, func: JobFn, payload: *mut c_void) -> usize {
        let capacity = self.capacity();
        let mut removed = 0;
        let mut write = 0;
        for read in 0..self.len {
            let src_idx = (self.head + read) % capacity;
            let job = self.jobs[src_idx].take().expect("live slot was empty");
            if job.matches(id, func, payload) {
                removed += 1;
                continue;
            }
            let dst_idx = (self.head + write) % capacity;
            self.jobs[dst_idx] = Some(job);
            write += 1;
        }
        self.len -= removed;
        removed
    }
}
