//! Raw pthread mutex/condvar wrappers.
//!
//! `std::sync::Mutex`/`Condvar` can't model this pool's locking needs:
//! the fork protocol (`fork.rs`) must lock a pool's mutex in one callback
//! and unlock it from a different one several stack frames later, which
//! RAII guards can't express. Everywhere else a guard is used normally, so
//! the raw-lock escape hatch stays confined to `fork.rs`.

use std::cell::UnsafeCell;
use std::io;
use std::time::Duration;

pub struct RawMutex {
    inner: UnsafeCell<libc::pthread_mutex_t>,
}

unsafe impl Send for RawMutex {}
unsafe impl Sync for RawMutex {}

impl RawMutex {
    pub fn new() -> io::Result<Self> {
        let mut inner: libc::pthread_mutex_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::pthread_mutex_init(&mut inner, std::ptr::null()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(Self {
            inner: UnsafeCell::new(inner),
        })
    }

    #[inline]
    pub fn raw_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }

    /// Lock without producing a guard. Only `fork.rs` should call this —
    /// everyone else should use [`RawMutex::lock`].
    pub fn raw_lock(&self) {
        let rc = unsafe { libc::pthread_mutex_lock(self.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_mutex_lock failed: corrupted mutex");
    }

    /// Unlock without a guard. See [`RawMutex::raw_lock`].
    pub fn raw_unlock(&self) {
        let rc = unsafe { libc::pthread_mutex_unlock(self.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_mutex_unlock failed: corrupted mutex");
    }

    pub fn lock(&self) -> RawMutexGuard<'_> {
        self.raw_lock();
        RawMutexGuard { mutex: self }
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_destroy(self.raw_ptr());
        }
    }
}

pub struct RawMutexGuard<'a> {
    mutex: &'a RawMutex,
}

impl<'a> RawMutexGuard<'a> {
    pub fn mutex(&self) -> &'a RawMutex {
        self.mutex
    }
}

impl Drop for RawMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.raw_unlock();
    }
}

pub struct RawCondvar {
    inner: UnsafeCell<libc::pthread_cond_t>,
}

unsafe impl Send for RawCondvar {}
unsafe impl Sync for RawCondvar {}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    TimedOut,
}

impl RawCondvar {
    pub fn new() -> io::Result<Self> {
        let mut inner: libc::pthread_cond_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::pthread_cond_init(&mut inner, std::ptr::null()) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(Self {
            inner: UnsafeCell::new(inner),
        })
    }

    #[inline]
    fn raw_ptr(&self) -> *mut libc::pthread_cond_t {
        self.inner.get()
    }

    /// `mutex` must already be locked by the calling thread, either via a
    /// live [`RawMutexGuard`] or a prior [`RawMutex::raw_lock`].
    pub fn wait(&self, mutex: &RawMutex) {
        let rc = unsafe { libc::pthread_cond_wait(self.raw_ptr(), mutex.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_cond_wait failed");
    }

    /// Wait up to `timeout` from now on the real-time clock. Same locking
    /// precondition as [`RawCondvar::wait`].
    pub fn wait_timeout(&self, mutex: &RawMutex, timeout: Duration) -> WaitResult {
        let deadline = deadline_from_now(timeout);
        let rc = unsafe { libc::pthread_cond_timedwait(self.raw_ptr(), mutex.raw_ptr(), &deadline) };
        match rc {
            0 => WaitResult::Signaled,
            libc::ETIMEDOUT => WaitResult::TimedOut,
            _ => panic!("pthread_cond_timedwait failed: errno {rc}"),
        }
    }

    pub fn signal(&self) {
        let rc = unsafe { libc::pthread_cond_signal(self.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_cond_signal failed");
    }

    pub fn broadcast(&self) {
        let rc = unsafe { libc::pthread_cond_broadcast(self.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_cond_broadcast failed");
    }

    /// Destroy the underlying condvar in place without running `Drop`.
    /// Used by the fork protocol, which must not leave waiters parked on a
    /// condvar across `fork()` (POSIX leaves that undefined).
    pub fn destroy_in_place(&self) {
        let rc = unsafe { libc::pthread_cond_destroy(self.raw_ptr()) };
        assert_eq!(rc, 0, "pthread_cond_destroy failed");
    }

    /// Re-initialize a condvar previously destroyed with
    /// [`RawCondvar::destroy_in_place`].
    pub fn reinit_in_place(&self) {
        let rc = unsafe { libc::pthread_cond_init(self.raw_ptr(), std::ptr::null()) };
        assert_eq!(rc, 0, "pthread_cond_init failed");
    }
}

impl Drop for RawCondvar {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_cond_destroy(self.raw_ptr());
        }
    }
}

fn deadline_from_now(timeout: Duration) -> libc::timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
    }
    ts.tv_sec += timeout.as_secs() as libc::time_t;
    ts.tv_nsec += timeout.subsec_nanos() as i64;
    if ts.tv_nsec >= 1_000_000_000 {
        ts.tv_sec += 1;
        ts.tv_nsec -= 1_000_000_000;
    }
    ts
}
