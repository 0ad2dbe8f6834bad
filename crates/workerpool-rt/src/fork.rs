//! The three-phase `pthread_atfork` handler.
//!
//! POSIX only guarantees mutex state survives `fork()` when the forking
//! thread itself holds the mutex; condition-variable state is unspecified.
//! A worker parked on `work_available` in another thread would otherwise
//! leave the child with a condvar in an undefined state and no thread left
//! to ever signal it. The fix: evacuate every idle worker onto a private,
//! stack-allocated "prefork" condition one at a time, destroy
//! `work_available`, cross the fork, then reinitialize it on both sides.
//! The child's pools come back stopped — a duplicated running worker would
//! be unsound, since only the forking thread survives `fork()`.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::debug;

use crate::pool::PoolInner;
use crate::registry;
use crate::sync::RawCondvar;

thread_local! {
    /// Populated by `atfork_prepare`, drained by whichever of
    /// `atfork_parent`/`atfork_child` runs next on this same thread. Both
    /// always run on the thread that called `fork()`.
    static FORK_SNAPSHOT: RefCell<Vec<Arc<PoolInner>>> = RefCell::new(Vec::new());
}

/// # Safety
/// Only ever called by libc as a `pthread_atfork` prepare callback.
pub(crate) unsafe extern "C" fn atfork_prepare() {
    let reg = registry::registry();
    reg.mutex.raw_lock();
    let snapshot = reg.snapshot_locked();

    for pool in &snapshot {
        pool.fork_mutex.raw_lock();
        pool.mutex.raw_lock();

        loop {
            let idle_before = pool.state_mut().idle_threads;
            if idle_before == 0 {
                break;
            }

            let prefork = RawCondvar::new().expect("prefork condvar init during atfork prepare");
            pool.state_mut().prefork_cond = Some(&prefork as *const RawCondvar);
            pool.work_available.signal();

            while pool.state_mut().idle_threads >= idle_before {
                prefork.wait(&pool.mutex);
            }
            pool.state_mut().prefork_cond = None;
            // `prefork` drops here, destroying the condvar now that no
            // worker can still be waiting on it.
        }

        pool.work_available.destroy_in_place();
        debug!(pool_id = pool.id(), "pool quiesced for fork");
    }

    FORK_SNAPSHOT.with(|cell| *cell.borrow_mut() = snapshot);
}

/// # Safety
/// Only ever called by libc as a `pthread_atfork` parent callback.
pub(crate) unsafe extern "C" fn atfork_parent() {
    let snapshot = FORK_SNAPSHOT.with(|cell| std::mem::take(&mut *cell.borrow_mut()));
    for pool in snapshot.iter().rev() {
        pool.work_available.reinit_in_place();
        pool.mutex.raw_unlock();
        pool.fork_mutex.raw_unlock();
    }
    registry::registry().mutex.raw_unlock();
}

/// # Safety
/// Only ever called by libc as a `pthread_atfork` child callback.
pub(crate) unsafe extern "C" fn atfork_child() {
    let snapshot = FORK_SNAPSHOT.with(|cell| std::mem::take(&mut *cell.borrow_mut()));
    for pool in snapshot.iter().rev() {
        let state = pool.state_mut();
        state.current_threads = 0;
        state.idle_threads = 0;
        state.queue.reset();
        state.stopped = true;
        state.pipe.close();
        pool.work_available.reinit_in_place();
        pool.mutex.raw_unlock();
        pool.fork_mutex.raw_unlock();
    }
    registry::registry().mutex.raw_unlock();
}
