//! Process-wide registry of live pools.
//!
//! Visited by the fork handler so every pool in the process gets quiesced
//! around `fork()`, not just the one the forking thread happens to own.

use std::cell::UnsafeCell;
use std::sync::{Arc, Once, OnceLock, Weak};

use crate::pool::PoolInner;
use crate::sync::RawMutex;

pub struct Registry {
    pub(crate) mutex: RawMutex,
    pools: UnsafeCell<Vec<Weak<PoolInner>>>,
}

// SAFETY: `pools` is only ever touched while `mutex` is held, either via
// `Registry::register`/`unregister`'s guard or via the fork handler's raw
// lock/unlock pair.
unsafe impl Sync for Registry {}

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static ATFORK_INSTALLED: Once = Once::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        mutex: RawMutex::new().expect("pthread_mutex_init for pool registry"),
        pools: UnsafeCell::new(Vec::new()),
    })
}

impl Registry {
    pub fn register(&self, pool: &Arc<PoolInner>) {
        let _guard = self.mutex.lock();
        unsafe {
            (*self.pools.get()).push(Arc::downgrade(pool));
        }
    }

    pub fn unregister(&self, pool: &PoolInner) {
        let _guard = self.mutex.lock();
        unsafe {
            (*self.pools.get()).retain(|weak| weak.as_ptr() != pool as *const PoolInner);
        }
    }

    /// Strong references to every live pool. Caller must already hold
    /// `mutex` (used by the fork handler, which holds it raw across the
    /// fork boundary).
    pub(crate) fn snapshot_locked(&self) -> Vec<Arc<PoolInner>> {
        unsafe { (*self.pools.get()).iter().filter_map(Weak::upgrade).collect() }
    }
}

/// Install the three-phase fork handler exactly once per process.
pub fn ensure_atfork_installed() {
    ATFORK_INSTALLED.call_once(|| unsafe {
        libc::pthread_atfork(
            Some(crate::fork::atfork_prepare),
            Some(crate::fork::atfork_parent),
            Some(crate::fork::atfork_child),
        );
    });
}
