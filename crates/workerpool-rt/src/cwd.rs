//! Per-thread filesystem view.
//!
//! On Linux, `unshare(CLONE_FS)` gives the calling thread its own working
//! directory, root and umask, so a worker calling `chdir` doesn't race with
//! its siblings. Probed once per process; the probing thread keeps the
//! unshared view for the rest of its life, which is fine because the probe
//! runs before any pool is constructed.

use std::sync::OnceLock;

use cfg_if::cfg_if;

static SUPPORTS_PER_THREAD_CWD: OnceLock<bool> = OnceLock::new();

pub fn probe_once() -> bool {
    *SUPPORTS_PER_THREAD_CWD.get_or_init(probe)
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn probe() -> bool {
            let rc = unsafe { libc::unshare(libc::CLONE_FS) };
            rc == 0
        }

        /// Detach this worker thread's filesystem view. Only meaningful
        /// where [`probe_once`] returned `true`.
        pub fn detach_fs() {
            let rc = unsafe { libc::unshare(libc::CLONE_FS) };
            assert_eq!(rc, 0, "unshare(CLONE_FS) failed on a worker after probing ok");
        }
    } else {
        fn probe() -> bool {
            false
        }

        pub fn detach_fs() {}
    }
}
