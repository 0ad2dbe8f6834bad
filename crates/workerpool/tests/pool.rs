//! End-to-end coverage of the pool's public contract: single-job dispatch,
//! FIFO ordering, cancellation, worker retirement plus recovery, fork
//! isolation, and destroy-with-work-in-flight.

mod submit_one_get_one {
    use std::os::raw::c_void;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Payload {
        ran: Arc<AtomicBool>,
    }

    unsafe fn run(payload: *mut c_void) {
        let payload = &*(payload as *const Payload);
        payload.ran.store(true, Ordering::SeqCst);
    }

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        drop(Box::from_raw(payload as *mut Payload));
        0
    }

    #[test]
    fn one_submitted_job_runs_exactly_once() {
        let ran = Arc::new(AtomicBool::new(false));
        let pool = ThreadPool::new(PoolConfig::new(2), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        let payload = Box::new(Payload { ran: Arc::clone(&ran) });
        unsafe {
            pool.add_job(1, run, Box::into_raw(payload) as *mut c_void)
                .expect("add_job failed");
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while !ran.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(ran.load(Ordering::SeqCst), "job never ran within the deadline");
        assert_eq!(pool.queued_jobs(), 0);
    }
}

mod fifo_order {
    use std::os::raw::c_void;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Payload {
        id: u64,
        order: Arc<Mutex<Vec<u64>>>,
    }

    unsafe fn run(payload: *mut c_void) {
        let payload = &*(payload as *const Payload);
        payload.order.lock().unwrap().push(payload.id);
    }

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        drop(Box::from_raw(payload as *mut Payload));
        0
    }

    #[test]
    fn single_worker_drains_queue_in_submission_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let pool = ThreadPool::new(PoolConfig::new(1), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        for id in 1..=6u64 {
            let payload = Box::new(Payload { id, order: Arc::clone(&order) });
            unsafe {
                pool.add_job(id, run, Box::into_raw(payload) as *mut c_void)
                    .expect("add_job failed");
            }
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        while order.lock().unwrap().len() < 6 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }
}

mod cancellation {
    use std::os::raw::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Gate {
        released: Mutex<bool>,
        cvar: Condvar,
    }

    enum Kind {
        Blocker(Arc<Gate>),
        Counting,
    }

    struct Payload {
        kind: Kind,
        ran: Arc<AtomicUsize>,
    }

    unsafe fn run(payload: *mut c_void) {
        let payload = &*(payload as *const Payload);
        if let Kind::Blocker(gate) = &payload.kind {
            let mut released = gate.released.lock().unwrap();
            while !*released {
                released = gate.cvar.wait(released).unwrap();
            }
        }
    }

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        let payload = Box::from_raw(payload as *mut Payload);
        if let Kind::Counting = payload.kind {
            payload.ran.fetch_add(1, Ordering::SeqCst);
        }
        0
    }

    #[test]
    fn cancelled_jobs_never_run_or_signal() {
        let gate = Arc::new(Gate {
            released: Mutex::new(false),
            cvar: Condvar::new(),
        });
        let ran = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::new(PoolConfig::new(1), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        let blocker = Box::new(Payload {
            kind: Kind::Blocker(Arc::clone(&gate)),
            ran: Arc::clone(&ran),
        });
        unsafe {
            pool.add_job(0, run, Box::into_raw(blocker) as *mut c_void)
                .expect("add_job failed");
        }
        std::thread::sleep(Duration::from_millis(20));

        let payloads: Vec<*mut c_void> = (1..=4u64)
            .map(|_| {
                Box::into_raw(Box::new(Payload {
                    kind: Kind::Counting,
                    ran: Arc::clone(&ran),
                })) as *mut c_void
            })
            .collect();
        for (offset, payload) in payloads.iter().enumerate() {
            unsafe {
                pool.add_job(offset as JobId + 1, run, *payload)
                    .expect("add_job failed");
            }
        }

        assert_eq!(pool.cancel_job(2, run, payloads[1]), 1);
        assert_eq!(pool.cancel_job(3, run, payloads[2]), 1);
        // Already-cancelled ids are a no-op, not an error.
        assert_eq!(pool.cancel_job(2, run, payloads[1]), 0);

        unsafe {
            drop(Box::from_raw(payloads[1] as *mut Payload));
            drop(Box::from_raw(payloads[2] as *mut Payload));
        }

        *gate.released.lock().unwrap() = true;
        gate.cvar.notify_all();

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(ran.load(Ordering::SeqCst), 2, "only the two uncancelled jobs should have run");
    }
}

mod signal_failure_and_recovery {
    use std::os::raw::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Payload {
        fail: bool,
        ran: Arc<AtomicUsize>,
    }

    unsafe fn run(_payload: *mut c_void) {}

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        let payload = Box::from_raw(payload as *mut Payload);
        payload.ran.fetch_add(1, Ordering::SeqCst);
        if payload.fail {
            1
        } else {
            0
        }
    }

    #[test]
    fn worker_retirement_is_recovered_by_restart_check() {
        let ran = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::new(PoolConfig::new(1), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        let failing = Box::new(Payload { fail: true, ran: Arc::clone(&ran) });
        unsafe {
            pool.add_job(1, run, Box::into_raw(failing) as *mut c_void)
                .expect("add_job failed");
        }
        let recovering = Box::new(Payload { fail: false, ran: Arc::clone(&ran) });
        unsafe {
            pool.add_job(2, run, Box::into_raw(recovering) as *mut c_void)
                .expect("add_job failed");
        }

        // Wait until the first job's failure has retired the sole worker
        // and left job 2 stranded in the queue.
        let deadline = Instant::now() + Duration::from_secs(2);
        while ran.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        let monitor = pool
            .restart_check_monitor_fd()
            .expect("monitor fd should be available on a running pool");
        drop(monitor);
        pool.restart_check_monitor_drain()
            .expect("drain should succeed");
        pool.restart_check().expect("restart_check should spawn a replacement worker");

        let deadline = Instant::now() + Duration::from_secs(2);
        while ran.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 2, "restart_check should have let job 2 run");
    }
}

mod destroy_with_in_flight_work {
    use std::os::raw::c_void;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Payload {
        ran: Arc<AtomicBool>,
    }

    unsafe fn run(payload: *mut c_void) {
        std::thread::sleep(Duration::from_millis(40));
        let payload = &*(payload as *const Payload);
        payload.ran.store(true, Ordering::SeqCst);
    }

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        drop(Box::from_raw(payload as *mut Payload));
        0
    }

    #[test]
    fn destroy_does_not_abort_a_running_job() {
        let ran = Arc::new(AtomicBool::new(false));
        let pool = ThreadPool::new(PoolConfig::new(1), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        let payload = Box::new(Payload { ran: Arc::clone(&ran) });
        unsafe {
            pool.add_job(1, run, Box::into_raw(payload) as *mut c_void)
                .expect("add_job failed");
        }
        // Give the worker time to dequeue the job before we destroy.
        std::thread::sleep(Duration::from_millis(10));
        pool.destroy();

        std::thread::sleep(Duration::from_millis(200));
        assert!(ran.load(Ordering::SeqCst), "an in-flight job must finish despite destroy");
    }
}

#[cfg(unix)]
mod fork_isolation {
    use std::os::raw::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

    struct Payload {
        ran: Arc<AtomicUsize>,
    }

    unsafe fn run(_payload: *mut c_void) {}

    unsafe fn on_complete(_id: JobId, _f: JobFn, payload: *mut c_void, _arg: *mut c_void) -> i32 {
        let payload = Box::from_raw(payload as *mut Payload);
        payload.ran.fetch_add(1, Ordering::SeqCst);
        0
    }

    /// Forks a live pool and checks that the child sees a stopped, empty
    /// pool rather than inherited worker state. Uses `_exit` in the child
    /// branch to skip Rust's normal unwind/Drop path, which is unsafe to
    /// run post-fork in a multithreaded process.
    #[test]
    fn child_process_sees_a_reset_pool() {
        let ran = Arc::new(AtomicUsize::new(0));
        let pool = ThreadPool::new(PoolConfig::new(2), on_complete, std::ptr::null_mut())
            .expect("pool creation failed");

        let payload = Box::new(Payload { ran: Arc::clone(&ran) });
        unsafe {
            pool.add_job(1, run, Box::into_raw(payload) as *mut c_void)
                .expect("add_job failed");
        }
        // Let a worker spawn and go idle so the fork handler actually
        // exercises the evacuation rendezvous, not just an empty pool.
        std::thread::sleep(Duration::from_millis(50));

        let pid = unsafe { libc::fork() };
        assert!(pid >= 0, "fork() failed");

        if pid == 0 {
            let ok = pool.max_threads() == 0 && pool.queued_jobs() == 0;
            unsafe { libc::_exit(if ok { 0 } else { 1 }) };
        }

        let mut status: libc::c_int = 0;
        unsafe { libc::waitpid(pid, &mut status, 0) };
        assert_eq!(libc::WEXITSTATUS(status), 0, "child observed a non-reset pool after fork");
    }
}
