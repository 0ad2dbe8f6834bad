//! Submits a handful of jobs to a pool and waits for them to finish.

use std::os::raw::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use workerpool::{JobFn, JobId, PoolConfig, ThreadPool};

struct JobPayload {
    index: usize,
    completed: Arc<AtomicUsize>,
}

unsafe fn run_job(payload: *mut c_void) {
    let payload = &*(payload as *const JobPayload);
    println!(
        "[job {}] running on {:?}",
        payload.index,
        std::thread::current().id()
    );
}

unsafe fn on_complete(_id: JobId, _func: JobFn, payload: *mut c_void, _signal_arg: *mut c_void) -> i32 {
    let payload = Box::from_raw(payload as *mut JobPayload);
    payload.completed.fetch_add(1, Ordering::SeqCst);
    0
}

fn main() {
    tracing_subscriber::fmt::init();

    let completed = Arc::new(AtomicUsize::new(0));
    let pool = ThreadPool::new(PoolConfig::new(4), on_complete, std::ptr::null_mut())
        .expect("failed to create pool");

    let total = 5;
    for i in 0..total {
        let payload = Box::new(JobPayload {
            index: i,
            completed: Arc::clone(&completed),
        });
        let raw = Box::into_raw(payload) as *mut c_void;
        unsafe {
            pool.add_job(i as JobId, run_job, raw)
                .expect("add_job failed");
        }
    }

    let start = Instant::now();
    while completed.load(Ordering::SeqCst) < total && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(10));
    }

    println!(
        "{}/{} jobs completed",
        completed.load(Ordering::SeqCst),
        total
    );
    pool.destroy();
}
