//! Occupies a single-worker pool with a blocked job, queues several more,
//! then cancels two of them before the blocker releases — showing that
//! cancelled jobs never run and never reach the completion callback.

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
    Counting(usize),
}

struct Payload {
    kind: Kind,
    ran: Arc<AtomicUsize>,
}

unsafe fn run_job(payload: *mut c_void) {
    let payload = &*(payload as *const Payload);
    if let Kind::Blocker(gate) = &payload.kind {
        let mut released = gate.released.lock().unwrap();
        while !*released {
            released = gate.cvar.wait(released).unwrap();
        }
    }
}

unsafe fn on_complete(_id: JobId, _func: JobFn, payload: *mut c_void, _signal_arg: *mut c_void) -> i32 {
    let payload = Box::from_raw(payload as *mut Payload);
    if let Kind::Counting(_) = payload.kind {
        payload.ran.fetch_add(1, Ordering::SeqCst);
    }
    0
}

fn main() {
    tracing_subscriber::fmt::init();

    let gate = Arc::new(Gate {
        released: Mutex::new(false),
        cvar: Condvar::new(),
    });
    let ran = Arc::new(AtomicUsize::new(0));

    let pool = ThreadPool::new(PoolConfig::new(1), on_complete, std::ptr::null_mut())
        .expect("failed to create pool");

    let blocker = Box::new(Payload {
        kind: Kind::Blocker(Arc::clone(&gate)),
        ran: Arc::clone(&ran),
    });
    unsafe {
        pool.add_job(0, run_job, Box::into_raw(blocker) as *mut c_void)
            .expect("blocker add_job failed");
    }
    // Give the lone worker time to pick up the blocker before we queue
    // anything else, so the jobs below are guaranteed to sit in the queue.
    std::thread::sleep(Duration::from_millis(20));

    let payloads: Vec<*mut c_void> = (1..=4u64)
        .map(|i| {
            Box::into_raw(Box::new(Payload {
                kind: Kind::Counting(i as usize),
                ran: Arc::clone(&ran),
            })) as *mut c_void
        })
        .collect();
    for (offset, payload) in payloads.iter().enumerate() {
        let id = offset as JobId + 1;
        unsafe {
            pool.add_job(id, run_job, *payload).expect("add_job failed");
        }
    }

    let removed_2 = pool.cancel_job(2, run_job, payloads[1]);
    let removed_3 = pool.cancel_job(3, run_job, payloads[2]);
    println!("cancelled {removed_2} job(s) with id 2, {removed_3} job(s) with id 3");

    // A cancelled job never reaches `on_complete`, so its payload is never
    // freed by the pool; the caller owns it and must free it itself.
    unsafe {
        if removed_2 > 0 {
            drop(Box::from_raw(payloads[1] as *mut Payload));
        }
        if removed_3 > 0 {
            drop(Box::from_raw(payloads[2] as *mut Payload));
        }
    }

    {
        let mut released = gate.released.lock().unwrap();
        *released = true;
        gate.cvar.notify_all();
    }

    std::thread::sleep(Duration::from_millis(200));
    println!(
        "{} job(s) actually ran (expect 2: ids 1 and 4)",
        ran.load(Ordering::SeqCst)
    );

    pool.destroy();
}
