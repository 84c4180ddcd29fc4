//! Single-flight background dispatcher
//!
//! One long-lived thread runs the dispatch callback at most once at a
//! time. Start requests arriving while a run is in progress coalesce
//! into exactly one follow-up run, so work queued mid-run is picked up
//! without ever running the callback concurrently with itself.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::debug;

#[derive(Default)]
struct Flags {
    pending: bool,
    stopping: bool,
}

struct Shared {
    flags: Mutex<Flags>,
    signal: Condvar,
}

/// Handle to the dispatcher thread
pub struct SingleFlight {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SingleFlight {
    /// Spawn the dispatcher thread. The callback runs outside the lock.
    pub fn spawn<F>(name: &str, mut work: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            flags: Mutex::new(Flags::default()),
            signal: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                {
                    let mut flags = thread_shared.flags.lock().expect("dispatcher lock");
                    while !flags.pending && !flags.stopping {
                        flags = thread_shared.signal.wait(flags).expect("dispatcher wait");
                    }
                    if flags.stopping {
                        debug!("dispatcher stopping");
                        return;
                    }
                    flags.pending = false;
                }
                work();
            })
            .expect("spawn dispatcher thread");
        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Request a run. During an active run this marks exactly one
    /// follow-up; repeated starts before that follow-up begins coalesce.
    pub fn start(&self) {
        let mut flags = self.shared.flags.lock().expect("dispatcher lock");
        if !flags.stopping {
            flags.pending = true;
            self.shared.signal.notify_one();
        }
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn close(&self) {
        {
            let mut flags = self.shared.flags.lock().expect("dispatcher lock");
            flags.stopping = true;
            self.shared.signal.notify_one();
        }
        let handle = self.handle.lock().expect("dispatcher handle lock").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for SingleFlight {
    fn drop(&mut self) {
        self.close();
    }
}
