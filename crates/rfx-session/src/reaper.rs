use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

/// Tracks worker threads and collects them as they finish.
///
/// Termination is observed on two paths, mirroring a forking server's
/// child-reaping discipline: a dedicated reaper thread wakes whenever any
/// worker ends (the asynchronous path), and the acceptor runs a
/// [`reap_finished`](Self::reap_finished) pass after every accept (the
/// synchronous path). Both drain every already-finished worker without
/// blocking on live ones, so workers never accumulate indefinitely.
pub struct WorkerSet {
    state: Mutex<ReapState>,
    finished_cv: Condvar,
    next_id: AtomicU64,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

struct ReapState {
    handles: HashMap<u64, JoinHandle<()>>,
    finished: Vec<u64>,
    shutdown: bool,
}

impl WorkerSet {
    /// Create the set and start its reaper thread.
    pub fn new() -> Arc<Self> {
        let set = Arc::new(Self {
            state: Mutex::new(ReapState {
                handles: HashMap::new(),
                finished: Vec::new(),
                shutdown: false,
            }),
            finished_cv: Condvar::new(),
            next_id: AtomicU64::new(1),
            reaper: Mutex::new(None),
        });

        let me = Arc::clone(&set);
        match std::thread::Builder::new()
            .name("rfx-reaper".into())
            .spawn(move || me.reaper_loop())
        {
            Ok(handle) => {
                *set.reaper.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            // Without the asynchronous path the synchronous per-accept
            // pass still collects everything, just later.
            Err(err) => warn!(error = %err, "reaper thread spawn failed"),
        }

        set
    }

    /// Spawn a worker thread running `work` and register it for reaping.
    ///
    /// The worker id is passed to `work`. A spawn failure is returned to
    /// the caller; nothing is registered in that case.
    pub fn spawn(
        self: &Arc<Self>,
        work: impl FnOnce(u64) + Send + 'static,
    ) -> std::io::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let set = Arc::clone(self);

        // Registration holds the state lock across the spawn, so a worker
        // that finishes instantly still blocks in its exit notice until
        // its handle is in the map.
        let mut state = self.lock();
        let handle = std::thread::Builder::new()
            .name(format!("rfx-worker-{id}"))
            .spawn(move || {
                // The notice fires on unwind too, so panicking workers are
                // still collected.
                let _notice = ExitNotice { set, id };
                work(id);
            })?;
        state.handles.insert(id, handle);
        Ok(id)
    }

    /// Collect every already-finished worker without blocking on live
    /// ones. Returns how many were collected.
    pub fn reap_finished(&self) -> usize {
        let ready: Vec<(u64, JoinHandle<()>)> = {
            let mut state = self.lock();
            let finished = std::mem::take(&mut state.finished);
            finished
                .into_iter()
                .filter_map(|id| state.handles.remove(&id).map(|handle| (id, handle)))
                .collect()
        };

        // Join outside the lock: an exiting thread has already posted its
        // notice and needs nothing further from us.
        let count = ready.len();
        for (id, handle) in ready {
            match handle.join() {
                Ok(()) => info!(worker = id, "worker exited"),
                Err(_) => warn!(worker = id, "worker panicked"),
            }
        }
        count
    }

    /// Number of workers spawned and not yet reaped.
    pub fn active(&self) -> usize {
        self.lock().handles.len()
    }

    /// Stop the reaper thread after a final drain.
    ///
    /// Live workers are left running; only bookkeeping stops. Used by
    /// tests and orderly shutdown paths — the server itself runs forever.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.finished_cv.notify_all();
        let handle = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn reaper_loop(&self) {
        debug!("reaper running");
        loop {
            let stop = {
                let mut state = self.lock();
                while state.finished.is_empty() && !state.shutdown {
                    state = self
                        .finished_cv
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                state.shutdown
            };
            self.reap_finished();
            if stop {
                break;
            }
        }
        debug!("reaper stopped");
    }

    fn lock(&self) -> MutexGuard<'_, ReapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Posted when a worker thread ends, normally or by panic.
struct ExitNotice {
    set: Arc<WorkerSet>,
    id: u64,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let mut state = self.set.lock();
        state.finished.push(self.id);
        self.set.finished_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    use super::*;

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn workers_run_and_are_collected_asynchronously() {
        let set = WorkerSet::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            set.spawn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("worker should spawn");
        }

        // No synchronous pass here: the reaper thread alone must drain.
        assert!(wait_until(Duration::from_secs(2), || set.active() == 0));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        set.shutdown();
    }

    #[test]
    fn synchronous_pass_collects_finished_workers() {
        let set = WorkerSet::new();
        // Keep the asynchronous path out of this test.
        set.shutdown();

        set.spawn(|_| {}).expect("worker should spawn");
        set.spawn(|_| {}).expect("worker should spawn");

        let mut collected = 0;
        assert!(wait_until(Duration::from_secs(2), || {
            collected += set.reap_finished();
            collected == 2
        }));
        assert_eq!(set.active(), 0);
    }

    #[test]
    fn panicking_worker_is_still_reaped() {
        let set = WorkerSet::new();
        set.spawn(|_| panic!("worker blew up")).expect("worker should spawn");
        set.spawn(|_| {}).expect("worker should spawn");

        assert!(wait_until(Duration::from_secs(2), || set.active() == 0));
        set.shutdown();
    }

    #[test]
    fn worker_ids_are_distinct_and_passed_through() {
        let set = WorkerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut returned = Vec::new();
        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            let id = set
                .spawn(move |id| seen.lock().unwrap().push(id))
                .expect("worker should spawn");
            returned.push(id);
        }

        assert!(wait_until(Duration::from_secs(2), || set.active() == 0));
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        returned.sort_unstable();
        assert_eq!(seen, returned);
        set.shutdown();
    }

    #[test]
    fn shutdown_performs_a_final_drain() {
        let set = WorkerSet::new();
        set.spawn(|_| {}).expect("worker should spawn");
        // Give the worker time to finish, then stop the reaper; the final
        // drain inside shutdown must collect it even if the reaper thread
        // never woke.
        assert!(wait_until(Duration::from_secs(2), || {
            set.shutdown();
            set.reap_finished();
            set.active() == 0
        }));
    }
}
