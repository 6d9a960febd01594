use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::block::Proc;
use crate::frame::{Context, Locals};
use crate::invokable::Return;
use crate::universe::Universe;
use crate::value::Value;

/// The state shared between a guest thread and everything that observes it.
pub struct ThreadHandle {
    /// The thread's identity.
    pub id: u64,
    cancelled: AtomicBool,
    finished: AtomicBool,
    wake: (Mutex<()>, Condvar),
    worker: Mutex<Option<JoinHandle<()>>>,
    outcome: Mutex<Option<Return>>,
}

impl ThreadHandle {
    /// Create the handle of a thread that has not run yet.
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            wake: (Mutex::new(()), Condvar::new()),
            worker: Mutex::new(None),
            outcome: Mutex::new(None),
        })
    }

    /// Ask the thread to stop at its next statement.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let (lock, condvar) = &self.wake;
        let _guard = lock.lock();
        condvar.notify_all();
    }

    /// Whether the thread was asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the thread is still running.
    pub fn is_alive(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    /// Suspend the calling worker, waking early if the thread gets cancelled.
    ///
    /// Returns `false` if the sleep was interrupted by a cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let (lock, condvar) = &self.wake;
        let mut guard = match lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            guard = match condvar.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Record how the thread ended.
    pub fn finish(&self, outcome: Return) {
        if let Ok(mut slot) = self.outcome.lock() {
            *slot = Some(outcome);
        }
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Block until the thread completes, and get how it ended.
    pub fn join(&self) -> Return {
        let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(worker) = worker {
            log::debug!("joining thread #{}", self.id);
            if worker.join().is_err() {
                return Return::Fatal(crate::Error::Internal(format!(
                    "thread #{} panicked",
                    self.id
                )));
            }
        }
        match self.outcome.lock() {
            Ok(outcome) => outcome.clone().unwrap_or(Return::Local(Value::Nil)),
            Err(_) => Return::Fatal(crate::Error::Internal(String::from(
                "thread outcome lock poisoned",
            ))),
        }
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Run a block as a new guest thread.
///
/// With `thread_safety` enabled the block runs on its own host thread, otherwise it runs to
/// completion on the calling worker before this returns.
pub fn spawn(
    universe: &Universe,
    context: &Context,
    block: Arc<Proc>,
    arguments: Vec<Value>,
) -> Result<Arc<ThreadHandle>, Return> {
    let handle = ThreadHandle::new(universe.next_id());
    let thread_context = Context {
        locals: Locals::new(handle.clone()),
        ..context.clone()
    };

    if !universe.config.thread_safety {
        log::debug!("running thread #{} synchronously", handle.id);
        let outcome = crate::invokable::call_block(universe, &thread_context, &block, arguments);
        handle.finish(outcome);
        return Ok(handle);
    }

    let shared = match universe.handle() {
        Some(shared) => shared,
        None => {
            return Err(Return::Fatal(crate::Error::Internal(String::from(
                "the universe is being torn down",
            ))))
        }
    };
    let worker_handle = handle.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("garnet-thread-{}", handle.id))
        .stack_size(universe.config.stack_size)
        .spawn(move || {
            let outcome =
                crate::invokable::call_block(&shared, &thread_context, &block, arguments);
            worker_handle.finish(outcome);
        });

    match spawned {
        Ok(worker) => {
            log::debug!("spawned thread #{}", handle.id);
            if let Ok(mut slot) = handle.worker.lock() {
                *slot = Some(worker);
            }
            Ok(handle)
        }
        Err(err) => Err(universe.raise(
            &universe.core.thread_error,
            format!("can't create thread: {}", err),
        )),
    }
}
