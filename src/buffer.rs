//! Thread-safe bounded buffer and the parallel evolution driver
//!
//! The buffer is a capacity-bounded queue guarded by a mutex and one
//! condition variable: `push` blocks while the buffer is full, `pull`
//! blocks while it is empty, and `stop_consuming` wakes every blocked
//! consumer and makes further pulls fail so workers can exit cleanly.
//!
//! The parallel driver distributes *independent* enclosures over a fixed
//! pool of scoped threads. Enclosures move by value — never by shared
//! mutable reference — and each enclosure's evolution is serial; the
//! orbit contributions are merged after join, which is well-defined
//! because list union is commutative and associative.

use crate::enclosure::Enclosure;
use crate::evolver::{EvolutionError, Orbit, VectorFieldEvolver};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use thiserror::Error;
use tracing::debug;

/// Pull failure after [`Buffer::stop_consuming`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("buffer stopped consuming")]
pub struct BufferStopped;

struct BufferState<E> {
    queue: VecDeque<E>,
    stopped: bool,
}

/// A multiple-thread-safe queue usable as a bounded buffer.
pub struct Buffer<E> {
    state: Mutex<BufferState<E>>,
    cond: Condvar,
    capacity: usize,
}

impl<E> Buffer<E> {
    /// Buffer with the given (non-zero) capacity.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Buffer {
            state: Mutex::new(BufferState { queue: VecDeque::new(), stopped: false }),
            cond: Condvar::new(),
            capacity,
        }
    }

    /// Push an element, blocking while the buffer is at capacity. Fails
    /// only when the buffer has been stopped.
    pub fn push(&self, e: E) -> Result<(), BufferStopped> {
        let mut st = self.state.lock().expect("buffer mutex");
        while st.queue.len() >= self.capacity && !st.stopped {
            st = self.cond.wait(st).expect("buffer mutex");
        }
        if st.stopped {
            return Err(BufferStopped);
        }
        st.queue.push_back(e);
        drop(st);
        self.cond.notify_all();
        Ok(())
    }

    /// Pull an element, blocking while the buffer is empty. Fails when
    /// the stop-consuming signal arrives.
    pub fn pull(&self) -> Result<E, BufferStopped> {
        let mut st = self.state.lock().expect("buffer mutex");
        while st.queue.is_empty() && !st.stopped {
            st = self.cond.wait(st).expect("buffer mutex");
        }
        if st.stopped {
            return Err(BufferStopped);
        }
        let e = st.queue.pop_front().expect("non-empty queue");
        drop(st);
        self.cond.notify_all();
        Ok(e)
    }

    /// Number of queued elements.
    pub fn size(&self) -> usize {
        self.state.lock().expect("buffer mutex").queue.len()
    }

    /// Wake all blocked consumers and make them exit.
    pub fn stop_consuming(&self) {
        self.state.lock().expect("buffer mutex").stopped = true;
        self.cond.notify_all();
    }
}

/// Evolve several independent enclosures on a worker pool and merge the
/// orbits. The first evolution error wins; remaining jobs are drained.
pub fn evolve_concurrently(
    evolver: &VectorFieldEvolver,
    initials: Vec<Enclosure>,
    time: f64,
    workers: usize,
) -> Result<Orbit, EvolutionError> {
    debug_assert!(workers > 0);
    let jobs: Buffer<Enclosure> = Buffer::new(initials.len().max(1));
    let results: Mutex<Vec<Result<Orbit, EvolutionError>>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let jobs = &jobs;
            let results = &results;
            scope.spawn(move || {
                while let Ok(enc) = jobs.pull() {
                    debug!(worker, "picked up an enclosure");
                    let r = evolver.orbit(&enc, time);
                    results.lock().expect("results mutex").push(r);
                }
            });
        }
        for enc in initials {
            jobs.push(enc).expect("buffer not stopped during fill");
        }
        // Busy buffers drain first; then release the workers.
        while jobs.size() > 0 {
            std::thread::yield_now();
        }
        jobs.stop_consuming();
    });

    let mut merged = Orbit::default();
    for r in results.into_inner().expect("results mutex") {
        merged.absorb(r?);
    }
    Ok(merged)
}
