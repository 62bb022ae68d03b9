//! Fixed-size worker pool
//!
//! Workers pull one item at a time from a shared [`Source`], process it
//! outside the lock and push the result into a shared [`Sink`]. The
//! [`Driver`] is polled for a [`Status`] snapshot until the pool is done.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

/// Depletable supply of work items
pub trait Source: Send {
    type Item: Send;

    fn next(&mut self) -> Option<Self::Item>;

    /// No items remain
    fn is_empty(&self) -> bool;
}

/// Order-preserving source over a fixed list
#[derive(Debug, Clone)]
pub struct ArraySource<T> {
    items: VecDeque<T>,
}

impl<T> ArraySource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl<T: Send> Source for ArraySource<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Accumulator of processed results
pub trait Sink: Send {
    type Item: Send;
    type Payload;

    fn push(&mut self, item: Self::Item);

    /// Snapshot of the accumulated results
    fn status(&self) -> Self::Payload;

    /// Workers should stop taking new items
    fn stop(&self) -> bool;
}

/// Worker pool configuration
pub struct Config<S, K, F> {
    pub jobs: usize,
    pub source: S,
    pub sink: K,
    pub processor: F,
}

#[derive(Debug, Clone)]
pub struct Status<P> {
    pub payload: P,
    pub active_jobs: usize,
    /// Items lost to a panicking processor
    pub dropped: usize,
    /// No work remains and no worker is busy
    pub done: bool,
}

struct State<S, K> {
    source: S,
    sink: K,
    active_jobs: usize,
    dropped: usize,
    stopped: bool,
}

impl<S: Source, K: Sink> State<S, K> {
    fn finished(&self) -> bool {
        self.stopped || self.sink.stop() || self.source.is_empty()
    }

    fn status(&self) -> Status<K::Payload> {
        Status {
            payload: self.sink.status(),
            active_jobs: self.active_jobs,
            dropped: self.dropped,
            done: self.finished() && self.active_jobs == 0,
        }
    }
}

/// Handle to a running worker pool
pub struct Driver<S, K> {
    state: Arc<Mutex<State<S, K>>>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: Source, K: Sink> Driver<S, K> {
    pub fn status(&self) -> Status<K::Payload> {
        self.state.lock().status()
    }

    /// Stop taking new items, wait for busy workers and return the final status
    pub fn stop(self) -> Status<K::Payload> {
        self.state.lock().stopped = true;
        for worker in self.workers {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        self.state.lock().status()
    }
}

/// Start `config.jobs` workers
pub fn spawn<S, K, F>(config: Config<S, K, F>) -> io::Result<Driver<S, K>>
where
    S: Source + 'static,
    K: Sink<Item = <F as ProcessorFn<S::Item>>::Output> + 'static,
    F: ProcessorFn<S::Item> + 'static,
{
    let state = Arc::new(Mutex::new(State {
        source: config.source,
        sink: config.sink,
        active_jobs: 0,
        dropped: 0,
        stopped: false,
    }));
    let processor = Arc::new(config.processor);

    let mut workers = Vec::with_capacity(config.jobs);
    for id in 0..config.jobs.max(1) {
        let worker_state = Arc::clone(&state);
        let processor = Arc::clone(&processor);
        let worker = thread::Builder::new()
            .name(format!("mutant-worker-{}", id))
            .spawn(move || worker_loop(id, &worker_state, processor.as_ref()));
        match worker {
            Ok(worker) => workers.push(worker),
            Err(error) => {
                state.lock().stopped = true;
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(error);
            }
        }
    }

    Ok(Driver { state, workers })
}

/// Work item processor shared by all workers
pub trait ProcessorFn<I>: Send + Sync {
    type Output: Send;

    fn process(&self, item: I) -> Self::Output;
}

impl<I, O: Send, F> ProcessorFn<I> for F
where
    F: Fn(I) -> O + Send + Sync,
{
    type Output = O;

    fn process(&self, item: I) -> O {
        self(item)
    }
}

fn worker_loop<S, K, F>(id: usize, state: &Mutex<State<S, K>>, processor: &F)
where
    S: Source,
    K: Sink<Item = <F as ProcessorFn<S::Item>>::Output>,
    F: ProcessorFn<S::Item>,
{
    loop {
        let item = {
            let mut state = state.lock();
            if state.finished() {
                break;
            }
            match state.source.next() {
                Some(item) => {
                    state.active_jobs += 1;
                    item
                }
                None => break,
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(item)));

        let mut state = state.lock();
        state.active_jobs -= 1;
        match outcome {
            Ok(output) => state.sink.push(output),
            Err(_) => {
                state.dropped += 1;
                tracing::error!(worker = id, "processor panicked, item dropped");
            }
        }
    }
    tracing::debug!(worker = id, "worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        items: Vec<u32>,
        limit: Option<usize>,
    }

    impl Sink for Collect {
        type Item = u32;
        type Payload = Vec<u32>;

        fn push(&mut self, item: u32) {
            self.items.push(item);
        }

        fn status(&self) -> Vec<u32> {
            self.items.clone()
        }

        fn stop(&self) -> bool {
            self.limit.is_some_and(|limit| self.items.len() >= limit)
        }
    }

    fn wait<S: Source, K: Sink>(driver: &Driver<S, K>) -> Status<K::Payload> {
        loop {
            let status = driver.status();
            if status.done {
                return status;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_processes_every_item() {
        let driver = spawn(Config {
            jobs: 2,
            source: ArraySource::new(vec![1u32, 2, 3, 4, 5]),
            sink: Collect::default(),
            processor: |item: u32| item * 10,
        })
        .unwrap();

        let status = wait(&driver);
        assert_eq!(status.active_jobs, 0);
        let mut items = status.payload;
        items.sort();
        assert_eq!(items, vec![10, 20, 30, 40, 50]);

        let status = driver.stop();
        assert!(status.done);
        assert_eq!(status.payload.len(), 5);
    }

    #[test]
    fn test_sink_stop_halts_workers() {
        let driver = spawn(Config {
            jobs: 1,
            source: ArraySource::new((0..100u32).collect()),
            sink: Collect {
                items: Vec::new(),
                limit: Some(3),
            },
            processor: |item: u32| item,
        })
        .unwrap();

        let status = wait(&driver);
        assert_eq!(status.payload, vec![0, 1, 2]);
        driver.stop();
    }

    #[test]
    fn test_empty_source_is_done() {
        let driver = spawn(Config {
            jobs: 3,
            source: ArraySource::new(Vec::<u32>::new()),
            sink: Collect::default(),
            processor: |item: u32| item,
        })
        .unwrap();
        let status = driver.stop();
        assert!(status.done);
        assert!(status.payload.is_empty());
        assert_eq!(status.dropped, 0);
    }

    #[test]
    fn test_panicking_processor_does_not_hang() {
        let driver = spawn(Config {
            jobs: 2,
            source: ArraySource::new(vec![1u32, 2, 3]),
            sink: Collect::default(),
            processor: |item: u32| {
                if item == 2 {
                    panic!("bad item");
                }
                item
            },
        })
        .unwrap();
        let status = wait(&driver);
        assert_eq!(status.dropped, 1);
        let mut items = status.payload;
        items.sort();
        assert_eq!(items, vec![1, 3]);
        assert_eq!(driver.stop().dropped, 1);
    }
}
