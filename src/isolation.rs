//! Isolation boundary for running tests against a mutation
//!
//! The sandbox runs work on a dedicated thread and waits for its result on a
//! bounded channel. A panic inside the work, or a result that does not arrive
//! in time, is reported as an [`IsolationError`] instead of taking down the
//! caller. Work only ever receives shared immutable data, so a misbehaving
//! mutation cannot leave the caller in a modified state.
//!
//! The boundary is a thread, not a process. Unwinding panics are contained
//! and kept off stderr, but an abort or stack overflow still ends the run,
//! and timed out work keeps running detached until it returns. Integrations
//! that need process isolation run their tests out of process, as
//! [`crate::integration::Command`] does.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::Deserialize;

use crate::error::IsolationError;

const SANDBOX_THREAD: &str = "mutant-sandbox";

static QUIET_PANICS: Once = Once::new();

thread_local! {
    /// Isolated work is running on this thread
    static ISOLATED: Cell<bool> = const { Cell::new(false) };
}

/// Where isolated work executes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationKind {
    /// In the calling thread
    None,
    /// On a dedicated thread, with a timeout
    #[default]
    Sandbox,
}

#[derive(Debug, Clone, Copy)]
pub struct Isolation {
    kind: IsolationKind,
    timeout: Duration,
}

impl Isolation {
    pub fn new(kind: IsolationKind, timeout: Duration) -> Self {
        Self { kind, timeout }
    }

    pub fn kind(&self) -> IsolationKind {
        self.kind
    }

    /// Run `work` behind the isolation boundary
    pub fn call<F, T>(&self, work: F) -> Result<T, IsolationError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.kind {
            IsolationKind::None => run_isolated(work).map_err(panicked),
            IsolationKind::Sandbox => self.sandbox(work),
        }
    }

    fn sandbox<F, T>(&self, work: F) -> Result<T, IsolationError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        thread::Builder::new()
            .name(SANDBOX_THREAD.to_string())
            .spawn(move || {
                let outcome = run_isolated(work);
                // The receiver is gone once the caller timed out
                let _ = sender.send(outcome);
            })
            .map_err(|e| IsolationError::Spawn {
                error: e.to_string(),
            })?;

        match receiver.recv_timeout(self.timeout) {
            Ok(outcome) => outcome.map_err(panicked),
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(timeout = ?self.timeout, "abandoning timed out sandbox");
                Err(IsolationError::Timeout {
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(IsolationError::ChannelClosed),
        }
    }
}

/// Run `work` catching panics, with the panic hook silenced for it
fn run_isolated<F: FnOnce() -> T, T>(work: F) -> thread::Result<T> {
    QUIET_PANICS.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !ISOLATED.try_with(Cell::get).unwrap_or(false) {
                previous(info);
            }
        }));
    });

    let outer = ISOLATED.replace(true);
    let outcome = panic::catch_unwind(AssertUnwindSafe(work));
    ISOLATED.set(outer);
    outcome
}

fn panicked(payload: Box<dyn Any + Send>) -> IsolationError {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    IsolationError::Panicked { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox(timeout: Duration) -> Isolation {
        Isolation::new(IsolationKind::Sandbox, timeout)
    }

    #[test]
    fn test_sandbox_returns_value() {
        assert_eq!(sandbox(Duration::from_secs(5)).call(|| 40 + 2).unwrap(), 42);
    }

    #[test]
    fn test_sandbox_catches_panic() {
        let error = sandbox(Duration::from_secs(5))
            .call(|| -> u32 { panic!("mutation exploded") })
            .unwrap_err();
        assert!(matches!(
            error,
            IsolationError::Panicked { ref message } if message == "mutation exploded"
        ));
    }

    #[test]
    fn test_sandbox_times_out() {
        let error = sandbox(Duration::from_millis(20))
            .call(|| thread::sleep(Duration::from_secs(2)))
            .unwrap_err();
        assert!(matches!(error, IsolationError::Timeout { .. }));
    }

    #[test]
    fn test_unisolated_call_converts_panics() {
        let isolation = Isolation::new(IsolationKind::None, Duration::from_secs(1));
        assert_eq!(isolation.call(|| "ok").unwrap(), "ok");

        let index = 3;
        let error = isolation
            .call(move || -> u8 { panic!("index {} out of range", index) })
            .unwrap_err();
        assert!(matches!(
            error,
            IsolationError::Panicked { ref message } if message == "index 3 out of range"
        ));
    }

    #[test]
    fn test_panics_are_silenced_only_inside_isolation() {
        for kind in [IsolationKind::None, IsolationKind::Sandbox] {
            let isolation = Isolation::new(kind, Duration::from_secs(5));
            assert!(isolation.call(|| ISOLATED.with(Cell::get)).unwrap());
            assert!(isolation.call(|| -> u8 { panic!("quiet") }).is_err());
            assert!(!ISOLATED.with(Cell::get));
        }

        let outside = thread::spawn(|| ISOLATED.with(Cell::get)).join().unwrap();
        assert!(!outside);
    }

    #[test]
    fn test_sandbox_thread_is_named() {
        let name = sandbox(Duration::from_secs(5))
            .call(|| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some(SANDBOX_THREAD));
    }
}
