// SPDX-FileCopyrightText: 2026 Hangar Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host's single coordination thread.
//!
//! Modules that are not safe to construct or dispose from an arbitrary worker
//! have that work hopped onto one dedicated OS thread shared by the whole
//! host. Jobs run one at a time in submission order; callers await the result.
//! The thread enters the tokio runtime it was spawned from, so module code
//! running on it can still spawn tasks.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc;
use std::thread::ThreadId;

use hangar_core::HangarError;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Render a panic payload for logs and errors.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run `f`, turning a panic into an error message.
pub(crate) fn run_guarded<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Handle to the coordination thread. The thread exits when the handle is dropped.
pub struct Coordinator {
    sender: mpsc::Sender<Job>,
    thread_id: ThreadId,
}

impl Coordinator {
    /// Start the coordination thread, entering `runtime` on it.
    pub fn spawn(runtime: Handle) -> Result<Self, HangarError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread = std::thread::Builder::new()
            .name("hangar-coordinator".into())
            .spawn(move || {
                let _runtime = runtime.enter();
                while let Ok(job) = receiver.recv() {
                    job();
                }
                debug!("coordinator thread exiting");
            })
            .map_err(|e| HangarError::Internal(format!("failed to start coordinator thread: {e}")))?;

        Ok(Self {
            sender,
            thread_id: thread.thread().id(),
        })
    }

    /// Start the coordination thread on the current tokio runtime.
    pub fn for_current_runtime() -> Result<Self, HangarError> {
        let runtime = Handle::try_current()
            .map_err(|e| HangarError::Internal(format!("no tokio runtime: {e}")))?;
        Self::spawn(runtime)
    }

    pub fn is_coordinator_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Run `f` on the coordination thread and await its result.
    ///
    /// Called from the coordination thread itself, `f` runs inline. A panic in
    /// `f` is caught and reported as [`HangarError::Internal`].
    pub async fn run<F, R>(&self, f: F) -> Result<R, HangarError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_coordinator_thread() {
            return run_guarded(f).map_err(panicked);
        }

        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Box::new(move || {
                let _ = tx.send(run_guarded(f));
            }))
            .map_err(|_| HangarError::Internal("coordinator thread has stopped".into()))?;

        match rx.await {
            Ok(result) => result.map_err(panicked),
            Err(_) => Err(HangarError::Internal(
                "coordinator dropped the job without a result".into(),
            )),
        }
    }
}

fn panicked(message: String) -> HangarError {
    error!(panic = %message, "coordinator job panicked");
    HangarError::Internal(format!("coordinator job panicked: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobs_run_on_the_dedicated_thread() {
        let coordinator = Coordinator::for_current_runtime().unwrap();
        let name = coordinator
            .run(|| std::thread::current().name().map(str::to_string))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("hangar-coordinator"));
        assert!(!coordinator.is_coordinator_thread());
    }

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let coordinator = Coordinator::for_current_runtime().unwrap();
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pending = Vec::new();
        for i in 0..5 {
            let log = log.clone();
            pending.push(coordinator.run(move || log.lock().unwrap().push(i)));
        }
        for fut in pending {
            fut.await.unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let coordinator = Coordinator::for_current_runtime().unwrap();
        let err = coordinator
            .run(|| -> u32 { panic!("boom") })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));

        // The thread survives the panic.
        assert_eq!(coordinator.run(|| 7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn coordinator_thread_can_spawn_tasks() {
        let coordinator = Coordinator::for_current_runtime().unwrap();
        let handle = coordinator
            .run(|| tokio::spawn(async { 21 * 2 }))
            .await
            .unwrap();
        assert_eq!(handle.await.unwrap(), 42);
    }
}
