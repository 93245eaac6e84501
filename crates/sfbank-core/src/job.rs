//! Background jobs with progress and cooperative cancellation.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use sfbank_model::CancelToken;

use crate::error::{CoreError, Result};

/// Units of work finished so far, out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    /// Completion in `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

/// What a running job sees: its cancel token and the progress channel.
#[derive(Clone)]
pub struct JobContext {
    cancel: CancelToken,
    progress: Sender<Progress>,
}

impl JobContext {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Publish progress. Nobody listening is not an error.
    pub fn report(&self, done: usize, total: usize) {
        let _ = self.progress.send(Progress { done, total });
    }

    /// Closure form of [`JobContext::report`] for codec builders.
    pub fn reporter(&self) -> impl FnMut(usize, usize) + Send + 'static {
        let progress = self.progress.clone();
        move |done, total| {
            let _ = progress.send(Progress { done, total });
        }
    }
}

/// A unit of work running on its own thread.
///
/// Progress arrives on [`Job::progress`] as a side channel; the result is
/// only available from [`Job::join`]. Dropping a job cancels it and waits
/// for the thread.
pub struct Job<T> {
    name: String,
    cancel: CancelToken,
    progress: Receiver<Progress>,
    thread: Option<JoinHandle<Result<T>>>,
}

impl<T: Send + 'static> Job<T> {
    /// Start `work` on a new thread.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&JobContext) -> Result<T> + Send + 'static,
    {
        let name = name.into();
        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = unbounded();
        let context = JobContext {
            cancel: cancel.clone(),
            progress: progress_tx,
        };

        debug!("Starting job '{}'", name);
        let thread = thread::spawn(move || work(&context));

        Self {
            name,
            cancel,
            progress: progress_rx,
            thread: Some(thread),
        }
    }
}

impl<T> Job<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Progress updates, in order. Disconnects when the job ends.
    pub fn progress(&self) -> &Receiver<Progress> {
        &self.progress
    }

    /// Ask the job to stop at its next checkpoint.
    pub fn cancel(&self) {
        debug!("Cancelling job '{}'", self.name);
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |thread| thread.is_finished())
    }

    /// Wait for the job and return its result.
    pub fn join(mut self) -> Result<T> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| CoreError::JobPanicked(self.name.clone()))?,
            None => Err(CoreError::JobPanicked(self.name.clone())),
        }
    }
}

impl<T> Drop for Job<T> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.cancel.cancel();
            if thread.join().is_err() {
                warn!("Job '{}' panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfbank_model::ModelError;
    use std::time::Duration;

    #[test]
    fn test_result_and_progress() {
        let job = Job::spawn("count", |ctx| {
            for i in 1..=3 {
                ctx.report(i, 3);
            }
            Ok(42)
        });
        let receiver = job.progress().clone();
        assert_eq!(job.join().unwrap(), 42);
        let seen: Vec<Progress> = receiver.iter().collect();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], Progress { done: 3, total: 3 });
        assert!((seen[0].fraction() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_cancel_stops_at_checkpoint() {
        let job: Job<()> = Job::spawn("spin", |ctx| {
            let token = ctx.cancel_token();
            loop {
                token.check()?;
                thread::sleep(Duration::from_millis(1));
            }
        });
        job.cancel();
        let err = job.join().unwrap_err();
        assert!(matches!(err, CoreError::Model(ModelError::Cancelled)));
    }

    #[test]
    fn test_panic_is_reported() {
        let job: Job<()> = Job::spawn("boom", |_| panic!("boom"));
        assert!(matches!(job.join(), Err(CoreError::JobPanicked(name)) if name == "boom"));
    }

    #[test]
    fn test_empty_total_counts_as_done() {
        assert_eq!(Progress { done: 0, total: 0 }.fraction(), 1.0);
    }
}
