//! Background video submissions started from the prompt.

use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio::task::JoinSet;

/// Outcome of waiting for uploads on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub finished: usize,
    pub abandoned: usize,
}

#[derive(Default)]
pub struct UploadTasks {
    tasks: JoinSet<()>,
}

impl UploadTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, upload: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(upload);
    }

    /// Forgets uploads that already finished and returns how many are still running.
    pub fn reap(&mut self) -> usize {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(err) = result {
                warn!("Upload task ended abnormally: {}", err);
            }
        }
        self.tasks.len()
    }

    /// Waits up to `grace` for running uploads, then aborts the rest.
    pub async fn drain(&mut self, grace: Duration) -> DrainReport {
        let mut report = DrainReport::default();
        let deadline = tokio::time::Instant::now() + grace;

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(result)) => {
                    if let Err(err) = result {
                        warn!("Upload task ended abnormally: {}", err);
                    }
                    report.finished += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    report.abandoned = self.tasks.len();
                    self.tasks.abort_all();
                    while self.tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }
        report
    }
}
