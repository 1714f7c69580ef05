use std::collections::HashSet;
use std::path::PathBuf;

use crossbeam_channel::unbounded;
use serde::Serialize;
use threadpool::ThreadPool;

use crate::client::ArchiveClient;
use crate::domain::DownloadTask;
use crate::error::FetchError;
use crate::store::{WriteOutcome, write_stream_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TaskOutcome {
    Downloaded { bytes: u64 },
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub remote_url: String,
    pub local_path: PathBuf,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub items: Vec<TaskResult>,
}

impl DownloadReport {
    pub fn downloaded(&self) -> usize {
        self.count(|outcome| matches!(outcome, TaskOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, TaskOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, TaskOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| predicate(&item.outcome))
            .count()
    }
}

/// Retrieves granules into their local paths. Owns the authenticated client
/// for its whole lifetime and shares it between workers.
pub struct Downloader<C: ArchiveClient + Clone + 'static> {
    client: C,
    workers: usize,
}

impl<C: ArchiveClient + Clone + 'static> Downloader<C> {
    pub fn new(client: C, workers: usize) -> Self {
        Self {
            client,
            workers: workers.max(1),
        }
    }

    /// Runs every task; a failing task never prevents the others. Results
    /// come back in the order the tasks were given.
    pub fn fetch(&self, tasks: Vec<DownloadTask>) -> DownloadReport {
        let mut seen = HashSet::new();
        let mut slots: Vec<Option<TaskResult>> = Vec::with_capacity(tasks.len());
        let mut pending = Vec::new();

        // Only the first task for a path is run, so no two workers write the same file.
        for task in tasks {
            if seen.insert(task.local_path.clone()) {
                pending.push((slots.len(), task));
                slots.push(None);
            } else {
                tracing::debug!("duplicate task for {}", task.local_path.display());
                slots.push(Some(result_for(task, TaskOutcome::Skipped)));
            }
        }

        if self.workers == 1 || pending.len() <= 1 {
            for (slot, task) in pending {
                slots[slot] = Some(run_task(&self.client, task));
            }
        } else {
            for (slot, result) in self.run_pool(pending) {
                slots[slot] = Some(result);
            }
        }

        DownloadReport {
            items: slots.into_iter().flatten().collect(),
        }
    }

    fn run_pool(&self, pending: Vec<(usize, DownloadTask)>) -> Vec<(usize, TaskResult)> {
        let workers = self.workers.min(pending.len());
        let pool = ThreadPool::with_name("Download Thread".to_owned(), workers);
        let (to_workers, queued) = unbounded();
        let (to_collector, finished) = unbounded();

        for _ in 0..workers {
            let client = self.client.clone();
            let queued = queued.clone();
            let to_collector = to_collector.clone();
            pool.execute(move || {
                for (slot, task) in queued {
                    let result = run_task(&client, task);
                    if to_collector.send((slot, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(to_collector);

        for item in pending {
            // Workers hold the receiver until the queue is closed below.
            let _ = to_workers.send(item);
        }
        drop(to_workers);

        let results = finished.iter().collect();
        pool.join();
        results
    }
}

fn run_task<C: ArchiveClient>(client: &C, task: DownloadTask) -> TaskResult {
    let outcome = match download_one(client, &task) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!("failed to download {}: {err}", task.remote_url);
            TaskOutcome::Failed {
                error: err.to_string(),
            }
        }
    };
    result_for(task, outcome)
}

fn download_one<C: ArchiveClient>(
    client: &C,
    task: &DownloadTask,
) -> Result<TaskOutcome, FetchError> {
    if task.is_satisfied() {
        tracing::debug!("skipping {}", task.local_path.display());
        return Ok(TaskOutcome::Skipped);
    }

    let mut body = client.open(&task.remote_url)?;
    match write_stream_atomic(&mut body, &task.local_path)? {
        WriteOutcome::Written(bytes) => {
            tracing::info!("downloaded {} ({bytes} bytes)", task.local_path.display());
            Ok(TaskOutcome::Downloaded { bytes })
        }
        WriteOutcome::AlreadyPresent => Ok(TaskOutcome::Skipped),
    }
}

fn result_for(task: DownloadTask, outcome: TaskOutcome) -> TaskResult {
    TaskResult {
        remote_url: task.remote_url,
        local_path: task.local_path,
        outcome,
    }
}
