//! Fixed-size commit worker pool
//!
//! The walker enqueues jobs into a bounded channel consumed by a fixed
//! number of workers; closing the channel and joining the scope is the
//! drain barrier. Jobs complete out of order and in parallel; nothing
//! streams past the barrier.

use git2::Oid;
use std::path::PathBuf;
use std::thread;
use tracing::warn;

/// One unit of work: a single commit to process.
#[derive(Debug, Clone)]
pub struct CommitJob {
    /// Repository location (reopened per worker; git handles are not
    /// shareable across threads).
    pub repo_path: PathBuf,
    /// Logical root the tracked-file paths are relative to.
    pub root: PathBuf,
    /// Commit identifier.
    pub oid: Oid,
    /// 1-based position in the walk order.
    pub seq: usize,
}

/// Run all jobs on `workers` threads and block until every job has
/// finished.
pub fn run_jobs<F>(workers: usize, jobs: Vec<CommitJob>, work: F)
where
    F: Fn(CommitJob) + Sync,
{
    let workers = workers.max(1);
    let (tx, rx) = crossbeam_channel::bounded::<CommitJob>(workers * 2);
    let work = &work;

    thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            scope.spawn(move || {
                while let Ok(job) = rx.recv() {
                    work(job);
                }
            });
        }
        drop(rx);

        for job in jobs {
            // The channel only disconnects when every worker has died
            // (panicked); stop submitting and let the scope join
            // surface the panic.
            if tx.send(job).is_err() {
                warn!("All workers gone, abandoning remaining jobs");
                break;
            }
        }
        drop(tx);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(seq: usize) -> CommitJob {
        CommitJob {
            repo_path: PathBuf::from("/repo"),
            root: PathBuf::from("/repo"),
            oid: Oid::zero(),
            seq,
        }
    }

    #[test]
    fn test_all_jobs_drain_before_return() {
        let done = AtomicUsize::new(0);
        let jobs: Vec<CommitJob> = (1..=100).map(job).collect();

        run_jobs(4, jobs, |_| {
            done.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(done.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_dead_pool_stops_submission_and_surfaces_worker_panic() {
        let jobs: Vec<CommitJob> = (1..=50).map(job).collect();

        // The only worker dies on its first job; the submitting side
        // must stop quietly and let the scope propagate the panic.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_jobs(1, jobs, |_| panic!("worker died"));
        }));
        let payload = result.unwrap_err();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .unwrap_or("non-str panic payload");
        assert_eq!(message, "a scoped thread panicked");
    }

    #[test]
    fn test_single_worker_sees_walk_order() {
        let seen = std::sync::Mutex::new(Vec::new());
        let jobs: Vec<CommitJob> = (1..=10).map(job).collect();

        run_jobs(1, jobs, |j| {
            seen.lock().unwrap().push(j.seq);
        });

        assert_eq!(*seen.lock().unwrap(), (1..=10).collect::<Vec<_>>());
    }
}
