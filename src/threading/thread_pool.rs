use log::info;
use rayon::ThreadPoolBuilder;

/// A wrapper around Rayon's thread pool with a small fire-and-forget
/// interface for background terrain work (snapshot compression, disk I/O).
pub struct ThreadPool {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl ThreadPool {
    /// Create a pool with the given number of threads. A size of 0 picks
    /// one from the CPU count.
    pub fn new(size: usize) -> ThreadPool {
        let num_threads = if size > 0 { size } else { num_cpus::get() };

        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .unwrap_or_else(|e| panic!("failed to build thread pool: {e}"));

        info!("created thread pool with {} threads", num_threads);

        ThreadPool { pool, num_threads }
    }

    /// Queue a job without waiting for it.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(f);
    }

    /// Run a job on the pool and block for its result.
    pub fn execute_wait<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::channel();

        self.pool.spawn(move || {
            // The receiver outlives the job unless the caller panicked.
            let _ = tx.send(f());
        });

        rx.recv()
            .unwrap_or_else(|_| panic!("worker dropped result channel"))
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_size_uses_cpu_count() {
        let pool = ThreadPool::new(0);
        assert!(pool.num_threads() >= 1);
    }

    #[test]
    fn execute_wait_returns_the_value() {
        let pool = ThreadPool::new(2);
        assert_eq!(pool.execute_wait(|| 6 * 7), 42);
    }

    #[test]
    fn queued_jobs_all_run() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        // Flush by running a blocking job per worker after the queue.
        for _ in 0..pool.num_threads() {
            pool.execute_wait(|| {});
        }
        // Queue order is not guaranteed, so wait until the count settles.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 16 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::yield_now();
        }
    }
}
