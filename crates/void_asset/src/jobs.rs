//! Minimal fork/join job pool used for parallel file hashing

use std::num::NonZeroUsize;

/// Splits a batch of work over scoped worker threads and joins once
#[derive(Clone, Copy, Debug)]
pub struct JobPool {
    workers: usize,
}

impl JobPool {
    /// Pool with `workers` threads, or one per available core when zero
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            workers
        };
        Self { workers }
    }

    /// Pool that runs everything on the calling thread
    pub fn serial() -> Self {
        Self { workers: 1 }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every item, preserving order in the output
    pub fn parallel_map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        if self.workers <= 1 || items.len() <= 1 {
            return items.iter().map(&f).collect();
        }

        let chunk = items.len().div_ceil(self.workers);
        let f = &f;
        let result = crossbeam_utils::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk)
                .map(|part| scope.spawn(move |_| part.iter().map(f).collect::<Vec<R>>()))
                .collect();

            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(part) => part,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect::<Vec<R>>()
        });

        match result {
            Ok(out) => out,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let items: Vec<u32> = (0..1000).collect();
        let pool = JobPool::new(4);
        let out = pool.parallel_map(&items, |x| x * 2);
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_serial_and_empty() {
        assert_eq!(JobPool::serial().workers(), 1);
        assert!(JobPool::new(0).workers() >= 1);
        let out: Vec<u8> = JobPool::new(8).parallel_map(&[] as &[u8], |x| *x);
        assert!(out.is_empty());
    }
}
