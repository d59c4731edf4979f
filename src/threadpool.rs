//! Thread-token budget over rayon's global pool (spec.md §5).
//!
//! The host thread pool itself is external (spec.md §1: "Host thread-pool
//! implementation... only its contract is constrained"); this module is the
//! contract. We build a dedicated `rayon::ThreadPool` sized from
//! [`crate::config::config`] and hand out tokens from a bounded atomic
//! counter before submitting additional parallel work, exactly the shape
//! spec.md §5 describes: exact-N acquisitions for 3-way plane parallelism,
//! up-to-N for row-range splitting, and a thread-local depth counter so
//! nested tasks never re-parallelize.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use rayon::{ThreadPool, ThreadPoolBuilder};

thread_local! {
    static PARALLEL_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// True once we're already inside a parallel region — callers use this to
/// avoid re-entrant fan-out (spec.md §5: "any worker entering a parallel
/// region increments a thread-local depth counter so nested tasks never
/// re-parallelize").
pub fn already_parallel() -> bool {
    PARALLEL_DEPTH.with(|d| d.get() > 0)
}

fn enter_parallel() {
    PARALLEL_DEPTH.with(|d| d.set(d.get() + 1));
}

fn exit_parallel() {
    PARALLEL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
}

/// Run `f` marked as a parallel region: nested `already_parallel()` checks
/// inside `f` will see depth > 0 even though rayon worker threads don't
/// inherit the caller's thread-local state.
pub fn run_parallel_region<R>(f: impl FnOnce() -> R) -> R {
    enter_parallel();
    let result = f();
    exit_parallel();
    result
}

static POOL: OnceLock<ThreadPool> = OnceLock::new();

/// The process-wide worker pool, sized from `RuntimeConfig::threads`.
pub fn pool() -> &'static ThreadPool {
    POOL.get_or_init(|| {
        let threads = crate::config::config().threads.max(1);
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hkn-worker-{i}"))
            .build()
            .expect("failed to build HKN worker pool")
    })
}

/// A bounded token budget for exact-N / up-to-N parallel-region admission.
///
/// `max_threads` tokens exist in total. [`TokenBudget::acquire_exact`] only
/// succeeds (returning a [`TokenGuard`] holding all `n` tokens) if `n` are
/// free simultaneously — used for the 3-way Y/Co/Cg plane fan-out.
/// [`TokenBudget::acquire_up_to`] always succeeds, returning whatever is
/// available (at least 1) — used for YCoCg→RGB row-range splitting, which
/// degrades gracefully to fewer workers rather than failing.
pub struct TokenBudget {
    available: AtomicUsize,
}

impl TokenBudget {
    pub fn new(max_threads: usize) -> Self {
        TokenBudget {
            available: AtomicUsize::new(max_threads.max(1)),
        }
    }

    pub fn acquire_exact(&self, n: usize) -> Option<TokenGuard<'_>> {
        let mut cur = self.available.load(Ordering::Acquire);
        loop {
            if cur < n {
                return None;
            }
            match self.available.compare_exchange_weak(
                cur,
                cur - n,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(TokenGuard {
                        budget: self,
                        count: n,
                    })
                }
                Err(actual) => cur = actual,
            }
        }
    }

    pub fn acquire_up_to(&self, n: usize) -> TokenGuard<'_> {
        let mut cur = self.available.load(Ordering::Acquire);
        loop {
            let take = cur.min(n.max(1));
            match self.available.compare_exchange_weak(
                cur,
                cur - take,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return TokenGuard { budget: self, count: take },
                Err(actual) => cur = actual,
            }
        }
    }
}

pub struct TokenGuard<'a> {
    budget: &'a TokenBudget,
    count: usize,
}

impl TokenGuard<'_> {
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Drop for TokenGuard<'_> {
    fn drop(&mut self) {
        self.budget.available.fetch_add(self.count, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_acquire_respects_budget() {
        let b = TokenBudget::new(3);
        let g1 = b.acquire_exact(3).expect("should get all 3");
        assert!(b.acquire_exact(1).is_none());
        drop(g1);
        assert!(b.acquire_exact(3).is_some());
    }

    #[test]
    fn up_to_degrades_gracefully() {
        let b = TokenBudget::new(2);
        let g1 = b.acquire_up_to(8);
        assert_eq!(g1.count(), 2);
        drop(g1);
        let g2 = b.acquire_up_to(1);
        assert_eq!(g2.count(), 1);
    }

    #[test]
    fn nested_depth_tracks_entry_and_exit() {
        assert!(!already_parallel());
        run_parallel_region(|| {
            assert!(already_parallel());
        });
        assert!(!already_parallel());
    }
}
