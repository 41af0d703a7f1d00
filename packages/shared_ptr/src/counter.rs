use std::process;
use std::sync::atomic::{self, AtomicUsize, Ordering};

/// Soft limit on the number of references that may share one counter.
///
/// The count can only grow this large if handles are leaked with `mem::forget`. Going above
/// the limit aborts the process instead of risking a wrapped count and a use-after-free.
const MAX_COUNT: usize = usize::MAX >> 1;

/// A concurrency-safe reference count, starting at 1.
///
/// Every [`Shared<T>`][crate::Shared] that owns a value holds one reference to the counter
/// that belongs to that value. The counter may be incremented and decremented from any number
/// of threads, as long as each thread does so through a handle that it owns.
///
/// # Examples
///
/// ```
/// use shared_ptr::SharedCount;
///
/// let count = SharedCount::new();
/// assert_eq!(count.current_count(), 1);
///
/// count.increment();
/// assert_eq!(count.current_count(), 2);
///
/// assert_eq!(count.decrement(), 1);
/// assert_eq!(count.decrement(), 0);
/// ```
#[derive(Debug)]
pub struct SharedCount {
    count: AtomicUsize,
}

impl SharedCount {
    /// Creates a counter that represents one owner.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    /// Registers one more owner.
    ///
    /// Relaxed ordering is enough here: a new reference can only be created from an existing
    /// one, and handing that existing reference to another thread already synchronizes.
    ///
    /// Aborts the process if the count exceeds `usize::MAX / 2`.
    pub fn increment(&self) {
        let previous = self.count.fetch_add(1, Ordering::Relaxed);

        if previous > MAX_COUNT {
            abort_on_overflow();
        }
    }

    /// Unregisters one owner and returns the number of owners that remain.
    ///
    /// The caller that receives `0` is the one responsible for releasing whatever the counter
    /// guards. The returned value is the result of the atomic operation itself, so exactly one
    /// caller ever observes zero.
    ///
    /// When `0` is returned, all uses of the guarded value made by other owners before their
    /// own `decrement()` happen-before the return of this call.
    #[must_use]
    pub fn decrement(&self) -> usize {
        let previous = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "shared counter decremented below zero");

        if previous == 1 {
            // Pairs with the release decrements of every other owner.
            atomic::fence(Ordering::Acquire);
        }

        previous.wrapping_sub(1)
    }

    /// Reads the current number of owners.
    ///
    /// The value may already be stale by the time it is returned if other threads own
    /// references. It is meant for diagnostics and tests, never for deciding to release.
    #[must_use]
    pub fn current_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for SharedCount {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
#[cfg_attr(test, mutants::skip)] // Aborting kills the test process, so mutations cannot be observed.
fn abort_on_overflow() -> ! {
    process::abort()
}
