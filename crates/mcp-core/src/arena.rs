//! Per-request scratch arena.
//!
//! Request handling allocates a lot of short-lived scratch (decoded params,
//! intermediate strings, template match results) that all dies together when
//! the request finishes. Routing that through the global allocator churns it
//! needlessly; a bump arena that gets `reset()` between requests amortizes it
//! to near-zero.
//!
//! Arenas are not shared across threads — each worker keeps one in
//! thread-local storage and resets it after every request it handles.

use std::cell::RefCell;

use bumpalo::Bump;

/// A bump-allocated scratch arena, reused across requests on one worker.
#[derive(Debug)]
pub struct RequestArena {
    bump: Bump,
}

impl RequestArena {
    /// Create a new, empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Create an arena that pre-allocates `capacity` bytes in its first
    /// chunk, avoiding a grow on the first few allocations of a typical
    /// request.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bump: Bump::with_capacity(capacity),
        }
    }

    /// Copy `s` into the arena and return a reference with the arena's
    /// lifetime.
    #[must_use]
    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    /// Copy `slice` into the arena.
    #[must_use]
    pub fn alloc_slice_copy<'a, T: Copy>(&'a self, slice: &[T]) -> &'a [T] {
        self.bump.alloc_slice_copy(slice)
    }

    /// Bytes currently allocated across all chunks.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Drop everything allocated since the last reset. Retains the
    /// underlying chunk so the next request doesn't need to grow again.
    pub fn reset(&mut self) {
        self.bump.reset();
    }
}

impl Default for RequestArena {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static WORKER_ARENA: RefCell<RequestArena> = RefCell::new(RequestArena::with_capacity(4096));
}

/// Run `f` with exclusive access to this worker thread's scratch arena,
/// resetting it first so `f` never sees scratch left over from a previous
/// request.
pub fn with_worker_arena<R>(f: impl FnOnce(&RequestArena) -> R) -> R {
    WORKER_ARENA.with(|cell| {
        cell.borrow_mut().reset();
        f(&cell.borrow())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reclaims_allocated_bytes() {
        let mut arena = RequestArena::new();
        let s = arena.alloc_str("hello world");
        assert_eq!(s, "hello world");
        assert!(arena.allocated_bytes() > 0);
        arena.reset();
    }

    #[test]
    fn worker_arena_is_usable_across_calls() {
        let first = with_worker_arena(|arena| arena.alloc_str("first").len());
        let second = with_worker_arena(|arena| arena.alloc_str("second").len());
        assert_eq!(first, 5);
        assert_eq!(second, 6);
    }
}
