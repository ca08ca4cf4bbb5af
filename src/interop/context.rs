//! Scoped load context
//!
//! A [`ContextSlot`] holds "what is being loaded right now" for the current
//! thread. Hooks never assign it directly: [`ContextSlot::enter`] hands back
//! a guard that puts the previous value back when it is dropped, so the slot
//! follows the call stack through any depth of nested loads and through
//! unwinding.

use std::cell::Cell;
use std::marker::PhantomData;
use std::thread::LocalKey;

/// A per-thread context cell with stack discipline
pub struct ContextSlot<T: 'static> {
    key: &'static LocalKey<Cell<T>>,
}

impl<T: Copy + 'static> ContextSlot<T> {
    /// Wrap a `thread_local!` cell
    pub const fn new(key: &'static LocalKey<Cell<T>>) -> Self {
        Self { key }
    }

    /// Current value on this thread
    #[inline]
    pub fn get(&self) -> T {
        self.key.with(Cell::get)
    }

    /// Set `value` until the returned scope is dropped
    #[inline]
    #[must_use = "the previous value is restored as soon as the scope is dropped"]
    pub fn enter(&self, value: T) -> ContextScope<T> {
        let previous = self.key.with(|cell| cell.replace(value));
        ContextScope {
            key: self.key,
            previous,
            _not_send: PhantomData,
        }
    }
}

impl<T: 'static> std::fmt::Debug for ContextSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSlot").finish_non_exhaustive()
    }
}

/// Restores the previous context value on drop
///
/// Bound to the thread that created it.
pub struct ContextScope<T: Copy + 'static> {
    key: &'static LocalKey<Cell<T>>,
    previous: T,
    _not_send: PhantomData<*const ()>,
}

impl<T: Copy + 'static> ContextScope<T> {
    /// The value that will be restored
    pub fn previous(&self) -> T {
        self.previous
    }
}

impl<T: Copy + 'static> Drop for ContextScope<T> {
    #[inline]
    fn drop(&mut self) {
        let previous = self.previous;
        // The key can only be gone during thread teardown, then there is nothing to restore.
        let _ = self.key.try_with(|cell| cell.set(previous));
    }
}
