//! State shared between hooks
//!
//! When a material file is resolved, the resolver records which collection
//! and which game object asked for it ([`GameState::record_sub_file`]). When
//! the game later loads that material's textures, the hook looks the record
//! up again and makes it the current material context, so the texture loads
//! triggered from inside are attributed to the same collection.

use super::context::{ContextScope, ContextSlot};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use std::cell::Cell;
use std::collections::HashMap;

/// Identifier of a configuration collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub u32);

impl CollectionId {
    /// No collection
    pub const NONE: Self = Self(0);
}

/// Which collection a load belongs to and which game object caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolveData {
    /// Collection the load resolves through
    pub collection: CollectionId,
    /// Address of the game object the load is for, `0` if unknown
    pub associated_object: usize,
}

impl ResolveData {
    /// No context
    pub const INVALID: Self = Self {
        collection: CollectionId::NONE,
        associated_object: 0,
    };

    /// Create resolve data for an object
    pub const fn new(collection: CollectionId, associated_object: usize) -> Self {
        Self {
            collection,
            associated_object,
        }
    }

    /// Whether this carries a collection
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.collection != CollectionId::NONE
    }
}

impl Default for ResolveData {
    fn default() -> Self {
        Self::INVALID
    }
}

thread_local! {
    static MTRL_DATA: Cell<ResolveData> = const { Cell::new(ResolveData::INVALID) };
}

/// Shared hook state
///
/// The sub-file table belongs to each `GameState`. The material context does
/// not: [`GameState::mtrl_data`] is a view of one thread-local cell, so every
/// `GameState` on a thread sees and sets the same context. This is what lets
/// the resolver read the context the hook entered without being handed the
/// hook's instance.
#[derive(Debug)]
pub struct GameState {
    /// Context of the material whose textures are being loaded on this
    /// thread, shared by every `GameState`
    pub mtrl_data: ContextSlot<ResolveData>,
    /// Read on every material load, written once per material resolve
    sub_files: ArcSwap<HashMap<usize, ResolveData>>,
}

impl GameState {
    /// Create an empty game state
    pub fn new() -> Self {
        Self {
            mtrl_data: ContextSlot::new(&MTRL_DATA),
            sub_files: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Remember which context created the resource behind `handle`
    ///
    /// Recording a handle again replaces the earlier record. Records are
    /// never dropped on their own: whoever records sub files must call
    /// [`forget_sub_file`](Self::forget_sub_file) when the game destroys the
    /// resource, or a handle address reused by the allocator inherits a
    /// stale collection until it is recorded again.
    pub fn record_sub_file(&self, handle: usize, data: ResolveData) {
        self.sub_files.rcu(|files| {
            let mut files = HashMap::clone(files);
            files.insert(handle, data);
            files
        });
    }

    /// Drop the record for a destroyed resource
    pub fn forget_sub_file(&self, handle: usize) -> Option<ResolveData> {
        let previous = self.sub_files.rcu(|files| {
            let mut files = HashMap::clone(files);
            files.remove(&handle);
            files
        });
        previous.get(&handle).copied()
    }

    /// Derive the load context for the resource behind `handle`
    ///
    /// Unknown handles yield [`ResolveData::INVALID`]; they were not loaded
    /// through a collection.
    pub fn load_sub_file_helper(&self, handle: usize) -> Result<ResolveData> {
        if handle == 0 {
            return Err(Error::NullHandle("material resource"));
        }

        Ok(self
            .sub_files
            .load()
            .get(&handle)
            .copied()
            .unwrap_or(ResolveData::INVALID))
    }

    /// Context that nested sub-file loads on this thread should use, if any
    #[inline]
    pub fn current_mtrl_data(&self) -> Option<ResolveData> {
        let data = self.mtrl_data.get();
        data.is_valid().then_some(data)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `forward` with the material context derived from `handle`
///
/// The previous context is restored when `forward` returns or unwinds. If
/// the context cannot be derived the failure is logged and `forward` still
/// runs, under the unchanged context: the game's own load must never be
/// skipped or altered.
#[inline]
pub fn with_load_context<R>(state: &GameState, handle: usize, forward: impl FnOnce() -> R) -> R {
    let _scope: Option<ContextScope<ResolveData>> = match state.load_sub_file_helper(handle) {
        Ok(data) => Some(state.mtrl_data.enter(data)),
        Err(e) => {
            tracing::error!("Could not derive material load context for 0x{:X}: {}", handle, e);
            None
        }
    };

    forward()
}
