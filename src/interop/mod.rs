//! Game interop
//!
//! Native layouts, the object table, and the state hooks share with each
//! other.

pub mod context;
pub mod game_state;
pub mod layout;
pub mod object_table;

#[cfg(test)]
pub(crate) mod fixtures;

pub use context::{ContextScope, ContextSlot};
pub use game_state::{with_load_context, CollectionId, GameState, ResolveData};
pub use object_table::{GameObject, NativeObjectTable, ObjectKind, ObjectTable};
