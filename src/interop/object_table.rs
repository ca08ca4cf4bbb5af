//! The game's object table
//!
//! The client keeps a fixed-size array of pointers to its live game objects.
//! Slot 0 always holds the local player.

use super::layout::*;
use crate::platform::{MemoryReader, POINTER_SIZE};
use crate::{Error, Result};
use std::sync::Arc;

/// Kind of a game object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A player character
    Player,
    /// A combat NPC
    BattleNpc,
    /// A non-combat NPC
    EventNpc,
    /// A mount
    Mount,
    /// A minion
    Companion,
    /// A fashion accessory
    Ornament,
    /// Anything else
    Other(u8),
}

impl From<u8> for ObjectKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Player,
            2 => Self::BattleNpc,
            3 => Self::EventNpc,
            8 => Self::Mount,
            9 => Self::Companion,
            15 => Self::Ornament,
            other => Self::Other(other),
        }
    }
}

impl From<ObjectKind> for u8 {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Player => 1,
            ObjectKind::BattleNpc => 2,
            ObjectKind::EventNpc => 3,
            ObjectKind::Mount => 8,
            ObjectKind::Companion => 9,
            ObjectKind::Ornament => 15,
            ObjectKind::Other(other) => other,
        }
    }
}

/// A snapshot of one game object's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameObject {
    /// Address of the native object
    pub address: usize,
    /// Slot in the object table
    pub index: u16,
    /// Object kind
    pub kind: ObjectKind,
    /// Display name
    pub name: String,
    /// Entity id, [`INVALID_ENTITY_ID`] if none
    pub entity_id: u32,
    /// Entity id of the owner, [`INVALID_ENTITY_ID`] if none
    pub owner_id: u32,
    /// Address of the draw object, `0` if not drawn
    pub draw_object: usize,
}

impl GameObject {
    /// Read an object header from native memory
    pub fn read<R: MemoryReader>(reader: &R, address: usize) -> Result<Self> {
        let walk = |what| move |source| Error::Walk {
            what,
            address,
            source,
        };

        Ok(Self {
            address,
            index: reader
                .read::<u16>(field("object index", address, GAME_OBJECT_INDEX_OFFSET)?)
                .map_err(walk("object index"))?,
            kind: reader
                .read::<u8>(field("object kind", address, GAME_OBJECT_KIND_OFFSET)?)
                .map_err(walk("object kind"))?
                .into(),
            name: reader
                .read_cstring(
                    field("object name", address, GAME_OBJECT_NAME_OFFSET)?,
                    GAME_OBJECT_NAME_LENGTH,
                )
                .map_err(walk("object name"))?,
            entity_id: reader
                .read::<u32>(field("entity id", address, GAME_OBJECT_ENTITY_ID_OFFSET)?)
                .map_err(walk("entity id"))?,
            owner_id: reader
                .read::<u32>(field("owner id", address, GAME_OBJECT_OWNER_ID_OFFSET)?)
                .map_err(walk("owner id"))?,
            draw_object: reader
                .read_ptr(field("draw object", address, GAME_OBJECT_DRAW_OBJECT_OFFSET)?)
                .map_err(walk("draw object"))?,
        })
    }

    /// Whether this is the local player
    pub fn is_local_player(&self) -> bool {
        self.index == 0 && self.kind == ObjectKind::Player
    }
}

/// Source of the currently live game objects
pub trait ObjectTable {
    /// Snapshot the live objects, in table order
    fn objects(&self) -> Result<Vec<GameObject>>;
}

impl ObjectTable for Vec<GameObject> {
    fn objects(&self) -> Result<Vec<GameObject>> {
        Ok(self.clone())
    }
}

/// The client's object table, read from memory
pub struct NativeObjectTable<R> {
    reader: Arc<R>,
    address: usize,
    capacity: usize,
}

impl<R: MemoryReader> NativeObjectTable<R> {
    /// `address` points at an array of `capacity` object pointers
    pub fn new(reader: Arc<R>, address: usize, capacity: usize) -> Self {
        Self {
            reader,
            address,
            capacity,
        }
    }
}

impl<R: MemoryReader> ObjectTable for NativeObjectTable<R> {
    fn objects(&self) -> Result<Vec<GameObject>> {
        let mut objects = Vec::new();

        for slot in 0..self.capacity {
            let slot_address = element("object table", self.address, slot, POINTER_SIZE)?;
            let pointer = self.reader.read_ptr(slot_address).map_err(|source| Error::Walk {
                what: "object table",
                address: slot_address,
                source,
            })?;

            if pointer != 0 {
                objects.push(GameObject::read(self.reader.as_ref(), pointer)?);
            }
        }

        tracing::trace!("Object table holds {} objects", objects.len());
        Ok(objects)
    }
}
