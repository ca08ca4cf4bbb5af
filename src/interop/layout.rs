//! Native structure layouts
//!
//! Offsets into the client structures the tree builder reads. Only the
//! fields actually followed are listed. All pointers are 64-bit.

use crate::platform::PlatformError;
use crate::{Error, Result};

/// Opaque native `MaterialResourceHandle`
#[repr(C)]
pub struct MaterialResourceHandle {
    _opaque: [u8; 0],
}

// -- GameObject --
// class GameObject {
//   ...
//   char     Name[64];      // +0x30
//   uint32_t EntityId;      // +0x74
//   uint32_t OwnerId;       // +0x84
//   uint8_t  ObjectKind;    // +0x8C
//   uint16_t ObjectIndex;   // +0x8E
//   ...
//   CharacterBase* DrawObject; // +0x100
// };

/// GameObject::Name, null-terminated UTF-8
pub const GAME_OBJECT_NAME_OFFSET: usize = 0x30;
/// Capacity of GameObject::Name
pub const GAME_OBJECT_NAME_LENGTH: usize = 64;
/// GameObject::EntityId
pub const GAME_OBJECT_ENTITY_ID_OFFSET: usize = 0x74;
/// GameObject::OwnerId
pub const GAME_OBJECT_OWNER_ID_OFFSET: usize = 0x84;
/// GameObject::ObjectKind
pub const GAME_OBJECT_KIND_OFFSET: usize = 0x8C;
/// GameObject::ObjectIndex
pub const GAME_OBJECT_INDEX_OFFSET: usize = 0x8E;
/// GameObject::DrawObject
pub const GAME_OBJECT_DRAW_OBJECT_OFFSET: usize = 0x100;

/// Entity id of objects that have none
pub const INVALID_ENTITY_ID: u32 = 0xE000_0000;

// -- CharacterBase --
// class CharacterBase : DrawObject {
//   uint32_t  SlotCount;    // +0x98
//   Model**   Models;       // +0xA0
//   Skeleton* Skeleton;     // +0xA8
// };

/// CharacterBase::SlotCount
pub const CHARACTER_BASE_SLOT_COUNT_OFFSET: usize = 0x98;
/// CharacterBase::Models
pub const CHARACTER_BASE_MODELS_OFFSET: usize = 0xA0;
/// CharacterBase::Skeleton
pub const CHARACTER_BASE_SKELETON_OFFSET: usize = 0xA8;

// -- Skeleton --
// class Skeleton {
//   uint16_t         PartialSkeletonCount; // +0x50
//   PartialSkeleton* PartialSkeletons;     // +0x68, stride 0x1C0
// };
// struct PartialSkeleton {
//   SkeletonResourceHandle* SkeletonResourceHandle; // +0x120
// };

/// Skeleton::PartialSkeletonCount
pub const SKELETON_PARTIAL_COUNT_OFFSET: usize = 0x50;
/// Skeleton::PartialSkeletons
pub const SKELETON_PARTIALS_OFFSET: usize = 0x68;
/// sizeof(PartialSkeleton)
pub const PARTIAL_SKELETON_SIZE: usize = 0x1C0;
/// PartialSkeleton::SkeletonResourceHandle
pub const PARTIAL_SKELETON_HANDLE_OFFSET: usize = 0x120;

// -- Model --
// class Model {
//   ModelResourceHandle* ModelResourceHandle; // +0x30
//   Material**           Materials;           // +0x98
//   uint32_t             MaterialCount;       // +0xA0
// };

/// Model::ModelResourceHandle
pub const MODEL_RESOURCE_HANDLE_OFFSET: usize = 0x30;
/// Model::Materials
pub const MODEL_MATERIALS_OFFSET: usize = 0x98;
/// Model::MaterialCount
pub const MODEL_MATERIAL_COUNT_OFFSET: usize = 0xA0;

// -- Material --
// class Material {
//   MaterialResourceHandle* MaterialResourceHandle; // +0x10
// };

/// Material::MaterialResourceHandle
pub const MATERIAL_RESOURCE_HANDLE_OFFSET: usize = 0x10;

// -- ResourceHandle --
// class ResourceHandle {
//   void*       vtable;     // +0x00
//   uint32_t    Category;   // +0x08
//   uint32_t    FileType;   // +0x0C, extension as big-endian ASCII
//   ...
//   std::string FileName;   // +0x48
// };

/// ResourceHandle::FileType
pub const RESOURCE_HANDLE_FILE_TYPE_OFFSET: usize = 0x0C;
/// ResourceHandle::FileName
pub const RESOURCE_HANDLE_FILE_NAME_OFFSET: usize = 0x48;

// -- MaterialResourceHandle : ResourceHandle --
//   ShaderPackageResourceHandle* ShaderPackage; // +0xC8
//   TextureEntry*                Textures;      // +0xD0, stride 0x10
//   uint8_t                      TextureCount;  // +0xFA
// struct TextureEntry {
//   TextureResourceHandle* Handle; // +0x00
//   uint32_t               Id;     // +0x08
// };

/// MaterialResourceHandle::ShaderPackage
pub const MTRL_SHADER_PACKAGE_OFFSET: usize = 0xC8;
/// MaterialResourceHandle::Textures
pub const MTRL_TEXTURES_OFFSET: usize = 0xD0;
/// MaterialResourceHandle::TextureCount
pub const MTRL_TEXTURE_COUNT_OFFSET: usize = 0xFA;
/// sizeof(TextureEntry)
pub const MTRL_TEXTURE_ENTRY_SIZE: usize = 0x10;

/// Address of the field `offset` bytes into the structure at `base`
///
/// Pointers come straight out of game memory, so a torn read can put `base`
/// anywhere. An address past the end of the address space fails the walk.
pub fn field(what: &'static str, base: usize, offset: usize) -> Result<usize> {
    base.checked_add(offset).ok_or_else(|| out_of_range(what, base))
}

/// Address of entry `index` in an array of `stride`-byte entries at `base`
pub fn element(what: &'static str, base: usize, index: usize, stride: usize) -> Result<usize> {
    index
        .checked_mul(stride)
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| out_of_range(what, base))
}

fn out_of_range(what: &'static str, base: usize) -> Error {
    Error::Walk {
        what,
        address: base,
        source: PlatformError::InvalidAddress(base),
    }
}
