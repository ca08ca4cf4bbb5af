//! Builders for native structures in mock memory

use super::layout::*;
use super::object_table::ObjectKind;
use crate::platform::mock::MockPlatform;
use crate::resource_tree::ResourceType;

pub(crate) fn write_object(
    platform: &MockPlatform,
    index: u16,
    kind: ObjectKind,
    name: &str,
    entity_id: u32,
    owner_id: u32,
) -> usize {
    let object = platform.alloc(0x200);
    let mut name_bytes = [0u8; GAME_OBJECT_NAME_LENGTH];
    name_bytes[..name.len()].copy_from_slice(name.as_bytes());

    platform.write_memory(object + GAME_OBJECT_NAME_OFFSET, &name_bytes);
    platform.write_value(object + GAME_OBJECT_INDEX_OFFSET, &index);
    platform.write_value(object + GAME_OBJECT_KIND_OFFSET, &u8::from(kind));
    platform.write_value(object + GAME_OBJECT_ENTITY_ID_OFFSET, &entity_id);
    platform.write_value(object + GAME_OBJECT_OWNER_ID_OFFSET, &owner_id);
    object
}

pub(crate) fn write_handle(platform: &MockPlatform, kind: ResourceType, file_name: &str) -> usize {
    let handle = platform.alloc(0x100);
    platform.write_value(handle + RESOURCE_HANDLE_FILE_TYPE_OFFSET, &kind.tag());
    platform.write_std_string(handle + RESOURCE_HANDLE_FILE_NAME_OFFSET, file_name);
    handle
}

pub(crate) fn write_mtrl_handle(
    platform: &MockPlatform,
    file_name: &str,
    shader_package: usize,
    textures: &[usize],
) -> usize {
    let handle = write_handle(platform, ResourceType::Mtrl, file_name);
    platform.write_ptr(handle + MTRL_SHADER_PACKAGE_OFFSET, shader_package);

    let entries = platform.alloc(textures.len() * MTRL_TEXTURE_ENTRY_SIZE);
    for (i, &texture) in textures.iter().enumerate() {
        platform.write_ptr(entries + i * MTRL_TEXTURE_ENTRY_SIZE, texture);
    }
    platform.write_ptr(handle + MTRL_TEXTURES_OFFSET, entries);
    platform.write_value(handle + MTRL_TEXTURE_COUNT_OFFSET, &(textures.len() as u8));
    handle
}

pub(crate) fn write_model(platform: &MockPlatform, mdl_handle: usize, mtrl_handles: &[usize]) -> usize {
    let model = platform.alloc(0x100);
    platform.write_ptr(model + MODEL_RESOURCE_HANDLE_OFFSET, mdl_handle);

    let materials = platform.alloc(mtrl_handles.len() * 8);
    for (i, &mtrl) in mtrl_handles.iter().enumerate() {
        let material = if mtrl == 0 {
            0
        } else {
            let material = platform.alloc(0x20);
            platform.write_ptr(material + MATERIAL_RESOURCE_HANDLE_OFFSET, mtrl);
            material
        };
        platform.write_ptr(materials + i * 8, material);
    }
    platform.write_ptr(model + MODEL_MATERIALS_OFFSET, materials);
    platform.write_value(model + MODEL_MATERIAL_COUNT_OFFSET, &(mtrl_handles.len() as u32));
    model
}

pub(crate) fn write_skeleton(platform: &MockPlatform, sklb_handles: &[usize]) -> usize {
    let skeleton = platform.alloc(0x80);
    let partials = platform.alloc(sklb_handles.len() * PARTIAL_SKELETON_SIZE);
    for (i, &handle) in sklb_handles.iter().enumerate() {
        platform.write_ptr(
            partials + i * PARTIAL_SKELETON_SIZE + PARTIAL_SKELETON_HANDLE_OFFSET,
            handle,
        );
    }
    platform.write_value(skeleton + SKELETON_PARTIAL_COUNT_OFFSET, &(sklb_handles.len() as u16));
    platform.write_ptr(skeleton + SKELETON_PARTIALS_OFFSET, partials);
    skeleton
}

/// Attach a draw object with the given model slots to `object`
pub(crate) fn write_draw_object(
    platform: &MockPlatform,
    object: usize,
    models: &[usize],
    skeleton: usize,
) -> usize {
    let character_base = platform.alloc(0x100);
    let slots = platform.alloc(models.len() * 8);
    for (i, &model) in models.iter().enumerate() {
        platform.write_ptr(slots + i * 8, model);
    }
    platform.write_value(character_base + CHARACTER_BASE_SLOT_COUNT_OFFSET, &(models.len() as u32));
    platform.write_ptr(character_base + CHARACTER_BASE_MODELS_OFFSET, slots);
    platform.write_ptr(character_base + CHARACTER_BASE_SKELETON_OFFSET, skeleton);
    platform.write_ptr(object + GAME_OBJECT_DRAW_OBJECT_OFFSET, character_base);
    character_base
}

/// Write an object table holding `objects` and return its address
pub(crate) fn write_table(platform: &MockPlatform, objects: &[usize]) -> usize {
    let table = platform.alloc(objects.len() * 8);
    for (i, &object) in objects.iter().enumerate() {
        platform.write_ptr(table + i * 8, object);
    }
    table
}
