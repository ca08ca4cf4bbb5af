//! Building resource trees from live game memory

use super::resolver::{CollectionRef, CollectionResolver};
use super::{is_rooted, FullPath, GamePath, Node, ResourceTree, ResourceType};
use crate::interop::layout::*;
use crate::interop::{GameObject, ObjectKind, ObjectTable};
use crate::platform::{MemoryReader, PlatformError, POINTER_SIZE};
use crate::{Error, Result};
use std::sync::Arc;

/// Deepest chain of nested resources that is followed
pub const MAX_DEPTH: usize = 16;

/// Counts above this are treated as a torn read
const MAX_PLAUSIBLE_COUNT: usize = 256;

/// Equipment slots of a human character base, by model slot
const HUMAN_SLOT_NAMES: [&str; 13] = [
    "Head",
    "Body",
    "Hands",
    "Legs",
    "Feet",
    "Earrings",
    "Necklace",
    "Bracelets",
    "Right Ring",
    "Left Ring",
    "Hair",
    "Face",
    "Tail / Ears",
];

/// Builds [`ResourceTree`]s from the object table
pub struct ResourceTreeFactory<R, O, C> {
    reader: Arc<R>,
    objects: O,
    resolver: C,
}

impl<R, O, C> ResourceTreeFactory<R, O, C>
where
    R: MemoryReader,
    O: ObjectTable,
    C: CollectionResolver,
{
    /// Create a factory over the given collaborators
    pub fn new(reader: Arc<R>, objects: O, resolver: C) -> Self {
        Self {
            reader,
            objects,
            resolver,
        }
    }

    /// One tree per live, drawn game object, in object table order
    ///
    /// Read-only. Fails if the game frees or rewrites something mid-walk;
    /// callers should treat that as "no data right now".
    pub fn from_object_table(&self) -> Result<Vec<ResourceTree>> {
        let objects = self.objects.objects()?;
        let local_player = objects
            .iter()
            .find(|o| o.is_local_player())
            .map(|o| o.entity_id)
            .filter(|&id| id != INVALID_ENTITY_ID);

        let mut trees = Vec::new();
        for object in &objects {
            if object.draw_object == 0 {
                tracing::trace!("Skipping {} (#{}), not drawn", object.name, object.index);
                continue;
            }

            let player_related =
                object.is_local_player() || local_player.is_some_and(|id| object.owner_id == id);
            trees.push(self.build_tree(object, player_related)?);
        }

        tracing::debug!("Built {} resource trees", trees.len());
        Ok(trees)
    }

    fn build_tree(&self, object: &GameObject, player_related: bool) -> Result<ResourceTree> {
        let collection = self
            .resolver
            .collection_for(object)
            .unwrap_or_else(CollectionRef::none);

        let mut walker = Walker {
            reader: self.reader.as_ref(),
            resolver: &self.resolver,
            collection: &collection,
            ancestors: Vec::with_capacity(MAX_DEPTH),
        };

        let character_base = object.draw_object;
        let mut nodes = Vec::new();

        let slot_count =
            walker.count::<u32>("slot count", character_base, CHARACTER_BASE_SLOT_COUNT_OFFSET)?;
        let models = walker.ptr("model slots", character_base, CHARACTER_BASE_MODELS_OFFSET)?;
        let human = object.kind == ObjectKind::Player || slot_count >= 10;

        for slot in 0..slot_count {
            if models == 0 {
                break;
            }
            let entry = element("model slots", models, slot, POINTER_SIZE)?;
            let model = walker.ptr("model", entry, 0)?;
            if model == 0 {
                continue;
            }

            let label = match HUMAN_SLOT_NAMES.get(slot) {
                Some(name) if human => (*name).to_string(),
                _ => format!("Model #{}", slot),
            };
            if let Some(node) = walker.model_node(model, label)? {
                nodes.push(node);
            }
        }

        let skeleton = walker.ptr("skeleton", character_base, CHARACTER_BASE_SKELETON_OFFSET)?;
        if skeleton != 0 {
            nodes.extend(walker.skeleton_nodes(skeleton)?);
        }

        Ok(ResourceTree {
            name: if object.name.is_empty() {
                format!("Object #{}", object.index)
            } else {
                object.name.clone()
            },
            collection_name: collection.name.clone(),
            player_related,
            object_address: object.address,
            nodes,
        })
    }
}

/// State of one tree walk
struct Walker<'a, R, C> {
    reader: &'a R,
    resolver: &'a C,
    collection: &'a CollectionRef,
    /// Handles on the path from the root to the node being expanded
    ancestors: Vec<usize>,
}

impl<R: MemoryReader, C: CollectionResolver> Walker<'_, R, C> {
    fn ptr(&self, what: &'static str, base: usize, offset: usize) -> Result<usize> {
        let address = field(what, base, offset)?;
        self.reader
            .read_ptr(address)
            .map_err(|source| Error::Walk { what, address, source })
    }

    fn count<T>(&self, what: &'static str, base: usize, offset: usize) -> Result<usize>
    where
        T: bytemuck::Pod + Into<u64>,
    {
        let address = field(what, base, offset)?;
        let count: u64 = self
            .reader
            .read::<T>(address)
            .map_err(|source| Error::Walk { what, address, source })?
            .into();
        let count = count as usize;

        if count > MAX_PLAUSIBLE_COUNT {
            return Err(Error::Walk {
                what,
                address,
                source: PlatformError::Other(format!("implausible count {}", count)),
            });
        }
        Ok(count)
    }

    fn model_node(&mut self, model: usize, label: String) -> Result<Option<Node>> {
        let handle = self.ptr("model resource handle", model, MODEL_RESOURCE_HANDLE_OFFSET)?;
        if handle == 0 {
            return Ok(None);
        }
        let Some(mut node) = self.node(handle, Some(label))? else {
            return Ok(None);
        };

        // Materials hang off the render model, not off the model file.
        let count = self.count::<u32>("material count", model, MODEL_MATERIAL_COUNT_OFFSET)?;
        let materials = self.ptr("materials", model, MODEL_MATERIALS_OFFSET)?;
        if materials == 0 {
            return Ok(Some(node));
        }

        self.ancestors.push(handle);
        let children = self.material_nodes(materials, count);
        self.ancestors.pop();

        node.children.extend(children?);
        Ok(Some(node))
    }

    fn material_nodes(&mut self, materials: usize, count: usize) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for i in 0..count {
            let entry = element("materials", materials, i, POINTER_SIZE)?;
            let material = self.ptr("material", entry, 0)?;
            if material == 0 {
                continue;
            }
            let handle =
                self.ptr("material resource handle", material, MATERIAL_RESOURCE_HANDLE_OFFSET)?;
            if handle == 0 {
                continue;
            }
            nodes.extend(self.node(handle, None)?);
        }
        Ok(nodes)
    }

    fn skeleton_nodes(&mut self, skeleton: usize) -> Result<Vec<Node>> {
        let count =
            self.count::<u16>("partial skeleton count", skeleton, SKELETON_PARTIAL_COUNT_OFFSET)?;
        let partials = self.ptr("partial skeletons", skeleton, SKELETON_PARTIALS_OFFSET)?;
        if partials == 0 {
            return Ok(Vec::new());
        }

        let mut nodes = Vec::new();
        for i in 0..count {
            let partial = element("partial skeleton", partials, i, PARTIAL_SKELETON_SIZE)?;
            let handle =
                self.ptr("skeleton resource handle", partial, PARTIAL_SKELETON_HANDLE_OFFSET)?;
            if handle != 0 {
                nodes.extend(self.node(handle, Some(format!("Skeleton #{}", i)))?);
            }
        }
        Ok(nodes)
    }

    /// Expand one resource handle and everything it references
    fn node(&mut self, handle: usize, label: Option<String>) -> Result<Option<Node>> {
        if self.ancestors.contains(&handle) {
            tracing::warn!("Resource 0x{:X} references itself, not expanding it again", handle);
            return Ok(None);
        }
        if self.ancestors.len() >= MAX_DEPTH {
            tracing::warn!("Resource 0x{:X} is nested deeper than {} levels", handle, MAX_DEPTH);
            return Ok(None);
        }

        let tag = self
            .reader
            .read::<u32>(field("resource handle", handle, RESOURCE_HANDLE_FILE_TYPE_OFFSET)?)
            .map_err(|source| Error::Walk {
                what: "resource handle",
                address: handle,
                source,
            })?;
        let resource_type = ResourceType::from_tag(tag);
        let file_name = self.file_name(handle)?;
        let (possible_game_paths, full_path) = self.paths(&file_name);

        let name = label.unwrap_or_else(|| display_name(&file_name, resource_type));
        tracing::trace!("{} [{}] at 0x{:X}: {}", name, resource_type, handle, full_path);

        self.ancestors.push(handle);
        let children = self.children(handle, resource_type);
        self.ancestors.pop();

        Ok(Some(Node {
            name,
            resource_type,
            source_address: handle,
            possible_game_paths,
            full_path,
            internal: resource_type.is_internal(),
            children: children?,
        }))
    }

    fn children(&mut self, handle: usize, resource_type: ResourceType) -> Result<Vec<Node>> {
        match resource_type {
            ResourceType::Mtrl => self.mtrl_children(handle),
            _ => Ok(Vec::new()),
        }
    }

    fn mtrl_children(&mut self, handle: usize) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();

        let shader_package = self.ptr("shader package", handle, MTRL_SHADER_PACKAGE_OFFSET)?;
        if shader_package != 0 {
            nodes.extend(self.node(shader_package, None)?);
        }

        let count = self.count::<u8>("texture count", handle, MTRL_TEXTURE_COUNT_OFFSET)?;
        let textures = self.ptr("textures", handle, MTRL_TEXTURES_OFFSET)?;
        if textures == 0 {
            return Ok(nodes);
        }

        for i in 0..count {
            let entry = element("textures", textures, i, MTRL_TEXTURE_ENTRY_SIZE)?;
            let texture = self.ptr("texture", entry, 0)?;
            if texture != 0 {
                nodes.extend(self.node(texture, None)?);
            }
        }
        Ok(nodes)
    }

    /// A garbled name only makes the path unavailable; an unreadable handle fails the walk.
    fn file_name(&self, handle: usize) -> Result<String> {
        let address = field("file name", handle, RESOURCE_HANDLE_FILE_NAME_OFFSET)?;
        match self.reader.read_std_string(address) {
            Ok(name) => Ok(name),
            Err(PlatformError::InvalidString { reason, .. }) => {
                tracing::debug!("Unreadable file name on 0x{:X}: {}", handle, reason);
                Ok(String::new())
            }
            Err(source) => Err(Error::Walk {
                what: "file name",
                address,
                source,
            }),
        }
    }

    /// Game paths and actual path for a native file name
    fn paths(&self, file_name: &str) -> (Vec<GamePath>, FullPath) {
        let file_name = strip_marker(file_name);
        if file_name.is_empty() {
            return (Vec::new(), FullPath::empty());
        }

        if is_rooted(file_name) {
            let full_path = FullPath::new(file_name);
            let game_paths = self.resolver.reverse_resolve(self.collection, &full_path);
            return (game_paths, full_path);
        }

        match GamePath::new(file_name) {
            Some(game_path) => {
                let full_path = self
                    .resolver
                    .resolve(self.collection, &game_path)
                    .unwrap_or_else(|| FullPath::from(&game_path));
                (vec![game_path], full_path)
            }
            None => (Vec::new(), FullPath::empty()),
        }
    }
}

/// Loads redirected through a collection carry a `|marker|` prefix.
fn strip_marker(file_name: &str) -> &str {
    match file_name.strip_prefix('|') {
        Some(rest) => rest.split_once('|').map_or("", |(_, path)| path),
        None => file_name,
    }
}

fn display_name(file_name: &str, resource_type: ResourceType) -> String {
    let path = strip_marker(file_name);
    match path.rsplit(['/', '\\']).next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Unnamed {}", resource_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::fixtures::*;
    use crate::interop::{CollectionId, NativeObjectTable};
    use crate::platform::mock::MockPlatform;
    use crate::resource_tree::{GamePaths, RedirectionMap};

    type Factory = ResourceTreeFactory<MockPlatform, NativeObjectTable<MockPlatform>, RedirectionMap>;

    fn factory(platform: &MockPlatform, objects: &[usize], resolver: RedirectionMap) -> Factory {
        let table = write_table(platform, objects);
        let reader = Arc::new(platform.clone());
        ResourceTreeFactory::new(
            reader.clone(),
            NativeObjectTable::new(reader, table, objects.len()),
            resolver,
        )
    }

    fn default_collection() -> RedirectionMap {
        let mut map = RedirectionMap::new();
        map.add_collection(CollectionId(1), "Default").set_default(CollectionId(1));
        map
    }

    fn player(platform: &MockPlatform) -> usize {
        write_object(platform, 0, ObjectKind::Player, "Alisaie", 0x1000_0001, INVALID_ENTITY_ID)
    }

    #[test]
    fn test_empty_object_table() {
        let platform = MockPlatform::new();
        let factory = ResourceTreeFactory::new(
            Arc::new(platform),
            Vec::<GameObject>::new(),
            default_collection(),
        );

        assert!(factory.from_object_table().unwrap().is_empty());
    }

    #[test]
    fn test_model_material_texture_chain() {
        let platform = MockPlatform::new();
        let tex = write_handle(&platform, ResourceType::Tex, "chara/equipment/e0001/texture/v01_c0101e0001_top_n.tex");
        let mtrl = write_mtrl_handle(&platform, "chara/equipment/e0001/material/v0001/mt_c0101e0001_top_a.mtrl", 0, &[tex]);
        let mdl = write_handle(&platform, ResourceType::Mdl, "chara/equipment/e0001/model/c0101e0001_top.mdl");
        let model = write_model(&platform, mdl, &[mtrl]);

        let object = player(&platform);
        write_draw_object(&platform, object, &[0, model], 0);

        let trees = factory(&platform, &[object], default_collection())
            .from_object_table()
            .unwrap();

        assert_eq!(trees.len(), 1);
        let tree = &trees[0];
        assert_eq!(tree.name, "Alisaie");
        assert_eq!(tree.collection_name, "Default");
        assert!(tree.player_related);

        assert_eq!(tree.nodes.len(), 1);
        let root = &tree.nodes[0];
        assert_eq!(root.name, "Body");
        assert_eq!(root.resource_type, ResourceType::Mdl);
        assert_eq!(root.source_address, mdl);
        assert_eq!(root.children.len(), 1);

        let child = &root.children[0];
        assert_eq!(child.resource_type, ResourceType::Mtrl);
        assert_eq!(child.name, "mt_c0101e0001_top_a.mtrl");
        assert_eq!(child.children.len(), 1);

        let grandchild = &child.children[0];
        assert_eq!(grandchild.resource_type, ResourceType::Tex);
        assert_eq!(grandchild.source_address, tex);
        assert!(grandchild.children.is_empty());
        assert_eq!(
            grandchild.game_path().unwrap().as_str(),
            "chara/equipment/e0001/texture/v01_c0101e0001_top_n.tex"
        );
        assert_eq!(grandchild.full_path.as_str(), grandchild.game_path().unwrap().as_str());
    }

    #[test]
    fn test_shared_texture_is_duplicated() {
        let platform = MockPlatform::new();
        let shared = write_handle(&platform, ResourceType::Tex, "C:\\mods\\shared_n.tex");
        let mtrl_a = write_mtrl_handle(&platform, "chara/a.mtrl", 0, &[shared]);
        let mtrl_b = write_mtrl_handle(&platform, "chara/b.mtrl", 0, &[shared]);
        let mdl = write_handle(&platform, ResourceType::Mdl, "chara/top.mdl");
        let model = write_model(&platform, mdl, &[mtrl_a, mtrl_b]);

        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let mut resolver = default_collection();
        let target = FullPath::new("C:\\mods\\shared_n.tex");
        resolver
            .redirect(CollectionId(1), GamePath::new("chara/a_n.tex").unwrap(), target.clone())
            .redirect(CollectionId(1), GamePath::new("chara/b_n.tex").unwrap(), target.clone());

        let trees = factory(&platform, &[object], resolver).from_object_table().unwrap();
        let materials = &trees[0].nodes[0].children;

        assert_eq!(materials.len(), 2);
        let first = &materials[0].children[0];
        let second = &materials[1].children[0];
        assert_eq!(first.source_address, shared);
        assert_eq!(second.source_address, shared);
        assert_eq!(first.full_path, target);
        assert_eq!(second.full_path, target);
        assert!(matches!(first.game_paths(), GamePaths::Multiple(paths) if paths.len() == 2));
        assert_eq!(first.possible_game_paths, second.possible_game_paths);
    }

    #[test]
    fn test_redirected_game_path_and_marker() {
        let platform = MockPlatform::new();
        let tex = write_handle(&platform, ResourceType::Tex, "|1_2_00000000|chara/a_n.tex");
        let mtrl = write_mtrl_handle(&platform, "chara/a.mtrl", 0, &[tex]);
        let mdl = write_handle(&platform, ResourceType::Mdl, "chara/top.mdl");
        let model = write_model(&platform, mdl, &[mtrl]);

        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let mut resolver = default_collection();
        resolver.redirect(
            CollectionId(1),
            GamePath::new("chara/a_n.tex").unwrap(),
            FullPath::new("C:\\mods\\a_n.tex"),
        );

        let trees = factory(&platform, &[object], resolver).from_object_table().unwrap();
        let texture = &trees[0].nodes[0].children[0].children[0];

        assert_eq!(texture.name, "a_n.tex");
        assert_eq!(texture.game_path().unwrap().as_str(), "chara/a_n.tex");
        assert_eq!(texture.full_path.as_str(), "C:\\mods\\a_n.tex");
    }

    #[test]
    fn test_unreverseable_disk_path_has_no_game_path() {
        let platform = MockPlatform::new();
        let tex = write_handle(&platform, ResourceType::Tex, "D:\\other\\plugin.tex");
        let mtrl = write_mtrl_handle(&platform, "chara/a.mtrl", 0, &[tex]);
        let model = write_model(&platform, write_handle(&platform, ResourceType::Mdl, "chara/top.mdl"), &[mtrl]);

        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let trees = factory(&platform, &[object], default_collection()).from_object_table().unwrap();
        let texture = &trees[0].nodes[0].children[0].children[0];

        assert_eq!(texture.game_paths(), GamePaths::None);
        assert_eq!(texture.full_path.as_str(), "D:\\other\\plugin.tex");
    }

    #[test]
    fn test_internal_nodes() {
        let platform = MockPlatform::new();
        let shpk = write_handle(&platform, ResourceType::Shpk, "shader/sm5/shpk/character.shpk");
        let tex = write_handle(&platform, ResourceType::Tex, "chara/a.tex");
        let mtrl = write_mtrl_handle(&platform, "chara/a.mtrl", shpk, &[tex]);
        let model = write_model(&platform, write_handle(&platform, ResourceType::Mdl, "chara/top.mdl"), &[mtrl]);
        let sklb = write_handle(&platform, ResourceType::Sklb, "chara/human/c0101/skeleton/base/b0001/skl_c0101b0001.sklb");
        let skeleton = write_skeleton(&platform, &[sklb]);

        let object = player(&platform);
        write_draw_object(&platform, object, &[model], skeleton);

        let trees = factory(&platform, &[object], default_collection()).from_object_table().unwrap();
        let tree = &trees[0];

        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[1].name, "Skeleton #0");
        assert!(tree.nodes[1].internal);

        let material_children = &tree.nodes[0].children[0].children;
        assert_eq!(material_children.len(), 2);
        assert_eq!(material_children[0].resource_type, ResourceType::Shpk);
        assert!(material_children[0].internal);
        assert!(!material_children[1].internal);
    }

    #[test]
    fn test_cycle_is_cut() {
        let platform = MockPlatform::new();
        let mtrl = write_mtrl_handle(&platform, "chara/a.mtrl", 0, &[]);
        // The material lists itself as its own texture.
        let entries = platform.alloc(MTRL_TEXTURE_ENTRY_SIZE);
        platform.write_ptr(entries, mtrl);
        platform.write_ptr(mtrl + MTRL_TEXTURES_OFFSET, entries);
        platform.write_value(mtrl + MTRL_TEXTURE_COUNT_OFFSET, &1u8);

        let model = write_model(&platform, write_handle(&platform, ResourceType::Mdl, "chara/top.mdl"), &[mtrl]);
        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let trees = factory(&platform, &[object], default_collection()).from_object_table().unwrap();
        let material = &trees[0].nodes[0].children[0];

        assert_eq!(material.source_address, mtrl);
        assert!(material.children.is_empty());
    }

    #[test]
    fn test_player_relation_and_skipping() {
        let platform = MockPlatform::new();
        let local = player(&platform);
        let minion = write_object(&platform, 3, ObjectKind::Companion, "Wind-up Alisaie", 0x1000_0002, 0x1000_0001);
        let stranger = write_object(&platform, 4, ObjectKind::Player, "Thancred", 0x1000_0003, INVALID_ENTITY_ID);
        let undrawn = write_object(&platform, 5, ObjectKind::EventNpc, "Tataru", 0x1000_0004, INVALID_ENTITY_ID);
        for object in [local, minion, stranger] {
            write_draw_object(&platform, object, &[], 0);
        }

        let trees = factory(&platform, &[local, minion, stranger, undrawn], RedirectionMap::new())
            .from_object_table()
            .unwrap();

        let summary: Vec<_> = trees
            .iter()
            .map(|t| (t.name.as_str(), t.player_related, t.collection_name.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("Alisaie", true, "None"),
                ("Wind-up Alisaie", true, "None"),
                ("Thancred", false, "None"),
            ]
        );
    }

    #[test]
    fn test_freed_handle_fails_the_walk() {
        let platform = MockPlatform::new();
        let model = write_model(&platform, 0xDEAD_0000, &[]);
        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let result = factory(&platform, &[object], default_collection()).from_object_table();
        assert!(matches!(result, Err(Error::Walk { what: "resource handle", .. })));
    }

    #[test]
    fn test_pointer_at_end_of_address_space_fails_the_walk() {
        let platform = MockPlatform::new();
        let mdl = write_handle(&platform, ResourceType::Mdl, "chara/equipment/e0001/model/c0101e0001_top.mdl");
        let model = write_model(&platform, mdl, &[usize::MAX - 4]);
        let object = player(&platform);
        write_draw_object(&platform, object, &[model], 0);

        let result = factory(&platform, &[object], default_collection()).from_object_table();
        assert!(matches!(
            result,
            Err(Error::Walk {
                what: "resource handle",
                source: PlatformError::InvalidAddress(address),
                ..
            }) if address == usize::MAX - 4
        ));

        let object = player(&platform);
        platform.write_ptr(object + GAME_OBJECT_DRAW_OBJECT_OFFSET, usize::MAX - 4);
        let result = factory(&platform, &[object], default_collection()).from_object_table();
        assert!(matches!(result, Err(Error::Walk { what: "slot count", .. })));
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_marker("|abc|chara/a.tex"), "chara/a.tex");
        assert_eq!(strip_marker("chara/a.tex"), "chara/a.tex");
        assert_eq!(strip_marker("|broken"), "");
    }
}
