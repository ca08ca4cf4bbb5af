//! Resource trees
//!
//! A [`ResourceTree`] is a snapshot of everything one game object has loaded:
//! its models, their materials, the textures and shader packages each
//! material references, and the skeletons. Nodes are annotated with the game
//! path(s) they could have been requested as and the file that was really
//! loaded.
//!
//! The native ownership graph shares objects (one texture used by two
//! materials). The tree does not: every parent gets its own copy of a shared
//! child, and the copies carry the same [`Node::source_address`].
//!
//! Snapshots are immutable; to see newer state, build a new one with
//! [`ResourceTreeFactory::from_object_table`].

pub mod builder;
pub mod resolver;

pub use builder::{ResourceTreeFactory, MAX_DEPTH};
pub use resolver::{CollectionRef, CollectionResolver, RedirectionMap};

use std::fmt;

/// Kind of a native resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Model
    Mdl,
    /// Material
    Mtrl,
    /// Texture
    Tex,
    /// Shader package
    Shpk,
    /// Skeleton
    Sklb,
    /// Pre-bone deformer
    Pbd,
    /// A file type this crate does not know
    Unknown(u32),
}

impl ResourceType {
    /// Decode the native file type tag (the extension as big-endian ASCII)
    pub fn from_tag(tag: u32) -> Self {
        match &tag.to_be_bytes() {
            b"\0mdl" => Self::Mdl,
            b"mtrl" => Self::Mtrl,
            b"\0tex" => Self::Tex,
            b"shpk" => Self::Shpk,
            b"sklb" => Self::Sklb,
            b"\0pbd" => Self::Pbd,
            _ => Self::Unknown(tag),
        }
    }

    /// The native file type tag
    pub fn tag(self) -> u32 {
        match self {
            Self::Mdl => u32::from_be_bytes(*b"\0mdl"),
            Self::Mtrl => u32::from_be_bytes(*b"mtrl"),
            Self::Tex => u32::from_be_bytes(*b"\0tex"),
            Self::Shpk => u32::from_be_bytes(*b"shpk"),
            Self::Sklb => u32::from_be_bytes(*b"sklb"),
            Self::Pbd => u32::from_be_bytes(*b"\0pbd"),
            Self::Unknown(tag) => tag,
        }
    }

    /// Plumbing that only matters when debugging
    pub fn is_internal(self) -> bool {
        matches!(self, Self::Shpk | Self::Sklb | Self::Pbd)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mdl => f.write_str("mdl"),
            Self::Mtrl => f.write_str("mtrl"),
            Self::Tex => f.write_str("tex"),
            Self::Shpk => f.write_str("shpk"),
            Self::Sklb => f.write_str("sklb"),
            Self::Pbd => f.write_str("pbd"),
            Self::Unknown(tag) => write!(f, "0x{:08X}", tag),
        }
    }
}

/// A logical, engine-internal resource path, e.g. `chara/common/texture/white.tex`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GamePath(String);

impl GamePath {
    /// Normalize `path` to lowercase with forward slashes
    ///
    /// Returns `None` for empty paths and for anything rooted on disk.
    pub fn new(path: &str) -> Option<Self> {
        let path = path.trim();
        if path.is_empty() || is_rooted(path) || !path.is_ascii() {
            return None;
        }
        Some(Self(path.replace('\\', "/").to_ascii_lowercase()))
    }

    /// The normalized path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The file a resource was actually loaded from
///
/// Either an on-disk replacement or, when nothing redirected it, the game
/// path itself. Empty when the location is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FullPath(String);

impl FullPath {
    /// Wrap a path as is
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The unknown location
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the location is unknown
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this is a file on disk rather than inside the game archives
    pub fn is_rooted(&self) -> bool {
        is_rooted(&self.0)
    }

    /// The path text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&GamePath> for FullPath {
    fn from(path: &GamePath) -> Self {
        Self(path.0.clone())
    }
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `C:\...`, `\\server\...` or `/...`
pub(crate) fn is_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    matches!(bytes.first(), Some(b'/' | b'\\'))
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// What a node's game paths amount to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePaths<'a> {
    /// No known game path
    None,
    /// Exactly one
    Single(&'a GamePath),
    /// Several requests share this resource; none is preferred
    Multiple(&'a [GamePath]),
}

/// One native resource instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Display label
    pub name: String,
    /// Resource kind
    pub resource_type: ResourceType,
    /// Address of the native resource handle; identity only
    pub source_address: usize,
    /// Game paths that lead to this resource
    pub possible_game_paths: Vec<GamePath>,
    /// The file that was loaded, empty if unavailable
    pub full_path: FullPath,
    /// Plumbing hidden outside debug mode
    pub internal: bool,
    /// Resources loaded as part of this one
    pub children: Vec<Node>,
}

impl Node {
    /// The game path, if there is exactly one
    pub fn game_path(&self) -> Option<&GamePath> {
        match self.possible_game_paths.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// Classify the possible game paths
    pub fn game_paths(&self) -> GamePaths<'_> {
        match self.possible_game_paths.as_slice() {
            [] => GamePaths::None,
            [single] => GamePaths::Single(single),
            many => GamePaths::Multiple(many),
        }
    }

    /// Number of nodes in this subtree, this one included
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }
}

/// Everything one game object has loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTree {
    /// Display name of the object
    pub name: String,
    /// Collection the object's files resolve through
    pub collection_name: String,
    /// The local player or something the local player owns
    pub player_related: bool,
    /// Address of the native game object
    pub object_address: usize,
    /// Top-level resources, in traversal order
    pub nodes: Vec<Node>,
}

impl ResourceTree {
    /// Depth-first iteration over every node
    pub fn flatten(&self) -> impl Iterator<Item = &Node> {
        let mut stack: Vec<&Node> = self.nodes.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}
