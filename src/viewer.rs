//! Headless resource tree viewer
//!
//! Keeps the last built snapshot across frames and turns it into table rows
//! (name, game path, actual path) that a UI can paint as they are. Building
//! is slow and may fail while the game mutates its object table, so it only
//! happens on the first draw and on an explicit [`refresh`](ResourceTreeViewer::refresh).

use crate::interop::ObjectTable;
use crate::platform::MemoryReader;
use crate::resource_tree::{CollectionResolver, GamePaths, Node, ResourceTree, ResourceTreeFactory};
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Something that can build resource trees on demand
pub trait TreeSource {
    /// Build a fresh set of trees
    fn build(&self) -> Result<Vec<ResourceTree>>;
}

impl<R, O, C> TreeSource for ResourceTreeFactory<R, O, C>
where
    R: MemoryReader,
    O: ObjectTable,
    C: CollectionResolver,
{
    fn build(&self) -> Result<Vec<ResourceTree>> {
        self.from_object_table()
    }
}

impl<F> TreeSource for F
where
    F: Fn() -> Result<Vec<ResourceTree>>,
{
    fn build(&self) -> Result<Vec<ResourceTree>> {
        self()
    }
}

/// Identity of a node inside the current snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    fn of(node: &Node) -> Self {
        Self(node as *const Node as usize)
    }
}

/// One table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Text shown in the cell
    pub text: String,
    /// Whether the cell can be clicked
    pub enabled: bool,
    /// Hover text
    pub tooltip: Option<String>,
    /// Text put on the clipboard when clicked
    pub copy: Option<String>,
}

/// One visible node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Node this row shows
    pub node: NodeId,
    /// Indentation level, `0` for roots
    pub level: usize,
    /// Name with its fold marker
    pub label: String,
    /// Whether clicking the label folds or unfolds
    pub has_children: bool,
    /// Resource type and address, only in debug mode
    pub tooltip: Option<String>,
    /// Game path column
    pub game_path: Cell,
    /// Actual path column
    pub actual_path: Cell,
}

/// One object's header and rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeView {
    /// Header text
    pub name: String,
    /// Line shown under the header
    pub collection: String,
    /// Highlight the header
    pub player_related: bool,
    /// Header starts expanded
    pub default_open: bool,
    /// Visible rows, depth first
    pub rows: Vec<Row>,
}

/// Caches resource trees and lays them out as rows
pub struct ResourceTreeViewer<S> {
    name: String,
    source: S,
    on_refresh: Box<dyn FnMut() + Send>,
    unfolded: HashSet<NodeId>,
    trees: Option<Arc<Vec<ResourceTree>>>,
    last_successful: Option<Arc<Vec<ResourceTree>>>,
}

impl<S: TreeSource> ResourceTreeViewer<S> {
    /// Create a viewer; `name` identifies it in logs
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
            on_refresh: Box::new(|| {}),
            unfolded: HashSet::new(),
            trees: None,
            last_successful: None,
        }
    }

    /// Run `callback` after every refresh
    pub fn on_refresh(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_refresh = Box::new(callback);
        self
    }

    /// Viewer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rebuild the trees and fold everything
    pub fn refresh(&mut self) {
        self.trees = Some(self.build());
        self.unfolded.clear();
        (self.on_refresh)();
    }

    /// Current trees, building them on first use
    ///
    /// After a failed build this is empty.
    pub fn trees(&mut self) -> Arc<Vec<ResourceTree>> {
        match &self.trees {
            Some(trees) => trees.clone(),
            None => {
                let trees = self.build();
                self.trees = Some(trees.clone());
                trees
            }
        }
    }

    /// The most recent snapshot that was built without error
    pub fn last_successful(&self) -> Option<&Arc<Vec<ResourceTree>>> {
        self.last_successful.as_ref()
    }

    /// Lay out every tree
    pub fn draw(&mut self, debug_mode: bool) -> Vec<TreeView> {
        let trees = self.trees();
        trees
            .iter()
            .enumerate()
            .map(|(index, tree)| {
                let mut rows = Vec::new();
                self.rows(&tree.nodes, 0, debug_mode, &mut rows);
                TreeView {
                    name: tree.name.clone(),
                    collection: format!("Collection: {}", tree.collection_name),
                    player_related: tree.player_related,
                    default_open: index == 0,
                    rows,
                }
            })
            .collect()
    }

    /// Fold or unfold the node behind `row`
    pub fn toggle(&mut self, row: &Row) {
        if !row.has_children {
            return;
        }
        if !self.unfolded.remove(&row.node) {
            self.unfolded.insert(row.node);
        }
    }

    /// Whether the node behind `row` shows its children
    pub fn is_unfolded(&self, row: &Row) -> bool {
        self.unfolded.contains(&row.node)
    }

    fn build(&mut self) -> Arc<Vec<ResourceTree>> {
        match self.source.build() {
            Ok(trees) => {
                let trees = Arc::new(trees);
                self.last_successful = Some(trees.clone());
                trees
            }
            Err(e) => {
                tracing::error!("Could not get character list for {}:\n{}", self.name, e);
                Arc::new(Vec::new())
            }
        }
    }

    fn rows(&self, nodes: &[Node], level: usize, debug_mode: bool, out: &mut Vec<Row>) {
        for node in nodes {
            if node.internal && !debug_mode {
                continue;
            }

            let id = NodeId::of(node);
            let has_children = !node.children.is_empty();
            let unfolded = self.unfolded.contains(&id);
            let marker = match (has_children, unfolded) {
                (false, _) => "",
                (true, false) => "[+] ",
                (true, true) => "[-] ",
            };

            out.push(Row {
                node: id,
                level,
                label: format!("{}{}", marker, node.name),
                has_children,
                tooltip: debug_mode.then(|| {
                    format!(
                        "Resource Type: {}\nSource Address: 0x{:016X}",
                        node.resource_type, node.source_address
                    )
                }),
                game_path: game_path_cell(node),
                actual_path: actual_path_cell(node),
            });

            if unfolded {
                self.rows(&node.children, level + 1, debug_mode, out);
            }
        }
    }
}

fn game_path_cell(node: &Node) -> Cell {
    let text = match node.game_paths() {
        GamePaths::None => "(none)".to_string(),
        GamePaths::Single(path) => path.to_string(),
        GamePaths::Multiple(_) => "(multiple)".to_string(),
    };

    if node.possible_game_paths.is_empty() {
        return Cell {
            text,
            enabled: false,
            tooltip: None,
            copy: None,
        };
    }

    let all = node
        .possible_game_paths
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Cell {
        text,
        enabled: true,
        tooltip: Some(format!("{}\n\nClick to copy to clipboard.", all)),
        copy: Some(all),
    }
}

fn actual_path_cell(node: &Node) -> Cell {
    if node.full_path.is_empty() {
        return Cell {
            text: "(unavailable)".to_string(),
            enabled: false,
            tooltip: Some(
                "The actual path to this file is unavailable.\nIt may be managed by another plug-in."
                    .to_string(),
            ),
            copy: None,
        };
    }

    let path = node.full_path.to_string();
    Cell {
        text: path.clone(),
        enabled: true,
        tooltip: Some(format!("{}\n\nClick to copy to clipboard.", path)),
        copy: Some(path),
    }
}
