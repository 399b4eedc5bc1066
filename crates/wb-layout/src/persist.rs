//! Persisted layout document.
//!
//! A [`LayoutDocument`] holds one nested tree per grid plus a parallel map
//! of navigation descriptors keyed by element id. Navigation state never
//! reaches the document: restoring a document yields every element with an
//! empty state.
//!
//! # Invariants
//!
//! 1. `from_document(to_document(l)) == l.without_states()`.
//! 2. `from_document` validates the restored layout before returning it.
//! 3. Documents with an unknown `schema_version` are rejected.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use wb_core::{ActivityId, NavigableId, PartId, ViewId, WorkbenchError, WorkbenchResult};

use crate::layout::WorkbenchLayout;
use crate::model::{
    Activity, DockingArea, Grid, GridElement, GridName, NodeId, Part, SplitDirection, SplitRatio,
    Toolbar, TreeNode, View,
};
use crate::navigation::NavigationDescriptor;

/// Current layout document schema version.
pub const LAYOUT_SCHEMA_VERSION: u16 = 1;

/// Serializable form of a [`WorkbenchLayout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub schema_version: u16,
    /// Keyed by `main`, `mainArea` or an activity id.
    #[serde(default)]
    pub grids: BTreeMap<String, GridDocument>,
    /// Keyed by part or view id.
    #[serde(default)]
    pub navigation: BTreeMap<String, NavigationDescriptor>,
    #[serde(default)]
    pub toolbars: Vec<ToolbarDocument>,
    pub next_node_id: u64,
    /// Forward-compatible extension bag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    pub root: TreeDocument,
    #[serde(default)]
    pub active_part: Option<PartId>,
}

/// Nested tree element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeDocument {
    Node {
        id: NodeId,
        direction: SplitDirection,
        ratio: SplitRatio,
        child1: Box<TreeDocument>,
        child2: Box<TreeDocument>,
    },
    Part(PartDocument),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDocument {
    pub id: PartId,
    #[serde(default)]
    pub views: Vec<ViewDocument>,
    #[serde(default)]
    pub active_view: Option<ViewId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub css_classes: Vec<String>,
    #[serde(default = "default_true")]
    pub structural: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDocument {
    pub id: ViewId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub dirty: bool,
    #[serde(default = "default_true")]
    pub closable: bool,
    #[serde(default)]
    pub css_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolbarDocument {
    pub docking: DockingArea,
    pub activities: Vec<ActivityDocument>,
    #[serde(default)]
    pub active: Option<ActivityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDocument {
    pub id: ActivityId,
    pub part: PartId,
    pub label: String,
    pub icon: String,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub css_classes: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn invalid(message: impl Into<String>) -> WorkbenchError {
    WorkbenchError::persistence(message)
}

// =========================================================================
// Export
// =========================================================================

impl WorkbenchLayout {
    /// Export to the persisted document form.
    #[must_use]
    pub fn to_document(&self) -> LayoutDocument {
        let grids = self
            .grids
            .iter()
            .filter_map(|(name, grid)| {
                let document = GridDocument {
                    root: self.export_element(&grid.root)?,
                    active_part: grid.active_part.clone(),
                };
                Some((name.as_str().to_string(), document))
            })
            .collect();
        let navigation = self
            .navigated_elements()
            .map(|(id, descriptor)| (id.as_str().to_string(), descriptor.without_state()))
            .collect();
        let toolbars = self
            .toolbars
            .iter()
            .map(|(docking, toolbar)| ToolbarDocument {
                docking: *docking,
                activities: toolbar
                    .activities
                    .iter()
                    .filter_map(|id| self.activities.get(id))
                    .map(|activity| ActivityDocument {
                        id: activity.id.clone(),
                        part: activity.part.clone(),
                        label: activity.label.clone(),
                        icon: activity.icon.clone(),
                        tooltip: activity.tooltip.clone(),
                        css_classes: activity.css_classes.clone(),
                    })
                    .collect(),
                active: toolbar.active.clone(),
            })
            .collect();
        LayoutDocument {
            schema_version: LAYOUT_SCHEMA_VERSION,
            grids,
            navigation,
            toolbars,
            next_node_id: self.next_node_id.get(),
            extensions: BTreeMap::new(),
        }
    }

    fn export_element(&self, element: &GridElement) -> Option<TreeDocument> {
        match element {
            GridElement::Node(id) => {
                let node = self.nodes.get(id)?;
                Some(TreeDocument::Node {
                    id: node.id,
                    direction: node.direction,
                    ratio: node.ratio,
                    child1: Box::new(self.export_element(&node.child1)?),
                    child2: Box::new(self.export_element(&node.child2)?),
                })
            }
            GridElement::Part(id) => {
                let part = self.parts.get(id)?;
                Some(TreeDocument::Part(PartDocument {
                    id: id.clone(),
                    views: part
                        .views
                        .iter()
                        .filter_map(|view| self.views.get(view))
                        .map(|view| ViewDocument {
                            id: view.id.clone(),
                            title: view.title.clone(),
                            heading: view.heading.clone(),
                            dirty: view.dirty,
                            closable: view.closable,
                            css_classes: view.css_classes.clone(),
                        })
                        .collect(),
                    active_view: part.active_view.clone(),
                    title: part.title.clone(),
                    css_classes: part.css_classes.clone(),
                    structural: part.structural,
                }))
            }
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> WorkbenchResult<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Serialize to URL-safe base64 JSON, suitable for query parameters.
    pub fn to_base64(&self) -> WorkbenchResult<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_json()?))
    }
}

// =========================================================================
// Import
// =========================================================================

impl WorkbenchLayout {
    /// Restore and validate a layout; every navigation state is empty.
    pub fn from_document(document: LayoutDocument) -> WorkbenchResult<Self> {
        if document.schema_version != LAYOUT_SCHEMA_VERSION {
            return Err(invalid(format!(
                "unsupported layout schema version {} (expected {LAYOUT_SCHEMA_VERSION})",
                document.schema_version
            )));
        }
        let mut layout = Self::new();
        layout.next_node_id =
            NodeId::new(document.next_node_id).map_err(|err| invalid(err.to_string()))?;

        for (raw, grid) in document.grids {
            let name = GridName::parse(&raw)
                .map_err(|err| invalid(format!("grid '{raw}': {err}")))?;
            let root = layout.import_element(&name, None, grid.root)?;
            let _ = layout.grids.insert(
                name,
                Grid {
                    root,
                    active_part: grid.active_part,
                },
            );
        }

        for toolbar in document.toolbars {
            let mut record = Toolbar {
                activities: Vec::new(),
                active: toolbar.active,
            };
            for activity in toolbar.activities {
                if layout.activities.contains_key(&activity.id) {
                    return Err(invalid(format!("activity '{}' listed twice", activity.id)));
                }
                record.activities.push(activity.id.clone());
                let _ = layout.activities.insert(
                    activity.id.clone(),
                    Activity {
                        id: activity.id,
                        part: activity.part,
                        docking: toolbar.docking,
                        label: activity.label,
                        icon: activity.icon,
                        tooltip: activity.tooltip,
                        css_classes: activity.css_classes,
                    },
                );
            }
            if layout.toolbars.insert(toolbar.docking, record).is_some() {
                return Err(invalid(format!("toolbar {:?} listed twice", toolbar.docking)));
            }
        }

        for (raw, descriptor) in document.navigation {
            let id = NavigableId::parse(&raw).map_err(|err| invalid(err.to_string()))?;
            let slot = match &id {
                NavigableId::Part(id) => layout.parts.get_mut(id).map(|part| &mut part.navigation),
                NavigableId::View(id) => layout.views.get_mut(id).map(|view| &mut view.navigation),
            };
            let Some(slot) = slot else {
                return Err(invalid(format!("navigation for unknown element '{raw}'")));
            };
            *slot = Some(descriptor.without_state());
        }

        layout
            .validate()
            .map_err(|err| invalid(format!("persisted layout is inconsistent: {err}")))?;
        Ok(layout)
    }

    fn import_element(
        &mut self,
        grid: &GridName,
        parent: Option<NodeId>,
        element: TreeDocument,
    ) -> WorkbenchResult<GridElement> {
        match element {
            TreeDocument::Node {
                id,
                direction,
                ratio,
                child1,
                child2,
            } => {
                if self.nodes.contains_key(&id) {
                    return Err(invalid(format!("tree node '{id}' listed twice")));
                }
                let child1 = self.import_element(grid, Some(id), *child1)?;
                let child2 = self.import_element(grid, Some(id), *child2)?;
                let _ = self.nodes.insert(
                    id,
                    TreeNode {
                        id,
                        grid: grid.clone(),
                        parent,
                        direction,
                        ratio,
                        child1,
                        child2,
                    },
                );
                Ok(GridElement::Node(id))
            }
            TreeDocument::Part(part) => {
                if self.parts.contains_key(&part.id) {
                    return Err(invalid(format!("part '{}' listed twice", part.id)));
                }
                let mut views = Vec::with_capacity(part.views.len());
                for view in part.views {
                    if self.views.contains_key(&view.id) {
                        return Err(invalid(format!("view '{}' listed twice", view.id)));
                    }
                    views.push(view.id.clone());
                    let _ = self.views.insert(
                        view.id.clone(),
                        View {
                            id: view.id,
                            part: part.id.clone(),
                            navigation: None,
                            title: view.title,
                            heading: view.heading,
                            dirty: view.dirty,
                            closable: view.closable,
                            css_classes: view.css_classes,
                        },
                    );
                }
                let _ = self.parts.insert(
                    part.id.clone(),
                    Part {
                        id: part.id.clone(),
                        grid: grid.clone(),
                        parent,
                        views,
                        active_view: part.active_view,
                        navigation: None,
                        title: part.title,
                        css_classes: part.css_classes,
                        structural: part.structural,
                    },
                );
                Ok(GridElement::Part(part.id))
            }
        }
    }

    pub fn from_json(json: &str) -> WorkbenchResult<Self> {
        let document: LayoutDocument = serde_json::from_str(json)?;
        Self::from_document(migrate_document(document)?.document)
    }

    pub fn from_base64(encoded: &str) -> WorkbenchResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|err| invalid(format!("layout is not valid base64: {err}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|err| invalid(format!("layout is not valid UTF-8: {err}")))?;
        Self::from_json(&json)
    }
}

// =========================================================================
// Versioning
// =========================================================================

/// Result of migrating a document to the current schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult {
    pub from_version: u16,
    pub to_version: u16,
    pub warnings: Vec<String>,
    pub document: LayoutDocument,
}

/// Bring a document to [`LAYOUT_SCHEMA_VERSION`].
pub fn migrate_document(document: LayoutDocument) -> WorkbenchResult<MigrationResult> {
    match document.schema_version {
        LAYOUT_SCHEMA_VERSION => Ok(MigrationResult {
            from_version: LAYOUT_SCHEMA_VERSION,
            to_version: LAYOUT_SCHEMA_VERSION,
            warnings: Vec::new(),
            document,
        }),
        version if version > LAYOUT_SCHEMA_VERSION => Err(invalid(format!(
            "layout schema version {version} is newer than supported version \
             {LAYOUT_SCHEMA_VERSION}; upgrade the workbench or reset the stored layout"
        ))),
        version => Err(invalid(format!(
            "no migration path from layout schema version {version} to \
             {LAYOUT_SCHEMA_VERSION}; reset the stored layout"
        ))),
    }
}

/// FNV-1a over the canonical JSON form of a document.
#[must_use]
pub fn document_hash(document: &LayoutDocument) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0001_0000_01b3;

    let bytes = serde_json::to_vec(document).unwrap_or_default();
    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

impl Serialize for WorkbenchLayout {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkbenchLayout {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = LayoutDocument::deserialize(deserializer)?;
        Self::from_document(document).map_err(serde::de::Error::custom)
    }
}
