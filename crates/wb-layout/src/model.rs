//! Layout element records.
//!
//! The layout is an arena: parts, views and tree nodes live in flat tables
//! keyed by id, and relationships are expressed through ids only (a grid
//! names its root element, a node names its children and parent, a view
//! names its owning part). There are no object back-references.

use std::fmt;

use serde::{Deserialize, Serialize};
use wb_core::{ActivityId, PartId, ViewId, WorkbenchError, WorkbenchResult};

use crate::navigation::NavigationDescriptor;

/// Default share given to a part added relative to another element.
pub const DEFAULT_RATIO: f64 = 0.5;

/// Stable identifier for tree nodes.
///
/// `0` is reserved/invalid so IDs are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Lowest valid node ID.
    pub const MIN: Self = Self(1);

    /// Create a node ID, rejecting 0.
    pub fn new(raw: u64) -> WorkbenchResult<Self> {
        if raw == 0 {
            return Err(WorkbenchError::illegal_argument("node id 0 is invalid"));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Return the next ID, or an error on overflow.
    pub fn checked_next(self) -> WorkbenchResult<Self> {
        let Some(next) = self.0.checked_add(1) else {
            return Err(WorkbenchError::illegal_state(format!(
                "node id overflow after {}",
                self.0
            )));
        };
        Self::new(next)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node.{}", self.0)
    }
}

/// Orientation of a tree node.
///
/// `Row` lays its children out side by side (left/right), `Column` stacks
/// them (top/bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    Row,
    Column,
}

/// Share of `child1` in a tree node; `child2` gets the complement.
///
/// Always strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SplitRatio(f64);

impl SplitRatio {
    pub const HALF: Self = Self(0.5);

    pub fn new(value: f64) -> WorkbenchResult<Self> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(WorkbenchError::illegal_argument(format!(
                "split ratio {value} must be within (0, 1)"
            )))
        }
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Share of the second child.
    #[must_use]
    pub fn complement(self) -> Self {
        Self(1.0 - self.0)
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::HALF
    }
}

impl TryFrom<f64> for SplitRatio {
    type Error = WorkbenchError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SplitRatio> for f64 {
    fn from(ratio: SplitRatio) -> Self {
        ratio.0
    }
}

/// Name of one root layout tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GridName {
    /// Peripheral parts plus, optionally, the main area part.
    Main,
    /// The grid nested inside the main area part.
    MainArea,
    /// The grid of a docked part.
    Activity(ActivityId),
}

impl GridName {
    pub const MAIN: &'static str = "main";
    pub const MAIN_AREA: &'static str = "mainArea";

    pub fn parse(value: &str) -> WorkbenchResult<Self> {
        match value {
            Self::MAIN => Ok(Self::Main),
            Self::MAIN_AREA => Ok(Self::MainArea),
            other => ActivityId::parse(other).map(Self::Activity),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Main => Self::MAIN,
            Self::MainArea => Self::MAIN_AREA,
            Self::Activity(id) => id.as_str(),
        }
    }

    #[must_use]
    pub const fn is_activity(&self) -> bool {
        matches!(self, Self::Activity(_))
    }
}

impl fmt::Display for GridName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for GridName {
    type Error = WorkbenchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GridName> for String {
    fn from(name: GridName) -> Self {
        name.as_str().to_string()
    }
}

/// Reference to a tree element: either an internal node or a part leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridElement {
    Node(NodeId),
    Part(PartId),
}

/// Internal binary split node.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub grid: GridName,
    pub parent: Option<NodeId>,
    pub direction: SplitDirection,
    pub ratio: SplitRatio,
    pub child1: GridElement,
    pub child2: GridElement,
}

/// One root layout tree plus its active-part pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub root: GridElement,
    pub active_part: Option<PartId>,
}

/// Side of the reference element a new part is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Right,
    Top,
    Bottom,
}

impl Align {
    #[must_use]
    pub const fn direction(self) -> SplitDirection {
        match self {
            Self::Left | Self::Right => SplitDirection::Row,
            Self::Top | Self::Bottom => SplitDirection::Column,
        }
    }

    /// Whether the incoming element becomes `child1`.
    #[must_use]
    pub const fn incoming_first(self) -> bool {
        matches!(self, Self::Left | Self::Top)
    }
}

/// Placement relative to an existing part, or to the whole main grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativePosition {
    /// Reference part; `None` aligns to the root of the main grid.
    #[serde(default)]
    pub relative_to: Option<PartId>,
    pub align: Align,
    /// Share of the new part; defaults to [`DEFAULT_RATIO`].
    #[serde(default)]
    pub ratio: Option<f64>,
}

impl RelativePosition {
    #[must_use]
    pub fn new(align: Align) -> Self {
        Self {
            relative_to: None,
            align,
            ratio: None,
        }
    }

    #[must_use]
    pub fn relative_to(mut self, part: PartId) -> Self {
        self.relative_to = Some(part);
        self
    }

    #[must_use]
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = Some(ratio);
        self
    }
}

/// Where `add_part` places a new part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartLocation {
    /// First part of the (empty) main grid.
    Root,
    Relative(RelativePosition),
}

/// Optional presentation for a new part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub css_classes: Vec<String>,
    /// Structural parts survive losing their last view.
    #[serde(default = "default_true")]
    pub structural: bool,
    /// Make the new part the active part of its grid.
    #[serde(default)]
    pub activate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PartMetadata {
    fn default() -> Self {
        Self {
            title: None,
            css_classes: Vec::new(),
            structural: true,
            activate: false,
        }
    }
}

impl PartMetadata {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn activated(mut self) -> Self {
        self.activate = true;
        self
    }
}

/// A container of views, a leaf of some grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: PartId,
    pub grid: GridName,
    pub parent: Option<NodeId>,
    /// Tab order.
    pub views: Vec<ViewId>,
    pub active_view: Option<ViewId>,
    pub navigation: Option<NavigationDescriptor>,
    pub title: Option<String>,
    pub css_classes: Vec<String>,
    pub structural: bool,
}

impl Part {
    #[must_use]
    pub fn is_navigated(&self) -> bool {
        self.navigation.is_some()
    }

    #[must_use]
    pub fn is_docked(&self) -> bool {
        self.grid.is_activity()
    }

    #[must_use]
    pub fn view_index(&self, view: &ViewId) -> Option<usize> {
        self.views.iter().position(|candidate| candidate == view)
    }
}

/// A tab owned by exactly one part.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub id: ViewId,
    pub part: PartId,
    pub navigation: Option<NavigationDescriptor>,
    pub title: Option<String>,
    pub heading: Option<String>,
    pub dirty: bool,
    pub closable: bool,
    pub css_classes: Vec<String>,
}

impl View {
    pub(crate) fn new(id: ViewId, part: PartId, css_classes: Vec<String>) -> Self {
        Self {
            id,
            part,
            navigation: None,
            title: None,
            heading: None,
            dirty: false,
            closable: true,
            css_classes,
        }
    }
}

/// Insertion point of a view within a part's tab list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPosition {
    Index(usize),
    Start,
    #[default]
    End,
    BeforeActive,
    AfterActive,
}

impl ViewPosition {
    /// Resolve into an index within `0..=len`.
    #[must_use]
    pub fn resolve(self, len: usize, active_index: Option<usize>) -> usize {
        match self {
            Self::Index(index) => index.min(len),
            Self::Start => 0,
            Self::End => len,
            Self::BeforeActive => active_index.unwrap_or(len),
            Self::AfterActive => active_index.map_or(len, |index| index + 1),
        }
    }
}

/// Options of `add_view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub part_id: PartId,
    #[serde(default)]
    pub position: ViewPosition,
    #[serde(default)]
    pub activate_view: bool,
    #[serde(default)]
    pub activate_part: bool,
    #[serde(default)]
    pub css_classes: Vec<String>,
}

impl ViewOptions {
    #[must_use]
    pub fn in_part(part_id: PartId) -> Self {
        Self {
            part_id,
            position: ViewPosition::End,
            activate_view: false,
            activate_part: false,
            css_classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, position: ViewPosition) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn activate(mut self) -> Self {
        self.activate_view = true;
        self
    }

    #[must_use]
    pub fn activate_part(mut self) -> Self {
        self.activate_part = true;
        self
    }
}

/// Destination of `move_view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveTarget {
    /// An existing part.
    Part { id: PartId },
    /// A new non-structural part split off an existing part.
    NewPart {
        id: PartId,
        relative_to: PartId,
        align: Align,
        #[serde(default)]
        ratio: Option<f64>,
    },
}

/// Options of `move_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveViewOptions {
    #[serde(default)]
    pub position: ViewPosition,
    #[serde(default)]
    pub activate_view: bool,
    #[serde(default)]
    pub activate_part: bool,
}

/// Toolbar slot a docked part is grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DockingArea {
    LeftTop,
    LeftBottom,
    RightTop,
    RightBottom,
    BottomLeft,
    BottomRight,
}

/// Presentation of an activity in its toolbar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    /// Activity id to use; generated when absent.
    #[serde(default)]
    pub id: Option<ActivityId>,
    pub label: String,
    pub icon: String,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub css_classes: Vec<String>,
    /// Open the activity right away.
    #[serde(default)]
    pub activate: bool,
}

impl ActivityMetadata {
    #[must_use]
    pub fn new(label: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            icon: icon.into(),
            tooltip: None,
            css_classes: Vec::new(),
            activate: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: ActivityId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn activated(mut self) -> Self {
        self.activate = true;
        self
    }
}

/// A docked part's toolbar entry. The docked part lives in the activity's
/// own grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: ActivityId,
    /// Reference part of the activity grid.
    pub part: PartId,
    pub docking: DockingArea,
    pub label: String,
    pub icon: String,
    pub tooltip: Option<String>,
    pub css_classes: Vec<String>,
}

/// Activities of one docking area, in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Toolbar {
    pub activities: Vec<ActivityId>,
    /// At most one open activity per toolbar.
    pub active: Option<ActivityId>,
}
