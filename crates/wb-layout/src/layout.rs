//! The immutable workbench layout.
//!
//! Every public mutation runs on a working copy, validates all structural
//! invariants and returns the copy; the receiver is never modified. Tables are
//! persistent maps, so a copy shares structure with its source.

use std::fmt;
use std::sync::OnceLock;

use im::OrdMap;
use wb_core::{
    ActivityId, MAIN_AREA, NavigableId, PartId, ViewId, WorkbenchError, WorkbenchResult,
    compute_activity_id,
};

use crate::model::{
    Activity, ActivityMetadata, Align, DEFAULT_RATIO, DockingArea, Grid, GridElement, GridName,
    MoveTarget, MoveViewOptions, NodeId, Part, PartLocation, PartMetadata, RelativePosition,
    SplitRatio, Toolbar, TreeNode, View, ViewOptions,
};
use crate::navigation::{NavigateOptions, NavigationDescriptor, NavigationStatus, is_self_navigation};

fn missing_part(id: &PartId) -> WorkbenchError {
    WorkbenchError::illegal_state(format!("part '{id}' does not exist"))
}

fn missing_node(id: NodeId) -> WorkbenchError {
    WorkbenchError::illegal_state(format!("tree node '{id}' does not exist"))
}

fn missing_grid(name: &GridName) -> WorkbenchError {
    WorkbenchError::illegal_state(format!("grid '{name}' does not exist"))
}

/// Per-value cache. Never compared and never carried over by `clone`.
#[derive(Default)]
pub(crate) struct LayoutMemo {
    state_hash: OnceLock<u64>,
}

impl Clone for LayoutMemo {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for LayoutMemo {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl fmt::Debug for LayoutMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutMemo")
            .field("state_hash", &self.state_hash.get())
            .finish()
    }
}

/// Grids of parts and views plus the activity toolbars.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbenchLayout {
    pub(crate) grids: OrdMap<GridName, Grid>,
    pub(crate) nodes: OrdMap<NodeId, TreeNode>,
    pub(crate) parts: OrdMap<PartId, Part>,
    pub(crate) views: OrdMap<ViewId, View>,
    pub(crate) activities: OrdMap<ActivityId, Activity>,
    pub(crate) toolbars: OrdMap<DockingArea, Toolbar>,
    pub(crate) next_node_id: NodeId,
    pub(crate) memo: LayoutMemo,
}

impl Default for WorkbenchLayout {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Queries
// =========================================================================

impl WorkbenchLayout {
    /// Layout without any grid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grids: OrdMap::new(),
            nodes: OrdMap::new(),
            parts: OrdMap::new(),
            views: OrdMap::new(),
            activities: OrdMap::new(),
            toolbars: OrdMap::new(),
            next_node_id: NodeId::MIN,
            memo: LayoutMemo::default(),
        }
    }

    #[must_use]
    pub fn part(&self, id: &PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    #[must_use]
    pub fn view(&self, id: &ViewId) -> Option<&View> {
        self.views.get(id)
    }

    #[must_use]
    pub fn has_part(&self, id: &PartId) -> bool {
        self.parts.contains_key(id)
    }

    #[must_use]
    pub fn has_view(&self, id: &ViewId) -> bool {
        self.views.contains_key(id)
    }

    /// All parts in id order.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// All views in id order.
    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn grid(&self, name: &GridName) -> Option<&Grid> {
        self.grids.get(name)
    }

    pub fn grids(&self) -> impl Iterator<Item = (&GridName, &Grid)> {
        self.grids.iter()
    }

    #[must_use]
    pub fn activity(&self, id: &ActivityId) -> Option<&Activity> {
        self.activities.get(id)
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    #[must_use]
    pub fn toolbar(&self, area: DockingArea) -> Option<&Toolbar> {
        self.toolbars.get(&area)
    }

    pub fn toolbars(&self) -> impl Iterator<Item = (&DockingArea, &Toolbar)> {
        self.toolbars.iter()
    }

    #[must_use]
    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    /// Active part of `grid`, or of the main-area grid (falling back to the
    /// main grid) when no grid is named.
    #[must_use]
    pub fn active_part(&self, grid: Option<&GridName>) -> Option<&Part> {
        let grid = match grid {
            Some(name) => self.grids.get(name)?,
            None => self
                .grids
                .get(&GridName::MainArea)
                .or_else(|| self.grids.get(&GridName::Main))?,
        };
        grid.active_part.as_ref().and_then(|id| self.parts.get(id))
    }

    /// Active view of `part`, or of the active part when none is named.
    #[must_use]
    pub fn active_view(&self, part: Option<&PartId>) -> Option<&View> {
        let part = match part {
            Some(id) => self.parts.get(id)?,
            None => self.active_part(None)?,
        };
        part.active_view.as_ref().and_then(|id| self.views.get(id))
    }

    /// Parts of one grid, `child1` subtrees before `child2` subtrees.
    #[must_use]
    pub fn parts_in_grid(&self, name: &GridName) -> Vec<&Part> {
        let Some(grid) = self.grids.get(name) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![&grid.root];
        while let Some(element) = stack.pop() {
            match element {
                GridElement::Part(id) => {
                    if let Some(part) = self.parts.get(id) {
                        out.push(part);
                    }
                }
                GridElement::Node(id) => {
                    if let Some(node) = self.nodes.get(id) {
                        stack.push(&node.child2);
                        stack.push(&node.child1);
                    }
                }
            }
        }
        out
    }

    /// Views of one part in tab order.
    #[must_use]
    pub fn views_of(&self, part: &PartId) -> Vec<&View> {
        self.parts.get(part).map_or_else(Vec::new, |part| {
            part.views
                .iter()
                .filter_map(|id| self.views.get(id))
                .collect()
        })
    }

    #[must_use]
    pub fn navigation(&self, id: &NavigableId) -> Option<&NavigationDescriptor> {
        match id {
            NavigableId::Part(id) => self.parts.get(id)?.navigation.as_ref(),
            NavigableId::View(id) => self.views.get(id)?.navigation.as_ref(),
        }
    }

    #[must_use]
    pub fn navigation_status(&self, id: &NavigableId) -> NavigationStatus {
        let exists = match id {
            NavigableId::Part(id) => self.parts.contains_key(id),
            NavigableId::View(id) => self.views.contains_key(id),
        };
        if !exists {
            NavigationStatus::Removed
        } else if self.navigation(id).is_some() {
            NavigationStatus::Navigated
        } else {
            NavigationStatus::Unnavigated
        }
    }

    /// Every navigated part and view with its descriptor.
    pub fn navigated_elements(
        &self,
    ) -> impl Iterator<Item = (NavigableId, &NavigationDescriptor)> {
        let parts = self.parts.values().filter_map(|part| {
            part.navigation
                .as_ref()
                .map(|navigation| (NavigableId::Part(part.id.clone()), navigation))
        });
        let views = self.views.values().filter_map(|view| {
            view.navigation
                .as_ref()
                .map(|navigation| (NavigableId::View(view.id.clone()), navigation))
        });
        parts.chain(views)
    }

    /// Copy with the private navigation state of every element emptied.
    #[must_use]
    pub fn without_states(&self) -> Self {
        let mut out = self.clone();
        out.for_each_navigation(|navigation| navigation.state.clear());
        out
    }

    /// Deterministic structural hash, memoized per value.
    ///
    /// Navigation state does not contribute.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        *self
            .memo
            .state_hash
            .get_or_init(|| crate::persist::document_hash(&self.to_document()))
    }

    fn grid_of(&self, part: &PartId) -> WorkbenchResult<GridName> {
        self.parts
            .get(part)
            .map(|part| part.grid.clone())
            .ok_or_else(|| missing_part(part))
    }

    fn is_grid_root(&self, part: &Part) -> bool {
        self.grids
            .get(&part.grid)
            .is_some_and(|grid| grid.root == GridElement::Part(part.id.clone()))
    }

    fn first_part(&self, element: &GridElement) -> Option<PartId> {
        let mut current = element;
        loop {
            match current {
                GridElement::Part(id) => return Some(id.clone()),
                GridElement::Node(id) => current = &self.nodes.get(id)?.child1,
            }
        }
    }

    fn activity_of_grid(&self, grid: &GridName) -> Option<&Activity> {
        match grid {
            GridName::Activity(id) => self.activities.get(id),
            GridName::Main | GridName::MainArea => None,
        }
    }

    /// Resolve `part.main-area` to the active part of the main-area grid.
    fn resolve_view_host(&self, part: &PartId) -> WorkbenchResult<PartId> {
        if part.is_main_area()
            && let Some(grid) = self.grids.get(&GridName::MainArea)
        {
            return grid.active_part.clone().ok_or_else(|| {
                WorkbenchError::illegal_state("main area grid has no active part")
            });
        }
        if self.parts.contains_key(part) {
            Ok(part.clone())
        } else {
            Err(missing_part(part))
        }
    }
}

// =========================================================================
// Transitions
// =========================================================================

impl WorkbenchLayout {
    fn transition(
        &self,
        op: impl FnOnce(&mut Self) -> WorkbenchResult<()>,
    ) -> WorkbenchResult<Self> {
        let mut working = self.clone();
        op(&mut working)?;
        working.validate()?;
        Ok(working)
    }

    /// Add a part to the main grid or next to an existing part.
    pub fn add_part(
        &self,
        id: PartId,
        location: PartLocation,
        metadata: PartMetadata,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| layout.add_part_in_place(id, location, metadata))
    }

    /// Add a part docked into the toolbar of `docking`.
    pub fn add_docked_part(
        &self,
        id: PartId,
        docking: DockingArea,
        activity: ActivityMetadata,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            layout.ensure_new_part(&id)?;
            if id.is_main_area() {
                return Err(WorkbenchError::illegal_state(
                    "the main area part cannot be docked",
                ));
            }
            let _ = layout.parts.insert(
                id.clone(),
                Part {
                    id: id.clone(),
                    grid: GridName::Main,
                    parent: None,
                    views: Vec::new(),
                    active_view: None,
                    navigation: None,
                    title: Some(activity.label.clone()),
                    css_classes: Vec::new(),
                    structural: true,
                },
            );
            layout.attach_activity(&id, docking, activity)
        })
    }

    pub fn add_view(&self, id: ViewId, options: ViewOptions) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            if layout.views.contains_key(&id) {
                return Err(WorkbenchError::illegal_state(format!(
                    "view '{id}' already exists"
                )));
            }
            let host = layout.resolve_view_host(&options.part_id)?;
            let _ = layout
                .views
                .insert(id.clone(), View::new(id.clone(), host.clone(), options.css_classes));
            layout.insert_view(
                &id,
                &host,
                options.position,
                options.activate_view,
                options.activate_part,
            )
        })
    }

    pub fn remove_part(&self, id: &PartId) -> WorkbenchResult<Self> {
        self.transition(|layout| layout.remove_part_in_place(id))
    }

    pub fn remove_view(&self, id: &ViewId) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let part = layout.detach_view(id)?;
            let _ = layout.views.remove(id);
            layout.discard_if_orphaned(&part)
        })
    }

    /// Re-parent a view. Its id never changes.
    pub fn move_view(
        &self,
        id: &ViewId,
        target: MoveTarget,
        options: MoveViewOptions,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            if !layout.views.contains_key(id) {
                return Err(WorkbenchError::illegal_state(format!(
                    "view '{id}' does not exist"
                )));
            }
            let destination = match target {
                MoveTarget::Part { id: part } => layout.resolve_view_host(&part)?,
                MoveTarget::NewPart {
                    id: part,
                    relative_to,
                    align,
                    ratio,
                } => {
                    let position = RelativePosition {
                        relative_to: Some(relative_to),
                        align,
                        ratio,
                    };
                    let metadata = PartMetadata {
                        structural: false,
                        ..PartMetadata::default()
                    };
                    layout.add_part_in_place(
                        part.clone(),
                        PartLocation::Relative(position),
                        metadata,
                    )?;
                    part
                }
            };
            let source = layout.detach_view(id)?;
            if let Some(view) = layout.views.get_mut(id) {
                view.part = destination.clone();
            }
            layout.insert_view(
                id,
                &destination,
                options.position,
                options.activate_view,
                options.activate_part,
            )?;
            if source != destination {
                layout.discard_if_orphaned(&source)?;
            }
            Ok(())
        })
    }

    /// Replace the navigation of a part.
    ///
    /// Empty `segments` without hint or capability un-navigate the part.
    pub fn navigate_part(
        &self,
        id: &PartId,
        segments: Vec<String>,
        options: NavigateOptions,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let part = layout.parts.get_mut(id).ok_or_else(|| missing_part(id))?;
            part.navigation = options.into_descriptor(segments);
            Ok(())
        })
    }

    /// Replace the navigation of a view.
    ///
    /// A fresh (non-self) navigation makes the view pristine again.
    pub fn navigate_view(
        &self,
        id: &ViewId,
        segments: Vec<String>,
        options: NavigateOptions,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let view = layout
                .views
                .get_mut(id)
                .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
            let next = options.into_descriptor(segments);
            let self_navigation = next
                .as_ref()
                .is_some_and(|next| is_self_navigation(view.navigation.as_ref(), next));
            if !self_navigation {
                view.dirty = false;
            }
            view.navigation = next;
            Ok(())
        })
    }

    /// Move a part out of its grid into the toolbar of `docking`.
    pub fn dock_part(
        &self,
        id: &PartId,
        docking: DockingArea,
        activity: ActivityMetadata,
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let part = layout.parts.get(id).ok_or_else(|| missing_part(id))?;
            if part.is_docked() {
                return Err(WorkbenchError::illegal_state(format!(
                    "part '{id}' is already docked"
                )));
            }
            if id.is_main_area() {
                return Err(WorkbenchError::illegal_state(
                    "the main area part cannot be docked",
                ));
            }
            if layout.is_grid_root(part) {
                return Err(WorkbenchError::illegal_state(format!(
                    "part '{id}' is the last part of grid '{}'",
                    part.grid
                )));
            }
            let grid = part.grid.clone();
            layout.detach_part(&grid, id)?;
            layout.attach_activity(id, docking, activity)
        })
    }

    /// Move a docked part back into a grid.
    pub fn undock_part(&self, id: &PartId, position: RelativePosition) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let part = layout.parts.get(id).ok_or_else(|| missing_part(id))?;
            let GridName::Activity(activity) = part.grid.clone() else {
                return Err(WorkbenchError::illegal_state(format!(
                    "part '{id}' is not docked"
                )));
            };
            if !layout.is_grid_root(part) {
                return Err(WorkbenchError::illegal_state(format!(
                    "activity '{activity}' contains more than part '{id}'"
                )));
            }
            layout.drop_activity_entry(&activity);
            let _ = layout.grids.remove(&GridName::Activity(activity));
            layout.place_part(id, &position)
        })
    }

    /// Make `id` the active part of its grid; opens a docked part's activity.
    pub fn activate_part(&self, id: &PartId) -> WorkbenchResult<Self> {
        self.transition(|layout| layout.activate_part_in_place(id))
    }

    /// Make `id` the active view of its part and activate that part.
    pub fn activate_view(&self, id: &ViewId) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let view = layout
                .views
                .get(id)
                .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
            let part_id = view.part.clone();
            let part = layout
                .parts
                .get_mut(&part_id)
                .ok_or_else(|| missing_part(&part_id))?;
            part.active_view = Some(id.clone());
            layout.activate_part_in_place(&part_id)
        })
    }

    /// Open an activity.
    pub fn activate_activity(&self, id: &ActivityId) -> WorkbenchResult<Self> {
        let activity = self.activities.get(id).ok_or_else(|| {
            WorkbenchError::illegal_state(format!("activity '{id}' does not exist"))
        })?;
        self.activate_part(&activity.part)
    }

    /// Close (detach) an activity without removing it.
    pub fn minimize_activity(&self, id: &ActivityId) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let docking = layout
                .activities
                .get(id)
                .map(|activity| activity.docking)
                .ok_or_else(|| {
                    WorkbenchError::illegal_state(format!("activity '{id}' does not exist"))
                })?;
            if let Some(toolbar) = layout.toolbars.get_mut(&docking)
                && toolbar.active.as_ref() == Some(id)
            {
                toolbar.active = None;
            }
            Ok(())
        })
    }

    /// Mark every reference to `capability_id` as unresolved.
    ///
    /// Elements stay in the layout and render a "not found" state.
    pub fn invalidate_capability(&self, capability_id: &str) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            layout.for_each_navigation(|navigation| {
                if let Some(capability) = navigation.capability.as_mut()
                    && capability.capability_id == capability_id
                {
                    capability.resolved = false;
                }
            });
            Ok(())
        })
    }

    // -- presentation setters ------------------------------------------------

    fn update_view(
        &self,
        id: &ViewId,
        update: impl FnOnce(&mut View),
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let view = layout
                .views
                .get_mut(id)
                .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
            update(view);
            Ok(())
        })
    }

    fn update_part(
        &self,
        id: &PartId,
        update: impl FnOnce(&mut Part),
    ) -> WorkbenchResult<Self> {
        self.transition(|layout| {
            let part = layout.parts.get_mut(id).ok_or_else(|| missing_part(id))?;
            update(part);
            Ok(())
        })
    }

    pub fn set_view_title(&self, id: &ViewId, title: Option<String>) -> WorkbenchResult<Self> {
        self.update_view(id, |view| view.title = title)
    }

    pub fn set_view_heading(&self, id: &ViewId, heading: Option<String>) -> WorkbenchResult<Self> {
        self.update_view(id, |view| view.heading = heading)
    }

    pub fn set_view_dirty(&self, id: &ViewId, dirty: bool) -> WorkbenchResult<Self> {
        self.update_view(id, |view| view.dirty = dirty)
    }

    pub fn set_view_closable(&self, id: &ViewId, closable: bool) -> WorkbenchResult<Self> {
        self.update_view(id, |view| view.closable = closable)
    }

    pub fn set_view_css_classes(
        &self,
        id: &ViewId,
        css_classes: Vec<String>,
    ) -> WorkbenchResult<Self> {
        self.update_view(id, |view| view.css_classes = css_classes)
    }

    pub fn set_part_title(&self, id: &PartId, title: Option<String>) -> WorkbenchResult<Self> {
        self.update_part(id, |part| part.title = title)
    }

    pub fn set_part_css_classes(
        &self,
        id: &PartId,
        css_classes: Vec<String>,
    ) -> WorkbenchResult<Self> {
        self.update_part(id, |part| part.css_classes = css_classes)
    }
}

// =========================================================================
// In-place helpers (working copies only)
// =========================================================================

impl WorkbenchLayout {
    fn for_each_navigation(&mut self, mut update: impl FnMut(&mut NavigationDescriptor)) {
        let parts: Vec<PartId> = self
            .parts
            .values()
            .filter(|part| part.navigation.is_some())
            .map(|part| part.id.clone())
            .collect();
        for id in parts {
            if let Some(navigation) = self.parts.get_mut(&id).and_then(|part| part.navigation.as_mut()) {
                update(navigation);
            }
        }
        let views: Vec<ViewId> = self
            .views
            .values()
            .filter(|view| view.navigation.is_some())
            .map(|view| view.id.clone())
            .collect();
        for id in views {
            if let Some(navigation) = self.views.get_mut(&id).and_then(|view| view.navigation.as_mut()) {
                update(navigation);
            }
        }
    }

    fn ensure_new_part(&self, id: &PartId) -> WorkbenchResult<()> {
        if self.parts.contains_key(id) {
            return Err(WorkbenchError::illegal_state(format!(
                "part '{id}' already exists"
            )));
        }
        Ok(())
    }

    fn allocate_node_id(&mut self) -> WorkbenchResult<NodeId> {
        let id = self.next_node_id;
        self.next_node_id = id.checked_next()?;
        Ok(id)
    }

    fn add_part_in_place(
        &mut self,
        id: PartId,
        location: PartLocation,
        metadata: PartMetadata,
    ) -> WorkbenchResult<()> {
        self.ensure_new_part(&id)?;
        let structural = metadata.structural || id.is_main_area();
        let _ = self.parts.insert(
            id.clone(),
            Part {
                id: id.clone(),
                grid: GridName::Main,
                parent: None,
                views: Vec::new(),
                active_view: None,
                navigation: None,
                title: metadata.title,
                css_classes: metadata.css_classes,
                structural,
            },
        );

        match location {
            PartLocation::Root => {
                if self.grids.contains_key(&GridName::Main) {
                    return Err(WorkbenchError::illegal_state(format!(
                        "cannot add '{id}' as root: the main grid already has parts"
                    )));
                }
                let _ = self.grids.insert(
                    GridName::Main,
                    Grid {
                        root: GridElement::Part(id.clone()),
                        active_part: Some(id.clone()),
                    },
                );
            }
            PartLocation::Relative(position) => self.place_part(&id, &position)?,
        }

        if id.is_main_area() {
            if self.grid_of(&id)? != GridName::Main {
                return Err(WorkbenchError::illegal_state(
                    "the main area part must be placed in the main grid",
                ));
            }
            self.create_main_area_grid()?;
        }
        if metadata.activate {
            self.activate_part_in_place(&id)?;
        }
        Ok(())
    }

    fn create_main_area_grid(&mut self) -> WorkbenchResult<()> {
        let initial = PartId::main_area_initial();
        self.ensure_new_part(&initial)?;
        let _ = self.parts.insert(
            initial.clone(),
            Part {
                id: initial.clone(),
                grid: GridName::MainArea,
                parent: None,
                views: Vec::new(),
                active_view: None,
                navigation: None,
                title: None,
                css_classes: Vec::new(),
                structural: true,
            },
        );
        let _ = self.grids.insert(
            GridName::MainArea,
            Grid {
                root: GridElement::Part(initial.clone()),
                active_part: Some(initial),
            },
        );
        Ok(())
    }

    /// Insert the (already recorded, unattached) part `id` next to its
    /// reference element.
    fn place_part(&mut self, id: &PartId, position: &RelativePosition) -> WorkbenchResult<()> {
        let ratio = SplitRatio::new(position.ratio.unwrap_or(DEFAULT_RATIO))?;
        let (grid, reference) = match &position.relative_to {
            Some(reference) => {
                let grid = self.grid_of(reference)?;
                (grid, GridElement::Part(reference.clone()))
            }
            None => {
                let grid = self
                    .grids
                    .get(&GridName::Main)
                    .ok_or_else(|| missing_grid(&GridName::Main))?;
                (GridName::Main, grid.root.clone())
            }
        };
        if let Some(part) = self.parts.get_mut(id) {
            part.grid = grid.clone();
        }
        self.split_element(&grid, &reference, id, position.align, ratio)?;
        if let Some(grid) = self.grids.get_mut(&grid)
            && grid.active_part.is_none()
        {
            grid.active_part = Some(id.clone());
        }
        Ok(())
    }

    fn parent_of(&self, element: &GridElement) -> WorkbenchResult<Option<NodeId>> {
        match element {
            GridElement::Part(id) => self
                .parts
                .get(id)
                .map(|part| part.parent)
                .ok_or_else(|| missing_part(id)),
            GridElement::Node(id) => self
                .nodes
                .get(id)
                .map(|node| node.parent)
                .ok_or_else(|| missing_node(*id)),
        }
    }

    fn set_parent(&mut self, element: &GridElement, parent: Option<NodeId>) -> WorkbenchResult<()> {
        match element {
            GridElement::Part(id) => {
                self.parts.get_mut(id).ok_or_else(|| missing_part(id))?.parent = parent;
            }
            GridElement::Node(id) => {
                self.nodes.get_mut(id).ok_or_else(|| missing_node(*id))?.parent = parent;
            }
        }
        Ok(())
    }

    /// Put `new` where `old` sits: in `parent`, or at the grid root.
    fn replace_child(
        &mut self,
        grid: &GridName,
        parent: Option<NodeId>,
        old: &GridElement,
        new: GridElement,
    ) -> WorkbenchResult<()> {
        let Some(parent_id) = parent else {
            let grid = self.grids.get_mut(grid).ok_or_else(|| missing_grid(grid))?;
            grid.root = new;
            return Ok(());
        };
        let node = self
            .nodes
            .get_mut(&parent_id)
            .ok_or_else(|| missing_node(parent_id))?;
        if node.child1 == *old {
            node.child1 = new;
        } else if node.child2 == *old {
            node.child2 = new;
        } else {
            return Err(WorkbenchError::illegal_state(format!(
                "'{parent_id}' is not the parent of {old:?}"
            )));
        }
        Ok(())
    }

    fn split_element(
        &mut self,
        grid: &GridName,
        reference: &GridElement,
        incoming: &PartId,
        align: Align,
        ratio: SplitRatio,
    ) -> WorkbenchResult<()> {
        let parent = self.parent_of(reference)?;
        let node_id = self.allocate_node_id()?;
        let incoming_element = GridElement::Part(incoming.clone());
        let (child1, child2, ratio) = if align.incoming_first() {
            (incoming_element.clone(), reference.clone(), ratio)
        } else {
            (reference.clone(), incoming_element.clone(), ratio.complement())
        };
        let _ = self.nodes.insert(
            node_id,
            TreeNode {
                id: node_id,
                grid: grid.clone(),
                parent,
                direction: align.direction(),
                ratio,
                child1,
                child2,
            },
        );
        self.replace_child(grid, parent, reference, GridElement::Node(node_id))?;
        self.set_parent(reference, Some(node_id))?;
        self.set_parent(&incoming_element, Some(node_id))?;
        tracing::trace!(node = %node_id, grid = %grid, part = %incoming, "split grid element");
        Ok(())
    }

    /// Take a non-root part out of its grid, promoting its sibling.
    fn detach_part(&mut self, grid: &GridName, id: &PartId) -> WorkbenchResult<()> {
        let element = GridElement::Part(id.clone());
        let parent_id = self.parent_of(&element)?.ok_or_else(|| {
            WorkbenchError::illegal_state(format!("part '{id}' is the last part of grid '{grid}'"))
        })?;
        let parent = self
            .nodes
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| missing_node(parent_id))?;
        let sibling = if parent.child1 == element {
            parent.child2
        } else if parent.child2 == element {
            parent.child1
        } else {
            return Err(WorkbenchError::illegal_state(format!(
                "'{parent_id}' is not the parent of part '{id}'"
            )));
        };
        self.replace_child(grid, parent.parent, &GridElement::Node(parent_id), sibling.clone())?;
        self.set_parent(&sibling, parent.parent)?;
        let _ = self.nodes.remove(&parent_id);
        self.set_parent(&element, None)?;

        let replacement = self.first_part(&sibling);
        if let Some(grid_state) = self.grids.get_mut(grid)
            && grid_state.active_part.as_ref() == Some(id)
        {
            grid_state.active_part = replacement.clone();
        }
        if let GridName::Activity(activity) = grid
            && let Some(activity) = self.activities.get_mut(activity)
            && activity.part == *id
            && let Some(replacement) = replacement
        {
            activity.part = replacement;
        }
        Ok(())
    }

    fn attach_activity(
        &mut self,
        id: &PartId,
        docking: DockingArea,
        metadata: ActivityMetadata,
    ) -> WorkbenchResult<()> {
        let activity_id = metadata.id.clone().unwrap_or_else(compute_activity_id);
        if self.activities.contains_key(&activity_id) {
            return Err(WorkbenchError::illegal_state(format!(
                "activity '{activity_id}' already exists"
            )));
        }
        let grid = GridName::Activity(activity_id.clone());
        let part = self.parts.get_mut(id).ok_or_else(|| missing_part(id))?;
        part.grid = grid.clone();
        part.parent = None;
        let _ = self.grids.insert(
            grid,
            Grid {
                root: GridElement::Part(id.clone()),
                active_part: Some(id.clone()),
            },
        );
        let _ = self.activities.insert(
            activity_id.clone(),
            Activity {
                id: activity_id.clone(),
                part: id.clone(),
                docking,
                label: metadata.label,
                icon: metadata.icon,
                tooltip: metadata.tooltip,
                css_classes: metadata.css_classes,
            },
        );
        let mut toolbar = self.toolbars.get(&docking).cloned().unwrap_or_default();
        toolbar.activities.push(activity_id.clone());
        if metadata.activate {
            toolbar.active = Some(activity_id);
        }
        let _ = self.toolbars.insert(docking, toolbar);
        Ok(())
    }

    fn drop_activity_entry(&mut self, id: &ActivityId) {
        let Some(activity) = self.activities.remove(id) else {
            return;
        };
        let now_empty = match self.toolbars.get_mut(&activity.docking) {
            Some(toolbar) => {
                toolbar.activities.retain(|candidate| candidate != id);
                if toolbar.active.as_ref() == Some(id) {
                    toolbar.active = None;
                }
                toolbar.activities.is_empty()
            }
            None => false,
        };
        if now_empty {
            let _ = self.toolbars.remove(&activity.docking);
        }
    }

    /// Remove a grid with every node, part and view it holds.
    fn purge_grid(&mut self, name: &GridName) {
        let parts: Vec<PartId> = self
            .parts
            .values()
            .filter(|part| part.grid == *name)
            .map(|part| part.id.clone())
            .collect();
        for id in parts {
            if let Some(part) = self.parts.remove(&id) {
                for view in part.views {
                    let _ = self.views.remove(&view);
                }
            }
        }
        let nodes: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.grid == *name)
            .map(|node| node.id)
            .collect();
        for id in nodes {
            let _ = self.nodes.remove(&id);
        }
        let _ = self.grids.remove(name);
    }

    fn remove_part_in_place(&mut self, id: &PartId) -> WorkbenchResult<()> {
        let part = self.parts.get(id).ok_or_else(|| missing_part(id))?;
        let grid = part.grid.clone();

        if self.is_grid_root(part) {
            if let GridName::Activity(activity) = &grid {
                let activity = activity.clone();
                self.drop_activity_entry(&activity);
                self.purge_grid(&grid);
                return Ok(());
            }
            return Err(WorkbenchError::illegal_state(format!(
                "part '{id}' is the last part of grid '{grid}'"
            )));
        }

        if id.is_main_area() {
            self.purge_grid(&GridName::MainArea);
        }
        self.detach_part(&grid, id)?;
        if let Some(part) = self.parts.remove(id) {
            for view in part.views {
                let _ = self.views.remove(&view);
            }
        }
        tracing::debug!(part = %id, grid = %grid, "removed part");
        Ok(())
    }

    /// Unlink a view from its part, choosing a replacement active view.
    /// Returns the former owner.
    fn detach_view(&mut self, id: &ViewId) -> WorkbenchResult<PartId> {
        let part_id = self
            .views
            .get(id)
            .map(|view| view.part.clone())
            .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
        let part = self
            .parts
            .get_mut(&part_id)
            .ok_or_else(|| missing_part(&part_id))?;
        let Some(index) = part.view_index(id) else {
            return Err(WorkbenchError::illegal_state(format!(
                "view '{id}' is not listed in part '{part_id}'"
            )));
        };
        let _ = part.views.remove(index);
        if part.active_view.as_ref() == Some(id) {
            part.active_view = part
                .views
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|left| part.views.get(left)))
                .cloned();
        }
        Ok(part_id)
    }

    fn insert_view(
        &mut self,
        id: &ViewId,
        part_id: &PartId,
        position: crate::model::ViewPosition,
        activate_view: bool,
        activate_part: bool,
    ) -> WorkbenchResult<()> {
        let part = self
            .parts
            .get_mut(part_id)
            .ok_or_else(|| missing_part(part_id))?;
        let active_index = part
            .active_view
            .as_ref()
            .and_then(|active| part.view_index(active));
        let index = position.resolve(part.views.len(), active_index);
        part.views.insert(index, id.clone());
        if activate_view || part.active_view.is_none() {
            part.active_view = Some(id.clone());
        }
        if activate_part {
            self.activate_part_in_place(part_id)?;
        }
        Ok(())
    }

    /// Remove a non-structural part that lost its last view, unless it is
    /// navigated or the last part of its grid.
    fn discard_if_orphaned(&mut self, id: &PartId) -> WorkbenchResult<()> {
        let Some(part) = self.parts.get(id) else {
            return Ok(());
        };
        if part.structural
            || !part.views.is_empty()
            || part.is_navigated()
            || self.is_grid_root(part)
        {
            return Ok(());
        }
        self.remove_part_in_place(id)
    }

    fn activate_part_in_place(&mut self, id: &PartId) -> WorkbenchResult<()> {
        let grid_name = self.grid_of(id)?;
        let grid = self
            .grids
            .get_mut(&grid_name)
            .ok_or_else(|| missing_grid(&grid_name))?;
        grid.active_part = Some(id.clone());
        if let Some(activity) = self.activity_of_grid(&grid_name) {
            let (activity_id, docking) = (activity.id.clone(), activity.docking);
            if let Some(toolbar) = self.toolbars.get_mut(&docking) {
                toolbar.active = Some(activity_id);
            }
        }
        Ok(())
    }
}

// =========================================================================
// Validation
// =========================================================================

impl WorkbenchLayout {
    /// Check every structural invariant.
    pub fn validate(&self) -> WorkbenchResult<()> {
        let invalid = |message: String| Err(WorkbenchError::illegal_state(message));
        let mut seen_nodes = 0usize;
        let mut seen_parts = 0usize;

        for (name, grid) in &self.grids {
            let mut stack = vec![(grid.root.clone(), None::<NodeId>)];
            let mut visited_nodes = std::collections::BTreeSet::new();
            let mut grid_parts = std::collections::BTreeSet::new();
            while let Some((element, expected_parent)) = stack.pop() {
                match element {
                    GridElement::Node(id) => {
                        let Some(node) = self.nodes.get(&id) else {
                            return invalid(format!("grid '{name}' references missing '{id}'"));
                        };
                        if !visited_nodes.insert(id) {
                            return invalid(format!("'{id}' is reachable twice in grid '{name}'"));
                        }
                        if node.parent != expected_parent || node.grid != *name {
                            return invalid(format!("'{id}' has inconsistent parent or grid"));
                        }
                        let ratio = node.ratio.get();
                        if !(ratio > 0.0 && ratio < 1.0) {
                            return invalid(format!("'{id}' has ratio {ratio} outside (0, 1)"));
                        }
                        stack.push((node.child2.clone(), Some(id)));
                        stack.push((node.child1.clone(), Some(id)));
                    }
                    GridElement::Part(id) => {
                        let Some(part) = self.parts.get(&id) else {
                            return invalid(format!("grid '{name}' references missing part '{id}'"));
                        };
                        if part.parent != expected_parent || part.grid != *name {
                            return invalid(format!("part '{id}' has inconsistent parent or grid"));
                        }
                        if !grid_parts.insert(id.clone()) {
                            return invalid(format!("part '{id}' is reachable twice"));
                        }
                    }
                }
            }
            if let Some(active) = &grid.active_part
                && !grid_parts.contains(active)
            {
                return invalid(format!(
                    "active part '{active}' is not in grid '{name}'"
                ));
            }
            seen_nodes += visited_nodes.len();
            seen_parts += grid_parts.len();
        }
        if seen_nodes != self.nodes.len() {
            return invalid("unreachable tree nodes".to_string());
        }
        if seen_parts != self.parts.len() {
            return invalid("parts outside of every grid".to_string());
        }
        if let Some((max, _)) = self.nodes.get_max()
            && *max >= self.next_node_id
        {
            return invalid(format!("next node id {} is already in use", self.next_node_id));
        }

        let mut listed_views = 0usize;
        for part in self.parts.values() {
            let unique: std::collections::BTreeSet<&ViewId> = part.views.iter().collect();
            if unique.len() != part.views.len() {
                return invalid(format!("part '{}' lists a view twice", part.id));
            }
            for view in &part.views {
                match self.views.get(view) {
                    Some(record) if record.part == part.id => {}
                    _ => return invalid(format!("view '{view}' is not owned by '{}'", part.id)),
                }
            }
            if let Some(active) = &part.active_view
                && !part.views.contains(active)
            {
                return invalid(format!(
                    "active view '{active}' is not a view of part '{}'",
                    part.id
                ));
            }
            listed_views += part.views.len();
        }
        if listed_views != self.views.len() {
            return invalid("views without owning part".to_string());
        }

        let main_area = PartId::main_area();
        let main_area_in_main = self
            .parts
            .get(&main_area)
            .is_some_and(|part| part.grid == GridName::Main);
        if self.parts.contains_key(&main_area) && !main_area_in_main {
            return invalid(format!("'{MAIN_AREA}' must be part of the main grid"));
        }
        if main_area_in_main != self.grids.contains_key(&GridName::MainArea) {
            return invalid("main area grid and main area part must coexist".to_string());
        }

        let mut toolbar_entries = 0usize;
        for (area, toolbar) in &self.toolbars {
            for activity in &toolbar.activities {
                match self.activities.get(activity) {
                    Some(record) if record.docking == *area => {}
                    _ => return invalid(format!("toolbar {area:?} lists unknown '{activity}'")),
                }
            }
            if let Some(active) = &toolbar.active
                && !toolbar.activities.contains(active)
            {
                return invalid(format!("active activity '{active}' is not in its toolbar"));
            }
            toolbar_entries += toolbar.activities.len();
        }
        if toolbar_entries != self.activities.len() {
            return invalid("activities missing from toolbars".to_string());
        }
        for activity in self.activities.values() {
            let grid = GridName::Activity(activity.id.clone());
            if !self.grids.contains_key(&grid) {
                return invalid(format!("activity '{}' has no grid", activity.id));
            }
            if self.parts.get(&activity.part).map(|part| &part.grid) != Some(&grid) {
                return invalid(format!("activity '{}' lost its part", activity.id));
            }
        }
        for name in self.grids.keys() {
            if let GridName::Activity(id) = name
                && !self.activities.contains_key(id)
            {
                return invalid(format!("grid '{name}' has no activity"));
            }
        }
        Ok(())
    }
}
