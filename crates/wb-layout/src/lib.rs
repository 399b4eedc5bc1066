#![forbid(unsafe_code)]

//! Workbench layout model.
//!
//! A [`WorkbenchLayout`] is an immutable value: grids of parts and views,
//! tree nodes splitting them, and activity toolbars. Builder calls return a
//! new layout and leave the receiver untouched, so callers can chain several
//! calls and commit the result as one transition.
//!
//! # Example
//! ```
//! use wb_core::{PartId, ViewId};
//! use wb_layout::{Align, PartLocation, PartMetadata, RelativePosition, ViewOptions, WorkbenchLayout};
//!
//! let left = PartId::parse("part.left").unwrap();
//! let layout = WorkbenchLayout::new()
//!     .add_part(left.clone(), PartLocation::Root, PartMetadata::default())
//!     .unwrap()
//!     .add_part(
//!         PartId::parse("part.right").unwrap(),
//!         PartLocation::Relative(RelativePosition::new(Align::Right)),
//!         PartMetadata::default(),
//!     )
//!     .unwrap()
//!     .add_view(ViewId::parse("view.1").unwrap(), ViewOptions::in_part(left.clone()))
//!     .unwrap();
//!
//! assert_eq!(layout.active_view(Some(&left)).unwrap().id.as_str(), "view.1");
//! ```

pub mod layout;
pub mod model;
pub mod navigation;
pub mod operation;
pub mod outlet;
pub mod persist;

pub use layout::WorkbenchLayout;
pub use model::{
    Activity, ActivityMetadata, Align, DEFAULT_RATIO, DockingArea, Grid, GridElement, GridName,
    MoveTarget, MoveViewOptions, NodeId, Part, PartLocation, PartMetadata, RelativePosition,
    SplitDirection, SplitRatio, Toolbar, TreeNode, View, ViewOptions, ViewPosition,
};
pub use navigation::{
    CapabilityRef, NavigateOptions, NavigationDescriptor, NavigationStatus, NavigationTarget,
    is_self_navigation,
};
pub use operation::{
    JournalEntry, JournalResult, LayoutOperation, LayoutOperationKind, LayoutTransaction,
    TransactionOutcome, apply_all,
};
pub use outlet::{
    MAIN_AREA_QUERY_PARAM, MICROFRONTEND_HOST_OUTLET_PREFIX, MicrofrontendHostOutlet, OutletEntry,
    UrlTree,
};
pub use persist::{
    ActivityDocument, GridDocument, LAYOUT_SCHEMA_VERSION, LayoutDocument, MigrationResult,
    PartDocument, ToolbarDocument, TreeDocument, ViewDocument, document_hash, migrate_document,
};
