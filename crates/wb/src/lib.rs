#![forbid(unsafe_code)]

//! Workbench layout core public facade.
//!
//! Re-exports the common types of the internal crates and offers a prelude
//! for day-to-day usage.
//!
//! # Example
//! ```
//! use wb::prelude::*;
//!
//! let layout = WorkbenchLayout::new()
//!     .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
//!     .unwrap();
//! let mut runtime = LayoutRuntime::in_memory(layout).unwrap();
//! let receipt = runtime
//!     .navigate(|layout| {
//!         layout.add_view(ViewId::parse("view.1")?, ViewOptions::in_part(PartId::main_area()))
//!     })
//!     .unwrap();
//! assert_eq!(receipt.transition, 1);
//! assert!(runtime.history().can_go_back());
//! ```

// --- Core re-exports -------------------------------------------------------

pub use wb_core::{
    ActivityId, DialogId, ElementKind, ErrorKind, MAIN_AREA, MAIN_AREA_INITIAL_PART_ID,
    NavigableId, NavigationData, NavigationState, NotificationId, ParamMap, PartId, PopupId,
    Qualifier, ViewId, WorkbenchError, WorkbenchResult,
};

// --- Layout re-exports -----------------------------------------------------

pub use wb_layout::{
    ActivityMetadata, Align, CapabilityRef, DockingArea, GridName, LayoutOperation,
    LayoutTransaction, MicrofrontendHostOutlet, MoveTarget, MoveViewOptions, NavigateOptions,
    NavigationDescriptor, NavigationStatus, PartLocation, PartMetadata, RelativePosition, UrlTree,
    ViewOptions, ViewPosition, WorkbenchLayout,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use wb_runtime::{
    BrowserHistory, Capability, CapabilityProperties, CapabilityRegistration, CapabilityRegistry,
    CapabilityResolver, CapabilityType, CommitReceipt, DialogOptions, FileStorage, GuardVerdict,
    LayoutRuntime, MemoryStorage, NotificationConfig, PartNavigationOptions,
    PerspectiveDefinition, PopupOptions, StorageBackend, ViewNavigationOptions, ViewTarget,
    WorkbenchConfig,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ErrorKind, NavigableId, ParamMap, PartId, PartLocation, PartMetadata, Qualifier, ViewId,
        ViewOptions, WorkbenchError, WorkbenchLayout, WorkbenchResult,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        Capability, CapabilityRegistration, CapabilityType, LayoutRuntime, ViewNavigationOptions,
        ViewTarget, WorkbenchConfig,
    };

    pub use crate::{core, layout};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use wb_core as core;
pub use wb_layout as layout;
#[cfg(feature = "runtime")]
pub use wb_runtime as runtime;
