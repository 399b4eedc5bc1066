#![forbid(unsafe_code)]

//! Workbench runtime.
//!
//! Ties the layout model to capability resolution, browser history and
//! persistence.
//!
//! # Key Components
//!
//! - [`LayoutRuntime`] - the context object every layout transition runs through
//! - [`CapabilityRegistry`] - capability and intention registry behind [`CapabilityResolver`]
//! - [`BrowserHistory`] - back/forward stack of committed layouts
//! - [`PerspectiveRegistry`] - named layouts with per-perspective storage
//! - [`DialogRegistry`] / [`NotificationRegistry`] - overlays outside the layout tree
//! - [`NavigationSequencer`] - discards results of superseded navigations
//! - [`WorkbenchConfig`] - TOML/JSON configuration
//!
//! # How it fits
//! `wb-core` names things, `wb-layout` describes a layout as a value, and
//! this crate decides which value is current.

pub mod capability;
pub mod config;
pub mod dialog;
pub mod engine;
pub mod executor;
pub mod guard;
pub mod history;
pub mod notification;
pub mod observable;
pub mod perspective;
pub mod sequencer;
pub mod storage;

pub use capability::{
    Capability, CapabilityMetadata, CapabilityProperties, CapabilityRegistration,
    CapabilityRegistry, CapabilityResolver, CapabilityType, ElementSize, Intention, ParamSpec,
    validate_params,
};
pub use config::{
    ConfigError, DEFAULT_HISTORY_DEPTH, HistoryConfig, LAYOUT_KEY, MicrofrontendConfig,
    PERSPECTIVE_KEY, PERSPECTIVE_LAYOUT_PREFIX, StorageConfig, WorkbenchConfig,
};
pub use dialog::{DialogClosed, DialogHandle, DialogKind, DialogRegistry, Modality, PopupHandle};
pub use engine::{
    CapabilityRequest, CommitReceipt, DialogOptions, LayoutRuntime, PartNavigationOptions,
    PopupOptions, ResolutionOutcome, ViewNavigation, ViewNavigationOptions, ViewTarget,
};
pub use executor::SerialExecutor;
pub use guard::{GuardVerdict, RouteGuard};
pub use history::{BrowserHistory, HistoryEntry};
pub use notification::{
    DisplayDuration, GroupReducer, Notification, NotificationConfig, NotificationRegistry,
    Severity,
};
pub use observable::{Derived, Observable, Subscription};
pub use perspective::{PerspectiveDefinition, PerspectiveRegistry, PerspectiveSwitch};
pub use sequencer::{CancellationSource, CancellationToken, NavigationSequencer, NavigationTicket};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
