#![forbid(unsafe_code)]

//! Core vocabulary shared by the workbench layout and runtime crates.
//!
//! - [`id`]: prefixed element identifiers (`part.*`, `view.*`, ...).
//! - [`qualifier`]: qualifier maps and wildcard matching.
//! - [`error`]: the error taxonomy every mutating operation reports through.

pub mod error;
pub mod id;
pub mod qualifier;

pub use error::{ErrorKind, WorkbenchError, WorkbenchResult};
pub use id::{
    ActivityId, DialogId, ElementKind, MAIN_AREA, MAIN_AREA_INITIAL_PART_ID, NavigableId,
    NotificationId, PartId, PopupId, ViewId, classify, compute_activity_id, compute_dialog_id,
    compute_notification_id, compute_part_id, compute_popup_id, compute_view_id, is_activity_id,
    is_dialog_id, is_notification_id, is_part_id, is_popup_id, is_view_id,
};
pub use qualifier::{
    ANY_VALUE, NavigationData, NavigationState, OPTIONAL_VALUE, ParamMap, Qualifier, matches_required,
    value_matches,
};
