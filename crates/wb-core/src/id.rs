//! Prefixed element identifiers.
//!
//! Every workbench element is addressed by an opaque string whose prefix
//! names its kind: `part.`, `view.`, `dialog.`, `popup.`, `notification.` or
//! `activity.`. The prefix alone classifies an identifier; the suffix carries
//! no meaning beyond uniqueness.
//!
//! Identifiers are assigned once and never change, even when the element is
//! moved to another part or docked and undocked.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkbenchError;

/// Number of hex characters in a generated identifier suffix.
pub const RANDOM_SUFFIX_LEN: usize = 8;

/// Id of the main area part, the part that hosts the nested main-area grid.
pub const MAIN_AREA: &str = "part.main-area";

/// Id of the part created inside a fresh main-area grid.
pub const MAIN_AREA_INITIAL_PART_ID: &str = "part.initial";

/// Element kinds distinguished by identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Part,
    View,
    Dialog,
    Popup,
    Notification,
    Activity,
}

impl ElementKind {
    pub const ALL: [Self; 6] = [
        Self::Part,
        Self::View,
        Self::Dialog,
        Self::Popup,
        Self::Notification,
        Self::Activity,
    ];

    /// Prefix including the trailing dot.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Part => "part.",
            Self::View => "view.",
            Self::Dialog => "dialog.",
            Self::Popup => "popup.",
            Self::Notification => "notification.",
            Self::Activity => "activity.",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::View => "view",
            Self::Dialog => "dialog",
            Self::Popup => "popup",
            Self::Notification => "notification",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw identifier by its prefix.
///
/// Returns `None` for `None`, for unknown prefixes, and for a bare prefix
/// without suffix.
#[must_use]
pub fn classify(value: Option<&str>) -> Option<ElementKind> {
    let value = value?;
    ElementKind::ALL.into_iter().find(|kind| {
        let prefix = kind.prefix();
        value.len() > prefix.len() && value.starts_with(prefix)
    })
}

#[must_use]
pub fn is_part_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::Part)
}

#[must_use]
pub fn is_view_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::View)
}

#[must_use]
pub fn is_dialog_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::Dialog)
}

#[must_use]
pub fn is_popup_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::Popup)
}

#[must_use]
pub fn is_notification_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::Notification)
}

#[must_use]
pub fn is_activity_id(value: Option<&str>) -> bool {
    classify(value) == Some(ElementKind::Activity)
}

fn random_id(kind: ElementKind) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}{}", kind.prefix(), &suffix[..RANDOM_SUFFIX_LEN])
}

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $compute:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Kind encoded by this identifier's prefix.
            pub const KIND: ElementKind = $kind;

            /// Parse a raw identifier, rejecting a foreign or missing prefix.
            pub fn parse(value: impl Into<String>) -> Result<Self, WorkbenchError> {
                let value = value.into();
                if classify(Some(&value)) == Some(Self::KIND) {
                    Ok(Self(value))
                } else {
                    Err(WorkbenchError::illegal_argument(format!(
                        "'{value}' is not a {} id (expected prefix '{}')",
                        Self::KIND,
                        Self::KIND.prefix()
                    )))
                }
            }

            /// Fresh identifier with a random suffix.
            #[must_use]
            pub fn random() -> Self {
                Self(random_id(Self::KIND))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Identifier without its kind prefix.
            #[must_use]
            pub fn suffix(&self) -> &str {
                &self.0[Self::KIND.prefix().len()..]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = WorkbenchError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = WorkbenchError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl FromStr for $name {
            type Err = WorkbenchError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[doc = concat!("Generate a fresh [`", stringify!($name), "`].")]
        #[must_use]
        pub fn $compute() -> $name {
            $name::random()
        }
    };
}

element_id!(
    /// Identifier of a part (`part.*`).
    PartId,
    ElementKind::Part,
    compute_part_id
);
element_id!(
    /// Identifier of a view (`view.*`).
    ViewId,
    ElementKind::View,
    compute_view_id
);
element_id!(
    /// Identifier of a dialog or message box (`dialog.*`).
    DialogId,
    ElementKind::Dialog,
    compute_dialog_id
);
element_id!(
    /// Identifier of a popup (`popup.*`).
    PopupId,
    ElementKind::Popup,
    compute_popup_id
);
element_id!(
    /// Identifier of a notification (`notification.*`).
    NotificationId,
    ElementKind::Notification,
    compute_notification_id
);
element_id!(
    /// Identifier of an activity, i.e. a docked part (`activity.*`).
    ActivityId,
    ElementKind::Activity,
    compute_activity_id
);

impl PartId {
    /// The main area part id.
    #[must_use]
    pub fn main_area() -> Self {
        Self(MAIN_AREA.to_string())
    }

    /// The id of the part a fresh main-area grid starts with.
    #[must_use]
    pub fn main_area_initial() -> Self {
        Self(MAIN_AREA_INITIAL_PART_ID.to_string())
    }

    #[must_use]
    pub fn is_main_area(&self) -> bool {
        self.0 == MAIN_AREA
    }
}

impl ViewId {
    /// Smallest sequential `view.<n>` id not contained in `existing`.
    #[must_use]
    pub fn next_available<'a>(existing: impl IntoIterator<Item = &'a ViewId>) -> Self {
        let taken: BTreeSet<u64> = existing
            .into_iter()
            .filter_map(|id| id.suffix().parse::<u64>().ok())
            .collect();
        let next = (1..)
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or(u64::MAX);
        Self(format!("{}{next}", ElementKind::View.prefix()))
    }
}

/// A part or view: the two element kinds that carry a navigation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavigableId {
    Part(PartId),
    View(ViewId),
}

impl NavigableId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Part(id) => id.as_str(),
            Self::View(id) => id.as_str(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Part(_) => ElementKind::Part,
            Self::View(_) => ElementKind::View,
        }
    }

    /// Parse a raw part or view id.
    pub fn parse(value: &str) -> Result<Self, WorkbenchError> {
        match classify(Some(value)) {
            Some(ElementKind::Part) => PartId::parse(value).map(Self::Part),
            Some(ElementKind::View) => ViewId::parse(value).map(Self::View),
            _ => Err(WorkbenchError::illegal_argument(format!(
                "'{value}' is neither a part nor a view id"
            ))),
        }
    }
}

impl fmt::Display for NavigableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PartId> for NavigableId {
    fn from(id: PartId) -> Self {
        Self::Part(id)
    }
}

impl From<ViewId> for NavigableId {
    fn from(id: ViewId) -> Self {
        Self::View(id)
    }
}
