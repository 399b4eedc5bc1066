//! Navigation descriptors bound to parts and views.
//!
//! A descriptor is replaced wholesale by every navigation. Its `data` is
//! public and persisted with the layout; its `state` is private, lives only
//! in memory and in history entries, and is emptied by a reload.

use serde::{Deserialize, Serialize};
use wb_core::{NavigationData, NavigationState, ParamMap, Qualifier};

/// Routed content of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationTarget {
    /// Route path segments, e.g. `["person", "42"]`.
    Path { segments: Vec<String> },
    /// Empty-path route, disambiguated by a hint.
    Empty {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
    },
}

impl NavigationTarget {
    /// Split a slash-separated path; an empty path becomes an empty target.
    #[must_use]
    pub fn path(path: &str) -> Self {
        Self::from_segments(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            None,
        )
    }

    #[must_use]
    pub fn from_segments(segments: Vec<String>, hint: Option<String>) -> Self {
        if segments.is_empty() {
            Self::Empty { hint }
        } else {
            Self::Path { segments }
        }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        match self {
            Self::Path { segments } => segments,
            Self::Empty { .. } => &[],
        }
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Path { .. } => None,
            Self::Empty { hint } => hint.as_deref(),
        }
    }
}

/// Reference to the capability backing a microfrontend element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRef {
    pub capability_id: String,
    pub qualifier: Qualifier,
    #[serde(default)]
    pub params: ParamMap,
    /// Cleared when the capability is unregistered; the element then
    /// renders a "not found" state.
    #[serde(default = "resolved_default")]
    pub resolved: bool,
}

fn resolved_default() -> bool {
    true
}

impl CapabilityRef {
    #[must_use]
    pub fn new(capability_id: impl Into<String>, qualifier: Qualifier, params: ParamMap) -> Self {
        Self {
            capability_id: capability_id.into(),
            qualifier,
            params,
            resolved: true,
        }
    }
}

/// Target, data, state and capability bound to a part or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationDescriptor {
    pub target: NavigationTarget,
    #[serde(default, skip_serializing_if = "NavigationData::is_empty")]
    pub data: NavigationData,
    /// Never persisted.
    #[serde(skip)]
    pub state: NavigationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<CapabilityRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css_classes: Vec<String>,
}

impl NavigationDescriptor {
    #[must_use]
    pub fn new(target: NavigationTarget) -> Self {
        Self {
            target,
            data: NavigationData::new(),
            state: NavigationState::new(),
            capability: None,
            css_classes: Vec::new(),
        }
    }

    #[must_use]
    pub fn capability_qualifier(&self) -> Option<&Qualifier> {
        self.capability.as_ref().map(|capability| &capability.qualifier)
    }

    /// Whether the backing capability is known to be gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.capability
            .as_ref()
            .is_some_and(|capability| !capability.resolved)
    }

    /// Copy without the private state.
    #[must_use]
    pub fn without_state(&self) -> Self {
        Self {
            state: NavigationState::new(),
            ..self.clone()
        }
    }
}

/// Whether `next` re-navigates an element to the content it already shows.
///
/// Only data, params or state differ in a self-navigation; a different
/// target or capability qualifier is a fresh navigation.
#[must_use]
pub fn is_self_navigation(
    previous: Option<&NavigationDescriptor>,
    next: &NavigationDescriptor,
) -> bool {
    previous.is_some_and(|previous| {
        previous.target == next.target
            && previous.capability_qualifier() == next.capability_qualifier()
    })
}

/// Options of `navigate_part` and `navigate_view`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigateOptions {
    pub hint: Option<String>,
    pub data: NavigationData,
    /// Replaces the previous state; `None` clears it.
    pub state: Option<NavigationState>,
    pub capability: Option<CapabilityRef>,
    pub css_classes: Vec<String>,
}

impl NavigateOptions {
    #[must_use]
    pub fn hint(hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.data.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: NavigationState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: CapabilityRef) -> Self {
        self.capability = Some(capability);
        self
    }

    pub(crate) fn into_descriptor(self, segments: Vec<String>) -> Option<NavigationDescriptor> {
        if segments.is_empty() && self.hint.is_none() && self.capability.is_none() {
            return None;
        }
        Some(NavigationDescriptor {
            target: NavigationTarget::from_segments(segments, self.hint),
            data: self.data,
            state: self.state.unwrap_or_default(),
            capability: self.capability,
            css_classes: self.css_classes,
        })
    }
}

/// Navigation lifecycle of a part or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationStatus {
    Unnavigated,
    Navigated,
    /// The element is not part of the layout.
    Removed,
}
