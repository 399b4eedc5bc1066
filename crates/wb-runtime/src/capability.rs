//! Capability resolution.
//!
//! Capabilities are declared by micro applications and addressed by
//! qualifier. The runtime only consumes them through [`CapabilityResolver`];
//! [`CapabilityRegistry`] is the in-memory implementation used by hosts
//! that manage the registry themselves, and by tests.
//!
//! # Visibility
//!
//! - A private capability is visible only to its owning application.
//! - A caller must declare a matching intention, or own a matching
//!   capability, to look a qualifier up at all; otherwise resolution fails
//!   with `NotQualified`.
//! - When the only matches are private capabilities of other applications,
//!   resolution fails with `NullProvider`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wb_core::{ParamMap, Qualifier, WorkbenchError, WorkbenchResult};
use wb_layout::MicrofrontendHostOutlet;

/// Kind of workbench element a capability contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityType {
    Part,
    View,
    Dialog,
    Popup,
    Messagebox,
    Notification,
}

impl CapabilityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::View => "view",
            Self::Dialog => "dialog",
            Self::Popup => "popup",
            Self::Messagebox => "messagebox",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<String>,
}

/// Presentation properties declared by a capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapabilityProperties {
    pub path: Option<String>,
    pub title: Option<String>,
    pub heading: Option<String>,
    pub css_class: Vec<String>,
    pub size: Option<ElementSize>,
    pub closable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityMetadata {
    pub id: String,
    pub app_symbolic_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(rename = "type")]
    pub capability_type: CapabilityType,
    pub qualifier: Qualifier,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub properties: CapabilityProperties,
    #[serde(default = "private_default")]
    pub private: bool,
    pub metadata: CapabilityMetadata,
}

fn private_default() -> bool {
    true
}

impl Capability {
    /// A private capability without params or properties.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        capability_type: CapabilityType,
        qualifier: Qualifier,
        app: impl Into<String>,
    ) -> Self {
        Self {
            capability_type,
            qualifier,
            params: Vec::new(),
            properties: CapabilityProperties::default(),
            private: true,
            metadata: CapabilityMetadata {
                id: id.into(),
                app_symbolic_name: app.into(),
            },
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, required: bool) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            required,
        });
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: CapabilityProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.private = false;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    #[must_use]
    pub fn app(&self) -> &str {
        &self.metadata.app_symbolic_name
    }

    /// Names of the required params.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
    }

    #[must_use]
    pub fn declares_param(&self, name: &str) -> bool {
        self.params.iter().any(|param| param.name == name)
    }

    /// Visible to `app` under the private/public rule.
    #[must_use]
    pub fn is_visible_to(&self, app: &str) -> bool {
        !self.private || self.app() == app
    }

    fn answers(&self, capability_type: CapabilityType, qualifier: &Qualifier) -> bool {
        self.capability_type == capability_type && qualifier.matches(&self.qualifier)
    }
}

/// Declared wish of an application to interact with capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intention {
    pub capability_type: CapabilityType,
    /// May contain wildcards.
    pub qualifier: Qualifier,
    pub app: String,
}

impl Intention {
    #[must_use]
    pub fn new(
        capability_type: CapabilityType,
        qualifier: Qualifier,
        app: impl Into<String>,
    ) -> Self {
        Self {
            capability_type,
            qualifier,
            app: app.into(),
        }
    }
}

/// Check `supplied` against the params `capability` declares.
///
/// Required params must be present and no undeclared param is accepted.
pub fn validate_params(capability: &Capability, supplied: &ParamMap) -> WorkbenchResult<()> {
    let missing: Vec<&str> = capability
        .required_params()
        .filter(|name| !supplied.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(WorkbenchError::param_validation(
            capability.id(),
            format!("missing required param(s): {}", missing.join(", ")),
        ));
    }
    let unexpected: Vec<&str> = supplied
        .keys()
        .map(String::as_str)
        .filter(|name| !capability.declares_param(name))
        .collect();
    if !unexpected.is_empty() {
        return Err(WorkbenchError::param_validation(
            capability.id(),
            format!("unexpected param(s): {}", unexpected.join(", ")),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolver seam
// ---------------------------------------------------------------------------

/// Narrow interface the runtime resolves capabilities through.
pub trait CapabilityResolver {
    /// Capabilities of `capability_type` matching `qualifier` that
    /// `caller_app` may see; empty if none.
    fn resolve(
        &self,
        caller_app: &str,
        capability_type: CapabilityType,
        qualifier: &Qualifier,
    ) -> WorkbenchResult<Vec<Capability>>;

    fn lookup(&self, capability_id: &str) -> Option<Capability>;

    /// Whether the registry finished starting up.
    fn is_ready(&self) -> bool;
}

/// Registration side of a resolver.
pub trait CapabilityRegistration {
    /// Returns the capability id.
    fn register(&mut self, capability: Capability) -> WorkbenchResult<String>;

    /// Returns the removed capability, if it was registered.
    fn unregister(&mut self, capability_id: &str) -> Option<Capability>;
}

type CacheKey = (String, CapabilityType, Qualifier);

/// In-memory capability registry.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Capability>,
    intentions: Vec<Intention>,
    ready: bool,
    cache: RefCell<FxHashMap<CacheKey, Vec<Capability>>>,
}

impl CapabilityRegistry {
    /// A registry that is already ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    /// A registry still starting up.
    #[must_use]
    pub fn starting() -> Self {
        Self::default()
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn register_intention(&mut self, intention: Intention) {
        self.intentions.push(intention);
        self.invalidate_cache();
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    /// Cached lookups.
    #[must_use]
    pub fn cached_lookups(&self) -> usize {
        self.cache.borrow().len()
    }

    fn invalidate_cache(&mut self) {
        self.cache.get_mut().clear();
    }

    fn is_qualified(
        &self,
        app: &str,
        capability_type: CapabilityType,
        qualifier: &Qualifier,
    ) -> bool {
        let intended = self.intentions.iter().any(|intention| {
            intention.app == app
                && intention.capability_type == capability_type
                && qualifier.matches(&intention.qualifier)
        });
        intended
            || self
                .capabilities
                .values()
                .any(|capability| capability.app() == app && capability.answers(capability_type, qualifier))
    }
}

impl CapabilityResolver for CapabilityRegistry {
    fn resolve(
        &self,
        caller_app: &str,
        capability_type: CapabilityType,
        qualifier: &Qualifier,
    ) -> WorkbenchResult<Vec<Capability>> {
        let key = (caller_app.to_string(), capability_type, qualifier.clone());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        if !self.is_qualified(caller_app, capability_type, qualifier) {
            return Err(WorkbenchError::not_qualified(
                caller_app,
                format!("no intention for {capability_type} capability {qualifier}"),
            ));
        }
        let matching: Vec<&Capability> = self
            .capabilities
            .values()
            .filter(|capability| capability.answers(capability_type, qualifier))
            .collect();
        let visible: Vec<Capability> = matching
            .iter()
            .filter(|capability| capability.is_visible_to(caller_app))
            .map(|capability| (*capability).clone())
            .collect();
        if visible.is_empty()
            && let Some(foreign) = matching.first()
        {
            return Err(WorkbenchError::null_provider(format!(
                "{capability_type} capability {qualifier} is private to application '{}'",
                foreign.app()
            )));
        }
        debug!(
            caller_app,
            capability_type = capability_type.as_str(),
            %qualifier,
            found = visible.len(),
            "resolved capabilities"
        );
        let _ = self.cache.borrow_mut().insert(key, visible.clone());
        Ok(visible)
    }

    fn lookup(&self, capability_id: &str) -> Option<Capability> {
        self.capabilities.get(capability_id).cloned()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

impl CapabilityRegistration for CapabilityRegistry {
    fn register(&mut self, capability: Capability) -> WorkbenchResult<String> {
        let id = capability.id().to_string();
        if id.is_empty() || capability.app().is_empty() {
            return Err(WorkbenchError::illegal_argument(
                "capability id and owning application are required",
            ));
        }
        MicrofrontendHostOutlet::check_capability_id(&id)?;
        if capability.qualifier.is_empty()
            && matches!(
                capability.capability_type,
                CapabilityType::View | CapabilityType::Part
            )
        {
            return Err(WorkbenchError::illegal_argument(format!(
                "{} capability '{id}' requires a qualifier",
                capability.capability_type
            )));
        }
        let mut names: Vec<&str> = capability.params.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(WorkbenchError::illegal_argument(format!(
                "capability '{id}' declares a param twice"
            )));
        }
        if self.capabilities.contains_key(&id) {
            return Err(WorkbenchError::illegal_state(format!(
                "capability '{id}' is already registered"
            )));
        }
        let _ = self.capabilities.insert(id.clone(), capability);
        self.invalidate_cache();
        Ok(id)
    }

    fn unregister(&mut self, capability_id: &str) -> Option<Capability> {
        let removed = self.capabilities.remove(capability_id)?;
        self.invalidate_cache();
        Some(removed)
    }
}
