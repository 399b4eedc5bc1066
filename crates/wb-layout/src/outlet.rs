//! URL outlet encoding.
//!
//! Every navigated part or view gets one named outlet in the URL:
//!
//! ```text
//! /(view.1:person/42;tab=details//part.tools:outline)?main_area=<base64>
//! ```
//!
//! Segments, matrix params and names are percent-encoded. Elements backed by
//! a capability additionally get a microfrontend host outlet named
//! `workbench.microfrontend.host.<capabilityId>.<elementType>.<elementId>`,
//! so the host route can be matched back to its capability. The main-area
//! grid travels in the `main_area` query parameter.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use wb_core::{ElementKind, NavigationData, WorkbenchError, WorkbenchResult, classify};

use crate::layout::WorkbenchLayout;
use crate::model::GridName;
use crate::persist::GridDocument;

/// Prefix of microfrontend host outlet names.
pub const MICROFRONTEND_HOST_OUTLET_PREFIX: &str = "workbench.microfrontend.host.";

/// Query parameter carrying the main-area grid.
pub const MAIN_AREA_QUERY_PARAM: &str = "main_area";

fn malformed(url: &str, reason: &str) -> WorkbenchError {
    WorkbenchError::persistence(format!("malformed workbench URL '{url}': {reason}"))
}

/// Route of one outlet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletEntry {
    pub segments: Vec<String>,
    /// Matrix parameters.
    #[serde(default)]
    pub data: NavigationData,
}

/// Parsed form of a microfrontend host outlet name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MicrofrontendHostOutlet {
    pub capability_id: String,
    pub element_kind: ElementKind,
    pub element_id: String,
}

impl MicrofrontendHostOutlet {
    pub fn new(
        capability_id: impl Into<String>,
        element_id: impl Into<String>,
    ) -> WorkbenchResult<Self> {
        let capability_id = capability_id.into();
        let element_id = element_id.into();
        Self::check_capability_id(&capability_id)?;
        let element_kind = classify(Some(&element_id)).ok_or_else(|| {
            WorkbenchError::illegal_argument(format!("'{element_id}' is not an element id"))
        })?;
        Ok(Self {
            capability_id,
            element_kind,
            element_id,
        })
    }

    /// Fails for capability ids that cannot be part of an outlet name.
    ///
    /// The id is delimited by `.` in the name, so it must be non-empty and
    /// free of dots.
    pub fn check_capability_id(capability_id: &str) -> WorkbenchResult<()> {
        if capability_id.is_empty() || capability_id.contains('.') {
            return Err(WorkbenchError::illegal_argument(format!(
                "capability id '{capability_id}' cannot be encoded in an outlet name"
            )));
        }
        Ok(())
    }

    /// Parse an outlet name; `None` for names that are not host outlets.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(MICROFRONTEND_HOST_OUTLET_PREFIX)?;
        let (capability_id, rest) = rest.split_once('.')?;
        let (kind, element_id) = rest.split_once('.')?;
        let element_kind = classify(Some(element_id))?;
        if element_kind.as_str() != kind || capability_id.is_empty() {
            return None;
        }
        Some(Self {
            capability_id: capability_id.to_string(),
            element_kind,
            element_id: element_id.to_string(),
        })
    }
}

impl fmt::Display for MicrofrontendHostOutlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{MICROFRONTEND_HOST_OUTLET_PREFIX}{}.{}.{}",
            self.capability_id, self.element_kind, self.element_id
        )
    }
}

/// Outlets plus the serialized main-area grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlTree {
    pub outlets: BTreeMap<String, OutletEntry>,
    /// URL-safe base64 JSON of the main-area grid document.
    #[serde(default)]
    pub main_area_grid: Option<String>,
}

impl UrlTree {
    /// Outlets of every navigated element of `layout`.
    ///
    /// Fails if a capability id cannot be encoded as a host outlet or the
    /// main-area grid cannot be serialized.
    pub fn from_layout(layout: &WorkbenchLayout) -> WorkbenchResult<Self> {
        let mut outlets = BTreeMap::new();
        for (id, navigation) in layout.navigated_elements() {
            let _ = outlets.insert(
                id.as_str().to_string(),
                OutletEntry {
                    segments: navigation.target.segments().to_vec(),
                    data: navigation.data.clone(),
                },
            );
            if let Some(capability) = &navigation.capability {
                let host =
                    MicrofrontendHostOutlet::new(capability.capability_id.clone(), id.as_str())?;
                let _ = outlets.insert(
                    host.to_string(),
                    OutletEntry {
                        segments: Vec::new(),
                        data: capability.params.clone(),
                    },
                );
            }
        }
        let main_area_grid = match layout.to_document().grids.remove(GridName::MAIN_AREA) {
            Some(grid) => Some(URL_SAFE_NO_PAD.encode(serde_json::to_vec(&grid)?)),
            None => None,
        };
        Ok(Self {
            outlets,
            main_area_grid,
        })
    }

    /// Decode the main-area grid, if present.
    pub fn main_area_grid(&self) -> WorkbenchResult<Option<GridDocument>> {
        let Some(encoded) = &self.main_area_grid else {
            return Ok(None);
        };
        let json = URL_SAFE_NO_PAD.decode(encoded).map_err(|err| {
            WorkbenchError::persistence(format!("main area grid is not valid base64: {err}"))
        })?;
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// Host outlets in name order.
    pub fn microfrontend_hosts(&self) -> impl Iterator<Item = MicrofrontendHostOutlet> + '_ {
        self.outlets
            .keys()
            .filter_map(|name| MicrofrontendHostOutlet::parse(name))
    }

    #[must_use]
    pub fn to_url(&self) -> String {
        let mut url = String::from("/");
        if !self.outlets.is_empty() {
            let outlets: Vec<String> = self
                .outlets
                .iter()
                .map(|(name, entry)| {
                    let mut out = format!("{}:", urlencoding::encode(name));
                    let path: Vec<_> = entry
                        .segments
                        .iter()
                        .map(|segment| urlencoding::encode(segment).into_owned())
                        .collect();
                    out.push_str(&path.join("/"));
                    for (key, value) in &entry.data {
                        out.push(';');
                        out.push_str(&urlencoding::encode(key));
                        out.push('=');
                        out.push_str(&urlencoding::encode(value));
                    }
                    out
                })
                .collect();
            url.push('(');
            url.push_str(&outlets.join("//"));
            url.push(')');
        }
        if let Some(grid) = &self.main_area_grid {
            url.push('?');
            url.push_str(MAIN_AREA_QUERY_PARAM);
            url.push('=');
            url.push_str(&urlencoding::encode(grid));
        }
        url
    }

    pub fn parse(url: &str) -> WorkbenchResult<Self> {
        let decode = |raw: &str| {
            urlencoding::decode(raw)
                .map(|value| value.into_owned())
                .map_err(|err| malformed(url, &err.to_string()))
        };
        let body = url
            .strip_prefix('/')
            .ok_or_else(|| malformed(url, "must start with '/'"))?;
        let (path, query) = match body.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (body, None),
        };

        let mut outlets = BTreeMap::new();
        if !path.is_empty() {
            let inner = path
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| malformed(url, "outlets must be enclosed in parentheses"))?;
            for outlet in inner.split("//").filter(|outlet| !outlet.is_empty()) {
                let (name, route) = outlet
                    .split_once(':')
                    .ok_or_else(|| malformed(url, "outlet without name"))?;
                let mut parts = route.split(';');
                let segments = parts
                    .next()
                    .unwrap_or_default()
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(decode)
                    .collect::<WorkbenchResult<Vec<_>>>()?;
                let mut data = NavigationData::new();
                for param in parts {
                    let (key, value) = param
                        .split_once('=')
                        .ok_or_else(|| malformed(url, "matrix param without value"))?;
                    let _ = data.insert(decode(key)?, decode(value)?);
                }
                if outlets
                    .insert(decode(name)?, OutletEntry { segments, data })
                    .is_some()
                {
                    return Err(malformed(url, "duplicate outlet"));
                }
            }
        }

        let mut main_area_grid = None;
        for pair in query.unwrap_or_default().split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if decode(key)? == MAIN_AREA_QUERY_PARAM {
                main_area_grid = Some(decode(value)?);
            }
        }
        Ok(Self {
            outlets,
            main_area_grid,
        })
    }
}

impl fmt::Display for UrlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}
