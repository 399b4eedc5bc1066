//! Open dialogs, message boxes and popups.
//!
//! Dialogs stack per modality context. Opening a dialog blocks the topmost
//! dialog of the same context; the blocked dialog is released when the
//! blocking one closes. A view-modal dialog also blocks its view.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use wb_core::{DialogId, NavigableId, PopupId, ViewId, WorkbenchError, WorkbenchResult};
use wb_layout::{CapabilityRef, WorkbenchLayout};

use crate::capability::ElementSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogKind {
    Dialog,
    Messagebox,
}

/// Context a dialog blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modality {
    Application,
    View { id: ViewId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogHandle {
    pub id: DialogId,
    pub kind: DialogKind,
    pub modality: Modality,
    pub capability: Option<CapabilityRef>,
    pub title: Option<String>,
    pub size: Option<ElementSize>,
    pub closable: bool,
    /// Dialog currently stacked on top of this one.
    pub blocked_by: Option<DialogId>,
    pub css_classes: Vec<String>,
}

impl DialogHandle {
    #[must_use]
    pub fn new(kind: DialogKind, modality: Modality) -> Self {
        Self {
            id: wb_core::compute_dialog_id(),
            kind,
            modality,
            capability: None,
            title: None,
            size: None,
            closable: true,
            blocked_by: None,
            css_classes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupHandle {
    pub id: PopupId,
    pub capability: CapabilityRef,
    /// Element the popup is anchored to.
    pub anchor: Option<NavigableId>,
    /// View the popup lives in; closed with it.
    pub context: Option<ViewId>,
    pub size: Option<ElementSize>,
    pub close_on_focus_lost: bool,
}

/// Outcome of closing a dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogClosed {
    pub handle: DialogHandle,
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct DialogRegistry {
    /// Opening order.
    dialogs: Vec<DialogHandle>,
    popups: Vec<PopupHandle>,
}

impl DialogRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- dialogs ---------------------------------------------------------

    /// Register an opened dialog on top of its context.
    pub fn open(&mut self, handle: DialogHandle) -> WorkbenchResult<DialogId> {
        if self.dialog(&handle.id).is_some() {
            return Err(WorkbenchError::illegal_state(format!(
                "dialog '{}' is already open",
                handle.id
            )));
        }
        let id = handle.id.clone();
        if let Some(top) = self.top_index(&handle.modality) {
            self.dialogs[top].blocked_by = Some(id.clone());
        }
        debug!(dialog = %id, "dialog opened");
        self.dialogs.push(handle);
        Ok(id)
    }

    /// Close a dialog; the dialog it blocked inherits its blocker.
    pub fn close(&mut self, id: &DialogId, result: Option<Value>) -> WorkbenchResult<DialogClosed> {
        let index = self
            .dialogs
            .iter()
            .position(|dialog| &dialog.id == id)
            .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
        let handle = self.dialogs.remove(index);
        for dialog in &mut self.dialogs {
            if dialog.blocked_by.as_ref() == Some(id) {
                dialog.blocked_by = handle.blocked_by.clone();
            }
        }
        debug!(dialog = %id, "dialog closed");
        Ok(DialogClosed { handle, result })
    }

    #[must_use]
    pub fn dialog(&self, id: &DialogId) -> Option<&DialogHandle> {
        self.dialogs.iter().find(|dialog| &dialog.id == id)
    }

    pub fn dialogs(&self) -> impl Iterator<Item = &DialogHandle> {
        self.dialogs.iter()
    }

    /// Topmost dialog of a context.
    #[must_use]
    pub fn top(&self, modality: &Modality) -> Option<&DialogHandle> {
        self.top_index(modality).map(|index| &self.dialogs[index])
    }

    #[must_use]
    pub fn is_blocked(&self, id: &DialogId) -> bool {
        self.dialog(id).is_some_and(|dialog| dialog.blocked_by.is_some())
    }

    /// Whether a view-modal dialog blocks `view`.
    #[must_use]
    pub fn is_view_blocked(&self, view: &ViewId) -> bool {
        self.dialogs
            .iter()
            .any(|dialog| matches!(&dialog.modality, Modality::View { id } if id == view))
    }

    fn top_index(&self, modality: &Modality) -> Option<usize> {
        self.dialogs
            .iter()
            .rposition(|dialog| &dialog.modality == modality)
    }

    // -- popups ----------------------------------------------------------

    pub fn open_popup(&mut self, handle: PopupHandle) -> WorkbenchResult<PopupId> {
        if self.popup(&handle.id).is_some() {
            return Err(WorkbenchError::illegal_state(format!(
                "popup '{}' is already open",
                handle.id
            )));
        }
        let id = handle.id.clone();
        self.popups.push(handle);
        Ok(id)
    }

    pub fn close_popup(&mut self, id: &PopupId) -> WorkbenchResult<PopupHandle> {
        let index = self
            .popups
            .iter()
            .position(|popup| &popup.id == id)
            .ok_or_else(|| WorkbenchError::null_view(id.as_str()))?;
        Ok(self.popups.remove(index))
    }

    #[must_use]
    pub fn popup(&self, id: &PopupId) -> Option<&PopupHandle> {
        self.popups.iter().find(|popup| &popup.id == id)
    }

    pub fn popups(&self) -> impl Iterator<Item = &PopupHandle> {
        self.popups.iter()
    }

    // -- maintenance -----------------------------------------------------

    /// Close dialogs and popups whose view left `layout`.
    pub fn close_orphaned(&mut self, layout: &WorkbenchLayout) -> Vec<String> {
        let mut closed = Vec::new();
        let orphaned: Vec<DialogId> = self
            .dialogs
            .iter()
            .filter(|dialog| matches!(&dialog.modality, Modality::View { id } if !layout.has_view(id)))
            .map(|dialog| dialog.id.clone())
            .collect();
        // Newest first so each close releases an already-closed blocker.
        for id in orphaned.into_iter().rev() {
            if self.close(&id, None).is_ok() {
                closed.push(id.to_string());
            }
        }
        self.popups.retain(|popup| {
            let keep = popup.context.as_ref().is_none_or(|view| layout.has_view(view));
            if !keep {
                closed.push(popup.id.to_string());
            }
            keep
        });
        closed
    }

    /// Mark handles backed by `capability_id` as not found.
    pub fn invalidate_capability(&mut self, capability_id: &str) {
        let dialog_refs = self.dialogs.iter_mut().filter_map(|dialog| dialog.capability.as_mut());
        let popup_refs = self.popups.iter_mut().map(|popup| &mut popup.capability);
        for capability in dialog_refs.chain(popup_refs) {
            if capability.capability_id == capability_id {
                capability.resolved = false;
            }
        }
    }

    /// Whether a dialog or popup named `element_id` references `capability_id`.
    #[must_use]
    pub fn references(&self, element_id: &str, capability_id: &str) -> bool {
        let dialog = self
            .dialogs
            .iter()
            .filter(|dialog| dialog.id.as_str() == element_id)
            .filter_map(|dialog| dialog.capability.as_ref());
        let popup = self
            .popups
            .iter()
            .filter(|popup| popup.id.as_str() == element_id)
            .map(|popup| &popup.capability);
        dialog
            .chain(popup)
            .any(|capability| capability.capability_id == capability_id && capability.resolved)
    }

    pub fn clear(&mut self) {
        self.dialogs.clear();
        self.popups.clear();
    }
}
