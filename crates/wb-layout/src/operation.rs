//! Serializable layout operations and transactions.
//!
//! Each builder call on [`WorkbenchLayout`] has a matching
//! [`LayoutOperation`] so mutations can be logged, replayed and staged in a
//! [`LayoutTransaction`]. A transaction journals every attempt, including
//! rejected ones, and finally either commits its working layout or rolls
//! back to the layout it started from.

use std::fmt;

use serde::{Deserialize, Serialize};
use wb_core::{ActivityId, PartId, ViewId, WorkbenchError, WorkbenchResult};

use crate::layout::WorkbenchLayout;
use crate::model::{
    ActivityMetadata, DockingArea, MoveTarget, MoveViewOptions, PartLocation, PartMetadata,
    RelativePosition, ViewOptions,
};
use crate::navigation::NavigateOptions;

/// One layout mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayoutOperation {
    AddPart {
        id: PartId,
        location: PartLocation,
        #[serde(default)]
        metadata: PartMetadata,
    },
    AddDockedPart {
        id: PartId,
        docking: DockingArea,
        activity: ActivityMetadata,
    },
    AddView {
        id: ViewId,
        options: ViewOptions,
    },
    RemovePart {
        id: PartId,
    },
    RemoveView {
        id: ViewId,
    },
    MoveView {
        id: ViewId,
        target: MoveTarget,
        #[serde(default)]
        options: MoveViewOptions,
    },
    NavigatePart {
        id: PartId,
        #[serde(default)]
        segments: Vec<String>,
        #[serde(default)]
        options: NavigateOptions,
    },
    NavigateView {
        id: ViewId,
        #[serde(default)]
        segments: Vec<String>,
        #[serde(default)]
        options: NavigateOptions,
    },
    DockPart {
        id: PartId,
        docking: DockingArea,
        activity: ActivityMetadata,
    },
    UndockPart {
        id: PartId,
        position: RelativePosition,
    },
    ActivatePart {
        id: PartId,
    },
    ActivateView {
        id: ViewId,
    },
    ActivateActivity {
        id: ActivityId,
    },
    MinimizeActivity {
        id: ActivityId,
    },
    InvalidateCapability {
        capability_id: String,
    },
    SetViewTitle {
        id: ViewId,
        title: Option<String>,
    },
    SetViewHeading {
        id: ViewId,
        heading: Option<String>,
    },
    SetViewDirty {
        id: ViewId,
        dirty: bool,
    },
    SetViewClosable {
        id: ViewId,
        closable: bool,
    },
    SetViewCssClasses {
        id: ViewId,
        css_classes: Vec<String>,
    },
    SetPartTitle {
        id: PartId,
        title: Option<String>,
    },
    SetPartCssClasses {
        id: PartId,
        css_classes: Vec<String>,
    },
}

/// Operation family used in journals and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutOperationKind {
    AddPart,
    AddView,
    Remove,
    MoveView,
    Navigate,
    Dock,
    Activate,
    Invalidate,
    Presentation,
}

impl LayoutOperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddPart => "add_part",
            Self::AddView => "add_view",
            Self::Remove => "remove",
            Self::MoveView => "move_view",
            Self::Navigate => "navigate",
            Self::Dock => "dock",
            Self::Activate => "activate",
            Self::Invalidate => "invalidate",
            Self::Presentation => "presentation",
        }
    }
}

impl fmt::Display for LayoutOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LayoutOperation {
    #[must_use]
    pub const fn kind(&self) -> LayoutOperationKind {
        match self {
            Self::AddPart { .. } | Self::AddDockedPart { .. } => LayoutOperationKind::AddPart,
            Self::AddView { .. } => LayoutOperationKind::AddView,
            Self::RemovePart { .. } | Self::RemoveView { .. } => LayoutOperationKind::Remove,
            Self::MoveView { .. } => LayoutOperationKind::MoveView,
            Self::NavigatePart { .. } | Self::NavigateView { .. } => LayoutOperationKind::Navigate,
            Self::DockPart { .. } | Self::UndockPart { .. } => LayoutOperationKind::Dock,
            Self::ActivatePart { .. }
            | Self::ActivateView { .. }
            | Self::ActivateActivity { .. }
            | Self::MinimizeActivity { .. } => LayoutOperationKind::Activate,
            Self::InvalidateCapability { .. } => LayoutOperationKind::Invalidate,
            Self::SetViewTitle { .. }
            | Self::SetViewHeading { .. }
            | Self::SetViewDirty { .. }
            | Self::SetViewClosable { .. }
            | Self::SetViewCssClasses { .. }
            | Self::SetPartTitle { .. }
            | Self::SetPartCssClasses { .. } => LayoutOperationKind::Presentation,
        }
    }

    /// Run the operation against `layout`, returning the new layout.
    pub fn apply(&self, layout: &WorkbenchLayout) -> WorkbenchResult<WorkbenchLayout> {
        let result = match self.clone() {
            Self::AddPart {
                id,
                location,
                metadata,
            } => layout.add_part(id, location, metadata),
            Self::AddDockedPart {
                id,
                docking,
                activity,
            } => layout.add_docked_part(id, docking, activity),
            Self::AddView { id, options } => layout.add_view(id, options),
            Self::RemovePart { id } => layout.remove_part(&id),
            Self::RemoveView { id } => layout.remove_view(&id),
            Self::MoveView {
                id,
                target,
                options,
            } => layout.move_view(&id, target, options),
            Self::NavigatePart {
                id,
                segments,
                options,
            } => layout.navigate_part(&id, segments, options),
            Self::NavigateView {
                id,
                segments,
                options,
            } => layout.navigate_view(&id, segments, options),
            Self::DockPart {
                id,
                docking,
                activity,
            } => layout.dock_part(&id, docking, activity),
            Self::UndockPart { id, position } => layout.undock_part(&id, position),
            Self::ActivatePart { id } => layout.activate_part(&id),
            Self::ActivateView { id } => layout.activate_view(&id),
            Self::ActivateActivity { id } => layout.activate_activity(&id),
            Self::MinimizeActivity { id } => layout.minimize_activity(&id),
            Self::InvalidateCapability { capability_id } => {
                layout.invalidate_capability(&capability_id)
            }
            Self::SetViewTitle { id, title } => layout.set_view_title(&id, title),
            Self::SetViewHeading { id, heading } => layout.set_view_heading(&id, heading),
            Self::SetViewDirty { id, dirty } => layout.set_view_dirty(&id, dirty),
            Self::SetViewClosable { id, closable } => layout.set_view_closable(&id, closable),
            Self::SetViewCssClasses { id, css_classes } => {
                layout.set_view_css_classes(&id, css_classes)
            }
            Self::SetPartTitle { id, title } => layout.set_part_title(&id, title),
            Self::SetPartCssClasses { id, css_classes } => {
                layout.set_part_css_classes(&id, css_classes)
            }
        };
        match &result {
            Ok(_) => tracing::debug!(kind = %self.kind(), "layout operation applied"),
            Err(err) => {
                tracing::debug!(kind = %self.kind(), error = %err, "layout operation rejected");
            }
        }
        result
    }
}

/// Apply a sequence of operations as one transition.
pub fn apply_all<'a>(
    layout: &WorkbenchLayout,
    operations: impl IntoIterator<Item = &'a LayoutOperation>,
) -> WorkbenchResult<WorkbenchLayout> {
    operations
        .into_iter()
        .try_fold(layout.clone(), |layout, operation| operation.apply(&layout))
}

/// Journal result of one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JournalResult {
    Applied,
    Rejected { reason: String },
}

/// One journal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub transaction_id: u64,
    pub sequence: u64,
    pub operation: LayoutOperation,
    pub kind: LayoutOperationKind,
    pub before_hash: u64,
    pub after_hash: u64,
    pub result: JournalResult,
}

/// Final payload of a commit or rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    pub transaction_id: u64,
    pub committed: bool,
    pub layout: WorkbenchLayout,
    pub journal: Vec<JournalEntry>,
}

/// Staged sequence of layout operations.
#[derive(Debug, Clone)]
pub struct LayoutTransaction {
    transaction_id: u64,
    sequence: u64,
    base: WorkbenchLayout,
    working: WorkbenchLayout,
    journal: Vec<JournalEntry>,
    rejection: Option<WorkbenchError>,
}

impl LayoutTransaction {
    #[must_use]
    pub fn begin(transaction_id: u64, base: WorkbenchLayout) -> Self {
        Self {
            transaction_id,
            sequence: 1,
            working: base.clone(),
            base,
            journal: Vec::new(),
            rejection: None,
        }
    }

    #[must_use]
    pub const fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    /// Working layout with every applied operation.
    #[must_use]
    pub fn layout(&self) -> &WorkbenchLayout {
        &self.working
    }

    #[must_use]
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Attempt one operation; a rejection leaves the working layout as is.
    pub fn apply(&mut self, operation: LayoutOperation) -> WorkbenchResult<()> {
        let sequence = self.sequence;
        self.sequence = self.sequence.saturating_add(1);
        let before_hash = self.working.state_hash();
        let kind = operation.kind();

        match operation.apply(&self.working) {
            Ok(next) => {
                let after_hash = next.state_hash();
                self.working = next;
                self.journal.push(JournalEntry {
                    transaction_id: self.transaction_id,
                    sequence,
                    operation,
                    kind,
                    before_hash,
                    after_hash,
                    result: JournalResult::Applied,
                });
                Ok(())
            }
            Err(err) => {
                self.journal.push(JournalEntry {
                    transaction_id: self.transaction_id,
                    sequence,
                    operation,
                    kind,
                    before_hash,
                    after_hash: before_hash,
                    result: JournalResult::Rejected {
                        reason: err.to_string(),
                    },
                });
                if self.rejection.is_none() {
                    self.rejection = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    /// Whether any attempted operation was rejected.
    #[must_use]
    pub fn has_rejections(&self) -> bool {
        self.journal
            .iter()
            .any(|entry| matches!(entry.result, JournalResult::Rejected { .. }))
    }

    #[must_use]
    pub fn commit(self) -> TransactionOutcome {
        TransactionOutcome {
            transaction_id: self.transaction_id,
            committed: true,
            layout: self.working,
            journal: self.journal,
        }
    }

    #[must_use]
    pub fn rollback(self) -> TransactionOutcome {
        TransactionOutcome {
            transaction_id: self.transaction_id,
            committed: false,
            layout: self.base,
            journal: self.journal,
        }
    }

    /// Commit if every operation applied, otherwise roll back and return the
    /// first rejection.
    pub fn finish(mut self) -> WorkbenchResult<TransactionOutcome> {
        match self.rejection.take() {
            None => Ok(self.commit()),
            Some(err) => Err(err.context(format!(
                "transaction {} rolled back",
                self.transaction_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Align;
    use wb_core::ErrorKind;

    fn pid(raw: &str) -> PartId {
        PartId::parse(raw).unwrap()
    }

    fn vid(raw: &str) -> ViewId {
        ViewId::parse(raw).unwrap()
    }

    fn seed() -> Vec<LayoutOperation> {
        vec![
            LayoutOperation::AddPart {
                id: pid("part.left"),
                location: PartLocation::Root,
                metadata: PartMetadata::default(),
            },
            LayoutOperation::AddPart {
                id: pid("part.right"),
                location: PartLocation::Relative(RelativePosition::new(Align::Right)),
                metadata: PartMetadata::default(),
            },
            LayoutOperation::AddView {
                id: vid("view.1"),
                options: ViewOptions::in_part(pid("part.left")),
            },
        ]
    }

    #[test]
    fn operations_round_trip_through_json() {
        for operation in seed() {
            let json = serde_json::to_string(&operation).unwrap();
            let back: LayoutOperation = serde_json::from_str(&json).unwrap();
            assert_eq!(back, operation);
        }
        let json = serde_json::to_value(LayoutOperation::RemoveView { id: vid("view.1") }).unwrap();
        assert_eq!(json["op"], "remove_view");
    }

    #[test]
    fn apply_all_is_sequential() {
        let layout = apply_all(&WorkbenchLayout::new(), &seed()).unwrap();
        assert!(layout.has_view(&vid("view.1")));
        assert_eq!(layout.parts().count(), 2);
    }

    #[test]
    fn transaction_journals_rejections_and_rolls_back() {
        let base = apply_all(&WorkbenchLayout::new(), &seed()).unwrap();
        let mut tx = LayoutTransaction::begin(7, base.clone());
        tx.apply(LayoutOperation::AddView {
            id: vid("view.2"),
            options: ViewOptions::in_part(pid("part.right")),
        })
        .unwrap();
        let err = tx
            .apply(LayoutOperation::AddView {
                id: vid("view.2"),
                options: ViewOptions::in_part(pid("part.left")),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(tx.has_rejections());
        assert!(tx.layout().has_view(&vid("view.2")));

        let journal = tx.journal().to_vec();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].result, JournalResult::Applied);
        assert_ne!(journal[0].before_hash, journal[0].after_hash);
        assert_eq!(journal[1].before_hash, journal[1].after_hash);

        let outcome = tx.rollback();
        assert!(!outcome.committed);
        assert_eq!(outcome.layout, base);
    }

    #[test]
    fn finish_refuses_partial_commits() {
        let base = apply_all(&WorkbenchLayout::new(), &seed()).unwrap();
        let mut tx = LayoutTransaction::begin(1, base);
        let _ = tx.apply(LayoutOperation::RemovePart { id: pid("part.none") });
        assert!(tx.finish().is_err());
    }

    #[test]
    fn finish_keeps_the_kind_of_the_first_rejection() {
        let base = apply_all(&WorkbenchLayout::new(), &seed()).unwrap();
        let mut tx = LayoutTransaction::begin(4, base);
        let rejected = tx
            .apply(LayoutOperation::AddView {
                id: vid("view.1"),
                options: ViewOptions::in_part(pid("part.right")),
            })
            .unwrap_err();
        let _ = tx.apply(LayoutOperation::RemovePart { id: pid("part.none") });

        let err = tx.finish().unwrap_err();
        assert_eq!(err.kind(), rejected.kind());
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.to_string().contains("transaction 4 rolled back"));
        assert!(err.to_string().contains("already exists"));
    }
}
