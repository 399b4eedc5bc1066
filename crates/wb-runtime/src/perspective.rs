//! Perspectives: named layouts the user switches between.
//!
//! Switching stores the outgoing perspective's layout under
//! `scion.workbench.perspectives.<id>` and restores the incoming one from
//! storage, falling back to its initial layout. The active perspective id is
//! written to `scion.workbench.perspective`, except for the initial selection
//! at startup, which leaves that key as it is.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use wb_core::{WorkbenchError, WorkbenchResult};
use wb_layout::WorkbenchLayout;

use crate::config::StorageConfig;
use crate::storage::StorageBackend;

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveDefinition {
    pub id: String,
    pub layout: WorkbenchLayout,
    pub data: BTreeMap<String, String>,
}

impl PerspectiveDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>, layout: WorkbenchLayout) -> Self {
        Self {
            id: id.into(),
            layout,
            data: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.data.insert(key.into(), value.into());
        self
    }
}

/// Staged perspective switch.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveSwitch {
    pub id: String,
    pub layout: WorkbenchLayout,
    /// Layout came from storage rather than the definition.
    pub restored: bool,
}

#[derive(Debug, Default)]
pub struct PerspectiveRegistry {
    definitions: Vec<PerspectiveDefinition>,
    active: Option<String>,
    keys: StorageConfig,
}

impl PerspectiveRegistry {
    #[must_use]
    pub fn new(keys: StorageConfig) -> Self {
        Self {
            definitions: Vec::new(),
            active: None,
            keys,
        }
    }

    pub fn register(&mut self, definition: PerspectiveDefinition) -> WorkbenchResult<()> {
        if definition.id.trim().is_empty() {
            return Err(WorkbenchError::illegal_argument("perspective id must not be empty"));
        }
        if self.definition(&definition.id).is_some() {
            return Err(WorkbenchError::illegal_state(format!(
                "perspective '{}' is already registered",
                definition.id
            )));
        }
        definition.layout.validate()?;
        self.definitions.push(definition);
        Ok(())
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&PerspectiveDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &PerspectiveDefinition> {
        self.definitions.iter()
    }

    #[must_use]
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Perspective to select at startup: the stored selection if it is
    /// still registered, else the first registered perspective.
    pub fn initial_selection(&self, storage: &dyn StorageBackend) -> WorkbenchResult<Option<String>> {
        let stored = storage.read(&self.keys.perspective_key)?;
        if let Some(id) = stored
            && self.definition(&id).is_some()
        {
            return Ok(Some(id));
        }
        Ok(self.definitions.first().map(|definition| definition.id.clone()))
    }

    /// Plan a switch to perspective `id`.
    ///
    /// Reads the incoming perspective's stored layout, falling back to its
    /// initial layout. Neither the registry nor storage is modified; call
    /// [`stash`](Self::stash) and [`activate`](Self::activate) once the
    /// layout is committed.
    pub fn stage(
        &self,
        id: &str,
        current: &WorkbenchLayout,
        storage: &dyn StorageBackend,
    ) -> WorkbenchResult<PerspectiveSwitch> {
        let definition = self
            .definition(id)
            .ok_or_else(|| WorkbenchError::illegal_argument(format!("no perspective '{id}'")))?;
        if self.active.as_deref() == Some(id) {
            return Ok(PerspectiveSwitch {
                id: id.to_string(),
                layout: current.clone(),
                restored: true,
            });
        }

        let restored = match storage.read(&self.keys.perspective_layout_key(id))? {
            Some(json) => match WorkbenchLayout::from_json(&json) {
                Ok(layout) => Some(layout),
                Err(err) => {
                    warn!(perspective = id, error = %err, "discarding unreadable perspective layout");
                    None
                }
            },
            None => None,
        };
        Ok(PerspectiveSwitch {
            id: id.to_string(),
            restored: restored.is_some(),
            layout: restored.unwrap_or_else(|| definition.layout.clone()),
        })
    }

    /// Store `current` as the layout of the active perspective, if any.
    pub fn stash(
        &self,
        current: &WorkbenchLayout,
        storage: &mut dyn StorageBackend,
    ) -> WorkbenchResult<()> {
        if let Some(active) = &self.active {
            storage.write(&self.keys.perspective_layout_key(active), &current.to_json()?)?;
        }
        Ok(())
    }

    /// Mark `id` active and persist the selection.
    ///
    /// The first activation is the startup selection and leaves the
    /// selection key untouched.
    pub fn activate(&mut self, id: &str, storage: &mut dyn StorageBackend) -> WorkbenchResult<()> {
        if self.definition(id).is_none() {
            return Err(WorkbenchError::illegal_argument(format!("no perspective '{id}'")));
        }
        if self.active.as_deref() == Some(id) {
            return Ok(());
        }
        let initial = self.active.replace(id.to_string()).is_none();
        if !initial {
            storage.write(&self.keys.perspective_key, id)?;
        }
        debug!(perspective = id, initial, "perspective switched");
        Ok(())
    }

    /// Forget the stored layout of `id` and return its initial layout.
    pub fn reset(
        &mut self,
        id: &str,
        storage: &mut dyn StorageBackend,
    ) -> WorkbenchResult<WorkbenchLayout> {
        let layout = self
            .definition(id)
            .map(|definition| definition.layout.clone())
            .ok_or_else(|| WorkbenchError::illegal_argument(format!("no perspective '{id}'")))?;
        storage.remove(&self.keys.perspective_layout_key(id))?;
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use wb_core::{ErrorKind, PartId};
    use wb_layout::{Align, PartLocation, PartMetadata, RelativePosition};

    fn layout(extra: &str) -> WorkbenchLayout {
        WorkbenchLayout::new()
            .add_part(PartId::main_area(), PartLocation::Root, PartMetadata::default())
            .unwrap()
            .add_part(
                PartId::parse(extra).unwrap(),
                PartLocation::Relative(RelativePosition::new(Align::Left)),
                PartMetadata::default(),
            )
            .unwrap()
    }

    fn registry() -> PerspectiveRegistry {
        let mut registry = PerspectiveRegistry::new(StorageConfig::default());
        registry
            .register(PerspectiveDefinition::new("dev", layout("part.explorer")))
            .unwrap();
        registry
            .register(PerspectiveDefinition::new("ops", layout("part.monitor")))
            .unwrap();
        registry
    }

    /// Stage, stash and activate, as the runtime does around a commit.
    fn switch(
        registry: &mut PerspectiveRegistry,
        id: &str,
        current: &WorkbenchLayout,
        storage: &mut MemoryStorage,
    ) -> WorkbenchResult<PerspectiveSwitch> {
        let staged = registry.stage(id, current, &*storage)?;
        registry.stash(current, &mut *storage)?;
        registry.activate(id, &mut *storage)?;
        Ok(staged)
    }

    #[test]
    fn staging_leaves_registry_and_storage_untouched() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        let dev = switch(&mut registry, "dev", &WorkbenchLayout::new(), &mut storage).unwrap();

        let staged = registry.stage("ops", &dev.layout, &storage).unwrap();
        assert_eq!(staged.layout, layout("part.monitor"));
        assert_eq!(registry.active(), Some("dev"));
        assert!(storage.is_empty());
    }

    #[test]
    fn duplicate_and_empty_ids_are_rejected() {
        let mut registry = registry();
        let dup = registry.register(PerspectiveDefinition::new("dev", layout("part.x")));
        assert_eq!(dup.unwrap_err().kind(), ErrorKind::IllegalState);
        let empty = registry.register(PerspectiveDefinition::new(" ", layout("part.x")));
        assert_eq!(empty.unwrap_err().kind(), ErrorKind::IllegalArgument);
    }

    #[test]
    fn initial_selection_leaves_active_key_unset() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        let initial = registry.initial_selection(&storage).unwrap().unwrap();
        assert_eq!(initial, "dev");

        let selected = switch(&mut registry, &initial, &WorkbenchLayout::new(), &mut storage)
            .unwrap();
        assert!(!selected.restored);
        assert_eq!(selected.layout, layout("part.explorer"));
        assert_eq!(storage.read("scion.workbench.perspective").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn switching_stores_outgoing_and_active_key() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        let dev = switch(&mut registry, "dev", &WorkbenchLayout::new(), &mut storage).unwrap();
        let modified = dev
            .layout
            .remove_part(&PartId::parse("part.explorer").unwrap())
            .unwrap();

        let ops = switch(&mut registry, "ops", &modified, &mut storage).unwrap();
        assert_eq!(ops.layout, layout("part.monitor"));
        assert_eq!(
            storage.read("scion.workbench.perspective").unwrap().as_deref(),
            Some("ops")
        );
        assert!(
            storage
                .read("scion.workbench.perspectives.dev")
                .unwrap()
                .is_some()
        );

        let back = switch(&mut registry, "dev", &ops.layout, &mut storage).unwrap();
        assert!(back.restored);
        assert_eq!(back.layout, modified);
        assert_eq!(registry.active(), Some("dev"));
        assert_eq!(registry.initial_selection(&storage).unwrap().as_deref(), Some("dev"));
    }

    #[test]
    fn unknown_perspective_is_rejected() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        let err = switch(&mut registry, "missing", &WorkbenchLayout::new(), &mut storage)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert_eq!(registry.active(), None);
    }

    #[test]
    fn unreadable_stored_layout_falls_back_to_definition() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        storage.write("scion.workbench.perspectives.dev", "{broken").unwrap();
        let selected = switch(&mut registry, "dev", &WorkbenchLayout::new(), &mut storage).unwrap();
        assert!(!selected.restored);
        assert_eq!(selected.layout, layout("part.explorer"));
    }

    #[test]
    fn reset_forgets_stored_layout() {
        let mut registry = registry();
        let mut storage = MemoryStorage::new();
        storage
            .write("scion.workbench.perspectives.ops", &layout("part.other").to_json().unwrap())
            .unwrap();
        let initial = registry.reset("ops", &mut storage).unwrap();
        assert_eq!(initial, layout("part.monitor"));
        assert_eq!(storage.read("scion.workbench.perspectives.ops").unwrap(), None);
    }
}
