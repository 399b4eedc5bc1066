//! Notification registry.
//!
//! Showing a notification is a read-modify-write of the registry: a
//! notification with a `group` replaces the previous notification of that
//! group, optionally reducing the previous input into the new one. All
//! mutations run through a [`SerialExecutor`] so two `show` calls never
//! interleave, even when a subscriber shows another notification while the
//! list is being published.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use wb_core::{NotificationId, compute_notification_id};
use wb_layout::CapabilityRef;
use web_time::Duration;

use crate::executor::SerialExecutor;
use crate::observable::{Observable, Subscription};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
}

/// How long a notification stays open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayDuration {
    Short,
    #[default]
    Medium,
    Long,
    /// Until closed.
    Infinite,
}

impl DisplayDuration {
    #[must_use]
    pub fn timeout(self) -> Option<Duration> {
        match self {
            Self::Short => Some(Duration::from_secs(7)),
            Self::Medium => Some(Duration::from_secs(15)),
            Self::Long => Some(Duration::from_secs(30)),
            Self::Infinite => None,
        }
    }
}

/// Folds the previous input of a group into the new one.
pub type GroupReducer = Rc<dyn Fn(&Value, &Value) -> Value>;

#[derive(Clone, Default)]
pub struct NotificationConfig {
    pub id: Option<NotificationId>,
    pub title: Option<String>,
    pub input: Value,
    pub severity: Severity,
    pub duration: DisplayDuration,
    pub group: Option<String>,
    pub reducer: Option<GroupReducer>,
    pub css_classes: Vec<String>,
    pub capability: Option<CapabilityRef>,
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("input", &self.input)
            .field("severity", &self.severity)
            .field("duration", &self.duration)
            .field("group", &self.group)
            .field("reducer", &self.reducer.is_some())
            .finish_non_exhaustive()
    }
}

impl NotificationConfig {
    #[must_use]
    pub fn new(input: Value) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: DisplayDuration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn reduce_with(mut self, reducer: impl Fn(&Value, &Value) -> Value + 'static) -> Self {
        self.reducer = Some(Rc::new(reducer));
        self
    }
}

/// A shown notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: Option<String>,
    pub input: Value,
    pub severity: Severity,
    pub duration: DisplayDuration,
    pub group: Option<String>,
    pub css_classes: Vec<String>,
    pub capability: Option<CapabilityRef>,
}

#[derive(Debug)]
struct RegistryState {
    notifications: Vec<Notification>,
    published: Observable<Vec<Notification>>,
}

impl RegistryState {
    fn publish(&self) {
        self.published.set(self.notifications.clone());
    }
}

/// Open notifications, in display order.
#[derive(Debug, Clone)]
pub struct NotificationRegistry {
    executor: SerialExecutor<RegistryState>,
    published: Observable<Vec<Notification>>,
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRegistry {
    #[must_use]
    pub fn new() -> Self {
        let published = Observable::new(Vec::new());
        Self {
            executor: SerialExecutor::new(RegistryState {
                notifications: Vec::new(),
                published: published.clone(),
            }),
            published,
        }
    }

    /// Show a notification and return its id.
    ///
    /// A notification of an existing group takes the place of the previous
    /// one; with a reducer its input becomes `reducer(previous, new)`.
    pub fn show(&self, config: NotificationConfig) -> NotificationId {
        let id = config.id.clone().unwrap_or_else(compute_notification_id);
        let task_id = id.clone();
        self.executor.submit(move |state| {
            let NotificationConfig {
                title,
                mut input,
                severity,
                duration,
                group,
                reducer,
                css_classes,
                capability,
                ..
            } = config;
            let replaced = state.notifications.iter().position(|existing| {
                existing.id == task_id
                    || (group.is_some() && existing.group == group)
            });
            if let Some(index) = replaced
                && let Some(reducer) = &reducer
                && state.notifications[index].group.is_some()
            {
                input = reducer(&state.notifications[index].input, &input);
            }
            let notification = Notification {
                id: task_id,
                title,
                input,
                severity,
                duration,
                group,
                css_classes,
                capability,
            };
            debug!(id = %notification.id, replaced = replaced.is_some(), "showing notification");
            match replaced {
                Some(index) => state.notifications[index] = notification,
                None => state.notifications.push(notification),
            }
            state.publish();
        });
        id
    }

    pub fn close(&self, id: &NotificationId) {
        let id = id.clone();
        self.executor.submit(move |state| {
            state.notifications.retain(|notification| notification.id != id);
            state.publish();
        });
    }

    pub fn close_all(&self) {
        self.executor.submit(|state| {
            state.notifications.clear();
            state.publish();
        });
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.published.get()
    }

    #[must_use]
    pub fn notification(&self, id: &NotificationId) -> Option<Notification> {
        self.published
            .with(|list| list.iter().find(|notification| &notification.id == id).cloned())
    }

    pub fn subscribe(&self, callback: impl Fn(&Vec<Notification>) + 'static) -> Subscription {
        self.published.subscribe(callback)
    }
}
