//! Route matching for microfrontend host outlets.
//!
//! The router activates an empty-path host route in every outlet named
//! `workbench.microfrontend.host.<capabilityId>.<elementType>.<elementId>`.
//! The guard decides whether that route may match. It never waits for the
//! capability registry: while the registry is starting up it answers
//! [`GuardVerdict::NotReady`] and remembers the outlet, and the outlets are
//! evaluated again once startup completes.

use tracing::debug;
use wb_layout::MicrofrontendHostOutlet;

use crate::capability::CapabilityResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Match,
    NoMatch,
    /// Retried after startup completes.
    NotReady,
}

#[derive(Debug, Default)]
pub struct RouteGuard {
    pending: Vec<String>,
}

impl RouteGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the outlet named `outlet`.
    ///
    /// `is_referenced` tells whether the element named in the outlet still
    /// references the outlet's capability.
    pub fn evaluate(
        &mut self,
        outlet: &str,
        resolver: &dyn CapabilityResolver,
        is_referenced: impl Fn(&MicrofrontendHostOutlet) -> bool,
    ) -> GuardVerdict {
        let Some(host) = MicrofrontendHostOutlet::parse(outlet) else {
            return GuardVerdict::NoMatch;
        };
        if !resolver.is_ready() {
            if !self.pending.iter().any(|name| name == outlet) {
                self.pending.push(outlet.to_string());
            }
            debug!(outlet, "capability registry not ready; deferring route match");
            return GuardVerdict::NotReady;
        }
        if resolver.lookup(&host.capability_id).is_some() && is_referenced(&host) {
            GuardVerdict::Match
        } else {
            GuardVerdict::NoMatch
        }
    }

    /// Take the outlets awaiting re-evaluation.
    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn pending(&self) -> &[String] {
        &self.pending
    }
}
