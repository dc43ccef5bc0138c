//! Host notification.
//!
//! The host (a UI layer, a test harness) learns about state changes through a
//! [`HostNotifier`]. Every notification bumps the form revision, a counter
//! that only ever increases. Notifications are suppressed while the form is
//! being constructed and coalesced while a batch is open.

use serde::Serialize;
use std::fmt;

/// Payload for state-setter style hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionState {
    pub form_revision: u64,
}

/// How the host wants to be told about changes.
pub enum HostNotifier {
    /// Called with the new revision number
    Callback(Box<dyn FnMut(u64) + Send + Sync>),
    /// Called with a state object carrying the new revision
    StateSetter(Box<dyn FnMut(RevisionState) + Send + Sync>),
    /// No host; revisions are still counted
    Detached,
}

impl HostNotifier {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(u64) + Send + Sync + 'static,
    {
        Self::Callback(Box::new(f))
    }

    pub fn state_setter<F>(f: F) -> Self
    where
        F: FnMut(RevisionState) + Send + Sync + 'static,
    {
        Self::StateSetter(Box::new(f))
    }

    pub fn detached() -> Self {
        Self::Detached
    }

    fn send(&mut self, revision: u64) {
        match self {
            Self::Callback(f) => f(revision),
            Self::StateSetter(f) => f(RevisionState {
                form_revision: revision,
            }),
            Self::Detached => {}
        }
    }
}

impl fmt::Debug for HostNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("HostNotifier::Callback"),
            Self::StateSetter(_) => f.write_str("HostNotifier::StateSetter"),
            Self::Detached => f.write_str("HostNotifier::Detached"),
        }
    }
}

/// Revision counter plus batching around a [`HostNotifier`].
#[derive(Debug)]
pub struct Notifier {
    host: HostNotifier,
    revision: u64,
    armed: bool,
    batch_depth: usize,
    pending: bool,
}

impl Notifier {
    /// A notifier that stays silent until [`Notifier::arm`] is called.
    pub fn new(host: HostNotifier) -> Self {
        Self {
            host,
            revision: 0,
            armed: false,
            batch_depth: 0,
            pending: false,
        }
    }

    /// Start delivering notifications.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Report a change. Inside a batch the change is remembered and
    /// delivered once when the outermost batch ends.
    pub fn notify(&mut self) {
        if !self.armed {
            return;
        }
        if self.batch_depth > 0 {
            self.pending = true;
            return;
        }
        self.revision += 1;
        tracing::trace!(revision = self.revision, "notifying host");
        self.host.send(self.revision);
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.pending {
            self.pending = false;
            self.notify();
        }
    }
}
