//! In-memory directory of known targets and their sessions.
//!
//! Pure state; no I/O. Owned by exactly one worker.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::identifiers::{SessionId, TargetId};
use crate::protocol::TargetInfo;

// ============================================================================
// TargetPhase
// ============================================================================

/// Where a target stands in the attach/evaluate flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TargetPhase {
    /// Reported by a creation event.
    #[default]
    Seen,
    /// Attach command sent, no session yet.
    Attaching,
    /// Session bound.
    Attached,
    /// Title/URL evaluation sent.
    DetailsRequested,
    /// At least one rule or the settings bootstrap fired.
    Matched,
    /// Details arrived and nothing matched.
    Unmatched,
}

// ============================================================================
// Target
// ============================================================================

/// One page known to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Browser-assigned id.
    pub target_id: TargetId,
    /// Last known URL.
    pub url: String,
    /// Last known title.
    pub title: String,
    /// Whether a session is bound.
    pub attached: bool,
    /// Progress through the attach/evaluate flow.
    pub phase: TargetPhase,
    /// Details were asked for before the session was bound.
    pub details_deferred: bool,
}

impl Target {
    /// Creates an unattached target.
    #[must_use]
    pub fn new(target_id: TargetId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            target_id,
            url: url.into(),
            title: title.into(),
            attached: false,
            phase: TargetPhase::Seen,
            details_deferred: false,
        }
    }
}

impl From<&TargetInfo> for Target {
    fn from(info: &TargetInfo) -> Self {
        Self::new(info.target_id.clone(), info.url.clone(), info.title.clone())
    }
}

// ============================================================================
// TargetDirectory
// ============================================================================

/// Known targets and the session bound to each.
#[derive(Debug, Default)]
pub struct TargetDirectory {
    targets: FxHashMap<TargetId, Target>,
    sessions: FxHashMap<TargetId, SessionId>,
    by_session: FxHashMap<SessionId, TargetId>,
}

impl TargetDirectory {
    /// Creates an empty directory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a target or refreshes its URL and title.
    ///
    /// Attachment state and phase of a known target are kept.
    pub fn upsert(&mut self, target: Target) {
        match self.targets.get_mut(&target.target_id) {
            Some(known) => {
                known.url = target.url;
                known.title = target.title;
            }
            None => {
                self.targets.insert(target.target_id.clone(), target);
            }
        }
    }

    /// Binds `session_id` to `target_id`.
    ///
    /// Idempotent: re-binding replaces the previous session rather than
    /// adding a second one. Unknown targets are created.
    pub fn mark_attached(&mut self, target_id: &TargetId, session_id: SessionId) {
        if let Some(previous) = self.sessions.insert(target_id.clone(), session_id.clone())
            && previous != session_id
        {
            self.by_session.remove(&previous);
        }
        self.by_session.insert(session_id, target_id.clone());

        let target = self
            .targets
            .entry(target_id.clone())
            .or_insert_with(|| Target::new(target_id.clone(), "", ""));
        target.attached = true;
        if matches!(target.phase, TargetPhase::Seen | TargetPhase::Attaching) {
            target.phase = TargetPhase::Attached;
        }
    }

    /// Returns the target, if known.
    #[inline]
    #[must_use]
    pub fn get(&self, target_id: &TargetId) -> Option<&Target> {
        self.targets.get(target_id)
    }

    /// Returns the target mutably, if known.
    #[inline]
    pub fn get_mut(&mut self, target_id: &TargetId) -> Option<&mut Target> {
        self.targets.get_mut(target_id)
    }

    /// Returns the session bound to `target_id`, if any.
    #[inline]
    #[must_use]
    pub fn session_for(&self, target_id: &TargetId) -> Option<&SessionId> {
        self.sessions.get(target_id)
    }

    /// Returns the target a session belongs to, if any.
    #[inline]
    #[must_use]
    pub fn target_for_session(&self, session_id: &SessionId) -> Option<&TargetId> {
        self.by_session.get(session_id)
    }

    /// Sets a known target's phase. Unknown targets are ignored.
    pub fn set_phase(&mut self, target_id: &TargetId, phase: TargetPhase) {
        if let Some(target) = self.targets.get_mut(target_id) {
            target.phase = phase;
        }
    }

    /// Unbinds a session. Returns the target it belonged to.
    pub fn detach(&mut self, session_id: &SessionId) -> Option<TargetId> {
        let target_id = self.by_session.remove(session_id)?;
        self.sessions.remove(&target_id);
        if let Some(target) = self.targets.get_mut(&target_id) {
            target.attached = false;
        }
        Some(target_id)
    }

    /// Forgets a target and its session.
    pub fn remove(&mut self, target_id: &TargetId) -> Option<Target> {
        if let Some(session_id) = self.sessions.remove(target_id) {
            self.by_session.remove(&session_id);
        }
        self.targets.remove(target_id)
    }

    /// Number of known targets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if no targets are known.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of bound sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str) -> Target {
        Target::new(TargetId::from(id), "https://steamloopback.host/", "Steam")
    }

    #[test]
    fn test_upsert_then_get() {
        let mut directory = TargetDirectory::new();
        directory.upsert(target("T1"));

        let known = directory.get(&TargetId::from("T1")).expect("known");
        assert_eq!(known.title, "Steam");
        assert!(!known.attached);
        assert_eq!(known.phase, TargetPhase::Seen);
        assert!(directory.session_for(&TargetId::from("T1")).is_none());
    }

    #[test]
    fn test_upsert_keeps_attachment() {
        let mut directory = TargetDirectory::new();
        let id = TargetId::from("T1");
        directory.upsert(target("T1"));
        directory.mark_attached(&id, SessionId::from("S1"));

        directory.upsert(Target::new(id.clone(), "https://other/", "Other"));

        let known = directory.get(&id).expect("known");
        assert!(known.attached);
        assert_eq!(known.title, "Other");
        assert_eq!(known.phase, TargetPhase::Attached);
    }

    #[test]
    fn test_mark_attached_is_idempotent() {
        let mut directory = TargetDirectory::new();
        let id = TargetId::from("T1");
        directory.upsert(target("T1"));

        directory.mark_attached(&id, SessionId::from("S1"));
        directory.mark_attached(&id, SessionId::from("S1"));
        assert_eq!(directory.session_count(), 1);

        directory.mark_attached(&id, SessionId::from("S2"));
        assert_eq!(directory.session_count(), 1);
        assert_eq!(directory.session_for(&id), Some(&SessionId::from("S2")));
        assert!(directory.target_for_session(&SessionId::from("S1")).is_none());
        assert_eq!(directory.target_for_session(&SessionId::from("S2")), Some(&id));
    }

    #[test]
    fn test_detach_and_remove() {
        let mut directory = TargetDirectory::new();
        let id = TargetId::from("T1");
        directory.upsert(target("T1"));
        directory.mark_attached(&id, SessionId::from("S1"));

        assert_eq!(directory.detach(&SessionId::from("S1")), Some(id.clone()));
        assert!(!directory.get(&id).expect("known").attached);
        assert!(directory.session_for(&id).is_none());

        directory.mark_attached(&id, SessionId::from("S3"));
        assert!(directory.remove(&id).is_some());
        assert!(directory.is_empty());
        assert_eq!(directory.session_count(), 0);
        assert!(directory.target_for_session(&SessionId::from("S3")).is_none());
    }
}
