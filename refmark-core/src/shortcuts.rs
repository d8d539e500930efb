use std::time::{Duration, Instant};

use crate::catalog::Reference;

/// How long an accessibility announcement stays live.
pub const ANNOUNCEMENT_TTL: Duration = Duration::from_secs(1);

/// Input context the dispatcher needs to decide whether to act.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchContext {
    /// Focus is inside a text-editable control; digits belong to it.
    pub text_input_focused: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortcut<'r> {
    pub reference: &'r Reference,
    pub announcement: String,
}

/// Maps digit keys 1-9 to the reference with the same id.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortcutDispatcher;

impl ShortcutDispatcher {
    pub fn dispatch<'r>(
        &self,
        key: char,
        references: &'r [Reference],
        context: DispatchContext,
    ) -> Option<Shortcut<'r>> {
        if context.text_input_focused {
            return None;
        }
        let id = key.to_digit(10).filter(|digit| (1..=9).contains(digit))?;
        let reference = references.iter().find(|reference| reference.id == id)?;
        Some(Shortcut {
            reference,
            announcement: format!(
                "Navigating to reference {}: {}",
                id, reference.description
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub text: String,
    pub expires_at: Instant,
}

/// Transient, polite live region: announcements disappear on their own.
#[derive(Debug, Default)]
pub struct AnnouncementQueue {
    live: Vec<Announcement>,
}

impl AnnouncementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>, now: Instant) {
        self.live.push(Announcement {
            text: text.into(),
            expires_at: now + ANNOUNCEMENT_TTL,
        });
    }

    /// Drops expired announcements; returns whether anything was removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.live.len();
        self.live.retain(|announcement| announcement.expires_at > now);
        before != self.live.len()
    }

    /// Most recent live announcement.
    pub fn latest(&self) -> Option<&Announcement> {
        self.live.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references() -> Vec<Reference> {
        vec![
            Reference::new(1, "Strategic asset management", "assets"),
            Reference::new(3, "Highlights Q2 2025", "EBITDA increase"),
        ]
    }

    #[test]
    fn digits_select_matching_reference() {
        let refs = references();
        let shortcut = ShortcutDispatcher
            .dispatch('3', &refs, DispatchContext::default())
            .unwrap();
        assert_eq!(shortcut.reference.id, 3);
        assert_eq!(
            shortcut.announcement,
            "Navigating to reference 3: Highlights Q2 2025"
        );
    }

    #[test]
    fn other_keys_and_unknown_ids_are_ignored() {
        let refs = references();
        let ctx = DispatchContext::default();
        assert!(ShortcutDispatcher.dispatch('2', &refs, ctx).is_none());
        assert!(ShortcutDispatcher.dispatch('0', &refs, ctx).is_none());
        assert!(ShortcutDispatcher.dispatch('a', &refs, ctx).is_none());
        assert!(ShortcutDispatcher.dispatch('\u{0663}', &refs, ctx).is_none());
    }

    #[test]
    fn text_input_focus_suppresses_dispatch() {
        let refs = references();
        let ctx = DispatchContext {
            text_input_focused: true,
        };
        assert!(ShortcutDispatcher.dispatch('1', &refs, ctx).is_none());
    }

    #[test]
    fn announcements_expire() {
        let mut queue = AnnouncementQueue::new();
        let now = Instant::now();
        queue.push("Navigating to reference 1: Strategic asset management", now);

        assert!(!queue.prune(now + Duration::from_millis(500)));
        assert!(queue.latest().is_some());
        assert!(queue.prune(now + ANNOUNCEMENT_TTL));
        assert!(queue.latest().is_none());
    }
}
