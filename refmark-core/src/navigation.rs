use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::catalog::Reference;
use crate::config::EngineConfig;
use crate::marker::{MarkKind, Marker};
use crate::poller::{RenderPoller, ScanReport, SessionToken};
use crate::scanner::{Match, Scanner};
use crate::surface::RenderSurface;
use crate::viewport::{CenterOptions, CenteringEngine, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No phrase selected.
    Idle,
    /// A poll is looking for the phrase.
    Scanning,
    /// Matches are known, or the poll gave up without any.
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightSession {
    pub matches: Vec<Match>,
    pub current_index: Option<usize>,
    pub highlighted_pages: BTreeSet<u32>,
}

impl HighlightSession {
    pub fn current(&self) -> Option<&Match> {
        self.current_index.and_then(|index| self.matches.get(index))
    }

    fn adopt(&mut self, matches: Vec<Match>) {
        self.highlighted_pages = matches.iter().filter_map(|m| m.page_number).collect();
        self.current_index = match self.current_index {
            Some(index) if !matches.is_empty() => Some(index.min(matches.len() - 1)),
            _ => None,
        };
        self.matches = matches;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStarted {
        token: SessionToken,
        reference_id: u32,
    },
    MatchesUpdated {
        token: SessionToken,
        count: usize,
    },
    CurrentMatchChanged {
        index: usize,
        page_number: Option<u32>,
    },
    /// The poll ran out of attempts without finding the phrase.
    NoMatches {
        reference_id: u32,
    },
    /// Highlights were cleared by the user; the host should deselect.
    SelectionCleared,
}

/// Owns the live highlight session and drives scanning, marking and
/// scrolling for it.
pub struct HighlightEngine {
    surface: Arc<dyn RenderSurface>,
    marker: Arc<dyn Marker>,
    viewport: Arc<dyn Viewport>,
    config: EngineConfig,
    poller: RenderPoller,
    token: SessionToken,
    phase: Phase,
    session: HighlightSession,
    selected: Option<Reference>,
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl HighlightEngine {
    pub fn new(
        surface: Arc<dyn RenderSurface>,
        marker: Arc<dyn Marker>,
        viewport: Arc<dyn Viewport>,
        config: EngineConfig,
    ) -> Self {
        Self {
            surface,
            marker,
            viewport,
            poller: RenderPoller::new(config.poll),
            config,
            token: SessionToken::default(),
            phase: Phase::Idle,
            session: HighlightSession::default(),
            selected: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn drain_events(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &HighlightSession {
        &self.session
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn selected(&self) -> Option<&Reference> {
        self.selected.as_ref()
    }

    pub fn match_count(&self) -> usize {
        self.session.matches.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session.current_index
    }

    pub fn highlighted_pages(&self) -> &BTreeSet<u32> {
        &self.session.highlighted_pages
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// When the host loop should call [`HighlightEngine::tick`] next.
    pub fn next_poll_due(&self) -> Option<Instant> {
        self.poller.next_due()
    }

    /// Match counter text: `"2 / 5 matches"` or `"No matches"`.
    pub fn status_label(&self) -> String {
        let total = self.session.matches.len();
        if total == 0 {
            return "No matches".to_string();
        }
        let position = self.session.current_index.map(|i| i + 1).unwrap_or(1);
        format!("{position} / {total} matches")
    }

    /// Replaces the live session with one for `reference`.
    ///
    /// Every mark from earlier sessions is stripped before the first scan of
    /// the new one runs.
    #[instrument(skip_all, fields(id = reference.id, phrase = %reference.target_phrase))]
    pub fn select_phrase(&mut self, reference: &Reference, now: Instant) {
        self.poller.stop_polling();
        self.marker.clear_all();
        self.session = HighlightSession::default();
        self.token = self.token.next();
        self.phase = Phase::Scanning;
        self.selected = Some(reference.clone());
        debug!(token = self.token.value(), "session started");
        self.events.lock().push(EngineEvent::SessionStarted {
            token: self.token,
            reference_id: reference.id,
        });

        let scanner = Scanner::new(self.surface.as_ref(), self.marker.as_ref());
        let report = self
            .poller
            .start_polling(self.token, &reference.target_phrase, now, &scanner);
        self.on_scan_result(report);
    }

    /// Runs a pending retry if it is due.
    pub fn tick(&mut self, now: Instant) {
        let scanner = Scanner::new(self.surface.as_ref(), self.marker.as_ref());
        if let Some(report) = self.poller.poll_tick(now, &scanner) {
            self.on_scan_result(report);
        }
    }

    /// Applies one scan attempt. Reports from superseded sessions are dropped.
    pub fn on_scan_result(&mut self, report: ScanReport) {
        if self.phase == Phase::Idle || report.token != self.token {
            debug!(
                stale = report.token.value(),
                live = self.token.value(),
                "discarding stale scan report"
            );
            return;
        }

        let count = report.matches.len();
        self.session.adopt(report.matches);
        self.events.lock().push(EngineEvent::MatchesUpdated {
            token: report.token,
            count,
        });

        if count == 0 {
            if report.exhausted {
                self.phase = Phase::Ready;
                if let Some(reference) = &self.selected {
                    debug!(attempts = report.attempt, "no matches");
                    self.events.lock().push(EngineEvent::NoMatches {
                        reference_id: reference.id,
                    });
                }
            }
            return;
        }

        self.phase = Phase::Ready;
        if self.session.current_index.is_none() {
            self.set_current(0);
        }
    }

    pub fn next(&mut self) {
        self.refresh_detached_matches();
        let total = self.session.matches.len();
        if total == 0 {
            return;
        }
        let index = match self.session.current_index {
            Some(index) => (index + 1) % total,
            None => 0,
        };
        self.set_current(index);
    }

    pub fn previous(&mut self) {
        self.refresh_detached_matches();
        let total = self.session.matches.len();
        if total == 0 {
            return;
        }
        let index = match self.session.current_index {
            Some(index) => (index + total - 1) % total,
            None => total - 1,
        };
        self.set_current(index);
    }

    /// Strips every mark, returns to idle and tells the host to deselect.
    pub fn clear(&mut self) {
        self.reset();
        self.events.lock().push(EngineEvent::SelectionCleared);
    }

    /// Cancels polling and strips marks when the host goes away.
    pub fn teardown(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.poller.stop_polling();
        self.marker.clear_all();
        self.session = HighlightSession::default();
        self.token = self.token.next();
        self.phase = Phase::Idle;
        self.selected = None;
    }

    fn set_current(&mut self, index: usize) {
        let Some(target) = self.session.matches.get(index) else {
            return;
        };
        let leaf = target.leaf.id;
        let page_number = target.page_number;

        if let Some(previous) = self.session.current() {
            self.marker.unmark(previous.leaf.id, MarkKind::Current);
        }
        self.marker.mark(leaf, MarkKind::Matched);
        self.marker.mark(leaf, MarkKind::Current);
        self.session.current_index = Some(index);

        CenteringEngine::new(self.surface.as_ref(), self.viewport.as_ref()).center_on(
            leaf,
            CenterOptions {
                smooth: self.config.smooth_scroll,
                focus: true,
            },
        );
        self.events.lock().push(EngineEvent::CurrentMatchChanged { index, page_number });
    }

    /// Re-scans the live phrase after the surface changed, for example when
    /// more pages were published. The current match stays current while its
    /// leaf is still mounted.
    pub fn rescan(&mut self) {
        if self.phase != Phase::Ready || self.selected.is_none() {
            return;
        }
        let count = self.rescan_live_phrase();
        debug!(token = self.token.value(), count, "rescanned after surface change");
        self.events.lock().push(EngineEvent::MatchesUpdated {
            token: self.token,
            count,
        });
        if count > 0 && self.session.current_index.is_none() {
            self.set_current(0);
        }
    }

    /// Re-scans when the surface has re-rendered under the known matches.
    fn refresh_detached_matches(&mut self) {
        if self.phase != Phase::Ready
            || self
                .session
                .matches
                .iter()
                .all(|m| self.surface.is_attached(m.leaf.id))
        {
            return;
        }
        let count = self.rescan_live_phrase();
        debug!(count, "re-resolved detached matches");
    }

    fn rescan_live_phrase(&mut self) -> usize {
        let Some(phrase) = self.selected.as_ref().map(|r| r.target_phrase.clone()) else {
            return 0;
        };
        let current = self.session.current().map(|m| m.leaf.id);

        self.marker.clear_all();
        let matches = Scanner::new(self.surface.as_ref(), self.marker.as_ref()).scan(&phrase);
        self.session.adopt(matches);
        if let Some(index) =
            current.and_then(|id| self.session.matches.iter().position(|m| m.leaf.id == id))
        {
            self.session.current_index = Some(index);
        }
        if let Some(current) = self.session.current() {
            self.marker.mark(current.leaf.id, MarkKind::Current);
        }
        self.session.matches.len()
    }
}
