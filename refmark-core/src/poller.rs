use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::scanner::{Match, Scanner};

/// Monotonically increasing id of one phrase-selection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "interval_ms")]
    pub interval: Duration,
    /// Total attempts, the immediate one included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_attempts: 8,
        }
    }
}

/// Outcome of one scan attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub token: SessionToken,
    /// 1-based attempt number within the session.
    pub attempt: u32,
    pub matches: Vec<Match>,
    /// Set on the last attempt of a poll that never found a match.
    pub exhausted: bool,
}

#[derive(Debug)]
struct ActivePoll {
    token: SessionToken,
    phrase: String,
    attempts: u32,
    next_due: Instant,
}

/// Bounded retry loop standing in for a render-complete signal.
///
/// The poller owns no timer; the host loop calls [`RenderPoller::poll_tick`]
/// and the poller scans whenever its retry deadline has passed.
#[derive(Debug)]
pub struct RenderPoller {
    policy: RetryPolicy,
    active: Option<ActivePoll>,
}

impl RenderPoller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_token(&self) -> Option<SessionToken> {
        self.active.as_ref().map(|poll| poll.token)
    }

    /// Deadline of the next retry, if one is pending.
    pub fn next_due(&self) -> Option<Instant> {
        self.active.as_ref().map(|poll| poll.next_due)
    }

    /// Cancels any running poll and starts a new one with an immediate scan.
    ///
    /// An empty phrase never starts a poll and reports a definitive empty
    /// result.
    pub fn start_polling(
        &mut self,
        token: SessionToken,
        phrase: &str,
        now: Instant,
        scanner: &Scanner<'_>,
    ) -> ScanReport {
        self.stop_polling();
        if phrase.is_empty() {
            return ScanReport {
                token,
                attempt: 0,
                matches: Vec::new(),
                exhausted: true,
            };
        }
        debug!(token = token.value(), phrase, "poll started");
        self.active = Some(ActivePoll {
            token,
            phrase: phrase.to_owned(),
            attempts: 0,
            next_due: now,
        });
        // next_due == now, so the attempt always runs
        self.poll_tick(now, scanner).unwrap_or(ScanReport {
            token,
            attempt: 0,
            matches: Vec::new(),
            exhausted: true,
        })
    }

    /// Runs one scan attempt if the retry deadline has passed.
    pub fn poll_tick(&mut self, now: Instant, scanner: &Scanner<'_>) -> Option<ScanReport> {
        let poll = self.active.as_mut()?;
        if now < poll.next_due {
            return None;
        }

        poll.attempts += 1;
        let matches = scanner.scan(&poll.phrase);
        let attempt = poll.attempts;
        let token = poll.token;
        let budget_spent = attempt >= self.policy.max_attempts;

        if !matches.is_empty() || budget_spent {
            debug!(
                token = token.value(),
                attempt,
                count = matches.len(),
                "poll finished"
            );
            self.active = None;
        } else {
            poll.next_due = now + self.policy.interval;
        }

        Some(ScanReport {
            token,
            attempt,
            exhausted: matches.is_empty() && budget_spent,
            matches,
        })
    }

    pub fn stop_polling(&mut self) {
        if let Some(poll) = self.active.take() {
            debug!(token = poll.token.value(), "poll cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerSet;
    use crate::memory::MemorySurface;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(300),
            max_attempts: 3,
        }
    }

    #[test]
    fn first_attempt_runs_immediately() {
        let surface = MemorySurface::new();
        surface.push_page(1, &["assets"]);
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        let mut poller = RenderPoller::new(policy());

        let report = poller.start_polling(SessionToken(1), "assets", Instant::now(), &scanner);

        assert_eq!(report.attempt, 1);
        assert_eq!(report.matches.len(), 1);
        assert!(!report.exhausted);
        assert!(!poller.is_active());
    }

    #[test]
    fn retries_on_interval_until_render_arrives() {
        let surface = MemorySurface::new();
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        let mut poller = RenderPoller::new(policy());
        let start = Instant::now();

        let first = poller.start_polling(SessionToken(1), "assets", start, &scanner);
        assert!(first.matches.is_empty());
        assert!(!first.exhausted);
        assert_eq!(poller.next_due(), Some(start + Duration::from_millis(300)));

        assert!(poller
            .poll_tick(start + Duration::from_millis(100), &scanner)
            .is_none());

        surface.push_page(1, &["Total assets"]);
        let second = poller
            .poll_tick(start + Duration::from_millis(300), &scanner)
            .unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(second.matches.len(), 1);
        assert!(!poller.is_active());
    }

    #[test]
    fn budget_exhaustion_is_reported_once() {
        let surface = MemorySurface::new();
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        let mut poller = RenderPoller::new(policy());
        let mut now = Instant::now();

        let mut reports = vec![poller.start_polling(SessionToken(4), "assets", now, &scanner)];
        while poller.is_active() {
            now += Duration::from_millis(300);
            reports.extend(poller.poll_tick(now, &scanner));
        }

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.token == SessionToken(4)));
        assert_eq!(
            reports.iter().map(|r| r.exhausted).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert!(poller.poll_tick(now + Duration::from_secs(5), &scanner).is_none());
    }

    #[test]
    fn stop_cancels_pending_retry() {
        let surface = MemorySurface::new();
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        let mut poller = RenderPoller::new(policy());
        let now = Instant::now();

        poller.start_polling(SessionToken(1), "assets", now, &scanner);
        assert_eq!(poller.active_token(), Some(SessionToken(1)));
        poller.stop_polling();
        assert_eq!(poller.active_token(), None);
        surface.push_page(1, &["assets"]);

        assert!(poller.poll_tick(now + Duration::from_secs(1), &scanner).is_none());
        assert!(marker.is_empty());
    }

    #[test]
    fn empty_phrase_never_polls() {
        let surface = MemorySurface::new();
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        let mut poller = RenderPoller::new(policy());

        let report = poller.start_polling(SessionToken(2), "", Instant::now(), &scanner);

        assert!(report.exhausted);
        assert!(report.matches.is_empty());
        assert!(!poller.is_active());
    }
}
