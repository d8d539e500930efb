use parking_lot::Mutex;
use refmark_core::{LeafId, Rect, ScrollBehavior, Viewport};

/// Rows scrolled per animation step are a third of the remaining distance,
/// at least one.
const SMOOTH_DIVISOR: f64 = 3.0;

/// The text pane of the terminal: every row but the status line.
///
/// Scroll offsets are in rows. Smooth scrolls are stepped by the host loop
/// through [`TerminalViewport::advance_animation`].
#[derive(Debug)]
pub struct TerminalViewport {
    smooth: bool,
    state: Mutex<ViewportState>,
}

#[derive(Debug, Default)]
struct ViewportState {
    columns: u16,
    body_rows: u16,
    content_rows: usize,
    scroll_top: f64,
    target: Option<f64>,
    focused: Option<LeafId>,
}

impl ViewportState {
    fn max_top(&self) -> f64 {
        self.content_rows.saturating_sub(self.body_rows as usize) as f64
    }

    fn clamp(&self, top: f64) -> f64 {
        top.clamp(0.0, self.max_top())
    }
}

impl TerminalViewport {
    /// `rows` is the full terminal height; one row is kept for the status line.
    pub fn new(columns: u16, rows: u16, smooth: bool) -> Self {
        Self {
            smooth,
            state: Mutex::new(ViewportState {
                columns,
                body_rows: rows.saturating_sub(1),
                ..ViewportState::default()
            }),
        }
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        let mut state = self.state.lock();
        state.columns = columns;
        state.body_rows = rows.saturating_sub(1);
        state.scroll_top = state.clamp(state.scroll_top);
    }

    pub fn columns(&self) -> u16 {
        self.state.lock().columns
    }

    pub fn body_rows(&self) -> u16 {
        self.state.lock().body_rows
    }

    /// Keeps the scroll range in step with the surface layout.
    pub fn set_content_rows(&self, rows: usize) {
        let mut state = self.state.lock();
        state.content_rows = rows;
        state.scroll_top = state.clamp(state.scroll_top);
        if let Some(target) = state.target {
            state.target = Some(state.clamp(target));
        }
    }

    /// First surface row on screen.
    pub fn first_row(&self) -> usize {
        self.state.lock().scroll_top as usize
    }

    pub fn focused(&self) -> Option<LeafId> {
        self.state.lock().focused
    }

    pub fn is_animating(&self) -> bool {
        self.state.lock().target.is_some()
    }

    /// Manual scroll; cancels any running animation.
    pub fn scroll_by(&self, rows: isize) {
        let mut state = self.state.lock();
        state.target = None;
        state.scroll_top = state.clamp(state.scroll_top + rows as f64);
    }

    pub fn scroll_pages(&self, pages: isize) {
        let page = self.body_rows().saturating_sub(1).max(1) as isize;
        self.scroll_by(pages * page);
    }

    pub fn scroll_to_top(&self) {
        self.scroll_to(0.0, ScrollBehavior::Instant);
    }

    pub fn scroll_to_bottom(&self) {
        let bottom = self.state.lock().max_top();
        self.scroll_to(bottom, ScrollBehavior::Instant);
    }

    /// Moves one step toward the smooth scroll target. Returns whether the
    /// offset changed.
    pub fn advance_animation(&self) -> bool {
        let mut state = self.state.lock();
        let Some(target) = state.target else {
            return false;
        };
        let distance = target - state.scroll_top;
        if distance.abs() < 1.0 {
            state.scroll_top = target;
            state.target = None;
            return true;
        }
        let step = (distance.abs() / SMOOTH_DIVISOR).ceil().max(1.0);
        state.scroll_top += step.copysign(distance);
        if (target - state.scroll_top).abs() < f64::EPSILON {
            state.target = None;
        }
        true
    }
}

impl Viewport for TerminalViewport {
    fn container_rect(&self) -> Option<Rect> {
        let state = self.state.lock();
        if state.body_rows == 0 {
            return None;
        }
        Some(Rect::new(
            0.0,
            0.0,
            state.columns as f64,
            state.body_rows as f64,
        ))
    }

    fn scroll_top(&self) -> f64 {
        self.state.lock().scroll_top
    }

    fn supports_smooth_scroll(&self) -> bool {
        self.smooth
    }

    fn scroll_to(&self, top: f64, behavior: ScrollBehavior) {
        let mut state = self.state.lock();
        let top = state.clamp(top);
        match behavior {
            ScrollBehavior::Instant => {
                state.scroll_top = top;
                state.target = None;
            }
            ScrollBehavior::Smooth => state.target = Some(top),
        }
    }

    fn focus(&self, leaf: LeafId) {
        self.state.lock().focused = Some(leaf);
    }
}
