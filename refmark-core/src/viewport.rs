use tracing::debug;

use crate::surface::{LeafId, Rect, RenderSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CenterOptions {
    pub smooth: bool,
    pub focus: bool,
}

/// The scrollable container the surface is mounted in.
pub trait Viewport: Send + Sync {
    /// Container bounds in client coordinates, `None` while it is not mounted.
    fn container_rect(&self) -> Option<Rect>;
    fn scroll_top(&self) -> f64;
    fn supports_smooth_scroll(&self) -> bool {
        true
    }
    fn scroll_to(&self, top: f64, behavior: ScrollBehavior);
    /// Moves keyboard focus to the leaf.
    fn focus(&self, leaf: LeafId);
}

/// Scroll offset that puts the leaf's vertical center on the container's,
/// floored to whole units and never negative. Both rects are in client
/// coordinates.
pub fn centered_scroll_top(scroll_top: f64, container: Rect, leaf: Rect) -> f64 {
    let delta = leaf.top - container.top;
    (scroll_top + delta - container.height / 2.0 + leaf.height / 2.0)
        .floor()
        .max(0.0)
}

pub struct CenteringEngine<'a> {
    surface: &'a dyn RenderSurface,
    viewport: &'a dyn Viewport,
}

impl<'a> CenteringEngine<'a> {
    pub fn new(surface: &'a dyn RenderSurface, viewport: &'a dyn Viewport) -> Self {
        Self { surface, viewport }
    }

    /// Scrolls the leaf into the middle of the viewport. Returns the target
    /// offset, or `None` when the leaf is stale or the container is absent.
    pub fn center_on(&self, leaf: LeafId, options: CenterOptions) -> Option<f64> {
        let container = self.viewport.container_rect()?;
        let Some(content_rect) = self.surface.leaf_rect(leaf) else {
            debug!(?leaf, "skipping centering on detached leaf");
            return None;
        };

        let scroll_top = self.viewport.scroll_top();
        let client_rect = content_rect.offset_y(container.top - scroll_top);
        let target = centered_scroll_top(scroll_top, container, client_rect);

        let behavior = if options.smooth && self.viewport.supports_smooth_scroll() {
            ScrollBehavior::Smooth
        } else {
            ScrollBehavior::Instant
        };
        self.viewport.scroll_to(target, behavior);
        if options.focus {
            self.viewport.focus(leaf);
        }
        Some(target)
    }
}
