use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::surface::{LeafId, PageContainer, Rect, RenderSurface, TextLeaf};
use crate::viewport::{ScrollBehavior, Viewport};

const LINE_HEIGHT: f64 = 20.0;
const PAGE_GAP: f64 = 40.0;
const GLYPH_WIDTH: f64 = 8.0;

/// A render surface held entirely in memory.
///
/// Pages are stacked vertically, one leaf per line. Useful for tests and
/// for hosts that already have extracted text.
#[derive(Debug, Default)]
pub struct MemorySurface {
    pages: RwLock<Vec<MemoryPage>>,
}

#[derive(Debug, Clone)]
struct MemoryPage {
    label: Option<String>,
    page_attr: Option<String>,
    render: Uuid,
    leaves: Vec<String>,
}

impl MemoryPage {
    fn height(&self) -> f64 {
        self.leaves.len() as f64 * LINE_HEIGHT + PAGE_GAP
    }
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a page labelled `"Page {number}"`.
    pub fn push_page(&self, number: u32, leaves: &[&str]) {
        self.push_container(
            Some(&format!("Page {number}")),
            Some(&number.to_string()),
            leaves,
        );
    }

    pub fn push_container(&self, label: Option<&str>, page_attr: Option<&str>, leaves: &[&str]) {
        self.pages.write().push(MemoryPage {
            label: label.map(str::to_owned),
            page_attr: page_attr.map(str::to_owned),
            render: Uuid::new_v4(),
            leaves: leaves.iter().map(|s| s.to_string()).collect(),
        });
    }

    /// Re-renders every page, invalidating all previously handed out handles.
    pub fn rerender(&self) {
        for page in self.pages.write().iter_mut() {
            page.render = Uuid::new_v4();
        }
    }

}

impl RenderSurface for MemorySurface {
    fn page_containers(&self) -> Vec<PageContainer> {
        self.pages
            .read()
            .iter()
            .map(|page| PageContainer {
                label: page.label.clone(),
                page_attr: page.page_attr.clone(),
                leaves: page
                    .leaves
                    .iter()
                    .enumerate()
                    .map(|(index, text)| TextLeaf {
                        id: LeafId::new(page.render, index as u32),
                        text: text.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn leaf_rect(&self, leaf: LeafId) -> Option<Rect> {
        let pages = self.pages.read();
        let mut page_top = 0.0;
        for page in pages.iter() {
            if page.render == leaf.render {
                let text = page.leaves.get(leaf.index as usize)?;
                return Some(Rect::new(
                    0.0,
                    page_top + leaf.index as f64 * LINE_HEIGHT,
                    text.chars().count() as f64 * GLYPH_WIDTH,
                    LINE_HEIGHT,
                ));
            }
            page_top += page.height();
        }
        None
    }
}

/// A viewport with a fixed container that jumps straight to every target.
#[derive(Debug)]
pub struct MemoryViewport {
    container: Rect,
    state: Mutex<MemoryViewportState>,
}

#[derive(Debug, Default)]
struct MemoryViewportState {
    scroll_top: f64,
    focused: Option<LeafId>,
    scrolls: usize,
}

impl MemoryViewport {
    pub fn new(container: Rect) -> Self {
        Self {
            container,
            state: Mutex::new(MemoryViewportState::default()),
        }
    }

    pub fn focused(&self) -> Option<LeafId> {
        self.state.lock().focused
    }

    /// Number of scrolls performed so far.
    pub fn scroll_count(&self) -> usize {
        self.state.lock().scrolls
    }
}

impl Viewport for MemoryViewport {
    fn container_rect(&self) -> Option<Rect> {
        Some(self.container)
    }

    fn scroll_top(&self) -> f64 {
        self.state.lock().scroll_top
    }

    fn scroll_to(&self, top: f64, _behavior: ScrollBehavior) {
        let mut state = self.state.lock();
        state.scroll_top = top;
        state.scrolls += 1;
    }

    fn focus(&self, leaf: LeafId) {
        self.state.lock().focused = Some(leaf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_are_stacked_across_pages() {
        let surface = MemorySurface::new();
        surface.push_page(1, &["a", "b"]);
        surface.push_page(2, &["c"]);

        let containers = surface.page_containers();
        let first = containers[1].leaves[0].id;
        let rect = surface.leaf_rect(first).unwrap();
        assert_eq!(rect.top, 2.0 * LINE_HEIGHT + PAGE_GAP);
        assert_eq!(rect.height, LINE_HEIGHT);
    }

    #[test]
    fn rerender_detaches_old_handles() {
        let surface = MemorySurface::new();
        surface.push_page(1, &["alpha"]);
        let old = surface.page_containers()[0].leaves[0].id;
        assert!(surface.is_attached(old));

        surface.rerender();

        assert!(!surface.is_attached(old));
        let fresh = surface.page_containers()[0].leaves[0].id;
        assert!(surface.is_attached(fresh));
    }
}
