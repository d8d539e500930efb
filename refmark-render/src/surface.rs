use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use refmark_core::{LeafId, PageContainer, Rect, RenderSurface, TextLeaf};
use uuid::Uuid;

/// Rows taken by the page title above each page.
pub const HEADER_ROWS: usize = 1;
const GAP_ROWS: usize = 1;

#[derive(Debug, Clone)]
enum PageSlot {
    Pending,
    Rendered { render: Uuid, lines: Vec<String> },
    Failed,
}

impl PageSlot {
    fn body_rows(&self) -> usize {
        match self {
            PageSlot::Rendered { lines, .. } => lines.len(),
            PageSlot::Pending | PageSlot::Failed => 1,
        }
    }

    fn total_rows(&self) -> usize {
        HEADER_ROWS + self.body_rows() + GAP_ROWS
    }
}

/// One terminal row of the laid out surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRow {
    PageHeader { page: u32 },
    Text { leaf: LeafId, text: String },
    Pending { page: u32 },
    Failed { page: u32 },
    Blank,
}

/// Row-based text surface that pages are published into one at a time.
///
/// Each extracted line of a page is one leaf, one row tall. Pages that have
/// not been extracted yet take a placeholder row and expose no leaves.
#[derive(Debug, Default)]
pub struct TextSurface {
    pages: RwLock<Vec<PageSlot>>,
    revision: AtomicU64,
    closed: AtomicBool,
}

impl TextSurface {
    /// A surface with no mounted pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lays out `page_count` pending pages.
    pub fn mount(&self, page_count: usize) {
        *self.pages.write() = vec![PageSlot::Pending; page_count];
        self.bump();
    }

    /// Installs the extracted lines of a page, replacing any earlier render.
    pub fn publish(&self, index: usize, lines: Vec<String>) {
        if let Some(slot) = self.pages.write().get_mut(index) {
            *slot = PageSlot::Rendered {
                render: Uuid::new_v4(),
                lines,
            };
        }
        self.bump();
    }

    pub fn mark_failed(&self, index: usize) {
        if let Some(slot) = self.pages.write().get_mut(index) {
            *slot = PageSlot::Failed;
        }
        self.bump();
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    pub fn rendered_pages(&self) -> usize {
        self.pages
            .read()
            .iter()
            .filter(|slot| matches!(slot, PageSlot::Rendered { .. }))
            .count()
    }

    /// Whether every mounted page has either rendered or failed.
    pub fn is_settled(&self) -> bool {
        let pages = self.pages.read();
        !pages.is_empty() && pages.iter().all(|slot| !matches!(slot, PageSlot::Pending))
    }

    /// Changes whenever the layout or content changes.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Asks background extraction to stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn total_rows(&self) -> usize {
        self.pages.read().iter().map(PageSlot::total_rows).sum()
    }

    pub fn rows(&self) -> Vec<SurfaceRow> {
        let pages = self.pages.read();
        let mut rows = Vec::new();
        for (index, slot) in pages.iter().enumerate() {
            let page = index as u32 + 1;
            rows.push(SurfaceRow::PageHeader { page });
            match slot {
                PageSlot::Rendered { render, lines } => {
                    rows.extend(lines.iter().enumerate().map(|(i, text)| SurfaceRow::Text {
                        leaf: LeafId::new(*render, i as u32),
                        text: text.clone(),
                    }));
                }
                PageSlot::Pending => rows.push(SurfaceRow::Pending { page }),
                PageSlot::Failed => rows.push(SurfaceRow::Failed { page }),
            }
            rows.push(SurfaceRow::Blank);
        }
        rows
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}

impl RenderSurface for TextSurface {
    fn page_containers(&self) -> Vec<PageContainer> {
        self.pages
            .read()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                PageSlot::Rendered { render, lines } => Some(PageContainer {
                    label: Some(format!("Page {}", index + 1)),
                    page_attr: Some((index + 1).to_string()),
                    leaves: lines
                        .iter()
                        .enumerate()
                        .map(|(i, text)| TextLeaf {
                            id: LeafId::new(*render, i as u32),
                            text: text.clone(),
                        })
                        .collect(),
                }),
                PageSlot::Pending | PageSlot::Failed => None,
            })
            .collect()
    }

    fn leaf_rect(&self, leaf: LeafId) -> Option<Rect> {
        let pages = self.pages.read();
        let mut top = 0;
        for slot in pages.iter() {
            if let PageSlot::Rendered { render, lines } = slot {
                if *render == leaf.render {
                    let text = lines.get(leaf.index as usize)?;
                    return Some(Rect::new(
                        0.0,
                        (top + HEADER_ROWS + leaf.index as usize) as f64,
                        text.chars().count() as f64,
                        1.0,
                    ));
                }
            }
            top += slot.total_rows();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    use refmark_core::{
        EngineConfig, HighlightEngine, MarkKind, MarkerSet, MemoryViewport, Rect, Reference,
        Scanner,
    };

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unmounted_surface_exposes_nothing() {
        let surface = TextSurface::new();
        assert!(surface.page_containers().is_empty());
        assert!(surface.rows().is_empty());
        assert!(!surface.is_settled());
    }

    #[test]
    fn pending_pages_hold_placeholder_rows() {
        let surface = TextSurface::new();
        surface.mount(2);
        surface.publish(1, lines(&["Total assets", "Equity"]));

        assert_eq!(
            surface.rows()[..4],
            [
                SurfaceRow::PageHeader { page: 1 },
                SurfaceRow::Pending { page: 1 },
                SurfaceRow::Blank,
                SurfaceRow::PageHeader { page: 2 },
            ]
        );
        assert_eq!(surface.total_rows(), 3 + 4);

        let containers = surface.page_containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].label.as_deref(), Some("Page 2"));
    }

    #[test]
    fn leaf_rect_follows_layout_changes() {
        let surface = TextSurface::new();
        surface.mount(2);
        surface.publish(1, lines(&["Total assets"]));
        let leaf = surface.page_containers()[0].leaves[0].id;
        // page 1 placeholder: header + pending + gap, then page 2 header
        assert_eq!(surface.leaf_rect(leaf).unwrap().top, 4.0);

        surface.publish(0, lines(&["a", "b", "c"]));
        assert_eq!(surface.leaf_rect(leaf).unwrap().top, 6.0);

        surface.publish(1, lines(&["Total assets"]));
        assert!(surface.leaf_rect(leaf).is_none());
    }

    #[test]
    fn scanner_sees_published_pages_only() {
        let surface = TextSurface::new();
        surface.mount(3);
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        assert!(scanner.scan("assets").is_empty());

        surface.publish(2, lines(&["Non-current assets"]));
        surface.publish(0, lines(&["Total assets"]));

        let pages: Vec<_> = scanner
            .scan("assets")
            .iter()
            .map(|m| m.page_number)
            .collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
    }

    #[test]
    fn revision_tracks_every_change() {
        let surface = TextSurface::new();
        let start = surface.revision();
        surface.mount(1);
        surface.mark_failed(0);
        assert_eq!(surface.revision(), start + 2);
        assert!(surface.is_settled());
        assert_eq!(surface.rendered_pages(), 0);
    }

    #[test]
    fn engine_rescan_finds_pages_published_after_first_hit() {
        let surface = Arc::new(TextSurface::new());
        surface.mount(2);
        surface.publish(0, lines(&["Total assets"]));
        let marker = Arc::new(MarkerSet::new());
        let mut engine = HighlightEngine::new(
            surface.clone(),
            marker.clone(),
            Arc::new(MemoryViewport::new(Rect::new(0.0, 0.0, 80.0, 20.0))),
            EngineConfig::default(),
        );

        let now = Instant::now();
        engine.select_phrase(&Reference::new(2, "Strategic asset management", "assets"), now);
        assert_eq!(engine.match_count(), 1);
        assert!(!engine.is_polling());

        surface.publish(1, lines(&["Non-current assets", "Assets held for sale"]));
        engine.tick(now);
        assert_eq!(engine.match_count(), 1);
        engine.rescan();

        assert_eq!(engine.match_count(), 3);
        let pages: Vec<u32> = engine.highlighted_pages().iter().copied().collect();
        assert_eq!(pages, vec![1, 2]);
        assert_eq!(marker.marked(MarkKind::Matched).len(), 3);
        assert_eq!(engine.current_index(), Some(0));
    }
}
