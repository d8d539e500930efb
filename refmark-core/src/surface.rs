use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Handle to one text leaf of one render pass.
///
/// `render` identifies the pass that produced the page; once the surface
/// re-renders a page every handle minted by the previous pass is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId {
    pub render: Uuid,
    pub index: u32,
}

impl LeafId {
    pub fn new(render: Uuid, index: u32) -> Self {
        Self { render, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn offset_y(self, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLeaf {
    pub id: LeafId,
    pub text: String,
}

/// One mounted page as the render surface exposes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContainer {
    /// Accessible label of the page, e.g. `"Page 3"`.
    pub label: Option<String>,
    /// Page number attribute of the wrapper the page is mounted in.
    pub page_attr: Option<String>,
    pub leaves: Vec<TextLeaf>,
}

/// The externally rendered, paginated text surface.
pub trait RenderSurface: Send + Sync {
    /// Every currently mounted page, in document order. An unmounted surface
    /// returns an empty list.
    fn page_containers(&self) -> Vec<PageContainer>;

    /// Bounds of a leaf relative to the top of the scrollable content, or
    /// `None` if the handle no longer refers to a mounted leaf.
    fn leaf_rect(&self, leaf: LeafId) -> Option<Rect>;

    fn is_attached(&self, leaf: LeafId) -> bool {
        self.leaf_rect(leaf).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentLeaf {
    pub id: LeafId,
    pub text: String,
    pub page_number: Option<u32>,
}

/// Read-only view of a [`RenderSurface`] as a flat list of leaves.
pub struct SurfaceAdapter<'a> {
    surface: &'a dyn RenderSurface,
}

impl<'a> SurfaceAdapter<'a> {
    pub fn new(surface: &'a dyn RenderSurface) -> Self {
        Self { surface }
    }

    pub fn list_leaves(&self) -> Vec<ContentLeaf> {
        let mut leaves = Vec::new();
        for container in self.surface.page_containers() {
            let page_number = page_number_of(&container);
            leaves.extend(container.leaves.into_iter().map(|leaf| ContentLeaf {
                id: leaf.id,
                text: leaf.text,
                page_number,
            }));
        }
        leaves
    }
}

static PAGE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)page (\d+)").expect("valid page label pattern"));

/// Resolves a container to its 1-based page number: the accessible label
/// first, then the wrapper attribute. Zero is treated as unresolved.
pub fn page_number_of(container: &PageContainer) -> Option<u32> {
    container
        .label
        .as_deref()
        .and_then(parse_page_label)
        .filter(|page| *page > 0)
        .or_else(|| {
            container
                .page_attr
                .as_deref()
                .and_then(|attr| attr.trim().parse::<u32>().ok())
                .filter(|page| *page > 0)
        })
}

fn parse_page_label(label: &str) -> Option<u32> {
    PAGE_LABEL.captures(label)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(label: Option<&str>, attr: Option<&str>) -> PageContainer {
        PageContainer {
            label: label.map(str::to_owned),
            page_attr: attr.map(str::to_owned),
            leaves: Vec::new(),
        }
    }

    #[test]
    fn page_number_prefers_label() {
        assert_eq!(page_number_of(&container(Some("Page 4"), Some("9"))), Some(4));
        assert_eq!(page_number_of(&container(Some("PAGE 12 of 30"), None)), Some(12));
        assert_eq!(
            page_number_of(&container(Some("Cover page 2"), None)),
            Some(2)
        );
        assert_eq!(
            page_number_of(&container(Some("page x, Page 3"), None)),
            Some(3)
        );
    }

    #[test]
    fn page_number_falls_back_to_wrapper_attribute() {
        assert_eq!(page_number_of(&container(Some("Cover"), Some("3"))), Some(3));
        assert_eq!(page_number_of(&container(None, Some(" 7 "))), Some(7));
        assert_eq!(page_number_of(&container(Some("Page 0"), Some("5"))), Some(5));
    }

    #[test]
    fn page_number_is_unknown_when_unresolvable() {
        assert_eq!(page_number_of(&container(None, None)), None);
        assert_eq!(page_number_of(&container(Some("page x"), Some("n/a"))), None);
        assert_eq!(page_number_of(&container(None, Some("0"))), None);
    }
}
