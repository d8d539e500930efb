use tracing::{debug, instrument};

use crate::marker::{MarkKind, Marker};
use crate::surface::{ContentLeaf, RenderSurface, SurfaceAdapter};

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub leaf: ContentLeaf,
    pub page_number: Option<u32>,
    /// 0-based rank in page-then-visual order.
    pub order: usize,
}

/// Finds the leaves containing a phrase and marks them as matched.
pub struct Scanner<'a> {
    surface: &'a dyn RenderSurface,
    marker: &'a dyn Marker,
}

impl<'a> Scanner<'a> {
    pub fn new(surface: &'a dyn RenderSurface, marker: &'a dyn Marker) -> Self {
        Self { surface, marker }
    }

    /// Case-insensitive substring scan over every mounted leaf.
    ///
    /// Matches inside longer words count. Leaves on unknown pages sort after
    /// every known page; ties keep traversal order. Never removes marks.
    #[instrument(level = "debug", skip(self))]
    pub fn scan(&self, phrase: &str) -> Vec<Match> {
        if phrase.is_empty() {
            return Vec::new();
        }
        let needle = phrase.to_lowercase();

        let mut found: Vec<ContentLeaf> = SurfaceAdapter::new(self.surface)
            .list_leaves()
            .into_iter()
            .filter(|leaf| leaf.text.to_lowercase().contains(&needle))
            .collect();

        for leaf in &found {
            self.marker.mark(leaf.id, MarkKind::Matched);
        }

        // stable: equal keys keep traversal order
        found.sort_by_key(|leaf| page_sort_key(leaf.page_number));

        let matches: Vec<Match> = found
            .into_iter()
            .enumerate()
            .map(|(order, leaf)| Match {
                page_number: leaf.page_number,
                leaf,
                order,
            })
            .collect();
        debug!(count = matches.len(), "scan finished");
        matches
    }
}

fn page_sort_key(page: Option<u32>) -> (bool, u32) {
    match page {
        Some(page) => (false, page),
        None => (true, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerSet;
    use crate::memory::MemorySurface;

    fn texts(matches: &[Match]) -> Vec<&str> {
        matches.iter().map(|m| m.leaf.text.as_str()).collect()
    }

    #[test]
    fn scan_is_case_insensitive_and_matches_inside_words() {
        let surface = MemorySurface::new();
        surface.push_page(1, &["Total ASSETS", "liabilities", "reassetsment"]);
        let marker = MarkerSet::new();

        let matches = Scanner::new(&surface, &marker).scan("Assets");

        assert_eq!(texts(&matches), vec!["Total ASSETS", "reassetsment"]);
        assert_eq!(marker.marked(MarkKind::Matched).len(), 2);
        assert!(marker.marked(MarkKind::Current).is_empty());
    }

    #[test]
    fn every_containing_leaf_appears_exactly_once() {
        let surface = MemorySurface::new();
        surface.push_page(1, &["net assets", "assets assets", "cash"]);
        surface.push_page(2, &["ASSETS", "none"]);
        let marker = MarkerSet::new();

        let matches = Scanner::new(&surface, &marker).scan("assets");

        let leaves = SurfaceAdapter::new(&surface).list_leaves();
        let expected: Vec<_> = leaves
            .iter()
            .filter(|leaf| leaf.text.to_lowercase().contains("assets"))
            .map(|leaf| leaf.id)
            .collect();
        let actual: Vec<_> = matches.iter().map(|m| m.leaf.id).collect();
        assert_eq!(actual, expected);
        for m in &matches {
            assert!(m.leaf.text.to_lowercase().contains("assets"));
        }
    }

    #[test]
    fn results_are_ordered_by_page_and_stable_within_page() {
        let surface = MemorySurface::new();
        surface.push_container(Some("Cover"), None, &["phrase on unknown page"]);
        surface.push_page(3, &["third phrase a", "third phrase b"]);
        surface.push_page(1, &["first phrase"]);
        let marker = MarkerSet::new();

        let matches = Scanner::new(&surface, &marker).scan("phrase");

        assert_eq!(
            texts(&matches),
            vec![
                "first phrase",
                "third phrase a",
                "third phrase b",
                "phrase on unknown page",
            ]
        );
        let orders: Vec<_> = matches.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
        assert_eq!(matches[3].page_number, None);
    }

    #[test]
    fn empty_phrase_and_unmounted_surface_yield_nothing() {
        let surface = MemorySurface::new();
        let marker = MarkerSet::new();
        let scanner = Scanner::new(&surface, &marker);
        assert!(scanner.scan("assets").is_empty());

        surface.push_page(1, &["assets"]);
        assert!(scanner.scan("").is_empty());
        assert!(marker.is_empty());
    }
}
