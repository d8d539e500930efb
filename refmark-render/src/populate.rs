use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::surface::TextSurface;

/// A document that can hand out the text of one page at a time.
pub trait PageTextSource {
    fn page_count(&self) -> usize;
    fn page_text(&mut self, index: usize) -> Result<String>;
}

/// Mounts the source's pages on the surface and publishes them in order.
///
/// A page that fails to extract is marked failed and skipped. Stops early
/// once the surface is closed. Returns the number of pages published.
pub fn populate<S: PageTextSource + ?Sized>(source: &mut S, surface: &TextSurface) -> usize {
    let page_count = source.page_count();
    surface.mount(page_count);

    let mut published = 0;
    for index in 0..page_count {
        if surface.is_closed() {
            debug!(page = index + 1, "surface closed, stopping extraction");
            break;
        }
        match source.page_text(index) {
            Ok(text) => {
                surface.publish(index, split_lines(&text));
                published += 1;
            }
            Err(err) => {
                warn!(?err, page = index + 1, "failed to extract page text");
                surface.mark_failed(index);
            }
        }
    }
    published
}

/// Runs `job` on the blocking pool. Errors are logged, never propagated.
pub fn spawn_population<F>(surface: Arc<TextSurface>, job: F) -> JoinHandle<()>
where
    F: FnOnce(&TextSurface) -> Result<usize> + Send + 'static,
{
    tokio::task::spawn_blocking(move || match job(&*surface) {
        Ok(published) => debug!(published, "text extraction finished"),
        Err(err) => warn!(?err, "text extraction failed"),
    })
}

/// Non-blank lines of a page, trailing whitespace removed.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use refmark_core::RenderSurface;

    struct FakePages {
        pages: Vec<Option<&'static str>>,
    }

    impl PageTextSource for FakePages {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_text(&mut self, index: usize) -> Result<String> {
            self.pages[index]
                .map(str::to_owned)
                .ok_or_else(|| anyhow!("page {} is damaged", index))
        }
    }

    #[test]
    fn split_lines_drops_blank_lines() {
        assert_eq!(
            split_lines("Highlights Q2 2025\r\n\r\n  EBITDA increase  \n"),
            vec!["Highlights Q2 2025", "  EBITDA increase"]
        );
    }

    #[test]
    fn populate_marks_failed_pages_and_continues() {
        let surface = TextSurface::new();
        let mut source = FakePages {
            pages: vec![Some("Total assets"), None, Some("Revenue increased")],
        };

        let published = populate(&mut source, &surface);

        assert_eq!(published, 2);
        assert_eq!(surface.rendered_pages(), 2);
        assert!(surface.is_settled());
    }

    #[test]
    fn populate_stops_when_closed() {
        let surface = TextSurface::new();
        surface.close();
        let mut source = FakePages {
            pages: vec![Some("a"), Some("b")],
        };

        assert_eq!(populate(&mut source, &surface), 0);
        assert_eq!(surface.page_count(), 2);
        assert!(!surface.is_settled());
    }

    #[tokio::test]
    async fn spawned_population_fills_surface() {
        let surface = Arc::new(TextSurface::new());
        let handle = spawn_population(Arc::clone(&surface), |surface| {
            let mut source = FakePages {
                pages: vec![Some("Gain on sale of non-current assets, etc")],
            };
            Ok(populate(&mut source, surface))
        });
        handle.await.unwrap();

        assert_eq!(surface.rendered_pages(), 1);
        assert_eq!(surface.page_containers().len(), 1);
    }
}
